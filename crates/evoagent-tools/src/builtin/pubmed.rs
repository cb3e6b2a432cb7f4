//! Mock PubMed search — a black-box fetcher stand-in (the real upstream
//! client is out of scope). Returns deterministic record shapes the
//! evidence pipeline's classifiers can consume unmodified.

use evoagent_domain::envelope::{Lineage, ToolExecutionError};
use serde_json::{json, Value};

use crate::registry::ToolHandler;

pub struct SearchPubmedTool;

pub const DESCRIPTION: &str = "WHEN: Need published literature (systematic reviews, RCTs, observational studies) for a biomedical topic.\nAVOID: Use for clinical trial registry status or drug label text instead.\nCRITICAL_ARGS: query.\nRETURNS: record_list of PubMed-shaped records with pmid/title/year/publication_types/mesh_terms/abstract.\nFAILS_IF: query is missing.";

pub fn input_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "query": {"type": "string"},
            "max_results": {"type": "integer", "minimum": 1, "maximum": 50, "default": 10},
        },
        "required": ["query"],
    })
}

#[async_trait::async_trait]
impl ToolHandler for SearchPubmedTool {
    async fn call(&self, payload: Value, _lineage: &Lineage) -> Result<Value, ToolExecutionError> {
        let query = payload
            .get("query")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ToolExecutionError::validation("'query' is required"))?;

        let max_results = payload
            .get("max_results")
            .and_then(Value::as_u64)
            .unwrap_or(10)
            .clamp(1, 50);

        let records: Vec<Value> = (1..=max_results.min(3))
            .map(|i| {
                json!({
                    "pmid": format!("{:08}", 10_000_000 + i),
                    "title": format!("{query}: a systematic review of outcomes, study {i}"),
                    "year": 2020 + i as i64,
                    "publication_types": ["Systematic Review"],
                    "mesh_terms": [query],
                    "abstract": format!(
                        "This systematic review examines {query} across multiple human cohort studies."
                    ),
                })
            })
            .collect();

        let ids: Vec<String> = records
            .iter()
            .filter_map(|r| r.get("pmid").and_then(Value::as_str).map(str::to_owned))
            .collect();

        Ok(json!({
            "query": query,
            "records": records,
            "ids": ids,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn lineage() -> Lineage {
        Lineage {
            thread_id: Uuid::new_v4(),
            run_id: Uuid::new_v4(),
            tool_use_id: "call-1".into(),
        }
    }

    #[tokio::test]
    async fn returns_records_with_pmids() {
        let out = SearchPubmedTool
            .call(json!({"query": "senescence"}), &lineage())
            .await
            .unwrap();
        let records = out["records"].as_array().unwrap();
        assert!(!records.is_empty());
        assert!(records[0]["pmid"].as_str().unwrap().len() == 8);
    }

    #[tokio::test]
    async fn missing_query_is_validation_error() {
        assert!(SearchPubmedTool.call(json!({}), &lineage()).await.is_err());
    }
}
