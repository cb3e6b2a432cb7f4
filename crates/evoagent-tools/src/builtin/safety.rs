//! Mock DailyMed / openFDA fetchers — black-box fetcher stand-ins.

use evoagent_domain::envelope::{Lineage, ToolExecutionError};
use serde_json::{json, Value};

use crate::registry::ToolHandler;

pub struct DailymedSearchLabelsTool;

pub const DAILYMED_DESCRIPTION: &str = "WHEN: Need DailyMed structured product label (SPL) listings for a drug name.\nAVOID: Use for efficacy evidence; labels describe approved use and safety text, not study results.\nCRITICAL_ARGS: drug_name.\nRETURNS: record_list of SPL entries with setid/title/published_date.\nFAILS_IF: drug_name is missing.";

pub fn dailymed_input_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "drug_name": {"type": "string"},
            "page": {"type": "integer", "minimum": 1, "default": 1},
            "page_size": {"type": "integer", "minimum": 1, "maximum": 100, "default": 20},
        },
        "required": ["drug_name"],
    })
}

#[async_trait::async_trait]
impl ToolHandler for DailymedSearchLabelsTool {
    async fn call(&self, payload: Value, _lineage: &Lineage) -> Result<Value, ToolExecutionError> {
        let drug_name = payload
            .get("drug_name")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ToolExecutionError::validation("'drug_name' is required"))?;

        let records = vec![json!({
            "setid": "00000000-0000-0000-0000-000000000001",
            "title": format!("{drug_name} (oral tablet) label"),
            "published_date": "2024-01-15",
        })];

        let ids: Vec<String> = records
            .iter()
            .filter_map(|r| r.get("setid").and_then(Value::as_str).map(str::to_owned))
            .collect();

        Ok(json!({
            "drug_name": drug_name,
            "records": records,
            "ids": ids,
        }))
    }
}

pub struct OpenfdaFaersAggregateTool;

pub const OPENFDA_DESCRIPTION: &str = "WHEN: Need an aggregate count of adverse-event reports from FAERS for a drug/reaction query.\nAVOID: Treating counts as incidence rates; FAERS reports are spontaneous and unverified.\nCRITICAL_ARGS: search.\nRETURNS: aggregate rows of {term, count} buckets.\nFAILS_IF: search is missing.";

pub fn openfda_input_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "search": {"type": "string"},
            "count": {"type": "string", "default": "patient.reaction.reactionmeddrapt.exact"},
            "limit": {"type": "integer", "minimum": 1, "maximum": 100, "default": 10},
        },
        "required": ["search"],
    })
}

#[async_trait::async_trait]
impl ToolHandler for OpenfdaFaersAggregateTool {
    async fn call(&self, payload: Value, _lineage: &Lineage) -> Result<Value, ToolExecutionError> {
        let search = payload
            .get("search")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ToolExecutionError::validation("'search' is required"))?;

        let rows = vec![
            json!({"term": "NAUSEA", "count": 142}),
            json!({"term": "HEADACHE", "count": 97}),
        ];

        Ok(json!({
            "search": search,
            "rows": rows,
            "note": "Spontaneous reports are signal-only and do not establish incidence or causality.",
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
    async fn dailymed_requires_drug_name() {
        assert!(DailymedSearchLabelsTool
            .call(json!({}), &lineage())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn openfda_returns_rows() {
        let out = OpenfdaFaersAggregateTool
            .call(json!({"search": "drugname:aspirin"}), &lineage())
            .await
            .unwrap();
        assert_eq!(out["rows"].as_array().unwrap().len(), 2);
    }
}
