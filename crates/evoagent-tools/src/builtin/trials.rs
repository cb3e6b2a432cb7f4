//! Mock ClinicalTrials.gov search — a black-box fetcher stand-in. Returns
//! registry-record shapes feeding `classify_trial_record` (evidence
//! pipeline, not this crate).

use evoagent_domain::envelope::{Lineage, ToolExecutionError};
use serde_json::{json, Value};

use crate::registry::ToolHandler;

pub struct SearchClinicalTrialsTool;

pub const DESCRIPTION: &str = "WHEN: Need clinical trial registry status (recruiting/completed, interventional/observational) for a condition or intervention.\nAVOID: Use for published study results or drug safety labels instead.\nCRITICAL_ARGS: condition.\nRETURNS: record_list of ClinicalTrials.gov-shaped registry entries with nct_id/status/study_type/has_results.\nFAILS_IF: condition is missing.";

pub fn input_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "condition": {"type": "string"},
            "max_results": {"type": "integer", "minimum": 1, "maximum": 50, "default": 10},
        },
        "required": ["condition"],
    })
}

#[async_trait::async_trait]
impl ToolHandler for SearchClinicalTrialsTool {
    async fn call(&self, payload: Value, _lineage: &Lineage) -> Result<Value, ToolExecutionError> {
        let condition = payload
            .get("condition")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ToolExecutionError::validation("'condition' is required"))?;

        let records = vec![
            json!({
                "nct_id": "NCT00000001",
                "title": format!("A trial of an intervention for {condition}"),
                "status": "Recruiting",
                "study_type": "Interventional",
                "has_results": false,
            }),
            json!({
                "nct_id": "NCT00000002",
                "title": format!("Registry-only record for {condition}"),
                "status": "Completed",
                "study_type": "Observational",
                "has_results": false,
            }),
        ];

        let ids: Vec<String> = records
            .iter()
            .filter_map(|r| r.get("nct_id").and_then(Value::as_str).map(str::to_owned))
            .collect();

        Ok(json!({
            "condition": condition,
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
    async fn returns_registry_records() {
        let out = SearchClinicalTrialsTool
            .call(json!({"condition": "frailty"}), &lineage())
            .await
            .unwrap();
        let ids = out["ids"].as_array().unwrap();
        assert_eq!(ids.len(), 2);
    }
}
