//! Wires the Evidence Scoring Pipeline (spec §4.G) into the tool runtime.
//! Takes already-retrieved PubMed/ClinicalTrials.gov-shaped records
//! (typically the outputs of `search_pubmed` and `search_clinical_trials`
//! in an earlier tool call) and runs classify → ledger → score → gaps →
//! report in one dispatch, so the model doesn't have to orchestrate five
//! separate calls to get a confidence number and a report.

use evoagent_domain::config::EvidenceConfig;
use evoagent_domain::envelope::{Lineage, ToolExecutionError};
use evoagent_evidence::{build_gap_map, build_ledger, classify_pubmed_record, classify_trial_record, grade_hybrid, render_json_report, render_markdown_report};
use serde_json::{json, Value};

use crate::registry::ToolHandler;

pub const DESCRIPTION: &str = "WHEN: You have PubMed and/or ClinicalTrials.gov records in hand and need a confidence score with supporting gaps.\nAVOID: Use before fetching literature; this does not retrieve anything itself.\nCRITICAL_ARGS: at least one of pubmed_records/trial_records should be non-empty, or the result reflects an empty evidence base.\nRETURNS: aggregate with score, gap_map, and a rendered markdown report.\nFAILS_IF: neither pubmed_records nor trial_records is an array.";

pub fn input_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "pubmed_records": {"type": "array", "items": {"type": "object"}, "default": []},
            "trial_records": {"type": "array", "items": {"type": "object"}, "default": []},
        },
    })
}

pub struct GradeEvidenceTool {
    config: EvidenceConfig,
}

impl GradeEvidenceTool {
    pub fn new(config: EvidenceConfig) -> Self {
        Self { config }
    }
}

fn as_object_array(payload: &Value, key: &str) -> Result<Vec<Value>, ToolExecutionError> {
    match payload.get(key) {
        None => Ok(Vec::new()),
        Some(Value::Array(items)) => Ok(items.clone()),
        Some(_) => Err(ToolExecutionError::validation(format!("'{key}' must be an array"))),
    }
}

#[async_trait::async_trait]
impl ToolHandler for GradeEvidenceTool {
    async fn call(&self, payload: Value, _lineage: &Lineage) -> Result<Value, ToolExecutionError> {
        let pubmed_records = as_object_array(&payload, "pubmed_records")?;
        let trial_records = as_object_array(&payload, "trial_records")?;

        let records = pubmed_records
            .iter()
            .map(classify_pubmed_record)
            .chain(trial_records.iter().map(classify_trial_record))
            .collect();

        let ledger = build_ledger(records);
        let score = grade_hybrid(&self.config, &ledger);
        let gap_map = build_gap_map(&ledger);
        let json_report = render_json_report(&ledger, &score, &gap_map);
        let markdown = render_markdown_report(&ledger, &score, &gap_map);

        Ok(json!({
            "report": json_report,
            "markdown": markdown,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    fn lineage() -> Lineage {
        Lineage {
            thread_id: Uuid::new_v4(),
            run_id: Uuid::new_v4(),
            tool_use_id: "call-1".into(),
        }
    }

    #[tokio::test]
    async fn empty_input_still_scores_and_renders() {
        let tool = GradeEvidenceTool::new(EvidenceConfig::default());
        let out = tool.call(json!({}), &lineage()).await.unwrap();
        assert!(out["markdown"].as_str().unwrap().contains("## Summary"));
        assert_eq!(out["report"]["score"]["final_confidence"], json!(8.0));
    }

    #[tokio::test]
    async fn non_array_records_is_validation_error() {
        let tool = GradeEvidenceTool::new(EvidenceConfig::default());
        let err = tool.call(json!({"pubmed_records": "nope"}), &lineage()).await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn mixed_sources_produce_combined_ledger() {
        let tool = GradeEvidenceTool::new(EvidenceConfig::default());
        let out = tool
            .call(
                json!({
                    "pubmed_records": [{
                        "pmid": "10000001",
                        "title": "A systematic review of an intervention",
                        "year": 2022,
                        "publication_types": ["Systematic Review"],
                        "mesh_terms": ["humans"],
                        "abstract": "Reviews mortality outcomes across human cohorts.",
                    }],
                    "trial_records": [{
                        "nct_id": "NCT00000001",
                        "title": "A trial of an intervention",
                        "status": "Completed",
                        "study_type": "Interventional",
                        "has_results": true,
                    }],
                }),
                &lineage(),
            )
            .await
            .unwrap();
        assert_eq!(out["report"]["ledger"]["records"].as_array().unwrap().len(), 2);
    }
}
