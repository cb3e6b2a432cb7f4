//! Illustrative tool handlers. The concrete upstream clients (PubMed,
//! ClinicalTrials.gov, DailyMed, openFDA) are out of scope; these stand in
//! as deterministic mock fetchers so the registry, dispatch lifecycle,
//! and evidence pipeline have something real to exercise end-to-end.

mod calc;
mod grade;
mod pubmed;
mod safety;
mod trials;

pub use calc::CalcTool;
pub use grade::GradeEvidenceTool;
pub use pubmed::SearchPubmedTool;
pub use safety::{DailymedSearchLabelsTool, OpenfdaFaersAggregateTool};
pub use trials::SearchClinicalTrialsTool;

use evoagent_domain::config::EvidenceConfig;

use crate::registry::ToolRegistry;

/// Register every illustrative builtin tool under its canonical name.
pub fn register_builtin_tools(registry: &mut ToolRegistry, evidence_config: &EvidenceConfig) {
    registry.register(
        "calc",
        calc::CALC_DESCRIPTION,
        calc::input_schema(),
        "builtin",
        CalcTool,
    );
    registry.register(
        "search_pubmed",
        pubmed::DESCRIPTION,
        pubmed::input_schema(),
        "pubmed",
        SearchPubmedTool,
    );
    registry.register(
        "search_clinical_trials",
        trials::DESCRIPTION,
        trials::input_schema(),
        "clinicaltrials",
        SearchClinicalTrialsTool,
    );
    registry.register(
        "dailymed_search_labels",
        safety::DAILYMED_DESCRIPTION,
        safety::dailymed_input_schema(),
        "dailymed",
        DailymedSearchLabelsTool,
    );
    registry.register(
        "openfda_faers_aggregate",
        safety::OPENFDA_DESCRIPTION,
        safety::openfda_input_schema(),
        "openfda",
        OpenfdaFaersAggregateTool,
    );
    registry.register(
        "grade_evidence",
        grade::DESCRIPTION,
        grade::input_schema(),
        "evidence_pipeline",
        GradeEvidenceTool::new(evidence_config.clone()),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_all_builtin_tools() {
        let mut reg = ToolRegistry::new();
        register_builtin_tools(&mut reg, &EvidenceConfig::default());
        assert_eq!(
            reg.tool_names(),
            vec![
                "calc",
                "dailymed_search_labels",
                "grade_evidence",
                "openfda_faers_aggregate",
                "search_clinical_trials",
                "search_pubmed",
            ]
        );
    }
}
