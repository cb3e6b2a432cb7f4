//! G4 — Gap map (spec §4.G4).

use crate::model::{EndpointClass, EvidenceLedger, EvidenceLevel, GapMap};

/// Build the gap map for a ledger: missing evidence levels, absence of a
/// hard clinical endpoint, registry-vs-publication mismatch signals, and
/// a prescription of next-best studies.
pub fn build_gap_map(ledger: &EvidenceLedger) -> GapMap {
    let missing_levels: Vec<u8> = EvidenceLevel::all()
        .iter()
        .map(|l| l.as_u8())
        .filter(|level| !ledger.counts_by_level.contains_key(level))
        .collect();

    let missing_hard_endpoint = ledger
        .counts_by_endpoint
        .get(&EndpointClass::ClinicalHard)
        .copied()
        .unwrap_or(0)
        == 0;

    let mut mismatch_signals = Vec::new();
    let registry_count = ledger.counts_by_source.get("clinicaltrials").copied().unwrap_or(0);
    let publication_count = ledger.counts_by_source.get("pubmed").copied().unwrap_or(0);
    if registry_count > 0 && publication_count == 0 {
        mismatch_signals.push(
            "registered trials exist with no matching published results".to_string(),
        );
    }
    let not_completed = ledger
        .records
        .iter()
        .filter(|r| r.quality_flags.contains("not_completed"))
        .count();
    if not_completed > 0 {
        mismatch_signals.push(format!("{not_completed} registered trial(s) not yet completed"));
    }

    let mut next_best_studies = Vec::new();
    if missing_levels.contains(&1) {
        next_best_studies.push(
            "a systematic review or meta-analysis synthesizing existing RCTs".to_string(),
        );
    }
    if missing_levels.contains(&2) {
        next_best_studies.push("a randomized controlled trial in the target population".to_string());
    }
    if missing_hard_endpoint {
        next_best_studies.push(
            "a study powered on a hard clinical endpoint (mortality, major morbidity) rather than a surrogate"
                .to_string(),
        );
    }
    if ledger.records.is_empty() {
        next_best_studies.push("any study at all; no evidence was retrieved for this claim".to_string());
    }

    GapMap {
        missing_levels,
        missing_hard_endpoint,
        mismatch_signals,
        next_best_studies,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::build_ledger;

    #[test]
    fn empty_ledger_flags_all_levels_missing() {
        let ledger = build_ledger(Vec::new());
        let gap_map = build_gap_map(&ledger);
        assert_eq!(gap_map.missing_levels, vec![1, 2, 3, 4, 5, 6]);
        assert!(gap_map.missing_hard_endpoint);
        assert!(!gap_map.next_best_studies.is_empty());
    }
}
