//! G2 — Ledger build (spec §4.G2).

use std::collections::{BTreeMap, HashMap};

use crate::model::{normalize_title, EvidenceLedger, EvidenceLevel, StudyRecord};

/// Merge classified records from all sources into one ledger: dedupe by
/// the union of available identifiers (doi, pmid, nct), falling back to
/// normalized title when no identifier overlap exists, then compute
/// counts and coverage gaps.
pub fn build_ledger(records: Vec<StudyRecord>) -> EvidenceLedger {
    let mut by_key: HashMap<String, usize> = HashMap::new();
    let mut merged: Vec<StudyRecord> = Vec::new();
    let mut duplicates_merged = 0usize;

    for record in records {
        let mut existing_index = None;
        for key in record.ids.dedup_keys() {
            if let Some(&idx) = by_key.get(&key) {
                existing_index = Some(idx);
                break;
            }
        }
        if existing_index.is_none() {
            let title_key = format!("title:{}", normalize_title(&record.title));
            if let Some(&idx) = by_key.get(&title_key) {
                existing_index = Some(idx);
            }
        }

        match existing_index {
            Some(idx) => {
                merge_into(&mut merged[idx], record);
                duplicates_merged += 1;
            }
            None => {
                let idx = merged.len();
                let title_key = format!("title:{}", normalize_title(&record.title));
                for key in record.ids.dedup_keys() {
                    by_key.insert(key, idx);
                }
                by_key.insert(title_key, idx);
                merged.push(record);
            }
        }
    }

    let mut counts_by_level: BTreeMap<u8, usize> = BTreeMap::new();
    let mut counts_by_endpoint = BTreeMap::new();
    let mut counts_by_source: BTreeMap<String, usize> = BTreeMap::new();

    for record in &merged {
        *counts_by_level.entry(record.evidence_level.as_u8()).or_insert(0) += 1;
        *counts_by_endpoint.entry(record.endpoint_class).or_insert(0) += 1;
        *counts_by_source.entry(record.source.clone()).or_insert(0) += 1;
    }

    let coverage_gaps = compute_coverage_gaps(&counts_by_level);

    EvidenceLedger {
        records: merged,
        duplicates_merged,
        counts_by_level,
        counts_by_endpoint,
        counts_by_source,
        coverage_gaps,
    }
}

fn merge_into(target: &mut StudyRecord, other: StudyRecord) {
    // Prefer the more direct classification (lower evidence-level number
    // is more direct) and union the identifier/flag/hallmark sets.
    if other.evidence_level < target.evidence_level {
        target.evidence_level = other.evidence_level;
        target.study_type = other.study_type.clone();
    }
    if target.ids.pmid.is_none() {
        target.ids.pmid = other.ids.pmid.clone();
    }
    if target.ids.doi.is_none() {
        target.ids.doi = other.ids.doi.clone();
    }
    if target.ids.nct.is_none() {
        target.ids.nct = other.ids.nct.clone();
    }
    target.quality_flags.extend(other.quality_flags);
    target.directness_flags.extend(other.directness_flags);
    target.hallmark_tags.extend(other.hallmark_tags);
    target.citations.extend(other.citations);
}

fn compute_coverage_gaps(counts_by_level: &BTreeMap<u8, usize>) -> Vec<String> {
    EvidenceLevel::all()
        .iter()
        .filter(|level| !counts_by_level.contains_key(&level.as_u8()))
        .map(|level| format!("no evidence at level {} ({:?})", level.as_u8(), level))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EndpointClass, PopulationClass, StudyIds};
    use std::collections::BTreeSet;

    fn sample(study_key: &str, pmid: Option<&str>, title: &str) -> StudyRecord {
        StudyRecord {
            study_key: study_key.to_string(),
            source: "pubmed".to_string(),
            title: title.to_string(),
            year: Some(2023),
            ids: StudyIds { pmid: pmid.map(str::to_string), doi: None, nct: None },
            evidence_level: EvidenceLevel::ObservationalCohort,
            study_type: "Observational Study".to_string(),
            population_class: PopulationClass::Human,
            endpoint_class: EndpointClass::Unknown,
            quality_flags: BTreeSet::new(),
            directness_flags: BTreeSet::new(),
            effect_direction: None,
            citations: Vec::new(),
            hallmark_tags: BTreeSet::new(),
        }
    }

    #[test]
    fn dedupes_by_shared_pmid() {
        let records = vec![
            sample("a", Some("123"), "Study of senescence"),
            sample("b", Some("123"), "Study of senescence (duplicate record)"),
        ];
        let ledger = build_ledger(records);
        assert_eq!(ledger.records.len(), 1);
        assert_eq!(ledger.duplicates_merged, 1);
    }

    #[test]
    fn dedupes_by_normalized_title_when_no_shared_id() {
        let records = vec![
            sample("a", None, "Senescence, Aging & Disease!"),
            sample("b", None, "senescence aging disease"),
        ];
        let ledger = build_ledger(records);
        assert_eq!(ledger.records.len(), 1);
    }

    #[test]
    fn coverage_gaps_list_missing_levels() {
        let ledger = build_ledger(vec![sample("a", Some("1"), "x")]);
        assert!(ledger.coverage_gaps.iter().any(|g| g.contains("level 1")));
        assert!(!ledger.coverage_gaps.iter().any(|g| g.contains("level 3")));
    }
}
