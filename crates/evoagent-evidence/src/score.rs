//! G3 — Scoring (`grade_hybrid`, spec §4.G3). Deterministic integer-stable
//! arithmetic; identical input always produces identical output.

use std::collections::{BTreeMap, BTreeSet};

use evoagent_domain::config::EvidenceConfig;

use crate::model::{ConfidenceLabel, EndpointClass, EvidenceLedger, PopulationClass, ScoreComponent, ScoreComponents, ScoreTrace};

fn coverage_factor(count: usize) -> f64 {
    (0.45 + 0.2 * count.min(3) as f64).min(1.0)
}

fn clinical_evidence_subscore(config: &EvidenceConfig, counts_by_level: &BTreeMap<u8, usize>) -> f64 {
    let mut ces = 0.0;
    for (&level, &count) in counts_by_level {
        let base = *config.level_points.get(&level).unwrap_or(&0.0);
        ces += base * coverage_factor(count);
    }
    ces.min(70.0)
}

fn mechanistic_plausibility(
    hallmark_tag_count: usize,
    clinical_hard_count: usize,
    surrogate_biomarker_count: usize,
) -> f64 {
    let mut mp = 8.0 + (hallmark_tag_count as f64 * 2.0).min(18.0);
    if clinical_hard_count > 0 {
        mp += 3.0;
    }
    if surrogate_biomarker_count > clinical_hard_count {
        mp -= 2.0;
    }
    mp.clamp(0.0, 30.0)
}

fn quality_penalties(config: &EvidenceConfig, flag_counts: &BTreeMap<String, usize>) -> (f64, Vec<ScoreComponent>) {
    let mut total = 0.0;
    let mut components = Vec::new();
    for (flag, &count) in flag_counts {
        let Some(&unit_weight) = config.flag_unit_weights.get(flag) else {
            continue;
        };
        let cap = unit_weight * config.penalty_cap_multiple;
        let charged = (unit_weight * count as f64).min(cap);
        total += charged;
        components.push(ScoreComponent {
            name: flag.clone(),
            amount: -charged,
            detail: Some(format!("{count} occurrence(s) at weight {unit_weight}, capped at {cap}")),
        });
    }
    components.sort_by(|a, b| a.name.cmp(&b.name));
    (total, components)
}

fn consistency_bonus(counts_by_level: &BTreeMap<u8, usize>) -> (f64, Vec<ScoreComponent>) {
    let has_level1 = counts_by_level.get(&1).copied().unwrap_or(0) > 0;
    let level2_count = counts_by_level.get(&2).copied().unwrap_or(0);

    if has_level1 && level2_count > 0 {
        (
            4.0,
            vec![ScoreComponent {
                name: "level1_and_level2_present".to_string(),
                amount: 4.0,
                detail: None,
            }],
        )
    } else if level2_count >= 2 {
        (
            2.5,
            vec![ScoreComponent {
                name: "two_or_more_level2".to_string(),
                amount: 2.5,
                detail: None,
            }],
        )
    } else {
        (0.0, Vec::new())
    }
}

/// Score an evidence ledger into a [`ScoreTrace`] per the deterministic
/// arithmetic in spec §4.G3. Pure function: identical ledgers always
/// produce byte-identical (after JSON serialization) output.
pub fn grade_hybrid(config: &EvidenceConfig, ledger: &EvidenceLedger) -> ScoreTrace {
    let ces = clinical_evidence_subscore(config, &ledger.counts_by_level);

    let hallmark_tag_count: BTreeSet<&str> = ledger
        .records
        .iter()
        .flat_map(|r| r.hallmark_tags.iter().map(String::as_str))
        .collect();
    let hallmark_tag_count = hallmark_tag_count.len();

    let clinical_hard_count = ledger
        .counts_by_endpoint
        .get(&EndpointClass::ClinicalHard)
        .copied()
        .unwrap_or(0);
    let surrogate_biomarker_count = ledger
        .counts_by_endpoint
        .get(&EndpointClass::SurrogateBiomarker)
        .copied()
        .unwrap_or(0);

    let mp = mechanistic_plausibility(hallmark_tag_count, clinical_hard_count, surrogate_biomarker_count);

    let mut flag_counts: BTreeMap<String, usize> = BTreeMap::new();
    for record in &ledger.records {
        for flag in &record.quality_flags {
            *flag_counts.entry(flag.clone()).or_insert(0) += 1;
        }
    }
    let (penalty_total, penalties) = quality_penalties(config, &flag_counts);
    let (bonus_total, bonuses) = consistency_bonus(&ledger.counts_by_level);

    let raw = ces + mp + bonus_total - penalty_total;

    let has_human_evidence = ledger
        .records
        .iter()
        .any(|r| matches!(r.population_class, PopulationClass::Human | PopulationClass::HumanRegistry));
    let has_level1_or_2 = ledger.counts_by_level.get(&1).copied().unwrap_or(0) > 0
        || ledger.counts_by_level.get(&2).copied().unwrap_or(0) > 0;

    let mut caps_applied = Vec::new();
    let mut capped = raw;

    if !has_human_evidence {
        caps_applied.push("no_human_evidence_cap_45".to_string());
        capped = capped.min(45.0);
    } else if !has_level1_or_2 {
        caps_applied.push("no_level1_or_2_cap_70".to_string());
        capped = capped.min(70.0);
    }
    if surrogate_biomarker_count > 0 && clinical_hard_count == 0 {
        caps_applied.push("surrogate_without_hard_endpoint_cap_60".to_string());
        capped = capped.min(60.0);
    }

    let final_confidence = round3(capped).clamp(0.0, 100.0);
    let label = ConfidenceLabel::for_score(final_confidence);

    ScoreTrace {
        ces: round3(ces),
        mp: round3(mp),
        final_confidence,
        label,
        penalties,
        bonuses,
        caps_applied,
        components: ScoreComponents {
            counts_by_level: ledger.counts_by_level.clone(),
            flag_counts,
            hallmark_tag_count,
        },
    }
}

fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::build_ledger;
    use crate::model::{EvidenceLevel, StudyIds, StudyRecord};

    fn record(level: EvidenceLevel, population: PopulationClass, endpoint: EndpointClass) -> StudyRecord {
        StudyRecord {
            study_key: format!("{level:?}-{population:?}-{endpoint:?}"),
            source: "pubmed".to_string(),
            title: "Study".to_string(),
            year: Some(2023),
            ids: StudyIds::default(),
            evidence_level: level,
            study_type: "x".to_string(),
            population_class: population,
            endpoint_class: endpoint,
            quality_flags: BTreeSet::new(),
            directness_flags: BTreeSet::new(),
            effect_direction: None,
            citations: Vec::new(),
            hallmark_tags: BTreeSet::new(),
        }
    }

    #[test]
    fn empty_ledger_scores_zero() {
        let config = EvidenceConfig::default();
        let ledger = build_ledger(Vec::new());
        let trace = grade_hybrid(&config, &ledger);
        assert_eq!(trace.ces, 0.0);
        assert_eq!(trace.final_confidence, 8.0);
        assert!(trace.caps_applied.contains(&"no_human_evidence_cap_45".to_string()));
    }

    #[test]
    fn preclinical_only_evidence_is_capped_at_45() {
        let config = EvidenceConfig::default();
        let ledger = build_ledger(vec![record(
            EvidenceLevel::Preclinical,
            PopulationClass::Animal,
            EndpointClass::MechanisticOnly,
        )]);
        let trace = grade_hybrid(&config, &ledger);
        assert!(trace.final_confidence <= 45.0);
        assert_eq!(trace.caps_applied, vec!["no_human_evidence_cap_45".to_string()]);
    }

    #[test]
    fn observational_only_is_capped_at_70() {
        let config = EvidenceConfig::default();
        let ledger = build_ledger(vec![record(
            EvidenceLevel::ObservationalCohort,
            PopulationClass::Human,
            EndpointClass::ClinicalHard,
        )]);
        let trace = grade_hybrid(&config, &ledger);
        assert!(trace.final_confidence <= 70.0);
        assert!(trace.caps_applied.contains(&"no_level1_or_2_cap_70".to_string()));
    }

    #[test]
    fn surrogate_without_hard_endpoint_caps_at_60() {
        let config = EvidenceConfig::default();
        let mut ledger = build_ledger(vec![
            record(EvidenceLevel::SystematicReviewMetaAnalysis, PopulationClass::Human, EndpointClass::SurrogateBiomarker),
            record(EvidenceLevel::Rct, PopulationClass::Human, EndpointClass::SurrogateBiomarker),
        ]);
        ledger.records[0].study_key = "a".into();
        ledger.records[1].study_key = "b".into();
        let trace = grade_hybrid(&config, &ledger);
        assert!(trace.final_confidence <= 60.0);
        assert!(trace.caps_applied.contains(&"surrogate_without_hard_endpoint_cap_60".to_string()));
    }

    #[test]
    fn both_level1_and_level2_yields_four_point_bonus() {
        let counts = BTreeMap::from([(1u8, 1usize), (2u8, 1usize)]);
        let (bonus, _) = consistency_bonus(&counts);
        assert_eq!(bonus, 4.0);
    }

    #[test]
    fn two_level2_without_level1_yields_smaller_bonus() {
        let counts = BTreeMap::from([(2u8, 2usize)]);
        let (bonus, _) = consistency_bonus(&counts);
        assert_eq!(bonus, 2.5);
    }

    #[test]
    fn penalty_is_capped_at_four_times_unit_weight() {
        let config = EvidenceConfig::default();
        let mut flags = BTreeMap::new();
        flags.insert("limited_metadata".to_string(), 100usize);
        let (total, _) = quality_penalties(&config, &flags);
        assert_eq!(total, 1.5 * 4.0);
    }

    #[test]
    fn scoring_is_deterministic_across_repeated_runs() {
        let config = EvidenceConfig::default();
        let ledger = build_ledger(vec![
            record(EvidenceLevel::SystematicReviewMetaAnalysis, PopulationClass::Human, EndpointClass::ClinicalHard),
        ]);
        let first = grade_hybrid(&config, &ledger);
        let second = grade_hybrid(&config, &ledger);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }
}
