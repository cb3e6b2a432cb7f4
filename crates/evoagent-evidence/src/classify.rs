//! G1 — Classification (spec §4.G1).
//!
//! Pure functions over raw tool-output records (PubMed/ClinicalTrials.gov
//! shapes, see `evoagent-tools::builtin::{pubmed,trials}`) and free text.
//! No network access, no side effects.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::model::{EndpointClass, EvidenceLevel, PopulationClass, StudyIds, StudyRecord};

/// Aging-hallmark tags recognized by [`extract_hallmark_tags`], keyed by
/// the canonical tag and a small set of trigger phrases. Matching is
/// case-insensitive and word-boundary safe.
const HALLMARK_TAGS: &[(&str, &[&str])] = &[
    ("genomic_instability", &["genomic instability", "dna damage"]),
    ("telomere_attrition", &["telomere attrition", "telomere length", "telomere shortening"]),
    ("epigenetic_alterations", &["epigenetic", "dna methylation"]),
    ("loss_of_proteostasis", &["proteostasis", "protein aggregation", "misfolded protein"]),
    ("disabled_macroautophagy", &["autophagy"]),
    ("deregulated_nutrient_sensing", &["nutrient sensing", "mtor", "ampk", "insulin signaling"]),
    ("mitochondrial_dysfunction", &["mitochondrial dysfunction", "mitochondrial"]),
    ("cellular_senescence", &["senescence", "senescent cell", "sasp"]),
    ("stem_cell_exhaustion", &["stem cell exhaustion", "stem cell"]),
    ("altered_intercellular_communication", &["intercellular communication", "cell signaling"]),
    ("chronic_inflammation", &["inflammaging", "chronic inflammation"]),
    ("dysbiosis", &["dysbiosis", "microbiome"]),
];

/// Endpoint keyword table, ordered most-to-least specific since a text may
/// match more than one class; the first class with a hit wins.
const CLINICAL_HARD_TERMS: &[&str] = &["mortality", "survival", "myocardial infarction", "stroke", "hospitalization", "all-cause death"];
const CLINICAL_INTERMEDIATE_TERMS: &[&str] = &["quality of life", "frailty index", "physical function", "grip strength", "gait speed"];
const SURROGATE_BIOMARKER_TERMS: &[&str] = &["biomarker", "NAD", "inflammatory marker", "crp level", "il-6", "surrogate endpoint"];
const MECHANISTIC_TERMS: &[&str] = &["in vitro", "cell culture", "gene expression", "pathway activation", "mouse model", "rodent model"];

fn word_boundary_regex(term: &str) -> Regex {
    // Escape then wrap in \b...\b so "NAD" never matches inside "canada".
    let escaped = regex::escape(term);
    Regex::new(&format!(r"(?i)\b{escaped}\b")).expect("valid generated regex")
}

fn any_term_matches(text: &str, terms: &[&str]) -> bool {
    terms.iter().any(|t| word_boundary_regex(t).is_match(text))
}

/// Detect the endpoint class of free text using word-boundary keyword
/// matching, most-specific class first.
pub fn classify_endpoint_class(text: &str) -> EndpointClass {
    if any_term_matches(text, CLINICAL_HARD_TERMS) {
        EndpointClass::ClinicalHard
    } else if any_term_matches(text, CLINICAL_INTERMEDIATE_TERMS) {
        EndpointClass::ClinicalIntermediate
    } else if any_term_matches(text, SURROGATE_BIOMARKER_TERMS) {
        EndpointClass::SurrogateBiomarker
    } else if any_term_matches(text, MECHANISTIC_TERMS) {
        EndpointClass::MechanisticOnly
    } else {
        EndpointClass::Unknown
    }
}

/// Return the subset of aging-hallmark tags mentioned in `text`,
/// deduplicated, in canonical (declaration) order.
pub fn extract_hallmark_tags(text: &str) -> BTreeSet<String> {
    let mut tags = BTreeSet::new();
    for (tag, phrases) in HALLMARK_TAGS {
        if any_term_matches(text, phrases) {
            tags.insert((*tag).to_string());
        }
    }
    tags
}

fn species_mesh_present(mesh_terms: &[String]) -> bool {
    static SPECIES_RE: OnceLock<Regex> = OnceLock::new();
    let re = SPECIES_RE.get_or_init(|| {
        Regex::new(r"(?i)\b(humans?|mice|mouse|rats?|rodents?|murine)\b").expect("valid regex")
    });
    mesh_terms.iter().any(|m| re.is_match(m))
}

fn str_field<'a>(record: &'a Value, key: &str) -> &'a str {
    record.get(key).and_then(Value::as_str).unwrap_or("")
}

fn string_list_field(record: &Value, key: &str) -> Vec<String> {
    record
        .get(key)
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_owned)).collect())
        .unwrap_or_default()
}

/// Classify a raw PubMed-shaped record (spec §4.G1).
///
/// Systematic review / meta-analysis publication types map to level 1,
/// RCT to level 2 (flagged `population_unspecified` when no species MeSH
/// term is present), observational/cohort to level 3, animal/cell study
/// types to level 5, and anything else to level 6.
pub fn classify_pubmed_record(record: &Value) -> StudyRecord {
    let publication_types = string_list_field(record, "publication_types");
    let mesh_terms = string_list_field(record, "mesh_terms");
    let title = str_field(record, "title").to_string();
    let abstract_text = str_field(record, "abstract").to_string();
    let combined_text = format!("{title} {abstract_text}");

    let pub_types_lower: Vec<String> = publication_types.iter().map(|s| s.to_lowercase()).collect();
    let is_systematic_review = pub_types_lower
        .iter()
        .any(|t| t.contains("systematic review") || t.contains("meta-analysis"));
    let is_rct = pub_types_lower.iter().any(|t| t.contains("randomized controlled trial") || t == "rct");
    let is_observational = pub_types_lower
        .iter()
        .any(|t| t.contains("observational") || t.contains("cohort") || t.contains("case-control"));
    let is_animal_or_cell = combined_text.to_lowercase().contains("mouse model")
        || combined_text.to_lowercase().contains("in vitro")
        || combined_text.to_lowercase().contains("cell culture")
        || combined_text.to_lowercase().contains("rodent model");

    let mut quality_flags = BTreeSet::new();
    let (evidence_level, population_class) = if is_systematic_review {
        (EvidenceLevel::SystematicReviewMetaAnalysis, PopulationClass::Human)
    } else if is_rct {
        let has_species = species_mesh_present(&mesh_terms);
        if !has_species {
            quality_flags.insert("population_unspecified".to_string());
        }
        (EvidenceLevel::Rct, PopulationClass::Human)
    } else if is_observational {
        quality_flags.insert("observational_risk_confounding".to_string());
        (EvidenceLevel::ObservationalCohort, PopulationClass::Human)
    } else if is_animal_or_cell {
        (EvidenceLevel::Preclinical, PopulationClass::Animal)
    } else {
        (EvidenceLevel::MechanisticOrOther, PopulationClass::Unknown)
    };

    if mesh_terms.is_empty() && publication_types.is_empty() {
        quality_flags.insert("limited_metadata".to_string());
    }

    let endpoint_class = classify_endpoint_class(&combined_text);
    let hallmark_tags = extract_hallmark_tags(&combined_text);

    let pmid = record.get("pmid").and_then(Value::as_str).map(str::to_owned);
    let study_key = pmid.clone().unwrap_or_else(|| title.clone());

    StudyRecord {
        study_key,
        source: "pubmed".to_string(),
        title,
        year: record.get("year").and_then(Value::as_i64),
        ids: StudyIds { pmid, doi: None, nct: None },
        evidence_level,
        study_type: publication_types.first().cloned().unwrap_or_else(|| "unspecified".to_string()),
        population_class,
        endpoint_class,
        quality_flags,
        directness_flags: BTreeSet::new(),
        effect_direction: None,
        citations: Vec::new(),
        hallmark_tags,
    }
}

/// Classify a raw ClinicalTrials.gov-shaped record (spec §4.G1).
///
/// Interventional studies map to level 2, flagged `not_completed` when
/// status isn't `Completed` and `no_registry_results` when `has_results`
/// is false. Registry-only (non-interventional) records map to level 4.
pub fn classify_trial_record(record: &Value) -> StudyRecord {
    let title = str_field(record, "title").to_string();
    let status = str_field(record, "status").to_string();
    let study_type = str_field(record, "study_type").to_string();
    let has_results = record.get("has_results").and_then(Value::as_bool).unwrap_or(false);
    let nct = record.get("nct_id").and_then(Value::as_str).map(str::to_owned);

    let is_interventional = study_type.eq_ignore_ascii_case("interventional");

    let mut quality_flags = BTreeSet::new();
    let evidence_level = if is_interventional {
        if !status.eq_ignore_ascii_case("completed") {
            quality_flags.insert("not_completed".to_string());
        }
        if !has_results {
            quality_flags.insert("no_registry_results".to_string());
        }
        EvidenceLevel::Rct
    } else {
        EvidenceLevel::RegistryOnly
    };

    let population_class = if is_interventional {
        PopulationClass::Human
    } else {
        PopulationClass::HumanRegistry
    };

    let endpoint_class = classify_endpoint_class(&title);
    let hallmark_tags = extract_hallmark_tags(&title);

    StudyRecord {
        study_key: nct.clone().unwrap_or_else(|| title.clone()),
        source: "clinicaltrials".to_string(),
        title,
        year: None,
        ids: StudyIds { pmid: None, doi: None, nct },
        evidence_level,
        study_type,
        population_class,
        endpoint_class,
        quality_flags,
        directness_flags: BTreeSet::new(),
        effect_direction: None,
        citations: Vec::new(),
        hallmark_tags,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn endpoint_word_boundary_excludes_canada() {
        assert_eq!(classify_endpoint_class("a trial conducted in canada"), EndpointClass::Unknown);
    }

    #[test]
    fn endpoint_matches_nad_as_biomarker() {
        assert_eq!(classify_endpoint_class("NAD levels increased"), EndpointClass::SurrogateBiomarker);
    }

    #[test]
    fn systematic_review_maps_to_level_one() {
        let record = json!({
            "pmid": "10000001",
            "title": "Senescence: a systematic review of outcomes",
            "year": 2022,
            "publication_types": ["Systematic Review"],
            "mesh_terms": ["senescence"],
            "abstract": "This review covers mortality outcomes in humans.",
        });
        let study = classify_pubmed_record(&record);
        assert_eq!(study.evidence_level, EvidenceLevel::SystematicReviewMetaAnalysis);
        assert_eq!(study.endpoint_class, EndpointClass::ClinicalHard);
    }

    #[test]
    fn rct_without_species_mesh_is_population_unspecified() {
        let record = json!({
            "pmid": "10000002",
            "title": "A randomized controlled trial of an intervention",
            "publication_types": ["Randomized Controlled Trial"],
            "mesh_terms": [],
            "abstract": "",
        });
        let study = classify_pubmed_record(&record);
        assert_eq!(study.evidence_level, EvidenceLevel::Rct);
        assert!(study.quality_flags.contains("population_unspecified"));
    }

    #[test]
    fn interventional_not_completed_trial_flags_both() {
        let record = json!({
            "nct_id": "NCT00000001",
            "title": "A trial of an intervention",
            "status": "Recruiting",
            "study_type": "Interventional",
            "has_results": false,
        });
        let study = classify_trial_record(&record);
        assert_eq!(study.evidence_level, EvidenceLevel::Rct);
        assert!(study.quality_flags.contains("not_completed"));
        assert!(study.quality_flags.contains("no_registry_results"));
    }

    #[test]
    fn registry_only_trial_maps_to_level_four() {
        let record = json!({
            "nct_id": "NCT00000002",
            "title": "Registry-only record",
            "status": "Completed",
            "study_type": "Observational",
            "has_results": false,
        });
        let study = classify_trial_record(&record);
        assert_eq!(study.evidence_level, EvidenceLevel::RegistryOnly);
    }

    #[test]
    fn hallmark_tags_deduplicated() {
        let tags = extract_hallmark_tags("senescence and senescent cell burden drive aging");
        assert_eq!(tags.len(), 1);
        assert!(tags.contains("cellular_senescence"));
    }

    #[test]
    fn hallmark_tags_are_word_boundary_safe() {
        // "mtor" is a substring of this unrelated made-up token; it must not
        // trigger the nutrient-sensing tag.
        let tags = extract_hallmark_tags("the xmtorx compound was unrelated to aging");
        assert!(tags.is_empty());

        let tags = extract_hallmark_tags("mTOR signaling was suppressed");
        assert_eq!(tags.len(), 1);
        assert!(tags.contains("deregulated_nutrient_sensing"));
    }
}
