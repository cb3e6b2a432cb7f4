//! Evidence Pipeline data model (spec §3, Study Record / EvidenceLedger /
//! ScoreTrace).

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Evidence level, closed 1..6 enum (spec §3 Invariant 6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Hash)]
#[repr(u8)]
pub enum EvidenceLevel {
    SystematicReviewMetaAnalysis = 1,
    Rct = 2,
    ObservationalCohort = 3,
    RegistryOnly = 4,
    Preclinical = 5,
    MechanisticOrOther = 6,
}

impl EvidenceLevel {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(Self::SystematicReviewMetaAnalysis),
            2 => Some(Self::Rct),
            3 => Some(Self::ObservationalCohort),
            4 => Some(Self::RegistryOnly),
            5 => Some(Self::Preclinical),
            6 => Some(Self::MechanisticOrOther),
            _ => None,
        }
    }

    pub fn all() -> [EvidenceLevel; 6] {
        [
            Self::SystematicReviewMetaAnalysis,
            Self::Rct,
            Self::ObservationalCohort,
            Self::RegistryOnly,
            Self::Preclinical,
            Self::MechanisticOrOther,
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PopulationClass {
    Human,
    HumanRegistry,
    Animal,
    Cell,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum EndpointClass {
    ClinicalHard,
    ClinicalIntermediate,
    SurrogateBiomarker,
    MechanisticOnly,
    Unknown,
}

/// One classified study, regardless of originating source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudyRecord {
    pub study_key: String,
    pub source: String,
    pub title: String,
    pub year: Option<i64>,
    pub ids: StudyIds,
    pub evidence_level: EvidenceLevel,
    pub study_type: String,
    pub population_class: PopulationClass,
    pub endpoint_class: EndpointClass,
    /// Closed set of quality-flag tags (see `EvidenceConfig::flag_unit_weights`
    /// for the ones that carry a scoring penalty).
    pub quality_flags: BTreeSet<String>,
    pub directness_flags: BTreeSet<String>,
    #[serde(default)]
    pub effect_direction: Option<String>,
    #[serde(default)]
    pub citations: Vec<String>,
    /// Aging-hallmark tags and other free-form metadata.
    #[serde(default)]
    pub hallmark_tags: BTreeSet<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StudyIds {
    #[serde(default)]
    pub pmid: Option<String>,
    #[serde(default)]
    pub doi: Option<String>,
    #[serde(default)]
    pub nct: Option<String>,
}

impl StudyIds {
    /// Identifier keys usable for dedup, in priority order.
    pub fn dedup_keys(&self) -> Vec<String> {
        let mut keys = Vec::new();
        if let Some(doi) = &self.doi {
            keys.push(format!("doi:{}", normalize_id(doi)));
        }
        if let Some(pmid) = &self.pmid {
            keys.push(format!("pmid:{}", normalize_id(pmid)));
        }
        if let Some(nct) = &self.nct {
            keys.push(format!("nct:{}", normalize_id(nct)));
        }
        keys
    }
}

pub fn normalize_id(id: &str) -> String {
    id.trim().to_lowercase()
}

/// Normalized title key used for dedup once no identifier overlap exists.
pub fn normalize_title(title: &str) -> String {
    title
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Union of classified records for a query, plus dedupe stats and coverage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceLedger {
    pub records: Vec<StudyRecord>,
    pub duplicates_merged: usize,
    pub counts_by_level: BTreeMap<u8, usize>,
    pub counts_by_endpoint: BTreeMap<EndpointClass, usize>,
    pub counts_by_source: BTreeMap<String, usize>,
    pub coverage_gaps: Vec<String>,
}

/// One line-item in the score trace: a named, signed contribution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreComponent {
    pub name: String,
    pub amount: f64,
    #[serde(default)]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreTrace {
    /// Clinical Evidence Subscore, 0..=70.
    pub ces: f64,
    /// Mechanistic Plausibility subscore, 0..=30.
    pub mp: f64,
    pub final_confidence: f64,
    pub label: ConfidenceLabel,
    pub penalties: Vec<ScoreComponent>,
    pub bonuses: Vec<ScoreComponent>,
    pub caps_applied: Vec<String>,
    pub components: ScoreComponents,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreComponents {
    pub counts_by_level: BTreeMap<u8, usize>,
    pub flag_counts: BTreeMap<String, usize>,
    pub hallmark_tag_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConfidenceLabel {
    A,
    B,
    C,
    D,
    E,
}

impl ConfidenceLabel {
    pub fn for_score(score: f64) -> Self {
        if score >= 85.0 {
            Self::A
        } else if score >= 70.0 {
            Self::B
        } else if score >= 55.0 {
            Self::C
        } else if score >= 40.0 {
            Self::D
        } else {
            Self::E
        }
    }
}

/// Gap-map output (G4): missing levels, missing hard endpoints, mismatch
/// signals, and suggested next studies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GapMap {
    pub missing_levels: Vec<u8>,
    pub missing_hard_endpoint: bool,
    pub mismatch_signals: Vec<String>,
    pub next_best_studies: Vec<String>,
}
