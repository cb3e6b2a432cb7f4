use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Retunable knobs for the Evidence Scoring Pipeline (spec §4.G3). The
/// defaults reproduce the constants named in the spec exactly; operators
/// may override them without a recompile, the same way the teacher
/// externalizes `ModelPricing` per model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceConfig {
    /// Base points per evidence level (1..=6), spec §4.G3.
    #[serde(default = "d_level_points")]
    pub level_points: HashMap<u8, f64>,
    /// Unit penalty weight per quality flag, spec §4.G3.
    #[serde(default = "d_flag_weights")]
    pub flag_unit_weights: HashMap<String, f64>,
    /// Maximum multiple of a flag's unit weight that can be charged.
    #[serde(default = "d_penalty_cap_multiple")]
    pub penalty_cap_multiple: f64,
}

impl Default for EvidenceConfig {
    fn default() -> Self {
        Self {
            level_points: d_level_points(),
            flag_unit_weights: d_flag_weights(),
            penalty_cap_multiple: d_penalty_cap_multiple(),
        }
    }
}

fn d_level_points() -> HashMap<u8, f64> {
    HashMap::from([
        (1, 40.0),
        (2, 28.0),
        (3, 16.0),
        (4, 8.0),
        (5, 4.0),
        (6, 2.0),
    ])
}

fn d_flag_weights() -> HashMap<String, f64> {
    HashMap::from([
        ("limited_metadata".to_string(), 1.5),
        ("population_unspecified".to_string(), 1.5),
        ("observational_risk_confounding".to_string(), 1.5),
        ("preclinical_translation_risk".to_string(), 1.0),
        ("small_n_or_unknown".to_string(), 2.0),
        ("not_completed".to_string(), 2.0),
        ("no_registry_results".to_string(), 1.5),
    ])
}

fn d_penalty_cap_multiple() -> f64 {
    4.0
}
