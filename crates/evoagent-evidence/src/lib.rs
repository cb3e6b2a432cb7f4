//! Evidence Scoring Pipeline (spec §4.G).
//!
//! Five pure sub-stages over a query's retrieved records: classify (G1),
//! build a deduplicated ledger (G2), score it (G3), derive a gap map
//! (G4), and render a report (G5). None of these stages performs network
//! I/O or holds state between calls — a ledger fully determines its
//! score, gap map, and report.

pub mod classify;
pub mod gaps;
pub mod ledger;
pub mod model;
pub mod report;
pub mod score;

pub use classify::{classify_endpoint_class, classify_pubmed_record, classify_trial_record, extract_hallmark_tags};
pub use gaps::build_gap_map;
pub use ledger::build_ledger;
pub use model::{
    ConfidenceLabel, EndpointClass, EvidenceLedger, EvidenceLevel, GapMap, PopulationClass,
    ScoreComponent, ScoreComponents, ScoreTrace, StudyIds, StudyRecord,
};
pub use report::{render_json_report, render_markdown_report};
pub use score::grade_hybrid;
