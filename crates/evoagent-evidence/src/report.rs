//! G5 — Report rendering (spec §4.G5).
//!
//! Renders a `(ledger, score, gap_map)` triple into both JSON and
//! Markdown. Neither renderer touches the clock or any other source of
//! non-determinism, so identical inputs always produce identical bytes
//! (spec §8, testable property 8).

use serde::Serialize;

use crate::model::{EvidenceLedger, GapMap, ScoreTrace};

/// The JSON report shape: ledger + score + gap map, nothing else. Field
/// order is fixed by this struct's declaration so two reports built from
/// equal inputs serialize to byte-identical JSON.
#[derive(Debug, Clone, Serialize)]
pub struct JsonReport<'a> {
    pub ledger: &'a EvidenceLedger,
    pub score: &'a ScoreTrace,
    pub gap_map: &'a GapMap,
}

/// Render the JSON report. Pure function of its inputs.
pub fn render_json_report<'a>(
    ledger: &'a EvidenceLedger,
    score: &'a ScoreTrace,
    gap_map: &'a GapMap,
) -> JsonReport<'a> {
    JsonReport { ledger, score, gap_map }
}

/// Render the Markdown report. Section order is fixed: Summary,
/// Confidence, Evidence Table, Gaps, What Would Change The Score.
pub fn render_markdown_report(ledger: &EvidenceLedger, score: &ScoreTrace, gap_map: &GapMap) -> String {
    let mut out = String::new();

    out.push_str("# Evidence Report\n\n");

    // ── Summary ──────────────────────────────────────────────────
    out.push_str("## Summary\n\n");
    out.push_str(&format!(
        "{} record(s) retrieved ({} duplicate(s) merged) across {} source(s).\n\n",
        ledger.records.len(),
        ledger.duplicates_merged,
        ledger.counts_by_source.len(),
    ));

    // ── Confidence ───────────────────────────────────────────────
    out.push_str("## Confidence\n\n");
    out.push_str(&format!(
        "**{:.1}/100** (label {:?})\n\n",
        score.final_confidence, score.label
    ));
    out.push_str(&format!(
        "- Clinical Evidence Subscore (CES): {:.1}/70\n- Mechanistic Plausibility (MP): {:.1}/30\n",
        score.ces, score.mp
    ));
    if !score.bonuses.is_empty() {
        out.push_str("- Bonuses:\n");
        for b in &score.bonuses {
            out.push_str(&format!("  - {}: +{:.2}\n", b.name, b.amount));
        }
    }
    if !score.penalties.is_empty() {
        out.push_str("- Penalties:\n");
        for p in &score.penalties {
            out.push_str(&format!("  - {}: {:.2}\n", p.name, p.amount));
        }
    }
    if !score.caps_applied.is_empty() {
        out.push_str("- Caps applied:\n");
        for cap in &score.caps_applied {
            out.push_str(&format!("  - {cap}\n"));
        }
    }
    out.push('\n');

    // ── Evidence Table ───────────────────────────────────────────
    out.push_str("## Evidence Table\n\n");
    out.push_str("| Level | Study | Year | Population | Endpoint | Flags |\n");
    out.push_str("|---|---|---|---|---|---|\n");
    let mut records: Vec<&crate::model::StudyRecord> = ledger.records.iter().collect();
    records.sort_by(|a, b| a.evidence_level.cmp(&b.evidence_level).then(a.study_key.cmp(&b.study_key)));
    for r in records {
        let flags: Vec<&str> = r.quality_flags.iter().map(String::as_str).collect();
        out.push_str(&format!(
            "| {} | {} | {} | {:?} | {:?} | {} |\n",
            r.evidence_level.as_u8(),
            r.title,
            r.year.map(|y| y.to_string()).unwrap_or_else(|| "—".to_string()),
            r.population_class,
            r.endpoint_class,
            if flags.is_empty() { "—".to_string() } else { flags.join(", ") },
        ));
    }
    out.push('\n');

    // ── Gaps ─────────────────────────────────────────────────────
    out.push_str("## Gaps\n\n");
    if gap_map.missing_levels.is_empty() {
        out.push_str("- No evidence levels are entirely missing.\n");
    } else {
        out.push_str(&format!(
            "- Missing evidence level(s): {}\n",
            gap_map
                .missing_levels
                .iter()
                .map(u8::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        ));
    }
    if gap_map.missing_hard_endpoint {
        out.push_str("- No hard clinical endpoint is represented.\n");
    }
    for signal in &gap_map.mismatch_signals {
        out.push_str(&format!("- {signal}\n"));
    }
    out.push('\n');

    // ── What Would Change The Score ─────────────────────────────
    out.push_str("## What Would Change The Score\n\n");
    if gap_map.next_best_studies.is_empty() {
        out.push_str("- No specific gaps identified; additional corroborating evidence would still raise confidence.\n");
    } else {
        for study in &gap_map.next_best_studies {
            out.push_str(&format!("- {study}\n"));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gaps::build_gap_map;
    use crate::ledger::build_ledger;
    use crate::score::grade_hybrid;
    use evoagent_domain::config::EvidenceConfig;

    #[test]
    fn identical_inputs_render_identical_markdown_and_json() {
        let config = EvidenceConfig::default();
        let ledger = build_ledger(Vec::new());
        let score = grade_hybrid(&config, &ledger);
        let gap_map = build_gap_map(&ledger);

        let md_a = render_markdown_report(&ledger, &score, &gap_map);
        let md_b = render_markdown_report(&ledger, &score, &gap_map);
        assert_eq!(md_a, md_b);

        let json_a = serde_json::to_string(&render_json_report(&ledger, &score, &gap_map)).unwrap();
        let json_b = serde_json::to_string(&render_json_report(&ledger, &score, &gap_map)).unwrap();
        assert_eq!(json_a, json_b);
    }

    #[test]
    fn markdown_sections_appear_in_fixed_order() {
        let config = EvidenceConfig::default();
        let ledger = build_ledger(Vec::new());
        let score = grade_hybrid(&config, &ledger);
        let gap_map = build_gap_map(&ledger);
        let md = render_markdown_report(&ledger, &score, &gap_map);

        let summary = md.find("## Summary").unwrap();
        let confidence = md.find("## Confidence").unwrap();
        let table = md.find("## Evidence Table").unwrap();
        let gaps = md.find("## Gaps").unwrap();
        let what_changes = md.find("## What Would Change The Score").unwrap();
        assert!(summary < confidence && confidence < table && table < gaps && gaps < what_changes);
    }
}
