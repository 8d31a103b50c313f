// Human-readable output for command results.
// JSON output goes through serde directly; this module only handles the
// default text form and the ledger CSV.

use std::io::{self, Write};

use geoquiz_pipeline::{ApplySummary, CycleSummary, GapRegistration, ResyncSummary, SeedSummary, SuggestSummary};
use geoquiz_store::{DisputeReview, GapReview, LedgerEntry};

pub fn seed(s: &SeedSummary) -> String {
    if !s.seeded {
        return format!("store already holds {} countries; nothing to seed\n", s.existing);
    }
    let mut out = String::new();
    out.push_str(&format!("seeded:    {} countries ({} failed)\n", s.inserted, s.failed));
    out.push_str(&format!("sources:   {}\n", join_counts(&s.per_source)));
    out.push_str(&format!("merged:    {} field(s)/record(s) backfilled\n", s.copied));
    out.push_str(&gaps(&s.gaps));
    out
}

pub fn resync(s: &ResyncSummary) -> String {
    let mut out = String::new();
    if let Some(taken_at) = s.taken_at {
        out.push_str(&format!("snapshot:  {} countries at {}\n", s.countries, taken_at.to_rfc3339()));
    }
    out.push_str(&format!("sources:   {}\n", join_counts(&s.per_source)));
    out.push_str(&format!("merged:    {} field(s)/record(s) backfilled\n", s.copied));
    out.push_str(&gaps(&s.gaps));
    out.push_str(&format!(
        "pruned:    {} source row(s), {} record(s)\n",
        s.pruned_sources, s.pruned_records
    ));
    out.push_str(&format!(
        "records:   {} inserted, {} updated ({} fields), {} unchanged, {} stale\n",
        s.inserted, s.updated, s.fields_changed, s.unchanged, s.stale
    ));
    out.push_str(&apply(&s.applied));
    if s.gaps_closed > 0 {
        out.push_str(&format!("closed:    {} open gap(s) filled by the source\n", s.gaps_closed));
    }
    out.push_str(&format!("entities:  {} succeeded, {} failed\n", s.succeeded, s.failed));
    out
}

pub fn apply(s: &ApplySummary) -> String {
    let mut out = format!("applied:   {} review(s)", s.applied);
    let skipped = [
        (s.unmapped, "unmapped"),
        (s.missing_record, "without record"),
        (s.already_applied, "already applied"),
        (s.failed, "failed"),
    ];
    let notes: Vec<String> = skipped
        .iter()
        .filter(|(n, _)| *n > 0)
        .map(|(n, what)| format!("{n} {what}"))
        .collect();
    if !notes.is_empty() {
        out.push_str(&format!(" ({})", notes.join(", ")));
    }
    out.push('\n');
    out
}

pub fn suggest(s: &SuggestSummary) -> String {
    format!(
        "suggest {:<8} {} considered, {} suggested, {} without template, {} failed\n",
        format!("{}:", s.kind),
        s.considered,
        s.suggested,
        s.no_template,
        s.failed
    )
}

pub fn cycle(s: &CycleSummary) -> String {
    let mut out = String::new();
    match (&s.disputes, &s.gaps) {
        (Some(d), Some(g)) => {
            out.push_str(&suggest(d));
            out.push_str(&suggest(g));
        }
        _ => out.push_str("suggest:   skipped (AI not configured)\n"),
    }
    out.push_str(&resync(&s.resync));
    out
}

fn gaps(g: &GapRegistration) -> String {
    let mut out = format!("gaps:      {} missing, {} newly queued\n", g.detected, g.registered);
    for (key, n) in &g.by_field {
        out.push_str(&format!("           {:<24} {}\n", key.json_key(), n));
    }
    out
}

fn join_counts(counts: &[usize]) -> String {
    counts.iter().map(|n| n.to_string()).collect::<Vec<_>>().join(" + ")
}

// ============================================================================
// Review listings
// ============================================================================

pub fn gap_table(gaps: &[GapReview]) -> String {
    if gaps.is_empty() {
        return "no gap reviews\n".to_string();
    }
    let mut out = format!(
        "{:>5}  {:<24} {:<24} {:<10} {:<8} {}\n",
        "ID", "COUNTRY", "FIELD", "DECISION", "APPLIED", "CURRENT -> SUGGESTED"
    );
    for g in gaps {
        out.push_str(&format!(
            "{:>5}  {:<24} {:<24} {:<10} {:<8} {} -> {}\n",
            g.id,
            truncate(&g.label, 24),
            g.field_key,
            decision(&g.decision),
            if g.applied { "yes" } else { "no" },
            quoted(&g.current_value),
            quoted(&g.suggested_value),
        ));
    }
    out
}

pub fn dispute_table(disputes: &[DisputeReview]) -> String {
    if disputes.is_empty() {
        return "no dispute reviews\n".to_string();
    }
    let mut out = String::new();
    for d in disputes {
        out.push_str(&format!(
            "#{} {} [{}{}] reported by {}\n",
            d.id,
            d.label,
            decision(&d.decision),
            if d.applied { ", applied" } else { "" },
            d.reporter
        ));
        out.push_str(&format!("    question:  {}\n", d.question));
        out.push_str(&format!("    answer:    {}\n", quoted(&d.correct_answer)));
        out.push_str(&format!("    suggested: {}\n", quoted(&d.suggested_value)));
    }
    out
}

fn decision(d: &geoquiz_store::Decision) -> &'static str {
    match d {
        geoquiz_store::Decision::Pending => "pending",
        geoquiz_store::Decision::Approved => "approved",
        geoquiz_store::Decision::Bypassed => "bypassed",
    }
}

fn quoted(value: &str) -> String {
    if value.is_empty() {
        "(empty)".to_string()
    } else {
        format!("{:?}", value)
    }
}

fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        s.to_string()
    } else {
        let mut t: String = s.chars().take(width.saturating_sub(1)).collect();
        t.push('…');
        t
    }
}

// ============================================================================
// Ledger
// ============================================================================

pub fn ledger_table(entries: &[LedgerEntry]) -> String {
    if entries.is_empty() {
        return "ledger is empty\n".to_string();
    }
    let mut out = String::new();
    for e in entries {
        let field = if e.field_key.is_empty() { "*" } else { e.field_key.as_str() };
        out.push_str(&format!(
            "{:>6}  {}  {:<22} {:<20} {:<24} {} -> {}\n",
            e.id,
            e.recorded_at.format("%Y-%m-%d %H:%M:%S"),
            e.origin,
            truncate(&e.label, 20),
            field,
            quoted(&truncate(&e.old_value, 60)),
            quoted(&truncate(&e.new_value, 60)),
        ));
    }
    out
}

pub fn ledger_csv<W: Write>(entries: &[LedgerEntry], out: W) -> io::Result<()> {
    let mut wtr = csv::Writer::from_writer(out);
    for entry in entries {
        wtr.serialize(entry).map_err(io::Error::other)?;
    }
    if entries.is_empty() {
        wtr.write_record(["id", "origin", "label", "field_key", "old_value", "new_value", "recorded_at"])
            .map_err(io::Error::other)?;
    }
    wtr.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn entry(id: i64, field_key: &str) -> LedgerEntry {
        LedgerEntry {
            id,
            origin: "seed".to_string(),
            label: "Norway".to_string(),
            field_key: field_key.to_string(),
            old_value: String::new(),
            new_value: "Oslo".to_string(),
            recorded_at: Utc.with_ymd_and_hms(2026, 4, 1, 1, 0, 0).unwrap(),
        }
    }

    #[test]
    fn ledger_csv_has_header_and_rows() {
        let mut buf = Vec::new();
        ledger_csv(&[entry(1, "capital_label")], &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("id,origin,label,field_key,old_value,new_value,recorded_at")
        );
        assert!(lines.next().unwrap().starts_with("1,seed,Norway,capital_label,,Oslo,2026-04-01T01:00:00"));
    }

    #[test]
    fn empty_ledger_csv_still_has_header() {
        let mut buf = Vec::new();
        ledger_csv(&[], &mut buf).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap().lines().count(), 1);
    }

    #[test]
    fn record_level_entries_show_star() {
        let table = ledger_table(&[entry(7, "")]);
        assert!(table.contains(" * "), "{table}");
    }

    #[test]
    fn apply_line_lists_only_nonzero_skips() {
        let line = apply(&ApplySummary {
            applied: 2,
            missing_record: 1,
            ..ApplySummary::default()
        });
        assert_eq!(line, "applied:   2 review(s) (1 without record)\n");
    }
}
