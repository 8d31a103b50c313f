use std::collections::BTreeSet;

use chrono::{DateTime, Duration, TimeZone, Utc};
use geoquiz_core::{CountryRecord, FieldKey, RawBinding, NO_FLAG};
use geoquiz_recon::{build_snapshot, detect_gaps, diff_record, orphaned, vanished, RecordPlan};

fn at(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 5, 1, hour, 0, 0).unwrap()
}

fn row(pairs: &[(&str, &str)]) -> RawBinding {
    pairs
        .iter()
        .fold(RawBinding::new(), |b, (k, v)| b.with(k, v))
}

// -------------------------------------------------------------------------
// Snapshot building
// -------------------------------------------------------------------------

#[test]
fn secondary_backfills_primary_gap() {
    let wikidata = vec![row(&[("country_label", "Norway"), ("capital_label", "")])];
    let dbpedia = vec![row(&[("country_label", "Norway"), ("capital_label", "Oslo")])];

    let build = build_snapshot(&[wikidata, dbpedia], at(0));
    let norway = &build.snapshot.countries[0];
    assert_eq!(norway.value(FieldKey::Capital), "Oslo");
    assert_eq!(norway.value(FieldKey::Flag), NO_FLAG);
    assert_eq!(build.copied, 1);
}

#[test]
fn primary_multi_value_survives_merge() {
    let wikidata = vec![
        row(&[("country_label", "Bolivia"), ("capital_label", "Sucre")]),
        row(&[("country_label", "Bolivia"), ("capital_label", "La Paz")]),
    ];
    let dbpedia = vec![
        row(&[("country_label", "Bolivia"), ("capital_label", "La Paz")]),
        row(&[("country_label", "Atlantis"), ("capital_label", "Poseidonia")]),
    ];

    let build = build_snapshot(&[wikidata, dbpedia], at(0));
    let labels: Vec<_> = build.snapshot.countries.iter().map(|c| c.label.as_str()).collect();
    assert_eq!(labels, ["Bolivia", "Atlantis"]);
    assert_eq!(build.snapshot.countries[0].value(FieldKey::Capital), "Sucre or La Paz");
    assert_eq!(build.per_source, [1, 2]);
}

// -------------------------------------------------------------------------
// Gap detection
// -------------------------------------------------------------------------

#[test]
fn gaps_are_identical_across_reruns() {
    let rows = vec![
        row(&[("country_label", "Chad"), ("capital_label", "N'Djamena")]),
        row(&[("country_label", "Peru"), ("flag_image", "https://example.org/pe.svg")]),
    ];
    let first = detect_gaps(&build_snapshot(&[rows.clone()], at(0)).snapshot.countries);
    let second = detect_gaps(&build_snapshot(&[rows], at(5)).snapshot.countries);
    assert_eq!(first, second);
    assert!(first.iter().any(|g| g.label == "Chad" && g.key == FieldKey::Flag && g.current_value == NO_FLAG));
    assert!(!first.iter().any(|g| g.label == "Peru" && g.key == FieldKey::Flag));
}

// -------------------------------------------------------------------------
// Resync planning
// -------------------------------------------------------------------------

#[test]
fn resync_plan_over_stored_records() {
    let first = build_snapshot(
        &[vec![
            row(&[("country_label", "Norway"), ("capital_label", "Bergen")]),
            row(&[("country_label", "Yugoslavia"), ("capital_label", "Belgrade")]),
        ]],
        at(0),
    );
    let stored: Vec<CountryRecord> = first
        .snapshot
        .countries
        .iter()
        .map(|f| CountryRecord::from_facts(f, first.snapshot.taken_at))
        .collect();

    let second = build_snapshot(
        &[vec![row(&[("country_label", "Norway"), ("capital_label", "Oslo")])]],
        first.snapshot.taken_at + Duration::hours(1),
    );

    let known: BTreeSet<String> = stored.iter().map(|r| r.label.clone()).collect();
    assert_eq!(vanished(&known, &second.snapshot.labels()), ["Yugoslavia"]);
    assert_eq!(orphaned(&known, &second.snapshot.labels()), ["Yugoslavia"]);

    let norway = &second.snapshot.countries[0];
    match diff_record(Some(&stored[0]), norway, second.snapshot.taken_at) {
        RecordPlan::Update(changes) => {
            assert_eq!(changes.len(), 1);
            assert_eq!(changes[0].old_value, "Bergen");
            assert_eq!(changes[0].new_value, "Oslo");
        }
        other => panic!("expected update, got {other:?}"),
    }

    // Same snapshot replayed at the stored timestamp is stale.
    assert_eq!(
        diff_record(Some(&stored[0]), norway, first.snapshot.taken_at),
        RecordPlan::Stale { skipped: 1 }
    );
}
