// Pipeline runs against an in-memory store with scripted sources and a
// scripted completion service.
// Run with: cargo test -p geoquiz-pipeline --test end_to_end

use std::cell::Cell;

use chrono::{DateTime, TimeZone, Utc};
use geoquiz_ai_client::{AiError, CompletionService};
use geoquiz_core::{FieldKey, RawBinding, NO_FLAG};
use geoquiz_pipeline::{
    apply_approved, approve, bypass, cycle, report_question, seed, suggest_disputes, suggest_gaps, PipelineError,
    Reconciler,
};
use geoquiz_sparql_client::{SourceClient, SourceError};
use geoquiz_store::{Decision, NewDispute, ReviewKind, Store};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

fn at(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 4, 1, hour, 0, 0).unwrap()
}

struct Fixed {
    name: &'static str,
    rows: Vec<RawBinding>,
}

impl SourceClient for Fixed {
    fn name(&self) -> &str {
        self.name
    }

    fn fetch(&self) -> Result<Vec<RawBinding>, SourceError> {
        Ok(self.rows.clone())
    }
}

struct Down;

impl SourceClient for Down {
    fn name(&self) -> &str {
        "dbpedia"
    }

    fn fetch(&self) -> Result<Vec<RawBinding>, SourceError> {
        Err(SourceError::Http {
            source: "dbpedia".into(),
            status: 503,
            message: "upstream error after 4 attempts".into(),
        })
    }
}

fn row(label: &str, fields: &[(FieldKey, &str)]) -> RawBinding {
    fields
        .iter()
        .fold(RawBinding::new().with("country_label", label), |b, (k, v)| b.with(k.json_key(), v))
}

fn source(name: &'static str, rows: Vec<RawBinding>) -> Box<dyn SourceClient> {
    Box::new(Fixed { name, rows })
}

/// Answers by keyword found in the prompt; anything else fails.
struct Scripted {
    answers: Vec<(&'static str, &'static str)>,
    calls: Cell<usize>,
}

impl Scripted {
    fn new(answers: &[(&'static str, &'static str)]) -> Self {
        Self {
            answers: answers.to_vec(),
            calls: Cell::new(0),
        }
    }
}

impl CompletionService for Scripted {
    fn complete(&self, prompt: &str) -> Result<String, AiError> {
        self.calls.set(self.calls.get() + 1);
        self.answers
            .iter()
            .find(|(needle, _)| prompt.contains(needle))
            .map(|(_, answer)| answer.to_string())
            .ok_or(AiError::ApiError {
                status: 500,
                message: "scripted failure".into(),
            })
    }
}

fn seeded(rows: Vec<RawBinding>) -> Store {
    let store = Store::open_in_memory().unwrap();
    let summary = seed(&store, &[source("wikidata", rows)], at(1)).unwrap();
    assert!(summary.seeded);
    store
}

fn gap_id(store: &Store, label: &str, key: FieldKey) -> i64 {
    store
        .list_gaps()
        .unwrap()
        .into_iter()
        .find(|g| g.label == label && g.key() == Some(key))
        .map(|g| g.id)
        .unwrap_or_else(|| panic!("no gap for {label}.{key}"))
}

// ---------------------------------------------------------------------------
// Seed and merge
// ---------------------------------------------------------------------------

#[test]
fn secondary_source_backfills_primary_gap() {
    let store = Store::open_in_memory().unwrap();
    let sources = vec![
        source("wikidata", vec![row("Norway", &[(FieldKey::Currency, "Norwegian krone")])]),
        source("dbpedia", vec![row("Norway", &[(FieldKey::Capital, "Oslo")])]),
    ];

    let summary = seed(&store, &sources, at(1)).unwrap();
    assert_eq!(summary.inserted, 1);
    assert_eq!(summary.per_source, [1, 1]);
    assert_eq!(summary.copied, 1);

    let norway = store.get_record("Norway").unwrap().unwrap();
    assert_eq!(norway.value(FieldKey::Capital), "Oslo");
    assert_eq!(norway.value(FieldKey::Currency), "Norwegian krone");

    let ledger = store.ledger(Some("Norway")).unwrap();
    assert!(ledger.iter().any(|e| {
        (e.label.as_str(), e.field_key.as_str(), e.old_value.as_str(), e.new_value.as_str())
            == ("Norway", "capital_label", "", "Oslo")
    }));
    assert_eq!(store.tracked_labels().unwrap().len(), 1);
}

#[test]
fn primary_value_wins_over_secondary() {
    let store = Store::open_in_memory().unwrap();
    let sources = vec![
        source("wikidata", vec![row("Norway", &[(FieldKey::Capital, "Oslo")])]),
        source("dbpedia", vec![row("Norway", &[(FieldKey::Capital, "Other")])]),
    ];
    seed(&store, &sources, at(1)).unwrap();
    assert_eq!(store.get_record("Norway").unwrap().unwrap().value(FieldKey::Capital), "Oslo");
}

#[test]
fn seed_leaves_populated_store_alone() {
    let store = seeded(vec![row("Peru", &[(FieldKey::Capital, "Lima")])]);
    let again = seed(&store, &[source("wikidata", vec![row("Chad", &[])])], at(2)).unwrap();
    assert!(!again.seeded);
    assert_eq!(again.existing, 1);
    assert!(store.get_record("Chad").unwrap().is_none());
}

// ---------------------------------------------------------------------------
// Gaps
// ---------------------------------------------------------------------------

#[test]
fn gap_registration_is_stable_across_runs() {
    let rows = vec![row("Peru", &[(FieldKey::Capital, "Lima")])];
    let store = seeded(rows.clone());
    let first = store.list_gaps().unwrap();
    assert_eq!(first.len(), FieldKey::TRACKED.len() - 1);
    assert!(first.iter().any(|g| g.key() == Some(FieldKey::Flag) && g.current_value == NO_FLAG));

    let sources = [source("wikidata", rows)];
    let summary = Reconciler::new(&store, &sources).resync(at(2)).unwrap();
    assert_eq!(summary.gaps.registered, 0);
    Reconciler::new(&store, &sources).resync(at(3)).unwrap();

    assert_eq!(store.list_gaps().unwrap(), first);
}

#[test]
fn resync_closes_gap_the_source_now_fills() {
    let store = seeded(vec![row("Peru", &[])]);
    let id = gap_id(&store, "Peru", FieldKey::Capital);

    let sources = [source("wikidata", vec![row("Peru", &[(FieldKey::Capital, "Lima")])])];
    let summary = Reconciler::new(&store, &sources).resync(at(2)).unwrap();
    assert_eq!(summary.updated, 1);
    assert_eq!(summary.gaps_closed, 1);

    let gap = store.get_gap(id).unwrap().unwrap();
    assert!(gap.applied);
    assert!(gap.suggested_value.is_empty());
    assert_eq!(store.get_record("Peru").unwrap().unwrap().value(FieldKey::Capital), "Lima");
}

// ---------------------------------------------------------------------------
// Resync diff and prune
// ---------------------------------------------------------------------------

#[test]
fn newer_snapshot_updates_field_with_ledger_entry() {
    let store = seeded(vec![row("Norway", &[(FieldKey::Capital, "Oslo")])]);
    let sources = [source("wikidata", vec![row("Norway", &[(FieldKey::Capital, "Bergen")])])];

    let summary = Reconciler::new(&store, &sources).resync(at(2)).unwrap();
    assert_eq!(summary.fields_changed, 1);
    assert_eq!(summary.failed, 0);

    let norway = store.get_record("Norway").unwrap().unwrap();
    assert_eq!(norway.value(FieldKey::Capital), "Bergen");
    assert_eq!(norway.updated_at, at(2));

    let updates: Vec<_> = store
        .ledger(Some("Norway"))
        .unwrap()
        .into_iter()
        .filter(|e| e.origin == "resync:data_updated")
        .collect();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].old_value, "Oslo");
    assert_eq!(updates[0].new_value, "Bergen");
}

#[test]
fn every_changed_field_gets_its_own_ledger_entry() {
    let store = seeded(vec![row(
        "Norway",
        &[(FieldKey::Capital, "Oslo"), (FieldKey::Currency, "Norwegian krone")],
    )]);
    let sources = [source(
        "wikidata",
        vec![row("Norway", &[(FieldKey::Capital, "Bergen"), (FieldKey::Currency, "Krone")])],
    )];

    let summary = Reconciler::new(&store, &sources).resync(at(2)).unwrap();
    assert_eq!(summary.updated, 1);
    assert_eq!(summary.fields_changed, 2);

    let mut updates: Vec<_> = store
        .ledger(Some("Norway"))
        .unwrap()
        .into_iter()
        .filter(|e| e.origin == "resync:data_updated")
        .map(|e| (e.field_key, e.old_value, e.new_value))
        .collect();
    updates.sort();
    assert_eq!(
        updates,
        [
            ("capital_label".to_string(), "Oslo".to_string(), "Bergen".to_string()),
            ("currency_label".to_string(), "Norwegian krone".to_string(), "Krone".to_string()),
        ]
    );
}

#[test]
fn approved_gap_does_not_hold_back_live_changes() {
    let store = seeded(vec![row("Peru", &[(FieldKey::Currency, "Sol")])]);
    let id = gap_id(&store, "Peru", FieldKey::Capital);
    suggest_gaps(&store, &Scripted::new(&[("capital of (the) Peru", "Lima")])).unwrap();
    approve(&store, ReviewKind::Gap, id).unwrap();

    let sources = [source("wikidata", vec![row("Peru", &[(FieldKey::Currency, "Nuevo Sol")])])];
    let summary = Reconciler::new(&store, &sources).resync(at(2)).unwrap();
    assert_eq!(summary.stale, 0);
    assert_eq!(summary.updated, 1);
    assert_eq!(summary.applied.applied, 1);

    let peru = store.get_record("Peru").unwrap().unwrap();
    assert_eq!(peru.value(FieldKey::Currency), "Nuevo Sol");
    assert_eq!(peru.value(FieldKey::Capital), "Lima");
}

#[test]
fn live_value_supersedes_approved_suggestion_for_same_field() {
    let store = seeded(vec![row("Peru", &[])]);
    let id = gap_id(&store, "Peru", FieldKey::Capital);
    suggest_gaps(&store, &Scripted::new(&[("capital of (the) Peru", "Cusco")])).unwrap();
    approve(&store, ReviewKind::Gap, id).unwrap();

    let sources = [source("wikidata", vec![row("Peru", &[(FieldKey::Capital, "Lima")])])];
    let summary = Reconciler::new(&store, &sources).resync(at(2)).unwrap();
    assert_eq!(summary.gaps_closed, 1);
    assert_eq!(summary.applied.applied, 0);

    assert_eq!(store.get_record("Peru").unwrap().unwrap().value(FieldKey::Capital), "Lima");
    assert!(store.get_gap(id).unwrap().unwrap().applied);
    assert!(!store
        .ledger(Some("Peru"))
        .unwrap()
        .iter()
        .any(|e| e.origin == "apply_gap_review"));
}

#[test]
fn equal_or_older_snapshot_never_overwrites() {
    let store = seeded(vec![row("Norway", &[(FieldKey::Capital, "Oslo")])]);
    let sources = [source("wikidata", vec![row("Norway", &[(FieldKey::Capital, "Bergen")])])];

    for when in [at(1), at(0)] {
        let summary = Reconciler::new(&store, &sources).resync(when).unwrap();
        assert_eq!(summary.stale, 1);
        assert_eq!(summary.fields_changed, 0);
    }
    let norway = store.get_record("Norway").unwrap().unwrap();
    assert_eq!(norway.value(FieldKey::Capital), "Oslo");
    assert_eq!(norway.updated_at, at(1));
}

#[test]
fn placeholder_never_replaces_known_value() {
    let store = seeded(vec![row("Norway", &[(FieldKey::Flag, "https://example.org/no.svg")])]);
    let sources = [source("wikidata", vec![row("Norway", &[(FieldKey::Flag, NO_FLAG)])])];

    let summary = Reconciler::new(&store, &sources).resync(at(2)).unwrap();
    assert_eq!(summary.unchanged, 1);
    assert_eq!(
        store.get_record("Norway").unwrap().unwrap().value(FieldKey::Flag),
        "https://example.org/no.svg"
    );
}

#[test]
fn vanished_country_is_pruned_from_both_tables() {
    let store = seeded(vec![row("Norway", &[]), row("Peru", &[])]);
    let sources = [source("wikidata", vec![row("Norway", &[])])];

    let summary = Reconciler::new(&store, &sources).resync(at(2)).unwrap();
    assert_eq!(summary.pruned_sources, 1);
    assert_eq!(summary.pruned_records, 1);

    assert!(store.get_record("Peru").unwrap().is_none());
    assert!(!store.tracked_labels().unwrap().contains("Peru"));

    let peru = store.ledger(Some("Peru")).unwrap();
    let count = |origin: &str| peru.iter().filter(|e| e.origin == origin).count();
    assert_eq!(count("resync:source_removed"), 1);
    assert_eq!(count("resync:quiz_removed"), 1);
}

#[test]
fn new_country_gets_one_ledger_entry_per_field() {
    let store = seeded(vec![row("Norway", &[])]);
    let sources = [source(
        "wikidata",
        vec![row("Norway", &[]), row("Chad", &[(FieldKey::Capital, "N'Djamena")])],
    )];

    let summary = Reconciler::new(&store, &sources).resync(at(2)).unwrap();
    assert_eq!(summary.inserted, 1);

    let chad = store.ledger(Some("Chad")).unwrap();
    assert_eq!(chad.len(), FieldKey::ALL.len());
    assert!(chad.iter().all(|e| e.origin == "resync:new_country"));
    assert!(store.tracked_labels().unwrap().contains("Chad"));
}

#[test]
fn failed_fetch_aborts_before_any_mutation() {
    let store = seeded(vec![row("Norway", &[]), row("Peru", &[])]);
    let ledger_before = store.ledger(None).unwrap().len();

    let sources = [source("wikidata", vec![row("Norway", &[])]), Box::new(Down) as Box<dyn SourceClient>];
    let err = Reconciler::new(&store, &sources).resync(at(2)).unwrap_err();
    assert!(matches!(err, PipelineError::Source(SourceError::Http { status: 503, .. })), "{err}");

    assert!(store.get_record("Peru").unwrap().is_some());
    assert_eq!(store.ledger(None).unwrap().len(), ledger_before);
}

#[test]
fn empty_snapshot_is_refused() {
    let store = seeded(vec![row("Norway", &[])]);
    let sources = [source("wikidata", vec![])];
    let err = Reconciler::new(&store, &sources).resync(at(2)).unwrap_err();
    assert!(matches!(err, PipelineError::EmptySnapshot));
    assert_eq!(store.count_records().unwrap(), 1);
}

// ---------------------------------------------------------------------------
// Suggest, review, apply
// ---------------------------------------------------------------------------

#[test]
fn gap_is_suggested_approved_and_applied_once() {
    let store = seeded(vec![row("Peru", &[])]);
    let id = gap_id(&store, "Peru", FieldKey::Capital);

    let ai = Scripted::new(&[("capital of (the) Peru", "Lima")]);
    let summary = suggest_gaps(&store, &ai).unwrap();
    assert_eq!(summary.suggested, 1);
    assert_eq!(summary.failed, FieldKey::TRACKED.len() - 1);

    approve(&store, ReviewKind::Gap, id).unwrap();
    let first = apply_approved(&store, at(2)).unwrap();
    let second = apply_approved(&store, at(3)).unwrap();
    assert_eq!(first.applied, 1);
    assert_eq!(second.applied, 0);

    let peru = store.get_record("Peru").unwrap().unwrap();
    assert_eq!(peru.value(FieldKey::Capital), "Lima");
    assert_eq!(peru.updated_at, at(2));

    let applied: Vec<_> = store
        .ledger(Some("Peru"))
        .unwrap()
        .into_iter()
        .filter(|e| e.origin == "apply_gap_review")
        .collect();
    assert_eq!(applied.len(), 1);
    assert_eq!((applied[0].old_value.as_str(), applied[0].new_value.as_str()), ("", "Lima"));
}

#[test]
fn dispute_flow_writes_suggested_answer() {
    let store = seeded(vec![row("Peru", &[(FieldKey::Capital, "Cusco")])]);
    let id = report_question(
        &store,
        &NewDispute {
            reporter: "ana".into(),
            question: "What is the Capital of Peru?".into(),
            label: "Peru".into(),
            correct_answer: "Cusco".into(),
        },
        at(2),
    )
    .unwrap();

    let ai = Scripted::new(&[("capital of (the) Peru", "  Lima ")]);
    let summary = suggest_disputes(&store, &ai).unwrap();
    assert_eq!(summary.suggested, 1);
    assert_eq!(store.get_dispute(id).unwrap().unwrap().suggested_value, "Lima");

    approve(&store, ReviewKind::Dispute, id).unwrap();
    assert_eq!(apply_approved(&store, at(3)).unwrap().applied, 1);

    let entry = store
        .ledger(Some("Peru"))
        .unwrap()
        .into_iter()
        .find(|e| e.origin == "apply_dispute_review")
        .unwrap();
    assert_eq!(entry.field_key, "capital_label");
    assert_eq!(entry.old_value, "Cusco");
    assert!(store.get_dispute(id).unwrap().unwrap().applied);
}

#[test]
fn question_without_template_stays_pending() {
    let store = seeded(vec![row("Peru", &[])]);
    let id = report_question(
        &store,
        &NewDispute {
            reporter: "ana".into(),
            question: "Which team won the last world cup?".into(),
            label: "Peru".into(),
            correct_answer: "Peru".into(),
        },
        at(2),
    )
    .unwrap();

    let ai = Scripted::new(&[]);
    let summary = suggest_disputes(&store, &ai).unwrap();
    assert_eq!(summary.no_template, 1);
    assert_eq!(ai.calls.get(), 0);

    let err = approve(&store, ReviewKind::Dispute, id).unwrap_err();
    match err {
        PipelineError::InvalidTransition { reason, .. } => assert!(reason.contains("no suggestion")),
        other => panic!("expected InvalidTransition, got {other}"),
    }
}

#[test]
fn failed_suggestion_is_retried_and_filled_items_are_not_asked_again() {
    let store = seeded(vec![row("Peru", &[(FieldKey::Capital, "Lima")])]);
    let failing = Scripted::new(&[]);
    let first = suggest_gaps(&store, &failing).unwrap();
    assert_eq!(first.failed, first.considered);
    assert_eq!(store.gaps_needing_suggestion().unwrap().len(), first.considered);

    let ok = Scripted::new(&[("Peru", "answer")]);
    let second = suggest_gaps(&store, &ok).unwrap();
    assert_eq!(second.suggested, first.considered);

    let third = suggest_gaps(&store, &ok).unwrap();
    assert_eq!(third.considered, 0);
    assert_eq!(ok.calls.get(), first.considered);
}

#[test]
fn bypass_is_terminal() {
    let store = seeded(vec![row("Peru", &[])]);
    let id = gap_id(&store, "Peru", FieldKey::Currency);
    suggest_gaps(&store, &Scripted::new(&[("currency of (the) Peru", "Sol")])).unwrap();

    bypass(&store, ReviewKind::Gap, id).unwrap();
    assert!(matches!(
        approve(&store, ReviewKind::Gap, id),
        Err(PipelineError::InvalidTransition { .. })
    ));
    assert_eq!(apply_approved(&store, at(2)).unwrap().applied, 0);

    let gap = store.get_gap(id).unwrap().unwrap();
    assert_eq!(gap.decision, Decision::Bypassed);
    assert_eq!(store.get_record("Peru").unwrap().unwrap().value(FieldKey::Currency), "");
}

#[test]
fn bypassed_gap_is_not_queued_again() {
    let store = seeded(vec![row("Peru", &[])]);
    let id = gap_id(&store, "Peru", FieldKey::Capital);
    bypass(&store, ReviewKind::Gap, id).unwrap();
    let before = store.list_gaps().unwrap().len();

    let sources = [source("wikidata", vec![row("Peru", &[])])];
    let summary = Reconciler::new(&store, &sources).resync(at(2)).unwrap();
    assert_eq!(summary.gaps.registered, 0);
    assert_eq!(store.list_gaps().unwrap().len(), before);
    assert_eq!(store.get_gap(id).unwrap().unwrap().decision, Decision::Bypassed);
}

#[test]
fn unknown_review_is_reported() {
    let store = Store::open_in_memory().unwrap();
    assert!(matches!(
        approve(&store, ReviewKind::Gap, 42),
        Err(PipelineError::ReviewNotFound { id: 42, .. })
    ));
}

#[test]
fn missing_record_leaves_item_unapplied() {
    let store = Store::open_in_memory().unwrap();
    let uow = store.begin().unwrap();
    uow.insert_gap_if_absent("Atlantis", FieldKey::Capital, "", at(1)).unwrap();
    uow.commit().unwrap();
    let id = gap_id(&store, "Atlantis", FieldKey::Capital);

    suggest_gaps(&store, &Scripted::new(&[("Atlantis", "Poseidonis")])).unwrap();
    approve(&store, ReviewKind::Gap, id).unwrap();

    let summary = apply_approved(&store, at(2)).unwrap();
    assert_eq!(summary.missing_record, 1);
    assert_eq!(store.approved_unapplied_gaps().unwrap().len(), 1);
}

#[test]
fn report_requires_label_and_question() {
    let store = Store::open_in_memory().unwrap();
    let err = report_question(
        &store,
        &NewDispute {
            reporter: "ana".into(),
            question: "What is the capital?".into(),
            label: " ".into(),
            correct_answer: String::new(),
        },
        at(1),
    )
    .unwrap_err();
    assert!(matches!(err, PipelineError::Invalid(_)));
}

// ---------------------------------------------------------------------------
// Cycle
// ---------------------------------------------------------------------------

#[test]
fn cycle_applies_approved_items_during_resync() {
    let store = seeded(vec![row("Peru", &[])]);
    let id = gap_id(&store, "Peru", FieldKey::Capital);
    let ai = Scripted::new(&[("capital of (the) Peru", "Lima")]);
    suggest_gaps(&store, &ai).unwrap();
    approve(&store, ReviewKind::Gap, id).unwrap();

    let sources = [source("wikidata", vec![row("Peru", &[])])];
    let summary = cycle(&store, &sources, None, at(2)).unwrap();
    assert!(summary.disputes.is_none());
    assert_eq!(summary.resync.applied.applied, 1);
    assert_eq!(summary.resync.unchanged, 1);
    assert_eq!(store.get_record("Peru").unwrap().unwrap().value(FieldKey::Capital), "Lima");
}
