use chrono::{DateTime, Duration, TimeZone, Utc};
use geoquiz_core::{CountryFacts, CountryRecord, FieldKey};
use geoquiz_store::{LedgerOrigin, Store, StoreError, PIPELINE_LOCK};
use tempfile::TempDir;

fn t(minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 4, 10, 9, minute, 0).unwrap()
}

#[test]
fn data_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("geoquiz.db");

    {
        let store = Store::open(&path).unwrap();
        let facts = CountryFacts::new("Chad")
            .with(FieldKey::OfficialLanguage, "French or Arabic")
            .with_defaults();
        let uow = store.begin().unwrap();
        uow.put_record(&CountryRecord::from_facts(&facts, t(0))).unwrap();
        uow.upsert_tracked(&facts, t(0)).unwrap();
        uow.record_change(LedgerOrigin::Seed, "Chad", Some(FieldKey::OfficialLanguage), "", "French or Arabic", t(0))
            .unwrap();
        uow.commit().unwrap();
    }

    let store = Store::open(&path).unwrap();
    let chad = store.get_record("Chad").unwrap().unwrap();
    assert_eq!(chad.value(FieldKey::OfficialLanguage), "French or Arabic");
    assert!(store.tracked_labels().unwrap().contains("Chad"));
    assert_eq!(store.ledger(Some("Chad")).unwrap().len(), 1);
}

#[test]
fn legacy_lowercase_language_key_is_read() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("geoquiz.db");
    let store = Store::open(&path).unwrap();
    drop(store);

    let conn = rusqlite_connection(&path);
    conn.execute(
        "INSERT INTO country_quiz (label, data, updated_at) VALUES (?1, ?2, ?3)",
        [
            "Mali",
            r#"{"country_label":{"value":"Mali"},"official_language_label":{"value":"French"}}"#,
            "2026-04-10T09:00:00Z",
        ],
    )
    .unwrap();
    drop(conn);

    let store = Store::open(&path).unwrap();
    let mali = store.get_record("Mali").unwrap().unwrap();
    assert_eq!(mali.value(FieldKey::OfficialLanguage), "French");
}

fn rusqlite_connection(path: &std::path::Path) -> rusqlite::Connection {
    rusqlite::Connection::open(path).unwrap()
}

#[test]
fn lock_is_shared_between_handles() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("geoquiz.db");
    let first = Store::open(&path).unwrap();
    let second = Store::open(&path).unwrap();
    let window = Duration::minutes(10);

    let held = first.lock(PIPELINE_LOCK, "cron", window, t(0)).unwrap();
    match second.lock(PIPELINE_LOCK, "manual", window, t(5)) {
        Err(StoreError::LockHeld { holder, since }) => {
            assert_eq!(holder, "cron");
            assert_eq!(since, t(0));
        }
        other => panic!("expected LockHeld, got {other:?}"),
    }
    drop(held);
    assert!(second.lock(PIPELINE_LOCK, "manual", window, t(5)).is_ok());
}
