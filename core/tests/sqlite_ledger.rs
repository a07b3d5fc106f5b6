//! SQLite ledger adapter: versioning, journal ordering, file reopen.

use bcroam_core::{
    event::{JournalEntry, LedgerEvent},
    record::RateType,
    RecordStore, SqliteLedger,
};
use chrono::{TimeZone, Utc};

fn ledger() -> SqliteLedger {
    let store = SqliteLedger::in_memory().expect("in-memory ledger");
    store.migrate().expect("migration");
    store
}

#[test]
fn put_bumps_version_and_overwrites() {
    let store = ledger();
    assert_eq!(store.version("rs1").unwrap(), 0);
    assert_eq!(store.get("rs1").unwrap(), None);

    store.put("rs1", b"first").unwrap();
    store.put("rs1", b"second").unwrap();
    store.put("rs1", b"third").unwrap();

    assert_eq!(store.version("rs1").unwrap(), 3);
    assert_eq!(store.get("rs1").unwrap().as_deref(), Some(&b"third"[..]));
    assert_eq!(store.version("rs2").unwrap(), 0);
}

#[test]
fn migrate_is_idempotent() {
    let store = ledger();
    store.put("k", b"v").unwrap();
    store.migrate().expect("second migration");
    assert_eq!(store.get("k").unwrap().as_deref(), Some(&b"v"[..]));
}

#[test]
fn journal_keeps_append_order_per_key() {
    let store = ledger();
    let at = Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap();
    let events = [
        LedgerEvent::RateAssigned { at, key: "rs1".into(), rate_type: RateType::RoamingXyz },
        LedgerEvent::CallEnded { at, key: "rs2".into(), duration_minutes: 2.0 },
        LedgerEvent::CallCharged { at, key: "rs1".into(), charges: 12.5 },
        LedgerEvent::InventorySeeded { at, records: 7, registry_seeded: true },
    ];
    for event in &events {
        let id = uuid::Uuid::new_v4().to_string();
        store.append_event(&JournalEntry::for_event(id, event).unwrap()).unwrap();
    }

    assert_eq!(store.journal_len().unwrap(), 4);
    let rs1 = store.events_for_key("rs1").unwrap();
    assert_eq!(rs1.len(), 2);
    assert_eq!(rs1[0].event_type, "rate_assigned");
    assert_eq!(rs1[1].event_type, "call_charged");
    assert!(rs1[0].id < rs1[1].id);

    let decoded: LedgerEvent = serde_json::from_str(&rs1[1].payload).unwrap();
    assert_eq!(decoded, events[2]);
}

#[test]
fn inventory_events_have_no_subscriber_key() {
    let at = Utc::now();
    let entry = JournalEntry::for_event(
        "inv-1".into(),
        &LedgerEvent::InventorySeeded { at, records: 7, registry_seeded: false },
    )
    .unwrap();
    assert_eq!(entry.subscriber_key, None);
    assert_eq!(entry.id, None);
}

#[test]
fn file_ledger_survives_reopen() {
    let path = std::env::temp_dir().join(format!("bcroam-{}.db", uuid::Uuid::new_v4()));
    let path = path.to_str().expect("utf-8 temp path").to_string();
    {
        let store = SqliteLedger::open(&path).unwrap();
        store.migrate().unwrap();
        store.put("rs7", b"persisted").unwrap();
        assert_eq!(store.path(), Some(path.as_str()));
    }
    let reopened = SqliteLedger::open(&path).unwrap();
    reopened.migrate().unwrap();
    assert_eq!(reopened.get("rs7").unwrap().as_deref(), Some(&b"persisted"[..]));
    assert_eq!(reopened.version("rs7").unwrap(), 1);
    drop(reopened);
    let _ = std::fs::remove_file(&path);
}
