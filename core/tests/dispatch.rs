//! Dispatch tests: named invocations end to end against the SQLite
//! ledger, and fault containment at the invocation boundary.

use bcroam_core::{
    clock::ManualClock,
    error::{LedgerError, StoreError, StoreResult},
    record::{Flag, RateType},
    FraudRegistry, Invocation, LedgerConfig, MemoryLedger, Outcome, RecordStore, RoamingEngine,
    SqliteLedger,
};
use chrono::{Duration, TimeZone, Utc};
use std::sync::Arc;

fn build() -> (RoamingEngine<SqliteLedger>, Arc<ManualClock>) {
    let _ = env_logger::builder().is_test(true).try_init();
    let store = SqliteLedger::in_memory().expect("in-memory ledger");
    store.migrate().expect("migration");
    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap()));
    let engine = RoamingEngine::new(
        store,
        Arc::new(FraudRegistry::new()),
        clock.clone(),
        LedgerConfig::default_test(),
    );
    (engine, clock)
}

fn call(engine: &RoamingEngine<SqliteLedger>, function: &str, args: &[&str]) -> Outcome {
    engine
        .invoke(&Invocation::new(function, args.iter().copied()))
        .unwrap_or_else(|e| panic!("{function} failed: {e}"))
}

#[test]
fn named_invocations_drive_a_roaming_call() {
    let (engine, clock) = build();
    call(&engine, "resetInventory", &[]);
    call(&engine, "discoverRP", &["rs4", "ABC", "DALLAS", "32.77", "-96.79"]);
    call(&engine, "authentication", &["rs4"]);
    call(&engine, "updateRates", &["rs4"]);
    call(&engine, "CallOut", &["rs4", "14691234567"]);
    clock.advance(Duration::minutes(6));
    call(&engine, "CallEnd", &["rs4"]);
    call(&engine, "CallPay", &["rs4"]);

    let rec = engine.record("rs4").unwrap();
    assert!(rec.roaming);
    assert_eq!(rec.rate_type, RateType::RoamingAbc);
    assert_eq!(rec.duration_minutes, 6.0);
    assert_eq!(rec.charges, 30.0);
    assert_eq!(rec.lat, 32.77);

    call(&engine, "Overage", &["rs4"]);
    assert_eq!(engine.record("rs4").unwrap().flag, Flag::Overage);
    assert_eq!(engine.store().version("rs4").unwrap(), 8);
}

#[test]
fn query_returns_stored_bytes() {
    let (engine, _) = build();
    call(&engine, "enterData", &["rs20", "3399887766", "Q", "NICE", "XYZ", "43.70", "7.26"]);

    let outcome = call(&engine, "queryMSISDN", &["rs20"]);
    let stored = engine.store().get("rs20").unwrap().unwrap();
    assert_eq!(outcome, Outcome::Queried(stored));

    assert_eq!(call(&engine, "queryMSISDN", &["missing"]), Outcome::Queried(Vec::new()));
}

#[test]
fn unknown_function_is_invalid_arguments() {
    let (engine, _) = build();
    let err = engine.invoke(&Invocation::new("transferFunds", ["rs1"])).unwrap_err();
    assert!(matches!(err, LedgerError::InvalidArguments(_)));
}

#[test]
fn short_argument_list_is_rejected_before_any_read() {
    let (engine, _) = build();
    call(&engine, "resetInventory", &[]);
    let before = engine.store().get("rs1").unwrap();

    let err = engine.invoke(&Invocation::new("discoverRP", ["rs1", "XYZ"])).unwrap_err();
    assert!(matches!(err, LedgerError::InvalidArguments(_)));
    assert_eq!(before, engine.store().get("rs1").unwrap());
}

#[test]
fn handler_on_missing_record_is_not_found() {
    let (engine, _) = build();
    let err = engine.invoke(&Invocation::new("CallEnd", ["ghost"])).unwrap_err();
    assert!(matches!(err, LedgerError::NotFound { .. }));
}

// ── Fault containment ─────────────────────────────────────────────────

/// Panics when asked for one poisoned key, delegates otherwise.
struct TrippedStore {
    inner: MemoryLedger,
}

impl RecordStore for TrippedStore {
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        if key == "boom" {
            panic!("storage node crashed");
        }
        self.inner.get(key)
    }

    fn put(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        self.inner.put(key, value)
    }
}

/// Rejects every write.
struct ReadOnlyStore {
    inner: Arc<MemoryLedger>,
}

impl RecordStore for ReadOnlyStore {
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        self.inner.get(key)
    }

    fn put(&self, _key: &str, _value: &[u8]) -> StoreResult<()> {
        Err(StoreError::LockPoisoned)
    }
}

#[test]
fn panic_is_contained_to_one_invocation() {
    let engine = RoamingEngine::new(
        TrippedStore { inner: MemoryLedger::new() },
        Arc::new(FraudRegistry::new()),
        Arc::new(ManualClock::new(Utc::now())),
        LedgerConfig::default(),
    );
    engine.seed().unwrap();

    let err = engine.invoke(&Invocation::new("authentication", ["boom"])).unwrap_err();
    assert!(
        matches!(err, LedgerError::Internal(ref msg) if msg.contains("storage node crashed")),
        "unexpected error: {err}"
    );

    engine
        .invoke(&Invocation::new("CallOut", ["rs1", "15550001111"]))
        .expect("later invocations still run");
}

#[test]
fn write_failure_is_reported() {
    let inner = Arc::new(MemoryLedger::new());
    let seeded = RoamingEngine::new(
        inner.clone(),
        Arc::new(FraudRegistry::new()),
        Arc::new(ManualClock::new(Utc::now())),
        LedgerConfig::default(),
    );
    seeded.seed().unwrap();
    let before = inner.get("rs2").unwrap();

    let engine = RoamingEngine::new(
        ReadOnlyStore { inner: inner.clone() },
        Arc::new(FraudRegistry::new()),
        Arc::new(ManualClock::new(Utc::now())),
        LedgerConfig::default(),
    );
    let err = engine.invoke(&Invocation::new("CallOut", ["rs2", "555"])).unwrap_err();
    assert!(matches!(err, LedgerError::StoreWrite { ref key, .. } if key == "rs2"));
    assert_eq!(before, inner_view(&engine).get("rs2").unwrap());
}

fn inner_view(engine: &RoamingEngine<ReadOnlyStore>) -> &MemoryLedger {
    &engine.store().inner
}
