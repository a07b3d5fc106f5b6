//! The roaming engine. Applies one command to one subscriber record.
//!
//! Every mutating handler follows the same sequence:
//!   1. read the record (absent -> NotFound, malformed -> Decode)
//!   2. check the call-lifecycle policy
//!   3. apply the transition
//!   4. stamp `lastUpdated` with the invocation's clock reading
//!   5. encode and write back
//!
//! A failure at any step leaves the stored record as it was. The fraud
//! registry is touched only by discovery and authentication.

use crate::{
    clock::{Clock, SystemClock},
    command::{Invocation, LedgerCommand},
    config::LedgerConfig,
    error::{LedgerError, LedgerResult},
    event::LedgerEvent,
    fraud::{FraudRegistry, FraudVerdict},
    lifecycle::{self, CallState, LifecycleEvent},
    record::{Action, Enrollment, Flag, Operator, RateType, SubscriberRecord, TransactionType},
    seed,
    store::RecordStore,
    types::Timestamp,
};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Result of one executed command.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Applied(LedgerEvent),
    /// Raw stored bytes; empty when the key is absent.
    Queried(Vec<u8>),
}

impl Outcome {
    pub fn event(&self) -> Option<&LedgerEvent> {
        match self {
            Self::Applied(event) => Some(event),
            Self::Queried(_) => None,
        }
    }
}

pub struct RoamingEngine<S: RecordStore> {
    store: S,
    registry: Arc<FraudRegistry>,
    clock: Arc<dyn Clock>,
    config: LedgerConfig,
}

impl<S: RecordStore> RoamingEngine<S> {
    pub fn new(
        store: S,
        registry: Arc<FraudRegistry>,
        clock: Arc<dyn Clock>,
        config: LedgerConfig,
    ) -> Self {
        Self { store, registry, clock, config }
    }

    /// Wall-clock engine with a fresh registry, inventory already seeded.
    /// Call this instead of new() + seed() at process start.
    pub fn build(store: S, config: LedgerConfig) -> LedgerResult<Self> {
        let engine = Self::new(
            store,
            Arc::new(FraudRegistry::new()),
            Arc::new(SystemClock),
            config,
        );
        engine.seed()?;
        Ok(engine)
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn registry(&self) -> &FraudRegistry {
        &self.registry
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    // ── Dispatch ───────────────────────────────────────────────

    /// Parse and execute a named invocation. A panic inside the handler is
    /// contained and reported as `Internal`.
    pub fn invoke(&self, invocation: &Invocation) -> LedgerResult<Outcome> {
        let command = invocation.parse()?;
        match panic::catch_unwind(AssertUnwindSafe(|| self.execute(command))) {
            Ok(result) => result,
            Err(payload) => {
                let msg = if let Some(s) = payload.downcast_ref::<&str>() {
                    (*s).to_string()
                } else if let Some(s) = payload.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "unknown panic origin".to_string()
                };
                log::error!("{} aborted: {msg}", invocation.function);
                Err(LedgerError::Internal(msg))
            }
        }
    }

    pub fn execute(&self, command: LedgerCommand) -> LedgerResult<Outcome> {
        log::debug!("executing {}", command.function_name());
        let event = match command {
            LedgerCommand::ResetInventory => self.seed()?,
            LedgerCommand::Enroll(enrollment) => self.enroll(enrollment)?,
            LedgerCommand::Discover { key, serving_operator, location, lat, long } => {
                self.discover(&key, serving_operator, &location, lat, long)?
            }
            LedgerCommand::Authenticate { key } => self.authenticate(&key)?,
            LedgerCommand::AssignRate { key } => self.assign_rate(&key)?,
            LedgerCommand::CallOut { key, destination } => self.call_out(&key, &destination)?,
            LedgerCommand::CallIn { key, destination } => self.call_in(&key, &destination)?,
            LedgerCommand::CallEnd { key } => self.call_end(&key)?,
            LedgerCommand::CallPay { key } => self.call_pay(&key)?,
            LedgerCommand::Overage { key } => self.overage(&key)?,
            LedgerCommand::Lookup { key } => return Ok(Outcome::Queried(self.lookup(&key)?)),
        };
        log::info!("{} applied", event.type_name());
        Ok(Outcome::Applied(event))
    }

    // ── Inventory ──────────────────────────────────────────────

    /// Destructive reset of the fixed inventory. The registry is seeded
    /// only when it is empty.
    pub fn seed(&self) -> LedgerResult<LedgerEvent> {
        let now = self.clock.now();
        let inventory = seed::inventory();
        let records = inventory.len();
        for enrollment in inventory {
            self.save(&SubscriberRecord::enrolled(enrollment, now))?;
        }
        let registry_seeded = self
            .registry
            .seed_if_empty(seed::registry_entries(&self.config.sentinel_key));
        if !registry_seeded {
            log::debug!("fraud registry already populated ({} entries)", self.registry.len());
        }
        Ok(LedgerEvent::InventorySeeded { at: now, records, registry_seeded })
    }

    /// Create or overwrite one record. The registry is not touched.
    pub fn enroll(&self, enrollment: Enrollment) -> LedgerResult<LedgerEvent> {
        let now = self.clock.now();
        let record = SubscriberRecord::enrolled(enrollment, now);
        self.save(&record)?;
        Ok(LedgerEvent::SubscriberEnrolled {
            at: now,
            key: record.key,
            home_operator: record.home_operator,
        })
    }

    // ── Roaming setup ──────────────────────────────────────────

    pub fn discover(
        &self,
        key: &str,
        serving: Option<Operator>,
        location: &str,
        lat: f64,
        long: f64,
    ) -> LedgerResult<LedgerEvent> {
        let event = self.update(key, LifecycleEvent::Discovery, |record, now| {
            record.current_operator = serving;
            record.location = location.to_string();
            record.lat = lat;
            record.long = long;
            record.action = Action::Discovery;
            record.transaction_type = TransactionType::Setup;
            Ok(LedgerEvent::RoamingPartnerDiscovered {
                at: now,
                key: key.to_string(),
                serving_operator: serving,
                location: location.to_string(),
            })
        })?;
        // Pending re-authentication.
        self.registry.release(key);
        Ok(event)
    }

    /// Fraud screening, then the roaming decision.
    ///
    /// Screening runs whatever the roaming outcome, so a denied
    /// authentication still tracks the msisdn. The record itself is only
    /// written on success.
    pub fn authenticate(&self, key: &str) -> LedgerResult<LedgerEvent> {
        self.update(key, LifecycleEvent::Authentication, |record, now| {
            let verdict = self.registry.screen(
                key,
                &record.msisdn,
                &self.config.sentinel_key,
                record.flag == Flag::Fraud,
            );
            let roaming = roaming_decision(key, record.home_operator, record.current_operator)?;

            let fraud = match verdict {
                FraudVerdict::Clear => None,
                FraudVerdict::Fraud(reason) => {
                    log::warn!("{key} flagged as fraud: {reason:?}");
                    record.flag = Flag::Fraud;
                    Some(reason)
                }
            };

            record.roaming = roaming;
            record.action = Action::Authentication;
            record.transaction_type = TransactionType::Setup;
            Ok(LedgerEvent::SubscriberAuthenticated { at: now, key: key.to_string(), roaming, fraud })
        })
    }

    /// Roaming subscribers are billed on the serving operator's plan.
    /// Always persisted, even when the rate does not change.
    pub fn assign_rate(&self, key: &str) -> LedgerResult<LedgerEvent> {
        self.update(key, LifecycleEvent::RateUpdate, |record, now| {
            if record.roaming {
                if let Some(serving) = record.current_operator {
                    record.rate_type = RateType::roaming_on(serving);
                }
            }
            record.action = Action::Register;
            record.transaction_type = TransactionType::Setup;
            Ok(LedgerEvent::RateAssigned { at: now, key: key.to_string(), rate_type: record.rate_type })
        })
    }

    // ── Calls ──────────────────────────────────────────────────

    /// Start an outbound call. The write timestamp marks the call start.
    pub fn call_out(&self, key: &str, destination: &str) -> LedgerResult<LedgerEvent> {
        self.update(key, LifecycleEvent::CallOut, |record, now| {
            record.destination = destination.to_string();
            record.action = Action::CallInitialization;
            record.transaction_type = TransactionType::CallOut;
            record.duration_minutes = 0.0;
            record.charges = 0.0;
            Ok(LedgerEvent::CallStarted {
                at: now,
                key: key.to_string(),
                destination: destination.to_string(),
                inbound: false,
            })
        })
    }

    pub fn call_in(&self, key: &str, destination: &str) -> LedgerResult<LedgerEvent> {
        self.update(key, LifecycleEvent::CallIn, |record, now| {
            record.destination = destination.to_string();
            record.action = Action::CallReceived;
            record.transaction_type = TransactionType::CallIn;
            record.duration_minutes = 0.0;
            Ok(LedgerEvent::CallStarted {
                at: now,
                key: key.to_string(),
                destination: destination.to_string(),
                inbound: true,
            })
        })
    }

    /// Duration is the time since the last write, which is the call start
    /// only if nothing else touched the record in between.
    pub fn call_end(&self, key: &str) -> LedgerResult<LedgerEvent> {
        self.update(key, LifecycleEvent::CallEnd, |record, now| {
            let duration_minutes = minutes_between(record.last_updated, now);
            record.duration_minutes = duration_minutes;
            record.action = Action::CallEnd;
            record.transaction_type = TransactionType::CallOut;
            Ok(LedgerEvent::CallEnded { at: now, key: key.to_string(), duration_minutes })
        })
    }

    pub fn call_pay(&self, key: &str) -> LedgerResult<LedgerEvent> {
        self.update(key, LifecycleEvent::CallPay, |record, now| {
            record.charges = record.duration_minutes * self.config.per_minute_rate;
            record.action = Action::PayCharge;
            record.transaction_type = TransactionType::CallOut;
            Ok(LedgerEvent::CallCharged { at: now, key: key.to_string(), charges: record.charges })
        })
    }

    /// Flags the subscriber unconditionally; there is no usage threshold.
    pub fn overage(&self, key: &str) -> LedgerResult<LedgerEvent> {
        self.update(key, LifecycleEvent::Overage, |record, now| {
            let state = CallState::of(record);
            record.flag = Flag::Overage;
            record.action = Action::OverageCheck;
            record.transaction_type = TransactionType::CallOut;
            Ok(LedgerEvent::OverageFlagged { at: now, key: key.to_string(), state })
        })
    }

    // ── Query ──────────────────────────────────────────────────

    /// Raw stored bytes, empty when absent. No decoding.
    pub fn lookup(&self, key: &str) -> LedgerResult<Vec<u8>> {
        Ok(self.read(key)?.unwrap_or_default())
    }

    /// Decoded record at `key`.
    pub fn record(&self, key: &str) -> LedgerResult<SubscriberRecord> {
        let bytes = self
            .read(key)?
            .ok_or_else(|| LedgerError::NotFound { key: key.to_string() })?;
        SubscriberRecord::decode(key, &bytes)
    }

    // ── Internals ──────────────────────────────────────────────

    fn update<F>(&self, key: &str, event: LifecycleEvent, apply: F) -> LedgerResult<LedgerEvent>
    where
        F: FnOnce(&mut SubscriberRecord, Timestamp) -> LedgerResult<LedgerEvent>,
    {
        let mut record = self.record(key)?;
        lifecycle::guard(self.config.lifecycle, &record, event)?;
        let now = self.clock.now();
        let applied = apply(&mut record, now)?;
        record.last_updated = now;
        self.save(&record)?;
        Ok(applied)
    }

    fn read(&self, key: &str) -> LedgerResult<Option<Vec<u8>>> {
        self.store.get(key).map_err(|source| LedgerError::StoreRead {
            key: key.to_string(),
            source,
        })
    }

    fn save(&self, record: &SubscriberRecord) -> LedgerResult<()> {
        let bytes = record.encode()?;
        self.store
            .put(&record.key, &bytes)
            .map_err(|source| LedgerError::StoreWrite {
                key: record.key.clone(),
                source,
            })?;
        log::debug!("wrote {} ({} bytes)", record.key, bytes.len());
        Ok(())
    }
}

/// Roaming table: no serving operator means home network; the two
/// operators roam on each other; anything else is denied.
fn roaming_decision(key: &str, home: Operator, serving: Option<Operator>) -> LedgerResult<bool> {
    match (serving, home) {
        (None, _) => Ok(false),
        (Some(Operator::Xyz), Operator::Abc) | (Some(Operator::Abc), Operator::Xyz) => Ok(true),
        (Some(serving), home) => {
            log::warn!("authentication denied for {key}: {serving} serving a {home} subscriber");
            Err(LedgerError::AuthenticationDenied { key: key.to_string(), home, serving })
        }
    }
}

/// Elapsed minutes, clamped at zero when the clock went backwards.
fn minutes_between(start: Timestamp, end: Timestamp) -> f64 {
    let millis = (end - start).num_milliseconds();
    (millis as f64 / 60_000.0).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    #[test]
    fn roaming_table_is_exhaustive() {
        use Operator::*;
        assert!(!roaming_decision("k", Abc, None).unwrap());
        assert!(!roaming_decision("k", Xyz, None).unwrap());
        assert!(roaming_decision("k", Abc, Some(Xyz)).unwrap());
        assert!(roaming_decision("k", Xyz, Some(Abc)).unwrap());
        assert!(matches!(
            roaming_decision("k", Abc, Some(Abc)),
            Err(LedgerError::AuthenticationDenied { home: Abc, serving: Abc, .. })
        ));
        assert!(matches!(
            roaming_decision("k", Xyz, Some(Xyz)),
            Err(LedgerError::AuthenticationDenied { .. })
        ));
    }

    #[test]
    fn minutes_between_clamps_negative_spans() {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(minutes_between(t0, t0 + Duration::seconds(90)), 1.5);
        assert_eq!(minutes_between(t0 + Duration::minutes(1), t0), 0.0);
    }
}
