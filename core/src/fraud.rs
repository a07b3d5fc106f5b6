//! Fraud registry. Tracks, per subscriber key, the msisdn that last
//! authenticated under it.
//!
//! An msisdn seen under any tracked key marks a later authentication as
//! identity reuse. Discovery releases the key's slot until the subscriber
//! authenticates again. An empty registry means tracking is disabled: every
//! write becomes a no-op and only the sentinel key can flag.

use crate::types::{Msisdn, SubscriberKey};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum FraudReason {
    /// The msisdn is tracked under `holder`.
    SharedMsisdn { holder: SubscriberKey },
    /// The key is the always-fraud sentinel.
    Sentinel,
    /// The record was already flagged before this authentication.
    PriorFlag,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FraudVerdict {
    Clear,
    Fraud(FraudReason),
}

impl FraudVerdict {
    pub fn is_fraud(&self) -> bool {
        matches!(self, Self::Fraud(_))
    }
}

#[derive(Debug, Default)]
pub struct FraudRegistry {
    // BTreeMap: scan order is stable across runs.
    tracked: Mutex<BTreeMap<SubscriberKey, Msisdn>>,
}

impl FraudRegistry {
    /// Empty registry (tracking disabled until seeded).
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<SubscriberKey>,
        V: Into<Msisdn>,
    {
        let map = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self { tracked: Mutex::new(map) }
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<SubscriberKey, Msisdn>> {
        // Every mutation is a single insert, so a poisoned map is still consistent.
        self.tracked.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn tracked(&self, key: &str) -> Option<Msisdn> {
        self.lock().get(key).cloned()
    }

    pub fn snapshot(&self) -> BTreeMap<SubscriberKey, Msisdn> {
        self.lock().clone()
    }

    /// Populate only when empty. Returns whether entries were written.
    pub fn seed_if_empty<I>(&self, entries: I) -> bool
    where
        I: IntoIterator<Item = (SubscriberKey, Msisdn)>,
    {
        let mut map = self.lock();
        if !map.is_empty() {
            return false;
        }
        map.extend(entries);
        true
    }

    /// Clear the identity tracked for `key`, pending re-authentication.
    pub fn release(&self, key: &str) {
        let mut map = self.lock();
        if map.is_empty() {
            log::debug!("fraud tracking disabled, not releasing {key}");
            return;
        }
        map.insert(key.to_string(), Msisdn::new());
    }

    /// Screen one authentication and, when clear, track `msisdn` under `key`.
    ///
    /// Scan and record happen under one lock so concurrent authentications
    /// observe each other's entries.
    pub fn screen(
        &self,
        key: &str,
        msisdn: &str,
        sentinel_key: &str,
        already_flagged: bool,
    ) -> FraudVerdict {
        let mut map = self.lock();

        let verdict = if let Some(holder) = map
            .iter()
            .find(|(_, tracked)| tracked.as_str() == msisdn)
            .map(|(holder, _)| holder.clone())
        {
            FraudVerdict::Fraud(FraudReason::SharedMsisdn { holder })
        } else if key == sentinel_key {
            FraudVerdict::Fraud(FraudReason::Sentinel)
        } else if already_flagged {
            FraudVerdict::Fraud(FraudReason::PriorFlag)
        } else {
            FraudVerdict::Clear
        };

        if !verdict.is_fraud() && !map.is_empty() {
            map.insert(key.to_string(), msisdn.to_string());
        }
        verdict
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn msisdn_tracked_under_another_key_is_fraud() {
        let registry = FraudRegistry::with_entries([("rsX", "111")]);
        let verdict = registry.screen("rsY", "111", "rs8", false);
        assert_eq!(
            verdict,
            FraudVerdict::Fraud(FraudReason::SharedMsisdn { holder: "rsX".into() })
        );
        assert_eq!(registry.tracked("rsY"), None);
    }

    #[test]
    fn clear_authentication_is_tracked() {
        let registry = FraudRegistry::with_entries([("rsX", "111")]);
        assert_eq!(registry.screen("rsY", "222", "rs8", false), FraudVerdict::Clear);
        assert_eq!(registry.tracked("rsY").as_deref(), Some("222"));
    }

    #[test]
    fn sentinel_flags_even_when_empty() {
        let registry = FraudRegistry::new();
        assert_eq!(
            registry.screen("rs8", "999", "rs8", false),
            FraudVerdict::Fraud(FraudReason::Sentinel)
        );
    }

    #[test]
    fn empty_registry_stays_empty() {
        let registry = FraudRegistry::new();
        assert_eq!(registry.screen("rs1", "111", "rs8", false), FraudVerdict::Clear);
        registry.release("rs1");
        assert!(registry.is_empty());
    }

    #[test]
    fn release_clears_slot_for_reauthentication() {
        let registry = FraudRegistry::with_entries([("rs1", "111"), ("rs2", "222")]);
        assert!(registry.screen("rs1", "111", "rs8", false).is_fraud());

        registry.release("rs1");
        assert_eq!(registry.tracked("rs1").as_deref(), Some(""));
        assert_eq!(registry.screen("rs1", "111", "rs8", false), FraudVerdict::Clear);
        assert_eq!(registry.tracked("rs1").as_deref(), Some("111"));
    }

    #[test]
    fn seed_if_empty_leaves_populated_registry_alone() {
        let registry = FraudRegistry::with_entries([("rs1", "")]);
        assert!(!registry.seed_if_empty([("rs1".to_string(), "111".to_string())]));
        assert_eq!(registry.tracked("rs1").as_deref(), Some(""));

        let empty = FraudRegistry::new();
        assert!(empty.seed_if_empty([("rs1".to_string(), "111".to_string())]));
        assert_eq!(empty.len(), 1);
    }

    #[test]
    fn prior_flag_is_kept_and_not_tracked() {
        let registry = FraudRegistry::with_entries([("rsX", "111")]);
        assert_eq!(
            registry.screen("rsY", "222", "rs8", true),
            FraudVerdict::Fraud(FraudReason::PriorFlag)
        );
        assert_eq!(registry.tracked("rsY"), None);
    }
}
