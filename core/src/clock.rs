//! Ledger clock. Every handler stamps `lastUpdated` from here, and call
//! duration is measured against it, so tests inject a `ManualClock`.

use crate::types::Timestamp;
use chrono::{Duration, Utc};
use std::sync::Mutex;

pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Real wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    current: Mutex<Timestamp>,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self { current: Mutex::new(start) }
    }

    /// Move the clock forward. Returns the new instant.
    pub fn advance(&self, by: Duration) -> Timestamp {
        let mut current = self.current.lock().unwrap_or_else(|p| p.into_inner());
        *current += by;
        *current
    }

    pub fn set(&self, to: Timestamp) {
        *self.current.lock().unwrap_or_else(|p| p.into_inner()) = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.current.lock().unwrap_or_else(|p| p.into_inner())
    }
}
