//! Shared primitive types used across the ledger.

use chrono::{DateTime, Utc};

/// Public identifier of a subscriber record. Never changes once written.
pub type SubscriberKey = String;

/// Phone number of a subscriber.
pub type Msisdn = String;

/// Wall-clock instant stamped on every write.
pub type Timestamp = DateTime<Utc>;

/// Identifier attached to one inbound invocation.
pub type InvocationId = String;
