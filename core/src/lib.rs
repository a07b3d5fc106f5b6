//! Roaming subscriber ledger.
//!
//! One record per subscriber, evolved by discovery, authentication (with
//! fraud screening), rate assignment and call events. Each event is a
//! read-modify-write through a `RecordStore`.

pub mod clock;
pub mod command;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod fraud;
pub mod lifecycle;
pub mod record;
pub mod seed;
pub mod store;
pub mod traffic;
pub mod types;

pub use command::{Invocation, LedgerCommand};
pub use config::{LedgerConfig, LifecyclePolicy};
pub use engine::{Outcome, RoamingEngine};
pub use error::{LedgerError, LedgerResult};
pub use fraud::FraudRegistry;
pub use record::SubscriberRecord;
pub use store::{MemoryLedger, RecordStore, SqliteLedger};
