//! Events emitted by the engine, one per applied command.
//!
//! Events describe what was written; they are returned to the caller and,
//! when the store keeps a journal, appended to it.

use crate::{
    fraud::FraudReason,
    lifecycle::CallState,
    record::{Operator, RateType},
    types::{InvocationId, SubscriberKey, Timestamp},
};
use serde::{Deserialize, Serialize};

/// Variants are appended, never reordered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    InventorySeeded {
        at: Timestamp,
        records: usize,
        registry_seeded: bool,
    },
    SubscriberEnrolled {
        at: Timestamp,
        key: SubscriberKey,
        home_operator: Operator,
    },
    RoamingPartnerDiscovered {
        at: Timestamp,
        key: SubscriberKey,
        /// `None` when the subscriber is back on the home network.
        serving_operator: Option<Operator>,
        location: String,
    },
    SubscriberAuthenticated {
        at: Timestamp,
        key: SubscriberKey,
        roaming: bool,
        fraud: Option<FraudReason>,
    },
    RateAssigned {
        at: Timestamp,
        key: SubscriberKey,
        rate_type: RateType,
    },
    CallStarted {
        at: Timestamp,
        key: SubscriberKey,
        destination: String,
        inbound: bool,
    },
    CallEnded {
        at: Timestamp,
        key: SubscriberKey,
        duration_minutes: f64,
    },
    CallCharged {
        at: Timestamp,
        key: SubscriberKey,
        charges: f64,
    },
    OverageFlagged {
        at: Timestamp,
        key: SubscriberKey,
        state: CallState,
    },
}

impl LedgerEvent {
    /// Stable name, used for the journal's event_type column.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::InventorySeeded { .. } => "inventory_seeded",
            Self::SubscriberEnrolled { .. } => "subscriber_enrolled",
            Self::RoamingPartnerDiscovered { .. } => "roaming_partner_discovered",
            Self::SubscriberAuthenticated { .. } => "subscriber_authenticated",
            Self::RateAssigned { .. } => "rate_assigned",
            Self::CallStarted { .. } => "call_started",
            Self::CallEnded { .. } => "call_ended",
            Self::CallCharged { .. } => "call_charged",
            Self::OverageFlagged { .. } => "overage_flagged",
        }
    }

    /// Subscriber the event concerns; `None` for inventory-wide events.
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::InventorySeeded { .. } => None,
            Self::SubscriberEnrolled { key, .. }
            | Self::RoamingPartnerDiscovered { key, .. }
            | Self::SubscriberAuthenticated { key, .. }
            | Self::RateAssigned { key, .. }
            | Self::CallStarted { key, .. }
            | Self::CallEnded { key, .. }
            | Self::CallCharged { key, .. }
            | Self::OverageFlagged { key, .. } => Some(key.as_str()),
        }
    }
}

/// A journal row as persisted to SQLite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: Option<i64>,
    pub invocation_id: InvocationId,
    pub subscriber_key: Option<SubscriberKey>,
    pub event_type: String,
    pub payload: String, // JSON-serialized LedgerEvent
}

impl JournalEntry {
    pub fn for_event(invocation_id: InvocationId, event: &LedgerEvent) -> serde_json::Result<Self> {
        Ok(Self {
            id: None,
            invocation_id,
            subscriber_key: event.key().map(str::to_string),
            event_type: event.type_name().to_string(),
            payload: serde_json::to_string(event)?,
        })
    }
}
