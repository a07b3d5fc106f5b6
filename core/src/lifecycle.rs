//! Call lifecycle.
//!
//! The state is derived from the record's last `action`, so it never drifts
//! from what is stored:
//!
//!   Idle -> Setup -> InCall -> Ended -> Paid
//!
//! Under `LifecyclePolicy::Permissive` every handler applies regardless of
//! state. Under `Strict` the transition table below is enforced.

use crate::{
    config::LifecyclePolicy,
    error::{LedgerError, LedgerResult},
    record::{Action, SubscriberRecord},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallState {
    Idle,
    Setup,
    InCall,
    Ended,
    Paid,
}

impl CallState {
    pub fn of(record: &SubscriberRecord) -> Self {
        match record.action {
            Action::None => Self::Idle,
            Action::Discovery | Action::Authentication | Action::Register => Self::Setup,
            Action::CallInitialization | Action::CallReceived => Self::InCall,
            Action::CallEnd => Self::Ended,
            // Overage is only reachable after billing under the strict table.
            Action::PayCharge | Action::OverageCheck => Self::Paid,
        }
    }
}

/// State-machine inputs that mutate an existing record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Discovery,
    Authentication,
    RateUpdate,
    CallOut,
    CallIn,
    CallEnd,
    CallPay,
    Overage,
}

impl LifecycleEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Discovery => "discovery",
            Self::Authentication => "authentication",
            Self::RateUpdate => "rate_update",
            Self::CallOut => "call_out",
            Self::CallIn => "call_in",
            Self::CallEnd => "call_end",
            Self::CallPay => "call_pay",
            Self::Overage => "overage",
        }
    }

    /// Strict transition table.
    pub fn allowed_from(&self, state: CallState) -> bool {
        use CallState::*;
        match self {
            Self::Discovery | Self::Authentication | Self::RateUpdate => state != InCall,
            Self::CallOut | Self::CallIn => matches!(state, Idle | Setup | Paid),
            Self::CallEnd => state == InCall,
            Self::CallPay => state == Ended,
            Self::Overage => state == Paid,
        }
    }
}

/// Reject `event` on `record` if the policy forbids it.
pub fn guard(
    policy: LifecyclePolicy,
    record: &SubscriberRecord,
    event: LifecycleEvent,
) -> LedgerResult<()> {
    if policy == LifecyclePolicy::Permissive {
        return Ok(());
    }
    let state = CallState::of(record);
    if event.allowed_from(state) {
        Ok(())
    } else {
        Err(LedgerError::InvalidTransition {
            key: record.key.clone(),
            state,
            event: event.name(),
        })
    }
}
