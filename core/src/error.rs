use crate::{lifecycle::CallState, record::Operator};
use thiserror::Error;

/// Faults raised by a store adapter.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Store lock poisoned")]
    LockPoisoned,
}

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Subscriber '{key}' not found")]
    NotFound { key: String },

    #[error("Stored record for '{key}' is malformed: {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Could not read '{key}' from the store: {source}")]
    StoreRead {
        key: String,
        #[source]
        source: StoreError,
    },

    #[error("Could not write '{key}' to the store: {source}")]
    StoreWrite {
        key: String,
        #[source]
        source: StoreError,
    },

    #[error("Authentication denied for '{key}': home {home}, serving {serving}")]
    AuthenticationDenied {
        key: String,
        home: Operator,
        serving: Operator,
    },

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Event '{event}' not allowed for '{key}' in call state {state:?}")]
    InvalidTransition {
        key: String,
        state: CallState,
        event: &'static str,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invocation aborted: {0}")]
    Internal(String),
}

pub type LedgerResult<T> = Result<T, LedgerError>;
pub type StoreResult<T> = Result<T, StoreError>;
