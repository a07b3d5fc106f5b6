//! Record store adapters.
//!
//! RULE: the engine reaches persistence only through `RecordStore`.
//! Adapters do no retrying or caching; failures propagate to the caller.

use crate::error::StoreResult;

mod memory;
mod sqlite;

pub use memory::MemoryLedger;
pub use sqlite::SqliteLedger;

/// Key-value contract consumed by the engine. One `put` is atomic per key;
/// a `get` followed by a `put` is not.
pub trait RecordStore: Send + Sync {
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;
    fn put(&self, key: &str, value: &[u8]) -> StoreResult<()>;
}

impl<S: RecordStore + ?Sized> RecordStore for std::sync::Arc<S> {
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        (**self).get(key)
    }

    fn put(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        (**self).put(key, value)
    }
}
