use super::RecordStore;
use crate::error::{StoreError, StoreResult};
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory ledger for tests and scratch runs.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    values: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> StoreResult<usize> {
        Ok(self.values.read().map_err(|_| StoreError::LockPoisoned)?.len())
    }

    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Sorted copy of every key and value. Used by replay comparisons.
    pub fn dump(&self) -> StoreResult<Vec<(String, Vec<u8>)>> {
        let values = self.values.read().map_err(|_| StoreError::LockPoisoned)?;
        let mut all: Vec<_> = values.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        all.sort();
        Ok(all)
    }
}

impl RecordStore for MemoryLedger {
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let values = self.values.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(values.get(key).cloned())
    }

    fn put(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        let mut values = self.values.write().map_err(|_| StoreError::LockPoisoned)?;
        values.insert(key.to_string(), value.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_overwrites_and_get_reads_back() {
        let ledger = MemoryLedger::new();
        assert_eq!(ledger.get("rs1").unwrap(), None);

        ledger.put("rs1", b"one").unwrap();
        ledger.put("rs1", b"two").unwrap();
        assert_eq!(ledger.get("rs1").unwrap().as_deref(), Some(&b"two"[..]));
        assert_eq!(ledger.len().unwrap(), 1);
    }
}
