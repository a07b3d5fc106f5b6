//! SQLite-backed ledger.
//!
//! `ledger_state` holds one row per key with a version counter bumped on
//! every write. `event_log` is an append-only journal of applied events.

use super::RecordStore;
use crate::{
    error::{StoreError, StoreResult},
    event::JournalEntry,
};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Mutex, MutexGuard};

pub struct SqliteLedger {
    conn: Mutex<Connection>,
    path: Option<String>, // None for :memory:, Some(path) for file
}

impl SqliteLedger {
    pub fn open(path: &str) -> StoreResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files (shared-memory and :memory: ignore it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        Ok(Self {
            conn: Mutex::new(conn),
            path: Some(path.to_string()),
        })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open(":memory:")?;
        Ok(Self { conn: Mutex::new(conn), path: None })
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> StoreResult<()> {
        self.conn()?
            .execute_batch(include_str!("../../../migrations/001_ledger.sql"))?;
        Ok(())
    }

    /// Number of writes applied to `key`, 0 if never written.
    pub fn version(&self, key: &str) -> StoreResult<u64> {
        let version: Option<i64> = self
            .conn()?
            .query_row(
                "SELECT version FROM ledger_state WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(version.unwrap_or(0) as u64)
    }

    // ── Journal ────────────────────────────────────────────────

    pub fn append_event(&self, entry: &JournalEntry) -> StoreResult<()> {
        self.conn()?.execute(
            "INSERT INTO event_log (invocation_id, subscriber_key, event_type, payload)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                entry.invocation_id,
                entry.subscriber_key,
                entry.event_type,
                entry.payload,
            ],
        )?;
        Ok(())
    }

    pub fn events_for_key(&self, key: &str) -> StoreResult<Vec<JournalEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, invocation_id, subscriber_key, event_type, payload
             FROM event_log WHERE subscriber_key = ?1
             ORDER BY id ASC",
        )?;
        let entries = stmt
            .query_map(params![key], |row| {
                Ok(JournalEntry {
                    id: Some(row.get(0)?),
                    invocation_id: row.get(1)?,
                    subscriber_key: row.get(2)?,
                    event_type: row.get(3)?,
                    payload: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    pub fn journal_len(&self) -> StoreResult<i64> {
        let n: i64 = self
            .conn()?
            .query_row("SELECT COUNT(*) FROM event_log", [], |row| row.get(0))?;
        Ok(n)
    }
}

impl RecordStore for SqliteLedger {
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let value = self
            .conn()?
            .query_row(
                "SELECT value FROM ledger_state WHERE key = ?1",
                params![key],
                |row| row.get::<_, Vec<u8>>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn put(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        self.conn()?.execute(
            "INSERT INTO ledger_state (key, value, version) VALUES (?1, ?2, 1)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, version = version + 1",
            params![key, value],
        )?;
        Ok(())
    }
}
