//! SQLite connection handling and schema setup

use rusqlite::Connection;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

use crate::error::Result;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS generated_plans (
    id              TEXT PRIMARY KEY,
    source          TEXT NOT NULL,
    request_payload TEXT,
    plan_json       TEXT NOT NULL,
    export_id       TEXT,
    metadata        TEXT,
    created_at      TEXT NOT NULL,
    generation_ms   INTEGER
);

CREATE TABLE IF NOT EXISTS api_keys (
    name       TEXT PRIMARY KEY,
    label      TEXT NOT NULL,
    value      TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS settings (
    name       TEXT PRIMARY KEY,
    value      TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
";

/// Shared handle to the PlanForge SQLite database.
///
/// One connection behind a mutex is enough here: every statement is short,
/// and the stores sit behind async orchestrators that never hold the lock
/// across an await point.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) the database file and ensure the schema exists
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;
        conn.execute_batch(SCHEMA)?;
        debug!(path = %path.as_ref().display(), "Opened database");
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// In-memory database for tests
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub(crate) fn with<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        f(&self.lock())
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_creates_schema() {
        let db = Database::open_in_memory().unwrap();
        let count: i64 = db
            .with(|conn| {
                Ok(conn.query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'",
                    [],
                    |row| row.get(0),
                )?)
            })
            .unwrap();
        assert!(count >= 3);
    }

    #[test]
    fn test_open_is_idempotent() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("planforge.db");
        Database::open(&path).unwrap();
        Database::open(&path).unwrap();
    }
}
