//! SQLite slot backend

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension as _};

use super::{migrations, SlotBackend};
use crate::error::StorageError;

/// Slots stored as rows of a single `slots` table.
pub struct SqliteBackend {
    conn: Mutex<Connection>,
    label: String,
}

impl std::fmt::Debug for SqliteBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteBackend")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

impl SqliteBackend {
    /// Open a database at the given path, creating it if it doesn't exist.
    ///
    /// Runs migrations automatically.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::init(conn, format!("sqlite at {}", path.display()))
    }

    /// Open an in-memory database (useful for testing)
    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::init(Connection::open_in_memory()?, "sqlite in memory".to_string())
    }

    fn init(conn: Connection, label: String) -> Result<Self, StorageError> {
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        migrations::run(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            label,
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn
            .lock()
            .map_err(|_| StorageError::Backend("sqlite connection lock poisoned".to_string()))
    }
}

impl SlotBackend for SqliteBackend {
    fn read_slot(&self, key: &str) -> Result<Option<String>, StorageError> {
        let conn = self.conn()?;
        let value = conn
            .query_row(
                "SELECT value FROM slots WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn write_slot(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let conn = self.conn()?;
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        conn.execute(
            "INSERT INTO slots (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, now],
        )?;
        Ok(())
    }

    fn remove_slot(&self, key: &str) -> Result<(), StorageError> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM slots WHERE key = ?1", params![key])?;
        Ok(())
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}
