//! Local persistence of the entry collection.
//!
//! The whole collection lives in one named slot as a JSON array and is
//! rewritten on every save. The last successful sync time lives in a second
//! slot. Where the slots are kept is decided by the [`SlotBackend`].

mod file;
mod memory;
mod migrations;
mod sqlite;

use std::collections::HashSet;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;

use crate::error::StorageError;
use crate::models::PhotoEntry;
use crate::validate::Validator;

pub use file::FileBackend;
pub use memory::MemoryBackend;
pub use sqlite::SqliteBackend;

/// Slot holding the serialized entry array
pub const ENTRIES_KEY: &str = "photo-documentation-entries";
/// Slot holding the last-sync watermark
pub const LAST_SYNC_KEY: &str = "briqwerk_last_sync";

/// Durable key/value medium for named string slots.
///
/// A write replaces the slot completely or not at all.
pub trait SlotBackend: Send + Sync {
    fn read_slot(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn write_slot(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove_slot(&self, key: &str) -> Result<(), StorageError>;

    /// Short label for logs and status output
    fn describe(&self) -> String {
        "custom".to_string()
    }
}

impl<T: SlotBackend + ?Sized> SlotBackend for Box<T> {
    fn read_slot(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).read_slot(key)
    }

    fn write_slot(&self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).write_slot(key, value)
    }

    fn remove_slot(&self, key: &str) -> Result<(), StorageError> {
        (**self).remove_slot(key)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// Entry collection persisted through a [`SlotBackend`].
#[derive(Debug)]
pub struct EntryStore<B> {
    backend: B,
    validator: Validator,
}

impl<B: SlotBackend> EntryStore<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            validator: Validator::default(),
        }
    }

    #[must_use]
    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validator = validator;
        self
    }

    pub const fn backend(&self) -> &B {
        &self.backend
    }

    pub const fn validator(&self) -> &Validator {
        &self.validator
    }

    /// Read the persisted collection.
    ///
    /// Never fails: a missing or unreadable slot yields an empty collection and
    /// malformed members are dropped.
    pub fn load(&self) -> Vec<PhotoEntry> {
        let raw = match self.backend.read_slot(ENTRIES_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(error) => {
                tracing::warn!(code = error.code(), "Failed to read entry slot: {error}");
                return Vec::new();
            }
        };

        let value = match serde_json::from_str::<Value>(&raw) {
            Ok(value) => value,
            Err(error) => {
                tracing::warn!("Discarding unparsable entry slot: {error}");
                return Vec::new();
            }
        };

        cleanup_entries(value, &self.validator)
    }

    /// Replace the persisted collection with `entries`.
    pub fn save(&self, entries: &[PhotoEntry]) -> Result<(), StorageError> {
        let payload = serde_json::to_string(entries)?;
        self.backend.write_slot(ENTRIES_KEY, &payload)?;
        tracing::debug!(count = entries.len(), "Saved entry collection");
        Ok(())
    }

    /// Last successful sync time, `None` before the first sync.
    pub fn last_sync(&self) -> Option<DateTime<Utc>> {
        let raw = match self.backend.read_slot(LAST_SYNC_KEY) {
            Ok(raw) => raw?,
            Err(error) => {
                tracing::warn!(code = error.code(), "Failed to read last-sync slot: {error}");
                return None;
            }
        };
        match DateTime::parse_from_rfc3339(raw.trim()) {
            Ok(parsed) => Some(parsed.with_timezone(&Utc)),
            Err(error) => {
                tracing::warn!("Ignoring invalid last-sync value {raw:?}: {error}");
                None
            }
        }
    }

    pub fn save_last_sync(&self, at: DateTime<Utc>) -> Result<(), StorageError> {
        self.backend
            .write_slot(LAST_SYNC_KEY, &at.to_rfc3339_opts(SecondsFormat::Micros, true))
    }

    /// Drop the stored collection and watermark.
    pub fn clear(&self) -> Result<(), StorageError> {
        self.backend.remove_slot(ENTRIES_KEY)?;
        self.backend.remove_slot(LAST_SYNC_KEY)
    }
}

/// Keep the members of a persisted blob that deserialize and pass structural
/// validation. Duplicate ids keep their first occurrence.
pub fn cleanup_entries(value: Value, validator: &Validator) -> Vec<PhotoEntry> {
    let Value::Array(items) = value else {
        tracing::warn!("Discarding entry slot that is not an array");
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut entries = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        let entry = match serde_json::from_value::<PhotoEntry>(item) {
            Ok(entry) => entry,
            Err(error) => {
                tracing::warn!(index, "Dropping malformed entry: {error}");
                continue;
            }
        };

        let report = validator.validate_entry(&entry);
        if !report.is_valid() {
            tracing::warn!(index, id = %entry.id, "Dropping invalid entry: {}", report.summary());
            continue;
        }

        if !seen.insert(entry.id.clone()) {
            tracing::warn!(index, id = %entry.id, "Dropping duplicate entry");
            continue;
        }

        entries.push(entry);
    }
    entries
}
