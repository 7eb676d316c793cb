//! In-process slot backend

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use super::SlotBackend;
use crate::error::StorageError;

/// Slots held in memory, optionally capped at a total byte quota the way a
/// browser storage area is.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    slots: Mutex<HashMap<String, String>>,
    quota: Option<usize>,
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject writes that would push the total stored bytes past `quota`.
    #[must_use]
    pub fn with_quota(quota: usize) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            quota: Some(quota),
        }
    }

    fn slots(&self) -> Result<MutexGuard<'_, HashMap<String, String>>, StorageError> {
        self.slots
            .lock()
            .map_err(|_| StorageError::Backend("memory backend lock poisoned".to_string()))
    }
}

impl SlotBackend for MemoryBackend {
    fn read_slot(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.slots()?.get(key).cloned())
    }

    fn write_slot(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut slots = self.slots()?;
        if let Some(quota) = self.quota {
            let others = slots
                .iter()
                .filter(|(existing, _)| existing.as_str() != key)
                .map(|(existing, stored)| existing.len() + stored.len())
                .sum::<usize>();
            let needed = key.len() + value.len();
            let available = quota.saturating_sub(others);
            if needed > available {
                return Err(StorageError::QuotaExceeded { needed, available });
            }
        }
        slots.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_slot(&self, key: &str) -> Result<(), StorageError> {
        self.slots()?.remove(key);
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
