//! Entry lifecycle: the single mutation surface over the local collection.
//!
//! Every mutation validates, builds the next collection, persists it and only
//! then replaces the in-memory state, so a failed write leaves both the store
//! and the manager as they were. Each operation reports a short status line to
//! an optional listener.

use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};
use thiserror::Error;

use crate::error::StorageError;
use crate::models::{EntryDraft, EntryId, EntryPatch, PhotoEntry, StagedImage};
use crate::store::{EntryStore, SlotBackend};
use crate::sync::{
    merge_sync_report, MergeSummary, RemoteTable, SyncEngine, SyncError, SyncOutcome, SyncReport,
};
use crate::validate::{parse_timestamp, ValidationReport};

pub type StatusListener = Box<dyn Fn(&str) + Send + Sync>;

#[derive(Debug, Error)]
pub enum EntryError {
    #[error("Invalid entry: {}", .0.summary())]
    Validation(ValidationReport),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("Entry not found: {0}")]
    NotFound(String),
    #[error("Entry ID prefix is ambiguous: {0}")]
    Ambiguous(String),
    #[error("Entry {0} has not been synchronized yet")]
    Unsynced(EntryId),
}

impl EntryError {
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Storage(error) => error.code(),
            Self::NotFound(_) => "NOT_FOUND",
            Self::Ambiguous(_) => "AMBIGUOUS_ID",
            Self::Unsynced(_) => "UNSYNCED_ENTRY",
        }
    }
}

/// Result of [`EntryManager::sync_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncRun {
    AlreadyRunning,
    Completed(MergeSummary),
    /// Entries were merged and saved but the sync time was not, so the next
    /// sync pulls the same rows again.
    WatermarkNotSaved(MergeSummary),
}

/// Result of [`EntryManager::apply_sync`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppliedSync {
    pub summary: MergeSummary,
    pub watermark_saved: bool,
}

pub struct EntryManager<B> {
    store: EntryStore<B>,
    entries: Vec<PhotoEntry>,
    listener: Option<StatusListener>,
}

impl<B> fmt::Debug for EntryManager<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryManager")
            .field("entries", &self.entries.len())
            .field("listener", &self.listener.is_some())
            .finish_non_exhaustive()
    }
}

impl<B: SlotBackend> EntryManager<B> {
    /// Load the persisted collection.
    pub fn open(store: EntryStore<B>) -> Self {
        let entries = store.load();
        tracing::debug!(count = entries.len(), "Loaded entries");
        Self {
            store,
            entries,
            listener: None,
        }
    }

    #[must_use]
    pub fn with_status_listener(mut self, listener: StatusListener) -> Self {
        self.listener = Some(listener);
        self
    }

    pub const fn store(&self) -> &EntryStore<B> {
        &self.store
    }

    pub fn entries(&self) -> &[PhotoEntry] {
        &self.entries
    }

    pub fn get(&self, id: &EntryId) -> Option<&PhotoEntry> {
        self.entries.iter().find(|entry| &entry.id == id)
    }

    /// Resolve a full id or a unique id prefix.
    pub fn find_by_prefix(&self, prefix: &str) -> Result<&PhotoEntry, EntryError> {
        let prefix = prefix.trim();
        if prefix.is_empty() {
            return Err(EntryError::NotFound(prefix.to_string()));
        }
        if let Some(entry) = self.entries.iter().find(|entry| entry.id.as_str() == prefix) {
            return Ok(entry);
        }

        let mut matches = self
            .entries
            .iter()
            .filter(|entry| entry.id.as_str().starts_with(prefix));
        match (matches.next(), matches.next()) {
            (Some(entry), None) => Ok(entry),
            (Some(_), Some(_)) => Err(EntryError::Ambiguous(prefix.to_string())),
            (None, _) => Err(EntryError::NotFound(prefix.to_string())),
        }
    }

    /// Entries not yet confirmed by the remote table.
    pub fn dirty_entries(&self) -> Vec<PhotoEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.unsynced)
            .cloned()
            .collect()
    }

    pub fn last_sync(&self) -> Option<DateTime<Utc>> {
        self.store.last_sync()
    }

    /// Validate and store a new entry.
    pub fn add_entry(&mut self, draft: EntryDraft) -> Result<PhotoEntry, EntryError> {
        let result = self.try_add(draft);
        self.report(&result, "New entry saved");
        result
    }

    fn try_add(&mut self, draft: EntryDraft) -> Result<PhotoEntry, EntryError> {
        let now = Utc::now();
        let report = self.store.validator().validate_draft(&draft, now);
        if !report.is_valid() {
            return Err(EntryError::Validation(report));
        }

        let photo = match draft.photo.filter(|photo| !photo.trim().is_empty()) {
            Some(photo) => photo,
            None => draft
                .image
                .as_ref()
                .map(StagedImage::to_data_uri)
                .unwrap_or_default(),
        };
        let timestamp = draft
            .timestamp
            .as_deref()
            .and_then(parse_timestamp)
            .unwrap_or(now);

        let entry = PhotoEntry {
            id: EntryId::new(),
            text: draft.text.trim().to_string(),
            photo,
            images: draft.images,
            coords: draft.coords,
            created_at: now,
            updated_at: now,
            unsynced: true,
            timestamp: Some(timestamp),
            tags: draft.tags,
            author: draft.author,
            location: draft.location,
        };

        let mut next = self.entries.clone();
        next.push(entry.clone());
        self.commit(next)?;
        tracing::info!(id = %entry.id, "Entry created");
        Ok(entry)
    }

    /// Merge `patch` into an entry. The entry becomes dirty even when the
    /// patch is empty.
    pub fn update_entry(
        &mut self,
        id: &EntryId,
        patch: EntryPatch,
    ) -> Result<PhotoEntry, EntryError> {
        let result = self.try_update(id, patch);
        self.report(&result, "Entry updated");
        result
    }

    fn try_update(&mut self, id: &EntryId, patch: EntryPatch) -> Result<PhotoEntry, EntryError> {
        let now = Utc::now();
        let report = self.store.validator().validate_patch(&patch, now);
        if !report.is_valid() {
            return Err(EntryError::Validation(report));
        }
        let index = self.index_of(id)?;

        let mut next = self.entries.clone();
        let entry = &mut next[index];
        patch.apply_to(entry);
        entry.updated_at = later_than(entry.updated_at, now);
        entry.unsynced = true;
        let updated = entry.clone();

        self.commit(next)?;
        tracing::info!(id = %updated.id, "Entry updated");
        Ok(updated)
    }

    /// Remove a synchronized entry. Unsynced entries are refused.
    pub fn delete_entry(&mut self, id: &EntryId) -> Result<PhotoEntry, EntryError> {
        let result = self.try_delete(id, false);
        self.report(&result, "Entry deleted");
        result
    }

    /// Remove an entry whether or not it was synchronized.
    pub fn force_delete_entry(&mut self, id: &EntryId) -> Result<PhotoEntry, EntryError> {
        let result = self.try_delete(id, true);
        self.report(&result, "Entry deleted");
        result
    }

    fn try_delete(&mut self, id: &EntryId, force: bool) -> Result<PhotoEntry, EntryError> {
        let index = self.index_of(id)?;
        if !force && self.entries[index].unsynced {
            return Err(EntryError::Unsynced(id.clone()));
        }

        let mut next = self.entries.clone();
        let removed = next.remove(index);
        self.commit(next)?;
        tracing::info!(id = %removed.id, force, "Entry deleted");
        Ok(removed)
    }

    /// Merge a sync report, then persist the collection and the watermark.
    ///
    /// Fails only when the merged collection cannot be saved. A watermark that
    /// cannot be saved leaves the merge in place and is reported through
    /// [`AppliedSync::watermark_saved`].
    pub fn apply_sync(&mut self, report: &SyncReport) -> Result<AppliedSync, StorageError> {
        let (merged, summary) = merge_sync_report(self.entries.clone(), report);
        self.store.save(&merged)?;
        self.entries = merged;

        let watermark_saved = match self.store.save_last_sync(report.synced_at) {
            Ok(()) => true,
            Err(error) => {
                tracing::warn!(code = error.code(), "Failed to save sync time: {error}");
                false
            }
        };

        tracing::info!(
            confirmed = summary.confirmed,
            replaced = summary.replaced,
            added = summary.added,
            kept_dirty = summary.kept_dirty,
            watermark_saved,
            "Applied sync result"
        );
        Ok(AppliedSync {
            summary,
            watermark_saved,
        })
    }

    /// Snapshot dirty entries, run `engine` and apply the result.
    pub async fn sync_with<R: RemoteTable>(
        &mut self,
        engine: &SyncEngine<R>,
    ) -> Result<SyncRun, SyncError> {
        let dirty = self.dirty_entries();
        let last_sync = self.store.last_sync();

        let outcome = match engine.sync(&dirty, last_sync).await {
            Ok(outcome) => outcome,
            Err(error) => {
                self.notify(&format!("Sync failed: {error}"));
                return Err(error);
            }
        };

        match outcome {
            SyncOutcome::AlreadyRunning => {
                self.notify("Sync already in progress");
                Ok(SyncRun::AlreadyRunning)
            }
            SyncOutcome::Completed(report) => match self.apply_sync(&report) {
                Ok(AppliedSync {
                    summary,
                    watermark_saved,
                }) => {
                    let mut message = if summary.added > 0 {
                        format!(
                            "{} entries synchronized, {} received",
                            summary.confirmed, summary.added
                        )
                    } else {
                        format!("{} entries synchronized", summary.confirmed)
                    };
                    if watermark_saved {
                        self.notify(&message);
                        Ok(SyncRun::Completed(summary))
                    } else {
                        message.push_str("; sync time could not be saved");
                        self.notify(&message);
                        Ok(SyncRun::WatermarkNotSaved(summary))
                    }
                }
                Err(error) => {
                    let error = SyncError::from(error);
                    self.notify(&format!("Sync failed: {error}"));
                    Err(error)
                }
            },
        }
    }

    fn index_of(&self, id: &EntryId) -> Result<usize, EntryError> {
        self.entries
            .iter()
            .position(|entry| &entry.id == id)
            .ok_or_else(|| EntryError::NotFound(id.to_string()))
    }

    fn commit(&mut self, next: Vec<PhotoEntry>) -> Result<(), StorageError> {
        self.store.save(&next)?;
        self.entries = next;
        Ok(())
    }

    fn report(&self, result: &Result<PhotoEntry, EntryError>, success: &str) {
        match result {
            Ok(_) => self.notify(success),
            Err(EntryError::Unsynced(_)) => {
                self.notify("Entry has not been synchronized yet and cannot be deleted");
            }
            Err(error) => {
                tracing::warn!(code = error.code(), "Entry operation failed: {error}");
                self.notify(&format!("Failed to save entry: {error}"));
            }
        }
    }

    fn notify(&self, message: &str) {
        if let Some(listener) = &self.listener {
            listener(message);
        }
    }
}

/// `now`, or the smallest representable step after `previous` when the clock
/// has not moved past it.
fn later_than(previous: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    if now > previous {
        now
    } else {
        previous + TimeDelta::microseconds(1)
    }
}
