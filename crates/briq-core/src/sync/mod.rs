//! Two-phase reconciliation of dirty local entries with the remote table.
//!
//! A sync validates the dirty batch, upserts it, pulls rows modified since the
//! previous watermark and hands back a [`SyncReport`]. The engine never touches
//! the local collection; [`merge_sync_report`] produces the new collection and
//! the lifecycle layer persists it.

mod merge;
mod remote;
mod supabase;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::error::StorageError;
use crate::models::PhotoEntry;
use crate::validate::{ValidationReport, Validator};

pub use merge::{merge_sync_report, MergeSummary, PushedEntry, SyncReport};
pub use remote::{FetchedRows, MemoryRemoteTable, RemoteError, RemoteRow, RemoteTable};
pub use supabase::SupabaseTable;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncPhase {
    #[default]
    Idle,
    Validating,
    Pushing,
    Pulling,
    Merging,
    Error,
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Validating => "validating",
            Self::Pushing => "pushing",
            Self::Pulling => "pulling",
            Self::Merging => "merging",
            Self::Error => "error",
        })
    }
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Sync aborted, invalid entries: {}", .0.summary())]
    Validation(ValidationReport),
    #[error("Sync failed while {phase}: {source}")]
    Remote {
        phase: SyncPhase,
        #[source]
        source: RemoteError,
    },
    #[error("Sync result could not be saved: {0}")]
    Storage(#[from] StorageError),
}

impl SyncError {
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Remote { source, .. } => source.code(),
            Self::Storage(error) => error.code(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    /// Another sync was in flight; nothing happened
    AlreadyRunning,
    Completed(SyncReport),
}

/// Runs at most one sync at a time against a [`RemoteTable`].
pub struct SyncEngine<R> {
    remote: R,
    validator: Validator,
    in_flight: AtomicBool,
    phase: Mutex<SyncPhase>,
}

impl<R: fmt::Debug> fmt::Debug for SyncEngine<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncEngine")
            .field("remote", &self.remote)
            .field("in_flight", &self.in_flight.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

/// Clears the in-flight flag when the sync future completes or is dropped.
struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<R: RemoteTable> SyncEngine<R> {
    pub fn new(remote: R) -> Self {
        Self {
            remote,
            validator: Validator::default(),
            in_flight: AtomicBool::new(false),
            phase: Mutex::new(SyncPhase::Idle),
        }
    }

    #[must_use]
    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validator = validator;
        self
    }

    pub const fn remote(&self) -> &R {
        &self.remote
    }

    pub fn phase(&self) -> SyncPhase {
        self.phase.lock().map(|phase| *phase).unwrap_or(SyncPhase::Error)
    }

    pub fn is_running(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    fn set_phase(&self, phase: SyncPhase) {
        if let Ok(mut current) = self.phase.lock() {
            *current = phase;
        }
        tracing::trace!(%phase, "Sync phase");
    }

    /// Push `dirty`, then pull rows modified after `last_sync`.
    ///
    /// Any invalid entry aborts before the network is touched. A call made
    /// while another sync runs returns [`SyncOutcome::AlreadyRunning`].
    pub async fn sync(
        &self,
        dirty: &[PhotoEntry],
        last_sync: Option<DateTime<Utc>>,
    ) -> Result<SyncOutcome, SyncError> {
        let Some(_guard) = InFlightGuard::acquire(&self.in_flight) else {
            tracing::debug!("Sync already in flight, skipping");
            return Ok(SyncOutcome::AlreadyRunning);
        };

        match self.run(dirty, last_sync).await {
            Ok(report) => {
                self.set_phase(SyncPhase::Idle);
                tracing::info!(
                    pushed = report.pushed.len(),
                    pulled = report.pulled.len(),
                    rejected = report.rejected_remote,
                    "Sync completed"
                );
                Ok(SyncOutcome::Completed(report))
            }
            Err(error) => {
                self.set_phase(SyncPhase::Error);
                tracing::warn!(code = error.code(), "Sync failed: {error}");
                Err(error)
            }
        }
    }

    async fn run(
        &self,
        dirty: &[PhotoEntry],
        last_sync: Option<DateTime<Utc>>,
    ) -> Result<SyncReport, SyncError> {
        self.set_phase(SyncPhase::Validating);
        let report = self.validator.validate_batch(dirty);
        if !report.is_valid() {
            return Err(SyncError::Validation(report));
        }

        self.set_phase(SyncPhase::Pushing);
        if !dirty.is_empty() {
            let rows = dirty.iter().map(RemoteRow::from_entry).collect::<Vec<_>>();
            self.remote
                .upsert(&rows)
                .await
                .map_err(|source| SyncError::Remote {
                    phase: SyncPhase::Pushing,
                    source,
                })?;
        }
        let pushed = dirty.iter().map(PushedEntry::from).collect::<Vec<_>>();

        self.set_phase(SyncPhase::Pulling);
        let synced_at = Utc::now();
        let fetched = self
            .remote
            .fetch_modified_since(last_sync)
            .await
            .map_err(|source| SyncError::Remote {
                phase: SyncPhase::Pulling,
                source,
            })?;

        self.set_phase(SyncPhase::Merging);
        let mut pulled = Vec::with_capacity(fetched.rows.len());
        let mut rejected_remote = fetched.undecodable;
        for row in fetched.rows {
            let entry = row.into_entry();
            let report = self.validator.validate_entry(&entry);
            if report.is_valid() {
                pulled.push(entry);
            } else {
                rejected_remote += 1;
                tracing::warn!(id = %entry.id, "Ignoring invalid remote row: {}", report.summary());
            }
        }

        Ok(SyncReport {
            pushed,
            pulled,
            rejected_remote,
            synced_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EntryId;
    use crate::validate::ValidationCode;
    use async_trait::async_trait;
    use std::sync::Arc;
    use tokio::sync::Notify;

    fn entry(id: &str, text: &str) -> PhotoEntry {
        let now = Utc::now();
        PhotoEntry {
            id: EntryId::from(id),
            text: text.to_string(),
            photo: "data:image/jpeg;base64,AAAA".to_string(),
            images: Vec::new(),
            coords: None,
            created_at: now,
            updated_at: now,
            unsynced: true,
            timestamp: Some(now),
            tags: Vec::new(),
            author: None,
            location: None,
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn pushes_dirty_entries_and_pulls_changes() {
        let engine = SyncEngine::new(MemoryRemoteTable::new());
        let dirty = vec![entry("A", "Riss"), entry("B", "Fenster")];

        let SyncOutcome::Completed(report) = engine.sync(&dirty, None).await.unwrap() else {
            panic!("expected a completed sync");
        };
        assert_eq!(engine.remote().rows().len(), 2);
        assert_eq!(report.pushed.len(), 2);
        assert_eq!(report.pulled.len(), 2);
        assert!(report.pulled.iter().all(|entry| !entry.unsynced));
        assert_eq!(engine.phase(), SyncPhase::Idle);
        assert!(!engine.is_running());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn invalid_batch_aborts_before_push() {
        let engine = SyncEngine::new(MemoryRemoteTable::new());
        let dirty = vec![entry("A", "Riss"), entry("B", "  ")];

        let error = engine.sync(&dirty, None).await.unwrap_err();
        let SyncError::Validation(report) = &error else {
            panic!("expected validation error, got {error:?}");
        };
        assert_eq!(report.codes(), vec![ValidationCode::MissingText]);
        assert!(report.errors[0].message.starts_with("Entry 2:"));
        assert_eq!(error.code(), "VALIDATION_ERROR");
        assert_eq!(engine.remote().upsert_calls(), 0);
        assert_eq!(engine.phase(), SyncPhase::Error);
        assert!(!engine.is_running());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn push_failure_reports_network_error() {
        let remote = MemoryRemoteTable::new();
        remote.set_fail_upsert(true);
        let engine = SyncEngine::new(remote);

        let error = engine.sync(&[entry("A", "Riss")], None).await.unwrap_err();
        assert!(matches!(
            error,
            SyncError::Remote {
                phase: SyncPhase::Pushing,
                ..
            }
        ));
        assert_eq!(error.code(), "NETWORK_ERROR");
        assert!(engine.remote().rows().is_empty());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn empty_batch_skips_upsert_but_still_pulls() {
        let remote = MemoryRemoteTable::new();
        let mut row = RemoteRow::from_entry(&entry("R", "vom Server"));
        row.last_modified = Some(Utc::now());
        remote.insert_rows([row]);
        let engine = SyncEngine::new(remote);

        let SyncOutcome::Completed(report) = engine.sync(&[], None).await.unwrap() else {
            panic!("expected a completed sync");
        };
        assert_eq!(engine.remote().upsert_calls(), 0);
        assert_eq!(report.pulled.len(), 1);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn invalid_remote_rows_are_dropped() {
        let remote = MemoryRemoteTable::new();
        let mut row = RemoteRow::from_entry(&entry("R", "x"));
        row.text = String::new();
        row.last_modified = Some(Utc::now());
        remote.insert_rows([row]);
        let engine = SyncEngine::new(remote);

        let SyncOutcome::Completed(report) = engine.sync(&[], None).await.unwrap() else {
            panic!("expected a completed sync");
        };
        assert!(report.pulled.is_empty());
        assert_eq!(report.rejected_remote, 1);
    }

    /// Serves a fixed response body through the row decoder.
    struct RawBodyRemote {
        body: &'static str,
    }

    #[async_trait]
    impl RemoteTable for RawBodyRemote {
        async fn upsert(&self, _rows: &[RemoteRow]) -> Result<(), RemoteError> {
            Ok(())
        }

        async fn fetch_modified_since(
            &self,
            _since: Option<DateTime<Utc>>,
        ) -> Result<FetchedRows, RemoteError> {
            FetchedRows::decode(self.body)
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn malformed_remote_row_does_not_fail_the_pull() {
        let engine = SyncEngine::new(RawBodyRemote {
            body: r#"[
                {"id":"good","text":"Riss im Putz","photo":"https://cdn.example.com/g.jpg","created_at":"2024-05-10T09:00:00Z","updated_at":"2024-05-10T09:00:00Z"},
                {"id":"null-text","text":null,"photo":"p","created_at":"2024-05-10T09:00:00Z","updated_at":"2024-05-10T09:00:00Z"}
            ]"#,
        });

        let SyncOutcome::Completed(report) = engine.sync(&[entry("A", "Riss")], None).await.unwrap()
        else {
            panic!("expected a completed sync");
        };
        assert_eq!(report.pushed.len(), 1);
        assert_eq!(report.pulled.len(), 1);
        assert_eq!(report.pulled[0].id.as_str(), "good");
        assert_eq!(report.rejected_remote, 1);
        assert_eq!(engine.phase(), SyncPhase::Idle);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn watermark_is_taken_before_pull() {
        let engine = SyncEngine::new(MemoryRemoteTable::new());
        let before = Utc::now();
        let SyncOutcome::Completed(report) = engine.sync(&[entry("A", "Riss")], None).await.unwrap()
        else {
            panic!("expected a completed sync");
        };
        let pushed_modified = engine.remote().rows()[0].last_modified.unwrap();

        assert!(report.synced_at >= before);
        assert!(report.synced_at >= pushed_modified);
    }

    /// Remote whose upsert blocks until released.
    struct GatedRemote {
        inner: MemoryRemoteTable,
        release: Arc<Notify>,
    }

    #[async_trait]
    impl RemoteTable for GatedRemote {
        async fn upsert(&self, rows: &[RemoteRow]) -> Result<(), RemoteError> {
            self.release.notified().await;
            self.inner.upsert(rows).await
        }

        async fn fetch_modified_since(
            &self,
            since: Option<DateTime<Utc>>,
        ) -> Result<FetchedRows, RemoteError> {
            self.inner.fetch_modified_since(since).await
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn concurrent_sync_is_a_no_op() {
        let release = Arc::new(Notify::new());
        let engine = SyncEngine::new(GatedRemote {
            inner: MemoryRemoteTable::new(),
            release: Arc::clone(&release),
        });
        let dirty = vec![entry("A", "Riss")];

        let (first, second) = tokio::join!(engine.sync(&dirty, None), async {
            while engine.phase() != SyncPhase::Pushing {
                tokio::task::yield_now().await;
            }
            let second = engine.sync(&dirty, None).await;
            release.notify_one();
            second
        });

        assert!(matches!(second, Ok(SyncOutcome::AlreadyRunning)));
        assert!(matches!(first, Ok(SyncOutcome::Completed(_))));
        assert_eq!(engine.remote().inner.upsert_calls(), 1);
        assert!(!engine.is_running());
    }
}
