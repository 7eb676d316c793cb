//! Applying a sync report to the local collection.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{EntryId, PhotoEntry};

/// An entry as it was snapshotted for push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushedEntry {
    pub id: EntryId,
    pub updated_at: DateTime<Utc>,
}

impl From<&PhotoEntry> for PushedEntry {
    fn from(entry: &PhotoEntry) -> Self {
        Self {
            id: entry.id.clone(),
            updated_at: entry.updated_at,
        }
    }
}

/// Result of one successful sync, ready to merge.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncReport {
    /// Entries written to the remote table
    pub pushed: Vec<PushedEntry>,
    /// Valid remote rows modified since the previous sync
    pub pulled: Vec<PhotoEntry>,
    /// Remote rows dropped for failing validation
    pub rejected_remote: usize,
    /// New watermark, captured before the pull
    pub synced_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeSummary {
    /// Pushed entries now marked clean
    pub confirmed: usize,
    /// Local entries overwritten by a pulled row
    pub replaced: usize,
    /// Pulled rows that were new locally
    pub added: usize,
    /// Entries changed or created while the sync ran; still dirty
    pub kept_dirty: usize,
}

/// Merge `report` into `local`.
///
/// Pushed entries become clean and pulled rows overwrite local entries with
/// the same id or are appended. An entry whose `updated_at` no longer matches
/// its pushed snapshot was edited mid-sync, and a dirty entry outside the push
/// batch was created mid-sync: both keep their local content and stay dirty.
/// Local order is preserved and ids stay unique.
#[must_use]
pub fn merge_sync_report(
    local: Vec<PhotoEntry>,
    report: &SyncReport,
) -> (Vec<PhotoEntry>, MergeSummary) {
    let pushed = report
        .pushed
        .iter()
        .map(|entry| (&entry.id, entry.updated_at))
        .collect::<HashMap<_, _>>();

    // Later rows win when the pull returned one id twice
    let mut pulled_order = Vec::new();
    let mut pulled = HashMap::new();
    for row in &report.pulled {
        if pulled.insert(&row.id, row).is_none() {
            pulled_order.push(&row.id);
        }
    }

    let mut summary = MergeSummary::default();
    let mut seen = HashSet::new();
    let mut merged = Vec::with_capacity(local.len() + pulled.len());

    for mut entry in local {
        if !seen.insert(entry.id.clone()) {
            continue;
        }

        let untouched_since_push = match pushed.get(&entry.id) {
            Some(snapshot) => *snapshot == entry.updated_at,
            None => !entry.unsynced,
        };
        if !untouched_since_push {
            summary.kept_dirty += 1;
            merged.push(entry);
            continue;
        }

        if pushed.contains_key(&entry.id) {
            summary.confirmed += 1;
            entry.unsynced = false;
        }
        if let Some(remote) = pulled.get(&entry.id) {
            summary.replaced += 1;
            entry = (*remote).clone();
        }
        merged.push(entry);
    }

    for id in pulled_order {
        if seen.insert(id.clone()) {
            if let Some(remote) = pulled.get(id) {
                summary.added += 1;
                merged.push((*remote).clone());
            }
        }
    }

    (merged, summary)
}
