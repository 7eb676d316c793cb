//! Remote table contract and the row shape it exchanges.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{Coordinates, EntryId, PhotoEntry};

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Invalid remote configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Remote request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Remote API error: {message}")]
    Api { status: u16, message: String },
    #[error("Invalid remote payload: {0}")]
    InvalidPayload(String),
    /// Remote not reachable; raised by in-process tables
    #[error("Remote unavailable: {0}")]
    Unavailable(String),
}

impl RemoteError {
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfiguration(_) => "CONFIGURATION_ERROR",
            Self::Http(error) if error.is_timeout() => "TIMEOUT",
            Self::Http(_) | Self::Unavailable(_) => "NETWORK_ERROR",
            Self::Api { .. } | Self::InvalidPayload(_) => "SERVER_ERROR",
        }
    }
}

/// One row of the remote table.
///
/// Columns mirror [`PhotoEntry`] in snake case with coordinates flattened,
/// plus the server-maintained `last_modified` used for incremental pulls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteRow {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub photo: String,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    /// Set by the table on every write; omitted on upsert
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
}

impl RemoteRow {
    #[must_use]
    pub fn from_entry(entry: &PhotoEntry) -> Self {
        Self {
            id: entry.id.to_string(),
            text: entry.text.clone(),
            photo: entry.photo.clone(),
            images: entry.images.clone(),
            latitude: entry.coords.map(|coords| coords.latitude),
            longitude: entry.coords.map(|coords| coords.longitude),
            created_at: entry.created_at,
            updated_at: entry.updated_at,
            timestamp: entry.timestamp,
            tags: entry.tags.clone(),
            author: entry.author.clone(),
            location: entry.location.clone(),
            last_modified: None,
        }
    }

    /// Convert to a local entry confirmed by the remote (`unsynced = false`).
    ///
    /// A row with only one of latitude/longitude has no coordinates.
    #[must_use]
    pub fn into_entry(self) -> PhotoEntry {
        let coords = match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Some(Coordinates::new(latitude, longitude)),
            _ => None,
        };
        PhotoEntry {
            id: EntryId::from(self.id),
            text: self.text,
            photo: self.photo,
            images: self.images,
            coords,
            created_at: self.created_at,
            updated_at: self.updated_at,
            unsynced: false,
            timestamp: self.timestamp,
            tags: self.tags,
            author: self.author,
            location: self.location,
        }
    }
}

/// Result of a pull. Rows that do not decode as [`RemoteRow`] are counted in
/// `undecodable` and left out of `rows`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchedRows {
    pub rows: Vec<RemoteRow>,
    pub undecodable: usize,
}

impl FetchedRows {
    /// Decode a JSON response body row by row.
    pub fn decode(body: &str) -> Result<Self, RemoteError> {
        let values = serde_json::from_str::<Vec<serde_json::Value>>(body)
            .map_err(|error| RemoteError::InvalidPayload(error.to_string()))?;
        Ok(Self::from_values(values))
    }

    #[must_use]
    pub fn from_values(values: Vec<serde_json::Value>) -> Self {
        let mut fetched = Self {
            rows: Vec::with_capacity(values.len()),
            undecodable: 0,
        };
        for (index, value) in values.into_iter().enumerate() {
            let id = value
                .get("id")
                .and_then(serde_json::Value::as_str)
                .map(str::to_string);
            match serde_json::from_value::<RemoteRow>(value) {
                Ok(row) => fetched.rows.push(row),
                Err(error) => {
                    fetched.undecodable += 1;
                    tracing::warn!(index, id = ?id, "Dropping malformed remote row: {error}");
                }
            }
        }
        fetched
    }
}

impl From<Vec<RemoteRow>> for FetchedRows {
    fn from(rows: Vec<RemoteRow>) -> Self {
        Self {
            rows,
            undecodable: 0,
        }
    }
}

/// Table keyed by entry id supporting upsert and time-filtered select.
#[async_trait]
pub trait RemoteTable: Send + Sync {
    /// Insert or overwrite rows by id.
    async fn upsert(&self, rows: &[RemoteRow]) -> Result<(), RemoteError>;

    /// Rows whose `last_modified` is strictly after `since`, oldest first.
    /// `None` fetches everything.
    async fn fetch_modified_since(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<FetchedRows, RemoteError>;
}

/// In-process table for tests and offline demos.
///
/// Every upsert stamps `last_modified` with the current time. Failures can be
/// injected per operation.
#[derive(Debug, Default)]
pub struct MemoryRemoteTable {
    rows: Mutex<Vec<RemoteRow>>,
    fail_upsert: AtomicBool,
    fail_fetch: AtomicBool,
    upsert_calls: AtomicUsize,
}

impl MemoryRemoteTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed rows as they would exist remotely, keeping their `last_modified`.
    pub fn insert_rows(&self, rows: impl IntoIterator<Item = RemoteRow>) {
        if let Ok(mut stored) = self.rows.lock() {
            for row in rows {
                upsert_row(&mut stored, row);
            }
        }
    }

    #[must_use]
    pub fn rows(&self) -> Vec<RemoteRow> {
        self.rows.lock().map(|rows| rows.clone()).unwrap_or_default()
    }

    pub fn set_fail_upsert(&self, fail: bool) {
        self.fail_upsert.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_fetch(&self, fail: bool) {
        self.fail_fetch.store(fail, Ordering::SeqCst);
    }

    #[must_use]
    pub fn upsert_calls(&self) -> usize {
        self.upsert_calls.load(Ordering::SeqCst)
    }
}

fn upsert_row(rows: &mut Vec<RemoteRow>, row: RemoteRow) {
    match rows.iter_mut().find(|existing| existing.id == row.id) {
        Some(existing) => *existing = row,
        None => rows.push(row),
    }
}

#[async_trait]
impl RemoteTable for MemoryRemoteTable {
    async fn upsert(&self, rows: &[RemoteRow]) -> Result<(), RemoteError> {
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_upsert.load(Ordering::SeqCst) {
            return Err(RemoteError::Unavailable("simulated network error".to_string()));
        }

        let now = Utc::now();
        let mut stored = self
            .rows
            .lock()
            .map_err(|_| RemoteError::Unavailable("remote table lock poisoned".to_string()))?;
        for row in rows {
            let mut row = row.clone();
            row.last_modified = Some(now);
            upsert_row(&mut stored, row);
        }
        Ok(())
    }

    async fn fetch_modified_since(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<FetchedRows, RemoteError> {
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(RemoteError::Unavailable("simulated network error".to_string()));
        }

        let stored = self
            .rows
            .lock()
            .map_err(|_| RemoteError::Unavailable("remote table lock poisoned".to_string()))?;
        let mut rows = stored
            .iter()
            .filter(|row| match (since, row.last_modified) {
                (None, _) => true,
                (Some(since), Some(modified)) => modified > since,
                (Some(_), None) => false,
            })
            .cloned()
            .collect::<Vec<_>>();
        rows.sort_by_key(|row| row.last_modified);
        Ok(rows.into())
    }
}
