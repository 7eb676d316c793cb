//! Photo entry model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::Coordinates;

/// Opaque entry identifier.
///
/// Fresh ids are UUID v7 strings (time-sortable); ids pulled from the remote
/// table are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(String);

impl EntryId {
    /// Create a new unique entry ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 13 characters, enough to disambiguate in listings.
    #[must_use]
    pub fn short(&self) -> String {
        self.0.chars().take(13).collect()
    }

    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl Default for EntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for EntryId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for EntryId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// One documentation record: text, photo, optional location and timestamps.
///
/// Serialized with camelCase keys (`createdAt`, `updatedAt`), the layout of the
/// persisted entry collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoEntry {
    pub id: EntryId,
    pub text: String,
    /// Data URI or remote URL of the primary photo
    #[serde(default)]
    pub photo: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coords: Option<Coordinates>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Local state not yet confirmed by the remote table
    #[serde(default)]
    pub unsynced: bool,
    /// Display/sort timestamp; falls back to `created_at`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Free-text site label (building, floor, room)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl PhotoEntry {
    #[must_use]
    pub fn display_timestamp(&self) -> DateTime<Utc> {
        self.timestamp.unwrap_or(self.created_at)
    }

    #[must_use]
    pub const fn is_geotagged(&self) -> bool {
        self.coords.is_some()
    }

    /// First line of the text, whitespace collapsed, truncated to `max_len` characters
    #[must_use]
    pub fn title_preview(&self, max_len: usize) -> String {
        let first_line = self.text.lines().next().unwrap_or("").trim();
        let collapsed = first_line.split_whitespace().collect::<Vec<_>>().join(" ");
        crate::util::truncate_text(&collapsed, max_len)
    }
}
