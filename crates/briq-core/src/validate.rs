//! Structural validation for entries, drafts and patches.
//!
//! Validation never short-circuits: every applicable rule is evaluated and each
//! violation becomes one tagged [`ValidationError`], so callers can report all
//! problems at once.

use std::fmt;
use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::models::{Coordinates, EntryDraft, EntryPatch, PhotoEntry};

/// Maximum note length in characters
pub const MAX_TEXT_LENGTH: usize = 1000;
/// Maximum photo payload in bytes
pub const MAX_PHOTO_SIZE: usize = 5_000_000;
/// Oldest permitted entry timestamp, in days
pub const MAX_ENTRY_AGE_DAYS: i64 = 365;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationCode {
    MissingText,
    MissingPhoto,
    InvalidPhotoFormat,
    PhotoTooLarge,
    TextTooLong,
    InvalidCoordinates,
    InvalidTimestamp,
    FutureTimestamp,
    TooOldTimestamp,
    InvalidFormat,
}

impl ValidationCode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MissingText => "MISSING_TEXT",
            Self::MissingPhoto => "MISSING_PHOTO",
            Self::InvalidPhotoFormat => "INVALID_PHOTO_FORMAT",
            Self::PhotoTooLarge => "PHOTO_TOO_LARGE",
            Self::TextTooLong => "TEXT_TOO_LONG",
            Self::InvalidCoordinates => "INVALID_COORDINATES",
            Self::InvalidTimestamp => "INVALID_TIMESTAMP",
            Self::FutureTimestamp => "FUTURE_TIMESTAMP",
            Self::TooOldTimestamp => "TOO_OLD_TIMESTAMP",
            Self::InvalidFormat => "INVALID_FORMAT",
        }
    }
}

impl fmt::Display for ValidationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entry field a validation error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryField {
    Id,
    Text,
    Photo,
    Image,
    Coords,
    Timestamp,
    UpdatedAt,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    pub code: ValidationCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<EntryField>,
}

impl ValidationError {
    #[must_use]
    pub fn new(code: ValidationCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            field: None,
        }
    }

    #[must_use]
    pub const fn with_field(mut self, field: EntryField) -> Self {
        self.field = Some(field);
        self
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Outcome of a validation pass. Empty means valid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub errors: Vec<ValidationError>,
}

impl ValidationReport {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    #[must_use]
    pub fn codes(&self) -> Vec<ValidationCode> {
        self.errors.iter().map(|error| error.code).collect()
    }

    #[must_use]
    pub fn has(&self, code: ValidationCode) -> bool {
        self.errors.iter().any(|error| error.code == code)
    }

    pub fn push(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn extend(&mut self, other: Self) {
        self.errors.extend(other.errors);
    }

    /// All messages joined for a single status line.
    #[must_use]
    pub fn summary(&self) -> String {
        self.errors
            .iter()
            .map(|error| error.message.as_str())
            .collect::<Vec<_>>()
            .join("; ")
    }

    pub fn into_result(self) -> Result<(), Self> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationLimits {
    pub max_text_length: usize,
    pub max_photo_bytes: usize,
    pub max_entry_age: TimeDelta,
}

impl Default for ValidationLimits {
    fn default() -> Self {
        Self {
            max_text_length: MAX_TEXT_LENGTH,
            max_photo_bytes: MAX_PHOTO_SIZE,
            max_entry_age: TimeDelta::days(MAX_ENTRY_AGE_DAYS),
        }
    }
}

/// Stateless validator parameterised by [`ValidationLimits`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Validator {
    limits: ValidationLimits,
}

impl Validator {
    #[must_use]
    pub const fn new(limits: ValidationLimits) -> Self {
        Self { limits }
    }

    #[must_use]
    pub const fn limits(&self) -> &ValidationLimits {
        &self.limits
    }

    /// Structural rules every stored or synced entry must satisfy.
    #[must_use]
    pub fn validate_entry(&self, entry: &PhotoEntry) -> ValidationReport {
        let mut report = ValidationReport::default();

        if entry.id.is_blank() {
            report.push(
                ValidationError::new(ValidationCode::InvalidFormat, "Entry id is required")
                    .with_field(EntryField::Id),
            );
        }
        check_text_present(&entry.text, &mut report);
        if entry.photo.trim().is_empty() {
            report.push(missing_photo());
        }
        check_coords(entry.coords.as_ref(), &mut report);
        if entry.updated_at < entry.created_at {
            report.push(
                ValidationError::new(
                    ValidationCode::InvalidTimestamp,
                    "updatedAt must not be earlier than createdAt",
                )
                .with_field(EntryField::UpdatedAt),
            );
        }

        report
    }

    /// Rules for user input about to become a new entry.
    #[must_use]
    pub fn validate_draft(&self, draft: &EntryDraft, now: DateTime<Utc>) -> ValidationReport {
        let mut report = ValidationReport::default();

        check_text_present(&draft.text, &mut report);
        self.check_text_length(&draft.text, &mut report);

        let photo = draft
            .photo
            .as_deref()
            .filter(|photo| !photo.trim().is_empty());
        match (photo, draft.image.as_ref()) {
            (None, None) => report.push(missing_photo()),
            (photo, image) => {
                if let Some(photo) = photo {
                    self.check_embedded_photo(photo, &mut report);
                }
                if let Some(image) = image {
                    if !image.is_image() {
                        report.push(
                            ValidationError::new(
                                ValidationCode::InvalidPhotoFormat,
                                format!("{} is not an image", image.file_name),
                            )
                            .with_field(EntryField::Image),
                        );
                    }
                    if image.size() > self.limits.max_photo_bytes {
                        report.push(self.photo_too_large(EntryField::Image));
                    }
                }
            }
        }

        check_coords(draft.coords.as_ref(), &mut report);
        if let Some(raw) = draft.timestamp.as_deref() {
            report.extend(self.validate_timestamp(raw, now));
        }

        report
    }

    /// Rules for the fields a patch actually sets.
    #[must_use]
    pub fn validate_patch(&self, patch: &EntryPatch, now: DateTime<Utc>) -> ValidationReport {
        let mut report = ValidationReport::default();

        if let Some(text) = patch.text.as_deref() {
            check_text_present(text, &mut report);
            self.check_text_length(text, &mut report);
        }
        if let Some(photo) = patch.photo.as_deref() {
            if photo.trim().is_empty() {
                report.push(missing_photo());
            } else {
                self.check_embedded_photo(photo, &mut report);
            }
        }
        check_coords(patch.coords.as_ref(), &mut report);
        if let Some(timestamp) = patch.timestamp {
            self.check_timestamp_range(timestamp, now, &mut report);
        }

        report
    }

    /// A timestamp must parse, must not lie in the future and must not be
    /// older than the permitted entry age.
    #[must_use]
    pub fn validate_timestamp(&self, raw: &str, now: DateTime<Utc>) -> ValidationReport {
        let mut report = ValidationReport::default();

        let Some(timestamp) = parse_timestamp(raw) else {
            report.push(
                ValidationError::new(ValidationCode::InvalidTimestamp, "Invalid timestamp format")
                    .with_field(EntryField::Timestamp),
            );
            return report;
        };

        self.check_timestamp_range(timestamp, now, &mut report);
        report
    }

    /// Aggregate [`Self::validate_entry`] over a batch, numbering messages by
    /// position.
    #[must_use]
    pub fn validate_batch(&self, entries: &[PhotoEntry]) -> ValidationReport {
        let mut report = ValidationReport::default();
        for (index, entry) in entries.iter().enumerate() {
            for mut error in self.validate_entry(entry).errors {
                error.message = format!("Entry {}: {}", index + 1, error.message);
                report.push(error);
            }
        }
        report
    }

    fn check_timestamp_range(
        &self,
        timestamp: DateTime<Utc>,
        now: DateTime<Utc>,
        report: &mut ValidationReport,
    ) {
        if timestamp > now {
            report.push(
                ValidationError::new(
                    ValidationCode::FutureTimestamp,
                    "Timestamp cannot be in the future",
                )
                .with_field(EntryField::Timestamp),
            );
        } else if timestamp < now - self.limits.max_entry_age {
            report.push(
                ValidationError::new(
                    ValidationCode::TooOldTimestamp,
                    format!(
                        "Entry cannot be older than {} days",
                        self.limits.max_entry_age.num_days()
                    ),
                )
                .with_field(EntryField::Timestamp),
            );
        }
    }

    fn check_text_length(&self, text: &str, report: &mut ValidationReport) {
        let length = text.chars().count();
        if length > self.limits.max_text_length {
            report.push(
                ValidationError::new(
                    ValidationCode::TextTooLong,
                    format!(
                        "Text must not exceed {} characters ({length} given)",
                        self.limits.max_text_length
                    ),
                )
                .with_field(EntryField::Text),
            );
        }
    }

    fn check_embedded_photo(&self, photo: &str, report: &mut ValidationReport) {
        if let Some(size) = estimated_data_uri_size(photo) {
            if size > self.limits.max_photo_bytes {
                report.push(self.photo_too_large(EntryField::Photo));
            }
        }
    }

    fn photo_too_large(&self, field: EntryField) -> ValidationError {
        ValidationError::new(
            ValidationCode::PhotoTooLarge,
            format!(
                "Photo must not exceed {} bytes",
                self.limits.max_photo_bytes
            ),
        )
        .with_field(field)
    }
}

/// Parse an RFC 3339 timestamp or a plain `YYYY-MM-DD` date (midnight UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Decoded byte size of a base64 `data:` URI, `None` for anything else.
pub fn estimated_data_uri_size(photo: &str) -> Option<usize> {
    static DATA_URI: OnceLock<Regex> = OnceLock::new();
    let pattern = DATA_URI.get_or_init(|| {
        Regex::new(r"^data:[\w.+/-]*(?:;[\w=.-]+)*;base64,").expect("Invalid regex")
    });
    let prefix = pattern.find(photo)?;
    let payload = photo[prefix.end()..].trim_end_matches('=');
    Some(payload.len() * 3 / 4)
}

fn check_text_present(text: &str, report: &mut ValidationReport) {
    if text.trim().is_empty() {
        report.push(
            ValidationError::new(ValidationCode::MissingText, "Text is required")
                .with_field(EntryField::Text),
        );
    }
}

fn check_coords(coords: Option<&Coordinates>, report: &mut ValidationReport) {
    if let Some(coords) = coords {
        if !coords.is_valid() {
            report.push(
                ValidationError::new(
                    ValidationCode::InvalidCoordinates,
                    "Coordinates must be a finite latitude/longitude pair",
                )
                .with_field(EntryField::Coords),
            );
        }
    }
}

fn missing_photo() -> ValidationError {
    ValidationError::new(ValidationCode::MissingPhoto, "Photo is required")
        .with_field(EntryField::Photo)
}
