//! One-shot position lookup for new entries.
//!
//! A missing or failing position never blocks entry creation; it only means
//! the entry has no coordinates.

use thiserror::Error;

use crate::models::{Coordinates, CoordinatesParseError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PositionError {
    #[error("Position unavailable")]
    Unavailable,
    #[error("Position permission denied")]
    PermissionDenied,
    #[error("Invalid position: {0}")]
    Invalid(#[from] CoordinatesParseError),
}

impl PositionError {
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Unavailable => "POSITION_UNAVAILABLE",
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::Invalid(_) => "INVALID_COORDINATES",
        }
    }
}

pub trait PositionProvider {
    fn current_position(&self) -> Result<Coordinates, PositionError>;
}

/// Position typed in by the user as `"<latitude>,<longitude>"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedPosition {
    raw: String,
}

impl FixedPosition {
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self { raw: raw.into() }
    }
}

impl PositionProvider for FixedPosition {
    fn current_position(&self) -> Result<Coordinates, PositionError> {
        Ok(self.raw.parse()?)
    }
}

/// Provider for devices without positioning.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPosition;

impl PositionProvider for NoPosition {
    fn current_position(&self) -> Result<Coordinates, PositionError> {
        Err(PositionError::Unavailable)
    }
}

/// Ask `provider` once; every failure degrades to `None`.
pub fn resolve_position(provider: &dyn PositionProvider) -> Option<Coordinates> {
    match provider.current_position() {
        Ok(coords) if coords.is_valid() => Some(coords),
        Ok(coords) => {
            tracing::warn!(%coords, "Ignoring out-of-range position");
            None
        }
        Err(error) => {
            tracing::warn!(code = error.code(), "Continuing without position: {error}");
            None
        }
    }
}
