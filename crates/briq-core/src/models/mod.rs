//! Data models for briq

mod coords;
mod draft;
mod entry;

pub use coords::{Coordinates, CoordinatesParseError};
pub use draft::{EntryDraft, EntryPatch, StagedImage};
pub use entry::{EntryId, PhotoEntry};
