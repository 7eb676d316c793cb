//! briq-core - Core library for briq
//!
//! This crate contains the entry model, the validator, the local entry store,
//! the sync engine and the lifecycle layer used by every briq interface.

pub mod config;
pub mod entries;
pub mod error;
pub mod export;
pub mod geo;
pub mod models;
pub mod reformulate;
pub mod store;
pub mod sync;
pub mod util;
pub mod validate;

pub use entries::{EntryError, EntryManager};
pub use error::StorageError;
pub use models::{Coordinates, EntryDraft, EntryId, EntryPatch, PhotoEntry, StagedImage};
pub use validate::{ValidationCode, ValidationError, ValidationReport, Validator};
