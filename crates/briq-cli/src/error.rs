use std::io;

use briq_core::config::ConfigError;
use briq_core::export::ExportError;
use briq_core::reformulate::ReformulationError;
use briq_core::sync::{RemoteError, SyncError};
use briq_core::{EntryError, StorageError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Entry(#[from] EntryError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error(transparent)]
    RemoteConfig(#[from] ConfigError),
    #[error(transparent)]
    Reformulation(#[from] ReformulationError),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("No note text provided")]
    EmptyContent,
    #[error("Edited note text cannot be empty")]
    EmptyEditedContent,
    #[error("Entry ID cannot be empty")]
    EmptyEntryId,
    #[error("Failed to read photo {path}: {source}")]
    Photo { path: String, source: io::Error },
    #[error("Editor command failed: {0}")]
    EditorFailed(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error(
        "Sync is not configured. Run `briq config init --supabase-url <URL> --supabase-anon-key <KEY>`, or set SUPABASE_URL and SUPABASE_ANON_KEY."
    )]
    SyncNotConfigured,
}

impl CliError {
    /// Stable machine-readable code, printed next to the message.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Entry(error) => error.code(),
            Self::Storage(error) => error.code(),
            Self::Sync(error) => error.code(),
            Self::Remote(error) => error.code(),
            Self::RemoteConfig(_) | Self::Config(_) | Self::SyncNotConfigured => {
                "CONFIGURATION_ERROR"
            }
            Self::Reformulation(error) => error.code(),
            Self::Export(error) => error.code(),
            Self::Io(_) | Self::Photo { .. } => "IO_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::EmptyContent | Self::EmptyEditedContent => "MISSING_TEXT",
            Self::EmptyEntryId => "NOT_FOUND",
            Self::EditorFailed(_) => "EDITOR_FAILED",
        }
    }
}
