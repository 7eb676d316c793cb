use std::env;
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

use briq_core::config::RemoteConfig;
use briq_core::store::{EntryStore, FileBackend, SlotBackend, SqliteBackend};
use briq_core::sync::{SupabaseTable, SyncEngine};
use briq_core::{Coordinates, EntryManager, PhotoEntry};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::cli::StoreKind;
use crate::config_profiles::{resolve_remote_config, CliProfilesConfig};
use crate::error::CliError;

const SQLITE_FILE_NAME: &str = "briq.db";

pub type CliManager = EntryManager<Box<dyn SlotBackend>>;

#[derive(Debug, Serialize)]
pub struct EntryListItem {
    pub id: String,
    pub preview: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub relative_time: String,
    pub unsynced: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coords: Option<Coordinates>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub map_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub tags: Vec<String>,
}

pub fn resolve_data_dir(cli_data_dir: Option<PathBuf>) -> Result<PathBuf, CliError> {
    match cli_data_dir {
        Some(dir) => Ok(dir),
        None => default_data_dir(),
    }
}

pub fn default_data_dir() -> Result<PathBuf, CliError> {
    dirs::data_dir()
        .map(|dir| dir.join("briq"))
        .ok_or_else(|| CliError::Config("Failed to resolve CLI data directory".to_string()))
}

pub fn open_backend(kind: StoreKind, data_dir: &Path) -> Result<Box<dyn SlotBackend>, CliError> {
    let backend: Box<dyn SlotBackend> = match kind {
        StoreKind::File => Box::new(FileBackend::open(data_dir)?),
        StoreKind::Sqlite => Box::new(SqliteBackend::open(data_dir.join(SQLITE_FILE_NAME))?),
    };
    tracing::debug!(backend = %backend.describe(), "Opened entry store");
    Ok(backend)
}

/// Open the entry collection, echoing status lines to stderr.
pub fn open_manager(kind: StoreKind, data_dir: &Path) -> Result<CliManager, CliError> {
    let store = EntryStore::new(open_backend(kind, data_dir)?);
    Ok(EntryManager::open(store)
        .with_status_listener(Box::new(|message: &str| eprintln!("{message}"))))
}

/// Remote engine for the resolved profile, or `SyncNotConfigured`.
pub fn open_sync_engine(profile: Option<&str>) -> Result<SyncEngine<SupabaseTable>, CliError> {
    let config = load_remote_config(profile)?.ok_or(CliError::SyncNotConfigured)?;
    tracing::info!(table = %config.table, "Syncing with {}", config.supabase_url);
    Ok(SyncEngine::new(SupabaseTable::new(config)?))
}

pub fn load_remote_config(profile: Option<&str>) -> Result<Option<RemoteConfig>, CliError> {
    let config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(profile);
    Ok(resolve_remote_config(config.profile(&profile_name), |key| {
        env::var(key).ok()
    })?)
}

/// Entries ordered by display timestamp, newest first.
pub fn newest_first(entries: &[PhotoEntry]) -> Vec<&PhotoEntry> {
    let mut sorted = entries.iter().collect::<Vec<_>>();
    sorted.sort_by(|a, b| {
        b.display_timestamp()
            .cmp(&a.display_timestamp())
            .then_with(|| b.id.cmp(&a.id))
    });
    sorted
}

pub fn format_entry_lines(entries: &[&PhotoEntry], now: DateTime<Utc>) -> Vec<String> {
    entries
        .iter()
        .map(|entry| {
            let short_id = entry.id.short();
            let marker = if entry.unsynced { "*" } else { " " };
            let preview = entry.title_preview(40);
            let relative_time = format_relative_time(entry.display_timestamp(), now);

            match entry.location.as_deref().or(entry.coords.map(|_| "GPS")) {
                Some(place) => {
                    format!("{short_id:<13}{marker} {preview:<40}  {relative_time:<10}  @{place}")
                }
                None => format!("{short_id:<13}{marker} {preview:<40}  {relative_time}"),
            }
        })
        .collect()
}

pub fn entry_to_list_item(entry: &PhotoEntry, now: DateTime<Utc>) -> EntryListItem {
    EntryListItem {
        id: entry.id.to_string(),
        preview: entry.title_preview(80),
        text: entry.text.clone(),
        timestamp: entry.display_timestamp(),
        updated_at: entry.updated_at,
        relative_time: format_relative_time(entry.display_timestamp(), now),
        unsynced: entry.unsynced,
        coords: entry.coords,
        map_url: entry.coords.map(|coords| coords.map_url()),
        location: entry.location.clone(),
        tags: entry.tags.clone(),
    }
}

pub fn format_relative_time(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let diff = now.signed_duration_since(then).num_milliseconds().max(0);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}

/// Text from arguments, else piped stdin, else the editor.
pub fn resolve_note_text(parts: &[String]) -> Result<String, CliError> {
    if let Some(text) = normalize_content(&parts.join(" ")) {
        return Ok(text);
    }

    if let Some(text) = read_piped_stdin()? {
        return Ok(text);
    }

    if let Some(text) = capture_editor_input_with_initial("")? {
        return Ok(text);
    }

    Err(CliError::EmptyContent)
}

pub fn normalize_content(content: &str) -> Option<String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn normalize_entry_identifier(id: &str) -> Result<String, CliError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptyEntryId)
    } else {
        Ok(trimmed.to_string())
    }
}

pub fn read_piped_stdin() -> Result<Option<String>, CliError> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }

    let mut buffer = String::new();
    stdin.lock().read_to_string(&mut buffer)?;
    Ok(normalize_content(&buffer))
}

pub fn capture_editor_input_with_initial(
    initial_content: &str,
) -> Result<Option<String>, CliError> {
    let editor = preferred_editor();
    let temp_file = create_temp_note_file_path();
    std::fs::write(&temp_file, initial_content)?;

    let launch_result = launch_editor(&editor, &temp_file);
    let note_content = std::fs::read_to_string(&temp_file)?;
    let _ = std::fs::remove_file(&temp_file);

    launch_result?;
    Ok(normalize_content(&note_content))
}

pub fn launch_editor(editor: &str, file_path: &Path) -> Result<(), CliError> {
    let status = match Command::new(editor).arg(file_path).status() {
        Ok(status) => status,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            // EDITOR may carry arguments, e.g. "code --wait"
            let mut parts = editor.split_whitespace();
            let Some(program) = parts.next() else {
                return Err(CliError::EditorFailed("empty EDITOR command".into()));
            };
            Command::new(program).args(parts).arg(file_path).status()?
        }
        Err(err) => return Err(CliError::Io(err)),
    };

    if status.success() {
        Ok(())
    } else {
        Err(CliError::EditorFailed(format!(
            "`{editor}` exited with status {status}"
        )))
    }
}

pub fn preferred_editor() -> String {
    env::var("VISUAL")
        .or_else(|_| env::var("EDITOR"))
        .unwrap_or_else(|_| default_editor().to_string())
}

pub const fn default_editor() -> &'static str {
    if cfg!(windows) {
        "notepad"
    } else {
        "vi"
    }
}

pub fn create_temp_note_file_path() -> PathBuf {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_nanos());
    env::temp_dir().join(format!("briq-note-{}-{now}.md", std::process::id()))
}
