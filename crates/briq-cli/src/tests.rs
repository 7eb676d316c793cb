use briq_core::{Coordinates, EntryError, EntryId, PhotoEntry};
use chrono::{DateTime, Duration, TimeZone, Utc};
use clap::Parser;
use pretty_assertions::assert_eq;

use crate::cli::{AddArgs, Cli, Commands, CompletionShell, ExportFormat, StoreKind};
use crate::commands::add::{build_draft, run_add};
use crate::commands::common::{
    default_editor, entry_to_list_item, format_entry_lines, format_relative_time, newest_first,
    normalize_content, normalize_entry_identifier, open_manager,
};
use crate::commands::completions::run_completions;
use crate::commands::config::{merge_profile, profile_view, redact, ProfileInput};
use crate::commands::delete::run_delete;
use crate::commands::edit::run_edit;
use crate::commands::export::run_export;
use crate::config_profiles::{CliProfile, CliProfilesConfig};
use crate::error::CliError;

const PHOTO_URL: &str = "https://cdn.example.com/riss.jpg";

fn at(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 3, hour, 0, 0).unwrap()
}

fn entry(id: &str, text: &str, hour: u32) -> PhotoEntry {
    PhotoEntry {
        id: EntryId::from(id),
        text: text.to_string(),
        photo: PHOTO_URL.to_string(),
        images: Vec::new(),
        coords: None,
        created_at: at(hour),
        updated_at: at(hour),
        unsynced: false,
        timestamp: None,
        tags: Vec::new(),
        author: None,
        location: None,
    }
}

fn add_args(text: &str) -> AddArgs {
    AddArgs {
        text: vec![text.to_string()],
        photo_url: Some(PHOTO_URL.to_string()),
        ..AddArgs::default()
    }
}

#[test]
fn normalize_content_trims_and_rejects_empty() {
    assert_eq!(normalize_content("  Riss  "), Some("Riss".to_string()));
    assert_eq!(normalize_content(" \n\t "), None);
    assert_eq!(
        normalize_content("Zeile 1\nZeile 2\n"),
        Some("Zeile 1\nZeile 2".to_string())
    );
}

#[test]
fn normalize_entry_identifier_rejects_empty() {
    assert!(matches!(
        normalize_entry_identifier(" \n "),
        Err(CliError::EmptyEntryId)
    ));
    assert_eq!(normalize_entry_identifier("  abc123  ").unwrap(), "abc123");
}

#[test]
fn default_editor_is_defined() {
    assert!(!default_editor().is_empty());
}

#[test]
fn format_relative_time_units() {
    let now = at(12);
    assert_eq!(format_relative_time(now - Duration::seconds(30), now), "just now");
    assert_eq!(format_relative_time(now - Duration::minutes(2), now), "2m ago");
    assert_eq!(format_relative_time(now - Duration::hours(2), now), "2h ago");
    assert_eq!(format_relative_time(now - Duration::days(3), now), "3d ago");
    assert_eq!(format_relative_time(now - Duration::days(400), now), "1y ago");
    assert_eq!(format_relative_time(now + Duration::hours(1), now), "just now");
}

#[test]
fn newest_first_uses_display_timestamp() {
    let mut backdated = entry("c", "Nachtrag", 11);
    backdated.timestamp = Some(at(6));
    let entries = vec![entry("a", "Erster", 8), entry("b", "Zweiter", 9), backdated];

    let ids = newest_first(&entries)
        .into_iter()
        .map(|entry| entry.id.to_string())
        .collect::<Vec<_>>();
    assert_eq!(ids, vec!["b", "a", "c"]);
}

#[test]
fn entry_lines_mark_unsynced_and_show_place() {
    let mut dirty = entry("0190a1b2-c3d4-7e5f", "Riss in Wand", 10);
    dirty.unsynced = true;
    dirty.location = Some("EG Nord".to_string());
    let mut geotagged = entry("0190a1b2-c3d4-7aaa", "Fenster fehlt", 9);
    geotagged.coords = Some(Coordinates::new(48.1, 11.5));
    let plain = entry("0190a1b2-c3d4-7bbb", "Estrich trocken", 8);

    let lines = format_entry_lines(&[&dirty, &geotagged, &plain], at(12));
    assert!(lines[0].starts_with("0190a1b2-c3d4*"));
    assert!(lines[0].ends_with("@EG Nord"));
    assert!(lines[1].ends_with("@GPS"));
    assert!(lines[2].ends_with("4h ago"));
    assert!(!lines[2].contains('@'));
}

#[test]
fn list_item_carries_map_link() {
    let mut geotagged = entry("a", "Riss", 10);
    geotagged.coords = Some(Coordinates::new(52.52, 13.405));

    let item = entry_to_list_item(&geotagged, at(12));
    assert_eq!(
        item.map_url.as_deref(),
        Some("https://www.openstreetmap.org/?mlat=52.52&mlon=13.405&zoom=16")
    );
    assert_eq!(item.relative_time, "2h ago");

    let value = serde_json::to_value(entry_to_list_item(&entry("b", "x", 10), at(12))).unwrap();
    assert!(value.get("coords").is_none());
    assert!(value.get("map_url").is_none());
}

#[test]
fn build_draft_drops_unusable_position() {
    let mut args = add_args("Riss");
    args.coords = Some("hier".to_string());
    args.tags = vec!["statik".to_string()];
    let draft = build_draft(args, "Riss".to_string()).unwrap();
    assert_eq!(draft.coords, None);
    assert_eq!(draft.tags, vec!["statik"]);
    assert_eq!(draft.photo.as_deref(), Some(PHOTO_URL));

    let mut args = add_args("Riss");
    args.coords = Some("-33.9, 18.4".to_string());
    let draft = build_draft(args, "Riss".to_string()).unwrap();
    assert_eq!(draft.coords, Some(Coordinates::new(-33.9, 18.4)));
}

#[test]
fn build_draft_reads_photo_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("riss.png");
    std::fs::write(&path, [0x89, b'P', b'N', b'G']).unwrap();

    let args = AddArgs {
        photo: Some(path),
        ..AddArgs::default()
    };
    let draft = build_draft(args, "Riss".to_string()).unwrap();
    let image = draft.image.unwrap();
    assert_eq!(image.mime_type, "image/png");
    assert_eq!(image.size(), 4);

    let missing = AddArgs {
        photo: Some(dir.path().join("fehlt.jpg")),
        ..AddArgs::default()
    };
    let error = build_draft(missing, "Riss".to_string()).unwrap_err();
    assert!(matches!(error, CliError::Photo { .. }));
    assert_eq!(error.code(), "IO_ERROR");
}

#[tokio::test(flavor = "current_thread")]
async fn run_add_persists_unsynced_entry() {
    let dir = tempfile::tempdir().unwrap();
    let mut args = add_args("Riss in Wand, EG Nord");
    args.location = Some("EG Nord".to_string());

    run_add(args, StoreKind::File, dir.path()).await.unwrap();

    let manager = open_manager(StoreKind::File, dir.path()).unwrap();
    let entries = manager.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].text, "Riss in Wand, EG Nord");
    assert_eq!(entries[0].location.as_deref(), Some("EG Nord"));
    assert!(entries[0].unsynced);
}

#[tokio::test(flavor = "current_thread")]
async fn run_add_rejects_entry_without_photo() {
    let dir = tempfile::tempdir().unwrap();
    let args = AddArgs {
        text: vec!["Riss".to_string()],
        ..AddArgs::default()
    };

    let error = run_add(args, StoreKind::File, dir.path()).await.unwrap_err();
    assert_eq!(error.code(), "VALIDATION_ERROR");
    assert!(error.to_string().contains("Photo is required"));
    assert!(open_manager(StoreKind::File, dir.path())
        .unwrap()
        .entries()
        .is_empty());
}

#[tokio::test(flavor = "current_thread")]
async fn sqlite_store_keeps_entries_between_runs() {
    let dir = tempfile::tempdir().unwrap();
    run_add(add_args("Erster"), StoreKind::Sqlite, dir.path())
        .await
        .unwrap();
    run_add(add_args("Zweiter"), StoreKind::Sqlite, dir.path())
        .await
        .unwrap();

    let manager = open_manager(StoreKind::Sqlite, dir.path()).unwrap();
    assert_eq!(manager.entries().len(), 2);
    assert!(dir.path().join("briq.db").exists());
    assert!(open_manager(StoreKind::File, dir.path())
        .unwrap()
        .entries()
        .is_empty());
}

#[tokio::test(flavor = "current_thread")]
async fn run_edit_replaces_text_by_prefix() {
    let dir = tempfile::tempdir().unwrap();
    run_add(add_args("Riss"), StoreKind::File, dir.path())
        .await
        .unwrap();
    let id = open_manager(StoreKind::File, dir.path()).unwrap().entries()[0]
        .id
        .clone();

    run_edit(
        &id.as_str()[..13],
        Some("Riss in Wand, 2 mm".to_string()),
        StoreKind::File,
        dir.path(),
    )
    .unwrap();

    let manager = open_manager(StoreKind::File, dir.path()).unwrap();
    assert_eq!(manager.get(&id).unwrap().text, "Riss in Wand, 2 mm");

    let error = run_edit(id.as_str(), Some("  ".to_string()), StoreKind::File, dir.path())
        .unwrap_err();
    assert!(matches!(error, CliError::EmptyEditedContent));
}

#[tokio::test(flavor = "current_thread")]
async fn run_delete_needs_force_for_unsynced_entries() {
    let dir = tempfile::tempdir().unwrap();
    run_add(add_args("Riss"), StoreKind::File, dir.path())
        .await
        .unwrap();
    let id = open_manager(StoreKind::File, dir.path()).unwrap().entries()[0]
        .id
        .clone();

    let error = run_delete(id.as_str(), false, StoreKind::File, dir.path()).unwrap_err();
    assert!(matches!(error, CliError::Entry(EntryError::Unsynced(_))));
    assert_eq!(error.code(), "UNSYNCED_ENTRY");

    run_delete(id.as_str(), true, StoreKind::File, dir.path()).unwrap();
    assert!(open_manager(StoreKind::File, dir.path())
        .unwrap()
        .entries()
        .is_empty());

    let error = run_delete("does-not-exist", true, StoreKind::File, dir.path()).unwrap_err();
    assert_eq!(error.code(), "NOT_FOUND");
}

#[tokio::test(flavor = "current_thread")]
async fn run_export_writes_csv_file() {
    let dir = tempfile::tempdir().unwrap();
    run_add(add_args("Riss \"breit\""), StoreKind::File, dir.path())
        .await
        .unwrap();
    let output_path = dir.path().join("export.csv");

    run_export(
        ExportFormat::Csv,
        Some(&output_path),
        StoreKind::File,
        dir.path(),
    )
    .unwrap();

    let exported = std::fs::read_to_string(&output_path).unwrap();
    let lines = exported.lines().collect::<Vec<_>>();
    assert_eq!(
        lines[0],
        "\"ID\",\"Text\",\"Photo URL\",\"Latitude\",\"Longitude\",\"Timestamp\""
    );
    assert!(lines[1].contains(",\"Riss \"\"breit\"\"\",\"https://cdn.example.com/riss.jpg\",\"\",\"\","));
}

#[test]
fn run_completions_writes_bash_script_file() {
    let dir = tempfile::tempdir().unwrap();
    let output_path = dir.path().join("briq.bash");

    run_completions(CompletionShell::Bash, Some(&output_path)).unwrap();

    let script = std::fs::read_to_string(&output_path).unwrap();
    assert!(script.contains("_briq()"));
    assert!(script.contains("complete -F _briq"));
    assert!(script.contains(" default briq"));
}

#[test]
fn cli_parses_add_with_negative_coordinates() {
    let cli = Cli::try_parse_from([
        "briq",
        "add",
        "Riss",
        "--photo-url",
        PHOTO_URL,
        "--coords",
        "-33.9,18.4",
        "--tag",
        "statik",
        "--tag",
        "eg",
        "--store",
        "sqlite",
    ])
    .unwrap();

    assert_eq!(cli.store, StoreKind::Sqlite);
    let Some(Commands::Add(args)) = cli.command else {
        panic!("expected add command");
    };
    assert_eq!(args.text, vec!["Riss"]);
    assert_eq!(args.coords.as_deref(), Some("-33.9,18.4"));
    assert_eq!(args.tags, vec!["statik", "eg"]);
    assert!(!args.rephrase);
}

#[test]
fn cli_rejects_photo_file_and_url_together() {
    let result = Cli::try_parse_from([
        "briq",
        "add",
        "Riss",
        "--photo",
        "riss.jpg",
        "--photo-url",
        PHOTO_URL,
    ]);
    assert!(result.is_err());
}

#[test]
fn merge_profile_prefers_explicit_then_env_then_stored() {
    let existing = CliProfile {
        supabase_url: Some("https://old.supabase.co".to_string()),
        supabase_anon_key: Some("old-key".to_string()),
        access_token: None,
        table: Some("site_entries".to_string()),
    };
    let input = ProfileInput {
        supabase_url: Some("https://new.supabase.co/".to_string()),
        ..ProfileInput::default()
    };

    let merged = merge_profile(&existing, input, |key| {
        (key == "SUPABASE_ANON_KEY").then(|| "env-key".to_string())
    });
    assert_eq!(
        merged,
        CliProfile {
            supabase_url: Some("https://new.supabase.co".to_string()),
            supabase_anon_key: Some("env-key".to_string()),
            access_token: None,
            table: Some("site_entries".to_string()),
        }
    );
}

#[test]
fn profile_view_redacts_secrets() {
    let mut config = CliProfilesConfig {
        active_profile: Some("baustelle".to_string()),
        ..CliProfilesConfig::default()
    };
    config.profile_mut_or_default("baustelle").supabase_anon_key =
        Some("eyJhbGciOiJIUzI1NiJ9.anon".to_string());

    let view = profile_view(&config, "baustelle");
    assert!(view.active);
    assert_eq!(view.supabase_anon_key.as_deref(), Some("****anon"));
    assert_eq!(view.missing, vec!["supabase_url"]);

    assert!(!profile_view(&config, "other").active);
    assert_eq!(redact("short"), "****");
}
