use std::path::Path;

use briq_core::geo::{resolve_position, FixedPosition};
use briq_core::reformulate::ReformulationService;
use briq_core::{EntryDraft, StagedImage};

use crate::cli::{AddArgs, StoreKind};
use crate::commands::common::{open_manager, resolve_note_text};
use crate::error::CliError;

pub async fn run_add(args: AddArgs, store: StoreKind, data_dir: &Path) -> Result<(), CliError> {
    let mut text = resolve_note_text(&args.text)?;
    if args.rephrase {
        text = ReformulationService::from_env()?
            .reformulate_or_keep(&text)
            .await;
    }

    let draft = build_draft(args, text)?;
    let mut manager = open_manager(store, data_dir)?;
    let entry = manager.add_entry(draft)?;

    println!("{}", entry.id);
    Ok(())
}

/// Turn CLI input into a draft. A bad position is dropped, a bad photo path is not.
pub fn build_draft(args: AddArgs, text: String) -> Result<EntryDraft, CliError> {
    let mut draft = EntryDraft::new(text).with_tags(args.tags);

    if let Some(path) = args.photo {
        let image = StagedImage::from_path(&path).map_err(|source| CliError::Photo {
            path: path.display().to_string(),
            source,
        })?;
        draft = draft.with_image(image);
    }
    if let Some(url) = args.photo_url {
        draft = draft.with_photo(url);
    }
    if let Some(coords) = args
        .coords
        .and_then(|raw| resolve_position(&FixedPosition::new(raw)))
    {
        draft = draft.with_coords(coords);
    }
    if let Some(location) = args.location {
        draft = draft.with_location(location);
    }
    if let Some(timestamp) = args.timestamp {
        draft = draft.with_timestamp(timestamp);
    }

    Ok(draft)
}
