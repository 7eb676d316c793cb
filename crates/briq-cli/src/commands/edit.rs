use std::path::Path;

use briq_core::EntryPatch;

use crate::cli::StoreKind;
use crate::commands::common::{
    capture_editor_input_with_initial, normalize_content, normalize_entry_identifier,
    open_manager,
};
use crate::error::CliError;

pub fn run_edit(
    id: &str,
    text: Option<String>,
    store: StoreKind,
    data_dir: &Path,
) -> Result<(), CliError> {
    let normalized_id = normalize_entry_identifier(id)?;
    let mut manager = open_manager(store, data_dir)?;
    let entry = manager.find_by_prefix(&normalized_id)?.clone();

    let edited_text = match text {
        Some(text) => normalize_content(&text),
        None => capture_editor_input_with_initial(&entry.text)?,
    };
    let Some(edited_text) = edited_text else {
        return Err(CliError::EmptyEditedContent);
    };

    if edited_text == entry.text {
        println!("{}", entry.id);
        return Ok(());
    }

    let updated = manager.update_entry(&entry.id, EntryPatch::text(edited_text))?;
    println!("{}", updated.id);
    Ok(())
}
