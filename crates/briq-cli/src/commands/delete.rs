use std::path::Path;

use crate::cli::StoreKind;
use crate::commands::common::{normalize_entry_identifier, open_manager};
use crate::error::CliError;

pub fn run_delete(
    id: &str,
    force: bool,
    store: StoreKind,
    data_dir: &Path,
) -> Result<(), CliError> {
    let normalized_id = normalize_entry_identifier(id)?;
    let mut manager = open_manager(store, data_dir)?;
    let entry_id = manager.find_by_prefix(&normalized_id)?.id.clone();

    let removed = if force {
        manager.force_delete_entry(&entry_id)?
    } else {
        manager.delete_entry(&entry_id)?
    };
    println!("{}", removed.id);
    Ok(())
}
