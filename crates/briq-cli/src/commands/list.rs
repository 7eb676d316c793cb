use std::path::Path;

use chrono::Utc;

use crate::cli::StoreKind;
use crate::commands::common::{
    entry_to_list_item, format_entry_lines, newest_first, open_manager, EntryListItem,
};
use crate::error::CliError;

pub fn run_list(
    limit: usize,
    unsynced_only: bool,
    as_json: bool,
    store: StoreKind,
    data_dir: &Path,
) -> Result<(), CliError> {
    let manager = open_manager(store, data_dir)?;
    let now = Utc::now();
    let entries = newest_first(manager.entries())
        .into_iter()
        .filter(|entry| !unsynced_only || entry.unsynced)
        .take(limit)
        .collect::<Vec<_>>();

    if as_json {
        let json_items = entries
            .iter()
            .map(|entry| entry_to_list_item(entry, now))
            .collect::<Vec<EntryListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else if entries.is_empty() {
        println!("No entries yet.");
    } else {
        for line in format_entry_lines(&entries, now) {
            println!("{line}");
        }
    }

    Ok(())
}
