use std::path::Path;

use briq_core::export::render_entries_export;

use crate::cli::{ExportFormat, StoreKind};
use crate::commands::common::{newest_first, open_manager};
use crate::error::CliError;

pub fn run_export(
    format: ExportFormat,
    output_path: Option<&Path>,
    store: StoreKind,
    data_dir: &Path,
) -> Result<(), CliError> {
    let manager = open_manager(store, data_dir)?;
    let entries = newest_first(manager.entries())
        .into_iter()
        .cloned()
        .collect::<Vec<_>>();
    let rendered = render_entries_export(&entries, format.into())?;

    if let Some(path) = output_path {
        std::fs::write(path, rendered)?;
        println!("{}", path.display());
    } else {
        println!("{rendered}");
    }

    Ok(())
}
