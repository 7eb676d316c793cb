use std::path::Path;

use briq_core::entries::SyncRun;

use crate::cli::StoreKind;
use crate::commands::common::{open_manager, open_sync_engine};
use crate::error::CliError;

pub async fn run_sync(
    profile: Option<&str>,
    store: StoreKind,
    data_dir: &Path,
) -> Result<(), CliError> {
    let engine = open_sync_engine(profile)?;
    let mut manager = open_manager(store, data_dir)?;

    match manager.sync_with(&engine).await? {
        SyncRun::AlreadyRunning => {}
        SyncRun::Completed(summary) | SyncRun::WatermarkNotSaved(summary) => {
            if summary.kept_dirty > 0 {
                println!(
                    "{} entries changed during sync and stay queued",
                    summary.kept_dirty
                );
            }
            if let Some(at) = manager.last_sync() {
                println!("Last sync: {}", at.format("%Y-%m-%d %H:%M:%S UTC"));
            }
        }
    }
    Ok(())
}
