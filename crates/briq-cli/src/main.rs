//! briq CLI - photo documentation for construction sites
//!
//! Capture findings on site, list and correct them, and synchronize with the
//! project backend once a connection is available.

mod cli;
mod commands;
mod config_profiles;
mod error;

#[cfg(test)]
mod tests;

use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::add::run_add;
use crate::commands::common::resolve_data_dir;
use crate::commands::completions::run_completions;
use crate::commands::config::run_config;
use crate::commands::delete::run_delete;
use crate::commands::edit::run_edit;
use crate::commands::export::run_export;
use crate::commands::list::run_list;
use crate::commands::rephrase::run_rephrase;
use crate::commands::sync::run_sync;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error [{}]: {error}", error.code());
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("briq=info".parse().map_err(
                |error| CliError::Config(format!("invalid log directive: {error}")),
            )?),
        )
        .init();

    let cli = Cli::parse();
    let store = cli.store;
    let profile = cli.profile.as_deref();

    match cli.command {
        Some(Commands::Add(args)) => {
            run_add(args, store, &resolve_data_dir(cli.data_dir)?).await?;
        }
        Some(Commands::List {
            limit,
            unsynced,
            json,
        }) => run_list(limit, unsynced, json, store, &resolve_data_dir(cli.data_dir)?)?,
        Some(Commands::Edit { id, text }) => {
            run_edit(&id, text, store, &resolve_data_dir(cli.data_dir)?)?;
        }
        Some(Commands::Delete { id, force }) => {
            run_delete(&id, force, store, &resolve_data_dir(cli.data_dir)?)?;
        }
        Some(Commands::Sync) => {
            run_sync(profile, store, &resolve_data_dir(cli.data_dir)?).await?;
        }
        Some(Commands::Export { format, output }) => {
            run_export(
                format,
                output.as_deref(),
                store,
                &resolve_data_dir(cli.data_dir)?,
            )?;
        }
        Some(Commands::Rephrase { text }) => run_rephrase(&text).await?,
        Some(Commands::Completions { shell, output }) => {
            run_completions(shell, output.as_deref())?;
        }
        Some(Commands::Config { command }) => run_config(command, profile)?,
        None => {
            Cli::command().print_help()?;
            println!();
        }
    }

    Ok(())
}
