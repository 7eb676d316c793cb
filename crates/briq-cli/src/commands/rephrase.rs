use briq_core::reformulate::ReformulationService;

use crate::commands::common::{normalize_content, read_piped_stdin};
use crate::error::CliError;

pub async fn run_rephrase(parts: &[String]) -> Result<(), CliError> {
    let text = match normalize_content(&parts.join(" ")) {
        Some(text) => text,
        None => read_piped_stdin()?.ok_or(CliError::EmptyContent)?,
    };

    let service = ReformulationService::from_env()?;
    let revised = service.reformulate(&text).await?;
    println!("{revised}");
    Ok(())
}
