use std::env;

use briq_core::config::{
    ENV_SUPABASE_ACCESS_TOKEN, ENV_SUPABASE_ANON_KEY, ENV_SUPABASE_URL, ENV_TABLE,
};
use briq_core::util::{is_http_url, normalize_text_option};
use serde::Serialize;

use crate::cli::ConfigCommands;
use crate::config_profiles::{resolve_remote_config, CliProfile, CliProfilesConfig};
use crate::error::CliError;

/// Values given on the command line for `config init`.
#[derive(Debug, Clone, Default)]
pub struct ProfileInput {
    pub supabase_url: Option<String>,
    pub supabase_anon_key: Option<String>,
    pub access_token: Option<String>,
    pub table: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProfileView {
    pub profile: String,
    pub active: bool,
    pub supabase_url: Option<String>,
    pub supabase_anon_key: Option<String>,
    pub access_token: Option<String>,
    pub table: Option<String>,
    pub missing: Vec<&'static str>,
}

pub fn run_config(command: ConfigCommands, global_profile: Option<&str>) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init {
            supabase_url,
            supabase_anon_key,
            access_token,
            table,
            no_activate,
        } => run_config_init(
            global_profile,
            ProfileInput {
                supabase_url,
                supabase_anon_key,
                access_token,
                table,
            },
            no_activate,
        ),
        ConfigCommands::Show { json } => run_config_show(global_profile, json),
    }
}

pub fn run_config_init(
    profile_name: Option<&str>,
    input: ProfileInput,
    no_activate: bool,
) -> Result<(), CliError> {
    let mut config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(profile_name);
    let existing = config.profile(&profile_name).cloned().unwrap_or_default();

    let merged = merge_profile(&existing, input, |key| env::var(key).ok());
    validate_profile(&merged)?;
    *config.profile_mut_or_default(&profile_name) = merged.clone();

    if !no_activate {
        config.active_profile = Some(profile_name.clone());
    }

    let path = config.save().map_err(CliError::Config)?;
    println!(
        "Profile '{}' initialized at {}",
        profile_name,
        path.display()
    );

    let missing = merged.missing_fields();
    if missing.is_empty() {
        println!("Sync profile '{profile_name}' is ready. Run `briq sync`.");
    } else {
        println!(
            "Profile '{}' is missing: {}",
            profile_name,
            missing.join(", ")
        );
    }

    Ok(())
}

pub fn run_config_show(profile_name: Option<&str>, as_json: bool) -> Result<(), CliError> {
    let config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(profile_name);
    let view = profile_view(&config, &profile_name);

    if as_json {
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    let unset = || "(unset)".to_string();
    let active = if view.active { " (active)" } else { "" };
    println!("Profile: {}{active}", view.profile);
    println!("  supabase_url:      {}", view.supabase_url.unwrap_or_else(unset));
    println!(
        "  supabase_anon_key: {}",
        view.supabase_anon_key.unwrap_or_else(unset)
    );
    println!("  access_token:      {}", view.access_token.unwrap_or_else(unset));
    println!("  table:             {}", view.table.unwrap_or_else(unset));
    if !view.missing.is_empty() {
        println!("Missing: {}", view.missing.join(", "));
    }
    Ok(())
}

/// Explicit values win, then environment variables, then the stored profile.
pub fn merge_profile(
    existing: &CliProfile,
    input: ProfileInput,
    env: impl Fn(&str) -> Option<String>,
) -> CliProfile {
    let pick = |explicit: Option<String>, key: &str| {
        normalize_text_option(explicit)
            .or_else(|| normalize_text_option(env(key)))
            .or_else(|| existing.value_for(key))
    };

    CliProfile {
        supabase_url: pick(input.supabase_url, ENV_SUPABASE_URL)
            .map(|url| url.trim_end_matches('/').to_string()),
        supabase_anon_key: pick(input.supabase_anon_key, ENV_SUPABASE_ANON_KEY),
        access_token: pick(input.access_token, ENV_SUPABASE_ACCESS_TOKEN),
        table: pick(input.table, ENV_TABLE),
    }
}

pub fn profile_view(config: &CliProfilesConfig, profile_name: &str) -> ProfileView {
    let profile = config.profile(profile_name).cloned().unwrap_or_default();
    ProfileView {
        profile: profile_name.to_string(),
        active: config.active_profile.as_deref() == Some(profile_name),
        supabase_url: profile.value_for(ENV_SUPABASE_URL),
        supabase_anon_key: profile.value_for(ENV_SUPABASE_ANON_KEY).map(|key| redact(&key)),
        access_token: profile
            .value_for(ENV_SUPABASE_ACCESS_TOKEN)
            .map(|token| redact(&token)),
        table: profile.value_for(ENV_TABLE),
        missing: profile.missing_fields(),
    }
}

/// Keep the last four characters of a secret.
pub fn redact(secret: &str) -> String {
    let count = secret.chars().count();
    if count <= 8 {
        return "****".to_string();
    }
    let tail = secret.chars().skip(count - 4).collect::<String>();
    format!("****{tail}")
}

fn validate_profile(profile: &CliProfile) -> Result<(), CliError> {
    if let Some(url) = profile.value_for(ENV_SUPABASE_URL) {
        if !is_http_url(&url) {
            return Err(CliError::Config(
                "supabase_url must include http:// or https://".to_string(),
            ));
        }
    }
    if profile.missing_fields().is_empty() {
        resolve_remote_config(Some(profile), |_| None)?;
    }
    Ok(())
}
