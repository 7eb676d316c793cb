//! Remote table configuration.
//!
//! The hosted backend is a PostgREST table behind a Supabase project. The
//! project URL and anon key are public values; the access token belongs to a
//! signed-in user and is never printed.

use std::env;

use thiserror::Error;

use crate::util::{is_http_url, normalize_text_option};

pub const ENV_SUPABASE_URL: &str = "SUPABASE_URL";
pub const ENV_SUPABASE_ANON_KEY: &str = "SUPABASE_ANON_KEY";
pub const ENV_SUPABASE_ACCESS_TOKEN: &str = "SUPABASE_ACCESS_TOKEN";
pub const ENV_TABLE: &str = "BRIQ_TABLE";

/// Remote table holding synchronized entries
pub const DEFAULT_TABLE: &str = "photo_entries";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Remote configuration is incomplete. Missing: {}", .0.join(", "))]
    Missing(Vec<&'static str>),
    #[error("{field} must include http:// or https://")]
    InvalidUrl { field: &'static str },
    #[error("Invalid table name: {0:?}")]
    InvalidTable(String),
}

#[derive(Clone, PartialEq, Eq)]
pub struct RemoteConfig {
    /// Project base URL without trailing slash
    pub supabase_url: String,
    pub anon_key: String,
    /// User session token; the anon key authorizes requests when absent
    pub access_token: Option<String>,
    pub table: String,
}

impl std::fmt::Debug for RemoteConfig {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("RemoteConfig")
            .field("supabase_url", &self.supabase_url)
            .field("anon_key", &"[REDACTED]")
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("table", &self.table)
            .finish()
    }
}

impl RemoteConfig {
    /// Build a config, normalizing the URL and table name.
    pub fn new(
        supabase_url: impl Into<String>,
        anon_key: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let supabase_url = normalize_base_url(supabase_url.into(), ENV_SUPABASE_URL)?;
        let anon_key = normalize_text_option(Some(anon_key.into()))
            .ok_or(ConfigError::Missing(vec![ENV_SUPABASE_ANON_KEY]))?;
        Ok(Self {
            supabase_url,
            anon_key,
            access_token: None,
            table: DEFAULT_TABLE.to_string(),
        })
    }

    #[must_use]
    pub fn with_access_token(mut self, token: Option<String>) -> Self {
        self.access_token = normalize_text_option(token);
        self
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Result<Self, ConfigError> {
        self.table = normalize_table(table.into())?;
        Ok(self)
    }

    /// Load configuration from environment variables.
    ///
    /// Returns `Ok(None)` when no remote variables are set.
    /// Returns an error when only a partial configuration is provided.
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        parse_config(|key| env::var(key).ok())
    }

    /// `{url}/rest/v1/{table}`
    #[must_use]
    pub fn table_url(&self) -> String {
        format!("{}/rest/v1/{}", self.supabase_url, self.table)
    }

    /// Token sent as bearer credentials.
    #[must_use]
    pub fn bearer_token(&self) -> &str {
        self.access_token.as_deref().unwrap_or(&self.anon_key)
    }
}

/// Parse configuration from an arbitrary variable lookup.
pub fn parse_config(
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Option<RemoteConfig>, ConfigError> {
    let url = normalize_text_option(lookup(ENV_SUPABASE_URL));
    let anon_key = normalize_text_option(lookup(ENV_SUPABASE_ANON_KEY));
    let access_token = normalize_text_option(lookup(ENV_SUPABASE_ACCESS_TOKEN));
    let table = normalize_text_option(lookup(ENV_TABLE));

    if url.is_none() && anon_key.is_none() && access_token.is_none() && table.is_none() {
        return Ok(None);
    }

    let (Some(url), Some(anon_key)) = (url.clone(), anon_key.clone()) else {
        let mut missing = Vec::new();
        if url.is_none() {
            missing.push(ENV_SUPABASE_URL);
        }
        if anon_key.is_none() {
            missing.push(ENV_SUPABASE_ANON_KEY);
        }
        return Err(ConfigError::Missing(missing));
    };

    let config = RemoteConfig::new(url, anon_key)?.with_access_token(access_token);
    let config = match table {
        Some(table) => config.with_table(table)?,
        None => config,
    };
    Ok(Some(config))
}

fn normalize_base_url(raw: String, field: &'static str) -> Result<String, ConfigError> {
    let value = normalize_text_option(Some(raw)).ok_or(ConfigError::Missing(vec![field]))?;
    if !is_http_url(&value) {
        return Err(ConfigError::InvalidUrl { field });
    }
    let value = value.trim_end_matches('/');
    Ok(value.strip_suffix("/rest/v1").unwrap_or(value).to_string())
}

fn normalize_table(raw: String) -> Result<String, ConfigError> {
    let table = raw.trim();
    let valid = !table.is_empty()
        && table
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '_');
    if valid {
        Ok(table.to_string())
    } else {
        Err(ConfigError::InvalidTable(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn parse_from_map(map: &HashMap<&str, &str>) -> Result<Option<RemoteConfig>, ConfigError> {
        parse_config(|key| map.get(key).map(|value| (*value).to_string()))
    }

    #[test]
    fn no_variables_means_no_remote() {
        assert_eq!(parse_from_map(&HashMap::new()).unwrap(), None);
    }

    #[test]
    fn partial_configuration_lists_missing_variables() {
        let map = HashMap::from([(ENV_SUPABASE_ACCESS_TOKEN, "token")]);
        let error = parse_from_map(&map).unwrap_err();
        assert_eq!(
            error,
            ConfigError::Missing(vec![ENV_SUPABASE_URL, ENV_SUPABASE_ANON_KEY])
        );
        assert!(error.to_string().contains("SUPABASE_URL, SUPABASE_ANON_KEY"));
    }

    #[test]
    fn normalizes_url_and_defaults_table() {
        let map = HashMap::from([
            (ENV_SUPABASE_URL, " https://demo.supabase.co/rest/v1/ "),
            (ENV_SUPABASE_ANON_KEY, "anon"),
        ]);
        let config = parse_from_map(&map).unwrap().unwrap();
        assert_eq!(config.supabase_url, "https://demo.supabase.co");
        assert_eq!(config.table_url(), "https://demo.supabase.co/rest/v1/photo_entries");
        assert_eq!(config.bearer_token(), "anon");
    }

    #[test]
    fn access_token_and_table_override() {
        let map = HashMap::from([
            (ENV_SUPABASE_URL, "https://demo.supabase.co"),
            (ENV_SUPABASE_ANON_KEY, "anon"),
            (ENV_SUPABASE_ACCESS_TOKEN, "user-jwt"),
            (ENV_TABLE, "site_42_entries"),
        ]);
        let config = parse_from_map(&map).unwrap().unwrap();
        assert_eq!(config.bearer_token(), "user-jwt");
        assert_eq!(config.table, "site_42_entries");
    }

    #[test]
    fn rejects_bad_url_and_table() {
        assert_eq!(
            RemoteConfig::new("demo.supabase.co", "anon").unwrap_err(),
            ConfigError::InvalidUrl {
                field: ENV_SUPABASE_URL
            }
        );
        let config = RemoteConfig::new("https://demo.supabase.co", "anon").unwrap();
        assert!(matches!(
            config.with_table("entries?select=*"),
            Err(ConfigError::InvalidTable(_))
        ));
    }

    #[test]
    fn debug_redacts_keys() {
        let config = RemoteConfig::new("https://demo.supabase.co", "anon-secret")
            .unwrap()
            .with_access_token(Some("jwt-secret".to_string()));
        let debug = format!("{config:?}");
        assert!(!debug.contains("anon-secret"));
        assert!(!debug.contains("jwt-secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
