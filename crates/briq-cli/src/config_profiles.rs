//! Persistent CLI profile configuration.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use briq_core::config::{
    parse_config, ConfigError, RemoteConfig, ENV_SUPABASE_ACCESS_TOKEN, ENV_SUPABASE_ANON_KEY,
    ENV_SUPABASE_URL, ENV_TABLE,
};
use briq_core::util::normalize_text_option;
use serde::{Deserialize, Serialize};

const CONFIG_FILE_NAME: &str = "cli-config.json";
pub const ENV_PROFILE: &str = "BRIQ_PROFILE";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CliProfilesConfig {
    #[serde(default = "default_config_version")]
    pub version: u32,
    #[serde(default)]
    pub active_profile: Option<String>,
    #[serde(default)]
    pub profiles: BTreeMap<String, CliProfile>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CliProfile {
    #[serde(default)]
    pub supabase_url: Option<String>,
    #[serde(default)]
    pub supabase_anon_key: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub table: Option<String>,
}

const fn default_config_version() -> u32 {
    1
}

pub fn default_config_path() -> Result<PathBuf, String> {
    dirs::config_dir()
        .map(|dir| dir.join("briq").join(CONFIG_FILE_NAME))
        .ok_or_else(|| "Failed to resolve CLI config directory".to_string())
}

pub fn normalize_profile_name(value: Option<&str>) -> Option<String> {
    let value = value?.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

impl CliProfilesConfig {
    pub fn load() -> Result<Self, String> {
        Self::load_from_path(&default_config_path()?)
    }

    pub fn load_from_path(path: &Path) -> Result<Self, String> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|error| format!("Failed to read config at {}: {}", path.display(), error))?;
        let mut config = serde_json::from_str::<Self>(&raw)
            .map_err(|error| format!("Failed to parse config at {}: {}", path.display(), error))?;
        config.normalize();
        Ok(config)
    }

    pub fn save(&self) -> Result<PathBuf, String> {
        let path = default_config_path()?;
        self.save_to_path(&path)?;
        Ok(path)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|error| {
                format!(
                    "Failed to create config directory {}: {}",
                    parent.display(),
                    error
                )
            })?;
        }

        let mut normalized = self.clone();
        normalized.normalize();
        let serialized = serde_json::to_string_pretty(&normalized)
            .map_err(|error| format!("Failed to serialize config: {error}"))?;
        std::fs::write(path, serialized)
            .map_err(|error| format!("Failed to write config at {}: {}", path.display(), error))
    }

    /// Explicit name, then `BRIQ_PROFILE`, then the active profile, then `default`.
    pub fn resolve_profile_name(&self, explicit: Option<&str>) -> String {
        self.resolve_profile_name_with(explicit, std::env::var(ENV_PROFILE).ok().as_deref())
    }

    pub fn resolve_profile_name_with(&self, explicit: Option<&str>, env: Option<&str>) -> String {
        normalize_profile_name(explicit)
            .or_else(|| normalize_profile_name(env))
            .or_else(|| normalize_profile_name(self.active_profile.as_deref()))
            .unwrap_or_else(|| "default".to_string())
    }

    pub fn profile(&self, name: &str) -> Option<&CliProfile> {
        self.profiles.get(name)
    }

    pub fn profile_mut_or_default(&mut self, name: &str) -> &mut CliProfile {
        self.profiles.entry(name.to_string()).or_default()
    }

    fn normalize(&mut self) {
        self.active_profile = normalize_profile_name(self.active_profile.as_deref());
        for profile in self.profiles.values_mut() {
            profile.normalize();
        }
    }
}

impl CliProfile {
    /// Value stored for one of the remote environment variables.
    pub fn value_for(&self, key: &str) -> Option<String> {
        let value = match key {
            ENV_SUPABASE_URL => &self.supabase_url,
            ENV_SUPABASE_ANON_KEY => &self.supabase_anon_key,
            ENV_SUPABASE_ACCESS_TOKEN => &self.access_token,
            ENV_TABLE => &self.table,
            _ => return None,
        };
        normalize_text_option(value.clone())
    }

    /// Names of the fields a remote connection cannot do without.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.value_for(ENV_SUPABASE_URL).is_none() {
            missing.push("supabase_url");
        }
        if self.value_for(ENV_SUPABASE_ANON_KEY).is_none() {
            missing.push("supabase_anon_key");
        }
        missing
    }

    fn normalize(&mut self) {
        self.supabase_url = normalize_text_option(self.supabase_url.take());
        self.supabase_anon_key = normalize_text_option(self.supabase_anon_key.take());
        self.access_token = normalize_text_option(self.access_token.take());
        self.table = normalize_text_option(self.table.take());
    }
}

/// Remote settings from the environment, falling back field by field to the
/// stored profile. `Ok(None)` means sync is not configured at all.
pub fn resolve_remote_config(
    profile: Option<&CliProfile>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<Option<RemoteConfig>, ConfigError> {
    parse_config(|key| {
        normalize_text_option(env(key)).or_else(|| profile.and_then(|p| p.value_for(key)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn profile() -> CliProfile {
        CliProfile {
            supabase_url: Some("https://project.supabase.co".to_string()),
            supabase_anon_key: Some("anon-key".to_string()),
            access_token: None,
            table: None,
        }
    }

    #[test]
    fn normalize_profile_name_rejects_empty() {
        assert_eq!(normalize_profile_name(None), None);
        assert_eq!(normalize_profile_name(Some(" ")), None);
        assert_eq!(normalize_profile_name(Some(" site ")), Some("site".to_string()));
    }

    #[test]
    fn config_roundtrip_preserves_profiles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE_NAME);

        let mut config = CliProfilesConfig {
            version: 1,
            active_profile: Some(" default ".to_string()),
            profiles: BTreeMap::new(),
        };
        config.profiles.insert(
            "default".to_string(),
            CliProfile {
                supabase_url: Some(" https://project.supabase.co ".to_string()),
                supabase_anon_key: Some(" anon-key ".to_string()),
                access_token: Some("   ".to_string()),
                table: Some("site_entries".to_string()),
            },
        );

        config.save_to_path(&path).unwrap();
        let loaded = CliProfilesConfig::load_from_path(&path).unwrap();
        let profile = loaded.profile("default").unwrap();
        assert_eq!(loaded.active_profile.as_deref(), Some("default"));
        assert_eq!(
            profile.supabase_url.as_deref(),
            Some("https://project.supabase.co")
        );
        assert_eq!(profile.supabase_anon_key.as_deref(), Some("anon-key"));
        assert_eq!(profile.access_token, None);
        assert_eq!(profile.table.as_deref(), Some("site_entries"));
    }

    #[test]
    fn missing_file_loads_empty_config() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = CliProfilesConfig::load_from_path(&dir.path().join("absent.json")).unwrap();
        assert!(loaded.profiles.is_empty());
        assert_eq!(loaded.active_profile, None);
    }

    #[test]
    fn resolve_profile_name_prefers_explicit_then_env_then_active() {
        let config = CliProfilesConfig {
            version: 1,
            active_profile: Some("work".to_string()),
            profiles: BTreeMap::new(),
        };
        assert_eq!(
            config.resolve_profile_name_with(Some("mobile"), Some("env")),
            "mobile"
        );
        assert_eq!(config.resolve_profile_name_with(None, Some("env")), "env");
        assert_eq!(config.resolve_profile_name_with(None, Some(" ")), "work");
        assert_eq!(
            CliProfilesConfig::default().resolve_profile_name_with(None, None),
            "default"
        );
    }

    #[test]
    fn remote_config_comes_from_profile_when_env_is_empty() {
        let config = resolve_remote_config(Some(&profile()), |_| None)
            .unwrap()
            .unwrap();
        assert_eq!(config.supabase_url, "https://project.supabase.co");
        assert_eq!(config.bearer_token(), "anon-key");
    }

    #[test]
    fn environment_overrides_profile_fields() {
        let env = HashMap::from([
            (ENV_SUPABASE_ACCESS_TOKEN, "user-token"),
            (ENV_TABLE, "baustelle"),
        ]);
        let config = resolve_remote_config(Some(&profile()), |key| {
            env.get(key).map(|value| (*value).to_string())
        })
        .unwrap()
        .unwrap();
        assert_eq!(config.bearer_token(), "user-token");
        assert_eq!(config.table, "baustelle");
    }

    #[test]
    fn nothing_configured_means_no_remote() {
        assert_eq!(resolve_remote_config(None, |_| None).unwrap(), None);

        let partial = CliProfile {
            supabase_url: Some("https://project.supabase.co".to_string()),
            ..CliProfile::default()
        };
        assert_eq!(partial.missing_fields(), vec!["supabase_anon_key"]);
        assert!(matches!(
            resolve_remote_config(Some(&partial), |_| None),
            Err(ConfigError::Missing(_))
        ));
    }
}
