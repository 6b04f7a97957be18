//! Application configuration management.
//!
//! Configuration is stored at `~/.config/waymark/config.json` (or the
//! platform equivalent). A missing file yields the defaults. A few settings
//! can be overridden through `WAYMARK_*` environment variables.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::geocoding::nominatim::{DEFAULT_GEOCODER_URL, DEFAULT_USER_AGENT};
use crate::geocoding::NominatimSettings;
use crate::persistence::MARKERS_FILE;

/// Application name used for config/data directory paths
const APP_NAME: &str = "waymark";

/// Config file name
const CONFIG_FILE: &str = "config.json";

pub const ENV_DATA_DIR: &str = "WAYMARK_DATA_DIR";
pub const ENV_GEOCODER_URL: &str = "WAYMARK_GEOCODER_URL";
pub const ENV_OFFLINE: &str = "WAYMARK_OFFLINE";

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// Where the marker store lives. Defaults to the platform data dir.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    #[serde(default)]
    pub geocoder_url: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
    /// Preferred language for resolved addresses, e.g. "en" or "de".
    #[serde(default)]
    pub language: Option<String>,
    /// When set, logs are also written to daily files in this directory.
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
    /// Routing preference: start routes at the current location rather
    /// than at the first marker.
    #[serde(default)]
    pub start_from_my_location: bool,
    /// Skip reverse geocoding entirely.
    #[serde(default)]
    pub offline: bool,
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Apply `WAYMARK_*` overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = lookup(ENV_DATA_DIR).filter(|v| !v.trim().is_empty()) {
            self.data_dir = Some(PathBuf::from(dir));
        }
        if let Some(url) = lookup(ENV_GEOCODER_URL).filter(|v| !v.trim().is_empty()) {
            self.geocoder_url = Some(url);
        }
        if let Some(flag) = lookup(ENV_OFFLINE) {
            self.offline = matches!(
                flag.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            );
        }
    }

    pub fn store_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.data_dir {
            return Ok(dir.clone());
        }
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    pub fn store_path(&self) -> Result<PathBuf> {
        Ok(self.store_dir()?.join(MARKERS_FILE))
    }

    pub fn nominatim_settings(&self) -> NominatimSettings {
        NominatimSettings {
            base_url: self
                .geocoder_url
                .clone()
                .unwrap_or_else(|| DEFAULT_GEOCODER_URL.to_string()),
            user_agent: self
                .user_agent
                .clone()
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            language: self.language.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_store_path_uses_data_dir() {
        let config = Config {
            data_dir: Some(PathBuf::from("/tmp/waymark-data")),
            ..Config::default()
        };
        assert_eq!(
            config.store_path().unwrap(),
            PathBuf::from("/tmp/waymark-data/markers.json")
        );
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_DATA_DIR, "/srv/markers"),
            (ENV_GEOCODER_URL, "http://localhost:8080"),
            (ENV_OFFLINE, "TRUE"),
        ]
        .into_iter()
        .collect();
        let mut config = Config::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.data_dir, Some(PathBuf::from("/srv/markers")));
        assert_eq!(config.geocoder_url.as_deref(), Some("http://localhost:8080"));
        assert!(config.offline);
    }

    #[test]
    fn test_blank_overrides_are_ignored() {
        let mut config = Config {
            geocoder_url: Some("http://geo".to_string()),
            offline: true,
            ..Config::default()
        };
        config.apply_overrides(|key| match key {
            ENV_GEOCODER_URL => Some("  ".to_string()),
            ENV_OFFLINE => Some("0".to_string()),
            _ => None,
        });
        assert_eq!(config.geocoder_url.as_deref(), Some("http://geo"));
        assert!(!config.offline);
    }

    #[test]
    fn test_nominatim_settings_defaults() {
        let settings = Config::default().nominatim_settings();
        assert_eq!(settings.base_url, DEFAULT_GEOCODER_URL);
        assert_eq!(settings.user_agent, DEFAULT_USER_AGENT);
        assert!(settings.language.is_none());
    }

    #[test]
    fn test_partial_config_parses() {
        let config: Config = serde_json::from_str(r#"{"offline": true}"#).unwrap();
        assert!(config.offline);
        assert!(config.data_dir.is_none());
        assert!(!config.start_from_my_location);
    }
}
