//! Application configuration management.
//!
//! This module handles loading the application configuration:
//! the gates service URL and API key, the cache TTL and the connectivity
//! probe interval.
//!
//! Configuration is stored at `~/.config/starseeker/config.json`.
//! `STARSEEKER_API_URL` and `STARSEEKER_API_KEY` override the file.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::cache::DEFAULT_TTL;

/// Application name used for config/cache directory paths
const APP_NAME: &str = "starseeker";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Environment variable overriding `api_url`
pub const API_URL_ENV: &str = "STARSEEKER_API_URL";

/// Environment variable overriding `api_key`
pub const API_KEY_ENV: &str = "STARSEEKER_API_KEY";

/// Default seconds between connectivity probes
const DEFAULT_PROBE_INTERVAL_SECS: u64 = 15;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub api_url: Option<String>,
    pub api_key: Option<String>,
    pub cache_ttl_minutes: Option<u64>,
    pub probe_interval_secs: Option<u64>,
}

impl Config {
    /// Load the config file (defaults if missing), then apply environment overrides.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            serde_json::from_str(&contents)?
        } else {
            Self::default()
        };
        config.apply_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Overlay values from `lookup` (normally the process environment).
    /// Empty values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        if let Some(url) = non_empty(API_URL_ENV) {
            self.api_url = Some(url);
        }
        if let Some(key) = non_empty(API_KEY_ENV) {
            self.api_key = Some(key);
        }
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Directory holding the persisted cache and favorites.
    pub fn data_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    pub fn api_url(&self) -> Result<&str> {
        self.api_url.as_deref().ok_or_else(|| {
            anyhow::anyhow!(
                "No API URL configured. Set {} or api_url in the config file",
                API_URL_ENV
            )
        })
    }

    pub fn cache_ttl(&self) -> Duration {
        self.cache_ttl_minutes
            .map(|m| Duration::from_secs(m.saturating_mul(60)))
            .unwrap_or(DEFAULT_TTL)
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(
            self.probe_interval_secs
                .filter(|s| *s > 0)
                .unwrap_or(DEFAULT_PROBE_INTERVAL_SECS),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.cache_ttl(), Duration::from_secs(300));
        assert_eq!(config.probe_interval(), Duration::from_secs(15));
        assert!(config.api_url().is_err());
    }

    #[test]
    fn test_overrides_replace_file_values() {
        let mut config = Config {
            api_url: Some("https://file.example.com".to_string()),
            api_key: Some("file-key".to_string()),
            ..Default::default()
        };

        config.apply_overrides(|name| match name {
            API_URL_ENV => Some("https://env.example.com".to_string()),
            API_KEY_ENV => Some("   ".to_string()),
            _ => None,
        });

        assert_eq!(config.api_url().unwrap(), "https://env.example.com");
        assert_eq!(config.api_key.as_deref(), Some("file-key"));
    }

    #[test]
    fn test_parse_config_file() {
        let json = r#"{
            "api_url": "https://api.example.com",
            "cache_ttl_minutes": 10,
            "probe_interval_secs": 0
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.cache_ttl(), Duration::from_secs(600));
        // Zero falls back to the default rather than spinning
        assert_eq!(config.probe_interval(), Duration::from_secs(15));
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_huge_ttl_saturates() {
        let config = Config {
            cache_ttl_minutes: Some(u64::MAX),
            ..Default::default()
        };
        assert_eq!(config.cache_ttl(), Duration::from_secs(u64::MAX));
    }
}
