//! Configuration loading and persistence.
//!
//! Handles reading and writing the simtree configuration file and applying
//! `SIMTREE_*` environment overrides on top of it.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, time::Duration};

use crate::constants;

/// Configuration for a simtree process (server root and client mirror).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Name of the designated root component.
    pub root_name: String,
    /// Sender id stamped on frames this process emits.
    pub client_id: String,
    /// Delimiter used when encoding arrays.
    pub array_delimiter: String,
    /// Record completed signals in the journal.
    pub journal_enabled: bool,
    /// Processing thread receive timeout in milliseconds.
    pub poll_interval_ms: u64,
    /// Show advanced (non-basic) components and options in the client mirror.
    pub advanced_mode: bool,
    /// Show debug-only client components.
    pub debug_mode: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root_name: constants::DEFAULT_ROOT_NAME.to_string(),
            client_id: uuid::Uuid::new_v4().to_string(),
            array_delimiter: constants::DEFAULT_ARRAY_DELIMITER.to_string(),
            journal_enabled: true,
            poll_interval_ms: constants::PROCESSING_POLL_INTERVAL.as_millis() as u64,
            advanced_mode: false,
            debug_mode: false,
        }
    }
}

impl Config {
    /// Returns the configuration directory path, creating it if necessary.
    ///
    /// Directory selection priority:
    /// 1. `#[cfg(test)]` (unit tests): `tmp/simtree-test`
    /// 2. `SIMTREE_CONFIG_DIR` env var: explicit override
    /// 3. `SIMTREE_ENV=test`: `tmp/simtree-test` (integration tests)
    /// 4. Default: platform config dir joined with `simtree`
    pub fn config_dir() -> Result<PathBuf> {
        let dir = {
            #[cfg(test)]
            {
                PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tmp/simtree-test")
            }

            #[cfg(not(test))]
            {
                if let Ok(dir) = std::env::var("SIMTREE_CONFIG_DIR") {
                    PathBuf::from(dir)
                } else if crate::env::is_test_mode() {
                    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tmp/simtree-test")
                } else {
                    dirs::config_dir()
                        .context("Could not determine config directory")?
                        .join("simtree")
                }
            }
        };
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create config dir {}", dir.display()))?;
        Ok(dir)
    }

    /// Loads configuration from file, with environment variable overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from_file().unwrap_or_else(|e| {
            log::debug!("Using default config: {e:#}");
            Self::default()
        });
        config.apply_env_overrides();
        Ok(config)
    }

    fn load_from_file() -> Result<Self> {
        let config_path = Self::config_dir()?.join("config.json");
        if config_path.exists() {
            let content = fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read {}", config_path.display()))?;
            Self::from_json(&content)
                .with_context(|| format!("Failed to parse {}", config_path.display()))
        } else {
            anyhow::bail!("Config file not found")
        }
    }

    /// Parse a config file body, replacing unusable values with defaults.
    fn from_json(content: &str) -> Result<Self> {
        let mut config: Self = serde_json::from_str(content)?;
        if config.array_delimiter.is_empty() {
            log::warn!(
                "Ignoring empty array_delimiter, using \"{}\"",
                constants::DEFAULT_ARRAY_DELIMITER
            );
            config.array_delimiter = constants::DEFAULT_ARRAY_DELIMITER.to_string();
        }
        if config.root_name.is_empty() {
            log::warn!("Ignoring empty root_name, using \"{}\"", constants::DEFAULT_ROOT_NAME);
            config.root_name = constants::DEFAULT_ROOT_NAME.to_string();
        }
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(root_name) = std::env::var("SIMTREE_ROOT_NAME") {
            if !root_name.is_empty() {
                self.root_name = root_name;
            }
        }

        if let Ok(client_id) = std::env::var("SIMTREE_CLIENT_ID") {
            if !client_id.is_empty() {
                self.client_id = client_id;
            }
        }

        if let Ok(delimiter) = std::env::var("SIMTREE_ARRAY_DELIMITER") {
            if delimiter.is_empty() {
                log::warn!("Ignoring empty SIMTREE_ARRAY_DELIMITER");
            } else {
                self.array_delimiter = delimiter;
            }
        }

        if let Ok(interval) = std::env::var("SIMTREE_POLL_INTERVAL_MS") {
            if let Ok(ms) = interval.parse::<u64>() {
                self.poll_interval_ms = ms;
            }
        }

        if let Ok(journal) = std::env::var("SIMTREE_JOURNAL") {
            self.journal_enabled = !matches!(journal.as_str(), "0" | "false");
        }
    }

    /// Persists the current configuration to disk.
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_dir()?.join("config.json");
        fs::write(&config_path, serde_json::to_string_pretty(self)?)
            .with_context(|| format!("Failed to write {}", config_path.display()))?;
        Ok(())
    }

    /// Processing thread receive timeout.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.root_name, "Root");
        assert_eq!(config.array_delimiter, ";");
        assert!(config.journal_enabled);
        assert_eq!(config.poll_interval_ms, 100);
        assert!(!config.advanced_mode);
        assert!(!config.debug_mode);
        assert!(uuid::Uuid::parse_str(&config.client_id).is_ok());
    }

    #[test]
    fn test_missing_fields_fall_back_to_defaults() {
        let config: Config = serde_json::from_str(r#"{"root_name":"Model"}"#).unwrap();
        assert_eq!(config.root_name, "Model");
        assert_eq!(config.array_delimiter, ";");
        assert_eq!(config.poll_interval(), Duration::from_millis(100));
    }

    #[test]
    fn test_config_json_roundtrip() {
        let mut config = Config::default();
        config.advanced_mode = true;
        config.array_delimiter = "@@".to_string();
        let json = serde_json::to_string(&config).unwrap();
        let back: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_empty_delimiter_in_file_falls_back() {
        let config = Config::from_json(r#"{"array_delimiter":"","root_name":""}"#).unwrap();
        assert_eq!(config.array_delimiter, ";");
        assert_eq!(config.root_name, "Root");

        let config = Config::from_json(r#"{"array_delimiter":"|"}"#).unwrap();
        assert_eq!(config.array_delimiter, "|");
    }

    #[test]
    fn test_load_from_file_sanitizes_delimiter() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"array_delimiter":""}"#).unwrap();
        let config = Config::from_json(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert!(!config.array_delimiter.is_empty());
    }

    #[test]
    fn test_poll_interval_never_zero() {
        let config = Config { poll_interval_ms: 0, ..Config::default() };
        assert_eq!(config.poll_interval(), Duration::from_millis(1));
    }
}
