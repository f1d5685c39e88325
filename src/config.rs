//! Configuration management for the monitor.
//!
//! Loads configuration from TOML files and provides runtime defaults.

use crate::heuristics::{builtin_profiles, HeuristicRegistry, ProviderProfile, DEFAULT_PROVIDER};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Errors raised while saving or explicitly loading configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub timing: TimingConfig,

    #[serde(default)]
    pub playback: PlaybackConfig,

    #[serde(default)]
    pub heuristics: HeuristicsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Whether monitoring is enabled
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            log_level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Poll cadence of the generation probe
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Upper bound on one probe evaluation in an isolated context
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_ms: u64,

    /// Upper bound on one pause/play command per surface
    #[serde(default = "default_surface_timeout")]
    pub surface_timeout_ms: u64,

    /// Commands buffered per surface before new ones are dropped
    #[serde(default = "default_queue_depth")]
    pub surface_queue_depth: usize,

    /// Re-broadcast the current phase this often (0 disables)
    #[serde(default)]
    pub resync_interval_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            probe_timeout_ms: default_probe_timeout(),
            surface_timeout_ms: default_surface_timeout(),
            surface_queue_depth: default_queue_depth(),
            resync_interval_ms: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// Pause on a finish edge even when already paused
    #[serde(default)]
    pub pause_on_unmatched_finish: bool,

    /// Platform shown when a surface is first created
    #[serde(default = "default_platform")]
    pub default_platform: String,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            pause_on_unmatched_finish: false,
            default_platform: default_platform(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeuristicsConfig {
    /// Origin key of the profile used for unknown origins
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Extra providers, tried after the built-in ones
    #[serde(default)]
    pub providers: Vec<ProviderProfile>,
}

impl Default for HeuristicsConfig {
    fn default() -> Self {
        Self {
            default_provider: default_provider(),
            providers: Vec::new(),
        }
    }
}

// Default value functions for serde
fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_poll_interval() -> u64 {
    200
}

fn default_probe_timeout() -> u64 {
    1000
}

fn default_surface_timeout() -> u64 {
    2000
}

fn default_queue_depth() -> usize {
    8
}

fn default_platform() -> String {
    "instagram".to_string()
}

fn default_provider() -> String {
    DEFAULT_PROVIDER.to_string()
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Self {
        Self::load_from_path(&Self::default_config_path())
    }

    /// Load configuration from a specific path, falling back to defaults
    pub fn load_from_path(path: &Path) -> Self {
        match Self::read(path) {
            Ok(config) => {
                info!("Loaded configuration from {:?}", path);
                config
            }
            Err(ConfigError::Io(_)) => {
                info!("No config file found at {:?}, using defaults", path);
                Self::default()
            }
            Err(e) => {
                warn!("{}, using defaults", e);
                Self::default()
            }
        }
    }

    /// Read and parse a config file, surfacing errors
    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Get the default configuration file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("reelsmax")
            .join("config.toml")
    }

    /// Save configuration to the default path
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to_path(&Self::default_config_path())
    }

    /// Save configuration to a specific path
    pub fn save_to_path(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Built-in providers followed by the configured ones
    pub fn heuristic_registry(&self) -> HeuristicRegistry {
        let mut profiles = builtin_profiles();
        profiles.extend(self.heuristics.providers.iter().cloned());
        HeuristicRegistry::with_profiles(profiles, &self.heuristics.default_provider)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.general.enabled);
        assert_eq!(config.timing.poll_interval_ms, 200);
        assert_eq!(config.timing.resync_interval_ms, 0);
        assert!(!config.playback.pause_on_unmatched_finish);
        assert_eq!(config.heuristics.default_provider, "chatgpt.com");
    }

    #[test]
    fn test_parse_toml() {
        let toml_str = r#"
[general]
log_level = "debug"

[timing]
poll_interval_ms = 300

[playback]
pause_on_unmatched_finish = true

[[heuristics.providers]]
origin_match = "chat.deepseek.com"
name = "DeepSeek"
rules = ['div[class*="stop"]']
"#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.timing.poll_interval_ms, 300);
        assert_eq!(config.timing.probe_timeout_ms, 1000);
        assert!(config.playback.pause_on_unmatched_finish);
        assert_eq!(config.heuristics.providers.len(), 1);

        let registry = config.heuristic_registry();
        assert_eq!(registry.resolve("https://chat.deepseek.com/a").name, "DeepSeek");
        assert_eq!(registry.resolve("https://claude.ai").name, "Claude");
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.timing.poll_interval_ms = 250;
        config.playback.default_platform = "tiktok".to_string();
        config.save_to_path(&path).unwrap();

        let loaded = Config::read(&path).unwrap();
        assert_eq!(loaded.timing.poll_interval_ms, 250);
        assert_eq!(loaded.playback.default_platform, "tiktok");
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from_path(&dir.path().join("absent.toml"));
        assert_eq!(config.timing.poll_interval_ms, 200);
    }

    #[test]
    fn test_invalid_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[timing\npoll_interval_ms = ").unwrap();

        assert!(matches!(Config::read(&path), Err(ConfigError::Parse(_))));
        assert_eq!(Config::load_from_path(&path).timing.poll_interval_ms, 200);
    }
}
