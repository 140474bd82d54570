//! Configuration types for the chime engine.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level engine configuration.
///
/// Everything here is deployment-static. Reminder slot definitions are *not*
/// part of this file. They are fetched from the backend at engine start and
/// at every day rollover, so an ops-side change takes effect without a
/// redeploy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Clock / timezone settings.
    pub clock: ClockConfig,
    /// Polling cadence and fetch timeouts.
    pub poll: PollConfig,
    /// Dashboard backend endpoint.
    pub backend: BackendConfig,
    /// External alert channel settings.
    pub alerts: AlertConfig,
}

/// Fixed-offset clock configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    /// Fixed UTC offset of the deployment's business timezone, in minutes.
    ///
    /// Positive east of UTC (e.g. 330 for +05:30). No DST rules are applied;
    /// the deployment runs on one wall clock year-round.
    pub utc_offset_minutes: i32,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            utc_offset_minutes: 0,
        }
    }
}

/// Poller cadence and timeout configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// Seconds between change-detection poll ticks.
    pub interval_secs: u64,
    /// Bound on any single external fetch, in seconds.
    pub fetch_timeout_secs: u64,
    /// Seconds past local midnight before the rollover reschedule runs.
    ///
    /// Keeps the rollover clear of backend jobs that regenerate the day's
    /// data right at midnight.
    pub rollover_buffer_secs: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            fetch_timeout_secs: 10,
            rollover_buffer_secs: 90,
        }
    }
}

/// Dashboard backend endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL of the dashboard API (e.g. `https://crm.example.com`).
    pub base_url: String,
    /// Bearer token presented on every request, if the API requires one.
    pub api_token: Option<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_owned(),
            api_token: None,
        }
    }
}

/// External alert channel configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// Whether entries are forwarded to the external alert channel at all.
    ///
    /// Even when enabled, the channel's own authorization probe is consulted
    /// before each send.
    pub enabled: bool,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::error::ChimeError::Config(e.to_string()))
    }

    /// Load from the default config path, or defaults when no file exists.
    pub fn load_or_default() -> crate::error::Result<Self> {
        let path = Self::default_config_path();
        if path.exists() {
            Self::from_file(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &std::path::Path) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::ChimeError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> PathBuf {
        crate::chime_dirs::config_file()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn default_config_is_sane() {
        let config = EngineConfig::default();
        assert_eq!(config.poll.interval_secs, 60);
        assert_eq!(config.poll.fetch_timeout_secs, 10);
        assert_eq!(config.clock.utc_offset_minutes, 0);
        assert!(config.alerts.enabled);
    }

    #[test]
    fn toml_round_trip() {
        let mut config = EngineConfig::default();
        config.clock.utc_offset_minutes = 330;
        config.backend.base_url = "https://crm.example.com".to_owned();
        config.backend.api_token = Some("secret".to_owned());

        let toml_str = toml::to_string_pretty(&config).unwrap();
        let loaded: EngineConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(loaded.clock.utc_offset_minutes, 330);
        assert_eq!(loaded.backend.base_url, "https://crm.example.com");
        assert_eq!(loaded.backend.api_token.as_deref(), Some("secret"));
    }

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let config: EngineConfig = toml::from_str("[clock]\nutc_offset_minutes = -300\n").unwrap();
        assert_eq!(config.clock.utc_offset_minutes, -300);
        assert_eq!(config.poll.interval_secs, 60);
        assert_eq!(config.poll.rollover_buffer_secs, 90);
    }

    #[test]
    fn file_round_trip() {
        let dir = std::env::temp_dir().join("chime-config-roundtrip");
        let _ = std::fs::create_dir_all(&dir);
        let path = dir.join("config.toml");

        let mut config = EngineConfig::default();
        config.poll.interval_secs = 15;
        config.save_to_file(&path).expect("save");

        let loaded = EngineConfig::from_file(&path).expect("load");
        assert_eq!(loaded.poll.interval_secs, 15);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
