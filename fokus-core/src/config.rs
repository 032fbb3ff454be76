//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/fokus/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/fokus/` (~/.config/fokus/)
//! - Data: `$XDG_DATA_HOME/fokus/` (~/.local/share/fokus/)
//! - State/Logs: `$XDG_STATE_HOME/fokus/` (~/.local/state/fokus/)

use crate::error::{Error, Result};
use crate::timer::SwitchPolicy;
use serde::Deserialize;
use std::path::PathBuf;

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_DATA_HOME or ~/.local/share
fn xdg_data_home() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Timer defaults and behavior
    #[serde(default)]
    pub timer: TimerConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Timer defaults and subject-switch behavior
#[derive(Debug, Deserialize, Clone)]
pub struct TimerConfig {
    /// Countdown length in seconds for subjects created without one
    #[serde(default = "default_session_secs")]
    pub default_session_secs: u32,

    /// Name of the subject seeded on first run
    #[serde(default = "default_subject_name")]
    pub default_subject: String,

    /// What to do with an active session when switching to its subject
    #[serde(default)]
    pub switch_policy: SwitchPolicy,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            default_session_secs: default_session_secs(),
            default_subject: default_subject_name(),
            switch_policy: SwitchPolicy::default(),
        }
    }
}

fn default_session_secs() -> u32 {
    25 * 60
}

fn default_subject_name() -> String {
    "General".to_string()
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/fokus/config.toml` (~/.config/fokus/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("fokus").join("config.toml")
    }

    /// Returns the data directory path (for the SQLite database)
    ///
    /// `$XDG_DATA_HOME/fokus/` (~/.local/share/fokus/)
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join("fokus")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/fokus/` (~/.local/state/fokus/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("fokus")
    }

    /// Returns the database file path
    ///
    /// `$XDG_DATA_HOME/fokus/data.db` (~/.local/share/fokus/data.db)
    pub fn database_path() -> PathBuf {
        Self::data_dir().join("data.db")
    }

    /// Returns the log file path
    ///
    /// `$XDG_STATE_HOME/fokus/fokus.log` (~/.local/state/fokus/fokus.log)
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("fokus.log")
    }

    /// Ensure XDG base directory environment variables are set.
    ///
    /// This is mainly for CLI binaries that want explicit, stable path behavior
    /// before invoking other components that read these env vars.
    pub fn ensure_xdg_env() {
        let home = home_dir();

        if std::env::var("XDG_DATA_HOME").is_err() {
            std::env::set_var("XDG_DATA_HOME", home.join(".local/share"));
        }

        if std::env::var("XDG_STATE_HOME").is_err() {
            std::env::set_var("XDG_STATE_HOME", home.join(".local/state"));
        }

        if std::env::var("XDG_CONFIG_HOME").is_err() {
            std::env::set_var("XDG_CONFIG_HOME", home.join(".config"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_config_file() {
        let config = Config::default();
        assert_eq!(config.timer.default_session_secs, 1500);
        assert_eq!(config.timer.default_subject, "General");
        assert_eq!(config.timer.switch_policy, SwitchPolicy::DiscardActive);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn parses_partial_config() {
        let config: Config = toml::from_str(
            r#"
            [timer]
            default_session_secs = 3000
            switch_policy = "resume_active"
            "#,
        )
        .expect("config should parse");

        assert_eq!(config.timer.default_session_secs, 3000);
        assert_eq!(config.timer.switch_policy, SwitchPolicy::ResumeActive);
        // Untouched sections fall back to defaults
        assert_eq!(config.timer.default_subject, "General");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn rejects_malformed_config() {
        let result: std::result::Result<Config, _> = toml::from_str("timer = 12");
        assert!(result.is_err());
    }
}
