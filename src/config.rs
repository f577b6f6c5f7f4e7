//! Driver configuration file
//!
//! Every field is optional; a missing file or a missing key falls back to
//! the built-in defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use ccxt_hwmon::ChannelLimits;
use ccxt_transport::{SessionConfig, COMMANDER_CORE_XT_PID, VENDOR_ID};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Settings shared by every subcommand
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// USB vendor ID to look for
    pub vid: u16,
    /// USB product ID to look for
    pub pid: u16,
    /// Reply timeout of one exchange (ms)
    pub reply_timeout_ms: u64,
    /// Channel counts of the board
    pub limits: ChannelLimits,
    /// Print every frame by default
    pub monitor: bool,
    /// Add hex dumps to monitor output by default
    pub hex: bool,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            vid: VENDOR_ID,
            pid: COMMANDER_CORE_XT_PID,
            reply_timeout_ms: SessionConfig::default().reply_timeout_ms,
            limits: ChannelLimits::default(),
            monitor: false,
            hex: false,
        }
    }
}

impl DriverConfig {
    /// Get the default config file path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("ccxt-driver")
            .join("config.toml")
    }

    /// Load `path`, or the default path when none is given
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load_from(path),
            None => Self::load_from(&Self::default_path()),
        }
    }

    fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            reply_timeout_ms: self.reply_timeout_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config: DriverConfig = toml::from_str("").unwrap();
        assert_eq!(config, DriverConfig::default());
        assert_eq!(config.vid, 0x1b1c);
        assert_eq!(config.pid, 0x0c2a);
        assert_eq!(config.session_config(), SessionConfig::default());
    }

    #[test]
    fn test_partial_limits_keep_other_defaults() {
        let config: DriverConfig = toml::from_str(
            r#"
            reply_timeout_ms = 1000
            monitor = true

            [limits]
            temps = 4
            "#,
        )
        .unwrap();
        assert_eq!(config.reply_timeout_ms, 1000);
        assert!(config.monitor);
        assert!(!config.hex);
        assert_eq!(config.limits, ChannelLimits::with_four_temps());
        assert_eq!(config.session_config().reply_timeout_ms, 1000);
    }

    #[test]
    fn test_default_config_serializes() {
        let text = DriverConfig::default().to_toml().unwrap();
        assert!(text.contains("reply_timeout_ms = 300"));
        assert!(text.contains("[limits]"));
        let back: DriverConfig = toml::from_str(&text).unwrap();
        assert_eq!(back, DriverConfig::default());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let path = std::env::temp_dir().join("ccxt-driver-test-missing/config.toml");
        let config = DriverConfig::load(Some(&path)).unwrap();
        assert_eq!(config, DriverConfig::default());
    }

    #[test]
    fn test_malformed_file_is_reported() {
        let dir = std::env::temp_dir().join(format!("ccxt-driver-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "reply_timeout_ms = \"soon\"").unwrap();

        let err = DriverConfig::load(Some(&path)).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
