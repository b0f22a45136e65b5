//! TOML-based configuration persistence for the host application.
//!
//! Reads and writes [`AppConfig`] to the platform-appropriate config file:
//! - Windows:  `%APPDATA%\Pulsegen\config.toml`
//! - Linux:    `~/.config/pulsegen/config.toml`
//! - macOS:    `~/Library/Application Support/Pulsegen/config.toml`
//!
//! Every field carries a `#[serde(default = "...")]` so the app works on
//! first run (no file yet) and when upgrading from an older file that is
//! missing newer fields.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level application configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub serial: SerialSettings,
    #[serde(default)]
    pub flash: FlashSettings,
    /// `tracing` log level: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Serial link settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SerialSettings {
    /// Baud rate for the generator link.
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    /// Firmware version string the handshake must see, exactly.
    #[serde(default = "default_expected_version")]
    pub expected_version: String,
    /// Total time the firmware has to answer the version query.
    #[serde(default = "default_handshake_timeout_ms")]
    pub handshake_timeout_ms: u64,
    /// Cadence at which the receive buffer is polled during the handshake.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

/// Firmware build-and-upload tool settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FlashSettings {
    /// Path to the `arduino-cli` binary.
    #[serde(default = "default_cli_path")]
    pub cli_path: PathBuf,
    /// Path to the generator sketch directory.
    #[serde(default = "default_sketch_path")]
    pub sketch_path: PathBuf,
    /// Fully qualified board name passed to the tool.
    #[serde(default = "default_fqbn")]
    pub fqbn: String,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}
fn default_baud_rate() -> u32 {
    9600
}
fn default_expected_version() -> String {
    "1.1.0".to_string()
}
fn default_handshake_timeout_ms() -> u64 {
    3000
}
fn default_poll_interval_ms() -> u64 {
    50
}
fn default_cli_path() -> PathBuf {
    PathBuf::from("arduino-cli")
}
fn default_sketch_path() -> PathBuf {
    PathBuf::from("sketch")
}
fn default_fqbn() -> String {
    "arduino:sam:arduino_due_x_dbg".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            serial: SerialSettings::default(),
            flash: FlashSettings::default(),
            log_level: default_log_level(),
        }
    }
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            baud_rate: default_baud_rate(),
            expected_version: default_expected_version(),
            handshake_timeout_ms: default_handshake_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl Default for FlashSettings {
    fn default() -> Self {
        Self {
            cli_path: default_cli_path(),
            sketch_path: default_sketch_path(),
            fqbn: default_fqbn(),
        }
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Determines the platform-appropriate directory for the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when the platform config
/// base directory cannot be determined from the environment.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)
}

/// Resolves the full path to the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory
/// cannot be determined.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.toml"))
}

/// Loads [`AppConfig`] from disk, returning `AppConfig::default()` if the
/// file does not yet exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not
/// found", and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let path = config_file_path()?;

    match std::fs::read_to_string(&path) {
        Ok(content) => {
            let cfg: AppConfig = toml::from_str(&content)?;
            Ok(cfg)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(e) => Err(ConfigError::Io { path, source: e }),
    }
}

/// Persists `config` to disk, creating the directory if needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config(config: &AppConfig) -> Result<(), ConfigError> {
    let path = config_file_path()?;

    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(&path, content).map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })?;
    Ok(())
}

/// Resolves the platform config base directory.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("Pulsegen"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("pulsegen"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME")
            .map(|h| PathBuf::from(h).join("Library/Application Support/Pulsegen"))
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_serial_settings_match_firmware_contract() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.serial.baud_rate, 9600);
        assert_eq!(cfg.serial.expected_version, "1.1.0");
        assert_eq!(cfg.serial.handshake_timeout_ms, 3000);
        assert_eq!(cfg.serial.poll_interval_ms, 50);
    }

    #[test]
    fn test_empty_toml_parses_to_full_defaults() {
        let cfg: AppConfig = toml::from_str("").expect("parse");
        assert_eq!(cfg, AppConfig::default());
    }

    #[test]
    fn test_partial_section_fills_missing_fields_from_defaults() {
        let cfg: AppConfig = toml::from_str(
            r#"
            [serial]
            baud_rate = 115200
            "#,
        )
        .expect("parse");
        assert_eq!(cfg.serial.baud_rate, 115200);
        assert_eq!(cfg.serial.expected_version, "1.1.0");
        assert_eq!(cfg.flash.fqbn, "arduino:sam:arduino_due_x_dbg");
        assert_eq!(cfg.log_level, "info");
    }

    #[test]
    fn test_round_trip_through_toml() {
        let mut cfg = AppConfig::default();
        cfg.serial.expected_version = "2.0.0".into();
        cfg.flash.fqbn = "arduino:avr:uno".into();

        let text = toml::to_string_pretty(&cfg).expect("serialize");
        let back: AppConfig = toml::from_str(&text).expect("parse");
        assert_eq!(back, cfg);
    }
}
