//! TOML configuration for the device runtime.
//!
//! Read from `/etc/hidmacro/device.toml` by default (override with
//! `--config`).  Every field has a default, so a missing file or a file that
//! only sets a few keys both work.  Command-line flags override file values.
//!
//! ```toml
//! log_level = "info"
//!
//! [screen]
//! width = 1920
//! height = 1080
//!
//! [transport]
//! serial = "/dev/ttyGS0"
//! hid = "/dev/hidg0"
//! retry_backoff_ms = 500
//!
//! [playback]
//! dwell_ms = 50
//! poll_slice_ms = 10
//! ```
//!
//! # Serde default values
//!
//! Fields annotated with `#[serde(default = "some_fn")]` take the value of
//! `some_fn()` when the key is absent, and `#[serde(default)]` on a section
//! fills the whole section from its `Default` impl.

use std::path::{Path, PathBuf};
use std::time::Duration;

use hidmacro_core::{GeometryError, ScreenGeometry};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Config file read when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/hidmacro/device.toml";

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
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

    /// The configured screen has a zero dimension.
    #[error(transparent)]
    Geometry(#[from] GeometryError),

    /// `init_config` refused to overwrite an existing file.
    #[error("config file {0} already exists")]
    AlreadyExists(PathBuf),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level device configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeviceConfig {
    /// `tracing` filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub screen: ScreenConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub playback: PlaybackConfig,
}

/// Resolution of the screen the macros were recorded on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScreenConfig {
    #[serde(default = "default_screen_width")]
    pub width: u32,
    #[serde(default = "default_screen_height")]
    pub height: u32,
}

/// Device node paths and HID retry policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransportConfig {
    /// Serial gadget carrying the command protocol.
    #[serde(default = "default_serial_path")]
    pub serial: PathBuf,
    /// HID gadget node receiving the mouse reports.
    #[serde(default = "default_hid_path")]
    pub hid: PathBuf,
    /// Wait before the single retry of a failed report send.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

/// Playback timing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlaybackConfig {
    /// Time a click holds its button down.
    #[serde(default = "default_dwell_ms")]
    pub dwell_ms: u64,
    /// Longest the scheduler sleeps before polling the serial line again.
    #[serde(default = "default_poll_slice_ms")]
    pub poll_slice_ms: u64,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}
fn default_screen_width() -> u32 {
    1920
}
fn default_screen_height() -> u32 {
    1080
}
fn default_serial_path() -> PathBuf {
    PathBuf::from("/dev/ttyGS0")
}
fn default_hid_path() -> PathBuf {
    PathBuf::from("/dev/hidg0")
}
fn default_retry_backoff_ms() -> u64 {
    500
}
fn default_dwell_ms() -> u64 {
    50
}
fn default_poll_slice_ms() -> u64 {
    10
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            screen: ScreenConfig::default(),
            transport: TransportConfig::default(),
            playback: PlaybackConfig::default(),
        }
    }
}

impl Default for ScreenConfig {
    fn default() -> Self {
        Self {
            width: default_screen_width(),
            height: default_screen_height(),
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            serial: default_serial_path(),
            hid: default_hid_path(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            dwell_ms: default_dwell_ms(),
            poll_slice_ms: default_poll_slice_ms(),
        }
    }
}

impl DeviceConfig {
    /// Validated screen geometry.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Geometry`] if either dimension is zero.
    pub fn geometry(&self) -> Result<ScreenGeometry, ConfigError> {
        Ok(ScreenGeometry::new(self.screen.width, self.screen.height)?)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.transport.retry_backoff_ms)
    }

    pub fn dwell(&self) -> Duration {
        Duration::from_millis(self.playback.dwell_ms)
    }

    pub fn poll_slice(&self) -> Duration {
        Duration::from_millis(self.playback.poll_slice_ms)
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Loads `DeviceConfig` from `path`, returning `DeviceConfig::default()` if
/// the file does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: &Path) -> Result<DeviceConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(DeviceConfig::default()),
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Writes `config` to `path`, creating parent directories as needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config(path: &Path, config: &DeviceConfig) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Writes a fresh config file for first-time setup.
///
/// An existing file is only replaced when `overwrite` is set.
///
/// # Errors
///
/// Returns [`ConfigError::AlreadyExists`] if `path` exists and `overwrite` is
/// false, otherwise the errors of [`save_config`].
pub fn init_config(path: &Path, config: &DeviceConfig, overwrite: bool) -> Result<(), ConfigError> {
    if !overwrite && path.exists() {
        return Err(ConfigError::AlreadyExists(path.to_path_buf()));
    }
    save_config(path, config)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("hidmacro-device-{}-{name}", std::process::id()))
            .join("device.toml")
    }

    // ── Defaults ──────────────────────────────────────────────────────────────

    #[test]
    fn test_default_config_has_expected_values() {
        let cfg = DeviceConfig::default();

        assert_eq!(cfg.log_level, "info");
        assert_eq!((cfg.screen.width, cfg.screen.height), (1920, 1080));
        assert_eq!(cfg.transport.serial, PathBuf::from("/dev/ttyGS0"));
        assert_eq!(cfg.transport.hid, PathBuf::from("/dev/hidg0"));
        assert_eq!(cfg.retry_backoff(), Duration::from_millis(500));
        assert_eq!(cfg.dwell(), Duration::from_millis(50));
        assert_eq!(cfg.poll_slice(), Duration::from_millis(10));
    }

    #[test]
    fn test_partial_file_fills_missing_keys_with_defaults() {
        // Arrange
        let text = "[screen]\nwidth = 2560\n";

        // Act
        let cfg: DeviceConfig = toml::from_str(text).unwrap();

        // Assert
        assert_eq!(cfg.screen.width, 2560);
        assert_eq!(cfg.screen.height, 1080);
        assert_eq!(cfg.playback, PlaybackConfig::default());
    }

    #[test]
    fn test_zero_width_is_a_geometry_error() {
        let mut cfg = DeviceConfig::default();
        cfg.screen.width = 0;

        assert!(matches!(cfg.geometry(), Err(ConfigError::Geometry(_))));
    }

    #[test]
    fn test_malformed_toml_is_parse_error() {
        let result: Result<DeviceConfig, _> = toml::from_str("[screen\nwidth = ");
        assert!(result.is_err());
    }

    // ── Repository ────────────────────────────────────────────────────────────

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let cfg = load_config(&temp_path("missing")).unwrap();
        assert_eq!(cfg, DeviceConfig::default());
    }

    #[test]
    fn test_save_then_load_round_trips() {
        // Arrange
        let path = temp_path("roundtrip");
        let mut cfg = DeviceConfig::default();
        cfg.screen.width = 3840;
        cfg.screen.height = 2160;
        cfg.playback.dwell_ms = 80;

        // Act
        save_config(&path, &cfg).unwrap();
        let restored = load_config(&path).unwrap();

        // Assert
        assert_eq!(restored, cfg);
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_init_config_writes_loadable_file() {
        // Arrange
        let path = temp_path("init");
        let mut cfg = DeviceConfig::default();
        cfg.screen.width = 2560;

        // Act
        init_config(&path, &cfg, false).unwrap();

        // Assert
        assert_eq!(load_config(&path).unwrap(), cfg);
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_init_config_keeps_existing_file_unless_overwrite() {
        // Arrange
        let path = temp_path("init-existing");
        let mut original = DeviceConfig::default();
        original.playback.dwell_ms = 75;
        save_config(&path, &original).unwrap();

        // Act
        let refused = init_config(&path, &DeviceConfig::default(), false);
        let kept = load_config(&path).unwrap();
        init_config(&path, &DeviceConfig::default(), true).unwrap();

        // Assert
        assert!(matches!(refused, Err(ConfigError::AlreadyExists(_))));
        assert_eq!(kept, original);
        assert_eq!(load_config(&path).unwrap(), DeviceConfig::default());
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }
}
