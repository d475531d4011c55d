//! Configuration management for onair-desk

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::capture::Timeouts;
use crate::onair::DEFAULT_HISTORY_CAPACITY;

/// Overrides the config file location
pub const CONFIG_ENV: &str = "ONAIR_DESK_CONFIG";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Catalog and settings storage
    #[serde(default)]
    pub data: DataConfig,

    /// Undo/redo journal
    #[serde(default)]
    pub history: HistoryConfig,

    /// OBS connection time limits
    #[serde(default)]
    pub capture: CaptureConfig,

    /// Poll cadence of the `watch` command
    #[serde(default)]
    pub overlay: OverlayConfig,

    /// Path to config file (not serialized)
    #[serde(skip)]
    config_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// Static overlay and console pages; skipped when the directory is missing
    #[serde(default = "default_public_dir")]
    pub public_dir: PathBuf,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataConfig {
    /// Directory holding participants, contests, specials and settings.
    /// Defaults to the platform data directory.
    #[serde(default)]
    pub directory: Option<PathBuf>,

    /// Where the Text Source files go. Defaults to `out` in the data directory.
    #[serde(default)]
    pub output_directory: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "default_history_capacity")]
    pub capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    #[serde(default = "default_capture_timeout_ms")]
    pub connect_timeout_ms: u64,

    #[serde(default = "default_capture_timeout_ms")]
    pub request_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverlayConfig {
    #[serde(default = "default_state_interval")]
    pub state_interval_ms: u64,

    #[serde(default = "default_settings_interval")]
    pub settings_interval_ms: u64,

    #[serde(default = "default_status_interval")]
    pub status_interval_ms: u64,

    /// Empty fields drop out of layout instead of keeping their space
    #[serde(default = "default_true")]
    pub hide_empty: bool,
}

// Default value functions
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    3000
}

fn default_public_dir() -> PathBuf {
    PathBuf::from("public")
}

fn default_history_capacity() -> usize {
    DEFAULT_HISTORY_CAPACITY
}

fn default_capture_timeout_ms() -> u64 {
    3000
}

fn default_state_interval() -> u64 {
    250
}

fn default_settings_interval() -> u64 {
    1000
}

fn default_status_interval() -> u64 {
    2000
}

fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            http_port: default_http_port(),
            public_dir: default_public_dir(),
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            capacity: default_history_capacity(),
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_capture_timeout_ms(),
            request_timeout_ms: default_capture_timeout_ms(),
        }
    }
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            state_interval_ms: default_state_interval(),
            settings_interval_ms: default_settings_interval(),
            status_interval_ms: default_status_interval(),
            hide_empty: true,
        }
    }
}

impl CaptureConfig {
    pub fn timeouts(&self) -> Timeouts {
        Timeouts {
            connect: Duration::from_millis(self.connect_timeout_ms.max(1)),
            request: Duration::from_millis(self.request_timeout_ms.max(1)),
        }
    }
}

impl Config {
    /// Load configuration from `ONAIR_DESK_CONFIG` or the default location,
    /// creating a default file when there is none
    pub fn load() -> Result<Self> {
        let config_path = match std::env::var_os(CONFIG_ENV) {
            Some(path) => PathBuf::from(path),
            None => Self::default_config_path()?,
        };
        Self::load_from(&config_path)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            let contents = std::fs::read_to_string(config_path)
                .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

            let mut config: Config = toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {:?}", config_path))?;

            config.config_path = Some(config_path.to_path_buf());
            Ok(config)
        } else {
            let config = Config {
                config_path: Some(config_path.to_path_buf()),
                ..Config::default()
            };
            config.save()?;
            Ok(config)
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_path = self.config_path()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(&config_path, contents)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;

        Ok(())
    }

    /// Get the config file path
    pub fn config_path(&self) -> Result<PathBuf> {
        match &self.config_path {
            Some(path) => Ok(path.clone()),
            None => Self::default_config_path(),
        }
    }

    /// Directory the catalog and settings blob live in
    pub fn data_dir(&self) -> Result<PathBuf> {
        match &self.data.directory {
            Some(dir) => Ok(dir.clone()),
            None => Ok(project_dirs()?.data_dir().to_path_buf()),
        }
    }

    /// Directory of the `current_title.txt` family of files
    pub fn output_dir(&self) -> Result<PathBuf> {
        match &self.data.output_directory {
            Some(dir) => Ok(dir.clone()),
            None => Ok(self.data_dir()?.join("out")),
        }
    }

    /// Address the HTTP server listens on
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.server.bind_address, self.server.http_port)
    }

    fn default_config_path() -> Result<PathBuf> {
        Ok(project_dirs()?.config_dir().join("config.toml"))
    }
}

pub(crate) fn project_dirs() -> Result<directories::ProjectDirs> {
    directories::ProjectDirs::from("dev", "onair-desk", "onair-desk")
        .context("Failed to determine project directories")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_sections_use_defaults() {
        let config: Config = toml::from_str(
            r#"
            [server]
            http_port = 8080

            [overlay]
            hide_empty = false
            "#,
        )
        .unwrap();

        assert_eq!(config.server.http_port, 8080);
        assert_eq!(config.server.bind_address, "0.0.0.0");
        assert_eq!(config.history.capacity, DEFAULT_HISTORY_CAPACITY);
        assert_eq!(config.capture.connect_timeout_ms, 3000);
        assert_eq!(config.overlay.state_interval_ms, 250);
        assert!(!config.overlay.hide_empty);
        assert!(config.data.directory.is_none());
    }

    #[test]
    fn test_load_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.config_path().unwrap(), path);

        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded.server.http_port, config.server.http_port);
    }

    #[test]
    fn test_broken_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[server\nhttp_port = ").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_explicit_data_dir() {
        let config: Config = toml::from_str("[data]\ndirectory = \"/srv/onair\"\n").unwrap();
        assert_eq!(config.data_dir().unwrap(), PathBuf::from("/srv/onair"));
        assert_eq!(config.output_dir().unwrap(), PathBuf::from("/srv/onair/out"));

        let config: Config = toml::from_str(
            "[data]\ndirectory = \"/srv/onair\"\noutput_directory = \"/srv/obs-text\"\n",
        )
        .unwrap();
        assert_eq!(config.output_dir().unwrap(), PathBuf::from("/srv/obs-text"));
    }

    #[test]
    fn test_timeouts_from_config() {
        let capture = CaptureConfig {
            connect_timeout_ms: 1500,
            request_timeout_ms: 0,
        };
        let timeouts = capture.timeouts();
        assert_eq!(timeouts.connect, Duration::from_millis(1500));
        assert_eq!(timeouts.request, Duration::from_millis(1));
    }

    #[test]
    fn test_listen_address() {
        let config = Config::default();
        assert_eq!(config.listen_address(), "0.0.0.0:3000");
    }
}
