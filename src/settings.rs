//! Operator-editable settings blob
//!
//! A flat JSON document in the data directory holding the OBS endpoint,
//! screenshot parameters and overlay styling. Every field is defaulted on
//! its own, so older files keep working as fields are added. Saving
//! replaces the blob wholesale and bumps `version`, which overlays use to
//! decide whether to re-apply styles.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::capture::{MixerEndpoint, ScreenshotRequest};

pub const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub endpoint_host: String,
    pub endpoint_port: u16,
    pub credential: String,

    /// Screenshot refresh interval of the operator console; also the
    /// cadence capture staleness is measured against
    pub interval_sec: u64,
    pub quality: i32,
    pub width: u32,
    pub height: u32,
    /// Screenshot image format requested from OBS
    pub format: String,
    pub preview_requires_staging_mode: bool,
    pub auto_refresh: bool,

    #[serde(alias = "titleFontFamily")]
    pub title_font: String,
    #[serde(alias = "pairFontFamily")]
    pub pair_font: String,
    pub title_size_px: u32,
    pub pair_size_px: u32,
    pub title_color: String,
    pub pair_color: String,
    pub title_anim_type: String,
    pub title_anim_ms: u32,
    pub leader_anim_type: String,
    pub leader_anim_ms: u32,
    pub follower_anim_type: String,
    pub follower_anim_ms: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            endpoint_host: "localhost".to_string(),
            endpoint_port: 4455,
            credential: String::new(),
            interval_sec: 2,
            quality: 70,
            width: 640,
            height: 360,
            format: "jpg".to_string(),
            preview_requires_staging_mode: true,
            auto_refresh: true,
            title_font: "system-ui".to_string(),
            pair_font: "system-ui".to_string(),
            title_size_px: 48,
            pair_size_px: 40,
            title_color: "#ffffff".to_string(),
            pair_color: "#ffffff".to_string(),
            title_anim_type: "none".to_string(),
            title_anim_ms: 500,
            leader_anim_type: "none".to_string(),
            leader_anim_ms: 500,
            follower_anim_type: "none".to_string(),
            follower_anim_ms: 500,
        }
    }
}

impl Settings {
    /// Clamp values into ranges OBS and the overlay accept
    pub fn normalized(mut self) -> Self {
        self.endpoint_host = self.endpoint_host.trim().to_string();
        self.quality = self.quality.clamp(0, 100);
        self.width = self.width.max(8);
        self.height = self.height.max(8);
        self.interval_sec = self.interval_sec.max(1);
        if self.format.trim().is_empty() {
            self.format = "jpg".to_string();
        }
        self
    }

    pub fn endpoint(&self) -> MixerEndpoint {
        MixerEndpoint {
            host: self.endpoint_host.clone(),
            port: self.endpoint_port,
            password: Some(self.credential.clone()).filter(|c| !c.is_empty()),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.interval_sec.max(1))
    }

    /// The overlay styling part of the blob
    pub fn style(&self) -> OverlayStyle {
        OverlayStyle {
            title_font: self.title_font.clone(),
            pair_font: self.pair_font.clone(),
            title_size_px: self.title_size_px,
            pair_size_px: self.pair_size_px,
            title_color: self.title_color.clone(),
            pair_color: self.pair_color.clone(),
            title_anim_type: self.title_anim_type.clone(),
            title_anim_ms: self.title_anim_ms,
            leader_anim_type: self.leader_anim_type.clone(),
            leader_anim_ms: self.leader_anim_ms,
            follower_anim_type: self.follower_anim_type.clone(),
            follower_anim_ms: self.follower_anim_ms,
        }
    }

    /// Same settings with the styling replaced
    pub fn with_style(self, style: OverlayStyle) -> Self {
        Self {
            title_font: style.title_font,
            pair_font: style.pair_font,
            title_size_px: style.title_size_px,
            pair_size_px: style.pair_size_px,
            title_color: style.title_color,
            pair_color: style.pair_color,
            title_anim_type: style.title_anim_type,
            title_anim_ms: style.title_anim_ms,
            leader_anim_type: style.leader_anim_type,
            leader_anim_ms: style.leader_anim_ms,
            follower_anim_type: style.follower_anim_type,
            follower_anim_ms: style.follower_anim_ms,
            ..self
        }
    }

    pub fn screenshot_request(&self) -> ScreenshotRequest {
        ScreenshotRequest {
            width: self.width,
            height: self.height,
            quality: self.quality,
            format: self.format.clone(),
        }
    }
}

/// Fonts, colors and animations of the overlay, as stored in presets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OverlayStyle {
    #[serde(alias = "titleFontFamily")]
    pub title_font: String,
    #[serde(alias = "pairFontFamily")]
    pub pair_font: String,
    pub title_size_px: u32,
    pub pair_size_px: u32,
    pub title_color: String,
    pub pair_color: String,
    pub title_anim_type: String,
    pub title_anim_ms: u32,
    pub leader_anim_type: String,
    pub leader_anim_ms: u32,
    pub follower_anim_type: String,
    pub follower_anim_ms: u32,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Settings::default().style()
    }
}

/// Settings as served to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionedSettings {
    pub version: u64,
    #[serde(flatten)]
    pub settings: Settings,
}

/// Holder of the live settings blob
pub struct SettingsStore {
    path: Option<PathBuf>,
    current: RwLock<VersionedSettings>,
}

impl SettingsStore {
    /// Load `settings.json` from the data directory, or start from defaults
    pub fn load(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join(SETTINGS_FILE);

        let settings = if path.exists() {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings file: {:?}", path))?;
            match serde_json::from_str::<Settings>(&raw) {
                Ok(settings) => settings.normalized(),
                Err(e) => {
                    warn!("Failed to parse settings file {:?}: {}. Using defaults.", path, e);
                    Settings::default()
                }
            }
        } else {
            Settings::default()
        };

        Ok(Self {
            path: Some(path),
            current: RwLock::new(VersionedSettings {
                version: 1,
                settings,
            }),
        })
    }

    /// Settings that are never written to disk
    #[cfg(test)]
    pub fn in_memory(settings: Settings) -> Self {
        Self {
            path: None,
            current: RwLock::new(VersionedSettings {
                version: 1,
                settings: settings.normalized(),
            }),
        }
    }

    pub async fn snapshot(&self) -> VersionedSettings {
        self.current.read().await.clone()
    }

    pub async fn current(&self) -> Settings {
        self.current.read().await.settings.clone()
    }

    /// Replace the blob, persist it and bump the version
    pub async fn replace(&self, settings: Settings) -> Result<VersionedSettings> {
        let settings = settings.normalized();
        let mut current = self.current.write().await;

        if let Some(path) = &self.path {
            persist(path, &settings)?;
        }

        current.settings = settings;
        current.version += 1;
        info!(version = current.version, "Settings saved");
        Ok(current.clone())
    }
}

fn persist(path: &Path, settings: &Settings) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create settings directory: {:?}", parent))?;
    }
    let contents = serde_json::to_string_pretty(settings).context("Failed to serialize settings")?;
    std::fs::write(path, contents)
        .with_context(|| format!("Failed to write settings file: {:?}", path))
}
