//! Named snapshots of the overlay styling
//!
//! Operators keep a few looks per event (finals, showcase, sponsor block)
//! and switch between them. Applying a preset copies its style into the
//! live settings blob, which bumps the settings version like any save.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::settings::OverlayStyle;

pub const PRESETS_FILE: &str = "presets.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub settings: OverlayStyle,
}

pub struct PresetStore {
    path: Option<PathBuf>,
    presets: RwLock<Vec<Preset>>,
}

impl PresetStore {
    /// Load `presets.json` from the data directory. An unreadable file
    /// starts an empty list and is overwritten on the next change.
    pub fn load(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join(PRESETS_FILE);

        let presets = if path.exists() {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read presets file: {:?}", path))?;
            serde_json::from_str::<Vec<Preset>>(&raw).unwrap_or_else(|e| {
                warn!("Failed to parse presets file {:?}: {}. Starting empty.", path, e);
                Vec::new()
            })
        } else {
            Vec::new()
        };

        Ok(Self {
            path: Some(path),
            presets: RwLock::new(presets),
        })
    }

    #[cfg(test)]
    pub fn in_memory() -> Self {
        Self {
            path: None,
            presets: RwLock::new(Vec::new()),
        }
    }

    pub async fn list(&self) -> Vec<Preset> {
        self.presets.read().await.clone()
    }

    pub async fn get(&self, id: &str) -> Option<Preset> {
        self.presets.read().await.iter().find(|p| p.id == id).cloned()
    }

    /// Store a new preset under an id derived from `name`
    pub async fn create(&self, name: &str, style: OverlayStyle) -> Result<Preset> {
        let mut presets = self.presets.write().await;
        let name = name.trim().to_string();
        let preset = Preset {
            id: unique_id(&name, &presets),
            name,
            settings: style,
        };

        let mut updated = presets.clone();
        updated.push(preset.clone());
        self.persist(&updated)?;
        *presets = updated;

        info!(id = %preset.id, "Preset saved: {}", preset.name);
        Ok(preset)
    }

    /// Remove a preset. Returns whether it existed.
    pub async fn delete(&self, id: &str) -> Result<bool> {
        let mut presets = self.presets.write().await;
        let Some(position) = presets.iter().position(|p| p.id == id) else {
            return Ok(false);
        };

        let mut updated = presets.clone();
        updated.remove(position);
        self.persist(&updated)?;
        *presets = updated;

        info!(id, "Preset deleted");
        Ok(true)
    }

    fn persist(&self, presets: &[Preset]) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create presets directory: {:?}", parent))?;
        }
        let contents =
            serde_json::to_string_pretty(presets).context("Failed to serialize presets")?;
        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write presets file: {:?}", path))
    }
}

/// Lowercase slug of `name`, suffixed with a counter when taken
fn unique_id(name: &str, existing: &[Preset]) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            slug.push(c);
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = match slug.trim_matches('-') {
        "" => "preset".to_string(),
        s => s.to_string(),
    };

    let taken = |id: &str| existing.iter().any(|p| p.id == id);
    if !taken(&slug) {
        return slug;
    }
    let mut n = 2;
    loop {
        let id = format!("{}-{}", slug, n);
        if !taken(&id) {
            return id;
        }
        n += 1;
    }
}
