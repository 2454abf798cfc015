use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::catalog::AssetNaming;

/// User settings, read from `config.toml`. Every field has a default so a
/// partial file is enough.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GalleryConfig {
    pub thumb_suffix: String,
    pub full_suffix: String,
    /// Card links containing this marker open a detail page instead of the
    /// lightbox.
    pub detail_marker: String,
    /// Hex SHA-256 of the album password. Unset means no gate.
    pub password_sha256: Option<String>,
    pub source: Option<PathBuf>,
}

impl Default for GalleryConfig {
    fn default() -> Self {
        let naming = AssetNaming::default();
        Self {
            thumb_suffix: naming.thumb_suffix,
            full_suffix: naming.full_suffix,
            detail_marker: "/fotos/".to_string(),
            password_sha256: None,
            source: None,
        }
    }
}

impl GalleryConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).context("invalid gallery config")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_toml_str(&raw)
    }

    /// Missing files are silent; unreadable or invalid ones are logged. Both
    /// fall back to defaults.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match Self::load(path) {
            Ok(config) => config,
            Err(err) => {
                warn!(?err, path = %path.display(), "using default config");
                Self::default()
            }
        }
    }

    pub fn naming(&self) -> AssetNaming {
        AssetNaming::new(self.thumb_suffix.clone(), self.full_suffix.clone())
    }
}
