//! Configuration loading and management.

use std::fmt;
use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use rc_core::Thresholds;
use rc_core::classify::{DEFAULT_CONFIDENCE, DEFAULT_IOU};
use serde::{Deserialize, Serialize};

/// Application configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the database file.
    pub database_path: PathBuf,
    /// Root directory for archived detection stills.
    pub image_dir: PathBuf,
    /// Remote detector endpoint (e.g. `http://127.0.0.1:8000/detect`).
    #[serde(default)]
    pub detector_url: Option<String>,
    /// Minimum candidate confidence.
    pub confidence_threshold: f32,
    /// Maximum overlap between kept candidates.
    pub iou_threshold: f32,
    /// Archive a still for every detection unless overridden per command.
    #[serde(default)]
    pub save_images: bool,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_path", &self.database_path)
            .field("image_dir", &self.image_dir)
            .field("detector_url", &self.detector_url)
            .field("confidence_threshold", &self.confidence_threshold)
            .field("iou_threshold", &self.iou_threshold)
            .field("save_images", &self.save_images)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            database_path: data_dir.join("rcy.db"),
            image_dir: data_dir.join("detections"),
            detector_url: None,
            confidence_threshold: DEFAULT_CONFIDENCE,
            iou_threshold: DEFAULT_IOU,
            save_images: false,
        }
    }
}

impl Config {
    /// Loads configuration from default locations.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load() -> Result<Self, figment::Error> {
        Self::load_from(None)
    }

    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Load from default config location
        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        // Load from specified config file
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // Load from environment variables (RCY_*)
        figment = figment.merge(Env::prefixed("RCY_"));

        figment.extract()
    }

    /// Validated classifier operating point.
    pub fn thresholds(&self) -> Result<Thresholds, rc_core::ClassifyError> {
        Thresholds::new(self.confidence_threshold, self.iou_threshold)
    }
}

/// Returns the platform-specific config directory for rcy.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("rcy"))
}

/// Returns the platform-specific data directory for rcy.
///
/// On Linux: `~/.local/share/rcy`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("rcy"))
}
