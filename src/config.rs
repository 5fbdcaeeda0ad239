//! Seal Service Configuration
//!
//! Supports loading from environment variables with SEALFORGE_ prefix.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{SealError, SealResult};
use crate::layout::LayoutConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SealConfig {
    /// Root directory where artifacts are written
    #[serde(default = "default_uploads_dir")]
    pub uploads_dir: PathBuf,
    /// Public URL prefix the artifact paths are rooted under
    #[serde(default = "default_public_url_prefix")]
    pub public_url_prefix: String,
    /// Upper bound for one raster/PDF export
    #[serde(default = "default_export_timeout_secs")]
    pub export_timeout_secs: u64,
    #[serde(default)]
    pub layout: LayoutConfig,
}

fn default_uploads_dir() -> PathBuf { PathBuf::from("./uploads/seals") }
fn default_public_url_prefix() -> String { "/uploads/seals".to_string() }
fn default_export_timeout_secs() -> u64 { 30 }

impl Default for SealConfig {
    fn default() -> Self {
        Self {
            uploads_dir: default_uploads_dir(),
            public_url_prefix: default_public_url_prefix(),
            export_timeout_secs: default_export_timeout_secs(),
            layout: LayoutConfig::default(),
        }
    }
}

impl SealConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - SEALFORGE_UPLOADS_DIR: artifact root directory
    /// - SEALFORGE_PUBLIC_URL_PREFIX: public URL prefix
    /// - SEALFORGE_EXPORT_TIMEOUT_SECS: export timeout in seconds
    /// - SEALFORGE_STROKE_MARGIN: canvas stroke margin
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            uploads_dir: env::var("SEALFORGE_UPLOADS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.uploads_dir),
            public_url_prefix: env::var("SEALFORGE_PUBLIC_URL_PREFIX")
                .unwrap_or(defaults.public_url_prefix),
            export_timeout_secs: env::var("SEALFORGE_EXPORT_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.export_timeout_secs),
            layout: LayoutConfig {
                stroke_margin: env::var("SEALFORGE_STROKE_MARGIN")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.layout.stroke_margin),
                ..defaults.layout
            },
        }
    }

    pub fn validate(&self) -> SealResult<()> {
        if self.export_timeout_secs == 0 {
            return Err(SealError::Configuration("export timeout must be positive".into()));
        }
        let layout = &self.layout;
        if !(layout.canvas_size > 0.0) {
            return Err(SealError::Configuration("canvas size must be positive".into()));
        }
        if !(layout.stroke_margin >= 0.0 && layout.stroke_margin < layout.canvas_size / 2.0) {
            return Err(SealError::Configuration(format!(
                "stroke margin {} must be below half the canvas ({})",
                layout.stroke_margin,
                layout.canvas_size / 2.0
            )));
        }
        Ok(())
    }

    pub fn export_timeout(&self) -> Duration {
        Duration::from_secs(self.export_timeout_secs)
    }

    /// Public URL of a relative artifact path.
    pub fn public_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.public_url_prefix.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}
