//! Runtime configuration

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// View engine configuration
///
/// The timing and padding values are product tuning, not behavioral
/// contracts; the mechanisms they parameterize (debounce, padding radius,
/// throttles, follow offset) are fixed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    /// Visibility flip debounce (ms)
    pub debounce_ms: u64,

    /// Extra radius around the viewport that still counts as visible (px)
    pub load_padding_px: f64,

    /// Minimum interval between width-reflow anchor restores (ms)
    pub width_resize_throttle_ms: u64,

    /// Minimum interval between geometry-based visibility recomputes (ms)
    pub visibility_recompute_ms: u64,

    /// Offset forced below the last line in follow mode (px)
    pub follow_offset_px: f64,

    /// Cell height in pixels (row <-> pixel conversion)
    pub cell_height_px: u32,

    /// Cell width in pixels
    pub cell_width_px: u32,

    /// Backfill fetch attempts before a line is parked as failed
    pub max_backfill_attempts: u32,

    /// Host retry backoff between backfill attempts (ms)
    pub backfill_backoff_ms: u64,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 250,
            load_padding_px: 800.0,
            width_resize_throttle_ms: 100,
            visibility_recompute_ms: 1000,
            follow_offset_px: 10.0,
            cell_height_px: 17,
            cell_width_px: 8,
            max_backfill_attempts: 3,
            backfill_backoff_ms: 500,
        }
    }
}

impl ViewConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config = toml::from_str(&text)?;
        Ok(config)
    }
}
