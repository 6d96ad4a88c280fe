//! Tunable thresholds for gesture recognition and hit-testing.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Timing and distance thresholds used by the gesture normalizer and the
/// dispatch resolver. Distances are in canvas pixels, delays in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InteractionConfig {
    /// A mouse press released before this delay (and without dragging) is a click.
    pub click_delay_ms: u64,
    /// Hold time before a touch becomes a press.
    pub long_press_delay_ms: u64,
    /// Accumulated movement that cancels a pending press.
    pub long_press_max_movement_px: f64,
    /// Max distance between taps of one chain.
    pub tap_max_distance_px: f64,
    /// Max touch duration to count as a tap, and the chain timeout.
    pub tap_tolerance_ms: u64,
    /// Per-axis displacement that makes a swipe.
    pub swipe_distance_px: f64,
    /// Window after touch start in which a swipe may be recognized.
    pub swipe_tolerance_ms: u64,
    /// Handle/annotation proximity for mouse input.
    pub hit_proximity_px: f64,
    /// Handle/annotation proximity for touch input.
    pub touch_hit_proximity_px: f64,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            click_delay_ms: 200,
            long_press_delay_ms: 700,
            long_press_max_movement_px: 5.0,
            tap_max_distance_px: 24.0,
            tap_tolerance_ms: 300,
            swipe_distance_px: 48.0,
            swipe_tolerance_ms: 300,
            hit_proximity_px: 6.0,
            touch_hit_proximity_px: 12.0,
        }
    }
}

impl InteractionConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_json_str(&text)?;
        log::debug!("Loaded interaction config from {:?}", path.as_ref());
        Ok(config)
    }

    /// Reject zero delays and non-positive distances.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let delays = [
            ("click_delay_ms", self.click_delay_ms),
            ("long_press_delay_ms", self.long_press_delay_ms),
            ("tap_tolerance_ms", self.tap_tolerance_ms),
            ("swipe_tolerance_ms", self.swipe_tolerance_ms),
        ];
        for (name, value) in delays {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{name} must be greater than zero")));
            }
        }

        let distances = [
            ("long_press_max_movement_px", self.long_press_max_movement_px),
            ("tap_max_distance_px", self.tap_max_distance_px),
            ("swipe_distance_px", self.swipe_distance_px),
            ("hit_proximity_px", self.hit_proximity_px),
            ("touch_hit_proximity_px", self.touch_hit_proximity_px),
        ];
        for (name, value) in distances {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be a positive number, got {value}"
                )));
            }
        }
        Ok(())
    }
}
