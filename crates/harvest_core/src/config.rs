//! Planner configuration.
//!
//! # Responsibility
//! - Collect grid, gesture, timeline, history and autosave tunables.
//! - Load overrides from JSON while keeping defaults for missing keys.
//!
//! # Invariants
//! - `min_zoom <= max_zoom` and both are positive after `normalized()`.
//! - Sizes in pixels are strictly positive after `normalized()`.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;

/// Side length of one grid cell in world pixels.
pub const DEFAULT_CELL_SIZE: f64 = 56.0;

/// Spatial-view gesture tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GestureConfig {
    /// Screen-pixel distance separating a tap from a drag.
    pub drag_threshold_px: f64,
    pub min_zoom: f64,
    pub max_zoom: f64,
    /// Multiplicative zoom change per wheel notch (100 delta units).
    pub wheel_zoom_step: f64,
    /// Screen-pixel grab radius around space edges and corners.
    pub resize_handle_px: f64,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            drag_threshold_px: 5.0,
            min_zoom: 0.25,
            max_zoom: 4.0,
            wheel_zoom_step: 1.1,
            resize_handle_px: 10.0,
        }
    }
}

/// Time-view layout tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TimelineConfig {
    /// Width reserved for slot labels, in screen pixels.
    pub left_margin: f64,
    /// Pixels per day at zoom factor 1.
    pub day_width: f64,
    pub slot_height: f64,
    pub header_height: f64,
    /// Cosmetic gap rendered at a split point.
    pub split_gap: f64,
    /// Grab width of a stage-boundary handle.
    pub handle_width: f64,
    pub min_zoom: f64,
    pub max_zoom: f64,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            left_margin: 160.0,
            day_width: 6.0,
            slot_height: 28.0,
            header_height: 32.0,
            split_gap: 4.0,
            handle_width: 8.0,
            min_zoom: 0.2,
            max_zoom: 8.0,
        }
    }
}

/// Root configuration for one planner session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PlannerConfig {
    pub cell_size: f64,
    pub gesture: GestureConfig,
    pub timeline: TimelineConfig,
    /// Maximum number of undo snapshots kept.
    pub history_limit: usize,
    /// Trailing-edge autosave window.
    pub autosave_debounce_ms: u64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            cell_size: DEFAULT_CELL_SIZE,
            gesture: GestureConfig::default(),
            timeline: TimelineConfig::default(),
            history_limit: 50,
            autosave_debounce_ms: 1_500,
        }
    }
}

/// Configuration parse errors.
#[derive(Debug)]
pub enum ConfigError {
    Json(serde_json::Error),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json(err) => write!(f, "invalid planner config: {err}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Json(err) => Some(err),
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

impl PlannerConfig {
    /// Parses a JSON override document; missing keys keep their defaults.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config = serde_json::from_str::<PlannerConfig>(raw)?;
        Ok(config.normalized())
    }

    pub fn autosave_debounce(&self) -> Duration {
        Duration::from_millis(self.autosave_debounce_ms)
    }

    /// Repairs out-of-range values instead of rejecting the whole config.
    pub fn normalized(mut self) -> Self {
        let defaults = PlannerConfig::default();
        if !(self.cell_size.is_finite() && self.cell_size > 0.0) {
            self.cell_size = defaults.cell_size;
        }
        normalize_range(
            &mut self.gesture.min_zoom,
            &mut self.gesture.max_zoom,
            (defaults.gesture.min_zoom, defaults.gesture.max_zoom),
        );
        normalize_range(
            &mut self.timeline.min_zoom,
            &mut self.timeline.max_zoom,
            (defaults.timeline.min_zoom, defaults.timeline.max_zoom),
        );
        if !(self.timeline.day_width.is_finite() && self.timeline.day_width > 0.0) {
            self.timeline.day_width = defaults.timeline.day_width;
        }
        if !(self.timeline.slot_height.is_finite() && self.timeline.slot_height > 0.0) {
            self.timeline.slot_height = defaults.timeline.slot_height;
        }
        if self.gesture.wheel_zoom_step <= 1.0 {
            self.gesture.wheel_zoom_step = defaults.gesture.wheel_zoom_step;
        }
        if self.history_limit == 0 {
            self.history_limit = 1;
        }
        self
    }
}

fn normalize_range(min: &mut f64, max: &mut f64, fallback: (f64, f64)) {
    let valid = min.is_finite() && max.is_finite() && *min > 0.0 && *min <= *max;
    if !valid {
        *min = fallback.0;
        *max = fallback.1;
    }
}

#[cfg(test)]
mod tests {
    use super::{PlannerConfig, DEFAULT_CELL_SIZE};
    use std::time::Duration;

    #[test]
    fn defaults_match_documented_values() {
        let config = PlannerConfig::default();
        assert_eq!(config.cell_size, DEFAULT_CELL_SIZE);
        assert_eq!(config.gesture.drag_threshold_px, 5.0);
        assert_eq!(config.history_limit, 50);
        assert_eq!(config.autosave_debounce(), Duration::from_millis(1_500));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config =
            PlannerConfig::from_json_str(r#"{"cellSize": 40, "timeline": {"dayWidth": 10}}"#)
                .expect("partial config should parse");
        assert_eq!(config.cell_size, 40.0);
        assert_eq!(config.timeline.day_width, 10.0);
        assert_eq!(config.timeline.slot_height, 28.0);
        assert_eq!(config.gesture.max_zoom, 4.0);
    }

    #[test]
    fn inverted_zoom_range_is_repaired() {
        let config =
            PlannerConfig::from_json_str(r#"{"gesture": {"minZoom": 5, "maxZoom": 1}}"#)
                .expect("config should parse");
        assert_eq!(config.gesture.min_zoom, 0.25);
        assert_eq!(config.gesture.max_zoom, 4.0);
    }

    #[test]
    fn malformed_json_is_rejected() {
        let err = PlannerConfig::from_json_str("{").expect_err("broken json must fail");
        assert!(err.to_string().contains("invalid planner config"));
    }
}
