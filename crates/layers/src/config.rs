use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Tunables shared by the map layers. Every field has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LayerConfig {
    /// Cached canvas edge = window diagonal x this factor (clamped >= 1).
    pub overdraw_factor: f64,
    /// A cached canvas is invalid once its scale drifts past this ratio either way.
    pub scale_invalidation_ratio: f64,
    /// Background repaint starts once `margin_remaining / margin` is at or below this.
    pub background_repaint_threshold: f64,
    pub repaint_debounce_ms: f64,
    /// Work units a background repaint may spend per tick.
    pub paint_budget_units: u32,
    pub label_scale_ratio: f64,
    pub label_rotation_threshold_rad: f64,
    pub nearest_search_debounce_ms: f64,
    pub nearest_max_airports: usize,
    pub nearest_max_vors: usize,
    pub nearest_max_ndbs: usize,
    pub nearest_max_intersections: usize,
    /// Facility lookups resolved per tick.
    pub lookup_budget_units: u32,
    pub waypoint_cache_capacity: usize,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            overdraw_factor: std::f64::consts::SQRT_2,
            scale_invalidation_ratio: 1.2,
            background_repaint_threshold: 0.1,
            repaint_debounce_ms: 500.0,
            paint_budget_units: 64,
            label_scale_ratio: 1.2,
            label_rotation_threshold_rad: std::f64::consts::FRAC_PI_6,
            nearest_search_debounce_ms: 500.0,
            nearest_max_airports: 500,
            nearest_max_vors: 250,
            nearest_max_ndbs: 250,
            nearest_max_intersections: 500,
            lookup_budget_units: 32,
            waypoint_cache_capacity: 2000,
        }
    }
}

impl LayerConfig {
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let config: LayerConfig =
            serde_json::from_str(s).map_err(|e| ConfigError::Json(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("overdraw_factor", self.overdraw_factor),
            ("label_rotation_threshold_rad", self.label_rotation_threshold_rad),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::InvalidValue { field, value });
            }
        }
        for (field, value) in [
            ("repaint_debounce_ms", self.repaint_debounce_ms),
            ("nearest_search_debounce_ms", self.nearest_search_debounce_ms),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::InvalidValue { field, value });
            }
        }
        for (field, value) in [
            ("scale_invalidation_ratio", self.scale_invalidation_ratio),
            ("label_scale_ratio", self.label_scale_ratio),
        ] {
            if !(value.is_finite() && value > 1.0) {
                return Err(ConfigError::InvalidValue { field, value });
            }
        }
        let t = self.background_repaint_threshold;
        if !(0.0..=1.0).contains(&t) {
            return Err(ConfigError::InvalidValue {
                field: "background_repaint_threshold",
                value: t,
            });
        }
        if self.waypoint_cache_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "waypoint_cache_capacity",
                value: 0.0,
            });
        }
        Ok(())
    }
}
