use camera::CameraParams;
use facilities::Waypoint;
use foundation::math::{GeoPoint, ProjectionKind};
use layers::LayerConfig;
use serde::{Deserialize, Serialize};

/// Everything `avmap` needs to build a map and fly it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MapConfig {
    /// Window size in pixels.
    pub window: [f64; 2],
    #[serde(default)]
    pub projection: ProjectionKind,
    /// Initial camera patch; the target is replaced by the route start.
    #[serde(default)]
    pub camera: CameraParams,
    #[serde(default)]
    pub layers: LayerConfig,
    #[serde(default)]
    pub flight: FlightConfig,
    #[serde(default)]
    pub route: Vec<GeoPoint>,
    #[serde(default)]
    pub facilities: Vec<Waypoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FlightConfig {
    pub ground_speed_kt: f64,
    pub frame_ms: f64,
    pub max_frames: u64,
    /// Rotate the map so the current track points up.
    pub track_up: bool,
}

impl Default for FlightConfig {
    fn default() -> Self {
        Self {
            ground_speed_kt: 120.0,
            frame_ms: 100.0,
            max_frames: 600,
            track_up: false,
        }
    }
}

impl MapConfig {
    pub fn from_json_str(s: &str) -> Result<Self, String> {
        let config: MapConfig = serde_json::from_str(s).map_err(|e| format!("parse map config: {e}"))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        let [w, h] = self.window;
        if !(w.is_finite() && h.is_finite() && w > 0.0 && h > 0.0) {
            return Err(format!("window must be positive, got {w}x{h}"));
        }
        self.camera.validate().map_err(|e| format!("camera: {e}"))?;
        self.layers.validate().map_err(|e| format!("layers: {e}"))?;
        if !(self.flight.frame_ms.is_finite() && self.flight.frame_ms > 0.0) {
            return Err(format!("flight.frame_ms must be positive, got {}", self.flight.frame_ms));
        }
        if !(self.flight.ground_speed_kt.is_finite() && self.flight.ground_speed_kt >= 0.0) {
            return Err(format!(
                "flight.ground_speed_kt must be non-negative, got {}",
                self.flight.ground_speed_kt
            ));
        }
        if let Some(i) = self.route.iter().position(|p| !p.is_finite()) {
            return Err(format!("route point {i} is not finite"));
        }
        Ok(())
    }
}
