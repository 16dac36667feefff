use foundation::math::{GeoPoint, Vec2};
use serde::{Deserialize, Serialize};

use crate::error::{CameraError, CameraResult};

/// Merge-patch of camera parameters. `None` keeps the current value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CameraParams {
    pub target: Option<GeoPoint>,
    /// Pixel offset of the target from the window center.
    pub target_projected_offset: Option<Vec2>,
    /// Great-arc radians between the range endpoints.
    pub range: Option<f64>,
    /// `[x1, y1, x2, y2]` relative to the window, each in `[0, 1]`.
    pub range_endpoints: Option<[f64; 4]>,
    /// Post-projection rotation, radians.
    pub rotation: Option<f64>,
    /// Window size in pixels.
    pub projected_size: Option<Vec2>,
}

impl CameraParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_str(s: &str) -> CameraResult<Self> {
        let params: CameraParams =
            serde_json::from_str(s).map_err(|e| CameraError::Json(e.to_string()))?;
        params.validate()?;
        Ok(params)
    }

    pub fn with_target(mut self, target: GeoPoint) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_target_projected_offset(mut self, offset: Vec2) -> Self {
        self.target_projected_offset = Some(offset);
        self
    }

    pub fn with_range(mut self, range: f64) -> Self {
        self.range = Some(range);
        self
    }

    pub fn with_range_endpoints(mut self, endpoints: [f64; 4]) -> Self {
        self.range_endpoints = Some(endpoints);
        self
    }

    pub fn with_rotation(mut self, rotation: f64) -> Self {
        self.rotation = Some(rotation);
        self
    }

    pub fn with_projected_size(mut self, size: Vec2) -> Self {
        self.projected_size = Some(size);
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Overlay `other` onto `self`; fields set in `other` win.
    pub fn merge(&mut self, other: &CameraParams) {
        self.target = other.target.or(self.target);
        self.target_projected_offset = other.target_projected_offset.or(self.target_projected_offset);
        self.range = other.range.or(self.range);
        self.range_endpoints = other.range_endpoints.or(self.range_endpoints);
        self.rotation = other.rotation.or(self.rotation);
        self.projected_size = other.projected_size.or(self.projected_size);
    }

    pub fn validate(&self) -> CameraResult<()> {
        if let Some(target) = self.target
            && !target.is_finite()
        {
            return Err(CameraError::NonFiniteParameter { field: "target" });
        }
        if let Some(offset) = self.target_projected_offset
            && !offset.is_finite()
        {
            return Err(CameraError::NonFiniteParameter {
                field: "target_projected_offset",
            });
        }
        if let Some(range) = self.range
            && !(range.is_finite() && range > 0.0)
        {
            return Err(CameraError::InvalidRange { range });
        }
        if let Some(endpoints) = self.range_endpoints {
            let in_unit = endpoints.iter().all(|v| v.is_finite() && (0.0..=1.0).contains(v));
            let coincident = endpoints[0] == endpoints[2] && endpoints[1] == endpoints[3];
            if !in_unit || coincident {
                return Err(CameraError::InvalidRangeEndpoints { endpoints });
            }
        }
        if let Some(rotation) = self.rotation
            && !rotation.is_finite()
        {
            return Err(CameraError::NonFiniteParameter { field: "rotation" });
        }
        if let Some(size) = self.projected_size
            && !(size.is_finite() && size.x > 0.0 && size.y > 0.0)
        {
            return Err(CameraError::InvalidProjectedSize {
                width: size.x,
                height: size.y,
            });
        }
        Ok(())
    }
}
