//! Geographic projection chain.
//!
//! Forward: pre-rotate on the sphere -> raw projection -> center at origin ->
//! y-reflection -> scale -> post-rotation -> translation. `invert` runs the
//! exact inverse of each stage in reverse order.

use serde::{Deserialize, Serialize};

use super::{GeoPoint, Mat3, Vec2, wrap_degrees};

/// Unscaled projection of the unit sphere onto the plane.
pub trait RawProjection {
    fn project_raw(&self, point: &GeoPoint) -> Vec2;
    fn invert_raw(&self, v: Vec2) -> GeoPoint;
}

/// Spherical Mercator. Non-finite at the poles.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Mercator;

impl RawProjection for Mercator {
    fn project_raw(&self, point: &GeoPoint) -> Vec2 {
        Vec2::new(
            point.lon().to_radians(),
            ((90.0 + point.lat()).to_radians() * 0.5).tan().ln(),
        )
    }

    fn invert_raw(&self, v: Vec2) -> GeoPoint {
        GeoPoint::new(
            2.0 * v.y.exp().atan().to_degrees() - 90.0,
            v.x.to_degrees(),
        )
    }
}

/// Orthographic view of the hemisphere facing (0, 0).
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Orthographic;

impl RawProjection for Orthographic {
    fn project_raw(&self, point: &GeoPoint) -> Vec2 {
        let lat = point.lat().to_radians();
        let lon = point.lon().to_radians();
        Vec2::new(lat.cos() * lon.sin(), lat.sin())
    }

    fn invert_raw(&self, v: Vec2) -> GeoPoint {
        let rho = v.x.hypot(v.y);
        let c = rho.asin();
        let (sin_c, cos_c) = c.sin_cos();
        let lon = (v.x * sin_c).atan2(rho * cos_c);
        let lat = if rho == 0.0 { 0.0 } else { v.y * sin_c / rho }.asin();
        GeoPoint::new(lat.to_degrees(), lon.to_degrees())
    }
}

/// Runtime-selectable raw projection.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectionKind {
    #[default]
    Mercator,
    Orthographic,
}

impl RawProjection for ProjectionKind {
    fn project_raw(&self, point: &GeoPoint) -> Vec2 {
        match self {
            ProjectionKind::Mercator => Mercator.project_raw(point),
            ProjectionKind::Orthographic => Orthographic.project_raw(point),
        }
    }

    fn invert_raw(&self, v: Vec2) -> GeoPoint {
        match self {
            ProjectionKind::Mercator => Mercator.invert_raw(v),
            ProjectionKind::Orthographic => Orthographic.invert_raw(v),
        }
    }
}

/// Plain-data projection parameters; enough to reproduce a projection exactly.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionParams {
    pub center: GeoPoint,
    /// `[lambda, phi, gamma]` radians.
    pub pre_rotation: [f64; 3],
    /// Pixels per great-arc radian.
    pub scale_factor: f64,
    /// Post-projection rotation, radians.
    pub rotation: f64,
    pub translation: Vec2,
    pub reflect_y: bool,
}

impl Default for ProjectionParams {
    fn default() -> Self {
        Self {
            center: GeoPoint::default(),
            pre_rotation: [0.0; 3],
            scale_factor: 1.0,
            rotation: 0.0,
            translation: Vec2::ZERO,
            reflect_y: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GeoProjection<P: RawProjection> {
    raw: P,
    params: ProjectionParams,
    center_translation: Vec2,
    forward: Mat3,
    reverse: Mat3,
    rotation_sin: f64,
    rotation_cos: f64,
}

impl<P: RawProjection> GeoProjection<P> {
    pub fn new(raw: P) -> Self {
        Self::with_params(raw, ProjectionParams::default())
    }

    pub fn with_params(raw: P, params: ProjectionParams) -> Self {
        let mut projection = Self {
            raw,
            params,
            center_translation: Vec2::ZERO,
            forward: Mat3::IDENTITY,
            reverse: Mat3::IDENTITY,
            rotation_sin: 0.0,
            rotation_cos: 1.0,
        };
        projection.set_params(params);
        projection
    }

    pub fn raw(&self) -> &P {
        &self.raw
    }

    pub fn params(&self) -> &ProjectionParams {
        &self.params
    }

    pub fn center(&self) -> GeoPoint {
        self.params.center
    }

    pub fn pre_rotation(&self) -> [f64; 3] {
        self.params.pre_rotation
    }

    pub fn scale_factor(&self) -> f64 {
        self.params.scale_factor
    }

    pub fn rotation(&self) -> f64 {
        self.params.rotation
    }

    pub fn translation(&self) -> Vec2 {
        self.params.translation
    }

    pub fn reflect_y(&self) -> bool {
        self.params.reflect_y
    }

    pub fn set_params(&mut self, params: ProjectionParams) -> &mut Self {
        self.params = params;
        self.update_pre_rotation_transforms();
        self.update_rotation();
        self.update_center_translation();
        self
    }

    pub fn set_center(&mut self, center: GeoPoint) -> &mut Self {
        self.params.center = center;
        self.update_center_translation();
        self
    }

    pub fn set_pre_rotation(&mut self, pre_rotation: [f64; 3]) -> &mut Self {
        self.params.pre_rotation = pre_rotation;
        self.update_pre_rotation_transforms();
        self.update_center_translation();
        self
    }

    pub fn set_scale_factor(&mut self, scale_factor: f64) -> &mut Self {
        self.params.scale_factor = scale_factor;
        self
    }

    pub fn set_rotation(&mut self, rotation: f64) -> &mut Self {
        self.params.rotation = rotation;
        self.update_rotation();
        self
    }

    pub fn set_translation(&mut self, translation: Vec2) -> &mut Self {
        self.params.translation = translation;
        self
    }

    pub fn set_reflect_y(&mut self, reflect_y: bool) -> &mut Self {
        self.params.reflect_y = reflect_y;
        self
    }

    /// Copy every parameter from `other`; the raw projection is kept.
    pub fn copy_parameters_from<Q: RawProjection>(&mut self, other: &GeoProjection<Q>) -> &mut Self {
        self.set_params(other.params)
    }

    pub fn project(&self, point: &GeoPoint) -> Vec2 {
        let rotated = self.pre_rotate_forward(point);
        let mut v = self.raw.project_raw(&rotated) - self.center_translation;
        v.y *= self.reflect_factor();
        v = v * self.params.scale_factor;
        let (x, y) = (v.x, v.y);
        Vec2::new(
            x * self.rotation_cos - y * self.rotation_sin,
            x * self.rotation_sin + y * self.rotation_cos,
        ) + self.params.translation
    }

    pub fn invert(&self, projected: Vec2) -> GeoPoint {
        let v = projected - self.params.translation;
        let mut v = Vec2::new(
            v.x * self.rotation_cos + v.y * self.rotation_sin,
            -v.x * self.rotation_sin + v.y * self.rotation_cos,
        );
        v = v * (1.0 / self.params.scale_factor);
        v.y *= self.reflect_factor();
        let raw = self.raw.invert_raw(v + self.center_translation);
        self.pre_rotate_reverse(&raw)
    }

    fn reflect_factor(&self) -> f64 {
        if self.params.reflect_y { -1.0 } else { 1.0 }
    }

    fn pre_rotate_forward(&self, point: &GeoPoint) -> GeoPoint {
        let [lambda, phi, gamma] = self.params.pre_rotation;
        if lambda == 0.0 && phi == 0.0 && gamma == 0.0 {
            return *point;
        }
        let lon = wrap_degrees(point.lon() + lambda.to_degrees());
        let shifted = GeoPoint::new(point.lat(), lon);
        if phi == 0.0 && gamma == 0.0 {
            return shifted;
        }
        GeoPoint::from_cartesian(self.forward.apply(shifted.to_cartesian()))
    }

    fn pre_rotate_reverse(&self, point: &GeoPoint) -> GeoPoint {
        let [lambda, phi, gamma] = self.params.pre_rotation;
        if lambda == 0.0 && phi == 0.0 && gamma == 0.0 {
            return *point;
        }
        let unrotated = if phi != 0.0 || gamma != 0.0 {
            GeoPoint::from_cartesian(self.reverse.apply(point.to_cartesian()))
        } else {
            *point
        };
        GeoPoint::new(unrotated.lat(), unrotated.lon() - lambda.to_degrees())
    }

    fn update_pre_rotation_transforms(&mut self) {
        let [_, phi, gamma] = self.params.pre_rotation;
        // gamma about x is applied first, then -phi about y
        self.forward = Mat3::rotation_y(-phi).mul(&Mat3::rotation_x(gamma));
        self.reverse = self.forward.transpose();
    }

    fn update_center_translation(&mut self) {
        let rotated = self.pre_rotate_forward(&self.params.center);
        self.center_translation = self.raw.project_raw(&rotated);
    }

    fn update_rotation(&mut self) {
        let (sin, cos) = self.params.rotation.sin_cos();
        self.rotation_sin = sin;
        self.rotation_cos = cos;
    }
}
