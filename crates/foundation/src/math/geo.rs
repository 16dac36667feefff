//! Spherical geographic points.
//!
//! Latitude and longitude are in degrees on a unit sphere. Distances are
//! great-arc radians; multiply by an earth radius for linear units.

use serde::{Deserialize, Serialize};

use super::Vec3;

/// Distance (great-arc radians) under which two points compare equal. About 61 cm.
pub const EQUALITY_TOLERANCE: f64 = 1e-7;

/// One great-arc radian in nautical miles.
pub const NMI_PER_GREAT_ARC_RADIAN: f64 = 3440.065;

/// Wrap an angle in degrees to `[-180, 180)`.
pub fn wrap_degrees(deg: f64) -> f64 {
    ((deg % 360.0) + 540.0) % 360.0 - 180.0
}

/// Wrap an angle in radians to `[-pi, pi)`.
pub fn wrap_radians(rad: f64) -> f64 {
    wrap_degrees(rad.to_degrees()).to_radians()
}

/// Geographic point, always normalized to lat `[-90, 90]`, lon `[-180, 180)`.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "LatLon", into = "LatLon")]
pub struct GeoPoint {
    lat: f64,
    lon: f64,
}

#[derive(Serialize, Deserialize)]
struct LatLon {
    lat: f64,
    lon: f64,
}

impl From<LatLon> for GeoPoint {
    fn from(v: LatLon) -> Self {
        GeoPoint::new(v.lat, v.lon)
    }
}

impl From<GeoPoint> for LatLon {
    fn from(p: GeoPoint) -> Self {
        LatLon {
            lat: p.lat,
            lon: p.lon,
        }
    }
}

impl Default for GeoPoint {
    fn default() -> Self {
        Self { lat: 0.0, lon: 0.0 }
    }
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        let (lat, lon) = normalize(lat, lon);
        Self { lat, lon }
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lon(&self) -> f64 {
        self.lon
    }

    pub fn set(&mut self, lat: f64, lon: f64) -> &mut Self {
        let (lat, lon) = normalize(lat, lon);
        self.lat = lat;
        self.lon = lon;
        self
    }

    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lon.is_finite()
    }

    /// Haversine distance in great-arc radians.
    pub fn distance(&self, other: &GeoPoint) -> f64 {
        let lat1 = self.lat.to_radians();
        let lat2 = other.lat.to_radians();
        let sin_half_dlat = ((lat2 - lat1) * 0.5).sin();
        let sin_half_dlon = ((other.lon - self.lon).to_radians() * 0.5).sin();
        let a = sin_half_dlat * sin_half_dlat
            + lat1.cos() * lat2.cos() * sin_half_dlon * sin_half_dlon;
        2.0 * a.sqrt().min(1.0).asin()
    }

    /// Initial true bearing toward `other`, degrees in `[0, 360)`.
    pub fn bearing_to(&self, other: &GeoPoint) -> f64 {
        let lat1 = self.lat.to_radians();
        let lat2 = other.lat.to_radians();
        let dlon = (other.lon - self.lon).to_radians();
        let y = dlon.sin() * lat2.cos();
        let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();
        (y.atan2(x).to_degrees() + 360.0) % 360.0
    }

    /// Point reached by travelling `distance_rad` along the great circle at
    /// initial true bearing `bearing_deg`.
    pub fn offset(&self, bearing_deg: f64, distance_rad: f64) -> GeoPoint {
        let lat1 = self.lat.to_radians();
        let lon1 = self.lon.to_radians();
        let brg = bearing_deg.to_radians();
        let (sin_d, cos_d) = distance_rad.sin_cos();

        let sin_lat2 = (lat1.sin() * cos_d + lat1.cos() * sin_d * brg.cos()).clamp(-1.0, 1.0);
        let lat2 = sin_lat2.asin();
        let lon2 = lon1 + (brg.sin() * sin_d * lat1.cos()).atan2(cos_d - lat1.sin() * sin_lat2);
        GeoPoint::new(lat2.to_degrees(), lon2.to_degrees())
    }

    pub fn equals(&self, other: &GeoPoint) -> bool {
        self.equals_within(other, EQUALITY_TOLERANCE)
    }

    pub fn equals_within(&self, other: &GeoPoint, tolerance_rad: f64) -> bool {
        self.distance(other) <= tolerance_rad
    }

    /// Unit-sphere cartesian vector: +z north pole, +x at (0, 0), +y at (0, 90).
    pub fn to_cartesian(&self) -> Vec3 {
        let theta = (90.0 - self.lat).to_radians();
        let phi = self.lon.to_radians();
        let sin_theta = theta.sin();
        Vec3::new(sin_theta * phi.cos(), sin_theta * phi.sin(), theta.cos())
    }

    pub fn from_cartesian(v: Vec3) -> GeoPoint {
        let theta = v.z.atan2(v.x.hypot(v.y));
        let phi = v.y.atan2(v.x);
        GeoPoint::new(theta.to_degrees(), phi.to_degrees())
    }
}

fn normalize(lat: f64, lon: f64) -> (f64, f64) {
    let mut lat = wrap_degrees(lat);
    let mut lon = lon;
    if lat.abs() > 90.0 {
        lat = wrap_degrees(180.0 - lat);
        lon += 180.0;
    }
    (lat, wrap_degrees(lon))
}
