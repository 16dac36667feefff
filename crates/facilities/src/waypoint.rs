use foundation::math::GeoPoint;
use serde::{Deserialize, Serialize};

/// Stable waypoint identity. Two waypoints with the same id are the same entity.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WaypointId(pub String);

impl WaypointId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for WaypointId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaypointKind {
    Airport,
    Vor,
    Ndb,
    Intersection,
    User,
}

impl WaypointKind {
    /// Kinds served by nearest-facility searches.
    pub const SEARCHABLE: [WaypointKind; 4] = [
        WaypointKind::Airport,
        WaypointKind::Vor,
        WaypointKind::Ndb,
        WaypointKind::Intersection,
    ];
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub id: WaypointId,
    pub ident: String,
    pub kind: WaypointKind,
    pub location: GeoPoint,
}

impl Waypoint {
    pub fn new(
        id: impl Into<String>,
        ident: impl Into<String>,
        kind: WaypointKind,
        location: GeoPoint,
    ) -> Self {
        Self {
            id: WaypointId::new(id),
            ident: ident.into(),
            kind,
            location,
        }
    }
}
