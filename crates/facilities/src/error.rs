use crate::waypoint::WaypointId;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("facility not found: {id}")]
    NotFound { id: WaypointId },

    #[error("facility unavailable: {id} ({reason})")]
    Unavailable { id: WaypointId, reason: String },
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("waypoint cache capacity must be > 0")]
    ZeroCapacity,
}
