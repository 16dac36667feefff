pub type CameraResult<T> = Result<T, CameraError>;

/// Rejected camera parameter patches. A rejected patch changes nothing.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CameraError {
    #[error("invalid range: {range} (must be finite and > 0)")]
    InvalidRange { range: f64 },

    #[error("invalid range endpoints: {endpoints:?}")]
    InvalidRangeEndpoints { endpoints: [f64; 4] },

    #[error("invalid projected size: {width}x{height}")]
    InvalidProjectedSize { width: f64, height: f64 },

    #[error("non-finite camera parameter: {field}")]
    NonFiniteParameter { field: &'static str },

    #[error("camera params json: {0}")]
    Json(String),
}
