pub type LayerResult<T> = Result<T, LayerError>;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum LayerError {
    /// A canvas instance was read before `on_attached`.
    #[error("{surface} canvas used before layer attachment")]
    NotAttached { surface: &'static str },

    #[error("buffer canvas requested but layer was built without one")]
    NoBuffer,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    #[error("render role must be a single bit: {role:#x}")]
    InvalidRole { role: u32 },
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("config json: {0}")]
    Json(String),

    #[error("invalid config value: {field}={value}")]
    InvalidValue { field: &'static str, value: f64 },
}
