//! Map layers: cached canvases, waypoint rendering, label culling and the
//! frame host that drives them from a [`camera::MapCamera`].

pub mod cached_canvas;
pub mod cached_drawing;
pub mod canvas;
pub mod config;
pub mod error;
pub mod icons;
pub mod labels;
pub mod layer;
pub mod map;
pub mod nearest;
pub mod paths;
pub mod waypoints;

pub use cached_canvas::{CachedCanvasInstance, CachedCanvasLayer, CanvasReference, CanvasTransform};
pub use cached_drawing::{CachedDrawingLayer, CanvasPainter, PaintProgress};
pub use canvas::{CanvasSurface, CssTransform, DrawCommand, SharedSurface};
pub use config::LayerConfig;
pub use error::{ConfigError, LayerError, LayerResult, RenderError};
pub use labels::{CullableTextLabel, LabelId, LabelManager, LabelOptions, SharedLabelManager, TextLayer};
pub use layer::*;
pub use map::MapView;
pub use nearest::{NEAREST_SOURCE_ID, NearestWaypointsLayer};
pub use paths::{GeoPath, GeoPathPainter, GeodesicResampler};
pub use waypoints::{
    RoleCatalog, RoleDefinition, RoleId, RoleSet, SharedWaypointRenderer, WaypointEntry, WaypointLayer,
    WaypointRenderer,
};
