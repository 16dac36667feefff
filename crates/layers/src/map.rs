//! Frame host: owns the camera and drives attached layers in order.

use camera::{CameraParams, CameraResult, ChangeFlags, MapCamera};
use runtime::frame::{FrameClock, FrameTick};
use tracing::{trace, warn};

use crate::layer::{LayerId, MapLayer};

/// Per frame the camera resolves its queued patch first, then every layer
/// sees the change (if any) and its update, in attachment order.
pub struct MapView {
    camera: MapCamera,
    layers: Vec<Box<dyn MapLayer>>,
    clock: FrameClock,
}

impl std::fmt::Debug for MapView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapView")
            .field("camera", &self.camera)
            .field("layers", &self.layer_ids())
            .finish_non_exhaustive()
    }
}

impl MapView {
    pub fn new(camera: MapCamera) -> Self {
        Self {
            camera,
            layers: Vec::new(),
            clock: FrameClock::new(),
        }
    }

    pub fn camera(&self) -> &MapCamera {
        &self.camera
    }

    pub fn layer_ids(&self) -> Vec<LayerId> {
        self.layers.iter().map(|layer| layer.id()).collect()
    }

    pub fn attach_layer(&mut self, mut layer: Box<dyn MapLayer>) -> LayerId {
        layer.on_attached(&self.camera);
        let id = layer.id();
        self.layers.push(layer);
        id
    }

    /// Apply `params` now and dispatch the change to every layer.
    pub fn set_camera(&mut self, params: &CameraParams) -> CameraResult<ChangeFlags> {
        let flags = self.camera.set(params)?;
        self.dispatch(flags);
        Ok(flags)
    }

    /// Merge `params` into the patch applied at the start of the next tick.
    pub fn queue_camera(&mut self, params: &CameraParams) -> CameraResult<()> {
        self.camera.set_queued(params)
    }

    pub fn tick(&mut self, time_ms: f64) -> FrameTick {
        let tick = self.clock.tick(time_ms);
        match self.camera.apply_queued() {
            Ok(Some(flags)) => self.dispatch(flags),
            Ok(None) => {}
            Err(err) => warn!(%err, "queued camera patch rejected"),
        }
        for layer in &mut self.layers {
            layer.on_updated(&self.camera, tick);
        }
        trace!(index = tick.index, elapsed_ms = tick.elapsed_ms, "map frame");
        tick
    }

    fn dispatch(&mut self, flags: ChangeFlags) {
        if flags.is_empty() {
            return;
        }
        for layer in &mut self.layers {
            layer.on_map_projection_changed(&self.camera, flags);
        }
    }
}
