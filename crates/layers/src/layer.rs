use camera::{ChangeFlags, MapCamera};
use runtime::frame::FrameTick;

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LayerId(pub u64);

/// Per-frame lifecycle driven by the map host.
///
/// Within one frame the host resolves the camera first, then calls
/// `on_map_projection_changed` (only when something changed) and
/// `on_updated` on every layer in attachment order.
pub trait MapLayer {
    fn id(&self) -> LayerId;

    fn on_attached(&mut self, _camera: &MapCamera) {}

    fn on_map_projection_changed(&mut self, _camera: &MapCamera, _flags: ChangeFlags) {}

    fn on_updated(&mut self, camera: &MapCamera, tick: FrameTick);
}
