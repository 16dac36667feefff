//! Cached canvas instances.
//!
//! A cached canvas is drawn once against a reference snapshot of the camera
//! and then presented through a cheap scale/translate/rotate transform while
//! the camera moves. The canvas is oversized by an overdraw factor so that
//! translation can be absorbed by the margin. Once the approximation drifts
//! too far the instance is marked invalid and must be re-synced and redrawn.

use camera::{ChangeFlags, MapCamera};
use foundation::math::{GeoPoint, GeoProjection, ProjectionKind, Vec2};
use runtime::frame::FrameTick;
use tracing::debug;

use crate::canvas::{CanvasSurface, CssTransform};
use crate::config::LayerConfig;
use crate::error::{LayerError, LayerResult};
use crate::layer::{LayerId, MapLayer};

/// Camera state at the time an instance was last drawn.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct CanvasReference {
    pub center: GeoPoint,
    pub scale_factor: f64,
    pub rotation: f64,
}

impl Default for CanvasReference {
    fn default() -> Self {
        Self {
            center: GeoPoint::default(),
            scale_factor: 1.0,
            rotation: 0.0,
        }
    }
}

impl CanvasReference {
    pub fn from_camera(camera: &MapCamera) -> Self {
        Self {
            center: camera.center(),
            scale_factor: camera.scale_factor(),
            rotation: camera.rotation(),
        }
    }
}

/// Drift of the live camera relative to a reference.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct CanvasTransform {
    pub scale: f64,
    pub rotation: f64,
    pub translation: Vec2,
    pub margin: f64,
    pub margin_remaining: f64,
}

impl CanvasTransform {
    pub fn update(&mut self, camera: &MapCamera, reference: &CanvasReference, reference_margin: f64) {
        let translation = camera.project(&reference.center) - camera.center_projected();
        self.update_with(
            camera.scale_factor(),
            camera.rotation(),
            translation,
            reference,
            reference_margin,
        );
    }

    /// `translation` is where the reference center projects now, relative to
    /// the window center.
    pub fn update_with(
        &mut self,
        scale_factor: f64,
        rotation: f64,
        translation: Vec2,
        reference: &CanvasReference,
        reference_margin: f64,
    ) {
        self.scale = scale_factor / reference.scale_factor;
        self.rotation = rotation - reference.rotation;
        self.translation = translation;
        self.margin = reference_margin * self.scale;
        self.margin_remaining = self.margin - translation.x.abs().max(translation.y.abs());
    }

    /// Presentation transform: scale, then translate by `translation / scale`, then rotate.
    pub fn css(&self) -> CssTransform {
        CssTransform {
            scale: self.scale,
            translate: self.translation * (1.0 / self.scale),
            rotate: self.rotation,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CachedCanvasInstance {
    surface: CanvasSurface,
    projection: GeoProjection<ProjectionKind>,
    reference: CanvasReference,
    reference_margin: f64,
    transform: CanvasTransform,
    is_invalid: bool,
    is_displayed: bool,
    scale_threshold: f64,
}

impl CachedCanvasInstance {
    /// A fresh instance starts invalid: it has never been synced.
    pub fn new(kind: ProjectionKind, size: f64, reference_margin: f64, scale_threshold: f64, is_displayed: bool) -> Self {
        Self {
            surface: CanvasSurface::new(size, size),
            projection: GeoProjection::new(kind),
            reference: CanvasReference::default(),
            reference_margin,
            transform: CanvasTransform::default(),
            is_invalid: true,
            is_displayed,
            scale_threshold,
        }
    }

    pub fn surface(&self) -> &CanvasSurface {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut CanvasSurface {
        &mut self.surface
    }

    /// The instance's own copy of the camera projection, translated to the canvas center.
    pub fn geo_projection(&self) -> &GeoProjection<ProjectionKind> {
        &self.projection
    }

    pub fn project(&self, point: &GeoPoint) -> Vec2 {
        self.projection.project(point)
    }

    pub fn reference(&self) -> &CanvasReference {
        &self.reference
    }

    pub fn reference_margin(&self) -> f64 {
        self.reference_margin
    }

    pub fn transform(&self) -> &CanvasTransform {
        &self.transform
    }

    pub fn is_invalid(&self) -> bool {
        self.is_invalid
    }

    pub fn is_displayed(&self) -> bool {
        self.is_displayed
    }

    pub fn size(&self) -> f64 {
        self.surface.width()
    }

    pub fn resize(&mut self, size: f64, reference_margin: f64) {
        self.surface.resize(size, size);
        self.reference_margin = reference_margin;
    }

    pub fn clear(&mut self) {
        self.surface.clear();
    }

    pub fn invalidate(&mut self) {
        self.is_invalid = true;
        self.surface.clear();
    }

    /// Take a new reference from `camera` and mark the instance valid.
    pub fn sync_with_camera(&mut self, camera: &MapCamera) {
        let half = self.size() * 0.5;
        self.reference = CanvasReference::from_camera(camera);
        self.projection
            .copy_parameters_from(camera.geo_projection())
            .set_translation(Vec2::new(half, half));
        self.transform.update(camera, &self.reference, self.reference_margin);
        self.is_invalid = false;
        self.present();
    }

    /// Adopt another instance's reference, projection, transform and validity.
    pub fn sync_with_instance(&mut self, other: &CachedCanvasInstance) {
        self.reference = other.reference;
        self.projection.copy_parameters_from(&other.projection);
        self.transform = other.transform;
        self.is_invalid = other.is_invalid;
        if !self.is_invalid {
            self.present();
        }
    }

    pub fn update_transform(&mut self, camera: &MapCamera) {
        let translation = camera.project(&self.reference.center) - camera.center_projected();
        self.update_transform_with(camera.scale_factor(), camera.rotation(), translation);
    }

    /// Once invalid, an instance stays invalid until the next sync.
    pub fn update_transform_with(&mut self, scale_factor: f64, rotation: f64, translation: Vec2) {
        self.transform.update_with(
            scale_factor,
            rotation,
            translation,
            &self.reference,
            self.reference_margin,
        );
        if !self.is_invalid {
            let ratio = self.transform.scale;
            self.is_invalid = ratio >= self.scale_threshold
                || ratio <= 1.0 / self.scale_threshold
                || self.transform.margin_remaining < 0.0;
            if self.is_invalid {
                debug!(
                    scale = ratio,
                    margin_remaining = self.transform.margin_remaining,
                    "cached canvas invalidated"
                );
            }
        }
        if !self.is_invalid {
            self.present();
        }
    }

    fn present(&mut self) {
        if self.is_displayed {
            self.surface.set_css_transform(self.transform.css());
        }
    }

    #[cfg(test)]
    pub(crate) fn set_reference(&mut self, reference: CanvasReference) {
        self.reference = reference;
        self.is_invalid = false;
    }
}

/// Canvas layer holding a displayed instance and an optional off-screen buffer.
#[derive(Debug)]
pub struct CachedCanvasLayer {
    id: LayerId,
    overdraw_factor: f64,
    scale_threshold: f64,
    use_buffer: bool,
    size: f64,
    reference_margin: f64,
    offset: Vec2,
    display: Option<CachedCanvasInstance>,
    buffer: Option<CachedCanvasInstance>,
    need_update_transforms: bool,
}

impl CachedCanvasLayer {
    pub fn new(id: LayerId, config: &LayerConfig, use_buffer: bool) -> Self {
        Self {
            id,
            overdraw_factor: config.overdraw_factor.max(1.0),
            scale_threshold: config.scale_invalidation_ratio,
            use_buffer,
            size: 0.0,
            reference_margin: 0.0,
            offset: Vec2::ZERO,
            display: None,
            buffer: None,
            need_update_transforms: false,
        }
    }

    /// Edge length of the (square) cached canvases.
    pub fn size(&self) -> f64 {
        self.size
    }

    pub fn reference_margin(&self) -> f64 {
        self.reference_margin
    }

    /// Position of the canvas' top-left corner relative to the window.
    pub fn offset(&self) -> Vec2 {
        self.offset
    }

    pub fn is_attached(&self) -> bool {
        self.display.is_some()
    }

    pub fn display(&self) -> LayerResult<&CachedCanvasInstance> {
        self.display
            .as_ref()
            .ok_or(LayerError::NotAttached { surface: "display" })
    }

    pub fn display_mut(&mut self) -> LayerResult<&mut CachedCanvasInstance> {
        self.display
            .as_mut()
            .ok_or(LayerError::NotAttached { surface: "display" })
    }

    pub fn buffer(&self) -> LayerResult<&CachedCanvasInstance> {
        self.check_buffer()?;
        self.buffer.as_ref().ok_or(LayerError::NoBuffer)
    }

    pub fn buffer_mut(&mut self) -> LayerResult<&mut CachedCanvasInstance> {
        self.check_buffer()?;
        self.buffer.as_mut().ok_or(LayerError::NoBuffer)
    }

    /// Both instances at once, for buffer-to-display handoff.
    pub fn instances_mut(&mut self) -> LayerResult<(&mut CachedCanvasInstance, &mut CachedCanvasInstance)> {
        self.check_buffer()?;
        match (self.display.as_mut(), self.buffer.as_mut()) {
            (Some(display), Some(buffer)) => Ok((display, buffer)),
            _ => Err(LayerError::NoBuffer),
        }
    }

    /// Replace the display's contents and reference with the buffer's.
    pub fn copy_buffer_to_display(&mut self) -> LayerResult<()> {
        let (display, buffer) = self.instances_mut()?;
        display.clear();
        display.sync_with_instance(buffer);
        display.surface_mut().copy_from(buffer.surface());
        Ok(())
    }

    fn check_buffer(&self) -> LayerResult<()> {
        if self.display.is_none() {
            return Err(LayerError::NotAttached { surface: "buffer" });
        }
        if !self.use_buffer {
            return Err(LayerError::NoBuffer);
        }
        Ok(())
    }

    fn update_from_projected_size(&mut self, projected_size: Vec2) {
        let diag = projected_size.x.hypot(projected_size.y);
        self.size = diag * self.overdraw_factor;
        self.reference_margin = (self.size - diag) * 0.5;
        self.offset = Vec2::new(
            (projected_size.x - self.size) * 0.5,
            (projected_size.y - self.size) * 0.5,
        );
        for instance in self.display.iter_mut().chain(self.buffer.iter_mut()) {
            instance.resize(self.size, self.reference_margin);
        }
    }
}

impl MapLayer for CachedCanvasLayer {
    fn id(&self) -> LayerId {
        self.id
    }

    fn on_attached(&mut self, camera: &MapCamera) {
        let kind = *camera.geo_projection().raw();
        self.display = Some(CachedCanvasInstance::new(kind, 0.0, 0.0, self.scale_threshold, true));
        if self.use_buffer {
            self.buffer = Some(CachedCanvasInstance::new(kind, 0.0, 0.0, self.scale_threshold, false));
        }
        self.update_from_projected_size(camera.projected_size());
        self.need_update_transforms = true;
    }

    fn on_map_projection_changed(&mut self, camera: &MapCamera, flags: ChangeFlags) {
        if flags.contains(ChangeFlags::PROJECTED_SIZE) {
            self.update_from_projected_size(camera.projected_size());
            for instance in self.display.iter_mut().chain(self.buffer.iter_mut()) {
                instance.invalidate();
            }
        }
        self.need_update_transforms = true;
    }

    fn on_updated(&mut self, camera: &MapCamera, _tick: FrameTick) {
        if !self.need_update_transforms {
            return;
        }
        for instance in self.display.iter_mut().chain(self.buffer.iter_mut()) {
            instance.update_transform(camera);
        }
        self.need_update_transforms = false;
    }
}
