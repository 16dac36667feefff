//! Double-buffered cached drawing.
//!
//! Paints happen off-screen into the buffer instance, a few work units per
//! frame, while the display instance keeps being presented through its
//! transform. A finished paint is copied to the display in one step. When the
//! display drifts close to the edge of its margin a background repaint is
//! requested before it has to be invalidated.

use camera::{ChangeFlags, MapCamera};
use runtime::budget::FrameBudget;
use runtime::debounce::Debounce;
use runtime::frame::FrameTick;
use tracing::{debug, trace, warn};

use crate::cached_canvas::{CachedCanvasInstance, CachedCanvasLayer};
use crate::config::LayerConfig;
use crate::error::LayerResult;
use crate::layer::{LayerId, MapLayer};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PaintProgress {
    Finished,
    /// Budget ran out; `paint` resumes where it stopped on the next frame.
    Paused,
}

/// Incremental painter driven by [`CachedDrawingLayer`].
pub trait CanvasPainter {
    /// A debounced repaint request fired; reload whatever should be drawn.
    fn refresh(&mut self, _camera: &MapCamera) {}

    /// Start over; `canvas` was just cleared and synced with the camera.
    fn begin(&mut self, canvas: &CachedCanvasInstance);

    fn paint(&mut self, canvas: &mut CachedCanvasInstance, budget: &mut FrameBudget) -> PaintProgress;

    fn abort(&mut self) {}
}

#[derive(Debug)]
pub struct CachedDrawingLayer<P> {
    canvas: CachedCanvasLayer,
    painter: P,
    repaint: Debounce<()>,
    repaint_delay_ms: f64,
    background_threshold: f64,
    paint_budget_units: u32,
    is_render_scheduled: bool,
    is_rendering: bool,
    is_background_scheduled: bool,
    is_display_invalidated: bool,
    completed_paints: u64,
}

impl<P: CanvasPainter> CachedDrawingLayer<P> {
    pub fn new(id: LayerId, config: &LayerConfig, painter: P) -> Self {
        Self {
            canvas: CachedCanvasLayer::new(id, config, true),
            painter,
            repaint: Debounce::new(config.repaint_debounce_ms),
            repaint_delay_ms: config.repaint_debounce_ms,
            background_threshold: config.background_repaint_threshold,
            paint_budget_units: config.paint_budget_units,
            is_render_scheduled: false,
            is_rendering: false,
            is_background_scheduled: false,
            is_display_invalidated: true,
            completed_paints: 0,
        }
    }

    pub fn canvas(&self) -> &CachedCanvasLayer {
        &self.canvas
    }

    pub fn painter(&self) -> &P {
        &self.painter
    }

    pub fn painter_mut(&mut self) -> &mut P {
        &mut self.painter
    }

    pub fn is_rendering(&self) -> bool {
        self.is_rendering
    }

    pub fn is_repaint_pending(&self) -> bool {
        self.repaint.is_pending() || self.is_render_scheduled
    }

    pub fn is_background_scheduled(&self) -> bool {
        self.is_background_scheduled
    }

    pub fn completed_paints(&self) -> u64 {
        self.completed_paints
    }

    /// Repaint on the next frame, e.g. after the painter's data changed.
    pub fn request_repaint(&mut self) {
        self.repaint.schedule_with_delay((), 0.0);
    }

    fn update_from_invalidation(&mut self, camera: &MapCamera) -> LayerResult<()> {
        let (display, buffer) = self.canvas.instances_mut()?;
        let transform = display.transform();
        let need_background = !self.is_background_scheduled
            && !self.is_rendering
            && transform.margin > 0.0
            && transform.margin_remaining / transform.margin <= self.background_threshold;
        let should_schedule =
            need_background || display.is_invalid() || (buffer.is_invalid() && self.is_rendering);
        self.is_background_scheduled |= need_background;
        if need_background {
            debug!(
                margin_remaining = transform.margin_remaining,
                margin = transform.margin,
                "background repaint scheduled"
            );
        }

        if display.is_invalid() {
            self.is_display_invalidated = true;
            self.is_background_scheduled = false;
            display.clear();
            display.sync_with_camera(camera);
        }
        if buffer.is_invalid() {
            if self.is_rendering {
                self.painter.abort();
                self.is_rendering = false;
            }
            buffer.clear();
            buffer.sync_with_camera(camera);
        }
        if should_schedule {
            self.repaint.schedule_with_delay((), self.repaint_delay_ms);
        }
        Ok(())
    }

    fn start_render(&mut self, camera: &MapCamera) -> LayerResult<()> {
        if self.is_rendering {
            self.painter.abort();
        }
        let buffer = self.canvas.buffer_mut()?;
        buffer.clear();
        buffer.sync_with_camera(camera);
        self.painter.begin(buffer);
        self.is_rendering = true;
        trace!("cached paint started");
        Ok(())
    }

    fn continue_render(&mut self) -> LayerResult<()> {
        let mut budget = FrameBudget::new(self.paint_budget_units);
        let progress = self.painter.paint(self.canvas.buffer_mut()?, &mut budget);
        match progress {
            PaintProgress::Paused => {
                if self.is_display_invalidated {
                    self.canvas.copy_buffer_to_display()?;
                }
            }
            PaintProgress::Finished => {
                self.canvas.copy_buffer_to_display()?;
                self.is_rendering = false;
                self.is_display_invalidated = false;
                self.completed_paints += 1;
                debug!(spent = budget.spent_units(), "cached paint finished");
            }
        }
        Ok(())
    }

    fn update(&mut self, camera: &MapCamera, tick: FrameTick) -> LayerResult<()> {
        self.update_from_invalidation(camera)?;
        if self.is_render_scheduled {
            self.start_render(camera)?;
            self.is_render_scheduled = false;
            self.is_background_scheduled = false;
        }
        if self.repaint.tick(tick.elapsed_ms).is_some() {
            self.painter.refresh(camera);
            self.is_render_scheduled = true;
        }
        if self.is_rendering {
            self.continue_render()?;
        }
        Ok(())
    }
}

impl<P: CanvasPainter> MapLayer for CachedDrawingLayer<P> {
    fn id(&self) -> LayerId {
        self.canvas.id()
    }

    fn on_attached(&mut self, camera: &MapCamera) {
        self.canvas.on_attached(camera);
    }

    fn on_map_projection_changed(&mut self, camera: &MapCamera, flags: ChangeFlags) {
        self.canvas.on_map_projection_changed(camera, flags);
    }

    fn on_updated(&mut self, camera: &MapCamera, tick: FrameTick) {
        self.canvas.on_updated(camera, tick);
        if let Err(err) = self.update(camera, tick) {
            warn!(layer = self.canvas.id().0, %err, "cached drawing skipped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{CachedDrawingLayer, CanvasPainter, PaintProgress};
    use crate::cached_canvas::CachedCanvasInstance;
    use crate::canvas::DrawCommand;
    use crate::config::LayerConfig;
    use crate::layer::{LayerId, MapLayer};
    use camera::{CameraParams, MapCamera};
    use foundation::math::{GeoPoint, Vec2};
    use runtime::budget::FrameBudget;
    use runtime::frame::FrameClock;

    /// Draws `total` text commands, one work unit each.
    #[derive(Debug, Default)]
    struct CountingPainter {
        total: usize,
        drawn: usize,
        begins: usize,
        aborts: usize,
        refreshes: usize,
    }

    impl CanvasPainter for CountingPainter {
        fn refresh(&mut self, _camera: &MapCamera) {
            self.refreshes += 1;
        }

        fn begin(&mut self, _canvas: &CachedCanvasInstance) {
            self.begins += 1;
            self.drawn = 0;
        }

        fn paint(&mut self, canvas: &mut CachedCanvasInstance, budget: &mut FrameBudget) -> PaintProgress {
            while self.drawn < self.total {
                if !budget.try_consume(1) {
                    return PaintProgress::Paused;
                }
                canvas.surface_mut().draw(DrawCommand::Text {
                    text: self.drawn.to_string(),
                    position: Vec2::ZERO,
                    font_size: 10.0,
                    background: false,
                });
                self.drawn += 1;
            }
            PaintProgress::Finished
        }

        fn abort(&mut self) {
            self.aborts += 1;
        }
    }

    fn camera() -> MapCamera {
        let mut camera = MapCamera::new(800.0, 600.0);
        camera
            .set(
                &CameraParams::new()
                    .with_target(GeoPoint::new(47.0, -122.0))
                    .with_range(0.05),
            )
            .unwrap();
        camera
    }

    fn layer(total: usize, budget: u32) -> CachedDrawingLayer<CountingPainter> {
        let config = LayerConfig {
            paint_budget_units: budget,
            repaint_debounce_ms: 100.0,
            ..LayerConfig::default()
        };
        CachedDrawingLayer::new(
            LayerId(7),
            &config,
            CountingPainter {
                total,
                ..CountingPainter::default()
            },
        )
    }

    fn run(layer: &mut CachedDrawingLayer<CountingPainter>, camera: &MapCamera, clock: &mut FrameClock, frames: usize, start_ms: &mut f64) {
        for _ in 0..frames {
            let tick = clock.tick(*start_ms);
            *start_ms += 50.0;
            layer.on_updated(camera, tick);
        }
    }

    #[test]
    fn first_paint_waits_for_debounce_then_lands_on_display() {
        let cam = camera();
        let mut l = layer(3, 64);
        l.on_attached(&cam);
        let mut clock = FrameClock::default();
        let mut t = 0.0;

        run(&mut l, &cam, &mut clock, 1, &mut t);
        assert!(l.is_repaint_pending());
        assert!(!l.canvas().display().unwrap().is_invalid());
        assert_eq!(l.painter().begins, 0);

        run(&mut l, &cam, &mut clock, 4, &mut t);
        assert_eq!(l.painter().refreshes, 1);
        assert_eq!(l.completed_paints(), 1);
        assert_eq!(l.canvas().display().unwrap().surface().commands().len(), 3);
        assert!(!l.is_rendering());
    }

    #[test]
    fn paused_paint_shows_partial_progress_only_while_display_is_invalidated() {
        let cam = camera();
        let mut l = layer(5, 2);
        l.on_attached(&cam);
        let mut clock = FrameClock::default();
        let mut t = 0.0;

        run(&mut l, &cam, &mut clock, 4, &mut t);
        assert!(l.is_rendering());
        assert_eq!(l.canvas().display().unwrap().surface().commands().len(), 2);

        run(&mut l, &cam, &mut clock, 2, &mut t);
        assert_eq!(l.completed_paints(), 1);
        assert_eq!(l.canvas().display().unwrap().surface().commands().len(), 5);

        l.request_repaint();
        run(&mut l, &cam, &mut clock, 2, &mut t);
        assert!(l.is_rendering());
        assert_eq!(l.canvas().display().unwrap().surface().commands().len(), 5);
    }

    #[test]
    fn drift_toward_margin_edge_schedules_background_repaint() {
        let mut cam = camera();
        let mut l = layer(1, 64);
        l.on_attached(&cam);
        let mut clock = FrameClock::default();
        let mut t = 0.0;
        run(&mut l, &cam, &mut clock, 5, &mut t);
        assert_eq!(l.completed_paints(), 1);
        assert!(!l.is_repaint_pending());

        let margin = l.canvas().reference_margin();
        let shifted = cam.invert(Vec2::new(400.0 + margin * 0.95, 300.0));
        let flags = cam.set(&CameraParams::new().with_target(shifted)).unwrap();
        l.on_map_projection_changed(&cam, flags);
        run(&mut l, &cam, &mut clock, 1, &mut t);

        assert!(!l.canvas().display().unwrap().is_invalid());
        assert!(l.is_background_scheduled());
        assert!(l.is_repaint_pending());

        run(&mut l, &cam, &mut clock, 4, &mut t);
        assert_eq!(l.completed_paints(), 2);
        assert!(!l.is_background_scheduled());
        let display = l.canvas().display().unwrap();
        assert!(display.transform().margin_remaining > margin * 0.9);
    }

    #[test]
    fn zero_margin_never_schedules_background_repaint() {
        let mut cam = camera();
        let config = LayerConfig {
            overdraw_factor: 1.0,
            paint_budget_units: 64,
            repaint_debounce_ms: 100.0,
            ..LayerConfig::default()
        };
        let mut l = CachedDrawingLayer::new(
            LayerId(7),
            &config,
            CountingPainter {
                total: 1,
                ..CountingPainter::default()
            },
        );
        l.on_attached(&cam);
        let mut clock = FrameClock::default();
        let mut t = 0.0;
        run(&mut l, &cam, &mut clock, 5, &mut t);
        assert_eq!(l.canvas().reference_margin(), 0.0);
        assert_eq!(l.completed_paints(), 1);
        assert!(!l.is_background_scheduled());
        assert!(!l.is_repaint_pending());

        let shifted = cam.invert(Vec2::new(405.0, 300.0));
        let flags = cam.set(&CameraParams::new().with_target(shifted)).unwrap();
        l.on_map_projection_changed(&cam, flags);
        run(&mut l, &cam, &mut clock, 1, &mut t);
        assert!(!l.is_background_scheduled());
        assert!(l.canvas().display().unwrap().surface().commands().is_empty());
        assert!(l.is_repaint_pending());

        run(&mut l, &cam, &mut clock, 4, &mut t);
        assert_eq!(l.completed_paints(), 2);
        assert!(!l.is_background_scheduled());
    }

    #[test]
    fn buffer_invalidation_aborts_active_paint() {
        let mut cam = camera();
        let mut l = layer(100, 1);
        l.on_attached(&cam);
        let mut clock = FrameClock::default();
        let mut t = 0.0;
        run(&mut l, &cam, &mut clock, 4, &mut t);
        assert!(l.is_rendering());

        let flags = cam.set(&CameraParams::new().with_range(0.01)).unwrap();
        l.on_map_projection_changed(&cam, flags);
        run(&mut l, &cam, &mut clock, 1, &mut t);
        assert_eq!(l.painter().aborts, 1);
        assert!(!l.is_rendering());
        assert!(l.is_repaint_pending());
    }
}
