//! Map camera: target, range and window size in, projection out.
//!
//! The camera owns a `GeoProjection` and keeps it consistent with the
//! requested parameters. Each `set` solves for the scale factor at which the
//! great-arc distance between the two range endpoints equals the requested
//! range, then reports which derived quantities changed.

use foundation::bounds::Aabb2;
use foundation::math::{
    GeoPoint, GeoProjection, NMI_PER_GREAT_ARC_RADIAN, ProjectionKind, ProjectionParams, Vec2,
};
use runtime::listeners::{Listeners, Subscription};
use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::change::ChangeFlags;
use crate::error::CameraResult;
use crate::params::CameraParams;

/// Relative tolerance of the range-to-scale solve.
pub const SCALE_FACTOR_TOLERANCE: f64 = 1e-6;
/// Iteration cap of the range-to-scale solve.
pub const SCALE_FACTOR_MAX_ITER: u32 = 20;
/// Top-center to bottom-center of the window.
pub const DEFAULT_RANGE_ENDPOINTS: [f64; 4] = [0.5, 0.0, 0.5, 1.0];

/// Outcome of the most recent scale-factor solve.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub enum SolveStatus {
    Converged { iterations: u32 },
    /// Iteration cap hit or progress stalled; `error` is `|realized/requested - 1|`.
    NotConverged { iterations: u32, error: f64 },
    /// The target did not project to a finite point or the range ratio was
    /// unusable. The previous projection was kept.
    Degenerate,
}

/// Snapshot of the quantities that change flags are computed from.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct CameraState {
    pub target: GeoPoint,
    pub center: GeoPoint,
    pub target_projected: Vec2,
    pub range: f64,
    pub range_endpoints: [f64; 4],
    pub scale_factor: f64,
    pub rotation: f64,
    pub projected_size: Vec2,
    pub projected_resolution: f64,
}

impl CameraState {
    /// Flags for every quantity that differs from `old`. Geographic points
    /// compare within `EQUALITY_TOLERANCE`; everything else exactly.
    pub fn diff(&self, old: &CameraState) -> ChangeFlags {
        let mut flags = ChangeFlags::empty();
        flags.set(ChangeFlags::TARGET, !old.target.equals(&self.target));
        flags.set(ChangeFlags::CENTER, !old.center.equals(&self.center));
        flags.set(ChangeFlags::TARGET_PROJECTED, old.target_projected != self.target_projected);
        flags.set(ChangeFlags::RANGE, old.range != self.range);
        flags.set(ChangeFlags::RANGE_ENDPOINTS, old.range_endpoints != self.range_endpoints);
        flags.set(ChangeFlags::SCALE_FACTOR, old.scale_factor != self.scale_factor);
        flags.set(ChangeFlags::ROTATION, old.rotation != self.rotation);
        flags.set(ChangeFlags::PROJECTED_SIZE, old.projected_size != self.projected_size);
        flags.set(
            ChangeFlags::PROJECTED_RESOLUTION,
            old.projected_resolution != self.projected_resolution,
        );
        flags
    }
}

/// Camera inputs and projection parameters as they were before a `set`.
#[derive(Debug, Copy, Clone)]
struct CameraInputs {
    projection: ProjectionParams,
    target: GeoPoint,
    target_projected_offset: Vec2,
    target_projected: Vec2,
    range: f64,
    range_endpoints: [f64; 4],
    projected_size: Vec2,
    center_projected: Vec2,
}

pub type ChangeListener = dyn FnMut(&MapCamera, ChangeFlags);

#[derive(Debug)]
pub struct MapCamera {
    projection: GeoProjection<ProjectionKind>,

    target: GeoPoint,
    target_projected_offset: Vec2,
    target_projected: Vec2,
    range: f64,
    range_endpoints: [f64; 4],
    projected_size: Vec2,

    center: GeoPoint,
    center_projected: Vec2,
    projected_range: f64,
    width_range: f64,
    height_range: f64,

    tolerance: f64,
    max_iter: u32,
    solve_status: SolveStatus,

    queued: Option<CameraParams>,
    listeners: Listeners<ChangeListener>,
}

impl MapCamera {
    /// Mercator camera over a `width` x `height` window, centered on (0, 0).
    pub fn new(width: f64, height: f64) -> Self {
        Self::with_projection(ProjectionKind::Mercator, width, height)
    }

    pub fn with_projection(kind: ProjectionKind, width: f64, height: f64) -> Self {
        let center_projected = Vec2::new(width * 0.5, height * 0.5);
        let mut projection = GeoProjection::new(kind);
        projection
            .set_scale_factor(NMI_PER_GREAT_ARC_RADIAN)
            .set_reflect_y(true)
            .set_translation(center_projected);

        let mut camera = Self {
            projection,
            target: GeoPoint::default(),
            target_projected_offset: Vec2::ZERO,
            target_projected: center_projected,
            range: 1.0,
            range_endpoints: DEFAULT_RANGE_ENDPOINTS,
            projected_size: Vec2::new(width, height),
            center: GeoPoint::default(),
            center_projected,
            projected_range: 0.0,
            width_range: 0.0,
            height_range: 0.0,
            tolerance: SCALE_FACTOR_TOLERANCE,
            max_iter: SCALE_FACTOR_MAX_ITER,
            solve_status: SolveStatus::Degenerate,
            queued: None,
            listeners: Listeners::new(),
        };
        camera.recompute();
        camera
    }

    /// Override the solver tolerance and iteration cap.
    pub fn with_solver(mut self, tolerance: f64, max_iter: u32) -> Self {
        self.tolerance = tolerance;
        self.max_iter = max_iter;
        self.recompute();
        self
    }

    pub fn geo_projection(&self) -> &GeoProjection<ProjectionKind> {
        &self.projection
    }

    pub fn target(&self) -> GeoPoint {
        self.target
    }

    pub fn target_projected_offset(&self) -> Vec2 {
        self.target_projected_offset
    }

    pub fn target_projected(&self) -> Vec2 {
        self.target_projected
    }

    pub fn center(&self) -> GeoPoint {
        self.center
    }

    pub fn center_projected(&self) -> Vec2 {
        self.center_projected
    }

    pub fn range(&self) -> f64 {
        self.range
    }

    pub fn range_endpoints(&self) -> [f64; 4] {
        self.range_endpoints
    }

    /// Great-arc radians across the horizontal midline of the window.
    pub fn width_range(&self) -> f64 {
        self.width_range
    }

    /// Great-arc radians across the vertical midline of the window.
    pub fn height_range(&self) -> f64 {
        self.height_range
    }

    pub fn scale_factor(&self) -> f64 {
        self.projection.scale_factor()
    }

    pub fn rotation(&self) -> f64 {
        self.projection.rotation()
    }

    pub fn projected_size(&self) -> Vec2 {
        self.projected_size
    }

    /// Great-arc radians per pixel along the range endpoints.
    pub fn projected_resolution(&self) -> f64 {
        self.range / self.projected_range
    }

    pub fn solve_status(&self) -> SolveStatus {
        self.solve_status
    }

    pub fn state(&self) -> CameraState {
        CameraState {
            target: self.target,
            center: self.center,
            target_projected: self.target_projected,
            range: self.range,
            range_endpoints: self.range_endpoints,
            scale_factor: self.scale_factor(),
            rotation: self.rotation(),
            projected_size: self.projected_size,
            projected_resolution: self.projected_resolution(),
        }
    }

    pub fn project(&self, point: &GeoPoint) -> Vec2 {
        self.projection.project(point)
    }

    pub fn invert(&self, projected: Vec2) -> GeoPoint {
        self.projection.invert(projected)
    }

    /// Whether `point` lies within `bounds` (the window when `None`), edges inclusive.
    pub fn is_in_projected_bounds(&self, point: Vec2, bounds: Option<Aabb2>) -> bool {
        let bounds = bounds.unwrap_or_else(|| {
            Aabb2::from_origin_size(0.0, 0.0, self.projected_size.x, self.projected_size.y)
        });
        bounds.contains_point(point.x, point.y)
    }

    pub fn is_geo_in_projected_bounds(&self, point: &GeoPoint, bounds: Option<Aabb2>) -> bool {
        self.is_in_projected_bounds(self.project(point), bounds)
    }

    /// Great-arc radians between two projected points.
    pub fn geo_distance(&self, a: Vec2, b: Vec2) -> f64 {
        self.invert(a).distance(&self.invert(b))
    }

    /// Pixels between two geographic points.
    pub fn projected_distance(&self, a: &GeoPoint, b: &GeoPoint) -> f64 {
        self.project(a).distance(self.project(b))
    }

    pub fn add_change_listener(
        &mut self,
        listener: impl FnMut(&MapCamera, ChangeFlags) + 'static,
    ) -> Subscription {
        self.listeners.add(Box::new(listener))
    }

    pub fn remove_change_listener(&mut self, sub: Subscription) -> bool {
        self.listeners.remove(sub)
    }

    /// Apply a merge-patch, re-solve, notify listeners and return what changed.
    ///
    /// A degenerate solve abandons the whole patch: every parameter keeps its
    /// previous value, the returned flags are empty and `solve_status`
    /// reports `Degenerate`.
    pub fn set(&mut self, params: &CameraParams) -> CameraResult<ChangeFlags> {
        params.validate()?;
        let old = self.state();
        let inputs = self.inputs();

        if let Some(size) = params.projected_size {
            self.set_projected_size(size);
        }
        if let Some(target) = params.target {
            self.target = target;
        }
        if let Some(offset) = params.target_projected_offset {
            self.target_projected_offset = offset;
            self.target_projected = self.center_projected + offset;
        }
        if let Some(range) = params.range {
            self.range = range;
        }
        if let Some(endpoints) = params.range_endpoints {
            self.range_endpoints = endpoints;
        }
        if let Some(rotation) = params.rotation {
            self.projection.set_rotation(rotation);
        }

        if !self.recompute() {
            self.restore_inputs(inputs);
            debug!(status = ?self.solve_status, "camera set abandoned");
            self.notify(ChangeFlags::empty());
            return Ok(ChangeFlags::empty());
        }

        let flags = self.state().diff(&old);
        debug!(flags = flags.bits(), status = ?self.solve_status, "camera set");
        self.notify(flags);
        Ok(flags)
    }

    /// Merge `params` into the pending patch; nothing is applied yet.
    pub fn set_queued(&mut self, params: &CameraParams) -> CameraResult<()> {
        params.validate()?;
        self.queued.get_or_insert_with(CameraParams::default).merge(params);
        Ok(())
    }

    pub fn has_queued(&self) -> bool {
        self.queued.is_some()
    }

    /// Apply the pending patch with a single `set`. `None` if nothing was queued.
    pub fn apply_queued(&mut self) -> CameraResult<Option<ChangeFlags>> {
        match self.queued.take() {
            Some(params) => self.set(&params).map(Some),
            None => Ok(None),
        }
    }

    fn inputs(&self) -> CameraInputs {
        CameraInputs {
            projection: *self.projection.params(),
            target: self.target,
            target_projected_offset: self.target_projected_offset,
            target_projected: self.target_projected,
            range: self.range,
            range_endpoints: self.range_endpoints,
            projected_size: self.projected_size,
            center_projected: self.center_projected,
        }
    }

    fn restore_inputs(&mut self, inputs: CameraInputs) {
        self.projection.set_params(inputs.projection);
        self.target = inputs.target;
        self.target_projected_offset = inputs.target_projected_offset;
        self.target_projected = inputs.target_projected;
        self.range = inputs.range;
        self.range_endpoints = inputs.range_endpoints;
        self.projected_size = inputs.projected_size;
        self.center_projected = inputs.center_projected;
    }

    fn set_projected_size(&mut self, size: Vec2) {
        self.projected_size = size;
        self.center_projected = size * 0.5;
        self.projection.set_translation(self.center_projected);
        self.target_projected = self.center_projected + self.target_projected_offset;
    }

    fn notify(&mut self, flags: ChangeFlags) {
        let mut listeners = std::mem::take(&mut self.listeners);
        for listener in listeners.iter_mut() {
            listener(self, flags);
        }
        self.listeners = listeners;
    }

    fn range_at_center(&self, center_projected: Vec2) -> f64 {
        let [x1, y1, x2, y2] = self.range_endpoints;
        let size = self.projected_size;
        let e1 = center_projected + Vec2::new(size.x * (x1 - 0.5), size.y * (y1 - 0.5));
        let e2 = center_projected + Vec2::new(size.x * (x2 - 0.5), size.y * (y2 - 0.5));
        self.invert(e1).distance(&self.invert(e2))
    }

    /// Re-solve the projection. `false` when the solve was degenerate; the
    /// projection is then left as it was on entry and no derived value moves.
    fn recompute(&mut self) -> bool {
        let saved = *self.projection.params();

        let mut target_projected = self.project(&self.target);
        if !target_projected.is_finite() {
            warn!(target = ?self.target, "camera target does not project; keeping previous projection");
            self.solve_status = SolveStatus::Degenerate;
            return false;
        }

        let mut center_projected = target_projected - self.target_projected_offset;
        let mut ratio = self.range_at_center(center_projected) / self.range;
        if !ratio.is_finite() || ratio == 0.0 {
            warn!(ratio, range = self.range, "unusable range ratio; keeping previous projection");
            self.projection.set_params(saved);
            self.solve_status = SolveStatus::Degenerate;
            return false;
        }

        let mut iterations = 0;
        let mut error = (ratio - 1.0).abs();
        let mut delta_error = self.tolerance + 1.0;
        while iterations < self.max_iter && error > self.tolerance && delta_error > self.tolerance {
            iterations += 1;
            let scale = ratio * self.projection.scale_factor();
            self.projection.set_scale_factor(scale);
            target_projected = self.project(&self.target);
            center_projected = target_projected - self.target_projected_offset;
            ratio = self.range_at_center(center_projected) / self.range;
            if !ratio.is_finite() || ratio == 0.0 {
                warn!(iterations, "range ratio diverged; keeping previous projection");
                self.projection.set_params(saved);
                self.solve_status = SolveStatus::Degenerate;
                return false;
            }
            let new_error = (ratio - 1.0).abs();
            delta_error = (new_error - error).abs();
            error = new_error;
            trace!(iterations, scale, error, "scale factor iteration");
        }

        self.solve_status = if error <= self.tolerance {
            SolveStatus::Converged { iterations }
        } else {
            warn!(iterations, error, "scale factor solve did not converge");
            SolveStatus::NotConverged { iterations, error }
        };

        self.center = self.invert(center_projected);
        self.projection.set_center(self.center);
        // keep the center on the prime meridian of the raw projection
        self.projection
            .set_pre_rotation([-self.center.lon().to_radians(), 0.0, 0.0]);

        let [x1, y1, x2, y2] = self.range_endpoints;
        let (w, h) = (self.projected_size.x, self.projected_size.y);
        self.projected_range = ((x2 - x1) * w).hypot((y2 - y1) * h);
        self.width_range = self.geo_distance(Vec2::new(0.0, h * 0.5), Vec2::new(w, h * 0.5));
        self.height_range = self.geo_distance(Vec2::new(w * 0.5, 0.0), Vec2::new(w * 0.5, h));
        true
    }
}

#[cfg(test)]
mod tests {
    use super::{ChangeFlags, MapCamera, SolveStatus};
    use crate::params::CameraParams;
    use foundation::math::{GeoPoint, ProjectionKind, Vec2};
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn assert_close(a: f64, b: f64, eps: f64) {
        let diff = (a - b).abs();
        assert!(diff <= eps, "expected {a} ~= {b} (diff {diff})");
    }

    fn seattle_camera() -> MapCamera {
        let mut camera = MapCamera::new(800.0, 600.0);
        camera
            .set(
                &CameraParams::new()
                    .with_target(GeoPoint::new(47.0, -122.0))
                    .with_range(0.01),
            )
            .unwrap();
        camera
    }

    #[test]
    fn range_converges_between_default_endpoints() {
        let camera = seattle_camera();
        let top = camera.invert(Vec2::new(400.0, 0.0));
        let bottom = camera.invert(Vec2::new(400.0, 600.0));
        assert_close(top.distance(&bottom), 0.01, 1e-6);
        assert!(matches!(camera.solve_status(), SolveStatus::Converged { .. }));
        assert_close(camera.projected_resolution(), 0.01 / 600.0, 1e-15);
    }

    #[test]
    fn target_projects_to_window_center_plus_offset() {
        let mut camera = seattle_camera();
        camera
            .set(&CameraParams::new().with_target_projected_offset(Vec2::new(0.0, 150.0)))
            .unwrap();
        let p = camera.project(&GeoPoint::new(47.0, -122.0));
        assert_close(p.x, 400.0, 1e-6);
        assert_close(p.y, 450.0, 1e-6);
        assert_eq!(camera.target_projected(), Vec2::new(400.0, 450.0));
        let c = camera.project(&camera.center());
        assert_close(c.x, 400.0, 1e-6);
        assert_close(c.y, 300.0, 1e-6);
    }

    #[test]
    fn identical_set_twice_reports_no_changes() {
        let mut camera = MapCamera::new(800.0, 600.0);
        let params = CameraParams::new()
            .with_target(GeoPoint::new(47.0, -122.0))
            .with_range(0.01)
            .with_rotation(0.3);
        let first = camera.set(&params).unwrap();
        assert!(first.contains(ChangeFlags::TARGET | ChangeFlags::RANGE | ChangeFlags::ROTATION));
        let second = camera.set(&params).unwrap();
        assert_eq!(second, ChangeFlags::empty());
    }

    #[test]
    fn resize_reports_size_and_resolution() {
        let mut camera = seattle_camera();
        let flags = camera
            .set(&CameraParams::new().with_projected_size(Vec2::new(1024.0, 768.0)))
            .unwrap();
        assert!(flags.contains(ChangeFlags::PROJECTED_SIZE | ChangeFlags::PROJECTED_RESOLUTION));
        assert!(flags.contains(ChangeFlags::TARGET_PROJECTED));
        assert!(!flags.contains(ChangeFlags::RANGE));
        assert_eq!(camera.center_projected(), Vec2::new(512.0, 384.0));
    }

    #[test]
    fn horizontal_endpoints_measure_range_across_width() {
        let mut camera = seattle_camera();
        camera
            .set(&CameraParams::new().with_range_endpoints([0.0, 0.5, 1.0, 0.5]))
            .unwrap();
        assert_close(camera.width_range(), 0.01, 1e-6);
        assert_close(camera.projected_resolution(), 0.01 / 800.0, 1e-15);
    }

    #[test]
    fn rejected_patch_leaves_camera_untouched() {
        let mut camera = seattle_camera();
        let before = camera.state();
        assert!(camera.set(&CameraParams::new().with_range(-1.0)).is_err());
        assert_eq!(camera.state(), before);
    }

    #[test]
    fn south_pole_target_is_degenerate_and_keeps_projection() {
        let mut camera = seattle_camera();
        let before = *camera.geo_projection().params();
        camera
            .set(&CameraParams::new().with_target(GeoPoint::new(-90.0, 0.0)))
            .unwrap();
        assert_eq!(camera.solve_status(), SolveStatus::Degenerate);
        assert_eq!(*camera.geo_projection().params(), before);
        assert!(camera.project(&GeoPoint::new(47.0, -122.0)).is_finite());
    }

    #[test]
    fn degenerate_combined_patch_changes_nothing() {
        let mut camera = seattle_camera();
        let calls = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&calls);
        camera.add_change_listener(move |_, flags| sink.borrow_mut().push(flags));
        let state = camera.state();
        let projection = *camera.geo_projection().params();

        let flags = camera
            .set(
                &CameraParams::new()
                    .with_target(GeoPoint::new(-90.0, 0.0))
                    .with_rotation(0.7)
                    .with_range(0.05)
                    .with_projected_size(Vec2::new(400.0, 300.0)),
            )
            .unwrap();

        assert!(flags.is_empty());
        assert_eq!(camera.solve_status(), SolveStatus::Degenerate);
        assert_eq!(camera.state(), state);
        assert_eq!(*camera.geo_projection().params(), projection);
        assert_eq!(camera.center_projected(), Vec2::new(400.0, 300.0));
        assert_eq!(camera.target_projected(), Vec2::new(400.0, 300.0));
        assert_close(camera.height_range(), 0.01, 1e-6);
        assert_eq!(*calls.borrow(), vec![ChangeFlags::empty()]);

        let flags = camera.set(&CameraParams::new().with_range(0.02)).unwrap();
        assert!(matches!(camera.solve_status(), SolveStatus::Converged { .. }));
        assert!(flags.contains(ChangeFlags::RANGE | ChangeFlags::SCALE_FACTOR));
        assert!(!flags.intersects(ChangeFlags::TARGET | ChangeFlags::ROTATION | ChangeFlags::PROJECTED_SIZE));
    }

    #[test]
    fn queued_params_apply_once_with_one_notification() {
        let mut camera = seattle_camera();
        let calls = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&calls);
        camera.add_change_listener(move |_, flags| sink.borrow_mut().push(flags));

        camera.set_queued(&CameraParams::new().with_range(0.02)).unwrap();
        camera.set_queued(&CameraParams::new().with_range(0.05)).unwrap();
        camera.set_queued(&CameraParams::new().with_rotation(1.0)).unwrap();
        assert!(calls.borrow().is_empty());
        assert_eq!(camera.range(), 0.01);

        let flags = camera.apply_queued().unwrap().unwrap();
        assert!(flags.contains(ChangeFlags::RANGE | ChangeFlags::ROTATION));
        assert_eq!(camera.range(), 0.05);
        assert_eq!(calls.borrow().len(), 1);
        assert_eq!(camera.apply_queued().unwrap(), None);
    }

    #[test]
    fn removed_listener_is_not_called() {
        let mut camera = seattle_camera();
        let count = Rc::new(RefCell::new(0));
        let sink = Rc::clone(&count);
        let sub = camera.add_change_listener(move |cam, _| {
            assert!(cam.range() > 0.0);
            *sink.borrow_mut() += 1;
        });
        camera.set(&CameraParams::new().with_range(0.02)).unwrap();
        assert!(camera.remove_change_listener(sub));
        camera.set(&CameraParams::new().with_range(0.03)).unwrap();
        assert_eq!(*count.borrow(), 1);
    }

    #[test]
    fn bounds_and_distances() {
        let camera = seattle_camera();
        assert!(camera.is_in_projected_bounds(Vec2::new(800.0, 600.0), None));
        assert!(!camera.is_in_projected_bounds(Vec2::new(801.0, 0.0), None));
        assert!(camera.is_geo_in_projected_bounds(&GeoPoint::new(47.0, -122.0), None));

        let a = GeoPoint::new(47.0, -122.0);
        let b = a.offset(0.0, 0.005);
        assert_close(camera.projected_distance(&a, &b), 300.0, 2.0);
        assert_close(camera.geo_distance(Vec2::new(400.0, 0.0), Vec2::new(400.0, 600.0)), 0.01, 1e-6);
    }

    #[test]
    fn orthographic_camera_converges() {
        let mut camera = MapCamera::with_projection(ProjectionKind::Orthographic, 512.0, 512.0);
        camera
            .set(
                &CameraParams::new()
                    .with_target(GeoPoint::new(10.0, 20.0))
                    .with_range(0.2),
            )
            .unwrap();
        assert_close(camera.height_range(), 0.2, 1e-5);
    }
}
