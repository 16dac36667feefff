//! Geographic polylines painted incrementally into a cached canvas.

use foundation::Aabb2;
use foundation::math::{GeoPoint, Vec2};
use runtime::budget::FrameBudget;
use serde::{Deserialize, Serialize};

use crate::cached_canvas::CachedCanvasInstance;
use crate::cached_drawing::{CanvasPainter, PaintProgress};
use crate::canvas::DrawCommand;

/// Extra pixels around the canvas within which paths still count as visible.
const CLIP_BOUNDS_BUFFER: f64 = 10.0;

/// Legs longer than this (great-arc radians) are always split.
pub const RESAMPLE_MIN_DISTANCE: f64 = std::f64::consts::PI / 12.0;
/// Largest allowed pixel deviation of a leg's true midpoint from its chord.
pub const RESAMPLE_TOLERANCE: f64 = 0.25;
pub const RESAMPLE_MAX_DEPTH: u32 = 8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoPath {
    pub points: Vec<GeoPoint>,
    pub stroke_width: f64,
    pub color: [f32; 4],
}

impl GeoPath {
    pub fn new(points: Vec<GeoPoint>, stroke_width: f64, color: [f32; 4]) -> Self {
        Self {
            points,
            stroke_width,
            color,
        }
    }
}

/// Splits great-circle legs until their projected chords follow the arc.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct GeodesicResampler {
    pub min_distance: f64,
    pub tolerance: f64,
    pub max_depth: u32,
}

impl Default for GeodesicResampler {
    fn default() -> Self {
        Self {
            min_distance: RESAMPLE_MIN_DISTANCE,
            tolerance: RESAMPLE_TOLERANCE,
            max_depth: RESAMPLE_MAX_DEPTH,
        }
    }
}

impl GeodesicResampler {
    /// Append the projected vertices of the leg `start -> end` to `out`,
    /// excluding `start` itself and ending with the projection of `end`.
    pub fn resample(&self, project: impl Fn(&GeoPoint) -> Vec2, start: &GeoPoint, end: &GeoPoint, out: &mut Vec<Vec2>) {
        let (a, b) = (project(start), project(end));
        self.split(&project, (start, a), (end, b), 0, out);
    }

    fn split(
        &self,
        project: &dyn Fn(&GeoPoint) -> Vec2,
        (start, a): (&GeoPoint, Vec2),
        (end, b): (&GeoPoint, Vec2),
        depth: u32,
        out: &mut Vec<Vec2>,
    ) {
        if depth < self.max_depth && a.is_finite() && b.is_finite() {
            let distance = start.distance(end);
            let mid = start.offset(start.bearing_to(end), distance * 0.5);
            let m = project(&mid);
            if m.is_finite() && (distance > self.min_distance || chord_deviation(m, a, b) > self.tolerance) {
                self.split(project, (start, a), (&mid, m), depth + 1, out);
                self.split(project, (&mid, m), (end, b), depth + 1, out);
                return;
            }
        }
        out.push(b);
    }
}

/// Distance from `p` to the line through `a` and `b`.
fn chord_deviation(p: Vec2, a: Vec2, b: Vec2) -> f64 {
    let ab = b - a;
    let len = ab.length();
    if len == 0.0 {
        return p.distance(a);
    }
    let ap = p - a;
    (ab.x * ap.y - ab.y * ap.x).abs() / len
}

/// Paints paths one segment per work unit. A path interrupted by the budget
/// continues from its last drawn vertex on the next frame.
#[derive(Debug, Clone, Default)]
pub struct GeoPathPainter {
    paths: Vec<GeoPath>,
    resampler: GeodesicResampler,
    path_index: usize,
    vertex_index: usize,
}

impl GeoPathPainter {
    pub fn new(paths: Vec<GeoPath>) -> Self {
        Self {
            paths,
            ..Self::default()
        }
    }

    pub fn with_resampler(mut self, resampler: GeodesicResampler) -> Self {
        self.resampler = resampler;
        self
    }

    pub fn paths(&self) -> &[GeoPath] {
        &self.paths
    }

    /// Takes effect on the next paint, which starts over from the first path.
    pub fn set_paths(&mut self, paths: Vec<GeoPath>) {
        self.paths = paths;
        self.path_index = 0;
        self.vertex_index = 0;
    }

    fn advance_path(&mut self) {
        self.path_index += 1;
        self.vertex_index = 0;
    }
}

fn projected_bounds(points: &[Vec2]) -> Option<Aabb2> {
    let first = points.first()?;
    let mut bounds = Aabb2::new([first.x, first.y], [first.x, first.y]);
    for p in &points[1..] {
        bounds.min = [bounds.min[0].min(p.x), bounds.min[1].min(p.y)];
        bounds.max = [bounds.max[0].max(p.x), bounds.max[1].max(p.y)];
    }
    Some(bounds)
}

impl CanvasPainter for GeoPathPainter {
    fn begin(&mut self, _canvas: &CachedCanvasInstance) {
        self.path_index = 0;
        self.vertex_index = 0;
    }

    fn paint(&mut self, canvas: &mut CachedCanvasInstance, budget: &mut FrameBudget) -> PaintProgress {
        let size = canvas.size();
        let clip = Aabb2::from_origin_size(0.0, 0.0, size, size).padded([CLIP_BOUNDS_BUFFER; 4]);

        while let Some(path) = self.paths.get(self.path_index) {
            let points = &path.points;
            if self.vertex_index + 1 >= points.len() {
                self.advance_path();
                continue;
            }
            if self.vertex_index == 0 {
                let projected: Vec<Vec2> = points.iter().map(|p| canvas.project(p)).collect();
                if !projected_bounds(&projected).is_some_and(|b| b.intersects(&clip)) {
                    self.advance_path();
                    continue;
                }
            }

            let start = self.vertex_index;
            let legs = points.len() - 1 - start;
            let mut drawn = 0;
            while drawn < legs && budget.try_consume(1) {
                drawn += 1;
            }
            if drawn == 0 {
                return PaintProgress::Paused;
            }
            let mut line = vec![canvas.project(&points[start])];
            for leg in start..start + drawn {
                self.resampler
                    .resample(|p| canvas.project(p), &points[leg], &points[leg + 1], &mut line);
            }
            canvas.surface_mut().draw(DrawCommand::Polyline {
                points: line,
                stroke_width: path.stroke_width,
                color: path.color,
            });
            if drawn < legs {
                self.vertex_index += drawn;
                return PaintProgress::Paused;
            }
            self.advance_path();
        }
        PaintProgress::Finished
    }
}

#[cfg(test)]
mod tests {
    use super::{GeoPath, GeoPathPainter, GeodesicResampler};
    use crate::cached_canvas::CachedCanvasInstance;
    use crate::cached_drawing::{CanvasPainter, PaintProgress};
    use crate::canvas::DrawCommand;
    use camera::{CameraParams, MapCamera};
    use foundation::math::{GeoPoint, ProjectionKind, Vec2};
    use pretty_assertions::assert_eq;
    use runtime::budget::FrameBudget;

    fn synced_canvas() -> CachedCanvasInstance {
        let mut camera = MapCamera::new(800.0, 600.0);
        camera
            .set(
                &CameraParams::new()
                    .with_target(GeoPoint::new(47.0, -122.0))
                    .with_range(0.05),
            )
            .unwrap();
        let mut canvas = CachedCanvasInstance::new(ProjectionKind::Mercator, 1414.0, 307.0, 1.2, false);
        canvas.sync_with_camera(&camera);
        canvas
    }

    fn polyline_lengths(canvas: &CachedCanvasInstance) -> Vec<usize> {
        canvas
            .surface()
            .commands()
            .iter()
            .filter_map(|c| match c {
                DrawCommand::Polyline { points, .. } => Some(points.len()),
                _ => None,
            })
            .collect()
    }

    fn route() -> GeoPath {
        GeoPath::new(
            vec![
                GeoPoint::new(47.0, -122.0),
                GeoPoint::new(47.1, -122.1),
                GeoPoint::new(47.2, -122.0),
                GeoPoint::new(47.3, -122.1),
            ],
            2.0,
            [1.0, 0.0, 1.0, 1.0],
        )
    }

    #[test]
    fn resumes_interrupted_path_from_last_vertex() {
        let mut canvas = synced_canvas();
        let mut painter = GeoPathPainter::new(vec![route()]);
        painter.begin(&canvas);

        let mut budget = FrameBudget::new(2);
        assert_eq!(painter.paint(&mut canvas, &mut budget), PaintProgress::Paused);
        let mut budget = FrameBudget::new(2);
        assert_eq!(painter.paint(&mut canvas, &mut budget), PaintProgress::Finished);
        assert_eq!(polyline_lengths(&canvas), vec![3, 2]);
    }

    #[test]
    fn skips_offscreen_and_degenerate_paths() {
        let mut canvas = synced_canvas();
        let far = GeoPath::new(
            vec![GeoPoint::new(-30.0, 100.0), GeoPoint::new(-31.0, 101.0)],
            1.0,
            [1.0; 4],
        );
        let single = GeoPath::new(vec![GeoPoint::new(47.0, -122.0)], 1.0, [1.0; 4]);
        let mut painter = GeoPathPainter::new(vec![far, single, route()]);
        painter.begin(&canvas);
        let mut budget = FrameBudget::new(10);
        assert_eq!(painter.paint(&mut canvas, &mut budget), PaintProgress::Finished);
        assert_eq!(polyline_lengths(&canvas), vec![4]);
        assert_eq!(budget.spent_units(), 3);
    }

    fn polylines(canvas: &CachedCanvasInstance) -> Vec<Vec<Vec2>> {
        canvas
            .surface()
            .commands()
            .iter()
            .filter_map(|c| match c {
                DrawCommand::Polyline { points, .. } => Some(points.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn replacing_paths_mid_paint_restarts_from_first_path() {
        let mut canvas = synced_canvas();
        let long = GeoPath::new(
            (0..10).map(|i| GeoPoint::new(47.0 + 0.02 * i as f64, -122.0)).collect(),
            1.0,
            [1.0; 4],
        );
        let mut painter = GeoPathPainter::new(vec![long]);
        painter.begin(&canvas);
        let mut budget = FrameBudget::new(6);
        assert_eq!(painter.paint(&mut canvas, &mut budget), PaintProgress::Paused);

        let mut short = route();
        short.points.truncate(3);
        painter.set_paths(vec![short]);
        let mut budget = FrameBudget::new(10);
        assert_eq!(painter.paint(&mut canvas, &mut budget), PaintProgress::Finished);
        assert_eq!(polyline_lengths(&canvas), vec![7, 3]);
        assert_eq!(budget.spent_units(), 2);
    }

    #[test]
    fn long_east_west_leg_bows_toward_the_pole() {
        let mut canvas = synced_canvas();
        let leg = GeoPath::new(
            vec![GeoPoint::new(47.0, -125.0), GeoPoint::new(47.0, -100.0)],
            1.0,
            [1.0; 4],
        );
        let mut painter = GeoPathPainter::new(vec![leg]);
        painter.begin(&canvas);
        let mut budget = FrameBudget::new(10);
        assert_eq!(painter.paint(&mut canvas, &mut budget), PaintProgress::Finished);
        assert_eq!(budget.spent_units(), 1);

        let lines = polylines(&canvas);
        assert_eq!(lines.len(), 1);
        let line = &lines[0];
        assert!(line.len() > 2);
        let lats: Vec<f64> = line.iter().map(|p| canvas.geo_projection().invert(*p).lat()).collect();
        assert!(lats.iter().all(|&lat| lat > 47.0 - 1e-6));
        let peak = lats.iter().copied().fold(f64::MIN, f64::max);
        assert!(peak > 47.6, "peak latitude {peak}");
        assert!(line[1..line.len() - 1].iter().all(|p| p.y < line[0].y));
    }

    #[test]
    fn zero_max_depth_draws_straight_chords() {
        let mut canvas = synced_canvas();
        let leg = GeoPath::new(
            vec![GeoPoint::new(47.0, -125.0), GeoPoint::new(47.0, -100.0)],
            1.0,
            [1.0; 4],
        );
        let resampler = GeodesicResampler {
            max_depth: 0,
            ..GeodesicResampler::default()
        };
        let mut painter = GeoPathPainter::new(vec![leg]).with_resampler(resampler);
        painter.begin(&canvas);
        let mut budget = FrameBudget::new(10);
        assert_eq!(painter.paint(&mut canvas, &mut budget), PaintProgress::Finished);
        assert_eq!(polyline_lengths(&canvas), vec![2]);
    }
}
