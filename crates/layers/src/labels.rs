//! Priority-culled text labels anchored to geographic locations.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::f64::consts::TAU;
use std::rc::Rc;

use camera::{ChangeFlags, MapCamera};
use foundation::Aabb2;
use foundation::math::{GeoPoint, Vec2, stable_total_cmp_f64};
use runtime::frame::FrameTick;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::canvas::{CanvasSurface, DrawCommand};
use crate::config::LayerConfig;
use crate::layer::{LayerId, MapLayer};

/// Glyph advance as a fraction of the font size.
const CHAR_WIDTH_RATIO: f64 = 0.6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelOptions {
    pub font_size: f64,
    /// Point of the text box placed at the label position, each axis in `[0, 1]`.
    pub anchor: [f64; 2],
    /// Pixel offset applied after projection.
    pub offset: Vec2,
    pub show_background: bool,
    /// `[top, right, bottom, left]`.
    pub background_padding: [f64; 4],
    pub background_outline_width: f64,
    pub font_outline_width: f64,
}

impl Default for LabelOptions {
    fn default() -> Self {
        Self {
            font_size: 10.0,
            anchor: [0.0, 0.0],
            offset: Vec2::ZERO,
            show_background: false,
            background_padding: [0.0; 4],
            background_outline_width: 0.0,
            font_outline_width: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CullableTextLabel {
    pub text: String,
    pub priority: f64,
    pub location: GeoPoint,
    /// Immune to culling.
    pub always_show: bool,
    pub options: LabelOptions,
}

impl CullableTextLabel {
    pub fn new(text: impl Into<String>, priority: f64, location: GeoPoint, always_show: bool) -> Self {
        Self {
            text: text.into(),
            priority,
            location,
            always_show,
            options: LabelOptions::default(),
        }
    }

    pub fn with_options(mut self, options: LabelOptions) -> Self {
        self.options = options;
        self
    }

    pub fn position(&self, camera: &MapCamera) -> Vec2 {
        camera.project(&self.location) + self.options.offset
    }

    /// Estimated `[width, height]` of the bare text.
    pub fn text_size(&self) -> [f64; 2] {
        let count = self.text.chars().count() as f64;
        [CHAR_WIDTH_RATIO * self.options.font_size * count, self.options.font_size]
    }

    /// Text box placed at `position`, widened by the background when shown.
    pub fn bounds_at(&self, position: Vec2) -> Aabb2 {
        let [width, height] = self.text_size();
        let [ax, ay] = self.options.anchor;
        let text = Aabb2::from_origin_size(position.x - ax * width, position.y - ay * height, width, height);
        if !self.options.show_background {
            return text;
        }
        let outline = self.options.background_outline_width;
        let [top, right, bottom, left] = self.options.background_padding;
        text.padded([top + outline, right + outline, bottom + outline, left + outline])
    }

    pub fn bounds(&self, camera: &MapCamera) -> Aabb2 {
        self.bounds_at(self.position(camera))
    }

    pub fn draw(&self, surface: &mut CanvasSurface, camera: &MapCamera) {
        let position = self.position(camera);
        let [width, height] = self.text_size();
        let [ax, ay] = self.options.anchor;
        surface.draw(DrawCommand::Text {
            text: self.text.clone(),
            position: Vec2::new(position.x - ax * width, position.y - ay * height),
            font_size: self.options.font_size,
            background: self.options.show_background,
        });
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LabelId(pub u64);

/// A label reduced to what culling needs.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LabelCandidate {
    pub id: LabelId,
    pub priority: f64,
    pub always_show: bool,
    pub bounds: Aabb2,
}

/// Always-show labels first, then descending priority; ties keep input order.
/// Always-show labels are accepted without claiming space; every other label
/// is accepted unless it overlaps a previously accepted one.
pub fn cull_labels(candidates: &[LabelCandidate]) -> Vec<LabelId> {
    let mut order: Vec<&LabelCandidate> = candidates.iter().collect();
    order.sort_by(|a, b| {
        b.always_show
            .cmp(&a.always_show)
            .then_with(|| stable_total_cmp_f64(b.priority, a.priority))
    });

    let mut occupied: Vec<Aabb2> = Vec::new();
    let mut visible = Vec::with_capacity(order.len());
    for label in order {
        if label.always_show {
            visible.push(label.id);
            continue;
        }
        if occupied.iter().any(|other| label.bounds.intersects(other)) {
            continue;
        }
        occupied.push(label.bounds);
        visible.push(label.id);
    }
    visible
}

pub type SharedLabelManager = Rc<RefCell<LabelManager>>;

/// Owns registered labels and the currently visible subset.
#[derive(Debug)]
pub struct LabelManager {
    culling_enabled: bool,
    labels: BTreeMap<LabelId, CullableTextLabel>,
    next_id: u64,
    visible: Vec<LabelId>,
    need_update: bool,
    last_scale_factor: f64,
    last_rotation: f64,
    scale_threshold: f64,
    rotation_threshold: f64,
}

impl Default for LabelManager {
    fn default() -> Self {
        Self::new(true)
    }
}

impl LabelManager {
    pub fn new(culling_enabled: bool) -> Self {
        Self::with_config(culling_enabled, &LayerConfig::default())
    }

    pub fn with_config(culling_enabled: bool, config: &LayerConfig) -> Self {
        Self {
            culling_enabled,
            labels: BTreeMap::new(),
            next_id: 1,
            visible: Vec::new(),
            need_update: false,
            last_scale_factor: 1.0,
            last_rotation: 0.0,
            scale_threshold: config.label_scale_ratio,
            rotation_threshold: config.label_rotation_threshold_rad,
        }
    }

    pub fn shared(self) -> SharedLabelManager {
        Rc::new(RefCell::new(self))
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn get(&self, id: LabelId) -> Option<&CullableTextLabel> {
        self.labels.get(&id)
    }

    pub fn is_culling_enabled(&self) -> bool {
        self.culling_enabled
    }

    /// Takes effect on the next `update`.
    pub fn register(&mut self, label: CullableTextLabel) -> LabelId {
        let id = LabelId(self.next_id);
        self.next_id += 1;
        self.labels.insert(id, label);
        self.need_update = true;
        id
    }

    pub fn deregister(&mut self, id: LabelId) -> bool {
        let removed = self.labels.remove(&id).is_some();
        self.need_update |= removed;
        removed
    }

    pub fn set_culling_enabled(&mut self, enabled: bool) {
        self.culling_enabled = enabled;
        self.need_update = true;
    }

    /// Recompute the visible set unless nothing changed and the camera only
    /// drifted slightly. Returns whether a recompute happened.
    pub fn update(&mut self, camera: &MapCamera) -> bool {
        if !self.need_update && self.within_thresholds(camera.scale_factor(), camera.rotation()) {
            return false;
        }

        self.visible = if self.culling_enabled {
            let candidates: Vec<LabelCandidate> = self
                .labels
                .iter()
                .map(|(id, label)| LabelCandidate {
                    id: *id,
                    priority: label.priority,
                    always_show: label.always_show,
                    bounds: label.bounds(camera),
                })
                .collect();
            cull_labels(&candidates)
        } else {
            self.labels.keys().copied().collect()
        };
        debug!(
            registered = self.labels.len(),
            visible = self.visible.len(),
            "label visibility recomputed"
        );

        self.last_scale_factor = camera.scale_factor();
        self.last_rotation = camera.rotation();
        self.need_update = false;
        true
    }

    fn within_thresholds(&self, scale_factor: f64, rotation: f64) -> bool {
        let ratio = scale_factor / self.last_scale_factor;
        if !(ratio < self.scale_threshold && ratio > 1.0 / self.scale_threshold) {
            return false;
        }
        let delta = (rotation - self.last_rotation).rem_euclid(TAU);
        delta.min(TAU - delta) < self.rotation_threshold
    }

    /// Ids of the visible labels, in acceptance order.
    pub fn visible_labels(&self) -> &[LabelId] {
        &self.visible
    }

    /// Visible labels still registered; deregistration between updates hides them at once.
    pub fn visible(&self) -> impl Iterator<Item = (LabelId, &CullableTextLabel)> {
        self.visible
            .iter()
            .filter_map(|id| self.labels.get(id).map(|label| (*id, label)))
    }

    pub fn draw(&self, surface: &mut CanvasSurface, camera: &MapCamera) {
        for (_, label) in self.visible() {
            label.draw(surface, camera);
        }
    }
}

/// Recomputes label visibility each frame and draws the visible labels.
#[derive(Debug)]
pub struct TextLayer {
    id: LayerId,
    manager: SharedLabelManager,
    surface: CanvasSurface,
}

impl TextLayer {
    pub fn new(id: LayerId, manager: SharedLabelManager) -> Self {
        Self {
            id,
            manager,
            surface: CanvasSurface::default(),
        }
    }

    pub fn manager(&self) -> &SharedLabelManager {
        &self.manager
    }

    pub fn surface(&self) -> &CanvasSurface {
        &self.surface
    }
}

impl MapLayer for TextLayer {
    fn id(&self) -> LayerId {
        self.id
    }

    fn on_attached(&mut self, camera: &MapCamera) {
        let size = camera.projected_size();
        self.surface.resize(size.x, size.y);
    }

    fn on_map_projection_changed(&mut self, camera: &MapCamera, flags: ChangeFlags) {
        if flags.contains(ChangeFlags::PROJECTED_SIZE) {
            let size = camera.projected_size();
            self.surface.resize(size.x, size.y);
        }
    }

    fn on_updated(&mut self, camera: &MapCamera, _tick: FrameTick) {
        let mut manager = self.manager.borrow_mut();
        manager.update(camera);
        self.surface.clear();
        manager.draw(&mut self.surface, camera);
    }
}
