//! Waypoint icons and the factories that build icons and labels per role.

use std::collections::BTreeMap;
use std::fmt;

use camera::MapCamera;
use facilities::{Waypoint, WaypointKind};
use foundation::math::{GeoPoint, Vec2};

use crate::canvas::{CanvasSurface, DrawCommand};
use crate::labels::{CullableTextLabel, LabelOptions};
use crate::waypoints::RoleId;

/// Something drawn at a waypoint's projected location.
pub trait WaypointIcon: fmt::Debug {
    /// Icons are drawn in ascending priority order.
    fn priority(&self) -> f64;

    fn draw(&self, surface: &mut CanvasSurface, camera: &MapCamera);
}

/// Occupies a priority slot but draws nothing.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct BlankIcon {
    pub priority: f64,
}

impl WaypointIcon for BlankIcon {
    fn priority(&self) -> f64 {
        self.priority
    }

    fn draw(&self, _surface: &mut CanvasSurface, _camera: &MapCamera) {}
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageIcon {
    location: GeoPoint,
    image: String,
    priority: f64,
    size: Vec2,
    /// Top-left of the image relative to the projected location.
    total_offset: Vec2,
}

impl ImageIcon {
    /// Centered on the location.
    pub fn new(location: GeoPoint, image: impl Into<String>, priority: f64, size: Vec2) -> Self {
        Self::with_anchor(location, image, priority, size, [0.5, 0.5], Vec2::ZERO)
    }

    pub fn with_anchor(
        location: GeoPoint,
        image: impl Into<String>,
        priority: f64,
        size: Vec2,
        anchor: [f64; 2],
        offset: Vec2,
    ) -> Self {
        Self {
            location,
            image: image.into(),
            priority,
            size,
            total_offset: Vec2::new(offset.x - anchor[0] * size.x, offset.y - anchor[1] * size.y),
        }
    }

    pub fn image(&self) -> &str {
        &self.image
    }
}

impl WaypointIcon for ImageIcon {
    fn priority(&self) -> f64 {
        self.priority
    }

    fn draw(&self, surface: &mut CanvasSurface, camera: &MapCamera) {
        let projected = camera.project(&self.location);
        surface.draw(DrawCommand::Icon {
            image: self.image.clone(),
            position: projected + self.total_offset,
            size: self.size,
        });
    }
}

pub trait IconFactory {
    fn icon(&self, role: RoleId, waypoint: &Waypoint) -> Option<Box<dyn WaypointIcon>>;
}

pub trait LabelFactory {
    fn label(&self, role: RoleId, waypoint: &Waypoint) -> Option<CullableTextLabel>;
}

impl<F> IconFactory for F
where
    F: Fn(RoleId, &Waypoint) -> Option<Box<dyn WaypointIcon>>,
{
    fn icon(&self, role: RoleId, waypoint: &Waypoint) -> Option<Box<dyn WaypointIcon>> {
        self(role, waypoint)
    }
}

impl<F> LabelFactory for F
where
    F: Fn(RoleId, &Waypoint) -> Option<CullableTextLabel>,
{
    fn label(&self, role: RoleId, waypoint: &Waypoint) -> Option<CullableTextLabel> {
        self(role, waypoint)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IconStyle {
    pub image: String,
    pub priority: f64,
    pub size: Vec2,
}

/// Image icons keyed by facility kind; kinds without a style get no icon.
#[derive(Debug, Clone, Default)]
pub struct KindIconFactory {
    styles: BTreeMap<WaypointKind, IconStyle>,
}

impl KindIconFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_style(mut self, kind: WaypointKind, image: impl Into<String>, priority: f64, size: f64) -> Self {
        self.styles.insert(
            kind,
            IconStyle {
                image: image.into(),
                priority,
                size: Vec2::new(size, size),
            },
        );
        self
    }
}

impl IconFactory for KindIconFactory {
    fn icon(&self, _role: RoleId, waypoint: &Waypoint) -> Option<Box<dyn WaypointIcon>> {
        let style = self.styles.get(&waypoint.kind)?;
        Some(Box::new(ImageIcon::new(
            waypoint.location,
            style.image.clone(),
            style.priority,
            style.size,
        )))
    }
}

/// Ident labels whose priority follows the facility kind.
#[derive(Debug, Clone, Default)]
pub struct IdentLabelFactory {
    priorities: BTreeMap<WaypointKind, f64>,
    options: LabelOptions,
}

impl IdentLabelFactory {
    pub fn new(options: LabelOptions) -> Self {
        Self {
            priorities: BTreeMap::new(),
            options,
        }
    }

    pub fn with_priority(mut self, kind: WaypointKind, priority: f64) -> Self {
        self.priorities.insert(kind, priority);
        self
    }
}

impl LabelFactory for IdentLabelFactory {
    fn label(&self, _role: RoleId, waypoint: &Waypoint) -> Option<CullableTextLabel> {
        let priority = self.priorities.get(&waypoint.kind).copied().unwrap_or(0.0);
        Some(
            CullableTextLabel::new(waypoint.ident.clone(), priority, waypoint.location, false)
                .with_options(self.options.clone()),
        )
    }
}
