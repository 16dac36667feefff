//! Simulated flight along a route, driven through the map frame loop.

use std::rc::Rc;

use camera::{CameraParams, MapCamera};
use facilities::{FacilityWaypointCache, InMemoryFacilityStore, InMemoryNearestSearch, WaypointKind};
use foundation::math::GeoPoint;
use layers::icons::{IdentLabelFactory, KindIconFactory};
use layers::{
    CachedDrawingLayer, CanvasSurface, GeoPath, GeoPathPainter, LabelManager, LabelOptions, LayerId, MapView,
    NearestWaypointsLayer, RoleDefinition, RoleId, TextLayer, WaypointLayer, WaypointRenderer,
};
use serde::Serialize;
use tracing::{debug, info};

use crate::config::MapConfig;

const NM_PER_RADIAN: f64 = 3440.065;
const NEAREST_ROLE: RoleId = RoleId(1);
const ROUTE_COLOR: [f32; 4] = [1.0, 0.0, 1.0, 1.0];
const ROUTE_STROKE_WIDTH: f64 = 2.0;

/// Walks a polyline of great-circle legs.
#[derive(Debug, Clone)]
pub struct RouteFollower {
    route: Vec<GeoPoint>,
    leg: usize,
    position: GeoPoint,
    track: f64,
}

impl RouteFollower {
    /// `None` for an empty route.
    pub fn new(route: Vec<GeoPoint>) -> Option<Self> {
        let position = *route.first()?;
        let track = route.get(1).map_or(0.0, |next| position.bearing_to(next));
        Some(Self {
            route,
            leg: 0,
            position,
            track,
        })
    }

    pub fn position(&self) -> GeoPoint {
        self.position
    }

    /// True track in degrees; holds the last leg's track once finished.
    pub fn track(&self) -> f64 {
        self.track
    }

    pub fn is_finished(&self) -> bool {
        self.leg + 1 >= self.route.len()
    }

    /// Move `distance_rad` along the route. Returns the distance actually covered.
    pub fn advance(&mut self, mut distance_rad: f64) -> f64 {
        let mut covered = 0.0;
        while let Some(next) = self.route.get(self.leg + 1).copied() {
            let remaining = self.position.distance(&next);
            self.track = self.position.bearing_to(&next);
            if distance_rad < remaining {
                self.position = self.position.offset(self.track, distance_rad);
                return covered + distance_rad;
            }
            covered += remaining;
            distance_rad -= remaining;
            self.position = next;
            self.leg += 1;
        }
        covered
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlightReport {
    pub frames: u64,
    pub distance_nm: f64,
    pub final_position: GeoPoint,
    pub registered_waypoints: usize,
    pub registered_labels: usize,
    pub visible_labels: usize,
    pub drawn_icons: usize,
}

/// Fly `config.route` through a map with a route path layer, nearest facility
/// layer, waypoint icons and culled labels.
pub fn simulate(config: &MapConfig) -> Result<FlightReport, String> {
    config.validate()?;
    let [width, height] = config.window;
    let layer_config = &config.layers;

    let mut camera = MapCamera::with_projection(config.projection, width, height);
    camera.set(&config.camera).map_err(|e| format!("camera: {e}"))?;
    let mut follower = RouteFollower::new(config.route.clone());
    if let Some(f) = &follower {
        camera
            .set(&CameraParams::new().with_target(f.position()))
            .map_err(|e| format!("camera: {e}"))?;
    }

    let store = Rc::new(InMemoryFacilityStore::from_waypoints(config.facilities.iter().cloned()));
    let cache = FacilityWaypointCache::shared(layer_config.waypoint_cache_capacity).map_err(|e| e.to_string())?;
    let labels = LabelManager::with_config(true, layer_config).shared();
    let icons = CanvasSurface::shared(width, height);

    let mut renderer = WaypointRenderer::new(labels.clone());
    renderer
        .add_render_role(
            NEAREST_ROLE,
            RoleDefinition::new()
                .with_icon_factory(
                    KindIconFactory::new()
                        .with_style(WaypointKind::Airport, "airport", 4.0, 20.0)
                        .with_style(WaypointKind::Vor, "vor", 3.0, 16.0)
                        .with_style(WaypointKind::Ndb, "ndb", 2.0, 16.0)
                        .with_style(WaypointKind::Intersection, "intersection", 1.0, 12.0),
                )
                .with_label_factory(
                    IdentLabelFactory::new(LabelOptions::default())
                        .with_priority(WaypointKind::Airport, 4.0)
                        .with_priority(WaypointKind::Vor, 3.0)
                        .with_priority(WaypointKind::Ndb, 2.0)
                        .with_priority(WaypointKind::Intersection, 1.0),
                )
                .with_surface(icons.clone()),
        )
        .map_err(|e| e.to_string())?;
    let renderer = renderer.shared();

    let mut view = MapView::new(camera);
    let route_path = GeoPath::new(config.route.clone(), ROUTE_STROKE_WIDTH, ROUTE_COLOR);
    view.attach_layer(Box::new(CachedDrawingLayer::new(
        LayerId(1),
        layer_config,
        GeoPathPainter::new(vec![route_path]),
    )));
    view.attach_layer(Box::new(NearestWaypointsLayer::new(
        LayerId(2),
        layer_config,
        renderer.clone(),
        NEAREST_ROLE,
        InMemoryNearestSearch::new(store.clone()),
        store,
        cache,
    )));
    view.attach_layer(Box::new(WaypointLayer::new(LayerId(3), renderer.clone(), icons.clone())));
    view.attach_layer(Box::new(TextLayer::new(LayerId(4), labels.clone())));

    let flight = &config.flight;
    let step_rad = flight.ground_speed_kt / NM_PER_RADIAN * flight.frame_ms / 3_600_000.0;
    let mut distance_rad = 0.0;
    let mut frames = 0;
    while frames < flight.max_frames {
        if let Some(f) = follower.as_mut() {
            distance_rad += f.advance(step_rad);
            let mut params = CameraParams::new().with_target(f.position());
            if flight.track_up {
                params = params.with_rotation(-f.track().to_radians());
            }
            view.queue_camera(&params).map_err(|e| format!("camera: {e}"))?;
        }
        let tick = view.tick(frames as f64 * flight.frame_ms);
        frames += 1;
        debug!(
            frame = tick.index,
            waypoints = renderer.borrow().len(),
            labels = labels.borrow().visible_labels().len(),
            "flight frame"
        );
        if follower.as_ref().is_some_and(RouteFollower::is_finished) {
            break;
        }
    }

    let final_position = view.camera().target();
    let drawn_icons = icons
        .borrow()
        .commands()
        .iter()
        .filter(|c| matches!(c, layers::DrawCommand::Icon { .. }))
        .count();
    let report = FlightReport {
        frames,
        distance_nm: distance_rad * NM_PER_RADIAN,
        final_position,
        registered_waypoints: renderer.borrow().len(),
        registered_labels: labels.borrow().len(),
        visible_labels: labels.borrow().visible().count(),
        drawn_icons,
    };
    info!(
        frames,
        distance_nm = report.distance_nm,
        waypoints = report.registered_waypoints,
        "flight finished"
    );
    Ok(report)
}
