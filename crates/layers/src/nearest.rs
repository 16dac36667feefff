//! Keeps the facilities around the map registered with a waypoint renderer.
//!
//! One debounced search per facility kind covers the window's half diagonal
//! with some overdraw. Search results are applied on the following tick and
//! added facilities are resolved through the deferred lookup pipeline, so a
//! facility may drop out of interest before its data arrives.

use std::collections::BTreeSet;
use std::f64::consts::SQRT_2;
use std::rc::Rc;

use camera::{ChangeFlags, MapCamera};
use facilities::{
    FacilitySource, LookupPipeline, NearestDiff, NearestSearch, SharedWaypointCache, WaypointId, WaypointKind,
};
use foundation::math::GeoPoint;
use runtime::budget::FrameBudget;
use runtime::debounce::Debounce;
use runtime::frame::FrameTick;
use tracing::{debug, trace};

use crate::config::LayerConfig;
use crate::layer::{LayerId, MapLayer};
use crate::waypoints::{RoleId, RoleSet, SharedWaypointRenderer};

/// Registration source used with the waypoint renderer.
pub const NEAREST_SOURCE_ID: &str = "waypoints-layer";

const SEARCH_RADIUS_OVERDRAW_FACTOR: f64 = SQRT_2;

#[derive(Debug, Copy, Clone, PartialEq)]
struct SearchRequest {
    center: GeoPoint,
    radius: f64,
    max_items: usize,
}

#[derive(Debug)]
struct KindSearch {
    kind: WaypointKind,
    max_items: usize,
    last_center: GeoPoint,
    last_radius: f64,
    refresh: Debounce<SearchRequest>,
}

impl KindSearch {
    fn new(kind: WaypointKind, max_items: usize, delay_ms: f64) -> Self {
        Self {
            kind,
            max_items,
            last_center: GeoPoint::new(0.0, 0.0),
            last_radius: 0.0,
            refresh: Debounce::new(delay_ms),
        }
    }

    fn schedule(&mut self, center: GeoPoint, radius: f64) {
        self.last_center = center;
        self.last_radius = radius;
        self.refresh.schedule(SearchRequest {
            center,
            radius,
            max_items: self.max_items,
        });
    }
}

pub struct NearestWaypointsLayer<S> {
    id: LayerId,
    role: RoleId,
    renderer: SharedWaypointRenderer,
    search: S,
    facilities: Rc<dyn FacilitySource>,
    lookups: LookupPipeline,
    lookup_budget_units: u32,
    searches: Vec<KindSearch>,
    search_radius: f64,
    search_margin: f64,
    use_target_as_center: bool,
    pending: Vec<NearestDiff>,
    wanted: BTreeSet<WaypointId>,
    shown: BTreeSet<WaypointId>,
}

impl<S> std::fmt::Debug for NearestWaypointsLayer<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NearestWaypointsLayer")
            .field("id", &self.id)
            .field("role", &self.role)
            .field("search_radius", &self.search_radius)
            .field("wanted", &self.wanted.len())
            .field("shown", &self.shown.len())
            .finish_non_exhaustive()
    }
}

impl<S: NearestSearch> NearestWaypointsLayer<S> {
    pub fn new(
        id: LayerId,
        config: &LayerConfig,
        renderer: SharedWaypointRenderer,
        role: RoleId,
        search: S,
        facilities: Rc<dyn FacilitySource>,
        cache: SharedWaypointCache,
    ) -> Self {
        let delay = config.nearest_search_debounce_ms;
        let searches = vec![
            KindSearch::new(WaypointKind::Airport, config.nearest_max_airports, delay),
            KindSearch::new(WaypointKind::Vor, config.nearest_max_vors, delay),
            KindSearch::new(WaypointKind::Ndb, config.nearest_max_ndbs, delay),
            KindSearch::new(WaypointKind::Intersection, config.nearest_max_intersections, delay),
        ];
        Self {
            id,
            role,
            renderer,
            search,
            facilities,
            lookups: LookupPipeline::new(cache),
            lookup_budget_units: config.lookup_budget_units,
            searches,
            search_radius: 0.0,
            search_margin: 0.0,
            use_target_as_center: false,
            pending: Vec::new(),
            wanted: BTreeSet::new(),
            shown: BTreeSet::new(),
        }
    }

    /// Search around the camera target instead of the window center.
    pub fn with_target_as_center(mut self, enabled: bool) -> Self {
        self.use_target_as_center = enabled;
        self
    }

    pub fn search_radius(&self) -> f64 {
        self.search_radius
    }

    pub fn search_margin(&self) -> f64 {
        self.search_margin
    }

    pub fn is_wanted(&self, id: &WaypointId) -> bool {
        self.wanted.contains(id)
    }

    pub fn is_shown(&self, id: &WaypointId) -> bool {
        self.shown.contains(id)
    }

    pub fn pending_lookups(&self) -> usize {
        self.lookups.pending_len()
    }

    fn search_center(&self, camera: &MapCamera) -> GeoPoint {
        if self.use_target_as_center {
            camera.target()
        } else {
            camera.center()
        }
    }

    fn update_search_radius(&mut self, camera: &MapCamera) {
        let half_diag = camera.projected_size().length() * camera.projected_resolution() * 0.5;
        self.search_radius = half_diag * SEARCH_RADIUS_OVERDRAW_FACTOR;
        self.search_margin = half_diag * (SEARCH_RADIUS_OVERDRAW_FACTOR - 1.0);
    }

    fn try_refresh_searches(&mut self, camera: &MapCamera) {
        let center = self.search_center(camera);
        let radius = self.search_radius;
        for search in &mut self.searches {
            if search.last_radius != radius || search.last_center.distance(&center) >= self.search_margin {
                trace!(kind = ?search.kind, radius, "nearest search refresh scheduled");
                search.schedule(center, radius);
            }
        }
    }

    fn apply_diff(&mut self, diff: NearestDiff) {
        for id in diff.added {
            self.lookups.submit(id.clone(), 0);
            self.wanted.insert(id);
        }
        for id in diff.removed {
            self.wanted.remove(&id);
            self.lookups.cancel(&id);
            if self.shown.remove(&id) {
                self.renderer
                    .borrow_mut()
                    .deregister(&id, RoleSet::from(self.role), NEAREST_SOURCE_ID);
            }
        }
    }

    fn resolve_lookups(&mut self) {
        let mut budget = FrameBudget::new(self.lookup_budget_units);
        for outcome in self.lookups.poll(self.facilities.as_ref(), &mut budget) {
            let Ok(waypoint) = outcome.result else {
                continue;
            };
            if !self.wanted.contains(&outcome.id) || self.shown.contains(&outcome.id) {
                continue;
            }
            self.renderer
                .borrow_mut()
                .register(&waypoint, RoleSet::from(self.role), NEAREST_SOURCE_ID);
            self.shown.insert(outcome.id);
        }
    }
}

impl<S: NearestSearch> MapLayer for NearestWaypointsLayer<S> {
    fn id(&self) -> LayerId {
        self.id
    }

    fn on_attached(&mut self, camera: &MapCamera) {
        self.update_search_radius(camera);
        self.try_refresh_searches(camera);
    }

    fn on_map_projection_changed(&mut self, camera: &MapCamera, flags: ChangeFlags) {
        if flags.intersects(ChangeFlags::RANGE | ChangeFlags::RANGE_ENDPOINTS | ChangeFlags::PROJECTED_SIZE) {
            self.update_search_radius(camera);
            self.try_refresh_searches(camera);
        } else if flags.contains(ChangeFlags::CENTER) {
            self.try_refresh_searches(camera);
        }
    }

    fn on_updated(&mut self, _camera: &MapCamera, tick: FrameTick) {
        self.resolve_lookups();
        for diff in std::mem::take(&mut self.pending) {
            self.apply_diff(diff);
        }
        for i in 0..self.searches.len() {
            let Some(request) = self.searches[i].refresh.tick(tick.elapsed_ms) else {
                continue;
            };
            let kind = self.searches[i].kind;
            let diff = self
                .search
                .search(kind, &request.center, request.radius, request.max_items);
            debug!(
                ?kind,
                added = diff.added.len(),
                removed = diff.removed.len(),
                "nearest search completed"
            );
            if !diff.is_empty() {
                self.pending.push(diff);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{NEAREST_SOURCE_ID, NearestWaypointsLayer};
    use crate::config::LayerConfig;
    use crate::labels::LabelManager;
    use crate::layer::{LayerId, MapLayer};
    use crate::waypoints::{RoleDefinition, RoleId, SharedWaypointRenderer, WaypointRenderer};
    use camera::{CameraParams, MapCamera};
    use facilities::{
        FacilityWaypointCache, InMemoryFacilityStore, InMemoryNearestSearch, NearestDiff, Waypoint, WaypointId,
        WaypointKind,
    };
    use foundation::math::GeoPoint;
    use runtime::frame::FrameClock;
    use std::rc::Rc;

    const ROLE: RoleId = RoleId(1);

    fn assert_close(a: f64, b: f64, eps: f64) {
        let diff = (a - b).abs();
        assert!(diff <= eps, "expected {a} ~= {b} (diff {diff})");
    }

    fn store() -> Rc<InMemoryFacilityStore> {
        Rc::new(InMemoryFacilityStore::from_waypoints([
            Waypoint::new("A KSEA", "KSEA", WaypointKind::Airport, GeoPoint::new(47.45, -122.31)),
            Waypoint::new("A KBFI", "KBFI", WaypointKind::Airport, GeoPoint::new(47.53, -122.30)),
            Waypoint::new("A KPDX", "KPDX", WaypointKind::Airport, GeoPoint::new(45.59, -122.60)),
            Waypoint::new("V SEA", "SEA", WaypointKind::Vor, GeoPoint::new(47.43, -122.31)),
        ]))
    }

    fn setup() -> (MapCamera, SharedWaypointRenderer, NearestWaypointsLayer<InMemoryNearestSearch>) {
        let mut camera = MapCamera::new(800.0, 600.0);
        camera
            .set(
                &CameraParams::new()
                    .with_target(GeoPoint::new(47.5, -122.3))
                    .with_range(0.01),
            )
            .unwrap();
        let mut renderer = WaypointRenderer::new(LabelManager::new(true).shared());
        renderer.add_render_role(ROLE, RoleDefinition::new()).unwrap();
        let renderer = renderer.shared();
        let store = store();
        let layer = NearestWaypointsLayer::new(
            LayerId(3),
            &LayerConfig::default(),
            renderer.clone(),
            ROLE,
            InMemoryNearestSearch::new(store.clone()),
            store,
            FacilityWaypointCache::shared(64).unwrap(),
        );
        (camera, renderer, layer)
    }

    fn run(layer: &mut NearestWaypointsLayer<InMemoryNearestSearch>, camera: &MapCamera, clock: &mut FrameClock, t: &mut f64, frames: usize) {
        for _ in 0..frames {
            let tick = clock.tick(*t);
            *t += 100.0;
            layer.on_updated(camera, tick);
        }
    }

    #[test]
    fn radius_covers_half_diagonal_with_overdraw() {
        let (camera, _, mut layer) = setup();
        layer.on_attached(&camera);
        let half_diag = 500.0 * camera.projected_resolution();
        assert_close(layer.search_radius(), half_diag * std::f64::consts::SQRT_2, 1e-12);
        assert_close(layer.search_margin(), half_diag * (std::f64::consts::SQRT_2 - 1.0), 1e-12);
    }

    #[test]
    fn debounced_search_registers_resolved_facilities_on_later_ticks() {
        let (camera, renderer, mut layer) = setup();
        layer.on_attached(&camera);
        let mut clock = FrameClock::default();
        let mut t = 0.0;

        run(&mut layer, &camera, &mut clock, &mut t, 6);
        assert!(renderer.borrow().is_empty());
        run(&mut layer, &camera, &mut clock, &mut t, 1);
        assert!(layer.is_wanted(&WaypointId::new("A KSEA")));
        assert!(renderer.borrow().is_empty());
        run(&mut layer, &camera, &mut clock, &mut t, 1);

        let r = renderer.borrow();
        for id in ["A KSEA", "A KBFI", "V SEA"] {
            assert!(r.is_registered(&WaypointId::new(id), Some(ROLE.into())), "{id}");
        }
        assert!(!r.is_registered(&WaypointId::new("A KPDX"), None));
        assert_eq!(r.entry(&WaypointId::new("A KSEA")).unwrap().source_count(ROLE, NEAREST_SOURCE_ID), 1);
    }

    #[test]
    fn moving_past_margin_swaps_registered_facilities() {
        let (mut camera, renderer, mut layer) = setup();
        layer.on_attached(&camera);
        let mut clock = FrameClock::default();
        let mut t = 0.0;
        run(&mut layer, &camera, &mut clock, &mut t, 8);

        let flags = camera
            .set(&CameraParams::new().with_target(GeoPoint::new(45.6, -122.6)))
            .unwrap();
        layer.on_map_projection_changed(&camera, flags);
        run(&mut layer, &camera, &mut clock, &mut t, 8);

        let r = renderer.borrow();
        assert!(r.is_registered(&WaypointId::new("A KPDX"), None));
        assert!(!r.is_registered(&WaypointId::new("A KSEA"), None));
        assert!(!r.is_registered(&WaypointId::new("V SEA"), None));
    }

    #[test]
    fn small_pan_does_not_refresh() {
        let (mut camera, _, mut layer) = setup();
        layer.on_attached(&camera);
        let mut clock = FrameClock::default();
        let mut t = 0.0;
        run(&mut layer, &camera, &mut clock, &mut t, 8);

        let nudged = camera.invert(foundation::math::Vec2::new(410.0, 300.0));
        let flags = camera.set(&CameraParams::new().with_target(nudged)).unwrap();
        layer.on_map_projection_changed(&camera, flags);
        assert!(layer.searches.iter().all(|s| !s.refresh.is_pending()));
    }

    #[test]
    fn removal_before_lookup_resolves_is_honored() {
        let (camera, renderer, mut layer) = setup();
        let mut clock = FrameClock::default();
        let ksea = WaypointId::new("A KSEA");
        layer.apply_diff(NearestDiff {
            added: vec![ksea.clone(), WaypointId::new("A MISSING")],
            removed: vec![],
        });
        layer.apply_diff(NearestDiff {
            added: vec![],
            removed: vec![ksea.clone()],
        });
        assert_eq!(layer.pending_lookups(), 1);

        layer.on_updated(&camera, clock.tick(0.0));
        assert!(!layer.is_wanted(&ksea));
        assert!(renderer.borrow().is_empty());
        assert_eq!(layer.pending_lookups(), 0);
        assert!(!layer.is_shown(&WaypointId::new("A MISSING")));
    }
}
