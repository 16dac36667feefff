use std::cell::Cell;
use std::rc::Rc;

use camera::{CameraParams, MapCamera};
use facilities::{
    FacilityWaypointCache, InMemoryFacilityStore, InMemoryNearestSearch, Waypoint, WaypointId, WaypointKind,
};
use foundation::math::GeoPoint;
use layers::icons::{IdentLabelFactory, KindIconFactory};
use layers::{
    CachedCanvasInstance, CachedDrawingLayer, CanvasPainter, CanvasSurface, DrawCommand, LabelManager,
    LabelOptions, LayerConfig, LayerId, MapView, NearestWaypointsLayer, PaintProgress, RoleDefinition, RoleId,
    SharedLabelManager, SharedSurface, SharedWaypointRenderer, TextLayer, WaypointLayer, WaypointRenderer,
};
use pretty_assertions::assert_eq;
use runtime::budget::FrameBudget;

const NEAREST: RoleId = RoleId(1);

#[derive(Debug, Default)]
struct FlagPainter {
    begun: Rc<Cell<u32>>,
}

impl CanvasPainter for FlagPainter {
    fn begin(&mut self, _canvas: &CachedCanvasInstance) {
        self.begun.set(self.begun.get() + 1);
    }

    fn paint(&mut self, canvas: &mut CachedCanvasInstance, budget: &mut FrameBudget) -> PaintProgress {
        if !budget.try_consume(1) {
            return PaintProgress::Paused;
        }
        let location = GeoPoint::new(47.5, -122.3);
        let at = canvas.project(&location);
        canvas.surface_mut().draw(DrawCommand::Text {
            text: "X".into(),
            position: at,
            font_size: 10.0,
            background: false,
        });
        PaintProgress::Finished
    }
}

struct Harness {
    view: MapView,
    renderer: SharedWaypointRenderer,
    labels: SharedLabelManager,
    icons: SharedSurface,
    begun: Rc<Cell<u32>>,
    time_ms: f64,
}

impl Harness {
    fn new() -> Self {
        let mut camera = MapCamera::new(800.0, 600.0);
        camera
            .set(&CameraParams::new().with_target(GeoPoint::new(47.5, -122.3)).with_range(0.01))
            .unwrap();
        let config = LayerConfig::default();

        let store = Rc::new(InMemoryFacilityStore::from_waypoints([
            Waypoint::new("A KSEA", "KSEA", WaypointKind::Airport, GeoPoint::new(47.45, -122.31)),
            Waypoint::new("A KBFI", "KBFI", WaypointKind::Airport, GeoPoint::new(47.53, -122.30)),
            Waypoint::new("A KPDX", "KPDX", WaypointKind::Airport, GeoPoint::new(45.59, -122.60)),
            Waypoint::new("V SEA", "SEA", WaypointKind::Vor, GeoPoint::new(47.43, -122.31)),
        ]));

        let labels = LabelManager::with_config(true, &config).shared();
        let icons = CanvasSurface::shared(800.0, 600.0);
        let mut renderer = WaypointRenderer::new(labels.clone());
        renderer
            .add_render_role(
                NEAREST,
                RoleDefinition::new()
                    .with_icon_factory(
                        KindIconFactory::new()
                            .with_style(WaypointKind::Airport, "airport", 2.0, 16.0)
                            .with_style(WaypointKind::Vor, "vor", 1.0, 16.0),
                    )
                    .with_label_factory(IdentLabelFactory::new(LabelOptions::default()))
                    .with_surface(icons.clone()),
            )
            .unwrap();
        let renderer = renderer.shared();

        let begun = Rc::new(Cell::new(0));
        let mut view = MapView::new(camera);
        view.attach_layer(Box::new(CachedDrawingLayer::new(
            LayerId(1),
            &config,
            FlagPainter { begun: begun.clone() },
        )));
        view.attach_layer(Box::new(NearestWaypointsLayer::new(
            LayerId(2),
            &config,
            renderer.clone(),
            NEAREST,
            InMemoryNearestSearch::new(store.clone()),
            store,
            FacilityWaypointCache::shared(config.waypoint_cache_capacity).unwrap(),
        )));
        view.attach_layer(Box::new(WaypointLayer::new(LayerId(3), renderer.clone(), icons.clone())));
        view.attach_layer(Box::new(TextLayer::new(LayerId(4), labels.clone())));

        Self {
            view,
            renderer,
            labels,
            icons,
            begun,
            time_ms: 0.0,
        }
    }

    fn run(&mut self, frames: usize) {
        for _ in 0..frames {
            self.view.tick(self.time_ms);
            self.time_ms += 100.0;
        }
    }

    fn registered(&self, id: &str) -> bool {
        self.renderer.borrow().is_registered(&WaypointId::new(id), Some(NEAREST.into()))
    }
}

#[test]
fn nearby_facilities_reach_icons_and_labels() {
    let mut h = Harness::new();
    assert_eq!(h.view.layer_ids(), vec![LayerId(1), LayerId(2), LayerId(3), LayerId(4)]);

    h.run(8);
    assert!(h.registered("A KSEA"));
    assert!(h.registered("A KBFI"));
    assert!(h.registered("V SEA"));
    assert!(!h.registered("A KPDX"));

    assert_eq!(h.labels.borrow().len(), 3);
    assert!(!h.labels.borrow().visible_labels().is_empty());
    let icon_count = h
        .icons
        .borrow()
        .commands()
        .iter()
        .filter(|c| matches!(c, DrawCommand::Icon { .. }))
        .count();
    assert_eq!(icon_count, 3);
    assert!(h.begun.get() >= 1);
}

#[test]
fn queued_move_replaces_facilities_and_repaints_cache() {
    let mut h = Harness::new();
    h.run(10);
    let paints_before = h.begun.get();

    h.view
        .queue_camera(&CameraParams::new().with_target(GeoPoint::new(45.6, -122.6)))
        .unwrap();
    h.run(12);

    assert!(h.registered("A KPDX"));
    assert!(!h.registered("A KSEA"));
    assert!(!h.registered("V SEA"));
    assert_eq!(h.labels.borrow().len(), 1);
    assert!(h.begun.get() > paints_before);
}
