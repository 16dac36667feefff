//! Facility lookup and nearest-search collaborators.

use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use foundation::math::{GeoPoint, stable_total_cmp_f64};

use crate::error::LookupError;
use crate::waypoint::{Waypoint, WaypointId, WaypointKind};

/// Resolves a waypoint id to its facility data.
pub trait FacilitySource {
    fn fetch(&self, id: &WaypointId) -> Result<Waypoint, LookupError>;
}

/// Ids that entered and left the result set since the previous search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NearestDiff {
    pub added: Vec<WaypointId>,
    pub removed: Vec<WaypointId>,
}

impl NearestDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Stateful nearest-facility search; each call diffs against the previous
/// result for the same kind.
pub trait NearestSearch {
    fn search(
        &mut self,
        kind: WaypointKind,
        center: &GeoPoint,
        radius_rad: f64,
        max_items: usize,
    ) -> NearestDiff;
}

/// Facility table held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryFacilityStore {
    waypoints: BTreeMap<WaypointId, Waypoint>,
}

impl InMemoryFacilityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_waypoints(waypoints: impl IntoIterator<Item = Waypoint>) -> Self {
        let mut store = Self::new();
        for w in waypoints {
            store.insert(w);
        }
        store
    }

    pub fn insert(&mut self, waypoint: Waypoint) {
        self.waypoints.insert(waypoint.id.clone(), waypoint);
    }

    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    /// Up to `max_items` waypoints of `kind` within `radius_rad`, nearest first.
    pub fn nearest(
        &self,
        kind: WaypointKind,
        center: &GeoPoint,
        radius_rad: f64,
        max_items: usize,
    ) -> Vec<&Waypoint> {
        let mut hits: Vec<(f64, &Waypoint)> = self
            .waypoints
            .values()
            .filter(|w| w.kind == kind)
            .map(|w| (w.location.distance(center), w))
            .filter(|(d, _)| *d <= radius_rad)
            .collect();
        hits.sort_by(|a, b| stable_total_cmp_f64(a.0, b.0).then_with(|| a.1.id.cmp(&b.1.id)));
        hits.into_iter().take(max_items).map(|(_, w)| w).collect()
    }
}

impl FacilitySource for InMemoryFacilityStore {
    fn fetch(&self, id: &WaypointId) -> Result<Waypoint, LookupError> {
        self.waypoints
            .get(id)
            .cloned()
            .ok_or_else(|| LookupError::NotFound { id: id.clone() })
    }
}

/// Nearest-search session over a shared in-memory store.
#[derive(Debug)]
pub struct InMemoryNearestSearch {
    store: Rc<InMemoryFacilityStore>,
    previous: BTreeMap<WaypointKind, BTreeSet<WaypointId>>,
}

impl InMemoryNearestSearch {
    pub fn new(store: Rc<InMemoryFacilityStore>) -> Self {
        Self {
            store,
            previous: BTreeMap::new(),
        }
    }
}

impl NearestSearch for InMemoryNearestSearch {
    fn search(
        &mut self,
        kind: WaypointKind,
        center: &GeoPoint,
        radius_rad: f64,
        max_items: usize,
    ) -> NearestDiff {
        let current: BTreeSet<WaypointId> = self
            .store
            .nearest(kind, center, radius_rad, max_items)
            .into_iter()
            .map(|w| w.id.clone())
            .collect();
        let previous = self.previous.entry(kind).or_default();
        let diff = NearestDiff {
            added: current.difference(previous).cloned().collect(),
            removed: previous.difference(&current).cloned().collect(),
        };
        *previous = current;
        diff
    }
}

#[cfg(test)]
mod tests {
    use super::{FacilitySource, InMemoryFacilityStore, InMemoryNearestSearch, NearestSearch};
    use crate::error::LookupError;
    use crate::waypoint::{Waypoint, WaypointId, WaypointKind};
    use foundation::math::GeoPoint;
    use pretty_assertions::assert_eq;
    use std::rc::Rc;

    fn store() -> InMemoryFacilityStore {
        InMemoryFacilityStore::from_waypoints([
            Waypoint::new("A KSEA", "KSEA", WaypointKind::Airport, GeoPoint::new(47.45, -122.31)),
            Waypoint::new("A KBFI", "KBFI", WaypointKind::Airport, GeoPoint::new(47.53, -122.30)),
            Waypoint::new("A KPDX", "KPDX", WaypointKind::Airport, GeoPoint::new(45.59, -122.60)),
            Waypoint::new("V SEA", "SEA", WaypointKind::Vor, GeoPoint::new(47.43, -122.31)),
        ])
    }

    #[test]
    fn fetch_unknown_id_is_not_found() {
        let err = store().fetch(&WaypointId::new("A KXXX")).unwrap_err();
        assert_eq!(err, LookupError::NotFound { id: WaypointId::new("A KXXX") });
    }

    #[test]
    fn nearest_filters_kind_radius_and_count() {
        let s = store();
        let center = GeoPoint::new(47.5, -122.3);
        let hits = s.nearest(WaypointKind::Airport, &center, 0.01, 10);
        let ids: Vec<_> = hits.iter().map(|w| w.ident.as_str()).collect();
        assert_eq!(ids, vec!["KBFI", "KSEA"]);
        assert_eq!(s.nearest(WaypointKind::Airport, &center, 0.01, 1).len(), 1);
    }

    #[test]
    fn search_reports_diff_against_previous_results() {
        let mut search = InMemoryNearestSearch::new(Rc::new(store()));
        let seattle = GeoPoint::new(47.5, -122.3);
        let first = search.search(WaypointKind::Airport, &seattle, 0.01, 10);
        assert_eq!(first.added, vec![WaypointId::new("A KBFI"), WaypointId::new("A KSEA")]);
        assert!(first.removed.is_empty());

        assert!(search.search(WaypointKind::Airport, &seattle, 0.01, 10).is_empty());

        let portland = GeoPoint::new(45.6, -122.6);
        let moved = search.search(WaypointKind::Airport, &portland, 0.01, 10);
        assert_eq!(moved.added, vec![WaypointId::new("A KPDX")]);
        assert_eq!(moved.removed.len(), 2);
    }
}
