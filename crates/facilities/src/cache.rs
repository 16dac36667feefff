use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::error::{CacheError, LookupError};
use crate::source::FacilitySource;
use crate::waypoint::{Waypoint, WaypointId};

#[derive(Debug, Clone)]
struct CacheEntry {
    waypoint: Waypoint,
    last_used_tick: u64,
}

/// Bounded waypoint cache shared by the layers of one map view.
///
/// Eviction is LRU by access tick with a tie-break by id, so traversal and
/// eviction order are deterministic.
#[derive(Debug)]
pub struct FacilityWaypointCache {
    capacity: usize,
    tick: u64,
    entries: BTreeMap<WaypointId, CacheEntry>,
}

pub type SharedWaypointCache = Rc<RefCell<FacilityWaypointCache>>;

impl FacilityWaypointCache {
    pub fn new(capacity: usize) -> Result<Self, CacheError> {
        if capacity == 0 {
            return Err(CacheError::ZeroCapacity);
        }
        Ok(Self {
            capacity,
            tick: 0,
            entries: BTreeMap::new(),
        })
    }

    pub fn shared(capacity: usize) -> Result<SharedWaypointCache, CacheError> {
        Ok(Rc::new(RefCell::new(Self::new(capacity)?)))
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: &WaypointId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn get(&mut self, id: &WaypointId) -> Option<Waypoint> {
        self.tick += 1;
        let entry = self.entries.get_mut(id)?;
        entry.last_used_tick = self.tick;
        Some(entry.waypoint.clone())
    }

    /// Insert or refresh; returns ids evicted to stay within capacity.
    pub fn insert(&mut self, waypoint: Waypoint) -> Vec<WaypointId> {
        self.tick += 1;
        let id = waypoint.id.clone();
        self.entries.insert(
            id.clone(),
            CacheEntry {
                waypoint,
                last_used_tick: self.tick,
            },
        );

        let mut evicted = Vec::new();
        while self.entries.len() > self.capacity {
            let oldest = self
                .entries
                .iter()
                .filter(|(k, _)| **k != id)
                .min_by(|(ka, ea), (kb, eb)| {
                    ea.last_used_tick
                        .cmp(&eb.last_used_tick)
                        .then_with(|| ka.cmp(kb))
                })
                .map(|(k, _)| k.clone());
            let Some(key) = oldest else {
                break;
            };
            self.entries.remove(&key);
            evicted.push(key);
        }
        evicted
    }

    /// Cached waypoint, or fetch from `source` and cache it.
    pub fn get_or_fetch(
        &mut self,
        id: &WaypointId,
        source: &dyn FacilitySource,
    ) -> Result<Waypoint, LookupError> {
        if let Some(w) = self.get(id) {
            return Ok(w);
        }
        let waypoint = source.fetch(id)?;
        self.insert(waypoint.clone());
        Ok(waypoint)
    }
}
