//! Deferred facility lookups.
//!
//! Ids are submitted during one tick and resolved on a later tick, a bounded
//! number per tick. Callers must re-check that a result is still wanted
//! before acting on it.

use std::collections::BTreeSet;

use runtime::budget::FrameBudget;
use runtime::work_queue::WorkQueue;
use tracing::debug;

use crate::cache::SharedWaypointCache;
use crate::error::LookupError;
use crate::source::FacilitySource;
use crate::waypoint::{Waypoint, WaypointId};

#[derive(Debug, Clone, PartialEq)]
pub struct LookupOutcome {
    pub id: WaypointId,
    pub result: Result<Waypoint, LookupError>,
}

#[derive(Debug)]
pub struct LookupPipeline {
    cache: SharedWaypointCache,
    queue: WorkQueue<WaypointId>,
    pending: BTreeSet<WaypointId>,
}

impl LookupPipeline {
    pub fn new(cache: SharedWaypointCache) -> Self {
        Self {
            cache,
            queue: WorkQueue::new(),
            pending: BTreeSet::new(),
        }
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, id: &WaypointId) -> bool {
        self.pending.contains(id)
    }

    /// Queue a lookup; duplicate submissions of a pending id are ignored.
    pub fn submit(&mut self, id: WaypointId, priority: i32) -> bool {
        if !self.pending.insert(id.clone()) {
            return false;
        }
        self.queue.push(priority, id);
        true
    }

    pub fn cancel(&mut self, id: &WaypointId) -> bool {
        if !self.pending.remove(id) {
            return false;
        }
        self.queue.retain(|queued| queued != id);
        true
    }

    /// Resolve queued lookups while the budget lasts (one unit each).
    pub fn poll(&mut self, source: &dyn FacilitySource, budget: &mut FrameBudget) -> Vec<LookupOutcome> {
        let mut out = Vec::new();
        while let Some((_, id)) = self.queue.pop_next_with_budget(budget) {
            self.pending.remove(&id);
            let result = self.cache.borrow_mut().get_or_fetch(&id, source);
            if let Err(e) = &result {
                debug!(%id, error = %e, "facility lookup failed");
            }
            out.push(LookupOutcome { id, result });
        }
        out
    }
}
