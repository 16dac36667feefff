//! Deterministic deferred-work queue.
//!
//! Items are ordered by `(priority, id)`: smaller priorities run first and
//! equal priorities run in submission order. Removing items never perturbs the
//! order of the rest. Popping can be gated by a `FrameBudget` so that only a
//! bounded amount of work resolves per tick.

use std::collections::BTreeMap;

use crate::budget::FrameBudget;

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WorkId(pub u64);

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct WorkQueueFull {
    pub max_len: usize,
}

impl std::fmt::Display for WorkQueueFull {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "work queue full (max_len={})", self.max_len)
    }
}

impl std::error::Error for WorkQueueFull {}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct Key {
    priority: i32,
    id: WorkId,
}

#[derive(Debug)]
struct Item<T> {
    payload: T,
    cost_units: u32,
}

#[derive(Debug)]
pub struct WorkQueue<T> {
    next_id: u64,
    items: BTreeMap<Key, Item<T>>,
    max_len: Option<usize>,
}

impl<T> Default for WorkQueue<T> {
    fn default() -> Self {
        Self {
            next_id: 0,
            items: BTreeMap::new(),
            max_len: None,
        }
    }
}

impl<T> WorkQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            max_len: Some(max_len),
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn push(&mut self, priority: i32, payload: T) -> WorkId {
        self.push_with_cost(priority, 1, payload)
    }

    pub fn push_with_cost(&mut self, priority: i32, cost_units: u32, payload: T) -> WorkId {
        let id = WorkId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        self.items.insert(Key { priority, id }, Item { payload, cost_units });
        id
    }

    pub fn try_push(&mut self, priority: i32, payload: T) -> Result<WorkId, WorkQueueFull> {
        if let Some(max_len) = self.max_len
            && self.items.len() >= max_len
        {
            return Err(WorkQueueFull { max_len });
        }
        Ok(self.push(priority, payload))
    }

    pub fn cancel(&mut self, id: WorkId) -> Option<T> {
        let key = *self.items.keys().find(|k| k.id == id)?;
        self.items.remove(&key).map(|item| item.payload)
    }

    /// Drop every queued item whose payload fails `keep`.
    pub fn retain(&mut self, mut keep: impl FnMut(&T) -> bool) {
        self.items.retain(|_, item| keep(&item.payload));
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.values().map(|item| &item.payload)
    }

    pub fn pop_next(&mut self) -> Option<(WorkId, T)> {
        let (key, item) = self.items.pop_first()?;
        Some((key.id, item.payload))
    }

    /// Pops the next item only if the budget covers its cost.
    ///
    /// An unaffordable head item blocks the queue for this tick; cheaper
    /// items behind it are not considered.
    pub fn pop_next_with_budget(&mut self, budget: &mut FrameBudget) -> Option<(WorkId, T)> {
        let (_, head) = self.items.first_key_value()?;
        if !budget.try_consume(head.cost_units) {
            return None;
        }
        self.pop_next()
    }
}
