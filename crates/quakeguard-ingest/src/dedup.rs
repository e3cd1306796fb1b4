//! Bounded set of event ids already delivered.

use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;

use quakeguard_core::config::MAX_DEDUP_CAPACITY;

/// FIFO-evicting set of seen event ids, shared by every ingestion strategy.
///
/// `insert_if_absent` is a single critical section, so two strategies
/// racing on the same id observe exactly one `true`.
pub struct SeenEventCache {
    capacity: usize,
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    ids: HashSet<String>,
    order: VecDeque<String>,
}

impl SeenEventCache {
    /// Capacity is clamped to `1..=1000`.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.clamp(1, MAX_DEDUP_CAPACITY),
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Record `id`. Returns `true` if it had not been seen before.
    pub fn insert_if_absent(&self, id: &str) -> bool {
        let mut inner = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if inner.ids.contains(id) {
            return false;
        }
        if inner.order.len() >= self.capacity {
            if let Some(oldest) = inner.order.pop_front() {
                inner.ids.remove(&oldest);
            }
        }
        inner.ids.insert(id.to_string());
        inner.order.push_back(id.to_string());
        true
    }

    pub fn contains(&self, id: &str) -> bool {
        match self.inner.lock() {
            Ok(guard) => guard.ids.contains(id),
            Err(poisoned) => poisoned.into_inner().ids.contains(id),
        }
    }

    pub fn len(&self) -> usize {
        match self.inner.lock() {
            Ok(guard) => guard.order.len(),
            Err(poisoned) => poisoned.into_inner().order.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SeenEventCache {
    fn default() -> Self {
        Self::new(MAX_DEDUP_CAPACITY)
    }
}
