use crate::{CacheObject, CacheSnapshot, EvictionPolicy, ObjectKey};
use super::order::OrderedKeys;
use super::PolicyType;

/// First-In-First-Out eviction.
///
/// # Overview
/// - Evicts the oldest inserted object; hits do not change the order.
/// - O(log n) for every callback.
#[derive(Debug, Default)]
pub struct FifoPolicy {
    /// Insertion order (oldest -> newest)
    queue: OrderedKeys,
}

impl FifoPolicy {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EvictionPolicy for FifoPolicy {
    fn name(&self) -> &str {
        PolicyType::Fifo.name()
    }

    /// The front of the queue is the oldest resident object
    fn evict(&mut self, _snapshot: &CacheSnapshot<'_>, _incoming: &CacheObject) -> Option<ObjectKey> {
        self.queue.front()
    }

    fn update_after_hit(&mut self, _snapshot: &CacheSnapshot<'_>, _obj: &CacheObject) {}

    fn update_after_insert(&mut self, _snapshot: &CacheSnapshot<'_>, obj: &CacheObject) {
        self.queue.push_back(obj.key);
    }

    fn update_after_evict(&mut self, _snapshot: &CacheSnapshot<'_>, _incoming: &CacheObject, evicted: &CacheObject) {
        let removed = self.queue.remove(evicted.key);
        debug_assert!(removed, "evicted key was not queued");
    }

    fn metadata_len(&self) -> usize {
        self.queue.len()
    }
}
