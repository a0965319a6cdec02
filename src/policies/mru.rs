use crate::{CacheObject, CacheSnapshot, EvictionPolicy, ObjectKey};
use super::order::OrderedKeys;
use super::PolicyType;

/// Most Recently Used eviction
///
/// Evicts the object referenced most recently. Useful for cyclic scans
/// slightly larger than the cache, where LRU misses on every request.
#[derive(Debug, Default)]
pub struct MruPolicy {
    /// Recency order (least recent -> most recent)
    order: OrderedKeys,
}

impl MruPolicy {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EvictionPolicy for MruPolicy {
    fn name(&self) -> &str {
        PolicyType::Mru.name()
    }

    /// The incoming object is not resident yet, so the back of the queue is
    /// the most recently used resident object
    fn evict(&mut self, _snapshot: &CacheSnapshot<'_>, _incoming: &CacheObject) -> Option<ObjectKey> {
        self.order.back()
    }

    fn update_after_hit(&mut self, _snapshot: &CacheSnapshot<'_>, obj: &CacheObject) {
        self.order.move_to_back(obj.key);
    }

    fn update_after_insert(&mut self, _snapshot: &CacheSnapshot<'_>, obj: &CacheObject) {
        self.order.push_back(obj.key);
    }

    fn update_after_evict(&mut self, _snapshot: &CacheSnapshot<'_>, _incoming: &CacheObject, evicted: &CacheObject) {
        let removed = self.order.remove(evicted.key);
        debug_assert!(removed, "evicted key was not tracked");
    }

    fn metadata_len(&self) -> usize {
        self.order.len()
    }
}
