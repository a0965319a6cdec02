use crate::{CacheObject, CacheSnapshot, EvictionPolicy, ObjectKey};
use super::order::OrderedKeys;
use super::PolicyType;

/// Least Recently Used eviction
///
/// Objects are kept in access order, automatically evicting the object
/// whose last reference is oldest.
#[derive(Debug, Default)]
pub struct LruPolicy {
    /// Recency order (least recent -> most recent)
    order: OrderedKeys,
}

impl LruPolicy {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EvictionPolicy for LruPolicy {
    fn name(&self) -> &str {
        PolicyType::Lru.name()
    }

    fn evict(&mut self, _snapshot: &CacheSnapshot<'_>, _incoming: &CacheObject) -> Option<ObjectKey> {
        self.order.front()
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policies::test_util::{drive, resident};

    #[test]
    fn test_lru_eviction() {
        let engine = drive(LruPolicy::new(), 2, &[1, 2, 3]);
        assert_eq!(resident(&engine), vec![2, 3]);
    }

    #[test]
    fn test_lru_access_order() {
        // Touching 1 makes 2 the least recently used
        let engine = drive(LruPolicy::new(), 3, &[1, 2, 3, 1, 4]);
        assert_eq!(resident(&engine), vec![1, 3, 4]);
    }

    #[test]
    fn test_lru_hit_counts() {
        let engine = drive(LruPolicy::new(), 2, &[1, 2, 1, 3, 1, 2]);
        // 1 hit, 1 hit; 2 was evicted by 3
        assert_eq!(engine.stats().hits, 2);
        assert_eq!(engine.stats().misses, 4);
        assert_eq!(engine.policy().metadata_len(), 2);
    }
}
