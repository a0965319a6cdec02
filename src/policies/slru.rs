use std::collections::HashMap;

use crate::{CacheObject, CacheSnapshot, EvictionPolicy, ObjectKey};
use crate::params::ParamSet;
use super::order::OrderedKeys;
use super::PolicyType;

/// Segmented LRU eviction
///
/// The cache is split into `n` LRU segments of equal size. New objects enter
/// segment 0; a hit promotes an object one segment up. When a segment
/// overflows, its least recently used objects are demoted to the most
/// recent end of the segment below. Victims come from the least recent end
/// of the lowest non-empty segment.
#[derive(Debug)]
pub struct SlruPolicy {
    segments: Vec<OrderedKeys>,
    /// Occupied size per segment
    segment_sizes: Vec<u64>,
    /// Target size per segment
    segment_capacity: u64,
    /// (segment, size) per resident key
    location: HashMap<ObjectKey, (usize, u64)>,
}

impl SlruPolicy {
    pub const DEFAULT_SEGMENTS: usize = 4;

    /// Split `capacity` into `n_segments` segments (at least one)
    pub fn new(capacity: u64, n_segments: usize) -> Self {
        let n = n_segments.max(1);
        Self {
            segments: vec![OrderedKeys::new(); n],
            segment_sizes: vec![0; n],
            segment_capacity: (capacity / n as u64).max(1),
            location: HashMap::new(),
        }
    }

    pub fn from_params(capacity: u64, params: &ParamSet) -> Self {
        let n = params.get_i64("n-seg").unwrap_or(Self::DEFAULT_SEGMENTS as i64);
        Self::new(capacity, n.max(1) as usize)
    }

    /// Segment currently holding `key`
    pub fn segment_of(&self, key: ObjectKey) -> Option<usize> {
        self.location.get(&key).map(|&(segment, _)| segment)
    }

    fn place(&mut self, key: ObjectKey, size: u64, segment: usize) {
        self.segments[segment].push_back(key);
        self.segment_sizes[segment] += size;
        self.location.insert(key, (segment, size));
    }

    fn unplace(&mut self, key: ObjectKey) -> Option<(usize, u64)> {
        let (segment, size) = self.location.remove(&key)?;
        self.segments[segment].remove(key);
        self.segment_sizes[segment] -= size;
        Some((segment, size))
    }

    /// Demote overflow from `top` downwards until every segment above 0
    /// fits its target size
    fn rebalance(&mut self, top: usize) {
        for segment in (1..=top).rev() {
            while self.segment_sizes[segment] > self.segment_capacity {
                let Some(key) = self.segments[segment].front() else {
                    break;
                };
                if let Some((_, size)) = self.unplace(key) {
                    self.place(key, size, segment - 1);
                }
            }
        }
    }
}

impl EvictionPolicy for SlruPolicy {
    fn name(&self) -> &str {
        PolicyType::Slru.name()
    }

    fn evict(&mut self, _snapshot: &CacheSnapshot<'_>, _incoming: &CacheObject) -> Option<ObjectKey> {
        self.segments.iter().find_map(OrderedKeys::front)
    }

    fn update_after_hit(&mut self, _snapshot: &CacheSnapshot<'_>, obj: &CacheObject) {
        let Some((segment, size)) = self.unplace(obj.key) else {
            return;
        };
        let target = (segment + 1).min(self.segments.len() - 1);
        self.place(obj.key, size, target);
        self.rebalance(target);
    }

    fn update_after_insert(&mut self, _snapshot: &CacheSnapshot<'_>, obj: &CacheObject) {
        self.place(obj.key, obj.size, 0);
    }

    fn update_after_evict(&mut self, _snapshot: &CacheSnapshot<'_>, _incoming: &CacheObject, evicted: &CacheObject) {
        self.unplace(evicted.key);
    }

    fn metadata_len(&self) -> usize {
        self.location.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policies::test_util::{drive, resident};
    use crate::policies::LruPolicy;

    #[test]
    fn test_single_segment_is_lru() {
        let trace = [1, 2, 3, 1, 4, 2, 5, 1, 3, 3, 6];
        let slru = drive(SlruPolicy::new(3, 1), 3, &trace);
        let lru = drive(LruPolicy::new(), 3, &trace);
        assert_eq!(slru.stats(), lru.stats());
        assert_eq!(resident(&slru), resident(&lru));
    }

    #[test]
    fn test_hit_promotes_one_segment() {
        let engine = drive(SlruPolicy::new(4, 2), 4, &[1, 2, 1]);
        assert_eq!(engine.policy().segment_of(1), Some(1));
        assert_eq!(engine.policy().segment_of(2), Some(0));
    }

    #[test]
    fn test_protected_objects_survive_scan() {
        // 1 and 2 are promoted; the scan of 10.. only churns segment 0
        let mut trace = vec![1, 2, 1, 2];
        trace.extend(10..30);
        let engine = drive(SlruPolicy::new(4, 2), 4, &trace);
        assert!(engine.contains(1));
        assert!(engine.contains(2));
    }

    #[test]
    fn test_overflow_demotes_to_lower_segment() {
        // Segment capacity 1: promoting 2 pushes 1 back down
        let engine = drive(SlruPolicy::new(2, 2), 2, &[1, 2, 1, 2]);
        assert_eq!(engine.policy().segment_of(2), Some(1));
        assert_eq!(engine.policy().segment_of(1), Some(0));
        assert_eq!(engine.policy().metadata_len(), 2);
    }
}
