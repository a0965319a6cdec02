use std::collections::HashMap;

use crate::{CacheObject, CacheSnapshot, EvictionPolicy, ObjectKey};
use crate::params::ParamSet;
use super::order::{GhostQueue, OrderedKeys};
use super::{PolicyType, share_of};

/// Which resident queue an object lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Queue {
    /// A1in: FIFO of objects referenced once
    A1In,
    /// Am: LRU of objects referenced again after leaving A1in
    Am,
}

/// 2Q eviction
///
/// 2Q uses three lists:
/// - A1in (FIFO): recently inserted objects
/// - Am (LRU): objects that came back while still remembered in A1out
/// - A1out (FIFO): ghost history of keys evicted from A1in
///
/// Victims come from A1in while it holds more than its share of the cache,
/// otherwise from the least recent end of Am.
#[derive(Debug)]
pub struct TwoQPolicy {
    a1in: OrderedKeys,
    am: OrderedKeys,
    a1out: GhostQueue,
    location: HashMap<ObjectKey, (Queue, u64)>,
    a1in_size: u64,
    /// Kin: target size of A1in
    a1in_capacity: u64,
}

impl TwoQPolicy {
    pub const DEFAULT_AIN_RATIO: f64 = 0.25;
    pub const DEFAULT_AOUT_RATIO: f64 = 0.5;

    pub fn new(capacity: u64, ain_ratio: f64, aout_ratio: f64) -> Self {
        Self {
            a1in: OrderedKeys::new(),
            am: OrderedKeys::new(),
            a1out: GhostQueue::new(share_of(capacity, aout_ratio)),
            location: HashMap::new(),
            a1in_size: 0,
            a1in_capacity: share_of(capacity, ain_ratio),
        }
    }

    pub fn from_params(capacity: u64, params: &ParamSet) -> Self {
        Self::new(
            capacity,
            params.get_f64("Ain-size-ratio").unwrap_or(Self::DEFAULT_AIN_RATIO),
            params.get_f64("Aout-size-ratio").unwrap_or(Self::DEFAULT_AOUT_RATIO),
        )
    }

    pub fn queue_of(&self, key: ObjectKey) -> Option<Queue> {
        self.location.get(&key).map(|&(queue, _)| queue)
    }
}

impl EvictionPolicy for TwoQPolicy {
    fn name(&self) -> &str {
        PolicyType::TwoQ.name()
    }

    fn evict(&mut self, _snapshot: &CacheSnapshot<'_>, _incoming: &CacheObject) -> Option<ObjectKey> {
        if self.a1in_size > self.a1in_capacity || self.am.is_empty() {
            self.a1in.front().or_else(|| self.am.front())
        } else {
            self.am.front()
        }
    }

    fn update_after_hit(&mut self, _snapshot: &CacheSnapshot<'_>, obj: &CacheObject) {
        // Hits in A1in are deliberately ignored (correlated references)
        if self.queue_of(obj.key) == Some(Queue::Am) {
            self.am.move_to_back(obj.key);
        }
    }

    fn update_after_insert(&mut self, _snapshot: &CacheSnapshot<'_>, obj: &CacheObject) {
        if self.a1out.remove(obj.key) {
            self.am.push_back(obj.key);
            self.location.insert(obj.key, (Queue::Am, obj.size));
        } else {
            self.a1in.push_back(obj.key);
            self.a1in_size += obj.size;
            self.location.insert(obj.key, (Queue::A1In, obj.size));
        }
    }

    fn update_after_evict(&mut self, _snapshot: &CacheSnapshot<'_>, _incoming: &CacheObject, evicted: &CacheObject) {
        match self.location.remove(&evicted.key) {
            Some((Queue::A1In, size)) => {
                self.a1in.remove(evicted.key);
                self.a1in_size -= size;
                self.a1out.push(evicted.key, size);
            }
            Some((Queue::Am, _)) => {
                self.am.remove(evicted.key);
            }
            None => {}
        }
    }

    fn metadata_len(&self) -> usize {
        self.location.len()
    }

    fn ghost_len(&self) -> usize {
        self.a1out.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policies::test_util::drive;

    #[test]
    fn test_new_objects_enter_a1in() {
        let engine = drive(TwoQPolicy::new(4, 0.25, 0.5), 4, &[1, 2, 1]);
        assert_eq!(engine.policy().queue_of(1), Some(Queue::A1In));
        assert_eq!(engine.policy().queue_of(2), Some(Queue::A1In));
    }

    #[test]
    fn test_remembered_object_returns_to_am() {
        // capacity 2: 1 is evicted from A1in into A1out, then comes back
        let engine = drive(TwoQPolicy::new(2, 0.5, 1.0), 2, &[1, 2, 3, 1]);
        assert_eq!(engine.policy().queue_of(1), Some(Queue::Am));
        assert!(engine.policy().ghost_len() >= 1);
    }

    #[test]
    fn test_ghost_history_is_bounded() {
        let trace: Vec<u64> = (0..200).collect();
        let engine = drive(TwoQPolicy::new(8, 0.25, 0.5), 8, &trace);
        assert!(engine.policy().ghost_len() <= 4);
        assert_eq!(engine.policy().metadata_len(), engine.len());
    }

    #[test]
    fn test_am_objects_survive_one_time_scan() {
        let mut trace = vec![1, 2, 3, 4, 5, 1, 2];
        trace.extend(100..140);
        let engine = drive(TwoQPolicy::new(4, 0.25, 1.0), 4, &trace);
        assert_eq!(engine.policy().queue_of(1), Some(Queue::Am));
        assert_eq!(engine.policy().queue_of(2), Some(Queue::Am));
    }
}
