use std::collections::HashMap;

use crate::{CacheObject, CacheSnapshot, EvictionPolicy, ObjectKey};
use crate::params::ParamSet;
use super::order::{GhostQueue, OrderedKeys};
use super::{PolicyType, share_of};

/// Saturation value of the per-object access counter
const MAX_FREQ: u32 = 3;

/// Which resident queue an object lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Queue {
    Small,
    Main,
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    queue: Queue,
    size: u64,
    freq: u32,
}

/// S3-FIFO eviction
///
/// Three FIFO queues: a small probationary queue, a main queue and a ghost
/// queue of keys recently evicted from the small one. New objects enter the
/// small queue, or the main queue when the ghost still remembers them.
///
/// When the small queue is over its share of the cache, its oldest object is
/// either promoted to main (if it was accessed at least
/// `move_to_main_threshold` times) or evicted into the ghost. Otherwise the
/// main queue is swept like a clock: objects with a non-zero counter are
/// decremented and reinserted, the first at zero is the victim.
#[derive(Debug)]
pub struct S3FifoPolicy {
    small: OrderedKeys,
    main: OrderedKeys,
    ghost: GhostQueue,
    entries: HashMap<ObjectKey, Entry>,
    small_size: u64,
    small_capacity: u64,
    move_to_main_threshold: u32,
}

impl S3FifoPolicy {
    pub const DEFAULT_SMALL_RATIO: f64 = 0.1;
    pub const DEFAULT_MOVE_TO_MAIN_THRESHOLD: u32 = 1;

    pub fn new(capacity: u64, small_ratio: f64, move_to_main_threshold: u32) -> Self {
        let small_capacity = share_of(capacity, small_ratio);
        Self {
            small: OrderedKeys::new(),
            main: OrderedKeys::new(),
            ghost: GhostQueue::new(capacity.saturating_sub(small_capacity).max(1)),
            entries: HashMap::new(),
            small_size: 0,
            small_capacity,
            move_to_main_threshold,
        }
    }

    pub fn from_params(capacity: u64, params: &ParamSet) -> Self {
        let threshold = params
            .get_i64("move-to-main-threshold")
            .unwrap_or(Self::DEFAULT_MOVE_TO_MAIN_THRESHOLD as i64);
        Self::new(
            capacity,
            params.get_f64("fifo-size-ratio").unwrap_or(Self::DEFAULT_SMALL_RATIO),
            threshold.clamp(0, u32::MAX as i64) as u32,
        )
    }

    pub fn queue_of(&self, key: ObjectKey) -> Option<Queue> {
        self.entries.get(&key).map(|entry| entry.queue)
    }

    /// Access counter of a resident key
    pub fn frequency(&self, key: ObjectKey) -> Option<u32> {
        self.entries.get(&key).map(|entry| entry.freq)
    }

    fn promote(&mut self, key: ObjectKey) {
        if let Some(entry) = self.entries.get_mut(&key) {
            self.small.remove(key);
            self.small_size -= entry.size;
            self.main.push_back(key);
            entry.queue = Queue::Main;
            entry.freq = 0;
        }
    }
}

impl EvictionPolicy for S3FifoPolicy {
    fn name(&self) -> &str {
        PolicyType::S3Fifo.name()
    }

    fn evict(&mut self, _snapshot: &CacheSnapshot<'_>, _incoming: &CacheObject) -> Option<ObjectKey> {
        loop {
            let from_small = !self.small.is_empty()
                && (self.small_size > self.small_capacity || self.main.is_empty());
            if from_small {
                let key = self.small.front()?;
                if self.entries.get(&key)?.freq >= self.move_to_main_threshold {
                    self.promote(key);
                    continue;
                }
                return Some(key);
            }

            let key = self.main.front()?;
            let entry = self.entries.get_mut(&key)?;
            if entry.freq == 0 {
                return Some(key);
            }
            entry.freq -= 1;
            self.main.move_to_back(key);
        }
    }

    fn update_after_hit(&mut self, _snapshot: &CacheSnapshot<'_>, obj: &CacheObject) {
        if let Some(entry) = self.entries.get_mut(&obj.key) {
            entry.freq = (entry.freq + 1).min(MAX_FREQ);
        }
    }

    fn update_after_insert(&mut self, _snapshot: &CacheSnapshot<'_>, obj: &CacheObject) {
        let queue = if self.ghost.remove(obj.key) {
            self.main.push_back(obj.key);
            Queue::Main
        } else {
            self.small.push_back(obj.key);
            self.small_size += obj.size;
            Queue::Small
        };
        self.entries.insert(obj.key, Entry { queue, size: obj.size, freq: 0 });
    }

    fn update_after_evict(&mut self, _snapshot: &CacheSnapshot<'_>, _incoming: &CacheObject, evicted: &CacheObject) {
        let Some(entry) = self.entries.remove(&evicted.key) else {
            return;
        };
        match entry.queue {
            Queue::Small => {
                self.small.remove(evicted.key);
                self.small_size -= entry.size;
                self.ghost.push(evicted.key, entry.size);
            }
            Queue::Main => {
                self.main.remove(evicted.key);
            }
        }
    }

    fn metadata_len(&self) -> usize {
        self.entries.len()
    }

    fn ghost_len(&self) -> usize {
        self.ghost.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policies::test_util::{drive, resident};

    #[test]
    fn test_accessed_small_object_moves_to_main() {
        // Small queue holds one object; 1 was hit before its turn came up
        let engine = drive(S3FifoPolicy::new(3, 0.34, 1), 3, &[1, 2, 1, 3, 4]);
        assert_eq!(engine.policy().queue_of(1), Some(Queue::Main));
        assert_eq!(resident(&engine), vec![1, 3, 4]);
        assert_eq!(engine.policy().ghost_len(), 1);
    }

    #[test]
    fn test_ghost_hit_inserts_into_main() {
        let engine = drive(S3FifoPolicy::new(3, 0.34, 1), 3, &[1, 2, 1, 3, 4, 2]);
        assert_eq!(engine.policy().queue_of(2), Some(Queue::Main));
        assert!(!engine.contains(3));
    }

    #[test]
    fn test_frequency_saturates() {
        let engine = drive(S3FifoPolicy::new(4, 0.25, 1), 4, &[1, 1, 1, 1, 1, 1]);
        assert_eq!(engine.policy().frequency(1), Some(MAX_FREQ));
    }

    #[test]
    fn test_ghost_is_bounded_by_main_share() {
        let trace: Vec<u64> = (0..500).collect();
        let engine = drive(S3FifoPolicy::new(10, 0.1, 1), 10, &trace);
        assert!(engine.policy().ghost_len() <= 9);
        assert_eq!(engine.policy().metadata_len(), engine.len());
    }

    #[test]
    fn test_zero_threshold_promotes_everything() {
        let trace: Vec<u64> = (0..50).map(|i| i % 7).collect();
        let engine = drive(S3FifoPolicy::new(4, 0.25, 0), 4, &trace);
        assert_eq!(engine.len(), 4);
        assert_eq!(engine.policy().metadata_len(), 4);
    }
}
