use std::collections::HashMap;

use crate::{CacheObject, CacheSnapshot, EvictionPolicy, ObjectKey};
use crate::params::ParamSet;
use super::order::OrderedKeys;
use super::PolicyType;

/// Default width of the per-object reference counter
pub const DEFAULT_COUNTER_BITS: u32 = 1;

/// Clock (second chance) eviction
///
/// Approximates LRU: each object carries a small reference counter that
/// hits increment. The hand sweeps from the oldest position; an object with
/// a non-zero counter is decremented and passed over, the first object at
/// zero is the victim. With one counter bit this is the classic
/// second-chance algorithm.
#[derive(Debug)]
pub struct ClockPolicy {
    /// Circular order; the front is under the hand
    ring: OrderedKeys,
    /// Reference counter per resident key
    counters: HashMap<ObjectKey, u32>,
    /// Saturation value, `2^bits - 1`
    max_counter: u32,
}

impl ClockPolicy {
    /// Create a clock with `counter_bits`-wide reference counters (1..=16)
    pub fn new(counter_bits: u32) -> Self {
        let bits = counter_bits.clamp(1, 16);
        Self {
            ring: OrderedKeys::new(),
            counters: HashMap::new(),
            max_counter: (1u32 << bits) - 1,
        }
    }

    pub fn from_params(params: &ParamSet) -> Self {
        let bits = params.get_i64("n-bit-counter").unwrap_or(DEFAULT_COUNTER_BITS as i64);
        Self::new(bits.clamp(1, 16) as u32)
    }

    /// Current reference counter of a resident key
    pub fn counter(&self, key: ObjectKey) -> Option<u32> {
        self.counters.get(&key).copied()
    }
}

impl Default for ClockPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_COUNTER_BITS)
    }
}

impl EvictionPolicy for ClockPolicy {
    fn name(&self) -> &str {
        PolicyType::Clock.name()
    }

    /// Sweep the hand until an object with a zero counter is found.
    ///
    /// Every pass over a non-zero object decrements it, so the sweep ends
    /// after at most `max_counter + 1` turns.
    fn evict(&mut self, _snapshot: &CacheSnapshot<'_>, _incoming: &CacheObject) -> Option<ObjectKey> {
        loop {
            let key = self.ring.front()?;
            let counter = self.counters.get_mut(&key)?;
            if *counter == 0 {
                return Some(key);
            }
            *counter -= 1;
            self.ring.move_to_back(key);
        }
    }

    fn update_after_hit(&mut self, _snapshot: &CacheSnapshot<'_>, obj: &CacheObject) {
        if let Some(counter) = self.counters.get_mut(&obj.key) {
            *counter = (*counter + 1).min(self.max_counter);
        }
    }

    fn update_after_insert(&mut self, _snapshot: &CacheSnapshot<'_>, obj: &CacheObject) {
        self.ring.push_back(obj.key);
        self.counters.insert(obj.key, 0);
    }

    fn update_after_evict(&mut self, _snapshot: &CacheSnapshot<'_>, _incoming: &CacheObject, evicted: &CacheObject) {
        let removed = self.ring.remove(evicted.key);
        debug_assert!(removed, "evicted key was not on the ring");
        self.counters.remove(&evicted.key);
    }

    fn metadata_len(&self) -> usize {
        self.counters.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ParamValue;
    use crate::policies::test_util::{drive, resident};

    #[test]
    fn test_clock_gives_second_chance() {
        // 1 is referenced, so the hand skips it and takes 2
        let engine = drive(ClockPolicy::default(), 3, &[1, 2, 3, 1, 4]);
        assert_eq!(resident(&engine), vec![1, 3, 4]);
        assert_eq!(engine.policy().counter(1), Some(0));
    }

    #[test]
    fn test_clock_without_hits_is_fifo() {
        let engine = drive(ClockPolicy::default(), 2, &[1, 2, 3, 4]);
        assert_eq!(resident(&engine), vec![3, 4]);
    }

    #[test]
    fn test_counter_saturates() {
        let engine = drive(ClockPolicy::new(2), 2, &[1, 1, 1, 1, 1, 1]);
        assert_eq!(engine.policy().counter(1), Some(3));
    }

    #[test]
    fn test_from_params() {
        let params = ParamSet::new().with("n-bit-counter", ParamValue::Int(3));
        let engine = drive(ClockPolicy::from_params(&params), 2, &[1; 20]);
        assert_eq!(engine.policy().counter(1), Some(7));
    }
}
