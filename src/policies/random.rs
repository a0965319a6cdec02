use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::{CacheObject, CacheSnapshot, EvictionPolicy, ObjectKey};
use crate::params::ParamSet;
use super::order::IndexedKeys;
use super::PolicyType;

/// Seed used when none is configured
pub const DEFAULT_SEED: u64 = 42;

pub(crate) fn seed_from(params: &ParamSet) -> u64 {
    params.get_i64("seed").map(|s| s as u64).unwrap_or(DEFAULT_SEED)
}

/// A policy that evicts a uniformly random resident object.
///
/// The generator is seeded, so two runs with the same seed and trace make
/// the same choices.
#[derive(Debug)]
pub struct RandomPolicy {
    keys: IndexedKeys,
    rng: StdRng,
}

impl RandomPolicy {
    pub fn new(seed: u64) -> Self {
        Self { keys: IndexedKeys::new(), rng: StdRng::seed_from_u64(seed) }
    }

    pub fn from_params(params: &ParamSet) -> Self {
        Self::new(seed_from(params))
    }
}

impl Default for RandomPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_SEED)
    }
}

impl EvictionPolicy for RandomPolicy {
    fn name(&self) -> &str {
        PolicyType::Random.name()
    }

    fn evict(&mut self, _snapshot: &CacheSnapshot<'_>, _incoming: &CacheObject) -> Option<ObjectKey> {
        if self.keys.is_empty() {
            return None;
        }
        let index = self.rng.gen_range(0..self.keys.len());
        self.keys.get(index)
    }

    fn update_after_hit(&mut self, _snapshot: &CacheSnapshot<'_>, _obj: &CacheObject) {}

    fn update_after_insert(&mut self, _snapshot: &CacheSnapshot<'_>, obj: &CacheObject) {
        self.keys.insert(obj.key);
    }

    fn update_after_evict(&mut self, _snapshot: &CacheSnapshot<'_>, _incoming: &CacheObject, evicted: &CacheObject) {
        let removed = self.keys.remove(evicted.key);
        debug_assert!(removed, "evicted key was not sampled from");
    }

    fn metadata_len(&self) -> usize {
        self.keys.len()
    }
}

/// Sampled LRU: evicts the least recently used of `n` randomly drawn
/// resident objects (drawn with replacement).
#[derive(Debug)]
pub struct RandomLruPolicy {
    keys: IndexedKeys,
    /// Logical time of the latest reference per key
    last_access: HashMap<ObjectKey, u64>,
    samples: usize,
    rng: StdRng,
}

impl RandomLruPolicy {
    pub const DEFAULT_SAMPLES: usize = 16;

    pub fn new(samples: usize, seed: u64) -> Self {
        Self {
            keys: IndexedKeys::new(),
            last_access: HashMap::new(),
            samples: samples.max(1),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn from_params(params: &ParamSet) -> Self {
        let samples = params.get_i64("n-samples").unwrap_or(Self::DEFAULT_SAMPLES as i64);
        Self::new(samples.max(1) as usize, seed_from(params))
    }
}

impl EvictionPolicy for RandomLruPolicy {
    fn name(&self) -> &str {
        PolicyType::RandomLru.name()
    }

    fn evict(&mut self, _snapshot: &CacheSnapshot<'_>, _incoming: &CacheObject) -> Option<ObjectKey> {
        if self.keys.is_empty() {
            return None;
        }
        let mut best: Option<(u64, ObjectKey)> = None;
        for _ in 0..self.samples {
            let key = self.keys.get(self.rng.gen_range(0..self.keys.len()))?;
            let candidate = (self.last_access.get(&key).copied().unwrap_or(0), key);
            if best.is_none_or(|b| candidate < b) {
                best = Some(candidate);
            }
        }
        best.map(|(_, key)| key)
    }

    fn update_after_hit(&mut self, snapshot: &CacheSnapshot<'_>, obj: &CacheObject) {
        self.last_access.insert(obj.key, snapshot.access_count());
    }

    fn update_after_insert(&mut self, snapshot: &CacheSnapshot<'_>, obj: &CacheObject) {
        self.keys.insert(obj.key);
        self.last_access.insert(obj.key, snapshot.access_count());
    }

    fn update_after_evict(&mut self, _snapshot: &CacheSnapshot<'_>, _incoming: &CacheObject, evicted: &CacheObject) {
        let removed = self.keys.remove(evicted.key);
        debug_assert!(removed, "evicted key was not sampled from");
        self.last_access.remove(&evicted.key);
    }

    fn metadata_len(&self) -> usize {
        self.keys.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policies::test_util::{drive, resident};

    fn scan() -> Vec<u64> {
        (0..500).map(|i| (i * 7 + i / 3) % 23).collect()
    }

    #[test]
    fn test_random_keeps_capacity_and_metadata() {
        let engine = drive(RandomPolicy::default(), 5, &scan());
        assert_eq!(engine.len(), 5);
        assert_eq!(engine.policy().metadata_len(), 5);
    }

    #[test]
    fn test_random_same_seed_same_run() {
        let a = drive(RandomPolicy::new(7), 5, &scan());
        let b = drive(RandomPolicy::new(7), 5, &scan());
        assert_eq!(a.stats(), b.stats());
        assert_eq!(resident(&a), resident(&b));
    }

    #[test]
    fn test_random_lru_with_full_sampling_tracks_lru() {
        // With many samples on a tiny cache every resident object is drawn,
        // so the choice matches exact LRU
        let trace = [1, 2, 1, 3, 4, 1, 5];
        let sampled = drive(RandomLruPolicy::new(64, 3), 2, &trace);
        let exact = drive(crate::policies::LruPolicy::new(), 2, &trace);
        assert_eq!(resident(&sampled), resident(&exact));
        assert_eq!(sampled.stats(), exact.stats());
    }

    #[test]
    fn test_random_lru_metadata_follows_residency() {
        let engine = drive(RandomLruPolicy::new(4, 1), 4, &scan());
        assert_eq!(engine.policy().metadata_len(), engine.len());
    }
}
