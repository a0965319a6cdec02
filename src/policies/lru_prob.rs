use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::{CacheObject, CacheSnapshot, EvictionPolicy, ObjectKey};
use crate::params::ParamSet;
use super::order::OrderedKeys;
use super::random::seed_from;
use super::PolicyType;

/// Probabilistic LRU
///
/// Like LRU, but a hit only promotes the object to the most recent position
/// with probability `prob`. `prob = 1` is plain LRU and `prob -> 0`
/// approaches FIFO.
#[derive(Debug)]
pub struct LruProbPolicy {
    order: OrderedKeys,
    prob: f64,
    rng: StdRng,
}

impl LruProbPolicy {
    pub const DEFAULT_PROB: f64 = 0.5;

    pub fn new(prob: f64, seed: u64) -> Self {
        Self {
            order: OrderedKeys::new(),
            prob: prob.clamp(0.0, 1.0),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn from_params(params: &ParamSet) -> Self {
        Self::new(params.get_f64("prob").unwrap_or(Self::DEFAULT_PROB), seed_from(params))
    }
}

impl EvictionPolicy for LruProbPolicy {
    fn name(&self) -> &str {
        PolicyType::LruProb.name()
    }

    fn evict(&mut self, _snapshot: &CacheSnapshot<'_>, _incoming: &CacheObject) -> Option<ObjectKey> {
        self.order.front()
    }

    fn update_after_hit(&mut self, _snapshot: &CacheSnapshot<'_>, obj: &CacheObject) {
        // One draw per hit keeps the random stream aligned with the trace
        let draw: f64 = self.rng.r#gen();
        if draw < self.prob {
            self.order.move_to_back(obj.key);
        }
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
