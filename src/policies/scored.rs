//! Score-based eviction.
//!
//! [`ScoredPolicy`] keeps per-object access statistics and evicts the
//! resident object with the lowest score under a pluggable [`Scorer`].
//! Any closure `Fn(&ObjectStats, &CacheSnapshot) -> f64` is a scorer, so a
//! heuristic can be tried without writing a policy type:
//!
//! ```
//! use evictsim::policies::{ObjectStats, ScoredPolicy};
//! use evictsim::CacheSnapshot;
//!
//! // Evict the largest object first
//! let policy = ScoredPolicy::from_fn("largest-first", |s: &ObjectStats, _: &CacheSnapshot<'_>| {
//!     -(s.size as f64)
//! });
//! ```

use std::collections::BTreeMap;

use crate::{CacheObject, CacheSnapshot, EvictionPolicy, ObjectKey};
use crate::params::ParamSet;
use super::PolicyType;

/// Access statistics of one resident object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectStats {
    pub key: ObjectKey,
    pub size: u64,
    /// Requests for the object since it was inserted, including the insertion
    pub frequency: u64,
    /// Logical time of the latest request
    pub last_access: u64,
    /// Logical time of the insertion
    pub inserted_at: u64,
}

/// Eviction priority of a resident object; the lowest score is evicted
pub trait Scorer {
    fn score(&self, stats: &ObjectStats, snapshot: &CacheSnapshot<'_>) -> f64;
}

impl<F> Scorer for F
where
    F: Fn(&ObjectStats, &CacheSnapshot<'_>) -> f64,
{
    fn score(&self, stats: &ObjectStats, snapshot: &CacheSnapshot<'_>) -> f64 {
        self(stats, snapshot)
    }
}

/// Policy that evicts the lowest-scoring resident object.
///
/// Scores are compared with [`f64::total_cmp`]; equal scores go to the
/// lowest key, so eviction never depends on map iteration order.
#[derive(Debug)]
pub struct ScoredPolicy<S> {
    name: String,
    scorer: S,
    objects: BTreeMap<ObjectKey, ObjectStats>,
}

impl<F> ScoredPolicy<F>
where
    F: Fn(&ObjectStats, &CacheSnapshot<'_>) -> f64,
{
    /// Build a policy around a scoring closure
    pub fn from_fn(name: impl Into<String>, scorer: F) -> Self {
        Self::new(name, scorer)
    }
}

impl<S: Scorer> ScoredPolicy<S> {
    pub fn new(name: impl Into<String>, scorer: S) -> Self {
        Self { name: name.into(), scorer, objects: BTreeMap::new() }
    }

    /// Statistics of a resident key
    pub fn object_stats(&self, key: ObjectKey) -> Option<&ObjectStats> {
        self.objects.get(&key)
    }

    pub fn scorer(&self) -> &S {
        &self.scorer
    }
}

impl<S: Scorer> EvictionPolicy for ScoredPolicy<S> {
    fn name(&self) -> &str {
        &self.name
    }

    fn evict(&mut self, snapshot: &CacheSnapshot<'_>, _incoming: &CacheObject) -> Option<ObjectKey> {
        let mut best: Option<(f64, ObjectKey)> = None;
        // BTreeMap iterates in key order, so a strict comparison keeps the
        // lowest key among equal scores
        for (key, stats) in &self.objects {
            let score = self.scorer.score(stats, snapshot);
            if best.is_none_or(|(lowest, _)| score.total_cmp(&lowest).is_lt()) {
                best = Some((score, *key));
            }
        }
        best.map(|(_, key)| key)
    }

    fn update_after_hit(&mut self, snapshot: &CacheSnapshot<'_>, obj: &CacheObject) {
        if let Some(stats) = self.objects.get_mut(&obj.key) {
            stats.frequency += 1;
            stats.last_access = snapshot.access_count();
        }
    }

    fn update_after_insert(&mut self, snapshot: &CacheSnapshot<'_>, obj: &CacheObject) {
        let now = snapshot.access_count();
        let stats = ObjectStats {
            key: obj.key,
            size: obj.size,
            frequency: 1,
            last_access: now,
            inserted_at: now,
        };
        self.objects.insert(obj.key, stats);
    }

    fn update_after_evict(&mut self, _snapshot: &CacheSnapshot<'_>, _incoming: &CacheObject, evicted: &CacheObject) {
        let removed = self.objects.remove(&evicted.key);
        debug_assert!(removed.is_some(), "evicted key had no stats");
    }

    fn metadata_len(&self) -> usize {
        self.objects.len()
    }
}

/// Weighted blend of frequency and recency.
///
/// `score = frequency_weight * ln(1 + frequency) + recency_weight * last_access / access_count`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hybrid {
    pub frequency_weight: f64,
    pub recency_weight: f64,
}

impl Hybrid {
    pub const DEFAULT_WEIGHT: f64 = 0.5;

    pub fn new(frequency_weight: f64, recency_weight: f64) -> Self {
        Self { frequency_weight, recency_weight }
    }

    pub fn from_params(params: &ParamSet) -> Self {
        Self::new(
            params.get_f64("frequency-weight").unwrap_or(Self::DEFAULT_WEIGHT),
            params.get_f64("recency-weight").unwrap_or(Self::DEFAULT_WEIGHT),
        )
    }
}

impl Default for Hybrid {
    fn default() -> Self {
        Self::new(Self::DEFAULT_WEIGHT, Self::DEFAULT_WEIGHT)
    }
}

impl Scorer for Hybrid {
    fn score(&self, stats: &ObjectStats, snapshot: &CacheSnapshot<'_>) -> f64 {
        let now = snapshot.access_count().max(1) as f64;
        let frequency = (1.0 + stats.frequency as f64).ln();
        let recency = stats.last_access as f64 / now;
        self.frequency_weight * frequency + self.recency_weight * recency
    }
}

/// The `hybrid` policy
pub type HybridPolicy = ScoredPolicy<Hybrid>;

impl HybridPolicy {
    pub fn hybrid(scorer: Hybrid) -> Self {
        ScoredPolicy::new(PolicyType::Hybrid.name(), scorer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policies::test_util::{drive, resident};
    use crate::policies::{LfuPolicy, LruPolicy};

    const TRACE: [u64; 12] = [1, 2, 3, 1, 1, 4, 2, 5, 3, 3, 6, 1];

    #[test]
    fn test_closure_scorer_evicts_lowest_score() {
        // Evict the largest key first
        let policy = ScoredPolicy::from_fn("max-key", |s, _| -(s.key as f64));
        let engine = drive(policy, 2, &[1, 2, 3]);
        assert_eq!(resident(&engine), vec![1, 3]);
        assert_eq!(engine.policy().name(), "max-key");
    }

    #[test]
    fn test_ties_break_on_lowest_key() {
        let policy = ScoredPolicy::from_fn("flat", |_, _| 0.0);
        let engine = drive(policy, 3, &[5, 3, 9, 1]);
        assert_eq!(resident(&engine), vec![1, 5, 9]);
    }

    #[test]
    fn test_recency_only_matches_lru() {
        let hybrid = drive(HybridPolicy::hybrid(Hybrid::new(0.0, 1.0)), 3, &TRACE);
        let lru = drive(LruPolicy::new(), 3, &TRACE);
        assert_eq!(hybrid.stats(), lru.stats());
        assert_eq!(resident(&hybrid), resident(&lru));
    }

    #[test]
    fn test_frequency_only_prefers_hot_objects() {
        let hybrid = drive(HybridPolicy::hybrid(Hybrid::new(1.0, 0.0)), 3, &TRACE);
        let lfu = drive(LfuPolicy::new(), 3, &TRACE);
        assert!(hybrid.contains(1));
        assert!(lfu.contains(1));
    }

    #[test]
    fn test_object_stats_follow_requests() {
        let engine = drive(HybridPolicy::hybrid(Hybrid::default()), 4, &[7, 8, 7, 7]);
        let stats = engine.policy().object_stats(7).copied();
        assert_eq!(
            stats,
            Some(ObjectStats { key: 7, size: 1, frequency: 3, last_access: 4, inserted_at: 1 })
        );
        assert_eq!(engine.policy().metadata_len(), 2);
    }
}
