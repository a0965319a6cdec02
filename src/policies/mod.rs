//! Eviction policy implementations
//!
//! This module contains the eviction policies that ship with the simulator.
//! Each implements the `EvictionPolicy` trait and keeps its own per-object
//! metadata. `PolicyType` names them, declares their tunable parameters and
//! builds them, so policies can be selected by name at runtime.

use std::fmt;
use std::str::FromStr;

use crate::error::{Result, SimError};
use crate::params::{ParamSet, ParamSpace, ParamSpec};
use crate::BoxedPolicy;

pub mod clock;
pub mod fifo;
pub mod lfu;
pub mod lru;
pub mod lru_prob;
pub mod mru;
pub mod order;
pub mod random;
pub mod s3fifo;
pub mod scored;
pub mod slru;
pub mod two_q;

// Re-export all policy implementations
pub use clock::ClockPolicy;
pub use fifo::FifoPolicy;
pub use lfu::LfuPolicy;
pub use lru::LruPolicy;
pub use lru_prob::LruProbPolicy;
pub use mru::MruPolicy;
pub use random::{RandomLruPolicy, RandomPolicy};
pub use s3fifo::S3FifoPolicy;
pub use scored::{Hybrid, HybridPolicy, ObjectStats, ScoredPolicy, Scorer};
pub use slru::SlruPolicy;
pub use two_q::TwoQPolicy;

/// `ratio` of `capacity`, rounded down but never below 1
pub(crate) fn share_of(capacity: u64, ratio: f64) -> u64 {
    ((capacity as f64 * ratio.max(0.0)).floor() as u64).max(1)
}

/// Enumeration of available eviction policies
///
/// This enum allows dynamic selection of policies at runtime and is the
/// single place that knows every policy's name and parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolicyType {
    /// First In, First Out - evicts objects in insertion order
    Fifo,
    /// Least Recently Used - evicts the object referenced longest ago
    Lru,
    /// Most Recently Used - evicts the most recently referenced object
    Mru,
    /// Least Frequently Used - evicts the object with the fewest references
    Lfu,
    /// Clock - LRU approximation with n-bit reference counters
    Clock,
    /// Random - evicts a uniformly random object
    Random,
    /// Sampled LRU - evicts the least recent of n random samples
    RandomLru,
    /// Probabilistic LRU - promotes on hit with a fixed probability
    LruProb,
    /// Segmented LRU
    Slru,
    /// 2Q - FIFO admission queue, LRU main queue, ghost history
    TwoQ,
    /// S3-FIFO - small, main and ghost FIFO queues
    S3Fifo,
    /// Weighted frequency and recency score
    Hybrid,
}

impl PolicyType {
    /// Returns the name used to select the policy
    pub fn name(&self) -> &'static str {
        match self {
            PolicyType::Fifo => "fifo",
            PolicyType::Lru => "lru",
            PolicyType::Mru => "mru",
            PolicyType::Lfu => "lfu",
            PolicyType::Clock => "clock",
            PolicyType::Random => "random",
            PolicyType::RandomLru => "randomlru",
            PolicyType::LruProb => "lru-prob",
            PolicyType::Slru => "slru",
            PolicyType::TwoQ => "twoq",
            PolicyType::S3Fifo => "s3fifo",
            PolicyType::Hybrid => "hybrid",
        }
    }

    /// Returns a description of the policy's behavior
    pub fn description(&self) -> &'static str {
        match self {
            PolicyType::Fifo => "Evicts objects in first-in-first-out order",
            PolicyType::Lru => "Evicts the least recently used object",
            PolicyType::Mru => "Evicts the most recently used object",
            PolicyType::Lfu => "Evicts the least frequently used object",
            PolicyType::Clock => "Evicts the first object whose reference counter is zero",
            PolicyType::Random => "Evicts a random object",
            PolicyType::RandomLru => "Evicts the least recently used of n sampled objects",
            PolicyType::LruProb => "LRU that promotes on hit with probability prob",
            PolicyType::Slru => "LRU split into n segments; hits promote one segment up",
            PolicyType::TwoQ => "FIFO probation queue, LRU main queue and ghost history",
            PolicyType::S3Fifo => "Small and main FIFO queues with a ghost queue",
            PolicyType::Hybrid => "Evicts the lowest weighted frequency and recency score",
        }
    }

    /// Returns all available policy types
    pub fn all() -> &'static [PolicyType] {
        &[
            PolicyType::Fifo,
            PolicyType::Lru,
            PolicyType::Mru,
            PolicyType::Lfu,
            PolicyType::Clock,
            PolicyType::Random,
            PolicyType::RandomLru,
            PolicyType::LruProb,
            PolicyType::Slru,
            PolicyType::TwoQ,
            PolicyType::S3Fifo,
            PolicyType::Hybrid,
        ]
    }

    /// Look a policy up by name, ignoring case
    pub fn from_name(name: &str) -> Option<PolicyType> {
        let name = name.trim().to_ascii_lowercase();
        let alias = match name.as_str() {
            "2q" => "twoq",
            "random-lru" => "randomlru",
            "s3-fifo" => "s3fifo",
            other => other,
        };
        Self::all().iter().copied().find(|policy| policy.name() == alias)
    }

    /// Parameters of the policy for a cache of `capacity`.
    ///
    /// RNG seeds are declared as settings: they can be set per run but are
    /// never part of the tunable space.
    pub fn parameter_space(&self, capacity: u64) -> ParamSpace {
        let cap = capacity.clamp(1, i64::MAX as u64) as i64;
        let space = ParamSpace::new(self.name());
        let seed = ParamSpec::int(random::DEFAULT_SEED as i64, 0, u32::MAX as i64);
        match self {
            PolicyType::Fifo | PolicyType::Lru | PolicyType::Mru | PolicyType::Lfu => space,
            PolicyType::Clock => space.with(
                "n-bit-counter",
                ParamSpec::int(clock::DEFAULT_COUNTER_BITS as i64, 1, 16),
            ),
            PolicyType::Random => space.with_setting("seed", seed),
            PolicyType::RandomLru => space
                .with("n-samples", ParamSpec::int(RandomLruPolicy::DEFAULT_SAMPLES as i64, 1, 64))
                .with_setting("seed", seed),
            PolicyType::LruProb => space
                .with("prob", ParamSpec::real(LruProbPolicy::DEFAULT_PROB, 0.0001, 1.0))
                .with_setting("seed", seed),
            PolicyType::Slru => space.with(
                "n-seg",
                ParamSpec::int(SlruPolicy::DEFAULT_SEGMENTS as i64, 1, cap),
            ),
            PolicyType::TwoQ => space
                .with("Ain-size-ratio", ParamSpec::real(TwoQPolicy::DEFAULT_AIN_RATIO, 0.0, 1.0))
                .with("Aout-size-ratio", ParamSpec::real(TwoQPolicy::DEFAULT_AOUT_RATIO, 0.0, 1.0)),
            PolicyType::S3Fifo => space
                .with("fifo-size-ratio", ParamSpec::real(S3FifoPolicy::DEFAULT_SMALL_RATIO, 0.0, 1.0))
                .with(
                    "move-to-main-threshold",
                    ParamSpec::int(
                        S3FifoPolicy::DEFAULT_MOVE_TO_MAIN_THRESHOLD as i64,
                        0,
                        cap.saturating_mul(100),
                    ),
                ),
            PolicyType::Hybrid => space
                .with("frequency-weight", ParamSpec::real(Hybrid::DEFAULT_WEIGHT, 0.0, 1.0))
                .with("recency-weight", ParamSpec::real(Hybrid::DEFAULT_WEIGHT, 0.0, 1.0)),
        }
    }

    /// Build a fresh policy instance for a cache of `capacity`.
    ///
    /// `params` should already be validated against
    /// [`parameter_space`](Self::parameter_space); missing values take
    /// their defaults.
    pub fn build(&self, capacity: u64, params: &ParamSet) -> BoxedPolicy {
        match self {
            PolicyType::Fifo => Box::new(FifoPolicy::new()),
            PolicyType::Lru => Box::new(LruPolicy::new()),
            PolicyType::Mru => Box::new(MruPolicy::new()),
            PolicyType::Lfu => Box::new(LfuPolicy::new()),
            PolicyType::Clock => Box::new(ClockPolicy::from_params(params)),
            PolicyType::Random => Box::new(RandomPolicy::from_params(params)),
            PolicyType::RandomLru => Box::new(RandomLruPolicy::from_params(params)),
            PolicyType::LruProb => Box::new(LruProbPolicy::from_params(params)),
            PolicyType::Slru => Box::new(SlruPolicy::from_params(capacity, params)),
            PolicyType::TwoQ => Box::new(TwoQPolicy::from_params(capacity, params)),
            PolicyType::S3Fifo => Box::new(S3FifoPolicy::from_params(capacity, params)),
            PolicyType::Hybrid => Box::new(HybridPolicy::hybrid(Hybrid::from_params(params))),
        }
    }
}

impl fmt::Display for PolicyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PolicyType {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_name(s).ok_or_else(|| SimError::UnknownPolicy(s.to_string()))
    }
}

/// Factory function to create policies by name
///
/// `params` is a `name=value,...` string as accepted by
/// [`ParamSpace::parse`]; an empty string selects the defaults.
pub fn create_policy(name: &str, capacity: u64, params: &str) -> Result<BoxedPolicy> {
    let policy: PolicyType = name.parse()?;
    let params = policy.parameter_space(capacity).parse(params)?;
    Ok(policy.build(capacity, &params))
}

/// Validate `params` for `policy` and build it
pub fn create_policy_with(policy: PolicyType, capacity: u64, params: &ParamSet) -> Result<BoxedPolicy> {
    let params = policy.parameter_space(capacity).validate(params)?;
    Ok(policy.build(capacity, &params))
}

#[cfg(test)]
pub(crate) mod test_util {
    use crate::engine::CacheEngine;
    use crate::{CacheObject, EvictionPolicy, ObjectKey};

    /// Replay unit-size `keys` through a fresh cache
    pub fn drive<P: EvictionPolicy>(policy: P, capacity: u64, keys: &[ObjectKey]) -> CacheEngine<P> {
        let mut engine = CacheEngine::new(policy, capacity).unwrap();
        for &key in keys {
            engine.process(CacheObject::unit(key)).unwrap();
        }
        engine
    }

    /// Resident keys in ascending order
    pub fn resident<P: EvictionPolicy>(engine: &CacheEngine<P>) -> Vec<ObjectKey> {
        engine.snapshot().keys().collect()
    }
}
