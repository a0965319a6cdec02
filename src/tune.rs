//! Parameter tuning.
//!
//! The search itself is delegated to an [`Optimizer`]; this module only
//! fixes the contract around it. The default parameters are always
//! evaluated first and act as the floor: whatever the optimizer reports, the
//! outcome is never worse than the defaults, and an optimizer failure falls
//! back to them instead of failing the run.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::params::{ParamSet, ParamSpace, ParamSpec, ParamValue};
use crate::policies::PolicyType;
use crate::sim::evaluate;
use crate::CacheObject;

/// Miss ratio charged to a trial whose evaluation failed
pub const FAILED_TRIAL_SCORE: f64 = 1.0;

/// One evaluated parameter assignment
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trial {
    pub params: ParamSet,
    pub miss_ratio: f64,
}

/// A search strategy over a parameter space.
///
/// `objective` returns the miss ratio of one assignment (lower is better).
/// The optimizer may call it at most `budget` times and reports the best
/// trial it found, or `None` if it evaluated nothing.
pub trait Optimizer {
    fn optimize(
        &mut self,
        space: &ParamSpace,
        budget: usize,
        objective: &mut dyn FnMut(&ParamSet) -> f64,
    ) -> Result<Option<Trial>>;
}

/// Uniform random sampling of the space with a seeded generator
#[derive(Debug)]
pub struct RandomSearch {
    rng: StdRng,
}

impl RandomSearch {
    pub fn new(seed: u64) -> Self {
        Self { rng: StdRng::seed_from_u64(seed) }
    }

    /// Draw every tunable parameter; settings keep their defaults
    fn sample(&mut self, space: &ParamSpace) -> ParamSet {
        let mut params = space.defaults();
        for (name, spec) in space.iter() {
            let value = match spec {
                ParamSpec::Int { lower, upper, .. } => ParamValue::Int(self.rng.gen_range(*lower..=*upper)),
                ParamSpec::Real { lower, upper, .. } => ParamValue::Real(self.rng.gen_range(*lower..=*upper)),
                ParamSpec::Categorical { default, choices } => {
                    ParamValue::Str(choices.choose(&mut self.rng).unwrap_or(default).clone())
                }
            };
            params.set(name, value);
        }
        params
    }
}

impl Optimizer for RandomSearch {
    fn optimize(
        &mut self,
        space: &ParamSpace,
        budget: usize,
        objective: &mut dyn FnMut(&ParamSet) -> f64,
    ) -> Result<Option<Trial>> {
        if space.is_empty() {
            return Ok(None);
        }
        let mut best: Option<Trial> = None;
        for _ in 0..budget {
            let params = self.sample(space);
            let miss_ratio = objective(&params);
            debug!(params = %params, miss_ratio, "trial");
            if best.as_ref().is_none_or(|b| miss_ratio < b.miss_ratio) {
                best = Some(Trial { params, miss_ratio });
            }
        }
        Ok(best)
    }
}

/// Result of tuning one policy
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TuneOutcome {
    pub policy: String,
    pub default_params: ParamSet,
    pub default_miss_ratio: f64,
    /// Parameters to use; equal to the defaults after a fallback
    pub params: ParamSet,
    pub miss_ratio: f64,
    /// Objective evaluations made by the optimizer
    pub trials: usize,
    /// True when the defaults were kept
    pub fell_back: bool,
}

/// Tune the parameters of `space` against `objective`.
///
/// 1. The defaults are evaluated; an error here is returned.
/// 2. The optimizer searches with at most `budget` evaluations. A trial that
///    fails scores [`FAILED_TRIAL_SCORE`].
/// 3. The defaults are kept if the optimizer fails, finds nothing, or its
///    best trial is worse than the defaults.
pub fn tune<F>(space: &ParamSpace, optimizer: &mut dyn Optimizer, budget: usize, mut objective: F) -> Result<TuneOutcome>
where
    F: FnMut(&ParamSet) -> Result<f64>,
{
    let default_params = space.defaults();
    let default_miss_ratio = objective(&default_params)?;
    info!(policy = %space.policy, default_miss_ratio, budget, "tuning");

    let mut trials = 0;
    let mut scored = |params: &ParamSet| {
        trials += 1;
        objective(params).unwrap_or_else(|e| {
            debug!(params = %params, error = %e, "trial failed");
            FAILED_TRIAL_SCORE
        })
    };
    let found = optimizer.optimize(space, budget, &mut scored);

    let fallback = |trials| TuneOutcome {
        policy: space.policy.clone(),
        default_params: default_params.clone(),
        default_miss_ratio,
        params: default_params.clone(),
        miss_ratio: default_miss_ratio,
        trials,
        fell_back: true,
    };

    let outcome = match found {
        Ok(Some(best)) if best.miss_ratio <= default_miss_ratio => TuneOutcome {
            policy: space.policy.clone(),
            default_params: default_params.clone(),
            default_miss_ratio,
            params: best.params,
            miss_ratio: best.miss_ratio,
            trials,
            fell_back: false,
        },
        Ok(Some(best)) => {
            info!(tuned = best.miss_ratio, default_miss_ratio, "tuned parameters are worse, keeping defaults");
            fallback(trials)
        }
        Ok(None) => fallback(trials),
        Err(e) => {
            warn!(policy = %space.policy, error = %e, "optimizer failed, keeping default parameters");
            fallback(trials)
        }
    };
    Ok(outcome)
}

/// Tune `policy` for a cache of `capacity` over in-memory `requests`
pub fn tune_policy(
    requests: &[CacheObject],
    policy: PolicyType,
    capacity: u64,
    optimizer: &mut dyn Optimizer,
    budget: usize,
) -> Result<TuneOutcome> {
    let space = policy.parameter_space(capacity);
    tune(&space, optimizer, budget, |params| evaluate(requests, policy, capacity, params)?.miss_ratio())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SimError;

    fn space() -> ParamSpace {
        ParamSpace::new("demo").with("x", ParamSpec::real(0.5, 0.0, 1.0))
    }

    /// Optimizer that always fails
    struct Broken;

    impl Optimizer for Broken {
        fn optimize(&mut self, _: &ParamSpace, _: usize, _: &mut dyn FnMut(&ParamSet) -> f64) -> Result<Option<Trial>> {
            Err(SimError::Optimizer("diverged".into()))
        }
    }

    /// Optimizer that reports a fixed trial without searching
    struct Fixed(Trial);

    impl Optimizer for Fixed {
        fn optimize(&mut self, _: &ParamSpace, _: usize, _: &mut dyn FnMut(&ParamSet) -> f64) -> Result<Option<Trial>> {
            Ok(Some(self.0.clone()))
        }
    }

    #[test]
    fn test_random_search_improves_on_defaults() {
        // Minimum at x = 0
        let objective = |p: &ParamSet| Ok(p.get_f64("x").unwrap_or(1.0));
        let outcome = tune(&space(), &mut RandomSearch::new(42), 50, objective).unwrap();

        assert!(!outcome.fell_back);
        assert_eq!(outcome.trials, 50);
        assert!(outcome.miss_ratio < 0.5);
        assert_eq!(outcome.default_miss_ratio, 0.5);
    }

    #[test]
    fn test_optimizer_error_falls_back_to_defaults() {
        let outcome = tune(&space(), &mut Broken, 10, |_| Ok(0.3)).unwrap();
        assert!(outcome.fell_back);
        assert_eq!(outcome.miss_ratio, 0.3);
        assert_eq!(outcome.params, space().defaults());
    }

    #[test]
    fn test_worse_result_falls_back_to_defaults() {
        let worse = Trial { params: ParamSet::new().with("x", ParamValue::Real(0.9)), miss_ratio: 0.8 };
        let outcome = tune(&space(), &mut Fixed(worse), 10, |_| Ok(0.4)).unwrap();
        assert!(outcome.fell_back);
        assert_eq!(outcome.miss_ratio, 0.4);
    }

    #[test]
    fn test_default_evaluation_error_propagates() {
        let err = tune(&space(), &mut RandomSearch::new(1), 10, |_| Err(SimError::NoRequests)).unwrap_err();
        assert!(matches!(err, SimError::NoRequests));
    }

    #[test]
    fn test_failed_trials_score_one() {
        let mut calls = 0;
        let objective = |_: &ParamSet| {
            calls += 1;
            if calls == 1 { Ok(0.2) } else { Err(SimError::NoRequests) }
        };
        let outcome = tune(&space(), &mut RandomSearch::new(3), 5, objective).unwrap();
        // Every trial scored 1.0, so the defaults win
        assert!(outcome.fell_back);
        assert_eq!(outcome.miss_ratio, 0.2);
        assert_eq!(outcome.trials, 5);
    }

    #[test]
    fn test_random_search_is_seeded() {
        let mut seen_a = Vec::new();
        let mut seen_b = Vec::new();
        let space = PolicyType::S3Fifo.parameter_space(100);
        RandomSearch::new(9)
            .optimize(&space, 5, &mut |p: &ParamSet| {
                seen_a.push(p.clone());
                0.5
            })
            .unwrap();
        RandomSearch::new(9)
            .optimize(&space, 5, &mut |p: &ParamSet| {
                seen_b.push(p.clone());
                0.5
            })
            .unwrap();
        assert_eq!(seen_a, seen_b);
        assert!(seen_a.iter().all(|p| space.validate(p).is_ok()));
    }

    #[test]
    fn test_tune_policy_never_worse_than_defaults() {
        let requests: Vec<_> = (0..400u64).map(|i| CacheObject::unit((i * 13 + i / 5) % 37)).collect();
        let outcome = tune_policy(&requests, PolicyType::Slru, 10, &mut RandomSearch::new(42), 8).unwrap();
        assert!(outcome.miss_ratio <= outcome.default_miss_ratio);
    }

    #[test]
    fn test_seed_is_never_searched() {
        let requests: Vec<_> = (0..300u64).map(|i| CacheObject::unit((i * 7 + i / 3) % 29)).collect();

        // Random has nothing but a seed, so there is nothing to tune
        let outcome = tune_policy(&requests, PolicyType::Random, 8, &mut RandomSearch::new(42), 10).unwrap();
        assert!(outcome.fell_back);
        assert_eq!(outcome.trials, 0);

        let space = PolicyType::RandomLru.parameter_space(8);
        let mut seeds = Vec::new();
        RandomSearch::new(5)
            .optimize(&space, 20, &mut |p: &ParamSet| {
                seeds.push(p.get_i64("seed"));
                0.5
            })
            .unwrap();
        assert!(seeds.iter().all(|&seed| seed == Some(crate::policies::random::DEFAULT_SEED as i64)));
    }
}
