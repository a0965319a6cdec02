//! Parallel evaluation of many policies over one trace.
//!
//! Each job runs on a rayon worker with its own engine and policy built
//! from scratch; the only shared state is the read-only request slice.

use std::str::FromStr;

use rayon::prelude::*;
use serde::Serialize;
use tracing::info;

use crate::error::{Result, SimError};
use crate::params::ParamSet;
use crate::policies::PolicyType;
use crate::sim::evaluate;
use crate::stats::CacheStats;
use crate::CacheObject;

/// One (policy, params) combination to evaluate
#[derive(Debug, Clone, PartialEq)]
pub struct SweepJob {
    pub policy: PolicyType,
    pub params: ParamSet,
}

impl SweepJob {
    pub fn new(policy: PolicyType, params: ParamSet) -> Self {
        Self { policy, params }
    }

    /// Parse `policy` or `policy:name=value,...`, checking the given
    /// parameters against a cache of at most `capacity`.
    ///
    /// Only the named parameters are kept; the rest take the defaults of
    /// the capacity the sweep runs at.
    pub fn parse(text: &str, capacity: u64) -> Result<Self> {
        let (name, params) = text.split_once(':').unwrap_or((text, ""));
        let policy = PolicyType::from_str(name)?;
        let params = policy.parameter_space(capacity).parse_assignments(params)?;
        Ok(Self { policy, params })
    }
}

/// Outcome of one sweep job
#[derive(Debug, Serialize)]
pub struct SweepResult {
    pub policy: String,
    pub capacity: u64,
    /// Full parameter set, defaults filled in
    pub params: ParamSet,
    pub stats: CacheStats,
    pub miss_ratio: f64,
}

/// Evaluate every job over `requests`; results keep the order of `jobs`.
///
/// Every job runs to completion. If any fail, the error of the first
/// failing job in job order is returned.
pub fn sweep(requests: &[CacheObject], capacity: u64, jobs: &[SweepJob]) -> Result<Vec<SweepResult>> {
    if requests.is_empty() {
        return Err(SimError::NoRequests);
    }
    info!(jobs = jobs.len(), requests = requests.len(), capacity, "starting sweep");

    let results: Vec<Result<SweepResult>> = jobs
        .par_iter()
        .map(|job| -> Result<SweepResult> {
            let params = job.policy.parameter_space(capacity).validate(&job.params)?;
            let stats = evaluate(requests, job.policy, capacity, &params)?;
            let miss_ratio = stats.miss_ratio()?;
            Ok(SweepResult {
                policy: job.policy.name().to_string(),
                capacity,
                params,
                stats,
                miss_ratio,
            })
        })
        .collect();
    results.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ParamError;
    use crate::params::ParamValue;

    fn requests() -> Vec<CacheObject> {
        (0..2_000u64).map(|i| CacheObject::unit((i * 31 + i / 7) % 97)).collect()
    }

    #[test]
    fn test_parse_job() {
        let job = SweepJob::parse("slru:n-seg=2", 10).unwrap();
        assert_eq!(job.policy, PolicyType::Slru);
        assert_eq!(job.params.get_i64("n-seg"), Some(2));

        let plain = SweepJob::parse("LRU", 10).unwrap();
        assert_eq!(plain.policy, PolicyType::Lru);
        assert!(plain.params.is_empty());

        assert!(matches!(SweepJob::parse("nope", 10), Err(SimError::UnknownPolicy(_))));
        assert!(matches!(
            SweepJob::parse("clock:bits=2", 10),
            Err(SimError::Param(ParamError::Unknown { .. }))
        ));
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let requests = requests();
        let jobs: Vec<_> = PolicyType::all()
            .iter()
            .map(|&policy| SweepJob::new(policy, ParamSet::new()))
            .collect();
        let results = sweep(&requests, 20, &jobs).unwrap();

        assert_eq!(results.len(), jobs.len());
        for (job, result) in jobs.iter().zip(&results) {
            assert_eq!(result.policy, job.policy.name());
            let sequential = evaluate(&requests, job.policy, 20, &job.params).unwrap();
            assert_eq!(result.stats, sequential);
        }
    }

    #[test]
    fn test_first_failure_in_job_order_is_reported() {
        let requests = requests();
        let mut jobs: Vec<_> = (0..16).map(|_| SweepJob::new(PolicyType::Lru, ParamSet::new())).collect();
        // Both are out of range at capacity 20
        jobs[1] = SweepJob::new(PolicyType::Slru, ParamSet::new().with("n-seg", ParamValue::Int(50)));
        jobs[15] = SweepJob::new(PolicyType::Clock, ParamSet::new().with("n-bit-counter", ParamValue::Int(99)));

        for _ in 0..20 {
            match sweep(&requests, 20, &jobs) {
                Err(SimError::Param(ParamError::OutOfRange { name, .. })) => assert_eq!(name, "n-seg"),
                other => panic!("unexpected sweep outcome: {other:?}"),
            }
        }
    }

    #[test]
    fn test_job_defaults_follow_sweep_capacity() {
        // Checked against a wide bound, then run on a tiny cache
        let job = SweepJob::parse("slru", u64::MAX).unwrap();
        assert!(job.params.is_empty());
        let results = sweep(&requests(), 2, &[job]).unwrap();
        assert_eq!(results[0].capacity, 2);
        assert_eq!(results[0].params.get_i64("n-seg"), Some(2));
    }

    #[test]
    fn test_empty_trace_is_degenerate() {
        let jobs = vec![SweepJob::new(PolicyType::Lru, ParamSet::new())];
        assert!(matches!(sweep(&[], 10, &jobs), Err(SimError::NoRequests)));
    }
}
