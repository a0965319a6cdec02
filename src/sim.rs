//! Run-level entry points.
//!
//! These tie the pieces together: open the trace, build a fresh policy and
//! engine, replay once and summarize. Every call owns all of its state, so
//! concurrent runs never interfere.

use std::collections::HashSet;
use std::hash::Hash;
use std::path::Path;

use tracing::{debug, info};

use crate::config::{Capacity, SimConfig};
use crate::engine::CacheEngine;
use crate::error::{Result, TraceError};
use crate::params::ParamSet;
use crate::policies::{create_policy_with, PolicyType};
use crate::stats::{CacheStats, SimReport};
use crate::trace::{self, CsvOptions, Replayer, TraceFormat, TraceRecord};
use crate::{BoxedPolicy, CacheObject, SizeMode};

/// Replay one trace with one policy and return the miss ratio.
///
/// `params` uses the `name=value,...` form; an empty string selects the
/// policy defaults. Object sizes are ignored, so `capacity` counts objects.
///
/// # Errors
/// Fails on an unreadable trace, an unknown policy or bad parameters, a
/// policy contract violation, or a trace without requests.
pub fn simulate(
    trace_path: impl AsRef<Path>,
    format: TraceFormat,
    policy: &str,
    capacity: u64,
    params: &str,
) -> Result<f64> {
    let policy_type: PolicyType = policy.parse()?;
    let params = policy_type.parameter_space(capacity).parse(params)?;
    let config = SimConfig::new(trace_path.as_ref(), format, policy_type.name(), capacity).with_params(params);
    Ok(run(&config)?.miss_ratio)
}

/// Execute the run described by `config`
pub fn run(config: &SimConfig) -> Result<SimReport> {
    config.validate()?;
    let capacity = match config.capacity.absolute() {
        Some(capacity) => capacity,
        None => {
            let distinct = count_distinct(config)?;
            let capacity = config.capacity.resolve(distinct)?;
            info!(distinct, fraction = %config.capacity, capacity, "capacity resolved from trace");
            capacity
        }
    };
    let (policy, params) = config.validate_for(capacity)?;
    info!(
        trace = %config.trace.path.display(),
        format = %config.trace.format,
        %policy,
        capacity,
        params = %params,
        "starting simulation"
    );

    let engine = CacheEngine::new(policy.build(capacity, &params), capacity)?;
    let path = config.trace.path.as_path();
    let stats = match config.trace.format {
        TraceFormat::OracleGeneral => replay_trace::<u64, _>(engine, config, trace::open_oracle(path)?)?,
        TraceFormat::Csv => {
            replay_trace::<String, _>(engine, config, trace::open_csv(path, config.trace.csv.clone())?)?
        }
    };

    let mut report = SimReport::new(config.trace_name(), policy.name(), capacity, params, stats)?;
    if let Capacity::Fraction { fraction } = config.capacity {
        report.capacity_fraction = Some(fraction);
    }
    info!(
        policy = %policy,
        requests = report.stats.requests,
        miss_ratio = report.miss_ratio,
        byte_miss_ratio = report.byte_miss_ratio,
        "simulation finished"
    );
    Ok(report)
}

fn replay_trace<K, I>(mut engine: CacheEngine<BoxedPolicy>, config: &SimConfig, records: I) -> Result<CacheStats>
where
    K: Hash + Eq,
    I: IntoIterator<Item = std::result::Result<TraceRecord<K>, TraceError>>,
{
    let mut replayer = Replayer::new(config.size_mode);
    if let Some(interval) = config.report_interval {
        replayer = replayer.with_report_interval(interval);
    }
    replayer.replay(&mut engine, records)?;
    debug!(objects = replayer.registry().len(), "distinct objects in trace");
    Ok(engine.finish())
}

/// Distinct objects in the configured trace, from one pass through a registry
fn count_distinct(config: &SimConfig) -> Result<usize> {
    let path = config.trace.path.as_path();
    match config.trace.format {
        TraceFormat::OracleGeneral => distinct_in::<u64, _>(config.size_mode, trace::open_oracle(path)?),
        TraceFormat::Csv => distinct_in::<String, _>(config.size_mode, trace::open_csv(path, config.trace.csv.clone())?),
    }
}

fn distinct_in<K, I>(mode: SizeMode, records: I) -> Result<usize>
where
    K: Hash + Eq,
    I: IntoIterator<Item = std::result::Result<TraceRecord<K>, TraceError>>,
{
    let mut replayer = Replayer::new(mode);
    for record in records {
        replayer.resolve(record?)?;
    }
    Ok(replayer.registry().len())
}

/// Number of distinct objects among `requests`
pub fn distinct_objects(requests: &[CacheObject]) -> usize {
    requests.iter().map(|r| r.key).collect::<HashSet<_>>().len()
}

/// Absolute capacity of `capacity` for in-memory `requests`
pub fn resolve_capacity(capacity: Capacity, requests: &[CacheObject]) -> Result<u64> {
    let distinct = match capacity {
        Capacity::Objects(_) => 0,
        Capacity::Fraction { .. } => distinct_objects(requests),
    };
    capacity.resolve(distinct)
}

/// Read and resolve a whole trace into memory.
///
/// Useful when the same requests are evaluated many times, as tuning and
/// sweeps do.
pub fn load_requests(
    path: impl AsRef<Path>,
    format: TraceFormat,
    csv: &CsvOptions,
    mode: SizeMode,
) -> Result<Vec<CacheObject>> {
    let path = path.as_ref();
    let requests = match format {
        TraceFormat::OracleGeneral => {
            let mut replayer = Replayer::<u64>::new(mode);
            replayer.requests(trace::open_oracle(path)?).collect::<std::result::Result<Vec<_>, _>>()?
        }
        TraceFormat::Csv => {
            let mut replayer = Replayer::<String>::new(mode);
            replayer
                .requests(trace::open_csv(path, csv.clone())?)
                .collect::<std::result::Result<Vec<_>, _>>()?
        }
    };
    info!(path = %path.display(), requests = requests.len(), "trace loaded");
    Ok(requests)
}

/// Replay in-memory requests through a fresh engine and policy
pub fn evaluate(requests: &[CacheObject], policy: PolicyType, capacity: u64, params: &ParamSet) -> Result<CacheStats> {
    let mut engine = CacheEngine::new(create_policy_with(policy, capacity, params)?, capacity)?;
    engine.replay(requests.iter().copied())?;
    Ok(engine.finish())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::error::SimError;
    use crate::trace::oracle::encode_record;

    fn oracle_trace(ids: &[u64]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for (i, &id) in ids.iter().enumerate() {
            file.write_all(&encode_record(i as u32, id, 100, -1)).unwrap();
        }
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_simulate_oracle_trace() {
        let file = oracle_trace(&[1, 2, 1, 3, 1]);
        let miss_ratio = simulate(file.path(), TraceFormat::OracleGeneral, "lru", 2, "").unwrap();
        assert_eq!(miss_ratio, 3.0 / 5.0);
    }

    #[test]
    fn test_run_report() {
        let file = oracle_trace(&[1, 2, 3, 1]);
        let config = SimConfig::new(file.path(), TraceFormat::OracleGeneral, "FIFO", 2);
        let report = run(&config).unwrap();

        assert_eq!(report.policy, "fifo");
        assert_eq!(report.stats.requests, 4);
        assert_eq!(report.stats.evictions, 2);
        assert_eq!(report.miss_ratio, 1.0);
        assert!(report.to_string().contains("fifo cache size 2, 4 req, miss ratio 1.0000"));
    }

    #[test]
    fn test_size_aware_run_counts_bytes() {
        let file = oracle_trace(&[1, 2, 1]);
        let config = SimConfig::new(file.path(), TraceFormat::OracleGeneral, "lru", 150)
            .with_size_mode(SizeMode::ConsiderObjectSize);
        let report = run(&config).unwrap();
        // Every object is 100 bytes, so only one fits
        assert_eq!(report.stats.hits, 0);
        assert_eq!(report.stats.bytes_requested, 300);
    }

    #[test]
    fn test_empty_trace_has_no_ratio() {
        let file = oracle_trace(&[]);
        let err = simulate(file.path(), TraceFormat::OracleGeneral, "lru", 2, "").unwrap_err();
        assert!(matches!(err, SimError::NoRequests));
    }

    #[test]
    fn test_evaluate_is_isolated_per_call() {
        let requests: Vec<_> = [1, 2, 3, 1, 2, 3].into_iter().map(CacheObject::unit).collect();
        let params = ParamSet::new();
        let first = evaluate(&requests, PolicyType::Lru, 2, &params).unwrap();
        let second = evaluate(&requests, PolicyType::Lru, 2, &params).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.misses, 6);
    }

    #[test]
    fn test_load_requests_issues_dense_keys() {
        let file = oracle_trace(&[40, 7, 40, 9]);
        let requests = load_requests(file.path(), TraceFormat::OracleGeneral, &CsvOptions::default(), SizeMode::IgnoreObjectSize)
            .unwrap();
        let keys: Vec<_> = requests.iter().map(|r| r.key).collect();
        assert_eq!(keys, vec![0, 1, 0, 2]);
        assert!(requests.iter().all(|r| r.size == 1));
    }

    #[test]
    fn test_relative_capacity_follows_distinct_objects() {
        // Ten distinct objects, each requested twice
        let ids: Vec<u64> = (0..10).chain(0..10).map(|i| 100 + i).collect();
        let file = oracle_trace(&ids);

        let quarter = SimConfig::new(file.path(), TraceFormat::OracleGeneral, "lru", 0)
            .with_capacity(Capacity::fraction(0.25));
        let report = run(&quarter).unwrap();
        assert_eq!(report.capacity, 2);
        assert_eq!(report.capacity_fraction, Some(0.25));
        assert!(report.to_json().contains("\"capacity_fraction\": 0.25"));

        let tiny = quarter.clone().with_capacity(Capacity::fraction(0.01));
        let report = run(&tiny).unwrap();
        assert_eq!(report.capacity, 1);
        assert_eq!(report.stats.misses, 20);

        let absolute = run(&quarter.with_capacity(Capacity::Objects(2))).unwrap();
        assert_eq!(absolute.capacity_fraction, None);
        assert!(!absolute.to_json().contains("capacity_fraction"));
    }

    #[test]
    fn test_relative_capacity_rejects_bad_fraction_before_reading() {
        let config = SimConfig::new("/nonexistent/trace.bin", TraceFormat::OracleGeneral, "lru", 0)
            .with_capacity(Capacity::fraction(-1.0));
        assert!(matches!(run(&config), Err(SimError::Config(_))));
    }

    #[test]
    fn test_resolve_capacity_for_loaded_requests() {
        let requests: Vec<_> = [3, 1, 3, 4, 1, 5, 9, 2, 6, 5, 3, 5, 8, 7, 0]
            .into_iter()
            .map(CacheObject::unit)
            .collect();
        assert_eq!(distinct_objects(&requests), 10);
        assert_eq!(resolve_capacity(Capacity::fraction(0.25), &requests).unwrap(), 2);
        assert_eq!(resolve_capacity(Capacity::fraction(0.01), &requests).unwrap(), 1);
        assert_eq!(resolve_capacity(Capacity::Objects(6), &requests).unwrap(), 6);
        assert!(matches!(resolve_capacity(Capacity::Objects(0), &requests), Err(SimError::ZeroCapacity)));
    }
}
