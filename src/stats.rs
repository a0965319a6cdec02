//! Simulation statistics and reporting.
//!
//! [`CacheStats`] holds the running counters owned by the cache engine.
//! [`SimReport`] turns a finished run into a stable, parseable line or a
//! JSON document. Ratios over an empty run are an error, never 0 or 1.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};
use crate::params::ParamSet;

/// Struct holding the counters of one simulation run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Requests processed so far (the logical clock)
    pub requests: u64,
    pub hits: u64,
    pub misses: u64,
    /// Objects removed to make room for an insertion
    pub evictions: u64,
    pub insertions: u64,
    /// Misses for objects larger than the whole cache, which are never admitted
    pub bypasses: u64,
    pub bytes_requested: u64,
    pub bytes_missed: u64,
}

impl CacheStats {
    /// Ratio of misses to processed requests.
    ///
    /// Fails with [`SimError::NoRequests`] when nothing was processed.
    pub fn miss_ratio(&self) -> Result<f64> {
        ratio(self.misses, self.hits + self.misses)
    }

    /// Ratio of hits to processed requests
    pub fn hit_ratio(&self) -> Result<f64> {
        ratio(self.hits, self.hits + self.misses)
    }

    /// Ratio of missed bytes to requested bytes
    pub fn byte_miss_ratio(&self) -> Result<f64> {
        ratio(self.bytes_missed, self.bytes_requested)
    }

    /// True when `hits + misses == requests`
    pub fn is_balanced(&self) -> bool {
        self.hits + self.misses == self.requests
    }

    /// Reset all tracked statistics to zero
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub(crate) fn record_request(&mut self, size: u64) {
        self.requests += 1;
        self.bytes_requested += size;
    }

    pub(crate) fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub(crate) fn record_miss(&mut self, size: u64) {
        self.misses += 1;
        self.bytes_missed += size;
    }
}

fn ratio(part: u64, total: u64) -> Result<f64> {
    if total == 0 {
        return Err(SimError::NoRequests);
    }
    Ok(part as f64 / total as f64)
}

/// Relative miss-ratio change of `miss_ratio` against `baseline`.
///
/// Positive when `miss_ratio` is better (lower) than the baseline. The
/// difference is normalized by the larger of the two ratios, so the value
/// lies in `[-1, 1]`.
pub fn miss_ratio_reduction(miss_ratio: f64, baseline: f64) -> f64 {
    if miss_ratio == baseline {
        return 0.0;
    }
    (baseline - miss_ratio) / miss_ratio.max(baseline)
}

/// Summary of one completed simulation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimReport {
    pub trace: String,
    pub policy: String,
    pub capacity: u64,
    /// Set when `capacity` was derived from the trace's distinct objects
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity_fraction: Option<f64>,
    pub params: ParamSet,
    pub stats: CacheStats,
    pub miss_ratio: f64,
    pub byte_miss_ratio: f64,
}

impl SimReport {
    /// Build a report; fails when the run processed no requests
    pub fn new(
        trace: impl Into<String>,
        policy: impl Into<String>,
        capacity: u64,
        params: ParamSet,
        stats: CacheStats,
    ) -> Result<Self> {
        let miss_ratio = stats.miss_ratio()?;
        let byte_miss_ratio = stats.byte_miss_ratio()?;
        Ok(Self {
            trace: trace.into(),
            policy: policy.into(),
            capacity,
            capacity_fraction: None,
            params,
            stats,
            miss_ratio,
            byte_miss_ratio,
        })
    }

    /// Render the report as pretty-printed JSON
    pub fn to_json(&self) -> String {
        // Serializing plain counters and strings cannot fail
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

impl fmt::Display for SimReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} cache size {}, {} req, miss ratio {:.4}, byte miss ratio {:.4}",
            self.trace,
            self.policy,
            self.capacity,
            self.stats.requests,
            self.miss_ratio,
            self.byte_miss_ratio
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(hits: u64, misses: u64) -> CacheStats {
        CacheStats {
            requests: hits + misses,
            hits,
            misses,
            bytes_requested: hits + misses,
            bytes_missed: misses,
            ..CacheStats::default()
        }
    }

    #[test]
    fn test_miss_ratio_of_empty_run_is_an_error() {
        let empty = CacheStats::default();
        assert!(matches!(empty.miss_ratio(), Err(SimError::NoRequests)));
        assert!(matches!(empty.hit_ratio(), Err(SimError::NoRequests)));
        assert!(matches!(empty.byte_miss_ratio(), Err(SimError::NoRequests)));
    }

    #[test]
    fn test_ratios() {
        let s = stats(1, 2);
        assert!((s.miss_ratio().unwrap() - 2.0 / 3.0).abs() < 1e-12);
        assert!((s.hit_ratio().unwrap() - 1.0 / 3.0).abs() < 1e-12);
        assert!(s.is_balanced());
    }

    #[test]
    fn test_reset() {
        let mut s = stats(5, 5);
        s.reset();
        assert_eq!(s, CacheStats::default());
    }

    #[test]
    fn test_miss_ratio_reduction() {
        assert_eq!(miss_ratio_reduction(0.5, 0.5), 0.0);
        assert!((miss_ratio_reduction(0.25, 0.5) - 0.5).abs() < 1e-12);
        assert!((miss_ratio_reduction(0.5, 0.25) + 0.5).abs() < 1e-12);
        assert_eq!(miss_ratio_reduction(0.0, 0.0), 0.0);
    }

    #[test]
    fn test_report_line_is_stable() {
        let report = SimReport::new("w.oracleGeneral", "lru", 100, ParamSet::new(), stats(3, 1)).unwrap();
        assert_eq!(
            report.to_string(),
            "w.oracleGeneral lru cache size 100, 4 req, miss ratio 0.2500, byte miss ratio 0.2500"
        );
        // The miss ratio is the third comma-separated field's last token
        let field = report.to_string().split(',').nth(2).unwrap().trim().to_string();
        let parsed: f64 = field.split_whitespace().nth(2).unwrap().parse().unwrap();
        assert_eq!(parsed, 0.25);
    }

    #[test]
    fn test_report_requires_requests() {
        let err = SimReport::new("t", "fifo", 1, ParamSet::new(), CacheStats::default()).unwrap_err();
        assert!(matches!(err, SimError::NoRequests));
    }

    #[test]
    fn test_report_json_contains_ratio() {
        let report = SimReport::new("t", "fifo", 2, ParamSet::new(), stats(0, 4)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&report.to_json()).unwrap();
        assert_eq!(value["miss_ratio"], 1.0);
        assert_eq!(value["stats"]["misses"], 4);
    }
}
