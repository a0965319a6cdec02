//! Trace readers and the trace replayer
//!
//! Traces are read lazily, one record at a time. Two on-disk formats are
//! supported:
//! - `oracleGeneral`: fixed 24-byte little-endian binary records
//! - `csv`: delimited text with configurable key, size and time columns
//!
//! The [`Replayer`] resolves records through an [`ObjectRegistry`], enforces
//! timestamp order and feeds the cache engine one request at a time.

use std::fmt;
use std::fs::File;
use std::hash::Hash;
use std::io::BufReader;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::engine::CacheEngine;
use crate::error::{Result, TraceError};
use crate::registry::ObjectRegistry;
use crate::{CacheObject, EvictionPolicy, SizeMode};

pub mod csv;
pub mod oracle;

pub use self::csv::{CsvOptions, CsvReader};
pub use self::oracle::OracleGeneralReader;

/// One raw trace record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceRecord<K> {
    /// Trace time, or the record's position when the trace has no clock
    pub timestamp: u64,
    pub id: K,
    pub size: u64,
}

/// On-disk trace layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TraceFormat {
    #[default]
    #[serde(rename = "oracleGeneral")]
    OracleGeneral,
    #[serde(rename = "csv")]
    Csv,
}

impl TraceFormat {
    pub fn name(&self) -> &'static str {
        match self {
            TraceFormat::OracleGeneral => "oracleGeneral",
            TraceFormat::Csv => "csv",
        }
    }
}

impl fmt::Display for TraceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TraceFormat {
    type Err = TraceError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "oraclegeneral" | "oracle" => Ok(TraceFormat::OracleGeneral),
            "csv" => Ok(TraceFormat::Csv),
            _ => Err(TraceError::UnknownFormat(s.to_string())),
        }
    }
}

/// Open an `oracleGeneral` trace file
pub fn open_oracle(path: &Path) -> std::result::Result<OracleGeneralReader<BufReader<File>>, TraceError> {
    Ok(OracleGeneralReader::new(BufReader::new(open_file(path)?)))
}

/// Open a CSV trace file
pub fn open_csv(path: &Path, options: CsvOptions) -> std::result::Result<CsvReader<BufReader<File>>, TraceError> {
    Ok(CsvReader::new(BufReader::new(open_file(path)?), options))
}

fn open_file(path: &Path) -> std::result::Result<File, TraceError> {
    File::open(path).map_err(|source| TraceError::Open { path: path.to_path_buf(), source })
}

/// Build an in-memory trace from a sequence of identifiers, one request each
pub fn from_ids<K, I>(ids: I) -> impl Iterator<Item = std::result::Result<TraceRecord<K>, TraceError>>
where
    I: IntoIterator<Item = K>,
{
    ids.into_iter()
        .enumerate()
        .map(|(i, id)| Ok(TraceRecord { timestamp: i as u64, id, size: 1 }))
}

/// Drives a cache engine with the requests of one trace.
///
/// A replayer is single-use: it carries the registry and ordering state of
/// one pass, so every run builds a new one alongside a fresh engine.
#[derive(Debug)]
pub struct Replayer<K> {
    registry: ObjectRegistry<K>,
    index: u64,
    last_timestamp: Option<u64>,
    report_interval: Option<u64>,
    next_report: u64,
}

impl<K: Hash + Eq> Replayer<K> {
    pub fn new(mode: SizeMode) -> Self {
        Self {
            registry: ObjectRegistry::new(mode),
            index: 0,
            last_timestamp: None,
            report_interval: None,
            next_report: 0,
        }
    }

    /// Log intermediate statistics every `interval` units of trace time
    pub fn with_report_interval(mut self, interval: u64) -> Self {
        self.report_interval = (interval > 0).then_some(interval);
        self
    }

    /// Resolve one record into a request, checking timestamp order
    pub fn resolve(&mut self, record: TraceRecord<K>) -> std::result::Result<CacheObject, TraceError> {
        if let Some(previous) = self.last_timestamp {
            if record.timestamp < previous {
                return Err(TraceError::OutOfOrder {
                    index: self.index,
                    previous,
                    current: record.timestamp,
                });
            }
        }
        let obj = self.registry.observe(record.id, record.size, self.index)?;
        self.last_timestamp = Some(record.timestamp);
        self.index += 1;
        Ok(obj)
    }

    /// Resolve every record lazily, without simulating
    pub fn requests<'a, I>(
        &'a mut self,
        records: I,
    ) -> impl Iterator<Item = std::result::Result<CacheObject, TraceError>> + 'a
    where
        I: IntoIterator<Item = std::result::Result<TraceRecord<K>, TraceError>>,
        I::IntoIter: 'a,
    {
        records.into_iter().map(move |record| self.resolve(record?))
    }

    /// Feed every record to `engine` in order, stopping at the first error
    pub fn replay<P, I>(&mut self, engine: &mut CacheEngine<P>, records: I) -> Result<()>
    where
        P: EvictionPolicy,
        I: IntoIterator<Item = std::result::Result<TraceRecord<K>, TraceError>>,
    {
        for record in records {
            let record = record?;
            let timestamp = record.timestamp;
            let obj = self.resolve(record)?;
            engine.process(obj)?;
            self.maybe_report(engine, timestamp);
        }
        Ok(())
    }

    fn maybe_report<P: EvictionPolicy>(&mut self, engine: &CacheEngine<P>, timestamp: u64) {
        let Some(interval) = self.report_interval else {
            return;
        };
        if self.next_report == 0 {
            self.next_report = timestamp.saturating_add(interval);
            return;
        }
        if timestamp >= self.next_report {
            let stats = engine.stats();
            let miss_ratio = stats.miss_ratio().unwrap_or(f64::NAN);
            info!(
                policy = engine.policy().name(),
                trace_time = timestamp,
                requests = stats.requests,
                miss_ratio,
                "progress"
            );
            while self.next_report <= timestamp {
                self.next_report = self.next_report.saturating_add(interval);
            }
        }
    }

    /// Registry of the objects seen so far
    pub fn registry(&self) -> &ObjectRegistry<K> {
        &self.registry
    }

    /// Number of records resolved so far
    pub fn requests_seen(&self) -> u64 {
        self.index
    }
}
