//! Run configuration.
//!
//! A [`SimConfig`] describes one simulation run: the trace and how to read
//! it, the cache capacity and size mode, and the policy with its
//! parameters. It can be built in code or loaded from a JSON document:
//!
//! ```json
//! {
//!   "capacity": 1000,
//!   "size_mode": "ignore-object-size",
//!   "trace": { "path": "w01.oracleGeneral", "format": "oracleGeneral" },
//!   "policy": "slru",
//!   "params": { "n-seg": 2 },
//!   "report_interval": 3600
//! }
//! ```
//!
//! The capacity may instead be relative to the trace, as in
//! `"capacity": { "fraction": 0.1 }`, which sizes the cache at a tenth of
//! the trace's distinct objects.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};
use crate::params::ParamSet;
use crate::policies::PolicyType;
use crate::trace::{CsvOptions, TraceFormat};
use crate::SizeMode;

/// Cache capacity, absolute or relative to the trace.
///
/// On the command line a whole number such as `1000` is absolute and any
/// other positive number such as `0.1` is a fraction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Capacity {
    /// Objects, or bytes when object sizes count
    Objects(u64),
    /// Share of the distinct objects in the trace
    Fraction { fraction: f64 },
}

impl Default for Capacity {
    fn default() -> Self {
        Capacity::Objects(0)
    }
}

impl From<u64> for Capacity {
    fn from(objects: u64) -> Self {
        Capacity::Objects(objects)
    }
}

impl Capacity {
    pub fn fraction(fraction: f64) -> Self {
        Capacity::Fraction { fraction }
    }

    /// The capacity when it does not depend on the trace
    pub fn absolute(&self) -> Option<u64> {
        match *self {
            Capacity::Objects(objects) => Some(objects),
            Capacity::Fraction { .. } => None,
        }
    }

    /// Largest capacity this can resolve to, for checking parameters before
    /// the trace is read
    pub fn bound(&self) -> u64 {
        self.absolute().unwrap_or(u64::MAX)
    }

    /// Reject capacities that can never hold an object
    pub fn check(&self) -> Result<()> {
        match *self {
            Capacity::Objects(0) => Err(SimError::ZeroCapacity),
            Capacity::Objects(_) => Ok(()),
            Capacity::Fraction { fraction } if fraction.is_finite() && fraction > 0.0 => Ok(()),
            Capacity::Fraction { fraction } => {
                Err(SimError::Config(format!("capacity fraction must be positive, got {fraction}")))
            }
        }
    }

    /// Absolute capacity for a trace of `distinct` objects.
    ///
    /// A fraction resolves to `max(1, floor(distinct * fraction))`.
    pub fn resolve(&self, distinct: usize) -> Result<u64> {
        self.check()?;
        Ok(match *self {
            Capacity::Objects(objects) => objects,
            Capacity::Fraction { fraction } => ((distinct as f64 * fraction).floor() as u64).max(1),
        })
    }
}

impl fmt::Display for Capacity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capacity::Objects(objects) => write!(f, "{objects}"),
            Capacity::Fraction { fraction } => write!(f, "{fraction:?}"),
        }
    }
}

impl FromStr for Capacity {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Ok(objects) = s.parse::<u64>() {
            return Ok(Capacity::Objects(objects));
        }
        let fraction: f64 = s
            .parse()
            .map_err(|_| SimError::Config(format!("invalid capacity `{s}`")))?;
        let capacity = Capacity::fraction(fraction);
        capacity.check()?;
        Ok(capacity)
    }
}

/// Where the trace lives and how to decode it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceConfig {
    pub path: PathBuf,
    pub format: TraceFormat,
    /// Only used by the `csv` format
    pub csv: CsvOptions,
}

/// Complete description of one simulation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub capacity: Capacity,
    pub size_mode: SizeMode,
    pub trace: TraceConfig,
    pub policy: String,
    pub params: ParamSet,
    /// Log progress every this many units of trace time
    pub report_interval: Option<u64>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            capacity: Capacity::default(),
            size_mode: SizeMode::default(),
            trace: TraceConfig::default(),
            policy: PolicyType::Lru.name().to_string(),
            params: ParamSet::new(),
            report_interval: None,
        }
    }
}

impl SimConfig {
    pub fn new(path: impl Into<PathBuf>, format: TraceFormat, policy: &str, capacity: u64) -> Self {
        Self {
            capacity: Capacity::Objects(capacity),
            trace: TraceConfig { path: path.into(), format, csv: CsvOptions::default() },
            policy: policy.to_string(),
            ..Self::default()
        }
    }

    pub fn with_capacity(mut self, capacity: Capacity) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_params(mut self, params: ParamSet) -> Self {
        self.params = params;
        self
    }

    pub fn with_size_mode(mut self, mode: SizeMode) -> Self {
        self.size_mode = mode;
        self
    }

    pub fn with_csv(mut self, csv: CsvOptions) -> Self {
        self.trace.csv = csv;
        self
    }

    /// Load a configuration from a JSON file
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .map_err(|source| SimError::ConfigIo { path: path.to_path_buf(), source })?;
        serde_json::from_str(&text)
            .map_err(|source| SimError::ConfigParse { path: path.to_path_buf(), source })
    }

    /// Parse a configuration from a JSON string
    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| SimError::Config(e.to_string()))
    }

    /// Check the configuration and resolve the policy and its full
    /// parameter set (defaults filled in).
    ///
    /// With a relative capacity, ranges that depend on the capacity are
    /// only checked against their widest bound; [`validate_for`] checks
    /// them again once the trace has been read.
    ///
    /// [`validate_for`]: Self::validate_for
    pub fn validate(&self) -> Result<(PolicyType, ParamSet)> {
        self.capacity.check()?;
        self.validate_for(self.capacity.bound())
    }

    /// [`validate`](Self::validate) for a resolved `capacity`
    pub fn validate_for(&self, capacity: u64) -> Result<(PolicyType, ParamSet)> {
        if capacity == 0 {
            return Err(SimError::ZeroCapacity);
        }
        if self.trace.path.as_os_str().is_empty() {
            return Err(SimError::Config("trace path is empty".to_string()));
        }
        if self.trace.csv.key_column == 0 {
            return Err(SimError::Config("csv column ids start at 1".to_string()));
        }
        let policy: PolicyType = self.policy.parse()?;
        let params = policy.parameter_space(capacity).validate(&self.params)?;
        Ok((policy, params))
    }

    /// Name of the trace as shown in reports
    pub fn trace_name(&self) -> String {
        self.trace
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.trace.path.display().to_string())
    }
}
