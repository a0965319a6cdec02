//! Error taxonomy for simulation runs.
//!
//! Every failure surfaced by the crate is a [`SimError`]. Errors fall into
//! four categories ([`ErrorKind`]) which the `cachesim` binary maps onto
//! distinct exit codes:
//! 1. **Input:** unreadable or malformed traces and configuration files.
//! 2. **Policy:** unknown policy names and invalid parameter sets.
//! 3. **Contract:** a policy broke the eviction contract mid-run.
//! 4. **Degenerate:** the run processed no requests, so no ratio exists.

use std::path::PathBuf;

use crate::ObjectKey;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, SimError>;

/// Top-level error for a simulation run
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error("cache capacity must be greater than 0")]
    ZeroCapacity,

    #[error("unknown policy `{0}`")]
    UnknownPolicy(String),

    #[error("policy `{policy}` returned no eviction victim with {resident} resident objects")]
    NoVictim { policy: String, resident: usize },

    #[error("policy `{policy}` chose victim {key} which is not resident")]
    InvalidVictim { policy: String, key: ObjectKey },

    #[error("no requests were processed; miss ratio is undefined")]
    NoRequests,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("optimizer failed: {0}")]
    Optimizer(String),

    #[error("failed to read config {path}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Param(#[from] ParamError),

    #[error(transparent)]
    Trace(#[from] TraceError),
}

/// Errors raised while reading or replaying a trace
#[derive(Debug, thiserror::Error)]
pub enum TraceError {
    #[error("cannot open trace {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error while reading trace: {0}")]
    Io(#[from] std::io::Error),

    #[error("truncated record at byte offset {offset}: expected {expected} bytes, got {got}")]
    Truncated {
        offset: u64,
        expected: usize,
        got: usize,
    },

    #[error("line {line}: {reason}")]
    Malformed { line: u64, reason: String },

    #[error("request {index} is out of order: timestamp {current} follows {previous}")]
    OutOfOrder {
        index: u64,
        previous: u64,
        current: u64,
    },

    #[error("request {index} has zero object size")]
    ZeroSize { index: u64 },

    #[error("unknown trace format `{0}` (expected `oracleGeneral` or `csv`)")]
    UnknownFormat(String),
}

/// Errors raised while parsing or validating policy parameters
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParamError {
    #[error("policy `{policy}` has no parameter `{name}`")]
    Unknown { policy: String, name: String },

    #[error("malformed parameter assignment `{0}` (expected name=value)")]
    Syntax(String),

    #[error("parameter `{name}`: cannot parse `{value}` as {expected}")]
    Type {
        name: String,
        value: String,
        expected: &'static str,
    },

    #[error("parameter `{name}` = {value} is outside [{lower}, {upper}]")]
    OutOfRange {
        name: String,
        value: String,
        lower: String,
        upper: String,
    },

    #[error("parameter `{name}` = `{value}` is not one of {choices:?}")]
    InvalidChoice {
        name: String,
        value: String,
        choices: Vec<String>,
    },
}

/// Coarse error category, stable across error variants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad trace, configuration, or environment
    Input,
    /// Unknown policy or bad parameters
    Policy,
    /// A policy broke the eviction contract
    Contract,
    /// Nothing was simulated
    Degenerate,
}

impl ErrorKind {
    /// Process exit code reported by the `cachesim` binary
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorKind::Input => 2,
            ErrorKind::Policy => 3,
            ErrorKind::Contract => 4,
            ErrorKind::Degenerate => 5,
        }
    }
}

impl SimError {
    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            SimError::UnknownPolicy(_) | SimError::Param(_) | SimError::Optimizer(_) => ErrorKind::Policy,
            SimError::NoVictim { .. } | SimError::InvalidVictim { .. } => ErrorKind::Contract,
            SimError::NoRequests => ErrorKind::Degenerate,
            SimError::ZeroCapacity
            | SimError::Config(_)
            | SimError::ConfigIo { .. }
            | SimError::ConfigParse { .. }
            | SimError::Trace(_) => ErrorKind::Input,
        }
    }

    /// True when the error is a policy contract violation
    pub fn is_contract_violation(&self) -> bool {
        self.kind() == ErrorKind::Contract
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds_map_to_distinct_exit_codes() {
        let codes = [
            SimError::ZeroCapacity.kind().exit_code(),
            SimError::UnknownPolicy("x".into()).kind().exit_code(),
            SimError::InvalidVictim { policy: "p".into(), key: 3 }.kind().exit_code(),
            SimError::NoRequests.kind().exit_code(),
        ];
        assert_eq!(codes, [2, 3, 4, 5]);
    }

    #[test]
    fn test_nested_errors_keep_their_category() {
        let err: SimError = ParamError::Syntax("oops".into()).into();
        assert_eq!(err.kind(), ErrorKind::Policy);

        let err: SimError = TraceError::ZeroSize { index: 7 }.into();
        assert_eq!(err.kind(), ErrorKind::Input);
        assert!(err.to_string().contains("request 7"));
    }

    #[test]
    fn test_contract_violation_message_names_policy() {
        let err = SimError::NoVictim { policy: "lru".into(), resident: 2 };
        assert!(err.is_contract_violation());
        assert!(err.to_string().contains("`lru`"));
    }
}
