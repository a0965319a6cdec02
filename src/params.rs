//! Typed policy parameters.
//!
//! A [`ParamSpace`] declares the tunable parameters of one policy, each an
//! integer or real range or a categorical choice with a default. External
//! tuners consume the space as JSON. A [`ParamSet`] is one concrete
//! assignment; it parses from the `name=value,name=value` form used on the
//! command line.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ParamError;

/// Declaration of one tunable parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ParamSpec {
    Int { default: i64, lower: i64, upper: i64 },
    Real { default: f64, lower: f64, upper: f64 },
    Categorical { default: String, choices: Vec<String> },
}

impl ParamSpec {
    /// Integer in `[lower, upper]`; the default is clamped into the range
    pub fn int(default: i64, lower: i64, upper: i64) -> Self {
        let upper = upper.max(lower);
        ParamSpec::Int { default: default.clamp(lower, upper), lower, upper }
    }

    /// Real in `[lower, upper]`; the default is clamped into the range
    pub fn real(default: f64, lower: f64, upper: f64) -> Self {
        let upper = upper.max(lower);
        ParamSpec::Real { default: default.clamp(lower, upper), lower, upper }
    }

    pub fn categorical(default: &str, choices: &[&str]) -> Self {
        ParamSpec::Categorical {
            default: default.to_string(),
            choices: choices.iter().map(|c| c.to_string()).collect(),
        }
    }

    pub fn default_value(&self) -> ParamValue {
        match self {
            ParamSpec::Int { default, .. } => ParamValue::Int(*default),
            ParamSpec::Real { default, .. } => ParamValue::Real(*default),
            ParamSpec::Categorical { default, .. } => ParamValue::Str(default.clone()),
        }
    }

    /// Parse a textual value according to this spec and check its bounds
    pub fn parse(&self, name: &str, text: &str) -> Result<ParamValue, ParamError> {
        let text = text.trim();
        let value = match self {
            ParamSpec::Int { .. } => text.parse::<i64>().map(ParamValue::Int).map_err(|_| ParamError::Type {
                name: name.to_string(),
                value: text.to_string(),
                expected: "an integer",
            })?,
            ParamSpec::Real { .. } => text.parse::<f64>().map(ParamValue::Real).map_err(|_| ParamError::Type {
                name: name.to_string(),
                value: text.to_string(),
                expected: "a real number",
            })?,
            ParamSpec::Categorical { .. } => ParamValue::Str(text.to_string()),
        };
        self.check(name, value)
    }

    /// Coerce `value` to this spec's type and check its bounds
    pub fn check(&self, name: &str, value: ParamValue) -> Result<ParamValue, ParamError> {
        match (self, value) {
            (ParamSpec::Int { lower, upper, .. }, ParamValue::Int(v)) => {
                if v < *lower || v > *upper {
                    return Err(out_of_range(name, v, lower, upper));
                }
                Ok(ParamValue::Int(v))
            }
            (ParamSpec::Real { lower, upper, .. }, value @ (ParamValue::Int(_) | ParamValue::Real(_))) => {
                let v = value.as_f64().unwrap_or(f64::NAN);
                if !(v >= *lower && v <= *upper) {
                    return Err(out_of_range(name, v, lower, upper));
                }
                Ok(ParamValue::Real(v))
            }
            (ParamSpec::Categorical { choices, .. }, ParamValue::Str(s)) => {
                if !choices.iter().any(|c| c == &s) {
                    return Err(ParamError::InvalidChoice {
                        name: name.to_string(),
                        value: s,
                        choices: choices.clone(),
                    });
                }
                Ok(ParamValue::Str(s))
            }
            (spec, ParamValue::Str(s)) => spec.parse(name, &s),
            (ParamSpec::Int { .. }, other) => Err(ParamError::Type {
                name: name.to_string(),
                value: other.to_string(),
                expected: "an integer",
            }),
            (ParamSpec::Categorical { .. }, other) => Err(ParamError::Type {
                name: name.to_string(),
                value: other.to_string(),
                expected: "a string",
            }),
        }
    }
}

fn out_of_range<T: fmt::Display>(name: &str, value: T, lower: &T, upper: &T) -> ParamError {
    ParamError::OutOfRange {
        name: name.to_string(),
        value: value.to_string(),
        lower: lower.to_string(),
        upper: upper.to_string(),
    }
}

/// A concrete parameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    Real(f64),
    Str(String),
}

impl ParamValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ParamValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Numeric value; integers widen to `f64`
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Int(v) => Some(*v as f64),
            ParamValue::Real(v) => Some(*v),
            ParamValue::Str(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(v) => write!(f, "{v}"),
            ParamValue::Real(v) => write!(f, "{v}"),
            ParamValue::Str(s) => f.write_str(s),
        }
    }
}

/// One assignment of parameter values, ordered by name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamSet(BTreeMap<String, ParamValue>);

impl ParamSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insertion
    pub fn with(mut self, name: &str, value: ParamValue) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: &str, value: ParamValue) {
        self.0.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.get(name)
    }

    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(ParamValue::as_i64)
    }

    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(ParamValue::as_f64)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(ParamValue::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Renders as `name=value,name=value`, the form [`ParamSpace::parse`] accepts
impl fmt::Display for ParamSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, value)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{name}={value}")?;
        }
        Ok(())
    }
}

/// The parameters of one policy.
///
/// `params` are the tunable ones. `settings` (such as an RNG seed) are
/// accepted and validated the same way but are never searched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamSpace {
    pub policy: String,
    pub params: BTreeMap<String, ParamSpec>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub settings: BTreeMap<String, ParamSpec>,
}

impl ParamSpace {
    pub fn new(policy: &str) -> Self {
        Self { policy: policy.to_string(), params: BTreeMap::new(), settings: BTreeMap::new() }
    }

    /// Builder-style declaration of a tunable parameter
    pub fn with(mut self, name: &str, spec: ParamSpec) -> Self {
        self.params.insert(name.to_string(), spec);
        self
    }

    /// Builder-style declaration of a run setting
    pub fn with_setting(mut self, name: &str, spec: ParamSpec) -> Self {
        self.settings.insert(name.to_string(), spec);
        self
    }

    /// Look up a tunable parameter or a setting
    pub fn get(&self, name: &str) -> Option<&ParamSpec> {
        self.params.get(name).or_else(|| self.settings.get(name))
    }

    /// Tunable parameters only
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamSpec)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of tunable parameters
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// True when nothing is left to tune
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Every parameter and setting at its default value
    pub fn defaults(&self) -> ParamSet {
        let mut set = ParamSet::new();
        for (name, spec) in self.params.iter().chain(&self.settings) {
            set.set(name, spec.default_value());
        }
        set
    }

    /// Parse `name=value,...` against this space.
    ///
    /// A leading `-e` (as passed to command-line simulators) is ignored and
    /// parameters left unset take their defaults.
    pub fn parse(&self, text: &str) -> Result<ParamSet, ParamError> {
        let mut set = self.defaults();
        for (name, value) in self.parse_assignments(text)?.iter() {
            set.set(name, value.clone());
        }
        Ok(set)
    }

    /// Like [`parse`](Self::parse) but keeps only the names that appear in
    /// `text`, leaving defaults to a later [`validate`](Self::validate)
    pub fn parse_assignments(&self, text: &str) -> Result<ParamSet, ParamError> {
        let text = text.trim();
        let text = text.strip_prefix("-e").map(str::trim_start).unwrap_or(text);

        let mut set = ParamSet::new();
        for assignment in text.split(',').map(str::trim).filter(|a| !a.is_empty()) {
            let (name, value) = assignment
                .split_once('=')
                .ok_or_else(|| ParamError::Syntax(assignment.to_string()))?;
            let name = name.trim();
            let spec = self.get(name).ok_or_else(|| self.unknown(name))?;
            set.set(name, spec.parse(name, value)?);
        }
        Ok(set)
    }

    /// Check every value of `params` and fill in defaults for the rest
    pub fn validate(&self, params: &ParamSet) -> Result<ParamSet, ParamError> {
        let mut set = self.defaults();
        for (name, value) in params.iter() {
            let spec = self.get(name).ok_or_else(|| self.unknown(name))?;
            set.set(name, spec.check(name, value.clone())?);
        }
        Ok(set)
    }

    fn unknown(&self, name: &str) -> ParamError {
        ParamError::Unknown { policy: self.policy.clone(), name: name.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn space() -> ParamSpace {
        ParamSpace::new("demo")
            .with("n-seg", ParamSpec::int(4, 1, 10))
            .with("ratio", ParamSpec::real(0.25, 0.0, 1.0))
            .with("main-cache", ParamSpec::categorical("lru", &["lru", "clock"]))
    }

    #[test]
    fn test_defaults() {
        let defaults = space().defaults();
        assert_eq!(defaults.get_i64("n-seg"), Some(4));
        assert_eq!(defaults.get_f64("ratio"), Some(0.25));
        assert_eq!(defaults.get_str("main-cache"), Some("lru"));
    }

    #[test]
    fn test_default_is_clamped_into_range() {
        assert_eq!(ParamSpec::int(4, 1, 2), ParamSpec::Int { default: 2, lower: 1, upper: 2 });
        assert_eq!(ParamSpec::int(4, 1, 0), ParamSpec::Int { default: 1, lower: 1, upper: 1 });
    }

    #[test]
    fn test_parse_overrides_and_fills_defaults() {
        let set = space().parse(" -e n-seg=7, main-cache=clock").unwrap();
        assert_eq!(set.get_i64("n-seg"), Some(7));
        assert_eq!(set.get_f64("ratio"), Some(0.25));
        assert_eq!(set.get_str("main-cache"), Some("clock"));
    }

    #[test]
    fn test_parse_empty_string_is_defaults() {
        assert_eq!(space().parse("").unwrap(), space().defaults());
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        let s = space();
        assert!(matches!(s.parse("nseg=3"), Err(ParamError::Unknown { .. })));
        assert!(matches!(s.parse("n-seg"), Err(ParamError::Syntax(_))));
        assert!(matches!(s.parse("n-seg=abc"), Err(ParamError::Type { .. })));
        assert!(matches!(s.parse("n-seg=11"), Err(ParamError::OutOfRange { .. })));
        assert!(matches!(s.parse("ratio=1.5"), Err(ParamError::OutOfRange { .. })));
        assert!(matches!(s.parse("ratio=NaN"), Err(ParamError::OutOfRange { .. })));
        assert!(matches!(s.parse("main-cache=arc"), Err(ParamError::InvalidChoice { .. })));
    }

    #[test]
    fn test_validate_coerces_ints_to_reals() {
        let given = ParamSet::new().with("ratio", ParamValue::Int(1));
        let set = space().validate(&given).unwrap();
        assert_eq!(set.get("ratio"), Some(&ParamValue::Real(1.0)));

        let bad = ParamSet::new().with("n-seg", ParamValue::Real(2.5));
        assert!(matches!(space().validate(&bad), Err(ParamError::Type { .. })));
    }

    #[test]
    fn test_display_parses_back() {
        let set = space().parse("n-seg=2,ratio=0.5").unwrap();
        assert_eq!(set.to_string(), "main-cache=lru,n-seg=2,ratio=0.5");
        assert_eq!(space().parse(&set.to_string()).unwrap(), set);
    }

    #[test]
    fn test_space_serializes_for_external_tuners() {
        let json = serde_json::to_value(space()).unwrap();
        assert_eq!(json["policy"], "demo");
        assert_eq!(json["params"]["n-seg"]["type"], "int");
        assert_eq!(json["params"]["n-seg"]["upper"], 10);
        assert_eq!(json["params"]["main-cache"]["choices"][1], "clock");
    }

    #[test]
    fn test_param_set_deserializes_untagged_values() {
        let set: ParamSet = serde_json::from_str(r#"{"n-seg": 3, "ratio": 0.5, "main-cache": "clock"}"#).unwrap();
        assert_eq!(set.get("n-seg"), Some(&ParamValue::Int(3)));
        assert_eq!(set.get("ratio"), Some(&ParamValue::Real(0.5)));
        assert_eq!(set.get_str("main-cache"), Some("clock"));
    }

    #[test]
    fn test_settings_validate_but_are_not_tunable() {
        let space = space().with_setting("seed", ParamSpec::int(42, 0, 100));
        assert_eq!(space.len(), 3);
        assert!(space.iter().all(|(name, _)| name != "seed"));
        assert_eq!(space.defaults().get_i64("seed"), Some(42));
        assert_eq!(space.parse("seed=7").unwrap().get_i64("seed"), Some(7));
        assert!(matches!(space.parse("seed=101"), Err(ParamError::OutOfRange { .. })));

        let json = serde_json::to_value(&space).unwrap();
        assert!(json["params"].get("seed").is_none());
        assert_eq!(json["settings"]["seed"]["default"], 42);
    }

    #[test]
    fn test_parse_assignments_keeps_only_given_names() {
        let set = space().parse_assignments("-e ratio=0.5").unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.get_f64("ratio"), Some(0.5));
        assert!(space().parse_assignments("").unwrap().is_empty());
        assert!(matches!(space().parse_assignments("ratio=2"), Err(ParamError::OutOfRange { .. })));
    }
}
