//! Card parameter schema and values.
//!
//! A card definition declares its parameters as a list of [`ParamSpec`]s.
//! Instances carry a [`Params`] map of user-set values; anything missing
//! falls back to the declared default. The same value type is used for the
//! executor-owned [`CardState`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A parameter or state value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Boolean toggle.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Floating-point value.
    Number(f64),
    /// Free text.
    Text(String),
}

impl ParamValue {
    /// Numeric view; integers widen to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Int(v) => Some(*v as f64),
            ParamValue::Number(v) => Some(*v),
            _ => None,
        }
    }

    /// Integer view; integral numbers narrow to `i64`.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ParamValue::Int(v) => Some(*v),
            ParamValue::Number(v) if v.fract() == 0.0 => Some(*v as i64),
            _ => None,
        }
    }

    /// Boolean view.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Text view.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Text(v) => Some(v),
            _ => None,
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            ParamValue::Bool(_) => "bool",
            ParamValue::Int(_) => "integer",
            ParamValue::Number(_) => "number",
            ParamValue::Text(_) => "text",
        }
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Number(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Text(v.to_string())
    }
}

impl core::fmt::Display for ParamValue {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ParamValue::Bool(v) => write!(f, "{v}"),
            ParamValue::Int(v) => write!(f, "{v}"),
            ParamValue::Number(v) => write!(f, "{v}"),
            ParamValue::Text(v) => write!(f, "{v:?}"),
        }
    }
}

/// User-set parameter values of a card instance, keyed by name.
pub type Params = BTreeMap<String, ParamValue>;

/// Carry-over data of a card instance between evaluations.
///
/// Owned by the executor; opaque to everything else.
pub type CardState = BTreeMap<String, ParamValue>;

/// Declared shape of one parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    /// Parameter name (lookup key).
    pub name: String,
    /// Default value; also fixes the parameter's type.
    pub default: ParamValue,
    /// Inclusive lower bound for numeric parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    /// Inclusive upper bound for numeric parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    /// One-line description for UIs.
    #[serde(default)]
    pub description: String,
}

impl ParamSpec {
    /// Floating-point parameter with an inclusive range.
    pub fn number(name: &str, min: f64, max: f64, default: f64) -> Self {
        Self {
            name: name.to_string(),
            default: ParamValue::Number(default),
            min: Some(min),
            max: Some(max),
            description: String::new(),
        }
    }

    /// Integer parameter with an inclusive range.
    pub fn integer(name: &str, min: i64, max: i64, default: i64) -> Self {
        Self {
            name: name.to_string(),
            default: ParamValue::Int(default),
            min: Some(min as f64),
            max: Some(max as f64),
            description: String::new(),
        }
    }

    /// Boolean toggle.
    pub fn toggle(name: &str, default: bool) -> Self {
        Self {
            name: name.to_string(),
            default: ParamValue::Bool(default),
            min: None,
            max: None,
            description: String::new(),
        }
    }

    /// Free-text parameter.
    pub fn text(name: &str, default: &str) -> Self {
        Self {
            name: name.to_string(),
            default: ParamValue::Text(default.to_string()),
            min: None,
            max: None,
            description: String::new(),
        }
    }

    /// Attaches a description.
    pub fn describe(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    /// Checks that `value` has this parameter's type and lies in range.
    pub fn check(&self, value: &ParamValue) -> Result<(), ParamError> {
        let type_ok = match (&self.default, value) {
            (ParamValue::Number(_), ParamValue::Number(_) | ParamValue::Int(_)) => true,
            (ParamValue::Int(_), v) => v.as_i64().is_some(),
            (ParamValue::Bool(_), ParamValue::Bool(_)) => true,
            (ParamValue::Text(_), ParamValue::Text(_)) => true,
            _ => false,
        };
        if !type_ok {
            return Err(ParamError::WrongType {
                param: self.name.clone(),
                expected: self.default.type_name(),
                found: value.type_name(),
            });
        }
        if let Some(v) = value.as_f64() {
            let min = self.min.unwrap_or(f64::NEG_INFINITY);
            let max = self.max.unwrap_or(f64::INFINITY);
            if !(min..=max).contains(&v) {
                return Err(ParamError::OutOfRange {
                    param: self.name.clone(),
                    value: v,
                    min,
                    max,
                });
            }
        }
        Ok(())
    }
}

/// Parameter validation failure.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParamError {
    /// The card declares no parameter with this name.
    #[error("unknown parameter '{param}'")]
    UnknownParameter {
        /// Offending name.
        param: String,
    },
    /// Value type does not match the declared default.
    #[error("parameter '{param}' expects {expected}, found {found}")]
    WrongType {
        /// Parameter name.
        param: String,
        /// Declared type.
        expected: &'static str,
        /// Supplied type.
        found: &'static str,
    },
    /// Numeric value outside the declared range.
    #[error("parameter '{param}' value {value} out of range [{min}, {max}]")]
    OutOfRange {
        /// Parameter name.
        param: String,
        /// Supplied value.
        value: f64,
        /// Lower bound.
        min: f64,
        /// Upper bound.
        max: f64,
    },
}

/// Checks every value in `params` against `specs`, returning all failures.
pub fn check_params(specs: &[ParamSpec], params: &Params) -> Vec<ParamError> {
    let mut errors = Vec::new();
    for (name, value) in params {
        match specs.iter().find(|s| &s.name == name) {
            Some(spec) => {
                if let Err(e) = spec.check(value) {
                    errors.push(e);
                }
            }
            None => errors.push(ParamError::UnknownParameter {
                param: name.clone(),
            }),
        }
    }
    errors
}

/// Resolved view of an instance's parameters with schema defaults.
#[derive(Debug, Clone, Copy)]
pub struct ParamReader<'a> {
    specs: &'a [ParamSpec],
    values: &'a Params,
}

impl<'a> ParamReader<'a> {
    /// Wraps a schema and a value map.
    pub fn new(specs: &'a [ParamSpec], values: &'a Params) -> Self {
        Self { specs, values }
    }

    /// Returns the set value, or the declared default.
    pub fn get(&self, name: &str) -> Option<&'a ParamValue> {
        self.values
            .get(name)
            .or_else(|| self.specs.iter().find(|s| s.name == name).map(|s| &s.default))
    }

    /// Numeric parameter, `fallback` when absent or non-numeric.
    pub fn f64_or(&self, name: &str, fallback: f64) -> f64 {
        self.get(name).and_then(ParamValue::as_f64).unwrap_or(fallback)
    }

    /// Integer parameter, `fallback` when absent or non-integral.
    pub fn i64_or(&self, name: &str, fallback: i64) -> i64 {
        self.get(name).and_then(ParamValue::as_i64).unwrap_or(fallback)
    }

    /// Boolean parameter, `fallback` when absent.
    pub fn bool_or(&self, name: &str, fallback: bool) -> bool {
        self.get(name).and_then(ParamValue::as_bool).unwrap_or(fallback)
    }

    /// Text parameter, `fallback` when absent.
    pub fn str_or(&self, name: &str, fallback: &'a str) -> &'a str {
        self.get(name).and_then(ParamValue::as_str).unwrap_or(fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_accepts_integers() {
        let spec = ParamSpec::number("gain", -60.0, 12.0, 0.0);
        assert!(spec.check(&ParamValue::Int(6)).is_ok());
    }

    #[test]
    fn integer_rejects_fractions() {
        let spec = ParamSpec::integer("count", 1, 64, 4);
        assert!(matches!(
            spec.check(&ParamValue::Number(2.5)),
            Err(ParamError::WrongType { .. })
        ));
        assert!(spec.check(&ParamValue::Number(2.0)).is_ok());
    }

    #[test]
    fn out_of_range_is_reported() {
        let spec = ParamSpec::integer("count", 1, 64, 4);
        let err = spec.check(&ParamValue::Int(100)).unwrap_err();
        assert_eq!(err.to_string(), "parameter 'count' value 100 out of range [1, 64]");
    }

    #[test]
    fn check_params_collects_everything() {
        let specs = vec![ParamSpec::toggle("on", true)];
        let mut params = Params::new();
        params.insert("on".into(), ParamValue::Int(1));
        params.insert("bogus".into(), ParamValue::Bool(true));
        let errors = check_params(&specs, &params);
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn reader_falls_back_to_defaults() {
        let specs = vec![ParamSpec::number("gain", 0.0, 1.0, 0.5)];
        let params = Params::new();
        let reader = ParamReader::new(&specs, &params);
        assert_eq!(reader.f64_or("gain", 0.0), 0.5);
        assert_eq!(reader.f64_or("missing", 0.25), 0.25);
    }

    #[test]
    fn untagged_values_parse_as_expected() {
        let v: ParamValue = serde_json::from_str("3").unwrap();
        assert_eq!(v, ParamValue::Int(3));
        let v: ParamValue = serde_json::from_str("3.5").unwrap();
        assert_eq!(v, ParamValue::Number(3.5));
        let v: ParamValue = serde_json::from_str("\"x\"").unwrap();
        assert_eq!(v, ParamValue::Text("x".into()));
    }
}
