//! Canonical storage values.
//!
//! Query bodies arrive as [`serde_json::Value`] and are converted to [`Value`]
//! at the keystore boundary. The filter engine canonicalizes per the schema:
//! signed columns hold [`Value::Int`], unsigned hold [`Value::Uint`], time
//! columns hold [`Value::Time`], and nested objects are positional
//! [`Value::List`] tuples indexed by data index.

use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};
use serde_json::{Number, Value as Json};

/// A dynamically typed canonical value.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Time(DateTime<Utc>),
}

impl Value {
    /// Convert an untyped JSON tree into a `Value` tree.
    ///
    /// Numbers keep their JSON representation (`u64` wins over `i64` wins
    /// over `f64`); the schema filter re-canonicalizes them per column.
    pub fn from_json(json: &Json) -> Value {
        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(*b),
            Json::Number(n) => {
                if let Some(u) = n.as_u64() {
                    Value::Uint(u)
                } else if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(0.0))
                }
            }
            Json::String(s) => Value::String(s.clone()),
            Json::Array(items) => Value::List(items.iter().map(Value::from_json).collect()),
            Json::Object(map) => Value::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Convert back into a JSON tree.
    ///
    /// Time values serialize as RFC 3339 text; non-finite floats become null
    /// (JSON has no representation for them).
    pub fn to_json(&self) -> Json {
        match self {
            Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Int(i) => Json::Number((*i).into()),
            Value::Uint(u) => Json::Number((*u).into()),
            Value::Float(f) => Number::from_f64(*f).map(Json::Number).unwrap_or(Json::Null),
            Value::String(s) => Json::String(s.clone()),
            Value::List(items) => Json::Array(items.iter().map(Value::to_json).collect()),
            Value::Map(map) => Json::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            Value::Time(t) => Json::String(t.to_rfc3339()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric view. Only numeric variants coerce; everything else is `None`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Uint(u) => Some(*u as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Coerce to `i64`, saturating at the bounds. Floats truncate toward zero.
    pub fn coerce_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Uint(u) => Some((*u).min(i64::MAX as u64) as i64),
            Value::Float(f) => Some(*f as i64),
            _ => None,
        }
    }

    /// Coerce to `u64`, saturating at the bounds. Floats truncate toward zero.
    pub fn coerce_u64(&self) -> Option<u64> {
        match self {
            Value::Int(i) => Some((*i).max(0) as u64),
            Value::Uint(u) => Some(*u),
            Value::Float(f) => Some(*f as u64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Human-readable type name (for error context and tests).
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Uint(_) => "uint",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Time(_) => "time",
        }
    }
}

/// Normalize a float for equality/hashing: -0.0 folds into +0.0, NaN equals
/// itself. Required so canonical values can live in uniqueness sets.
fn float_bits(f: f64) -> u64 {
    if f == 0.0 { 0u64 } else { f.to_bits() }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Uint(a), Value::Uint(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => float_bits(*a) == float_bits(*b),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Time(a), Value::Time(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Bool(b) => b.hash(state),
            Value::Int(i) => i.hash(state),
            Value::Uint(u) => u.hash(state),
            Value::Float(f) => float_bits(*f).hash(state),
            Value::String(s) => s.hash(state),
            Value::List(items) => items.hash(state),
            Value::Map(map) => map.hash(state),
            Value::Time(t) => t.hash(state),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_roundtrip() {
        let json = json!({
            "name": "Alice",
            "mmr": 1674,
            "delta": -3,
            "ratio": 1.5,
            "tags": ["a", "b"],
            "flags": {"x": true},
            "missing": null
        });
        let val = Value::from_json(&json);
        assert_eq!(val.to_json(), json);
    }

    #[test]
    fn test_number_variants() {
        assert_eq!(Value::from_json(&json!(5)), Value::Uint(5));
        assert_eq!(Value::from_json(&json!(-5)), Value::Int(-5));
        assert_eq!(Value::from_json(&json!(0.5)), Value::Float(0.5));
    }

    #[test]
    fn test_coerce_saturates() {
        assert_eq!(Value::Int(-5).coerce_u64(), Some(0));
        assert_eq!(Value::Uint(u64::MAX).coerce_i64(), Some(i64::MAX));
        assert_eq!(Value::Float(2.9).coerce_i64(), Some(2));
        assert_eq!(Value::Float(-2.9).coerce_u64(), Some(0));
        assert_eq!(Value::String("5".into()).coerce_i64(), None);
    }

    #[test]
    fn test_float_equality_in_sets() {
        use std::collections::HashSet;
        let mut set = HashSet::new();
        assert!(set.insert(Value::Float(0.0)));
        assert!(!set.insert(Value::Float(-0.0)));
        assert!(set.insert(Value::Float(1.5)));
        assert!(!set.insert(Value::Float(1.5)));
    }

    #[test]
    fn test_cross_variant_never_equal() {
        assert_ne!(Value::Int(5), Value::Uint(5));
        assert_ne!(Value::Bool(true), Value::Uint(1));
    }

    #[test]
    fn test_nonfinite_float_to_json() {
        assert_eq!(Value::Float(f64::INFINITY).to_json(), Json::Null);
    }
}
