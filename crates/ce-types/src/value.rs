//! Scalar values carried by parameters and configuration records, and the
//! comparison policy used when parameters are checked for equality.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Relative tolerance used for every real-valued comparison.
pub const REL_TOLERANCE: f64 = 1e-9;

/// Tolerant float comparison: `|a - b| <= REL_TOLERANCE * max(|a|, |b|)`.
pub fn is_close(a: f64, b: f64) -> bool {
    if a == b {
        return true;
    }
    if !a.is_finite() || !b.is_finite() {
        return false;
    }
    (a - b).abs() <= REL_TOLERANCE * a.abs().max(b.abs())
}

/// Structural equality with tolerance for reals and exact comparison for
/// integers, strings and booleans.
pub trait ApproxEq {
    fn approx_eq(&self, other: &Self) -> bool;
}

impl ApproxEq for f64 {
    fn approx_eq(&self, other: &Self) -> bool {
        is_close(*self, *other)
    }
}

impl<T: ApproxEq> ApproxEq for Option<T> {
    fn approx_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (None, None) => true,
            (Some(a), Some(b)) => a.approx_eq(b),
            _ => false,
        }
    }
}

impl<T: ApproxEq> ApproxEq for [T] {
    fn approx_eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().zip(other).all(|(a, b)| a.approx_eq(b))
    }
}

impl<T: ApproxEq> ApproxEq for Vec<T> {
    fn approx_eq(&self, other: &Self) -> bool {
        self.as_slice().approx_eq(other.as_slice())
    }
}

impl<K: Ord, V: ApproxEq> ApproxEq for BTreeMap<K, V> {
    fn approx_eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .zip(other)
                .all(|((ka, va), (kb, vb))| ka == kb && va.approx_eq(vb))
    }
}

/// A concrete value resolved from a parameter.
///
/// Every variant serializes to a plain JSON/YAML scalar (or a list of them),
/// so resolved configurations can always be written by result sinks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
}

impl Value {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "str",
            Self::List(_) => "list",
        }
    }
}

impl ApproxEq for Value {
    fn approx_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Float(a), Self::Float(b)) => is_close(*a, *b),
            (Self::List(a), Self::List(b)) => a.approx_eq(b),
            // Int vs Float never compare equal, matching on type first.
            _ => self == other,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Str(v) => write!(f, "{v}"),
            Self::List(values) => {
                write!(f, "[")?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{value}")?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floats_compare_with_tolerance() {
        assert!(Value::Float(0.1 + 0.2).approx_eq(&Value::Float(0.3)));
        assert!(!Value::Float(0.1).approx_eq(&Value::Float(0.2)));
        assert_ne!(0.1 + 0.2, 0.3);
    }

    #[test]
    fn int_and_float_never_equal() {
        assert!(!Value::Int(1).approx_eq(&Value::Float(1.0)));
    }

    #[test]
    fn untagged_deserialization_discriminates_scalars() {
        let values: Vec<Value> = serde_json::from_str(r#"[true, 3, 2.5, "adam", ["a", 1]]"#).unwrap();
        assert_eq!(values[0], Value::Bool(true));
        assert_eq!(values[1], Value::Int(3));
        assert_eq!(values[2], Value::Float(2.5));
        assert_eq!(values[3], Value::Str("adam".into()));
        assert_eq!(
            values[4],
            Value::List(vec![Value::Str("a".into()), Value::Int(1)])
        );
    }

    #[test]
    fn yaml_float_stays_float() {
        let value: Value = serde_yaml::from_str("10.0").unwrap();
        assert_eq!(value, Value::Float(10.0));
    }

    #[test]
    fn lists_compare_element_wise() {
        let a = vec![Value::Float(0.1 + 0.2), Value::Str("x".into())];
        let b = vec![Value::Float(0.3), Value::Str("x".into())];
        assert!(a.approx_eq(&b));
        assert!(!a.approx_eq(&b[..1].to_vec()));
    }
}
