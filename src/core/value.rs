//! Null-safe dynamic values.
//!
//! Evaluated plugin configuration arrives as [`Value`]s. A missing key, an
//! unset field and an unresolved template all produce [`Value::Null`], and
//! every accessor on a value keeps working on null:
//!
//! - coercions (`as_str`, `as_int`, `as_float`, `as_bool`) return `None`
//! - arithmetic with null yields the other operand unchanged
//! - indexing a missing key yields another null
//!
//! so plugin code can write `config["size"].as_int()` without checking every
//! step of the way.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Div, Index, Mul, Sub};

static NULL: Value = Value::Null;

/// Strings accepted as `true` by [`Value::as_bool`]. Anything else is `false`.
const TRUE_WORDS: [&str; 5] = ["true", "1", "t", "y", "yes"];

/// A possibly-absent scalar or collection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Absent value
    #[default]
    Null,
    /// Boolean
    Bool(bool),
    /// Signed integer
    Int(i64),
    /// Floating point number
    Float(f64),
    /// Text
    Str(String),
    /// Ordered sequence
    List(Vec<Value>),
    /// Insertion-ordered mapping
    Map(IndexMap<String, Value>),
}

impl Value {
    /// Shared null instance, handy for returning `&Value` on a miss.
    pub fn null_ref() -> &'static Value {
        &NULL
    }

    /// Whether this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// String form of the value, `None` for null.
    pub fn as_str(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Str(s) => Some(s.clone()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Int(i) => Some(i.to_string()),
            Value::Float(f) => Some(format_float(*f)),
            Value::List(_) | Value::Map(_) => Some(self.to_json().to_string()),
        }
    }

    /// Integer coercion. Goes through float first and truncates toward zero,
    /// so `"12.7"` yields `12` and `"-3.9"` yields `-3`.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => self.as_float().map(|f| f.trunc() as i64),
        }
    }

    /// Float coercion. Strings are parsed after trimming whitespace.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Null | Value::List(_) | Value::Map(_) => None,
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Str(s) => s.trim().parse::<f64>().ok(),
        }
    }

    /// Boolean coercion (case-insensitive `true/1/t/y/yes`; everything else false).
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Null => None,
            Value::Bool(b) => Some(*b),
            other => other
                .as_str()
                .map(|s| TRUE_WORDS.contains(&s.trim().to_lowercase().as_str())),
        }
    }

    /// Look up a key in a map value. Misses and non-maps yield null.
    pub fn get(&self, key: &str) -> &Value {
        match self {
            Value::Map(map) => map.get(key).unwrap_or(&NULL),
            _ => &NULL,
        }
    }

    /// Look up a position in a list value. Misses and non-lists yield null.
    pub fn get_index(&self, index: usize) -> &Value {
        match self {
            Value::List(items) => items.get(index).unwrap_or(&NULL),
            _ => &NULL,
        }
    }

    /// Iterate over list elements or map values. Scalars iterate as empty.
    pub fn iter(&self) -> Box<dyn Iterator<Item = &Value> + '_> {
        match self {
            Value::List(items) => Box::new(items.iter()),
            Value::Map(map) => Box::new(map.values()),
            _ => Box::new(std::iter::empty()),
        }
    }

    /// Keys of a map value, in insertion order.
    pub fn keys(&self) -> Vec<String> {
        match self {
            Value::Map(map) => map.keys().cloned().collect(),
            _ => Vec::new(),
        }
    }

    /// Number of elements for collections, characters for strings, 0 for null.
    pub fn len(&self) -> usize {
        match self {
            Value::Null => 0,
            Value::List(items) => items.len(),
            Value::Map(map) => map.len(),
            Value::Str(s) => s.chars().count(),
            _ => 1,
        }
    }

    /// Whether [`Value::len`] is zero.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Convert to a JSON value.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Str(s) => serde_json::Value::String(s.clone()),
            Value::List(items) => serde_json::Value::Array(items.iter().map(Value::to_json).collect()),
            Value::Map(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }

    fn arith(self, rhs: Value, op: ArithOp) -> Value {
        if self.is_null() {
            return rhs;
        }
        if rhs.is_null() {
            return self;
        }
        match (self.as_float(), rhs.as_float()) {
            (Some(a), Some(b)) => Value::Float(match op {
                ArithOp::Add => a + b,
                ArithOp::Sub => a - b,
                ArithOp::Mul => a * b,
                ArithOp::Div => a / b,
            }),
            _ if op == ArithOp::Add => {
                let mut joined = self.to_string();
                joined.push_str(&rhs.to_string());
                Value::Str(joined)
            }
            _ => Value::Null,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

fn format_float(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{:.1}", f)
    } else {
        f.to_string()
    }
}

// ============================================================================
// Operators
// ============================================================================

macro_rules! impl_arith {
    ($trait:ident, $method:ident, $op:expr) => {
        impl $trait for Value {
            type Output = Value;

            fn $method(self, rhs: Value) -> Value {
                self.arith(rhs, $op)
            }
        }

        impl $trait<&Value> for &Value {
            type Output = Value;

            fn $method(self, rhs: &Value) -> Value {
                self.clone().arith(rhs.clone(), $op)
            }
        }
    };
}

impl_arith!(Add, add, ArithOp::Add);
impl_arith!(Sub, sub, ArithOp::Sub);
impl_arith!(Mul, mul, ArithOp::Mul);
impl_arith!(Div, div, ArithOp::Div);

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Null, Value::Str(s)) | (Value::Str(s), Value::Null) => s.is_empty(),
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => (*a as f64) == *b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl Index<&str> for Value {
    type Output = Value;

    fn index(&self, key: &str) -> &Value {
        self.get(key)
    }
}

impl Index<usize> for Value {
    type Output = Value;

    fn index(&self, index: usize) -> &Value {
        self.get_index(index)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str().unwrap_or_default())
    }
}

// ============================================================================
// Conversions
// ============================================================================

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::List(v)
    }
}

impl From<IndexMap<String, Value>> for Value {
    fn from(v: IndexMap<String, Value>) -> Self {
        Value::Map(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => n.as_f64().map(Value::Float).unwrap_or(Value::Null),
            },
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(items) => Value::List(items.into_iter().map(Value::from).collect()),
            serde_json::Value::Object(map) => {
                Value::Map(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_null_coercions() {
        let v = Value::Null;
        assert_eq!(v.as_str(), None);
        assert_eq!(v.as_int(), None);
        assert_eq!(v.as_float(), None);
        assert_eq!(v.as_bool(), None);
        assert_eq!(v.to_string(), "");
    }

    #[test]
    fn test_as_int_truncates() {
        assert_eq!(Value::from("12.7").as_int(), Some(12));
        assert_eq!(Value::from("-3.9").as_int(), Some(-3));
        assert_eq!(Value::Float(99.99).as_int(), Some(99));
        assert_eq!(Value::from("abc").as_int(), None);
    }

    #[test]
    fn test_as_bool_words() {
        for word in ["true", "TRUE", "1", "t", "Y", "yes", "Yes"] {
            assert_eq!(Value::from(word).as_bool(), Some(true), "{}", word);
        }
        for word in ["false", "0", "f", "n", "no", "NO", "maybe"] {
            assert_eq!(Value::from(word).as_bool(), Some(false), "{}", word);
        }
        assert_eq!(Value::Int(1).as_bool(), Some(true));
        assert_eq!(Value::Bool(false).as_bool(), Some(false));
    }

    #[test]
    fn test_equality() {
        assert_eq!(Value::Null, Value::Null);
        assert_eq!(Value::Null, Value::from(""));
        assert_ne!(Value::Null, Value::Int(0));
        assert_eq!(Value::Int(2), Value::Float(2.0));
    }

    #[test]
    fn test_index_misses_are_null() {
        let mut map = IndexMap::new();
        map.insert("width".to_string(), Value::Int(400));
        let v = Value::Map(map);

        assert_eq!(v["width"].as_int(), Some(400));
        assert!(v["height"].is_null());
        assert!(v["height"]["nested"].is_null());
        assert!(Value::Null[3].is_null());
    }

    #[test]
    fn test_iteration() {
        let v = Value::List(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(v.iter().count(), 2);
        assert_eq!(Value::Null.iter().count(), 0);
    }

    #[test]
    fn test_string_add_concatenates() {
        assert_eq!(Value::from("a") + Value::from("b"), Value::from("ab"));
        assert!((Value::from("a") * Value::Int(2)).is_null());
    }

    #[test]
    fn test_json_conversion() {
        let json = serde_json::json!({"a": 1, "b": [true, 2.5, null]});
        let v = Value::from(json.clone());
        assert_eq!(v["a"], Value::Int(1));
        assert!(v["b"][2].is_null());
        assert_eq!(v.to_json(), json);
    }

    proptest! {
        #[test]
        fn null_is_passed_over_in_add_and_sub(x in -1.0e9f64..1.0e9) {
            prop_assert_eq!(Value::Null + Value::Float(x), Value::Float(x));
            prop_assert_eq!(Value::Null - Value::Float(x), Value::Float(x));
            prop_assert_eq!(Value::Float(x) + Value::Null, Value::Float(x));
        }

        #[test]
        fn arithmetic_matches_float_semantics(a in -1.0e6f64..1.0e6, b in 1.0f64..1.0e6) {
            prop_assert_eq!(Value::Float(a) + Value::Int(b as i64), Value::Float(a + (b as i64) as f64));
            prop_assert_eq!(Value::from(a.to_string()) * Value::Float(b), Value::Float(a * b));
            prop_assert_eq!(Value::Float(a) / Value::Float(b), Value::Float(a / b));
        }

        #[test]
        fn as_int_truncates_toward_zero(x in -1.0e9f64..1.0e9) {
            prop_assert_eq!(Value::Float(x).as_int(), Some(x.trunc() as i64));
        }
    }
}
