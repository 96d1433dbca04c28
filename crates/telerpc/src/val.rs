//! # Wire Values
//!
//! The dynamically typed values arguments and results travel as.
//!
//! JSON has no `undefined`, so clients substitute a sentinel string for it;
//! [`Val::from_wire_json`] turns the sentinel back into [`Val::Undefined`],
//! or drops the object field that carried it.
//! Going the other way, [`Val::to_json`] drops undefined object fields and
//! writes undefined array items as `null`.

use std::fmt;

use serde_json::Map;
use serde_json::Number;
use serde_json::Value;

/// Substituted for `undefined` by clients before JSON encoding.
pub const UNDEFINED_SENTINEL: &str = "__TELEPHONE__UNDEFINED__alphaBetaGama_check123__";

/// Largest integer an `f64` holds exactly.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// A dynamically typed wire value.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Val {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<Val>),
    /// Fields in wire order; keys are unique.
    Object(Vec<(String, Val)>),
}

impl Val {
    /// Runtime type tag used in diagnostics.
    ///
    /// `null` and arrays report `object`, matching the tags clients see.
    pub fn type_tag(&self) -> &'static str {
        match self {
            Val::Undefined => "undefined",
            Val::Null => "object",
            Val::Bool(_) => "boolean",
            Val::Number(_) => "number",
            Val::String(_) => "string",
            Val::Array(_) => "object",
            Val::Object(_) => "object",
        }
    }

    /// Short description distinguishing `null` and arrays from objects.
    pub fn describe(&self) -> &'static str {
        match self {
            Val::Null => "null",
            Val::Array(_) => "array",
            other => other.type_tag(),
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Val::Undefined)
    }

    /// `undefined` or `null`.
    pub fn is_nullish(&self) -> bool {
        matches!(self, Val::Undefined | Val::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Val::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Val::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Val::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Val]> {
        match self {
            Val::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Field lookup on an object. Present-but-undefined fields are `Some`.
    pub fn get(&self, key: &str) -> Option<&Val> {
        match self {
            Val::Object(fields) => fields.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Builds an object, later duplicates replacing earlier ones.
    pub fn object<K: Into<String>>(fields: impl IntoIterator<Item = (K, Val)>) -> Self {
        let mut out: Vec<(String, Val)> = Vec::new();
        for (key, val) in fields {
            let key = key.into();
            match out.iter_mut().find(|(k, _)| *k == key) {
                Some((_, slot)) => *slot = val,
                None => out.push((key, val)),
            }
        }
        Val::Object(out)
    }

    /// Converts decoded JSON, with no sentinel substitution.
    pub fn from_json(value: Value) -> Self {
        Self::from_wire_json(value, None)
    }

    /// Converts decoded JSON, mapping string values equal to `sentinel` to
    /// [`Val::Undefined`] at the top level and in arrays. Object fields
    /// holding the sentinel are dropped, so they read as absent.
    pub fn from_wire_json(value: Value, sentinel: Option<&str>) -> Self {
        match value {
            Value::Null => Val::Null,
            Value::Bool(b) => Val::Bool(b),
            Value::Number(n) => Val::Number(n.as_f64().unwrap_or(f64::NAN)),
            Value::String(s) if sentinel == Some(s.as_str()) => Val::Undefined,
            Value::String(s) => Val::String(s),
            Value::Array(items) => Val::Array(
                items
                    .into_iter()
                    .map(|item| Self::from_wire_json(item, sentinel))
                    .collect(),
            ),
            // A sentinel field is left out entirely, as if never sent.
            Value::Object(map) => Val::Object(
                map.into_iter()
                    .filter(|(_, v)| !is_sentinel(v, sentinel))
                    .map(|(k, v)| (k, Self::from_wire_json(v, sentinel)))
                    .collect(),
            ),
        }
    }

    /// Encodes as JSON. Integral numbers encode without a fraction; NaN and
    /// infinities encode as `null`.
    pub fn to_json(&self) -> Value {
        match self {
            Val::Undefined | Val::Null => Value::Null,
            Val::Bool(b) => Value::Bool(*b),
            Val::Number(n) => number_to_json(*n),
            Val::String(s) => Value::String(s.clone()),
            Val::Array(items) => Value::Array(items.iter().map(Val::to_json).collect()),
            Val::Object(fields) => {
                let mut map = Map::new();
                for (k, v) in fields {
                    if !v.is_undefined() {
                        map.insert(k.clone(), v.to_json());
                    }
                }
                Value::Object(map)
            }
        }
    }
}

fn is_sentinel(value: &Value, sentinel: Option<&str>) -> bool {
    matches!((value, sentinel), (Value::String(s), Some(sentinel)) if s == sentinel)
}

fn number_to_json(n: f64) -> Value {
    if n.is_finite() && n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        return Value::from(n as i64);
    }
    Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
}

impl fmt::Display for Val {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Val::Undefined => f.write_str("undefined"),
            other => write!(f, "{}", other.to_json()),
        }
    }
}

impl From<Value> for Val {
    fn from(value: Value) -> Self {
        Val::from_json(value)
    }
}

impl From<()> for Val {
    fn from(_: ()) -> Self {
        Val::Undefined
    }
}

impl From<bool> for Val {
    fn from(b: bool) -> Self {
        Val::Bool(b)
    }
}

impl From<f64> for Val {
    fn from(n: f64) -> Self {
        Val::Number(n)
    }
}

impl From<i32> for Val {
    fn from(n: i32) -> Self {
        Val::Number(n as f64)
    }
}

impl From<i64> for Val {
    fn from(n: i64) -> Self {
        Val::Number(n as f64)
    }
}

impl From<u32> for Val {
    fn from(n: u32) -> Self {
        Val::Number(n as f64)
    }
}

impl From<&str> for Val {
    fn from(s: &str) -> Self {
        Val::String(s.to_string())
    }
}

impl From<String> for Val {
    fn from(s: String) -> Self {
        Val::String(s)
    }
}

impl From<Vec<Val>> for Val {
    fn from(items: Vec<Val>) -> Self {
        Val::Array(items)
    }
}

impl<T: Into<Val>> From<Option<T>> for Val {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Val::Null, Into::into)
    }
}
