//! Dynamically typed field values and field-name → value mappings.
//!
//! [`Value`] is the currency between models, predicates and sessions:
//! models convert their fields into values, predicates compare against
//! them, and backends bind them as statement parameters.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::DataError;

/// A single scalar field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Name of the variant, used in conversion errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
        }
    }

    /// SQL comparison: `None` when either side is `NULL` or the types
    /// are not comparable.
    pub fn sql_cmp(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, _) | (_, Value::Null) => None,
            (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
            (Value::Text(_), _) | (_, Value::Text(_)) => None,
            (a, b) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        }
    }

    /// Total ordering used for `ORDER BY`: `NULL` sorts first, then
    /// numbers, then text.
    pub fn sort_cmp(&self, other: &Value) -> Ordering {
        fn rank(v: &Value) -> u8 {
            match v {
                Value::Null => 0,
                Value::Bool(_) | Value::Int(_) | Value::Float(_) => 1,
                Value::Text(_) => 2,
            }
        }
        rank(self)
            .cmp(&rank(other))
            .then_with(|| self.sql_cmp(other).unwrap_or(Ordering::Equal))
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Null | Value::Text(_) => None,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Text(s) => write!(f, "'{}'", s.replace('\'', "''")),
        }
    }
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident as $cast:ty),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v as $cast)
                }
            }
        )*
    };
}

value_from! {
    i8 => Int as i64,
    i16 => Int as i64,
    i32 => Int as i64,
    i64 => Int as i64,
    u8 => Int as i64,
    u16 => Int as i64,
    u32 => Int as i64,
    f32 => Float as f64,
    f64 => Float as f64,
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// A failed [`FromValue`] conversion.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueError {
    pub expected: &'static str,
    pub found: &'static str,
}

impl ValueError {
    fn new(expected: &'static str, found: &Value) -> Self {
        Self {
            expected,
            found: found.kind(),
        }
    }

    /// Attach the field name, producing a [`DataError::InvalidValue`].
    pub fn for_field(self, field: &str) -> DataError {
        DataError::InvalidValue {
            field: field.to_string(),
            expected: self.expected,
            found: self.found,
        }
    }
}

/// Conversion from a [`Value`] back into a Rust field type.
pub trait FromValue: Sized {
    fn from_value(value: Value) -> Result<Self, ValueError>;

    /// The value to use when the field is absent altogether.
    ///
    /// `None` means the field is required.
    fn from_missing() -> Option<Self> {
        None
    }
}

impl FromValue for Value {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        Ok(value)
    }

    fn from_missing() -> Option<Self> {
        Some(Value::Null)
    }
}

impl FromValue for i64 {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Int(i) => Ok(i),
            other => Err(ValueError::new("integer", &other)),
        }
    }
}

impl FromValue for i32 {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Int(i) => i32::try_from(i).map_err(|_| ValueError::new("i32", &Value::Int(i))),
            other => Err(ValueError::new("i32", &other)),
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Float(f) => Ok(f),
            Value::Int(i) => Ok(i as f64),
            other => Err(ValueError::new("float", &other)),
        }
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Bool(b) => Ok(b),
            Value::Int(0) => Ok(false),
            Value::Int(1) => Ok(true),
            other => Err(ValueError::new("bool", &other)),
        }
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Text(s) => Ok(s),
            other => Err(ValueError::new("text", &other)),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }

    fn from_missing() -> Option<Self> {
        Some(None)
    }
}

/// An ordered mapping of field name to value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Values(BTreeMap<String, Value>);

impl Values {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(field.into(), value.into())
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.0.remove(field)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Build values from any serializable struct or map.
    ///
    /// The value must serialize to a JSON object with scalar members.
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Self, DataError> {
        let json = serde_json::to_value(value)
            .map_err(|e| DataError::Other(format!("cannot convert to values: {e}")))?;
        Values::try_from(json)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Values {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Values(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl IntoIterator for Values {
    type Item = (String, Value);
    type IntoIter = std::collections::btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl TryFrom<serde_json::Value> for Values {
    type Error = DataError;

    fn try_from(json: serde_json::Value) -> Result<Self, Self::Error> {
        match json {
            serde_json::Value::Object(map) => map
                .into_iter()
                .map(|(k, v)| {
                    let value = json_scalar(&k, v)?;
                    Ok((k, value))
                })
                .collect(),
            other => Err(DataError::InvalidValue {
                field: String::new(),
                expected: "object",
                found: json_kind(&other),
            }),
        }
    }
}

fn json_scalar(field: &str, json: serde_json::Value) -> Result<Value, DataError> {
    match json {
        serde_json::Value::Null => Ok(Value::Null),
        serde_json::Value::Bool(b) => Ok(Value::Bool(b)),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Ok(Value::Int(i)),
            None => n.as_f64().map(Value::Float).ok_or_else(|| DataError::InvalidValue {
                field: field.to_string(),
                expected: "number",
                found: "number",
            }),
        },
        serde_json::Value::String(s) => Ok(Value::Text(s)),
        other => Err(DataError::InvalidValue {
            field: field.to_string(),
            expected: "scalar",
            found: json_kind(&other),
        }),
    }
}

fn json_kind(json: &serde_json::Value) -> &'static str {
    match json {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// Anything that can supply field values to `create` and `update`.
pub trait IntoValues {
    fn into_values(self) -> Result<Values, DataError>;
}

impl IntoValues for Values {
    fn into_values(self) -> Result<Values, DataError> {
        Ok(self)
    }
}

impl IntoValues for &Values {
    fn into_values(self) -> Result<Values, DataError> {
        Ok(self.clone())
    }
}

impl IntoValues for serde_json::Value {
    fn into_values(self) -> Result<Values, DataError> {
        Values::try_from(self)
    }
}

impl<K: Into<String>, V: Into<Value>, const N: usize> IntoValues for [(K, V); N] {
    fn into_values(self) -> Result<Values, DataError> {
        Ok(self.into_iter().collect())
    }
}

/// A partial-update object.
///
/// Wraps any `Serialize` struct; only members that serialize to a non-null
/// value count as explicitly set. Use `Option` fields with
/// `#[serde(skip_serializing_if = "Option::is_none")]` or plain `Option`s.
/// To explicitly set a column to `NULL`, pass [`Values`] instead.
#[derive(Debug, Clone)]
pub struct Partial<T>(pub T);

impl<T: Serialize> IntoValues for Partial<T> {
    fn into_values(self) -> Result<Values, DataError> {
        let values = Values::from_serialize(&self.0)?;
        Ok(values.into_iter().filter(|(_, v)| !v.is_null()).collect())
    }
}

/// A positional primary-key value.
///
/// A scalar converts into a one-column key; tuples convert into
/// composite keys in column order.
#[derive(Debug, Clone, PartialEq)]
pub struct Key(pub Vec<Value>);

impl Key {
    pub fn values(&self) -> &[Value] {
        &self.0
    }
}

macro_rules! key_from_scalar {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Key {
                fn from(v: $ty) -> Self {
                    Key(vec![Value::from(v)])
                }
            }
        )*
    };
}

key_from_scalar!(i32, i64, u32, bool, String, &str, Value);

impl<A: Into<Value>, B: Into<Value>> From<(A, B)> for Key {
    fn from((a, b): (A, B)) -> Self {
        Key(vec![a.into(), b.into()])
    }
}

impl<A: Into<Value>, B: Into<Value>, C: Into<Value>> From<(A, B, C)> for Key {
    fn from((a, b, c): (A, B, C)) -> Self {
        Key(vec![a.into(), b.into(), c.into()])
    }
}

impl From<Vec<Value>> for Key {
    fn from(v: Vec<Value>) -> Self {
        Key(v)
    }
}
