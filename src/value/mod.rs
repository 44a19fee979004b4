//! The extended scalar type system carried over the wire.
//!
//! Domain values with no native CBOR representation (decimals, high
//! resolution timestamps, table and record references, file references)
//! are modeled as one closed sum type; the codec dispatches on the variant.

mod datetime;
mod decimal;
mod duration;
mod file;
mod record;
mod table;

use std::collections::BTreeMap;
use std::fmt;

pub use datetime::Datetime;
pub use decimal::Decimal;
pub use duration::Duration;
pub use file::File;
pub use record::{RecordId, RecordIdKey};
pub use table::Table;

/// Any value the driver can carry over the wire.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// The absent value (distinct from a missing key).
    #[default]
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    Array(Vec<Value>),
    Object(BTreeMap<String, Value>),
    Decimal(Decimal),
    Datetime(Datetime),
    Duration(Duration),
    Uuid(uuid::Uuid),
    Table(Table),
    RecordId(RecordId),
    File(File),
}

impl Value {
    /// A short name for the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::None => "none",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Decimal(_) => "decimal",
            Value::Datetime(_) => "datetime",
            Value::Duration(_) => "duration",
            Value::Uuid(_) => "uuid",
            Value::Table(_) => "table",
            Value::RecordId(_) => "record id",
            Value::File(_) => "file",
        }
    }

    /// Lossy conversion into plain JSON for display and interop: extended
    /// scalars map to their textual forms, bytes to an array of numbers.
    pub fn into_json(self) -> serde_json::Value {
        use serde_json::Value as Json;
        match self {
            Value::None => Json::Null,
            Value::Bool(b) => Json::Bool(b),
            Value::Int(n) => Json::from(n),
            Value::Float(f) => serde_json::Number::from_f64(f)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            Value::String(s) => Json::String(s),
            Value::Bytes(b) => Json::Array(b.into_iter().map(Json::from).collect()),
            Value::Array(items) => Json::Array(items.into_iter().map(Value::into_json).collect()),
            Value::Object(map) => Json::Object(
                map.into_iter()
                    .map(|(k, v)| (k, v.into_json()))
                    .collect(),
            ),
            Value::Decimal(d) => Json::String(d.to_string()),
            Value::Datetime(dt) => Json::String(dt.to_string()),
            Value::Duration(d) => Json::String(d.to_string()),
            Value::Uuid(u) => Json::String(u.to_string()),
            Value::Table(t) => Json::String(t.name().to_string()),
            Value::RecordId(rid) => Json::String(rid.to_string()),
            Value::File(f) => Json::String(f.to_string()),
        }
    }

    /// Build a value from plain JSON. Numbers become ints when they fit,
    /// floats otherwise; nothing is promoted to an extended scalar.
    pub fn from_json(json: serde_json::Value) -> Value {
        use serde_json::Value as Json;
        match json {
            Json::Null => Value::None,
            Json::Bool(b) => Value::Bool(b),
            Json::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Json::String(s) => Value::String(s),
            Json::Array(items) => Value::Array(items.into_iter().map(Value::from_json).collect()),
            Json::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from_json(v)))
                    .collect(),
            ),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => f.write_str("NONE"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(x) => write!(f, "{}", x),
            Value::String(s) => write!(f, "'{}'", s),
            Value::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            Value::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Value::Object(map) => {
                f.write_str("{ ")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                f.write_str(" }")
            }
            Value::Decimal(d) => write!(f, "{}", d),
            Value::Datetime(dt) => write!(f, "{}", dt),
            Value::Duration(d) => write!(f, "{}", d),
            Value::Uuid(u) => write!(f, "{}", u),
            Value::Table(t) => write!(f, "{}", t),
            Value::RecordId(rid) => write!(f, "{}", rid),
            Value::File(file) => write!(f, "{}", file),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}
