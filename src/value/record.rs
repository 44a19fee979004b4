use std::collections::BTreeMap;
use std::fmt;

use super::table::escape_ident;
use super::Value;

/// The key part of a record reference.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordIdKey {
    String(String),
    Integer(i64),
    Array(Vec<Value>),
    Object(BTreeMap<String, Value>),
}

impl From<&str> for RecordIdKey {
    fn from(s: &str) -> Self {
        RecordIdKey::String(s.to_string())
    }
}

impl From<String> for RecordIdKey {
    fn from(s: String) -> Self {
        RecordIdKey::String(s)
    }
}

impl From<i64> for RecordIdKey {
    fn from(n: i64) -> Self {
        RecordIdKey::Integer(n)
    }
}

/// A reference to a single record: table name plus key.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordId {
    table: String,
    key: RecordIdKey,
}

impl RecordId {
    pub fn new(table: impl Into<String>, key: impl Into<RecordIdKey>) -> Self {
        RecordId {
            table: table.into(),
            key: key.into(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn key(&self) -> &RecordIdKey {
        &self.key
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", escape_ident(&self.table))?;
        match &self.key {
            RecordIdKey::String(s) => f.write_str(&escape_ident(s)),
            RecordIdKey::Integer(n) => write!(f, "{}", n),
            RecordIdKey::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            RecordIdKey::Object(map) => {
                f.write_str("{ ")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                f.write_str(" }")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_plain() {
        let rid = RecordId::new("users", "alice");
        assert_eq!(rid.to_string(), "users:alice");
    }

    #[test]
    fn test_display_escapes_non_word_keys() {
        let rid = RecordId::new("users", "alice smith");
        assert_eq!(rid.to_string(), "users:⟨alice smith⟩");
    }

    #[test]
    fn test_display_integer_key() {
        let rid = RecordId::new("events", 42i64);
        assert_eq!(rid.to_string(), "events:42");
    }
}
