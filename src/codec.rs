//! CBOR wire codec for the extended scalar type system.
//!
//! Scalars with no native CBOR representation are carried as tagged values.
//! The tag assignment is a cross-version compatibility surface and must not
//! change:
//!
//! | tag | value                  | content                          |
//! |-----|------------------------|----------------------------------|
//! | 0   | datetime (decode only) | RFC 3339 text                    |
//! | 6   | none                   | null                             |
//! | 7   | table                  | identifier text                  |
//! | 8   | record id              | `[table, key]`                   |
//! | 9   | uuid (decode only)     | text                             |
//! | 10  | decimal                | exact digit string               |
//! | 12  | datetime               | `[seconds, nanoseconds]`         |
//! | 13  | duration (decode only) | text                             |
//! | 14  | duration               | `[s, ns]`, trailing zeros trimmed|
//! | 37  | uuid                   | 16 bytes                         |
//! | 55  | file reference         | `[bucket, key]`                  |
//!
//! Encoding and decoding are pure; the codec owns no state.

use ciborium::value::Integer;
use ciborium::Value as Cbor;

use crate::error::{DriverError, DriverResult};
use crate::value::{Datetime, Decimal, Duration, File, RecordId, RecordIdKey, Table, Value};

const TAG_SPEC_DATETIME: u64 = 0;
const TAG_NONE: u64 = 6;
const TAG_TABLE: u64 = 7;
const TAG_RECORDID: u64 = 8;
const TAG_STRING_UUID: u64 = 9;
const TAG_STRING_DECIMAL: u64 = 10;
const TAG_CUSTOM_DATETIME: u64 = 12;
const TAG_STRING_DURATION: u64 = 13;
const TAG_CUSTOM_DURATION: u64 = 14;
const TAG_SPEC_UUID: u64 = 37;
const TAG_FILE: u64 = 55;

/// Encode a value into its binary wire form.
pub fn encode(value: &Value) -> DriverResult<Vec<u8>> {
    let cbor = to_cbor(value)?;
    let mut buf = Vec::new();
    ciborium::into_writer(&cbor, &mut buf)
        .map_err(|e| DriverError::Protocol(format!("CBOR encode failed: {}", e)))?;
    Ok(buf)
}

/// Decode a binary wire form back into a value.
pub fn decode(bytes: &[u8]) -> DriverResult<Value> {
    let cbor: Cbor = ciborium::from_reader(bytes)
        .map_err(|e| DriverError::Protocol(format!("CBOR decode failed: {}", e)))?;
    from_cbor(cbor)
}

pub(crate) fn to_cbor(value: &Value) -> DriverResult<Cbor> {
    Ok(match value {
        Value::None => Cbor::Tag(TAG_NONE, Box::new(Cbor::Null)),
        Value::Bool(b) => Cbor::Bool(*b),
        Value::Int(n) => Cbor::Integer(Integer::from(*n)),
        Value::Float(x) => Cbor::Float(*x),
        Value::String(s) => Cbor::Text(s.clone()),
        Value::Bytes(b) => Cbor::Bytes(b.clone()),
        Value::Array(items) => Cbor::Array(
            items
                .iter()
                .map(to_cbor)
                .collect::<DriverResult<Vec<_>>>()?,
        ),
        Value::Object(map) => Cbor::Map(
            map.iter()
                .map(|(k, v)| Ok((Cbor::Text(k.clone()), to_cbor(v)?)))
                .collect::<DriverResult<Vec<_>>>()?,
        ),
        Value::Decimal(d) => Cbor::Tag(
            TAG_STRING_DECIMAL,
            Box::new(Cbor::Text(d.as_str().to_string())),
        ),
        Value::Datetime(dt) => {
            let (seconds, nanos) = dt.to_compact();
            Cbor::Tag(
                TAG_CUSTOM_DATETIME,
                Box::new(Cbor::Array(vec![
                    Cbor::Integer(Integer::from(seconds)),
                    Cbor::Integer(Integer::from(nanos)),
                ])),
            )
        }
        Value::Duration(d) => Cbor::Tag(
            TAG_CUSTOM_DURATION,
            Box::new(Cbor::Array(
                d.to_compact()
                    .into_iter()
                    .map(|n| Cbor::Integer(Integer::from(n)))
                    .collect(),
            )),
        ),
        Value::Uuid(u) => Cbor::Tag(TAG_SPEC_UUID, Box::new(Cbor::Bytes(u.as_bytes().to_vec()))),
        Value::Table(t) => {
            // Decode is permissive, so an invalid name may exist in memory.
            // It must never reach the wire.
            if !t.is_valid() {
                return Err(DriverError::Validation(format!(
                    "Invalid table name: '{}'",
                    t.name()
                )));
            }
            Cbor::Tag(TAG_TABLE, Box::new(Cbor::Text(t.name().to_string())))
        }
        Value::RecordId(rid) => Cbor::Tag(
            TAG_RECORDID,
            Box::new(Cbor::Array(vec![
                Cbor::Text(rid.table().to_string()),
                record_key_to_cbor(rid.key())?,
            ])),
        ),
        Value::File(file) => Cbor::Tag(
            TAG_FILE,
            Box::new(Cbor::Array(vec![
                Cbor::Text(file.bucket().to_string()),
                Cbor::Text(file.key().to_string()),
            ])),
        ),
    })
}

fn record_key_to_cbor(key: &RecordIdKey) -> DriverResult<Cbor> {
    Ok(match key {
        RecordIdKey::String(s) => Cbor::Text(s.clone()),
        RecordIdKey::Integer(n) => Cbor::Integer(Integer::from(*n)),
        RecordIdKey::Array(items) => Cbor::Array(
            items
                .iter()
                .map(to_cbor)
                .collect::<DriverResult<Vec<_>>>()?,
        ),
        RecordIdKey::Object(map) => Cbor::Map(
            map.iter()
                .map(|(k, v)| Ok((Cbor::Text(k.clone()), to_cbor(v)?)))
                .collect::<DriverResult<Vec<_>>>()?,
        ),
    })
}

pub(crate) fn from_cbor(cbor: Cbor) -> DriverResult<Value> {
    Ok(match cbor {
        Cbor::Null => Value::None,
        Cbor::Bool(b) => Value::Bool(b),
        Cbor::Integer(i) => Value::Int(
            i64::try_from(i)
                .map_err(|_| DriverError::Protocol("Integer out of range".to_string()))?,
        ),
        Cbor::Float(x) => Value::Float(x),
        Cbor::Text(s) => Value::String(s),
        Cbor::Bytes(b) => Value::Bytes(b),
        Cbor::Array(items) => Value::Array(
            items
                .into_iter()
                .map(from_cbor)
                .collect::<DriverResult<Vec<_>>>()?,
        ),
        Cbor::Map(entries) => {
            let mut map = std::collections::BTreeMap::new();
            for (k, v) in entries {
                let key = match k {
                    Cbor::Text(s) => s,
                    other => {
                        return Err(DriverError::Protocol(format!(
                            "Non-text map key: {:?}",
                            other
                        )))
                    }
                };
                map.insert(key, from_cbor(v)?);
            }
            Value::Object(map)
        }
        Cbor::Tag(tag, content) => from_tagged(tag, *content)?,
        other => {
            return Err(DriverError::UnsupportedType(format!(
                "CBOR value {:?}",
                other
            )))
        }
    })
}

fn from_tagged(tag: u64, content: Cbor) -> DriverResult<Value> {
    match tag {
        TAG_NONE => Ok(Value::None),
        TAG_SPEC_DATETIME => {
            let text = expect_text(content, "datetime")?;
            Ok(Value::Datetime(Datetime::parse(&text)?))
        }
        TAG_CUSTOM_DATETIME => {
            let parts = expect_array(content, "datetime")?;
            let seconds = parts
                .first()
                .map(|p| expect_i64(p, "datetime seconds"))
                .transpose()?
                .unwrap_or(0);
            let nanos = parts
                .get(1)
                .map(|p| expect_u64(p, "datetime nanoseconds"))
                .transpose()?
                .unwrap_or(0);
            Ok(Value::Datetime(Datetime::from_compact(seconds, nanos)))
        }
        TAG_TABLE => {
            let name = expect_text(content, "table")?;
            Ok(Value::Table(Table::new_unchecked(name)))
        }
        TAG_RECORDID => {
            let mut parts = expect_array(content, "record id")?;
            if parts.len() != 2 {
                return Err(DriverError::Protocol(
                    "Record id must be a [table, key] pair".to_string(),
                ));
            }
            let key = record_key_from_cbor(parts.pop().unwrap_or(Cbor::Null))?;
            let table = expect_text(parts.pop().unwrap_or(Cbor::Null), "record id table")?;
            Ok(Value::RecordId(RecordId::new(table, key)))
        }
        TAG_STRING_UUID => {
            let text = expect_text(content, "uuid")?;
            let parsed = uuid::Uuid::parse_str(&text)
                .map_err(|e| DriverError::Protocol(format!("Invalid uuid '{}': {}", text, e)))?;
            Ok(Value::Uuid(parsed))
        }
        TAG_SPEC_UUID => {
            let bytes = match content {
                Cbor::Bytes(b) => b,
                other => {
                    return Err(DriverError::Protocol(format!(
                        "Uuid content must be bytes, got {:?}",
                        other
                    )))
                }
            };
            let parsed = uuid::Uuid::from_slice(&bytes)
                .map_err(|e| DriverError::Protocol(format!("Invalid uuid bytes: {}", e)))?;
            Ok(Value::Uuid(parsed))
        }
        TAG_STRING_DECIMAL => {
            let digits = expect_text(content, "decimal")?;
            Ok(Value::Decimal(Decimal::from(digits)))
        }
        TAG_STRING_DURATION => {
            let text = expect_text(content, "duration")?;
            Ok(Value::Duration(Duration::parse(&text)?))
        }
        TAG_CUSTOM_DURATION => {
            let parts = expect_array(content, "duration")?;
            if parts.len() > 2 {
                return Err(DriverError::Protocol(
                    "Duration must have at most two components".to_string(),
                ));
            }
            let numbers = parts
                .iter()
                .map(|p| expect_u64(p, "duration component"))
                .collect::<DriverResult<Vec<_>>>()?;
            Ok(Value::Duration(Duration::from_compact(&numbers)))
        }
        TAG_FILE => {
            let mut parts = expect_array(content, "file")?;
            if parts.len() != 2 {
                return Err(DriverError::Protocol(
                    "File must be a [bucket, key] pair".to_string(),
                ));
            }
            let key = expect_text(parts.pop().unwrap_or(Cbor::Null), "file key")?;
            let bucket = expect_text(parts.pop().unwrap_or(Cbor::Null), "file bucket")?;
            Ok(Value::File(File::new(bucket, key)))
        }
        other => Err(DriverError::UnsupportedType(format!("CBOR tag {}", other))),
    }
}

fn record_key_from_cbor(cbor: Cbor) -> DriverResult<RecordIdKey> {
    Ok(match cbor {
        Cbor::Text(s) => RecordIdKey::String(s),
        Cbor::Integer(i) => RecordIdKey::Integer(
            i64::try_from(i)
                .map_err(|_| DriverError::Protocol("Record key out of range".to_string()))?,
        ),
        Cbor::Array(items) => RecordIdKey::Array(
            items
                .into_iter()
                .map(from_cbor)
                .collect::<DriverResult<Vec<_>>>()?,
        ),
        Cbor::Map(_) => match from_cbor(cbor)? {
            Value::Object(map) => RecordIdKey::Object(map),
            _ => unreachable!("maps decode to objects"),
        },
        other => {
            return Err(DriverError::Protocol(format!(
                "Invalid record key: {:?}",
                other
            )))
        }
    })
}

fn expect_text(cbor: Cbor, what: &str) -> DriverResult<String> {
    match cbor {
        Cbor::Text(s) => Ok(s),
        other => Err(DriverError::Protocol(format!(
            "Expected text for {}, got {:?}",
            what, other
        ))),
    }
}

fn expect_array(cbor: Cbor, what: &str) -> DriverResult<Vec<Cbor>> {
    match cbor {
        Cbor::Array(items) => Ok(items),
        other => Err(DriverError::Protocol(format!(
            "Expected array for {}, got {:?}",
            what, other
        ))),
    }
}

fn expect_i64(cbor: &Cbor, what: &str) -> DriverResult<i64> {
    match cbor {
        Cbor::Integer(i) => i64::try_from(*i)
            .map_err(|_| DriverError::Protocol(format!("{} out of range", what))),
        other => Err(DriverError::Protocol(format!(
            "Expected integer for {}, got {:?}",
            what, other
        ))),
    }
}

fn expect_u64(cbor: &Cbor, what: &str) -> DriverResult<u64> {
    match cbor {
        Cbor::Integer(i) => u64::try_from(*i)
            .map_err(|_| DriverError::Protocol(format!("{} out of range", what))),
        other => Err(DriverError::Protocol(format!(
            "Expected integer for {}, got {:?}",
            what, other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn round_trip(value: Value) -> Value {
        decode(&encode(&value).unwrap()).unwrap()
    }

    #[test]
    fn test_plain_values_round_trip() {
        for value in [
            Value::None,
            Value::Bool(true),
            Value::Int(-42),
            Value::Float(2.5),
            Value::String("hello".to_string()),
            Value::Bytes(vec![0, 1, 2, 255]),
        ] {
            assert_eq!(round_trip(value.clone()), value);
        }
    }

    #[test]
    fn test_nested_structures_round_trip() {
        let value = Value::Object(BTreeMap::from([
            (
                "items".to_string(),
                Value::Array(vec![Value::Int(1), Value::String("two".to_string())]),
            ),
            ("empty".to_string(), Value::None),
        ]));
        assert_eq!(round_trip(value.clone()), value);
    }

    #[test]
    fn test_decimal_digits_verbatim() {
        let value = Value::Decimal(Decimal::from("123.4500000000000000000001"));
        let decoded = round_trip(value);
        match decoded {
            Value::Decimal(d) => assert_eq!(d.as_str(), "123.4500000000000000000001"),
            other => panic!("Expected decimal, got {:?}", other),
        }
    }

    #[test]
    fn test_decimal_scale_is_preserved() {
        // "1.50" and "1.5" stay distinct across the wire
        let a = round_trip(Value::Decimal(Decimal::from("1.50")));
        let b = round_trip(Value::Decimal(Decimal::from("1.5")));
        assert_ne!(a, b);
    }

    #[test]
    fn test_datetime_round_trip_truncates_submillisecond() {
        let dt = Datetime::new(1_700_000_123, 123_456_789);
        let decoded = round_trip(Value::Datetime(dt));
        match decoded {
            Value::Datetime(d) => {
                // Full epoch seconds survive; nanoseconds floor to 1ms
                assert_eq!(d.seconds(), 1_700_000_123);
                assert_eq!(d.nanos(), 123_000_000);
            }
            other => panic!("Expected datetime, got {:?}", other),
        }
    }

    #[test]
    fn test_datetime_millisecond_precision_is_lossless() {
        let dt = Datetime::new(1_700_000_123, 456_000_000);
        assert_eq!(round_trip(Value::Datetime(dt)), Value::Datetime(dt));
    }

    #[test]
    fn test_duration_round_trip() {
        for d in [
            Duration::default(),
            Duration::new(90, 0),
            Duration::new(1, 500),
        ] {
            assert_eq!(round_trip(Value::Duration(d)), Value::Duration(d));
        }
    }

    #[test]
    fn test_uuid_round_trip() {
        let u = uuid::Uuid::new_v4();
        assert_eq!(round_trip(Value::Uuid(u)), Value::Uuid(u));
    }

    #[test]
    fn test_table_round_trip_and_eager_validation() {
        let value = Value::Table(Table::new("users").unwrap());
        assert_eq!(round_trip(value.clone()), value);

        // An invalid name obtained through permissive decode fails encode
        let invalid = Value::Table(Table::new_unchecked("my table".to_string()));
        assert!(matches!(
            encode(&invalid),
            Err(DriverError::Validation(_))
        ));
    }

    #[test]
    fn test_record_id_round_trip() {
        let rid = Value::RecordId(RecordId::new("users", "alice"));
        assert_eq!(round_trip(rid.clone()), rid);

        let rid = Value::RecordId(RecordId::new("events", 42i64));
        assert_eq!(round_trip(rid.clone()), rid);

        let rid = Value::RecordId(RecordId::new(
            "shards",
            RecordIdKey::Array(vec![Value::Int(1), Value::String("eu".to_string())]),
        ));
        assert_eq!(round_trip(rid.clone()), rid);
    }

    #[test]
    fn test_file_round_trip() {
        let value = Value::File(File::new("hello world", "/foo bar/test.json"));
        assert_eq!(round_trip(value.clone()), value);
    }

    #[test]
    fn test_unknown_tag_is_rejected_by_name() {
        let cbor = Cbor::Tag(99, Box::new(Cbor::Null));
        let mut buf = Vec::new();
        ciborium::into_writer(&cbor, &mut buf).unwrap();
        match decode(&buf) {
            Err(DriverError::UnsupportedType(msg)) => assert!(msg.contains("99")),
            other => panic!("Expected unsupported type error, got {:?}", other),
        }
    }

    #[test]
    fn test_iso_datetime_tag_decodes() {
        let cbor = Cbor::Tag(
            TAG_SPEC_DATETIME,
            Box::new(Cbor::Text("2023-11-14T22:13:20Z".to_string())),
        );
        let mut buf = Vec::new();
        ciborium::into_writer(&cbor, &mut buf).unwrap();
        match decode(&buf).unwrap() {
            Value::Datetime(dt) => assert_eq!(dt.seconds(), 1_700_000_000),
            other => panic!("Expected datetime, got {:?}", other),
        }
    }

    #[test]
    fn test_string_duration_tag_decodes() {
        let cbor = Cbor::Tag(
            TAG_STRING_DURATION,
            Box::new(Cbor::Text("1h30m".to_string())),
        );
        let mut buf = Vec::new();
        ciborium::into_writer(&cbor, &mut buf).unwrap();
        assert_eq!(
            decode(&buf).unwrap(),
            Value::Duration(Duration::new(5400, 0))
        );
    }
}
