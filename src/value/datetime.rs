use std::fmt;

use chrono::{DateTime as ChronoDateTime, TimeZone, Utc};

use crate::error::{DriverError, DriverResult};

const NANOS_PER_MILLI: u32 = 1_000_000;
const NANOS_PER_SEC: u32 = 1_000_000_000;

/// A point in time with nanosecond resolution.
///
/// Held as full seconds since the Unix epoch plus nanoseconds within the
/// second. The wire form (see the codec) truncates the nanosecond component
/// to millisecond granularity; that loss is part of the wire contract, not
/// of this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Datetime {
    seconds: i64,
    nanos: u32,
}

impl Datetime {
    /// Build from epoch seconds and nanoseconds within the second.
    ///
    /// Nanosecond overflow is carried into the seconds component.
    pub fn new(seconds: i64, nanos: u32) -> Self {
        let carry = i64::from(nanos / NANOS_PER_SEC);
        Datetime {
            seconds: seconds + carry,
            nanos: nanos % NANOS_PER_SEC,
        }
    }

    /// The current instant.
    pub fn now() -> Self {
        let now = Utc::now();
        Datetime {
            seconds: now.timestamp(),
            nanos: now.timestamp_subsec_nanos() % NANOS_PER_SEC,
        }
    }

    /// Parse an RFC 3339 / ISO 8601 timestamp.
    pub fn parse(input: &str) -> DriverResult<Self> {
        let parsed = ChronoDateTime::parse_from_rfc3339(input)
            .map_err(|e| DriverError::Validation(format!("Invalid datetime '{}': {}", input, e)))?
            .with_timezone(&Utc);
        Ok(Datetime {
            seconds: parsed.timestamp(),
            nanos: parsed.timestamp_subsec_nanos() % NANOS_PER_SEC,
        })
    }

    /// Seconds since the Unix epoch.
    pub fn seconds(&self) -> i64 {
        self.seconds
    }

    /// Nanoseconds within the second.
    pub fn nanos(&self) -> u32 {
        self.nanos
    }

    /// The compact wire tuple: full epoch seconds plus nanoseconds floored
    /// to millisecond granularity (milliseconds re-expressed as nanoseconds).
    pub fn to_compact(&self) -> (i64, u32) {
        (self.seconds, (self.nanos / NANOS_PER_MILLI) * NANOS_PER_MILLI)
    }

    /// Rebuild from the compact wire tuple, applying the same millisecond
    /// floor so that both directions of the boundary agree. A nanosecond
    /// component of a second or more carries into the seconds, as in
    /// [`new`].
    ///
    /// [`new`]: Datetime::new
    pub fn from_compact(seconds: i64, nanos: u64) -> Self {
        let millis = nanos / u64::from(NANOS_PER_MILLI);
        Datetime {
            seconds: seconds.saturating_add((millis / 1_000) as i64),
            nanos: ((millis % 1_000) as u32) * NANOS_PER_MILLI,
        }
    }
}

impl fmt::Display for Datetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match Utc.timestamp_opt(self.seconds, self.nanos).single() {
            Some(dt) => write!(f, "{}", dt.to_rfc3339_opts(chrono::SecondsFormat::AutoSi, true)),
            None => write!(f, "{}s {}ns", self.seconds, self.nanos),
        }
    }
}
