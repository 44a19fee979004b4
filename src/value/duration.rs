use std::fmt;

use crate::error::{DriverError, DriverResult};

const NANOS_PER_SEC: u64 = 1_000_000_000;

// Unit sizes in seconds / nanoseconds, largest first for formatting.
const SECS_PER_MINUTE: u64 = 60;
const SECS_PER_HOUR: u64 = 60 * SECS_PER_MINUTE;
const SECS_PER_DAY: u64 = 24 * SECS_PER_HOUR;
const SECS_PER_WEEK: u64 = 7 * SECS_PER_DAY;
const SECS_PER_YEAR: u64 = 365 * SECS_PER_DAY;

/// A span of time with nanosecond resolution.
///
/// The textual form uses unit suffixes (`1h30m`, `250ms`); the compact wire
/// form is `[seconds, nanoseconds]` with trailing zero components trimmed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Duration {
    secs: u64,
    nanos: u32,
}

impl Duration {
    /// Build from whole seconds and nanoseconds within the second.
    pub fn new(secs: u64, nanos: u32) -> Self {
        let extra = u64::from(nanos) / NANOS_PER_SEC;
        Duration {
            secs: secs + extra,
            nanos: (u64::from(nanos) % NANOS_PER_SEC) as u32,
        }
    }

    pub fn secs(&self) -> u64 {
        self.secs
    }

    pub fn nanos(&self) -> u32 {
        self.nanos
    }

    /// The compact wire tuple with trailing zero components trimmed:
    /// `(secs, nanos)` when nanos are present, `(secs,)` when only seconds,
    /// empty when zero.
    pub fn to_compact(&self) -> Vec<u64> {
        if self.nanos > 0 {
            vec![self.secs, u64::from(self.nanos)]
        } else if self.secs > 0 {
            vec![self.secs]
        } else {
            Vec::new()
        }
    }

    /// Rebuild from the compact wire tuple (zero to two elements).
    pub fn from_compact(parts: &[u64]) -> Self {
        let secs = parts.first().copied().unwrap_or(0);
        let nanos = parts.get(1).copied().unwrap_or(0);
        Duration::new(secs, (nanos % NANOS_PER_SEC) as u32)
            .checked_add_secs(nanos / NANOS_PER_SEC)
    }

    fn checked_add_secs(mut self, secs: u64) -> Self {
        self.secs = self.secs.saturating_add(secs);
        self
    }

    /// Parse a unit-suffixed duration string such as `1h30m` or `250ms`.
    pub fn parse(input: &str) -> DriverResult<Self> {
        if input.is_empty() {
            return Err(DriverError::Validation("Empty duration".to_string()));
        }
        let mut secs: u64 = 0;
        let mut nanos: u64 = 0;
        let mut chars = input.chars().peekable();

        while chars.peek().is_some() {
            let mut number: u64 = 0;
            let mut saw_digit = false;
            while let Some(c) = chars.peek().copied() {
                if let Some(d) = c.to_digit(10) {
                    number = number
                        .checked_mul(10)
                        .and_then(|n| n.checked_add(u64::from(d)))
                        .ok_or_else(|| {
                            DriverError::Validation(format!("Duration overflow in '{}'", input))
                        })?;
                    saw_digit = true;
                    chars.next();
                } else {
                    break;
                }
            }
            if !saw_digit {
                return Err(DriverError::Validation(format!(
                    "Invalid duration '{}': expected a number",
                    input
                )));
            }

            let mut unit = String::new();
            while let Some(c) = chars.peek().copied() {
                if c.is_ascii_alphabetic() || c == 'µ' {
                    unit.push(c);
                    chars.next();
                } else {
                    break;
                }
            }

            // Unit scaling is checked as well: the digits may fit u64
            // while the scaled total does not
            let (is_secs, scale) = match unit.as_str() {
                "y" => (true, SECS_PER_YEAR),
                "w" => (true, SECS_PER_WEEK),
                "d" => (true, SECS_PER_DAY),
                "h" => (true, SECS_PER_HOUR),
                "m" => (true, SECS_PER_MINUTE),
                "s" => (true, 1),
                "ms" => (false, 1_000_000),
                "us" | "µs" => (false, 1_000),
                "ns" => (false, 1),
                other => {
                    return Err(DriverError::Validation(format!(
                        "Invalid duration unit '{}' in '{}'",
                        other, input
                    )))
                }
            };
            let amount = number.checked_mul(scale).ok_or_else(|| overflow(input))?;
            if is_secs {
                secs = secs.checked_add(amount).ok_or_else(|| overflow(input))?;
            } else {
                nanos = nanos.checked_add(amount).ok_or_else(|| overflow(input))?;
            }
        }

        secs = secs
            .checked_add(nanos / NANOS_PER_SEC)
            .ok_or_else(|| overflow(input))?;
        Ok(Duration {
            secs,
            nanos: (nanos % NANOS_PER_SEC) as u32,
        })
    }
}

fn overflow(input: &str) -> DriverError {
    DriverError::Validation(format!("Duration overflow in '{}'", input))
}

impl From<std::time::Duration> for Duration {
    fn from(d: std::time::Duration) -> Self {
        Duration::new(d.as_secs(), d.subsec_nanos())
    }
}

impl From<Duration> for std::time::Duration {
    fn from(d: Duration) -> Self {
        std::time::Duration::new(d.secs, d.nanos)
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.secs == 0 && self.nanos == 0 {
            return f.write_str("0ns");
        }

        let mut secs = self.secs;
        for (size, suffix) in [
            (SECS_PER_YEAR, "y"),
            (SECS_PER_WEEK, "w"),
            (SECS_PER_DAY, "d"),
            (SECS_PER_HOUR, "h"),
            (SECS_PER_MINUTE, "m"),
            (1, "s"),
        ] {
            if secs >= size {
                write!(f, "{}{}", secs / size, suffix)?;
                secs %= size;
            }
        }

        let mut nanos = self.nanos;
        for (size, suffix) in [(1_000_000u32, "ms"), (1_000, "us"), (1, "ns")] {
            if nanos >= size {
                write!(f, "{}{}", nanos / size, suffix)?;
                nanos %= size;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_format() {
        let d = Duration::parse("1h30m").unwrap();
        assert_eq!(d.secs(), 5400);
        assert_eq!(d.to_string(), "1h30m");

        let d = Duration::parse("250ms").unwrap();
        assert_eq!(d.nanos(), 250_000_000);
        assert_eq!(d.to_string(), "250ms");

        let d = Duration::parse("2w3d4h5m6s7ms8us9ns").unwrap();
        assert_eq!(Duration::parse(&d.to_string()).unwrap(), d);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Duration::parse("").is_err());
        assert!(Duration::parse("h").is_err());
        assert!(Duration::parse("10parsecs").is_err());
    }

    #[test]
    fn test_parse_rejects_overflow() {
        // Digits fit u64 but the year scaling does not
        assert!(matches!(
            Duration::parse("1000000000000y"),
            Err(DriverError::Validation(_))
        ));
        // Accumulation across components overflows
        assert!(Duration::parse("18446744073709551615s1s").is_err());
        // Millisecond scaling overflows the nanosecond accumulator
        assert!(Duration::parse("100000000000000000ms").is_err());
        // Near the edge but representable stays fine
        assert_eq!(
            Duration::parse("18446744073709551615s").unwrap().secs(),
            u64::MAX
        );
    }

    #[test]
    fn test_compact_trims_trailing_zeroes() {
        assert_eq!(Duration::new(0, 0).to_compact(), Vec::<u64>::new());
        assert_eq!(Duration::new(90, 0).to_compact(), vec![90]);
        assert_eq!(Duration::new(1, 500).to_compact(), vec![1, 500]);

        assert_eq!(Duration::from_compact(&[]), Duration::default());
        assert_eq!(Duration::from_compact(&[90]), Duration::new(90, 0));
        assert_eq!(Duration::from_compact(&[1, 500]), Duration::new(1, 500));
    }

    #[test]
    fn test_zero_formats_as_ns() {
        assert_eq!(Duration::default().to_string(), "0ns");
    }
}
