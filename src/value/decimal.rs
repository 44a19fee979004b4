use std::fmt;

/// An arbitrary-precision base-10 number.
///
/// The value is stored as its exact textual digit representation and never
/// routed through a binary float. Equality is textual: `Decimal::from("1.50")`
/// and `Decimal::from("1.5")` are distinct values.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Decimal(String);

impl Decimal {
    /// The exact digit string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Decimal {
    fn from(digits: &str) -> Self {
        Decimal(digits.to_string())
    }
}

impl From<String> for Decimal {
    fn from(digits: String) -> Self {
        Decimal(digits)
    }
}

impl From<i64> for Decimal {
    fn from(n: i64) -> Self {
        Decimal(n.to_string())
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_textual_equality() {
        // "1.50" and "1.5" denote the same number but are different values
        assert_ne!(Decimal::from("1.50"), Decimal::from("1.5"));
        assert_eq!(Decimal::from("1.5"), Decimal::from("1.5"));
    }

    #[test]
    fn test_digits_preserved_verbatim() {
        let d = Decimal::from("3.140000000000000000000000000001");
        assert_eq!(d.to_string(), "3.140000000000000000000000000001");
    }

    #[test]
    fn test_from_integer() {
        assert_eq!(Decimal::from(-42).as_str(), "-42");
    }
}
