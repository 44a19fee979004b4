use std::fmt;

use crate::error::{DriverError, DriverResult};

/// A validated table reference.
///
/// Construction checks that the name is a plain identifier (ASCII
/// alphanumerics and underscores). Values decoded off the wire bypass the
/// check; the codec re-validates on encode.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Table(String);

impl Table {
    pub fn new(name: impl Into<String>) -> DriverResult<Self> {
        let name = name.into();
        if !is_valid_ident(&name) {
            return Err(DriverError::Validation(format!(
                "Invalid table name: '{}'",
                name
            )));
        }
        Ok(Table(name))
    }

    /// Wrap a name without validation; used when decoding wire data, which
    /// is accepted permissively.
    pub(crate) fn new_unchecked(name: String) -> Self {
        Table(name)
    }

    /// The unescaped table name.
    pub fn name(&self) -> &str {
        &self.0
    }

    /// Whether the name would pass validation. Checked by the codec before
    /// the value is written to the wire.
    pub fn is_valid(&self) -> bool {
        is_valid_ident(&self.0)
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A plain identifier: non-empty, ASCII alphanumerics and underscores only.
pub(crate) fn is_valid_ident(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Escape an identifier for display inside a record reference: plain
/// identifiers pass through, anything else is wrapped in `⟨⟩` brackets with
/// embedded closing brackets backslash-escaped.
pub(crate) fn escape_ident(s: &str) -> String {
    if is_valid_ident(s) {
        s.to_string()
    } else {
        format!("⟨{}⟩", s.replace('⟩', "\\⟩"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_names() {
        assert_eq!(Table::new("users").unwrap().name(), "users");
        assert_eq!(Table::new("order_2024").unwrap().name(), "order_2024");
    }

    #[test]
    fn test_invalid_names_rejected() {
        assert!(matches!(
            Table::new(""),
            Err(DriverError::Validation(_))
        ));
        assert!(Table::new("my table").is_err());
        assert!(Table::new("users;drop").is_err());
    }

    #[test]
    fn test_unchecked_bypasses_validation() {
        let t = Table::new_unchecked("my table".to_string());
        assert_eq!(t.name(), "my table");
        assert!(!t.is_valid());
    }

    #[test]
    fn test_escape_ident() {
        assert_eq!(escape_ident("plain_1"), "plain_1");
        assert_eq!(escape_ident("has space"), "⟨has space⟩");
        assert_eq!(escape_ident("a⟩b"), "⟨a\\⟩b⟩");
    }
}
