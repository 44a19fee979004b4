use std::fmt;

/// A reference to a file stored in a remote bucket.
///
/// The textual form (`bucket:key` with spaces backslash-escaped) is for
/// display only; the wire form is the structured pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct File {
    bucket: String,
    key: String,
}

impl File {
    /// Build a file reference. Keys are normalized to start with `/`.
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        let key = key.into();
        let key = if key.starts_with('/') {
            key
        } else {
            format!("/{}", key)
        };
        File {
            bucket: bucket.into(),
            key,
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

fn escape_spaces(s: &str, out: &mut fmt::Formatter<'_>) -> fmt::Result {
    use fmt::Write;
    for c in s.chars() {
        if c == ' ' {
            out.write_char('\\')?;
        }
        out.write_char(c)?;
    }
    Ok(())
}

impl fmt::Display for File {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        escape_spaces(&self.bucket, f)?;
        f.write_str(":")?;
        escape_spaces(&self.key, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_escapes_spaces() {
        let file = File::new("hello world", "/foo bar/test.json");
        assert_eq!(file.to_string(), "hello\\ world:/foo\\ bar/test.json");
    }

    #[test]
    fn test_key_normalized_to_leading_slash() {
        let file = File::new("assets", "logo.png");
        assert_eq!(file.key(), "/logo.png");
        assert_eq!(file.to_string(), "assets:/logo.png");
    }

    #[test]
    fn test_plain_display() {
        let file = File::new("bucket", "/a/b.txt");
        assert_eq!(file.to_string(), "bucket:/a/b.txt");
    }
}
