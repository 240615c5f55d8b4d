use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::error::{Error, Result};

pub const DEFAULT_PREFIX: &str = "NACC";
const DIGITS: usize = 6;

static DEFAULT_PATTERN: Lazy<IdentifierPattern> = Lazy::new(|| {
    IdentifierPattern::new(DEFAULT_PREFIX).expect("default prefix is four letters")
});

/// A subject code such as `NACC012345`.
///
/// Only produced by [`IdentifierPattern::find`], so every value is well-formed.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Identifier(String);

impl Identifier {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Matches `<prefix><6 digits>` where the digit run is not followed by another digit.
#[derive(Clone, Debug)]
pub struct IdentifierPattern {
    prefix: String,
    regex: Regex,
}

impl IdentifierPattern {
    pub fn new(prefix: &str) -> Result<Self> {
        if prefix.len() != 4 || !prefix.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(Error::InvalidPrefix {
                prefix: prefix.to_string(),
            });
        }

        let regex = Regex::new(&format!(
            r"({}[0-9]{{{DIGITS}}})(?:[^0-9]|$)",
            regex::escape(prefix)
        ))
        .map_err(|_| Error::InvalidPrefix {
            prefix: prefix.to_string(),
        })?;

        Ok(Self {
            prefix: prefix.to_string(),
            regex,
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// First identifier in `haystack`, if any.
    pub fn find(&self, haystack: &str) -> Option<Identifier> {
        self.regex
            .captures(haystack)
            .and_then(|caps| caps.get(1))
            .map(|m| Identifier(m.as_str().to_string()))
    }
}

impl Default for IdentifierPattern {
    fn default() -> Self {
        DEFAULT_PATTERN.clone()
    }
}

/// Find a `NACC` identifier in a file name or path segment.
pub fn extract_identifier(haystack: &str) -> Option<Identifier> {
    DEFAULT_PATTERN.find(haystack)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_identifier_in_archive_name() {
        let id = extract_identifier("NACC012345.zip").unwrap();
        assert_eq!(id.as_str(), "NACC012345");
    }

    #[test]
    fn finds_identifier_inside_path() {
        let id = extract_identifier("export/MRI_NACC000001_T1/scan1.dcm").unwrap();
        assert_eq!(id.as_str(), "NACC000001");
    }

    #[test]
    fn returns_first_of_several() {
        let id = extract_identifier("NACC111111_vs_NACC222222.dcm").unwrap();
        assert_eq!(id.as_str(), "NACC111111");
    }

    #[test]
    fn rejects_short_digit_run() {
        assert!(extract_identifier("NACC12345.zip").is_none());
    }

    #[test]
    fn rejects_long_digit_run() {
        assert!(extract_identifier("NACC1234567.zip").is_none());
    }

    #[test]
    fn skips_long_run_and_finds_later_match() {
        let id = extract_identifier("NACC1234567-NACC765432").unwrap();
        assert_eq!(id.as_str(), "NACC765432");
    }

    #[test]
    fn identifier_at_end_of_string() {
        let id = extract_identifier("subject-NACC000042").unwrap();
        assert_eq!(id.as_str(), "NACC000042");
    }

    #[test]
    fn absent_identifier() {
        assert!(extract_identifier("scan1.dcm").is_none());
        assert!(extract_identifier("").is_none());
    }

    #[test]
    fn prefix_is_case_sensitive() {
        assert!(extract_identifier("nacc012345.zip").is_none());
    }

    #[test]
    fn custom_prefix() {
        let pattern = IdentifierPattern::new("ADNI").unwrap();
        assert_eq!(pattern.prefix(), "ADNI");
        assert_eq!(pattern.find("ADNI004321.zip").unwrap().as_str(), "ADNI004321");
        assert!(pattern.find("NACC004321.zip").is_none());
    }

    #[test]
    fn invalid_prefix_rejected() {
        assert!(matches!(
            IdentifierPattern::new("NAC"),
            Err(Error::InvalidPrefix { .. })
        ));
        assert!(matches!(
            IdentifierPattern::new("NA.C"),
            Err(Error::InvalidPrefix { .. })
        ));
    }
}
