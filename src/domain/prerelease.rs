//! Pre-release and build metadata components of a semantic version
//!
//! According to semver.org: https://semver.org/#spec-item-9 and
//! https://semver.org/#spec-item-10

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use super::version::ParseError;

/// A single dot-separated pre-release identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identifier {
    /// All-digit identifier, compared numerically
    Numeric(u64),
    /// Identifier containing at least one letter or hyphen, compared in ASCII order
    AlphaNumeric(String),
}

impl Identifier {
    /// Parse one pre-release identifier.
    ///
    /// Numeric identifiers must not carry a leading zero.
    pub fn parse(s: &str) -> Result<Self, ParseError> {
        check_identifier(s)?;

        if s.bytes().all(|b| b.is_ascii_digit()) {
            if s.len() > 1 && s.starts_with('0') {
                return Err(ParseError::malformed(
                    s,
                    format!("numeric identifier '{}' has a leading zero", s),
                ));
            }
            let value = s.parse::<u64>().map_err(|_| {
                ParseError::malformed(s, format!("numeric identifier '{}' is too large", s))
            })?;
            Ok(Identifier::Numeric(value))
        } else {
            Ok(Identifier::AlphaNumeric(s.to_string()))
        }
    }
}

impl Ord for Identifier {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Identifier::Numeric(a), Identifier::Numeric(b)) => a.cmp(b),
            (Identifier::Numeric(_), Identifier::AlphaNumeric(_)) => Ordering::Less,
            (Identifier::AlphaNumeric(_), Identifier::Numeric(_)) => Ordering::Greater,
            (Identifier::AlphaNumeric(a), Identifier::AlphaNumeric(b)) => {
                a.as_bytes().cmp(b.as_bytes())
            }
        }
    }
}

impl PartialOrd for Identifier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identifier::Numeric(n) => write!(f, "{}", n),
            Identifier::AlphaNumeric(s) => write!(f, "{}", s),
        }
    }
}

/// Pre-release part of a version, e.g. "rc.1" or "alpha.beta.7"
///
/// Ordering is identifier by identifier; when one sequence is a prefix of
/// the other, the shorter one sorts lower.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PreRelease {
    identifiers: Vec<Identifier>,
}

impl PreRelease {
    /// Parse a dot-separated pre-release string
    ///
    /// # Examples
    /// ```
    /// use asm_info::domain::{Identifier, PreRelease};
    ///
    /// let pr = PreRelease::parse("rc.1").unwrap();
    /// assert_eq!(pr.identifiers()[1], Identifier::Numeric(1));
    /// assert!(PreRelease::parse("rc.01").is_err());
    /// ```
    pub fn parse(s: &str) -> Result<Self, ParseError> {
        let identifiers = s
            .split('.')
            .map(Identifier::parse)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(PreRelease { identifiers })
    }

    pub fn identifiers(&self) -> &[Identifier] {
        &self.identifiers
    }
}

impl FromStr for PreRelease {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PreRelease::parse(s)
    }
}

impl fmt::Display for PreRelease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, identifier) in self.identifiers.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{}", identifier)?;
        }
        Ok(())
    }
}

/// Build metadata, kept verbatim. Never takes part in precedence.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BuildMetadata(String);

impl BuildMetadata {
    /// Validate and wrap a dot-separated build metadata string.
    ///
    /// Numeric identifiers may carry leading zeros here.
    pub fn parse(s: &str) -> Result<Self, ParseError> {
        for identifier in s.split('.') {
            check_identifier(identifier)?;
        }
        Ok(BuildMetadata(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BuildMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifiers are non-empty runs of `[0-9A-Za-z-]`.
fn check_identifier(s: &str) -> Result<(), ParseError> {
    if s.is_empty() {
        return Err(ParseError::malformed(s, "empty identifier"));
    }
    if let Some(c) = s.chars().find(|c| !(c.is_ascii_alphanumeric() || *c == '-')) {
        return Err(ParseError::malformed(
            s,
            format!("invalid character '{}' in identifier '{}'", c, s),
        ));
    }
    Ok(())
}
