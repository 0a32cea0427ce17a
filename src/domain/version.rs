use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use thiserror::Error;

use super::prerelease::{BuildMetadata, PreRelease};

/// Failure to read a string as a SemVer 2.0.0 version
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("malformed version '{input}': {reason}")]
    Malformed { input: String, reason: String },
}

impl ParseError {
    pub(crate) fn malformed(input: &str, reason: impl Into<String>) -> Self {
        ParseError::Malformed {
            input: input.to_string(),
            reason: reason.into(),
        }
    }

    /// The text that failed to parse
    pub fn input(&self) -> &str {
        match self {
            ParseError::Malformed { input, .. } => input,
        }
    }

    pub fn reason(&self) -> &str {
        match self {
            ParseError::Malformed { reason, .. } => reason,
        }
    }

    fn with_input(self, full: &str) -> Self {
        match self {
            ParseError::Malformed { reason, .. } => ParseError::malformed(full, reason),
        }
    }
}

/// Semantic version as defined by SemVer 2.0.0
///
/// Immutable once parsed. Equality, ordering and hashing follow version
/// precedence, so build metadata is ignored by all three.
#[derive(Debug, Clone)]
pub struct SemanticVersion {
    major: u64,
    minor: u64,
    patch: u64,
    pre_release: Option<PreRelease>,
    build: Option<BuildMetadata>,
}

impl SemanticVersion {
    /// Parse a version string (e.g. "2.3.1-rc.1+build.5").
    ///
    /// # Returns
    /// * `Ok(SemanticVersion)` - Parsed version
    /// * `Err(ParseError::Malformed)` - If the string breaks the SemVer grammar
    ///
    /// # Example
    /// ```
    /// use asm_info::domain::SemanticVersion;
    ///
    /// let v = SemanticVersion::parse("2.3.1-rc.1+build.5").unwrap();
    /// assert_eq!(v.to_short_string(), "2.3.1");
    /// assert_eq!(v.release(), "rc.1");
    /// assert!(SemanticVersion::parse("1.02.3").is_err());
    /// ```
    pub fn parse(input: &str) -> Result<Self, ParseError> {
        let (rest, build) = match input.split_once('+') {
            Some((rest, build)) => (rest, Some(build)),
            None => (input, None),
        };
        let (core, pre_release) = match rest.split_once('-') {
            Some((core, pre)) => (core, Some(pre)),
            None => (rest, None),
        };

        let parts: Vec<&str> = core.split('.').collect();
        if parts.len() != 3 {
            return Err(ParseError::malformed(
                input,
                "expected MAJOR.MINOR.PATCH",
            ));
        }

        let major = numeric_component(input, "major", parts[0])?;
        let minor = numeric_component(input, "minor", parts[1])?;
        let patch = numeric_component(input, "patch", parts[2])?;

        let pre_release = pre_release
            .map(PreRelease::parse)
            .transpose()
            .map_err(|e| e.with_input(input))?;
        let build = build
            .map(BuildMetadata::parse)
            .transpose()
            .map_err(|e| e.with_input(input))?;

        Ok(SemanticVersion {
            major,
            minor,
            patch,
            pre_release,
            build,
        })
    }

    /// Parse an optional string, yielding `None` when it is absent or malformed.
    pub fn try_parse(input: Option<&str>) -> Option<Self> {
        input.and_then(|s| SemanticVersion::parse(s).ok())
    }

    pub fn major(&self) -> u64 {
        self.major
    }

    pub fn minor(&self) -> u64 {
        self.minor
    }

    pub fn patch(&self) -> u64 {
        self.patch
    }

    pub fn pre_release(&self) -> Option<&PreRelease> {
        self.pre_release.as_ref()
    }

    /// Pre-release text, or an empty string for a release version
    pub fn release(&self) -> String {
        self.pre_release
            .as_ref()
            .map(|pr| pr.to_string())
            .unwrap_or_default()
    }

    pub fn build(&self) -> Option<&BuildMetadata> {
        self.build.as_ref()
    }

    pub fn is_prerelease(&self) -> bool {
        self.pre_release.is_some()
    }

    /// "major.minor.patch[-prerelease][+build]"
    pub fn to_full_string(&self) -> String {
        self.to_string()
    }

    /// "major.minor.patch" without pre-release or build metadata
    pub fn to_short_string(&self) -> String {
        format!("{}.{}.{}", self.major, self.minor, self.patch)
    }
}

fn numeric_component(input: &str, name: &str, part: &str) -> Result<u64, ParseError> {
    if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ParseError::malformed(
            input,
            format!("invalid {} version: '{}'", name, part),
        ));
    }
    if part.len() > 1 && part.starts_with('0') {
        return Err(ParseError::malformed(
            input,
            format!("{} version '{}' has a leading zero", name, part),
        ));
    }
    part.parse::<u64>().map_err(|_| {
        ParseError::malformed(input, format!("{} version '{}' is too large", name, part))
    })
}

impl FromStr for SemanticVersion {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SemanticVersion::parse(s)
    }
}

impl fmt::Display for SemanticVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(pre) = &self.pre_release {
            write!(f, "-{}", pre)?;
        }
        if let Some(build) = &self.build {
            write!(f, "+{}", build)?;
        }
        Ok(())
    }
}

impl Ord for SemanticVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.major
            .cmp(&other.major)
            .then(self.minor.cmp(&other.minor))
            .then(self.patch.cmp(&other.patch))
            .then_with(|| match (&self.pre_release, &other.pre_release) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
                (Some(a), Some(b)) => a.cmp(b),
            })
    }
}

impl PartialOrd for SemanticVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for SemanticVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SemanticVersion {}

impl Hash for SemanticVersion {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.major.hash(state);
        self.minor.hash(state);
        self.patch.hash(state);
        self.pre_release.hash(state);
    }
}
