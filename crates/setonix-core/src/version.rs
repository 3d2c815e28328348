use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionParseError {
    #[error("version number is empty")]
    Empty,
    #[error("version number must have 2 to 4 segments, found {count}")]
    SegmentCount { count: usize },
    #[error("version segment '{segment}' is not a number")]
    InvalidSegment { segment: String },
    #[error("version segment '{segment}' is out of range (0-65535)")]
    OutOfRange { segment: String },
}

/// A `MAJOR.MINOR[.REVISION[.BUILD]]` version number.
///
/// An absent revision or build is not zero: it stands for "any", so it
/// ranks above every concrete value in the same position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Version {
    major: u16,
    minor: u16,
    revision: Option<u16>,
    build: Option<u16>,
}

impl Version {
    #[must_use]
    pub const fn new(major: u16, minor: u16) -> Self {
        Self {
            major,
            minor,
            revision: None,
            build: None,
        }
    }

    #[must_use]
    pub const fn with_revision(major: u16, minor: u16, revision: u16) -> Self {
        Self {
            major,
            minor,
            revision: Some(revision),
            build: None,
        }
    }

    #[must_use]
    pub const fn with_build(major: u16, minor: u16, revision: u16, build: u16) -> Self {
        Self {
            major,
            minor,
            revision: Some(revision),
            build: Some(build),
        }
    }

    #[must_use]
    pub const fn major(&self) -> u16 {
        self.major
    }

    #[must_use]
    pub const fn minor(&self) -> u16 {
        self.minor
    }

    #[must_use]
    pub const fn revision(&self) -> Option<u16> {
        self.revision
    }

    #[must_use]
    pub const fn build(&self) -> Option<u16> {
        self.build
    }

    /// Parse a dotted version number with 2 to 4 decimal segments.
    ///
    /// # Errors
    /// Returns an error for an empty string, a segment count outside 2..=4,
    /// empty or non-numeric segments, and segments above 65535.
    pub fn parse(text: &str) -> Result<Self, VersionParseError> {
        if text.is_empty() {
            return Err(VersionParseError::Empty);
        }

        let segments: Vec<&str> = text.split('.').collect();
        if !(2..=4).contains(&segments.len()) {
            return Err(VersionParseError::SegmentCount {
                count: segments.len(),
            });
        }

        let mut values = segments.iter().map(|segment| parse_segment(segment));
        let major = values.next().transpose()?.unwrap_or_default();
        let minor = values.next().transpose()?.unwrap_or_default();
        let revision = values.next().transpose()?;
        let build = values.next().transpose()?;

        Ok(Self {
            major,
            minor,
            revision,
            build,
        })
    }

    /// Strictly newer than `other`. Segments are compared left to right and
    /// the first difference decides; an absent revision/build beats a
    /// present one.
    #[must_use]
    pub fn is_newer_than(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Greater
    }

    /// Render at most `segments` dotted segments (clamped to 2..=4). Output
    /// stops at the first absent segment.
    #[must_use]
    pub fn format_segments(&self, segments: usize) -> String {
        let segments = segments.clamp(2, 4);
        let mut result = format!("{}.{}", self.major, self.minor);
        let optional = [self.revision, self.build];
        for value in optional.iter().take(segments - 2) {
            match value {
                Some(value) => {
                    result.push('.');
                    result.push_str(&value.to_string());
                }
                None => break,
            }
        }
        result
    }
}

fn parse_segment(segment: &str) -> Result<u16, VersionParseError> {
    if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
        return Err(VersionParseError::InvalidSegment {
            segment: segment.to_string(),
        });
    }
    segment
        .parse::<u16>()
        .map_err(|_| VersionParseError::OutOfRange {
            segment: segment.to_string(),
        })
}

fn cmp_open_ended(left: Option<u16>, right: Option<u16>) -> Ordering {
    match (left, right) {
        (Some(left), Some(right)) => left.cmp(&right),
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (None, None) => Ordering::Equal,
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.major
            .cmp(&other.major)
            .then(self.minor.cmp(&other.minor))
            .then_with(|| cmp_open_ended(self.revision, other.revision))
            .then_with(|| cmp_open_ended(self.build, other.build))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl FromStr for Version {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format_segments(4))
    }
}
