//! Revision identifiers, directions and symbolic targets.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Literal value of the "no revision applied yet" sentinel.
pub const INITIAL_REVISION: &str = "initial";

/// Literal value of the "newest known revision" target.
pub const HEAD: &str = "HEAD";

/// An opaque revision identifier.
///
/// Identifiers carry no ordering of their own; the edge collection they come
/// from decides what "newest" means.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Revision(String);

impl Revision {
    /// Create a revision from any string-like identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The reserved initial sentinel.
    #[must_use]
    pub fn initial() -> Self {
        Self(INITIAL_REVISION.to_string())
    }

    /// Map a persisted marker to a revision, `None` meaning nothing was applied yet.
    #[must_use]
    pub fn from_stored(stored: Option<String>) -> Self {
        stored.map_or_else(Self::initial, Self)
    }

    /// Whether this is the initial sentinel.
    #[must_use]
    pub fn is_initial(&self) -> bool {
        self.0 == INITIAL_REVISION
    }

    /// Borrow the identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Revision {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for Revision {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl AsRef<str> for Revision {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Migration direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Towards newer revisions.
    Up,
    /// Towards older revisions, down to the initial sentinel.
    Down,
}

impl Direction {
    /// Verb used in operator-facing messages.
    #[must_use]
    pub fn verb(self) -> &'static str {
        match self {
            Self::Up => "upgrade",
            Self::Down => "downgrade",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Up => write!(f, "up"),
            Self::Down => write!(f, "down"),
        }
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "up" => Ok(Self::Up),
            "down" => Ok(Self::Down),
            other => Err(format!("invalid direction '{other}', expected 'up' or 'down'")),
        }
    }
}

/// A requested target revision, possibly symbolic.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Target {
    /// The newest known revision.
    Head,
    /// The initial sentinel, i.e. everything downgraded.
    Initial,
    /// A concrete revision.
    Revision(Revision),
}

impl Target {
    /// Parse a user-supplied target, recognising the `HEAD` and `initial` symbols.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            HEAD => Self::Head,
            INITIAL_REVISION => Self::Initial,
            other => Self::Revision(Revision::new(other)),
        }
    }
}

impl From<Option<&str>> for Target {
    fn from(value: Option<&str>) -> Self {
        value.map_or(Self::Initial, Self::parse)
    }
}

impl From<Revision> for Target {
    fn from(revision: Revision) -> Self {
        if revision.is_initial() {
            Self::Initial
        } else {
            Self::Revision(revision)
        }
    }
}

impl FromStr for Target {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Head => f.write_str(HEAD),
            Self::Initial => f.write_str(INITIAL_REVISION),
            Self::Revision(rev) => rev.fmt(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_sentinel() {
        assert!(Revision::initial().is_initial());
        assert!(!Revision::new("2022_04_10_mig1").is_initial());
        assert_eq!(Revision::from_stored(None), Revision::initial());
        assert_eq!(Revision::from_stored(Some("rev2".into())).as_str(), "rev2");
    }

    #[test]
    fn test_target_parse() {
        assert_eq!(Target::parse("HEAD"), Target::Head);
        assert_eq!(Target::parse("initial"), Target::Initial);
        assert_eq!(Target::parse("rev1"), Target::Revision("rev1".into()));
        assert_eq!(Target::from(None), Target::Initial);
        assert_eq!(Target::from(Revision::initial()), Target::Initial);
    }

    #[test]
    fn test_direction_parse_and_display() {
        assert_eq!("up".parse::<Direction>(), Ok(Direction::Up));
        assert_eq!("DOWN".parse::<Direction>(), Ok(Direction::Down));
        assert!("sideways".parse::<Direction>().is_err());
        assert_eq!(Direction::Up.to_string(), "up");
        assert_eq!(Direction::Down.verb(), "downgrade");
    }
}
