//! Versions and Version Ranges
//!
//! `major.minor.patch` versions and bracketed ranges such as `[>=1.0.0]`
//! or `[>=1.0 <2]`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::RecipeError;

/// Package version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl Version {
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for Version {
    type Err = RecipeError;

    /// Missing minor/patch components default to 0
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || RecipeError::InvalidVersion(s.to_string());
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(invalid());
        }

        let mut parts = [0_u64; 3];
        let mut count = 0;
        for part in trimmed.split('.') {
            if count == parts.len() {
                return Err(invalid());
            }
            parts[count] = part.parse().map_err(|_| invalid())?;
            count += 1;
        }

        Ok(Self::new(parts[0], parts[1], parts[2]))
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// Comparison operator of a range constraint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Eq,
    Gt,
    Ge,
    Lt,
    Le,
}

impl Op {
    fn symbol(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Lt => "<",
            Self::Le => "<=",
        }
    }

    fn accepts(&self, candidate: &Version, bound: &Version) -> bool {
        match self {
            Self::Eq => candidate == bound,
            Self::Gt => candidate > bound,
            Self::Ge => candidate >= bound,
            Self::Lt => candidate < bound,
            Self::Le => candidate <= bound,
        }
    }
}

/// Single constraint, e.g. `>=1.0.0`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Constraint {
    pub op: Op,
    pub version: Version,
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.op.symbol(), self.version)
    }
}

/// Conjunction of constraints
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionRange {
    constraints: Vec<Constraint>,
}

impl VersionRange {
    /// `>=version`
    pub fn at_least(version: Version) -> Self {
        Self {
            constraints: vec![Constraint {
                op: Op::Ge,
                version,
            }],
        }
    }

    /// Constraints of the range
    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    /// Whether `version` satisfies every constraint
    pub fn matches(&self, version: &Version) -> bool {
        self.constraints
            .iter()
            .all(|c| c.op.accepts(version, &c.version))
    }

    /// Lowest version the range has an inclusive lower bound at
    pub fn minimum(&self) -> Option<Version> {
        self.constraints
            .iter()
            .filter(|c| matches!(c.op, Op::Ge | Op::Eq))
            .map(|c| c.version)
            .max()
    }

    /// Highest of `candidates` that the range accepts
    pub fn best_match<'a, I>(&self, candidates: I) -> Option<Version>
    where
        I: IntoIterator<Item = &'a Version>,
    {
        candidates
            .into_iter()
            .filter(|v| self.matches(v))
            .max()
            .copied()
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, constraint) in self.constraints.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{constraint}")?;
        }
        f.write_str("]")
    }
}

impl FromStr for VersionRange {
    type Err = RecipeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || RecipeError::InvalidRange(s.to_string());
        let inner = s
            .trim()
            .strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(']'))
            .ok_or_else(invalid)?;

        let constraints = inner
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|token| !token.is_empty())
            .map(|token| {
                let (op, rest) = if let Some(rest) = token.strip_prefix(">=") {
                    (Op::Ge, rest)
                } else if let Some(rest) = token.strip_prefix("<=") {
                    (Op::Le, rest)
                } else if let Some(rest) = token.strip_prefix('>') {
                    (Op::Gt, rest)
                } else if let Some(rest) = token.strip_prefix('<') {
                    (Op::Lt, rest)
                } else if let Some(rest) = token.strip_prefix('=') {
                    (Op::Eq, rest)
                } else {
                    (Op::Eq, token)
                };
                let version = rest.parse().map_err(|_| invalid())?;
                Ok(Constraint { op, version })
            })
            .collect::<Result<Vec<_>, RecipeError>>()?;

        if constraints.is_empty() {
            return Err(invalid());
        }
        Ok(Self { constraints })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(text: &str) -> Version {
        text.parse().unwrap()
    }

    #[test]
    fn test_parse_version() {
        assert_eq!(v("1.0.1"), Version::new(1, 0, 1));
        assert_eq!(v("2"), Version::new(2, 0, 0));
        assert_eq!(v("3.4"), Version::new(3, 4, 0));
        assert!("".parse::<Version>().is_err());
        assert!("1.2.3.4".parse::<Version>().is_err());
        assert!("1.x".parse::<Version>().is_err());
    }

    #[test]
    fn test_version_ordering() {
        assert!(v("1.10.0") > v("1.9.9"));
        assert!(v("2.0.0") > v("1.99.99"));
    }

    #[test]
    fn test_at_least_range() {
        let range: VersionRange = "[>=1.0.0]".parse().unwrap();
        assert_eq!(range, VersionRange::at_least(Version::new(1, 0, 0)));
        assert!(range.matches(&v("1.0.0")));
        assert!(range.matches(&v("7.2.1")));
        assert!(!range.matches(&v("0.9.9")));
        assert_eq!(range.to_string(), "[>=1.0.0]");
    }

    #[test]
    fn test_compound_range() {
        let range: VersionRange = "[>=1.0 <2]".parse().unwrap();
        assert!(range.matches(&v("1.5.0")));
        assert!(!range.matches(&v("2.0.0")));
        assert_eq!(range.minimum(), Some(v("1.0.0")));

        let candidates = [v("0.9.0"), v("1.2.0"), v("1.9.3"), v("2.1.0")];
        assert_eq!(range.best_match(&candidates), Some(v("1.9.3")));
    }

    #[test]
    fn test_invalid_ranges() {
        assert!(">=1.0.0".parse::<VersionRange>().is_err());
        assert!("[]".parse::<VersionRange>().is_err());
        assert!("[>=abc]".parse::<VersionRange>().is_err());
    }

    #[test]
    fn test_version_serde() {
        let json = serde_json::to_string(&v("1.0.1")).unwrap();
        assert_eq!(json, "\"1.0.1\"");
        let back: Version = serde_json::from_str(&json).unwrap();
        assert_eq!(back, v("1.0.1"));
    }
}
