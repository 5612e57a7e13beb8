//! Package References
//!
//! `Name/[range]@user/channel` requirement strings.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::RecipeError;
use crate::version::{Version, VersionRange};

/// Requirement on another package
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Reference {
    pub name: String,
    pub range: VersionRange,
    pub user: String,
    pub channel: String,
}

impl Reference {
    /// Requirement on at least `minimum` of `name` from `user/channel`
    pub fn at_least(name: &str, minimum: Version, user: &str, channel: &str) -> Self {
        Self {
            name: name.to_string(),
            range: VersionRange::at_least(minimum),
            user: user.to_string(),
            channel: channel.to_string(),
        }
    }

    /// Whether `version` of this package would satisfy the requirement
    pub fn accepts(&self, version: &Version) -> bool {
        self.range.matches(version)
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}/{}", self.name, self.range, self.user, self.channel)
    }
}

impl FromStr for Reference {
    type Err = RecipeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || RecipeError::InvalidReference(s.to_string());

        let (package, namespace) = s.trim().split_once('@').ok_or_else(invalid)?;
        let (name, range) = package.split_once('/').ok_or_else(invalid)?;
        let (user, channel) = namespace.split_once('/').ok_or_else(invalid)?;

        let valid_ident = |text: &str| {
            !text.is_empty()
                && text
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '+'))
        };
        if !valid_ident(name) || !valid_ident(user) || !valid_ident(channel) {
            return Err(invalid());
        }

        // A bare version pins exactly.
        let range: VersionRange = if range.starts_with('[') {
            range.parse()?
        } else {
            format!("[={range}]").parse().map_err(|_| invalid())?
        };

        Ok(Self {
            name: name.to_string(),
            range,
            user: user.to_string(),
            channel: channel.to_string(),
        })
    }
}

impl Serialize for Reference {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Reference {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_recipe_requirement() {
        let reference: Reference = "Functionoid/[>=1.0.0]@microblink/master".parse().unwrap();
        assert_eq!(reference.name, "Functionoid");
        assert_eq!(reference.user, "microblink");
        assert_eq!(reference.channel, "master");
        assert!(reference.accepts(&Version::new(1, 2, 0)));
        assert!(!reference.accepts(&Version::new(0, 9, 0)));
        assert_eq!(
            reference.to_string(),
            "Functionoid/[>=1.0.0]@microblink/master"
        );
    }

    #[test]
    fn test_pinned_version() {
        let reference: Reference = "ConfigEx/1.2.0@microblink/stable".parse().unwrap();
        assert!(reference.accepts(&Version::new(1, 2, 0)));
        assert!(!reference.accepts(&Version::new(1, 2, 1)));
    }

    #[test]
    fn test_invalid_references() {
        for text in [
            "Functionoid",
            "Functionoid/[>=1.0.0]",
            "Functionoid/[>=1.0.0]@microblink",
            "/[>=1.0.0]@microblink/master",
            "Func tionoid/[>=1.0.0]@microblink/master",
            "Functionoid/[>=one]@microblink/master",
        ] {
            assert!(text.parse::<Reference>().is_err(), "{text} should not parse");
        }
    }
}
