//! Target Operating Systems
//!
//! Values of the `os` setting, spelled the way package recipes spell them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RecipeError;

/// Operating system a package is built for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TargetOs {
    Windows,
    WindowsStore,
    Linux,
    Macos,
    #[serde(rename = "iOS")]
    Ios,
    #[serde(rename = "watchOS")]
    WatchOs,
    #[serde(rename = "tvOS")]
    TvOs,
    Android,
    #[serde(rename = "FreeBSD")]
    FreeBsd,
    #[serde(rename = "SunOS")]
    SunOs,
    Emscripten,
}

impl TargetOs {
    /// Every known value
    pub const ALL: [TargetOs; 11] = [
        Self::Windows,
        Self::WindowsStore,
        Self::Linux,
        Self::Macos,
        Self::Ios,
        Self::WatchOs,
        Self::TvOs,
        Self::Android,
        Self::FreeBsd,
        Self::SunOs,
        Self::Emscripten,
    ];

    /// Recipe spelling
    pub fn name(&self) -> &'static str {
        match self {
            Self::Windows => "Windows",
            Self::WindowsStore => "WindowsStore",
            Self::Linux => "Linux",
            Self::Macos => "Macos",
            Self::Ios => "iOS",
            Self::WatchOs => "watchOS",
            Self::TvOs => "tvOS",
            Self::Android => "Android",
            Self::FreeBsd => "FreeBSD",
            Self::SunOs => "SunOS",
            Self::Emscripten => "Emscripten",
        }
    }

    /// The OS this binary was compiled for, if it has a recipe spelling
    pub fn host() -> Option<Self> {
        if cfg!(target_os = "windows") {
            Some(Self::Windows)
        } else if cfg!(target_os = "android") {
            Some(Self::Android)
        } else if cfg!(target_os = "linux") {
            Some(Self::Linux)
        } else if cfg!(target_os = "macos") {
            Some(Self::Macos)
        } else if cfg!(target_os = "ios") {
            Some(Self::Ios)
        } else if cfg!(target_os = "watchos") {
            Some(Self::WatchOs)
        } else if cfg!(target_os = "tvos") {
            Some(Self::TvOs)
        } else if cfg!(target_os = "freebsd") {
            Some(Self::FreeBsd)
        } else if cfg!(target_os = "solaris") {
            Some(Self::SunOs)
        } else if cfg!(target_os = "emscripten") {
            Some(Self::Emscripten)
        } else {
            None
        }
    }
}

impl fmt::Display for TargetOs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TargetOs {
    type Err = RecipeError;

    /// Case-insensitive match on the recipe spelling
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|os| os.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| RecipeError::UnknownOs(s.to_string()))
    }
}
