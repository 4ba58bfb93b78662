//! Platform keys and their release asset tags.
//!
//! A platform key names a directory in the vendor tree and selects the
//! per-platform section of an artefact's configuration. Each key also has a
//! release asset tag (for example `win32-x64`) that upstream projects embed
//! in their asset file names. The default tags can be overridden globally in
//! the configuration file and again per artefact.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A supported vendor platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformKey {
    /// 64-bit Windows.
    Windows,
    /// macOS (universal or single-architecture builds).
    Macos,
    /// 64-bit Linux.
    Linux,
}

impl PlatformKey {
    /// All platforms in their canonical processing order.
    pub const ALL: [Self; 3] = [Self::Windows, Self::Macos, Self::Linux];

    /// Return the lowercase identifier used in configuration and paths.
    ///
    /// # Examples
    ///
    /// ```
    /// use night_vendor::platform::PlatformKey;
    ///
    /// assert_eq!(PlatformKey::Macos.as_str(), "macos");
    /// ```
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Windows => "windows",
            Self::Macos => "macos",
            Self::Linux => "linux",
        }
    }

    /// Return the release asset tag upstream uses for this platform when no
    /// override is configured.
    #[must_use]
    pub const fn default_release_tag(self) -> &'static str {
        match self {
            Self::Windows => "win32-x64",
            Self::Macos => "macos-universal",
            Self::Linux => "linux-x86_64",
        }
    }
}

impl fmt::Display for PlatformKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string names no known platform.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown platform \"{value}\"; expected one of: windows, macos, linux")]
pub struct UnknownPlatform {
    /// The rejected input.
    pub value: String,
}

impl FromStr for PlatformKey {
    type Err = UnknownPlatform;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|platform| platform.as_str().eq_ignore_ascii_case(value))
            .ok_or_else(|| UnknownPlatform {
                value: value.to_owned(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("windows", PlatformKey::Windows)]
    #[case("MacOS", PlatformKey::Macos)]
    #[case("linux", PlatformKey::Linux)]
    fn parses_known_platforms(#[case] input: &str, #[case] expected: PlatformKey) {
        assert_eq!(input.parse::<PlatformKey>(), Ok(expected));
    }

    #[test]
    fn rejects_unknown_platform() {
        let err = "android".parse::<PlatformKey>().expect_err("should reject");
        assert_eq!(err.value, "android");
        assert!(err.to_string().contains("windows, macos, linux"));
    }

    #[test]
    fn default_tags_match_upstream_naming() {
        assert_eq!(PlatformKey::Windows.default_release_tag(), "win32-x64");
        assert_eq!(PlatformKey::Macos.default_release_tag(), "macos-universal");
        assert_eq!(PlatformKey::Linux.default_release_tag(), "linux-x86_64");
    }

    #[test]
    fn display_matches_identifier() {
        for platform in PlatformKey::ALL {
            assert_eq!(platform.to_string(), platform.as_str());
        }
    }
}
