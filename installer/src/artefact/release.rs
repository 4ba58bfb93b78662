//! Release lookup against the GitHub releases API.
//!
//! Provides a trait-based abstraction for finding one release of a
//! repository, enabling dependency injection for testing. The production
//! implementation queries the public REST API without authentication.

use super::download::{get, map_ureq_error};
use super::error::{Result, UnitError};
use serde::Deserialize;
use std::fmt;

/// Default base URL of the GitHub REST API.
pub const GITHUB_API_BASE: &str = "https://api.github.com";

/// Page size requested when listing releases.
const RELEASES_PER_PAGE: u32 = 100;

/// A downloadable file attached to a release.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReleaseAsset {
    /// The asset file name.
    pub name: String,
    /// The direct download URL.
    #[serde(rename = "browser_download_url")]
    pub url: String,
}

/// Metadata for one release, as reported by the API.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReleaseInfo {
    /// The release tag, for example `release-3.2.0`.
    #[serde(rename = "tag_name")]
    pub tag: String,
    /// Whether the release is flagged as a prerelease.
    #[serde(default)]
    pub prerelease: bool,
    /// Assets in the order the API lists them.
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

/// Which release of a repository to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseSelector {
    /// The first non-prerelease whose tag contains none of `reject`.
    LatestStable {
        /// Tag substrings that disqualify a release.
        reject: Vec<String>,
    },
    /// The first non-prerelease whose tag starts with `prefix`.
    LatestWithPrefix {
        /// Required tag prefix.
        prefix: String,
    },
    /// The release tagged exactly `prefix` + `version`.
    ExactTag {
        /// Tag prefix.
        prefix: String,
        /// Version appended to the prefix.
        version: String,
    },
}

impl ReleaseSelector {
    /// Pick the matching release from a list in API order.
    ///
    /// # Examples
    ///
    /// ```
    /// use night_vendor::artefact::release::{ReleaseInfo, ReleaseSelector};
    ///
    /// let releases = vec![
    ///     ReleaseInfo { tag: "release-3.3.0-rc1".to_owned(), prerelease: false, assets: vec![] },
    ///     ReleaseInfo { tag: "release-3.2.0".to_owned(), prerelease: false, assets: vec![] },
    /// ];
    /// let selector = ReleaseSelector::LatestStable { reject: vec!["rc".to_owned()] };
    /// assert_eq!(selector.select(&releases).map(|r| r.tag.as_str()), Some("release-3.2.0"));
    /// ```
    #[must_use]
    pub fn select<'a>(&self, releases: &'a [ReleaseInfo]) -> Option<&'a ReleaseInfo> {
        releases.iter().find(|release| self.accepts(release))
    }

    fn accepts(&self, release: &ReleaseInfo) -> bool {
        match self {
            Self::LatestStable { reject } => {
                !release.prerelease && !reject.iter().any(|word| release.tag.contains(word.as_str()))
            }
            Self::LatestWithPrefix { prefix } => {
                !release.prerelease && release.tag.starts_with(prefix.as_str())
            }
            Self::ExactTag { .. } => release.tag == self.exact_tag().unwrap_or_default(),
        }
    }

    /// Return the full tag for an exact selector.
    #[must_use]
    pub fn exact_tag(&self) -> Option<String> {
        match self {
            Self::ExactTag { prefix, version } => Some(format!("{prefix}{version}")),
            Self::LatestStable { .. } | Self::LatestWithPrefix { .. } => None,
        }
    }

    /// Derive the version string used in asset names from a selected tag.
    ///
    /// Exact selectors return their configured version; prefix selectors
    /// strip the prefix; the latest-stable selector drops everything before
    /// the first digit (`release-3.2.0` becomes `3.2.0`).
    ///
    /// # Examples
    ///
    /// ```
    /// use night_vendor::artefact::release::ReleaseSelector;
    ///
    /// let selector = ReleaseSelector::LatestStable { reject: vec![] };
    /// assert_eq!(selector.version_of("release-3.2.0"), "3.2.0");
    /// ```
    #[must_use]
    pub fn version_of(&self, tag: &str) -> String {
        match self {
            Self::ExactTag { version, .. } => version.clone(),
            Self::LatestWithPrefix { prefix } => {
                tag.strip_prefix(prefix.as_str()).unwrap_or(tag).to_owned()
            }
            Self::LatestStable { .. } => tag
                .trim_start_matches(|c: char| !c.is_ascii_digit())
                .to_owned(),
        }
    }
}

impl fmt::Display for ReleaseSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LatestStable { reject } if reject.is_empty() => f.write_str("latest stable"),
            Self::LatestStable { reject } => {
                write!(f, "latest stable excluding \"{}\"", reject.join("\", \""))
            }
            Self::LatestWithPrefix { prefix } => write!(f, "latest with prefix \"{prefix}\""),
            Self::ExactTag { prefix, version } => write!(f, "tag \"{prefix}{version}\""),
        }
    }
}

/// Trait for looking up releases, enabling test mocking.
#[cfg_attr(test, mockall::automock)]
pub trait ReleaseSource {
    /// Fetch the release of `repository` (in `owner/name` form) chosen by
    /// `selector`.
    ///
    /// # Errors
    ///
    /// Returns [`UnitError::Transport`] for network failures and non-success
    /// statuses, [`UnitError::InvalidResponse`] for undecodable bodies, and
    /// [`UnitError::NoMatchingRelease`] when nothing satisfies the selector.
    fn fetch(&self, repository: &str, selector: &ReleaseSelector) -> Result<ReleaseInfo>;
}

/// Release source backed by the GitHub REST API.
#[derive(Debug, Clone)]
pub struct GithubReleaseSource {
    api_base: String,
    agent: ureq::Agent,
}

impl GithubReleaseSource {
    /// Create a release source for the API at `api_base` using `agent`.
    #[must_use]
    pub fn new(api_base: &str, agent: ureq::Agent) -> Self {
        Self {
            api_base: api_base.trim_end_matches('/').to_owned(),
            agent,
        }
    }

    /// Build the URL that lists a repository's releases.
    ///
    /// # Examples
    ///
    /// ```
    /// use night_vendor::artefact::release::GithubReleaseSource;
    ///
    /// let url = GithubReleaseSource::list_url("https://api.github.com", "libsdl-org/SDL");
    /// assert_eq!(url, "https://api.github.com/repos/libsdl-org/SDL/releases?per_page=100");
    /// ```
    #[must_use]
    pub fn list_url(api_base: &str, repository: &str) -> String {
        format!("{api_base}/repos/{repository}/releases?per_page={RELEASES_PER_PAGE}")
    }

    /// Build the URL that fetches a release by tag.
    #[must_use]
    pub fn tag_url(api_base: &str, repository: &str, tag: &str) -> String {
        format!("{api_base}/repos/{repository}/releases/tags/{tag}")
    }

    fn request(&self, url: &str) -> std::result::Result<String, ureq::Error> {
        get(&self.agent, url)
            .header("Accept", "application/vnd.github+json")
            .call()?
            .into_body()
            .read_to_string()
    }
}

fn decode<T: serde::de::DeserializeOwned>(url: &str, body: &str) -> Result<T> {
    serde_json::from_str(body).map_err(|e| UnitError::InvalidResponse {
        url: url.to_owned(),
        reason: e.to_string(),
    })
}

impl ReleaseSource for GithubReleaseSource {
    fn fetch(&self, repository: &str, selector: &ReleaseSelector) -> Result<ReleaseInfo> {
        let no_match = || UnitError::NoMatchingRelease {
            repository: repository.to_owned(),
            selector: selector.to_string(),
        };

        if let Some(tag) = selector.exact_tag() {
            let url = Self::tag_url(&self.api_base, repository, &tag);
            log::debug!("fetching release {tag} from {url}");
            return match self.request(&url) {
                Ok(body) => decode(&url, &body),
                Err(ureq::Error::StatusCode(404)) => Err(no_match()),
                Err(e) => Err(map_ureq_error(&url, &e)),
            };
        }

        let url = Self::list_url(&self.api_base, repository);
        log::debug!("listing releases from {url}");
        let body = self.request(&url).map_err(|e| map_ureq_error(&url, &e))?;
        let releases: Vec<ReleaseInfo> = decode(&url, &body)?;
        let selected = selector.select(&releases).cloned().ok_or_else(no_match)?;
        log::info!("selected release {} of {repository}", selected.tag);
        Ok(selected)
    }
}

#[cfg(test)]
#[path = "release_tests.rs"]
mod tests;
