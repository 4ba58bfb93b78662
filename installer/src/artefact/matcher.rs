//! Asset name matching.
//!
//! Asset patterns are regular expression templates. Before compiling, the
//! placeholders `{name}`, `{version}` and `{tag}` are replaced with the
//! escaped literal values for the unit being resolved, and the result is
//! anchored so that it must match the whole asset name.

use super::error::{Result, UnitError};
use super::release::ReleaseInfo;
use regex::Regex;

/// Literal values substituted into an asset pattern template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatternValues<'a> {
    /// The artefact's asset name for this platform, e.g. `SDL3_mixer`.
    pub name: &'a str,
    /// The release version, e.g. `3.1.0`.
    pub version: &'a str,
    /// The platform's release tag, e.g. `win32-x64`.
    pub tag: &'a str,
}

/// A compiled asset pattern.
#[derive(Debug, Clone)]
pub struct AssetPattern {
    source: String,
    regex: Regex,
}

impl AssetPattern {
    /// Expand `template` with `values` and compile it.
    ///
    /// # Errors
    ///
    /// Returns [`UnitError::InvalidPattern`] if the expanded text is not a
    /// valid regular expression.
    ///
    /// # Examples
    ///
    /// ```
    /// use night_vendor::artefact::matcher::{AssetPattern, PatternValues};
    ///
    /// let values = PatternValues { name: "SDL3", version: "3.2.0", tag: "win32-x64" };
    /// let pattern = AssetPattern::expand(r"{name}-{version}-{tag}\.zip", values).unwrap();
    /// assert!(pattern.is_match("SDL3-3.2.0-win32-x64.zip"));
    /// assert!(!pattern.is_match("SDL3-3.2.0-win32-x64.zip.sha256"));
    /// ```
    pub fn expand(template: &str, values: PatternValues<'_>) -> Result<Self> {
        let source = expand_template(template, values);
        let regex = Regex::new(&format!("^(?:{source})$")).map_err(|e| {
            UnitError::InvalidPattern {
                pattern: source.clone(),
                reason: e.to_string(),
            }
        })?;
        Ok(Self { source, regex })
    }

    /// Return true when `asset_name` matches the whole pattern.
    #[must_use]
    pub fn is_match(&self, asset_name: &str) -> bool {
        self.regex.is_match(asset_name)
    }

    /// Return the expanded pattern text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

/// Replace the placeholders in `template` with escaped literals.
#[must_use]
pub fn expand_template(template: &str, values: PatternValues<'_>) -> String {
    template
        .replace("{name}", &regex::escape(values.name))
        .replace("{version}", &regex::escape(values.version))
        .replace("{tag}", &regex::escape(values.tag))
}

/// Check that `template` compiles for representative placeholder values.
///
/// Used when loading configuration so malformed patterns are reported before
/// any network traffic.
///
/// # Errors
///
/// Returns [`UnitError::InvalidPattern`] when the template does not compile.
pub fn validate_template(template: &str) -> Result<()> {
    let sample = PatternValues {
        name: "name",
        version: "1.0.0",
        tag: "tag",
    };
    AssetPattern::expand(template, sample).map(|_| ())
}

/// The asset chosen for one (artefact, platform) unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAsset {
    /// Tag of the release the asset belongs to.
    pub tag: String,
    /// Asset file name.
    pub name: String,
    /// Download URL.
    pub url: String,
}

/// Find the asset selected by `patterns` in `release`.
///
/// Patterns are tried in priority order; for each pattern the release's
/// assets are scanned in listed order, and the first full match wins.
#[must_use]
pub fn match_asset(release: &ReleaseInfo, patterns: &[AssetPattern]) -> Option<ResolvedAsset> {
    patterns.iter().find_map(|pattern| {
        release
            .assets
            .iter()
            .find(|asset| pattern.is_match(&asset.name))
            .map(|asset| ResolvedAsset {
                tag: release.tag.clone(),
                name: asset.name.clone(),
                url: asset.url.clone(),
            })
    })
}

/// Like [`match_asset`], but reports a miss as [`UnitError::NoMatchingAsset`].
///
/// # Errors
///
/// Returns [`UnitError::NoMatchingAsset`] naming every pattern tried.
pub fn resolve_asset(release: &ReleaseInfo, patterns: &[AssetPattern]) -> Result<ResolvedAsset> {
    match_asset(release, patterns).ok_or_else(|| UnitError::NoMatchingAsset {
        tag: release.tag.clone(),
        patterns: patterns
            .iter()
            .map(AssetPattern::as_str)
            .collect::<Vec<_>>()
            .join(", "),
    })
}
