//! Declarative description of a vendored artefact.
//!
//! An [`ArtefactSpec`] says where an artefact is published, which release
//! to pick, how its assets are named on each platform, and where inside the
//! archive the wanted file is likely to live. Specs are loaded once from the
//! configuration file and never mutated.

use crate::platform::PlatformKey;
use camino::Utf8PathBuf;
use serde::Deserialize;
use std::collections::BTreeMap;

/// Asset pattern used when a platform section lists none.
pub const DEFAULT_ASSET_PATTERN: &str = r"{name}-{version}-{tag}\.zip";

/// The base name embedded in release asset file names.
///
/// Most artefacts use the same name on every platform; a few upstream
/// projects publish under a different name on one platform.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AssetName {
    /// One name for every platform.
    Fixed(String),
    /// An explicit name per platform identifier.
    PerPlatform(BTreeMap<String, String>),
}

impl AssetName {
    /// Resolve the name for `platform`.
    ///
    /// Returns `None` when a per-platform map has no entry for it.
    ///
    /// # Examples
    ///
    /// ```
    /// use night_vendor::artefact::spec::AssetName;
    /// use night_vendor::platform::PlatformKey;
    ///
    /// let fixed = AssetName::Fixed("SDL3".to_owned());
    /// assert_eq!(fixed.for_platform(PlatformKey::Linux), Some("SDL3"));
    /// ```
    #[must_use]
    pub fn for_platform(&self, platform: PlatformKey) -> Option<&str> {
        match self {
            Self::Fixed(name) => Some(name),
            Self::PerPlatform(names) => names.get(platform.as_str()).map(String::as_str),
        }
    }
}

/// Where the version for an exact release tag comes from.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VersionInput {
    /// A version written directly in the configuration.
    Fixed(String),
    /// A version read from the upstream build-metadata file.
    BuildMetadata {
        /// Path to the metadata file.
        file: Utf8PathBuf,
        /// Dependency key to look up; MSBuild project files ignore it.
        #[serde(default)]
        key: Option<String>,
    },
}

/// How the release for an artefact is chosen.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ReleaseRule {
    /// The newest non-prerelease whose tag contains none of `reject`.
    LatestStable {
        /// Tag substrings that disqualify a release.
        #[serde(default = "default_reject")]
        reject: Vec<String>,
    },
    /// The newest non-prerelease whose tag starts with `prefix`.
    LatestWithPrefix {
        /// Required tag prefix.
        prefix: String,
    },
    /// The release tagged exactly `prefix` followed by the version.
    ExactTag {
        /// Tag prefix, for example `sdl3-core-release-`.
        prefix: String,
        /// Source of the version appended to the prefix.
        version: VersionInput,
    },
}

fn default_reject() -> Vec<String> {
    vec!["rc".to_owned()]
}

/// The container format an asset is expected to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArchiveKind {
    /// A zip archive.
    Zip,
    /// A gzip-compressed tarball.
    TarGz,
    /// A zstd-compressed tarball.
    TarZst,
    /// A disk image or installer that cannot be unpacked programmatically.
    DiskImage,
}

/// Per-platform resolution rules for one artefact.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlatformSpec {
    /// Asset name patterns in priority order.
    ///
    /// Each entry is a regular expression template in which `{name}`,
    /// `{version}` and `{tag}` are replaced with escaped literal values.
    #[serde(default = "default_asset_patterns")]
    pub asset_patterns: Vec<String>,
    /// Base name of the wanted file inside the archive.
    pub file_name: String,
    /// Candidate paths inside the archive, most specific first.
    #[serde(default)]
    pub archive_paths: Vec<String>,
    /// File name to install under; defaults to `file_name`.
    #[serde(default)]
    pub install_name: Option<String>,
    /// Declared archive kind, used when the asset suffix is unrecognised.
    #[serde(default = "default_archive_kind")]
    pub archive_kind: ArchiveKind,
    /// Release tag override for this artefact on this platform.
    #[serde(default)]
    pub release_tag: Option<String>,
}

fn default_asset_patterns() -> Vec<String> {
    vec![DEFAULT_ASSET_PATTERN.to_owned()]
}

const fn default_archive_kind() -> ArchiveKind {
    ArchiveKind::Zip
}

impl PlatformSpec {
    /// Return the file name the artefact is installed under.
    #[must_use]
    pub fn install_name(&self) -> &str {
        self.install_name.as_deref().unwrap_or(&self.file_name)
    }
}

/// A vendored artefact and its per-platform rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtefactSpec {
    /// Logical name, also the manifest key (for example `sdl3-core`).
    pub name: String,
    /// GitHub repository in `owner/name` form.
    pub repository: String,
    /// Base name used in asset file names.
    pub asset_name: AssetName,
    /// Release selection rule.
    pub release: ReleaseRule,
    /// Resolution rules keyed by platform, iterated in platform order.
    pub platforms: BTreeMap<PlatformKey, PlatformSpec>,
}
