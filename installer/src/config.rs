//! Sync configuration loaded from TOML.
//!
//! The configuration file is the single source of truth for what gets
//! vendored: where files land, which artefacts exist, and how each one is
//! resolved per platform. It is parsed into a raw serde shape first, then
//! validated into an immutable [`SyncConfig`] before any network traffic.
//!
//! Relative paths in the file are resolved against the directory that holds
//! it, so a run behaves the same from any working directory.

use crate::artefact::matcher::validate_template;
use crate::artefact::release::GITHUB_API_BASE;
use crate::artefact::spec::{ArtefactSpec, AssetName, PlatformSpec, ReleaseRule, VersionInput};
use crate::error::{Result, SyncError};
use crate::platform::PlatformKey;
use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

/// Name of the configuration file looked up when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "vendor.toml";

/// File name of the manifest when the configuration names none.
pub const DEFAULT_MANIFEST_NAME: &str = "version.txt";

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_RETRY_DELAY_SECS: u64 = 2;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    vendor_dir: Utf8PathBuf,
    #[serde(default)]
    manifest: Option<Utf8PathBuf>,
    #[serde(default)]
    api_base: Option<String>,
    #[serde(default = "default_timeout_secs")]
    timeout_secs: u64,
    #[serde(default = "default_release_attempts")]
    release_attempts: u32,
    #[serde(default = "default_retry_delay_secs")]
    retry_delay_secs: u64,
    #[serde(default)]
    scratch_dir: Option<Utf8PathBuf>,
    #[serde(default)]
    platforms: BTreeMap<String, RawPlatformDefaults>,
    #[serde(default, rename = "artefact")]
    artefacts: Vec<RawArtefact>,
}

const fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

const fn default_release_attempts() -> u32 {
    1
}

const fn default_retry_delay_secs() -> u64 {
    DEFAULT_RETRY_DELAY_SECS
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawPlatformDefaults {
    #[serde(default)]
    tag: Option<String>,
    #[serde(default)]
    dir: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawArtefact {
    name: String,
    repository: String,
    asset_name: AssetName,
    release: ReleaseRule,
    #[serde(default)]
    platforms: BTreeMap<String, PlatformSpec>,
}

/// Release tag and vendor subdirectory for one platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformDefaults {
    /// Tag embedded in asset names, e.g. `win32-x64`.
    pub tag: String,
    /// Directory under the vendor root that receives this platform's files.
    pub dir: String,
}

impl PlatformDefaults {
    fn for_key(key: PlatformKey) -> Self {
        Self {
            tag: key.default_release_tag().to_owned(),
            dir: key.as_str().to_owned(),
        }
    }
}

/// Validated, immutable sync configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Root of the vendor tree.
    pub vendor_dir: Utf8PathBuf,
    /// Path of the version manifest.
    pub manifest: Utf8PathBuf,
    /// Base URL of the release API.
    pub api_base: String,
    /// Per-request network timeout.
    pub timeout: Duration,
    /// Total attempts for a retryable release lookup failure.
    pub release_attempts: u32,
    /// Pause between release lookup attempts.
    pub retry_delay: Duration,
    /// Parent directory for scratch directories; the system temp dir when
    /// unset.
    pub scratch_dir: Option<Utf8PathBuf>,
    /// Defaults for every platform.
    pub platforms: BTreeMap<PlatformKey, PlatformDefaults>,
    /// Artefacts in declared order.
    pub artefacts: Vec<ArtefactSpec>,
}

impl SyncConfig {
    /// Read and validate the configuration file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::ConfigRead`] if the file cannot be read,
    /// [`SyncError::ConfigParse`] if it does not match the schema, and
    /// [`SyncError::InvalidConfig`] if a validation rule is broken.
    pub fn load(path: &Utf8Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| SyncError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        let base_dir = path
            .parent()
            .filter(|dir| !dir.as_str().is_empty())
            .unwrap_or_else(|| Utf8Path::new("."));
        Self::from_toml_str(&text, base_dir).map_err(|err| match err {
            SyncError::ConfigParse { reason, .. } => SyncError::ConfigParse {
                path: path.to_path_buf(),
                reason,
            },
            other => other,
        })
    }

    /// Parse and validate configuration text, resolving relative paths
    /// against `base_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::ConfigParse`] or [`SyncError::InvalidConfig`].
    ///
    /// # Examples
    ///
    /// ```
    /// use camino::Utf8Path;
    /// use night_vendor::config::SyncConfig;
    ///
    /// let config = SyncConfig::from_toml_str(
    ///     r#"
    ///     vendor_dir = "vendor"
    ///
    ///     [[artefact]]
    ///     name = "sdl3-core"
    ///     repository = "libsdl-org/SDL"
    ///     asset_name = { fixed = "SDL3" }
    ///     release = { kind = "latest-stable" }
    ///
    ///     [artefact.platforms.windows]
    ///     file_name = "SDL3.dll"
    ///     "#,
    ///     Utf8Path::new("/work"),
    /// )
    /// .unwrap();
    /// assert_eq!(config.vendor_dir, "/work/vendor");
    /// assert_eq!(config.manifest, "/work/vendor/version.txt");
    /// ```
    pub fn from_toml_str(text: &str, base_dir: &Utf8Path) -> Result<Self> {
        let raw: RawConfig = toml::from_str(text).map_err(|e| SyncError::ConfigParse {
            path: Utf8PathBuf::from("<inline>"),
            reason: e.message().to_owned(),
        })?;
        validate(raw, base_dir)
    }

    /// Return the defaults for `platform`.
    #[must_use]
    pub fn platform(&self, platform: PlatformKey) -> PlatformDefaults {
        self.platforms
            .get(&platform)
            .cloned()
            .unwrap_or_else(|| PlatformDefaults::for_key(platform))
    }

    /// Return the release tag used in asset names for `spec` on `platform`.
    #[must_use]
    pub fn release_tag(&self, platform: PlatformKey, spec: &PlatformSpec) -> String {
        spec.release_tag
            .clone()
            .unwrap_or_else(|| self.platform(platform).tag)
    }

    /// Return the directory that receives `platform`'s files.
    #[must_use]
    pub fn platform_dir(&self, platform: PlatformKey) -> Utf8PathBuf {
        self.vendor_dir.join(self.platform(platform).dir)
    }

    /// Return the destination path for `spec` on `platform`.
    #[must_use]
    pub fn destination(&self, platform: PlatformKey, spec: &PlatformSpec) -> Utf8PathBuf {
        self.platform_dir(platform).join(spec.install_name())
    }

    /// Move the vendor tree to `dir`.
    ///
    /// A manifest at its default location moves with the tree; one named
    /// explicitly stays where it is.
    pub fn set_vendor_dir(&mut self, dir: Utf8PathBuf) {
        if self.manifest == self.vendor_dir.join(DEFAULT_MANIFEST_NAME) {
            self.manifest = dir.join(DEFAULT_MANIFEST_NAME);
        }
        self.vendor_dir = dir;
    }

    /// Restrict the run to the named artefacts and platforms.
    ///
    /// Empty filters keep everything. Artefacts left with no platforms are
    /// dropped.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::UnknownArtefact`] if `only` names an artefact
    /// that is not configured.
    pub fn retain(&mut self, only: &[String], platforms: &[PlatformKey]) -> Result<()> {
        if let Some(missing) = only
            .iter()
            .find(|name| !self.artefacts.iter().any(|a| &a.name == *name))
        {
            return Err(SyncError::UnknownArtefact {
                name: missing.clone(),
                known: self
                    .artefacts
                    .iter()
                    .map(|a| a.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            });
        }

        if !only.is_empty() {
            self.artefacts.retain(|a| only.contains(&a.name));
        }
        if !platforms.is_empty() {
            for artefact in &mut self.artefacts {
                artefact.platforms.retain(|key, _| platforms.contains(key));
            }
            self.artefacts.retain(|a| !a.platforms.is_empty());
        }
        Ok(())
    }
}

fn invalid(reason: impl Into<String>) -> SyncError {
    SyncError::InvalidConfig {
        reason: reason.into(),
    }
}

fn resolve(base_dir: &Utf8Path, path: &Utf8Path) -> Utf8PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

fn validate(raw: RawConfig, base_dir: &Utf8Path) -> Result<SyncConfig> {
    if raw.release_attempts == 0 {
        return Err(invalid("release_attempts must be at least 1"));
    }

    let mut platforms: BTreeMap<PlatformKey, PlatformDefaults> = PlatformKey::ALL
        .into_iter()
        .map(|key| (key, PlatformDefaults::for_key(key)))
        .collect();
    for (name, overrides) in raw.platforms {
        let key = parse_platform(&name, "[platforms]")?;
        let defaults = platforms
            .entry(key)
            .or_insert_with(|| PlatformDefaults::for_key(key));
        if let Some(tag) = overrides.tag {
            defaults.tag = tag;
        }
        if let Some(dir) = overrides.dir {
            check_file_name(&dir, &format!("[platforms.{name}] dir"))?;
            defaults.dir = dir;
        }
    }

    let mut seen = BTreeSet::new();
    let artefacts = raw
        .artefacts
        .into_iter()
        .map(|artefact| {
            if !seen.insert(artefact.name.clone()) {
                return Err(invalid(format!("artefact {} is declared twice", artefact.name)));
            }
            validate_artefact(artefact, base_dir)
        })
        .collect::<Result<Vec<_>>>()?;

    let vendor_dir = resolve(base_dir, &raw.vendor_dir);
    let manifest = raw.manifest.map_or_else(
        || vendor_dir.join(DEFAULT_MANIFEST_NAME),
        |path| resolve(base_dir, &path),
    );

    Ok(SyncConfig {
        manifest,
        api_base: raw
            .api_base
            .unwrap_or_else(|| GITHUB_API_BASE.to_owned()),
        timeout: Duration::from_secs(raw.timeout_secs),
        release_attempts: raw.release_attempts,
        retry_delay: Duration::from_secs(raw.retry_delay_secs),
        scratch_dir: raw.scratch_dir.map(|dir| resolve(base_dir, &dir)),
        platforms,
        artefacts,
        vendor_dir,
    })
}

fn parse_platform(name: &str, context: &str) -> Result<PlatformKey> {
    name.parse()
        .map_err(|e: crate::platform::UnknownPlatform| invalid(format!("{context}: {e}")))
}

fn check_artefact_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(invalid(format!(
            "artefact name {name:?} may only contain letters, digits, '-', '_' and '.'"
        )))
    }
}

fn check_file_name(name: &str, context: &str) -> Result<()> {
    let valid = !name.is_empty()
        && !name.contains(['/', '\\'])
        && name != "."
        && name != "..";
    if valid {
        Ok(())
    } else {
        Err(invalid(format!("{context}: {name:?} must be a plain file name")))
    }
}

fn validate_artefact(raw: RawArtefact, base_dir: &Utf8Path) -> Result<ArtefactSpec> {
    let name = raw.name;
    check_artefact_name(&name)?;

    let repo_ok = raw
        .repository
        .split_once('/')
        .is_some_and(|(owner, repo)| !owner.is_empty() && !repo.is_empty() && !repo.contains('/'));
    if !repo_ok {
        return Err(invalid(format!(
            "artefact {name}: repository {:?} must be in owner/name form",
            raw.repository
        )));
    }

    let release = match raw.release {
        ReleaseRule::ExactTag { prefix, version } => ReleaseRule::ExactTag {
            prefix,
            version: match version {
                VersionInput::Fixed(v) if v.trim().is_empty() => {
                    return Err(invalid(format!("artefact {name}: exact-tag version is empty")));
                }
                VersionInput::BuildMetadata { file, key } => VersionInput::BuildMetadata {
                    file: resolve(base_dir, &file),
                    key,
                },
                fixed @ VersionInput::Fixed(_) => fixed,
            },
        },
        other => other,
    };

    if raw.platforms.is_empty() {
        return Err(invalid(format!("artefact {name} has no platforms")));
    }
    let mut platforms = BTreeMap::new();
    for (key_name, spec) in raw.platforms {
        let context = format!("artefact {name} platform {key_name}");
        let key = parse_platform(&key_name, &context)?;
        check_file_name(&spec.file_name, &format!("{context} file_name"))?;
        check_file_name(spec.install_name(), &format!("{context} install_name"))?;
        if spec.asset_patterns.is_empty() {
            return Err(invalid(format!("{context}: asset_patterns is empty")));
        }
        for template in &spec.asset_patterns {
            validate_template(template).map_err(|e| invalid(format!("{context}: {e}")))?;
        }
        if raw.asset_name.for_platform(key).is_none() {
            return Err(invalid(format!("{context}: no asset_name entry for {key}")));
        }
        platforms.insert(key, spec);
    }

    Ok(ArtefactSpec {
        name,
        repository: raw.repository,
        asset_name: raw.asset_name,
        release,
        platforms,
    })
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
