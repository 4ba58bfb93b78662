//! Persisted record of installed artefact versions.
//!
//! The manifest maps each artefact's logical name to the release tag that
//! was last installed for it. Alongside that line, each platform's file
//! carries its own `<artefact>@<platform>` entry, so a platform that failed
//! while another succeeded is not mistaken for current. It is stored as
//! UTF-8 text with one `key=value` line per entry, sorted by key, so
//! unchanged inputs always produce a byte-identical file:
//!
//! ```text
//! sdl3-core=release-3.2.0
//! sdl3-core@linux=release-3.2.0
//! sdl3-core@windows=release-3.1.0
//! ```
//!
//! A missing manifest means nothing has been installed yet. A malformed one
//! is reset to empty and flagged, so the run can continue and rewrite it.

use crate::platform::PlatformKey;
use camino::{Utf8Path, Utf8PathBuf};
use std::collections::BTreeMap;
use std::io::Write;

/// Separates the artefact name from the platform in per-platform keys.
///
/// Artefact names cannot contain it, so the keys never collide.
const PLATFORM_SEPARATOR: char = '@';

/// Mapping from artefact name to installed version.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionManifest {
    entries: BTreeMap<String, String>,
}

/// A line in the manifest text that could not be understood.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed manifest line {line}: {content:?}")]
pub struct MalformedLine {
    /// One-based line number.
    pub line: usize,
    /// The offending text.
    pub content: String,
}

impl VersionManifest {
    /// Parse manifest text.
    ///
    /// Blank lines and lines starting with `#` are ignored. Later entries for
    /// the same key replace earlier ones.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedLine`] for a non-empty line without `=` or with an
    /// empty key.
    ///
    /// # Examples
    ///
    /// ```
    /// use night_vendor::manifest::VersionManifest;
    ///
    /// let manifest = VersionManifest::parse("sdl3-core=release-3.2.0\n").unwrap();
    /// assert_eq!(manifest.version("sdl3-core"), Some("release-3.2.0"));
    /// assert!(VersionManifest::parse("no separator").is_err());
    /// ```
    pub fn parse(text: &str) -> Result<Self, MalformedLine> {
        let mut entries = BTreeMap::new();
        for (index, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let malformed = || MalformedLine {
                line: index + 1,
                content: raw.to_owned(),
            };
            let (key, value) = line.split_once('=').ok_or_else(malformed)?;
            let key = key.trim();
            if key.is_empty() {
                return Err(malformed());
            }
            entries.insert(key.to_owned(), value.trim().to_owned());
        }
        Ok(Self { entries })
    }

    /// Render the manifest in its canonical on-disk form.
    #[must_use]
    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(|(key, value)| format!("{key}={value}\n"))
            .collect()
    }

    /// Record that `version` of artefact `key` is installed.
    pub fn record_success(&mut self, key: &str, version: &str) {
        self.entries.insert(key.to_owned(), version.to_owned());
    }

    /// Return the recorded version for `key`.
    #[must_use]
    pub fn version(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Record that `version` of artefact `key` is installed for `platform`.
    pub fn record_platform(&mut self, key: &str, platform: PlatformKey, version: &str) {
        self.entries
            .insert(platform_key(key, platform), version.to_owned());
    }

    /// Return the version installed for `platform` of artefact `key`.
    ///
    /// # Examples
    ///
    /// ```
    /// use night_vendor::manifest::VersionManifest;
    /// use night_vendor::platform::PlatformKey;
    ///
    /// let manifest = VersionManifest::parse(
    ///     "sdl3-core=release-3.2.0\nsdl3-core@linux=release-3.2.0\n",
    /// )
    /// .unwrap();
    /// assert_eq!(
    ///     manifest.platform_version("sdl3-core", PlatformKey::Linux),
    ///     Some("release-3.2.0")
    /// );
    /// assert_eq!(manifest.platform_version("sdl3-core", PlatformKey::Windows), None);
    /// ```
    #[must_use]
    pub fn platform_version(&self, key: &str, platform: PlatformKey) -> Option<&str> {
        self.entries
            .get(&platform_key(key, platform))
            .map(String::as_str)
    }

    /// Iterate over entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Return the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Return true when nothing is recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Load the manifest at `path`.
    ///
    /// Never fails: a missing file yields an empty manifest, and an
    /// unreadable or malformed file yields an empty manifest flagged as
    /// recovered.
    #[must_use]
    pub fn load(path: &Utf8Path) -> LoadedManifest {
        if !path.exists() {
            return LoadedManifest {
                manifest: Self::default(),
                recovered_from_corrupt_file: false,
            };
        }

        let parsed = std::fs::read_to_string(path)
            .map_err(|e| e.to_string())
            .and_then(|text| Self::parse(&text).map_err(|e| e.to_string()));
        match parsed {
            Ok(manifest) => LoadedManifest {
                manifest,
                recovered_from_corrupt_file: false,
            },
            Err(reason) => {
                log::warn!("ignoring unusable manifest {path}: {reason}");
                LoadedManifest {
                    manifest: Self::default(),
                    recovered_from_corrupt_file: true,
                }
            }
        }
    }

    /// Write the manifest to `path`, replacing it atomically.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError`] if the directory cannot be created or the
    /// file cannot be written or moved into place.
    pub fn save(&self, path: &Utf8Path) -> Result<(), ManifestError> {
        let parent = match path.parent() {
            Some(dir) if !dir.as_str().is_empty() => dir,
            _ => Utf8Path::new("."),
        };
        std::fs::create_dir_all(parent).map_err(|source| ManifestError::CreateDirectory {
            path: parent.to_path_buf(),
            source,
        })?;

        let write_error = |source: std::io::Error| ManifestError::Write {
            path: path.to_path_buf(),
            source,
        };
        let mut temp = tempfile::NamedTempFile::new_in(parent).map_err(write_error)?;
        temp.write_all(self.render().as_bytes())
            .and_then(|()| temp.flush())
            .map_err(write_error)?;
        temp.persist(path).map_err(|e| write_error(e.error))?;

        log::debug!("wrote {} manifest entries to {path}", self.len());
        Ok(())
    }
}

fn platform_key(key: &str, platform: PlatformKey) -> String {
    format!("{key}{PLATFORM_SEPARATOR}{platform}")
}

/// A manifest loaded from disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedManifest {
    manifest: VersionManifest,
    recovered_from_corrupt_file: bool,
}

impl LoadedManifest {
    /// Returns the loaded manifest.
    #[must_use]
    pub fn manifest(&self) -> &VersionManifest {
        &self.manifest
    }

    /// Consumes the wrapper, returning the manifest.
    #[must_use]
    pub fn into_manifest(self) -> VersionManifest {
        self.manifest
    }

    /// Returns true when a malformed manifest file was reset to empty.
    #[must_use]
    pub fn recovered_from_corrupt_file(&self) -> bool {
        self.recovered_from_corrupt_file
    }
}

/// Errors that prevent manifest persistence.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    /// Creating the manifest directory failed.
    #[error("failed to create manifest directory {path}: {source}")]
    CreateDirectory {
        /// Directory path that could not be created.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Writing the manifest file failed.
    #[error("failed to write manifest {path}: {source}")]
    Write {
        /// File path that could not be written.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}
