//! Version pins read from upstream build metadata.
//!
//! Exact-tag artefacts take their version from the file that pins the
//! binding package's native dependency, so the vendored binaries always
//! match what the bindings were built against. Two shapes are understood,
//! chosen by file extension:
//!
//! - TOML files with a `[versions]` table keyed by dependency;
//! - MSBuild project files, where the `<Version>` inside the
//!   `<PropertyGroup Label="NuGet">` group is used.
//!
//! Only the first three dotted components are significant, so a package
//! version of `3.2.0.1` pins release `3.2.0`.

use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;

/// Errors raised while reading a version pin.
#[derive(Debug, thiserror::Error)]
pub enum BuildMetadataError {
    /// The file could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        /// File that could not be read.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The file could not be parsed.
    #[error("failed to parse {path}: {reason}")]
    Parse {
        /// File that could not be parsed.
        path: Utf8PathBuf,
        /// Parser message.
        reason: String,
    },

    /// The file holds no version for the requested dependency.
    #[error("no version for {key} in {path}")]
    MissingVersion {
        /// File that was searched.
        path: Utf8PathBuf,
        /// What was looked for.
        key: String,
    },

    /// The version has fewer than three dotted components.
    #[error("version {version:?} in {path} is not in X.Y.Z form")]
    Malformed {
        /// File holding the version.
        path: Utf8PathBuf,
        /// The rejected version text.
        version: String,
    },
}

/// Read the version pinned in `path`.
///
/// `key` selects the dependency in TOML files and is ignored for MSBuild
/// project files, which pin a single package.
///
/// # Errors
///
/// Returns [`BuildMetadataError`] if the file cannot be read or parsed, has
/// no version for the dependency, or the version is too short.
pub fn read_version(path: &Utf8Path, key: Option<&str>) -> Result<String, BuildMetadataError> {
    let text = std::fs::read_to_string(path).map_err(|source| BuildMetadataError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let full = match path.extension().map(str::to_ascii_lowercase).as_deref() {
        Some("toml") => toml_version(path, &text, key)?,
        _ => msbuild_version(path, &text)?,
    };

    significant_version(&full).ok_or_else(|| BuildMetadataError::Malformed {
        path: path.to_path_buf(),
        version: full,
    })
}

fn toml_version(
    path: &Utf8Path,
    text: &str,
    key: Option<&str>,
) -> Result<String, BuildMetadataError> {
    let table = toml::from_str::<toml::Table>(text).map_err(|e| BuildMetadataError::Parse {
        path: path.to_path_buf(),
        reason: e.message().to_owned(),
    })?;
    let missing = || BuildMetadataError::MissingVersion {
        path: path.to_path_buf(),
        key: key.map_or_else(|| "[versions]".to_owned(), |k| format!("versions.{k}")),
    };
    let key = key.ok_or_else(missing)?;

    table
        .get("versions")
        .and_then(toml::Value::as_table)
        .and_then(|versions| versions.get(key))
        .and_then(toml::Value::as_str)
        .map(|v| v.trim().to_owned())
        .ok_or_else(missing)
}

fn msbuild_version(path: &Utf8Path, text: &str) -> Result<String, BuildMetadataError> {
    let compile = |pattern: &str| {
        Regex::new(pattern).map_err(|e| BuildMetadataError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    };
    let group = compile(
        r#"(?s)<PropertyGroup\b[^>]*\bLabel\s*=\s*["']NuGet["'][^>]*>(.*?)</PropertyGroup>"#,
    )?;
    let version = compile(r"(?s)<Version>\s*([^<]*?)\s*</Version>")?;

    group
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .find_map(|body| version.captures(body.as_str()))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_owned())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| BuildMetadataError::MissingVersion {
            path: path.to_path_buf(),
            key: "<Version> in the NuGet property group".to_owned(),
        })
}

/// Keep the first three dotted components of `full`.
///
/// # Examples
///
/// ```
/// use night_vendor::build_metadata::significant_version;
///
/// assert_eq!(significant_version("3.2.0.1").as_deref(), Some("3.2.0"));
/// assert_eq!(significant_version("3.2"), None);
/// ```
#[must_use]
pub fn significant_version(full: &str) -> Option<String> {
    let parts: Vec<&str> = full.split('.').take(3).collect();
    if parts.len() < 3 || parts.iter().any(|part| part.is_empty()) {
        return None;
    }
    Some(parts.join("."))
}
