//! Archive extraction for downloaded release assets.
//!
//! Unpacks zip, `.tar.gz` and `.tar.zst` assets into a private scratch
//! directory with path traversal protection to prevent zip-slip attacks.
//! Disk images and installers cannot be unpacked portably; their bytes are
//! saved next to the vendored files for a manual step instead.

use super::error::{Result, UnitError};
use super::spec::ArchiveKind;
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use std::io::{self, Cursor, Read};
use std::path::{Component, Path};
use tempfile::TempDir;

/// Trait for unpacking archive bytes, enabling test mocking.
#[cfg_attr(test, mockall::automock)]
pub trait ArchiveExtractor {
    /// Unpack `bytes`, encoded as `format`, into `dest_dir`.
    ///
    /// Returns the relative paths of the extracted files and symbolic links
    /// in archive order. Directories are created but not listed.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractionError::PathTraversal`] if any entry attempts to
    /// escape the destination directory, [`ExtractionError::EmptyArchive`] if
    /// no files are found, and [`ExtractionError::Corrupt`] or
    /// [`ExtractionError::Io`] when the bytes cannot be decoded or written.
    fn unpack(
        &self,
        format: ArchiveKind,
        bytes: &[u8],
        dest_dir: &Utf8Path,
    ) -> std::result::Result<Vec<Utf8PathBuf>, ExtractionError>;
}

/// Errors arising from archive extraction.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    /// I/O error during extraction.
    #[error("extraction I/O error: {0}")]
    Io(#[from] io::Error),

    /// The archive container could not be decoded.
    #[error("corrupt archive: {0}")]
    Corrupt(String),

    /// A path in the archive attempts to traverse outside the destination.
    #[error("path traversal detected: {path}")]
    PathTraversal {
        /// The offending path from the archive entry.
        path: String,
    },

    /// The archive contains no files.
    #[error("archive contains no files")]
    EmptyArchive,

    /// The format has no programmatic extractor.
    #[error("{0:?} assets cannot be unpacked")]
    Unsupported(ArchiveKind),
}

impl From<zip::result::ZipError> for ExtractionError {
    fn from(err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::Io(io) => Self::Io(io),
            other => Self::Corrupt(other.to_string()),
        }
    }
}

/// Choose the format for an asset from its file name.
///
/// Suffixes are matched case-insensitively; names with no recognised suffix
/// fall back to the `declared` kind.
///
/// # Examples
///
/// ```
/// use night_vendor::artefact::extraction::detect_format;
/// use night_vendor::artefact::spec::ArchiveKind;
///
/// assert_eq!(detect_format("SDL3-3.2.0.tar.gz", ArchiveKind::Zip), ArchiveKind::TarGz);
/// assert_eq!(detect_format("SDL3-3.2.0.DMG", ArchiveKind::Zip), ArchiveKind::DiskImage);
/// assert_eq!(detect_format("SDL3-3.2.0", ArchiveKind::TarZst), ArchiveKind::TarZst);
/// ```
#[must_use]
pub fn detect_format(asset_name: &str, declared: ArchiveKind) -> ArchiveKind {
    let lower = asset_name.to_ascii_lowercase();
    let has = |suffixes: &[&str]| suffixes.iter().any(|suffix| lower.ends_with(suffix));
    if has(&[".zip"]) {
        ArchiveKind::Zip
    } else if has(&[".tar.gz", ".tgz"]) {
        ArchiveKind::TarGz
    } else if has(&[".tar.zst", ".tzst"]) {
        ArchiveKind::TarZst
    } else if has(&[".dmg", ".pkg"]) {
        ArchiveKind::DiskImage
    } else {
        declared
    }
}

/// Default extractor using the `zip`, `tar`, `flate2` and `zstd` crates.
///
/// Validates each entry path before extraction to guard against path
/// traversal attacks (zip-slip).
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeExtractor;

impl ArchiveExtractor for NativeExtractor {
    fn unpack(
        &self,
        format: ArchiveKind,
        bytes: &[u8],
        dest_dir: &Utf8Path,
    ) -> std::result::Result<Vec<Utf8PathBuf>, ExtractionError> {
        let members = match format {
            ArchiveKind::Zip => unpack_zip(bytes, dest_dir)?,
            ArchiveKind::TarGz => unpack_tar(flate2::read::GzDecoder::new(bytes), dest_dir)?,
            ArchiveKind::TarZst => unpack_tar(zstd::Decoder::new(bytes)?, dest_dir)?,
            ArchiveKind::DiskImage => return Err(ExtractionError::Unsupported(format)),
        };

        if members.is_empty() {
            return Err(ExtractionError::EmptyArchive);
        }
        Ok(members)
    }
}

fn unpack_zip(
    bytes: &[u8],
    dest_dir: &Utf8Path,
) -> std::result::Result<Vec<Utf8PathBuf>, ExtractionError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
    let mut members = Vec::new();

    for index in 0..archive.len() {
        let mut file = archive.by_index(index)?;
        let entry_path = Utf8PathBuf::from(file.name());
        validate_entry_path(entry_path.as_std_path())?;

        let dest_path = dest_dir.join(&entry_path);
        if file.is_dir() {
            fs::create_dir_all(&dest_path)?;
            continue;
        }
        if let Some(parent) = dest_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = fs::File::create(&dest_path)?;
        io::copy(&mut file, &mut out)?;
        members.push(entry_path);
    }

    Ok(members)
}

fn unpack_tar<R: Read>(
    reader: R,
    dest_dir: &Utf8Path,
) -> std::result::Result<Vec<Utf8PathBuf>, ExtractionError> {
    let mut archive = tar::Archive::new(reader);
    let mut members = Vec::new();

    for entry_result in archive.entries()? {
        let mut entry = entry_result?;
        let entry_path = Utf8PathBuf::from_path_buf(entry.path()?.into_owned()).map_err(|p| {
            ExtractionError::Corrupt(format!("non-UTF-8 entry name {}", p.display()))
        })?;
        validate_entry_path(entry_path.as_std_path())?;

        let entry_type = entry.header().entry_type();
        let dest_path = dest_dir.join(&entry_path);
        if entry_type.is_dir() {
            fs::create_dir_all(&dest_path)?;
            continue;
        }
        if entry_type.is_symlink() {
            // Sibling links such as libfoo.so.0 -> libfoo.so.0.2.4 are kept.
            match entry.link_name()? {
                Some(target) if validate_entry_path(&target).is_ok() => {}
                _ => {
                    log::warn!("skipping symbolic link {entry_path} with unsafe target");
                    continue;
                }
            }
        } else if !entry_type.is_file() {
            log::debug!("skipping special entry {entry_path}");
            continue;
        }

        if let Some(parent) = dest_path.parent() {
            fs::create_dir_all(parent)?;
        }
        entry.unpack(&dest_path)?;
        members.push(entry_path);
    }

    Ok(members)
}

/// Validate that an entry path does not escape the destination directory
/// via `..` components or absolute paths.
fn validate_entry_path(path: &Path) -> std::result::Result<(), ExtractionError> {
    let escapes = path.is_absolute()
        || path
            .components()
            .any(|component| matches!(component, Component::ParentDir | Component::Prefix(_)));
    if escapes {
        return Err(ExtractionError::PathTraversal {
            path: path.display().to_string(),
        });
    }
    Ok(())
}

/// The unpacked contents of one asset.
///
/// The scratch directory is removed when this value is dropped, whether or
/// not the unit succeeded.
#[derive(Debug)]
pub struct Extraction {
    root: Utf8PathBuf,
    members: Vec<Utf8PathBuf>,
    _scratch: TempDir,
}

impl Extraction {
    /// Return the scratch directory the asset was unpacked into.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Return the relative paths of unpacked files in archive order.
    #[must_use]
    pub fn members(&self) -> &[Utf8PathBuf] {
        &self.members
    }
}

/// Result of handling a downloaded asset.
#[derive(Debug)]
pub enum ExtractionOutcome {
    /// The asset was unpacked into a scratch directory.
    Extracted(Extraction),
    /// The asset cannot be unpacked here; its bytes were saved to
    /// `saved_to` for the user to process by hand.
    ManualStepRequired {
        /// Where the raw asset was written.
        saved_to: Utf8PathBuf,
    },
}

/// Where extraction writes its output.
#[derive(Debug, Clone, Copy)]
pub struct ExtractionDirs<'a> {
    /// Parent for scratch directories; the system temp dir when `None`.
    pub scratch_parent: Option<&'a Utf8Path>,
    /// Directory that receives assets needing a manual step.
    pub manual_dir: &'a Utf8Path,
}

/// Unpack a downloaded asset, or save it for a manual step.
///
/// # Errors
///
/// Returns [`UnitError::Scratch`] if the scratch directory cannot be
/// created, [`UnitError::InvalidArchive`] if the bytes cannot be unpacked,
/// and [`UnitError::InstallError`] if a disk image cannot be saved.
pub fn extract_asset(
    extractor: &dyn ArchiveExtractor,
    asset_name: &str,
    declared: ArchiveKind,
    bytes: &[u8],
    dirs: ExtractionDirs<'_>,
) -> Result<ExtractionOutcome> {
    let format = detect_format(asset_name, declared);
    if format == ArchiveKind::DiskImage {
        let saved_to = save_for_manual_step(asset_name, bytes, dirs.manual_dir)?;
        log::warn!("{asset_name} needs a manual step; saved to {saved_to}");
        return Ok(ExtractionOutcome::ManualStepRequired { saved_to });
    }

    let scratch = create_scratch(dirs.scratch_parent)?;
    let root = Utf8PathBuf::from_path_buf(scratch.path().to_path_buf()).map_err(|p| {
        UnitError::Scratch {
            source: io::Error::new(
                io::ErrorKind::InvalidData,
                format!("scratch path {} is not UTF-8", p.display()),
            ),
        }
    })?;

    log::debug!("unpacking {asset_name} as {format:?} into {root}");
    let members = extractor
        .unpack(format, bytes, &root)
        .map_err(|e| UnitError::InvalidArchive {
            asset: asset_name.to_owned(),
            reason: e.to_string(),
        })?;
    log::debug!("unpacked {} entries from {asset_name}", members.len());

    Ok(ExtractionOutcome::Extracted(Extraction {
        root,
        members,
        _scratch: scratch,
    }))
}

fn create_scratch(parent: Option<&Utf8Path>) -> Result<TempDir> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("night-vendor-");
    let created = match parent {
        Some(dir) => fs::create_dir_all(dir).and_then(|()| builder.tempdir_in(dir)),
        None => builder.tempdir(),
    };
    created.map_err(|source| UnitError::Scratch { source })
}

fn save_for_manual_step(asset_name: &str, bytes: &[u8], dir: &Utf8Path) -> Result<Utf8PathBuf> {
    let destination = dir.join(asset_name);
    fs::create_dir_all(dir)
        .and_then(|()| fs::write(&destination, bytes))
        .map_err(|source| UnitError::InstallError {
            destination: destination.clone(),
            source,
        })?;
    Ok(destination)
}
