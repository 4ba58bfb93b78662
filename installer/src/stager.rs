//! Placement of located files into the vendor tree.
//!
//! This module copies a file out of a scratch directory to its deterministic
//! destination, creating parent directories as needed.

use crate::artefact::error::{Result, UnitError};
use camino::Utf8Path;
use std::fs;
use std::io;

/// Copies located files to their destinations.
#[derive(Debug, Clone, Copy, Default)]
pub struct Stager;

impl Stager {
    /// Copy `source` to `destination`, replacing any existing file.
    ///
    /// The copy is a plain data copy: symbolic links are followed and
    /// permission bits are not propagated. Returns the number of bytes
    /// written.
    ///
    /// # Errors
    ///
    /// Returns [`UnitError::InstallError`] naming `destination` if the
    /// directories cannot be created or the copy fails.
    pub fn install(&self, source: &Utf8Path, destination: &Utf8Path) -> Result<u64> {
        let wrap = |source_err: io::Error| UnitError::InstallError {
            destination: destination.to_path_buf(),
            source: source_err,
        };

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).map_err(wrap)?;
        }
        let mut reader = fs::File::open(source).map_err(wrap)?;
        let mut writer = fs::File::create(destination).map_err(wrap)?;
        let bytes = io::copy(&mut reader, &mut writer).map_err(wrap)?;

        log::debug!("installed {source} -> {destination} ({bytes} bytes)");
        Ok(bytes)
    }
}
