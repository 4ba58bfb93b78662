//! Error types for the vendor sync CLI.
//!
//! These are the process-level failures: problems with the configuration,
//! detected before any unit of work starts, and failure to persist the
//! manifest once all units have run. Failures inside a single
//! (artefact, platform) unit are [`UnitError`](crate::artefact::error::UnitError)s
//! and never surface here.

use crate::manifest::ManifestError;
use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors that stop a sync run.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The configuration file could not be read.
    #[error("failed to read configuration {path}: {source}")]
    ConfigRead {
        /// Path of the configuration file.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for the expected schema.
    #[error("invalid configuration {path}: {reason}")]
    ConfigParse {
        /// Path of the configuration file.
        path: Utf8PathBuf,
        /// Parser message.
        reason: String,
    },

    /// The configuration parsed but breaks a validation rule.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// Which rule was broken, and where.
        reason: String,
    },

    /// An artefact named on the command line is not configured.
    #[error("unknown artefact {name}; configured artefacts: {known}")]
    UnknownArtefact {
        /// The requested name.
        name: String,
        /// Comma-separated configured names.
        known: String,
    },

    /// The manifest could not be written after the run.
    #[error(transparent)]
    ManifestWrite(#[from] ManifestError),
}

/// Result type alias using [`SyncError`].
pub type Result<T> = std::result::Result<T, SyncError>;
