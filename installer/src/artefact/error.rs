//! Error types for a single (artefact, platform) unit of work.
//!
//! Every failure mode of the resolution pipeline has its own variant so the
//! final report can name what went wrong. None of these errors is fatal to
//! the run: the orchestrator records them against the unit and moves on.

use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors that abort one unit of work.
#[derive(Debug, Error)]
pub enum UnitError {
    /// The network request failed, timed out, or returned a non-success status.
    #[error("request to {url} failed: {reason}")]
    Transport {
        /// The URL that was requested.
        url: String,
        /// A human-readable description of the failure.
        reason: String,
        /// Whether repeating the request later might succeed (rate limits,
        /// timeouts, server errors).
        retryable: bool,
    },

    /// The release API answered with a body that could not be decoded.
    #[error("invalid response from {url}: {reason}")]
    InvalidResponse {
        /// The URL that produced the body.
        url: String,
        /// Description of the decoding failure.
        reason: String,
    },

    /// No release in the repository satisfied the selector.
    #[error("no release in {repository} matches {selector}")]
    NoMatchingRelease {
        /// The `owner/name` repository that was queried.
        repository: String,
        /// Human-readable description of the selector.
        selector: String,
    },

    /// No asset in the release matched any of the configured patterns.
    #[error("no asset in release {tag} matches any of: {patterns}")]
    NoMatchingAsset {
        /// The release tag that was searched.
        tag: String,
        /// Comma-separated list of the patterns that were tried.
        patterns: String,
    },

    /// The downloaded bytes are not a readable archive.
    #[error("invalid archive {asset}: {reason}")]
    InvalidArchive {
        /// The asset file name.
        asset: String,
        /// Description of the corruption or unsupported content.
        reason: String,
    },

    /// Every locator strategy was exhausted without finding the file.
    #[error("{file_name} not found in {asset}")]
    FileNotLocated {
        /// The base name that was searched for.
        file_name: String,
        /// The asset file name that was unpacked.
        asset: String,
    },

    /// Copying the located file to its destination failed.
    #[error("failed to install {destination}: {source}")]
    InstallError {
        /// The destination path that could not be written.
        destination: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The version required to build an exact release tag could not be read.
    #[error("version unavailable: {reason}")]
    VersionUnavailable {
        /// Description of why the version could not be determined.
        reason: String,
    },

    /// A per-platform asset name map has no entry for this platform.
    #[error("no asset name configured for platform {platform}")]
    UnknownAssetName {
        /// The platform that lacked an entry.
        platform: String,
    },

    /// An asset pattern did not compile once placeholders were substituted.
    #[error("invalid asset pattern {pattern}: {reason}")]
    InvalidPattern {
        /// The expanded pattern text.
        pattern: String,
        /// The regex compiler's message.
        reason: String,
    },

    /// A scratch directory for extraction could not be created.
    #[error("failed to create scratch directory: {source}")]
    Scratch {
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl UnitError {
    /// Return true when the failure is transient and a retry may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport { retryable: true, .. })
    }

    /// Return a short, stable label for the error kind.
    ///
    /// # Examples
    ///
    /// ```
    /// use night_vendor::artefact::error::UnitError;
    ///
    /// let err = UnitError::NoMatchingRelease {
    ///     repository: "libsdl-org/SDL".to_owned(),
    ///     selector: "latest stable".to_owned(),
    /// };
    /// assert_eq!(err.kind(), "NoMatchingRelease");
    /// ```
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport { .. } => "TransportError",
            Self::InvalidResponse { .. } => "InvalidResponse",
            Self::NoMatchingRelease { .. } => "NoMatchingRelease",
            Self::NoMatchingAsset { .. } => "NoMatchingAsset",
            Self::InvalidArchive { .. } => "InvalidArchive",
            Self::FileNotLocated { .. } => "FileNotLocated",
            Self::InstallError { .. } => "InstallError",
            Self::VersionUnavailable { .. } => "VersionUnavailable",
            Self::UnknownAssetName { .. } => "UnknownAssetName",
            Self::InvalidPattern { .. } => "InvalidPattern",
            Self::Scratch { .. } => "ScratchError",
        }
    }
}

/// Result type alias using [`UnitError`].
pub type Result<T> = std::result::Result<T, UnitError>;
