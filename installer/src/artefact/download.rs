//! HTTP plumbing shared by release lookup and asset download.
//!
//! Provides a trait-based abstraction for fetching asset bytes, enabling
//! dependency injection for testing, plus the agent construction and error
//! mapping used by every request the tool makes.

use super::error::{Result, UnitError};
use std::io::Read;
use std::time::Duration;

/// User agent sent with every request.
pub const USER_AGENT: &str = concat!("night-vendor/", env!("CARGO_PKG_VERSION"));

/// Trait for downloading release assets.
///
/// Abstractions allow tests to mock HTTP behaviour without network access.
#[cfg_attr(test, mockall::automock)]
pub trait ArtefactDownloader {
    /// Download the asset at `url` and return its bytes.
    ///
    /// # Errors
    ///
    /// Returns [`UnitError::Transport`] if the request fails, times out, or
    /// answers with a non-success status.
    fn download(&self, url: &str) -> Result<Vec<u8>>;
}

/// HTTP-based downloader using `ureq`.
#[derive(Debug, Clone)]
pub struct HttpDownloader {
    agent: ureq::Agent,
}

impl HttpDownloader {
    /// Create a downloader that issues requests through `agent`.
    #[must_use]
    pub fn new(agent: ureq::Agent) -> Self {
        Self { agent }
    }
}

impl ArtefactDownloader for HttpDownloader {
    fn download(&self, url: &str) -> Result<Vec<u8>> {
        log::debug!("downloading {url}");
        let response = get(&self.agent, url)
            .call()
            .map_err(|e| map_ureq_error(url, &e))?;
        let mut bytes = Vec::new();
        // The reader has no size cap, unlike `read_to_vec`.
        response
            .into_body()
            .as_reader()
            .read_to_end(&mut bytes)
            .map_err(|e| UnitError::Transport {
                url: url.to_owned(),
                reason: e.to_string(),
                retryable: true,
            })?;
        log::debug!("downloaded {} bytes from {url}", bytes.len());
        Ok(bytes)
    }
}

/// Build a `ureq` agent whose requests give up after `timeout`.
///
/// One agent is created per run and shared by the release source and the
/// downloader so connections are pooled.
#[must_use]
pub fn http_agent(timeout: Duration) -> ureq::Agent {
    let config = ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .build();
    ureq::Agent::new_with_config(config)
}

/// Start a GET request carrying the tool's user agent.
pub(crate) fn get(
    agent: &ureq::Agent,
    url: &str,
) -> ureq::RequestBuilder<ureq::typestate::WithoutBody> {
    agent.get(url).header("User-Agent", USER_AGENT)
}

/// Map a ureq error to a [`UnitError::Transport`].
///
/// Rate limiting (403, 429), server errors, timeouts and I/O failures are
/// flagged as retryable.
pub(crate) fn map_ureq_error(url: &str, err: &ureq::Error) -> UnitError {
    let retryable = match err {
        ureq::Error::StatusCode(code) => matches!(code, 403 | 429) || *code >= 500,
        ureq::Error::Timeout(_) | ureq::Error::Io(_) => true,
        _ => false,
    };
    UnitError::Transport {
        url: url.to_owned(),
        reason: err.to_string(),
        retryable,
    }
}
