//! Shared test utilities for the installer crate.

use crate::artefact::download::ArtefactDownloader;
use crate::artefact::error::{Result, UnitError};
use crate::artefact::release::{ReleaseAsset, ReleaseInfo, ReleaseSelector, ReleaseSource};
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::io::{Cursor, Write};

/// Builds a zip archive holding `files` (path, contents) in order.
///
/// # Panics
///
/// Panics if the in-memory archive cannot be written.
pub fn zip_archive(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default();
    for (path, contents) in files {
        writer.start_file(*path, options).expect("start zip entry");
        writer.write_all(contents).expect("write zip entry");
    }
    writer.finish().expect("finish zip archive").into_inner()
}

fn tar_into<W: Write>(sink: W, files: &[(&str, &[u8])]) -> W {
    let mut builder = tar::Builder::new(sink);
    for (path, contents) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(contents.len() as u64);
        header.set_mode(0o644);
        builder
            .append_data(&mut header, path, *contents)
            .expect("append tar entry");
    }
    builder.into_inner().expect("finish tar archive")
}

/// Builds a gzip-compressed tarball holding `files` in order.
///
/// # Panics
///
/// Panics if the in-memory archive cannot be written.
pub fn tar_gz_archive(files: &[(&str, &[u8])]) -> Vec<u8> {
    let encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::fast());
    tar_into(encoder, files).finish().expect("finish gzip stream")
}

/// Builds a zstd-compressed tarball holding `files` in order.
///
/// # Panics
///
/// Panics if the in-memory archive cannot be written.
pub fn tar_zst_archive(files: &[(&str, &[u8])]) -> Vec<u8> {
    let encoder = zstd::Encoder::new(Vec::new(), 0).expect("zstd encoder");
    tar_into(encoder, files).finish().expect("finish zstd stream")
}

/// Download URL used for `name` in release `tag` by [`release`].
pub fn asset_url(tag: &str, name: &str) -> String {
    format!("https://example.invalid/download/{tag}/{name}")
}

/// Builds a stable release carrying assets named `assets`.
pub fn release(tag: &str, assets: &[&str]) -> ReleaseInfo {
    ReleaseInfo {
        tag: tag.to_owned(),
        prerelease: false,
        assets: assets
            .iter()
            .map(|name| ReleaseAsset {
                name: (*name).to_owned(),
                url: asset_url(tag, name),
            })
            .collect(),
    }
}

/// Error returned by the stubs for a missing resource.
pub fn not_found(url: &str) -> UnitError {
    UnitError::Transport {
        url: url.to_owned(),
        reason: "HTTP status 404".to_owned(),
        retryable: false,
    }
}

/// A stub [`ReleaseSource`] answering from per-repository queues.
///
/// Each lookup pops the next queued response for the repository, so tests
/// can script a transient failure followed by a success.
#[derive(Debug, Default)]
pub struct StubReleaseSource {
    responses: RefCell<HashMap<String, VecDeque<Result<ReleaseInfo>>>>,
    calls: RefCell<Vec<(String, ReleaseSelector)>>,
}

impl StubReleaseSource {
    /// Creates a stub with no scripted responses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues `response` for the next lookup of `repository`.
    #[must_use]
    pub fn with(self, repository: &str, response: Result<ReleaseInfo>) -> Self {
        self.responses
            .borrow_mut()
            .entry(repository.to_owned())
            .or_default()
            .push_back(response);
        self
    }

    /// Returns every lookup made so far, in order.
    pub fn calls(&self) -> Vec<(String, ReleaseSelector)> {
        self.calls.borrow().clone()
    }
}

impl ReleaseSource for StubReleaseSource {
    fn fetch(&self, repository: &str, selector: &ReleaseSelector) -> Result<ReleaseInfo> {
        self.calls
            .borrow_mut()
            .push((repository.to_owned(), selector.clone()));
        self.responses
            .borrow_mut()
            .get_mut(repository)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| {
                Err(UnitError::NoMatchingRelease {
                    repository: repository.to_owned(),
                    selector: selector.to_string(),
                })
            })
    }
}

/// A stub [`ArtefactDownloader`] serving canned bytes by URL.
///
/// Unknown URLs fail with a non-retryable 404.
#[derive(Debug, Default)]
pub struct StubDownloader {
    assets: HashMap<String, Vec<u8>>,
    requested: RefCell<Vec<String>>,
}

impl StubDownloader {
    /// Creates a stub serving nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves `bytes` at `url`.
    #[must_use]
    pub fn with(mut self, url: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.assets.insert(url.into(), bytes);
        self
    }

    /// Returns every requested URL, in order.
    pub fn requested(&self) -> Vec<String> {
        self.requested.borrow().clone()
    }
}

impl ArtefactDownloader for StubDownloader {
    fn download(&self, url: &str) -> Result<Vec<u8>> {
        self.requested.borrow_mut().push(url.to_owned());
        self.assets.get(url).cloned().ok_or_else(|| not_found(url))
    }
}
