//! night-vendor library.
//!
//! This crate resolves native library artefacts from GitHub releases and
//! places them deterministically into a vendor directory, recording the
//! installed release tags so re-runs only act when something changed. It is
//! used by the `night-vendor` CLI binary and can be driven programmatically
//! with substitute release sources, downloaders, and extractors.
//!
//! # Modules
//!
//! - [`artefact`] - Release lookup, asset matching, download, extraction, and file location
//! - [`build_metadata`] - Version pins read from upstream build metadata
//! - [`cli`] - Command-line argument definitions
//! - [`config`] - TOML configuration loading and validation
//! - [`error`] - Process-level error types
//! - [`manifest`] - The installed-version manifest
//! - [`output`] - Summary and dry-run formatting
//! - [`pipeline`] - Per-unit sync orchestration
//! - [`platform`] - Platform keys and release asset tags
//! - [`stager`] - Copying located files into the vendor tree
//! - [`status`] - Vendor tree status reporting

pub mod artefact;
pub mod build_metadata;
pub mod cli;
pub mod config;
pub mod error;
pub mod manifest;
pub mod output;
pub mod pipeline;
pub mod platform;
pub mod stager;
pub mod status;

#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;
