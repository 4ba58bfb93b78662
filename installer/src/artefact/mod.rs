//! Resolution of release artefacts down to a single file.
//!
//! Each stage of the pipeline lives in its own module and can be used on
//! its own:
//!
//! - [`release`] - Release lookup trait and GitHub implementation.
//! - [`matcher`] - Asset name patterns and asset selection.
//! - [`download`] - Asset download trait and HTTP implementation.
//! - [`extraction`] - Archive extraction with path traversal protection.
//! - [`locator`] - Finding the wanted file inside an unpacked asset.
//! - [`spec`] - Declarative artefact and platform rules.
//! - [`error`] - Per-unit error kinds.

pub mod download;
pub mod error;
pub mod extraction;
pub mod locator;
pub mod matcher;
pub mod release;
pub mod spec;
