//! Sync orchestration across artefacts and platforms.
//!
//! Each (artefact, platform) pair is an independent unit of work that moves
//! through a fixed sequence of states:
//!
//! ```text
//! Pending → ReleaseResolved → AssetResolved → Downloaded → Extracted
//!         → Located → Installed → Recorded
//! ```
//!
//! Any state may end in failure instead of advancing. A failed unit is
//! recorded with the state it reached and the run moves on; nothing that
//! happens inside one unit stops another. The release for an artefact is
//! looked up once and shared by all of its platform units. The manifest is
//! written exactly once, after every unit has finished.

use crate::artefact::download::ArtefactDownloader;
use crate::artefact::error::UnitError;
use crate::artefact::extraction::{
    ArchiveExtractor, ExtractionDirs, ExtractionOutcome, extract_asset,
};
use crate::artefact::locator::{LocateStrategy, locate};
use crate::artefact::matcher::{AssetPattern, PatternValues, resolve_asset};
use crate::artefact::release::{ReleaseInfo, ReleaseSelector, ReleaseSource};
use crate::artefact::spec::{ArtefactSpec, PlatformSpec, ReleaseRule, VersionInput};
use crate::build_metadata::read_version;
use crate::config::SyncConfig;
use crate::error::Result;
use crate::manifest::VersionManifest;
use crate::platform::PlatformKey;
use crate::stager::Stager;
use camino::Utf8PathBuf;
use std::fmt;

/// Progress of a unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum UnitState {
    /// Nothing done yet.
    Pending,
    /// The release was found.
    ReleaseResolved,
    /// An asset in the release matched.
    AssetResolved,
    /// The asset bytes were downloaded.
    Downloaded,
    /// The asset was unpacked into scratch space.
    Extracted,
    /// The wanted file was found inside the asset.
    Located,
    /// The file was copied to its destination.
    Installed,
    /// The artefact's version was recorded in the manifest.
    Recorded,
}

impl fmt::Display for UnitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pending => "pending",
            Self::ReleaseResolved => "release resolved",
            Self::AssetResolved => "asset resolved",
            Self::Downloaded => "downloaded",
            Self::Extracted => "extracted",
            Self::Located => "located",
            Self::Installed => "installed",
            Self::Recorded => "recorded",
        })
    }
}

/// How a unit of work ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitOutcome {
    /// The file was installed.
    Installed {
        /// Release tag the file came from.
        tag: String,
        /// Where the file was written.
        destination: Utf8PathBuf,
        /// Bytes copied.
        bytes: u64,
        /// How the file was found inside the asset.
        strategy: LocateStrategy,
    },
    /// The manifest records this release for this platform and the file is
    /// present.
    UpToDate {
        /// The recorded release tag.
        tag: String,
        /// The existing file.
        destination: Utf8PathBuf,
    },
    /// The asset cannot be unpacked here and was saved for the user.
    ManualStepRequired {
        /// Release tag the asset came from.
        tag: String,
        /// Where the raw asset was written.
        saved_to: Utf8PathBuf,
    },
    /// The unit failed.
    Failed {
        /// The last state the unit reached.
        stage: UnitState,
        /// Short error kind label, e.g. `NoMatchingAsset`.
        kind: &'static str,
        /// Human-readable reason.
        reason: String,
    },
}

impl UnitOutcome {
    fn failed(stage: UnitState, error: &UnitError) -> Self {
        Self::Failed {
            stage,
            kind: error.kind(),
            reason: error.to_string(),
        }
    }

    /// Return true for outcomes that leave the file in place.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Installed { .. } | Self::UpToDate { .. })
    }
}

/// The result of one unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitReport {
    /// Artefact name.
    pub artefact: String,
    /// Platform.
    pub platform: PlatformKey,
    /// What happened.
    pub outcome: UnitOutcome,
}

/// The result of a whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Every unit, in processing order.
    pub units: Vec<UnitReport>,
    /// Artefacts whose version was recorded, with the recorded tag.
    pub recorded: Vec<(String, String)>,
    /// True when an unusable manifest was discarded at the start of the run.
    pub manifest_recovered: bool,
}

impl SyncReport {
    /// Number of units attempted.
    #[must_use]
    pub fn total(&self) -> usize {
        self.units.len()
    }

    /// Number of units that installed a file or were already up to date.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.units.iter().filter(|u| u.outcome.is_success()).count()
    }

    /// Units that need a manual step.
    pub fn manual_steps(&self) -> impl Iterator<Item = &UnitReport> {
        self.units
            .iter()
            .filter(|u| matches!(u.outcome, UnitOutcome::ManualStepRequired { .. }))
    }

    /// Units that failed.
    pub fn failures(&self) -> impl Iterator<Item = &UnitReport> {
        self.units
            .iter()
            .filter(|u| matches!(u.outcome, UnitOutcome::Failed { .. }))
    }

    /// Return true when at least one unit failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }
}

/// Drives every configured unit of work through the pipeline.
pub struct SyncOrchestrator<'a> {
    config: &'a SyncConfig,
    source: &'a dyn ReleaseSource,
    downloader: &'a dyn ArtefactDownloader,
    extractor: &'a dyn ArchiveExtractor,
    stager: Stager,
    force: bool,
}

impl<'a> SyncOrchestrator<'a> {
    /// Create an orchestrator over `config` with the given seams.
    #[must_use]
    pub fn new(
        config: &'a SyncConfig,
        source: &'a dyn ReleaseSource,
        downloader: &'a dyn ArtefactDownloader,
        extractor: &'a dyn ArchiveExtractor,
    ) -> Self {
        Self {
            config,
            source,
            downloader,
            extractor,
            stager: Stager,
            force: false,
        }
    }

    /// Reinstall files even when the manifest says they are current.
    #[must_use]
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Run every unit, then persist the manifest once.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::ManifestWrite`](crate::error::SyncError::ManifestWrite)
    /// if the manifest cannot be saved. Unit failures are reported in the
    /// returned [`SyncReport`], never as errors.
    pub fn run(&self) -> Result<SyncReport> {
        let loaded = VersionManifest::load(&self.config.manifest);
        let manifest_recovered = loaded.recovered_from_corrupt_file();
        let mut manifest = loaded.into_manifest();

        let mut report = self.sync_into(&mut manifest);
        report.manifest_recovered = manifest_recovered;

        manifest.save(&self.config.manifest)?;
        Ok(report)
    }

    /// Run every unit against an in-memory manifest without persisting it.
    pub fn sync_into(&self, manifest: &mut VersionManifest) -> SyncReport {
        let mut report = SyncReport::default();
        for artefact in &self.config.artefacts {
            let units = self.sync_artefact(artefact, manifest);
            let mut tag = None;
            for unit in &units {
                if let UnitOutcome::Installed { tag: installed, .. }
                | UnitOutcome::UpToDate { tag: installed, .. } = &unit.outcome
                {
                    manifest.record_platform(&artefact.name, unit.platform, installed);
                    tag.get_or_insert_with(|| installed.clone());
                }
            }
            match tag {
                Some(tag) => {
                    manifest.record_success(&artefact.name, &tag);
                    log::debug!("{}: {}", artefact.name, UnitState::Recorded);
                    report.recorded.push((artefact.name.clone(), tag));
                }
                None => log::warn!(
                    "{}: no platform succeeded; keeping previous manifest entry",
                    artefact.name
                ),
            }
            report.units.extend(units);
        }
        report
    }

    fn sync_artefact(&self, artefact: &ArtefactSpec, manifest: &VersionManifest) -> Vec<UnitReport> {
        let report = |platform: PlatformKey, outcome: UnitOutcome| UnitReport {
            artefact: artefact.name.clone(),
            platform,
            outcome,
        };
        let fail_all = |error: UnitError| -> Vec<UnitReport> {
            log::error!("{}: {error}", artefact.name);
            artefact
                .platforms
                .keys()
                .map(|&platform| report(platform, UnitOutcome::failed(UnitState::Pending, &error)))
                .collect()
        };

        let selector = match selector_for(&artefact.release) {
            Ok(selector) => selector,
            Err(error) => return fail_all(error),
        };
        log::info!("{}: looking up {selector} in {}", artefact.name, artefact.repository);
        let release = match self.fetch_release(&artefact.repository, &selector) {
            Ok(release) => release,
            Err(error) => return fail_all(error),
        };
        let version = selector.version_of(&release.tag);

        artefact
            .platforms
            .iter()
            .map(|(&platform, spec)| {
                let unit = Unit {
                    artefact,
                    platform,
                    spec,
                    release: &release,
                    version: &version,
                };
                let outcome = self.sync_unit(&unit, manifest);
                log_outcome(&format!("{}/{platform}", artefact.name), &outcome);
                report(platform, outcome)
            })
            .collect()
    }

    fn fetch_release(
        &self,
        repository: &str,
        selector: &ReleaseSelector,
    ) -> std::result::Result<ReleaseInfo, UnitError> {
        let mut attempt = 1;
        loop {
            match self.source.fetch(repository, selector) {
                Err(error) if error.is_retryable() && attempt < self.config.release_attempts => {
                    log::warn!(
                        "release lookup for {repository} failed (attempt {attempt} of {}): {error}",
                        self.config.release_attempts
                    );
                    std::thread::sleep(self.config.retry_delay);
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    fn sync_unit(&self, unit: &Unit<'_>, manifest: &VersionManifest) -> UnitOutcome {
        let mut state = UnitState::ReleaseResolved;
        match self.advance(unit, manifest, &mut state) {
            Ok(outcome) => outcome,
            Err(error) => UnitOutcome::failed(state, &error),
        }
    }

    fn advance(
        &self,
        unit: &Unit<'_>,
        manifest: &VersionManifest,
        state: &mut UnitState,
    ) -> std::result::Result<UnitOutcome, UnitError> {
        let Unit {
            artefact,
            platform,
            spec,
            release,
            version,
        } = *unit;
        let label = format!("{}/{platform}", artefact.name);
        let mut step = |next: UnitState| {
            *state = next;
            log::debug!("{label}: {next}");
        };
        step(UnitState::ReleaseResolved);

        let destination = self.config.destination(platform, spec);
        if !self.force
            && manifest.platform_version(&artefact.name, platform) == Some(release.tag.as_str())
            && destination.is_file()
        {
            return Ok(UnitOutcome::UpToDate {
                tag: release.tag.clone(),
                destination,
            });
        }

        let asset_name = artefact
            .asset_name
            .for_platform(platform)
            .ok_or_else(|| UnitError::UnknownAssetName {
                platform: platform.to_string(),
            })?;
        let tag = self.config.release_tag(platform, spec);
        let values = PatternValues {
            name: asset_name,
            version,
            tag: &tag,
        };
        let patterns = spec
            .asset_patterns
            .iter()
            .map(|template| AssetPattern::expand(template, values))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let asset = resolve_asset(release, &patterns)?;
        step(UnitState::AssetResolved);
        log::info!("{label}: using asset {}", asset.name);

        let bytes = self.downloader.download(&asset.url)?;
        step(UnitState::Downloaded);

        let manual_dir = self.config.platform_dir(platform);
        let dirs = ExtractionDirs {
            scratch_parent: self.config.scratch_dir.as_deref(),
            manual_dir: &manual_dir,
        };
        let extraction =
            match extract_asset(self.extractor, &asset.name, spec.archive_kind, &bytes, dirs)? {
                ExtractionOutcome::Extracted(extraction) => extraction,
                ExtractionOutcome::ManualStepRequired { saved_to } => {
                    return Ok(UnitOutcome::ManualStepRequired {
                        tag: release.tag.clone(),
                        saved_to,
                    });
                }
            };
        step(UnitState::Extracted);

        let located = locate(
            extraction.root(),
            extraction.members(),
            &spec.file_name,
            &spec.archive_paths,
        )
        .ok_or_else(|| UnitError::FileNotLocated {
            file_name: spec.file_name.clone(),
            asset: asset.name.clone(),
        })?;
        step(UnitState::Located);

        let copied = self.stager.install(&located.path, &destination)?;
        step(UnitState::Installed);

        Ok(UnitOutcome::Installed {
            tag: release.tag.clone(),
            destination,
            bytes: copied,
            strategy: located.strategy,
        })
    }
}

fn log_outcome(label: &str, outcome: &UnitOutcome) {
    match outcome {
        UnitOutcome::Installed {
            destination,
            bytes,
            strategy,
            ..
        } => log::info!("{label}: installed {destination} ({bytes} bytes, found by {strategy})"),
        UnitOutcome::UpToDate { tag, .. } => log::info!("{label}: already at {tag}"),
        UnitOutcome::ManualStepRequired { saved_to, .. } => {
            log::info!("{label}: manual step required for {saved_to}");
        }
        UnitOutcome::Failed { stage, reason, .. } => {
            log::error!("{label}: failed after {stage}: {reason}");
        }
    }
}

/// Everything one unit of work needs.
#[derive(Clone, Copy)]
struct Unit<'a> {
    artefact: &'a ArtefactSpec,
    platform: PlatformKey,
    spec: &'a PlatformSpec,
    release: &'a ReleaseInfo,
    version: &'a str,
}

/// Build the release selector for a rule, reading build metadata if needed.
///
/// # Errors
///
/// Returns [`UnitError::VersionUnavailable`] if an exact-tag version cannot
/// be read.
pub fn selector_for(rule: &ReleaseRule) -> std::result::Result<ReleaseSelector, UnitError> {
    Ok(match rule {
        ReleaseRule::LatestStable { reject } => ReleaseSelector::LatestStable {
            reject: reject.clone(),
        },
        ReleaseRule::LatestWithPrefix { prefix } => ReleaseSelector::LatestWithPrefix {
            prefix: prefix.clone(),
        },
        ReleaseRule::ExactTag { prefix, version } => ReleaseSelector::ExactTag {
            prefix: prefix.clone(),
            version: match version {
                VersionInput::Fixed(version) => version.trim().to_owned(),
                VersionInput::BuildMetadata { file, key } => read_version(file, key.as_deref())
                    .map_err(|e| UnitError::VersionUnavailable {
                        reason: e.to_string(),
                    })?,
            },
        },
    })
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
