//! Vendor tree status reporting.
//!
//! Compares the configured artefacts against the manifest and the files on
//! disk, for human-readable or JSON output. Nothing here touches the
//! network.

use crate::config::SyncConfig;
use crate::manifest::VersionManifest;
use crate::platform::PlatformKey;
use camino::Utf8PathBuf;
use serde::Serialize;

/// Status of one configured artefact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtefactStatus {
    /// Artefact name.
    pub name: String,
    /// Release tag recorded in the manifest, if any.
    pub recorded: Option<String>,
    /// Per-platform file state.
    pub platforms: Vec<PlatformStatus>,
}

/// Whether one platform's file is in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlatformStatus {
    /// Platform.
    pub platform: PlatformKey,
    /// Where the file belongs.
    pub destination: Utf8PathBuf,
    /// Whether a file exists there.
    pub present: bool,
    /// Release tag recorded for this platform's file, if any.
    pub installed: Option<String>,
    /// True when the file exists and came from the artefact's recorded
    /// release.
    pub current: bool,
}

/// Collect the status of every configured artefact.
#[must_use]
pub fn collect_status(config: &SyncConfig, manifest: &VersionManifest) -> Vec<ArtefactStatus> {
    config
        .artefacts
        .iter()
        .map(|artefact| {
            let recorded = manifest.version(&artefact.name);
            ArtefactStatus {
                name: artefact.name.clone(),
                recorded: recorded.map(str::to_owned),
                platforms: artefact
                    .platforms
                    .iter()
                    .map(|(&platform, spec)| {
                        let destination = config.destination(platform, spec);
                        let present = destination.is_file();
                        let installed = manifest.platform_version(&artefact.name, platform);
                        PlatformStatus {
                            platform,
                            destination,
                            present,
                            current: present && installed.is_some() && installed == recorded,
                            installed: installed.map(str::to_owned),
                        }
                    })
                    .collect(),
            }
        })
        .collect()
}

/// Format status for human-readable output.
///
/// # Examples
///
/// ```
/// use night_vendor::status::format_human;
///
/// assert!(format_human(&[]).contains("No artefacts configured"));
/// ```
#[must_use]
pub fn format_human(statuses: &[ArtefactStatus]) -> String {
    if statuses.is_empty() {
        return String::from("No artefacts configured.");
    }

    let mut output = String::new();
    for status in statuses {
        output.push_str(&format!(
            "{} ({})\n",
            status.name,
            status.recorded.as_deref().unwrap_or("not recorded")
        ));
        for platform in &status.platforms {
            let marker = match (platform.present, platform.current) {
                (false, _) => "missing",
                (true, true) => "current",
                (true, false) => "stale",
            };
            output.push_str(&format!(
                "  {:<8} {marker:<8} {:<16} {}\n",
                platform.platform.as_str(),
                platform.installed.as_deref().unwrap_or("-"),
                platform.destination
            ));
        }
    }
    output
}

/// Format status as pretty-printed JSON.
#[must_use]
pub fn format_json(statuses: &[ArtefactStatus]) -> String {
    serde_json::to_string_pretty(&serde_json::json!({ "artefacts": statuses }))
        .unwrap_or_else(|_| "{}".to_owned())
}
