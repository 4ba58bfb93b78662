//! Output formatting for the sync CLI.
//!
//! The end-of-run summary and the dry-run plan go to stderr; `status`
//! output goes to stdout. Progress detail is left to the `log` macros.

use crate::artefact::spec::{ReleaseRule, VersionInput};
use crate::config::SyncConfig;
use crate::manifest::VersionManifest;
use crate::pipeline::{SyncReport, UnitOutcome};
use std::io::Write;

/// Write `message` and a newline to `stderr`, ignoring write failures.
pub fn write_stderr_line(stderr: &mut dyn Write, message: impl std::fmt::Display) {
    write_line(stderr, message);
}

/// Write `message` and a newline to `stdout`, ignoring write failures such
/// as a closed pipe.
pub fn write_stdout_line(stdout: &mut dyn Write, message: impl std::fmt::Display) {
    write_line(stdout, message);
}

fn write_line(out: &mut dyn Write, message: impl std::fmt::Display) {
    if writeln!(out, "{message}").is_err() {
        // Best-effort output; nothing useful can be done on failure.
    }
}

/// Format the end-of-run summary.
///
/// # Examples
///
/// ```
/// use night_vendor::output::summary_text;
/// use night_vendor::pipeline::SyncReport;
///
/// let text = summary_text(&SyncReport::default());
/// assert!(text.starts_with("Synced 0 of 0 units"));
/// ```
#[must_use]
pub fn summary_text(report: &SyncReport) -> String {
    let up_to_date = report
        .units
        .iter()
        .filter(|u| matches!(u.outcome, UnitOutcome::UpToDate { .. }))
        .count();
    let mut lines = vec![format!(
        "Synced {} of {} units ({up_to_date} already up to date).",
        report.succeeded(),
        report.total()
    )];

    if report.manifest_recovered {
        lines.push("The manifest was unreadable and has been rewritten.".to_owned());
    }

    let manual: Vec<String> = report
        .manual_steps()
        .filter_map(|unit| match &unit.outcome {
            UnitOutcome::ManualStepRequired { saved_to, .. } => Some(format!(
                "  {}/{}: asset saved to {saved_to}; extract it by hand",
                unit.artefact, unit.platform
            )),
            _ => None,
        })
        .collect();
    if !manual.is_empty() {
        lines.push(String::new());
        lines.push("Manual steps required:".to_owned());
        lines.extend(manual);
    }

    let failures: Vec<String> = report
        .failures()
        .filter_map(|unit| match &unit.outcome {
            UnitOutcome::Failed { kind, reason, .. } => Some(format!(
                "  {}/{}: {kind}: {reason}",
                unit.artefact, unit.platform
            )),
            _ => None,
        })
        .collect();
    if !failures.is_empty() {
        lines.push(String::new());
        lines.push("Failures:".to_owned());
        lines.extend(failures);
    }

    lines.join("\n")
}

/// What a sync run would do, shown by `--dry-run`.
#[derive(Debug)]
pub struct DryRunPlan<'a> {
    /// The effective configuration.
    pub config: &'a SyncConfig,
    /// The manifest as it is on disk.
    pub manifest: &'a VersionManifest,
    /// Whether `--force` was given.
    pub force: bool,
}

impl DryRunPlan<'_> {
    /// Format the plan for display.
    #[must_use]
    pub fn display_text(&self) -> String {
        let config = self.config;
        let mut lines = vec![
            "Dry run - no files will be modified".to_owned(),
            String::new(),
            format!("Vendor directory: {}", config.vendor_dir),
            format!("Manifest: {}", config.manifest),
            format!("Release API: {}", config.api_base),
            format!("Force: {}", self.force),
        ];

        for artefact in &config.artefacts {
            lines.push(String::new());
            lines.push(format!(
                "{} from {} ({})",
                artefact.name,
                artefact.repository,
                describe_rule(&artefact.release)
            ));
            lines.push(format!(
                "  recorded: {}",
                self.manifest.version(&artefact.name).unwrap_or("none")
            ));
            for (&platform, spec) in &artefact.platforms {
                lines.push(format!(
                    "  {platform} -> {} (tag {}, patterns: {})",
                    config.destination(platform, spec),
                    config.release_tag(platform, spec),
                    spec.asset_patterns.join(", ")
                ));
            }
        }

        lines.join("\n")
    }
}

fn describe_rule(rule: &ReleaseRule) -> String {
    match rule {
        ReleaseRule::LatestStable { reject } if reject.is_empty() => "latest stable".to_owned(),
        ReleaseRule::LatestStable { reject } => {
            format!("latest stable excluding {}", reject.join(", "))
        }
        ReleaseRule::LatestWithPrefix { prefix } => format!("latest with prefix {prefix}"),
        ReleaseRule::ExactTag {
            prefix,
            version: VersionInput::Fixed(version),
        } => format!("tag {prefix}{}", version.trim()),
        ReleaseRule::ExactTag {
            prefix,
            version: VersionInput::BuildMetadata { file, .. },
        } => format!("tag {prefix}<version from {file}>"),
    }
}
