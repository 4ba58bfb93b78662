//! CLI argument definitions for night-vendor.
//!
//! This module defines the command-line interface using clap. It is separated
//! from the main entrypoint to keep the binary small and focused on
//! orchestration.

use crate::config::{DEFAULT_CONFIG_FILE, SyncConfig};
use crate::error::Result;
use crate::platform::PlatformKey;
use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};

/// Fetch native library artefacts into a vendor directory.
#[derive(Parser, Debug)]
#[command(name = "night-vendor")]
#[command(version, about)]
#[command(long_about = concat!(
    "Fetch native library artefacts into a vendor directory.\n\n",
    "For every artefact in the configuration file, night-vendor picks a GitHub ",
    "release, finds the asset for each platform, unpacks it, locates the wanted ",
    "library inside and copies it to <vendor_dir>/<platform>/<file>. Installed ",
    "release tags are recorded in a manifest so re-runs only act when a new ",
    "release appears.\n\n",
    "A failure for one artefact or platform never stops the others; all failures ",
    "are listed at the end of the run.",
))]
#[command(after_help = concat!(
    "EXIT STATUS:\n",
    "  0  every unit installed, was up to date, or needs a manual step\n",
    "  1  configuration error, or the manifest could not be written\n",
    "  2  at least one unit failed\n\n",
    "EXAMPLES:\n",
    "  Sync everything in ./vendor.toml:\n",
    "    $ night-vendor\n\n",
    "  Sync one artefact for one platform, ignoring the manifest:\n",
    "    $ night-vendor --only sdl3-core --platform linux --force\n\n",
    "  Preview without network access:\n",
    "    $ night-vendor --dry-run\n\n",
    "  Show what is installed:\n",
    "    $ night-vendor status --json",
))]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Sync arguments (used when no subcommand is given).
    #[command(flatten)]
    pub sync: SyncArgs,
}

/// Available subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Sync artefacts into the vendor directory (default when no subcommand given).
    Sync(SyncArgs),

    /// Show recorded versions and which files are present.
    Status(StatusArgs),
}

/// Options shared by every subcommand.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct ConfigArgs {
    /// Configuration file.
    #[arg(short, long, value_name = "FILE", default_value = DEFAULT_CONFIG_FILE)]
    pub config: Utf8PathBuf,

    /// Override the vendor directory from the configuration.
    #[arg(long, value_name = "DIR")]
    pub vendor_dir: Option<Utf8PathBuf>,

    /// Override the manifest path from the configuration.
    #[arg(long, value_name = "FILE")]
    pub manifest: Option<Utf8PathBuf>,
}

impl Default for ConfigArgs {
    fn default() -> Self {
        Self {
            config: Utf8PathBuf::from(DEFAULT_CONFIG_FILE),
            vendor_dir: None,
            manifest: None,
        }
    }
}

impl ConfigArgs {
    /// Load the configuration file and apply the path overrides.
    ///
    /// # Errors
    ///
    /// Returns any error from [`SyncConfig::load`].
    pub fn load(&self) -> Result<SyncConfig> {
        let mut config = SyncConfig::load(&self.config)?;
        if let Some(dir) = &self.vendor_dir {
            config.set_vendor_dir(dir.clone());
        }
        if let Some(manifest) = &self.manifest {
            config.manifest.clone_from(manifest);
        }
        Ok(config)
    }
}

/// Arguments for the sync command.
#[derive(Args, Debug, Clone, Default)]
pub struct SyncArgs {
    /// Configuration file and path overrides.
    #[command(flatten)]
    pub paths: ConfigArgs,

    /// Override the release API base URL.
    #[arg(long, value_name = "URL")]
    pub api_base: Option<String>,

    /// Sync only the named artefact (can be repeated).
    #[arg(long, value_name = "NAME")]
    pub only: Vec<String>,

    /// Sync only the given platform (can be repeated).
    #[arg(short, long, value_name = "PLATFORM")]
    pub platform: Vec<PlatformKey>,

    /// Reinstall even when the manifest says a file is current.
    #[arg(long)]
    pub force: bool,

    /// Show the plan and exit without network access.
    #[arg(long)]
    pub dry_run: bool,

    /// Increase log verbosity (repeatable: -v, -vv, -vvv).
    #[arg(
        short,
        long = "verbose",
        action = clap::ArgAction::Count,
        conflicts_with = "quiet"
    )]
    pub verbosity: u8,

    /// Only log errors.
    #[arg(short, long, conflicts_with = "verbosity")]
    pub quiet: bool,
}

impl SyncArgs {
    /// Load the configuration and apply every command-line override.
    ///
    /// # Errors
    ///
    /// Returns configuration errors, and
    /// [`SyncError::UnknownArtefact`](crate::error::SyncError::UnknownArtefact)
    /// for an `--only` name that is not configured.
    pub fn load_config(&self) -> Result<SyncConfig> {
        let mut config = self.paths.load()?;
        if let Some(api_base) = &self.api_base {
            config.api_base.clone_from(api_base);
        }
        config.retain(&self.only, &self.platform)?;
        Ok(config)
    }
}

/// Arguments for the status command.
#[derive(Args, Debug, Clone, Default)]
pub struct StatusArgs {
    /// Configuration file and path overrides.
    #[command(flatten)]
    pub paths: ConfigArgs,

    /// Output in JSON format for scripting.
    #[arg(long)]
    pub json: bool,
}

impl Cli {
    /// Returns the effective sync arguments.
    ///
    /// If a `Sync` subcommand was provided, returns those arguments.
    /// Otherwise returns the flattened sync arguments.
    ///
    /// # Note
    ///
    /// When `Command::Status` is active, this returns the default flattened
    /// sync arguments. Callers should check `self.command` first.
    #[must_use]
    pub fn sync_args(&self) -> &SyncArgs {
        match &self.command {
            Some(Command::Sync(args)) => args,
            Some(Command::Status(_)) | None => &self.sync,
        }
    }
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
