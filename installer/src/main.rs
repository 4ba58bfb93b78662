//! night-vendor CLI entrypoint.
//!
//! This binary loads the vendor configuration, syncs every configured
//! artefact into the vendor tree, and prints a summary of what happened.

use clap::Parser;
use log::LevelFilter;
use night_vendor::artefact::download::{HttpDownloader, http_agent};
use night_vendor::artefact::extraction::NativeExtractor;
use night_vendor::artefact::release::GithubReleaseSource;
use night_vendor::cli::{Cli, Command, StatusArgs, SyncArgs};
use night_vendor::error::Result;
use night_vendor::manifest::VersionManifest;
use night_vendor::output::{DryRunPlan, summary_text, write_stderr_line, write_stdout_line};
use night_vendor::pipeline::{SyncOrchestrator, SyncReport};
use night_vendor::status::{collect_status, format_human, format_json};
use std::io::Write;

/// How a run ended, before it is mapped to an exit code.
#[derive(Debug, PartialEq, Eq)]
enum RunOutcome {
    /// Nothing failed.
    Clean,
    /// At least one unit failed.
    UnitFailures,
}

fn main() {
    let cli = Cli::parse();
    init_logging(&cli);
    let mut stdout = std::io::stdout();
    let mut stderr = std::io::stderr();
    let run_result = match &cli.command {
        Some(Command::Status(args)) => run_status(args, &mut stdout),
        Some(Command::Sync(_)) | None => run_sync(cli.sync_args(), &mut stderr),
    };
    let exit_code = exit_code_for_run_result(run_result, &mut stderr);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

fn init_logging(cli: &Cli) {
    let level = match &cli.command {
        Some(Command::Status(_)) => LevelFilter::Warn,
        Some(Command::Sync(_)) | None => {
            let args = cli.sync_args();
            level_for(args.verbosity, args.quiet)
        }
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .init();
}

/// Map `-v`/`-q` to a log level; `RUST_LOG` still wins when set.
fn level_for(verbosity: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::Error;
    }
    match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

fn run_sync(args: &SyncArgs, stderr: &mut dyn Write) -> Result<RunOutcome> {
    let config = args.load_config()?;

    if args.dry_run {
        let loaded = VersionManifest::load(&config.manifest);
        let plan = DryRunPlan {
            config: &config,
            manifest: loaded.manifest(),
            force: args.force,
        };
        write_stderr_line(stderr, plan.display_text());
        return Ok(RunOutcome::Clean);
    }

    let agent = http_agent(config.timeout);
    let source = GithubReleaseSource::new(&config.api_base, agent.clone());
    let downloader = HttpDownloader::new(agent);
    let report = SyncOrchestrator::new(&config, &source, &downloader, &NativeExtractor)
        .force(args.force)
        .run()?;

    if !args.quiet || report.has_failures() {
        write_stderr_line(stderr, summary_text(&report));
    }
    Ok(outcome_of(&report))
}

fn outcome_of(report: &SyncReport) -> RunOutcome {
    if report.has_failures() {
        RunOutcome::UnitFailures
    } else {
        RunOutcome::Clean
    }
}

fn run_status(args: &StatusArgs, stdout: &mut dyn Write) -> Result<RunOutcome> {
    let config = args.paths.load()?;
    let loaded = VersionManifest::load(&config.manifest);
    let statuses = collect_status(&config, loaded.manifest());
    let text = if args.json {
        format_json(&statuses)
    } else {
        format_human(&statuses)
    };
    write_stdout_line(stdout, text.trim_end());
    Ok(RunOutcome::Clean)
}

fn exit_code_for_run_result(result: Result<RunOutcome>, stderr: &mut dyn Write) -> i32 {
    match result {
        Ok(RunOutcome::Clean) => 0,
        Ok(RunOutcome::UnitFailures) => 2,
        Err(err) => {
            write_stderr_line(stderr, format!("error: {err}"));
            1
        }
    }
}
