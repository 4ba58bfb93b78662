//! Unit tests for sync orchestration.
//!
//! The release and download seams are stubbed; extraction runs for real
//! against in-memory archives so the locator and stager see real files.

use super::*;
use crate::artefact::extraction::{MockArchiveExtractor, NativeExtractor};
use crate::artefact::release::MockReleaseSource;
use crate::test_utils::{StubDownloader, StubReleaseSource, asset_url, release, tar_gz_archive, zip_archive};
use rstest::{fixture, rstest};
use tempfile::TempDir;

const REPO: &str = "nightconcept/build-sdl";
const TAG: &str = "release-3.2.0";
const LINUX_ASSET: &str = "SDL3-3.2.0-linux-x64.tar.gz";
const WINDOWS_ASSET: &str = "SDL3-3.2.0-win32-x64.zip";

const CORE: &str = r#"
[[artefact]]
name = "sdl3-core"
repository = "nightconcept/build-sdl"
asset_name = { fixed = "SDL3" }
release = { kind = "latest-stable" }

[artefact.platforms.windows]
file_name = "SDL3.dll"

[artefact.platforms.linux]
asset_patterns = ['SDL3-\d+\.\d+\.\d+-linux-x64\.tar\.gz']
file_name = "libSDL3.so.0"
archive_paths = ["lib/*/libSDL3.so.0"]
"#;

const TTF: &str = r#"
[[artefact]]
name = "sdl3-ttf"
repository = "nightconcept/build-sdl-ttf"
asset_name = { fixed = "SDL3_ttf" }
release = { kind = "latest-stable" }

[artefact.platforms.windows]
file_name = "SDL3_ttf.dll"
"#;

struct Workspace {
    _dir: TempDir,
    config: SyncConfig,
}

impl Workspace {
    fn new(artefacts: &str) -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf8 path");
        let text = format!(
            "vendor_dir = \"vendor\"\nretry_delay_secs = 0\nscratch_dir = \"scratch\"\n{artefacts}"
        );
        let config = SyncConfig::from_toml_str(&text, &root).expect("valid config");
        Self { _dir: dir, config }
    }

    fn path(&self, relative: &str) -> Utf8PathBuf {
        self.config.vendor_dir.join(relative)
    }
}

#[fixture]
fn core() -> Workspace {
    Workspace::new(CORE)
}

fn core_release() -> ReleaseInfo {
    release(TAG, &[WINDOWS_ASSET, LINUX_ASSET, "SDL3-3.2.0.tar.gz"])
}

fn core_downloads() -> StubDownloader {
    StubDownloader::new()
        .with(
            asset_url(TAG, WINDOWS_ASSET),
            zip_archive(&[("SDL3.dll", b"windows dll")]),
        )
        .with(
            asset_url(TAG, LINUX_ASSET),
            tar_gz_archive(&[
                ("SDL3-3.2.0/include/SDL3/SDL.h", b"header"),
                ("lib/x86_64-linux-gnu/libSDL3.so.0", b"linux so"),
            ]),
        )
}

fn outcome<'a>(report: &'a SyncReport, artefact: &str, platform: PlatformKey) -> &'a UnitOutcome {
    &report
        .units
        .iter()
        .find(|u| u.artefact == artefact && u.platform == platform)
        .expect("unit present")
        .outcome
}

#[rstest]
fn installs_every_platform_and_records_the_tag(core: Workspace) {
    let source = StubReleaseSource::new().with(REPO, Ok(core_release()));
    let downloader = core_downloads();

    let report = SyncOrchestrator::new(&core.config, &source, &downloader, &NativeExtractor)
        .run()
        .expect("run succeeds");

    assert_eq!(report.total(), 2);
    assert_eq!(report.succeeded(), 2);
    assert!(!report.has_failures());
    assert_eq!(
        std::fs::read(core.path("linux/libSDL3.so.0")).expect("installed"),
        b"linux so"
    );
    assert_eq!(
        std::fs::read(core.path("windows/SDL3.dll")).expect("installed"),
        b"windows dll"
    );
    assert!(matches!(
        outcome(&report, "sdl3-core", PlatformKey::Linux),
        UnitOutcome::Installed {
            strategy: LocateStrategy::Candidate,
            ..
        }
    ));
    assert_eq!(
        std::fs::read_to_string(&core.config.manifest).expect("manifest"),
        "sdl3-core=release-3.2.0\n\
         sdl3-core@linux=release-3.2.0\n\
         sdl3-core@windows=release-3.2.0\n"
    );
    assert_eq!(source.calls().len(), 1, "release fetched once per artefact");
}

#[rstest]
fn second_run_is_up_to_date_without_downloads(core: Workspace) {
    let first = StubReleaseSource::new().with(REPO, Ok(core_release()));
    SyncOrchestrator::new(&core.config, &first, &core_downloads(), &NativeExtractor)
        .run()
        .expect("first run");
    let manifest_before = std::fs::read(&core.config.manifest).expect("manifest");

    let second = StubReleaseSource::new().with(REPO, Ok(core_release()));
    let downloader = StubDownloader::new();
    let report = SyncOrchestrator::new(&core.config, &second, &downloader, &NativeExtractor)
        .run()
        .expect("second run");

    assert!(
        report
            .units
            .iter()
            .all(|u| matches!(u.outcome, UnitOutcome::UpToDate { .. }))
    );
    assert!(downloader.requested().is_empty());
    assert_eq!(
        std::fs::read(&core.config.manifest).expect("manifest"),
        manifest_before
    );
}

#[rstest]
fn force_reinstalls_current_files(core: Workspace) {
    let first = StubReleaseSource::new().with(REPO, Ok(core_release()));
    SyncOrchestrator::new(&core.config, &first, &core_downloads(), &NativeExtractor)
        .run()
        .expect("first run");

    let second = StubReleaseSource::new().with(REPO, Ok(core_release()));
    let downloader = core_downloads();
    let report = SyncOrchestrator::new(&core.config, &second, &downloader, &NativeExtractor)
        .force(true)
        .run()
        .expect("forced run");

    assert_eq!(downloader.requested().len(), 2);
    assert!(
        report
            .units
            .iter()
            .all(|u| matches!(u.outcome, UnitOutcome::Installed { .. }))
    );
}

#[test]
fn one_failing_artefact_does_not_stop_the_others() {
    let ws = Workspace::new(&format!("{CORE}{TTF}"));
    let source = StubReleaseSource::new()
        .with(REPO, Ok(core_release()))
        .with(
            "nightconcept/build-sdl-ttf",
            Ok(release("release-3.2.2", &["SDL3_ttf-3.2.2-linux-x86_64.zip"])),
        );

    let report = SyncOrchestrator::new(&ws.config, &source, &core_downloads(), &NativeExtractor)
        .run()
        .expect("run succeeds");

    assert_eq!(report.succeeded(), 2);
    let failures: Vec<_> = report.failures().collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].artefact, "sdl3-ttf");
    assert!(matches!(
        &failures[0].outcome,
        UnitOutcome::Failed {
            stage: UnitState::ReleaseResolved,
            kind: "NoMatchingAsset",
            ..
        }
    ));
    let manifest = std::fs::read_to_string(&ws.config.manifest).expect("manifest");
    assert_eq!(
        manifest,
        "sdl3-core=release-3.2.0\n\
         sdl3-core@linux=release-3.2.0\n\
         sdl3-core@windows=release-3.2.0\n"
    );
}

#[test]
fn failed_release_lookup_only_fails_that_artefact() {
    let ws = Workspace::new(&format!("{CORE}{TTF}"));
    let source = StubReleaseSource::new()
        .with(REPO, Ok(core_release()))
        .with(
            "nightconcept/build-sdl-ttf",
            Err(UnitError::Transport {
                url: "https://api.github.com/repos/nightconcept/build-sdl-ttf/releases".to_owned(),
                reason: "HTTP status 404".to_owned(),
                retryable: false,
            }),
        );

    let report = SyncOrchestrator::new(&ws.config, &source, &core_downloads(), &NativeExtractor)
        .run()
        .expect("run succeeds");

    let failures: Vec<_> = report
        .failures()
        .map(|u| (u.artefact.as_str(), u.platform))
        .collect();
    assert_eq!(failures, vec![("sdl3-ttf", PlatformKey::Windows)]);
    assert!(report.failures().all(|u| matches!(
        u.outcome,
        UnitOutcome::Failed {
            stage: UnitState::Pending,
            kind: "TransportError",
            ..
        }
    )));
    assert!(
        report
            .units
            .iter()
            .filter(|u| u.artefact == "sdl3-core")
            .all(|u| matches!(u.outcome, UnitOutcome::Installed { .. }))
    );
    let manifest = std::fs::read_to_string(&ws.config.manifest).expect("manifest");
    assert!(manifest.lines().all(|line| line.starts_with("sdl3-core")));
    assert!(manifest.contains("sdl3-core=release-3.2.0\n"));
}

#[rstest]
fn platform_that_failed_on_a_new_release_is_retried_next_run(core: Workspace) {
    std::fs::create_dir_all(core.path("windows")).expect("windows dir");
    std::fs::create_dir_all(core.path("linux")).expect("linux dir");
    std::fs::write(core.path("windows/SDL3.dll"), b"old windows dll").expect("old dll");
    std::fs::write(core.path("linux/libSDL3.so.0"), b"old linux so").expect("old so");
    std::fs::write(
        &core.config.manifest,
        "sdl3-core=release-3.1.0\n\
         sdl3-core@linux=release-3.1.0\n\
         sdl3-core@windows=release-3.1.0\n",
    )
    .expect("seed manifest");

    let linux_only = StubDownloader::new().with(
        asset_url(TAG, LINUX_ASSET),
        tar_gz_archive(&[("lib/x86_64-linux-gnu/libSDL3.so.0", b"linux so")]),
    );
    let first = StubReleaseSource::new().with(REPO, Ok(core_release()));
    let report = SyncOrchestrator::new(&core.config, &first, &linux_only, &NativeExtractor)
        .run()
        .expect("first run");
    assert!(matches!(
        outcome(&report, "sdl3-core", PlatformKey::Windows),
        UnitOutcome::Failed {
            kind: "TransportError",
            ..
        }
    ));
    assert_eq!(
        std::fs::read_to_string(&core.config.manifest).expect("manifest"),
        "sdl3-core=release-3.2.0\n\
         sdl3-core@linux=release-3.2.0\n\
         sdl3-core@windows=release-3.1.0\n"
    );

    let second = StubReleaseSource::new().with(REPO, Ok(core_release()));
    let downloader = core_downloads();
    let report = SyncOrchestrator::new(&core.config, &second, &downloader, &NativeExtractor)
        .run()
        .expect("second run");

    assert!(matches!(
        outcome(&report, "sdl3-core", PlatformKey::Windows),
        UnitOutcome::Installed { .. }
    ));
    assert!(matches!(
        outcome(&report, "sdl3-core", PlatformKey::Linux),
        UnitOutcome::UpToDate { .. }
    ));
    assert_eq!(downloader.requested(), vec![asset_url(TAG, WINDOWS_ASSET)]);
    assert_eq!(
        std::fs::read(core.path("windows/SDL3.dll")).expect("installed"),
        b"windows dll"
    );
}

#[rstest]
fn artefact_level_entry_alone_does_not_make_a_platform_current(core: Workspace) {
    std::fs::create_dir_all(core.path("windows")).expect("windows dir");
    std::fs::write(core.path("windows/SDL3.dll"), b"old windows dll").expect("old dll");
    std::fs::write(&core.config.manifest, "sdl3-core=release-3.2.0\n").expect("seed manifest");
    let source = StubReleaseSource::new().with(REPO, Ok(core_release()));

    let report = SyncOrchestrator::new(&core.config, &source, &core_downloads(), &NativeExtractor)
        .run()
        .expect("run succeeds");

    assert!(matches!(
        outcome(&report, "sdl3-core", PlatformKey::Windows),
        UnitOutcome::Installed { .. }
    ));
}

#[test]
fn failed_artefact_keeps_its_previous_manifest_entry() {
    let ws = Workspace::new(TTF);
    std::fs::create_dir_all(&ws.config.vendor_dir).expect("vendor dir");
    std::fs::write(&ws.config.manifest, "sdl3-ttf=release-3.2.0\n").expect("seed manifest");
    let source = StubReleaseSource::new();

    let report = SyncOrchestrator::new(&ws.config, &source, &StubDownloader::new(), &NativeExtractor)
        .run()
        .expect("run succeeds");

    assert!(matches!(
        outcome(&report, "sdl3-ttf", PlatformKey::Windows),
        UnitOutcome::Failed {
            stage: UnitState::Pending,
            kind: "NoMatchingRelease",
            ..
        }
    ));
    assert_eq!(
        std::fs::read_to_string(&ws.config.manifest).expect("manifest"),
        "sdl3-ttf=release-3.2.0\n"
    );
}

#[rstest]
fn file_missing_from_asset_fails_at_extracted(core: Workspace) {
    let source = StubReleaseSource::new().with(REPO, Ok(core_release()));
    let downloader = StubDownloader::new()
        .with(
            asset_url(TAG, WINDOWS_ASSET),
            zip_archive(&[("README.txt", b"nothing here")]),
        )
        .with(
            asset_url(TAG, LINUX_ASSET),
            tar_gz_archive(&[("README.txt", b"readme"), ("lib/libSDL3.so.0", b"linux so")]),
        );

    let report = SyncOrchestrator::new(&core.config, &source, &downloader, &NativeExtractor)
        .run()
        .expect("run succeeds");

    assert!(matches!(
        outcome(&report, "sdl3-core", PlatformKey::Windows),
        UnitOutcome::Failed {
            stage: UnitState::Extracted,
            kind: "FileNotLocated",
            ..
        }
    ));
    assert!(matches!(
        outcome(&report, "sdl3-core", PlatformKey::Linux),
        UnitOutcome::Installed {
            strategy: LocateStrategy::ConventionalDir,
            ..
        }
    ));
}

#[test]
fn disk_images_need_a_manual_step() {
    let ws = Workspace::new(
        r#"
[[artefact]]
name = "sdl3-core"
repository = "nightconcept/build-sdl"
asset_name = { fixed = "SDL3" }
release = { kind = "latest-stable" }

[artefact.platforms.macos]
asset_patterns = ['{name}-{version}\.dmg']
file_name = "SDL3.framework"
"#,
    );
    let source = StubReleaseSource::new().with(REPO, Ok(release(TAG, &["SDL3-3.2.0.dmg"])));
    let downloader =
        StubDownloader::new().with(asset_url(TAG, "SDL3-3.2.0.dmg"), b"disk image".to_vec());
    let extractor = MockArchiveExtractor::new();

    let report = SyncOrchestrator::new(&ws.config, &source, &downloader, &extractor)
        .run()
        .expect("run succeeds");

    let manual: Vec<_> = report.manual_steps().collect();
    assert_eq!(manual.len(), 1);
    assert_eq!(
        manual[0].outcome,
        UnitOutcome::ManualStepRequired {
            tag: TAG.to_owned(),
            saved_to: ws.path("macos/SDL3-3.2.0.dmg"),
        }
    );
    assert!(!report.has_failures());
    assert!(report.recorded.is_empty());
}

#[test]
fn retryable_release_failures_are_retried() {
    let mut ws = Workspace::new(TTF);
    ws.config.release_attempts = 3;
    let mut source = MockReleaseSource::new();
    let mut seq = mockall::Sequence::new();
    source
        .expect_fetch()
        .times(2)
        .in_sequence(&mut seq)
        .returning(|_, _| {
            Err(UnitError::Transport {
                url: "https://api.github.com/repos/x/y/releases".to_owned(),
                reason: "HTTP status 503".to_owned(),
                retryable: true,
            })
        });
    source
        .expect_fetch()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(release("release-3.2.2", &["SDL3_ttf-3.2.2-win32-x64.zip"])));
    let downloader = StubDownloader::new().with(
        asset_url("release-3.2.2", "SDL3_ttf-3.2.2-win32-x64.zip"),
        zip_archive(&[("SDL3_ttf.dll", b"ttf")]),
    );

    let report = SyncOrchestrator::new(&ws.config, &source, &downloader, &NativeExtractor)
        .run()
        .expect("run succeeds");

    assert_eq!(report.succeeded(), 1);
    assert_eq!(report.recorded, vec![("sdl3-ttf".to_owned(), "release-3.2.2".to_owned())]);
}

#[test]
fn retries_stop_after_the_configured_attempts() {
    let mut ws = Workspace::new(TTF);
    ws.config.release_attempts = 2;
    let mut source = MockReleaseSource::new();
    source.expect_fetch().times(2).returning(|_, _| {
        Err(UnitError::Transport {
            url: "https://api.github.com/repos/x/y/releases".to_owned(),
            reason: "HTTP status 429".to_owned(),
            retryable: true,
        })
    });

    let report = SyncOrchestrator::new(&ws.config, &source, &StubDownloader::new(), &NativeExtractor)
        .run()
        .expect("run succeeds");

    assert!(matches!(
        outcome(&report, "sdl3-ttf", PlatformKey::Windows),
        UnitOutcome::Failed {
            kind: "TransportError",
            ..
        }
    ));
}

#[test]
fn corrupt_manifest_is_reported_and_rewritten() {
    let ws = Workspace::new(TTF);
    std::fs::create_dir_all(&ws.config.vendor_dir).expect("vendor dir");
    std::fs::write(&ws.config.manifest, "not a manifest line\n").expect("seed manifest");
    let source = StubReleaseSource::new();

    let report = SyncOrchestrator::new(&ws.config, &source, &StubDownloader::new(), &NativeExtractor)
        .run()
        .expect("run succeeds");

    assert!(report.manifest_recovered);
    assert_eq!(
        std::fs::read_to_string(&ws.config.manifest).expect("manifest"),
        ""
    );
}

#[test]
fn sync_into_leaves_the_manifest_file_alone() {
    let ws = Workspace::new(TTF);
    let source = StubReleaseSource::new().with(
        "nightconcept/build-sdl-ttf",
        Ok(release("release-3.2.2", &["SDL3_ttf-3.2.2-win32-x64.zip"])),
    );
    let downloader = StubDownloader::new().with(
        asset_url("release-3.2.2", "SDL3_ttf-3.2.2-win32-x64.zip"),
        zip_archive(&[("SDL3_ttf.dll", b"ttf")]),
    );
    let mut manifest = VersionManifest::default();

    SyncOrchestrator::new(&ws.config, &source, &downloader, &NativeExtractor)
        .sync_into(&mut manifest);

    assert_eq!(manifest.version("sdl3-ttf"), Some("release-3.2.2"));
    assert_eq!(
        manifest.platform_version("sdl3-ttf", PlatformKey::Windows),
        Some("release-3.2.2")
    );
    assert!(!ws.config.manifest.exists());
}

#[rstest]
#[case::latest(ReleaseRule::LatestStable { reject: vec![] }, ReleaseSelector::LatestStable { reject: vec![] })]
#[case::prefixed(
    ReleaseRule::LatestWithPrefix { prefix: "sdl3-ttf-".to_owned() },
    ReleaseSelector::LatestWithPrefix { prefix: "sdl3-ttf-".to_owned() }
)]
#[case::fixed(
    ReleaseRule::ExactTag {
        prefix: "release-".to_owned(),
        version: VersionInput::Fixed(" 3.2.0 ".to_owned()),
    },
    ReleaseSelector::ExactTag { prefix: "release-".to_owned(), version: "3.2.0".to_owned() }
)]
fn selector_for_maps_rules(#[case] rule: ReleaseRule, #[case] expected: ReleaseSelector) {
    assert_eq!(selector_for(&rule).expect("selector"), expected);
}

#[test]
fn unreadable_build_metadata_fails_every_platform() {
    let ws = Workspace::new(
        r#"
[[artefact]]
name = "sdl3-core"
repository = "nightconcept/build-sdl"
asset_name = { fixed = "SDL3" }
release = { kind = "exact-tag", prefix = "release-", version = { build-metadata = { file = "missing.csproj" } } }

[artefact.platforms.windows]
file_name = "SDL3.dll"

[artefact.platforms.linux]
file_name = "libSDL3.so.0"
"#,
    );
    let mut source = MockReleaseSource::new();
    source.expect_fetch().never();

    let report = SyncOrchestrator::new(&ws.config, &source, &StubDownloader::new(), &NativeExtractor)
        .run()
        .expect("run succeeds");

    assert_eq!(report.failures().count(), 2);
    assert!(report.failures().all(|u| matches!(
        u.outcome,
        UnitOutcome::Failed {
            kind: "VersionUnavailable",
            ..
        }
    )));
}
