//! Unit tests for configuration parsing and validation.

use super::*;
use rstest::rstest;

const BASE: &str = "/work/project";

fn parse(text: &str) -> Result<SyncConfig> {
    SyncConfig::from_toml_str(text, Utf8Path::new(BASE))
}

fn artefact(name: &str, platforms: &str) -> String {
    format!(
        r#"
[[artefact]]
name = "{name}"
repository = "nightconcept/build-sdl"
asset_name = {{ fixed = "SDL3" }}
release = {{ kind = "latest-with-prefix", prefix = "{name}-release-" }}
{platforms}
"#
    )
}

const LINUX: &str = r#"
[artefact.platforms.linux]
file_name = "libSDL3.so.0"
"#;

#[test]
fn defaults_are_applied() {
    let config = parse(&format!("vendor_dir = \"lib/SDL3-Prebuilt\"\n{}", artefact("sdl3-core", LINUX)))
        .expect("valid config");

    assert_eq!(config.vendor_dir, Utf8PathBuf::from("/work/project/lib/SDL3-Prebuilt"));
    assert_eq!(
        config.manifest,
        Utf8PathBuf::from("/work/project/lib/SDL3-Prebuilt/version.txt")
    );
    assert_eq!(config.api_base, GITHUB_API_BASE);
    assert_eq!(config.timeout, Duration::from_secs(30));
    assert_eq!(config.release_attempts, 1);
    assert_eq!(config.scratch_dir, None);
    assert_eq!(config.platform(PlatformKey::Macos).tag, "macos-universal");
}

#[test]
fn platform_overrides_change_tag_and_directory() {
    let text = format!(
        r#"
vendor_dir = "/abs/vendor"
manifest = "state/versions.txt"

[platforms.linux]
tag = "linux-x64"
dir = "linux-x64"
{}"#,
        artefact("sdl3-core", LINUX)
    );
    let config = parse(&text).expect("valid config");
    let spec = &config.artefacts[0].platforms[&PlatformKey::Linux];

    assert_eq!(config.manifest, Utf8PathBuf::from("/work/project/state/versions.txt"));
    assert_eq!(config.release_tag(PlatformKey::Linux, spec), "linux-x64");
    assert_eq!(
        config.destination(PlatformKey::Linux, spec),
        Utf8PathBuf::from("/abs/vendor/linux-x64/libSDL3.so.0")
    );
}

#[test]
fn per_artefact_release_tag_wins_over_platform_default() {
    let platforms = r#"
[artefact.platforms.macos]
file_name = "libSDL3_image.0.dylib"
release_tag = "macos-arm64"
"#;
    let config = parse(&format!("vendor_dir = \"v\"\n{}", artefact("sdl3-image", platforms)))
        .expect("valid config");
    let spec = &config.artefacts[0].platforms[&PlatformKey::Macos];

    assert_eq!(config.release_tag(PlatformKey::Macos, spec), "macos-arm64");
}

#[test]
fn build_metadata_paths_resolve_against_config_dir() {
    let text = r#"
vendor_dir = "v"

[[artefact]]
name = "sdl3-core"
repository = "nightconcept/build-sdl"
asset_name = { fixed = "SDL3" }
release = { kind = "exact-tag", prefix = "sdl3-core-release-", version = { build-metadata = { file = "lib/SDL3-CS.Native.csproj" } } }

[artefact.platforms.windows]
file_name = "SDL3.dll"
"#;
    let config = parse(text).expect("valid config");

    assert_eq!(
        config.artefacts[0].release,
        ReleaseRule::ExactTag {
            prefix: "sdl3-core-release-".to_owned(),
            version: VersionInput::BuildMetadata {
                file: Utf8PathBuf::from("/work/project/lib/SDL3-CS.Native.csproj"),
                key: None,
            },
        }
    );
}

#[rstest]
#[case::duplicate_names(
    format!("vendor_dir = \"v\"\n{}{}", artefact("sdl3-core", LINUX), artefact("sdl3-core", LINUX)),
    "declared twice"
)]
#[case::no_platforms(format!("vendor_dir = \"v\"\n{}", artefact("sdl3-core", "")), "no platforms")]
#[case::unknown_platform(
    format!("vendor_dir = \"v\"\n{}", artefact("sdl3-core", "[artefact.platforms.android]\nfile_name = \"x.so\"\n")),
    "unknown platform"
)]
#[case::bad_pattern(
    format!(
        "vendor_dir = \"v\"\n{}",
        artefact("sdl3-core", "[artefact.platforms.linux]\nfile_name = \"x.so\"\nasset_patterns = [\"{name}-(\"]\n")
    ),
    "invalid asset pattern"
)]
#[case::path_in_file_name(
    format!("vendor_dir = \"v\"\n{}", artefact("sdl3-core", "[artefact.platforms.linux]\nfile_name = \"lib/x.so\"\n")),
    "plain file name"
)]
#[case::zero_attempts(
    format!("vendor_dir = \"v\"\nrelease_attempts = 0\n{}", artefact("sdl3-core", LINUX)),
    "release_attempts"
)]
#[case::bad_name(format!("vendor_dir = \"v\"\n{}", artefact("sdl3 core", LINUX)), "may only contain")]
fn validation_failures_are_reported(#[case] text: String, #[case] expected: &str) {
    let err = parse(&text).expect_err("invalid config");
    assert!(
        matches!(err, SyncError::InvalidConfig { .. }),
        "expected InvalidConfig, got {err:?}"
    );
    assert!(
        err.to_string().contains(expected),
        "{err} should mention {expected}"
    );
}

#[test]
fn per_platform_asset_names_must_cover_every_platform() {
    let text = r#"
vendor_dir = "v"

[[artefact]]
name = "sdl3-mixer"
repository = "nightconcept/build-sdl"
asset_name = { per-platform = { windows = "SDL2_mixer" } }
release = { kind = "latest-stable" }

[artefact.platforms.linux]
file_name = "libSDL3_mixer.so.0"
"#;
    let err = parse(text).expect_err("missing asset name");
    assert!(err.to_string().contains("no asset_name entry for linux"));
}

#[test]
fn unknown_fields_are_parse_errors() {
    let err = parse("vendor_dir = \"v\"\nvendour = 1\n").expect_err("typo");
    assert!(matches!(err, SyncError::ConfigParse { .. }));
}

#[test]
fn load_reports_missing_file() {
    let err = SyncConfig::load(Utf8Path::new("/nonexistent/vendor.toml")).expect_err("missing");
    assert!(matches!(err, SyncError::ConfigRead { .. }));
}

#[test]
fn load_names_the_file_in_parse_errors() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = Utf8PathBuf::from_path_buf(dir.path().join("vendor.toml")).expect("utf8 path");
    std::fs::write(&path, "vendor_dir = ").expect("write config");

    let err = SyncConfig::load(&path).expect_err("parse error");

    match err {
        SyncError::ConfigParse { path: reported, .. } => assert_eq!(reported, path),
        other => panic!("expected ConfigParse, got {other:?}"),
    }
}

fn two_artefacts() -> SyncConfig {
    let windows = "[artefact.platforms.windows]\nfile_name = \"SDL3_ttf.dll\"\n";
    parse(&format!(
        "vendor_dir = \"v\"\n{}{}",
        artefact("sdl3-core", LINUX),
        artefact("sdl3-ttf", windows)
    ))
    .expect("valid config")
}

#[test]
fn retain_filters_artefacts_and_platforms() {
    let mut config = two_artefacts();

    config
        .retain(&[], &[PlatformKey::Windows])
        .expect("filter");

    let names: Vec<_> = config.artefacts.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, vec!["sdl3-ttf"]);
}

#[test]
fn retain_rejects_unknown_artefacts() {
    let mut config = two_artefacts();

    let err = config
        .retain(&["sdl3-net".to_owned()], &[])
        .expect_err("unknown artefact");

    assert!(matches!(err, SyncError::UnknownArtefact { .. }));
    assert_eq!(config.artefacts.len(), 2);
}

#[test]
fn set_vendor_dir_moves_a_default_manifest() {
    let mut config = two_artefacts();

    config.set_vendor_dir(Utf8PathBuf::from("/elsewhere"));

    assert_eq!(config.vendor_dir, Utf8PathBuf::from("/elsewhere"));
    assert_eq!(config.manifest, Utf8PathBuf::from("/elsewhere/version.txt"));
}

#[test]
fn set_vendor_dir_keeps_an_explicit_manifest() {
    let text = format!(
        "vendor_dir = \"v\"\nmanifest = \"state/versions.txt\"\n{}",
        artefact("sdl3-core", LINUX)
    );
    let mut config = parse(&text).expect("valid config");

    config.set_vendor_dir(Utf8PathBuf::from("/elsewhere"));

    assert_eq!(config.manifest, Utf8PathBuf::from("/work/project/state/versions.txt"));
}
