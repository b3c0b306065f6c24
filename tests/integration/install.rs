//! Integration tests for `opm install`.

use crate::common::{POLY_V1, TestEnv};
use anyhow::Result;
use std::fs;

#[test]
fn test_install_places_library_and_records_it() -> Result<()> {
    let env = TestEnv::with_standard_catalog()?;

    env.run_opm(&["install", "poly"])
        .assert_success()
        .assert_stdout_contains("Installed poly 1.0.0");

    assert_eq!(fs::read(env.installed_lib("poly"))?, POLY_V1);
    let state = env.state();
    assert!(state.contains("[plugins.poly]"), "state: {state}");
    assert!(state.contains("version = \"1.0.0\""), "state: {state}");
    assert!(state.contains("provenance = \"catalog\""), "state: {state}");

    // The first command fetched and cached the catalog
    assert!(env.data_dir().join("catalog.json").is_file());
    Ok(())
}

#[test]
fn test_second_install_is_a_no_op() -> Result<()> {
    let env = TestEnv::with_standard_catalog()?;
    env.run_opm(&["install", "poly"]).assert_success();

    let before = fs::metadata(env.installed_lib("poly"))?.modified()?;
    env.run_opm(&["install", "poly"])
        .assert_success()
        .assert_stdout_contains("already installed");
    assert_eq!(fs::metadata(env.installed_lib("poly"))?.modified()?, before);
    Ok(())
}

#[test]
fn test_force_reinstalls_same_version() -> Result<()> {
    let env = TestEnv::with_standard_catalog()?;
    env.run_opm(&["install", "poly"]).assert_success();
    fs::write(env.installed_lib("poly"), b"tampered")?;

    env.run_opm(&["install", "--force", "poly"])
        .assert_success()
        .assert_stdout_contains("reinstalled");
    assert_eq!(fs::read(env.installed_lib("poly"))?, POLY_V1);
    Ok(())
}

#[test]
fn test_install_from_archive_places_extra_files() -> Result<()> {
    let env = TestEnv::with_standard_catalog()?;

    env.run_opm(&["install", "else"]).assert_success();

    assert_eq!(fs::read(env.installed_lib("else"))?, b"ELF else");
    let readme = env.plugin_dir().join("assets").join("else").join("README.md");
    assert_eq!(fs::read_to_string(readme)?, "# else");
    Ok(())
}

#[test]
fn test_unmanaged_library_requires_force() -> Result<()> {
    let env = TestEnv::with_standard_catalog()?;
    fs::write(env.installed_lib("poly"), b"placed by hand")?;

    env.run_opm(&["install", "poly"])
        .assert_code(2)
        .assert_stderr_contains("already present");
    assert_eq!(fs::read(env.installed_lib("poly"))?, b"placed by hand");

    env.run_opm(&["install", "-f", "poly"]).assert_success();
    assert_eq!(fs::read(env.installed_lib("poly"))?, POLY_V1);
    Ok(())
}

#[test]
fn test_partial_batch_failure_exits_with_two() -> Result<()> {
    let env = TestEnv::with_standard_catalog()?;

    let output = env.run_opm(&["install", "poly", "nosuch"]);
    output
        .assert_code(2)
        .assert_stdout_contains("Installed poly")
        .assert_stderr_contains("nosuch")
        .assert_stderr_contains("1 of 2 targets failed");

    assert!(env.installed_lib("poly").is_file());
    Ok(())
}

#[test]
fn test_misspelled_name_gets_a_suggestion() -> Result<()> {
    let env = TestEnv::with_standard_catalog()?;

    env.run_opm(&["install", "pol"])
        .assert_code(2)
        .assert_stderr_contains("Did you mean 'poly'?");
    Ok(())
}

#[test]
fn test_glob_installs_every_match() -> Result<()> {
    let env = TestEnv::with_standard_catalog()?;

    env.run_opm(&["install", "*"]).assert_success();

    assert!(env.installed_lib("poly").is_file());
    assert!(env.installed_lib("else").is_file());
    Ok(())
}

#[test]
fn test_missing_artifact_leaves_nothing_behind() -> Result<()> {
    let env = TestEnv::with_standard_catalog()?;
    fs::remove_file(env.repo_dir().join("v1").join(env.lib_name("poly")))?;

    env.run_opm(&["install", "poly"])
        .assert_code(2)
        .assert_stderr_contains("Failed to download");

    assert!(!env.installed_lib("poly").exists());
    assert!(!env.state().contains("poly"));
    let leftovers: Vec<_> = fs::read_dir(env.plugin_dir())?
        .filter_map(Result::ok)
        .filter(|e| e.file_name().to_string_lossy().starts_with(".opm-staging-"))
        .collect();
    assert!(leftovers.is_empty());
    Ok(())
}

#[test]
fn test_unreachable_catalog_without_cache_fails() -> Result<()> {
    let env = TestEnv::new()?;

    env.run_opm(&["install", "poly"])
        .assert_code(1)
        .assert_stderr_contains("Catalog unavailable");
    Ok(())
}

#[test]
fn test_install_requires_a_target() -> Result<()> {
    let env = TestEnv::with_standard_catalog()?;
    env.command()
        .arg("install")
        .assert()
        .failure()
        .stderr(predicates::str::contains("required"));
    Ok(())
}
