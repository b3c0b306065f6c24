//! Integration tests for `opm remove`.

use crate::common::TestEnv;
use anyhow::Result;
use std::fs;

#[test]
fn test_remove_deletes_library_and_record() -> Result<()> {
    let env = TestEnv::with_standard_catalog()?;
    env.run_opm(&["install", "poly"]).assert_success();

    env.run_opm(&["remove", "poly"])
        .assert_success()
        .assert_stdout_contains("Removed poly 1.0.0");

    assert!(!env.installed_lib("poly").exists());
    assert!(!env.state().contains("poly"));
    Ok(())
}

#[test]
fn test_remove_cleans_up_extra_files() -> Result<()> {
    let env = TestEnv::with_standard_catalog()?;
    env.run_opm(&["install", "else"]).assert_success();

    env.run_opm(&["remove", "else"]).assert_success();

    assert!(!env.installed_lib("else").exists());
    assert!(!env.plugin_dir().join("assets").join("else").exists());
    Ok(())
}

#[test]
fn test_remove_not_installed_fails() -> Result<()> {
    let env = TestEnv::with_standard_catalog()?;

    env.run_opm(&["remove", "poly"])
        .assert_code(2)
        .assert_stderr_contains("is not installed");
    Ok(())
}

#[test]
fn test_remove_tolerates_vanished_library() -> Result<()> {
    let env = TestEnv::with_standard_catalog()?;
    env.run_opm(&["install", "poly"]).assert_success();
    fs::remove_file(env.installed_lib("poly"))?;

    env.run_opm(&["remove", "poly"]).assert_success();
    assert!(!env.state().contains("poly"));
    Ok(())
}

#[test]
fn test_remove_works_without_the_catalog() -> Result<()> {
    let env = TestEnv::with_standard_catalog()?;
    env.run_opm(&["install", "poly"]).assert_success();
    fs::remove_dir_all(env.repo_dir())?;
    fs::remove_file(env.data_dir().join("catalog.json"))?;

    env.run_opm(&["remove", "poly"]).assert_success();
    assert!(!env.installed_lib("poly").exists());
    Ok(())
}

#[test]
fn test_corrupt_state_is_reported_and_kept() -> Result<()> {
    let env = TestEnv::with_standard_catalog()?;
    env.run_opm(&["install", "poly"]).assert_success();
    fs::write(env.state_path(), "this is [not toml")?;

    env.run_opm(&["remove", "poly"])
        .assert_code(2)
        .assert_stderr_contains("unreadable");

    assert_eq!(fs::read_to_string(env.state_path())?, "this is [not toml");
    assert!(env.installed_lib("poly").is_file());
    Ok(())
}
