//! Integration tests for `opm download`.

use crate::common::{POLY_V1, TestEnv};
use anyhow::Result;
use opm_cli::platform::PlatformTag;
use serde_json::json;
use std::fs;

#[test]
fn test_download_writes_library_without_recording_it() -> Result<()> {
    let env = TestEnv::with_standard_catalog()?;
    let out = env.root().join("out");
    fs::create_dir_all(&out)?;
    let out_arg = out.display().to_string();

    env.run_opm(&["download", "poly", "--path", &out_arg])
        .assert_success()
        .assert_stdout_contains("Downloaded poly");

    assert_eq!(fs::read(out.join(env.lib_name("poly")))?, POLY_V1);
    assert!(!env.installed_lib("poly").exists());
    assert!(!env.state().contains("poly"));

    env.run_opm(&["download", "poly", "--path", &out_arg])
        .assert_code(1)
        .assert_stderr_contains("Destination already exists");
    Ok(())
}

#[test]
fn test_download_extracts_archived_library() -> Result<()> {
    let env = TestEnv::with_standard_catalog()?;

    env.run_opm(&["download", "else"]).assert_success();

    assert_eq!(fs::read(env.root().join(env.lib_name("else")))?, b"ELF else");
    assert!(!env.root().join("README.md").exists());
    Ok(())
}

#[test]
fn test_download_for_another_platform() -> Result<()> {
    let env = TestEnv::new()?;
    env.publish("win/poly.dll", b"MZ poly")?;
    env.write_catalog(json!({
        "poly": {"version": "1.0.0", "binaries": [
            {"platform": "windows", "url": "win/poly.dll"}
        ]}
    }))?;

    env.run_opm(&["download", "poly", "--platform", "windows"]).assert_success();
    assert_eq!(fs::read(env.root().join("poly.dll"))?, b"MZ poly");
    Ok(())
}

#[test]
fn test_download_without_matching_build_fails() -> Result<()> {
    let env = TestEnv::with_standard_catalog()?;
    let other = if env.platform == PlatformTag::Windows { "linux" } else { "windows" };

    env.run_opm(&["download", "poly", "--platform", other])
        .assert_code(1)
        .assert_stderr_contains("has no binary for");
    Ok(())
}
