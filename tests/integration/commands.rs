//! Integration tests for show, info, validate, adopt, reset and list-opcodes.

use crate::common::TestEnv;
use anyhow::Result;
use predicates::prelude::*;
use serde_json::{Value, json};
use std::fs;

#[test]
fn test_show_describes_plugin() -> Result<()> {
    let env = TestEnv::with_standard_catalog()?;

    env.run_opm(&["show", "poly"])
        .assert_success()
        .assert_stdout_contains("poly 1.0.0")
        .assert_stdout_contains("polyseq")
        .assert_stdout_contains("Versions:");

    env.run_opm(&["show", "else", "--full"])
        .assert_success()
        .assert_stdout_contains("extractPath: build/")
        .assert_stdout_contains("extraFiles: README.md");
    Ok(())
}

#[test]
fn test_show_json_includes_selection() -> Result<()> {
    let env = TestEnv::with_standard_catalog()?;

    let output = env.run_opm(&["show", "poly", "--json"]);
    output.assert_success();
    let doc: Value = serde_json::from_str(&output.stdout)?;
    assert_eq!(doc["name"], "poly");
    assert_eq!(doc["selected"], "1.0.0");
    assert!(doc["installed"].is_null());
    Ok(())
}

#[test]
fn test_show_unknown_plugin_fails_with_suggestion() -> Result<()> {
    let env = TestEnv::with_standard_catalog()?;

    env.command()
        .args(["show", "polly"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("not found in catalog"))
        .stderr(predicate::str::contains("Did you mean 'poly'?"));
    Ok(())
}

#[test]
fn test_info_reports_paths_without_fetching() -> Result<()> {
    let env = TestEnv::with_standard_catalog()?;

    let output = env.run_opm(&["info", "--json"]);
    output.assert_success();
    let info: Value = serde_json::from_str(&output.stdout)?;
    assert_eq!(info["plugin_dir"], env.plugin_dir().display().to_string());
    assert_eq!(info["host_version"], "6.18.0");
    assert_eq!(info["platform"], env.platform.as_str());
    assert!(info["catalog_updated"].is_null());
    assert!(!env.data_dir().join("catalog.json").exists());
    Ok(())
}

#[test]
fn test_validate_accepts_good_catalog() -> Result<()> {
    let env = TestEnv::with_standard_catalog()?;
    let path = env.catalog_path().display().to_string();

    env.run_opm(&["validate", &path])
        .assert_success()
        .assert_stdout_contains("is valid (2 plugins)");
    Ok(())
}

#[test]
fn test_validate_rejects_bad_entries() -> Result<()> {
    let env = TestEnv::new()?;
    env.write_catalog(json!({
        "good": {"version": "1.0.0", "binaries": [{"platform": "linux", "url": "a.so"}]},
        "bad": {"version": "1.0.0", "binaries": [{"platform": "amiga", "url": "a.so"}]},
    }))?;
    let path = env.catalog_path().display().to_string();

    env.run_opm(&["validate", &path])
        .assert_code(1)
        .assert_stderr_contains("bad")
        .assert_stderr_contains("1 invalid plugin entries");
    Ok(())
}

#[test]
fn test_validate_single_manifest() -> Result<()> {
    let env = TestEnv::new()?;
    let path = env.root().join("beosc.json");
    fs::write(
        &path,
        json!({
            "name": "beosc",
            "version": "1.2.0",
            "binaries": [
                {"platform": "linux", "hostVersion": ">=6.0", "url": "a.so"},
                {"platform": "linux", "hostVersion": ">=6.14", "url": "b.so"}
            ]
        })
        .to_string(),
    )?;

    env.run_opm(&["validate", &path.display().to_string()])
        .assert_success()
        .assert_stdout_contains("overlap")
        .assert_stdout_contains("is valid (1 plugins)");
    Ok(())
}

#[test]
fn test_adopt_requires_a_library_on_disk() -> Result<()> {
    let env = TestEnv::with_standard_catalog()?;

    env.run_opm(&["adopt", "poly"])
        .assert_code(1)
        .assert_stderr_contains("No library of 'poly' found");

    fs::write(env.installed_lib("poly"), b"placed by hand")?;
    env.run_opm(&["adopt", "poly"]).assert_success();
    assert!(env.state().contains("provenance = \"manual\""));

    env.run_opm(&["adopt", "poly"])
        .assert_code(1)
        .assert_stderr_contains("already present");

    let list = env.run_opm(&["list", "--installed"]);
    list.assert_success().assert_stdout_contains("manual");
    Ok(())
}

#[test]
fn test_reset_drops_cache_and_optionally_state() -> Result<()> {
    let env = TestEnv::with_standard_catalog()?;
    env.run_opm(&["install", "poly"]).assert_success();

    env.run_opm(&["reset"])
        .assert_success()
        .assert_stdout_contains("Removed catalog cache");
    assert!(!env.data_dir().join("catalog.json").exists());
    assert!(env.state().contains("poly"));

    env.run_opm(&["reset", "--state"])
        .assert_success()
        .assert_stdout_contains("No catalog cache to remove")
        .assert_stdout_contains("Reset installed state");
    assert!(!env.state().contains("poly"));
    // Libraries stay where they are
    assert!(env.installed_lib("poly").is_file());
    Ok(())
}

#[test]
fn test_list_opcodes_of_installed_plugins() -> Result<()> {
    let env = TestEnv::with_standard_catalog()?;

    env.run_opm(&["list-opcodes"])
        .assert_success()
        .assert_stdout_contains("No opcodes");

    env.run_opm(&["install", "poly", "else"]).assert_success();
    let output = env.run_opm(&["list-opcodes", "--json"]);
    output.assert_success();
    let opcodes: Value = serde_json::from_str(&output.stdout)?;
    assert_eq!(opcodes["polyseq"], "poly");
    assert_eq!(opcodes["crackle"], "else");
    Ok(())
}

#[test]
fn test_config_file_supplies_plugin_dir() -> Result<()> {
    let env = TestEnv::with_standard_catalog()?;
    let custom = env.root().join("from-config");
    fs::write(
        env.root().join("config.toml"),
        format!("plugin_dir = {:?}\n", custom.display().to_string()),
    )?;

    env.command()
        .env_remove("OPM_PLUGIN_DIR")
        .args(["install", "poly"])
        .assert()
        .success();
    assert!(custom.join(env.lib_name("poly")).is_file());
    Ok(())
}

#[test]
fn test_host_plugin_dir_env_is_used_without_other_settings() -> Result<()> {
    let env = TestEnv::with_standard_catalog()?;
    let host_dir = env.root().join("from-host-env");

    env.command()
        .env_remove("OPM_PLUGIN_DIR")
        .env("CS_USER_PLUGINDIR", &host_dir)
        .args(["install", "poly"])
        .assert()
        .success();
    assert!(host_dir.join(env.lib_name("poly")).is_file());
    assert!(!env.installed_lib("poly").exists());

    // The config file still wins
    let custom = env.root().join("from-config");
    fs::write(
        env.root().join("config.toml"),
        format!("plugin_dir = {:?}\n", custom.display().to_string()),
    )?;
    env.command()
        .env_remove("OPM_PLUGIN_DIR")
        .env("CS_USER_PLUGINDIR", &host_dir)
        .args(["install", "else"])
        .assert()
        .success();
    assert!(custom.join(env.lib_name("else")).is_file());
    Ok(())
}

#[test]
fn test_unknown_command_is_a_usage_error() -> Result<()> {
    let env = TestEnv::new()?;
    env.command().arg("frobnicate").assert().failure().code(2);
    Ok(())
}
