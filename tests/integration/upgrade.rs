//! Integration tests for `opm update` followed by `opm upgrade`.

use crate::common::{POLY_V1, POLY_V2, TestEnv};
use anyhow::Result;
use predicates::prelude::*;
use serde_json::json;
use std::fs;

/// Installs poly 1.0.0, then publishes 1.1.0 and refreshes the catalog.
fn env_with_pending_upgrade() -> Result<TestEnv> {
    let env = TestEnv::with_standard_catalog()?;
    env.run_opm(&["install", "poly"]).assert_success();

    env.publish_poly_v2()?;
    env.write_catalog(json!({
        "poly": env.poly_entry(true),
        "else": env.else_entry(),
    }))?;
    env.run_opm(&["update"])
        .assert_success()
        .assert_stdout_contains("Catalog updated: 2 plugins")
        .assert_stdout_contains("Upgrades available for poly");
    Ok(env)
}

#[test]
fn test_upgrade_moves_to_newer_compatible_version() -> Result<()> {
    let env = env_with_pending_upgrade()?;

    env.run_opm(&["upgrade"])
        .assert_success()
        .assert_stdout_contains("Upgraded poly 1.0.0 -> 1.1.0");

    assert_eq!(fs::read(env.installed_lib("poly"))?, POLY_V2);
    assert!(env.state().contains("version = \"1.1.0\""));

    env.run_opm(&["upgrade", "poly"])
        .assert_success()
        .assert_stdout_contains("up to date");
    Ok(())
}

#[test]
fn test_upgrade_respects_host_version() -> Result<()> {
    let env = env_with_pending_upgrade()?;

    env.command()
        .env("OPM_HOST_VERSION", "6.10")
        .arg("upgrade")
        .assert()
        .success()
        .stdout(predicate::str::contains("poly 1.0.0 is up to date"));
    assert_eq!(fs::read(env.installed_lib("poly"))?, POLY_V1);
    Ok(())
}

#[test]
fn test_upgrade_skips_adopted_plugins() -> Result<()> {
    let env = TestEnv::with_standard_catalog()?;
    fs::write(env.installed_lib("poly"), b"placed by hand")?;
    env.run_opm(&["adopt", "poly"])
        .assert_success()
        .assert_stdout_contains("as manually installed");

    env.run_opm(&["upgrade"])
        .assert_success()
        .assert_stdout_contains("Skipping poly");
    assert_eq!(fs::read(env.installed_lib("poly"))?, b"placed by hand");
    Ok(())
}

#[test]
fn test_upgrade_with_nothing_installed() -> Result<()> {
    let env = TestEnv::with_standard_catalog()?;
    env.run_opm(&["upgrade"])
        .assert_success()
        .assert_stdout_contains("No plugins installed.");
    Ok(())
}

#[test]
fn test_update_keeps_cache_when_catalog_disappears() -> Result<()> {
    let env = TestEnv::with_standard_catalog()?;
    env.run_opm(&["update"]).assert_success();
    fs::remove_file(env.catalog_path())?;

    env.run_opm(&["update"])
        .assert_success()
        .assert_stdout_contains("using the cached copy");

    env.run_opm(&["list", "--name-only"])
        .assert_success()
        .assert_stdout_contains("poly");
    Ok(())
}

#[test]
fn test_update_rejects_unsupported_schema() -> Result<()> {
    let env = TestEnv::with_standard_catalog()?;
    env.run_opm(&["update"]).assert_success();
    let cached = fs::read_to_string(env.data_dir().join("catalog.json"))?;

    fs::write(env.catalog_path(), r#"{"schemaVersion": "2", "plugins": {}}"#)?;
    env.run_opm(&["update"])
        .assert_code(1)
        .assert_stderr_contains("schemaVersion");

    assert_eq!(fs::read_to_string(env.data_dir().join("catalog.json"))?, cached);
    Ok(())
}
