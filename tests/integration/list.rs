//! Integration tests for `opm list`.

use crate::common::TestEnv;
use anyhow::Result;
use serde_json::{Value, json};

#[test]
fn test_list_shows_status_of_every_plugin() -> Result<()> {
    let env = TestEnv::with_standard_catalog()?;
    env.run_opm(&["install", "poly"]).assert_success();

    let output = env.run_opm(&["list"]);
    output.assert_success();
    let poly = output.stdout.lines().find(|l| l.starts_with("poly")).expect("poly row");
    assert!(poly.contains("installed"), "row: {poly}");
    let other = output.stdout.lines().find(|l| l.starts_with("else")).expect("else row");
    assert!(other.contains("not installed"), "row: {other}");
    Ok(())
}

#[test]
fn test_list_filters() -> Result<()> {
    let env = TestEnv::with_standard_catalog()?;
    env.run_opm(&["install", "poly"]).assert_success();

    let installed = env.run_opm(&["list", "--installed", "--name-only"]);
    installed.assert_success();
    assert_eq!(installed.stdout.lines().collect::<Vec<_>>(), ["poly"]);

    let missing = env.run_opm(&["list", "--not-installed", "--name-only"]);
    missing.assert_success();
    assert_eq!(missing.stdout.lines().collect::<Vec<_>>(), ["else"]);

    let upgradeable = env.run_opm(&["list", "--upgradeable"]);
    upgradeable.assert_success().assert_stdout_contains("No plugins found.");
    Ok(())
}

#[test]
fn test_list_filters_conflict() -> Result<()> {
    let env = TestEnv::with_standard_catalog()?;
    env.command()
        .args(["list", "--installed", "--not-installed"])
        .assert()
        .failure()
        .code(2);
    Ok(())
}

#[test]
fn test_list_json_reports_invalid_and_unavailable_entries() -> Result<()> {
    let env = TestEnv::new()?;
    env.publish_poly_v1()?;
    env.write_catalog(json!({
        "poly": env.poly_entry(false),
        "broken": {"version": "not-a-version", "binaries": []},
        "elsewhere": {"version": "1.0.0", "binaries": [
            {"platform": "linux", "hostVersion": ">=99", "url": "nowhere.so"}
        ]},
    }))?;

    let output = env.run_opm(&["list", "--json"]);
    output.assert_success();
    let rows: Value = serde_json::from_str(&output.stdout)?;
    let status = |name: &str| {
        rows.as_array()
            .and_then(|rows| rows.iter().find(|r| r["name"] == name))
            .map(|r| r["status"].as_str().unwrap_or_default().to_string())
    };
    assert_eq!(status("poly").as_deref(), Some("not-installed"));
    assert_eq!(status("broken").as_deref(), Some("invalid"));
    assert_eq!(status("elsewhere").as_deref(), Some("unavailable"));
    Ok(())
}
