//! Shared helpers for the opm integration suite
//!
//! [`TestEnv`] owns a temporary directory holding a local catalog, the
//! artifacts it points at, a plugin directory and a data directory, and runs
//! the `opm` binary against them with every setting pinned through `OPM_*`
//! environment variables. Nothing touches the network or the user's home.

// Not every helper is used by every test module
#![allow(dead_code)]

use anyhow::{Context, Result};
use opm_cli::platform::PlatformTag;
use opm_cli::test_utils::zip_bytes;
use serde_json::{Value, json};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const POLY_V1: &[u8] = b"ELF poly 1.0.0";
pub const POLY_V2: &[u8] = b"ELF poly 1.1.0";

/// Isolated opm environment around a file-based catalog.
pub struct TestEnv {
    temp: TempDir,
    pub platform: PlatformTag,
}

impl TestEnv {
    pub fn new() -> Result<Self> {
        opm_cli::test_utils::init_test_logging(None);
        let temp = TempDir::new()?;
        let env = Self {
            temp,
            platform: PlatformTag::current()?,
        };
        fs::create_dir_all(env.repo_dir())?;
        fs::create_dir_all(env.plugin_dir())?;
        Ok(env)
    }

    /// Environment whose catalog offers `poly` 1.0.0 and the archived `else`.
    pub fn with_standard_catalog() -> Result<Self> {
        let env = Self::new()?;
        env.publish_poly_v1()?;
        env.publish_else()?;
        env.write_catalog(json!({
            "poly": env.poly_entry(false),
            "else": env.else_entry(),
        }))?;
        Ok(env)
    }

    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    /// Directory holding `catalog.json` and the published artifacts
    pub fn repo_dir(&self) -> PathBuf {
        self.root().join("repo")
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.repo_dir().join("catalog.json")
    }

    /// `file://` URL of the catalog, as users would configure it
    pub fn catalog_url(&self) -> String {
        let path = self.catalog_path().display().to_string().replace('\\', "/");
        if path.starts_with('/') { format!("file://{path}") } else { format!("file:///{path}") }
    }

    pub fn plugin_dir(&self) -> PathBuf {
        self.root().join("plugins")
    }

    pub fn data_dir(&self) -> PathBuf {
        self.root().join("data")
    }

    pub fn state_path(&self) -> PathBuf {
        self.data_dir().join("installed.toml")
    }

    /// `name` with this platform's shared library prefix and extension.
    pub fn lib_name(&self, name: &str) -> String {
        match self.platform {
            PlatformTag::Windows => format!("{name}.dll"),
            other => format!("lib{name}.{}", other.library_extension()),
        }
    }

    pub fn installed_lib(&self, name: &str) -> PathBuf {
        self.plugin_dir().join(self.lib_name(name))
    }

    pub fn publish(&self, relative: &str, content: &[u8]) -> Result<()> {
        let path = self.repo_dir().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, content).with_context(|| format!("writing {}", path.display()))
    }

    pub fn publish_poly_v1(&self) -> Result<()> {
        self.publish(&format!("v1/{}", self.lib_name("poly")), POLY_V1)
    }

    pub fn publish_poly_v2(&self) -> Result<()> {
        self.publish(&format!("v2/{}", self.lib_name("poly")), POLY_V2)
    }

    pub fn publish_else(&self) -> Result<()> {
        let entry = format!("build/{}", self.lib_name("else"));
        let archive = zip_bytes(&[
            (entry.as_str(), b"ELF else".as_slice()),
            ("README.md", b"# else".as_slice()),
        ]);
        self.publish("else.zip", &archive)
    }

    /// `poly` with 1.0.0 and, when `with_v2`, a 1.1.0 for hosts >= 6.14.
    /// Binary URLs are relative to the catalog.
    pub fn poly_entry(&self, with_v2: bool) -> Value {
        let mut versions = vec![json!({
            "version": "1.0.0",
            "opcodes": ["poly", "polyseq"],
            "abstract": "Run multiple instances of an opcode in parallel",
            "binaries": [
                {"platform": self.platform.as_str(), "url": format!("v1/{}", self.lib_name("poly"))}
            ]
        })];
        if with_v2 {
            versions.push(json!({
                "version": "1.1.0",
                "opcodes": ["poly", "polyseq"],
                "abstract": "Run multiple instances of an opcode in parallel",
                "binaries": [{
                    "platform": self.platform.as_str(),
                    "hostVersion": ">=6.14",
                    "url": format!("v2/{}", self.lib_name("poly"))
                }]
            }));
        }
        json!({ "versions": versions })
    }

    pub fn else_entry(&self) -> Value {
        json!({
            "version": "1.18.2",
            "opcodes": ["crackle", "sigmdrift"],
            "abstract": "Miscellaneous plugins",
            "binaries": [{
                "platform": self.platform.as_str(),
                "url": "else.zip",
                "extractPath": format!("build/{}", self.lib_name("else")),
                "extraFiles": ["README.md"]
            }]
        })
    }

    pub fn write_catalog(&self, plugins: Value) -> Result<()> {
        let document = opm_cli::test_utils::catalog_document(plugins);
        fs::write(self.catalog_path(), document)?;
        Ok(())
    }

    /// `opm` with every location and the host version pinned.
    pub fn command(&self) -> assert_cmd::Command {
        let mut cmd = assert_cmd::Command::new(env!("CARGO_BIN_EXE_opm"));
        cmd.current_dir(self.root())
            .env("OPM_CONFIG", self.root().join("config.toml"))
            .env("OPM_CATALOG_URL", self.catalog_url())
            .env("OPM_PLUGIN_DIR", self.plugin_dir())
            .env("OPM_DATA_DIR", self.data_dir())
            .env("OPM_HOST_VERSION", "6.18")
            .env("OPM_NO_PROGRESS", "true")
            .env("NO_COLOR", "1")
            .env_remove("CS_USER_PLUGINDIR")
            .env_remove("RUST_LOG");
        cmd
    }

    pub fn run_opm(&self, args: &[&str]) -> CommandOutput {
        let output = self.command().args(args).output().expect("failed to run opm");
        CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            success: output.status.success(),
            code: output.status.code(),
        }
    }

    pub fn state(&self) -> String {
        fs::read_to_string(self.state_path()).unwrap_or_default()
    }
}

/// Captured result of one `opm` run
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
    pub code: Option<i32>,
}

impl CommandOutput {
    pub fn assert_success(&self) -> &Self {
        assert!(
            self.success,
            "Command failed with code {:?}\nStdout: {}\nStderr: {}",
            self.code, self.stdout, self.stderr
        );
        self
    }

    pub fn assert_code(&self, code: i32) -> &Self {
        assert_eq!(
            self.code,
            Some(code),
            "Unexpected exit code\nStdout: {}\nStderr: {}",
            self.stdout,
            self.stderr
        );
        self
    }

    pub fn assert_stdout_contains(&self, text: &str) -> &Self {
        assert!(
            self.stdout.contains(text),
            "Expected stdout to contain '{text}'\nActual stdout: {}",
            self.stdout
        );
        self
    }

    pub fn assert_stderr_contains(&self, text: &str) -> &Self {
        assert!(
            self.stderr.contains(text),
            "Expected stderr to contain '{text}'\nActual stderr: {}",
            self.stderr
        );
        self
    }
}
