//! Platform and host-runtime detection
//!
//! This module answers two questions about the machine opm runs on:
//!
//! - which [`PlatformTag`] catalog binaries must carry to be installable here
//! - which [`HostVersion`] of the host runtime is installed, if any
//!
//! The raw facts come from external probes (`std::env::consts` and the host
//! binary's `--version` output). This module only maps them onto the typed
//! values used by the matcher, so the mapping functions are pure and tested
//! directly.
//!
//! # Examples
//!
//! ```rust,no_run
//! use opm_cli::platform::{CommandProbe, Environment};
//!
//! # fn example() -> anyhow::Result<()> {
//! let env = Environment::detect(&CommandProbe::new("csound"), None)?;
//! println!("{} / host {}", env.platform, env.host_label());
//! # Ok(())
//! # }
//! ```

use crate::constants::{FALLBACK_HOST_MAJOR, HOST_PLUGIN_DIR_ENV};
use crate::core::OpmError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;
use std::process::Command;
use std::str::FromStr;
use std::sync::LazyLock;
use tracing::{debug, warn};

/// Operating system and CPU architecture a binary is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PlatformTag {
    /// Linux on x86_64
    Linux,
    /// Linux on aarch64
    LinuxArm64,
    /// macOS on x86_64
    Macos,
    /// macOS on Apple silicon
    MacosArm64,
    /// Windows on x86_64
    Windows,
}

impl PlatformTag {
    /// Every supported tag, in display order.
    pub const ALL: [Self; 5] =
        [Self::Linux, Self::LinuxArm64, Self::Macos, Self::MacosArm64, Self::Windows];

    /// Canonical tag string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Linux => "linux",
            Self::LinuxArm64 => "linux-arm64",
            Self::Macos => "macos",
            Self::MacosArm64 => "macos-arm64",
            Self::Windows => "windows",
        }
    }

    /// Maps raw OS and architecture probe strings onto a tag.
    ///
    /// Accepts the spellings produced by `std::env::consts` as well as the
    /// common `uname` ones (`darwin`, `amd64`, `arm64`).
    ///
    /// # Errors
    ///
    /// [`OpmError::UnsupportedPlatform`] for any other combination, including
    /// Windows on ARM which has no published builds.
    pub fn from_os_arch(os: &str, arch: &str) -> Result<Self, OpmError> {
        let os_norm = os.trim().to_ascii_lowercase();
        let arch_norm = arch.trim().to_ascii_lowercase();
        let x86 = matches!(arch_norm.as_str(), "x86_64" | "amd64" | "x64");
        let arm = matches!(arch_norm.as_str(), "aarch64" | "arm64");

        match os_norm.as_str() {
            "linux" if x86 => Ok(Self::Linux),
            "linux" if arm => Ok(Self::LinuxArm64),
            "macos" | "darwin" if x86 => Ok(Self::Macos),
            "macos" | "darwin" if arm => Ok(Self::MacosArm64),
            "windows" | "win32" if x86 => Ok(Self::Windows),
            _ => Err(OpmError::UnsupportedPlatform {
                os: os.to_string(),
                arch: arch.to_string(),
            }),
        }
    }

    /// The platform of the running process.
    pub fn current() -> Result<Self, OpmError> {
        Self::from_os_arch(std::env::consts::OS, std::env::consts::ARCH)
    }

    /// File extension of shared libraries on this platform, without the dot.
    #[must_use]
    pub const fn library_extension(self) -> &'static str {
        match self {
            Self::Linux | Self::LinuxArm64 => "so",
            Self::Macos | Self::MacosArm64 => "dylib",
            Self::Windows => "dll",
        }
    }
}

impl fmt::Display for PlatformTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlatformTag {
    type Err = OpmError;

    /// Parses a canonical tag or one of the explicit-architecture aliases
    /// (`linux-x86_64`, `macos-x86_64`, `windows-x86_64`, `*-aarch64`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "linux" | "linux-x86_64" => Ok(Self::Linux),
            "linux-arm64" | "linux-aarch64" => Ok(Self::LinuxArm64),
            "macos" | "macos-x86_64" | "darwin" => Ok(Self::Macos),
            "macos-arm64" | "macos-aarch64" => Ok(Self::MacosArm64),
            "windows" | "windows-x86_64" | "win32" => Ok(Self::Windows),
            other => Err(OpmError::UnsupportedPlatform {
                os: other.to_string(),
                arch: "unknown".to_string(),
            }),
        }
    }
}

impl TryFrom<String> for PlatformTag {
    type Error = OpmError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PlatformTag> for String {
    fn from(tag: PlatformTag) -> Self {
        tag.as_str().to_string()
    }
}

/// Version of the host runtime, ordered lexicographically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HostVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

static PROBE_VERSION_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)version\s+(\d+)\.(\d+)(?:\.(\d+))?").ok());

impl HostVersion {
    #[must_use]
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self { major, minor, patch }
    }

    /// Parses `major[.minor[.patch]]`; missing components default to zero.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        let mut parts = text.split('.');
        let major = parts.next()?.trim().parse().ok()?;
        let minor = match parts.next() {
            Some(p) => p.trim().parse().ok()?,
            None => 0,
        };
        let patch = match parts.next() {
            Some(p) => p.trim().parse().ok()?,
            None => 0,
        };
        if parts.next().is_some() {
            return None;
        }
        Some(Self::new(major, minor, patch))
    }

    /// Extracts the version from the host's `--version` banner.
    ///
    /// The banner looks like `--Csound version 6.18 (double samples) ...`;
    /// the first `version X.Y[.Z]` occurrence wins.
    #[must_use]
    pub fn from_probe_output(output: &str) -> Option<Self> {
        let re = PROBE_VERSION_RE.as_ref()?;
        let caps = re.captures(output)?;
        let num = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u64>().ok());
        Some(Self::new(num(1)?, num(2)?, num(3).unwrap_or(0)))
    }
}

impl fmt::Display for HostVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for HostVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("invalid host version '{s}', expected MAJOR[.MINOR[.PATCH]]"))
    }
}

/// Source of the host runtime's version banner.
pub trait HostProbe {
    /// Raw text printed by the host when asked for its version.
    fn version_output(&self) -> Result<String, OpmError>;
}

/// Probes the host by running `<binary> --version`.
#[derive(Debug, Clone)]
pub struct CommandProbe {
    binary: String,
}

impl CommandProbe {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl HostProbe for CommandProbe {
    fn version_output(&self) -> Result<String, OpmError> {
        let path = which::which(&self.binary).map_err(|e| OpmError::HostNotFound {
            reason: format!("'{}' not found in PATH: {e}", self.binary),
        })?;
        debug!("Probing host version with {}", path.display());

        let output = Command::new(&path).arg("--version").output().map_err(|e| {
            OpmError::HostNotFound {
                reason: format!("failed to run {}: {e}", path.display()),
            }
        })?;

        // csound prints its banner on stderr
        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));
        Ok(text)
    }
}

/// Reads the host version through `probe`.
///
/// # Errors
///
/// [`OpmError::HostNotFound`] when the probe fails or prints no version.
pub fn current_host_version(probe: &dyn HostProbe) -> Result<HostVersion, OpmError> {
    let output = probe.version_output()?;
    HostVersion::from_probe_output(&output).ok_or_else(|| OpmError::HostNotFound {
        reason: "could not parse a version from the host's --version output".to_string(),
    })
}

/// Environment facts consumed by resolution, captured once per command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Environment {
    pub platform: PlatformTag,
    /// `None` when the host could not be probed.
    pub host_version: Option<HostVersion>,
}

impl Environment {
    #[must_use]
    pub const fn new(platform: PlatformTag, host_version: Option<HostVersion>) -> Self {
        Self {
            platform,
            host_version,
        }
    }

    /// Detects the current platform and host version.
    ///
    /// `host_override` bypasses the probe. A failing probe is logged and
    /// leaves the host version unknown; only an unsupported platform is fatal.
    pub fn detect(
        probe: &dyn HostProbe,
        host_override: Option<HostVersion>,
    ) -> Result<Self, OpmError> {
        let platform = PlatformTag::current()?;
        let host_version = match host_override {
            Some(v) => Some(v),
            None => match current_host_version(probe) {
                Ok(v) => Some(v),
                Err(e) => {
                    warn!("{e}; only plugins without a host version range can be resolved");
                    None
                }
            },
        };
        debug!("Environment: platform={platform}, host={host_version:?}");
        Ok(Self::new(platform, host_version))
    }

    /// Host version for display, `unknown` when not detected.
    #[must_use]
    pub fn host_label(&self) -> String {
        self.host_version.map_or_else(|| "unknown".to_string(), |v| v.to_string())
    }
}

/// Plugin directory named by the host's own `CS_USER_PLUGINDIR`, if set.
#[must_use]
pub fn host_plugin_dir() -> Option<PathBuf> {
    plugin_dir_from_env(std::env::var_os(HOST_PLUGIN_DIR_ENV))
}

fn plugin_dir_from_env(value: Option<OsString>) -> Option<PathBuf> {
    value.filter(|v| !v.is_empty()).map(PathBuf::from)
}

/// Default user plugin directory the host searches for this platform.
///
/// The directory is keyed by the host's major version only
/// (`<major>.0`); an unknown host falls back to major 6.
pub fn default_plugin_dir(
    platform: PlatformTag,
    host_version: Option<HostVersion>,
) -> Result<PathBuf, OpmError> {
    let major = host_version.map_or(FALLBACK_HOST_MAJOR, |v| v.major);
    let versioned = format!("{major}.0");
    let missing = |what: &str| OpmError::ConfigError {
        message: format!("Unable to determine {what} directory; set OPM_PLUGIN_DIR"),
    };

    let dir = match platform {
        PlatformTag::Linux | PlatformTag::LinuxArm64 => dirs::home_dir()
            .ok_or_else(|| missing("home"))?
            .join(".local/lib/csound")
            .join(versioned)
            .join("plugins64"),
        PlatformTag::Macos | PlatformTag::MacosArm64 => dirs::home_dir()
            .ok_or_else(|| missing("home"))?
            .join("Library/csound")
            .join(versioned)
            .join("plugins64"),
        PlatformTag::Windows => dirs::data_local_dir()
            .ok_or_else(|| missing("local data"))?
            .join("csound")
            .join(versioned)
            .join("plugins64"),
    };
    Ok(dir)
}
