//! Typed catalog entries and their strict conversion from the raw JSON shape.
//!
//! The raw `serde` structs mirror the document and accept the historical key
//! spellings (`csound_version`, `extractpath`, `extra_files`). Conversion into
//! [`Plugin`] validates every invariant the matcher relies on, so a value of
//! these types is always internally consistent.

use super::range::VersionRange;
use crate::core::OpmError;
use crate::platform::PlatformTag;
use crate::utils::checksum;
use semver::Version;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One downloadable build of a plugin version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Binary {
    pub platform: PlatformTag,
    pub host_range: VersionRange,
    /// Absolute URL, `file://` URL, plain path, or a path relative to the catalog
    pub url: String,
    /// Archive entry holding the library; `None` means `url` is the library itself
    pub extract_path: Option<String>,
    /// Further archive entries installed alongside the library
    pub extra_files: Vec<String>,
    /// Expected sha256 of the fetched artifact, normalized to lowercase hex
    pub sha256: Option<String>,
    pub build_platform: Option<String>,
}

impl Binary {
    /// File name the library gets in the plugin directory.
    ///
    /// Taken from `extract_path` for archives, otherwise from the URL.
    #[must_use]
    pub fn library_file_name(&self) -> String {
        let source = self.extract_path.as_deref().unwrap_or(&self.url);
        base_name(source)
    }

    /// `platform range` label used in listings and error messages.
    #[must_use]
    pub fn label(&self) -> String {
        format!("{} {}", self.platform, self.host_range)
    }
}

/// Last path component of a URL or path, ignoring any query string.
pub(crate) fn base_name(location: &str) -> String {
    let no_query = location.split(['?', '#']).next().unwrap_or(location);
    no_query
        .trim_end_matches(['/', '\\'])
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or("")
        .to_string()
}

/// One published version of a plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginVersion {
    pub version: Version,
    pub binaries: Vec<Binary>,
    pub opcodes: Vec<String>,
    #[serde(rename = "abstract")]
    pub summary: String,
    pub description: String,
    pub author: String,
    pub email: String,
    pub repository: String,
    pub libname: String,
}

impl PluginVersion {
    /// Binaries built for `platform`.
    pub fn binaries_for(&self, platform: PlatformTag) -> impl Iterator<Item = &Binary> {
        self.binaries.iter().filter(move |b| b.platform == platform)
    }

    /// Pairs of binaries for the same platform whose ranges intersect.
    ///
    /// These are accepted by the parser; the matcher disambiguates them and
    /// `validate` reports them.
    #[must_use]
    pub fn overlapping_binaries(&self) -> Vec<(&Binary, &Binary)> {
        let mut out = Vec::new();
        for (i, a) in self.binaries.iter().enumerate() {
            for b in &self.binaries[i + 1..] {
                if a.platform == b.platform && a.host_range.overlaps(&b.host_range) {
                    out.push((a, b));
                }
            }
        }
        out
    }
}

/// A named plugin with its versions sorted ascending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Plugin {
    pub name: String,
    pub versions: Vec<PluginVersion>,
}

impl Plugin {
    /// Highest published version regardless of platform.
    #[must_use]
    pub fn latest(&self) -> Option<&PluginVersion> {
        self.versions.last()
    }

    #[must_use]
    pub fn version(&self, version: &Version) -> Option<&PluginVersion> {
        self.versions.iter().find(|v| &v.version == version)
    }

    /// Whether any version ships a binary for `platform`.
    #[must_use]
    pub fn has_platform(&self, platform: PlatformTag) -> bool {
        self.versions.iter().any(|v| v.binaries_for(platform).next().is_some())
    }

    /// `platform range` labels of every binary, for diagnostics.
    #[must_use]
    pub fn available_builds(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for binary in self.versions.iter().flat_map(|v| &v.binaries) {
            let label = binary.label();
            if !seen.contains(&label) {
                seen.push(label);
            }
        }
        seen
    }

    /// Library file names this plugin may occupy on `platform`.
    #[must_use]
    pub fn library_file_names(&self, platform: PlatformTag) -> Vec<String> {
        let mut names = Vec::new();
        for binary in self.versions.iter().flat_map(|v| v.binaries_for(platform)) {
            let name = binary.library_file_name();
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawBinary {
    platform: String,
    url: String,
    #[serde(default, alias = "csound_version", alias = "hostVersionRange")]
    host_version: Option<String>,
    #[serde(default, alias = "extractpath", alias = "extract_path")]
    extract_path: Option<String>,
    #[serde(default, alias = "extra_files")]
    extra_files: Vec<String>,
    #[serde(default)]
    sha256: Option<String>,
    #[serde(default, alias = "build_platform")]
    build_platform: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawVersion {
    version: String,
    binaries: Vec<RawBinary>,
    #[serde(default)]
    opcodes: Vec<String>,
    #[serde(default, rename = "abstract", alias = "short_description")]
    summary: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    author: String,
    #[serde(default)]
    email: String,
    #[serde(default, alias = "url")]
    repository: String,
    #[serde(default)]
    libname: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawPlugin {
    versions: Vec<RawVersion>,
}

/// Converts one plugin entry of the `plugins` mapping.
///
/// The entry is either `{"versions": [...]}` or a single version object (the
/// shape of a per-plugin manifest). A `{"manifest": url}` reference must have
/// been inlined by the catalog source before parsing.
pub(crate) fn parse_plugin(name: &str, value: &serde_json::Value) -> Result<Plugin, OpmError> {
    let fail = |reason: String| OpmError::catalog_format(name, reason);

    let object = value.as_object().ok_or_else(|| fail("entry is not an object".to_string()))?;

    let raw_versions: Vec<RawVersion> = if object.contains_key("versions") {
        let raw: RawPlugin =
            serde_json::from_value(value.clone()).map_err(|e| fail(e.to_string()))?;
        raw.versions
    } else if object.contains_key("version") {
        vec![serde_json::from_value(value.clone()).map_err(|e| fail(e.to_string()))?]
    } else if let Some(manifest) = object.get("manifest") {
        return Err(fail(format!(
            "manifest {manifest} was not inlined; run 'opm update' to fetch it"
        )));
    } else {
        return Err(fail("missing field `versions`".to_string()));
    };

    if raw_versions.is_empty() {
        return Err(fail("no versions declared".to_string()));
    }

    let mut versions = Vec::with_capacity(raw_versions.len());
    let mut seen = HashSet::new();
    for raw in raw_versions {
        let version = convert_version(raw).map_err(&fail)?;
        if !seen.insert(version.version.clone()) {
            return Err(fail(format!("version {} declared twice", version.version)));
        }
        versions.push(version);
    }
    versions.sort_by(|a, b| a.version.cmp(&b.version));

    Ok(Plugin {
        name: name.to_string(),
        versions,
    })
}

fn convert_version(raw: RawVersion) -> Result<PluginVersion, String> {
    let version = parse_plugin_version(&raw.version)?;

    let mut binaries: Vec<Binary> = Vec::with_capacity(raw.binaries.len());
    for raw_binary in raw.binaries {
        let binary = convert_binary(raw_binary).map_err(|e| format!("version {version}: {e}"))?;
        if binaries
            .iter()
            .any(|b| b.platform == binary.platform && b.host_range == binary.host_range)
        {
            return Err(format!(
                "version {version}: two binaries for {} with the same host range",
                binary.label()
            ));
        }
        binaries.push(binary);
    }

    Ok(PluginVersion {
        version,
        binaries,
        opcodes: raw.opcodes,
        summary: raw.summary,
        description: raw.description,
        author: raw.author,
        email: raw.email,
        repository: raw.repository,
        libname: raw.libname,
    })
}

fn convert_binary(raw: RawBinary) -> Result<Binary, String> {
    let platform: PlatformTag =
        raw.platform.parse().map_err(|_| format!("unknown platform '{}'", raw.platform))?;
    let host_range = VersionRange::parse(raw.host_version.as_deref().unwrap_or(""))?;

    let url = raw.url.trim().to_string();
    if url.is_empty() {
        return Err(format!("binary for {platform} has an empty url"));
    }

    let extract_path = raw.extract_path.map(|p| p.trim().to_string()).filter(|p| !p.is_empty());
    if extract_path.is_none() && !raw.extra_files.is_empty() {
        return Err(format!("binary for {platform} lists extraFiles without an extractPath"));
    }

    let sha256 = match raw.sha256 {
        Some(s) if !s.trim().is_empty() => {
            let hex = checksum::normalize(&s);
            if hex.len() != 64 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(format!("binary for {platform} has a malformed sha256 '{s}'"));
            }
            Some(hex)
        }
        _ => None,
    };

    let binary = Binary {
        platform,
        host_range,
        url,
        extract_path,
        extra_files: raw.extra_files,
        sha256,
        build_platform: raw.build_platform,
    };

    let file_name = binary.library_file_name();
    if file_name.is_empty() || file_name == "." || file_name == ".." {
        return Err(format!("binary for {platform} does not name a library file"));
    }
    Ok(binary)
}

/// Parses a plugin version, padding `1` and `1.2` to full SemVer.
pub(crate) fn parse_plugin_version(text: &str) -> Result<Version, String> {
    let trimmed = text.trim().trim_start_matches('v');
    if let Ok(version) = Version::parse(trimmed) {
        return Ok(version);
    }
    let parts: Vec<&str> = trimmed.split('.').collect();
    if (1..=2).contains(&parts.len())
        && parts.iter().all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()))
    {
        let mut padded = parts.join(".");
        for _ in parts.len()..3 {
            padded.push_str(".0");
        }
        if let Ok(version) = Version::parse(&padded) {
            return Ok(version);
        }
    }
    Err(format!("invalid version '{text}'"))
}
