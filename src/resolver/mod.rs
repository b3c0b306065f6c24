//! Version and compatibility matching
//!
//! Given one [`Plugin`] and the caller's [`Environment`], pick the single
//! binary that should be installed:
//!
//! 1. Candidate versions are those with at least one binary for the caller's
//!    platform whose host range the host version satisfies. An unknown host
//!    only satisfies binaries without a range.
//! 2. No candidate is [`OpmError::NoCompatibleBinary`], never "not found".
//! 3. The greatest SemVer among the candidates wins.
//! 4. If that version has several qualifying binaries (overlapping ranges),
//!    the one whose range lies within all the others wins. When no such
//!    binary exists the entry is ambiguous and reported as
//!    [`OpmError::CatalogFormat`].
//!
//! Matching is a pure function of its inputs.
//!
//! # Examples
//!
//! ```rust,no_run
//! use opm_cli::catalog::Catalog;
//! use opm_cli::platform::{Environment, HostVersion, PlatformTag};
//! use opm_cli::resolver::resolve;
//!
//! # fn example(catalog: &Catalog) -> anyhow::Result<()> {
//! let env = Environment::new(PlatformTag::Linux, Some(HostVersion::new(6, 18, 0)));
//! let plugin = catalog.require("poly")?;
//! let resolution = resolve(plugin, &env)?;
//! println!("{} {}", resolution.plugin, resolution.version);
//! # Ok(())
//! # }
//! ```

use crate::catalog::{Binary, Plugin, PluginVersion};
use crate::core::OpmError;
use crate::platform::Environment;
use semver::Version;

/// The outcome of matching: one version and one of its binaries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub plugin: String,
    pub version: Version,
    pub binary: Binary,
}

/// Selects the best binary of `plugin` for `env`.
///
/// # Errors
///
/// - [`OpmError::NoCompatibleBinary`] when no version qualifies
/// - [`OpmError::CatalogFormat`] when the selected version has qualifying
///   binaries with no single tightest range
pub fn resolve(plugin: &Plugin, env: &Environment) -> Result<Resolution, OpmError> {
    // Versions are sorted ascending, so the last candidate is the greatest
    let selected = plugin
        .versions
        .iter()
        .rev()
        .find(|v| qualifying(v, env).next().is_some())
        .ok_or_else(|| OpmError::NoCompatibleBinary {
            plugin: plugin.name.clone(),
            platform: env.platform.to_string(),
            host_version: env.host_label(),
            available: plugin.available_builds(),
        })?;

    let binary = tightest(plugin, selected, env)?;
    Ok(Resolution {
        plugin: plugin.name.clone(),
        version: selected.version.clone(),
        binary: binary.clone(),
    })
}

/// Resolves and keeps the result only when it is strictly newer than `current`.
///
/// A plugin without any compatible binary yields `Ok(None)`: there is nothing
/// newer to move to, and upgrades never fall back to an older version.
pub fn resolve_newer_than(
    plugin: &Plugin,
    env: &Environment,
    current: &Version,
) -> Result<Option<Resolution>, OpmError> {
    match resolve(plugin, env) {
        Ok(resolution) if resolution.version > *current => Ok(Some(resolution)),
        Ok(_) | Err(OpmError::NoCompatibleBinary { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

fn qualifying<'a>(
    version: &'a PluginVersion,
    env: &Environment,
) -> impl Iterator<Item = &'a Binary> + use<'a> {
    let host_version = env.host_version;
    version.binaries_for(env.platform).filter(move |b| b.host_range.satisfied_by(host_version))
}

fn tightest<'a>(
    plugin: &Plugin,
    version: &'a PluginVersion,
    env: &Environment,
) -> Result<&'a Binary, OpmError> {
    let candidates: Vec<&Binary> = qualifying(version, env).collect();
    if candidates.len() == 1 {
        return Ok(candidates[0]);
    }

    let winners: Vec<&Binary> = candidates
        .iter()
        .copied()
        .filter(|c| candidates.iter().all(|o| c.host_range.is_within(&o.host_range)))
        .collect();

    match winners.as_slice() {
        [only] => Ok(*only),
        _ => Err(OpmError::catalog_format(
            &plugin.name,
            format!(
                "version {} has ambiguous binaries for {}: {}",
                version.version,
                env.platform,
                candidates.iter().map(|b| b.host_range.to_string()).collect::<Vec<_>>().join(" / ")
            ),
        )),
    }
}
