//! File system helpers for the state store and plugin placement
//!
//! Every write that another process may observe goes through a
//! write-then-rename step so that readers only ever see a complete file.
//!
//! # Examples
//!
//! ```rust,no_run
//! use opm_cli::utils::fs::{atomic_write, ensure_dir};
//! use std::path::Path;
//!
//! # fn example() -> anyhow::Result<()> {
//! ensure_dir(Path::new("/tmp/opm-data"))?;
//! atomic_write(Path::new("/tmp/opm-data/installed.toml"), b"version = 1\n")?;
//! # Ok(())
//! # }
//! ```

use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Creates a directory and all of its parents if it does not exist yet.
///
/// Fails when `path` exists but is not a directory.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)
            .with_context(|| format!("Failed to create directory: {}", path.display()))?;
    } else if !path.is_dir() {
        return Err(anyhow::anyhow!("Path exists but is not a directory: {}", path.display()));
    }
    Ok(())
}

/// Atomically writes bytes to a file using a write-then-rename strategy.
///
/// The content is written to a uniquely named temporary file in the target's
/// directory, synced, and then renamed over the target. Two writers racing on
/// the same target never share a temporary file; the last rename wins.
///
/// # Arguments
///
/// * `path` - The target file path
/// * `content` - The raw bytes to write
///
/// # Guarantees
///
/// - **Atomicity**: readers see either the previous or the new content
/// - **Durability**: content is synced to disk before the rename
/// - **Safety**: parent directories are created automatically
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    let parent = parent_dir(path);
    ensure_dir(&parent)?;

    let mut temp = tempfile::Builder::new()
        .prefix(".opm-write-")
        .tempfile_in(&parent)
        .with_context(|| format!("Failed to create temp file in: {}", parent.display()))?;

    temp.write_all(content)
        .with_context(|| format!("Failed to write temp file for: {}", path.display()))?;
    temp.as_file().sync_all().context("Failed to sync file to disk")?;

    temp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("Failed to rename temp file to: {}", path.display()))?;

    Ok(())
}

/// Moves a staged file to its final location with a single rename.
///
/// `from` and `to` must live on the same filesystem; the installer guarantees
/// this by staging inside the destination directory.
pub fn atomic_move(from: &Path, to: &Path) -> Result<()> {
    fs::rename(from, to)
        .with_context(|| format!("Failed to move {} to {}", from.display(), to.display()))
}

/// Removes a file, returning `false` when it was already absent.
pub fn remove_file_if_exists(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e).with_context(|| format!("Failed to remove {}", path.display())),
    }
}

/// Removes a directory if it exists and is empty. Errors are ignored.
pub fn remove_dir_if_empty(path: &Path) {
    if path.is_dir() {
        let _ = fs::remove_dir(path);
    }
}

/// Expands `~` and environment variables in a user supplied path.
pub fn expand_path(raw: &str) -> Result<PathBuf> {
    let expanded = shellexpand::full(raw)
        .with_context(|| format!("Failed to expand path: {raw}"))?;
    Ok(PathBuf::from(expanded.as_ref()))
}

/// Marks a placed library as executable on Unix. No-op elsewhere.
pub fn make_executable(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs::metadata(path)
            .with_context(|| format!("Failed to read permissions for {}", path.display()))?
            .permissions();
        perms.set_mode(0o755);
        fs::set_permissions(path, perms)
            .with_context(|| format!("Failed to set permissions on {}", path.display()))?;
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
