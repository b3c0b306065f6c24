//! Pulling single entries out of downloaded archives.

use crate::catalog::model::base_name;
use crate::core::OpmError;
use std::io::Cursor;
use std::path::Path;
use tracing::debug;

/// Extracts one named entry of an archive to a file.
pub trait ArchiveExtractor: Send + Sync {
    /// Writes `entry` of `archive` to `dest`.
    ///
    /// `source` names the archive in errors. Fails with
    /// [`OpmError::Extraction`].
    fn extract(&self, source: &str, archive: &[u8], entry: &str, dest: &Path)
    -> Result<(), OpmError>;
}

/// Zip support via the `zip` crate.
///
/// An entry is looked up by its full path first. When the catalog names only
/// a file (`libpoly.so`) and the archive nests it in a folder, the first
/// file with that name is used.
#[derive(Debug, Default, Clone, Copy)]
pub struct ZipExtractor;

impl ArchiveExtractor for ZipExtractor {
    fn extract(
        &self,
        source: &str,
        archive: &[u8],
        entry: &str,
        dest: &Path,
    ) -> Result<(), OpmError> {
        let fail = |reason: String| OpmError::Extraction {
            archive: source.to_string(),
            entry: entry.to_string(),
            reason,
        };

        let mut zip = zip::ZipArchive::new(Cursor::new(archive)).map_err(|e| fail(e.to_string()))?;

        let wanted = entry.trim_start_matches("./").replace('\\', "/");
        let index = match zip.index_for_name(&wanted) {
            Some(index) => index,
            None => {
                let file_name = base_name(&wanted);
                let nested = zip
                    .file_names()
                    .find(|name| !name.ends_with('/') && base_name(name) == file_name)
                    .map(str::to_string)
                    .ok_or_else(|| fail("entry not found in archive".to_string()))?;
                debug!("Using archive entry {nested} for {entry}");
                zip.index_for_name(&nested)
                    .ok_or_else(|| fail("entry not found in archive".to_string()))?
            }
        };

        let mut file = zip.by_index(index).map_err(|e| fail(e.to_string()))?;
        if file.is_dir() {
            return Err(fail("entry is a directory".to_string()));
        }

        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(|e| fail(e.to_string()))?;
        }
        let mut out = std::fs::File::create(dest).map_err(|e| fail(e.to_string()))?;
        std::io::copy(&mut file, &mut out).map_err(|e| fail(e.to_string()))?;
        Ok(())
    }
}
