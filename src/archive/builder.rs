use std::fs::File;
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::{ArchiveError, ArchiveManifest};

/// Outcome of a finished archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveSummary {
    pub path: PathBuf,
    pub entries: usize,
    pub bytes_packed: u64,
}

/// Packs a directory tree into a single zip file
#[derive(Debug, Clone)]
pub struct ArchiveBuilder {
    compression: CompressionMethod,
}

impl Default for ArchiveBuilder {
    fn default() -> Self {
        Self {
            compression: CompressionMethod::Deflated,
        }
    }
}

impl ArchiveBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stored() -> Self {
        Self {
            compression: CompressionMethod::Stored,
        }
    }

    /// Pack every regular file below `source_dir` into `destination`.
    ///
    /// The archive is written to an anonymous temporary file next to
    /// `destination` and only persisted onto it once finalized and synced,
    /// so `destination` either holds a complete archive or does not exist.
    pub fn build_archive(
        &self,
        source_dir: &Path,
        destination: &Path,
    ) -> Result<ArchiveSummary, ArchiveError> {
        if !source_dir.is_dir() {
            return Err(ArchiveError::SourceNotDirectory {
                path: source_dir.to_path_buf(),
            });
        }

        let parent = destination
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut temp_file = NamedTempFile::new_in(parent)?;

        let manifest = ArchiveManifest::new(source_dir)
            .excluding(destination)
            .excluding(temp_file.path());

        debug!(
            source = %source_dir.display(),
            archive = %destination.display(),
            temp = %temp_file.path().display(),
            "About to create zip archive"
        );

        // dropping the temp file on any error below removes it
        let (entries, bytes_packed) = self.write_archive(&manifest, temp_file.as_file_mut())?;
        temp_file
            .persist(destination)
            .map_err(|err| ArchiveError::Io(err.error))?;

        debug!(
            archive = %destination.display(),
            entries,
            bytes_packed,
            "Folder successfully compressed"
        );

        Ok(ArchiveSummary {
            path: destination.to_path_buf(),
            entries,
            bytes_packed,
        })
    }

    fn write_archive(
        &self,
        manifest: &ArchiveManifest,
        file: &mut File,
    ) -> Result<(usize, u64), ArchiveError> {
        let mut writer = ZipWriter::new(BufWriter::new(file));
        let options = SimpleFileOptions::default().compression_method(self.compression);

        let mut entries = 0usize;
        let mut bytes_packed = 0u64;

        for entry in manifest.entries() {
            let entry = entry?;
            debug!(entry = %entry.name, "File added");

            let mut input = File::open(&entry.path).map_err(|source| ArchiveError::Read {
                path: entry.path.clone(),
                source,
            })?;
            writer.start_file(entry.name.as_str(), options)?;
            bytes_packed += io::copy(&mut input, &mut writer).map_err(|source| {
                ArchiveError::Read {
                    path: entry.path.clone(),
                    source,
                }
            })?;
            entries += 1;
        }

        let buffered = writer.finish()?;
        let file = buffered.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;

        Ok((entries, bytes_packed))
    }
}

/// Convenience wrapper around [`ArchiveBuilder::build_archive`] with default settings
pub fn build_archive(source_dir: &Path, destination: &Path) -> Result<ArchiveSummary, ArchiveError> {
    ArchiveBuilder::new().build_archive(source_dir, destination)
}
