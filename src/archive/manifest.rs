use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::ArchiveError;

/// A regular file to be packed, with its entry name inside the archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    /// Path relative to the source root, `/` separated, no leading separator
    pub name: String,
    /// Location on disk
    pub path: PathBuf,
}

/// Source root plus the files found below it.
///
/// Entries are produced lazily in directory traversal order; directories
/// themselves never become entries.
#[derive(Debug, Clone)]
pub struct ArchiveManifest {
    root: PathBuf,
    excluded: Vec<PathBuf>,
}

impl ArchiveManifest {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            excluded: Vec::new(),
        }
    }

    /// Skip a path that lives inside the tree, e.g. the archive being written
    pub fn excluding(mut self, path: impl Into<PathBuf>) -> Self {
        self.excluded.push(path.into());
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn entries(&self) -> impl Iterator<Item = Result<ManifestEntry, ArchiveError>> + '_ {
        WalkDir::new(&self.root)
            .min_depth(1)
            .follow_links(true)
            .into_iter()
            .filter_map(move |entry| {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(err) => {
                        let path = err
                            .path()
                            .map(Path::to_path_buf)
                            .unwrap_or_else(|| self.root.clone());
                        return Some(Err(ArchiveError::Walk { path, source: err }));
                    }
                };

                if self.excluded.iter().any(|p| p == entry.path()) {
                    return None;
                }

                let file_type = entry.file_type();
                if file_type.is_dir() {
                    return None;
                }
                if !file_type.is_file() {
                    return Some(Err(ArchiveError::UnsupportedEntry {
                        path: entry.path().to_path_buf(),
                    }));
                }

                Some(Ok(ManifestEntry {
                    name: entry_name(&self.root, entry.path()),
                    path: entry.into_path(),
                }))
            })
    }
}

fn entry_name(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
