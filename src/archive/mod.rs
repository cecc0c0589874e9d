//! Directory-to-zip packing used as the completion step of project generation.
//!
//! The contract with consumers is ordering: the archive is finalized before
//! the marker file next to it is created, so a visible marker always means a
//! complete archive.

pub mod builder;
pub mod manifest;
pub mod work_item;

use std::path::PathBuf;
use thiserror::Error;

pub use builder::{build_archive, ArchiveBuilder, ArchiveSummary};
pub use manifest::{ArchiveManifest, ManifestEntry};
pub use work_item::{ArchiveWorkItem, ArchiveWorkItemOutput};

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("{parameter} parameter is mandatory")]
    MissingParameter { parameter: &'static str },
    #[error("archive name '{name}' must be a single path segment")]
    InvalidArchiveName { name: String },
    #[error("source {} is not a directory", path.display())]
    SourceNotDirectory { path: PathBuf },
    #[error("cannot traverse {}: {source}", path.display())]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
    #[error("{} is neither a regular file nor a directory", path.display())]
    UnsupportedEntry { path: PathBuf },
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
