use serde_json::{Map, Value};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{ArchiveBuilder, ArchiveError, ArchiveSummary};
use crate::project::validate_project_name;

pub const SOURCE_PATH_PARAM: &str = "SourcePath";
pub const ARCHIVE_PARAM: &str = "Archive";

/// Workflow step that packs a generated project and signals completion.
///
/// Produces `<SourcePath>/<Archive>.zip` and, only once that file is
/// complete, the empty `<SourcePath>/<Archive>.marker`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveWorkItem {
    pub source_path: PathBuf,
    pub archive: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveWorkItemOutput {
    pub summary: ArchiveSummary,
    pub marker: PathBuf,
}

impl ArchiveWorkItem {
    pub fn new(source_path: impl Into<PathBuf>, archive: impl Into<String>) -> Self {
        Self {
            source_path: source_path.into(),
            archive: archive.into(),
        }
    }

    /// Build from the work item parameters of a workflow step
    pub fn from_parameters(params: &Map<String, Value>) -> Result<Self, ArchiveError> {
        let source_path = string_param(params, SOURCE_PATH_PARAM)?;
        let archive = string_param(params, ARCHIVE_PARAM)?;
        Ok(Self::new(source_path, archive))
    }

    pub fn archive_path(&self) -> PathBuf {
        self.source_path.join(format!("{}.zip", self.archive))
    }

    pub fn marker_path(&self) -> PathBuf {
        self.source_path.join(format!("{}.marker", self.archive))
    }

    pub fn execute(&self, builder: &ArchiveBuilder) -> Result<ArchiveWorkItemOutput, ArchiveError> {
        debug!(
            archive = %self.archive,
            source = %self.source_path.display(),
            "About to create zip archive from work item"
        );

        if validate_project_name(&self.archive).is_err() {
            return Err(ArchiveError::InvalidArchiveName {
                name: self.archive.clone(),
            });
        }

        let summary = builder.build_archive(&self.source_path, &self.archive_path())?;
        debug!(archive = %summary.path.display(), "Zip created successfully");

        let marker = self.marker_path();
        create_marker(&marker)?;

        Ok(ArchiveWorkItemOutput { summary, marker })
    }
}

fn string_param(params: &Map<String, Value>, name: &'static str) -> Result<String, ArchiveError> {
    params
        .get(name)
        .and_then(Value::as_str)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or(ArchiveError::MissingParameter { parameter: name })
}

fn create_marker(path: &Path) -> Result<(), ArchiveError> {
    let marker = OpenOptions::new().write(true).create(true).truncate(true).open(path)?;
    marker.sync_all()?;
    Ok(())
}
