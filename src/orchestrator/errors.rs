use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::engine::{EngineError, RunId};
use crate::project::ValidationError;

/// Why a build produced no artifact. Every variant is terminal.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("invalid request: {0}")]
    Validation(#[from] ValidationError),

    #[error("failed to start generation process: {0}")]
    StartFailure(#[source] EngineError),

    #[error("{message}")]
    ExecutionFailure { run_id: RunId, message: String },

    #[error("Timeout while waiting for generated project (run {run_id}, waited {}ms)", waited.as_millis())]
    Timeout { run_id: RunId, waited: Duration },

    #[error("working directory error at {}: {source}", path.display())]
    Workspace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl BuildError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, BuildError::Timeout { .. })
    }

    /// Caller errors as opposed to failures of the generation itself
    pub fn is_client_error(&self) -> bool {
        matches!(self, BuildError::Validation(_))
    }

    pub fn run_id(&self) -> Option<RunId> {
        match self {
            BuildError::ExecutionFailure { run_id, .. } | BuildError::Timeout { run_id, .. } => {
                Some(*run_id)
            }
            _ => None,
        }
    }
}
