//! Workflow engine abstraction
//!
//! The orchestrator starts the generation process through [`WorkflowEngine`]
//! and reads the run's error log from it; everything else the process does
//! is observed only through files in the working directory.

pub mod local;
pub mod scaffold;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

pub use local::LocalWorkflowEngine;

/// Identifier of one workflow run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RunId(pub u64);

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Entry of the engine's error log for a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionError {
    pub run_id: RunId,
    /// Activity of the process that failed, when known
    pub activity: Option<String>,
    pub description: String,
    pub occurred_at: DateTime<Utc>,
}

impl ExecutionError {
    pub fn new(run_id: RunId, description: impl Into<String>) -> Self {
        Self {
            run_id,
            activity: None,
            description: description.into(),
            occurred_at: Utc::now(),
        }
    }

    pub fn with_activity(mut self, activity: impl Into<String>) -> Self {
        self.activity = Some(activity.into());
        self
    }
}

impl fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.activity {
            Some(activity) => write!(f, "{} (activity {})", self.description, activity),
            None => f.write_str(&self.description),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("container {container_id} does not define process {process_id}")]
    UnknownProcess {
        container_id: String,
        process_id: String,
    },
    #[error("workflow engine rejected the request: {message}")]
    Rejected { message: String },
    #[error("workflow engine unavailable: {message}")]
    Unavailable { message: String },
}

/// External engine running the project generation process
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait WorkflowEngine: Send + Sync {
    /// Start a run of `process_id` in `container_id` with the given parameters
    async fn start_run(
        &self,
        container_id: &str,
        process_id: &str,
        params: Map<String, Value>,
    ) -> Result<RunId, EngineError>;

    /// Errors recorded for the run, in the order the engine reports them
    async fn execution_errors(&self, run_id: RunId) -> Result<Vec<ExecutionError>, EngineError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_error_display() {
        let plain = ExecutionError::new(RunId(7), "maven build failed");
        assert_eq!(plain.to_string(), "maven build failed");

        let with_activity = plain.clone().with_activity("Generate kjar");
        assert_eq!(
            with_activity.to_string(),
            "maven build failed (activity Generate kjar)"
        );
    }
}
