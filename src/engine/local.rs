//! In-process implementation of the generation workflow.
//!
//! Runs the same two steps the external process does (lay out the project,
//! then pack it with the archive work item) on the tokio blocking pool and
//! reports failures through the run's error log.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, Instrument};

use super::scaffold::ProjectScaffold;
use super::{EngineError, ExecutionError, RunId, WorkflowEngine};
use crate::archive::{ArchiveBuilder, ArchiveWorkItem};
use crate::config::EngineConfig;

const GENERATE_ACTIVITY: &str = "Generate project";
const ARCHIVE_ACTIVITY: &str = "Create archive";

/// Finished runs whose errors were never read are dropped oldest first past this
const MAX_RETAINED_RUNS: usize = 1024;

#[derive(Debug, Default)]
struct RunLog {
    errors: Vec<ExecutionError>,
    finished: bool,
}

type ErrorLog = Arc<Mutex<BTreeMap<RunId, RunLog>>>;

#[derive(Debug)]
pub struct LocalWorkflowEngine {
    container_id: String,
    process_id: String,
    next_run: AtomicU64,
    errors: ErrorLog,
    step_delay: Duration,
    builder: ArchiveBuilder,
    rejection: Mutex<Option<String>>,
}

impl LocalWorkflowEngine {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            container_id: config.container_id.clone(),
            process_id: config.process_id.clone(),
            next_run: AtomicU64::new(1),
            errors: Arc::new(Mutex::new(BTreeMap::new())),
            step_delay: Duration::ZERO,
            builder: ArchiveBuilder::new(),
            rejection: Mutex::new(None),
        }
    }

    /// Wait this long before each step, to emulate a slow engine
    pub fn with_step_delay(mut self, delay: Duration) -> Self {
        self.step_delay = delay;
        self
    }

    /// Reject the next `start_run` call with the given message
    pub async fn reject_next_start(&self, message: impl Into<String>) {
        *self.rejection.lock().await = Some(message.into());
    }

    /// Append an entry to a run's error log
    pub async fn record_error(&self, error: ExecutionError) {
        self.errors
            .lock()
            .await
            .entry(error.run_id)
            .or_default()
            .errors
            .push(error);
    }

    /// Number of runs currently holding an error log entry
    pub async fn retained_runs(&self) -> usize {
        self.errors.lock().await.len()
    }

    fn knows(&self, container_id: &str, process_id: &str) -> bool {
        self.container_id == container_id && self.process_id == process_id
    }
}

/// Mark a run as finished, appending its failure if it has one.
///
/// Successful runs without recorded errors leave nothing behind.
async fn finish(errors: &ErrorLog, run_id: RunId, failure: Option<ExecutionError>) {
    let mut log = errors.lock().await;
    match failure {
        Some(failure) => {
            let entry = log.entry(run_id).or_default();
            entry.errors.push(failure);
            entry.finished = true;
        }
        None => {
            if let Some(entry) = log.get_mut(&run_id) {
                entry.finished = true;
            }
        }
    }

    while log.len() > MAX_RETAINED_RUNS {
        let oldest_finished = log
            .iter()
            .find(|(_, entry)| entry.finished)
            .map(|(run_id, _)| *run_id);
        match oldest_finished {
            Some(run_id) => {
                log.remove(&run_id);
            }
            None => break,
        }
    }
}

/// The blocking body of one run: scaffold, then archive and marker
fn generate(
    run_id: RunId,
    params: &Map<String, Value>,
    builder: &ArchiveBuilder,
    step_delay: Duration,
) -> Result<(), ExecutionError> {
    let scaffold = ProjectScaffold::from_parameters(params).map_err(|e| {
        ExecutionError::new(run_id, e.to_string()).with_activity(GENERATE_ACTIVITY)
    })?;
    let location = scaffold
        .location()
        .map_err(|e| ExecutionError::new(run_id, e.to_string()).with_activity(GENERATE_ACTIVITY))?
        .to_path_buf();

    std::thread::sleep(step_delay);
    let written = scaffold.write().map_err(|e| {
        ExecutionError::new(run_id, e.to_string()).with_activity(GENERATE_ACTIVITY)
    })?;
    debug!(run_id = %run_id, files = written.len(), "Project scaffold written");

    std::thread::sleep(step_delay);
    let output = ArchiveWorkItem::new(location, scaffold.project.name.clone())
        .execute(builder)
        .map_err(|e| ExecutionError::new(run_id, e.to_string()).with_activity(ARCHIVE_ACTIVITY))?;
    debug!(
        run_id = %run_id,
        archive = %output.summary.path.display(),
        entries = output.summary.entries,
        "Archive work item completed"
    );

    Ok(())
}

#[async_trait]
impl WorkflowEngine for LocalWorkflowEngine {
    async fn start_run(
        &self,
        container_id: &str,
        process_id: &str,
        params: Map<String, Value>,
    ) -> Result<RunId, EngineError> {
        if let Some(message) = self.rejection.lock().await.take() {
            return Err(EngineError::Rejected { message });
        }
        if !self.knows(container_id, process_id) {
            return Err(EngineError::UnknownProcess {
                container_id: container_id.to_string(),
                process_id: process_id.to_string(),
            });
        }

        let run_id = RunId(self.next_run.fetch_add(1, Ordering::Relaxed));
        let errors = Arc::clone(&self.errors);
        let builder = self.builder.clone();
        let step_delay = self.step_delay;

        info!(run_id = %run_id, process_id, "Started local workflow run");

        let span = tracing::info_span!("workflow_run", run.id = %run_id);
        tokio::spawn(
            async move {
                let outcome = tokio::task::spawn_blocking(move || {
                    generate(run_id, &params, &builder, step_delay)
                })
                .await;

                let failure = match outcome {
                    Ok(Ok(())) => {
                        info!("Local workflow run completed");
                        finish(&errors, run_id, None).await;
                        return;
                    }
                    Ok(Err(execution_error)) => execution_error,
                    Err(join_error) => ExecutionError::new(
                        run_id,
                        format!("workflow run aborted: {join_error}"),
                    ),
                };

                error!(error = %failure, "Local workflow run failed");
                finish(&errors, run_id, Some(failure)).await;
            }
            .instrument(span),
        );

        Ok(run_id)
    }

    /// Errors of a finished run are handed out once and then forgotten
    async fn execution_errors(&self, run_id: RunId) -> Result<Vec<ExecutionError>, EngineError> {
        let mut log = self.errors.lock().await;
        let finished = log.get(&run_id).map(|entry| entry.finished);
        Ok(match finished {
            Some(true) => log.remove(&run_id).map(|entry| entry.errors).unwrap_or_default(),
            Some(false) => log
                .get(&run_id)
                .map(|entry| entry.errors.clone())
                .unwrap_or_default(),
            None => Vec::new(),
        })
    }
}
