use std::sync::Arc;
use tracing::{error, info, warn, Instrument};

use super::errors::BuildError;
use super::watcher::{Completion, CompletionWatcher, PollPolicy, PollingWatcher};
use super::workdir::WorkingDirectory;
use crate::config::BootstrapConfig;
use crate::engine::WorkflowEngine;
use crate::fs::{FileSystemOperations, StandardFileSystem};
use crate::observability::{BuildMetrics, OperationTimer};
use crate::project::{
    content_disposition, encode_word, validate_project_name, BuildRequest, GenerationSettings,
    Origin, Project, WorkflowParameters,
};
use crate::telemetry::{create_build_span, generate_correlation_id};

/// The generated project, ready to be streamed back
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildArtifact {
    pub bytes: Vec<u8>,
    /// Encoded download name; only set for interactive callers
    pub file_name: Option<String>,
}

impl BuildArtifact {
    pub fn content_disposition(&self) -> Option<String> {
        self.file_name.as_deref().map(content_disposition)
    }
}

/// Drives one generation workflow run per request and returns its archive
pub struct BuildOrchestrator {
    config: BootstrapConfig,
    engine: Arc<dyn WorkflowEngine>,
    fs: Arc<dyn FileSystemOperations>,
    watcher: Arc<dyn CompletionWatcher>,
    metrics: Arc<BuildMetrics>,
}

impl BuildOrchestrator {
    pub fn new(config: BootstrapConfig, engine: Arc<dyn WorkflowEngine>) -> Self {
        let watcher = PollingWatcher::new(PollPolicy::from_config(&config.polling));
        Self {
            config,
            engine,
            fs: Arc::new(StandardFileSystem),
            watcher: Arc::new(watcher),
            metrics: Arc::new(BuildMetrics::new()),
        }
    }

    pub fn with_file_system(mut self, fs: Arc<dyn FileSystemOperations>) -> Self {
        self.fs = fs;
        self
    }

    pub fn with_watcher(mut self, watcher: Arc<dyn CompletionWatcher>) -> Self {
        self.watcher = watcher;
        self
    }

    pub fn config(&self) -> &BootstrapConfig {
        &self.config
    }

    pub fn metrics(&self) -> Arc<BuildMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Generate a project and return its packaged archive.
    ///
    /// The working directory is removed before this returns, whatever the outcome.
    pub async fn build(&self, request: BuildRequest) -> Result<BuildArtifact, BuildError> {
        let project = request.normalize(&self.config.generation.default_version);
        let correlation_id = generate_correlation_id();
        let span = create_build_span(
            &project.name,
            project.origin.generation_type(),
            &correlation_id,
        );

        self.build_project(project).instrument(span).await
    }

    async fn build_project(&self, mut project: Project) -> Result<BuildArtifact, BuildError> {
        info!(%project, "Received request for generating application");
        self.metrics.record_started();

        if let Err(err) = validate_project_name(&project.name) {
            let err = BuildError::from(err);
            error!(error = %err, "Error when generating project");
            self.metrics.record_failed();
            return Err(err);
        }

        let temp_root = self.config.workspace.resolved_temp_root();
        let workdir = WorkingDirectory::allocate(Arc::clone(&self.fs), &temp_root)
            .await
            .map_err(|source| BuildError::Workspace {
                path: temp_root.clone(),
                source,
            });
        let workdir = match workdir {
            Ok(workdir) => workdir,
            Err(err) => {
                error!(error = %err, "Error when generating project");
                self.metrics.record_failed();
                return Err(err);
            }
        };

        project.location = Some(workdir.path().to_path_buf());
        info!(
            location = %workdir.path().display(),
            archive = %project.archive_file_name(),
            "Location for the generated project"
        );

        let result = self.generate(&project, &workdir).await;
        self.release(workdir).await;

        match &result {
            Ok(artifact) => {
                self.metrics.record_succeeded();
                info!(bytes = artifact.bytes.len(), "Project archive ready");
            }
            Err(err) => {
                if err.is_timeout() {
                    self.metrics.record_timed_out();
                } else {
                    self.metrics.record_failed();
                }
                error!(error = %err, "Error when generating project");
            }
        }

        result
    }

    async fn generate(
        &self,
        project: &Project,
        workdir: &WorkingDirectory,
    ) -> Result<BuildArtifact, BuildError> {
        let generation = &self.config.generation;
        let params = WorkflowParameters::derive(
            project,
            GenerationSettings {
                kie_version: &generation.kie_version,
                maven_settings: generation.maven_settings.as_deref(),
            },
        )?;

        let engine_config = &self.config.engine;
        info!(
            container_id = %engine_config.container_id,
            process_id = %engine_config.process_id,
            profile = %params.profile,
            "About to start new process"
        );

        let timer = OperationTimer::new("project_generation");
        let run_id = self
            .engine
            .start_run(
                &engine_config.container_id,
                &engine_config.process_id,
                params.to_map(),
            )
            .await
            .map_err(BuildError::StartFailure)?;
        tracing::Span::current().record("run.id", run_id.0);

        let marker = workdir.path().join(project.marker_file_name());
        match self
            .watcher
            .await_completion(self.engine.as_ref(), self.fs.as_ref(), run_id, &marker)
            .await
        {
            Completion::Succeeded { .. } => {}
            Completion::Failed { errors } => {
                return Err(BuildError::ExecutionFailure {
                    run_id,
                    message: errors.join("\n"),
                });
            }
            Completion::TimedOut { waited } => {
                return Err(BuildError::Timeout { run_id, waited });
            }
        }

        let archive_name = project.archive_file_name();
        let archive_path = workdir.path().join(&archive_name);
        let bytes = self
            .fs
            .read(&archive_path)
            .await
            .map_err(|source| BuildError::Workspace {
                path: archive_path.clone(),
                source,
            })?;

        let duration = timer.finish();
        info!(
            run_id = %run_id,
            duration_ms = duration.as_millis() as u64,
            "Project generation via process done"
        );

        let file_name = match project.origin {
            Origin::Web => Some(encode_word(&archive_name)),
            Origin::Rest => None,
        };

        Ok(BuildArtifact { bytes, file_name })
    }

    async fn release(&self, workdir: WorkingDirectory) {
        let path = workdir.path().to_path_buf();
        match workdir.cleanup().await {
            Ok(()) => info!(path = %path.display(), "Project archive and temp files deleted"),
            Err(err) => {
                self.metrics.record_cleanup_failure();
                warn!(
                    path = %path.display(),
                    error = %err,
                    "Failed to delete project temp files"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineError, ExecutionError, MockWorkflowEngine, RunId};
    use crate::fs::MockFileSystemOperations;
    use crate::project::ValidationError;
    use std::io;
    use std::path::PathBuf;

    fn config() -> BootstrapConfig {
        let mut config = BootstrapConfig::default();
        config.workspace.temp_root = Some(PathBuf::from("/virtual/tmp"));
        config.polling.interval_ms = 10;
        config.polling.timeout_secs = 1;
        config
    }

    fn lifecycle_fs(marker_present: bool, archive: &'static [u8]) -> MockFileSystemOperations {
        let mut fs = MockFileSystemOperations::new();
        fs.expect_create_dir_all().times(1).returning(|_| Ok(()));
        fs.expect_exists().return_const(marker_present);
        fs.expect_read().returning(move |_| Ok(archive.to_vec()));
        fs.expect_remove_dir_all().times(1).returning(|_| Ok(()));
        fs
    }

    #[tokio::test]
    async fn test_web_build_returns_bytes_and_file_name() {
        let mut engine = MockWorkflowEngine::new();
        engine
            .expect_start_run()
            .withf(|container, process, params| {
                container == "jbpm-bootstrap-kjar"
                    && process == "GenerateProject"
                    && params["projectSetup"] == "bpm"
                    && params["generationType"] == "web"
            })
            .times(1)
            .returning(|_, _, _| Ok(RunId(11)));
        engine.expect_execution_errors().returning(|_| Ok(Vec::new()));

        let orchestrator = BuildOrchestrator::new(config(), Arc::new(engine))
            .with_file_system(Arc::new(lifecycle_fs(true, b"PK\x05\x06")));

        let artifact = orchestrator.build(BuildRequest::new(Origin::Web)).await.unwrap();
        assert_eq!(artifact.bytes, b"PK\x05\x06");
        assert_eq!(
            artifact.file_name.as_deref(),
            Some("=?utf-8?Q?business-application=2Ezip?=")
        );
        assert_eq!(orchestrator.metrics().get_stats().succeeded, 1);
    }

    #[tokio::test]
    async fn test_rest_build_has_no_file_name() {
        let mut engine = MockWorkflowEngine::new();
        engine.expect_start_run().returning(|_, _, _| Ok(RunId(12)));
        engine.expect_execution_errors().returning(|_| Ok(Vec::new()));

        let orchestrator = BuildOrchestrator::new(config(), Arc::new(engine))
            .with_file_system(Arc::new(lifecycle_fs(true, b"PK")));

        let artifact = orchestrator.build(BuildRequest::new(Origin::Rest)).await.unwrap();
        assert_eq!(artifact.file_name, None);
        assert_eq!(artifact.content_disposition(), None);
    }

    #[tokio::test]
    async fn test_invalid_version_never_starts_workflow() {
        let mut engine = MockWorkflowEngine::new();
        engine.expect_start_run().times(0);

        let orchestrator = BuildOrchestrator::new(config(), Arc::new(engine))
            .with_file_system(Arc::new(lifecycle_fs(false, b"")));

        let err = orchestrator
            .build(BuildRequest::default().with_version("7"))
            .await
            .unwrap_err();
        assert!(matches!(err, BuildError::Validation(_)));
    }

    #[tokio::test]
    async fn test_escaping_name_is_rejected_before_allocation() {
        let mut engine = MockWorkflowEngine::new();
        engine.expect_start_run().times(0);
        let mut fs = MockFileSystemOperations::new();
        fs.expect_create_dir_all().times(0);
        fs.expect_remove_dir_all().times(0);

        let orchestrator =
            BuildOrchestrator::new(config(), Arc::new(engine)).with_file_system(Arc::new(fs));

        let err = orchestrator
            .build(BuildRequest::new(Origin::Rest).with_name("../../escaped"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            BuildError::Validation(ValidationError::InvalidProjectName { .. })
        ));
        assert!(err.is_client_error());
        assert_eq!(orchestrator.metrics().get_stats().failed, 1);
    }

    #[tokio::test]
    async fn test_start_failure_is_cleaned_up() {
        let mut engine = MockWorkflowEngine::new();
        engine.expect_start_run().times(1).returning(|_, _, _| {
            Err(EngineError::Unavailable {
                message: "kie server down".to_string(),
            })
        });
        engine.expect_execution_errors().times(0);

        let orchestrator = BuildOrchestrator::new(config(), Arc::new(engine))
            .with_file_system(Arc::new(lifecycle_fs(false, b"")));

        let err = orchestrator.build(BuildRequest::default()).await.unwrap_err();
        assert!(matches!(err, BuildError::StartFailure(_)));
        assert_eq!(orchestrator.metrics().get_stats().failed, 1);
    }

    #[tokio::test]
    async fn test_execution_errors_are_joined() {
        let mut engine = MockWorkflowEngine::new();
        engine.expect_start_run().returning(|_, _, _| Ok(RunId(13)));
        engine.expect_execution_errors().returning(|run_id| {
            Ok(vec![
                ExecutionError::new(run_id, "archetype not found"),
                ExecutionError::new(run_id, "maven exited with 1"),
            ])
        });

        let orchestrator = BuildOrchestrator::new(config(), Arc::new(engine))
            .with_file_system(Arc::new(lifecycle_fs(false, b"")));

        let err = orchestrator.build(BuildRequest::default()).await.unwrap_err();
        match err {
            BuildError::ExecutionFailure { run_id, message } => {
                assert_eq!(run_id, RunId(13));
                assert_eq!(message, "archetype not found\nmaven exited with 1");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_lands_within_one_interval_of_ceiling() {
        let mut engine = MockWorkflowEngine::new();
        engine.expect_start_run().returning(|_, _, _| Ok(RunId(16)));
        engine.expect_execution_errors().returning(|_| Ok(Vec::new()));

        let config = config();
        let interval = config.polling.interval();
        let ceiling = config.polling.timeout();
        let orchestrator = BuildOrchestrator::new(config, Arc::new(engine))
            .with_file_system(Arc::new(lifecycle_fs(false, b"")));

        let err = orchestrator.build(BuildRequest::default()).await.unwrap_err();
        match err {
            BuildError::Timeout { run_id, waited } => {
                assert_eq!(run_id, RunId(16));
                assert!(waited >= ceiling, "waited {waited:?}");
                assert!(waited < ceiling + interval, "waited {waited:?}");
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(orchestrator.metrics().get_stats().timed_out, 1);
    }

    #[tokio::test]
    async fn test_cleanup_failure_keeps_primary_outcome() {
        let mut engine = MockWorkflowEngine::new();
        engine.expect_start_run().returning(|_, _, _| Ok(RunId(14)));
        engine.expect_execution_errors().returning(|_| Ok(Vec::new()));

        let mut fs = MockFileSystemOperations::new();
        fs.expect_create_dir_all().returning(|_| Ok(()));
        fs.expect_exists().return_const(true);
        fs.expect_read().returning(|_| Ok(b"PK".to_vec()));
        fs.expect_remove_dir_all()
            .times(1)
            .returning(|_| Err(io::Error::new(io::ErrorKind::PermissionDenied, "busy")));

        let orchestrator =
            BuildOrchestrator::new(config(), Arc::new(engine)).with_file_system(Arc::new(fs));

        let artifact = orchestrator.build(BuildRequest::default()).await.unwrap();
        assert_eq!(artifact.bytes, b"PK");
        assert_eq!(orchestrator.metrics().get_stats().cleanup_failures, 1);
    }

    #[tokio::test]
    async fn test_unreadable_archive_is_workspace_error() {
        let mut engine = MockWorkflowEngine::new();
        engine.expect_start_run().returning(|_, _, _| Ok(RunId(15)));
        engine.expect_execution_errors().returning(|_| Ok(Vec::new()));

        let mut fs = MockFileSystemOperations::new();
        fs.expect_create_dir_all().returning(|_| Ok(()));
        fs.expect_exists().return_const(true);
        fs.expect_read()
            .returning(|_| Err(io::Error::new(io::ErrorKind::NotFound, "gone")));
        fs.expect_remove_dir_all().times(1).returning(|_| Ok(()));

        let orchestrator =
            BuildOrchestrator::new(config(), Arc::new(engine)).with_file_system(Arc::new(fs));

        let err = orchestrator.build(BuildRequest::default()).await.unwrap_err();
        assert!(matches!(err, BuildError::Workspace { .. }));
    }
}
