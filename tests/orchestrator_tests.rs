/// End-to-end build tests against real temporary directories
/// Covers the success path with the local engine and every failure path with a stub engine
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;

use project_bootstrap::config::BootstrapConfig;
use project_bootstrap::orchestrator::{PollPolicy, PollingWatcher};
use project_bootstrap::project::ValidationError;
use project_bootstrap::{
    BuildError, BuildOrchestrator, BuildRequest, EngineError, ExecutionError, LocalWorkflowEngine,
    Origin, RunId, WorkflowEngine,
};

fn config_for(temp_root: &Path) -> BootstrapConfig {
    let mut config = BootstrapConfig::default();
    config.workspace.temp_root = Some(temp_root.to_path_buf());
    config.polling.interval_ms = 50;
    config.polling.timeout_secs = 1;
    config
}

fn assert_no_leftovers(temp_root: &Path) {
    let leftovers: Vec<_> = std::fs::read_dir(temp_root).unwrap().collect();
    assert!(leftovers.is_empty(), "working directories left behind: {leftovers:?}");
}

/// Engine that accepts runs but never produces anything on disk
#[derive(Default)]
struct StubEngine {
    start_error: Option<EngineError>,
    errors: Vec<String>,
    starts: AtomicU32,
    error_queries: AtomicU32,
}

#[async_trait]
impl WorkflowEngine for StubEngine {
    async fn start_run(
        &self,
        _container_id: &str,
        _process_id: &str,
        _params: Map<String, Value>,
    ) -> Result<RunId, EngineError> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        match &self.start_error {
            Some(err) => Err(err.clone()),
            None => Ok(RunId(42)),
        }
    }

    async fn execution_errors(&self, run_id: RunId) -> Result<Vec<ExecutionError>, EngineError> {
        self.error_queries.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .errors
            .iter()
            .map(|description| ExecutionError::new(run_id, description.clone()))
            .collect())
    }
}

#[tokio::test]
async fn test_web_build_returns_complete_archive() {
    let temp_root = TempDir::new().unwrap();
    let config = config_for(temp_root.path());
    let engine = Arc::new(LocalWorkflowEngine::new(&config.engine));
    let orchestrator = BuildOrchestrator::new(config, engine);

    let artifact = orchestrator.build(BuildRequest::new(Origin::Web)).await.unwrap();

    assert_eq!(
        artifact.file_name.as_deref(),
        Some("=?utf-8?Q?business-application=2Ezip?=")
    );
    assert_eq!(
        artifact.content_disposition().as_deref(),
        Some("attachment; filename=\"=?utf-8?Q?business-application=2Ezip?=\"")
    );

    let mut archive = zip::ZipArchive::new(Cursor::new(artifact.bytes)).unwrap();
    let names: Vec<String> = archive.file_names().map(str::to_string).collect();
    assert!(names.contains(&"business-application/README.md".to_string()));
    assert!(names.contains(&"business-application/business-application-kjar/pom.xml".to_string()));
    assert!(names.iter().all(|n| !n.ends_with(".zip") && !n.ends_with(".marker")));

    let readme = archive.by_name("business-application/README.md").unwrap();
    assert!(readme.size() > 0);

    assert_no_leftovers(temp_root.path());
    assert_eq!(orchestrator.metrics().get_stats().succeeded, 1);
}

#[tokio::test]
async fn test_rest_build_omits_file_name() {
    let temp_root = TempDir::new().unwrap();
    let config = config_for(temp_root.path());
    let engine = Arc::new(LocalWorkflowEngine::new(&config.engine));
    let orchestrator = BuildOrchestrator::new(config, engine);

    let request = BuildRequest::new(Origin::Rest)
        .with_name("claims")
        .with_capabilities(["brm"]);
    let artifact = orchestrator.build(request).await.unwrap();

    assert_eq!(artifact.file_name, None);
    let archive = zip::ZipArchive::new(Cursor::new(artifact.bytes)).unwrap();
    assert!(archive
        .file_names()
        .any(|n| n == "claims/claims-kjar/src/main/resources/rules/rules.drl"));
    assert_no_leftovers(temp_root.path());
}

#[tokio::test]
async fn test_start_failure_removes_working_directory() {
    let temp_root = TempDir::new().unwrap();
    let engine = Arc::new(StubEngine {
        start_error: Some(EngineError::Unavailable {
            message: "connection refused".to_string(),
        }),
        ..Default::default()
    });
    let orchestrator = BuildOrchestrator::new(config_for(temp_root.path()), engine.clone());

    let err = orchestrator.build(BuildRequest::default()).await.unwrap_err();

    assert!(matches!(err, BuildError::StartFailure(_)));
    assert_eq!(engine.error_queries.load(Ordering::SeqCst), 0);
    assert_no_leftovers(temp_root.path());
}

#[tokio::test]
async fn test_execution_failure_short_circuits_polling() {
    let temp_root = TempDir::new().unwrap();
    let engine = Arc::new(StubEngine {
        errors: vec!["Maven build failed".to_string(), "exit code 1".to_string()],
        ..Default::default()
    });
    let orchestrator = BuildOrchestrator::new(config_for(temp_root.path()), engine.clone());

    let started = Instant::now();
    let err = orchestrator.build(BuildRequest::default()).await.unwrap_err();

    assert!(started.elapsed() < Duration::from_millis(500));
    assert_eq!(err.to_string(), "Maven build failed\nexit code 1");
    assert_eq!(err.run_id(), Some(RunId(42)));
    assert_eq!(engine.error_queries.load(Ordering::SeqCst), 1);
    assert_no_leftovers(temp_root.path());
}

#[tokio::test]
async fn test_missing_marker_times_out_at_ceiling() {
    let temp_root = TempDir::new().unwrap();
    let config = config_for(temp_root.path());
    let interval = config.polling.interval();
    let ceiling = config.polling.timeout();
    let orchestrator = BuildOrchestrator::new(config, Arc::new(StubEngine::default()));

    let started = Instant::now();
    let err = orchestrator.build(BuildRequest::default()).await.unwrap_err();
    let elapsed = started.elapsed();

    match err {
        BuildError::Timeout { run_id, waited } => {
            assert_eq!(run_id, RunId(42));
            assert!(waited >= ceiling);
        }
        other => panic!("expected timeout, got {other:?}"),
    }
    assert!(elapsed >= ceiling);
    // generous slack for scheduler jitter on busy machines
    assert!(elapsed < ceiling + interval * 10);
    assert_eq!(orchestrator.metrics().get_stats().timed_out, 1);
    assert_no_leftovers(temp_root.path());
}

#[tokio::test]
async fn test_orphaned_run_does_not_recreate_working_directory() {
    let temp_root = TempDir::new().unwrap();
    let config = config_for(temp_root.path());
    let engine = Arc::new(
        LocalWorkflowEngine::new(&config.engine).with_step_delay(Duration::from_millis(400)),
    );
    let watcher = PollingWatcher::new(PollPolicy {
        interval: Duration::from_millis(20),
        error_check_every: 20,
        ceiling: Duration::from_millis(100),
    });
    let orchestrator =
        BuildOrchestrator::new(config, engine.clone()).with_watcher(Arc::new(watcher));

    let err = orchestrator.build(BuildRequest::default()).await.unwrap_err();
    let run_id = match err {
        BuildError::Timeout { run_id, .. } => run_id,
        other => panic!("expected timeout, got {other:?}"),
    };
    assert_no_leftovers(temp_root.path());

    // the run keeps going and reaches its scaffold step after the build gave up
    let mut errors = Vec::new();
    for _ in 0..100 {
        errors = engine.execution_errors(run_id).await.unwrap();
        if !errors.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(errors.len(), 1);
    assert!(errors[0].description.contains("no longer exists"));
    assert_no_leftovers(temp_root.path());
}

#[tokio::test]
async fn test_name_with_parent_components_is_rejected() {
    let outer = TempDir::new().unwrap();
    let temp_root = outer.path().join("tmproot");
    std::fs::create_dir(&temp_root).unwrap();
    let config = config_for(&temp_root);
    let engine = Arc::new(LocalWorkflowEngine::new(&config.engine));
    let orchestrator = BuildOrchestrator::new(config, engine);

    let err = orchestrator
        .build(BuildRequest::new(Origin::Rest).with_name("../../escaped"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        BuildError::Validation(ValidationError::InvalidProjectName { .. })
    ));
    let outer_names: Vec<_> = std::fs::read_dir(outer.path())
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(outer_names, vec![std::ffi::OsString::from("tmproot")]);
    assert_no_leftovers(&temp_root);
}

#[tokio::test]
async fn test_unparseable_version_is_rejected_before_start() {
    let temp_root = TempDir::new().unwrap();
    let engine = Arc::new(StubEngine::default());
    let orchestrator = BuildOrchestrator::new(config_for(temp_root.path()), engine.clone());

    let err = orchestrator
        .build(BuildRequest::default().with_version("7"))
        .await
        .unwrap_err();

    assert!(err.is_client_error());
    assert_eq!(engine.starts.load(Ordering::SeqCst), 0);
    assert_no_leftovers(temp_root.path());
}

#[tokio::test]
async fn test_concurrent_builds_are_isolated() {
    let temp_root = TempDir::new().unwrap();
    let config = config_for(temp_root.path());
    let engine = Arc::new(LocalWorkflowEngine::new(&config.engine));
    let orchestrator = Arc::new(BuildOrchestrator::new(config, engine));

    let first = {
        let orchestrator = Arc::clone(&orchestrator);
        tokio::spawn(async move {
            orchestrator
                .build(BuildRequest::default().with_name("alpha"))
                .await
        })
    };
    let second = {
        let orchestrator = Arc::clone(&orchestrator);
        tokio::spawn(async move {
            orchestrator
                .build(BuildRequest::default().with_name("beta"))
                .await
        })
    };

    let alpha = first.await.unwrap().unwrap();
    let beta = second.await.unwrap().unwrap();

    let alpha_names: Vec<String> = zip::ZipArchive::new(Cursor::new(alpha.bytes))
        .unwrap()
        .file_names()
        .map(str::to_string)
        .collect();
    let beta_names: Vec<String> = zip::ZipArchive::new(Cursor::new(beta.bytes))
        .unwrap()
        .file_names()
        .map(str::to_string)
        .collect();

    assert!(alpha_names.iter().all(|n| n.starts_with("alpha/")));
    assert!(beta_names.iter().all(|n| n.starts_with("beta/")));
    assert_eq!(orchestrator.metrics().get_stats().succeeded, 2);
    assert_no_leftovers(temp_root.path());
}
