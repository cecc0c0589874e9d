// Project Bootstrap Library - workflow-driven project generation and packaging
// This exposes the core components for the binary and for integration tests

pub mod archive;
pub mod config;
pub mod engine;
pub mod fs;
pub mod observability;
pub mod orchestrator;
pub mod project;
pub mod telemetry;

// Re-export key types for easy access
pub use archive::{build_archive, ArchiveBuilder, ArchiveError, ArchiveSummary, ArchiveWorkItem};
pub use config::BootstrapConfig;
pub use engine::{EngineError, ExecutionError, LocalWorkflowEngine, RunId, WorkflowEngine};
pub use fs::{FileSystemOperations, StandardFileSystem};
pub use observability::{BuildMetrics, BuildStats, OperationTimer};
pub use orchestrator::{BuildArtifact, BuildError, BuildOrchestrator, PollPolicy};
pub use project::{ApplicationProfile, BuildRequest, Origin, Project, ValidationError};
pub use telemetry::{create_build_span, generate_correlation_id, init_telemetry};
