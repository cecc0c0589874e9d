//! Build orchestration: one workflow run per request, from working
//! directory allocation to archive bytes.

pub mod builder;
pub mod errors;
pub mod watcher;
pub mod workdir;

pub use builder::{BuildArtifact, BuildOrchestrator};
pub use errors::BuildError;
pub use watcher::{Completion, CompletionWatcher, PollPolicy, PollingWatcher};
pub use workdir::WorkingDirectory;
