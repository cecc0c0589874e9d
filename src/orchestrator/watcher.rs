//! Waiting for a workflow run to finish.
//!
//! The generation process signals completion only by creating a marker file
//! next to the archive, so the default [`PollingWatcher`] polls the file
//! system and, at a fixed cadence, the engine's error log.

use async_trait::async_trait;
use statig::prelude::*;
use std::path::Path;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use crate::config::PollingConfig;
use crate::engine::{RunId, WorkflowEngine};
use crate::fs::FileSystemOperations;

/// Floor for the sleep between polls; a zero interval would never yield
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// How long to wait and how often to look
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    /// Error log is queried every this many iterations; 0 means only before the first one
    pub error_check_every: u32,
    pub ceiling: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::from_config(&PollingConfig::default())
    }
}

impl PollPolicy {
    pub fn from_config(config: &PollingConfig) -> Self {
        Self {
            interval: config.interval(),
            error_check_every: config.error_check_every,
            ceiling: config.timeout(),
        }
    }

    fn error_check_due(&self, iteration: u32) -> bool {
        self.error_check_every > 0 && iteration % self.error_check_every == 0
    }
}

/// Terminal result of waiting for a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    Succeeded { waited: Duration },
    Failed { errors: Vec<String> },
    TimedOut { waited: Duration },
}

/// Waits until a run has produced its marker file or failed
#[async_trait]
pub trait CompletionWatcher: Send + Sync {
    async fn await_completion(
        &self,
        engine: &dyn WorkflowEngine,
        fs: &dyn FileSystemOperations,
        run_id: RunId,
        marker: &Path,
    ) -> Completion;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollEvent {
    ErrorsChecked { found: bool },
    MarkerChecked { present: bool },
    /// Wall-clock time since waiting started
    Slept { waited: Duration },
}

/// Decides the transitions `Starting -> Polling -> Succeeded | Failed | TimedOut`
#[derive(Debug, Default)]
pub struct PollTracker {
    ceiling: Duration,
    waited: Duration,
}

impl PollTracker {
    pub fn new(ceiling: Duration) -> Self {
        Self {
            ceiling,
            waited: Duration::ZERO,
        }
    }
}

#[state_machine(initial = "State::starting()")]
impl PollTracker {
    #[state]
    fn starting(&mut self, event: &PollEvent) -> Outcome<State> {
        match event {
            PollEvent::ErrorsChecked { found: true } => Transition(State::failed()),
            PollEvent::ErrorsChecked { found: false } => Transition(State::polling()),
            _ => Handled,
        }
    }

    #[state]
    fn polling(&mut self, event: &PollEvent) -> Outcome<State> {
        match event {
            PollEvent::ErrorsChecked { found: true } => Transition(State::failed()),
            PollEvent::MarkerChecked { present: true } => Transition(State::succeeded()),
            PollEvent::Slept { waited } => {
                self.waited = *waited;
                if self.waited >= self.ceiling {
                    Transition(State::timed_out())
                } else {
                    Handled
                }
            }
            _ => Handled,
        }
    }

    #[state]
    fn succeeded(&mut self, event: &PollEvent) -> Outcome<State> {
        trace!(?event, "Run already succeeded");
        Handled
    }

    #[state]
    fn failed(&mut self, event: &PollEvent) -> Outcome<State> {
        trace!(?event, "Run already failed");
        Handled
    }

    #[state]
    fn timed_out(&mut self, event: &PollEvent) -> Outcome<State> {
        trace!(?event, "Run already timed out");
        Handled
    }
}

fn is_terminal(state: &State) -> bool {
    matches!(
        state,
        State::Succeeded { .. } | State::Failed { .. } | State::TimedOut { .. }
    )
}

/// Sleep/poll loop driven by a [`PollPolicy`]
#[derive(Debug, Clone, Default)]
pub struct PollingWatcher {
    policy: PollPolicy,
}

impl PollingWatcher {
    pub fn new(mut policy: PollPolicy) -> Self {
        policy.interval = policy.interval.max(MIN_POLL_INTERVAL);
        Self { policy }
    }

    pub fn policy(&self) -> &PollPolicy {
        &self.policy
    }
}

async fn check_errors(engine: &dyn WorkflowEngine, run_id: RunId) -> Vec<String> {
    match engine.execution_errors(run_id).await {
        Ok(errors) => errors.into_iter().map(|e| e.description).collect(),
        Err(err) => {
            warn!(run_id = %run_id, error = %err, "Failed to query execution errors");
            vec![format!("failed to query execution errors: {err}")]
        }
    }
}

#[async_trait]
impl CompletionWatcher for PollingWatcher {
    async fn await_completion(
        &self,
        engine: &dyn WorkflowEngine,
        fs: &dyn FileSystemOperations,
        run_id: RunId,
        marker: &Path,
    ) -> Completion {
        let started = Instant::now();
        let mut machine = PollTracker::new(self.policy.ceiling).state_machine();
        let mut errors = check_errors(engine, run_id).await;
        machine.handle(&PollEvent::ErrorsChecked {
            found: !errors.is_empty(),
        });

        let mut iteration: u32 = 0;
        while !is_terminal(machine.state()) {
            if fs.exists(marker).await {
                machine.handle(&PollEvent::MarkerChecked { present: true });
                continue;
            }

            tokio::time::sleep(self.policy.interval).await;
            iteration = iteration.wrapping_add(1);

            if self.policy.error_check_due(iteration) {
                errors = check_errors(engine, run_id).await;
                machine.handle(&PollEvent::ErrorsChecked {
                    found: !errors.is_empty(),
                });
            }

            machine.handle(&PollEvent::Slept {
                waited: started.elapsed(),
            });
        }

        let waited = started.elapsed();
        debug!(run_id = %run_id, iterations = iteration, waited_ms = waited.as_millis() as u64, "Finished waiting for run");

        match machine.state() {
            State::Succeeded { .. } => Completion::Succeeded { waited },
            State::TimedOut { .. } => Completion::TimedOut { waited },
            _ => Completion::Failed { errors },
        }
    }
}
