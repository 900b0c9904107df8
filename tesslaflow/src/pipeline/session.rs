//! Shared state of one pipeline front end.

use crate::config::ToolchainConfig;
use crate::core::{PipelineEvent, ProjectContext};
use crate::events::EventSink;
use crate::process::{ProcessGuard, ProcessRunner};
use crate::project::ProjectTracker;
use std::sync::Arc;
use uuid::Uuid;

/// Everything the workflows share: configuration, the process slot, the
/// event sink and the active project.
///
/// One session per front end. Two sessions never see each other's processes.
pub struct PipelineSession {
    id: Uuid,
    config: ToolchainConfig,
    guard: Arc<ProcessGuard>,
    sink: Arc<dyn EventSink>,
    runner: ProcessRunner,
    tracker: ProjectTracker,
}

impl std::fmt::Debug for PipelineSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineSession")
            .field("id", &self.id)
            .field("config", &self.config)
            .field("guard", &self.guard)
            .field("tracker", &self.tracker)
            .finish_non_exhaustive()
    }
}

impl PipelineSession {
    /// Creates a session publishing to `sink`.
    #[must_use]
    pub fn new(config: ToolchainConfig, sink: Arc<dyn EventSink>) -> Self {
        Self {
            id: Uuid::new_v4(),
            config,
            guard: Arc::new(ProcessGuard::new()),
            runner: ProcessRunner::new(Arc::clone(&sink)),
            sink,
            tracker: ProjectTracker::new(),
        }
    }

    /// The session id, used in log fields.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The toolchain configuration.
    #[must_use]
    pub fn config(&self) -> &ToolchainConfig {
        &self.config
    }

    /// The process slot.
    #[must_use]
    pub fn guard(&self) -> &Arc<ProcessGuard> {
        &self.guard
    }

    /// The runner spawning stage commands.
    #[must_use]
    pub fn runner(&self) -> &ProcessRunner {
        &self.runner
    }

    /// The active-project tracker.
    #[must_use]
    pub fn tracker(&self) -> &ProjectTracker {
        &self.tracker
    }

    /// The active project.
    #[must_use]
    pub fn project(&self) -> Option<ProjectContext> {
        self.tracker.current()
    }

    /// Publishes an event.
    pub async fn emit(&self, event: PipelineEvent) {
        self.sink.emit(&event).await;
    }

    /// Kills the running subprocess, if any.
    ///
    /// The workflow that spawned it then fails with the kill signal.
    pub fn cancel(&self) -> bool {
        self.guard.cancel()
    }
}
