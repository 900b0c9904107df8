//! Events published to the editor or terminal front end.

use super::{ErrorChannel, ProjectContext, StageKind};
use crate::diagnostics::{FunctionOccurrence, ParsedSpecError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;

/// Everything the pipeline tells its collaborators.
///
/// Raw subprocess handles never leave the crate; front ends see only these.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// A stage is about to spawn its subprocess.
    StageStarted {
        /// The stage.
        stage: StageKind,
        /// The command line being run.
        command: String,
    },
    /// A stage completed successfully.
    StageSucceeded {
        /// The stage.
        stage: StageKind,
        /// Notification text.
        summary: String,
    },
    /// A stage's subprocess failed or produced unusable output.
    StageFailed {
        /// The stage.
        stage: StageKind,
        /// Notification title.
        summary: String,
        /// Full detail, usually stderr.
        detail: String,
    },
    /// A stage refused to start.
    PreconditionFailed {
        /// Notification title.
        title: String,
        /// Explanation.
        detail: String,
    },
    /// Something worth noting that does not stop the pipeline.
    Warning {
        /// Notification title.
        title: String,
        /// Explanation.
        detail: String,
    },
    /// Text for the console pane.
    Console {
        /// The text.
        text: String,
    },
    /// Stderr text of a stage.
    ErrorText {
        /// The stage that produced it.
        stage: StageKind,
        /// Which error pane it belongs to.
        channel: ErrorChannel,
        /// The text.
        text: String,
    },
    /// A command log entry.
    Log {
        /// The command line that was run.
        command: String,
        /// Result message, if any.
        message: Option<String>,
    },
    /// Which triggers the front end should offer.
    ControlsChanged {
        /// Whether pipeline-start actions are allowed.
        actions_enabled: bool,
        /// Whether the cancel action is allowed.
        cancel_enabled: bool,
    },
    /// The active project changed or disappeared.
    ActiveProjectChanged {
        /// The new project, if any.
        project: Option<ProjectContext>,
    },
    /// A file of the already active project was saved or opened.
    ProjectRefreshed {
        /// The active project.
        project: ProjectContext,
    },
    /// The specification compiler reported a located error.
    SpecError {
        /// The specification file.
        file: PathBuf,
        /// The parsed error.
        error: ParsedSpecError,
    },
    /// The specification compiled, so earlier error locations are stale.
    SpecErrorsCleared,
    /// Tracked functions that no C source mentions.
    UnusedFunctions {
        /// The specification file.
        file: PathBuf,
        /// Where each unused function is referenced.
        occurrences: Vec<FunctionOccurrence>,
    },
    /// The verification server finished.
    VerificationOutput {
        /// Server stdout chunks.
        output: Vec<String>,
        /// Taken immediately before the server was spawned.
        started_at: DateTime<Utc>,
    },
}

impl PipelineEvent {
    /// The event's type name, e.g. `stage_started`.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::StageStarted { .. } => "stage_started",
            Self::StageSucceeded { .. } => "stage_succeeded",
            Self::StageFailed { .. } => "stage_failed",
            Self::PreconditionFailed { .. } => "precondition_failed",
            Self::Warning { .. } => "warning",
            Self::Console { .. } => "console",
            Self::ErrorText { .. } => "error_text",
            Self::Log { .. } => "log",
            Self::ControlsChanged { .. } => "controls_changed",
            Self::ActiveProjectChanged { .. } => "active_project_changed",
            Self::ProjectRefreshed { .. } => "project_refreshed",
            Self::SpecError { .. } => "spec_error",
            Self::SpecErrorsCleared => "spec_errors_cleared",
            Self::UnusedFunctions { .. } => "unused_functions",
            Self::VerificationOutput { .. } => "verification_output",
        }
    }

    /// Creates a console event.
    #[must_use]
    pub fn console(text: impl Into<String>) -> Self {
        Self::Console { text: text.into() }
    }

    /// Creates a stderr event tagged with the stage's channel.
    #[must_use]
    pub fn error_text(stage: StageKind, text: impl Into<String>) -> Self {
        Self::ErrorText {
            stage,
            channel: stage.error_channel(),
            text: text.into(),
        }
    }

    /// Creates a log entry for a command.
    #[must_use]
    pub fn log(command: impl Into<String>, message: Option<String>) -> Self {
        Self::Log {
            command: command.into(),
            message,
        }
    }

    /// Creates a warning.
    #[must_use]
    pub fn warning(title: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Warning {
            title: title.into(),
            detail: detail.into(),
        }
    }

    /// Controls while a subprocess runs (`busy`) or after it exits.
    #[must_use]
    pub fn controls(busy: bool) -> Self {
        Self::ControlsChanged {
            actions_enabled: !busy,
            cancel_enabled: busy,
        }
    }

    /// Serializes the event payload.
    #[must_use]
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_matches_serialized_tag() {
        let events = [
            PipelineEvent::console("hi"),
            PipelineEvent::error_text(StageKind::CompileC, "oops"),
            PipelineEvent::controls(true),
            PipelineEvent::SpecErrorsCleared,
        ];

        for event in events {
            let value = event.to_value();
            assert_eq!(value["type"], event.event_type());
        }
    }

    #[test]
    fn test_error_text_uses_stage_channel() {
        let event = PipelineEvent::error_text(StageKind::RunVerificationServer, "bad trace");
        assert_eq!(
            event,
            PipelineEvent::ErrorText {
                stage: StageKind::RunVerificationServer,
                channel: ErrorChannel::Specification,
                text: "bad trace".to_string(),
            }
        );
    }

    #[test]
    fn test_controls() {
        assert_eq!(
            PipelineEvent::controls(true),
            PipelineEvent::ControlsChanged {
                actions_enabled: false,
                cancel_enabled: true
            }
        );
        assert_eq!(
            PipelineEvent::controls(false),
            PipelineEvent::ControlsChanged {
                actions_enabled: true,
                cancel_enabled: false
            }
        );
    }

    #[test]
    fn test_project_event_serialization() {
        let event = PipelineEvent::ActiveProjectChanged {
            project: Some(ProjectContext::from_root("/p/demo")),
        };
        let value = event.to_value();

        assert_eq!(value["project"]["binary_name"], "demo");
        assert_eq!(value["project"]["output_dir"], "/p/demo/build");
    }
}
