//! Typed results of stages and workflows.

use crate::core::StageKind;
use crate::diagnostics::ParsedSpecError;
use serde::Serialize;

/// Why a stage did not succeed after its subprocess ran.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageFailure {
    /// The failing stage.
    pub stage: StageKind,
    /// Notification title.
    pub summary: String,
    /// Full detail, usually the captured stderr.
    pub detail: String,
    /// The command line that was run.
    pub command: String,
    /// Exit code, when the process exited normally.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    /// Terminating signal, when the process was killed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signal: Option<String>,
    /// A located specification error found in the detail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spec_error: Option<ParsedSpecError>,
}

impl StageFailure {
    /// Whether the process was killed, usually by cancellation.
    #[must_use]
    pub fn was_killed(&self) -> bool {
        self.signal.is_some()
    }
}

/// Result of a stage or of a whole workflow.
///
/// A workflow stops at the first failing stage and returns its failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum StageResult<T> {
    /// Every stage succeeded.
    Success(T),
    /// A stage failed; later stages did not run.
    Failure(StageFailure),
}

impl<T> StageResult<T> {
    /// Returns true on success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Returns true on failure.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }

    /// The success value.
    #[must_use]
    pub fn success(self) -> Option<T> {
        match self {
            Self::Success(value) => Some(value),
            Self::Failure(_) => None,
        }
    }

    /// The failure.
    #[must_use]
    pub fn failure(&self) -> Option<&StageFailure> {
        match self {
            Self::Success(_) => None,
            Self::Failure(failure) => Some(failure),
        }
    }

    /// Maps the success value.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> StageResult<U> {
        match self {
            Self::Success(value) => StageResult::Success(f(value)),
            Self::Failure(failure) => StageResult::Failure(failure),
        }
    }
}
