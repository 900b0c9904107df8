//! What a finished subprocess left behind.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Exit information and captured output of one subprocess.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageOutcome {
    /// Exit code, when the process exited normally.
    pub exit_code: Option<i32>,
    /// Name of the terminating signal, when the process was killed.
    pub signal: Option<String>,
    /// Stdout chunks in arrival order.
    pub stdout_chunks: Vec<String>,
    /// Stderr chunks in arrival order.
    pub stderr_chunks: Vec<String>,
    /// Taken immediately before the spawn.
    pub started_at: DateTime<Utc>,
}

impl StageOutcome {
    /// Creates an outcome for a process that could not be started.
    #[must_use]
    pub fn spawn_failure(message: impl Into<String>, started_at: DateTime<Utc>) -> Self {
        Self {
            exit_code: None,
            signal: None,
            stdout_chunks: Vec::new(),
            stderr_chunks: vec![message.into()],
            started_at,
        }
    }

    /// Stdout as one string.
    #[must_use]
    pub fn stdout(&self) -> String {
        self.stdout_chunks.concat()
    }

    /// Stderr as one string.
    #[must_use]
    pub fn stderr(&self) -> String {
        self.stderr_chunks.concat()
    }

    /// Returns true if anything was written to stderr.
    #[must_use]
    pub fn has_stderr(&self) -> bool {
        self.stderr_chunks.iter().any(|chunk| !chunk.is_empty())
    }

    /// Line announcing how the process ended.
    #[must_use]
    pub fn exit_message(&self) -> Option<String> {
        match (&self.exit_code, &self.signal) {
            (Some(code), _) => Some(format!("Process exited with code {code}")),
            (None, Some(signal)) => Some(format!("Process was killed due to signal {signal}")),
            (None, None) => None,
        }
    }

    /// Applies the toolchain's success rule.
    ///
    /// A stage succeeds when nothing reached stderr and no signal ended the
    /// process. The exit code is not consulted.
    ///
    /// # Errors
    ///
    /// Returns the failure detail: the captured stderr, or the signal message
    /// when stderr is empty.
    pub fn classify(&self) -> Result<(), String> {
        if self.has_stderr() {
            return Err(self.stderr());
        }
        if let Some(ref signal) = self.signal {
            return Err(format!("Process was killed due to signal {signal}"));
        }
        Ok(())
    }
}
