//! Stage kinds and execution modes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The toolchain stage a subprocess belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// Compile all C sources, natively or to LLVM intermediate form.
    CompileC,
    /// Run `opt` with the instrumentation pass over the intermediate form.
    PatchAssembly,
    /// Link the instrumented intermediate form into an executable.
    Assemble,
    /// Execute the instrumented binary to produce a trace.
    RunInstrumentedBinary,
    /// Execute the plain binary.
    RunBinary,
    /// Compile the TeSSLa specification to JSON.
    CompileSpecification,
    /// Feed trace and compiled specification into the TeSSLa server.
    RunVerificationServer,
}

impl StageKind {
    /// The channel stderr of this stage is reported on.
    #[must_use]
    pub fn error_channel(self) -> ErrorChannel {
        match self {
            Self::CompileSpecification | Self::RunVerificationServer => ErrorChannel::Specification,
            _ => ErrorChannel::C,
        }
    }

    /// Whether the stage runs a user program or monitor whose exit is announced on the console.
    #[must_use]
    pub fn announces_exit(self) -> bool {
        matches!(
            self,
            Self::RunBinary | Self::RunInstrumentedBinary | Self::RunVerificationServer
        )
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CompileC => write!(f, "compile_c"),
            Self::PatchAssembly => write!(f, "patch_assembly"),
            Self::Assemble => write!(f, "assemble"),
            Self::RunInstrumentedBinary => write!(f, "run_instrumented_binary"),
            Self::RunBinary => write!(f, "run_binary"),
            Self::CompileSpecification => write!(f, "compile_specification"),
            Self::RunVerificationServer => write!(f, "run_verification_server"),
        }
    }
}

/// Where streamed error text is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorChannel {
    /// Errors from the C toolchain and the user's program.
    C,
    /// Errors from the TeSSLa compiler and server.
    Specification,
}

/// Selects how every stage resolves tools and paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Host toolchain at configured paths.
    #[default]
    Local,
    /// Fixed in-container toolchain with the project mounted as a volume.
    Containerized,
}

impl ExecutionMode {
    /// Maps the `use_docker` switch onto a mode.
    #[must_use]
    pub fn from_use_docker(use_docker: bool) -> Self {
        if use_docker {
            Self::Containerized
        } else {
            Self::Local
        }
    }

    /// Returns true for [`Self::Local`].
    #[must_use]
    pub fn is_local(self) -> bool {
        matches!(self, Self::Local)
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Containerized => write!(f, "containerized"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_kind_display() {
        assert_eq!(StageKind::CompileC.to_string(), "compile_c");
        assert_eq!(
            StageKind::RunVerificationServer.to_string(),
            "run_verification_server"
        );
    }

    #[test]
    fn test_stage_kind_serialize_matches_display() {
        let json = serde_json::to_string(&StageKind::PatchAssembly).unwrap();
        assert_eq!(json, r#""patch_assembly""#);
    }

    #[test]
    fn test_error_channels() {
        assert_eq!(StageKind::CompileC.error_channel(), ErrorChannel::C);
        assert_eq!(
            StageKind::RunInstrumentedBinary.error_channel(),
            ErrorChannel::C
        );
        assert_eq!(
            StageKind::RunVerificationServer.error_channel(),
            ErrorChannel::Specification
        );
    }

    #[test]
    fn test_announces_exit() {
        assert!(StageKind::RunBinary.announces_exit());
        assert!(!StageKind::Assemble.announces_exit());
        assert!(!StageKind::CompileSpecification.announces_exit());
    }

    #[test]
    fn test_execution_mode_from_switch() {
        assert_eq!(ExecutionMode::from_use_docker(true), ExecutionMode::Containerized);
        assert_eq!(ExecutionMode::from_use_docker(false), ExecutionMode::Local);
        assert!(ExecutionMode::default().is_local());
    }
}
