//! Stage trait and the toolchain stages.
//!
//! A stage checks its preconditions and builds a command for the configured
//! execution mode ([`Stage::plan`]), then turns the finished subprocess into
//! an artifact or a failure ([`Stage::interpret`]). Spawning and sequencing
//! belong to the pipeline, so stages never touch processes.

mod assemble;
mod compile_c;
mod compile_spec;
mod patch_assembly;
mod run_binary;
mod run_server;

pub use assemble::Assemble;
pub use compile_c::CompileC;
pub use compile_spec::{normalize_compiled_spec, CompileSpecification, CompiledSpecification};
pub use patch_assembly::PatchAssembly;
pub use run_binary::{RunBinary, RunInstrumentedBinary};
pub use run_server::{
    parse_trace_outputs, RunVerificationServer, TraceOutputEntry, TraceValue, VerificationReport,
};

use crate::config::ToolchainConfig;
use crate::core::{CommandSpec, ExecutionMode, ProjectContext, StageKind, StageOutcome};
use crate::diagnostics::ParsedSpecError;
use crate::errors::PreconditionError;
use std::fmt::Debug;
use std::io;
use std::path::{Path, PathBuf};

/// What a stage sees while planning and interpreting.
#[derive(Debug, Clone, Copy)]
pub struct StageContext<'a> {
    /// The active project.
    pub project: &'a ProjectContext,
    /// Tool locations and switches.
    pub config: &'a ToolchainConfig,
}

impl<'a> StageContext<'a> {
    /// Creates a context.
    #[must_use]
    pub fn new(project: &'a ProjectContext, config: &'a ToolchainConfig) -> Self {
        Self { project, config }
    }

    /// The execution mode selected by the configuration.
    #[must_use]
    pub fn mode(&self) -> ExecutionMode {
        self.config.mode()
    }
}

/// A non-blocking remark made while planning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageWarning {
    /// Notification title.
    pub title: String,
    /// Explanation.
    pub detail: String,
}

/// A ready-to-run command plus what planning found out on the way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagePlan {
    /// The command to spawn.
    pub command: CommandSpec,
    /// The file the stage works on, when there is a single one.
    pub input: Option<PathBuf>,
    /// Remarks to publish before spawning.
    pub warnings: Vec<StageWarning>,
}

impl StagePlan {
    /// Creates a plan for `command`.
    #[must_use]
    pub fn new(command: CommandSpec) -> Self {
        Self {
            command,
            input: None,
            warnings: Vec::new(),
        }
    }

    /// Records the primary input file.
    #[must_use]
    pub fn with_input(mut self, input: impl Into<PathBuf>) -> Self {
        self.input = Some(input.into());
        self
    }

    /// Adds a warning.
    #[must_use]
    pub fn with_warning(mut self, title: impl Into<String>, detail: impl Into<String>) -> Self {
        self.warnings.push(StageWarning {
            title: title.into(),
            detail: detail.into(),
        });
        self
    }
}

/// Why a finished subprocess does not count as a success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureReason {
    /// Full detail shown to the user.
    pub detail: String,
    /// A located specification error found in the detail.
    pub spec_error: Option<ParsedSpecError>,
}

impl FailureReason {
    /// A failure without location information.
    #[must_use]
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
            spec_error: None,
        }
    }
}

/// One step of the toolchain.
pub trait Stage: Send + Sync + Debug {
    /// What a successful run produces.
    type Artifact;

    /// Which stage this is.
    fn kind(&self) -> StageKind;

    /// Checks preconditions and builds the command.
    fn plan(&self, ctx: &StageContext<'_>) -> Result<StagePlan, PreconditionError>;

    /// Prepares the file system right before spawning.
    fn before_spawn(&self, _ctx: &StageContext<'_>) -> io::Result<()> {
        Ok(())
    }

    /// Whether stdout is streamed to the console.
    fn echo_stdout(&self) -> bool {
        true
    }

    /// Notification text on success, if the stage announces success.
    fn success_summary(&self) -> Option<&'static str>;

    /// Notification title on failure.
    fn failure_summary(&self) -> &'static str;

    /// Classifies the finished subprocess.
    fn interpret(
        &self,
        ctx: &StageContext<'_>,
        plan: &StagePlan,
        outcome: &StageOutcome,
    ) -> Result<Self::Artifact, FailureReason>;
}

/// Fails with `missing` unless `path` exists. Only checked in local mode.
pub(crate) fn require_local(
    ctx: &StageContext<'_>,
    path: &Path,
    missing: impl FnOnce(PathBuf) -> PreconditionError,
) -> Result<(), PreconditionError> {
    if ctx.mode().is_local() && !path.exists() {
        return Err(missing(path.to_path_buf()));
    }
    Ok(())
}

/// The standard stderr-based classification.
pub(crate) fn classify(outcome: &StageOutcome) -> Result<(), FailureReason> {
    outcome.classify().map_err(FailureReason::new)
}

/// Path of `path` relative to the project root, as a container path.
pub(crate) fn container_path(ctx: &StageContext<'_>, path: &Path) -> String {
    ctx.project
        .relativize(path)
        .to_string_lossy()
        .replace('\\', "/")
}
