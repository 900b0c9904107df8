//! Compiling the project's C sources.

use super::{classify, container_path, require_local, FailureReason, Stage, StageContext, StagePlan};
use crate::core::{CommandSpec, ExecutionMode, ShellScript, StageKind, StageOutcome, BUILD_DIR};
use crate::errors::PreconditionError;
use crate::project::scanner;
use std::path::PathBuf;

const EMIT_LLVM_FLAGS: [&str; 2] = ["-emit-llvm", "-S"];

/// Compiles every `.c` file of the project into one output.
///
/// With `emit_llvm` the output is the LLVM intermediate form
/// `<bin>.bc`, otherwise the native binary `<bin>`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompileC {
    /// Produce LLVM intermediate form instead of a native binary.
    pub emit_llvm: bool,
}

impl CompileC {
    /// Compiles to a native binary.
    #[must_use]
    pub fn native() -> Self {
        Self { emit_llvm: false }
    }

    /// Compiles to LLVM intermediate form.
    #[must_use]
    pub fn intermediate() -> Self {
        Self { emit_llvm: true }
    }

    fn output(&self, ctx: &StageContext<'_>) -> PathBuf {
        if self.emit_llvm {
            ctx.project.intermediate()
        } else {
            ctx.project.binary()
        }
    }

    fn output_name(&self, ctx: &StageContext<'_>) -> String {
        if self.emit_llvm {
            ctx.project.intermediate_name()
        } else {
            ctx.project.binary_name().to_string()
        }
    }
}

impl Stage for CompileC {
    type Artifact = PathBuf;

    fn kind(&self) -> StageKind {
        StageKind::CompileC
    }

    fn plan(&self, ctx: &StageContext<'_>) -> Result<StagePlan, PreconditionError> {
        let clang = &ctx.config.clang_path;
        require_local(ctx, clang, |path| PreconditionError::ClangNotFound { path })?;

        let sources = scanner::c_sources(ctx.project.root());
        if sources.is_empty() {
            return Err(PreconditionError::NoCSources {
                root: ctx.project.root().to_path_buf(),
            });
        }

        let flags: &[&str] = if self.emit_llvm { &EMIT_LLVM_FLAGS } else { &[] };
        let command = match ctx.mode() {
            ExecutionMode::Local => sources
                .iter()
                .fold(CommandSpec::new(clang).args(flags.iter().copied()), |cmd, source| {
                    cmd.path_arg(source)
                })
                .arg("-o")
                .path_arg(&self.output(ctx)),
            ExecutionMode::Containerized => {
                let script = ShellScript::new("clang")
                    .args(flags)
                    .args(sources.iter().map(|source| container_path(ctx, source)))
                    .arg("-o")
                    .arg(format!("{BUILD_DIR}/{}", self.output_name(ctx)));
                CommandSpec::containerized(&ctx.config.container, ctx.project.root(), None, &script)
            }
        };

        Ok(StagePlan::new(command))
    }

    fn success_summary(&self) -> Option<&'static str> {
        Some("Successfully compiled C files")
    }

    fn failure_summary(&self) -> &'static str {
        "Errors while compiling C files"
    }

    fn interpret(
        &self,
        ctx: &StageContext<'_>,
        _plan: &StagePlan,
        outcome: &StageOutcome,
    ) -> Result<PathBuf, FailureReason> {
        classify(outcome)?;
        Ok(self.output(ctx))
    }
}
