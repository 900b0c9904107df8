//! Running the compiled programs.

use super::{classify, require_local, FailureReason, Stage, StageContext, StagePlan};
use crate::core::{CommandSpec, ExecutionMode, ShellScript, StageKind, StageOutcome, BUILD_DIR};
use crate::errors::PreconditionError;
use std::io;
use std::path::PathBuf;
use tracing::debug;

fn in_build_dir(ctx: &StageContext<'_>, local: PathBuf, name: &str) -> CommandSpec {
    match ctx.mode() {
        ExecutionMode::Local => CommandSpec::new(local).working_dir(ctx.project.output_dir()),
        ExecutionMode::Containerized => CommandSpec::containerized(
            &ctx.config.container,
            ctx.project.root(),
            Some(BUILD_DIR),
            &ShellScript::new(&format!("./{name}")),
        ),
    }
}

/// Runs the plain binary `<bin>` built by a native C compile.
///
/// Succeeds with the collected stdout.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunBinary;

impl Stage for RunBinary {
    type Artifact = String;

    fn kind(&self) -> StageKind {
        StageKind::RunBinary
    }

    fn plan(&self, ctx: &StageContext<'_>) -> Result<StagePlan, PreconditionError> {
        let binary = ctx.project.binary();
        require_local(ctx, &binary, |path| PreconditionError::BinaryNotFound { path })?;
        Ok(StagePlan::new(in_build_dir(
            ctx,
            binary,
            ctx.project.binary_name(),
        )))
    }

    fn success_summary(&self) -> Option<&'static str> {
        None
    }

    fn failure_summary(&self) -> &'static str {
        "Errors while running the C binary"
    }

    fn interpret(
        &self,
        _ctx: &StageContext<'_>,
        _plan: &StagePlan,
        outcome: &StageOutcome,
    ) -> Result<String, FailureReason> {
        classify(outcome)?;
        Ok(outcome.stdout())
    }
}

/// Runs `instrumented_<bin>` from the build directory so it picks up
/// `zlog.conf`, producing a fresh trace file.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunInstrumentedBinary;

impl Stage for RunInstrumentedBinary {
    type Artifact = PathBuf;

    fn kind(&self) -> StageKind {
        StageKind::RunInstrumentedBinary
    }

    fn plan(&self, ctx: &StageContext<'_>) -> Result<StagePlan, PreconditionError> {
        let binary = ctx.project.instrumented_binary();
        require_local(ctx, &binary, |path| PreconditionError::BinaryNotFound { path })?;
        Ok(StagePlan::new(in_build_dir(
            ctx,
            binary,
            &ctx.project.instrumented_binary_name(),
        )))
    }

    fn before_spawn(&self, ctx: &StageContext<'_>) -> io::Result<()> {
        let trace = ctx.project.trace_file();
        match std::fs::remove_file(&trace) {
            Ok(()) => {
                debug!(trace = %trace.display(), "Removed previous trace");
                Ok(())
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err),
        }
    }

    fn success_summary(&self) -> Option<&'static str> {
        None
    }

    fn failure_summary(&self) -> &'static str {
        "Errors while running the patched binary"
    }

    fn interpret(
        &self,
        ctx: &StageContext<'_>,
        _plan: &StagePlan,
        outcome: &StageOutcome,
    ) -> Result<PathBuf, FailureReason> {
        classify(outcome)?;
        Ok(ctx.project.trace_file())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_run_binary_requires_binary() {
        let fixture = Fixture::new(&[("main.c", "")]);
        match RunBinary.plan(&fixture.ctx()).unwrap_err() {
            PreconditionError::BinaryNotFound { path } => assert_eq!(path, fixture.project.binary()),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_run_binary_local_command() {
        let fixture = Fixture::new(&[("build/demo_project", "")]);
        let plan = RunBinary.plan(&fixture.ctx()).unwrap();

        assert_eq!(plan.command.program, fixture.project.binary());
        assert!(plan.command.args.is_empty());
        assert_eq!(
            plan.command.working_dir.as_deref(),
            Some(fixture.project.output_dir())
        );
    }

    #[test]
    fn test_run_binary_containerized_command() {
        let fixture = Fixture::new(&[]).docker();
        let plan = RunBinary.plan(&fixture.ctx()).unwrap();

        assert_eq!(
            plan.command.args.last().unwrap(),
            "cd /tessla/build && ./demo_project"
        );
    }

    #[test]
    fn test_run_binary_interpret_returns_stdout() {
        let fixture = Fixture::new(&[("build/demo_project", "")]);
        let plan = RunBinary.plan(&fixture.ctx()).unwrap();

        assert_eq!(
            RunBinary
                .interpret(&fixture.ctx(), &plan, &outcome("42\n", ""))
                .unwrap(),
            "42\n"
        );
        let failure = RunBinary
            .interpret(&fixture.ctx(), &plan, &killed())
            .unwrap_err();
        assert!(failure.detail.contains("SIGKILL"));
    }

    #[test]
    fn test_instrumented_command() {
        let fixture = Fixture::new(&[("build/instrumented_demo_project", "")]);
        let plan = RunInstrumentedBinary.plan(&fixture.ctx()).unwrap();

        assert_eq!(plan.command.program, fixture.project.instrumented_binary());
        assert_eq!(
            plan.command.working_dir.as_deref(),
            Some(fixture.project.output_dir())
        );

        let fixture = Fixture::new(&[]).docker();
        let plan = RunInstrumentedBinary.plan(&fixture.ctx()).unwrap();
        assert_eq!(
            plan.command.args.last().unwrap(),
            "cd /tessla/build && ./instrumented_demo_project"
        );
    }

    #[test]
    fn test_before_spawn_removes_stale_trace() {
        let fixture = Fixture::new(&[("build/instrumented_demo_project.trace", "old")]);
        let trace = fixture.project.trace_file();
        assert!(trace.exists());

        RunInstrumentedBinary.before_spawn(&fixture.ctx()).unwrap();
        assert!(!trace.exists());

        RunInstrumentedBinary.before_spawn(&fixture.ctx()).unwrap();
    }

    #[test]
    fn test_instrumented_interpret() {
        let fixture = Fixture::new(&[]);
        let plan = StagePlan::new(CommandSpec::new("x"));

        assert_eq!(
            RunInstrumentedBinary
                .interpret(&fixture.ctx(), &plan, &outcome("", ""))
                .unwrap(),
            fixture.project.trace_file()
        );
        assert!(RunInstrumentedBinary
            .interpret(&fixture.ctx(), &plan, &outcome("", "Segmentation fault"))
            .is_err());
    }
}
