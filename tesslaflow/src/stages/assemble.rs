//! Linking the instrumented intermediate form.

use super::{classify, require_local, FailureReason, Stage, StageContext, StagePlan};
use crate::core::{CommandSpec, ExecutionMode, ShellScript, StageKind, StageOutcome, BUILD_DIR};
use crate::errors::PreconditionError;
use std::path::PathBuf;

const SYSTEM_LIB_DIR: &str = "-L/usr/local/lib";
const TRACING_LIBS: [&str; 2] = ["-lzlog", "-lpthread"];

/// Links `instrumented_<bin>.bc` against the tracing runtime into
/// `instrumented_<bin>`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Assemble;

impl Stage for Assemble {
    type Artifact = PathBuf;

    fn kind(&self) -> StageKind {
        StageKind::Assemble
    }

    fn plan(&self, ctx: &StageContext<'_>) -> Result<StagePlan, PreconditionError> {
        let clang = &ctx.config.clang_path;
        require_local(ctx, clang, |path| PreconditionError::ClangNotFound { path })?;
        require_local(ctx, &ctx.config.lib_instrument_functions, |path| {
            PreconditionError::InstrumentationLibraryNotFound { path }
        })?;

        let project = ctx.project;
        let command = match ctx.mode() {
            ExecutionMode::Local => CommandSpec::new(clang)
                .path_arg(&project.instrumented_intermediate())
                .arg("-o")
                .path_arg(&project.instrumented_binary())
                .args(TRACING_LIBS)
                .arg(SYSTEM_LIB_DIR)
                .arg(format!(
                    "-L{}",
                    ctx.config.instrumentation_lib_dir().display()
                ))
                .arg("-llogger"),
            ExecutionMode::Containerized => {
                let container = &ctx.config.container;
                let binary = format!("{BUILD_DIR}/{}", project.instrumented_binary_name());
                let script = ShellScript::new("clang++")
                    .arg(format!("{binary}.bc"))
                    .arg("-o")
                    .arg(&binary)
                    .args(TRACING_LIBS)
                    .arg(SYSTEM_LIB_DIR)
                    .arg(format!("-L{}", container.instrument_dir))
                    .arg("-lLogger");
                CommandSpec::containerized(container, project.root(), None, &script)
            }
        };

        Ok(StagePlan::new(command))
    }

    fn success_summary(&self) -> Option<&'static str> {
        Some("Successfully compiled Assembly")
    }

    fn failure_summary(&self) -> &'static str {
        "Errors while compiling Assembly"
    }

    fn interpret(
        &self,
        ctx: &StageContext<'_>,
        _plan: &StagePlan,
        outcome: &StageOutcome,
    ) -> Result<PathBuf, FailureReason> {
        classify(outcome)?;
        Ok(ctx.project.instrumented_binary())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_local_command() {
        let fixture = Fixture::new(&[("main.c", "")]);
        let plan = Assemble.plan(&fixture.ctx()).unwrap();
        let project = &fixture.project;

        assert_eq!(plan.command.program, fixture.config.clang_path);
        assert_eq!(
            plan.command.args,
            vec![
                project.instrumented_intermediate().to_string_lossy().into_owned(),
                "-o".to_string(),
                project.instrumented_binary().to_string_lossy().into_owned(),
                "-lzlog".to_string(),
                "-lpthread".to_string(),
                "-L/usr/local/lib".to_string(),
                format!("-L{}", fixture.tools().display()),
                "-llogger".to_string(),
            ]
        );
    }

    #[test]
    fn test_containerized_command() {
        let fixture = Fixture::new(&[("main.c", "")]).docker();
        let plan = Assemble.plan(&fixture.ctx()).unwrap();

        assert_eq!(
            plan.command.args.last().unwrap(),
            "cd /tessla && clang++ build/instrumented_demo_project.bc -o build/instrumented_demo_project \
             -lzlog -lpthread -L/usr/local/lib -L/InstrumentFunctions -lLogger"
        );
    }

    #[test]
    fn test_preconditions() {
        let mut fixture = Fixture::new(&[("main.c", "")]);
        fixture.config = fixture.config.clone().with_clang_path("/missing/clang");
        assert!(matches!(
            Assemble.plan(&fixture.ctx()).unwrap_err(),
            PreconditionError::ClangNotFound { .. }
        ));

        let mut fixture = Fixture::new(&[("main.c", "")]);
        fixture.config = fixture
            .config
            .clone()
            .with_lib_instrument_functions("/missing/lib.so");
        assert!(matches!(
            Assemble.plan(&fixture.ctx()).unwrap_err(),
            PreconditionError::InstrumentationLibraryNotFound { .. }
        ));
    }

    #[test]
    fn test_interpret() {
        let fixture = Fixture::new(&[("main.c", "")]);
        let plan = Assemble.plan(&fixture.ctx()).unwrap();

        assert_eq!(
            Assemble
                .interpret(&fixture.ctx(), &plan, &outcome("", ""))
                .unwrap(),
            fixture.project.instrumented_binary()
        );
        assert!(Assemble
            .interpret(&fixture.ctx(), &plan, &outcome("", "ld: cannot find -lzlog"))
            .is_err());
    }
}
