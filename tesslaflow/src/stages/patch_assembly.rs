//! Instrumenting the intermediate form with function-call hooks.

use super::{classify, require_local, FailureReason, Stage, StageContext, StagePlan};
use crate::core::{CommandSpec, ExecutionMode, ShellScript, StageKind, StageOutcome, BUILD_DIR};
use crate::errors::PreconditionError;
use crate::project::{scanner, tracked_functions_in_file};
use std::path::PathBuf;

const INSTRUMENT_PASS: &str = "-instrument_function_calls";
const INSTRUMENTATION_LIB_NAME: &str = "libInstrumentFunctions.so";

/// Runs `opt` with the instrumentation pass over `<bin>.bc`, writing
/// `instrumented_<bin>.bc`.
///
/// Every function the specification tracks is passed as
/// `-instrument <name>`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PatchAssembly;

impl PatchAssembly {
    fn instrument_args(ctx: &StageContext<'_>) -> Result<Vec<String>, PreconditionError> {
        let Some(spec) = scanner::spec_files(ctx.project.root()).into_iter().next() else {
            return Ok(Vec::new());
        };
        let functions = tracked_functions_in_file(&spec).map_err(|err| {
            PreconditionError::UnreadableSpecification {
                path: spec.clone(),
                reason: err.to_string(),
            }
        })?;
        Ok(functions
            .into_iter()
            .flat_map(|name| ["-instrument".to_string(), name])
            .collect())
    }
}

impl Stage for PatchAssembly {
    type Artifact = PathBuf;

    fn kind(&self) -> StageKind {
        StageKind::PatchAssembly
    }

    fn plan(&self, ctx: &StageContext<'_>) -> Result<StagePlan, PreconditionError> {
        let lib = &ctx.config.lib_instrument_functions;
        require_local(ctx, lib, |path| {
            PreconditionError::InstrumentationLibraryNotFound { path }
        })?;
        let opt = ctx.config.opt_path();
        require_local(ctx, &opt, |path| PreconditionError::OptNotFound { path })?;

        let instrument = Self::instrument_args(ctx)?;
        let project = ctx.project;
        let command = match ctx.mode() {
            ExecutionMode::Local => CommandSpec::new(opt)
                .arg("-load")
                .path_arg(lib)
                .arg(INSTRUMENT_PASS)
                .path_arg(&project.intermediate())
                .args(instrument)
                .stdout_to(project.instrumented_intermediate()),
            ExecutionMode::Containerized => {
                let container = &ctx.config.container;
                let script = ShellScript::new(&format!("{}/opt", container.llvm_bin))
                    .arg("-load")
                    .arg(format!("{}/{INSTRUMENTATION_LIB_NAME}", container.instrument_dir))
                    .arg(INSTRUMENT_PASS)
                    .arg(format!("{BUILD_DIR}/{}", project.intermediate_name()))
                    .args(instrument)
                    .redirect_stdout(&format!(
                        "{BUILD_DIR}/{}.bc",
                        project.instrumented_binary_name()
                    ));
                CommandSpec::containerized(container, project.root(), None, &script)
            }
        };

        Ok(StagePlan::new(command))
    }

    fn success_summary(&self) -> Option<&'static str> {
        Some("Successfully patched Assembly")
    }

    fn failure_summary(&self) -> &'static str {
        "Errors while patching Assembly"
    }

    fn interpret(
        &self,
        ctx: &StageContext<'_>,
        _plan: &StagePlan,
        outcome: &StageOutcome,
    ) -> Result<PathBuf, FailureReason> {
        classify(outcome)?;
        Ok(ctx.project.instrumented_intermediate())
    }
}
