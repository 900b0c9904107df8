//! Compiling the TeSSLa specification into its JSON monitor description.

use super::{container_path, require_local, FailureReason, Stage, StageContext, StagePlan};
use crate::core::{CommandSpec, ExecutionMode, ShellScript, StageKind, StageOutcome};
use crate::diagnostics::extract_spec_error;
use crate::errors::PreconditionError;
use crate::project::scanner;
use serde::Serialize;
use std::path::PathBuf;
use tracing::debug;

/// The persisted compiler output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledSpecification {
    /// Where the JSON was written.
    pub path: PathBuf,
    /// The specification file that was compiled.
    pub source: Option<PathBuf>,
    /// The parsed document.
    pub document: serde_json::Value,
}

/// Drops the stray comma the compiler sometimes emits right before the last
/// character of its output.
///
/// Only the character immediately before the final one is inspected, and at
/// most that one character is removed.
#[must_use]
pub fn normalize_compiled_spec(stdout: &str) -> String {
    let mut chars: Vec<char> = stdout.chars().collect();
    if chars.len() >= 2 && chars[chars.len() - 2] == ',' {
        chars.remove(chars.len() - 2);
    }
    chars.into_iter().collect()
}

/// Runs the TeSSLa compiler on the project's specification file and writes
/// `instrumented_<bin>.tessla.json`.
///
/// Unlike the other stages, success is judged by stdout: it must hold a JSON
/// object.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompileSpecification;

impl Stage for CompileSpecification {
    type Artifact = CompiledSpecification;

    fn kind(&self) -> StageKind {
        StageKind::CompileSpecification
    }

    fn plan(&self, ctx: &StageContext<'_>) -> Result<StagePlan, PreconditionError> {
        let jar = &ctx.config.tessla_compiler;
        require_local(ctx, jar, |path| PreconditionError::CompilerNotFound { path })?;

        let specs = scanner::spec_files(ctx.project.root());
        let Some(spec) = specs.first() else {
            return Err(PreconditionError::NoSpecification {
                root: ctx.project.root().to_path_buf(),
            });
        };

        let command = match ctx.mode() {
            ExecutionMode::Local => CommandSpec::new(&ctx.config.java_path)
                .arg("-jar")
                .path_arg(jar)
                .path_arg(spec),
            ExecutionMode::Containerized => {
                let container = &ctx.config.container;
                let script = ShellScript::new("java")
                    .arg("-jar")
                    .arg(&container.compiler_jar)
                    .arg(container_path(ctx, spec));
                CommandSpec::containerized(container, ctx.project.root(), None, &script)
            }
        };

        let mut plan = StagePlan::new(command).with_input(spec);
        if specs.len() > 1 {
            plan = plan.with_warning(
                "Found more than one TeSSLa file",
                format!(
                    "Found {} TeSSLa files in '{}'. Only '{}' is compiled.",
                    specs.len(),
                    ctx.project.root().display(),
                    ctx.project.relativize(spec).display()
                ),
            );
        }
        Ok(plan)
    }

    fn echo_stdout(&self) -> bool {
        false
    }

    fn success_summary(&self) -> Option<&'static str> {
        Some("Successfully compiled TeSSLa file")
    }

    fn failure_summary(&self) -> &'static str {
        "Errors while compiling TeSSLa file"
    }

    fn interpret(
        &self,
        ctx: &StageContext<'_>,
        plan: &StagePlan,
        outcome: &StageOutcome,
    ) -> Result<CompiledSpecification, FailureReason> {
        let stdout = outcome.stdout();
        let stderr = outcome.stderr();

        if let Some(ref signal) = outcome.signal {
            return Err(FailureReason::new(format!(
                "{stderr}{stdout}Process was killed due to signal {signal}"
            )));
        }
        if !stdout.starts_with('{') {
            let detail = format!("{stderr}{stdout}");
            return Err(FailureReason {
                spec_error: extract_spec_error(&detail),
                detail,
            });
        }

        let normalized = normalize_compiled_spec(&stdout);
        let document: serde_json::Value = serde_json::from_str(&normalized).map_err(|err| {
            FailureReason::new(format!(
                "The TeSSLa compiler produced invalid JSON: {err}\n{stderr}{stdout}"
            ))
        })?;

        let path = ctx.project.compiled_spec();
        std::fs::write(&path, &normalized).map_err(|err| {
            FailureReason::new(format!("Failed to write '{}': {err}", path.display()))
        })?;
        debug!(path = %path.display(), "Wrote compiled specification");

        Ok(CompiledSpecification {
            path,
            source: plan.input.clone(),
            document,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::diagnostics::Position;
    use pretty_assertions::assert_eq;

    const SPEC: &str = "define x := function_calls(\"main\")\nout x\n";

    #[test]
    fn test_normalize_trailing_comma() {
        assert_eq!(
            normalize_compiled_spec("{\"items\":[1],}"),
            "{\"items\":[1]}"
        );
        assert_eq!(normalize_compiled_spec("{\"items\":[]},\n"), "{\"items\":[]}\n");
        assert_eq!(normalize_compiled_spec("{\"items\":[]}"), "{\"items\":[]}");
        assert_eq!(normalize_compiled_spec("{\"a\":1,\"b\":2}\n"), "{\"a\":1,\"b\":2}\n");
        assert_eq!(normalize_compiled_spec(","), ",");
        assert_eq!(normalize_compiled_spec(""), "");
    }

    #[test]
    fn test_local_command() {
        let fixture = Fixture::new(&[("spec.tessla", SPEC)]);
        let plan = CompileSpecification.plan(&fixture.ctx()).unwrap();

        let spec = fixture.root().join("spec.tessla");
        assert_eq!(plan.command.program, PathBuf::from("java"));
        assert_eq!(
            plan.command.args,
            vec![
                "-jar".to_string(),
                fixture.config.tessla_compiler.to_string_lossy().into_owned(),
                spec.to_string_lossy().into_owned(),
            ]
        );
        assert_eq!(plan.input, Some(spec));
        assert!(plan.warnings.is_empty());
        assert!(!CompileSpecification.echo_stdout());
    }

    #[test]
    fn test_containerized_command() {
        let fixture = Fixture::new(&[("specs/monitor.tessla", SPEC)]).docker();
        let plan = CompileSpecification.plan(&fixture.ctx()).unwrap();

        assert_eq!(
            plan.command.args.last().unwrap(),
            "cd /tessla && java -jar /tessla-imdea-snapshot.jar specs/monitor.tessla"
        );
    }

    #[test]
    fn test_several_specs_warn_and_use_first() {
        let fixture = Fixture::new(&[("b.tessla", SPEC), ("a.tessla", SPEC)]);
        let plan = CompileSpecification.plan(&fixture.ctx()).unwrap();

        assert_eq!(plan.input, Some(fixture.root().join("a.tessla")));
        assert_eq!(plan.warnings.len(), 1);
        assert!(plan.warnings[0].detail.contains("a.tessla"));
    }

    #[test]
    fn test_preconditions() {
        let fixture = Fixture::new(&[("main.c", "")]);
        assert!(matches!(
            CompileSpecification.plan(&fixture.ctx()).unwrap_err(),
            PreconditionError::NoSpecification { .. }
        ));

        let mut fixture = Fixture::new(&[("spec.tessla", SPEC)]);
        fixture.config = fixture.config.clone().with_tessla_compiler("/missing.jar");
        assert!(matches!(
            CompileSpecification.plan(&fixture.ctx()).unwrap_err(),
            PreconditionError::CompilerNotFound { .. }
        ));
    }

    #[test]
    fn test_interpret_persists_normalized_json() {
        let fixture = Fixture::new(&[("spec.tessla", SPEC)]);
        let plan = CompileSpecification.plan(&fixture.ctx()).unwrap();

        let compiled = CompileSpecification
            .interpret(
                &fixture.ctx(),
                &plan,
                &outcome("{\"items\":[{\"id\":1,\"name\":\"x\",\"out\":true}],}", ""),
            )
            .unwrap();

        assert_eq!(compiled.path, fixture.project.compiled_spec());
        assert_eq!(compiled.source, plan.input);
        assert_eq!(compiled.document["items"][0]["name"], "x");
        assert_eq!(
            std::fs::read_to_string(&compiled.path).unwrap(),
            "{\"items\":[{\"id\":1,\"name\":\"x\",\"out\":true}]}"
        );
    }

    #[test]
    fn test_interpret_keeps_clean_output_unchanged() {
        let fixture = Fixture::new(&[("spec.tessla", SPEC)]);
        let plan = CompileSpecification.plan(&fixture.ctx()).unwrap();

        let compiled = CompileSpecification
            .interpret(&fixture.ctx(), &plan, &outcome("{\"items\":[]}", ""))
            .unwrap();
        assert_eq!(
            std::fs::read_to_string(compiled.path).unwrap(),
            "{\"items\":[]}"
        );
    }

    #[test]
    fn test_stderr_alone_does_not_fail() {
        let fixture = Fixture::new(&[("spec.tessla", SPEC)]);
        let plan = CompileSpecification.plan(&fixture.ctx()).unwrap();

        assert!(CompileSpecification
            .interpret(
                &fixture.ctx(),
                &plan,
                &outcome("{\"items\":[]}", "Picked up JAVA_TOOL_OPTIONS\n")
            )
            .is_ok());
    }

    #[test]
    fn test_compiler_error_is_located() {
        let fixture = Fixture::new(&[("spec.tessla", SPEC)]);
        let plan = CompileSpecification.plan(&fixture.ctx()).unwrap();

        let failure = CompileSpecification
            .interpret(
                &fixture.ctx(),
                &plan,
                &outcome("", "ParserError((3,5 - 3,10): unexpected token)\n"),
            )
            .unwrap_err();

        assert_eq!(failure.detail, "ParserError((3,5 - 3,10): unexpected token)\n");
        let error = failure.spec_error.unwrap();
        assert_eq!(error.start, Position::new(2, 4));
        assert_eq!(error.end, Position::new(2, 9));
        assert!(!fixture.project.compiled_spec().exists());
    }

    #[test]
    fn test_non_json_stdout_fails_without_location() {
        let fixture = Fixture::new(&[("spec.tessla", SPEC)]);
        let plan = CompileSpecification.plan(&fixture.ctx()).unwrap();

        let failure = CompileSpecification
            .interpret(&fixture.ctx(), &plan, &outcome("Usage: tessla <file>\n", ""))
            .unwrap_err();
        assert_eq!(failure.detail, "Usage: tessla <file>\n");
        assert!(failure.spec_error.is_none());
    }

    #[test]
    fn test_invalid_json_fails() {
        let fixture = Fixture::new(&[("spec.tessla", SPEC)]);
        let plan = CompileSpecification.plan(&fixture.ctx()).unwrap();

        let failure = CompileSpecification
            .interpret(&fixture.ctx(), &plan, &outcome("{\"items\": [", ""))
            .unwrap_err();
        assert!(failure.detail.contains("invalid JSON"));
    }

    #[test]
    fn test_killed_compiler_fails() {
        let fixture = Fixture::new(&[("spec.tessla", SPEC)]);
        let plan = CompileSpecification.plan(&fixture.ctx()).unwrap();

        let failure = CompileSpecification
            .interpret(&fixture.ctx(), &plan, &killed())
            .unwrap_err();
        assert!(failure.detail.contains("killed due to signal SIGKILL"));
    }
}
