//! Feeding the trace and the compiled specification to the TeSSLa server.

use super::{classify, container_path, require_local, FailureReason, Stage, StageContext, StagePlan};
use crate::core::{CommandSpec, ExecutionMode, ShellScript, StageKind, StageOutcome, BUILD_DIR};
use crate::errors::PreconditionError;
use crate::project::scanner;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

/// An output stream of the compiled specification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceOutputEntry {
    /// The stream id, as the server expects it.
    pub stream_id: String,
    /// The stream name.
    pub stream_name: String,
}

impl TraceOutputEntry {
    /// The server argument selecting this stream, `<id>:<name>`.
    #[must_use]
    pub fn selector(&self) -> String {
        format!("{}:{}", self.stream_id, self.stream_name)
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn id_text(value: &Value) -> Option<String> {
    match value {
        Value::Number(number) => Some(number.to_string()),
        Value::String(text) if !text.is_empty() => Some(text.clone()),
        _ => None,
    }
}

fn output_entry(key: Option<&str>, item: &Value) -> Option<TraceOutputEntry> {
    if !item.get("out").is_some_and(truthy) {
        return None;
    }
    let stream_name = item
        .get("name")
        .and_then(Value::as_str)
        .filter(|name| !name.is_empty())?;
    let stream_id = item
        .get("id")
        .and_then(id_text)
        .or_else(|| key.map(str::to_string))?;

    Some(TraceOutputEntry {
        stream_id,
        stream_name: stream_name.to_string(),
    })
}

/// Lists the streams of a compiled specification marked as outputs.
///
/// `items` may be an array or an object keyed by stream; entries need a
/// truthy `out` flag and a non-empty `name`.
#[must_use]
pub fn parse_trace_outputs(document: &Value) -> Vec<TraceOutputEntry> {
    match document.get("items") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| output_entry(None, item))
            .collect(),
        Some(Value::Object(items)) => items
            .iter()
            .filter_map(|(key, item)| output_entry(Some(key), item))
            .collect(),
        _ => Vec::new(),
    }
}

/// One value reported by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceValue {
    /// Timestamp as printed by the server.
    pub time: String,
    /// Output stream name.
    pub stream: String,
    /// Printed value.
    pub value: String,
}

/// Server output of a verification run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationReport {
    /// Raw stdout chunks.
    pub output: Vec<String>,
    /// Taken immediately before the server was spawned.
    pub started_at: DateTime<Utc>,
}

impl VerificationReport {
    /// The full output text.
    #[must_use]
    pub fn text(&self) -> String {
        self.output.concat()
    }

    /// Output lines shaped `<time>: <stream> = <value>`, in order.
    ///
    /// Other lines are skipped.
    #[must_use]
    pub fn values(&self) -> Vec<TraceValue> {
        self.text()
            .lines()
            .filter_map(|line| {
                let (time, rest) = line.split_once(':')?;
                let (stream, value) = rest.split_once('=')?;
                let time = time.trim();
                let stream = stream.trim();
                if time.is_empty() || stream.is_empty() {
                    return None;
                }
                Some(TraceValue {
                    time: time.to_string(),
                    stream: stream.to_string(),
                    value: value.trim().to_string(),
                })
            })
            .collect()
    }
}

/// Runs the TeSSLa server over the last trace.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunVerificationServer;

impl RunVerificationServer {
    fn read_outputs(path: &Path) -> Result<Vec<TraceOutputEntry>, PreconditionError> {
        let invalid = |reason: String| PreconditionError::InvalidCompiledSpecification {
            path: path.to_path_buf(),
            reason,
        };
        let content = std::fs::read_to_string(path).map_err(|err| invalid(err.to_string()))?;
        let document: Value =
            serde_json::from_str(&content).map_err(|err| invalid(err.to_string()))?;
        Ok(parse_trace_outputs(&document))
    }
}

impl Stage for RunVerificationServer {
    type Artifact = VerificationReport;

    fn kind(&self) -> StageKind {
        StageKind::RunVerificationServer
    }

    fn plan(&self, ctx: &StageContext<'_>) -> Result<StagePlan, PreconditionError> {
        let server = &ctx.config.tessla_server;
        require_local(ctx, server, |path| PreconditionError::ServerNotFound { path })?;

        let output_dir = ctx.project.output_dir();
        let compiled = scanner::compiled_specs(output_dir);
        let Some(json) = compiled.first() else {
            return Err(PreconditionError::NoCompiledSpecification {
                dir: output_dir.to_path_buf(),
            });
        };
        let selectors: Vec<String> = Self::read_outputs(json)?
            .iter()
            .flat_map(|entry| ["-o".to_string(), entry.selector()])
            .collect();

        let command = match ctx.mode() {
            ExecutionMode::Local => CommandSpec::new(server)
                .path_arg(json)
                .arg("--trace")
                .path_arg(&ctx.project.trace_file())
                .args(selectors),
            ExecutionMode::Containerized => {
                let container = &ctx.config.container;
                let script = ShellScript::new(&container.server)
                    .env("LANG", "C.UTF-8")
                    .arg(container_path(ctx, json))
                    .arg("--trace")
                    .arg(format!("{BUILD_DIR}/{}", ctx.project.trace_file_name()))
                    .args(selectors);
                CommandSpec::containerized(container, ctx.project.root(), None, &script)
            }
        };

        let mut plan = StagePlan::new(command).with_input(json);
        if compiled.len() > 1 {
            plan = plan.with_warning(
                "Found more than one TeSSLa JSON file",
                format!(
                    "Found {} compiled TeSSLa files in '{}'. Only '{}' is used.",
                    compiled.len(),
                    output_dir.display(),
                    ctx.project.relativize(json).display()
                ),
            );
        }
        Ok(plan)
    }

    fn success_summary(&self) -> Option<&'static str> {
        None
    }

    fn failure_summary(&self) -> &'static str {
        "Errors while running TeSSLa server"
    }

    fn interpret(
        &self,
        _ctx: &StageContext<'_>,
        _plan: &StagePlan,
        outcome: &StageOutcome,
    ) -> Result<VerificationReport, FailureReason> {
        classify(outcome)?;
        Ok(VerificationReport {
            output: outcome.stdout_chunks.clone(),
            started_at: outcome.started_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const COMPILED: &str = r#"{"items":[
        {"id":1,"name":"calls","out":true},
        {"id":2,"name":"internal","out":false},
        {"id":3,"name":"","out":true},
        {"id":4,"name":"values","out":true}
    ]}"#;

    fn entry(id: &str, name: &str) -> TraceOutputEntry {
        TraceOutputEntry {
            stream_id: id.to_string(),
            stream_name: name.to_string(),
        }
    }

    #[test]
    fn test_parse_outputs_from_array() {
        let document: Value = serde_json::from_str(COMPILED).unwrap();
        assert_eq!(
            parse_trace_outputs(&document),
            vec![entry("1", "calls"), entry("4", "values")]
        );
    }

    #[test]
    fn test_parse_outputs_from_object() {
        let document = json!({"items": {
            "a": {"id": "7", "name": "first", "out": 1},
            "b": {"name": "keyed", "out": "yes"},
            "c": {"id": 9, "name": "hidden"}
        }});
        assert_eq!(
            parse_trace_outputs(&document),
            vec![entry("7", "first"), entry("b", "keyed")]
        );
    }

    #[test]
    fn test_parse_outputs_without_items() {
        assert!(parse_trace_outputs(&json!({})).is_empty());
        assert!(parse_trace_outputs(&json!({"items": 3})).is_empty());
    }

    #[test]
    fn test_local_command() {
        let fixture = Fixture::new(&[("build/instrumented_demo_project.tessla.json", COMPILED)]);
        let plan = RunVerificationServer.plan(&fixture.ctx()).unwrap();
        let project = &fixture.project;

        assert_eq!(plan.command.program, fixture.config.tessla_server);
        assert_eq!(
            plan.command.args,
            vec![
                project.compiled_spec().to_string_lossy().into_owned(),
                "--trace".to_string(),
                project.trace_file().to_string_lossy().into_owned(),
                "-o".to_string(),
                "1:calls".to_string(),
                "-o".to_string(),
                "4:values".to_string(),
            ]
        );
        assert!(plan.warnings.is_empty());
    }

    #[test]
    fn test_containerized_command() {
        let fixture = Fixture::new(&[("build/instrumented_demo_project.tessla.json", COMPILED)]).docker();
        let plan = RunVerificationServer.plan(&fixture.ctx()).unwrap();

        assert_eq!(
            plan.command.args.last().unwrap(),
            "cd /tessla && LANG=C.UTF-8 /tessla_server build/instrumented_demo_project.tessla.json \
             --trace build/instrumented_demo_project.trace -o 1:calls -o 4:values"
        );
    }

    #[test]
    fn test_preconditions() {
        let fixture = Fixture::new(&[]);
        assert!(matches!(
            RunVerificationServer.plan(&fixture.ctx()).unwrap_err(),
            PreconditionError::NoCompiledSpecification { .. }
        ));

        let fixture = Fixture::new(&[("build/x.tessla.json", "not json")]);
        assert!(matches!(
            RunVerificationServer.plan(&fixture.ctx()).unwrap_err(),
            PreconditionError::InvalidCompiledSpecification { .. }
        ));

        let mut fixture = Fixture::new(&[("build/x.tessla.json", COMPILED)]);
        fixture.config = fixture.config.clone().with_tessla_server("/missing/server");
        assert!(matches!(
            RunVerificationServer.plan(&fixture.ctx()).unwrap_err(),
            PreconditionError::ServerNotFound { .. }
        ));
    }

    #[test]
    fn test_several_compiled_specs_warn() {
        let fixture = Fixture::new(&[
            ("build/a.tessla.json", COMPILED),
            ("build/b.tessla.json", COMPILED),
        ]);
        let plan = RunVerificationServer.plan(&fixture.ctx()).unwrap();

        assert_eq!(plan.input, Some(fixture.project.output_dir().join("a.tessla.json")));
        assert_eq!(plan.warnings.len(), 1);
    }

    #[test]
    fn test_interpret_builds_report() {
        let fixture = Fixture::new(&[]);
        let plan = StagePlan::new(CommandSpec::new("server"));
        let out = outcome("1: calls = 3\n2: values = ()\nnoise\n", "");

        let report = RunVerificationServer
            .interpret(&fixture.ctx(), &plan, &out)
            .unwrap();

        assert_eq!(report.started_at, out.started_at);
        assert_eq!(
            report.values(),
            vec![
                TraceValue {
                    time: "1".to_string(),
                    stream: "calls".to_string(),
                    value: "3".to_string(),
                },
                TraceValue {
                    time: "2".to_string(),
                    stream: "values".to_string(),
                    value: "()".to_string(),
                },
            ]
        );

        assert!(RunVerificationServer
            .interpret(&fixture.ctx(), &plan, &outcome("", "trace not found"))
            .is_err());
    }
}
