//! The `zlog.conf` the instrumented binary reads at startup.

use crate::config::TraceFormatting;
use crate::core::{ExecutionMode, ProjectContext};
use std::io;
use tracing::debug;

/// Renders the logging configuration for `project`.
///
/// Inside the container the binary runs from the build directory, so the
/// trace target is the bare file name; locally it is the absolute path.
#[must_use]
pub fn render_trace_config(
    project: &ProjectContext,
    formatting: &TraceFormatting,
    mode: ExecutionMode,
) -> String {
    let trace = match mode {
        ExecutionMode::Containerized => project.trace_file_name(),
        ExecutionMode::Local => project.trace_file().to_string_lossy().into_owned(),
    };

    let mut config = String::from("[formats]\n");
    config.push_str(&format!(
        "variable_values = \"{}\"\n",
        formatting.variable_values
    ));
    config.push_str(&format!(
        "function_calls = \"{}\"\n",
        formatting.function_calls
    ));
    config.push_str("[rules]\n");
    config.push_str(&format!(
        "variable_values_cat.DEBUG \"{trace}\"; variable_values\n"
    ));
    config.push_str(&format!(
        "function_calls_cat.DEBUG \"{trace}\"; function_calls\n"
    ));
    config
}

/// Replaces the project's `zlog.conf` with a freshly rendered one.
///
/// The build directory must exist.
pub fn write_trace_config(
    project: &ProjectContext,
    formatting: &TraceFormatting,
    mode: ExecutionMode,
) -> io::Result<()> {
    let path = project.trace_config();
    if path.exists() {
        std::fs::remove_file(&path)?;
    }
    std::fs::write(&path, render_trace_config(project, formatting, mode))?;
    debug!(path = %path.display(), %mode, "Wrote trace config");
    Ok(())
}
