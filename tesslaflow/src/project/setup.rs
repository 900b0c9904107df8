//! One-time project setup: the `.gcc-flags.json` read by C linters.

use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// File name of the linter configuration in the project root.
pub const LINTER_CONFIG: &str = ".gcc-flags.json";

/// Contents of `.gcc-flags.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinterConfig {
    /// The compiler the linter runs.
    pub exec_path: PathBuf,
    /// Flags passed on every lint run.
    pub gcc_default_c_flags: String,
    /// Comma-separated include directories.
    pub gcc_include_paths: String,
    /// Whether warnings are hidden.
    pub gcc_suppress_warnings: bool,
}

impl LinterConfig {
    /// Linter settings for the given compiler.
    #[must_use]
    pub fn for_compiler(exec_path: impl Into<PathBuf>) -> Self {
        Self {
            exec_path: exec_path.into(),
            gcc_default_c_flags: "-Wall -c -fsyntax-only".to_string(),
            gcc_include_paths: ".,./include,./path".to_string(),
            gcc_suppress_warnings: false,
        }
    }
}

/// What [`set_up_project`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetupOutcome {
    /// The project already had a linter configuration.
    AlreadyPresent,
    /// A new configuration was written to the given path.
    Written(PathBuf),
    /// No compiler is on the `PATH`; nothing was written.
    CompilerMissing,
}

/// Writes `.gcc-flags.json` into `root` unless one exists, pointing at the
/// `clang` found on the `PATH`.
pub fn set_up_project(root: &Path) -> io::Result<SetupOutcome> {
    set_up_project_with(root, which::which("clang").ok())
}

/// Like [`set_up_project`] with an explicit compiler lookup result.
pub fn set_up_project_with(root: &Path, clang: Option<PathBuf>) -> io::Result<SetupOutcome> {
    let target = root.join(LINTER_CONFIG);
    if target.exists() {
        debug!(path = %target.display(), "Linter config already present");
        return Ok(SetupOutcome::AlreadyPresent);
    }

    let Some(clang) = clang else {
        debug!(root = %root.display(), "No clang on PATH, skipping linter config");
        return Ok(SetupOutcome::CompilerMissing);
    };

    let content = serde_json::to_string_pretty(&LinterConfig::for_compiler(clang))
        .map_err(io::Error::other)?;
    std::fs::write(&target, content)?;
    info!(path = %target.display(), "Wrote linter config");

    Ok(SetupOutcome::Written(target))
}
