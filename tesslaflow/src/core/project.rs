//! The active project and the artifact paths derived from it.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the build directory under a project root.
pub const BUILD_DIR: &str = "build";

/// Prefix of every artifact produced by the instrumented build.
const INSTRUMENTED_PREFIX: &str = "instrumented_";

/// A project root together with its build directory and binary name.
///
/// All three fields are derived from the root in [`ProjectContext::from_root`]
/// and the value is only ever replaced as a whole.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectContext {
    root: PathBuf,
    output_dir: PathBuf,
    binary_name: String,
}

impl ProjectContext {
    /// Derives the context of the project rooted at `root`.
    #[must_use]
    pub fn from_root(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let output_dir = root.join(BUILD_DIR);
        let binary_name = root
            .file_name()
            .map(|name| name.to_string_lossy().replace(' ', "_"))
            .unwrap_or_default();

        Self {
            root,
            output_dir,
            binary_name,
        }
    }

    /// The project root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The build directory, `<root>/build`.
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// The binary name; the last root segment without spaces.
    #[must_use]
    pub fn binary_name(&self) -> &str {
        &self.binary_name
    }

    /// `<bin>`: the native binary.
    #[must_use]
    pub fn binary(&self) -> PathBuf {
        self.output_dir.join(&self.binary_name)
    }

    /// `<bin>.bc`: the intermediate form.
    #[must_use]
    pub fn intermediate(&self) -> PathBuf {
        self.output_dir.join(self.intermediate_name())
    }

    /// `instrumented_<bin>.bc`.
    #[must_use]
    pub fn instrumented_intermediate(&self) -> PathBuf {
        self.output_dir
            .join(format!("{}.bc", self.instrumented_binary_name()))
    }

    /// `instrumented_<bin>`: the linked instrumented executable.
    #[must_use]
    pub fn instrumented_binary(&self) -> PathBuf {
        self.output_dir.join(self.instrumented_binary_name())
    }

    /// `instrumented_<bin>.trace`.
    #[must_use]
    pub fn trace_file(&self) -> PathBuf {
        self.output_dir.join(self.trace_file_name())
    }

    /// `instrumented_<bin>.tessla.json`: the compiled specification.
    #[must_use]
    pub fn compiled_spec(&self) -> PathBuf {
        self.output_dir
            .join(format!("{}.tessla.json", self.instrumented_binary_name()))
    }

    /// `zlog.conf`: the trace formatting configuration.
    #[must_use]
    pub fn trace_config(&self) -> PathBuf {
        self.output_dir.join("zlog.conf")
    }

    /// `<bin>.bc` without directory.
    #[must_use]
    pub fn intermediate_name(&self) -> String {
        format!("{}.bc", self.binary_name)
    }

    /// `instrumented_<bin>` without directory.
    #[must_use]
    pub fn instrumented_binary_name(&self) -> String {
        format!("{INSTRUMENTED_PREFIX}{}", self.binary_name)
    }

    /// `instrumented_<bin>.trace` without directory.
    #[must_use]
    pub fn trace_file_name(&self) -> String {
        format!("{}.trace", self.instrumented_binary_name())
    }

    /// Expresses `path` relative to the project root.
    ///
    /// Paths outside the root are returned unchanged.
    #[must_use]
    pub fn relativize(&self, path: &Path) -> PathBuf {
        path.strip_prefix(&self.root)
            .map_or_else(|_| path.to_path_buf(), Path::to_path_buf)
    }
}
