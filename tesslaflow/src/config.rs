//! Toolchain configuration.
//!
//! Every field has a default, so a partial JSON document is a valid
//! configuration.

use crate::core::ExecutionMode;
use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Paths and switches for the external toolchain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolchainConfig {
    /// Run every stage inside the toolchain container.
    #[serde(default)]
    pub use_docker: bool,
    /// The clang compiler. `opt` is expected in the same directory.
    #[serde(default = "default_clang_path")]
    pub clang_path: PathBuf,
    /// The `libInstrumentFunctions.so` pass and logger library.
    #[serde(default = "default_lib_instrument_functions")]
    pub lib_instrument_functions: PathBuf,
    /// The TeSSLa compiler jar.
    #[serde(default = "default_tessla_compiler")]
    pub tessla_compiler: PathBuf,
    /// The TeSSLa server binary.
    #[serde(default = "default_tessla_server")]
    pub tessla_server: PathBuf,
    /// The Java launcher used to run the compiler jar.
    #[serde(default = "default_java_path")]
    pub java_path: PathBuf,
    /// Container settings.
    #[serde(default)]
    pub container: ContainerConfig,
    /// Trace formatting strings written into `zlog.conf`.
    #[serde(default)]
    pub formatting: TraceFormatting,
}

fn default_clang_path() -> PathBuf {
    PathBuf::from("/usr/bin/clang")
}

fn default_lib_instrument_functions() -> PathBuf {
    PathBuf::from("/usr/local/lib/libInstrumentFunctions.so")
}

fn default_tessla_compiler() -> PathBuf {
    PathBuf::from("/usr/local/share/tessla/tessla.jar")
}

fn default_tessla_server() -> PathBuf {
    PathBuf::from("/usr/local/bin/tessla_server")
}

fn default_java_path() -> PathBuf {
    PathBuf::from("java")
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            use_docker: false,
            clang_path: default_clang_path(),
            lib_instrument_functions: default_lib_instrument_functions(),
            tessla_compiler: default_tessla_compiler(),
            tessla_server: default_tessla_server(),
            java_path: default_java_path(),
            container: ContainerConfig::default(),
            formatting: TraceFormatting::default(),
        }
    }
}

impl ToolchainConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads and parses a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&content)
    }

    /// The execution mode selected by [`Self::use_docker`].
    #[must_use]
    pub fn mode(&self) -> ExecutionMode {
        ExecutionMode::from_use_docker(self.use_docker)
    }

    /// Where `opt` is looked up: next to clang.
    #[must_use]
    pub fn opt_path(&self) -> PathBuf {
        self.clang_path
            .parent()
            .map_or_else(|| PathBuf::from("opt"), |dir| dir.join("opt"))
    }

    /// Directory holding the instrumentation library, used as a link path.
    #[must_use]
    pub fn instrumentation_lib_dir(&self) -> PathBuf {
        self.lib_instrument_functions
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default()
    }

    /// Sets the docker switch.
    #[must_use]
    pub fn with_docker(mut self, use_docker: bool) -> Self {
        self.use_docker = use_docker;
        self
    }

    /// Sets the clang path.
    #[must_use]
    pub fn with_clang_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.clang_path = path.into();
        self
    }

    /// Sets the instrumentation library path.
    #[must_use]
    pub fn with_lib_instrument_functions(mut self, path: impl Into<PathBuf>) -> Self {
        self.lib_instrument_functions = path.into();
        self
    }

    /// Sets the TeSSLa compiler jar.
    #[must_use]
    pub fn with_tessla_compiler(mut self, path: impl Into<PathBuf>) -> Self {
        self.tessla_compiler = path.into();
        self
    }

    /// Sets the TeSSLa server.
    #[must_use]
    pub fn with_tessla_server(mut self, path: impl Into<PathBuf>) -> Self {
        self.tessla_server = path.into();
        self
    }

    /// Sets the Java launcher.
    #[must_use]
    pub fn with_java_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.java_path = path.into();
        self
    }
}

/// The toolchain container and the tool locations inside it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerConfig {
    /// The docker client.
    #[serde(default = "default_docker")]
    pub docker: PathBuf,
    /// Image providing the toolchain.
    #[serde(default = "default_image")]
    pub image: String,
    /// Name of the persistent container.
    #[serde(default = "default_container_name")]
    pub name: String,
    /// Where the project root is mounted.
    #[serde(default = "default_mount_point")]
    pub mount_point: String,
    /// Directory of `opt` inside the image.
    #[serde(default = "default_llvm_bin")]
    pub llvm_bin: String,
    /// Directory of the instrumentation library inside the image.
    #[serde(default = "default_instrument_dir")]
    pub instrument_dir: String,
    /// The TeSSLa compiler jar inside the image.
    #[serde(default = "default_compiler_jar")]
    pub compiler_jar: String,
    /// The TeSSLa server inside the image.
    #[serde(default = "default_server")]
    pub server: String,
}

fn default_docker() -> PathBuf {
    PathBuf::from("docker")
}

fn default_image() -> String {
    "tessla".to_string()
}

fn default_container_name() -> String {
    "tessla".to_string()
}

fn default_mount_point() -> String {
    "/tessla".to_string()
}

fn default_llvm_bin() -> String {
    "/usr/lib/llvm-3.8/bin".to_string()
}

fn default_instrument_dir() -> String {
    "/InstrumentFunctions".to_string()
}

fn default_compiler_jar() -> String {
    "/tessla-imdea-snapshot.jar".to_string()
}

fn default_server() -> String {
    "/tessla_server".to_string()
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            docker: default_docker(),
            image: default_image(),
            name: default_container_name(),
            mount_point: default_mount_point(),
            llvm_bin: default_llvm_bin(),
            instrument_dir: default_instrument_dir(),
            compiler_jar: default_compiler_jar(),
            server: default_server(),
        }
    }
}

/// zlog format strings for the two trace categories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceFormatting {
    /// Format of variable value records.
    #[serde(default = "default_variable_values")]
    pub variable_values: String,
    /// Format of function call records.
    #[serde(default = "default_function_calls")]
    pub function_calls: String,
}

fn default_variable_values() -> String {
    "variable_values:%m %d(%s) %us%n".to_string()
}

fn default_function_calls() -> String {
    "function_calls:%m nil %d(%s) %us%n".to_string()
}

impl Default for TraceFormatting {
    fn default() -> Self {
        Self {
            variable_values: default_variable_values(),
            function_calls: default_function_calls(),
        }
    }
}
