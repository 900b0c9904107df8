//! Error types for the tesslaflow pipeline.
//!
//! Subprocess and output-parsing failures are not errors in this sense: they
//! are reported as [`StageResult::Failure`](crate::pipeline::StageResult).
//! The types here cover everything that stops a stage before its subprocess
//! is spawned.

use crate::core::StageKind;
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

/// The main error type for tesslaflow operations.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A required tool or input file is missing.
    #[error("{0}")]
    Precondition(#[from] PreconditionError),

    /// Another pipeline subprocess is still running.
    #[error("Cannot start {requested}: {active} is still running")]
    Busy {
        /// The stage that asked to spawn.
        requested: StageKind,
        /// The stage owning the active process.
        active: StageKind,
    },

    /// Configuration could not be loaded.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// IO error while preparing a stage.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Creates a busy error.
    #[must_use]
    pub fn busy(requested: StageKind, active: StageKind) -> Self {
        Self::Busy { requested, active }
    }

    /// Returns the precondition error, if this is one.
    #[must_use]
    pub fn as_precondition(&self) -> Option<&PreconditionError> {
        match self {
            Self::Precondition(err) => Some(err),
            _ => None,
        }
    }
}

/// A condition that must hold before a stage may spawn its subprocess.
///
/// Each variant carries a notification title through [`Self::title`] and a
/// longer explanation through `Display`.
#[derive(Debug, Clone, Error, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PreconditionError {
    /// No file of any project is active.
    #[error("There is no active project. Open and activate at least one file of the project you want to compile and run.")]
    NoActiveProject,

    /// The configured clang binary does not exist.
    #[error("The clang compiler configured at '{}' does not exist. Set the correct path to your clang compiler.", path.display())]
    ClangNotFound {
        /// The configured path.
        path: PathBuf,
    },

    /// `opt` was not found next to the configured clang binary.
    #[error("No opt binary was found at '{}'. opt is looked up next to the configured clang compiler.", path.display())]
    OptNotFound {
        /// Where opt was expected.
        path: PathBuf,
    },

    /// The instrumentation library does not exist.
    #[error("The instrumentation library configured at '{}' does not exist. Set the correct path to libInstrumentFunctions.so.", path.display())]
    InstrumentationLibraryNotFound {
        /// The configured path.
        path: PathBuf,
    },

    /// The TeSSLa compiler jar does not exist.
    #[error("The TeSSLa compiler configured at '{}' does not exist. Set the correct path to your compiler.", path.display())]
    CompilerNotFound {
        /// The configured path.
        path: PathBuf,
    },

    /// The TeSSLa server does not exist.
    #[error("The TeSSLa server configured at '{}' does not exist. Set the correct path to your TeSSLa server.", path.display())]
    ServerNotFound {
        /// The configured path.
        path: PathBuf,
    },

    /// The project contains no C sources.
    #[error("There are no C files to compile in '{}'. Create at least one C file containing a main function.", root.display())]
    NoCSources {
        /// The project root.
        root: PathBuf,
    },

    /// The project contains no specification file.
    #[error("There is no TeSSLa specification file in '{}'.", root.display())]
    NoSpecification {
        /// The project root.
        root: PathBuf,
    },

    /// The specification file exists but could not be read.
    #[error("The TeSSLa file '{}' could not be read: {reason}", path.display())]
    UnreadableSpecification {
        /// The specification file.
        path: PathBuf,
        /// IO error message.
        reason: String,
    },

    /// No compiled specification was found in the build directory.
    #[error("No compiled TeSSLa JSON file was found in '{}'.", dir.display())]
    NoCompiledSpecification {
        /// The build directory.
        dir: PathBuf,
    },

    /// The compiled specification could not be read as JSON.
    #[error("The compiled TeSSLa file '{}' is not valid JSON: {reason}", path.display())]
    InvalidCompiledSpecification {
        /// The JSON file.
        path: PathBuf,
        /// Parser message.
        reason: String,
    },

    /// The binary to execute has not been built.
    #[error("There is no binary at '{}'. Build the project first.", path.display())]
    BinaryNotFound {
        /// The expected binary.
        path: PathBuf,
    },
}

impl PreconditionError {
    /// Short notification title.
    #[must_use]
    pub fn title(&self) -> &'static str {
        match self {
            Self::NoActiveProject => "Unable to compile and run",
            Self::ClangNotFound { .. } => "Unable to find clang",
            Self::OptNotFound { .. } => "Unable to find opt",
            Self::InstrumentationLibraryNotFound { .. } => {
                "Unable to find libInstrumentFunctions.so"
            }
            Self::CompilerNotFound { .. } => "Unable to find TeSSLa compiler",
            Self::ServerNotFound { .. } => "Unable to find TeSSLa server",
            Self::NoCSources { .. } => "Unable to compile C files",
            Self::NoSpecification { .. } => "Unable to compile TeSSLa file",
            Self::UnreadableSpecification { .. } => "Unable to read TeSSLa file",
            Self::NoCompiledSpecification { .. } | Self::InvalidCompiledSpecification { .. } => {
                "Unable to find TeSSLa JSON file"
            }
            Self::BinaryNotFound { .. } => "Unable to run binary",
        }
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("title".to_string(), serde_json::json!(self.title()));
        map.insert("message".to_string(), serde_json::json!(self.to_string()));
        if let Ok(serde_json::Value::Object(fields)) = serde_json::to_value(self) {
            map.extend(fields);
        }
        map
    }
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("Failed to read config file '{}': {source}", path.display())]
    Read {
        /// The file.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration is not valid JSON for the expected shape.
    #[error("Invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),
}
