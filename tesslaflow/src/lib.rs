//! # Tesslaflow
//!
//! Builds a C project, instruments it, runs it to record a trace and checks
//! the trace against a TeSSLa specification.
//!
//! The pieces:
//!
//! - **Stages**: one type per toolchain step, planning its command for the
//!   local or containerized toolchain and classifying the result
//! - **Process runner and guard**: at most one subprocess at a time, with
//!   streamed output and cancellation
//! - **Orchestrator**: the C-only and the full verification workflows
//! - **Diagnostics**: locating specification compiler errors and tracked
//!   functions the C code never calls
//! - **Events**: everything a front end shows, delivered through an
//!   [`EventSink`](events::EventSink)
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tesslaflow::prelude::*;
//!
//! let sink = Arc::new(LoggingEventSink::info());
//! let session = Arc::new(PipelineSession::new(ToolchainConfig::default(), sink));
//! let orchestrator = Orchestrator::new(session, Arc::new(DirectoryWorkspace::new("/work/demo")));
//!
//! orchestrator.open_project(Path::new("/work/demo")).await;
//! match orchestrator.compile_and_run_project().await? {
//!     StageResult::Success(report) => println!("{}", report.text()),
//!     StageResult::Failure(failure) => eprintln!("{}: {}", failure.summary, failure.detail),
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod config;
pub mod container;
pub mod core;
pub mod diagnostics;
pub mod errors;
pub mod events;
pub mod observability;
pub mod pipeline;
pub mod process;
pub mod project;
pub mod stages;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{ContainerConfig, ToolchainConfig, TraceFormatting};
    pub use crate::core::{
        CommandSpec, ExecutionMode, PipelineEvent, ProjectContext, StageKind, StageOutcome,
    };
    pub use crate::diagnostics::{extract_spec_error, ParsedSpecError, Position};
    pub use crate::errors::{ConfigError, PipelineError, PreconditionError};
    pub use crate::events::{
        CollectingEventSink, EventSink, FanoutEventSink, LoggingEventSink, NoOpEventSink,
    };
    pub use crate::pipeline::{Orchestrator, PipelineSession, StageFailure, StageResult};
    pub use crate::process::{ProcessGuard, ProcessRunner};
    pub use crate::project::{DirectoryWorkspace, ProjectTracker, ProjectUpdate, Workspace};
    pub use crate::stages::{Stage, StageContext, VerificationReport};
}
