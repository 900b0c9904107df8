//! Core domain model types for tesslaflow.
//!
//! This module contains the fundamental types used throughout the crate:
//! - Stage kinds and execution modes
//! - The project context and its artifact paths
//! - Typed commands and subprocess outcomes
//! - Events published to front ends

mod command;
mod event;
mod outcome;
mod project;
mod status;

pub use command::{CommandSpec, ShellScript};
pub use event::PipelineEvent;
pub use outcome::StageOutcome;
pub use project::{ProjectContext, BUILD_DIR};
pub use status::{ErrorChannel, ExecutionMode, StageKind};
