//! Sequencing stages into workflows.
//!
//! This module provides:
//! - The shared [`PipelineSession`] (configuration, process slot, event sink)
//! - The [`Orchestrator`] running the C and project workflows
//! - Typed stage and workflow results

mod orchestrator;
mod result;
mod session;


pub use orchestrator::{Orchestrator, SplitViewLayout};
pub use result::{StageFailure, StageResult};
pub use session::PipelineSession;
