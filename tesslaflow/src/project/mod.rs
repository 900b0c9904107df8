//! Project discovery, tracking and on-disk setup.

pub mod scanner;
mod setup;
mod spec_functions;
mod trace_format;
mod tracker;
mod workspace;

pub use setup::{set_up_project, set_up_project_with, LinterConfig, SetupOutcome, LINTER_CONFIG};
pub use spec_functions::{tracked_functions, tracked_functions_in_file};
pub use trace_format::{render_trace_config, write_trace_config};
pub use tracker::{ProjectTracker, ProjectUpdate};
pub use workspace::{DirectoryWorkspace, Workspace};

#[cfg(test)]
pub use workspace::MockWorkspace;
