//! Subprocess execution: the single-process guard and the runner.

mod guard;
mod runner;

pub use guard::{ProcessGuard, ProcessTicket};
pub use runner::ProcessRunner;
