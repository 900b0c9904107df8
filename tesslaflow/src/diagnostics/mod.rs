//! Positional diagnostics for the specification file.

mod spec_error;
mod unused;

pub use spec_error::{extract_spec_error, ParsedSpecError, Position};
pub use unused::{function_occurrences, unused_functions, FunctionOccurrence};
