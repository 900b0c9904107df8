//! Tracked functions that the C sources never mention.

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Where a specification references a function through `function_calls`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionOccurrence {
    /// The function name.
    pub function: String,
    /// 0-based line in the specification.
    pub line: u32,
    /// 0-based column where `function_calls(` starts.
    pub start_column: u32,
    /// 0-based column just past the closing parenthesis.
    pub end_column: u32,
}

/// Returns the tracked functions that no C source calls or defines.
///
/// A function counts as used when any source contains its name followed by
/// an opening parenthesis.
#[must_use]
pub fn unused_functions<S: AsRef<str>>(tracked: &[String], c_sources: &[S]) -> Vec<String> {
    tracked
        .iter()
        .filter(|name| {
            let Ok(pattern) = Regex::new(&format!(r"\b{}\s*\(", regex::escape(name))) else {
                return false;
            };
            !c_sources
                .iter()
                .any(|source| pattern.is_match(source.as_ref()))
        })
        .cloned()
        .collect()
}

/// Finds every `function_calls("<name>")` reference to `functions` in `spec_text`.
#[must_use]
pub fn function_occurrences(spec_text: &str, functions: &[String]) -> Vec<FunctionOccurrence> {
    let mut occurrences = Vec::new();

    for (line_no, line) in spec_text.lines().enumerate() {
        for function in functions {
            let lookup = format!("function_calls(\"{function}\")");
            for (byte_idx, _) in line.match_indices(&lookup) {
                let start = line[..byte_idx].chars().count();
                let end = start + lookup.chars().count();
                occurrences.push(FunctionOccurrence {
                    function: function.clone(),
                    line: to_u32(line_no),
                    start_column: to_u32(start),
                    end_column: to_u32(end),
                });
            }
        }
    }

    occurrences.sort_by_key(|occ| (occ.line, occ.start_column));
    occurrences
}

fn to_u32(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}
