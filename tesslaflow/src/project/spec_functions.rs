//! Functions a specification asks to instrument.

use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

fn function_calls_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"function_calls\(\s*"([A-Za-z_][A-Za-z0-9_]*)"\s*\)"#)
            .unwrap_or_else(|err| unreachable!("static pattern is valid: {err}"))
    })
}

/// Names referenced through `function_calls("<name>")`, in first-seen order.
///
/// `--` line comments are ignored.
#[must_use]
pub fn tracked_functions(spec_text: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();

    for line in spec_text.lines() {
        let code = line.split_once("--").map_or(line, |(code, _)| code);
        for captures in function_calls_pattern().captures_iter(code) {
            let name = &captures[1];
            if !names.iter().any(|known| known == name) {
                names.push(name.to_string());
            }
        }
    }

    names
}

/// Reads `path` and returns its tracked functions.
pub fn tracked_functions_in_file(path: &Path) -> std::io::Result<Vec<String>> {
    Ok(tracked_functions(&std::fs::read_to_string(path)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_tracked_functions_in_order_without_duplicates() {
        let spec = r#"
define add_calls := function_calls("add")
define sub_calls := function_calls( "sub" )
define again := function_calls("add")
out add_calls
"#;
        assert_eq!(tracked_functions(spec), vec!["add", "sub"]);
    }

    #[test]
    fn test_commented_references_are_ignored() {
        let spec = "-- define old := function_calls(\"legacy\")\n\
                    define x := function_calls(\"current\") -- function_calls(\"trailing\")\n";
        assert_eq!(tracked_functions(spec), vec!["current"]);
    }

    #[test]
    fn test_no_functions() {
        assert!(tracked_functions("define x := 1").is_empty());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("spec.tessla");
        std::fs::write(&file, "define c := function_calls(\"main\")").unwrap();

        assert_eq!(tracked_functions_in_file(&file).unwrap(), vec!["main"]);
    }
}
