//! Locating errors in TeSSLa compiler output.
//!
//! The compiler reports errors as
//!
//! ```text
//! ParserError((3,5 - 3,10): unexpected token)
//! ```
//!
//! which this module reads with the grammar
//!
//! ```text
//! error   := kind "((" point "-" point ")" ":" WS message ")"
//! kind    := IDENT
//! point   := NUMBER "," NUMBER
//! message := any text up to the last ")" on the line
//! ```
//!
//! Whitespace is allowed around numbers and separators inside the range.
//! Compiler coordinates are 1-based; the parsed result is 0-based.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A 0-based line/column pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    /// 0-based line.
    pub line: u32,
    /// 0-based column.
    pub column: u32,
}

impl Position {
    /// Creates a position.
    #[must_use]
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }

    fn from_one_based(line: u32, column: u32) -> Self {
        Self::new(line.saturating_sub(1), column.saturating_sub(1))
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A located error reported by the specification compiler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedSpecError {
    /// The error kind, e.g. `ParserError`.
    pub kind: String,
    /// Start of the offending range.
    pub start: Position,
    /// End of the offending range.
    pub end: Position,
    /// The compiler's message.
    pub message: String,
}

/// Extracts the first located error from compiler output.
///
/// Returns `None` when nothing in `text` has the expected shape; the caller
/// then shows the text as is.
#[must_use]
pub fn extract_spec_error(text: &str) -> Option<ParsedSpecError> {
    text.lines().find_map(parse_line)
}

fn parse_line(line: &str) -> Option<ParsedSpecError> {
    let mut from = 0;
    while let Some(offset) = line[from..].find("((") {
        let open = from + offset;
        if let Some(error) = parse_at(line, open) {
            return Some(error);
        }
        from = open + 1;
    }
    None
}

fn parse_at(line: &str, open: usize) -> Option<ParsedSpecError> {
    let kind = kind_before(&line[..open])?;

    let mut cursor = Cursor::new(&line[open + 2..]);
    let (start_line, start_col) = cursor.point()?;
    cursor.skip_whitespace();
    cursor.symbol('-')?;
    let (end_line, end_col) = cursor.point()?;
    cursor.skip_whitespace();
    cursor.symbol(')')?;
    cursor.symbol(':')?;
    cursor.whitespace_char()?;

    let rest = cursor.rest();
    let close = rest.rfind(')')?;

    Some(ParsedSpecError {
        kind: kind.to_string(),
        start: Position::from_one_based(start_line, start_col),
        end: Position::from_one_based(end_line, end_col),
        message: rest[..close].to_string(),
    })
}

/// The identifier ending right at the end of `prefix`.
fn kind_before(prefix: &str) -> Option<&str> {
    let start = prefix
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_alphanumeric() || *c == '_')
        .last()
        .map(|(idx, _)| idx)?;
    let kind = &prefix[start..];

    kind.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_')
        .then_some(kind)
}

struct Cursor<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek().filter(|c| c.is_whitespace()) {
            self.pos += c.len_utf8();
        }
    }

    fn whitespace_char(&mut self) -> Option<()> {
        let c = self.peek().filter(|c| c.is_whitespace())?;
        self.pos += c.len_utf8();
        Some(())
    }

    fn symbol(&mut self, expected: char) -> Option<()> {
        if self.peek()? == expected {
            self.pos += expected.len_utf8();
            Some(())
        } else {
            None
        }
    }

    fn number(&mut self) -> Option<u32> {
        self.skip_whitespace();
        let digits = self
            .rest()
            .bytes()
            .take_while(u8::is_ascii_digit)
            .count();
        if digits == 0 {
            return None;
        }
        let value = self.rest()[..digits].parse().ok()?;
        self.pos += digits;
        Some(value)
    }

    fn point(&mut self) -> Option<(u32, u32)> {
        let line = self.number()?;
        self.skip_whitespace();
        self.symbol(',')?;
        let column = self.number()?;
        Some((line, column))
    }
}
