//! Token discovery
//!
//! Finds `${expression}` placeholders (or matches of any caller-supplied
//! capturing pattern) in a string, left to right.

use regex::Regex;
use std::ops::{Index, Range};
use std::sync::OnceLock;

use crate::error::{Error, Result};

/// Source of the default `${...}` token pattern
pub const DEFAULT_PATTERN: &str = r"\$\{(.*?)\}";

static DEFAULT_REGEX: OnceLock<Regex> = OnceLock::new();

/// The compiled default `${...}` pattern.
pub fn default_pattern() -> &'static Regex {
    DEFAULT_REGEX.get_or_init(|| Regex::new(DEFAULT_PATTERN).expect("default token pattern"))
}

/// Compile a caller-supplied token pattern.
pub fn compile_pattern(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| Error::pattern(pattern, e.to_string()))
}

/// One placeholder occurrence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// The entire matched text, e.g. `${FOO}`
    pub full: String,
    /// The first capture group, e.g. `FOO`
    pub expr: String,
    /// Byte range of `full` in the source string
    pub span: Range<usize>,
}

impl Index<usize> for Token {
    type Output = str;

    /// `token[0]` is the full match, `token[1]` the captured expression.
    fn index(&self, index: usize) -> &str {
        match index {
            0 => &self.full,
            1 => &self.expr,
            _ => panic!("token index out of range: {}", index),
        }
    }
}

/// Find every non-overlapping match of `pattern` in `source`, in order.
///
/// A pattern without a capture group yields tokens with an empty `expr`.
pub fn parse_variables(source: &str, pattern: &Regex) -> Vec<Token> {
    pattern
        .captures_iter(source)
        .filter_map(|caps| {
            let full = caps.get(0)?;
            let expr = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            Some(Token {
                full: full.as_str().to_string(),
                expr: expr.to_string(),
                span: full.range(),
            })
        })
        .collect()
}
