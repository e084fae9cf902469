//! Word/size metrics over raw LaTeX source.
//!
//! The stripper is a single-pass heuristic: control sequences with one level
//! of bracket/brace arguments and line comments are removed before counting.
//! Nested brace groups inside a command argument are not fully consumed.

use regex::Regex;
use std::sync::LazyLock;

/// `\word`, optional star, optional `[...]` option group, any number of
/// single-level `{...}` argument groups.
static COMMAND_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\\[a-zA-Z]+\*?(\[[^\]]*\])?(\{[^}]*\})*").expect("command pattern is valid")
});

/// Unescaped `%` to end of line. `\%` is a literal percent sign.
static COMMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)(^|[^\\])%.*").expect("comment pattern is valid"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TexMetrics {
    pub word_count: u64,
    pub byte_size: u64,
}

/// Total over any input; empty content yields zeroes. Byte size is the UTF-8
/// length of the original, unstripped content.
pub fn metrics(content: &str) -> TexMetrics {
    let byte_size = content.len() as u64;

    let without_commands = COMMAND_RE.replace_all(content, "");
    let without_comments = COMMENT_RE.replace_all(&without_commands, "$1");
    let word_count = without_comments.split_whitespace().count() as u64;

    TexMetrics {
        word_count,
        byte_size,
    }
}
