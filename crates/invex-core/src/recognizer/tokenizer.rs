//! Offset-preserving tokenizer for invoice text.

use serde::{Deserialize, Serialize};

/// A token of the original text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// Token text.
    pub text: String,
    /// Start byte offset in the original text (inclusive).
    pub start: usize,
    /// End byte offset in the original text (exclusive).
    pub end: usize,
}

/// Split text into tokens.
///
/// A token is either a maximal run of alphanumeric characters or a single
/// non-whitespace, non-alphanumeric character. Whitespace is dropped.
/// `"15/04/2023"` yields `15`, `/`, `04`, `/`, `2023`.
pub fn tokenize(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut run_start: Option<usize> = None;

    for (i, c) in text.char_indices() {
        if c.is_alphanumeric() {
            run_start.get_or_insert(i);
            continue;
        }
        if let Some(start) = run_start.take() {
            tokens.push(token(text, start, i));
        }
        if !c.is_whitespace() {
            tokens.push(token(text, i, i + c.len_utf8()));
        }
    }
    if let Some(start) = run_start {
        tokens.push(token(text, start, text.len()));
    }

    tokens
}

fn token(text: &str, start: usize, end: usize) -> Token {
    Token {
        text: text[start..end].to_string(),
        start,
        end,
    }
}
