//! Line tokenizers
//!
//! Two counting modes are supported:
//!
//! - **N-gram**: windows of N consecutive whitespace-delimited tokens. Windows
//!   never cross a line boundary, so a line with fewer than N tokens yields
//!   nothing.
//! - **Word**: single tokens split on a fixed punctuation/digit class, with
//!   empty pieces discarded.
//!
//! Both modes lowercase every token.

use super::{FrequencyTable, NGram};

/// Strategy for turning text into keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tokenizer {
    /// Sliding windows of `size` whitespace-delimited tokens
    NGram { size: usize },
    /// Single words split on [`is_word_separator`]
    Word,
}

impl Tokenizer {
    /// Count every key in `text` into `table`
    pub fn count_text(&self, text: &str, table: &mut FrequencyTable) {
        for line in text.lines() {
            self.count_line(line, table);
        }
    }

    /// Count the keys of a single line into `table`
    pub fn count_line(&self, line: &str, table: &mut FrequencyTable) {
        match *self {
            Tokenizer::NGram { size } => {
                if size == 0 {
                    return;
                }
                let tokens: Vec<String> = line.split_whitespace().map(str::to_lowercase).collect();
                for window in tokens.windows(size) {
                    table.increment(NGram::from_tokens(window.iter().cloned()));
                }
            }
            Tokenizer::Word => {
                for word in line.trim().split(is_word_separator) {
                    if !word.is_empty() {
                        table.increment(NGram::from_tokens([word.to_lowercase()]));
                    }
                }
            }
        }
    }
}

/// Separator class for word mode
///
/// Space, `, . ( ) ; | " \ / + - [ ] < > ?` and the ASCII digits `0-9`.
#[inline]
pub fn is_word_separator(c: char) -> bool {
    matches!(
        c,
        ' ' | ',' | '.' | '(' | ')' | ';' | '|' | '"' | '\\' | '/' | '+' | '-' | '[' | ']' | '<' | '>' | '?'
    ) || c.is_ascii_digit()
}
