//! Process-wide, read-only lexer configuration: keyword/operator radix
//! trees and the delimiter set. Built once and shared across every
//! compilation unit as immutable process-wide state.

use super::radix::RadixTree;
use super::token::{Delimiter, Keyword, Operator};
use std::sync::OnceLock;

pub struct LexerTables {
    pub keywords: RadixTree<Keyword>,
    pub operators: RadixTree<Operator>,
}

impl LexerTables {
    fn build() -> Self {
        let mut keywords = RadixTree::new();
        for kw in Keyword::all() {
            keywords.insert(kw.spelling(), *kw);
        }
        let mut operators = RadixTree::new();
        for (spelling, op) in Operator::all_by_length_desc() {
            operators.insert(spelling, *op);
        }
        Self { keywords, operators }
    }

    /// The shared, immutable lexer tables, initialized exactly once
    /// (double-checked idiom via `OnceLock`).
    pub fn global() -> &'static LexerTables {
        static TABLES: OnceLock<LexerTables> = OnceLock::new();
        TABLES.get_or_init(LexerTables::build)
    }
}

/// Whether the lexer emits whitespace/newline tokens (the preprocessor's
/// configuration) or drops them silently (the main parser's
/// configuration).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriviaMode {
    Emit,
    Drop,
}

#[derive(Debug, Clone, Copy)]
pub struct LexerConfig {
    pub trivia: TriviaMode,
}

impl LexerConfig {
    pub fn preprocessor() -> Self {
        Self { trivia: TriviaMode::Emit }
    }

    pub fn parser() -> Self {
        Self { trivia: TriviaMode::Drop }
    }
}

pub fn is_delimiter(b: u8) -> Option<Delimiter> {
    Delimiter::from_byte(b)
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

pub fn is_word_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

pub fn is_word_continue(b: u8) -> bool {
    is_word_byte(b)
}

fn is_operator_byte(b: u8) -> bool {
    matches!(
        b,
        b'+' | b'-' | b'*' | b'/' | b'%' | b'&' | b'|' | b'^' | b'~' | b'!' | b'=' | b'<' | b'>' | b'?' | b':' | b'.'
    )
}

pub fn is_operator_continue(b: u8) -> bool {
    is_operator_byte(b)
}
