//! Byte-stream tokenizer. Driven by an external `(index, next_index, line,
//! column)` state, so a `TokenStream` on top can cheaply save/restore
//! lookahead positions.

use super::config::{is_delimiter, is_operator_continue, is_word_continue, is_word_start, LexerConfig, LexerTables, TriviaMode};
use super::numeric::scan_numeric;
use super::token::{Token, TokenKind};
use hxsl_core::{codes, DiagnosticCode, Logger, SourceId, TextSpan};

#[derive(Debug, Clone, Copy)]
struct LexState {
    index: u32,
    line: u32,
    column: u32,
}

pub struct Lexer<'a> {
    source_id: SourceId,
    buf: &'a [u8],
    state: LexState,
    config: LexerConfig,
    tables: &'static LexerTables,
}

impl<'a> Lexer<'a> {
    pub fn new(source_id: SourceId, buf: &'a [u8], config: LexerConfig) -> Self {
        Self {
            source_id,
            buf,
            state: LexState { index: 0, line: 1, column: 1 },
            config,
            tables: LexerTables::global(),
        }
    }

    /// Save the current scan position so a caller can rewind after
    /// speculative lookahead.
    pub fn save(&self) -> (u32, u32, u32) {
        (self.state.index, self.state.line, self.state.column)
    }

    pub fn restore(&mut self, saved: (u32, u32, u32)) {
        self.state = LexState {
            index: saved.0,
            line: saved.1,
            column: saved.2,
        };
    }

    fn rest(&self) -> &'a [u8] {
        &self.buf[self.state.index as usize..]
    }

    fn make_span(&self, start_index: u32, start_line: u32, start_column: u32, len: u32) -> TextSpan {
        TextSpan::new(self.source_id, start_index, len, start_line, start_column)
    }

    fn advance_position(&mut self, consumed: &[u8]) {
        for &b in consumed {
            if b == b'\n' {
                self.state.line += 1;
                self.state.column = 1;
            } else {
                self.state.column += 1;
            }
        }
        self.state.index += consumed.len() as u32;
    }

    /// Produce the next token, reporting invalid bytes through `logger`.
    pub fn next_token(&mut self, logger: &mut Logger<'_>) -> Token {
        loop {
            if self.state.index as usize >= self.buf.len() {
                return Token::new(TokenKind::Eof, self.make_span(self.state.index, self.state.line, self.state.column, 0));
            }

            let start_index = self.state.index;
            let start_line = self.state.line;
            let start_column = self.state.column;
            let rest = self.rest();
            let b0 = rest[0];

            // 1. newline / whitespace
            if b0 == b'\r' || b0 == b'\n' {
                let len = if b0 == b'\r' && rest.get(1) == Some(&b'\n') { 2 } else { 1 };
                let consumed = &rest[..len];
                self.advance_position(consumed);
                let span = self.make_span(start_index, start_line, start_column, len as u32);
                if self.config.trivia == TriviaMode::Emit {
                    return Token::new(TokenKind::NewLine, span);
                }
                continue;
            }
            if b0.is_ascii_whitespace() {
                let mut len = 0;
                while rest.get(len).is_some_and(|b| b.is_ascii_whitespace() && *b != b'\n' && *b != b'\r') {
                    len += 1;
                }
                let consumed = &rest[..len];
                self.advance_position(consumed);
                let span = self.make_span(start_index, start_line, start_column, len as u32);
                if self.config.trivia == TriviaMode::Emit {
                    return Token::new(TokenKind::Whitespace, span);
                }
                continue;
            }

            // 2. line / block comments
            if rest.starts_with(b"//") {
                let mut len = 2;
                while rest.get(len).is_some_and(|b| *b != b'\n') {
                    len += 1;
                }
                let consumed = &rest[..len];
                self.advance_position(consumed);
                let span = self.make_span(start_index, start_line, start_column, len as u32);
                if self.config.trivia == TriviaMode::Emit {
                    return Token::new(TokenKind::Comment, span);
                }
                continue;
            }
            if rest.starts_with(b"/*") {
                let mut len = 2;
                let mut terminated = false;
                while len < rest.len() {
                    if rest[len..].starts_with(b"*/") {
                        len += 2;
                        terminated = true;
                        break;
                    }
                    len += 1;
                }
                if !terminated {
                    logger.log(
                        codes::UNTERMINATED_COMMENT,
                        start_index,
                        Some(self.make_span(start_index, start_line, start_column, len as u32)),
                        &[],
                    );
                }
                let consumed = &rest[..len];
                self.advance_position(consumed);
                let span = self.make_span(start_index, start_line, start_column, len as u32);
                if self.config.trivia == TriviaMode::Emit {
                    return Token::new(TokenKind::Comment, span);
                }
                continue;
            }

            // 3. keyword (longest prefix, followed by non-word char)
            if is_word_start(b0) {
                if let Some((kw, len)) = self.tables.keywords.longest_prefix(rest) {
                    if rest.get(len).is_none_or(|b| !is_word_continue(*b)) {
                        let consumed = &rest[..len];
                        self.advance_position(consumed);
                        return Token::new(TokenKind::Keyword(kw), self.make_span(start_index, start_line, start_column, len as u32));
                    }
                }
            }

            // 4. operator (longest prefix, followed by non-operator char)
            if !b0.is_ascii_alphanumeric() {
                if let Some((op, len)) = self.tables.operators.longest_prefix(rest) {
                    if rest.get(len).is_none_or(|b| !is_operator_continue(*b)) {
                        let consumed = &rest[..len];
                        self.advance_position(consumed);
                        return Token::new(TokenKind::Operator(op), self.make_span(start_index, start_line, start_column, len as u32));
                    }
                }
            }

            // 5. numeric literal
            if b0.is_ascii_digit() {
                if let Some(scanned) = scan_numeric(rest) {
                    let consumed = &rest[..scanned.byte_length];
                    self.advance_position(consumed);
                    return Token::new(
                        TokenKind::Numeric(scanned.value),
                        self.make_span(start_index, start_line, start_column, scanned.byte_length as u32),
                    );
                }
            }

            // 6. single-character delimiters
            if let Some(delim) = is_delimiter(b0) {
                self.advance_position(&rest[..1]);
                return Token::new(TokenKind::Delimiter(delim), self.make_span(start_index, start_line, start_column, 1));
            }

            // 7. string literal
            if b0 == b'"' {
                let mut len = 1;
                let mut terminated = false;
                while len < rest.len() {
                    match rest[len] {
                        b'\\' if len + 1 < rest.len() => len += 2,
                        b'"' => {
                            len += 1;
                            terminated = true;
                            break;
                        }
                        b'\n' => break,
                        _ => len += 1,
                    }
                }
                let span = self.make_span(start_index, start_line, start_column, len as u32);
                if !terminated {
                    logger.log(codes::UNTERMINATED_STRING, start_index, Some(span), &[]);
                }
                let text = String::from_utf8_lossy(&rest[..len]).into_owned();
                self.advance_position(&rest[..len]);
                return Token::new(TokenKind::Literal(text), span);
            }

            // 8. identifier
            if is_word_start(b0) {
                let mut len = 1;
                while rest.get(len).is_some_and(|b| is_word_continue(*b)) {
                    len += 1;
                }
                let text = String::from_utf8_lossy(&rest[..len]).into_owned();
                self.advance_position(&rest[..len]);
                return Token::new(TokenKind::Identifier(text), self.make_span(start_index, start_line, start_column, len as u32));
            }

            // otherwise: invalid byte, advance one and report.
            logger.log(
                DiagnosticCode::new(hxsl_core::Severity::Error, codes::INVALID_TOKEN.message_id()),
                start_index,
                Some(self.make_span(start_index, start_line, start_column, 1)),
                &[],
            );
            self.advance_position(&rest[..1]);
            return Token::new(TokenKind::Unknown, self.make_span(start_index, start_line, start_column, 1));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hxsl_core::LocaleTable;

    fn tokens(src: &[u8], config: LexerConfig) -> Vec<Token> {
        let locale = LocaleTable::en_us();
        let mut logger = Logger::new(&locale);
        let mut lexer = Lexer::new(SourceId(0), src, config);
        let mut out = Vec::new();
        loop {
            let t = lexer.next_token(&mut logger);
            let is_eof = t.is_eof();
            out.push(t);
            if is_eof {
                break;
            }
        }
        out
    }

    #[test]
    fn keyword_vs_identifier_prefix() {
        let toks = tokens(b"inoutx inout", LexerConfig::parser());
        assert_eq!(toks[0].as_identifier(), Some("inoutx"));
        assert!(matches!(toks[1].kind, TokenKind::Keyword(super::super::token::Keyword::InOut)));
    }

    #[test]
    fn parser_config_drops_whitespace_and_comments() {
        let toks = tokens(b"a /* c */ b // line\nc", LexerConfig::parser());
        let idents: Vec<_> = toks.iter().filter_map(|t| t.as_identifier()).collect();
        assert_eq!(idents, vec!["a", "b", "c"]);
    }

    #[test]
    fn preprocessor_config_emits_newlines() {
        let toks = tokens(b"a\nb", LexerConfig::preprocessor());
        assert!(toks.iter().any(|t| matches!(t.kind, TokenKind::NewLine)));
    }

    #[test]
    fn line_column_tracking_across_newline() {
        let toks = tokens(b"a\nbb", LexerConfig::parser());
        assert_eq!(toks[0].span.line, 1);
        assert_eq!(toks[1].span.line, 2);
        assert_eq!(toks[1].span.column, 1);
    }

    #[test]
    fn invalid_byte_reports_diagnostic_and_advances_one() {
        let locale = LocaleTable::en_us();
        let mut logger = Logger::new(&locale);
        let mut lexer = Lexer::new(SourceId(0), b"@a", LexerConfig::parser());
        let t0 = lexer.next_token(&mut logger);
        assert!(matches!(t0.kind, TokenKind::Unknown));
        let t1 = lexer.next_token(&mut logger);
        assert_eq!(t1.as_identifier(), Some("a"));
        assert_eq!(logger.messages().len(), 1);
    }
}
