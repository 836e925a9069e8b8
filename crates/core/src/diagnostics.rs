//! Structured diagnostics: codes, severities, suppression ranges, and the
//! logger every pipeline stage reports through.

use crate::source::TextSpan;
use std::collections::HashMap;
use std::fmt;

/// Maximum length, in bytes, of a formatted log message; longer messages
/// are truncated rather than growing the logger's message list unbounded.
pub const MAX_LOG_LENGTH: usize = 4096;

/// Number of error-level diagnostics after which the logger escalates to
/// a critical abort.
pub const CRITICAL_ERROR_THRESHOLD: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// A 64-bit diagnostic code: severity in the top two bits, a per-locale
/// message id in the remainder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DiagnosticCode(pub u64);

const SEVERITY_SHIFT: u32 = 62;

impl DiagnosticCode {
    pub const fn new(severity: Severity, message_id: u64) -> Self {
        let sev_bits = match severity {
            Severity::Info => 0u64,
            Severity::Warning => 1u64,
            Severity::Error => 2u64,
        };
        DiagnosticCode((sev_bits << SEVERITY_SHIFT) | (message_id & ((1 << SEVERITY_SHIFT) - 1)))
    }

    pub fn severity(&self) -> Severity {
        match self.0 >> SEVERITY_SHIFT {
            0 => Severity::Info,
            1 => Severity::Warning,
            _ => Severity::Error,
        }
    }

    pub fn message_id(&self) -> u64 {
        self.0 & ((1 << SEVERITY_SHIFT) - 1)
    }
}

/// Code-generated constants, one per diagnostic the pipeline can raise,
/// grouped by error taxonomy (lexical, syntactic, scope/declaration,
/// semantic/type, preprocessor, IR/CFG).
pub mod codes {
    use super::{DiagnosticCode, Severity::*};

    // Lexical
    pub const INVALID_TOKEN: DiagnosticCode = DiagnosticCode::new(Error, 1);
    pub const UNTERMINATED_STRING: DiagnosticCode = DiagnosticCode::new(Error, 2);
    pub const UNTERMINATED_COMMENT: DiagnosticCode = DiagnosticCode::new(Error, 3);
    pub const UNEXPECTED_EOF: DiagnosticCode = DiagnosticCode::new(Error, 4);

    // Syntactic
    pub const EXPECTED_SEMICOLON: DiagnosticCode = DiagnosticCode::new(Error, 100);
    pub const EXPECTED_TOKEN: DiagnosticCode = DiagnosticCode::new(Error, 101);
    pub const MISSING_OPERAND: DiagnosticCode = DiagnosticCode::new(Error, 102);
    pub const UNEXPECTED_TOKEN: DiagnosticCode = DiagnosticCode::new(Error, 103);

    // Scope / declaration
    pub const DECLARATION_OUT_OF_SCOPE: DiagnosticCode = DiagnosticCode::new(Error, 200);
    pub const MODIFIER_CONFLICT: DiagnosticCode = DiagnosticCode::new(Error, 201);
    pub const DUPLICATE_DEFAULT_CASE: DiagnosticCode = DiagnosticCode::new(Error, 202);
    pub const UNEXPECTED_BREAK_STATEMENT: DiagnosticCode = DiagnosticCode::new(Error, 203);

    // Semantic / type
    pub const SYMBOL_NOT_FOUND: DiagnosticCode = DiagnosticCode::new(Error, 300);
    pub const SYMBOL_WRONG_KIND: DiagnosticCode = DiagnosticCode::new(Error, 301);
    pub const USE_BEFORE_DECLARATION: DiagnosticCode = DiagnosticCode::new(Error, 302);
    pub const AMBIGUOUS_OP_OVERLOAD: DiagnosticCode = DiagnosticCode::new(Error, 303);
    pub const NO_OVERLOAD_FOUND: DiagnosticCode = DiagnosticCode::new(Error, 304);
    pub const OPERAND_TYPES_INCOMPATIBLE: DiagnosticCode = DiagnosticCode::new(Error, 305);
    pub const RETURN_TYPE_DOES_NOT_MATCH: DiagnosticCode = DiagnosticCode::new(Error, 306);
    pub const NON_BOOLEAN_CONDITION: DiagnosticCode = DiagnosticCode::new(Error, 307);
    pub const NON_INTEGRAL_INDEX: DiagnosticCode = DiagnosticCode::new(Error, 308);
    pub const NON_ARRAY_INDEX_TARGET: DiagnosticCode = DiagnosticCode::new(Error, 309);
    pub const RECURSIVE_STRUCT_LAYOUT: DiagnosticCode = DiagnosticCode::new(Error, 310);
    pub const CANNOT_CAST: DiagnosticCode = DiagnosticCode::new(Error, 311);
    pub const INVALID_SWIZZLE: DiagnosticCode = DiagnosticCode::new(Error, 312);

    // Preprocessor
    pub const UNTERMINATED_IF: DiagnosticCode = DiagnosticCode::new(Error, 400);
    pub const MACRO_PARAM_COUNT_MISMATCH: DiagnosticCode = DiagnosticCode::new(Warning, 401);
    pub const EXPECTED_DIRECTIVE: DiagnosticCode = DiagnosticCode::new(Error, 402);
    pub const MALFORMED_DIRECTIVE: DiagnosticCode = DiagnosticCode::new(Error, 403);
    pub const PREPROCESSOR_WARNING_DIRECTIVE: DiagnosticCode = DiagnosticCode::new(Warning, 404);
    pub const PREPROCESSOR_ERROR_DIRECTIVE: DiagnosticCode = DiagnosticCode::new(Error, 405);

    // IR / CFG
    pub const UNREACHABLE_CODE: DiagnosticCode = DiagnosticCode::new(Warning, 500);

    // Internal
    pub const TOO_MANY_ERRORS: DiagnosticCode = DiagnosticCode::new(Error, 900);
}

/// One recorded diagnostic, formatted and ready for display.
#[derive(Debug, Clone)]
pub struct LogMessage {
    pub level: Severity,
    pub code: DiagnosticCode,
    pub text: String,
    pub span: Option<TextSpan>,
}

impl fmt::Display for LogMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.level {
            Severity::Info => "Info",
            Severity::Warning => "Warning",
            Severity::Error => "Error",
        };
        if let Some(span) = self.span {
            write!(
                f,
                "[{}] {}: {} (Line: {}, Column: {})",
                level,
                self.code.message_id(),
                self.text,
                span.line,
                span.column
            )
        } else {
            write!(f, "[{}] {}: {}", level, self.code.message_id(), self.text)
        }
    }
}

/// A suppressed diagnostic-code range: `#pragma warning disable C` opens
/// one, `restore` closes it.
#[derive(Debug, Clone, Copy)]
struct SuppressionRange {
    code: DiagnosticCode,
    start: u32,
    end: u32,
}

/// A locale's message table: message id -> format template using `{}`
/// positional placeholders, appended with `(Line: L, Column: C)` by the
/// logger itself rather than baked into the template.
#[derive(Debug, Default)]
pub struct LocaleTable {
    messages: HashMap<u64, String>,
}

impl LocaleTable {
    pub fn new() -> Self {
        Self {
            messages: HashMap::new(),
        }
    }

    pub fn with_message(mut self, id: u64, template: impl Into<String>) -> Self {
        self.messages.insert(id, template.into());
        self
    }

    pub fn format(&self, code: DiagnosticCode, args: &[&str]) -> String {
        match self.messages.get(&code.message_id()) {
            Some(template) => format_placeholders(template, args),
            None => "Unknown localization code".to_string(),
        }
    }

    /// The default English locale, covering the named diagnostic constants.
    pub fn en_us() -> Self {
        use codes::*;
        LocaleTable::new()
            .with_message(INVALID_TOKEN.message_id(), "invalid token")
            .with_message(UNTERMINATED_STRING.message_id(), "unterminated string literal")
            .with_message(UNTERMINATED_COMMENT.message_id(), "unterminated block comment")
            .with_message(UNEXPECTED_EOF.message_id(), "unexpected end of file")
            .with_message(EXPECTED_SEMICOLON.message_id(), "expected ';'")
            .with_message(EXPECTED_TOKEN.message_id(), "expected {}, found {}")
            .with_message(MISSING_OPERAND.message_id(), "missing operand after operator")
            .with_message(UNEXPECTED_TOKEN.message_id(), "unexpected token {}")
            .with_message(DECLARATION_OUT_OF_SCOPE.message_id(), "declaration of {} not permitted in this scope")
            .with_message(MODIFIER_CONFLICT.message_id(), "conflicting modifiers {} and {}")
            .with_message(DUPLICATE_DEFAULT_CASE.message_id(), "duplicate default case")
            .with_message(UNEXPECTED_BREAK_STATEMENT.message_id(), "break statement not within a loop or switch")
            .with_message(SYMBOL_NOT_FOUND.message_id(), "symbol '{}' not found")
            .with_message(SYMBOL_WRONG_KIND.message_id(), "symbol '{}' is not a valid {}")
            .with_message(USE_BEFORE_DECLARATION.message_id(), "use of '{}' before its declaration")
            .with_message(AMBIGUOUS_OP_OVERLOAD.message_id(), "ambiguous operator overload for {}")
            .with_message(NO_OVERLOAD_FOUND.message_id(), "no overload found for {}")
            .with_message(OPERAND_TYPES_INCOMPATIBLE.message_id(), "operand types {} and {} are incompatible")
            .with_message(RETURN_TYPE_DOES_NOT_MATCH.message_id(), "return type {} does not match function return type {}")
            .with_message(NON_BOOLEAN_CONDITION.message_id(), "condition must be bool, found {}")
            .with_message(NON_INTEGRAL_INDEX.message_id(), "index expression must be int or uint, found {}")
            .with_message(NON_ARRAY_INDEX_TARGET.message_id(), "cannot index into non-array type {}")
            .with_message(RECURSIVE_STRUCT_LAYOUT.message_id(), "struct {} has a recursive layout")
            .with_message(CANNOT_CAST.message_id(), "cannot cast from {} to {}")
            .with_message(INVALID_SWIZZLE.message_id(), "invalid swizzle pattern '{}' for type {}")
            .with_message(UNTERMINATED_IF.message_id(), "unterminated #if at end of file")
            .with_message(MACRO_PARAM_COUNT_MISMATCH.message_id(), "macro '{}' expects {} parameters, got {}")
            .with_message(EXPECTED_DIRECTIVE.message_id(), "expected preprocessor directive")
            .with_message(MALFORMED_DIRECTIVE.message_id(), "malformed preprocessor directive")
            .with_message(PREPROCESSOR_WARNING_DIRECTIVE.message_id(), "{}")
            .with_message(PREPROCESSOR_ERROR_DIRECTIVE.message_id(), "{}")
            .with_message(UNREACHABLE_CODE.message_id(), "unreachable code")
            .with_message(TOO_MANY_ERRORS.message_id(), "too many errors, aborting compilation")
    }
}

fn format_placeholders(template: &str, args: &[&str]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut arg_iter = args.iter();
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '{' && chars.peek() == Some(&'}') {
            chars.next();
            if let Some(a) = arg_iter.next() {
                out.push_str(a);
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Collects diagnostics for a compilation unit, applies suppression
/// ranges, and tracks whether a critical abort has been triggered.
pub struct Logger<'a> {
    locale: &'a LocaleTable,
    messages: Vec<LogMessage>,
    suppressions: Vec<SuppressionRange>,
    open_suppressions: HashMap<DiagnosticCode, u32>,
    error_count: usize,
    critical: bool,
}

impl<'a> Logger<'a> {
    pub fn new(locale: &'a LocaleTable) -> Self {
        Self {
            locale,
            messages: Vec::new(),
            suppressions: Vec::new(),
            open_suppressions: HashMap::new(),
            error_count: 0,
            critical: false,
        }
    }

    pub fn is_critical(&self) -> bool {
        self.critical
    }

    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn messages(&self) -> &[LogMessage] {
        &self.messages
    }

    /// `#pragma warning disable <code>`: open a suppression range starting
    /// at `offset`.
    pub fn disable_warning(&mut self, code: DiagnosticCode, offset: u32) {
        self.open_suppressions.insert(code, offset);
    }

    /// `#pragma warning restore <code>`: close the matching open range.
    pub fn restore_warning(&mut self, code: DiagnosticCode, offset: u32) {
        if let Some(start) = self.open_suppressions.remove(&code) {
            self.suppressions.push(SuppressionRange { code, start, end: offset });
        }
    }

    fn is_suppressed(&self, code: DiagnosticCode, offset: u32) -> bool {
        self.suppressions
            .iter()
            .any(|r| r.code == code && offset >= r.start && offset <= r.end)
    }

    /// Record a diagnostic. Returns `true` if a critical abort was just
    /// triggered (error count crossed [`CRITICAL_ERROR_THRESHOLD`]).
    pub fn log(&mut self, code: DiagnosticCode, offset: u32, span: Option<TextSpan>, args: &[&str]) -> bool {
        if self.is_suppressed(code, offset) {
            return false;
        }
        let mut text = self.locale.format(code, args);
        if text.len() > MAX_LOG_LENGTH {
            text.truncate(MAX_LOG_LENGTH);
        }
        let severity = code.severity();
        if severity == Severity::Error {
            self.error_count += 1;
        }
        self.messages.push(LogMessage {
            level: severity,
            code,
            text,
            span,
        });
        if self.error_count >= CRITICAL_ERROR_THRESHOLD && !self.critical {
            self.critical = true;
            self.messages.push(LogMessage {
                level: Severity::Error,
                code: codes::TOO_MANY_ERRORS,
                text: self.locale.format(codes::TOO_MANY_ERRORS, &[]),
                span: None,
            });
            return true;
        }
        false
    }

    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceId;

    fn span(offset: u32) -> TextSpan {
        TextSpan::new(SourceId(0), offset, 1, 1, offset + 1)
    }

    #[test]
    fn suppressed_code_is_dropped_other_code_retained() {
        let locale = LocaleTable::en_us();
        let mut logger = Logger::new(&locale);
        logger.disable_warning(codes::MACRO_PARAM_COUNT_MISMATCH, 0);
        logger.restore_warning(codes::MACRO_PARAM_COUNT_MISMATCH, 100);
        logger.log(codes::MACRO_PARAM_COUNT_MISMATCH, 50, Some(span(50)), &["m", "1", "2"]);
        logger.log(codes::INVALID_TOKEN, 50, Some(span(50)), &[]);
        assert_eq!(logger.messages().len(), 1);
        assert_eq!(logger.messages()[0].code, codes::INVALID_TOKEN);
    }

    #[test]
    fn critical_threshold_escalates_once() {
        let locale = LocaleTable::en_us();
        let mut logger = Logger::new(&locale);
        let mut escalated_at = None;
        for i in 0..CRITICAL_ERROR_THRESHOLD + 5 {
            if logger.log(codes::SYMBOL_NOT_FOUND, i as u32, None, &["x"]) {
                escalated_at = Some(i);
            }
        }
        assert!(logger.is_critical());
        assert_eq!(escalated_at, Some(CRITICAL_ERROR_THRESHOLD - 1));
    }

    #[test]
    fn unknown_locale_code_falls_back() {
        let locale = LocaleTable::new();
        let mut logger = Logger::new(&locale);
        logger.log(codes::INVALID_TOKEN, 0, None, &[]);
        assert_eq!(logger.messages()[0].text, "Unknown localization code");
    }

    #[test]
    fn display_format_matches_spec() {
        let locale = LocaleTable::en_us();
        let mut logger = Logger::new(&locale);
        logger.log(codes::SYMBOL_NOT_FOUND, 10, Some(span(10)), &["foo"]);
        let rendered = logger.messages()[0].to_string();
        assert!(rendered.starts_with("[Error]"));
        assert!(rendered.contains("(Line: 1, Column: 11)"));
    }
}
