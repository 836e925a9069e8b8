//! Preprocessor: macro expansion, conditional compilation, and source
//! position remapping.

mod eval;
mod macros;

pub use macros::{MacroDef, MacroTable};

use hxsl_core::{codes, DiagnosticCode, Logger, Severity};
use std::collections::HashSet;

/// Translates a byte range in the preprocessor's *output* back to the
/// original source's (line, column): a macro expansion shifts the
/// reported line by `line_delta` (always -1 in this design, one line
/// consumed by the macro invocation) and resets the column so
/// diagnostics inside the expanded text still make sense.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextMapping {
    pub output_start: u32,
    pub output_end: u32,
    pub line_delta: i32,
    pub column_reset: bool,
}

/// One `(code, start, end)` warning-suppression range, forwarded to the
/// logger once the range closes.
#[derive(Debug, Clone, Copy)]
struct PendingSuppression {
    code: DiagnosticCode,
    start: u32,
}

struct IfFrame {
    /// Whether the *enclosing* context is itself emitting.
    parent_emit: bool,
    /// Whether some arm of this `#if`/`#elif`/`#else` cascade has already
    /// been taken (subsequent arms are skipped regardless of their own
    /// condition, via `SkipPreprocessorBlock`).
    any_taken: bool,
    /// Whether the arm currently open should have its body copied to the
    /// output.
    current_emit: bool,
}

pub struct Preprocessor {
    pub macros: MacroTable,
    if_stack: Vec<IfFrame>,
    mappings: Vec<TextMapping>,
    open_suppressions: Vec<PendingSuppression>,
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new()
    }
}

impl Preprocessor {
    pub fn new() -> Self {
        Self {
            macros: MacroTable::new(),
            if_stack: Vec::new(),
            mappings: Vec::new(),
            open_suppressions: Vec::new(),
        }
    }

    pub fn mappings(&self) -> &[TextMapping] {
        &self.mappings
    }

    fn currently_emitting(&self) -> bool {
        self.if_stack.last().map(|f| f.current_emit).unwrap_or(true)
    }

    /// Run the preprocessor over `input`, returning the cleaned output
    /// bytes. Diagnostics and warning-suppression ranges are applied to
    /// `logger` as they are encountered.
    pub fn process(&mut self, input: &[u8], logger: &mut Logger<'_>) -> Vec<u8> {
        let mut output: Vec<u8> = Vec::with_capacity(input.len());
        let mut offset: u32 = 0;

        for raw_line in split_lines(input) {
            let line_start = offset;
            let trimmed = trim_leading_ws(raw_line);
            offset += raw_line.len() as u32 + 1; // account for the newline this function strips

            if trimmed.starts_with(b"#") {
                self.handle_directive(&trimmed[1..], line_start, logger);
                continue;
            }

            if !self.currently_emitting() {
                continue;
            }

            if !raw_line.iter().any(|b| !b.is_ascii_whitespace()) {
                output.extend_from_slice(raw_line);
                output.push(b'\n');
                continue;
            }

            let out_start = output.len() as u32;
            let mut active = HashSet::new();
            let (expanded, changed) = self.expand_text(raw_line, &mut active, logger);
            output.extend_from_slice(expanded.as_bytes());
            output.push(b'\n');
            if changed {
                self.mappings.push(TextMapping {
                    output_start: out_start,
                    output_end: output.len() as u32 - 1,
                    line_delta: -1,
                    column_reset: true,
                });
            }
        }

        if !self.if_stack.is_empty() {
            logger.log(codes::UNTERMINATED_IF, offset, None, &[]);
        }

        output
    }

    fn handle_directive(&mut self, rest: &[u8], offset: u32, logger: &mut Logger<'_>) {
        let rest = trim_leading_ws(rest);
        let (name, after) = take_identifier(rest);
        let arg = trim_leading_ws(after);

        match name {
            "define" if self.currently_emitting() => self.handle_define(arg),
            "undef" if self.currently_emitting() => {
                let (ident, _) = take_identifier(arg);
                self.macros.undef(ident);
            }
            "if" => self.push_if(self.currently_emitting() && eval::evaluate(arg, &self.macros).truthy()),
            "ifdef" => {
                let (ident, _) = take_identifier(arg);
                self.push_if(self.currently_emitting() && self.macros.is_defined(ident));
            }
            "ifndef" => {
                let (ident, _) = take_identifier(arg);
                self.push_if(self.currently_emitting() && !self.macros.is_defined(ident));
            }
            "elif" => self.handle_elif(arg),
            "else" => self.handle_else(),
            "endif" => {
                self.if_stack.pop();
            }
            "include" => {
                // Path recognition only; actual opening is delegated to an
                // include handler outside this crate's scope.
            }
            "warning" if self.currently_emitting() => {
                logger.log(codes::PREPROCESSOR_WARNING_DIRECTIVE, offset, None, &[&String::from_utf8_lossy(arg)]);
            }
            "error" if self.currently_emitting() => {
                logger.log(codes::PREPROCESSOR_ERROR_DIRECTIVE, offset, None, &[&String::from_utf8_lossy(arg)]);
            }
            "pragma" if self.currently_emitting() => self.handle_pragma(arg, offset, logger),
            "define" | "undef" | "warning" | "error" | "pragma" => {
                // Directive is well-formed but currently suppressed by an
                // inactive conditional branch; nothing to do.
            }
            _ => {
                logger.log(codes::EXPECTED_DIRECTIVE, offset, None, &[]);
            }
        }
    }

    fn push_if(&mut self, condition_true: bool) {
        let parent_emit = self.currently_emitting();
        let current_emit = parent_emit && condition_true;
        self.if_stack.push(IfFrame {
            parent_emit,
            any_taken: current_emit,
            current_emit,
        });
    }

    fn handle_elif(&mut self, arg: &[u8]) {
        let Some(frame) = self.if_stack.last_mut() else {
            return;
        };
        if frame.any_taken || !frame.parent_emit {
            frame.current_emit = false;
            return;
        }
        let taken = eval::evaluate(arg, &self.macros).truthy();
        frame.current_emit = taken;
        frame.any_taken = taken;
    }

    fn handle_else(&mut self) {
        let Some(frame) = self.if_stack.last_mut() else {
            return;
        };
        frame.current_emit = frame.parent_emit && !frame.any_taken;
        frame.any_taken = true;
    }

    fn handle_pragma(&mut self, arg: &[u8], offset: u32, logger: &mut Logger<'_>) {
        let (kind, after) = take_identifier(arg);
        if kind != "warning" {
            return;
        }
        let after = trim_leading_ws(after);
        let (action, after) = take_identifier(after);
        let after = trim_leading_ws(after);
        let (code_text, _) = take_identifier(after);
        let Ok(code_id) = std::str::from_utf8(code_text).unwrap_or("").parse::<u64>() else {
            return;
        };
        let code = DiagnosticCode::new(Severity::Warning, code_id);
        match action {
            "disable" => {
                self.open_suppressions.push(PendingSuppression { code, start: offset });
            }
            "restore" => {
                if let Some(pos) = self.open_suppressions.iter().position(|p| p.code == code) {
                    let pending = self.open_suppressions.remove(pos);
                    logger.disable_warning(pending.code, pending.start);
                    logger.restore_warning(pending.code, offset);
                }
            }
            _ => {}
        }
    }

    fn handle_define(&mut self, arg: &[u8]) {
        let (name, after) = take_identifier(arg);
        if name.is_empty() {
            return;
        }
        if after.first() == Some(&b'(') {
            let mut depth = 1;
            let mut i = 1;
            while i < after.len() && depth > 0 {
                match after[i] {
                    b'(' => depth += 1,
                    b')' => depth -= 1,
                    _ => {}
                }
                i += 1;
            }
            let params_text = &after[1..i.saturating_sub(1)];
            let params: Vec<String> = params_text
                .split(|b| *b == b',')
                .map(|p| String::from_utf8_lossy(trim(p)).into_owned())
                .filter(|p| !p.is_empty())
                .collect();
            let body = String::from_utf8_lossy(trim(&after[i..])).into_owned();
            self.macros.define(MacroDef {
                name: name.to_string(),
                params: Some(params),
                body,
            });
        } else {
            let body = String::from_utf8_lossy(trim(after)).into_owned();
            self.macros.define(MacroDef {
                name: name.to_string(),
                params: None,
                body,
            });
        }
    }

    /// Expand every macro invocation in `text`. Returns the expanded text
    /// and whether any substitution actually happened.
    fn expand_text(&self, text: &[u8], active: &mut HashSet<String>, logger: &mut Logger<'_>) -> (String, bool) {
        let mut out = String::with_capacity(text.len());
        let mut i = 0;
        let mut changed = false;
        while i < text.len() {
            let b = text[i];
            if b == b'"' {
                let start = i;
                i += 1;
                while i < text.len() && text[i] != b'"' {
                    if text[i] == b'\\' {
                        i += 1;
                    }
                    i += 1;
                }
                i = (i + 1).min(text.len());
                out.push_str(&String::from_utf8_lossy(&text[start..i]));
                continue;
            }
            if b.is_ascii_alphabetic() || b == b'_' {
                let start = i;
                while i < text.len() && (text[i].is_ascii_alphanumeric() || text[i] == b'_') {
                    i += 1;
                }
                let ident = String::from_utf8_lossy(&text[start..i]).into_owned();
                if let Some(expansion) = self.try_expand_ident(&ident, text, &mut i, active, logger) {
                    out.push_str(&expansion);
                    changed = true;
                } else {
                    out.push_str(&ident);
                }
                continue;
            }
            out.push(b as char);
            i += 1;
        }
        (out, changed)
    }

    fn try_expand_ident(
        &self,
        ident: &str,
        text: &[u8],
        i: &mut usize,
        active: &mut HashSet<String>,
        logger: &mut Logger<'_>,
    ) -> Option<String> {
        if active.contains(ident) {
            return None;
        }
        let def = self.macros.get(ident)?;
        if !def.is_function_like() {
            active.insert(ident.to_string());
            let (body, _) = self.expand_text(def.body.as_bytes(), active, logger);
            active.remove(ident);
            return Some(body);
        }

        // Function-like: require a parenthesized argument list immediately
        // following (skipping only whitespace).
        let mut j = *i;
        while j < text.len() && text[j].is_ascii_whitespace() {
            j += 1;
        }
        if text.get(j) != Some(&b'(') {
            return None;
        }
        j += 1;
        let args_start = j;
        let mut depth = 1;
        while j < text.len() && depth > 0 {
            match text[j] {
                b'(' => depth += 1,
                b')' => depth -= 1,
                _ => {}
            }
            if depth > 0 {
                j += 1;
            }
        }
        let args_text = &text[args_start..j];
        *i = (j + 1).min(text.len());

        let args = split_top_level_commas(args_text);
        let params = def.params.clone().unwrap_or_default();
        if args.len() != params.len() {
            logger.log(
                codes::MACRO_PARAM_COUNT_MISMATCH,
                args_start as u32,
                None,
                &[ident, &params.len().to_string(), &args.len().to_string()],
            );
        }

        active.insert(ident.to_string());
        let expanded_args: Vec<String> = args.iter().map(|a| self.expand_text(a, active, logger).0).collect();
        let mut body = def.body.clone();
        for (idx, param) in params.iter().enumerate() {
            let replacement = expanded_args.get(idx).cloned().unwrap_or_default();
            body = substitute_word(&body, param, &replacement);
        }
        let (body, _) = self.expand_text(body.as_bytes(), active, logger);
        active.remove(ident);
        Some(body)
    }
}

fn substitute_word(haystack: &str, word: &str, replacement: &str) -> String {
    let bytes = haystack.as_bytes();
    let mut out = String::with_capacity(haystack.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i].is_ascii_alphabetic() || bytes[i] == b'_' {
            let start = i;
            while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                i += 1;
            }
            let candidate = &haystack[start..i];
            if candidate == word {
                out.push_str(replacement);
            } else {
                out.push_str(candidate);
            }
        } else {
            out.push(bytes[i] as char);
            i += 1;
        }
    }
    out
}

fn split_top_level_commas(text: &[u8]) -> Vec<Vec<u8>> {
    if text.iter().all(|b| b.is_ascii_whitespace()) {
        return Vec::new();
    }
    let mut out = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, &b) in text.iter().enumerate() {
        match b {
            b'(' | b'[' => depth += 1,
            b')' | b']' => depth -= 1,
            b',' if depth == 0 => {
                out.push(trim(&text[start..i]).to_vec());
                start = i + 1;
            }
            _ => {}
        }
    }
    out.push(trim(&text[start..]).to_vec());
    out
}

fn split_lines(input: &[u8]) -> Vec<&[u8]> {
    let mut lines: Vec<&[u8]> = input.split(|b| *b == b'\n').map(strip_cr).collect();
    // A trailing `\n` produces a spurious empty final element that does not
    // correspond to a real line in the original input; drop it so output
    // byte-for-byte matches input on macro-free text.
    if input.last() == Some(&b'\n') {
        lines.pop();
    }
    lines
}

fn strip_cr(line: &[u8]) -> &[u8] {
    if line.last() == Some(&b'\r') {
        &line[..line.len() - 1]
    } else {
        line
    }
}

fn trim_leading_ws(s: &[u8]) -> &[u8] {
    let mut i = 0;
    while i < s.len() && s[i].is_ascii_whitespace() {
        i += 1;
    }
    &s[i..]
}

fn trim(s: &[u8]) -> &[u8] {
    let s = trim_leading_ws(s);
    let mut end = s.len();
    while end > 0 && s[end - 1].is_ascii_whitespace() {
        end -= 1;
    }
    &s[..end]
}

fn take_identifier(s: &[u8]) -> (&str, &[u8]) {
    let mut i = 0;
    while i < s.len() && (s[i].is_ascii_alphanumeric() || s[i] == b'_') {
        i += 1;
    }
    (std::str::from_utf8(&s[..i]).unwrap_or(""), &s[i..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use hxsl_core::LocaleTable;

    fn run(src: &str) -> (String, Preprocessor) {
        let locale = LocaleTable::en_us();
        let mut logger = Logger::new(&locale);
        let mut pp = Preprocessor::new();
        let out = pp.process(src.as_bytes(), &mut logger);
        (String::from_utf8(out).unwrap(), pp)
    }

    #[test]
    fn idempotent_on_macro_free_input() {
        let (out, pp) = run("int x = 1 + 2;\nint y;\n");
        assert_eq!(out, "int x = 1 + 2;\nint y;\n");
        assert!(pp.mappings().is_empty());
    }

    #[test]
    fn object_like_macro_expands() {
        let (out, _) = run("#define PI 3\nfloat x = PI;\n");
        assert_eq!(out, "float x = 3;\n");
    }

    #[test]
    fn function_like_macro_expands_with_nested_parens() {
        let (out, mappings_ok) = run("#define DOUBLE(x) ((x)+(x))\nint y = DOUBLE(3);\n");
        assert_eq!(out, "int y = ((3)+(3));\n");
        assert!(!mappings_ok.mappings().is_empty());
    }

    #[test]
    fn function_like_macro_args_respect_paren_depth_commas() {
        let (out, _) = run("#define ADD(a,b) (a+b)\nint z = ADD((1,2),3);\n");
        assert_eq!(out, "int z = ((1,2)+3);\n");
    }

    #[test]
    fn conditional_compilation_exactly_one_arm_kept() {
        let (out, _) = run("#if 0\nint a;\n#elif 1\nint b;\n#else\nint c;\n#endif\n");
        assert_eq!(out, "int b;\n");
    }

    #[test]
    fn ifdef_and_ifndef() {
        let (out, _) = run("#define X\n#ifdef X\nint a;\n#endif\n#ifndef X\nint b;\n#endif\n");
        assert_eq!(out, "int a;\n");
    }

    #[test]
    fn unterminated_if_reports_diagnostic() {
        let locale = LocaleTable::en_us();
        let mut logger = Logger::new(&locale);
        let mut pp = Preprocessor::new();
        pp.process(b"#if 1\nint a;\n", &mut logger);
        assert!(logger.messages().iter().any(|m| m.code == codes::UNTERMINATED_IF));
    }

    #[test]
    fn pragma_warning_disable_restore_range() {
        let locale = LocaleTable::en_us();
        let mut logger = Logger::new(&locale);
        let mut pp = Preprocessor::new();
        pp.process(b"#pragma warning disable 401\nint a;\n#pragma warning restore 401\n", &mut logger);
        // directly exercise suppression on the logger after the pragma ran
        logger.log(codes::MACRO_PARAM_COUNT_MISMATCH, 5, None, &["m", "1", "2"]);
        assert!(logger.messages().is_empty());
    }

    #[test]
    fn macro_param_count_mismatch_still_expands() {
        let locale = LocaleTable::en_us();
        let mut logger = Logger::new(&locale);
        let mut pp = Preprocessor::new();
        let out = pp.process(b"#define TWO(a,b) (a+b)\nint x = TWO(1);\n", &mut logger);
        assert!(logger.messages().iter().any(|m| m.code == codes::MACRO_PARAM_COUNT_MISMATCH));
        assert_eq!(String::from_utf8(out).unwrap(), "int x = (1+);\n");
    }

    #[test]
    fn nested_if_inside_skipped_branch_is_skipped() {
        let (out, _) = run("#if 0\n#if 1\nint a;\n#endif\nint b;\n#endif\nint c;\n");
        assert_eq!(out, "int c;\n");
    }
}
