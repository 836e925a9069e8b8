//! Constant expression evaluator for `#if` / `#elif`: tokenize to
//! end-of-line, shunting-yard to postfix, then evaluate the postfix stream.
//! Division/modulo by zero yield [`UNKNOWN_NUMBER`], which is falsy.

use super::macros::MacroTable;
use crate::lexer::scan_numeric;
use hxsl_core::{BinOp, Number, UNKNOWN_NUMBER};

#[derive(Debug, Clone, PartialEq)]
enum ExprToken {
    Number(Number),
    Ident(String),
    LParen,
    RParen,
    Op(&'static str),
}

fn tokenize(line: &[u8]) -> Vec<ExprToken> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < line.len() {
        let b = line[i];
        if b.is_ascii_whitespace() {
            i += 1;
            continue;
        }
        if b.is_ascii_digit() {
            if let Some(scanned) = scan_numeric(&line[i..]) {
                out.push(ExprToken::Number(scanned.value));
                i += scanned.byte_length;
                continue;
            }
        }
        if b.is_ascii_alphabetic() || b == b'_' {
            let start = i;
            while i < line.len() && (line[i].is_ascii_alphanumeric() || line[i] == b'_') {
                i += 1;
            }
            out.push(ExprToken::Ident(String::from_utf8_lossy(&line[start..i]).into_owned()));
            continue;
        }
        if b == b'(' {
            out.push(ExprToken::LParen);
            i += 1;
            continue;
        }
        if b == b')' {
            out.push(ExprToken::RParen);
            i += 1;
            continue;
        }
        const TWO_CHAR_OPS: &[(&[u8], &str)] = &[
            (b"&&", "&&"),
            (b"||", "||"),
            (b"<<", "<<"),
            (b">>", ">>"),
            (b"==", "=="),
            (b"!=", "!="),
            (b"<=", "<="),
            (b">=", ">="),
        ];
        let rest = &line[i..];
        if let Some((spelling, sym)) = TWO_CHAR_OPS.iter().find(|(bytes, _)| rest.starts_with(bytes)) {
            out.push(ExprToken::Op(sym));
            i += spelling.len();
            continue;
        }
        const ONE_CHAR_OPS: &[(u8, &str)] = &[
            (b'+', "+"),
            (b'-', "-"),
            (b'*', "*"),
            (b'/', "/"),
            (b'%', "%"),
            (b'&', "&"),
            (b'|', "|"),
            (b'^', "^"),
            (b'~', "~"),
            (b'!', "!"),
            (b'<', "<"),
            (b'>', ">"),
        ];
        if let Some((_, sym)) = ONE_CHAR_OPS.iter().find(|(byte, _)| *byte == b) {
            out.push(ExprToken::Op(sym));
            i += 1;
            continue;
        }
        // Unrecognized byte in a constant expression: skip it. Malformed
        // directives are reported by the caller at the directive level.
        i += 1;
    }
    out
}

fn precedence(op: &str) -> u8 {
    match op {
        "*" | "/" | "%" => 10,
        "+" | "-" => 9,
        "<<" | ">>" => 8,
        "<" | "<=" | ">" | ">=" => 7,
        "==" | "!=" => 6,
        "&" => 5,
        "^" => 4,
        "|" => 3,
        "&&" => 2,
        "||" => 1,
        _ => 0,
    }
}

fn is_unary_context(prev: Option<&ExprToken>) -> bool {
    !matches!(prev, Some(ExprToken::Number(_)) | Some(ExprToken::Ident(_)) | Some(ExprToken::RParen))
}

#[derive(Debug, Clone, PartialEq)]
enum PostfixItem {
    Number(Number),
    Ident(String),
    UnaryOp(&'static str),
    BinOp(&'static str),
}

/// Shunting-yard: infix token stream to postfix, marking unary operators
/// distinctly from binary ones based on the preceding token.
fn to_postfix(tokens: &[ExprToken]) -> Vec<PostfixItem> {
    let mut output = Vec::new();
    let mut op_stack: Vec<&str> = Vec::new();
    // Track whether each stacked operator is unary, parallel to op_stack.
    let mut unary_stack: Vec<bool> = Vec::new();

    for (idx, tok) in tokens.iter().enumerate() {
        match tok {
            ExprToken::Number(n) => output.push(PostfixItem::Number(*n)),
            ExprToken::Ident(name) => output.push(PostfixItem::Ident(name.clone())),
            ExprToken::LParen => {
                op_stack.push("(");
                unary_stack.push(false);
            }
            ExprToken::RParen => {
                while let Some(top) = op_stack.last() {
                    if *top == "(" {
                        break;
                    }
                    let is_unary = unary_stack.pop().unwrap();
                    let op = op_stack.pop().unwrap();
                    output.push(if is_unary { PostfixItem::UnaryOp(leak(op)) } else { PostfixItem::BinOp(leak(op)) });
                }
                op_stack.pop();
                unary_stack.pop();
            }
            ExprToken::Op(sym) => {
                let prev = if idx == 0 { None } else { Some(&tokens[idx - 1]) };
                let unary = matches!(*sym, "-" | "!" | "~" | "+") && is_unary_context(prev);
                let prec = if unary { 11 } else { precedence(sym) };
                while let Some(&top) = op_stack.last() {
                    if top == "(" {
                        break;
                    }
                    let top_is_unary = *unary_stack.last().unwrap();
                    let top_prec = if top_is_unary { 11 } else { precedence(top) };
                    // Left-associative binary pop rule; unary is right-assoc so
                    // never pops an equal-precedence unary waiting below it.
                    if top_prec > prec || (top_prec == prec && !unary) {
                        unary_stack.pop();
                        let op = op_stack.pop().unwrap();
                        output.push(if top_is_unary { PostfixItem::UnaryOp(leak(op)) } else { PostfixItem::BinOp(leak(op)) });
                    } else {
                        break;
                    }
                }
                op_stack.push(sym);
                unary_stack.push(unary);
            }
        }
    }
    while let Some(op) = op_stack.pop() {
        let is_unary = unary_stack.pop().unwrap();
        if op == "(" {
            continue;
        }
        output.push(if is_unary { PostfixItem::UnaryOp(leak(op)) } else { PostfixItem::BinOp(leak(op)) });
    }
    output
}

/// Operator spellings are all `'static` string literals already; this just
/// documents that no real leaking of owned memory happens.
fn leak(op: &str) -> &'static str {
    match op {
        "+" => "+",
        "-" => "-",
        "*" => "*",
        "/" => "/",
        "%" => "%",
        "&" => "&",
        "|" => "|",
        "^" => "^",
        "~" => "~",
        "!" => "!",
        "<" => "<",
        "<=" => "<=",
        ">" => ">",
        ">=" => ">=",
        "==" => "==",
        "!=" => "!=",
        "<<" => "<<",
        ">>" => ">>",
        "&&" => "&&",
        "||" => "||",
        _ => "",
    }
}

fn binop_of(sym: &str) -> BinOp {
    match sym {
        "+" => BinOp::Add,
        "-" => BinOp::Sub,
        "*" => BinOp::Mul,
        "/" => BinOp::Div,
        "%" => BinOp::Mod,
        "&" => BinOp::BitAnd,
        "|" => BinOp::BitOr,
        "^" => BinOp::BitXor,
        "<<" => BinOp::Shl,
        ">>" => BinOp::Shr,
        "==" => BinOp::Eq,
        "!=" => BinOp::Ne,
        "<" => BinOp::Lt,
        "<=" => BinOp::Le,
        ">" => BinOp::Gt,
        ">=" => BinOp::Ge,
        "&&" => BinOp::LogicalAnd,
        "||" => BinOp::LogicalOr,
        _ => unreachable!("unknown binary operator {sym}"),
    }
}

fn eval_postfix(items: &[PostfixItem], macros: &MacroTable) -> Number {
    let mut stack: Vec<Number> = Vec::new();
    let mut i = 0;
    while i < items.len() {
        match &items[i] {
            PostfixItem::Number(n) => stack.push(*n),
            PostfixItem::Ident(name) => {
                if name == "defined" {
                    // `defined(X)` was tokenized as the identifier `defined`
                    // followed by the macro name; consume it specially.
                    if let Some(PostfixItem::Ident(target)) = items.get(i + 1) {
                        stack.push(Number::I32(macros.is_defined(target) as i32));
                        i += 1;
                    } else {
                        stack.push(Number::I32(0));
                    }
                } else {
                    // A bare identifier that is not a macro (already expanded
                    // before evaluation) and not `defined` evaluates to zero.
                    stack.push(Number::I32(0));
                }
            }
            PostfixItem::UnaryOp(op) => {
                let a = stack.pop().unwrap_or(UNKNOWN_NUMBER);
                stack.push(match *op {
                    "-" => a.negate(),
                    "!" => a.logical_not(),
                    "~" => a.as_i64().map(|v| Number::I64(!v)).unwrap_or(UNKNOWN_NUMBER),
                    "+" => a,
                    _ => UNKNOWN_NUMBER,
                });
            }
            PostfixItem::BinOp(op) => {
                let b = stack.pop().unwrap_or(UNKNOWN_NUMBER);
                let a = stack.pop().unwrap_or(UNKNOWN_NUMBER);
                stack.push(a.apply(binop_of(op), b));
            }
        }
        i += 1;
    }
    stack.pop().unwrap_or(UNKNOWN_NUMBER)
}

/// Evaluate a `#if`/`#elif` expression line, with `defined(X)` resolved
/// against `macros`. Identifiers that are neither macros nor
/// `defined(...)` evaluate to zero.
pub fn evaluate(line: &[u8], macros: &MacroTable) -> Number {
    let tokens = tokenize(line);
    let postfix = to_postfix(&tokens);
    eval_postfix(&postfix, macros)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval_str(s: &str) -> Number {
        evaluate(s.as_bytes(), &MacroTable::new())
    }

    #[test]
    fn precedence_multiplication_before_addition() {
        assert_eq!(eval_str("1 + 2 * 3"), Number::I64(7));
    }

    #[test]
    fn parens_override_precedence() {
        assert_eq!(eval_str("(1 + 2) * 3"), Number::I64(9));
    }

    #[test]
    fn division_by_zero_is_unknown() {
        assert!(eval_str("1/0").is_unknown());
    }

    #[test]
    fn defined_on_undefined_macro_is_zero() {
        assert_eq!(eval_str("defined(X)"), Number::I32(0));
    }

    #[test]
    fn defined_on_defined_macro_is_one() {
        let mut macros = MacroTable::new();
        macros.define(super::super::macros::MacroDef {
            name: "X".into(),
            params: None,
            body: String::new(),
        });
        assert_eq!(evaluate(b"defined(X)", &macros), Number::I32(1));
    }

    #[test]
    fn undefined_bare_identifier_is_zero() {
        assert_eq!(eval_str("FOO && 1"), Number::Bool(false));
    }

    #[test]
    fn unary_minus_binds_tighter_than_multiplication() {
        assert_eq!(eval_str("-2 * 3"), Number::I64(-6));
    }

    #[test]
    fn logical_and_short_circuit_value_only() {
        assert_eq!(eval_str("1 && 0"), Number::Bool(false));
        assert_eq!(eval_str("1 && 1"), Number::Bool(true));
    }
}
