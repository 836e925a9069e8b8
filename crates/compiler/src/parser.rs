//! Recursive-descent parser with a Pratt-style (shunting-yard blended with
//! recursive descent) expression parser. Tokens are fully materialized up
//! front so the parser's two recovery hooks
//! (`try_recover_parameter_list`, statement-level sync) can scan forward
//! and the ternary/cast lookahead can backtrack without re-lexing.

use crate::ast::{Ast, BinaryOp, DeclModifiers, NodeId, NodeKind, ParamModifier, UnaryOp};
use crate::lexer::{Delimiter, Keyword, Lexer, LexerConfig, Operator, Token, TokenKind};
use hxsl_core::{codes, Logger, Number, SourceId, TextSpan};

/// Where a declaration appears; used by the `DeclContainerBuilder` pattern
/// to reject e.g. a struct declared at statement scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    TopLevel,
    Namespace,
    Struct,
    Statement,
}

fn tokenize_all(source_id: SourceId, buf: &[u8], logger: &mut Logger<'_>) -> Vec<Token> {
    let mut lexer = Lexer::new(source_id, buf, LexerConfig::parser());
    let mut tokens = Vec::new();
    loop {
        let tok = lexer.next_token(logger);
        let is_eof = tok.is_eof();
        tokens.push(tok);
        if is_eof {
            break;
        }
    }
    tokens
}

pub struct Parser<'ast, 'log, 'loc> {
    tokens: Vec<Token>,
    pos: usize,
    ast: &'ast mut Ast,
    logger: &'log mut Logger<'loc>,
}

impl<'ast, 'log, 'loc> Parser<'ast, 'log, 'loc> {
    pub fn new(source_id: SourceId, buf: &[u8], ast: &'ast mut Ast, logger: &'log mut Logger<'loc>) -> Self {
        let tokens = tokenize_all(source_id, buf, logger);
        Self { tokens, pos: 0, ast, logger }
    }

    /// Parse a whole compilation unit and return its root node id.
    pub fn parse_compilation_unit(&mut self) -> NodeId {
        let start = self.peek().span;
        let root = self.ast.alloc(NodeKind::CompilationUnit { items: vec![] }, start, None);
        let mut items = Vec::new();
        while !self.is_at_end() {
            if let Some(item) = self.parse_decl_item(ScopeKind::TopLevel, root) {
                items.push(item);
            }
        }
        let end = self.tokens.last().map(|t| t.span).unwrap_or(start);
        self.ast.node_mut(root).kind = NodeKind::CompilationUnit { items };
        self.ast.node_mut(root).span = start.merge(&end);
        root
    }

    // ---- token stream plumbing ----

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_at(&self, n: usize) -> &Token {
        let idx = (self.pos + n).min(self.tokens.len() - 1);
        &self.tokens[idx]
    }

    fn is_at_end(&self) -> bool {
        self.peek().is_eof()
    }

    fn advance(&mut self) -> Token {
        let tok = self.peek().clone();
        if !tok.is_eof() {
            self.pos += 1;
        }
        tok
    }

    fn mark(&self) -> usize {
        self.pos
    }

    fn reset(&mut self, mark: usize) {
        self.pos = mark;
    }

    fn check_delim(&self, d: Delimiter) -> bool {
        matches!(&self.peek().kind, TokenKind::Delimiter(x) if *x == d)
    }

    fn check_op(&self, op: Operator) -> bool {
        matches!(&self.peek().kind, TokenKind::Operator(x) if *x == op)
    }

    fn check_kw(&self, kw: Keyword) -> bool {
        matches!(&self.peek().kind, TokenKind::Keyword(x) if *x == kw)
    }

    fn consume_delim(&mut self, d: Delimiter) -> bool {
        if self.check_delim(d) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn consume_op(&mut self, op: Operator) -> bool {
        if self.check_op(op) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn consume_kw(&mut self, kw: Keyword) -> bool {
        if self.check_kw(kw) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_delim(&mut self, d: Delimiter, what: &str) {
        if !self.consume_delim(d) {
            let span = self.peek().span;
            let found = self.describe_current();
            let code = if d == Delimiter::Semicolon { codes::EXPECTED_SEMICOLON } else { codes::EXPECTED_TOKEN };
            self.logger.log(code, span.byte_offset, Some(span), &[what, found.as_str()]);
        }
    }

    fn expect_op(&mut self, op: Operator, what: &str) {
        if !self.consume_op(op) {
            let span = self.peek().span;
            let found = self.describe_current();
            self.logger.log(codes::EXPECTED_TOKEN, span.byte_offset, Some(span), &[what, found.as_str()]);
        }
    }

    fn describe_current(&self) -> String {
        match &self.peek().kind {
            TokenKind::Identifier(s) => s.clone(),
            TokenKind::Keyword(k) => k.spelling().to_string(),
            TokenKind::Operator(o) => o.spelling().to_string(),
            TokenKind::Eof => "end of file".to_string(),
            _ => "token".to_string(),
        }
    }

    fn expect_identifier(&mut self) -> String {
        if let TokenKind::Identifier(s) = self.peek().kind.clone() {
            self.advance();
            s
        } else {
            let span = self.peek().span;
            let found = self.describe_current();
            self.logger.log(codes::EXPECTED_TOKEN, span.byte_offset, Some(span), &["identifier", found.as_str()]);
            String::new()
        }
    }

    /// Statement-level recovery: sync on `;`, `}`, or the start of a
    /// declaration keyword.
    fn recover_statement(&mut self) {
        while !self.is_at_end() {
            if self.consume_delim(Delimiter::Semicolon) {
                return;
            }
            if self.check_delim(Delimiter::RBrace) {
                return;
            }
            if matches!(&self.peek().kind, TokenKind::Keyword(k) if is_decl_start(*k)) {
                return;
            }
            self.advance();
        }
    }

    /// Skip forward through a malformed parameter list until the next `,`
    /// or `)` at paren depth 0.
    fn try_recover_parameter_list(&mut self) {
        let mut depth: i32 = 0;
        while !self.is_at_end() {
            if self.check_delim(Delimiter::LParen) || self.check_delim(Delimiter::LBracket) {
                depth += 1;
            } else if depth == 0 && (self.check_delim(Delimiter::Comma) || self.check_delim(Delimiter::RParen)) {
                return;
            } else if self.check_delim(Delimiter::RParen) || self.check_delim(Delimiter::RBracket) {
                depth -= 1;
            }
            self.advance();
        }
    }

    // ---- declarations ----

    fn parse_modifiers(&mut self) -> DeclModifiers {
        let mut m = DeclModifiers::default();
        loop {
            if self.consume_kw(Keyword::Public) {
                m.public = true;
            } else if self.consume_kw(Keyword::Private) {
                m.private = true;
            } else if self.consume_kw(Keyword::Const) {
                m.is_const = true;
            } else if self.consume_kw(Keyword::Static) {
                m.is_static = true;
            } else {
                break;
            }
        }
        if m.has_conflict() {
            let span = self.peek().span;
            self.logger.log(codes::MODIFIER_CONFLICT, span.byte_offset, Some(span), &["public", "private"]);
        }
        m
    }

    /// Dispatch on the next declaration's kind, rejecting declarations not
    /// permitted at `scope` (the `DeclContainerBuilder` pattern): a struct
    /// at statement scope is flagged rather than silently parsed as if
    /// legal.
    fn parse_decl_item(&mut self, scope: ScopeKind, parent: NodeId) -> Option<NodeId> {
        let start_span = self.peek().span;
        if self.check_delim(Delimiter::LBracket) {
            return Some(self.parse_attribute(parent));
        }
        if self.consume_kw(Keyword::Using) {
            return Some(self.parse_using(parent, start_span));
        }
        if self.consume_kw(Keyword::Namespace) {
            return Some(self.parse_namespace(parent, start_span));
        }

        let modifiers = self.parse_modifiers();

        if self.check_kw(Keyword::Struct) {
            if scope == ScopeKind::Statement {
                let span = self.peek().span;
                self.logger.log(codes::DECLARATION_OUT_OF_SCOPE, span.byte_offset, Some(span), &["struct"]);
            }
            return Some(self.parse_struct(parent, modifiers, start_span));
        }
        if self.check_kw(Keyword::Class) {
            if scope == ScopeKind::Statement {
                let span = self.peek().span;
                self.logger.log(codes::DECLARATION_OUT_OF_SCOPE, span.byte_offset, Some(span), &["class"]);
            }
            return Some(self.parse_class(parent, modifiers, start_span));
        }
        if self.consume_kw(Keyword::Operator) {
            return Some(self.parse_operator_decl(parent, start_span));
        }

        // Remaining shapes share a `type name` prefix: function, field, or
        // local variable declaration, disambiguated by what follows the
        // name.
        if let Some(node) = self.try_parse_typed_decl(scope, parent, modifiers, start_span) {
            return Some(node);
        }

        // Nothing recognized: treat as a statement in statement scope,
        // otherwise skip with a diagnostic.
        if scope == ScopeKind::Statement {
            return Some(self.parse_statement(parent));
        }
        let span = self.peek().span;
        let found = self.describe_current();
        self.logger.log(codes::UNEXPECTED_TOKEN, span.byte_offset, Some(span), &[found.as_str()]);
        self.advance();
        None
    }

    fn parse_attribute(&mut self, parent: NodeId) -> NodeId {
        let start = self.peek().span;
        self.advance(); // '['
        let name = self.expect_identifier();
        let placeholder = self.ast.alloc(NodeKind::AttributeDecl { name: name.clone(), args: vec![] }, start, Some(parent));
        let mut args = Vec::new();
        if self.consume_delim(Delimiter::LParen) {
            while !self.check_delim(Delimiter::RParen) && !self.is_at_end() {
                args.push(self.parse_expr(placeholder));
                if !self.consume_delim(Delimiter::Comma) {
                    break;
                }
            }
            self.expect_delim(Delimiter::RParen, ")");
        }
        self.expect_delim(Delimiter::RBracket, "]");
        self.ast.node_mut(placeholder).kind = NodeKind::AttributeDecl { name, args };
        placeholder
    }

    fn parse_using(&mut self, parent: NodeId, start: TextSpan) -> NodeId {
        let path = self.parse_dotted_path();
        self.expect_delim(Delimiter::Semicolon, ";");
        self.ast.alloc(NodeKind::UsingDecl { path }, start, Some(parent))
    }

    fn parse_dotted_path(&mut self) -> String {
        let mut parts = vec![self.expect_identifier()];
        while self.consume_op(Operator::Dot) {
            parts.push(self.expect_identifier());
        }
        parts.join(".")
    }

    fn parse_namespace(&mut self, parent: NodeId, start: TextSpan) -> NodeId {
        let path = self.parse_dotted_path();
        let placeholder = self.ast.alloc(NodeKind::NamespaceDecl { path: path.clone(), items: vec![] }, start, Some(parent));
        self.expect_delim(Delimiter::LBrace, "{");
        let mut items = Vec::new();
        while !self.check_delim(Delimiter::RBrace) && !self.is_at_end() {
            if let Some(item) = self.parse_decl_item(ScopeKind::Namespace, placeholder) {
                items.push(item);
            }
        }
        self.expect_delim(Delimiter::RBrace, "}");
        self.ast.node_mut(placeholder).kind = NodeKind::NamespaceDecl { path, items };
        placeholder
    }

    fn parse_struct(&mut self, parent: NodeId, modifiers: DeclModifiers, start: TextSpan) -> NodeId {
        self.advance(); // 'struct'
        let name = self.expect_identifier();
        let placeholder = self.ast.alloc(NodeKind::StructDecl { name: name.clone(), fields: vec![], modifiers }, start, Some(parent));
        self.expect_delim(Delimiter::LBrace, "{");
        let mut fields = Vec::new();
        while !self.check_delim(Delimiter::RBrace) && !self.is_at_end() {
            if let Some(item) = self.parse_decl_item(ScopeKind::Struct, placeholder) {
                fields.push(item);
            }
        }
        self.expect_delim(Delimiter::RBrace, "}");
        self.consume_delim(Delimiter::Semicolon);
        self.ast.node_mut(placeholder).kind = NodeKind::StructDecl { name, fields, modifiers };
        placeholder
    }

    fn parse_class(&mut self, parent: NodeId, modifiers: DeclModifiers, start: TextSpan) -> NodeId {
        self.advance(); // 'class'
        let name = self.expect_identifier();
        let placeholder = self.ast.alloc(NodeKind::ClassDecl { name: name.clone(), fields: vec![], modifiers }, start, Some(parent));
        self.expect_delim(Delimiter::LBrace, "{");
        let mut fields = Vec::new();
        while !self.check_delim(Delimiter::RBrace) && !self.is_at_end() {
            if let Some(item) = self.parse_decl_item(ScopeKind::Struct, placeholder) {
                fields.push(item);
            }
        }
        self.expect_delim(Delimiter::RBrace, "}");
        self.consume_delim(Delimiter::Semicolon);
        self.ast.node_mut(placeholder).kind = NodeKind::ClassDecl { name, fields, modifiers };
        placeholder
    }

    fn parse_operator_decl(&mut self, parent: NodeId, start: TextSpan) -> NodeId {
        let (return_type, _) = self.parse_type_name();
        let op = self.parse_overloadable_op();
        self.expect_delim(Delimiter::LParen, "(");
        let placeholder = self.ast.alloc(
            NodeKind::OperatorDecl { op, return_type: return_type.clone(), params: vec![], body: None },
            start,
            Some(parent),
        );
        let params = self.parse_param_list(placeholder);
        self.expect_delim(Delimiter::RParen, ")");
        let body = if self.check_delim(Delimiter::LBrace) { Some(self.parse_block(placeholder)) } else { None };
        if body.is_none() {
            self.expect_delim(Delimiter::Semicolon, ";");
        }
        self.ast.node_mut(placeholder).kind = NodeKind::OperatorDecl { op, return_type, params, body };
        placeholder
    }

    fn parse_overloadable_op(&mut self) -> BinaryOp {
        let span = self.peek().span;
        let op = match self.peek().kind.clone() {
            TokenKind::Operator(Operator::Plus) => Some(BinaryOp::Add),
            TokenKind::Operator(Operator::Minus) => Some(BinaryOp::Sub),
            TokenKind::Operator(Operator::Star) => Some(BinaryOp::Mul),
            TokenKind::Operator(Operator::Slash) => Some(BinaryOp::Div),
            TokenKind::Operator(Operator::Percent) => Some(BinaryOp::Mod),
            TokenKind::Operator(Operator::Eq) => Some(BinaryOp::Eq),
            TokenKind::Operator(Operator::Ne) => Some(BinaryOp::Ne),
            TokenKind::Operator(Operator::Lt) => Some(BinaryOp::Lt),
            TokenKind::Operator(Operator::Gt) => Some(BinaryOp::Gt),
            _ => None,
        };
        match op {
            Some(o) => {
                self.advance();
                o
            }
            None => {
                let found = self.describe_current();
                self.logger.log(codes::EXPECTED_TOKEN, span.byte_offset, Some(span), &["overloadable operator", found.as_str()]);
                BinaryOp::Add
            }
        }
    }

    /// Function/field/local-var declarations all begin `type_name
    /// identifier`; what follows the identifier disambiguates them.
    fn try_parse_typed_decl(
        &mut self,
        scope: ScopeKind,
        parent: NodeId,
        modifiers: DeclModifiers,
        start: TextSpan,
    ) -> Option<NodeId> {
        if !self.looks_like_type_start() {
            return None;
        }
        let mark = self.mark();
        let (type_name, _dims) = self.parse_type_name();
        if !matches!(self.peek().kind, TokenKind::Identifier(_)) {
            self.reset(mark);
            return None;
        }
        let name = self.expect_identifier();

        if self.check_delim(Delimiter::LParen) {
            self.advance();
            return Some(self.parse_function_decl(parent, modifiers, type_name, name, start));
        }

        if scope == ScopeKind::Struct {
            self.expect_delim(Delimiter::Semicolon, ";");
            return Some(self.ast.alloc(NodeKind::FieldDecl { name, type_name }, start, Some(parent)));
        }

        // Variable declaration (top-level/namespace static, or local).
        let placeholder = self.ast.alloc(
            NodeKind::VarDeclStmt { name: name.clone(), type_name: type_name.clone(), init: None, modifiers },
            start,
            Some(parent),
        );
        let init = if self.consume_op(Operator::Assign) { Some(self.parse_expr(placeholder)) } else { None };
        self.expect_delim(Delimiter::Semicolon, ";");
        self.ast.node_mut(placeholder).kind = NodeKind::VarDeclStmt { name, type_name, init, modifiers };
        Some(placeholder)
    }

    fn looks_like_type_start(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Identifier(_))
    }

    fn parse_function_decl(
        &mut self,
        parent: NodeId,
        modifiers: DeclModifiers,
        return_type: String,
        name: String,
        start: TextSpan,
    ) -> NodeId {
        let placeholder = self.ast.alloc(
            NodeKind::FunctionDecl { name: name.clone(), return_type: return_type.clone(), params: vec![], body: None, modifiers },
            start,
            Some(parent),
        );
        let params = self.parse_param_list(placeholder);
        self.expect_delim(Delimiter::RParen, ")");
        let body = if self.check_delim(Delimiter::LBrace) {
            Some(self.parse_block(placeholder))
        } else {
            self.expect_delim(Delimiter::Semicolon, ";");
            None
        };
        self.ast.node_mut(placeholder).kind = NodeKind::FunctionDecl { name, return_type, params, body, modifiers };
        placeholder
    }

    fn parse_param_list(&mut self, parent: NodeId) -> Vec<NodeId> {
        let mut params = Vec::new();
        while !self.check_delim(Delimiter::RParen) && !self.is_at_end() {
            let start = self.peek().span;
            let modifier = if self.consume_kw(Keyword::In) {
                if self.consume_kw(Keyword::Out) {
                    let span = self.peek().span;
                    self.logger.log(codes::MODIFIER_CONFLICT, span.byte_offset, Some(span), &["in", "out"]);
                    ParamModifier::InOut
                } else {
                    ParamModifier::In
                }
            } else if self.consume_kw(Keyword::Out) {
                ParamModifier::Out
            } else if self.consume_kw(Keyword::InOut) {
                ParamModifier::InOut
            } else {
                ParamModifier::In
            };
            if !self.looks_like_type_start() {
                let span = self.peek().span;
                let found = self.describe_current();
                self.logger.log(codes::EXPECTED_TOKEN, span.byte_offset, Some(span), &["parameter type", found.as_str()]);
                self.try_recover_parameter_list();
            } else {
                let (type_name, _) = self.parse_type_name();
                let name = self.expect_identifier();
                params.push(self.ast.alloc(NodeKind::ParamDecl { name, type_name, modifier }, start, Some(parent)));
            }
            if !self.consume_delim(Delimiter::Comma) {
                break;
            }
        }
        params
    }

    /// Parses `base_name[dim][dim]…`; array dims must already be integer
    /// literals — dimension expressions are folded to integers before
    /// this stage sees them.
    fn parse_type_name(&mut self) -> (String, Vec<u32>) {
        let mut name = self.parse_dotted_path();
        let mut dims = Vec::new();
        while self.consume_delim(Delimiter::LBracket) {
            if let TokenKind::Numeric(n) = self.peek().kind.clone() {
                self.advance();
                dims.push(n.as_i64().unwrap_or(0).max(0) as u32);
            }
            self.expect_delim(Delimiter::RBracket, "]");
        }
        if !dims.is_empty() {
            for d in &dims {
                name.push('[');
                name.push_str(&d.to_string());
                name.push(']');
            }
        }
        (name, dims)
    }

    // ---- statements ----

    fn parse_block(&mut self, parent: NodeId) -> NodeId {
        let start = self.peek().span;
        self.advance(); // '{'
        let placeholder = self.ast.alloc(NodeKind::Block { statements: vec![] }, start, Some(parent));
        let mut statements = Vec::new();
        while !self.check_delim(Delimiter::RBrace) && !self.is_at_end() {
            if let Some(item) = self.parse_decl_item(ScopeKind::Statement, placeholder) {
                statements.push(item);
            }
        }
        self.expect_delim(Delimiter::RBrace, "}");
        self.ast.node_mut(placeholder).kind = NodeKind::Block { statements };
        placeholder
    }

    fn parse_statement(&mut self, parent: NodeId) -> NodeId {
        let start = self.peek().span;
        match self.peek().kind.clone() {
            TokenKind::Delimiter(Delimiter::LBrace) => self.parse_block(parent),
            TokenKind::Keyword(Keyword::If) => self.parse_if(parent, start),
            TokenKind::Keyword(Keyword::While) => self.parse_while(parent, start),
            TokenKind::Keyword(Keyword::For) => self.parse_for(parent, start),
            TokenKind::Keyword(Keyword::Return) => self.parse_return(parent, start),
            TokenKind::Keyword(Keyword::Break) => {
                self.advance();
                self.expect_delim(Delimiter::Semicolon, ";");
                self.ast.alloc(NodeKind::BreakStmt, start, Some(parent))
            }
            TokenKind::Keyword(Keyword::Continue) => {
                self.advance();
                self.expect_delim(Delimiter::Semicolon, ";");
                self.ast.alloc(NodeKind::ContinueStmt, start, Some(parent))
            }
            TokenKind::Keyword(Keyword::Switch) => self.parse_switch(parent, start),
            _ => {
                let placeholder = self.ast.alloc(NodeKind::ExprStmt { expr: NodeId(0) }, start, Some(parent));
                let expr = self.parse_expr(placeholder);
                self.expect_delim(Delimiter::Semicolon, ";");
                self.ast.node_mut(placeholder).kind = NodeKind::ExprStmt { expr };
                placeholder
            }
        }
    }

    fn parse_if(&mut self, parent: NodeId, start: TextSpan) -> NodeId {
        self.advance(); // 'if'
        self.expect_delim(Delimiter::LParen, "(");
        let placeholder = self.ast.alloc(
            NodeKind::IfStmt { cond: NodeId(0), then_branch: NodeId(0), else_branch: None },
            start,
            Some(parent),
        );
        let cond = self.parse_expr(placeholder);
        self.expect_delim(Delimiter::RParen, ")");
        let then_branch = self.parse_statement(placeholder);
        let else_branch = if self.consume_kw(Keyword::Else) { Some(self.parse_statement(placeholder)) } else { None };
        self.ast.node_mut(placeholder).kind = NodeKind::IfStmt { cond, then_branch, else_branch };
        placeholder
    }

    fn parse_while(&mut self, parent: NodeId, start: TextSpan) -> NodeId {
        self.advance(); // 'while'
        self.expect_delim(Delimiter::LParen, "(");
        let placeholder = self.ast.alloc(NodeKind::WhileStmt { cond: NodeId(0), body: NodeId(0) }, start, Some(parent));
        let cond = self.parse_expr(placeholder);
        self.expect_delim(Delimiter::RParen, ")");
        let body = self.parse_statement(placeholder);
        self.ast.node_mut(placeholder).kind = NodeKind::WhileStmt { cond, body };
        placeholder
    }

    fn parse_for(&mut self, parent: NodeId, start: TextSpan) -> NodeId {
        self.advance(); // 'for'
        self.expect_delim(Delimiter::LParen, "(");
        let placeholder = self.ast.alloc(
            NodeKind::ForStmt { init: None, cond: None, step: None, body: NodeId(0) },
            start,
            Some(parent),
        );
        let init = if self.check_delim(Delimiter::Semicolon) {
            self.advance();
            None
        } else {
            self.parse_decl_item(ScopeKind::Statement, placeholder)
        };
        let cond = if self.check_delim(Delimiter::Semicolon) { None } else { Some(self.parse_expr(placeholder)) };
        self.expect_delim(Delimiter::Semicolon, ";");
        let step = if self.check_delim(Delimiter::RParen) { None } else { Some(self.parse_expr(placeholder)) };
        self.expect_delim(Delimiter::RParen, ")");
        let body = self.parse_statement(placeholder);
        self.ast.node_mut(placeholder).kind = NodeKind::ForStmt { init, cond, step, body };
        placeholder
    }

    fn parse_return(&mut self, parent: NodeId, start: TextSpan) -> NodeId {
        self.advance(); // 'return'
        let placeholder = self.ast.alloc(NodeKind::ReturnStmt { value: None }, start, Some(parent));
        let value = if self.check_delim(Delimiter::Semicolon) { None } else { Some(self.parse_expr(placeholder)) };
        self.expect_delim(Delimiter::Semicolon, ";");
        self.ast.node_mut(placeholder).kind = NodeKind::ReturnStmt { value };
        placeholder
    }

    fn parse_switch(&mut self, parent: NodeId, start: TextSpan) -> NodeId {
        self.advance(); // 'switch'
        self.expect_delim(Delimiter::LParen, "(");
        let placeholder = self.ast.alloc(NodeKind::SwitchStmt { scrutinee: NodeId(0), cases: vec![] }, start, Some(parent));
        let scrutinee = self.parse_expr(placeholder);
        self.expect_delim(Delimiter::RParen, ")");
        self.expect_delim(Delimiter::LBrace, "{");
        let mut cases = Vec::new();
        let mut seen_default = false;
        while !self.check_delim(Delimiter::RBrace) && !self.is_at_end() {
            let case_start = self.peek().span;
            if self.consume_kw(Keyword::Case) {
                let case_placeholder = self.ast.alloc(NodeKind::CaseStmt { value: None, body: vec![] }, case_start, Some(placeholder));
                let value = self.parse_expr(case_placeholder);
                self.expect_op(Operator::Colon, ":");
                let body = self.parse_case_body(case_placeholder);
                self.ast.node_mut(case_placeholder).kind = NodeKind::CaseStmt { value: Some(value), body };
                cases.push(case_placeholder);
            } else if self.consume_kw(Keyword::Default) {
                if seen_default {
                    let span = self.peek().span;
                    self.logger.log(codes::DUPLICATE_DEFAULT_CASE, span.byte_offset, Some(span), &[]);
                }
                seen_default = true;
                let case_placeholder = self.ast.alloc(NodeKind::CaseStmt { value: None, body: vec![] }, case_start, Some(placeholder));
                self.expect_op(Operator::Colon, ":");
                let body = self.parse_case_body(case_placeholder);
                self.ast.node_mut(case_placeholder).kind = NodeKind::CaseStmt { value: None, body };
                cases.push(case_placeholder);
            } else {
                self.recover_statement();
            }
        }
        self.expect_delim(Delimiter::RBrace, "}");
        self.ast.node_mut(placeholder).kind = NodeKind::SwitchStmt { scrutinee, cases };
        placeholder
    }

    fn parse_case_body(&mut self, parent: NodeId) -> Vec<NodeId> {
        let mut body = Vec::new();
        while !self.check_kw(Keyword::Case) && !self.check_kw(Keyword::Default) && !self.check_delim(Delimiter::RBrace) && !self.is_at_end()
        {
            if let Some(stmt) = self.parse_decl_item(ScopeKind::Statement, parent) {
                body.push(stmt);
            }
        }
        body
    }

    // ---- expressions ----

    fn parse_expr(&mut self, parent: NodeId) -> NodeId {
        self.parse_assignment(parent)
    }

    /// `None` = no assignment operator present; `Some(None)` = plain `=`;
    /// `Some(Some(op))` = compound `op=`. Peeks only; caller advances.
    fn match_assign_op(&self) -> Option<Option<BinaryOp>> {
        match &self.peek().kind {
            TokenKind::Operator(Operator::Assign) => Some(None),
            TokenKind::Operator(Operator::PlusEq) => Some(Some(BinaryOp::Add)),
            TokenKind::Operator(Operator::MinusEq) => Some(Some(BinaryOp::Sub)),
            TokenKind::Operator(Operator::StarEq) => Some(Some(BinaryOp::Mul)),
            TokenKind::Operator(Operator::SlashEq) => Some(Some(BinaryOp::Div)),
            TokenKind::Operator(Operator::PercentEq) => Some(Some(BinaryOp::Mod)),
            TokenKind::Operator(Operator::AmpEq) => Some(Some(BinaryOp::BitAnd)),
            TokenKind::Operator(Operator::PipeEq) => Some(Some(BinaryOp::BitOr)),
            TokenKind::Operator(Operator::CaretEq) => Some(Some(BinaryOp::BitXor)),
            _ => None,
        }
    }

    fn parse_assignment(&mut self, parent: NodeId) -> NodeId {
        let lhs = self.parse_ternary(parent);
        if let Some(compound) = self.match_assign_op() {
            let start = self.ast.node(lhs).span;
            self.advance();
            let placeholder = self.ast.alloc(NodeKind::Assignment { target: lhs, value: lhs }, start, Some(parent));
            self.ast.node_mut(lhs).parent = Some(placeholder);
            let value = self.parse_assignment(placeholder);
            self.ast.node_mut(placeholder).kind = match compound {
                None => NodeKind::Assignment { target: lhs, value },
                Some(op) => NodeKind::CompoundAssignment { op, target: lhs, value },
            };
            return placeholder;
        }
        lhs
    }

    fn parse_ternary(&mut self, parent: NodeId) -> NodeId {
        let cond = self.parse_binary(parent, 0);
        if self.consume_op(Operator::Question) {
            let start = self.ast.node(cond).span;
            let placeholder = self.ast.alloc(NodeKind::Ternary { cond, then_expr: cond, else_expr: cond }, start, Some(parent));
            self.ast.node_mut(cond).parent = Some(placeholder);
            let then_expr = self.parse_expr(placeholder);
            self.expect_op(Operator::Colon, ":");
            let else_expr = self.parse_assignment(placeholder);
            self.ast.node_mut(placeholder).kind = NodeKind::Ternary { cond, then_expr, else_expr };
            return placeholder;
        }
        cond
    }

    fn binary_binding_power(op: Operator) -> Option<(BinaryOp, u8)> {
        use Operator::*;
        Some(match op {
            PipePipe => (BinaryOp::LogicalOr, 1),
            AmpAmp => (BinaryOp::LogicalAnd, 2),
            Pipe => (BinaryOp::BitOr, 3),
            Caret => (BinaryOp::BitXor, 4),
            Amp => (BinaryOp::BitAnd, 5),
            Eq => (BinaryOp::Eq, 6),
            Ne => (BinaryOp::Ne, 6),
            Lt => (BinaryOp::Lt, 7),
            Le => (BinaryOp::Le, 7),
            Gt => (BinaryOp::Gt, 7),
            Ge => (BinaryOp::Ge, 7),
            Shl => (BinaryOp::Shl, 8),
            Shr => (BinaryOp::Shr, 8),
            Plus => (BinaryOp::Add, 9),
            Minus => (BinaryOp::Sub, 9),
            Star => (BinaryOp::Mul, 10),
            Slash => (BinaryOp::Div, 10),
            Percent => (BinaryOp::Mod, 10),
            _ => return None,
        })
    }

    /// Pratt-parse binary operators at or above `min_bp`, left-associative.
    fn parse_binary(&mut self, parent: NodeId, min_bp: u8) -> NodeId {
        let mut lhs = self.parse_unary(parent);
        loop {
            let op = match self.peek().kind {
                TokenKind::Operator(op) => op,
                _ => break,
            };
            let Some((bin_op, bp)) = Self::binary_binding_power(op) else { break };
            if bp < min_bp {
                break;
            }
            self.advance();
            let start = self.ast.node(lhs).span;
            let placeholder = self.ast.alloc(NodeKind::Binary { op: bin_op, lhs, rhs: lhs }, start, Some(parent));
            self.ast.node_mut(lhs).parent = Some(placeholder);
            let rhs = self.parse_binary(placeholder, bp + 1);
            self.ast.node_mut(placeholder).kind = NodeKind::Binary { op: bin_op, lhs, rhs };
            lhs = placeholder;
        }
        lhs
    }

    /// Unary operators use a dedicated precedence level above every binary
    /// operator.
    fn parse_unary(&mut self, parent: NodeId) -> NodeId {
        let start = self.peek().span;
        let op = match &self.peek().kind {
            TokenKind::Operator(Operator::Minus) => Some(UnaryOp::Negate),
            TokenKind::Operator(Operator::Bang) => Some(UnaryOp::LogicalNot),
            TokenKind::Operator(Operator::Tilde) => Some(UnaryOp::BitNot),
            TokenKind::Operator(Operator::PlusPlus) => Some(UnaryOp::PreIncrement),
            TokenKind::Operator(Operator::MinusMinus) => Some(UnaryOp::PreDecrement),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let placeholder = self.ast.alloc(NodeKind::Unary { op, operand: NodeId(0) }, start, Some(parent));
            let operand = self.parse_unary(placeholder);
            self.ast.node_mut(placeholder).kind = NodeKind::Unary { op, operand };
            return placeholder;
        }
        self.parse_postfix(parent)
    }

    fn parse_postfix(&mut self, parent: NodeId) -> NodeId {
        let mut node = self.parse_primary(parent);
        loop {
            if self.consume_op(Operator::Dot) {
                node = self.parse_member_suffix(parent, node);
            } else if self.check_delim(Delimiter::LBracket) {
                node = self.parse_index_suffix(parent, node);
            } else if self.check_op(Operator::PlusPlus) || self.check_op(Operator::MinusMinus) {
                let op = if self.check_op(Operator::PlusPlus) { UnaryOp::PostIncrement } else { UnaryOp::PostDecrement };
                self.advance();
                let start = self.ast.node(node).span;
                let placeholder = self.ast.alloc(NodeKind::Unary { op, operand: node }, start, Some(parent));
                self.ast.node_mut(node).parent = Some(placeholder);
                node = placeholder;
            } else {
                break;
            }
        }
        node
    }

    /// `head.member` or, when immediately followed by `(`, the method call
    /// `head.member(args)` — represented as `MemberAccess{head, member,
    /// next: Some(Call{..})}` since `Call` itself carries no receiver slot.
    fn parse_member_suffix(&mut self, parent: NodeId, head: NodeId) -> NodeId {
        let start = self.ast.node(head).span;
        let member = self.expect_identifier();
        if self.check_delim(Delimiter::LParen) {
            self.advance();
            let placeholder =
                self.ast.alloc(NodeKind::MemberAccess { head, member: member.clone(), next: None }, start, Some(parent));
            self.ast.node_mut(head).parent = Some(placeholder);
            let call = self.parse_call_suffix(placeholder, member.clone());
            self.ast.node_mut(placeholder).kind = NodeKind::MemberAccess { head, member, next: Some(call) };
            return placeholder;
        }
        let placeholder = self.ast.alloc(NodeKind::MemberAccess { head, member, next: None }, start, Some(parent));
        self.ast.node_mut(head).parent = Some(placeholder);
        placeholder
    }

    fn parse_index_suffix(&mut self, parent: NodeId, base: NodeId) -> NodeId {
        let start = self.ast.node(base).span;
        let placeholder = self.ast.alloc(NodeKind::Index { base, indices: vec![], next: None }, start, Some(parent));
        self.ast.node_mut(base).parent = Some(placeholder);
        let mut indices = Vec::new();
        while self.consume_delim(Delimiter::LBracket) {
            indices.push(self.parse_expr(placeholder));
            self.expect_delim(Delimiter::RBracket, "]");
        }
        self.ast.node_mut(placeholder).kind = NodeKind::Index { base, indices, next: None };
        placeholder
    }

    /// Caller has already consumed the opening `(`.
    fn parse_call_suffix(&mut self, parent: NodeId, callee: String) -> NodeId {
        let start = self.peek().span;
        let placeholder = self.ast.alloc(NodeKind::Call { callee: callee.clone(), args: vec![], next: None }, start, Some(parent));
        let mut args = Vec::new();
        while !self.check_delim(Delimiter::RParen) && !self.is_at_end() {
            args.push(self.parse_expr(placeholder));
            if !self.consume_delim(Delimiter::Comma) {
                break;
            }
        }
        self.expect_delim(Delimiter::RParen, ")");
        self.ast.node_mut(placeholder).kind = NodeKind::Call { callee, args, next: None };
        placeholder
    }

    fn parse_primary(&mut self, parent: NodeId) -> NodeId {
        let start = self.peek().span;
        match self.peek().kind.clone() {
            TokenKind::Numeric(n) => {
                self.advance();
                self.ast.alloc(NodeKind::LiteralNumber(n), start, Some(parent))
            }
            TokenKind::Literal(s) => {
                self.advance();
                self.ast.alloc(NodeKind::LiteralString(s), start, Some(parent))
            }
            TokenKind::Identifier(name) if name == "true" || name == "false" => {
                self.advance();
                self.ast.alloc(NodeKind::LiteralBool(name == "true"), start, Some(parent))
            }
            TokenKind::Identifier(name) => {
                self.advance();
                if self.consume_delim(Delimiter::LParen) {
                    self.parse_call_suffix(parent, name)
                } else {
                    self.ast.alloc(NodeKind::Identifier { name }, start, Some(parent))
                }
            }
            TokenKind::Delimiter(Delimiter::LParen) => self.parse_paren_or_cast(parent, start),
            _ => {
                self.logger.log(codes::MISSING_OPERAND, start.byte_offset, Some(start), &[]);
                self.advance();
                self.ast.alloc(NodeKind::LiteralNumber(Number::Unknown), start, Some(parent))
            }
        }
    }

    /// `(expr)` grouping vs. `(Type)expr` explicit cast: disambiguated by
    /// trying a type-name parse and checking whether a `)` followed by an
    /// expression-starting token results; backtracks via `mark`/`reset` if
    /// not.
    fn parse_paren_or_cast(&mut self, parent: NodeId, start: TextSpan) -> NodeId {
        let mark = self.mark();
        self.advance(); // '('
        if matches!(self.peek().kind, TokenKind::Identifier(_)) {
            let (type_name, _) = self.parse_type_name();
            if self.check_delim(Delimiter::RParen) && self.expr_can_start_at(1) {
                self.advance(); // ')'
                let placeholder = self.ast.alloc(NodeKind::Cast { target_type: type_name.clone(), operand: NodeId(0) }, start, Some(parent));
                let operand = self.parse_unary(placeholder);
                self.ast.node_mut(placeholder).kind = NodeKind::Cast { target_type: type_name, operand };
                return placeholder;
            }
        }
        self.reset(mark);
        self.advance(); // '('
        let inner = self.parse_expr(parent);
        self.expect_delim(Delimiter::RParen, ")");
        inner
    }

    fn expr_can_start_at(&self, offset: usize) -> bool {
        matches!(
            self.peek_at(offset).kind,
            TokenKind::Identifier(_)
                | TokenKind::Numeric(_)
                | TokenKind::Literal(_)
                | TokenKind::Delimiter(Delimiter::LParen)
                | TokenKind::Operator(Operator::Minus)
                | TokenKind::Operator(Operator::Bang)
                | TokenKind::Operator(Operator::Tilde)
        )
    }
}

fn is_decl_start(kw: Keyword) -> bool {
    matches!(
        kw,
        Keyword::Struct
            | Keyword::Class
            | Keyword::Namespace
            | Keyword::Using
            | Keyword::Operator
            | Keyword::Public
            | Keyword::Private
            | Keyword::Const
            | Keyword::Static
            | Keyword::If
            | Keyword::While
            | Keyword::For
            | Keyword::Return
            | Keyword::Break
            | Keyword::Continue
            | Keyword::Switch
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use hxsl_core::LocaleTable;

    fn parse(src: &str) -> (Ast, Vec<String>) {
        let locale = LocaleTable::en_us();
        let mut logger = Logger::new(&locale);
        let mut ast = Ast::new();
        {
            let mut parser = Parser::new(SourceId(0), src.as_bytes(), &mut ast, &mut logger);
            parser.parse_compilation_unit();
        }
        (ast, logger.messages().iter().map(|m| m.to_string()).collect())
    }

    #[test]
    fn parses_namespace_and_struct_with_field() {
        let (ast, errs) = parse("namespace a.b { struct S { int x; } }");
        assert!(errs.is_empty(), "{errs:?}");
        let NodeKind::CompilationUnit { items } = &ast.node(ast.root()).kind else { panic!() };
        assert_eq!(items.len(), 1);
        let NodeKind::NamespaceDecl { path, items } = &ast.node(items[0]).kind else { panic!() };
        assert_eq!(path, "a.b");
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn parses_function_with_return_and_body() {
        let (ast, errs) = parse("int f() { return 1 + 2; }");
        assert!(errs.is_empty(), "{errs:?}");
        let NodeKind::CompilationUnit { items } = &ast.node(ast.root()).kind else { panic!() };
        let NodeKind::FunctionDecl { body, .. } = &ast.node(items[0]).kind else { panic!() };
        assert!(body.is_some());
    }

    #[test]
    fn parses_member_access_chain() {
        let (_, errs) = parse("float4 v; float s = v.x;");
        assert!(errs.is_empty(), "{errs:?}");
    }

    #[test]
    fn parses_method_call_chained_off_member_access() {
        let (ast, errs) = parse("float4 f(Texture2D t, SamplerState s, float2 uv) { return t.Sample(s, uv); }");
        assert!(errs.is_empty(), "{errs:?}");
        let NodeKind::CompilationUnit { items } = &ast.node(ast.root()).kind else { panic!() };
        let NodeKind::FunctionDecl { body: Some(body), .. } = &ast.node(items[0]).kind else { panic!() };
        let NodeKind::Block { statements } = &ast.node(*body).kind else { panic!() };
        let NodeKind::ReturnStmt { value: Some(v) } = &ast.node(statements[0]).kind else { panic!() };
        let NodeKind::MemberAccess { member, next, .. } = &ast.node(*v).kind else { panic!() };
        assert_eq!(member, "Sample");
        assert!(next.is_some());
    }

    #[test]
    fn trailing_break_outside_loop_parses_but_is_flagged_later() {
        // The parser never rejects a bare `break`; whether it's actually
        // inside a loop or switch is a later pass's concern once
        // control-flow context is known.
        let (_, errs) = parse("void f() { break; }");
        assert!(errs.is_empty());
    }

    #[test]
    fn ternary_parses_cleanly() {
        let (_, errs) = parse("int f() { return 1 ? 2 : 3; }");
        assert!(errs.is_empty(), "{errs:?}");
    }

    #[test]
    fn malformed_param_list_recovers_to_next_comma() {
        let (ast, errs) = parse("int f(@, int b) { return b; }");
        assert!(!errs.is_empty());
        let NodeKind::CompilationUnit { items } = &ast.node(ast.root()).kind else { panic!() };
        let NodeKind::FunctionDecl { params, .. } = &ast.node(items[0]).kind else { panic!() };
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn explicit_cast_parses_distinctly_from_grouping() {
        let (ast, errs) = parse("float f() { return (float)1; }");
        assert!(errs.is_empty(), "{errs:?}");
        let NodeKind::CompilationUnit { items } = &ast.node(ast.root()).kind else { panic!() };
        let NodeKind::FunctionDecl { body: Some(body), .. } = &ast.node(items[0]).kind else { panic!() };
        let NodeKind::Block { statements } = &ast.node(*body).kind else { panic!() };
        let NodeKind::ReturnStmt { value: Some(v) } = &ast.node(statements[0]).kind else { panic!() };
        assert!(matches!(ast.node(*v).kind, NodeKind::Cast { .. }));
    }

    #[test]
    fn grouping_parens_still_parse_as_plain_expression() {
        let (ast, errs) = parse("float f() { return (1 + 2) * 3; }");
        assert!(errs.is_empty(), "{errs:?}");
        let NodeKind::CompilationUnit { items } = &ast.node(ast.root()).kind else { panic!() };
        let NodeKind::FunctionDecl { body: Some(body), .. } = &ast.node(items[0]).kind else { panic!() };
        let NodeKind::Block { statements } = &ast.node(*body).kind else { panic!() };
        let NodeKind::ReturnStmt { value: Some(v) } = &ast.node(statements[0]).kind else { panic!() };
        assert!(matches!(ast.node(*v).kind, NodeKind::Binary { op: BinaryOp::Mul, .. }));
    }

    #[test]
    fn modifier_conflict_reports_diagnostic() {
        let (_, errs) = parse("public private struct S { int x; }");
        assert!(!errs.is_empty());
    }

    #[test]
    fn switch_with_duplicate_default_is_flagged() {
        let (_, errs) = parse("void f() { switch (1) { default: break; default: break; } }");
        assert!(!errs.is_empty());
    }
}
