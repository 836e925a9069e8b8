//! Symbol resolver: a second AST traversal (after [`crate::collector`]) that
//! binds every identifier, member access, and call to a symbol, pushing a
//! scope onto a stack per declaration it enters.
//!
//! Forward references between sibling declarations (a function body using a
//! struct whose own fields are resolved later in file order) are handled by
//! re-running the whole traversal until a round makes no further progress,
//! rather than replaying a saved deferral context per node — simpler to get
//! right, at the cost of some redundant re-visits on a file this size.

use crate::ast::{Ast, NodeId, NodeKind, SymbolRefState};
use crate::symbols::{ArrayManager, SwizzleManager, SymbolHandle, SymbolKind, SymbolTable};
use hxsl_core::{codes, Logger};
use std::collections::HashMap;

struct LocalBinding {
    type_handle: SymbolHandle,
    decl_offset: u32,
}

pub struct Resolver<'ast, 'tab, 'log, 'loc> {
    ast: &'ast mut Ast,
    table: &'tab mut SymbolTable,
    arrays: ArrayManager,
    swizzles: SwizzleManager,
    logger: &'log mut Logger<'loc>,
    progress: bool,
    silent: bool,
}

const MAX_ROUNDS: u32 = 8;

impl<'ast, 'tab, 'log, 'loc> Resolver<'ast, 'tab, 'log, 'loc> {
    pub fn new(ast: &'ast mut Ast, table: &'tab mut SymbolTable, logger: &'log mut Logger<'loc>) -> Self {
        Self { ast, table, arrays: ArrayManager::new(), swizzles: SwizzleManager::new(), logger, progress: false, silent: false }
    }

    pub fn resolve(&mut self, unit: NodeId) {
        self.silent = true;
        for _ in 0..MAX_ROUNDS {
            self.progress = false;
            let root = self.table.root();
            self.visit(unit, root, &mut Vec::new());
            if !self.progress {
                break;
            }
        }
        self.silent = false;
        let root = self.table.root();
        self.visit(unit, root, &mut Vec::new());
    }

    fn record(&mut self, id: NodeId, state: SymbolRefState) {
        if self.ast.symbol_ref(id) != state {
            self.progress = true;
        }
        self.ast.set_symbol_ref(id, state);
    }

    fn symbol_type(&self, handle: SymbolHandle) -> Option<SymbolHandle> {
        self.table.metadata(handle).and_then(|m| m.type_handle).or_else(|| {
            // A reference that resolved straight to a type (struct/class/
            // primitive) names its own type.
            match self.table.metadata(handle).map(|m| m.kind) {
                Some(SymbolKind::Struct) | Some(SymbolKind::Class) | Some(SymbolKind::Primitive) | Some(SymbolKind::Array) => Some(handle),
                _ => None,
            }
        })
    }

    fn lookup_from_scope(&self, name: &str, scope: SymbolHandle) -> Option<SymbolHandle> {
        let root = self.table.root();
        if let Some(h) = self.table.find_node_part(name, root) {
            return Some(h);
        }
        let mut cur = Some(scope);
        while let Some(s) = cur {
            if let Some(h) = self.table.find_node_part(name, s) {
                return Some(h);
            }
            cur = self.table.parent(s);
        }
        None
    }

    fn split_array_suffix(decorated: &str) -> (&str, Vec<u32>) {
        let Some(i) = decorated.find('[') else { return (decorated, Vec::new()) };
        let base = &decorated[..i];
        let dims = decorated[i..]
            .split(|c| c == '[' || c == ']')
            .filter(|s| !s.is_empty())
            .filter_map(|s| s.parse::<u32>().ok())
            .collect();
        (base, dims)
    }

    /// Resolve a `type_name` string (as stashed by the parser, possibly
    /// array-decorated) to its symbol handle, synthesizing an array symbol
    /// through [`ArrayManager`] when it names one.
    fn resolve_type_name(&mut self, decorated: &str, scope: SymbolHandle) -> Option<SymbolHandle> {
        let (base, dims) = Self::split_array_suffix(decorated);
        let elem = self.lookup_from_scope(base, scope)?;
        if dims.is_empty() {
            return Some(elem);
        }
        let elem_fqn = self.table.full_qualified_name(elem);
        let root = self.table.root();
        Some(self.arrays.get_or_create(self.table, root, elem, &elem_fqn, &dims))
    }

    fn enclosing_type(&self, scope: SymbolHandle) -> Option<SymbolHandle> {
        let mut cur = Some(scope);
        while let Some(s) = cur {
            if matches!(self.table.metadata(s).map(|m| m.kind), Some(SymbolKind::Struct) | Some(SymbolKind::Class)) {
                return Some(s);
            }
            cur = self.table.parent(s);
        }
        None
    }

    fn mark_not_found(&mut self, id: NodeId, span_offset: u32, name: &str) {
        self.record(id, SymbolRefState::NotFound);
        if !self.silent {
            self.logger.log(codes::SYMBOL_NOT_FOUND, span_offset, Some(self.ast.node(id).span), &[name]);
        }
    }

    // ---- declaration / statement traversal ----

    fn visit(&mut self, id: NodeId, scope: SymbolHandle, locals: &mut Vec<HashMap<String, LocalBinding>>) {
        let kind = self.ast.node(id).kind.clone();
        match kind {
            NodeKind::CompilationUnit { items } => {
                for item in items {
                    self.visit(item, scope, locals);
                }
            }
            NodeKind::NamespaceDecl { path, items } => {
                let child = self.table.find_node_full_path(&path, scope).unwrap_or(scope);
                for item in items {
                    self.visit(item, child, locals);
                }
            }
            NodeKind::StructDecl { name, fields, .. } | NodeKind::ClassDecl { name, fields, .. } => {
                let child = self.table.find_node_part(&name, scope).unwrap_or(scope);
                for f in fields {
                    self.visit(f, child, locals);
                }
            }
            NodeKind::FieldDecl { type_name, .. } => {
                if let Some(ty) = self.resolve_type_name(&type_name, scope) {
                    let handle = self.ast.inferred_type(id);
                    if let Some(h) = handle {
                        if let Some(m) = self.table.metadata_mut(h) {
                            m.type_handle = Some(ty);
                        }
                    }
                }
            }
            NodeKind::ParamDecl { name, type_name, .. } => {
                if let Some(ty) = self.resolve_type_name(&type_name, scope) {
                    if let Some(frame) = locals.last_mut() {
                        let offset = self.ast.node(id).span.byte_offset;
                        frame.insert(name, LocalBinding { type_handle: ty, decl_offset: offset });
                    }
                }
            }
            NodeKind::FunctionDecl { return_type, params, body, .. } | NodeKind::OperatorDecl { return_type, params, body, .. } => {
                let fn_handle = self.ast.inferred_type(id);
                if let (Some(ty), Some(h)) = (self.resolve_type_name(&return_type, scope), fn_handle) {
                    if let Some(m) = self.table.metadata_mut(h) {
                        m.type_handle = Some(ty);
                    }
                }
                let fn_scope = fn_handle.unwrap_or(scope);
                locals.push(HashMap::new());
                for p in params {
                    self.visit(p, fn_scope, locals);
                }
                if let Some(b) = body {
                    self.visit(b, fn_scope, locals);
                }
                locals.pop();
            }
            NodeKind::Block { statements } => {
                locals.push(HashMap::new());
                for s in statements {
                    self.visit(s, scope, locals);
                }
                locals.pop();
            }
            NodeKind::VarDeclStmt { name, type_name, init, .. } => {
                if let Some(e) = init {
                    self.visit_expr(e, scope, locals);
                }
                if let Some(ty) = self.resolve_type_name(&type_name, scope) {
                    if let Some(frame) = locals.last_mut() {
                        let offset = self.ast.node(id).span.byte_offset;
                        frame.insert(name, LocalBinding { type_handle: ty, decl_offset: offset });
                    }
                }
            }
            NodeKind::IfStmt { cond, then_branch, else_branch } => {
                self.visit_expr(cond, scope, locals);
                locals.push(HashMap::new());
                self.visit(then_branch, scope, locals);
                locals.pop();
                if let Some(e) = else_branch {
                    locals.push(HashMap::new());
                    self.visit(e, scope, locals);
                    locals.pop();
                }
            }
            NodeKind::WhileStmt { cond, body } => {
                self.visit_expr(cond, scope, locals);
                locals.push(HashMap::new());
                self.visit(body, scope, locals);
                locals.pop();
            }
            NodeKind::ForStmt { init, cond, step, body } => {
                locals.push(HashMap::new());
                if let Some(i) = init {
                    self.visit(i, scope, locals);
                }
                if let Some(c) = cond {
                    self.visit_expr(c, scope, locals);
                }
                if let Some(s) = step {
                    self.visit_expr(s, scope, locals);
                }
                self.visit(body, scope, locals);
                locals.pop();
            }
            NodeKind::ReturnStmt { value } => {
                if let Some(v) = value {
                    self.visit_expr(v, scope, locals);
                }
            }
            NodeKind::SwitchStmt { scrutinee, cases } => {
                self.visit_expr(scrutinee, scope, locals);
                for c in cases {
                    self.visit(c, scope, locals);
                }
            }
            NodeKind::CaseStmt { value, body } => {
                if let Some(v) = value {
                    self.visit_expr(v, scope, locals);
                }
                for s in body {
                    self.visit(s, scope, locals);
                }
            }
            NodeKind::ExprStmt { expr } => {
                self.visit_expr(expr, scope, locals);
            }
            NodeKind::AttributeDecl { args, .. } => {
                for a in args {
                    self.visit_expr(a, scope, locals);
                }
            }
            NodeKind::BreakStmt | NodeKind::ContinueStmt | NodeKind::UsingDecl { .. } => {}
            _ => {}
        }
    }

    // ---- expression resolution ----

    fn visit_expr(&mut self, id: NodeId, scope: SymbolHandle, locals: &mut Vec<HashMap<String, LocalBinding>>) -> Option<SymbolHandle> {
        let kind = self.ast.node(id).kind.clone();
        match kind {
            NodeKind::Identifier { name } => self.resolve_identifier(id, &name, scope, locals),
            NodeKind::MemberAccess { head, member, next } => self.resolve_member_access(id, head, &member, next, scope, locals),
            NodeKind::Call { callee, args, next } => self.resolve_call(id, &callee, &args, next, scope, locals),
            NodeKind::Index { base, indices, next } => {
                let base_ty = self.visit_expr(base, scope, locals);
                for i in &indices {
                    self.visit_expr(*i, scope, locals);
                }
                self.record(id, base_ty.map(SymbolRefState::Resolved).unwrap_or(SymbolRefState::NotFound));
                let result_ty = base_ty.and_then(|t| self.table.metadata(t).and_then(|m| m.type_handle)).or(base_ty);
                if let Some(ty) = result_ty {
                    self.ast.set_inferred_type(id, ty);
                }
                if let Some(n) = next {
                    return self.visit_expr(n, scope, locals);
                }
                result_ty
            }
            NodeKind::Binary { lhs, rhs, .. } => {
                self.visit_expr(lhs, scope, locals);
                self.visit_expr(rhs, scope, locals);
                None
            }
            NodeKind::Unary { operand, .. } => {
                self.visit_expr(operand, scope, locals);
                None
            }
            NodeKind::Cast { operand, .. } => {
                self.visit_expr(operand, scope, locals);
                None
            }
            NodeKind::Ternary { cond, then_expr, else_expr } => {
                self.visit_expr(cond, scope, locals);
                self.visit_expr(then_expr, scope, locals);
                self.visit_expr(else_expr, scope, locals);
                None
            }
            NodeKind::Assignment { target, value } => {
                self.visit_expr(target, scope, locals);
                self.visit_expr(value, scope, locals);
                None
            }
            NodeKind::CompoundAssignment { target, value, .. } => {
                self.visit_expr(target, scope, locals);
                self.visit_expr(value, scope, locals);
                None
            }
            _ => None,
        }
    }

    fn resolve_identifier(
        &mut self,
        id: NodeId,
        name: &str,
        scope: SymbolHandle,
        locals: &mut Vec<HashMap<String, LocalBinding>>,
    ) -> Option<SymbolHandle> {
        if name == "this" {
            let ty = self.enclosing_type(scope);
            self.record(id, ty.map(SymbolRefState::Resolved).unwrap_or(SymbolRefState::NotFound));
            if let Some(t) = ty {
                self.ast.set_inferred_type(id, t);
            }
            return ty;
        }
        // Compares raw post-expansion byte offsets; a macro expansion that
        // shifts a declaration's offset without shifting the use's (or
        // vice versa) can misjudge ordering. Fixing this needs the
        // preprocessor's text mappings threaded through to here.
        let span_offset = self.ast.node(id).span.byte_offset;
        for frame in locals.iter().rev() {
            if let Some(b) = frame.get(name) {
                if span_offset < b.decl_offset && !self.silent {
                    self.logger.log(codes::USE_BEFORE_DECLARATION, span_offset, Some(self.ast.node(id).span), &[name]);
                }
                self.record(id, SymbolRefState::Resolved(b.type_handle));
                self.ast.set_inferred_type(id, b.type_handle);
                return Some(b.type_handle);
            }
        }
        match self.lookup_from_scope(name, scope) {
            Some(h) => {
                let ty = self.symbol_type(h);
                self.record(id, SymbolRefState::Resolved(h));
                if let Some(t) = ty {
                    self.ast.set_inferred_type(id, t);
                }
                ty.or(Some(h))
            }
            None => {
                self.mark_not_found(id, span_offset, name);
                None
            }
        }
    }

    fn resolve_member_access(
        &mut self,
        id: NodeId,
        head: NodeId,
        member: &str,
        next: Option<NodeId>,
        scope: SymbolHandle,
        locals: &mut Vec<HashMap<String, LocalBinding>>,
    ) -> Option<SymbolHandle> {
        let head_ty = self.visit_expr(head, scope, locals);
        let Some(head_ty) = head_ty else {
            self.record(id, SymbolRefState::Deferred);
            return None;
        };

        // `head.Method(args)` is parsed as `MemberAccess{head, member,
        // next: Some(Call{callee: member, args, next: None})}` — the call
        // carries no receiver of its own, so the method's overload
        // signature is looked up as a child of `head_ty` here rather than
        // through the free-function path in `resolve_call`.
        if let Some(call_id) = next {
            let NodeKind::Call { args, .. } = self.ast.node(call_id).kind.clone() else {
                return self.visit_expr(call_id, scope, locals);
            };
            let arg_fqns: Vec<String> = args
                .iter()
                .map(|a| {
                    self.visit_expr(*a, scope, locals)
                        .map(|t| self.table.full_qualified_name(t))
                        .unwrap_or_default()
                })
                .collect();
            let sig = format!("{member}({})", arg_fqns.join(","));
            return match self.table.find_node_part(&sig, head_ty) {
                Some(h) => {
                    let ty = self.symbol_type(h);
                    self.record(id, SymbolRefState::Resolved(h));
                    self.record(call_id, SymbolRefState::Resolved(h));
                    if let Some(t) = ty {
                        self.ast.set_inferred_type(id, t);
                        self.ast.set_inferred_type(call_id, t);
                    }
                    ty
                }
                None => {
                    if self.silent {
                        self.record(id, SymbolRefState::Deferred);
                    } else {
                        let span_offset = self.ast.node(call_id).span.byte_offset;
                        self.mark_not_found(call_id, span_offset, &sig);
                    }
                    None
                }
            };
        }

        let member_handle = self.table.find_node_part(member, head_ty).or_else(|| {
            let meta = self.table.metadata(head_ty)?;
            if meta.kind != SymbolKind::Primitive {
                return None;
            }
            let base_name = self.table.short_name(head_ty).to_string();
            let (scalar, dim) = split_vector_name(&base_name);
            let root = self.table.root();
            self.swizzles.resolve(self.table, root, &base_name, dim, scalar, member)
        });
        match member_handle {
            Some(h) => {
                let ty = self.symbol_type(h);
                self.record(id, SymbolRefState::Resolved(h));
                if let Some(t) = ty {
                    self.ast.set_inferred_type(id, t);
                }
                ty.or(Some(h))
            }
            None => {
                if self.silent {
                    self.record(id, SymbolRefState::Deferred);
                } else {
                    let span_offset = self.ast.node(id).span.byte_offset;
                    self.mark_not_found(id, span_offset, member);
                }
                None
            }
        }
    }

    fn resolve_call(
        &mut self,
        id: NodeId,
        callee: &str,
        args: &[NodeId],
        next: Option<NodeId>,
        scope: SymbolHandle,
        locals: &mut Vec<HashMap<String, LocalBinding>>,
    ) -> Option<SymbolHandle> {
        let arg_fqns: Vec<String> = args
            .iter()
            .map(|a| {
                self.visit_expr(*a, scope, locals)
                    .map(|t| self.table.full_qualified_name(t))
                    .unwrap_or_default()
            })
            .collect();
        let sig = format!("{callee}({})", arg_fqns.join(","));

        // Constructor disambiguation: if `callee` itself names a visible
        // type, try the constructor signature as a child of that type first.
        let resolved = if let Some(type_handle) = self.lookup_from_scope(callee, scope) {
            if matches!(self.table.metadata(type_handle).map(|m| m.kind), Some(SymbolKind::Struct) | Some(SymbolKind::Class)) {
                self.table.find_node_part(&sig, type_handle).or_else(|| self.lookup_from_scope(&sig, scope))
            } else {
                self.lookup_from_scope(&sig, scope)
            }
        } else {
            self.lookup_from_scope(&sig, scope)
        };

        match resolved {
            Some(h) => {
                let ty = self.symbol_type(h);
                self.record(id, SymbolRefState::Resolved(h));
                if let Some(t) = ty {
                    self.ast.set_inferred_type(id, t);
                }
                if let Some(n) = next {
                    return self.visit_expr(n, scope, locals);
                }
                ty
            }
            None => {
                if self.silent {
                    self.record(id, SymbolRefState::Deferred);
                } else {
                    let span_offset = self.ast.node(id).span.byte_offset;
                    self.mark_not_found(id, span_offset, &sig);
                }
                None
            }
        }
    }
}

/// Splits `"float4"` into `("float", 4)`, `"int"` into `("int", 1)`, for
/// swizzle fallback on a primitive member access.
fn split_vector_name(name: &'_ str) -> (&'_ str, u8) {
    if let Some(last) = name.chars().last() {
        if let Some(d) = last.to_digit(10) {
            if (2..=4).contains(&d) {
                return (&name[..name.len() - 1], d as u8);
            }
        }
    }
    (name, 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::Collector;
    use crate::parser::Parser;
    use hxsl_core::{LocaleTable, SourceId};

    fn resolve(src: &str) -> (Ast, SymbolTable, Vec<String>) {
        let locale = LocaleTable::en_us();
        let mut logger = Logger::new(&locale);
        let mut ast = Ast::new();
        let unit = {
            let mut parser = Parser::new(SourceId(0), src.as_bytes(), &mut ast, &mut logger);
            parser.parse_compilation_unit()
        };
        let mut table = SymbolTable::new(1);
        {
            let root = table.root();
            // seed the local table with core primitives so scalar/vector
            // lookups succeed without pulling in the process-wide singleton.
            for name in ["void", "int", "uint", "float", "bool", "float2", "float3", "float4"] {
                let _ = table.insert(
                    root,
                    name,
                    crate::symbols::SymbolMetadata {
                        kind: SymbolKind::Primitive,
                        access: crate::symbols::AccessModifier::Public,
                        declaration: None,
                        type_handle: None,
                    },
                );
            }
        }
        Collector::new(&mut ast, &mut table).collect(unit);
        Resolver::new(&mut ast, &mut table, &mut logger).resolve(unit);
        (ast, table, logger.messages().iter().map(|m| m.to_string()).collect())
    }

    #[test]
    fn local_variable_resolves_to_its_declared_type() {
        let (ast, table, errs) = resolve("void f() { int x = 1; int y = x; }");
        assert!(errs.is_empty(), "{errs:?}");
        let NodeKind::CompilationUnit { items } = &ast.node(ast.root()).kind else { panic!() };
        let NodeKind::FunctionDecl { body: Some(body), .. } = &ast.node(items[0]).kind else { panic!() };
        let NodeKind::Block { statements } = &ast.node(*body).kind else { panic!() };
        let NodeKind::VarDeclStmt { init: Some(init), .. } = &ast.node(statements[1]).kind else { panic!() };
        assert!(matches!(ast.symbol_ref(*init), SymbolRefState::Resolved(_)));
        let int_ty = table.find_node_full_path("int", table.root()).expect("int primitive seeded");
        assert_eq!(ast.inferred_type(*init), Some(int_ty));
    }

    #[test]
    fn unknown_identifier_is_not_found() {
        let (_, _, errs) = resolve("void f() { int y = z; }");
        assert!(!errs.is_empty());
    }

    #[test]
    fn member_access_resolves_forward_referenced_struct_field() {
        // f is visited before A's own FieldDecl sets `link`'s type, so the
        // chained `a.link.tag` access defers in round one and only
        // resolves once the fixed-point loop revisits it in round two.
        let src = "void f() { A a; int t = a.link.tag; } struct A { B link; } struct B { int tag; }";
        let (_, _, errs) = resolve(src);
        assert!(errs.is_empty(), "{errs:?}");
    }

    #[test]
    fn use_before_declaration_is_flagged_for_locals() {
        let (_, _, errs) = resolve("void f() { int y = x; int x = 1; }");
        assert!(errs.iter().any(|e| e.contains("before its declaration")));
    }

    #[test]
    fn swizzle_member_access_resolves_on_vector_primitive() {
        let (_, _, errs) = resolve("void f() { float4 v; float s = v.xyz.x; }");
        assert!(errs.is_empty(), "{errs:?}");
    }
}
