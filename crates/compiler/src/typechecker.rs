//! Type checker: a third AST traversal (after [`crate::collector`] and
//! [`crate::resolver`]) that infers every expression's type, inserts
//! implicit casts, and chooses operator overloads.
//!
//! Expression checking here is implemented as plain recursion rather than
//! an explicit "push child back onto a stack with an incremented
//! lazy-eval state" device: recursing into children before finalizing the
//! parent produces the same bottom-up visitation order without needing an
//! explicit revisit counter, since Rust's call stack already is that
//! stack.

use crate::ast::{Ast, BinaryOp, NodeId, NodeKind, UnaryOp};
use crate::symbols::{SymbolHandle, SymbolKind, SymbolTable};
use hxsl_core::{codes, Logger, Number};

pub struct TypeChecker<'ast, 'tab, 'log, 'loc> {
    ast: &'ast mut Ast,
    table: &'tab SymbolTable,
    logger: &'log mut Logger<'loc>,
    return_type: Vec<Option<SymbolHandle>>,
    loop_depth: u32,
    switch_depth: u32,
}

impl<'ast, 'tab, 'log, 'loc> TypeChecker<'ast, 'tab, 'log, 'loc> {
    pub fn new(ast: &'ast mut Ast, table: &'tab SymbolTable, logger: &'log mut Logger<'loc>) -> Self {
        Self { ast, table, logger, return_type: Vec::new(), loop_depth: 0, switch_depth: 0 }
    }

    pub fn check(&mut self, unit: NodeId) {
        self.check_recursive_layouts(unit);
        let items = match &self.ast.node(unit).kind {
            NodeKind::CompilationUnit { items } => items.clone(),
            _ => return,
        };
        for item in items {
            self.check_item(item);
        }
    }

    // ---- helpers ----

    /// Resolves a root-scoped type name: primitives and top-level
    /// struct/class declarations. Local variable declarations name their
    /// type this way rather than through the resolver's full scope-stack
    /// walk (`Resolver::lookup_from_scope`), since the type checker has
    /// no access to that scope chain; a type declared inside a
    /// `namespace` block and used as a local's declared type without a
    /// qualifying prefix won't resolve here.
    fn primitive(&self, name: &str) -> Option<SymbolHandle> {
        let root = self.table.root();
        self.table.find_node_full_path(name, root)
    }

    fn fqn(&self, handle: SymbolHandle) -> String {
        self.table.full_qualified_name(handle)
    }

    fn is_named(&self, handle: SymbolHandle, name: &str) -> bool {
        self.fqn(handle) == name
    }

    fn kind_of(&self, handle: SymbolHandle) -> Option<SymbolKind> {
        self.table.metadata(handle).map(|m| m.kind)
    }

    fn span_offset(&self, id: NodeId) -> u32 {
        self.ast.node(id).span.byte_offset
    }

    fn ty(&self, id: NodeId) -> Option<SymbolHandle> {
        self.ast.inferred_type(id)
    }

    /// Implicit conversion edge `implicit->{to}` registered under `from`
    /// by [`crate::symbols::populate_primitives`]'s conversion grid.
    fn implicit_conversion(&self, from: SymbolHandle, to_name: &str) -> Option<SymbolHandle> {
        let sig = format!("implicit->{to_name}");
        self.table.find_node_part(&sig, from)
    }

    fn explicit_conversion(&self, from: SymbolHandle, to_name: &str) -> Option<SymbolHandle> {
        let from_name = self.fqn(from);
        let sig = format!("cast#{to_name}({from_name})");
        self.table.find_node_part(&sig, from)
    }

    /// Wraps `operand` in a synthetic `Cast` node targeting `target`.
    /// Integer literals that already hold a non-negative value and check
    /// against an unsigned target are reinterpreted in place instead of
    /// getting a cast node.
    fn insert_cast(&mut self, operand: NodeId, target: SymbolHandle) -> NodeId {
        let target_name = self.fqn(target);
        if target_name == "uint" {
            if let NodeKind::LiteralNumber(n) = &self.ast.node(operand).kind {
                if n.as_i64().is_some_and(|v| v >= 0) {
                    self.ast.set_inferred_type(operand, target);
                    return operand;
                }
            }
        }
        let span = self.ast.node(operand).span;
        let parent = self.ast.node(operand).parent;
        let cast_id = self.ast.alloc(NodeKind::Cast { target_type: target_name, operand }, span, parent);
        self.ast.node_mut(operand).parent = Some(cast_id);
        if let Some(p) = parent {
            self.ast.replace_child(p, operand, cast_id);
        }
        self.ast.set_inferred_type(cast_id, target);
        cast_id
    }

    /// Ensures `id`'s type is convertible to `target`, inserting an
    /// implicit cast if needed. Returns `false` (and logs a diagnostic)
    /// if no implicit path exists.
    fn coerce(&mut self, id: NodeId, target: SymbolHandle) -> bool {
        let Some(source) = self.ty(id) else { return false };
        if source == target {
            return true;
        }
        let target_name = self.fqn(target);
        if self.implicit_conversion(source, &target_name).is_some() || self.is_numeric_literal_fit(id, &target_name) {
            self.insert_cast(id, target);
            true
        } else {
            let span = self.ast.node(id).span;
            let source_name = self.fqn(source);
            self.logger.log(codes::OPERAND_TYPES_INCOMPATIBLE, span.byte_offset, Some(span), &[&source_name, &target_name]);
            false
        }
    }

    fn is_numeric_literal_fit(&self, id: NodeId, target_name: &str) -> bool {
        matches!(self.ast.node(id).kind, NodeKind::LiteralNumber(_)) && target_name == "uint"
    }

    // ---- declarations ----

    fn check_item(&mut self, id: NodeId) {
        let kind = self.ast.node(id).kind.clone();
        match kind {
            NodeKind::NamespaceDecl { items, .. } => {
                for i in items {
                    self.check_item(i);
                }
            }
            NodeKind::StructDecl { fields, .. } | NodeKind::ClassDecl { fields, .. } => {
                for f in fields {
                    self.check_item(f);
                }
            }
            NodeKind::FieldDecl { .. } => {}
            NodeKind::FunctionDecl { body, .. } | NodeKind::OperatorDecl { body, .. } => {
                // The function/operator's own symbol (stashed by the
                // collector via `ast.inferred_type(id)`) carries its
                // resolved return type in `type_handle`, set by the
                // resolver — looking that up here (rather than
                // re-resolving `return_type` against only the root scope)
                // correctly handles return types that name a namespaced
                // struct/class.
                let ret = self.ty(id).and_then(|h| self.table.metadata(h).and_then(|m| m.type_handle));
                self.return_type.push(ret);
                if let Some(b) = body {
                    self.check_stmt(b);
                }
                self.return_type.pop();
            }
            NodeKind::UsingDecl { .. } | NodeKind::AttributeDecl { .. } => {}
            _ => {}
        }
    }

    fn check_recursive_layouts(&mut self, unit: NodeId) {
        let mut decls = Vec::new();
        self.collect_type_decls(unit, &mut decls);
        for (decl_id, handle) in decls {
            let mut visiting = Vec::new();
            if self.has_layout_cycle(handle, handle, &mut visiting) {
                let span = self.ast.node(decl_id).span;
                let name = self.table.short_name(handle).to_string();
                self.logger.log(codes::RECURSIVE_STRUCT_LAYOUT, span.byte_offset, Some(span), &[&name]);
            }
        }
    }

    fn collect_type_decls(&self, id: NodeId, out: &mut Vec<(NodeId, SymbolHandle)>) {
        match &self.ast.node(id).kind {
            NodeKind::CompilationUnit { items } | NodeKind::NamespaceDecl { items, .. } => {
                let items = items.clone();
                for i in items {
                    self.collect_type_decls(i, out);
                }
            }
            NodeKind::StructDecl { .. } | NodeKind::ClassDecl { .. } => {
                if let Some(h) = self.ty(id) {
                    out.push((id, h));
                }
            }
            _ => {}
        }
    }

    fn has_layout_cycle(&self, start: SymbolHandle, current: SymbolHandle, visiting: &mut Vec<SymbolHandle>) -> bool {
        if visiting.contains(&current) {
            return current == start;
        }
        visiting.push(current);
        for child in self.table.children(current).collect::<Vec<_>>() {
            let Some(meta) = self.table.metadata(child) else { continue };
            if meta.kind != SymbolKind::Field {
                continue;
            }
            let Some(field_ty) = meta.type_handle else { continue };
            if !matches!(self.kind_of(field_ty), Some(SymbolKind::Struct) | Some(SymbolKind::Class)) {
                continue;
            }
            if field_ty == start || self.has_layout_cycle(start, field_ty, visiting) {
                return true;
            }
        }
        visiting.pop();
        false
    }

    // ---- statements ----

    fn check_stmt(&mut self, id: NodeId) {
        let kind = self.ast.node(id).kind.clone();
        match kind {
            NodeKind::Block { statements } => {
                for s in statements {
                    self.check_stmt(s);
                }
            }
            NodeKind::VarDeclStmt { type_name, init, .. } => {
                if let Some(init) = init {
                    self.check_expr(init);
                    if let Some(target) = self.primitive(&type_name) {
                        self.coerce(init, target);
                    }
                }
            }
            NodeKind::IfStmt { cond, then_branch, else_branch } => {
                self.check_condition(cond);
                self.check_stmt(then_branch);
                if let Some(e) = else_branch {
                    self.check_stmt(e);
                }
            }
            NodeKind::WhileStmt { cond, body } => {
                self.check_condition(cond);
                self.loop_depth += 1;
                self.check_stmt(body);
                self.loop_depth -= 1;
            }
            NodeKind::ForStmt { init, cond, step, body } => {
                if let Some(i) = init {
                    self.check_stmt(i);
                }
                if let Some(c) = cond {
                    self.check_condition(c);
                }
                if let Some(s) = step {
                    self.check_expr(s);
                }
                self.loop_depth += 1;
                self.check_stmt(body);
                self.loop_depth -= 1;
            }
            NodeKind::ReturnStmt { value } => {
                if let Some(v) = value {
                    self.check_expr(v);
                    if let Some(Some(ret)) = self.return_type.last().copied() {
                        if !self.coerce(v, ret) {
                            let span = self.ast.node(v).span;
                            let have = self.ty(v).map(|h| self.fqn(h)).unwrap_or_default();
                            let want = self.fqn(ret);
                            self.logger.log(codes::RETURN_TYPE_DOES_NOT_MATCH, span.byte_offset, Some(span), &[&have, &want]);
                        }
                    }
                }
            }
            NodeKind::BreakStmt => {
                if self.loop_depth == 0 && self.switch_depth == 0 {
                    let span = self.ast.node(id).span;
                    self.logger.log(codes::UNEXPECTED_BREAK_STATEMENT, span.byte_offset, Some(span), &[]);
                }
            }
            NodeKind::ContinueStmt => {}
            NodeKind::SwitchStmt { scrutinee, cases } => {
                self.check_expr(scrutinee);
                self.switch_depth += 1;
                for c in cases {
                    self.check_stmt(c);
                }
                self.switch_depth -= 1;
            }
            NodeKind::CaseStmt { value, body } => {
                if let Some(v) = value {
                    self.check_expr(v);
                }
                for s in body {
                    self.check_stmt(s);
                }
            }
            NodeKind::ExprStmt { expr } => {
                self.check_expr(expr);
            }
            NodeKind::AttributeDecl { args, .. } => {
                for a in args {
                    self.check_expr(a);
                }
            }
            _ => {}
        }
    }

    fn check_condition(&mut self, id: NodeId) {
        self.check_expr(id);
        if let Some(bool_ty) = self.primitive("bool") {
            if !self.coerce(id, bool_ty) {
                let span = self.ast.node(id).span;
                let have = self.ty(id).map(|h| self.fqn(h)).unwrap_or_default();
                self.logger.log(codes::NON_BOOLEAN_CONDITION, span.byte_offset, Some(span), &[&have]);
            }
        }
    }

    // ---- expressions ----

    fn check_expr(&mut self, id: NodeId) {
        let kind = self.ast.node(id).kind.clone();
        match kind {
            NodeKind::LiteralBool(_) => {
                if let Some(h) = self.primitive("bool") {
                    self.ast.set_inferred_type(id, h);
                }
            }
            NodeKind::LiteralNumber(n) => {
                if let Some(h) = self.primitive(number_primitive_name(n)) {
                    self.ast.set_inferred_type(id, h);
                }
            }
            NodeKind::LiteralString(_) => {
                if let Some(h) = self.primitive("string") {
                    self.ast.set_inferred_type(id, h);
                }
            }
            NodeKind::Identifier { .. } | NodeKind::Call { .. } | NodeKind::MemberAccess { .. } => {
                // Already resolved (and typed, where resolvable) by the
                // resolver; nothing further to infer here.
                self.check_children(id);
            }
            NodeKind::Index { base, indices, .. } => {
                self.check_expr(base);
                for i in &indices {
                    self.check_expr(*i);
                }
                if let Some(base_ty) = self.ty(base) {
                    if !matches!(self.kind_of(base_ty), Some(SymbolKind::Array)) {
                        let span = self.ast.node(id).span;
                        let base_name = self.fqn(base_ty);
                        self.logger.log(codes::NON_ARRAY_INDEX_TARGET, span.byte_offset, Some(span), &[&base_name]);
                    }
                }
                for i in &indices {
                    if let Some(idx_ty) = self.ty(*i) {
                        if !self.is_named(idx_ty, "int") && !self.is_named(idx_ty, "uint") {
                            let span = self.ast.node(*i).span;
                            let idx_name = self.fqn(idx_ty);
                            self.logger.log(codes::NON_INTEGRAL_INDEX, span.byte_offset, Some(span), &[&idx_name]);
                        }
                    }
                }
            }
            NodeKind::Binary { op, lhs, rhs } => self.check_binary(id, op, lhs, rhs),
            NodeKind::Unary { op, operand } => self.check_unary(id, op, operand),
            NodeKind::Cast { target_type, operand } => {
                self.check_expr(operand);
                let Some(source) = self.ty(operand) else { return };
                match self.explicit_conversion(source, &target_type) {
                    Some(_) => {
                        if let Some(target) = self.primitive(&target_type) {
                            self.ast.set_inferred_type(id, target);
                        }
                    }
                    None => {
                        let span = self.ast.node(id).span;
                        let source_name = self.fqn(source);
                        self.logger.log(codes::CANNOT_CAST, span.byte_offset, Some(span), &[&source_name, &target_type]);
                    }
                }
            }
            NodeKind::Ternary { cond, then_expr, else_expr } => {
                self.check_condition(cond);
                self.check_expr(then_expr);
                self.check_expr(else_expr);
                match (self.ty(then_expr), self.ty(else_expr)) {
                    (Some(t), Some(e)) if t == e => self.ast.set_inferred_type(id, t),
                    (Some(t), Some(e)) => {
                        let span = self.ast.node(id).span;
                        let (tn, en) = (self.fqn(t), self.fqn(e));
                        self.logger.log(codes::OPERAND_TYPES_INCOMPATIBLE, span.byte_offset, Some(span), &[&tn, &en]);
                    }
                    _ => {}
                }
            }
            NodeKind::Assignment { target, value } => {
                self.check_expr(target);
                self.check_expr(value);
                if let Some(target_ty) = self.ty(target) {
                    self.coerce(value, target_ty);
                    self.ast.set_inferred_type(id, target_ty);
                }
            }
            NodeKind::CompoundAssignment { op, target, value } => {
                self.check_expr(target);
                self.check_expr(value);
                if let (Some(target_ty), Some(value_ty)) = (self.ty(target), self.ty(value)) {
                    if let Some(result_ty) = self.resolve_binary_overload(id, op, target, value, target_ty, value_ty) {
                        self.coerce_result_into(id, result_ty, target_ty);
                    }
                }
            }
            NodeKind::ArrayTypeRef { .. } => {}
            _ => self.check_children(id),
        }
    }

    /// Statements and a handful of expression kinds this checker doesn't
    /// itself type (e.g. the `Call` args, already walked by the
    /// resolver) still need their subtrees visited for nested
    /// expressions the resolver's own recursion doesn't reach twice.
    fn check_children(&mut self, id: NodeId) {
        let kind = self.ast.node(id).kind.clone();
        match kind {
            NodeKind::Call { args, next, .. } => {
                for a in args {
                    self.check_expr(a);
                }
                if let Some(n) = next {
                    self.check_expr(n);
                }
            }
            NodeKind::MemberAccess { head, next, .. } => {
                self.check_expr(head);
                if let Some(n) = next {
                    self.check_expr(n);
                }
            }
            _ => {}
        }
    }

    fn coerce_result_into(&mut self, id: NodeId, result_ty: SymbolHandle, target_ty: SymbolHandle) {
        if result_ty == target_ty {
            self.ast.set_inferred_type(id, target_ty);
            return;
        }
        let target_name = self.fqn(target_ty);
        if self.implicit_conversion(result_ty, &target_name).is_some() {
            self.ast.set_inferred_type(id, target_ty);
        } else {
            let span = self.ast.node(id).span;
            let result_name = self.fqn(result_ty);
            self.logger.log(codes::OPERAND_TYPES_INCOMPATIBLE, span.byte_offset, Some(span), &[&result_name, &target_name]);
        }
    }

    fn check_unary(&mut self, id: NodeId, op: UnaryOp, operand: NodeId) {
        self.check_expr(operand);
        let Some(ty) = self.ty(operand) else { return };
        if matches!(
            op,
            UnaryOp::PreIncrement | UnaryOp::PreDecrement | UnaryOp::PostIncrement | UnaryOp::PostDecrement
        ) && !matches!(self.ast.node(operand).kind, NodeKind::Identifier { .. } | NodeKind::MemberAccess { .. } | NodeKind::Index { .. })
        {
            let span = self.ast.node(operand).span;
            let ty_name = self.fqn(ty);
            self.logger.log(codes::SYMBOL_WRONG_KIND, span.byte_offset, Some(span), &[&ty_name, "mutable operand"]);
        }
        if let Some(result_ty) = self.resolve_unary_overload(id, op, operand, ty) {
            self.ast.set_inferred_type(id, result_ty);
        }
    }

    /// Unary-overload search: a direct `operator<op_token>(T_fqn)` match
    /// first; otherwise widen the operand through its implicit
    /// conversions (the same child-edge walk [`Self::resolve_binary_overload`]
    /// uses) and retry. Mirrors the binary search but with a single
    /// operand, so there is no ambiguity case to detect.
    fn resolve_unary_overload(&mut self, id: NodeId, op: UnaryOp, operand: NodeId, ty: SymbolHandle) -> Option<SymbolHandle> {
        let root = self.table.root();
        let fqn = self.fqn(ty);
        let direct_sig = format!("operator{}({})", op.op_token(), fqn);
        if let Some(h) = self.table.find_node_part(&direct_sig, root) {
            return self.table.metadata(h).and_then(|m| m.type_handle);
        }

        let widenings: Vec<SymbolHandle> = self.table.children(ty).collect();
        let widen = widenings.into_iter().find_map(|child| {
            let meta = self.table.metadata(child)?;
            let target = meta.type_handle?;
            let target_name = self.fqn(target);
            let sig = format!("operator{}({})", op.op_token(), target_name);
            let overload = self.table.find_node_part(&sig, root)?;
            Some((target, overload))
        });

        match widen {
            Some((target, overload)) => {
                self.insert_cast(operand, target);
                self.table.metadata(overload).and_then(|m| m.type_handle)
            }
            None => {
                let span = self.ast.node(id).span;
                self.logger.log(codes::NO_OVERLOAD_FOUND, span.byte_offset, Some(span), &[&direct_sig]);
                None
            }
        }
    }

    fn check_binary(&mut self, id: NodeId, op: BinaryOp, lhs: NodeId, rhs: NodeId) {
        self.check_expr(lhs);
        self.check_expr(rhs);
        let (Some(lhs_ty), Some(rhs_ty)) = (self.ty(lhs), self.ty(rhs)) else { return };
        if let Some(result_ty) = self.resolve_binary_overload(id, op, lhs, rhs, lhs_ty, rhs_ty) {
            self.ast.set_inferred_type(id, result_ty);
        }
    }

    /// Binary-overload search: a direct signature match first; otherwise
    /// widen one side at a time through its implicit conversions and
    /// retry. If both sides independently find a widening that makes the
    /// call resolve, that's an ambiguity, reported as
    /// `AMBIGUOUS_OP_OVERLOAD`.
    fn resolve_binary_overload(
        &mut self,
        id: NodeId,
        op: BinaryOp,
        lhs: NodeId,
        rhs: NodeId,
        lhs_ty: SymbolHandle,
        rhs_ty: SymbolHandle,
    ) -> Option<SymbolHandle> {
        let root = self.table.root();
        let (lhs_fqn, rhs_fqn) = (self.fqn(lhs_ty), self.fqn(rhs_ty));
        let direct_sig = format!("operator{}({},{})", op.op_token(), lhs_fqn, rhs_fqn);
        if let Some(h) = self.table.find_node_part(&direct_sig, root) {
            return self.table.metadata(h).and_then(|m| m.type_handle);
        }

        let lhs_widenings: Vec<SymbolHandle> = self.table.children(lhs_ty).collect();
        let widen_lhs = lhs_widenings.into_iter().find_map(|child| {
            let meta = self.table.metadata(child)?;
            let target = meta.type_handle?;
            let target_name = self.fqn(target);
            let sig = format!("operator{}({},{})", op.op_token(), target_name, rhs_fqn);
            let overload = self.table.find_node_part(&sig, root)?;
            Some((target, overload))
        });

        let rhs_widenings: Vec<SymbolHandle> = self.table.children(rhs_ty).collect();
        let widen_rhs = rhs_widenings.into_iter().find_map(|child| {
            let meta = self.table.metadata(child)?;
            let target = meta.type_handle?;
            let target_name = self.fqn(target);
            let sig = format!("operator{}({},{})", op.op_token(), lhs_fqn, target_name);
            let overload = self.table.find_node_part(&sig, root)?;
            Some((target, overload))
        });

        match (widen_lhs, widen_rhs) {
            (Some(_), Some(_)) => {
                let span = self.ast.node(id).span;
                self.logger.log(codes::AMBIGUOUS_OP_OVERLOAD, span.byte_offset, Some(span), &[&direct_sig]);
                None
            }
            (Some((target, overload)), None) => {
                self.insert_cast(lhs, target);
                self.table.metadata(overload).and_then(|m| m.type_handle)
            }
            (None, Some((target, overload))) => {
                self.insert_cast(rhs, target);
                self.table.metadata(overload).and_then(|m| m.type_handle)
            }
            (None, None) => {
                let span = self.ast.node(id).span;
                self.logger.log(codes::NO_OVERLOAD_FOUND, span.byte_offset, Some(span), &[&direct_sig]);
                None
            }
        }
    }
}

fn number_primitive_name(n: Number) -> &'static str {
    match n {
        Number::I8(_) | Number::I16(_) | Number::I32(_) | Number::I64(_) => "int",
        Number::U8(_) | Number::U16(_) | Number::U32(_) | Number::U64(_) => "uint",
        Number::Half(_) => "half",
        Number::Float(_) => "float",
        Number::Double(_) => "double",
        Number::Bool(_) => "bool",
        Number::Unknown => "int",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::Collector;
    use crate::parser::Parser;
    use crate::resolver::Resolver;
    use crate::symbols::populate_primitives;
    use crate::symbols::SymbolTable;
    use hxsl_core::{LocaleTable, SourceId};

    fn check(src: &str) -> (Ast, SymbolTable, Vec<String>) {
        let locale = LocaleTable::en_us();
        let mut logger = Logger::new(&locale);
        let mut ast = Ast::new();
        let unit = {
            let mut parser = Parser::new(SourceId(0), src.as_bytes(), &mut ast, &mut logger);
            parser.parse_compilation_unit()
        };
        let mut table = SymbolTable::new(1);
        populate_primitives(&mut table);
        Collector::new(&mut ast, &mut table).collect(unit);
        Resolver::new(&mut ast, &mut table, &mut logger).resolve(unit);
        TypeChecker::new(&mut ast, &table, &mut logger).check(unit);
        (ast, table, logger.messages().iter().map(|m| m.to_string()).collect())
    }

    #[test]
    fn integer_literal_added_to_float_gets_an_implicit_cast() {
        let (ast, _, errs) = check("float f() { return 1 + 2.0; }");
        assert!(errs.is_empty(), "{errs:?}");
        let NodeKind::CompilationUnit { items } = &ast.node(ast.root()).kind else { panic!() };
        let NodeKind::FunctionDecl { body: Some(body), .. } = &ast.node(items[0]).kind else { panic!() };
        let NodeKind::Block { statements } = &ast.node(*body).kind else { panic!() };
        let NodeKind::ReturnStmt { value: Some(value) } = &ast.node(statements[0]).kind else { panic!() };
        let NodeKind::Binary { lhs, .. } = &ast.node(*value).kind else { panic!() };
        assert!(matches!(ast.node(*lhs).kind, NodeKind::Cast { .. }));
    }

    #[test]
    fn return_type_mismatch_without_implicit_path_is_reported() {
        let (_, _, errs) = check("bool f() { return 1 + 2.0; }");
        assert!(errs.iter().any(|e| e.contains("does not match")));
    }

    #[test]
    fn break_outside_loop_is_flagged() {
        let (_, _, errs) = check("void f() { break; }");
        assert!(errs.iter().any(|e| e.contains("break statement")));
    }

    #[test]
    fn break_inside_loop_is_fine() {
        let (_, _, errs) = check("void f() { for (int i = 0; i < 10; i = i + 1) { break; } }");
        assert!(errs.is_empty(), "{errs:?}");
    }

    #[test]
    fn non_boolean_condition_is_reported() {
        let (_, _, errs) = check("void f() { if (1 + 1) { } }");
        assert!(errs.iter().any(|e| e.contains("must be bool")), "{errs:?}");
    }

    #[test]
    fn direct_self_referential_struct_is_recursive() {
        let (_, _, errs) = check("struct S { S a; }");
        assert!(errs.iter().any(|e| e.contains("recursive layout")), "{errs:?}");
    }

    #[test]
    fn mutually_referential_structs_are_recursive() {
        let (_, _, errs) = check("struct A { B b; } struct B { A a; }");
        assert!(errs.iter().any(|e| e.contains("recursive layout")), "{errs:?}");
    }

    #[test]
    fn non_recursive_struct_is_fine() {
        let (_, _, errs) = check("struct Inner { int x; } struct Outer { Inner i; }");
        assert!(errs.is_empty(), "{errs:?}");
    }

    #[test]
    fn comparison_operators_beyond_lt_type_check_on_primitives() {
        for src in [
            "bool f() { int i = 0; return i <= 10; }",
            "bool f() { int i = 0; return i > 10; }",
            "bool f() { int i = 0; return i >= 10; }",
        ] {
            let (_, _, errs) = check(src);
            assert!(errs.is_empty(), "{src:?}: {errs:?}");
        }
    }

    #[test]
    fn bitwise_and_shift_operators_type_check_on_integers() {
        for src in [
            "int f() { int a = 0; int b = 0; return a & b; }",
            "int f() { int a = 0; int b = 0; return a | b; }",
            "int f() { int a = 0; int b = 0; return a ^ b; }",
            "int f() { int a = 0; int b = 0; return a << b; }",
            "int f() { int a = 0; int b = 0; return a >> b; }",
        ] {
            let (_, _, errs) = check(src);
            assert!(errs.is_empty(), "{src:?}: {errs:?}");
        }
    }

    #[test]
    fn logical_and_or_type_check_on_bool_operands() {
        let (_, _, errs) = check("bool f() { bool a = true; bool b = false; return a && b; }");
        assert!(errs.is_empty(), "{errs:?}");
        let (_, _, errs) = check("bool f() { bool a = true; bool b = false; return a || b; }");
        assert!(errs.is_empty(), "{errs:?}");
    }

    #[test]
    fn unary_negate_and_bitnot_and_lognot_type_check() {
        let (_, _, errs) = check("int f() { int a = 1; return -a; }");
        assert!(errs.is_empty(), "{errs:?}");
        let (_, _, errs) = check("int f() { int a = 1; return ~a; }");
        assert!(errs.is_empty(), "{errs:?}");
        let (_, _, errs) = check("bool f() { bool a = true; return !a; }");
        assert!(errs.is_empty(), "{errs:?}");
    }
}
