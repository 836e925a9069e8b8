//! Symbol collector: a first AST traversal that declares every type,
//! function, operator, and namespace-level variable into the assembly's
//! symbol table before resolution begins. Types, functions, and operators
//! are exempt from use-before-declaration checks because they are
//! collected first.
//!
//! Local variables and parameters are **not** collected here; they're
//! lexically scoped and the resolver pushes/pops them as it walks function
//! bodies via its own scope stack.

use crate::ast::{Ast, NodeId, NodeKind};
use crate::symbols::{AccessModifier, SymbolHandle, SymbolKind, SymbolMetadata, SymbolTable};

pub struct Collector<'a> {
    ast: &'a mut Ast,
    table: &'a mut SymbolTable,
}

impl<'a> Collector<'a> {
    pub fn new(ast: &'a mut Ast, table: &'a mut SymbolTable) -> Self {
        Self { ast, table }
    }

    /// Walk `unit` (a `CompilationUnit` node) and declare everything it
    /// contains, recording each declaration's own symbol handle via
    /// [`Ast::set_inferred_type`] so later passes can fetch it without
    /// re-searching the table.
    pub fn collect(&mut self, unit: NodeId) {
        let root = self.table.root();
        let items = match &self.ast.node(unit).kind {
            NodeKind::CompilationUnit { items } => items.clone(),
            _ => return,
        };
        for item in items {
            self.collect_item(item, root);
        }
    }

    fn collect_item(&mut self, id: NodeId, scope: SymbolHandle) {
        let kind_snapshot = self.ast.node(id).kind.clone();
        match kind_snapshot {
            NodeKind::NamespaceDecl { path, items } => {
                let handle = self.declare(scope, &path, SymbolKind::Namespace, id);
                for item in items {
                    self.collect_item(item, handle);
                }
            }
            NodeKind::StructDecl { name, fields, .. } => {
                let handle = self.declare(scope, &name, SymbolKind::Struct, id);
                for field in fields {
                    self.collect_item(field, handle);
                }
            }
            NodeKind::ClassDecl { name, fields, .. } => {
                let handle = self.declare(scope, &name, SymbolKind::Class, id);
                for field in fields {
                    self.collect_item(field, handle);
                }
            }
            NodeKind::FieldDecl { name, .. } => {
                self.declare(scope, &name, SymbolKind::Field, id);
            }
            NodeKind::FunctionDecl { name, params, .. } => {
                let sig = self.signature(&name, &params);
                self.declare(scope, &sig, SymbolKind::Function, id);
            }
            NodeKind::OperatorDecl { op, params, .. } => {
                let sig = self.signature(&format!("operator{}", op.op_token()), &params);
                self.declare(scope, &sig, SymbolKind::Operator, id);
            }
            NodeKind::VarDeclStmt { name, .. } => {
                self.declare(scope, &name, SymbolKind::Variable, id);
            }
            NodeKind::UsingDecl { .. } | NodeKind::AttributeDecl { .. } => {}
            _ => {}
        }
    }

    /// `name(type1,type2,…)`, matching the overload-signature edge shape
    /// `populate_operator_grid` already uses for primitive operators.
    fn signature(&self, name: &str, params: &[NodeId]) -> String {
        let types: Vec<&str> = params
            .iter()
            .map(|p| match &self.ast.node(*p).kind {
                NodeKind::ParamDecl { type_name, .. } => type_name.as_str(),
                _ => "",
            })
            .collect();
        format!("{name}({})", types.join(","))
    }

    fn declare(&mut self, scope: SymbolHandle, path: &str, kind: SymbolKind, decl: NodeId) -> SymbolHandle {
        let metadata = SymbolMetadata { kind, access: AccessModifier::Public, declaration: Some(decl), type_handle: None };
        match self.table.insert(scope, path, metadata) {
            Some(handle) => {
                self.ast.set_inferred_type(decl, handle);
                handle
            }
            None => {
                // Duplicate declaration at this path; the resolver reports
                // the symbol-not-found/ambiguity diagnostics that follow
                // from this later, when the second declaration's
                // references fail to resolve distinctly.
                self.table.find_node_full_path(path, scope).unwrap_or(scope)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;
    use hxsl_core::{LocaleTable, Logger, SourceId};

    fn collect(src: &str) -> (Ast, SymbolTable) {
        let locale = LocaleTable::en_us();
        let mut logger = Logger::new(&locale);
        let mut ast = Ast::new();
        let unit = {
            let mut parser = Parser::new(SourceId(0), src.as_bytes(), &mut ast, &mut logger);
            parser.parse_compilation_unit()
        };
        let mut table = SymbolTable::new(1);
        Collector::new(&mut ast, &mut table).collect(unit);
        (ast, table)
    }

    #[test]
    fn struct_and_field_are_declared() {
        let (_, table) = collect("struct S { int x; }");
        let root = table.root();
        let s = table.find_node_part("S", root).expect("struct declared");
        assert!(table.find_node_part("x", s).is_some());
    }

    #[test]
    fn function_is_declared_under_its_overload_signature() {
        let (_, table) = collect("float f(int a, float b) { return b; }");
        let root = table.root();
        assert!(table.find_node_part("f(int,float)", root).is_some());
    }

    #[test]
    fn namespace_nests_declarations() {
        let (_, table) = collect("namespace a.b { struct S { int x; } }");
        let root = table.root();
        let found = table.find_node_full_path("a.b.S", root);
        assert!(found.is_some());
    }

    #[test]
    fn operator_overload_is_declared_by_its_signature() {
        let (_, table) = collect("struct V2 { float x; float y; } V2 operator+(V2 a, V2 b) { return a; }");
        let root = table.root();
        assert!(table.find_node_part("operator+(V2,V2)", root).is_some());
    }
}
