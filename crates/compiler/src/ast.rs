//! Abstract syntax tree: a bump-allocated (append-only, bulk-freed) node
//! store addressed by index rather than by reference, so the tree can
//! carry parent pointers without the lifetime/aliasing cost of a
//! reference-based arena. Every node except the compilation root has a
//! parent; statement and expression kinds are disjoint by construction
//! (they never appear in each other's variant set below).

use crate::symbols::SymbolHandle;
use hxsl_core::{Number, TextSpan};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    LogicalAnd,
    LogicalOr,
}

impl BinaryOp {
    /// The operator-overload signature token used to key binary-operator
    /// lookups (`operator<op_token>(LHS_fqn,RHS_fqn)`). Each variant gets
    /// a distinct token so the bitwise and logical families (which share
    /// source-level spelling for `&`/`|` in some dialects) never collide
    /// in the symbol table: `BitAnd` is `&`, `LogicalAnd` is `&&`.
    pub fn op_token(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::LogicalAnd => "&&",
            BinaryOp::LogicalOr => "||",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Negate,
    LogicalNot,
    BitNot,
    PreIncrement,
    PreDecrement,
    PostIncrement,
    PostDecrement,
}

impl UnaryOp {
    /// The operator-overload signature token used to key unary-operator
    /// lookups (`operator<op_token>(T_fqn)`). Pre- and post-increment
    /// (decrement) share a token since the grid only needs to know which
    /// operand types support the operator, not which side of the operand
    /// the `++`/`--` appeared on.
    pub fn op_token(&self) -> &'static str {
        match self {
            UnaryOp::Negate => "-",
            UnaryOp::LogicalNot => "!",
            UnaryOp::BitNot => "~",
            UnaryOp::PreIncrement | UnaryOp::PostIncrement => "++",
            UnaryOp::PreDecrement | UnaryOp::PostDecrement => "--",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamModifier {
    In,
    Out,
    InOut,
}

/// Declaration modifiers (`public`/`private`, `const`, `static`), tracked
/// as a small flag set so the parser can detect the conflicting
/// conflicting combinations (`public`+`private`, `in`+`out`) without
/// needing a separate AST node per modifier keyword.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeclModifiers {
    pub public: bool,
    pub private: bool,
    pub is_const: bool,
    pub is_static: bool,
}

impl DeclModifiers {
    /// `public`+`private` on the same declaration is a Scope/Declaration
    /// error.
    pub fn has_conflict(&self) -> bool {
        self.public && self.private
    }
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    CompilationUnit { items: Vec<NodeId> },
    NamespaceDecl { path: String, items: Vec<NodeId> },
    UsingDecl { path: String },
    StructDecl { name: String, fields: Vec<NodeId>, modifiers: DeclModifiers },
    ClassDecl { name: String, fields: Vec<NodeId>, modifiers: DeclModifiers },
    EnumDecl { name: String, variants: Vec<String> },
    AttributeDecl { name: String, args: Vec<NodeId> },
    FieldDecl { name: String, type_name: String },
    FunctionDecl { name: String, return_type: String, params: Vec<NodeId>, body: Option<NodeId>, modifiers: DeclModifiers },
    OperatorDecl { op: BinaryOp, return_type: String, params: Vec<NodeId>, body: Option<NodeId> },
    ParamDecl { name: String, type_name: String, modifier: ParamModifier },

    Block { statements: Vec<NodeId> },
    VarDeclStmt { name: String, type_name: String, init: Option<NodeId>, modifiers: DeclModifiers },
    IfStmt { cond: NodeId, then_branch: NodeId, else_branch: Option<NodeId> },
    WhileStmt { cond: NodeId, body: NodeId },
    ForStmt { init: Option<NodeId>, cond: Option<NodeId>, step: Option<NodeId>, body: NodeId },
    ReturnStmt { value: Option<NodeId> },
    BreakStmt,
    ContinueStmt,
    SwitchStmt { scrutinee: NodeId, cases: Vec<NodeId> },
    CaseStmt { value: Option<NodeId>, body: Vec<NodeId> },
    ExprStmt { expr: NodeId },

    LiteralBool(bool),
    LiteralNumber(Number),
    LiteralString(String),
    /// A bare name reference; resolved against scope/namespace/using rules
    /// by the resolver.
    Identifier { name: String },
    /// `head.member[.next]`; `next` chains further member accesses, index
    /// expressions, or calls against the member's resolved type.
    MemberAccess { head: NodeId, member: String, next: Option<NodeId> },
    Index { base: NodeId, indices: Vec<NodeId>, next: Option<NodeId> },
    Call { callee: String, args: Vec<NodeId>, next: Option<NodeId> },
    Binary { op: BinaryOp, lhs: NodeId, rhs: NodeId },
    Unary { op: UnaryOp, operand: NodeId },
    Cast { target_type: String, operand: NodeId },
    Ternary { cond: NodeId, then_expr: NodeId, else_expr: NodeId },
    Assignment { target: NodeId, value: NodeId },
    CompoundAssignment { op: BinaryOp, target: NodeId, value: NodeId },
    ArrayTypeRef { elem_type: String, dims: Vec<u32> },
}

impl NodeKind {
    pub fn is_expression(&self) -> bool {
        matches!(
            self,
            NodeKind::LiteralBool(_)
                | NodeKind::LiteralNumber(_)
                | NodeKind::LiteralString(_)
                | NodeKind::Identifier { .. }
                | NodeKind::MemberAccess { .. }
                | NodeKind::Index { .. }
                | NodeKind::Call { .. }
                | NodeKind::Binary { .. }
                | NodeKind::Unary { .. }
                | NodeKind::Cast { .. }
                | NodeKind::Ternary { .. }
                | NodeKind::Assignment { .. }
                | NodeKind::CompoundAssignment { .. }
                | NodeKind::ArrayTypeRef { .. }
        )
    }

    pub fn is_statement(&self) -> bool {
        matches!(
            self,
            NodeKind::Block { .. }
                | NodeKind::VarDeclStmt { .. }
                | NodeKind::IfStmt { .. }
                | NodeKind::WhileStmt { .. }
                | NodeKind::ForStmt { .. }
                | NodeKind::ReturnStmt { .. }
                | NodeKind::BreakStmt
                | NodeKind::ContinueStmt
                | NodeKind::SwitchStmt { .. }
                | NodeKind::CaseStmt { .. }
                | NodeKind::ExprStmt { .. }
        )
    }
}

pub struct Node {
    pub kind: NodeKind,
    pub span: TextSpan,
    pub parent: Option<NodeId>,
}

/// One `SymbolRef`'s resolution state: every reference is unresolved,
/// resolved, deferred, or not-found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolRefState {
    Unresolved,
    Resolved(SymbolHandle),
    Deferred,
    NotFound,
}

/// The AST for one compilation unit: an append-only node store plus the
/// side tables the resolver and type checker populate (`inferred_type`
/// is non-null for every expression after type checking; `symbol_ref`
/// records resolution state for identifier/member/call nodes).
pub struct Ast {
    nodes: Vec<Node>,
    symbol_refs: HashMap<NodeId, SymbolRefState>,
    inferred_types: HashMap<NodeId, SymbolHandle>,
    root: Option<NodeId>,
}

impl Default for Ast {
    fn default() -> Self {
        Self::new()
    }
}

impl Ast {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            symbol_refs: HashMap::new(),
            inferred_types: HashMap::new(),
            root: None,
        }
    }

    pub fn alloc(&mut self, kind: NodeKind, span: TextSpan, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        debug_assert!(
            parent.is_some() || self.root.is_none(),
            "only the compilation root may have no parent"
        );
        if parent.is_none() {
            self.root = Some(id);
        }
        self.nodes.push(Node { kind, span, parent });
        id
    }

    pub fn root(&self) -> NodeId {
        self.root.expect("ast has no root node yet")
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0 as usize]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn set_symbol_ref(&mut self, id: NodeId, state: SymbolRefState) {
        self.symbol_refs.insert(id, state);
    }

    pub fn symbol_ref(&self, id: NodeId) -> SymbolRefState {
        self.symbol_refs.get(&id).copied().unwrap_or(SymbolRefState::Unresolved)
    }

    pub fn set_inferred_type(&mut self, id: NodeId, handle: SymbolHandle) {
        self.inferred_types.insert(id, handle);
    }

    pub fn inferred_type(&self, id: NodeId) -> Option<SymbolHandle> {
        self.inferred_types.get(&id).copied()
    }

    /// Rewrites `parent`'s child reference from `old` to `new`. Used by
    /// the type checker to splice
    /// a synthetic `Cast` node in at an operand's position.
    pub fn replace_child(&mut self, parent: NodeId, old: NodeId, new: NodeId) {
        fn swap(slot: &mut NodeId, old: NodeId, new: NodeId) {
            if *slot == old {
                *slot = new;
            }
        }
        fn swap_opt(slot: &mut Option<NodeId>, old: NodeId, new: NodeId) {
            if *slot == Some(old) {
                *slot = Some(new);
            }
        }
        fn swap_vec(slot: &mut [NodeId], old: NodeId, new: NodeId) {
            for v in slot.iter_mut() {
                swap(v, old, new);
            }
        }
        let node = self.node_mut(parent);
        match &mut node.kind {
            NodeKind::Binary { lhs, rhs, .. } => {
                swap(lhs, old, new);
                swap(rhs, old, new);
            }
            NodeKind::Unary { operand, .. } => swap(operand, old, new),
            NodeKind::Cast { operand, .. } => swap(operand, old, new),
            NodeKind::Ternary { cond, then_expr, else_expr } => {
                swap(cond, old, new);
                swap(then_expr, old, new);
                swap(else_expr, old, new);
            }
            NodeKind::Assignment { target, value } => {
                swap(target, old, new);
                swap(value, old, new);
            }
            NodeKind::CompoundAssignment { target, value, .. } => {
                swap(target, old, new);
                swap(value, old, new);
            }
            NodeKind::Index { base, indices, next } => {
                swap(base, old, new);
                swap_vec(indices, old, new);
                swap_opt(next, old, new);
            }
            NodeKind::MemberAccess { head, next, .. } => {
                swap(head, old, new);
                swap_opt(next, old, new);
            }
            NodeKind::Call { args, next, .. } => {
                swap_vec(args, old, new);
                swap_opt(next, old, new);
            }
            NodeKind::VarDeclStmt { init, .. } => swap_opt(init, old, new),
            NodeKind::ReturnStmt { value } => swap_opt(value, old, new),
            NodeKind::IfStmt { cond, .. } => swap(cond, old, new),
            NodeKind::WhileStmt { cond, .. } => swap(cond, old, new),
            NodeKind::ForStmt { init, cond, step, .. } => {
                swap_opt(init, old, new);
                swap_opt(cond, old, new);
                swap_opt(step, old, new);
            }
            NodeKind::CaseStmt { value, .. } => swap_opt(value, old, new),
            NodeKind::ExprStmt { expr } => swap(expr, old, new),
            NodeKind::AttributeDecl { args, .. } => swap_vec(args, old, new),
            _ => {}
        }
    }

    /// Every node whose `parent` field equals `id`, in allocation order.
    /// Used by the round-trip debug-print visitor.
    pub fn direct_children(&self, id: NodeId) -> Vec<NodeId> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.parent == Some(id))
            .map(|(i, _)| NodeId(i as u32))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hxsl_core::SourceId;

    fn span() -> TextSpan {
        TextSpan::new(SourceId(0), 0, 1, 1, 1)
    }

    #[test]
    fn root_has_no_parent_others_do() {
        let mut ast = Ast::new();
        let root = ast.alloc(NodeKind::CompilationUnit { items: vec![] }, span(), None);
        let child = ast.alloc(NodeKind::BreakStmt, span(), Some(root));
        assert!(ast.node(root).parent.is_none());
        assert_eq!(ast.node(child).parent, Some(root));
    }

    #[test]
    fn statement_and_expression_kinds_are_disjoint() {
        let stmt = NodeKind::BreakStmt;
        let expr = NodeKind::LiteralBool(true);
        assert!(stmt.is_statement() && !stmt.is_expression());
        assert!(expr.is_expression() && !expr.is_statement());
    }

    #[test]
    fn symbol_ref_defaults_to_unresolved() {
        let mut ast = Ast::new();
        let root = ast.alloc(NodeKind::CompilationUnit { items: vec![] }, span(), None);
        assert_eq!(ast.symbol_ref(root), SymbolRefState::Unresolved);
    }
}
