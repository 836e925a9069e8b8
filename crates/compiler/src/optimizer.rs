//! Optimizer: the algebraic simplifier — per-basic-block peephole
//! rewrites, reassociation of repeated multiplies, and a
//! short-circuit-AND fold that can prune a statically-known branch out of
//! the CFG. Driven to a fixed point by [`simplify`], the same
//! keep-re-running-while-anything-changed shape the preprocessor's
//! `#if`/`#elif` evaluator and the resolver's round-based fixed point both
//! use elsewhere in this pipeline.

use std::collections::HashMap;

use crate::ir::{Cfg, ControlFlowType, ILFunction, Instruction, OpCode, Operand, VarId};
use hxsl_core::{BinOp, Number};

/// The defining instruction for each variable seen so far, rebuilt fresh
/// at the start of every pass: a per-function map `defs: VarId ->
/// defining instruction`, updated as instructions are walked in order.
type Defs = HashMap<VarId, Instruction>;

/// Runs [`simplify_once`] to a fixed point.
pub fn simplify(function: &mut ILFunction) {
    while simplify_once(function) {}
}

/// One left-to-right, block-order pass over the function. Applies at
/// most one rewrite before returning `true`, so that a rewrite touching
/// the CFG itself (block removal, merging) never leaves the rest of this
/// pass walking over now-invalid block indices or a stale `defs` map.
/// Cheaper than restarting after every single-instruction peephole, but
/// simpler to reason about than tracking exactly which rewrites are
/// CFG-safe to continue past.
fn simplify_once(function: &mut ILFunction) -> bool {
    let mut defs: Defs = HashMap::new();
    for block in 0..function.cfg.blocks.len() {
        let len = function.cfg.blocks[block].instructions.len();
        for idx in 0..len {
            if idx >= function.cfg.blocks[block].instructions.len() {
                break;
            }
            let instr = function.cfg.blocks[block].instructions[idx];

            if rewrite_short_circuit_and(&mut function.cfg, block, idx) {
                return true;
            }

            if let Some(rewritten) = algebraic_rewrite(&instr).or_else(|| reassociate(&instr, &defs)) {
                function.cfg.blocks[block].instructions[idx] = rewritten;
                if let Some(var) = rewritten.result_var() {
                    defs.insert(var, rewritten);
                }
                return true;
            }

            if let Some(var) = instr.result_var() {
                defs.insert(var, instr);
            }
        }
    }
    false
}

fn imm_is_zero(n: Number) -> bool {
    match n {
        Number::Bool(b) => !b,
        Number::Unknown => false,
        _ => n.as_f64() == Some(0.0),
    }
}

fn imm_is_one(n: Number) -> bool {
    match n {
        Number::Bool(b) => b,
        Number::Unknown => false,
        _ => n.as_f64() == Some(1.0),
    }
}

fn is_zero(op: Operand) -> bool {
    matches!(op, Operand::Immediate(n) if imm_is_zero(n))
}

fn is_one(op: Operand) -> bool {
    matches!(op, Operand::Immediate(n) if imm_is_one(n))
}

/// Per-opcode rewrites (`x*0`, `x*1`, `0+x`, `x-x`, `x+x`, `x/x`, `x/0`,
/// ...). Each arm produces a strictly simpler instruction computing the
/// same value; `None` means no rule fired.
fn algebraic_rewrite(instr: &Instruction) -> Option<Instruction> {
    let OpCode::Binary(op) = instr.opcode else { return None };
    let (Some(left), Some(right), Some(result)) = (instr.left, instr.right, instr.result) else {
        return None;
    };
    let same_operand = left == right;
    let left_zero = is_zero(left);
    let right_zero = is_zero(right);
    let left_one = is_one(left);
    let right_one = is_one(right);

    match op {
        BinOp::Mul if left_zero || right_zero => Some(Instruction::mov(zero_immediate(), result)),
        BinOp::Mul if left_one => Some(Instruction::mov(right, result)),
        BinOp::Mul if right_one => Some(Instruction::mov(left, result)),
        BinOp::Mod if right_zero => Some(Instruction::mov(zero_immediate(), result)),
        BinOp::BitAnd if left_zero || right_zero => Some(Instruction::mov(zero_immediate(), result)),
        BinOp::BitXor if same_operand => Some(Instruction::mov(zero_immediate(), result)),
        BinOp::BitXor if left_zero => Some(Instruction::mov(right, result)),
        BinOp::BitXor if right_zero => Some(Instruction::mov(left, result)),
        BinOp::BitOr if left_zero => Some(Instruction::mov(right, result)),
        BinOp::BitOr if right_zero => Some(Instruction::mov(left, result)),
        BinOp::Add if same_operand => Some(Instruction::binary(BinOp::Mul, left, Operand::Immediate(Number::I32(2)), result)),
        BinOp::Add if left_zero => Some(Instruction::mov(right, result)),
        BinOp::Add if right_zero => Some(Instruction::mov(left, result)),
        // `0 - x` is treated as an identity on `x` for the moment, not a
        // negation; a real negate opcode exists but this rewrite doesn't
        // use it yet.
        BinOp::Sub if left_zero => Some(Instruction::mov(right, result)),
        BinOp::Sub if right_zero => Some(Instruction::mov(left, result)),
        BinOp::Sub if same_operand => Some(Instruction::mov(zero_immediate(), result)),
        // TODO: `LogicalOr` gets no peephole rule here (only the
        // separate CFG-level short-circuit fold for `LogicalAnd`
        // below). A symmetric `x || true -> true`, `x || false -> x`
        // rewrite is the natural completion but isn't implemented yet.
        BinOp::Div if right_zero => Some(Instruction::mov(Operand::Immediate(Number::Unknown), result)),
        BinOp::Div if right_one => Some(Instruction::mov(left, result)),
        BinOp::Div if same_operand => Some(Instruction::mov(Operand::Immediate(Number::I32(1)), result)),
        _ => None,
    }
}

fn zero_immediate() -> Operand {
    Operand::Immediate(Number::I32(0))
}

/// `(x * c1) +/- (x * c2) -> x * (c1 +/- c2)`: both operands of an
/// add/sub must trace back (via `defs`) to a multiply of the same
/// variable by a constant.
fn reassociate(instr: &Instruction, defs: &Defs) -> Option<Instruction> {
    let OpCode::Binary(op) = instr.opcode else { return None };
    if !matches!(op, BinOp::Add | BinOp::Sub) {
        return None;
    }
    let (Some(Operand::Variable(lv)), Some(Operand::Variable(rv)), Some(result)) = (instr.left, instr.right, instr.result) else {
        return None;
    };
    let (lx, lc) = mul_by_constant(defs.get(&lv)?)?;
    let (rx, rc) = mul_by_constant(defs.get(&rv)?)?;
    if lx != rx {
        return None;
    }
    let folded = lc.apply(op, rc);
    Some(Instruction::binary(BinOp::Mul, lx, Operand::Immediate(folded), result))
}

fn mul_by_constant(instr: &Instruction) -> Option<(Operand, Number)> {
    let OpCode::Binary(BinOp::Mul) = instr.opcode else { return None };
    match (instr.left?, instr.right?) {
        (var @ Operand::Variable(_), Operand::Immediate(c)) => Some((var, c)),
        (Operand::Immediate(c), var @ Operand::Variable(_)) => Some((var, c)),
        _ => None,
    }
}

/// `x && const`. A true RHS collapses to `move x`; a false RHS collapses
/// to `move false` and, when the next instruction is the conditional
/// jump gated on this result, statically prunes the branch that can
/// never be taken. Returns whether it rewrote anything.
fn rewrite_short_circuit_and(cfg: &mut Cfg, block: usize, idx: usize) -> bool {
    let instr = cfg.blocks[block].instructions[idx];
    let OpCode::Binary(BinOp::LogicalAnd) = instr.opcode else { return false };
    let (Some(left), Some(Operand::Immediate(rhs)), Some(result)) = (instr.left, instr.right, instr.result) else {
        return false;
    };

    if rhs.truthy() {
        cfg.blocks[block].instructions[idx] = Instruction::mov(left, result);
        return true;
    }

    let next = cfg.blocks[block].instructions.get(idx + 1).copied();
    let Some(next) = next else {
        cfg.blocks[block].instructions[idx] = Instruction::mov(Operand::Immediate(Number::Bool(false)), result);
        return true;
    };
    if next.opcode != OpCode::JumpNotZero {
        cfg.blocks[block].instructions[idx] = Instruction::mov(Operand::Immediate(Number::Bool(false)), result);
        return true;
    }
    let Some(target) = next.left.and_then(|o| o.as_label()) else {
        return false;
    };
    let target = target as usize;

    cfg.unlink(block, target);
    if cfg.blocks[target].predecessors.is_empty() {
        cfg.remove_node(target);
    }
    cfg.blocks[block].instructions.truncate(idx + 1);
    cfg.blocks[block].instructions[idx] = Instruction::mov(Operand::Immediate(Number::Bool(false)), result);
    cfg.blocks[block].control_flow = ControlFlowType::Normal;

    if let Some(&survivor) = cfg.blocks[block].successors.first() {
        if cfg.blocks[survivor].predecessors == vec![block] {
            cfg.merge_nodes(block, survivor);
        }
    }
    cfg.rebuild_dom_tree();
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::VarId;

    fn func_with(instrs: Vec<Instruction>) -> ILFunction {
        let mut f = ILFunction::new("f", 0);
        f.cfg.blocks[0].instructions = instrs;
        f
    }

    #[test]
    fn multiply_by_zero_collapses_to_a_move() {
        let x = Operand::Variable(VarId::new(0, 0));
        let r = Operand::Variable(VarId::new(1, 0));
        let mut f = func_with(vec![Instruction::binary(BinOp::Mul, x, Operand::Immediate(Number::I32(0)), r)]);
        simplify(&mut f);
        let instr = f.cfg.blocks[0].instructions[0];
        assert_eq!(instr.opcode, OpCode::Move);
        assert_eq!(instr.left, Some(zero_immediate()));
    }

    #[test]
    fn add_zero_collapses_to_the_other_operand() {
        let x = Operand::Variable(VarId::new(0, 0));
        let r = Operand::Variable(VarId::new(1, 0));
        let mut f = func_with(vec![Instruction::binary(BinOp::Add, Operand::Immediate(Number::I32(0)), x, r)]);
        simplify(&mut f);
        let instr = f.cfg.blocks[0].instructions[0];
        assert_eq!(instr.opcode, OpCode::Move);
        assert_eq!(instr.left, Some(x));
    }

    #[test]
    fn self_subtraction_collapses_to_zero() {
        let x = Operand::Variable(VarId::new(0, 0));
        let r = Operand::Variable(VarId::new(1, 0));
        let mut f = func_with(vec![Instruction::binary(BinOp::Sub, x, x, r)]);
        simplify(&mut f);
        let instr = f.cfg.blocks[0].instructions[0];
        assert_eq!(instr.opcode, OpCode::Move);
        assert_eq!(instr.left, Some(zero_immediate()));
    }

    #[test]
    fn self_addition_becomes_multiply_by_two() {
        let x = Operand::Variable(VarId::new(0, 0));
        let r = Operand::Variable(VarId::new(1, 0));
        let mut f = func_with(vec![Instruction::binary(BinOp::Add, x, x, r)]);
        simplify(&mut f);
        let instr = f.cfg.blocks[0].instructions[0];
        assert_eq!(instr.opcode, OpCode::Binary(BinOp::Mul));
        assert_eq!(instr.right, Some(Operand::Immediate(Number::I32(2))));
    }

    #[test]
    fn reassociation_folds_repeated_multiplies_of_the_same_variable() {
        let x = Operand::Variable(VarId::new(0, 0));
        let a = Operand::Variable(VarId::new(1, 0));
        let b = Operand::Variable(VarId::new(2, 0));
        let r = Operand::Variable(VarId::new(3, 0));
        let mut f = func_with(vec![
            Instruction::binary(BinOp::Mul, x, Operand::Immediate(Number::I32(3)), a),
            Instruction::binary(BinOp::Mul, x, Operand::Immediate(Number::I32(4)), b),
            Instruction::binary(BinOp::Add, a, b, r),
        ]);
        simplify(&mut f);
        let instr = f.cfg.blocks[0].instructions[2];
        assert_eq!(instr.opcode, OpCode::Binary(BinOp::Mul));
        assert_eq!(instr.left, Some(x));
        assert_eq!(instr.right, Some(Operand::Immediate(Number::I32(7))));
    }

    #[test]
    fn divide_by_zero_becomes_unknown_and_terminates() {
        let x = Operand::Variable(VarId::new(0, 0));
        let r = Operand::Variable(VarId::new(1, 0));
        let mut f = func_with(vec![Instruction::binary(BinOp::Div, x, Operand::Immediate(Number::I32(0)), r)]);
        simplify(&mut f);
        let instr = f.cfg.blocks[0].instructions[0];
        assert_eq!(instr.opcode, OpCode::Move);
        assert_eq!(instr.left, Some(Operand::Immediate(Number::Unknown)));
    }

    #[test]
    fn short_circuit_and_false_prunes_the_unreachable_branch() {
        let cond = Operand::Variable(VarId::new(0, 0));
        let and_result = Operand::Variable(VarId::new(1, 0));
        let mut f = ILFunction::new("f", 0);
        let taken = f.cfg.alloc_block();
        let fallthrough = f.cfg.alloc_block();
        f.cfg.link(0, taken);
        f.cfg.link(0, fallthrough);
        f.cfg.blocks[0].instructions = vec![
            Instruction::binary(BinOp::LogicalAnd, cond, Operand::Immediate(Number::Bool(false)), and_result),
            Instruction::jump_if_not_zero(taken as u32, and_result),
        ];
        f.cfg.blocks[taken].instructions.push(Instruction::ret(None));
        f.cfg.blocks[fallthrough].instructions.push(Instruction::ret(None));

        simplify(&mut f);

        assert!(!f.cfg.blocks[0].successors.contains(&taken));
        assert!(f.cfg.blocks[taken].predecessors.is_empty());
        // The fallthrough block had block 0 as its sole predecessor, so
        // the rewrite also merges it in: the rewritten `move false` plus
        // the fallthrough's own `return`.
        assert_eq!(f.cfg.blocks[0].instructions.len(), 2);
        assert_eq!(f.cfg.blocks[0].instructions[0].opcode, OpCode::Move);
        assert_eq!(f.cfg.blocks[0].instructions[1].opcode, OpCode::Return);
    }
}
