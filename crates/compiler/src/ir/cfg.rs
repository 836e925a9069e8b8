//! Control-flow graph and dominator tree over a function's basic blocks.
//! Block 0 is always the entry block.

use super::instr::{Instruction, OpCode};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlFlowType {
    /// Falls through to its single successor (or has none, for a
    /// function's exit block).
    Normal,
    /// Ends in an unconditional `Jump`.
    Jump,
    /// Ends in a `JumpZero`/`JumpNotZero` with two successors.
    Conditional,
    /// Ends in a `Return`; no successors.
    Return,
}

#[derive(Debug, Clone)]
pub struct BasicBlock {
    pub instructions: Vec<Instruction>,
    pub predecessors: Vec<usize>,
    pub successors: Vec<usize>,
    pub idom: Option<usize>,
    pub control_flow: ControlFlowType,
}

impl BasicBlock {
    pub fn new() -> Self {
        Self {
            instructions: Vec::new(),
            predecessors: Vec::new(),
            successors: Vec::new(),
            idom: None,
            control_flow: ControlFlowType::Normal,
        }
    }

    /// Re-derives `control_flow` from the block's trailing instruction,
    /// used after the optimizer truncates a dead conditional jump during
    /// the short-circuit-AND fold.
    pub fn refresh_control_flow(&mut self) {
        self.control_flow = match self.instructions.last().map(|i| i.opcode) {
            Some(OpCode::Jump) => ControlFlowType::Jump,
            Some(OpCode::JumpZero) | Some(OpCode::JumpNotZero) => ControlFlowType::Conditional,
            Some(OpCode::Return) => ControlFlowType::Return,
            _ => ControlFlowType::Normal,
        };
    }
}

impl Default for BasicBlock {
    fn default() -> Self {
        Self::new()
    }
}

/// A function's CFG: an indexed vector of basic blocks with entry at 0.
#[derive(Debug, Clone, Default)]
pub struct Cfg {
    pub blocks: Vec<BasicBlock>,
}

impl Cfg {
    pub fn new() -> Self {
        Self { blocks: vec![BasicBlock::new()] }
    }

    pub fn alloc_block(&mut self) -> usize {
        self.blocks.push(BasicBlock::new());
        self.blocks.len() - 1
    }

    /// Adds `b` to `a`'s successors and `a` to `b`'s predecessors. Both
    /// sides are always maintained together.
    pub fn link(&mut self, a: usize, b: usize) {
        if !self.blocks[a].successors.contains(&b) {
            self.blocks[a].successors.push(b);
        }
        if !self.blocks[b].predecessors.contains(&a) {
            self.blocks[b].predecessors.push(a);
        }
    }

    pub fn unlink(&mut self, a: usize, b: usize) {
        self.blocks[a].successors.retain(|&s| s != b);
        self.blocks[b].predecessors.retain(|&p| p != a);
    }

    /// Detaches every edge touching `i`; the block itself is left as an
    /// empty orphan rather than compacted out of the index space, so
    /// callers holding other block indices don't need remapping.
    pub fn remove_node(&mut self, i: usize) {
        let preds = self.blocks[i].predecessors.clone();
        let succs = self.blocks[i].successors.clone();
        for p in preds {
            self.unlink(p, i);
        }
        for s in succs {
            self.unlink(i, s);
        }
    }

    /// Concatenates `b`'s instructions into `a` and re-targets `b`'s
    /// successors to originate from `a`, then removes `b`. Only valid
    /// when `a` is `b`'s sole predecessor.
    pub fn merge_nodes(&mut self, a: usize, b: usize) {
        assert_eq!(self.blocks[b].predecessors, vec![a], "merge_nodes requires a to be b's sole predecessor");
        let b_instructions = std::mem::take(&mut self.blocks[b].instructions);
        let b_successors = self.blocks[b].successors.clone();
        self.unlink(a, b);
        self.blocks[a].instructions.extend(b_instructions);
        for s in b_successors {
            self.unlink(b, s);
            self.link(a, s);
        }
        self.blocks[a].control_flow = self.blocks[b].control_flow;
        self.blocks[b] = BasicBlock::new();
    }

    /// Recomputes every reachable block's immediate dominator with the
    /// standard iterative (Cooper-Harvey-Kennedy) data-flow algorithm;
    /// any algorithm that satisfies the usual dominance properties would
    /// do.
    pub fn rebuild_dom_tree(&mut self) {
        let n = self.blocks.len();
        for b in &mut self.blocks {
            b.idom = None;
        }
        if n == 0 {
            return;
        }
        let order = self.reverse_postorder(0);
        let rpo_index: std::collections::HashMap<usize, usize> =
            order.iter().enumerate().map(|(i, &b)| (b, i)).collect();

        let mut idom: Vec<Option<usize>> = vec![None; n];
        idom[0] = Some(0);
        let mut changed = true;
        while changed {
            changed = false;
            for &b in order.iter().skip(1) {
                let mut new_idom: Option<usize> = None;
                for &p in &self.blocks[b].predecessors {
                    if idom[p].is_none() {
                        continue;
                    }
                    new_idom = Some(match new_idom {
                        None => p,
                        Some(cur) => intersect(&idom, &rpo_index, cur, p),
                    });
                }
                if idom[b] != new_idom {
                    idom[b] = new_idom;
                    changed = true;
                }
            }
        }
        for (i, d) in idom.into_iter().enumerate() {
            self.blocks[i].idom = if i == 0 { None } else { d };
        }
    }

    fn reverse_postorder(&self, entry: usize) -> Vec<usize> {
        let mut visited = HashSet::new();
        let mut postorder = Vec::new();
        fn visit(cfg: &Cfg, b: usize, visited: &mut HashSet<usize>, postorder: &mut Vec<usize>) {
            if !visited.insert(b) {
                return;
            }
            for &s in &cfg.blocks[b].successors {
                visit(cfg, s, visited, postorder);
            }
            postorder.push(b);
        }
        visit(self, entry, &mut visited, &mut postorder);
        postorder.reverse();
        postorder
    }

    /// Every block reachable from the entry block by following
    /// successors.
    pub fn reachable_from_entry(&self) -> HashSet<usize> {
        self.reverse_postorder(0).into_iter().collect()
    }
}

fn intersect(idom: &[Option<usize>], rpo_index: &std::collections::HashMap<usize, usize>, mut a: usize, mut b: usize) -> usize {
    while a != b {
        while rpo_index[&a] > rpo_index[&b] {
            a = idom[a].expect("walked past the entry block while intersecting dominators");
        }
        while rpo_index[&b] > rpo_index[&a] {
            b = idom[b].expect("walked past the entry block while intersecting dominators");
        }
    }
    a
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear_cfg(n: usize) -> Cfg {
        let mut cfg = Cfg::new();
        for _ in 1..n {
            cfg.alloc_block();
        }
        for i in 0..n - 1 {
            cfg.link(i, i + 1);
        }
        cfg
    }

    #[test]
    fn entry_dominates_all_blocks_in_a_diamond() {
        let mut cfg = Cfg::new();
        let b1 = cfg.alloc_block();
        let b2 = cfg.alloc_block();
        let b3 = cfg.alloc_block();
        cfg.link(0, b1);
        cfg.link(0, b2);
        cfg.link(b1, b3);
        cfg.link(b2, b3);
        cfg.rebuild_dom_tree();
        assert_eq!(cfg.blocks[b1].idom, Some(0));
        assert_eq!(cfg.blocks[b2].idom, Some(0));
        assert_eq!(cfg.blocks[b3].idom, Some(0));
    }

    #[test]
    fn linear_chain_idom_is_immediate_predecessor() {
        let mut cfg = linear_cfg(4);
        cfg.rebuild_dom_tree();
        assert_eq!(cfg.blocks[1].idom, Some(0));
        assert_eq!(cfg.blocks[2].idom, Some(1));
        assert_eq!(cfg.blocks[3].idom, Some(2));
    }

    #[test]
    fn merge_nodes_requires_sole_predecessor() {
        let mut cfg = linear_cfg(3);
        cfg.merge_nodes(0, 1);
        assert_eq!(cfg.blocks[0].successors, vec![2]);
        assert!(cfg.blocks[1].successors.is_empty());
        assert!(cfg.blocks[1].predecessors.is_empty());
    }

    #[test]
    fn remove_node_detaches_both_sides_of_every_edge() {
        let mut cfg = linear_cfg(3);
        cfg.remove_node(1);
        assert!(cfg.blocks[0].successors.is_empty());
        assert!(cfg.blocks[2].predecessors.is_empty());
    }
}
