//! Unreachable-code analysis over a lowered function's CFG. Runs after the
//! algebraic simplifier so that branches it proved statically dead (the
//! short-circuit-AND CFG surgery in `optimizer.rs`) are caught here rather
//! than left dangling in the wire-serialized module.

use crate::ir::ILFunction;
use hxsl_core::{codes, Logger};

/// Single pass per function: any non-entry block with an empty
/// predecessor set is unreachable. Each such block is reported once,
/// using the merge of every instruction span the builder recorded for it
/// (`ILFunction::block_spans`, the `FindMappingForInstruction` side
/// table), then its instructions are dropped and the dominator tree is
/// rebuilt.
///
/// A block the builder never emitted anything into (no instructions, no
/// recorded span) is not "code" and is left alone; `remove_node`/
/// `merge_nodes` already leave zeroed placeholder blocks like this behind
/// and they carry nothing worth reporting or removing twice.
pub fn analyze(function: &mut ILFunction, logger: &mut Logger) {
    let unreachable: Vec<usize> = (1..function.cfg.blocks.len())
        .filter(|&i| function.cfg.blocks[i].predecessors.is_empty() && !function.cfg.blocks[i].instructions.is_empty())
        .collect();

    if unreachable.is_empty() {
        return;
    }

    for i in unreachable {
        let span = function.block_spans.get(i).copied().flatten();
        let offset = span.map(|s| s.byte_offset).unwrap_or(0);
        logger.log(codes::UNREACHABLE_CODE, offset, span, &[]);
        function.cfg.blocks[i].instructions.clear();
        function.cfg.remove_node(i);
    }
    function.cfg.rebuild_dom_tree();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Instruction;
    use hxsl_core::{LocaleTable, SourceId, TextSpan};

    fn span(offset: u32) -> TextSpan {
        TextSpan::new(SourceId(0), offset, 1, 1, offset + 1)
    }

    #[test]
    fn block_with_no_predecessors_is_reported_and_dropped() {
        let mut f = ILFunction::new("f", 0);
        let dead = f.cfg.alloc_block();
        f.block_spans = vec![None, Some(span(40))];
        f.cfg.blocks[dead].instructions.push(Instruction::ret(None));
        f.cfg.blocks[0].instructions.push(Instruction::ret(None));

        let locale = LocaleTable::en_us();
        let mut logger = Logger::new(&locale);
        analyze(&mut f, &mut logger);

        assert_eq!(logger.messages().len(), 1);
        assert_eq!(logger.messages()[0].code, codes::UNREACHABLE_CODE);
        assert_eq!(logger.messages()[0].span, Some(span(40)));
        assert!(f.cfg.blocks[dead].instructions.is_empty());
    }

    #[test]
    fn reachable_blocks_are_left_untouched() {
        let mut f = ILFunction::new("f", 0);
        let next = f.cfg.alloc_block();
        f.cfg.link(0, next);
        f.cfg.blocks[0].instructions.push(Instruction::jump(next as u32));
        f.cfg.blocks[next].instructions.push(Instruction::ret(None));

        let locale = LocaleTable::en_us();
        let mut logger = Logger::new(&locale);
        analyze(&mut f, &mut logger);

        assert!(logger.messages().is_empty());
        assert_eq!(f.cfg.blocks[next].instructions.len(), 1);
    }

    #[test]
    fn empty_orphaned_placeholder_blocks_are_not_reported() {
        let mut f = ILFunction::new("f", 0);
        // Has no predecessors and no instructions, same as a block left
        // behind by `merge_nodes`.
        f.cfg.alloc_block();
        f.cfg.blocks[0].instructions.push(Instruction::ret(None));

        let locale = LocaleTable::en_us();
        let mut logger = Logger::new(&locale);
        analyze(&mut f, &mut logger);

        assert!(logger.messages().is_empty());
    }
}
