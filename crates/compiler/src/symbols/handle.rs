//! Symbol handles: cheap, non-owning references into a [`SymbolTable`].

use super::table::SymbolTable;
use hxsl_core::SlabIndex;

/// `(table, node)` — cheap to copy, never an owner. Valid for the lifetime
/// of the table it points into. Two handles compare equal only if they
/// name the same table id and node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SymbolHandle {
    pub table_id: u32,
    pub node: SlabIndex,
}

impl SymbolHandle {
    pub fn new(table_id: u32, node: SlabIndex) -> Self {
        Self { table_id, node }
    }

    pub fn find_part<'t>(&self, table: &'t SymbolTable, short_name: &str) -> Option<SymbolHandle> {
        table.find_node_part(short_name, *self)
    }

    pub fn find_full_path<'t>(&self, table: &'t SymbolTable, dotted_name: &str) -> Option<SymbolHandle> {
        table.find_node_full_path(dotted_name, *self)
    }

    pub fn full_qualified_name(&self, table: &SymbolTable) -> String {
        table.full_qualified_name(*self)
    }
}
