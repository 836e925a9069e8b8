//! Array types are synthesized on demand rather than declared, so they
//! need their own memo table keyed by canonical name.

use super::handle::SymbolHandle;
use super::table::{AccessModifier, SymbolKind, SymbolMetadata, SymbolTable};
use std::collections::HashMap;

/// Memoizes array symbols by their canonical `elem_fqn[d0][d1]…` name so
/// that `int[4]` resolves to a single shared symbol per compilation,
/// however many times it's referenced.
#[derive(Default)]
pub struct ArrayManager {
    memo: HashMap<String, SymbolHandle>,
}

impl ArrayManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// `elem` is the already-resolved element type handle; `elem_fqn` its
    /// fully-qualified name; `dims` the dimension sizes in declaration
    /// order (`int[4][2]` → `dims = [4, 2]`).
    pub fn get_or_create(
        &mut self,
        table: &mut SymbolTable,
        root: SymbolHandle,
        elem: SymbolHandle,
        elem_fqn: &str,
        dims: &[u32],
    ) -> SymbolHandle {
        let canonical = canonical_name(elem_fqn, dims);
        if let Some(&existing) = self.memo.get(&canonical) {
            return existing;
        }
        // Array symbols live as direct children of the root, named by
        // their canonical string; `insert` is safe to call even if an
        // identically-named array was created by another path, since the
        // memo map is the source of truth for reuse and the symbol table
        // itself tolerates re-resolution of the same edge label.
        let handle = table
            .find_node_part(&canonical, root)
            .or_else(|| {
                table.insert(
                    root,
                    &canonical,
                    SymbolMetadata {
                        kind: SymbolKind::Array,
                        access: AccessModifier::Public,
                        declaration: None,
                        type_handle: Some(elem),
                    },
                )
            })
            .expect("array symbol insertion cannot fail for a fresh canonical name");
        self.memo.insert(canonical, handle);
        handle
    }
}

fn canonical_name(elem_fqn: &str, dims: &[u32]) -> String {
    let mut name = elem_fqn.to_string();
    for d in dims {
        name.push('[');
        name.push_str(&d.to_string());
        name.push(']');
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_dims_yield_same_handle() {
        let mut table = SymbolTable::new(0);
        let root = table.root();
        let elem = table
            .insert(
                root,
                "int",
                SymbolMetadata {
                    kind: SymbolKind::Primitive,
                    access: AccessModifier::Public,
                    declaration: None,
                    type_handle: None,
                },
            )
            .unwrap();
        let mut arrays = ArrayManager::new();
        let a = arrays.get_or_create(&mut table, root, elem, "int", &[4]);
        let b = arrays.get_or_create(&mut table, root, elem, "int", &[4]);
        assert_eq!(a, b);
    }

    #[test]
    fn different_dims_yield_different_handles() {
        let mut table = SymbolTable::new(0);
        let root = table.root();
        let elem = table
            .insert(
                root,
                "int",
                SymbolMetadata {
                    kind: SymbolKind::Primitive,
                    access: AccessModifier::Public,
                    declaration: None,
                    type_handle: None,
                },
            )
            .unwrap();
        let mut arrays = ArrayManager::new();
        let a = arrays.get_or_create(&mut table, root, elem, "int", &[4]);
        let b = arrays.get_or_create(&mut table, root, elem, "int", &[2]);
        assert_ne!(a, b);
    }

    #[test]
    fn canonical_name_nests_dimensions_in_order() {
        assert_eq!(canonical_name("int", &[4, 2]), "int[4][2]");
    }
}
