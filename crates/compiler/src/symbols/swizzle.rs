//! Swizzle field references (e.g. `v.xyxz`) are synthesized lazily into
//! synthetic field symbols.

use super::handle::SymbolHandle;
use super::table::{AccessModifier, SymbolKind, SymbolMetadata, SymbolTable};
use std::collections::HashMap;

/// Normalizes one swizzle character from the `r/g/b/a` alias set to its
/// `x/y/z/w` component index, or `None` if it names neither set.
fn component_index(c: char) -> Option<u8> {
    match c {
        'x' | 'r' => Some(0),
        'y' | 'g' => Some(1),
        'z' | 'b' => Some(2),
        'w' | 'a' => Some(3),
        _ => None,
    }
}

/// Lazily synthesizes and memoizes swizzle field symbols keyed by
/// `(base_fqn, normalized_pattern)`.
#[derive(Default)]
pub struct SwizzleManager {
    memo: HashMap<(String, String), SymbolHandle>,
}

impl SwizzleManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates `pattern` against a vector primitive with `base_dim`
    /// components (1-4) and a `scalar_name` (e.g. `"float"`), returning
    /// the synthetic field symbol for it. `base_fqn` is the vector's own
    /// fully-qualified name, used only as a memo key so `v.xy` and
    /// `w.xy` (different base vectors) don't collide.
    ///
    /// Returns `None` if any character is not an `x/y/z/w`-or-alias
    /// component, a referenced component index is out of range for
    /// `base_dim`, or the pattern is empty or longer than 4 components.
    pub fn resolve(
        &mut self,
        table: &mut SymbolTable,
        root: SymbolHandle,
        base_fqn: &str,
        base_dim: u8,
        scalar_name: &str,
        pattern: &str,
    ) -> Option<SymbolHandle> {
        if pattern.is_empty() || pattern.chars().count() > 4 {
            return None;
        }
        let mut indices = Vec::with_capacity(pattern.len());
        let mut normalized = String::with_capacity(pattern.len());
        for c in pattern.chars() {
            let idx = component_index(c)?;
            if idx >= base_dim {
                return None;
            }
            indices.push(idx);
            normalized.push(['x', 'y', 'z', 'w'][idx as usize]);
        }

        let key = (base_fqn.to_string(), normalized.clone());
        if let Some(&existing) = self.memo.get(&key) {
            return Some(existing);
        }

        let result_type_name = vector_name(scalar_name, normalized.len() as u8);
        let result_type = table.find_node_full_path(&result_type_name, root)?;

        // `#` rather than `.` so this stays a single edge label under
        // `root` instead of being split into a path by `SymbolTable`.
        let field_name = format!("${base_fqn}#{normalized}");
        let handle = table
            .insert(
                root,
                &field_name,
                SymbolMetadata {
                    kind: SymbolKind::Swizzle,
                    access: AccessModifier::Public,
                    declaration: None,
                    type_handle: Some(result_type),
                },
            )
            .or_else(|| table.find_node_part(&field_name, root))
            .expect("swizzle field name is either freshly inserted or already memoized");
        self.memo.insert(key, handle);
        Some(handle)
    }
}

fn vector_name(scalar_name: &str, dim: u8) -> String {
    if dim == 1 {
        scalar_name.to_string()
    } else {
        format!("{scalar_name}{dim}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh_table_with_vectors() -> (SymbolTable, SymbolHandle) {
        let mut table = SymbolTable::new(0);
        let root = table.root();
        for name in ["float", "float2", "float3", "float4"] {
            table
                .insert(
                    root,
                    name,
                    SymbolMetadata {
                        kind: SymbolKind::Primitive,
                        access: AccessModifier::Public,
                        declaration: None,
                        type_handle: None,
                    },
                )
                .unwrap();
        }
        (table, root)
    }

    #[test]
    fn rgba_aliases_normalize_to_xyzw() {
        let (mut table, root) = fresh_table_with_vectors();
        let mut swizzles = SwizzleManager::new();
        let a = swizzles.resolve(&mut table, root, "float4", 4, "float", "rgba").unwrap();
        let b = swizzles.resolve(&mut table, root, "float4", 4, "float", "xyzw").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn pattern_length_determines_result_vector_width() {
        let (mut table, root) = fresh_table_with_vectors();
        let mut swizzles = SwizzleManager::new();
        let handle = swizzles.resolve(&mut table, root, "float4", 4, "float", "xy").unwrap();
        let ty = table.metadata(handle).unwrap().type_handle.unwrap();
        assert_eq!(table.short_name(ty), "float2");
    }

    #[test]
    fn out_of_range_component_is_rejected() {
        let (mut table, root) = fresh_table_with_vectors();
        let mut swizzles = SwizzleManager::new();
        assert!(swizzles.resolve(&mut table, root, "float2", 2, "float", "xyz").is_none());
    }

    #[test]
    fn repeated_components_are_allowed() {
        let (mut table, root) = fresh_table_with_vectors();
        let mut swizzles = SwizzleManager::new();
        assert!(swizzles.resolve(&mut table, root, "float4", 4, "float", "xyxz").is_some());
    }
}
