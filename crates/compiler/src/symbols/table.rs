//! The symbol table: a tree of symbol nodes kept in a slab allocator, with
//! hierarchical dotted-name lookup and overload-signature edge labels.

use super::handle::SymbolHandle;
use crate::ast::NodeId;
use hxsl_core::{SlabAllocator, SlabIndex};
use std::collections::HashMap;
use std::sync::Mutex;

/// What kind of entity a symbol names. Distinct from its *type*: a
/// variable symbol's kind is `Variable`, its type is e.g. `int`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Namespace,
    Primitive,
    Struct,
    Class,
    Field,
    Parameter,
    Variable,
    Function,
    Operator,
    Constructor,
    Enum,
    Array,
    Swizzle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessModifier {
    Public,
    Private,
}

/// Metadata attached to a symbol node once its declaration has been seen
/// (the collector pass attaches this; a node with no metadata is purely
/// structural, e.g. a namespace path segment with no direct declaration).
#[derive(Debug, Clone)]
pub struct SymbolMetadata {
    pub kind: SymbolKind,
    pub access: AccessModifier,
    pub declaration: Option<NodeId>,
    /// For `Variable`/`Field`/`Parameter`/`Function`(return)/primitives:
    /// the symbol's own type, resolved separately from the declaration AST
    /// node so type lookups don't need to re-walk the AST.
    pub type_handle: Option<SymbolHandle>,
}

struct SymbolNode {
    parent: Option<SlabIndex>,
    short_name: String,
    children: HashMap<String, SlabIndex>,
    metadata: Option<SymbolMetadata>,
}

/// A tree of symbol nodes. `table_id` distinguishes handles across
/// multiple tables sharing a process (e.g. the primitive table vs. a
/// per-compilation table).
pub struct SymbolTable {
    id: u32,
    nodes: SlabAllocator<SymbolNode>,
    root: SlabIndex,
    insert_lock: Mutex<()>,
    sealed: bool,
}

impl SymbolTable {
    pub fn new(id: u32) -> Self {
        let mut nodes = SlabAllocator::new();
        let root = nodes.alloc(SymbolNode {
            parent: None,
            short_name: String::new(),
            children: HashMap::new(),
            metadata: None,
        });
        Self {
            id,
            nodes,
            root,
            insert_lock: Mutex::new(()),
            sealed: false,
        }
    }

    pub fn root(&self) -> SymbolHandle {
        SymbolHandle::new(self.id, self.root)
    }

    pub fn seal(&mut self) {
        self.sealed = true;
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    fn check_handle(&self, handle: SymbolHandle) {
        debug_assert_eq!(handle.table_id, self.id, "symbol handle from a different table");
    }

    /// Insert `path` (dot-separated, where the final segment may itself be
    /// an overload-signature string like `foo(int,float)`), attaching
    /// `metadata` at the leaf. Returns `None` if the leaf already carries
    /// metadata (duplicate declaration).
    pub fn insert(&mut self, start: SymbolHandle, path: &str, metadata: SymbolMetadata) -> Option<SymbolHandle> {
        self.check_handle(start);
        assert!(!self.sealed, "cannot insert into a sealed symbol table");
        let _guard = self.insert_lock.lock().unwrap();
        let mut current = start.node;
        for segment in split_path(path) {
            current = self.child_or_create(current, &segment);
        }
        let node = self.nodes.get_mut(current);
        if node.metadata.is_some() {
            return None;
        }
        node.metadata = Some(metadata);
        Some(SymbolHandle::new(self.id, current))
    }

    fn child_or_create(&mut self, parent: SlabIndex, short_name: &str) -> SlabIndex {
        if let Some(&existing) = self.nodes.get(parent).children.get(short_name) {
            return existing;
        }
        let child = self.nodes.alloc(SymbolNode {
            parent: Some(parent),
            short_name: short_name.to_string(),
            children: HashMap::new(),
            metadata: None,
        });
        self.nodes.get_mut(parent).children.insert(short_name.to_string(), child);
        child
    }

    /// Single hash-map lookup for one path segment.
    pub fn find_node_part(&self, short_name: &str, start: SymbolHandle) -> Option<SymbolHandle> {
        self.check_handle(start);
        self.nodes
            .get(start.node)
            .children
            .get(short_name)
            .map(|&idx| SymbolHandle::new(self.id, idx))
    }

    /// Walk a dotted (or call-signature-suffixed) path from `start`. The
    /// separator is `.` or the `(` that opens a signature suffix: `a.b.f(int)`
    /// walks edges `a`, `b`, then looks up the whole remaining
    /// `f(int)` as a single edge label.
    pub fn find_node_full_path(&self, dotted_name: &str, start: SymbolHandle) -> Option<SymbolHandle> {
        self.check_handle(start);
        let mut current = start;
        for segment in split_path(dotted_name) {
            current = self.find_node_part(&segment, current)?;
        }
        Some(current)
    }

    pub fn metadata(&self, handle: SymbolHandle) -> Option<&SymbolMetadata> {
        self.check_handle(handle);
        self.nodes.get(handle.node).metadata.as_ref()
    }

    pub fn metadata_mut(&mut self, handle: SymbolHandle) -> Option<&mut SymbolMetadata> {
        self.check_handle(handle);
        self.nodes.get_mut(handle.node).metadata.as_mut()
    }

    pub fn short_name(&self, handle: SymbolHandle) -> &str {
        self.check_handle(handle);
        &self.nodes.get(handle.node).short_name
    }

    pub fn parent(&self, handle: SymbolHandle) -> Option<SymbolHandle> {
        self.check_handle(handle);
        self.nodes.get(handle.node).parent.map(|idx| SymbolHandle::new(self.id, idx))
    }

    pub fn children(&self, handle: SymbolHandle) -> impl Iterator<Item = SymbolHandle> + '_ {
        self.check_handle(handle);
        self.nodes.get(handle.node).children.values().map(move |&idx| SymbolHandle::new(self.id, idx))
    }

    pub fn full_qualified_name(&self, handle: SymbolHandle) -> String {
        self.check_handle(handle);
        let mut segments = Vec::new();
        let mut current = Some(handle.node);
        while let Some(idx) = current {
            let node = self.nodes.get(idx);
            if node.parent.is_none() {
                break;
            }
            segments.push(node.short_name.clone());
            current = node.parent;
        }
        segments.reverse();
        segments.join(".")
    }

    /// Rewrite one edge's label, preserving the node's children and
    /// metadata.
    pub fn rename(&mut self, handle: SymbolHandle, new_short_name: &str) {
        self.check_handle(handle);
        assert!(!self.sealed, "cannot rename in a sealed symbol table");
        let node = self.nodes.get(handle.node);
        let Some(parent_idx) = node.parent else {
            return;
        };
        let old_name = node.short_name.clone();
        self.nodes.get_mut(handle.node).short_name = new_short_name.to_string();
        let parent = self.nodes.get_mut(parent_idx);
        if let Some(idx) = parent.children.remove(&old_name) {
            parent.children.insert(new_short_name.to_string(), idx);
        }
    }

    /// Placeholder for scope/local stripping after semantic analysis;
    /// currently a no-op walk.
    pub fn strip(&self) {
        fn walk(_table: &SymbolTable, _node: SlabIndex) {}
        walk(self, self.root);
    }
}

fn split_path(path: &str) -> impl Iterator<Item = String> {
    // Split on '.' but treat a '(' as stopping further separator scanning:
    // everything from the first unmatched '(' to the end is one segment
    // (the call-signature suffix), e.g. "a.b.foo(int,float)" walks edges
    // "a", "b", "foo(int,float)".
    let sig_start = path.find('(');
    let (head, tail) = match sig_start {
        Some(i) => (&path[..i], Some(&path[i..])),
        None => (path, None),
    };
    let mut parts: Vec<String> = if head.is_empty() {
        Vec::new()
    } else {
        head.split('.').map(str::to_string).collect()
    };
    match (tail, parts.pop()) {
        (Some(sig), Some(last)) => parts.push(format!("{last}{sig}")),
        (Some(sig), None) => parts.push(sig.to_string()),
        (None, Some(last)) => parts.push(last),
        (None, None) => {}
    }
    parts.into_iter()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(kind: SymbolKind) -> SymbolMetadata {
        SymbolMetadata {
            kind,
            access: AccessModifier::Public,
            declaration: None,
            type_handle: None,
        }
    }

    #[test]
    fn insert_then_find_full_path_yields_same_handle() {
        let mut table = SymbolTable::new(0);
        let root = table.root();
        let h = table.insert(root, "a.b.S", meta(SymbolKind::Struct)).unwrap();
        let found = table.find_node_full_path("a.b.S", root).unwrap();
        assert_eq!(h, found);
    }

    #[test]
    fn duplicate_insert_returns_none() {
        let mut table = SymbolTable::new(0);
        let root = table.root();
        table.insert(root, "a.b.S", meta(SymbolKind::Struct)).unwrap();
        assert!(table.insert(root, "a.b.S", meta(SymbolKind::Struct)).is_none());
    }

    #[test]
    fn overload_signature_is_one_edge_not_a_scope() {
        let mut table = SymbolTable::new(0);
        let root = table.root();
        table.insert(root, "foo(int,float)", meta(SymbolKind::Function)).unwrap();
        assert!(table.find_node_part("foo(int,float)", root).is_some());
    }

    #[test]
    fn full_qualified_name_round_trips() {
        let mut table = SymbolTable::new(0);
        let root = table.root();
        let h = table.insert(root, "a.b.S", meta(SymbolKind::Struct)).unwrap();
        assert_eq!(table.full_qualified_name(h), "a.b.S");
    }

    #[test]
    fn rename_preserves_children() {
        let mut table = SymbolTable::new(0);
        let root = table.root();
        let parent = table.insert(root, "a.b", meta(SymbolKind::Namespace)).unwrap();
        table.insert(parent, "x", meta(SymbolKind::Field)).unwrap();
        table.rename(parent, "renamed");
        assert!(table.find_node_full_path("a.renamed.x", root).is_some());
    }

    #[test]
    #[should_panic(expected = "cannot insert into a sealed symbol table")]
    fn sealed_table_rejects_insert() {
        let mut table = SymbolTable::new(0);
        table.seal();
        let root = table.root();
        table.insert(root, "x", meta(SymbolKind::Field));
    }
}
