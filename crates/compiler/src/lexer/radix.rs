//! A byte-keyed radix (prefix) tree used to match the longest keyword or
//! operator spelling at the current lexer position in a single forward
//! scan, instead of trying each candidate spelling in turn.

use std::collections::HashMap;

struct Node<V> {
    children: HashMap<u8, Node<V>>,
    value: Option<V>,
}

impl<V> Node<V> {
    fn new() -> Self {
        Self {
            children: HashMap::new(),
            value: None,
        }
    }
}

/// Maps byte-string keys to values of `V`, supporting "longest prefix of
/// `haystack` that is a key" lookups. Built once at startup (keyword and
/// operator tables are immutable for the process lifetime) and read many
/// times per compilation.
pub struct RadixTree<V> {
    root: Node<V>,
}

impl<V: Copy> RadixTree<V> {
    pub fn new() -> Self {
        Self { root: Node::new() }
    }

    pub fn insert(&mut self, key: &str, value: V) {
        let mut node = &mut self.root;
        for &b in key.as_bytes() {
            node = node.children.entry(b).or_insert_with(Node::new);
        }
        node.value = Some(value);
    }

    /// Find the longest key that is a prefix of `haystack`, returning the
    /// value and the matched byte length. Returns `None` if no key
    /// prefixes `haystack` at all.
    pub fn longest_prefix(&self, haystack: &[u8]) -> Option<(V, usize)> {
        let mut node = &self.root;
        let mut best: Option<(V, usize)> = None;
        for (i, &b) in haystack.iter().enumerate() {
            match node.children.get(&b) {
                Some(next) => {
                    node = next;
                    if let Some(v) = node.value {
                        best = Some((v, i + 1));
                    }
                }
                None => break,
            }
        }
        best
    }
}

impl<V: Copy> Default for RadixTree<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn longest_prefix_prefers_longer_match() {
        let mut t = RadixTree::new();
        t.insert("in", 1);
        t.insert("inout", 2);
        assert_eq!(t.longest_prefix(b"inout x"), Some((2, 5)));
        assert_eq!(t.longest_prefix(b"in x"), Some((1, 2)));
    }

    #[test]
    fn no_match_returns_none() {
        let mut t: RadixTree<i32> = RadixTree::new();
        t.insert("struct", 1);
        assert_eq!(t.longest_prefix(b"foo"), None);
    }
}
