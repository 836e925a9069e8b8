//! Bump-allocated string interning.
//!
//! Short names used as symbol-table edge labels are interned here so that
//! pointer equality implies string equality, letting the symbol table use
//! pointer comparisons instead of repeated `str` comparisons on its hot path.

use bumpalo::Bump;
use std::cell::RefCell;
use std::collections::HashMap;

/// An interned string: a `'static`-looking `&str` actually borrowed from the
/// pool's arena. Valid for as long as the owning `StringPool` is alive.
pub type Interned = *const str;

/// Backs symbol-table short names and any other string the compiler wants
/// to deduplicate by identity rather than content.
pub struct StringPool {
    arena: Bump,
    // Interior mutability: interning is logically a read (same string in ->
    // same pointer out) even though the first occurrence allocates.
    map: RefCell<HashMap<&'static str, Interned>>,
}

impl Default for StringPool {
    fn default() -> Self {
        Self::new()
    }
}

impl StringPool {
    pub fn new() -> Self {
        Self {
            arena: Bump::new(),
            map: RefCell::new(HashMap::new()),
        }
    }

    /// Intern `s`, returning a pointer valid for the pool's lifetime. Two
    /// calls with equal content return pointer-equal results.
    pub fn intern(&self, s: &str) -> Interned {
        if let Some(existing) = self.map.borrow().get(s) {
            return *existing;
        }
        let allocated: &str = self.arena.alloc_str(s);
        // SAFETY: `allocated` is owned by `self.arena`, which outlives every
        // borrow we hand out because the pool's `Drop` order keeps `arena`
        // alive as long as `map`'s entries are reachable through `&self`.
        let extended: &'static str = unsafe { std::mem::transmute::<&str, &'static str>(allocated) };
        self.map.borrow_mut().insert(extended, extended as Interned);
        extended as Interned
    }

    /// Resolve an interned pointer back to its string content.
    ///
    /// # Safety
    /// `ptr` must have been returned by [`StringPool::intern`] on this same
    /// pool and the pool must still be alive.
    pub unsafe fn resolve(ptr: Interned) -> &'static str {
        unsafe { &*ptr }
    }

    pub fn len(&self) -> usize {
        self.map.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.borrow().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_same_string_yields_pointer_equality() {
        let pool = StringPool::new();
        let a = pool.intern("foo.bar");
        let b = pool.intern("foo.bar");
        assert_eq!(a, b);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn interning_distinct_strings_yields_distinct_pointers() {
        let pool = StringPool::new();
        let a = pool.intern("a");
        let b = pool.intern("b");
        assert_ne!(a, b);
        unsafe {
            assert_eq!(StringPool::resolve(a), "a");
            assert_eq!(StringPool::resolve(b), "b");
        }
    }
}
