//! Chained slab allocator, used by the symbol table for its nodes.
//!
//! A systems-language design keys an owning allocator off a footer placed
//! at a fixed offset from each node's slab, so `allocator(node)` is a
//! pointer-arithmetic lookup. Rust's ownership model makes that pattern
//! both unsafe and unnecessary here: a [`SlabIndex`] already carries enough
//! information (slab id + in-slab offset) to recover its owning slab in
//! O(1) without a footer, and the allocator itself is always reached
//! through the table that owns it rather than recovered from a bare
//! pointer. See DESIGN.md for the tradeoff.

/// A handle into a [`SlabAllocator`]: cheap to copy, not an owner. Stable
/// across further insertions (slabs are never moved once allocated).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlabIndex {
    slab: u32,
    slot: u32,
}

const SLAB_CAPACITY: usize = 256;

enum Slot<T> {
    Occupied(T),
    /// Intrusive free list: index of the next free slot, or `u32::MAX` for
    /// the list's end.
    Free(u32),
}

struct Slab<T> {
    slots: Vec<Slot<T>>,
    free_head: u32,
    len: u32,
}

impl<T> Slab<T> {
    fn new() -> Self {
        Self {
            slots: Vec::with_capacity(SLAB_CAPACITY),
            free_head: u32::MAX,
            len: 0,
        }
    }

    fn has_room(&self) -> bool {
        self.free_head != u32::MAX || self.slots.len() < SLAB_CAPACITY
    }
}

/// Owns a chain of fixed-capacity slabs of `T`, handing out [`SlabIndex`]
/// handles. Freed slots are recycled via an intrusive free list before a
/// new slab is appended.
pub struct SlabAllocator<T> {
    slabs: Vec<Slab<T>>,
}

impl<T> Default for SlabAllocator<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SlabAllocator<T> {
    pub fn new() -> Self {
        Self { slabs: Vec::new() }
    }

    pub fn alloc(&mut self, value: T) -> SlabIndex {
        if let Some((slab_idx, slab)) = self
            .slabs
            .iter_mut()
            .enumerate()
            .find(|(_, s)| s.has_room())
        {
            let slot = if slab.free_head != u32::MAX {
                let idx = slab.free_head;
                let Slot::Free(next) = slab.slots[idx as usize] else {
                    unreachable!("free_head must point at a free slot")
                };
                slab.free_head = next;
                slab.slots[idx as usize] = Slot::Occupied(value);
                idx
            } else {
                let idx = slab.slots.len() as u32;
                slab.slots.push(Slot::Occupied(value));
                idx
            };
            slab.len += 1;
            return SlabIndex {
                slab: slab_idx as u32,
                slot,
            };
        }
        let mut slab = Slab::new();
        slab.slots.push(Slot::Occupied(value));
        slab.len = 1;
        let slab_idx = self.slabs.len() as u32;
        self.slabs.push(slab);
        SlabIndex { slab: slab_idx, slot: 0 }
    }

    pub fn get(&self, index: SlabIndex) -> &T {
        match &self.slabs[index.slab as usize].slots[index.slot as usize] {
            Slot::Occupied(v) => v,
            Slot::Free(_) => panic!("use of freed slab index"),
        }
    }

    pub fn get_mut(&mut self, index: SlabIndex) -> &mut T {
        match &mut self.slabs[index.slab as usize].slots[index.slot as usize] {
            Slot::Occupied(v) => v,
            Slot::Free(_) => panic!("use of freed slab index"),
        }
    }

    /// Free a node's slot, returning its value and pushing the slot onto
    /// the owning slab's intrusive free list.
    pub fn free(&mut self, index: SlabIndex) -> T {
        let slab = &mut self.slabs[index.slab as usize];
        let old = std::mem::replace(&mut slab.slots[index.slot as usize], Slot::Free(slab.free_head));
        slab.free_head = index.slot;
        slab.len -= 1;
        match old {
            Slot::Occupied(v) => v,
            Slot::Free(_) => panic!("double free of slab index"),
        }
    }

    /// Total number of slabs allocated (for diagnostics/metrics only).
    pub fn slab_count(&self) -> usize {
        self.slabs.len()
    }

    /// Total number of live (occupied) entries across every slab.
    pub fn live_count(&self) -> usize {
        self.slabs.iter().map(|s| s.len as usize).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_and_get_roundtrip() {
        let mut a: SlabAllocator<i32> = SlabAllocator::new();
        let h1 = a.alloc(10);
        let h2 = a.alloc(20);
        assert_eq!(*a.get(h1), 10);
        assert_eq!(*a.get(h2), 20);
    }

    #[test]
    fn freed_slot_is_recycled_before_growing() {
        let mut a: SlabAllocator<i32> = SlabAllocator::new();
        let h1 = a.alloc(1);
        a.free(h1);
        let h2 = a.alloc(2);
        assert_eq!(h1, h2, "freed slot should be reused");
        assert_eq!(a.slab_count(), 1);
    }

    #[test]
    fn growing_past_one_slab_chains_a_new_one() {
        let mut a: SlabAllocator<u32> = SlabAllocator::new();
        for i in 0..(SLAB_CAPACITY as u32 + 1) {
            a.alloc(i);
        }
        assert_eq!(a.slab_count(), 2);
        assert_eq!(a.live_count(), SLAB_CAPACITY + 1);
    }

    #[test]
    #[should_panic(expected = "use of freed slab index")]
    fn using_a_freed_handle_panics() {
        let mut a: SlabAllocator<i32> = SlabAllocator::new();
        let h = a.alloc(1);
        a.free(h);
        a.get(h);
    }
}
