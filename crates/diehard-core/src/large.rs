//! Large-object side path: direct page-mapped allocations for sizes
//! exceeding the largest small-object size class.
//!
//! The original, 32-bit-era design indexes a dense array by
//! `ptr >> page_shift` (≈1M entries for a 32-bit address space divided
//! into 4 KiB pages). That is not viable on 64-bit platforms, where the
//! addressable page-index space vastly exceeds available memory; this
//! implementation substitutes a sparse `HashMap<usize, usize>` keyed by
//! page index with the same O(1)-amortized size-query contract.

use std::collections::HashMap;

const PAGE_SIZE: usize = 4096;

fn page_index(addr: usize) -> usize {
    addr / PAGE_SIZE
}

/// Tracks the size of every live large-object allocation, by page index,
/// so that `size_of` on any pointer within the allocation resolves in
/// O(1).
pub struct LargeHeap {
    /// page index -> bytes remaining from the start of that page to the
    /// end of the allocation (mirrors the small-object `size_of`
    /// contract: `recorded_size - in_page_offset`).
    registry: HashMap<usize, usize>,
}

impl LargeHeap {
    #[must_use]
    pub fn new() -> Self {
        Self {
            registry: HashMap::new(),
        }
    }

    /// Maps `sz` bytes directly from the OS and records its size across
    /// every page it spans. Returns null on OS mapping failure.
    pub fn allocate(&mut self, sz: usize) -> *mut u8 {
        let base = diehard_os::map(sz);
        if base.is_null() {
            return base;
        }
        let start_page = page_index(base as usize);
        let page_count = sz.div_ceil(PAGE_SIZE);
        for p in 0..page_count {
            let remaining = sz - p * PAGE_SIZE;
            self.registry.insert(start_page + p, remaining);
        }
        base
    }

    /// Returns `false` if `ptr` is not the start of a live large
    /// allocation (not ours — the caller should treat this the same as a
    /// small-heap "not mine").
    pub fn free(&mut self, ptr: *mut u8, size_hint: Option<usize>) -> bool {
        let page = page_index(ptr as usize);
        let Some(&sz) = self.registry.get(&page) else {
            return false;
        };
        let sz = size_hint.unwrap_or(sz);
        let page_count = sz.div_ceil(PAGE_SIZE);
        for p in 0..page_count {
            self.registry.remove(&(page + p));
        }
        diehard_os::unmap(ptr, sz);
        true
    }

    /// Bytes remaining from `ptr` to the end of its allocation, or 0 if
    /// `ptr` is not within any live large allocation.
    #[must_use]
    pub fn size_of(&self, ptr: *const u8) -> usize {
        let addr = ptr as usize;
        let page = page_index(addr);
        let Some(&recorded) = self.registry.get(&page) else {
            return 0;
        };
        let page_base = page * PAGE_SIZE;
        let in_page_offset = addr - page_base;
        recorded.saturating_sub(in_page_offset)
    }
}

impl Default for LargeHeap {
    fn default() -> Self {
        Self::new()
    }
}
