//! Segregated size-class dispatcher: routes an allocation or free to the
//! correct [`MiniHeap`] by a power-of-two size-class progression.
//!
//! The dispatcher is a flat array of homogeneous [`MiniHeap`] values
//! differing only in their `object_size` field, rather than a tagged union
//! or trait-object array over const-generic specializations — this
//! composes better with a monomorphic layout and avoids indirect dispatch
//! on the hot path (see the crate's design notes on static polymorphism).

use crate::bump::{BumpAllocator, ALIGN_UNIT};
use crate::canary::Canary;
use crate::diagnostics::{Diagnostics, DiagnosticKind};
use crate::miniheap::{FreeOutcome, MiniHeap};
use crate::rng::Mwc;

/// Largest object size served by the small-object path; anything bigger
/// routes to the large-object side path.
pub const MAX_SIZE: usize = 16384;

/// Fixed capacity shared by every mini-heap slot (constant mini-heap
/// footprint; only the object size varies across slots).
pub const CAPACITY: usize = 128;

/// Heap multiplier: a mini-heap is considered full once its occupancy
/// passes `NUMERATOR / DENOMINATOR` of `CAPACITY`.
pub const NUMERATOR: usize = 1;
/// See [`NUMERATOR`].
pub const DENOMINATOR: usize = 2;

const fn class_count() -> usize {
    let mut k = 0;
    let mut size = ALIGN_UNIT;
    while size < MAX_SIZE {
        size *= 2;
        k += 1;
    }
    k + 1
}

/// Number of distinct size classes between `ALIGN_UNIT` and `MAX_SIZE`
/// inclusive, each a power-of-two multiple of `ALIGN_UNIT`.
pub const CLASS_COUNT: usize = class_count();

/// Maps a requested size onto a size-class index, clamped to 0 for
/// sub-`ALIGN_UNIT` requests, or `None` if `sz` exceeds [`MAX_SIZE`].
#[must_use]
pub fn index_of(sz: usize) -> Option<usize> {
    if sz > MAX_SIZE {
        return None;
    }
    if sz <= ALIGN_UNIT {
        return Some(0);
    }
    let index = (usize::BITS - (sz - 1).leading_zeros()) as usize - ALIGN_UNIT.trailing_zeros() as usize;
    Some(index.min(CLASS_COUNT - 1))
}

/// Routes allocate/free/size requests across `CLASS_COUNT` mini-heaps.
pub struct Dispatcher {
    heaps: Vec<MiniHeap>,
    /// Fills every newly returned object with this process-local canary so
    /// writes into any slack between the requested size and the owning
    /// size class diverge from a known pattern (enabling the mini-heap's
    /// free-time neighbor checks to be meaningful for the *next*
    /// occupant of a slot).
    post_fill_canary: Canary,
}

impl Dispatcher {
    /// Builds the dispatcher's `CLASS_COUNT` mini-heaps, sizes
    /// `ALIGN_UNIT * 2^k` for `k` in `[0, CLASS_COUNT)`.
    #[must_use]
    pub fn new() -> Self {
        let mut rng = Mwc::from_entropy();
        let post_fill_canary = crate::canary::make_canary(&mut rng);
        let heaps = (0..CLASS_COUNT)
            .map(|k| MiniHeap::new(ALIGN_UNIT << k, CAPACITY, NUMERATOR, DENOMINATOR))
            .collect();
        Self {
            heaps,
            post_fill_canary,
        }
    }

    /// Allocates `sz` bytes, or returns null if `sz > MAX_SIZE` (the
    /// caller should route that to the large-object path) or the chosen
    /// mini-heap could not place the object.
    pub fn allocate(
        &mut self,
        sz: usize,
        bump: &mut BumpAllocator,
        diagnostics: &dyn Diagnostics,
    ) -> *mut u8 {
        let Some(index) = index_of(sz) else {
            return std::ptr::null_mut();
        };
        let heap = &mut self.heaps[index];
        let ptr = heap.allocate(bump, diagnostics);
        if !ptr.is_null() {
            #[cfg(feature = "canary")]
            unsafe {
                crate::canary::fill(ptr, heap.object_size(), self.post_fill_canary);
            }
        }
        ptr
    }

    /// Walks mini-heaps smallest-first (small-object-dominated workloads
    /// are the expected common case), stopping at the first one that
    /// claims `ptr` — whether it frees it or rejects it as a double free.
    /// Only [`FreeOutcome::NotOwned`] from every heap means the caller
    /// should fall through to the large-object path.
    pub fn free(&mut self, ptr: *mut u8, diagnostics: &dyn Diagnostics) -> FreeOutcome {
        for heap in &mut self.heaps {
            match heap.free(ptr, diagnostics) {
                FreeOutcome::NotOwned => continue,
                outcome => return outcome,
            }
        }
        FreeOutcome::NotOwned
    }

    /// Same walk as [`Dispatcher::free`], returning the first non-zero
    /// size.
    #[must_use]
    pub fn size_of(&self, ptr: *const u8) -> usize {
        for heap in &self.heaps {
            let sz = heap.size_of(ptr);
            if sz != 0 {
                return sz;
            }
        }
        0
    }

    /// Diagnostic access to the underlying mini-heaps, used by stress
    /// tests that need to drive a specific size class to saturation.
    #[must_use]
    pub fn heap_for_size(&mut self, sz: usize) -> Option<&mut MiniHeap> {
        index_of(sz).map(|i| &mut self.heaps[i])
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::TracingDiagnostics;

    #[test]
    fn zero_sized_request_is_rejected_by_caller_contract() {
        // The dispatcher itself does not special-case 0; the combined
        // heap promotes 0 -> 1 before calling in (see combined.rs).
        assert_eq!(index_of(1), Some(0));
    }

    #[test]
    fn index_of_clamps_small_requests_to_class_zero() {
        assert_eq!(index_of(1), Some(0));
        assert_eq!(index_of(ALIGN_UNIT), Some(0));
    }

    #[test]
    fn index_of_routes_exact_powers_of_two() {
        assert_eq!(index_of(ALIGN_UNIT * 2), Some(1));
        assert_eq!(index_of(ALIGN_UNIT * 4), Some(2));
    }

    #[test]
    fn max_size_uses_largest_mini_heap_not_large_path() {
        assert_eq!(index_of(MAX_SIZE), Some(CLASS_COUNT - 1));
    }

    #[test]
    fn over_max_size_is_not_mine() {
        assert_eq!(index_of(MAX_SIZE + 1), None);
    }

    #[test]
    fn allocate_and_free_round_trip() {
        let mut bump = BumpAllocator::new();
        let diag = TracingDiagnostics;
        let mut dispatcher = Dispatcher::new();

        let ptr = dispatcher.allocate(100, &mut bump, &diag);
        assert!(!ptr.is_null());
        assert!(dispatcher.size_of(ptr) >= 100);
        assert_eq!(dispatcher.free(ptr, &diag), FreeOutcome::Freed);
    }

    #[test]
    fn free_of_unowned_pointer_returns_not_owned() {
        let diag = TracingDiagnostics;
        let mut dispatcher = Dispatcher::new();
        let bogus = 0x10usize as *mut u8;
        assert_eq!(dispatcher.free(bogus, &diag), FreeOutcome::NotOwned);
    }
}
