//! A fixed-object-size, randomized-placement region: one slot of the
//! segregated size-class dispatcher ([`crate::dispatcher`]).
//!
//! An attacker who can allocate and free cannot reliably predict which
//! physical slot a victim allocation lands in, defeating exploits that
//! depend on adjacency (overflow-into-next-object,
//! use-after-free-with-known-replacement).

use crate::bitmap::Bitmap;
use crate::bump::BumpAllocator;
use crate::canary::{self, Canary};
use crate::diagnostics::{Diagnostics, DiagnosticKind};
use crate::rng::Mwc;

/// The result of attempting to free a pointer against one mini-heap (or,
/// via [`crate::dispatcher::Dispatcher`], against a whole size-class
/// sweep). Distinguishes "try the next heap" from "this pointer was ours,
/// and the matter is already settled" so a caller one layer up never
/// re-reports an outcome a mini-heap already reported itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreeOutcome {
    /// `ptr` does not fall within this heap's region; keep looking.
    NotOwned,
    /// `ptr` was live in this heap and has been reclaimed.
    Freed,
    /// `ptr` fell within this heap's region but was rejected (currently:
    /// a double free, already reported via [`DiagnosticKind::DoubleFree`]).
    /// The caller must not treat this as "not ours" and must not report
    /// anything further.
    Rejected,
}

/// One size class's randomized region. `object_size` and `capacity` must
/// both be powers of two; `capacity` is fixed identically across every
/// mini-heap in a dispatcher so the slot table stays a flat homogeneous
/// array (see the dispatcher module for why).
pub struct MiniHeap {
    object_size: usize,
    capacity: usize,
    numerator: usize,
    denominator: usize,
    base: *mut u8,
    bitmap: Option<Bitmap>,
    rng: Mwc,
    freed_value: Canary,
    in_use: usize,
}

// SAFETY: a MiniHeap is only ever touched while the allocator's global
// lock is held.
unsafe impl Send for MiniHeap {}

impl MiniHeap {
    /// Builds a dormant mini-heap; no memory is obtained until the first
    /// allocation attempt.
    #[must_use]
    pub fn new(object_size: usize, capacity: usize, numerator: usize, denominator: usize) -> Self {
        debug_assert!(object_size.is_power_of_two());
        debug_assert!(capacity.is_power_of_two());
        debug_assert!(numerator < denominator);
        let mut rng = Mwc::from_entropy();
        let freed_value = canary::make_canary(&mut rng);
        Self {
            object_size,
            capacity,
            numerator,
            denominator,
            base: std::ptr::null_mut(),
            bitmap: None,
            rng,
            freed_value,
            in_use: 0,
        }
    }

    /// The fixed object size this mini-heap serves.
    #[must_use]
    pub const fn object_size(&self) -> usize {
        self.object_size
    }

    /// Whether backing memory has been obtained yet.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.base.is_null()
    }

    fn region_len(&self) -> usize {
        self.object_size * self.capacity
    }

    /// Activates the heap: asks the bump arena for `capacity * object_size`
    /// bytes, reserves the occupancy bitmap (also from the arena), and, if
    /// canaries are enabled, fills the whole region with the freed-value
    /// canary. Returns `false` (leaving the heap `Dormant`) if the arena
    /// could not satisfy the request.
    fn activate(&mut self, bump: &mut BumpAllocator) -> bool {
        if self.is_active() {
            return true;
        }
        let region = bump.alloc(self.region_len(), self.object_size);
        if region.is_null() {
            return false;
        }
        let Some(bitmap) = Bitmap::reserve(bump, self.capacity) else {
            return false;
        };
        #[cfg(feature = "canary")]
        unsafe {
            canary::fill(region, self.region_len(), self.freed_value);
        }
        self.base = region;
        self.bitmap = Some(bitmap);
        true
    }

    /// Attempts a single randomized placement. Returns null immediately on
    /// collision; never retries (see the module's top-level rationale).
    pub fn allocate(&mut self, bump: &mut BumpAllocator, diagnostics: &dyn Diagnostics) -> *mut u8 {
        if !self.is_active() && !self.activate(bump) {
            return std::ptr::null_mut();
        }

        let index = self.rng.next_index(self.capacity);
        let bitmap = self.bitmap.as_mut().expect("activated heap has a bitmap");
        if !bitmap.try_set(index) {
            return std::ptr::null_mut();
        }
        self.in_use += 1;

        let object = unsafe { self.base.add(index * self.object_size) };

        #[cfg(feature = "canary")]
        unsafe {
            if canary::check_not(object, self.object_size, self.freed_value) {
                diagnostics.report(DiagnosticKind::InitCorruption, object as usize);
            }
        }
        #[cfg(not(feature = "canary"))]
        let _ = diagnostics;

        object
    }

    /// Releases `ptr` back to this heap. `ptr` need not be slot-aligned: any
    /// address within this heap's region is truncated down to its
    /// containing slot (mirroring the original's `computeIndex`, which
    /// divides the in-region offset by the object size rather than
    /// requiring it be a multiple of it), so an interior pointer — for
    /// instance the one `memalign` hands back — reclaims the whole slot it
    /// lives in. Returns [`FreeOutcome::NotOwned`] if `ptr` is outside this
    /// heap's region entirely.
    pub fn free(&mut self, ptr: *mut u8, diagnostics: &dyn Diagnostics) -> FreeOutcome {
        let Some(index) = self.index_of(ptr) else {
            return FreeOutcome::NotOwned;
        };

        let bitmap = self.bitmap.as_mut().expect("in_bounds implies activated");
        if !bitmap.reset(index) {
            diagnostics.report(DiagnosticKind::DoubleFree, ptr as usize);
            return FreeOutcome::Rejected;
        }
        self.in_use -= 1;

        #[cfg(feature = "canary")]
        {
            self.check_neighbor_overflow(index, diagnostics);
            let object = unsafe { self.base.add(index * self.object_size) };
            unsafe {
                canary::fill(object, self.object_size, self.freed_value);
            }
        }
        #[cfg(not(feature = "canary"))]
        let _ = diagnostics;

        FreeOutcome::Freed
    }

    /// Bytes remaining from `ptr` to the end of its containing object, or 0
    /// if `ptr` is not owned by this heap.
    #[must_use]
    pub fn size_of(&self, ptr: *const u8) -> usize {
        let Some(offset) = self.offset_of(ptr.cast_mut()) else {
            return 0;
        };
        self.object_size - (offset % self.object_size)
    }

    /// Number of objects this heap may hand out before it is considered
    /// full under the over-provisioning invariant
    /// (`Numerator`/`Denominator`). Exposed for tests and stress scenarios,
    /// not enforced as a hard gate inside `allocate` (the original source
    /// does not gate allocation on it either — it is a property the
    /// dispatcher's sizing is expected to uphold, not a runtime check).
    #[must_use]
    pub const fn over_provision_threshold(&self) -> usize {
        self.capacity * self.numerator / self.denominator
    }

    #[must_use]
    pub const fn in_use(&self) -> usize {
        self.in_use
    }

    fn offset_of(&self, ptr: *mut u8) -> Option<usize> {
        if self.base.is_null() {
            return None;
        }
        let start = self.base as usize;
        let end = start + self.region_len();
        let addr = ptr as usize;
        if addr < start || addr >= end {
            return None;
        }
        Some(addr - start)
    }

    fn index_of(&self, ptr: *mut u8) -> Option<usize> {
        let offset = self.offset_of(ptr)?;
        Some(offset / self.object_size)
    }

    #[cfg(feature = "canary")]
    fn check_neighbor_overflow(&self, index: usize, diagnostics: &dyn Diagnostics) {
        let bitmap = self.bitmap.as_ref().expect("activated heap has a bitmap");
        if index > 0 && !bitmap.is_set(index - 1) {
            let neighbor = unsafe { self.base.add((index - 1) * self.object_size) };
            if unsafe { canary::check_not(neighbor, self.object_size, self.freed_value) } {
                diagnostics.report(DiagnosticKind::HeapOverflow, neighbor as usize);
            }
        }
        if index + 1 < self.capacity && !bitmap.is_set(index + 1) {
            let neighbor = unsafe { self.base.add((index + 1) * self.object_size) };
            if unsafe { canary::check_not(neighbor, self.object_size, self.freed_value) } {
                diagnostics.report(DiagnosticKind::HeapOverflow, neighbor as usize);
            }
        }
    }
}
