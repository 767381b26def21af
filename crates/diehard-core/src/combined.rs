//! The combined heap: a single allocator face over the segregated
//! small-object dispatcher (G) and the large-object side path (H), guarded
//! by the process-wide exclusion lock (J).

use std::cell::UnsafeCell;

use crate::bump::BumpAllocator;
use crate::diagnostics::{Diagnostics, DiagnosticKind, TracingDiagnostics};
use crate::dispatcher::{Dispatcher, MAX_SIZE};
use crate::large::LargeHeap;
use crate::lock::ExclusionLock;
use crate::miniheap::FreeOutcome;

struct HeapState {
    bump: BumpAllocator,
    dispatcher: Dispatcher,
    large: LargeHeap,
}

impl HeapState {
    fn new() -> Self {
        Self {
            bump: BumpAllocator::new(),
            dispatcher: Dispatcher::new(),
            large: LargeHeap::new(),
        }
    }
}

/// The three-operation core contract: `allocate`, `free`, `size_of`.
///
/// All mutating access goes through [`ExclusionLock::with_lock`], so the
/// `UnsafeCell` here is sound: at most one thread observes `&mut
/// HeapState` at a time, enforced the same way the original source relies
/// on its process-wide mutex rather than the type system.
pub struct CombinedHeap<D: Diagnostics + Send + Sync = TracingDiagnostics> {
    lock: ExclusionLock,
    state: UnsafeCell<HeapState>,
    diagnostics: D,
}

// SAFETY: `state` is only ever dereferenced from within
// `ExclusionLock::with_lock`, which serializes access across threads.
unsafe impl<D: Diagnostics + Send + Sync> Sync for CombinedHeap<D> {}

impl CombinedHeap<TracingDiagnostics> {
    /// Builds a heap reporting integrity errors through
    /// [`TracingDiagnostics`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_diagnostics(TracingDiagnostics)
    }
}

impl Default for CombinedHeap<TracingDiagnostics> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Diagnostics + Send + Sync> CombinedHeap<D> {
    /// Builds a heap reporting integrity errors through a caller-supplied
    /// sink (for example, one that calls `std::process::abort()`).
    #[must_use]
    pub fn with_diagnostics(diagnostics: D) -> Self {
        Self {
            lock: ExclusionLock::new(),
            state: UnsafeCell::new(HeapState::new()),
            diagnostics,
        }
    }

    /// Returns a pointer aligned to at least the allocator's alignment
    /// floor, or null on failure (out of memory, placement collision, or
    /// `size == 0`).
    #[must_use]
    pub fn allocate(&self, size: usize) -> *mut u8 {
        if size == 0 {
            return std::ptr::null_mut();
        }
        self.lock.with_lock(|| {
            // SAFETY: exclusive access guaranteed by the surrounding lock.
            let state = unsafe { &mut *self.state.get() };
            if size <= MAX_SIZE {
                state.dispatcher.allocate(size, &mut state.bump, &self.diagnostics)
            } else {
                state.large.allocate(size)
            }
        })
    }

    /// Releases `ptr` back to its owning mini-heap or large region.
    /// No-op on null. Emits a diagnostic only if `ptr` is owned by neither
    /// path — a rejected double free is already reported by the owning
    /// mini-heap and must not be reported again here.
    pub fn free(&self, ptr: *mut u8) {
        if ptr.is_null() {
            return;
        }
        self.lock.with_lock(|| {
            // SAFETY: see `allocate`.
            let state = unsafe { &mut *self.state.get() };
            match state.dispatcher.free(ptr, &self.diagnostics) {
                FreeOutcome::Freed | FreeOutcome::Rejected => return,
                FreeOutcome::NotOwned => {}
            }
            if state.large.free(ptr, None) {
                return;
            }
            self.diagnostics.report(DiagnosticKind::InvalidFree, ptr as usize);
        });
    }

    /// Bytes remaining from `ptr` to the end of its allocation; 0 if not
    /// owned.
    #[must_use]
    pub fn size_of(&self, ptr: *const u8) -> usize {
        if ptr.is_null() {
            return 0;
        }
        self.lock.with_lock(|| {
            // SAFETY: see `allocate`.
            let state = unsafe { &*self.state.get() };
            let sz = state.dispatcher.size_of(ptr);
            if sz != 0 {
                sz
            } else {
                state.large.size_of(ptr)
            }
        })
    }
}
