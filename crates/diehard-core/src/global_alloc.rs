//! An optional `GlobalAlloc` adapter, so this crate can be installed as a
//! process's `#[global_allocator]` the idiomatic Rust way, rather than via
//! the original's process-wide symbol interposition (out of scope here).

use std::alloc::{GlobalAlloc, Layout};

use crate::combined::CombinedHeap;
use crate::diagnostics::{Diagnostics, TracingDiagnostics};

/// Wraps a [`CombinedHeap`] to satisfy [`GlobalAlloc`].
///
/// The allocator's own alignment floor is [`crate::bump::ALIGN_UNIT`]
/// bytes; requests for a stricter `Layout` alignment are served through
/// [`crate::wrapper::Wrapper::memalign`]'s over-allocation scheme rather
/// than failing, since `GlobalAlloc` has no "I can't satisfy this
/// alignment" signal other than returning null.
pub struct DieHardAlloc<D: Diagnostics + Send + Sync = TracingDiagnostics> {
    heap: CombinedHeap<D>,
}

// A `#[global_allocator]` instance is typically installed as a `static`,
// which requires a `const` initializer; since `CombinedHeap::with_diagnostics`
// is not `const` (it reads the current thread id), embedders should wrap
// this in `std::sync::OnceLock` rather than constructing it directly in a
// `static` initializer.

impl DieHardAlloc<TracingDiagnostics> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            heap: CombinedHeap::with_diagnostics(TracingDiagnostics),
        }
    }
}

impl Default for DieHardAlloc<TracingDiagnostics> {
    fn default() -> Self {
        Self::new()
    }
}

unsafe impl<D: Diagnostics + Send + Sync> GlobalAlloc for DieHardAlloc<D> {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        if layout.align() <= crate::bump::ALIGN_UNIT {
            self.heap.allocate(layout.size())
        } else {
            let buf = self.heap.allocate(2 * layout.align() + layout.size());
            if buf.is_null() {
                return buf;
            }
            let mask = layout.align() - 1;
            ((buf as usize + mask) & !mask) as *mut u8
        }
    }

    unsafe fn dealloc(&self, ptr: *mut u8, _layout: Layout) {
        self.heap.free(ptr);
    }
}
