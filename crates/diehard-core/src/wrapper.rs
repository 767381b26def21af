//! The POSIX-ish allocator surface derived from the core's three
//! primitives (`allocate`/`free`/`size_of`). Everything here is expressible
//! in terms of [`CombinedHeap`] plus byte copies — symbol interposition
//! that would make these the process's actual `malloc`/`free` is out of
//! scope for this crate (see [`crate::global_alloc`] for the one piece of
//! that integration this crate does take on, via `#[global_allocator]`).

use std::ffi::{c_char, c_int, c_void, CStr};

use crate::diagnostics::{Diagnostics, TracingDiagnostics};
use crate::combined::CombinedHeap;

/// Reference page size used by [`Wrapper::valloc`]/[`Wrapper::pvalloc`],
/// matching the 8 KiB value the original source hard-codes "for
/// convenience" rather than querying the OS.
pub const VALLOC_PAGE_SIZE: usize = 8192;

/// The full malloc-family surface over a [`CombinedHeap`].
pub struct Wrapper<D: Diagnostics + Send + Sync = TracingDiagnostics> {
    heap: CombinedHeap<D>,
}

impl Wrapper<TracingDiagnostics> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            heap: CombinedHeap::new(),
        }
    }
}

impl Default for Wrapper<TracingDiagnostics> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Diagnostics + Send + Sync> Wrapper<D> {
    #[must_use]
    pub fn with_diagnostics(diagnostics: D) -> Self {
        Self {
            heap: CombinedHeap::with_diagnostics(diagnostics),
        }
    }

    /// `malloc(n)`: `n == 0` is promoted to `1` so callers always get a
    /// distinct, freeable pointer back.
    #[must_use]
    pub fn malloc(&self, n: usize) -> *mut u8 {
        self.heap.allocate(n.max(1))
    }

    /// `free(p)`.
    pub fn free(&self, p: *mut u8) {
        self.heap.free(p);
    }

    /// `calloc(n, m)`: `n * m == 0` is promoted to `1`.
    #[must_use]
    pub fn calloc(&self, n: usize, m: usize) -> *mut u8 {
        let total = n.checked_mul(m).unwrap_or(usize::MAX).max(1);
        let ptr = self.heap.allocate(total);
        if !ptr.is_null() {
            unsafe {
                std::ptr::write_bytes(ptr, 0, total);
            }
        }
        ptr
    }

    /// `realloc(p, n)`.
    #[must_use]
    pub fn realloc(&self, p: *mut u8, n: usize) -> *mut u8 {
        if p.is_null() {
            return self.malloc(n);
        }
        if n == 0 {
            self.free(p);
            return std::ptr::null_mut();
        }
        let old_size = self.heap.size_of(p);
        let new_ptr = self.heap.allocate(n);
        if !new_ptr.is_null() {
            let copy_len = old_size.min(n);
            unsafe {
                std::ptr::copy_nonoverlapping(p, new_ptr, copy_len);
            }
        }
        self.free(p);
        new_ptr
    }

    /// `memalign(alignment, n)`: validates `alignment` is a power of two,
    /// then over-allocates `2*alignment + n` and returns the first
    /// `alignment`-aligned address within that block. That address is
    /// ordinarily interior to the underlying allocation, not its start;
    /// freeing it works because both the small- and large-object paths
    /// resolve an interior pointer back to its containing slot/region
    /// rather than requiring the exact base address.
    #[must_use]
    pub fn memalign(&self, alignment: usize, n: usize) -> *mut u8 {
        if alignment == 0 || !alignment.is_power_of_two() {
            return std::ptr::null_mut();
        }
        let buf = self.malloc(2 * alignment + n);
        if buf.is_null() {
            return buf;
        }
        let aligned = (buf as usize + alignment - 1) & !(alignment - 1);
        aligned as *mut u8
    }

    /// `posix_memalign`: `0` on success, `EINVAL`/`ENOMEM`-shaped status
    /// codes otherwise (returned as plain `c_int`s rather than through
    /// `errno.h`, since this crate does not depend on libc error codes).
    pub fn posix_memalign(&self, memptr: &mut *mut u8, alignment: usize, size: usize) -> c_int {
        const EINVAL: c_int = 22;
        const ENOMEM: c_int = 12;
        if alignment == 0 || !alignment.is_power_of_two() {
            return EINVAL;
        }
        let ptr = self.memalign(alignment, size);
        if ptr.is_null() {
            return ENOMEM;
        }
        *memptr = ptr;
        0
    }

    /// `valloc(n)`: `memalign(VALLOC_PAGE_SIZE, n)`.
    #[must_use]
    pub fn valloc(&self, n: usize) -> *mut u8 {
        self.memalign(VALLOC_PAGE_SIZE, n)
    }

    /// `pvalloc(n)`: rounds `n` up to the page size, then `valloc`.
    #[must_use]
    pub fn pvalloc(&self, n: usize) -> *mut u8 {
        let rounded = (n + VALLOC_PAGE_SIZE - 1) & !(VALLOC_PAGE_SIZE - 1);
        self.valloc(rounded)
    }

    /// `malloc_usable_size(p)`: `size_of(p)`; 0 on null.
    #[must_use]
    pub fn usable_size(&self, p: *const u8) -> usize {
        self.heap.size_of(p)
    }

    /// Always fails, matching the original's stub.
    pub fn mallopt(&self, _param: c_int, _value: c_int) -> c_int {
        0
    }

    /// `strndup`: allocates `min(strlen(s), n) + 1` bytes, copies, and
    /// null-terminates.
    ///
    /// # Safety
    /// `s` must be a valid, null-terminated C string.
    #[must_use]
    pub unsafe fn strndup(&self, s: *const c_char, n: usize) -> *mut c_char {
        if s.is_null() {
            return std::ptr::null_mut();
        }
        let cstr = unsafe { CStr::from_ptr(s) };
        let bytes = cstr.to_bytes();
        let capped = bytes.len().min(n);
        let out = self.malloc(capped + 1);
        if out.is_null() {
            return std::ptr::null_mut();
        }
        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), out, capped);
            out.add(capped).write(0);
        }
        out.cast::<c_char>()
    }

    /// `strdup`: `strndup(s, strlen(s))`.
    ///
    /// # Safety
    /// `s` must be a valid, null-terminated C string.
    #[must_use]
    pub unsafe fn strdup(&self, s: *const c_char) -> *mut c_char {
        if s.is_null() {
            return std::ptr::null_mut();
        }
        let len = unsafe { CStr::from_ptr(s) }.to_bytes().len();
        unsafe { self.strndup(s, len) }
    }

    /// `wcsdup`: allocates `(wcslen(s) + 1) * size_of::<u32>()` bytes and
    /// copies the wide string including its terminator.
    ///
    /// # Safety
    /// `s` must point to a valid, null-terminated `u32`-wide string of at
    /// least `len` characters plus terminator.
    #[must_use]
    pub unsafe fn wcsdup(&self, s: *const u32) -> *mut u32 {
        if s.is_null() {
            return std::ptr::null_mut();
        }
        let mut len = 0usize;
        unsafe {
            while *s.add(len) != 0 {
                len += 1;
            }
        }
        let bytes = (len + 1) * size_of::<u32>();
        let out = self.malloc(bytes).cast::<u32>();
        if out.is_null() {
            return out;
        }
        unsafe {
            std::ptr::copy_nonoverlapping(s, out, len + 1);
        }
        out
    }
}

/// Opaque pointer convenience for embedders that want a `c_void`-typed
/// surface rather than `u8`.
pub type RawPtr = *mut c_void;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malloc_zero_returns_freeable_pointer() {
        let w = Wrapper::new();
        let p = w.malloc(0);
        assert!(!p.is_null());
        w.free(p);
    }

    #[test]
    fn realloc_null_behaves_as_malloc() {
        let w = Wrapper::new();
        let p = w.realloc(std::ptr::null_mut(), 64);
        assert!(!p.is_null());
        w.free(p);
    }

    #[test]
    fn realloc_zero_frees_and_returns_null() {
        let w = Wrapper::new();
        let p = w.malloc(64);
        assert!(w.realloc(p, 0).is_null());
    }

    #[test]
    fn realloc_preserves_prefix() {
        let w = Wrapper::new();
        let p = w.malloc(16);
        unsafe {
            std::ptr::write_bytes(p, 0xAB, 16);
        }
        let q = w.realloc(p, 64);
        assert!(!q.is_null());
        let copied = unsafe { std::slice::from_raw_parts(q, 16) };
        assert!(copied.iter().all(|&b| b == 0xAB));
        w.free(q);
    }

    #[test]
    fn free_of_null_is_a_no_op() {
        let w = Wrapper::new();
        w.free(std::ptr::null_mut());
    }

    #[test]
    fn memalign_rejects_non_power_of_two() {
        let w = Wrapper::new();
        assert!(w.memalign(3, 64).is_null());
    }

    #[test]
    fn memalign_returns_aligned_pointer() {
        let w = Wrapper::new();
        let p = w.memalign(64, 100);
        assert!(!p.is_null());
        assert_eq!(p as usize % 64, 0);
    }

    #[test]
    fn memalign_pointer_frees_without_reporting_invalid_free() {
        use crate::diagnostics::DiagnosticKind;
        use std::sync::{Arc, Mutex};

        struct Recorder(Arc<Mutex<Vec<DiagnosticKind>>>);
        impl Diagnostics for Recorder {
            fn report(&self, kind: DiagnosticKind, _address: usize) {
                self.0.lock().unwrap().push(kind);
            }
        }

        let seen = Arc::new(Mutex::new(Vec::new()));
        let w = Wrapper::with_diagnostics(Recorder(Arc::clone(&seen)));
        let p = w.memalign(64, 100);
        assert!(!p.is_null());
        w.free(p);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn posix_memalign_reports_invalid_argument() {
        let w = Wrapper::new();
        let mut out = std::ptr::null_mut();
        assert_eq!(w.posix_memalign(&mut out, 3, 64), 22);
    }

    #[test]
    fn posix_memalign_success_path() {
        let w = Wrapper::new();
        let mut out = std::ptr::null_mut();
        assert_eq!(w.posix_memalign(&mut out, 32, 64), 0);
        assert!(!out.is_null());
    }

    #[test]
    fn calloc_zero_fills_and_refills_on_reuse() {
        let w = Wrapper::new();
        let p = w.calloc(10, 16);
        assert!(!p.is_null());
        let slice = unsafe { std::slice::from_raw_parts(p, 160) };
        assert!(slice.iter().all(|&b| b == 0));
        unsafe {
            std::ptr::write_bytes(p, 0xFF, 160);
        }
        w.free(p);
        let q = w.calloc(10, 16);
        let slice = unsafe { std::slice::from_raw_parts(q, 160) };
        assert!(slice.iter().all(|&b| b == 0));
        w.free(q);
    }

    #[test]
    fn mallopt_always_fails() {
        let w = Wrapper::new();
        assert_eq!(w.mallopt(0, 0), 0);
    }

    #[test]
    fn strndup_caps_and_terminates() {
        let w = Wrapper::new();
        let s = c"hello world";
        let dup = unsafe { w.strndup(s.as_ptr(), 5) };
        assert!(!dup.is_null());
        let copied = unsafe { CStr::from_ptr(dup) };
        assert_eq!(copied.to_str().unwrap(), "hello");
        w.free(dup.cast::<u8>());
    }

    #[test]
    fn usable_size_is_zero_for_null() {
        let w = Wrapper::new();
        assert_eq!(w.usable_size(std::ptr::null()), 0);
    }
}
