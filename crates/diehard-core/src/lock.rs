//! Global exclusion primitive guarding the combined heap.
//!
//! The original DieHard elides its lock's acquire/release while the hosting
//! process has created no thread besides its initial one: a process-wide
//! `anyThreadCreated` flag is set at `pthread_create` time, and thread
//! creation happens-before the new thread's first instruction, so the
//! creator's subsequent fast-path checks can never race a thread it hasn't
//! observed yet. Rust has no portable hook equivalent to interposing
//! thread-creation, so there is no happens-before edge available to make an
//! analogous fast path sound here: a flag flipped only when some other
//! thread first calls into the allocator can still be flipped concurrently
//! with the creator sitting inside an already-unguarded fast path, which is
//! a data race on the heap's shared state, not an optimization. This
//! primitive therefore always acquires the mutex; there is no lock-free
//! path.
use parking_lot::Mutex;

/// A mutex-backed mutual-exclusion wrapper around a closure.
pub struct ExclusionLock {
    mutex: Mutex<()>,
}

impl ExclusionLock {
    #[must_use]
    pub fn new() -> Self {
        Self {
            mutex: Mutex::new(()),
        }
    }

    /// Runs `f` with the lock held.
    pub fn with_lock<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = self.mutex.lock();
        f()
    }
}

impl Default for ExclusionLock {
    fn default() -> Self {
        Self::new()
    }
}
