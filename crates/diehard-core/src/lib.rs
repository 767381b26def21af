//! A randomized, over-provisioned segregated-heap allocator core.
//!
//! This crate is the hard part of a probabilistic, security-hardened
//! general-purpose allocator: a collection of per-size-class random
//! mini-heaps, their occupancy bitmaps, the size-class dispatcher that
//! routes requests to them, a large-object side path for anything bigger,
//! and a canary-based ("`DieFast`") corruption-detection discipline that
//! interleaves with every allocation and free.
//!
//! Placement within a mini-heap is randomized and single-probe: an
//! attacker who can allocate and free cannot reliably predict which
//! physical slot a victim allocation lands in, and a collision is reported
//! as allocation failure rather than retried, keeping worst-case latency
//! bounded. None of this compacts, coalesces, or returns memory to the OS
//! for small objects, and it does not guarantee that any allocation
//! succeeds while free capacity remains — see [`CombinedHeap`]'s
//! documentation for the full list of non-goals.
//!
//! # Quick start
//!
//! ```
//! use diehard_core::CombinedHeap;
//!
//! let heap = CombinedHeap::new();
//! let ptr = heap.allocate(64);
//! assert!(!ptr.is_null());
//! assert!(heap.size_of(ptr) >= 64);
//! heap.free(ptr);
//! ```
//!
//! # Installing as the process allocator
//!
//! ```ignore
//! use diehard_core::global_alloc::DieHardAlloc;
//!
//! #[global_allocator]
//! static ALLOC: DieHardAlloc = DieHardAlloc::new();
//! ```

#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_panics_doc)]

pub mod bitmap;
pub mod bump;
pub mod canary;
pub mod combined;
pub mod diagnostics;
pub mod dispatcher;
pub mod global_alloc;
pub mod large;
pub mod lock;
pub mod miniheap;
pub mod rng;
pub mod wrapper;

pub use combined::CombinedHeap;
pub use diagnostics::{Diagnostics, DiagnosticKind, TracingDiagnostics};
pub use dispatcher::{Dispatcher, CLASS_COUNT, MAX_SIZE};
pub use wrapper::Wrapper;
