//! Fixed diagnostic entry points for the four integrity-error kinds the
//! core can detect. These are *not* Rust `Error` types threaded through
//! `Result` — per the heap's own failure semantics, integrity violations
//! are reported out-of-band and the call that detected them still returns
//! its ordinary boolean/pointer result (the bitmap is never mutated to
//! reflect a detected violation). Callers that want hard failure install a
//! [`Diagnostics`] impl that aborts.

/// The four integrity-error kinds the core distinguishes. `OutOfMemory` is
/// deliberately absent: it is surfaced as a null/`None` return, not routed
/// through diagnostics, because it isn't a sign of caller misbehavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// A pointer was freed twice.
    DoubleFree,
    /// A pointer was freed that is not owned by any mini-heap's region and
    /// not a live large-object allocation either. A pointer that falls
    /// within a mini-heap's region but off a slot boundary is still owned
    /// by that heap (it resolves to the slot it lies inside) and does not
    /// raise this.
    InvalidFree,
    /// A canary mismatch in a freed neighbor slot, indicating the slot
    /// being freed overflowed into it.
    HeapOverflow,
    /// A canary mismatch in a slot at allocation time, indicating the slot
    /// was written to while it was supposed to be free.
    InitCorruption,
}

/// Receives integrity-error reports from the core. The default
/// implementation is a silent no-op so the core has zero behavior by
/// default beyond what the `tracing` feature adds; embedders that want
/// `abort()`-on-corruption semantics implement this trait themselves.
pub trait Diagnostics {
    /// Called when the core detects `kind` at `address` (the object
    /// pointer involved, where known; for `InitCorruption`/`HeapOverflow`
    /// this is the corrupted slot's address, not necessarily the pointer
    /// the caller passed in).
    fn report(&self, kind: DiagnosticKind, address: usize);
}

/// Emits a `tracing::error!` event when the `tracing` feature is enabled,
/// and is otherwise an inert no-op. This is the default sink installed by
/// [`crate::CombinedHeap::new`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDiagnostics;

impl Diagnostics for TracingDiagnostics {
    fn report(&self, kind: DiagnosticKind, address: usize) {
        #[cfg(feature = "tracing")]
        {
            match kind {
                DiagnosticKind::DoubleFree => {
                    tracing::error!(address = format_args!("{address:#x}"), "double free detected");
                }
                DiagnosticKind::InvalidFree => {
                    tracing::error!(address = format_args!("{address:#x}"), "invalid free detected");
                }
                DiagnosticKind::HeapOverflow => {
                    tracing::error!(address = format_args!("{address:#x}"), "heap overflow detected");
                }
                DiagnosticKind::InitCorruption => {
                    tracing::error!(
                        address = format_args!("{address:#x}"),
                        "corruption detected in a freshly allocated slot"
                    );
                }
            }
        }
        #[cfg(not(feature = "tracing"))]
        {
            let _ = (kind, address);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Default)]
    struct RecordingDiagnostics {
        seen: RefCell<Vec<(DiagnosticKind, usize)>>,
    }

    impl Diagnostics for RecordingDiagnostics {
        fn report(&self, kind: DiagnosticKind, address: usize) {
            self.seen.borrow_mut().push((kind, address));
        }
    }

    #[test]
    fn custom_sink_receives_reports() {
        let sink = RecordingDiagnostics::default();
        sink.report(DiagnosticKind::DoubleFree, 0x1000);
        assert_eq!(sink.seen.borrow()[0], (DiagnosticKind::DoubleFree, 0x1000));
    }

    #[test]
    fn default_sink_never_panics() {
        let sink = TracingDiagnostics;
        sink.report(DiagnosticKind::HeapOverflow, 0x2000);
        sink.report(DiagnosticKind::InitCorruption, 0x3000);
    }
}
