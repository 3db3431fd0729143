//! Structured tracing for collection cycles.
//!
//! Mirrors the teacher's `tracing.rs`: a real implementation behind the
//! `tracing` feature, and a zero-cost stub when it's off, so call sites
//! never need `#[cfg]`.

#[cfg(feature = "tracing")]
pub mod internal {
    use std::sync::atomic::{AtomicU64, Ordering};
    use tracing::{span, Level};

    /// Stable identifier correlating every event within one `collect()` run.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct GcId(pub u64);

    static NEXT_GC_ID: AtomicU64 = AtomicU64::new(1);

    /// Allocate the next `GcId`. Monotonic; wraps after `u64::MAX` cycles,
    /// which is not reachable in practice.
    pub fn next_gc_id() -> GcId {
        GcId(NEXT_GC_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Span for an entire collection cycle.
    pub fn trace_collection(gc_id: GcId, heap_pages: usize) -> span::EnteredSpan {
        span!(Level::DEBUG, "collect", gc_id = gc_id.0, heap_pages).entered()
    }
}

#[cfg(not(feature = "tracing"))]
pub mod internal {
    /// Stub identifier when the `tracing` feature is disabled.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct GcId(pub u64);

    /// Stub: always returns `GcId(0)`.
    pub fn next_gc_id() -> GcId {
        GcId(0)
    }

    /// Stub: no-op guard, dropped immediately at the call site.
    pub fn trace_collection(_gc_id: GcId, _heap_pages: usize) {}
}

pub use internal::GcId;
