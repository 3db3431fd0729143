//! Collection metrics and statistics.

use std::cell::Cell;
use std::time::Duration;

/// Statistics from the most recent collection cycle.
#[derive(Debug, Clone, Copy)]
pub struct GcMetrics {
    /// Wall-clock duration of the last `collect`.
    pub duration: Duration,
    /// Pages that were live before the cycle but not promoted or
    /// evacuated, and are therefore free again.
    pub pages_reclaimed: usize,
    /// Pages stamped with `next_space` by the end of the cycle.
    pub pages_surviving: usize,
    /// How the cycle was triggered.
    pub trigger: CollectionTrigger,
    /// Total collections since this heap was created.
    pub total_collections: usize,
}

impl GcMetrics {
    /// All-zero metrics, used before any collection has run.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            duration: Duration::from_secs(0),
            pages_reclaimed: 0,
            pages_surviving: 0,
            trigger: CollectionTrigger::None,
            total_collections: 0,
        }
    }
}

impl Default for GcMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// What caused a collection cycle to run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CollectionTrigger {
    /// No collection has run yet.
    #[default]
    None,
    /// The page acquirer hit the half-heap threshold (spec.md §4.3).
    Acquisition,
    /// The client called `Heap::collect` directly.
    Explicit,
}

thread_local! {
    static LAST_METRICS: Cell<GcMetrics> = const { Cell::new(GcMetrics::new()) };
}

/// Metrics from the most recent collection on the calling thread's heaps.
///
/// `Heap` is not `Send`/`Sync` (spec.md §5: single mutator, single thread),
/// so thread-local storage is sufficient and matches the teacher's
/// `metrics.rs` convention.
#[must_use]
pub fn last_gc_metrics() -> GcMetrics {
    LAST_METRICS.with(Cell::get)
}

/// Record metrics for a just-finished collection.
pub(crate) fn record(mut metrics: GcMetrics) {
    let total = LAST_METRICS.with(|m| m.get().total_collections) + 1;
    metrics.total_collections = total;
    LAST_METRICS.with(|m| m.set(metrics));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_metrics_are_zero() {
        let m = GcMetrics::new();
        assert_eq!(m.pages_reclaimed, 0);
        assert_eq!(m.trigger, CollectionTrigger::None);
    }
}
