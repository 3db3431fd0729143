//! The collection driver (spec.md §4.6): the six-step cycle that scans
//! roots, evacuates reachable data into the other half, and flips which
//! half is current.

use std::mem;
use std::time::Instant;

use crate::error::FatalError;
use crate::evacuate::evacuate;
use crate::header;
use crate::heap::Heap;
use crate::metrics::{self, CollectionTrigger, GcMetrics};
use crate::scan;
use crate::tracing::internal as gc_tracing;

/// Run one full collection cycle.
///
/// # Panics
///
/// Panics (via [`FatalError::RecursiveCollection`]) if called while a cycle
/// is already in progress. That can only happen if the half-heap invariant
/// (spec.md §4.3) has been violated, which is itself a bug in the
/// evacuator rather than something a caller can provoke directly.
pub(crate) fn run(heap: &mut Heap, trigger: CollectionTrigger) {
    if heap.current_space() != heap.next_space() {
        FatalError::RecursiveCollection.raise();
    }

    let start = Instant::now();
    let gc_id = gc_tracing::next_gc_id();
    let _span = gc_tracing::trace_collection(gc_id, heap.num_pages());

    // 1. Seal whatever's left of the current bump page behind a filler
    //    header so the sweep below can walk past it cleanly.
    heap.seal_current_page();

    // 2. Open the next half and reset the bookkeeping the sweep rebuilds.
    let old_space = heap.current_space();
    heap.begin_cycle();

    // 3. Conservative roots: pin pages the stack and registers might
    //    reference, without moving them. Globals are excluded here; they
    //    are precise roots and only ever move via step 4's evacuation.
    scan::scan_conservative_roots(heap);

    // 4. Precise roots: globals are evacuated (not merely pinned-by-value)
    //    because their *slots* must be updated to point at the new copy.
    for i in 0..heap.globals().len() {
        let slot = heap.globals()[i];
        // SAFETY: `slot` was validated at `Heap::new`; globals are precise
        // roots, so any non-null value is a real handle this heap produced.
        unsafe {
            let old = slot.read() as *mut usize;
            let new = evacuate(heap, old);
            slot.write(new as usize);
        }
    }

    // 5. Drain the promotion queue, evacuating every pointer slot reachable
    //    from a pinned or evacuated object. Evacuation can append new pages
    //    to the queue; re-reading `heap.queue_head()` each iteration picks
    //    those up.
    let word_size = mem::size_of::<usize>();
    while let Some(page) = heap.queue_head() {
        let mut cp = heap.page_base(page);
        while heap.page_of_addr(cp) == Some(page) && cp != heap.free_ptr() {
            // SAFETY: `cp` points at a live object header within a page
            // this heap owns, written by either `alloc` or `evacuate`.
            let hdr = unsafe { (cp as *const usize).read() };
            let ptrs = header::ptrs_of(hdr);
            let words = header::words_of(hdr);
            for slot in 0..ptrs {
                let slot_ptr = (cp + (slot + 1) * word_size) as *mut usize;
                // SAFETY: within the object's declared pointer-slot count.
                unsafe {
                    let old = slot_ptr.read() as *mut usize;
                    let new = evacuate(heap, old);
                    slot_ptr.write(new as usize);
                }
            }
            cp += words * word_size;
        }
        heap.dequeue();
    }

    // 6. Commit: everything still stamped `old_space` is garbage.
    let pages_reclaimed = heap.pages().count_with_space(old_space);
    let pages_surviving = heap.allocated_pages();
    heap.end_cycle();

    metrics::record(GcMetrics {
        duration: start.elapsed(),
        pages_reclaimed,
        pages_surviving,
        trigger,
        total_collections: 0,
    });
}
