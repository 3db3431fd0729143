//! Conservative root scanning (spec.md §4.4).
//!
//! Treats every word in the mutator's stack window and every spilled
//! register as a *tentative* pointer: if it happens to land inside a
//! live, not-yet-promoted page, that page is pinned in place for this
//! cycle rather than copied. False positives (an integer that looks
//! like a pointer) just waste a page; false negatives would be unsound,
//! so nothing here tries to prove a candidate is a real pointer beyond
//! the cheap checks `promote` performs.
//!
//! Declared globals are deliberately excluded from this pass (spec.md
//! §5 ordering guarantee #3): they are precise roots, moved only by the
//! `evacuate()` call in `collect::run`'s global-root step. Promoting
//! them here first would pin their page in `next_space` before that
//! step runs, making `evacuate` see an already-current-space page and
//! return the handle unchanged — globals would then never actually
//! relocate, only ever be pinned.

use crate::heap::Heap;
use crate::page::PageKind;
use crate::stack;

/// Walk the stack window (from spilled registers down to the heap's
/// recorded `stack_base`), promoting whatever pages the values appear to
/// reference. Globals are handled separately, by evacuation, not here.
pub(crate) fn scan_conservative_roots(heap: &mut Heap) {
    let stack_base = heap.stack_base();
    unsafe {
        stack::spill_registers_and_scan(stack_base, |word| {
            promote(heap, word);
        });
    }
}

/// Pin the page a tentative pointer value lands on, if it is a live,
/// unpromoted page this cycle. Walks backward through continuation pages
/// to reach (and promote) the whole multi-page object.
pub(crate) fn promote(heap: &mut Heap, word: usize) {
    let Some(page) = heap.page_of_addr(word) else {
        return;
    };
    if heap.pages().space(page) != heap.current_space() {
        return;
    }

    let mut p = page;
    while heap.pages().kind(p) == PageKind::Continued {
        heap.pages_mut().set_space(p, heap.next_space());
        heap.bump_allocated_pages(1);
        p -= 1;
    }
    heap.pages_mut().set_space(p, heap.next_space());
    heap.bump_allocated_pages(1);
    heap.enqueue(p);
}
