//! Scenario 5 (spec.md §8): an allocation larger than one page spans a
//! run of pages (`OBJECT` then `CONTINUED`), and an unrooted instance is
//! fully reclaimed by the next collection.

mod support;

use mostly_gc::test_util::PageKind;
use mostly_gc::Heap;

/// Confined to its own frame so the handle doesn't linger as a stray
/// stack-resident root once the caller collects with nothing rooting it.
#[inline(never)]
fn allocate_large_object(heap: &mut Heap) -> usize {
    let handle = heap.alloc(700, 0);
    heap.page_of(handle as usize)
        .expect("large object's first page resolves")
}

#[test]
fn large_object_spans_two_pages_and_reclaims_when_unrooted() {
    let mut heap = Heap::new(8192, support::stack_base(), Vec::new());

    let first_page = allocate_large_object(&mut heap);
    let second_page = first_page + 1;

    assert_eq!(heap.page_kind(first_page), PageKind::Object);
    assert_eq!(heap.page_kind(second_page), PageKind::Continued);

    let mut junk = [0usize; 256];
    std::hint::black_box(&mut junk);
    // SAFETY: no value in r12-r15 is needed after this point in this test.
    unsafe {
        mostly_gc::test_util::clear_registers();
    }

    heap.collect();
    heap.assert_invariants();

    assert_ne!(
        heap.page_space(first_page),
        heap.current_space(),
        "an unrooted large object's first page should be reclaimed"
    );
    assert_ne!(
        heap.page_space(second_page),
        heap.current_space(),
        "an unrooted large object's continuation page should be reclaimed"
    );
}
