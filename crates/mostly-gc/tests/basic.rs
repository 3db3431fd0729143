//! Scenario 1 (spec.md §8): two small allocations with no roots land on
//! the same page and carry the header fields the bump allocator derived
//! from their requested size.

mod support;

use mostly_gc::test_util::{ptrs_of, words_of};
use mostly_gc::Heap;

#[test]
fn two_small_allocations_share_a_page_and_record_correct_header_fields() {
    let mut heap = Heap::new(5120, support::stack_base(), Vec::new());

    let a = heap.alloc(50, 2);
    let b = heap.alloc(50, 2);

    let page_a = heap.page_of(a as usize).expect("handle a resolves to a page");
    let page_b = heap.page_of(b as usize).expect("handle b resolves to a page");
    assert_eq!(page_a, page_b, "both allocations should fit on the same page");

    let word_size = std::mem::size_of::<usize>();
    let expected_words = 50usize.div_ceil(word_size) + 1;

    for handle in [a, b] {
        // SAFETY: `handle` is a live handle just returned by `alloc`.
        let header = unsafe { heap.header_word(handle) };
        assert_eq!(words_of(header), expected_words);
        assert_eq!(ptrs_of(header), 2);
    }
}

#[test]
fn allocation_zeroes_its_pointer_slots() {
    let mut heap = Heap::new(5120, support::stack_base(), Vec::new());
    let handle = heap.alloc(32, 3);

    for slot in 0..3 {
        // SAFETY: within the object's declared pointer-slot count.
        let value = unsafe { handle.add(slot).read() };
        assert_eq!(value, 0, "pointer slot {slot} should start null");
    }
}
