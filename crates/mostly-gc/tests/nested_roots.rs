//! Scenario 4 (spec.md §8): an object reachable only through a pointer
//! slot of a rooted object survives collection, and the slot still
//! points into the live set afterward.

mod support;

use mostly_gc::Heap;

#[test]
fn object_reached_through_a_global_roots_pointer_slot_survives() {
    let mut g: *mut usize = std::ptr::null_mut();
    let mut heap = Heap::new(
        8192,
        support::stack_base(),
        vec![std::ptr::addr_of_mut!(g).cast::<usize>()],
    );

    let outer = heap.alloc(16, 1);
    g = outer;
    let inner = heap.alloc(16, 0);
    // SAFETY: `outer` was allocated with one leading pointer slot.
    unsafe {
        outer.write(inner as usize);
    }

    heap.collect();
    heap.assert_invariants();

    assert!(!g.is_null());
    // SAFETY: `g` is the (possibly relocated) outer handle; its slot 0
    // was fixed up to the (possibly relocated) inner handle during the
    // promotion-queue drain.
    let inner_now = unsafe { g.read() } as *mut usize;
    assert!(!inner_now.is_null());

    let page = heap
        .page_of(inner_now as usize)
        .expect("inner handle should resolve to a page in this heap");
    assert_eq!(
        heap.page_space(page),
        heap.current_space(),
        "the pointee reached only via the outer object's slot must be in the live set"
    );
}
