//! Scenario 6 (spec.md §8): a self-referential object collects without
//! infinite recursion, and the cycle resolves to the (possibly
//! relocated) object itself.

mod support;

use mostly_gc::Heap;

#[test]
fn self_referential_object_resolves_its_own_cycle() {
    let mut g: *mut usize = std::ptr::null_mut();
    let mut heap = Heap::new(
        4096,
        support::stack_base(),
        vec![std::ptr::addr_of_mut!(g).cast::<usize>()],
    );

    let handle = heap.alloc(20, 1);
    g = handle;
    // SAFETY: `handle` was allocated with one leading pointer slot.
    unsafe {
        handle.write(handle as usize);
    }

    heap.collect();
    heap.assert_invariants();

    assert!(!g.is_null());
    // SAFETY: `g` is the (possibly relocated) handle; slot 0 should have
    // been fixed up to point at the same surviving copy.
    let slot0 = unsafe { g.read() } as *mut usize;
    assert_eq!(slot0, g, "forwarding resolves the self-cycle without recursing forever");
}
