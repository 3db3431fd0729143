//! Scenario 3 (spec.md §8): a global root's payload survives a
//! collection cycle, whether the object is pinned in place by a
//! lingering stack alias or evacuated by the global-root pass.

mod support;

use mostly_gc::Heap;

const MAGIC: u8 = 0xAB;

#[test]
fn global_root_payload_survives_a_collection() {
    let mut g: *mut usize = std::ptr::null_mut();
    let mut heap = Heap::new(
        8192,
        support::stack_base(),
        vec![std::ptr::addr_of_mut!(g).cast::<usize>()],
    );

    let handle = heap.alloc(16, 0);
    g = handle;
    // SAFETY: `handle` is a freshly allocated 16-byte payload.
    unsafe {
        (handle.cast::<u8>()).write_bytes(MAGIC, 16);
    }

    heap.collect();
    heap.assert_invariants();

    assert!(!g.is_null());
    // SAFETY: `g` is the (possibly relocated) handle the collector wrote
    // back through the declared global root.
    unsafe {
        for i in 0..16 {
            assert_eq!(g.cast::<u8>().add(i).read(), MAGIC);
        }
    }
}
