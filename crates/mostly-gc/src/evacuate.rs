//! The evacuator (spec.md §4.5): copies one object out of the half being
//! vacated and leaves a forwarding pointer behind, or returns the object
//! unchanged if it was already pinned in place or already moved.

use std::mem;
use std::ptr;

use crate::header;
use crate::heap::{Handle, Heap};

/// Evacuate (or recognize as already-handled) the object `handle` points
/// at, returning the handle to use in its place.
///
/// Safe to call with a value that merely looks like a pointer: anything
/// that doesn't land on a page this heap owns is returned unchanged.
///
/// # Safety
///
/// If `handle` does land inside this heap, it must point one word past a
/// valid, currently-live object header (i.e. it must be a real handle this
/// heap produced, not a coincidental tentative value — globals are precise
/// roots, unlike the conservative stack scan).
pub(crate) unsafe fn evacuate(heap: &mut Heap, handle: Handle) -> Handle {
    if handle.is_null() {
        return handle;
    }
    let word_size = mem::size_of::<usize>();
    let Some(page) = heap.page_of_addr(handle as usize) else {
        return handle;
    };

    // Pages already promoted by the conservative scan are, by definition,
    // already in next_space: nothing to copy.
    if heap.pages().space(page) == heap.next_space() {
        return handle;
    }

    let header_ptr = handle.cast::<usize>().wrapping_sub(1);
    // SAFETY: caller guarantees `handle` is a real, live handle.
    let header = unsafe { header_ptr.read() };
    if header::is_forwarded(header) {
        return header as Handle;
    }

    let words = header::words_of(header);
    let bytes = (words - 1) * word_size;
    let new_handle = heap.alloc(bytes, 0);
    let new_header_ptr = new_handle.cast::<usize>().wrapping_sub(1);

    // SAFETY: both ranges are `words` long, non-overlapping (the new object
    // was just allocated into a fresh region), and the new header written by
    // `alloc` is immediately overwritten by this copy, including the
    // original's real pointer count.
    unsafe {
        ptr::copy_nonoverlapping(header_ptr, new_header_ptr, words);
        header_ptr.write(new_handle as usize);
    }

    new_handle
}
