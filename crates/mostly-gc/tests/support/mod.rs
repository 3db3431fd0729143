//! Shared helpers for the scenario tests in spec.md §8.
//!
//! Not a test target itself (`tests/support/mod.rs`, not `tests/support.rs`):
//! cargo only treats files directly under `tests/` as independent test
//! binaries, so a `mod support;` import here is free.

/// An upper bound for the conservative stack scanner's window, suitable
/// for passing as `stack_base` to `Heap::new` from a `#[test]` function.
#[must_use]
pub fn stack_base() -> usize {
    mostly_gc::current_thread_stack_base()
}
