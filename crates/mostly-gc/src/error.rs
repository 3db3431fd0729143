//! Fatal error classification.
//!
//! Every error this collector can encounter is, by design, unrecoverable
//! (spec: a corrupted or exhausted heap has no safe continuation). This
//! module exists only to format a precise diagnostic before the caller
//! panics; it is not a `Result`-returning public error type.

use std::fmt;

/// A condition that ends the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatalError {
    /// No run of `requested_pages` consecutive free pages exists anywhere
    /// in the heap, even after a collection.
    HeapExhausted {
        /// Number of contiguous pages the caller needed.
        requested_pages: usize,
        /// Total number of pages in the heap.
        heap_pages: usize,
    },
    /// `collect` was entered while a collection was already in progress
    /// (`current_space != next_space`).
    RecursiveCollection,
    /// An object's word count or pointer count exceeds what the header
    /// encoding can represent.
    HeaderOverflow {
        /// Requested word count (including the header word).
        words: usize,
        /// Requested pointer-slot count.
        pointers: usize,
    },
}

impl fmt::Display for FatalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::HeapExhausted {
                requested_pages,
                heap_pages,
            } => write!(
                f,
                "gcalloc - unable to allocate {requested_pages} pages in a {heap_pages} page heap"
            ),
            Self::RecursiveCollection => {
                write!(f, "gcalloc - recursive collect: collector is already running")
            }
            Self::HeaderOverflow { words, pointers } => write!(
                f,
                "gcalloc - object too large to encode: {words} words (max {}), {pointers} pointers (max {})",
                crate::header::MAX_WORDS,
                crate::header::MAX_PTRS
            ),
        }
    }
}

impl std::error::Error for FatalError {}

impl FatalError {
    /// Format and abort the process. Matches the teacher's convention of a
    /// single `panic!("{err}")` at the point a fatal condition is classified.
    pub fn raise(self) -> ! {
        panic!("{self}");
    }
}
