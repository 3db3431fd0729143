//! The heap: page-based bump allocator, page acquirer, and the `Heap`
//! context object everything else in this crate operates on (spec.md
//! §3, §4.2, §4.3, §4.7).

use std::mem;

use sys_alloc::{Mmap, MmapOptions};

use crate::collect;
use crate::error::FatalError;
use crate::header;
use crate::metrics::CollectionTrigger;
use crate::page::{PageKind, PageTable, UNALLOCATED};

/// Fixed page size in bytes (spec.md §3). Not runtime-configurable: the
/// reference implementation this is distilled from hard-codes its page
/// size, and nothing in the collector's contract depends on it varying
/// between heaps in the same process.
pub const PAGE_SIZE: usize = 512;

/// A pointer to the first data word of a live object (one word past its
/// header). `null` stands in for the absence of an object, matching the
/// original's use of a zero handle.
pub type Handle = *mut usize;

const WORD_SIZE: usize = mem::size_of::<usize>();

/// The smallest and largest space numbers a cycle can stamp a page with.
/// `0` ([`UNALLOCATED`]) is reserved so it can never collide with a live
/// generation, so space numbers wrap within `1..=MAX_SPACE` instead of
/// the full `u32` range (spec.md §7, "space number wraparound").
const MAX_SPACE: u32 = 0x7FFF;

fn next_space_number(space: u32) -> u32 {
    if space >= MAX_SPACE {
        1
    } else {
        space + 1
    }
}

/// A mostly-copying conservative heap: one mmap'd backing region, divided
/// into fixed-size pages, collected by Bartlett's algorithm (spec.md §1).
///
/// Not `Send` or `Sync`: a heap is scanned against one mutator's stack and
/// one set of global roots, all on the thread that owns it.
pub struct Heap {
    backing: Mmap,
    base: usize,
    num_pages: usize,
    words_per_page: usize,
    pages: PageTable,

    current_space: u32,
    next_space: u32,
    allocated_pages: usize,

    free_page_cursor: usize,
    free_ptr: usize,
    free_words: usize,

    queue_head: Option<usize>,
    queue_tail: Option<usize>,

    stack_base: usize,
    globals: Vec<*mut usize>,
}

impl Heap {
    /// Build a new heap of (at least) `heap_size_bytes`, rounded down to a
    /// whole number of pages.
    ///
    /// `stack_base` is the upper bound (highest address) of the mutator's
    /// stack window the conservative scanner will read up to. `globals` are
    /// the precise roots: pointers to the slots holding each global
    /// reference, not the references themselves. Every slot is zeroed here,
    /// matching the reference implementation's init-time behavior of
    /// nulling each declared root before the mutator runs.
    ///
    /// # Panics
    ///
    /// Panics if `heap_size_bytes` is smaller than one page, or if
    /// allocating the backing mapping fails.
    #[must_use]
    pub fn new(heap_size_bytes: usize, stack_base: usize, globals: Vec<*mut usize>) -> Self {
        let num_pages = heap_size_bytes / PAGE_SIZE;
        assert!(num_pages > 0, "heap must hold at least one page");

        // SAFETY: a fresh anonymous mapping with no hint; nothing else can
        // alias it.
        let backing = unsafe {
            MmapOptions::new()
                .len(num_pages * PAGE_SIZE)
                .map_anon()
                .expect("failed to map backing store for heap")
        };
        let base = backing.ptr() as usize;
        assert_eq!(
            base % PAGE_SIZE,
            0,
            "system mmap returned a region not aligned to the heap's page size"
        );

        for &slot in &globals {
            // SAFETY: caller guarantees each slot is a valid, writable
            // `*mut usize` for the heap's whole lifetime.
            unsafe {
                slot.write(0);
            }
        }

        Self {
            backing,
            base,
            num_pages,
            words_per_page: PAGE_SIZE / WORD_SIZE,
            pages: PageTable::new(num_pages),
            current_space: 1,
            next_space: 1,
            allocated_pages: 0,
            free_page_cursor: 0,
            free_ptr: 0,
            free_words: 0,
            queue_head: None,
            queue_tail: None,
            stack_base,
            globals,
        }
    }

    /// Allocate an object with `bytes` of payload and `pointers` leading
    /// pointer-sized slots (spec.md §4.2). Returns a handle to the first
    /// data word; the pointer slots (if any) are zeroed, and any
    /// non-pointer payload beyond them is left uninitialized.
    ///
    /// # Panics
    ///
    /// Panics (via [`FatalError`]) if `bytes`/`pointers` can't be encoded
    /// in a header, or if the heap has no room even after collecting.
    pub fn alloc(&mut self, bytes: usize, pointers: usize) -> Handle {
        let words = bytes.div_ceil(WORD_SIZE) + 1;
        if let Err(err) = header::make(words, pointers) {
            err.raise();
        }

        while words > self.free_words {
            self.seal_current_page();
            let pages_needed = words.div_ceil(self.words_per_page);
            self.acquire(pages_needed);
        }

        let header_addr = self.free_ptr;
        let header = header::make(words, pointers).expect("validated above");
        // SAFETY: `header_addr..header_addr + words*WORD_SIZE` was just
        // reserved by the bump allocator above and belongs to this heap.
        unsafe {
            (header_addr as *mut usize).write(header);
            for i in 1..=pointers {
                ((header_addr + i * WORD_SIZE) as *mut usize).write(0);
            }
        }
        let handle = (header_addr + WORD_SIZE) as Handle;

        if words < self.words_per_page {
            self.free_words -= words;
            self.free_ptr += words * WORD_SIZE;
        } else {
            // The object fills (or crosses) a whole page; any remaining
            // slack on its last page is not reclaimed as bump space
            // (spec.md §4.2, "Design Notes").
            self.free_words = 0;
        }
        handle
    }

    /// Run a collection cycle on demand.
    pub fn collect(&mut self) {
        collect::run(self, CollectionTrigger::Explicit);
    }

    // --- page acquirer (spec.md §4.3) --------------------------------

    fn acquire(&mut self, pages: usize) {
        if self.allocated_pages + pages >= self.num_pages / 2 {
            collect::run(self, CollectionTrigger::Acquisition);
            return;
        }

        let mut run = 0usize;
        let mut run_start = 0usize;
        let mut cursor = self.free_page_cursor;

        for _ in 0..self.num_pages {
            if self.pages.space(cursor) == UNALLOCATED
                || (self.pages.space(cursor) != self.current_space
                    && self.pages.space(cursor) != self.next_space)
            {
                if run == 0 {
                    run_start = cursor;
                }
                run += 1;
                if run == pages {
                    self.commit_run(run_start, pages);
                    self.free_page_cursor = self.next_page_index(cursor);
                    return;
                }
            } else {
                run = 0;
            }

            cursor = self.next_page_index(cursor);
            if cursor == 0 {
                // The run must not wrap across the last-page/first-page
                // seam; preserved from the reference allocator.
                run = 0;
            }
        }

        FatalError::HeapExhausted {
            requested_pages: pages,
            heap_pages: self.num_pages,
        }
        .raise();
    }

    fn commit_run(&mut self, start: usize, pages: usize) {
        self.pages.set_kind(start, PageKind::Object);
        self.pages.set_space(start, self.next_space);
        for i in 1..pages {
            let p = start + i;
            self.pages.set_kind(p, PageKind::Continued);
            self.pages.set_space(p, self.next_space);
        }

        self.free_ptr = self.page_base(start);
        self.free_words = pages * self.words_per_page;
        self.allocated_pages += pages;

        if self.current_space != self.next_space {
            self.enqueue(start);
        }
    }

    pub(crate) fn seal_current_page(&mut self) {
        if self.free_words != 0 {
            let header = header::make(self.free_words, 0)
                .expect("free_words never exceeds words_per_page, which fits in a header");
            // SAFETY: `free_ptr` is the next unused header slot on the
            // current bump page, owned by this heap.
            unsafe {
                (self.free_ptr as *mut usize).write(header);
            }
            self.free_words = 0;
        }
    }

    fn next_page_index(&self, page: usize) -> usize {
        if page + 1 == self.num_pages {
            0
        } else {
            page + 1
        }
    }

    // --- promotion queue ----------------------------------------------

    pub(crate) fn enqueue(&mut self, page: usize) {
        match self.queue_tail {
            Some(tail) => self.pages.set_link(tail, Some(page)),
            None => self.queue_head = Some(page),
        }
        self.pages.set_link(page, None);
        self.queue_tail = Some(page);
    }

    pub(crate) fn queue_head(&self) -> Option<usize> {
        self.queue_head
    }

    pub(crate) fn dequeue(&mut self) {
        self.queue_head = self.queue_head.and_then(|p| self.pages.link(p));
        if self.queue_head.is_none() {
            self.queue_tail = None;
        }
    }

    // --- collection bookkeeping, used by `collect::run` ----------------

    pub(crate) fn begin_cycle(&mut self) {
        self.next_space = next_space_number(self.current_space);
        self.allocated_pages = 0;
        self.queue_head = None;
        self.queue_tail = None;
    }

    pub(crate) fn end_cycle(&mut self) {
        self.current_space = self.next_space;
    }

    // --- address/page conversions ---------------------------------------

    pub(crate) fn page_of_addr(&self, addr: usize) -> Option<usize> {
        if addr < self.base {
            return None;
        }
        let offset = addr - self.base;
        let page = offset / PAGE_SIZE;
        if page >= self.num_pages {
            return None;
        }
        Some(page)
    }

    pub(crate) fn page_base(&self, page: usize) -> usize {
        self.base + page * PAGE_SIZE
    }

    // --- accessors used by scan/collect/evacuate and tests ---------------

    pub(crate) fn pages(&self) -> &PageTable {
        &self.pages
    }

    pub(crate) fn pages_mut(&mut self) -> &mut PageTable {
        &mut self.pages
    }

    pub(crate) fn globals(&self) -> &[*mut usize] {
        &self.globals
    }

    pub(crate) fn stack_base(&self) -> usize {
        self.stack_base
    }

    pub(crate) fn bump_allocated_pages(&mut self, n: usize) {
        self.allocated_pages += n;
    }

    pub(crate) fn free_ptr(&self) -> usize {
        self.free_ptr
    }

    /// Space number stamped on pages belonging to the half currently being
    /// allocated from / scanned as live.
    #[must_use]
    pub fn current_space(&self) -> u32 {
        self.current_space
    }

    /// Space number reserved for the half a cycle evacuates into. Equal to
    /// `current_space` outside of an active collection.
    #[must_use]
    pub fn next_space(&self) -> u32 {
        self.next_space
    }

    /// Total number of fixed-size pages backing this heap.
    #[must_use]
    pub fn num_pages(&self) -> usize {
        self.num_pages
    }

    /// Number of pages stamped into the current cycle's destination space
    /// so far (promoted + evacuated).
    #[must_use]
    pub fn allocated_pages(&self) -> usize {
        self.allocated_pages
    }

    /// The fixed page size in bytes.
    #[must_use]
    pub const fn page_size() -> usize {
        PAGE_SIZE
    }
}

#[cfg(any(test, feature = "test-util"))]
impl Heap {
    /// Page index containing `addr`, or `None` if `addr` falls outside
    /// this heap's backing region. Test-only: production code never
    /// needs to resolve an arbitrary address to a page index from
    /// outside the collector.
    #[must_use]
    pub fn page_of(&self, addr: usize) -> Option<usize> {
        self.page_of_addr(addr)
    }

    /// `OBJECT`/`CONTINUED` marker for `page`. Test-only introspection.
    #[must_use]
    pub fn page_kind(&self, page: usize) -> PageKind {
        self.pages.kind(page)
    }

    /// Space number currently stamped on `page`. Test-only introspection.
    #[must_use]
    pub fn page_space(&self, page: usize) -> u32 {
        self.pages.space(page)
    }

    /// Read the raw header word just before `handle`.
    ///
    /// # Safety
    ///
    /// `handle` must be a live handle this heap produced.
    #[must_use]
    pub unsafe fn header_word(&self, handle: Handle) -> usize {
        // SAFETY: forwarded to the caller's obligation above.
        unsafe { handle.cast::<usize>().sub(1).read() }
    }

    /// Check the structural invariants spec.md §7 lists, panicking with a
    /// description of the first violation found. Intended for tests, not
    /// the hot allocation/collection path.
    pub fn assert_invariants(&self) {
        assert!(
            self.current_space == self.next_space,
            "invariant violated: a collection is in progress (current_space {} != next_space {})",
            self.current_space,
            self.next_space
        );
        assert!(
            self.allocated_pages <= self.num_pages,
            "invariant violated: allocated_pages {} exceeds heap capacity {}",
            self.allocated_pages,
            self.num_pages
        );
        assert!(
            self.allocated_pages < self.num_pages.div_ceil(2) || self.num_pages == 1,
            "invariant violated: allocated_pages {} reaches or exceeds half the heap ({} pages)",
            self.allocated_pages,
            self.num_pages
        );

        for page in 0..self.num_pages {
            if self.pages.kind(page) == PageKind::Continued {
                assert!(
                    page > 0,
                    "invariant violated: page 0 cannot be a continuation page"
                );
            }
            let space = self.pages.space(page);
            assert!(
                space == UNALLOCATED || space == self.current_space,
                "invariant violated: page {page} carries stale space {space} outside an active cycle"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_heap(bytes: usize) -> Heap {
        Heap::new(bytes, crate::stack::os_stack_base(), Vec::new())
    }

    #[test]
    fn fresh_heap_has_equal_current_and_next_space() {
        let heap = test_heap(4096);
        assert_eq!(heap.current_space(), heap.next_space());
        assert_eq!(heap.allocated_pages(), 0);
    }

    #[test]
    fn alloc_advances_the_bump_pointer_within_a_page() {
        let mut heap = test_heap(4096);
        let a = heap.alloc(16, 0);
        let b = heap.alloc(16, 0);
        assert_eq!(heap.page_of_addr(a as usize), heap.page_of_addr(b as usize));
        assert!((b as usize) > (a as usize));
    }

    #[test]
    fn large_allocation_spans_multiple_pages() {
        let mut heap = test_heap(8192);
        let words_per_page = PAGE_SIZE / WORD_SIZE;
        let handle = heap.alloc((words_per_page + 4) * WORD_SIZE, 0);
        let page = heap.page_of_addr(handle as usize).unwrap();
        assert_eq!(heap.pages.kind(page), PageKind::Object);
        assert_eq!(heap.pages.kind(page + 1), PageKind::Continued);
    }

    #[test]
    #[should_panic(expected = "object too large to encode")]
    fn allocation_exceeding_header_capacity_is_fatal() {
        let mut heap = test_heap(4096);
        heap.alloc((header::MAX_WORDS + 1) * WORD_SIZE, 0);
    }

    #[test]
    fn acquiring_past_half_the_heap_triggers_an_implicit_collection() {
        let mut heap = test_heap(4096);
        let num_pages = heap.num_pages();
        for _ in 0..(num_pages * 2) {
            let _ = heap.alloc(16, 0);
        }
        heap.assert_invariants();
    }

    #[test]
    fn explicit_collect_on_a_quiescent_heap_does_not_panic() {
        let mut heap = test_heap(4096);
        let _ = heap.alloc(16, 0);
        heap.collect();
        heap.assert_invariants();
    }

    #[test]
    #[should_panic(expected = "recursive collect")]
    fn recursive_collect_is_fatal() {
        let mut heap = test_heap(4096);
        heap.next_space = next_space_number(heap.current_space);
        heap.collect();
    }
}
