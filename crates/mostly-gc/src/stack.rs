//! Conservative stack and register scanning.
//!
//! Adapted from the teacher's `stack.rs`, with one deliberate change: the
//! teacher re-queries the OS for the current thread's stack bounds on every
//! scan (`pthread_attr_getstack`). This collector instead scans up to the
//! `stack_base` address the client declared at `init` (spec.md §4.7), since
//! that is the contract spec.md's root scanner is specified against — the
//! collector has no business assuming it owns the whole OS-reported stack
//! when the client may only want a sub-window scanned.

/// Query the current thread's OS-allocated stack bounds, for callers of
/// [`crate::Heap::new`] that want a `stack_base` covering everything
/// this thread has ever pushed, rather than hand-measuring one at a
/// particular call site. Adapted from the teacher's `get_stack_bounds`
/// (same `pthread_getattr_np`/`pthread_attr_getstack` pair); unlike the
/// teacher, this collector does not call it internally on every scan —
/// the client declares `stack_base` once at `Heap::new` (spec.md §4.7)
/// and the collector trusts it thereafter.
#[cfg(all(target_os = "linux", not(miri)))]
pub(crate) fn os_stack_base() -> usize {
    use libc::{pthread_attr_destroy, pthread_attr_getstack, pthread_attr_t, pthread_getattr_np, pthread_self};

    // SAFETY: standard pthread introspection of the calling thread's own
    // attributes; `attr` is destroyed on every exit path below.
    unsafe {
        let mut attr: pthread_attr_t = std::mem::zeroed();
        let ret = pthread_getattr_np(pthread_self(), &raw mut attr);
        assert!(ret == 0, "pthread_getattr_np failed");

        let mut stackaddr: *mut libc::c_void = std::ptr::null_mut();
        let mut stacksize: libc::size_t = 0;
        let ret = pthread_attr_getstack(&raw const attr, &raw mut stackaddr, &raw mut stacksize);
        if ret != 0 {
            pthread_attr_destroy(&raw mut attr);
            panic!("pthread_attr_getstack failed");
        }
        pthread_attr_destroy(&raw mut attr);

        (stackaddr as usize) + stacksize
    }
}

/// Miri has no inline-asm register spilling and no pthread introspection
/// support; returning `0` makes the scan window empty rather than wrong,
/// matching the teacher's "no scanning under Miri" stance.
#[cfg(miri)]
pub(crate) fn os_stack_base() -> usize {
    0
}

#[cfg(all(not(target_os = "linux"), not(miri)))]
pub(crate) fn os_stack_base() -> usize {
    unimplemented!("OS stack bounds query is only implemented for Linux")
}

/// Spill callee-saved registers to the stack, then invoke `scan_fn` once per
/// word from the current stack pointer up to (but not including) a
/// `stack_base` address.
///
/// `stack_base` is the *upper* bound of the scan window (the stack grows
/// down, so this is the higher address). Every register that might hold a
/// live pointer is reflected in memory at or below the scan start address
/// before scanning begins, per spec.md §4.4's register-coverage
/// requirement.
///
/// # Safety
///
/// `stack_base` must be a valid address at or above the current stack
/// pointer, reachable by reading consecutive `usize`s from the stack.
#[inline(never)]
pub unsafe fn spill_registers_and_scan<F>(stack_base: usize, mut scan_fn: F)
where
    F: FnMut(usize),
{
    #[cfg(all(target_arch = "x86_64", not(miri)))]
    let mut regs = [0usize; 6];
    #[cfg(all(target_arch = "x86_64", not(miri)))]
    unsafe {
        std::arch::asm!(
            "mov {0}, rbx",
            "mov {1}, rbp",
            "mov {2}, r12",
            "mov {3}, r13",
            "mov {4}, r14",
            "mov {5}, r15",
            out(reg) regs[0],
            out(reg) regs[1],
            out(reg) regs[2],
            out(reg) regs[3],
            out(reg) regs[4],
            out(reg) regs[5],
        );
    }
    #[cfg(all(target_arch = "x86_64", not(miri)))]
    std::hint::black_box(&regs);

    #[cfg(any(not(target_arch = "x86_64"), miri))]
    let regs = [0usize; 32];
    #[cfg(any(not(target_arch = "x86_64"), miri))]
    std::hint::black_box(&regs);

    // The current stack pointer is approximately the address of a local.
    let sp = std::ptr::addr_of!(scan_fn) as usize;
    let align = std::mem::align_of::<usize>();
    let mut current = sp & !(align - 1);

    while current < stack_base {
        // SAFETY: caller guarantees `[sp, stack_base)` is valid, readable
        // stack memory for the current thread.
        let word = unsafe { std::ptr::read_volatile(current as *const usize) };
        scan_fn(word);
        current += std::mem::size_of::<usize>();
    }
}

/// Clear callee-saved registers that might otherwise retain a stale pointer
/// value across a function return. Test-only: lets a test assert that an
/// object is collected even when a dead value lingers in a register rather
/// than on the stack.
///
/// # Safety
///
/// Must only be called when the clobbered registers hold no value the
/// caller still needs (x86-64: r12-r15).
#[cfg(any(test, feature = "test-util"))]
pub unsafe fn clear_registers() {
    #[cfg(all(target_arch = "x86_64", not(miri)))]
    unsafe {
        std::arch::asm!(
            "xor r12, r12",
            "xor r13, r13",
            "xor r14, r14",
            "xor r15, r15",
            out("r12") _,
            out("r13") _,
            out("r14") _,
            out("r15") _,
        );
    }
}
