//! Object header codec.
//!
//! Every heap object is prefixed by one word-sized header. Bit 0 is the
//! forwarding tag: `1` means the word encodes `(word count, pointer count)`
//! for a live object; `0` means the *entire* word is a forwarding pointer to
//! the evacuated copy (safe because every handle is word-aligned, so its
//! low bit is always clear).
//!
//! The live encoding packs 16 bits of word count above the tag and 15 bits
//! of pointer count above that, matching Bartlett's original 32-bit header
//! word exactly. A forwarding pointer doesn't share those fields — it
//! overwrites the whole word — so this layout needs no widening to carry a
//! 64-bit address; only the live-object field widths are bounded.

use crate::error::FatalError;

/// Largest word count (including the header) a single header can encode.
pub const MAX_WORDS: usize = 0xFFFF;
/// Largest pointer-slot count a single header can encode.
pub const MAX_PTRS: usize = 0x7FFF;

const WORDS_SHIFT: u32 = 1;
const WORDS_MASK: usize = 0xFFFF;
const PTRS_SHIFT: u32 = 17;
const PTRS_MASK: usize = 0x7FFF;

/// Pack a live header word.
///
/// # Errors
///
/// Returns [`FatalError::HeaderOverflow`] if `words` or `ptrs` exceed the
/// encoding's field widths. The caller is expected to treat this as fatal.
pub fn make(words: usize, ptrs: usize) -> Result<usize, FatalError> {
    if words > MAX_WORDS || ptrs > MAX_PTRS {
        return Err(FatalError::HeaderOverflow {
            words,
            pointers: ptrs,
        });
    }
    Ok((ptrs << PTRS_SHIFT) | (words << WORDS_SHIFT) | 1)
}

/// True iff `header` has been replaced by a forwarding pointer.
#[must_use]
pub const fn is_forwarded(header: usize) -> bool {
    header & 1 == 0
}

/// Total word count encoded in a live header, including the header word
/// itself.
#[must_use]
pub const fn words_of(header: usize) -> usize {
    (header >> WORDS_SHIFT) & WORDS_MASK
}

/// Number of leading pointer slots encoded in a live header.
#[must_use]
pub const fn ptrs_of(header: usize) -> usize {
    (header >> PTRS_SHIFT) & PTRS_MASK
}
