//! # Validity Bitmap Helpers
//!
//! The engine tracks NULLs per vector with a bit-packed array of `u64` words:
//! bit `row % 64` of word `row / 64` is `1` when the row is present. A vector
//! with no validity words at all has every row present, so the array is only
//! materialized the first time a row is cleared.
//!
//! ```text
//! word 0                                word 1
//! +-----------------------------------+ +-------------------
//! | b63 ... b2 b1 b0                  | | b63 ... b0
//! +-----------------------------------+ +-------------------
//!   row 63    row 2 row 1 row 0           row 127   row 64
//! ```
//!
//! These functions operate on the raw word slice so the codecs can address
//! native memory directly. A `RowFilter` is an optional word slice used to
//! restrict a read to rows whose parent is present; `None` means all rows.

use crate::config::VALIDITY_ENTRY_BITS;

/// Optional parent validity used to skip rows whose parent is NULL.
pub type RowFilter<'a> = Option<&'a [u64]>;

/// Number of validity words needed to cover `rows` rows.
#[inline]
pub fn entry_count(rows: usize) -> usize {
    rows.div_ceil(VALIDITY_ENTRY_BITS)
}

/// Allocates a validity array with every row present.
pub fn all_valid(rows: usize) -> Vec<u64> {
    vec![u64::MAX; entry_count(rows)]
}

#[inline]
pub fn is_valid(words: &[u64], row: usize) -> bool {
    let word = row / VALIDITY_ENTRY_BITS;
    let bit = row % VALIDITY_ENTRY_BITS;
    words[word] & (1u64 << bit) != 0
}

/// Same as [`is_valid`] but treats a missing array as all-valid.
#[inline]
pub fn row_is_valid(words: Option<&[u64]>, row: usize) -> bool {
    words.is_none_or(|words| is_valid(words, row))
}

#[inline]
pub fn set_invalid(words: &mut [u64], row: usize) {
    let word = row / VALIDITY_ENTRY_BITS;
    let bit = row % VALIDITY_ENTRY_BITS;
    words[word] &= !(1u64 << bit);
}

#[inline]
pub fn set_valid(words: &mut [u64], row: usize) {
    let word = row / VALIDITY_ENTRY_BITS;
    let bit = row % VALIDITY_ENTRY_BITS;
    words[word] |= 1u64 << bit;
}

/// Intersects a parent filter with a vector's own validity for `rows` rows.
pub fn combine(filter: RowFilter<'_>, own: Option<&[u64]>, rows: usize) -> Vec<u64> {
    let count = entry_count(rows);
    let mut out = vec![u64::MAX; count];
    if let Some(filter) = filter {
        for (dst, src) in out.iter_mut().zip(filter.iter()) {
            *dst &= *src;
        }
    }
    if let Some(own) = own {
        for (dst, src) in out.iter_mut().zip(own.iter()) {
            *dst &= *src;
        }
    }
    out
}

/// Widens a per-row filter to a per-element filter where every row owns
/// `stride` consecutive elements (fixed-size arrays).
pub fn expand(words: &[u64], rows: usize, stride: usize) -> Vec<u64> {
    let mut out = all_valid(rows * stride);
    for row in 0..rows {
        if !is_valid(words, row) {
            for element in row * stride..(row + 1) * stride {
                set_invalid(&mut out, element);
            }
        }
    }
    out
}

/// Counts present rows among the first `rows` rows.
pub fn count_valid(words: Option<&[u64]>, rows: usize) -> usize {
    (0..rows).filter(|&row| row_is_valid(words, row)).count()
}
