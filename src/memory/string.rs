//! # Compact String Representation
//!
//! `StringRef` mirrors the engine's 16-byte `string_t` so it can be written
//! straight into a `VARCHAR`/`BLOB` vector slot.
//!
//! ## Layout
//!
//! ```text
//! Inlined (length <= 12):
//! +-----------+--------------------------------------------+
//! | length u32| bytes[0..12] (zero padded)                  |
//! +-----------+--------------------------------------------+
//!
//! Out of line (length > 12):
//! +-----------+----------------+---------------------------+
//! | length u32| prefix[0..4]   | pointer (u64, native)      |
//! +-----------+----------------+---------------------------+
//! ```
//!
//! The pointer half is stored as raw bytes so the struct stays plain old data
//! and can be viewed through zerocopy. On write the pointer targets [`Arena`]
//! memory; on read it targets memory owned by the engine (or by the vector's
//! string heap). Neither side is tracked by the type system: the owner must
//! stay alive until the vector holding the `StringRef` has been consumed.
//!
//! [`Arena`]: crate::memory::Arena

use eyre::{ensure, Result};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::config::{STRING_INLINE_LENGTH, STRING_PREFIX_LENGTH, STRING_REF_SIZE};
use crate::memory::Arena;

#[repr(C)]
#[derive(Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct StringRef {
    length: u32,
    prefix: [u8; STRING_PREFIX_LENGTH],
    tail: [u8; 8],
}

const _: () = assert!(std::mem::size_of::<StringRef>() == STRING_REF_SIZE);

impl StringRef {
    pub const EMPTY: StringRef = StringRef {
        length: 0,
        prefix: [0; STRING_PREFIX_LENGTH],
        tail: [0; 8],
    };

    /// Builds an inlined string. Fails for inputs longer than 12 bytes.
    pub fn inlined(bytes: &[u8]) -> Result<Self> {
        ensure!(
            bytes.len() <= STRING_INLINE_LENGTH,
            "{} bytes cannot be inlined (limit {})",
            bytes.len(),
            STRING_INLINE_LENGTH
        );
        let mut payload = [0u8; STRING_INLINE_LENGTH];
        payload[..bytes.len()].copy_from_slice(bytes);

        let mut prefix = [0u8; STRING_PREFIX_LENGTH];
        prefix.copy_from_slice(&payload[..STRING_PREFIX_LENGTH]);
        let mut tail = [0u8; 8];
        tail.copy_from_slice(&payload[STRING_PREFIX_LENGTH..]);

        Ok(Self {
            length: bytes.len() as u32,
            prefix,
            tail,
        })
    }

    /// Builds a string header pointing at `len` bytes starting at `data`.
    ///
    /// # Safety
    ///
    /// `data` must be valid for reads of `len` bytes for as long as the
    /// returned value (or any copy of it) is read through [`StringRef::as_bytes`].
    pub unsafe fn from_raw_parts(data: *const u8, len: usize) -> Result<Self> {
        if len <= STRING_INLINE_LENGTH {
            return Self::inlined(std::slice::from_raw_parts(data, len));
        }
        ensure!(len <= u32::MAX as usize, "string of {} bytes is too long", len);

        let mut prefix = [0u8; STRING_PREFIX_LENGTH];
        prefix.copy_from_slice(std::slice::from_raw_parts(data, STRING_PREFIX_LENGTH));

        Ok(Self {
            length: len as u32,
            prefix,
            tail: (data as usize as u64).to_ne_bytes(),
        })
    }

    /// Encodes `bytes`, copying them into `arena` when they do not fit inline.
    pub fn encode(bytes: &[u8], arena: &mut Arena) -> Result<Self> {
        if bytes.len() <= STRING_INLINE_LENGTH {
            return Self::inlined(bytes);
        }
        let data = arena.allocate_copy(bytes)?;
        // SAFETY: the arena owns `bytes.len()` bytes at `data` until it is
        // reset or dropped.
        unsafe { Self::from_raw_parts(data, bytes.len()) }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.length as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    #[inline]
    pub fn is_inlined(&self) -> bool {
        self.len() <= STRING_INLINE_LENGTH
    }

    /// First (up to) four bytes, available without following the pointer.
    pub fn prefix(&self) -> &[u8] {
        &self.prefix[..self.len().min(STRING_PREFIX_LENGTH)]
    }

    fn pointer(&self) -> *const u8 {
        u64::from_ne_bytes(self.tail) as usize as *const u8
    }

    /// Returns the string's bytes.
    ///
    /// # Safety
    ///
    /// For out-of-line strings the pointer must still reference live memory
    /// of at least `len()` bytes (the arena or engine buffer it was created
    /// from has not been reset or freed).
    pub unsafe fn as_bytes(&self) -> &[u8] {
        if self.is_inlined() {
            &self.as_inline_payload()[..self.len()]
        } else {
            std::slice::from_raw_parts(self.pointer(), self.len())
        }
    }

    fn as_inline_payload(&self) -> &[u8] {
        // prefix and tail are adjacent in the repr(C) layout
        &self.as_bytes_raw()[4..STRING_REF_SIZE]
    }

    fn as_bytes_raw(&self) -> &[u8] {
        IntoBytes::as_bytes(self)
    }
}

impl Default for StringRef {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl std::fmt::Debug for StringRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("StringRef");
        s.field("len", &self.len());
        if self.is_inlined() {
            s.field("inline", &String::from_utf8_lossy(&self.as_inline_payload()[..self.len()]));
        } else {
            s.field("prefix", &String::from_utf8_lossy(self.prefix()));
            s.field("ptr", &self.pointer());
        }
        s.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_ref_is_sixteen_bytes() {
        assert_eq!(std::mem::size_of::<StringRef>(), 16);
    }

    #[test]
    fn twelve_bytes_stay_inline_without_arena_allocation() {
        let mut arena = Arena::new();
        let s = StringRef::encode(b"hello world!", &mut arena).unwrap();

        assert!(s.is_inlined());
        assert_eq!(s.len(), 12);
        assert_eq!(unsafe { s.as_bytes() }, b"hello world!");
        assert_eq!(arena.allocated_bytes(), 0);
        assert_eq!(arena.chunk_count(), 0);
    }

    #[test]
    fn thirteen_bytes_allocate_exactly_thirteen() {
        let mut arena = Arena::new();
        let s = StringRef::encode(b"hello, world!", &mut arena).unwrap();

        assert!(!s.is_inlined());
        assert_eq!(s.prefix(), b"hell");
        assert_eq!(unsafe { s.as_bytes() }, b"hello, world!");
        assert_eq!(arena.allocated_bytes(), 13);
    }

    #[test]
    fn inline_layout_matches_engine() {
        let s = StringRef::inlined(b"abc").unwrap();
        let raw = s.as_bytes_raw();

        assert_eq!(&raw[0..4], &3u32.to_ne_bytes());
        assert_eq!(&raw[4..7], b"abc");
        assert!(raw[7..].iter().all(|&b| b == 0));
    }

    #[test]
    fn pointer_layout_matches_engine() {
        let data = b"a string that is long".to_vec();
        let s = unsafe { StringRef::from_raw_parts(data.as_ptr(), data.len()).unwrap() };
        let raw = s.as_bytes_raw();

        assert_eq!(&raw[0..4], &(data.len() as u32).to_ne_bytes());
        assert_eq!(&raw[4..8], b"a st");
        assert_eq!(&raw[8..16], &(data.as_ptr() as usize as u64).to_ne_bytes());
    }

    #[test]
    fn empty_string_is_inline() {
        let s = StringRef::default();
        assert!(s.is_empty());
        assert!(s.is_inlined());
        assert_eq!(unsafe { s.as_bytes() }, b"");
    }

    #[test]
    fn inlined_rejects_long_input() {
        assert!(StringRef::inlined(&[0u8; 13]).is_err());
    }
}
