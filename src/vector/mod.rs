//! # Columnar Vectors and Data Chunks
//!
//! In-memory rendition of the engine's vector interface. Codecs only touch
//! the operations listed here, which are the same ones the native C API
//! exposes:
//!
//! | Operation | Method |
//! |-----------|--------|
//! | typed view of the data buffer | [`Vector::data`], [`Vector::data_mut`] |
//! | read / ensure-writable validity | [`Vector::validity`], [`Vector::validity_mut`] |
//! | struct, list and array children | [`Vector::child`], [`Vector::list_child`], [`Vector::array_child`] |
//! | list child reserve and size | [`Vector::list_reserve`], [`Vector::set_list_size`] |
//! | chunk row count | [`DataChunk::size`], [`DataChunk::set_size`] |
//! | next chunk of a result | [`ResultSource::next_chunk`] |
//!
//! ## Memory Layout
//!
//! ```text
//! Vector (capacity = 2048)
//! ├── data:     [u128; ceil(capacity * width / 16)]  16-byte aligned slots
//! ├── validity: None | [u64; capacity / 64]           bit = 1 => present
//! ├── children: struct fields | list child | array child (capacity * N)
//! └── heap:     engine-owned copies of long strings
//! ```
//!
//! List vectors store a [`ListEntry`] per row; the entries index into the
//! single list child, whose logical size is tracked separately from its
//! capacity.

mod chunk;
mod column;
mod logical_type;
mod source;

pub use chunk::DataChunk;
pub use column::{ValidityMut, Vector};
pub use logical_type::LogicalType;
pub use source::{ChunkCollection, ChunkSink, ResultSource};

use eyre::{eyre, Result};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::error::MappingError;

/// A value that can be viewed in place inside a vector's data buffer.
pub trait NativeValue:
    FromBytes + IntoBytes + KnownLayout + Immutable + Copy + Send + Sync + 'static
{
}

impl<T> NativeValue for T where
    T: FromBytes + IntoBytes + KnownLayout + Immutable + Copy + Send + Sync + 'static
{
}

/// Row slot of a list vector: the row's elements are
/// `child[offset..offset + length]`.
#[repr(C)]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, FromBytes, IntoBytes, KnownLayout, Immutable,
)]
pub struct ListEntry {
    pub offset: u64,
    pub length: u64,
}

impl ListEntry {
    pub fn new(offset: usize, length: usize) -> Self {
        Self {
            offset: offset as u64,
            length: length as u64,
        }
    }

    /// One past the last child element of the row. Entries come from the
    /// engine, so an offset and length that overflow are an error.
    pub fn end(&self) -> Result<usize> {
        self.offset
            .checked_add(self.length)
            .and_then(|end| usize::try_from(end).ok())
            .ok_or_else(|| {
                eyre!(MappingError::incompatible(
                    "list entry",
                    "LIST",
                    format!(
                        "offset {} with length {} overflows the child index",
                        self.offset, self.length
                    )
                ))
            })
    }

    #[inline]
    pub fn range(&self) -> Result<std::ops::Range<usize>> {
        Ok(self.offset as usize..self.end()?)
    }
}

const _: () = assert!(std::mem::size_of::<ListEntry>() == 16);
