//! # Arena - Bump Allocator for Out-of-Line Vector Data
//!
//! Strings and blobs longer than 12 bytes cannot live inside a vector slot, so
//! serializers copy them into an `Arena` and store a pointer in the slot. The
//! arena hands out byte ranges from a list of heap chunks with a cursor that
//! only moves forward; individual allocations are never freed.
//!
//! ## Chunk Lifecycle
//!
//! ```text
//!  chunks:  [ 4 KB ][ 8 KB ][ 16 KB ] ...   (sizes double up to 1 MB)
//!              ^
//!              current, cursor = bytes used in current chunk
//!
//!  allocate(n):  fits in current?  -> bump cursor
//!                otherwise grow(n): next retained chunk with room, else a
//!                                   new chunk of max(next_size, n)
//!  reset():      current = 0, cursor = 0; chunks are kept and reused
//!                oldest-first by later allocations
//!  drop:         frees every chunk
//! ```
//!
//! Chunks are boxed slices, so growing the chunk list never moves memory that
//! was already handed out.
//!
//! ## Lifetime Contract
//!
//! Pointers returned by the arena stay valid until the next [`Arena::reset`] or
//! until the arena is dropped. A serializer must therefore keep the arena
//! alive (and un-reset) until the native side has consumed every vector that
//! references it. The arena is always passed explicitly to the code that
//! allocates from it.

use eyre::{ensure, Result};

use crate::config::{ARENA_INITIAL_CHUNK_SIZE, ARENA_MAX_CHUNK_SIZE};

pub struct Arena {
    chunks: Vec<Box<[u8]>>,
    current: usize,
    cursor: usize,
    next_chunk_size: usize,
    max_chunk_size: usize,
    allocated: usize,
}

impl Arena {
    pub fn new() -> Self {
        Self::with_chunk_sizes(ARENA_INITIAL_CHUNK_SIZE, ARENA_MAX_CHUNK_SIZE)
    }

    /// Creates an arena whose first chunk holds `initial` bytes and whose
    /// chunk size doubles up to `max`.
    pub fn with_chunk_sizes(initial: usize, max: usize) -> Self {
        let initial = initial.max(1);
        Self {
            chunks: Vec::new(),
            current: 0,
            cursor: 0,
            next_chunk_size: initial,
            max_chunk_size: max.max(initial),
            allocated: 0,
        }
    }

    /// Reserves `len` bytes and returns a pointer to them.
    pub fn allocate(&mut self, len: usize) -> Result<*mut u8> {
        if self.remaining_in_current_chunk() < len {
            self.grow(len)?;
        }
        let chunk = &mut self.chunks[self.current];
        // SAFETY: grow() guarantees the current chunk has `len` bytes left.
        let ptr = unsafe { chunk.as_mut_ptr().add(self.cursor) };
        self.cursor += len;
        self.allocated += len;
        Ok(ptr)
    }

    /// Copies `bytes` into the arena and returns a pointer to the copy.
    pub fn allocate_copy(&mut self, bytes: &[u8]) -> Result<*const u8> {
        if self.remaining_in_current_chunk() < bytes.len() {
            self.grow(bytes.len())?;
        }
        self.remaining_space()[..bytes.len()].copy_from_slice(bytes);
        let ptr = self.remaining_space().as_ptr();
        self.advance_by(bytes.len())?;
        Ok(ptr)
    }

    /// Unused tail of the current chunk. Write into it, then call
    /// [`Arena::advance_by`] with the number of bytes used.
    pub fn remaining_space(&mut self) -> &mut [u8] {
        match self.chunks.get_mut(self.current) {
            Some(chunk) => &mut chunk[self.cursor..],
            None => &mut [],
        }
    }

    pub fn advance_by(&mut self, len: usize) -> Result<()> {
        ensure!(
            len <= self.remaining_in_current_chunk(),
            "cannot advance arena by {} bytes, only {} remain in the current chunk",
            len,
            self.remaining_in_current_chunk()
        );
        self.cursor += len;
        self.allocated += len;
        Ok(())
    }

    /// Moves to a chunk with at least `min_size` free bytes, reusing retained
    /// chunks oldest-first before allocating a new one.
    pub fn grow(&mut self, min_size: usize) -> Result<()> {
        let start = if self.chunks.is_empty() {
            0
        } else {
            self.current + 1
        };
        for index in start..self.chunks.len() {
            if self.chunks[index].len() >= min_size {
                self.current = index;
                self.cursor = 0;
                return Ok(());
            }
        }

        let size = self.next_chunk_size.max(min_size);
        ensure!(size < isize::MAX as usize, "arena chunk of {} bytes is too large", size);
        self.chunks.push(vec![0u8; size].into_boxed_slice());
        self.current = self.chunks.len() - 1;
        self.cursor = 0;
        self.next_chunk_size = (self.next_chunk_size * 2).min(self.max_chunk_size);
        Ok(())
    }

    /// Rewinds the arena without freeing its chunks. Every pointer handed out
    /// before the reset becomes dangling from the caller's point of view.
    pub fn reset(&mut self) {
        self.current = 0;
        self.cursor = 0;
        self.allocated = 0;
    }

    /// Frees all chunks.
    pub fn dispose(self) {
        drop(self)
    }

    /// Bytes handed out since creation or the last reset.
    pub fn allocated_bytes(&self) -> usize {
        self.allocated
    }

    /// Total bytes held across all retained chunks.
    pub fn capacity(&self) -> usize {
        self.chunks.iter().map(|c| c.len()).sum()
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    fn remaining_in_current_chunk(&self) -> usize {
        self.chunks
            .get(self.current)
            .map_or(0, |chunk| chunk.len() - self.cursor)
    }
}

impl Default for Arena {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Arena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Arena")
            .field("chunks", &self.chunks.len())
            .field("current", &self.current)
            .field("cursor", &self.cursor)
            .field("allocated", &self.allocated)
            .finish()
    }
}
