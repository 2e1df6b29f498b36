//! Batch loops around the root codecs.
//!
//! `RowWriter` fills one reusable chunk at a time and hands it to a sink; the
//! arena backing its strings is reset between chunks, so a sink must copy
//! whatever it keeps (as an appender does). `read_all` drains a result
//! source through one root reader.

use eyre::{bail, Result, WrapErr};

use super::{CodecCompiler, RootWriter};
use crate::error::MappingError;
use crate::mapping::{Direction, Mapped, TypeMapper};
use crate::memory::Arena;
use crate::types::StructuralType;
use crate::vector::{ChunkSink, DataChunk, ResultSource};

/// Progress of a read, used to report absolute row numbers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadContext {
    pub chunks_read: usize,
    pub rows_read: usize,
}

pub struct RowWriter<T: Mapped> {
    writer: RootWriter<T>,
    ty: StructuralType,
    chunk: DataChunk,
    arena: Arena,
}

impl<T: Mapped> RowWriter<T> {
    /// A writer using the process-wide codec cache.
    pub fn new() -> Result<Self> {
        Self::with_compiler(CodecCompiler::global())
    }

    pub fn with_compiler(compiler: &CodecCompiler) -> Result<Self> {
        let ty = TypeMapper::new().structural_type::<T>()?;
        let writer = compiler.root_writer::<T>()?;
        Ok(Self {
            writer,
            chunk: DataChunk::for_type(&ty),
            ty,
            arena: Arena::new(),
        })
    }

    /// A writer for an existing table whose columns form `table`.
    pub fn for_table(compiler: &CodecCompiler, table: &StructuralType) -> Result<Self> {
        let mut mapper = TypeMapper::new();
        if mapper.shape::<T>()?.is_struct() && !T::TRANSPARENT {
            mapper.check_compatible::<T>(table, Direction::Write)?;
        } else {
            match table.fields() {
                Some([column]) => mapper.check_compatible::<T>(&column.ty, Direction::Write)?,
                _ => bail!(MappingError::incompatible(
                    T::type_name(),
                    table,
                    "expected a table with a single column"
                )),
            }
        }
        Self::with_compiler(compiler)
    }

    /// Structural type of one row.
    pub fn structural_type(&self) -> &StructuralType {
        &self.ty
    }

    /// Refills the chunk with up to one batch of rows, the way a table
    /// function produces its output.
    pub fn fill_chunk<'r>(&mut self, rows: &mut dyn Iterator<Item = &'r T>) -> Result<&DataChunk> {
        self.chunk.reset();
        self.arena.reset();
        (self.writer)(rows, &mut self.chunk, &mut self.arena)?;
        Ok(&self.chunk)
    }

    /// Writes every row to `sink` in full batches and returns the row count.
    pub fn write_all<'r, I>(&mut self, rows: I, sink: &mut dyn ChunkSink) -> Result<usize>
    where
        I: IntoIterator<Item = &'r T>,
    {
        let mut rows = rows.into_iter();
        let mut total = 0;
        loop {
            self.chunk.reset();
            self.arena.reset();
            let written = (self.writer)(&mut rows, &mut self.chunk, &mut self.arena)
                .wrap_err_with(|| format!("writing rows starting at row {}", total))?;
            if written == 0 {
                break;
            }
            sink.append_chunk(&self.chunk)?;
            total += written;
            if written < self.chunk.capacity() {
                break;
            }
        }
        Ok(total)
    }
}

/// Reads every row of `source` as `T` using the process-wide codec cache.
pub fn read_all<T: Mapped, S: ResultSource + ?Sized>(source: &mut S) -> Result<Vec<T>> {
    read_all_with(CodecCompiler::global(), source)
}

pub fn read_all_with<T: Mapped, S: ResultSource + ?Sized>(
    compiler: &CodecCompiler,
    source: &mut S,
) -> Result<Vec<T>> {
    let ty = source.structural_type();
    let reader = compiler.root_reader::<T>(&ty)?;

    let mut context = ReadContext::default();
    let mut rows = Vec::new();
    while let Some(chunk) = source.next_chunk()? {
        let batch = reader(&chunk, &mut context).wrap_err_with(|| {
            format!(
                "reading chunk {} starting at row {}",
                context.chunks_read, context.rows_read
            )
        })?;
        context.chunks_read += 1;
        context.rows_read += chunk.size();
        rows.extend(batch);
    }
    tracing::debug!(
        type_name = %T::type_name(),
        chunks = context.chunks_read,
        rows = context.rows_read,
        "read result"
    );
    Ok(rows)
}
