//! # Type Generator
//!
//! Reading a result does not require an application type. When none is
//! supplied, the result's `StructuralType` generates one: a [`RecordShape`]
//! registered under the type's content hash, with rows held as [`Record`]s of
//! dynamic [`Value`]s.
//!
//! Generated shapes go through the same compiler, cache and batch loop as
//! mapped types; only the leaf conversion differs (a variant match instead of
//! a member access).
//!
//! ```ignore
//! use duckrow::{read_records, ChunkCollection};
//!
//! let records = read_records(&mut result)?;
//! for record in &records {
//!     println!("{:?} {:?}", record.get("id"), record.get("tags"));
//! }
//! ```
//!
//! Writing goes through [`RecordWriter`], which fills chunks of a table whose
//! columns form the given struct type.

mod codec;
mod record;
mod value;


pub use record::{generated_shape_count, Record, RecordShape};
pub use value::Value;

use std::sync::Arc;

use eyre::{bail, ensure, Result, WrapErr};

use crate::codec::{CodecCompiler, ColumnWriter, ReadContext};
use crate::error::MappingError;
use crate::memory::{validity, Arena};
use crate::types::StructuralType;
use crate::vector::{ChunkSink, DataChunk, ResultSource};

/// Batch writer for records of one struct type.
pub struct RecordWriter {
    writers: Vec<ColumnWriter<Value>>,
    ty: StructuralType,
    chunk: DataChunk,
    arena: Arena,
}

impl RecordWriter {
    pub fn new(ty: &StructuralType) -> Result<Self> {
        Self::with_compiler(CodecCompiler::global(), ty)
    }

    pub fn with_compiler(compiler: &CodecCompiler, ty: &StructuralType) -> Result<Self> {
        if ty.fields().is_none() {
            bail!(MappingError::unsupported(
                ty.to_string(),
                "records can only be written to a struct of columns"
            ));
        }
        Ok(Self {
            writers: codec::field_writers(compiler, ty)?,
            chunk: DataChunk::for_type(ty),
            ty: ty.clone(),
            arena: Arena::new(),
        })
    }

    pub fn structural_type(&self) -> &StructuralType {
        &self.ty
    }

    /// Fills the chunk with up to one batch of records.
    pub fn fill_chunk<'r>(
        &mut self,
        records: &mut dyn Iterator<Item = &'r Record>,
    ) -> Result<&DataChunk> {
        self.chunk.reset();
        self.arena.reset();
        self.write_batch(records)?;
        Ok(&self.chunk)
    }

    pub fn write_all<'r, I>(&mut self, records: I, sink: &mut dyn ChunkSink) -> Result<usize>
    where
        I: IntoIterator<Item = &'r Record>,
    {
        let mut records = records.into_iter();
        let mut total = 0;
        loop {
            self.chunk.reset();
            self.arena.reset();
            let written = self
                .write_batch(&mut records)
                .wrap_err_with(|| format!("writing records starting at row {}", total))?;
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

    fn write_batch<'r>(&mut self, records: &mut dyn Iterator<Item = &'r Record>) -> Result<usize> {
        let batch: Vec<&Record> = records.take(self.chunk.capacity()).collect();
        for record in &batch {
            ensure!(
                record.structural_type() == &self.ty,
                "a record of {} cannot be written to {}",
                record.structural_type(),
                self.ty
            );
        }
        let rows: Vec<Option<&Record>> = batch.into_iter().map(Some).collect();
        let chunk = &mut self.chunk;
        let arena = &mut self.arena;
        codec::write_fields(&rows, &self.writers, |index, writer, column| {
            writer(column, chunk.vector_mut(index)?, arena)
        })?;
        chunk.set_size(rows.len())?;
        Ok(rows.len())
    }
}

/// Writes `records` (all of struct type `ty`) to `sink` with the process-wide
/// codec cache.
pub fn write_records<'r, I>(ty: &StructuralType, records: I, sink: &mut dyn ChunkSink) -> Result<usize>
where
    I: IntoIterator<Item = &'r Record>,
{
    RecordWriter::new(ty)?.write_all(records, sink)
}

/// Reads every row of `source` as a generated record.
pub fn read_records<S: ResultSource + ?Sized>(source: &mut S) -> Result<Vec<Record>> {
    read_records_with(CodecCompiler::global(), source)
}

pub fn read_records_with<S: ResultSource + ?Sized>(
    compiler: &CodecCompiler,
    source: &mut S,
) -> Result<Vec<Record>> {
    let ty = source.structural_type();
    let shape: Arc<RecordShape> = RecordShape::of(&ty)?;
    let readers = codec::field_readers(compiler, &ty)?;

    let mut context = ReadContext::default();
    let mut records = Vec::new();
    while let Some(chunk) = source.next_chunk()? {
        ensure!(
            chunk.column_count() == readers.len(),
            "chunk has {} columns, expected {}",
            chunk.column_count(),
            readers.len()
        );
        let rows = chunk.size();
        let columns = readers
            .iter()
            .enumerate()
            .map(|(index, reader)| reader(chunk.vector(index)?, rows, None))
            .collect::<Result<Vec<_>>>()
            .wrap_err_with(|| {
                format!(
                    "reading chunk {} starting at row {}",
                    context.chunks_read, context.rows_read
                )
            })?;
        let present = validity::all_valid(rows);
        records.extend(codec::assemble(&shape, columns, rows, &present).into_iter().flatten());
        context.chunks_read += 1;
        context.rows_read += rows;
    }
    tracing::debug!(
        ty = %ty,
        chunks = context.chunks_read,
        rows = context.rows_read,
        "read records"
    );
    Ok(records)
}
