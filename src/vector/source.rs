//! Chunk producers and consumers.
//!
//! A query result hands out chunks through [`ResultSource`]; an appender or
//! table function output accepts them through [`ChunkSink`].
//! [`ChunkCollection`] is an in-memory table implementing both.

use std::collections::VecDeque;

use eyre::{ensure, Result};

use super::chunk::column_types;
use super::{DataChunk, LogicalType};
use crate::config::SCALAR_COLUMN_NAME;
use crate::types::{StructuralType, TypeKind};

pub trait ResultSource {
    fn column_names(&self) -> &[String];

    fn column_types(&self) -> &[LogicalType];

    /// Fetches the next chunk, or `None` once the result is exhausted.
    fn next_chunk(&mut self) -> Result<Option<DataChunk>>;

    /// The result's rows viewed as one struct.
    fn structural_type(&self) -> StructuralType {
        StructuralType::from_columns(self.column_names(), self.column_types())
    }
}

pub trait ChunkSink {
    /// Consumes `chunk`. The chunk's string data may be reused by the caller
    /// as soon as this returns.
    fn append_chunk(&mut self, chunk: &DataChunk) -> Result<()>;
}

#[derive(Debug)]
pub struct ChunkCollection {
    names: Vec<String>,
    types: Vec<LogicalType>,
    chunks: VecDeque<DataChunk>,
}

impl ChunkCollection {
    pub fn new(names: Vec<String>, types: Vec<LogicalType>) -> Self {
        Self {
            names,
            types,
            chunks: VecDeque::new(),
        }
    }

    /// An empty collection whose columns are the fields of `ty` (or a single
    /// `value` column when `ty` is not a struct).
    pub fn for_type(ty: &StructuralType) -> Self {
        let names = match ty.kind() {
            TypeKind::Struct(fields) => fields.iter().map(|f| f.name.clone()).collect(),
            _ => vec![SCALAR_COLUMN_NAME.to_string()],
        };
        Self::new(names, column_types(ty))
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn row_count(&self) -> usize {
        self.chunks.iter().map(DataChunk::size).sum()
    }

    pub fn chunks(&self) -> impl Iterator<Item = &DataChunk> {
        self.chunks.iter()
    }

    /// Appends an already owned chunk without copying it.
    pub fn push_chunk(&mut self, chunk: DataChunk) -> Result<()> {
        self.check_columns(&chunk)?;
        self.chunks.push_back(chunk);
        Ok(())
    }

    fn check_columns(&self, chunk: &DataChunk) -> Result<()> {
        ensure!(
            chunk.column_types() == self.types,
            "chunk columns {:?} do not match collection columns {:?}",
            chunk.column_types(),
            self.types
        );
        Ok(())
    }
}

impl ChunkSink for ChunkCollection {
    fn append_chunk(&mut self, chunk: &DataChunk) -> Result<()> {
        self.check_columns(chunk)?;
        if chunk.size() > 0 {
            self.chunks.push_back(chunk.deep_copy()?);
        }
        Ok(())
    }
}

impl ResultSource for ChunkCollection {
    fn column_names(&self) -> &[String] {
        &self.names
    }

    fn column_types(&self) -> &[LogicalType] {
        &self.types
    }

    fn next_chunk(&mut self) -> Result<Option<DataChunk>> {
        Ok(self.chunks.pop_front())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PrimitiveKind;

    #[test]
    fn appended_chunks_are_read_back_in_order() {
        let types = vec![LogicalType::Primitive(PrimitiveKind::Integer)];
        let mut collection = ChunkCollection::new(vec!["n".into()], types.clone());

        for batch in 0..3 {
            let mut chunk = DataChunk::new(&types);
            chunk.vector_mut(0).unwrap().data_mut::<i32>().unwrap()[0] = batch;
            chunk.set_size(1).unwrap();
            collection.append_chunk(&chunk).unwrap();
        }
        assert_eq!(collection.row_count(), 3);

        let mut seen = Vec::new();
        while let Some(chunk) = collection.next_chunk().unwrap() {
            seen.push(chunk.vector(0).unwrap().data::<i32>().unwrap()[0]);
        }
        assert_eq!(seen, vec![0, 1, 2]);
    }

    #[test]
    fn empty_chunks_are_dropped() {
        let types = vec![LogicalType::Primitive(PrimitiveKind::Integer)];
        let mut collection = ChunkCollection::new(vec!["n".into()], types.clone());
        collection.append_chunk(&DataChunk::new(&types)).unwrap();
        assert_eq!(collection.chunk_count(), 0);
    }

    #[test]
    fn mismatched_columns_are_rejected() {
        let mut collection = ChunkCollection::new(
            vec!["n".into()],
            vec![LogicalType::Primitive(PrimitiveKind::Integer)],
        );
        let chunk = DataChunk::new(&[LogicalType::Primitive(PrimitiveKind::Double)]);
        assert!(collection.append_chunk(&chunk).is_err());
    }

    #[test]
    fn structural_type_comes_from_columns() {
        let collection = ChunkCollection::new(
            vec!["id".into()],
            vec![LogicalType::Primitive(PrimitiveKind::BigInt)],
        );
        assert_eq!(collection.structural_type().to_string(), "STRUCT(\"id\" BIGINT)");
    }
}
