//! `DataChunk`: row-aligned vectors for one batch.

use eyre::{ensure, eyre, Result};

use super::{LogicalType, Vector};
use crate::config::VECTOR_SIZE;
use crate::types::{StructuralType, TypeKind};

#[derive(Debug)]
pub struct DataChunk {
    vectors: Vec<Vector>,
    size: usize,
    capacity: usize,
}

impl DataChunk {
    pub fn new(types: &[LogicalType]) -> Self {
        Self::with_capacity(types, VECTOR_SIZE)
    }

    pub fn with_capacity(types: &[LogicalType], capacity: usize) -> Self {
        Self {
            vectors: types
                .iter()
                .map(|ty| Vector::new(ty.clone(), capacity))
                .collect(),
            size: 0,
            capacity,
        }
    }

    /// A chunk laid out for rows of `ty`: one column per struct field, or a
    /// single column for any other type.
    pub fn for_type(ty: &StructuralType) -> Self {
        Self::new(&column_types(ty))
    }

    pub fn column_count(&self) -> usize {
        self.vectors.len()
    }

    pub fn column_types(&self) -> Vec<LogicalType> {
        self.vectors
            .iter()
            .map(|v| v.logical_type().clone())
            .collect()
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn set_size(&mut self, size: usize) -> Result<()> {
        ensure!(
            size <= self.capacity,
            "chunk size {} exceeds capacity {}",
            size,
            self.capacity
        );
        self.size = size;
        Ok(())
    }

    pub fn vector(&self, column: usize) -> Result<&Vector> {
        self.vectors
            .get(column)
            .ok_or_else(|| eyre!("chunk has no column {}", column))
    }

    pub fn vector_mut(&mut self, column: usize) -> Result<&mut Vector> {
        self.vectors
            .get_mut(column)
            .ok_or_else(|| eyre!("chunk has no column {}", column))
    }

    pub fn vectors(&self) -> &[Vector] {
        &self.vectors
    }

    pub fn reset(&mut self) {
        self.size = 0;
        self.vectors.iter_mut().for_each(Vector::reset);
    }

    /// Copies the chunk's rows into a chunk that owns every byte it references.
    pub fn deep_copy(&self) -> Result<DataChunk> {
        let vectors = self
            .vectors
            .iter()
            .map(|v| v.deep_copy(self.size))
            .collect::<Result<Vec<_>>>()?;
        Ok(DataChunk {
            vectors,
            size: self.size,
            capacity: self.size,
        })
    }
}

pub(crate) fn column_types(ty: &StructuralType) -> Vec<LogicalType> {
    match ty.kind() {
        TypeKind::Struct(fields) => fields.iter().map(|f| f.ty.to_logical()).collect(),
        _ => vec![ty.to_logical()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PrimitiveKind, StructField};

    #[test]
    fn struct_types_become_columns() {
        let ty = StructuralType::structure([
            StructField::new("a", StructuralType::primitive(PrimitiveKind::Integer)),
            StructField::new("b", StructuralType::primitive(PrimitiveKind::Varchar)),
        ]);
        let chunk = DataChunk::for_type(&ty);
        assert_eq!(chunk.column_count(), 2);
        assert_eq!(chunk.capacity(), VECTOR_SIZE);

        let scalar = DataChunk::for_type(&StructuralType::primitive(PrimitiveKind::Double));
        assert_eq!(scalar.column_count(), 1);
    }

    #[test]
    fn size_is_bounded_by_capacity() {
        let mut chunk = DataChunk::with_capacity(&[PrimitiveKind::Integer.into()], 4);
        chunk.set_size(4).unwrap();
        assert!(chunk.set_size(5).is_err());
        chunk.reset();
        assert_eq!(chunk.size(), 0);
    }

    #[test]
    fn deep_copy_shrinks_to_size() {
        let mut chunk = DataChunk::new(&[PrimitiveKind::BigInt.into()]);
        chunk.vector_mut(0).unwrap().data_mut::<i64>().unwrap()[..3].copy_from_slice(&[1, 2, 3]);
        chunk.set_size(3).unwrap();

        let copy = chunk.deep_copy().unwrap();
        assert_eq!(copy.capacity(), 3);
        assert_eq!(copy.vector(0).unwrap().data::<i64>().unwrap(), &[1, 2, 3]);
    }
}
