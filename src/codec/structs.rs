//! Struct codecs and the root codecs built on them.
//!
//! A struct column has one child vector per member. The struct's own
//! validity is written once per row; each member writer then runs over the
//! whole batch on its child. Reading builds `T::default()` for every present
//! row and lets each member reader overwrite its member, so members with no
//! column keep their NULL value.
//!
//! Root codecs use the same member plans against a chunk, whose columns play
//! the part of the struct's children.

use eyre::{bail, ensure, eyre, Result, WrapErr};

use super::{
    column_reader, column_writer, root_reader_fn, root_writer_fn, CodecCompiler, ColumnReader,
    ColumnWriter, FieldReader, ReadContext, RootReader, RootWriter,
};
use crate::error::MappingError;
use crate::mapping::{Direction, FieldAccessor, Mapped, TypeMapper};
use crate::memory::{validity, Arena, RowFilter};
use crate::types::StructuralType;
use crate::vector::{DataChunk, Vector};

fn member_writers<T: Mapped>(compiler: &CodecCompiler) -> Result<Vec<ColumnWriter<T>>> {
    let fields = TypeMapper::new().declared_fields::<T>()?;
    fields
        .iter()
        .map(|field| {
            compiler
                .field_writer(field)
                .wrap_err_with(|| format!("building writer for {}.{}", T::type_name(), field.name()))
        })
        .collect()
}

pub fn struct_writer<T: Mapped>(compiler: &CodecCompiler) -> Result<ColumnWriter<T>> {
    let writers = member_writers::<T>(compiler)?;
    Ok(column_writer(move |rows: &[Option<&T>], vector: &mut Vector, arena: &mut Arena| {
        ensure!(
            rows.len() <= vector.capacity(),
            "{} rows do not fit in a vector of {} slots",
            rows.len(),
            vector.capacity()
        );
        let mut validity = vector.validity_mut();
        for (row, value) in rows.iter().enumerate() {
            validity.set(row, value.is_some());
        }
        for (index, writer) in writers.iter().enumerate() {
            writer(rows, vector.child_mut(index)?, arena)?;
        }
        Ok(())
    }))
}

/// Member readers matched to the columns of one structural type.
struct ReadPlan<T> {
    readers: Vec<(usize, FieldReader<T>)>,
    missing: Vec<FieldAccessor<T>>,
}

impl<T: Mapped> ReadPlan<T> {
    fn build(compiler: &CodecCompiler, ty: &StructuralType) -> Result<Self> {
        let mut mapper = TypeMapper::new();
        mapper.check_compatible::<T>(ty, Direction::Read)?;

        let mut readers = Vec::new();
        for (index, field) in mapper.fields::<T>(Some(ty))?.into_iter().enumerate() {
            let Some(field) = field else {
                continue;
            };
            let column = field
                .bound_type()
                .cloned()
                .unwrap_or_else(|| field.structural_type().clone());
            let reader = compiler
                .field_reader(&field, &column)
                .wrap_err_with(|| format!("building reader for {}.{}", T::type_name(), field.name()))?;
            readers.push((index, reader));
        }

        Ok(Self {
            readers,
            missing: mapper.missing_fields::<T>(ty)?,
        })
    }

    fn fill<'v, C>(&self, values: &mut [Option<T>], column: C, present: &[u64]) -> Result<()>
    where
        C: Fn(usize) -> Result<&'v Vector>,
    {
        for (index, reader) in &self.readers {
            reader(column(*index)?, values, Some(present))?;
        }
        for field in &self.missing {
            field.fill_null(values);
        }
        Ok(())
    }
}

pub fn struct_reader<T: Mapped + Default>(
    compiler: &CodecCompiler,
    ty: &StructuralType,
) -> Result<ColumnReader<T>> {
    let plan = ReadPlan::<T>::build(compiler, ty)?;
    Ok(column_reader(move |vector: &Vector, rows: usize, filter: RowFilter<'_>| {
        ensure!(
            rows <= vector.capacity(),
            "cannot read {} rows from a vector of {} slots",
            rows,
            vector.capacity()
        );
        let present = validity::combine(filter, vector.validity(), rows);
        let mut values: Vec<Option<T>> = (0..rows)
            .map(|row| validity::is_valid(&present, row).then(T::default))
            .collect();
        plan.fill(&mut values, |index| vector.child(index), &present)?;
        Ok(values)
    }))
}

/// Root reader for struct types: one chunk column per member.
pub fn struct_root_reader<T: Mapped + Default>(
    compiler: &CodecCompiler,
    ty: &StructuralType,
) -> Result<RootReader<T>> {
    let plan = ReadPlan::<T>::build(compiler, ty)?;
    let columns = ty.fields().map_or(0, <[_]>::len);
    Ok(root_reader_fn(move |chunk: &DataChunk, context: &mut ReadContext| {
        ensure!(
            chunk.column_count() == columns,
            "chunk has {} columns, expected {}",
            chunk.column_count(),
            columns
        );
        let rows = chunk.size();
        let first_row = context.rows_read;
        let present = validity::all_valid(rows);
        let mut values: Vec<Option<T>> = (0..rows).map(|_| Some(T::default())).collect();
        plan.fill(&mut values, |index| chunk.vector(index), &present)
            .map_err(|err| MappingError::rebase_row(err, |row| first_row + row))?;
        Ok(values.into_iter().flatten().collect())
    }))
}

/// Root reader for every other type: the chunk has a single column holding
/// the values.
pub fn scalar_root_reader<T: Mapped>(
    compiler: &CodecCompiler,
    ty: &StructuralType,
) -> Result<RootReader<T>> {
    let column = match ty.fields() {
        Some([field]) => field.ty.clone(),
        Some(fields) => bail!(MappingError::incompatible(
            T::type_name(),
            ty,
            format!("expected a single column, found {}", fields.len())
        )),
        None => ty.clone(),
    };
    let reader = compiler.reader::<T>(&column)?;
    let type_name = T::type_name();

    Ok(root_reader_fn(move |chunk: &DataChunk, context: &mut ReadContext| {
        ensure!(
            chunk.column_count() == 1,
            "chunk has {} columns, expected 1",
            chunk.column_count()
        );
        let first_row = context.rows_read;
        let values = reader(chunk.vector(0)?, chunk.size(), None)
            .map_err(|err| MappingError::rebase_row(err, |row| first_row + row))?;
        values
            .into_iter()
            .enumerate()
            .map(|(row, value)| {
                value.or_else(T::null).ok_or_else(|| {
                    eyre!(MappingError::UnexpectedNull {
                        type_name: type_name.clone(),
                        row: first_row + row,
                    })
                })
            })
            .collect()
    }))
}

/// Root writer: struct types fill one column per member, every other type
/// fills a single column.
pub(crate) fn root_writer<T: Mapped>(compiler: &CodecCompiler) -> Result<RootWriter<T>> {
    let shape = TypeMapper::new().shape::<T>()?;
    let writers = if shape.is_struct() {
        if T::TRANSPARENT {
            bail!(MappingError::unsupported(
                T::type_name(),
                "rows must be the struct itself, not a nullable or boxed struct"
            ));
        }
        member_writers::<T>(compiler)?
    } else {
        vec![compiler.writer::<T>()?]
    };

    Ok(root_writer_fn::<T, _>(
        move |source, chunk, arena| {
            ensure!(
                chunk.column_count() == writers.len(),
                "chunk has {} columns, {} writes {}",
                chunk.column_count(),
                T::type_name(),
                writers.len()
            );
            let rows: Vec<Option<&T>> = Iterator::take(&mut *source, chunk.capacity())
                .map(Some)
                .collect();
            for (index, writer) in writers.iter().enumerate() {
                writer(&rows, chunk.vector_mut(index)?, arena)?;
            }
            chunk.set_size(rows.len())?;
            Ok(rows.len())
        },
    ))
}
