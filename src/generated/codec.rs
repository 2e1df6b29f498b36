//! Dynamic codecs: the codec compiler's counterpart for [`Value`].
//!
//! A dynamic codec is built by walking a `StructuralType` once and composing
//! the same primitive codecs the typed path uses, so the per-row work is a
//! variant match plus the primitive copy. Codecs are cached in the compiler
//! under `(TypeId(Value), direction, hash(ty))`.

use std::sync::Arc;

use eyre::{ensure, eyre, Report, Result, WrapErr};
use hashbrown::HashMap;

use super::{Record, RecordShape, Value};
use crate::codec::{
    column_reader, column_writer, primitive_reader, primitive_writer, CodecCompiler, CodecKey,
    ColumnReader, ColumnWriter,
};
use crate::error::MappingError;
use crate::mapping::Direction;
use crate::memory::{validity, Arena, RowFilter};
use crate::types::{enum_physical_kind, Blob, Interval, PrimitiveKind, StructuralType, TypeKind};
use crate::vector::{ListEntry, NativeValue, Vector};

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use uuid::Uuid;

impl CodecCompiler {
    /// Writer for dynamic values stored as `ty`.
    pub fn value_writer(&self, ty: &StructuralType) -> Result<ColumnWriter<Value>> {
        let key = CodecKey::of_type::<Value>(Direction::Write, false, Some(ty.content_hash()));
        self.get_or_build(key, || ty.to_string(), || build_writer(self, ty))
    }

    /// Reader producing dynamic values from a column of `ty`.
    pub fn value_reader(&self, ty: &StructuralType) -> Result<ColumnReader<Value>> {
        let key = CodecKey::of_type::<Value>(Direction::Read, false, Some(ty.content_hash()));
        self.get_or_build(key, || ty.to_string(), || build_reader(self, ty))
    }
}

fn mismatch(expected: impl std::fmt::Display, found: &Value) -> Report {
    eyre!("expected a {} value, found {}", expected, found.kind_name())
}

fn build_writer(compiler: &CodecCompiler, ty: &StructuralType) -> Result<ColumnWriter<Value>> {
    Ok(match ty.kind() {
        TypeKind::Primitive(kind) => scalar_writer(*kind),
        TypeKind::Enum(labels) => enum_writer(ty, labels),
        TypeKind::List(element) => list_writer(compiler.value_writer(element)?),
        TypeKind::FixedArray { element, length } => {
            array_writer(compiler.value_writer(element)?, *length)
        }
        TypeKind::Struct(_) => struct_writer(compiler, ty)?,
    })
}

fn build_reader(compiler: &CodecCompiler, ty: &StructuralType) -> Result<ColumnReader<Value>> {
    Ok(match ty.kind() {
        TypeKind::Primitive(kind) => scalar_reader(*kind),
        TypeKind::Enum(labels) => enum_reader(labels),
        TypeKind::List(element) => list_reader(compiler.value_reader(element)?),
        TypeKind::FixedArray { element, length } => {
            array_reader(compiler.value_reader(element)?, *length)
        }
        TypeKind::Struct(_) => struct_reader(compiler, ty)?,
    })
}

macro_rules! scalar_codecs {
    ($($kind:ident => $variant:ident($ty:ty)),* $(,)?) => {
        fn scalar_writer(kind: PrimitiveKind) -> ColumnWriter<Value> {
            match kind {
                $(PrimitiveKind::$kind => {
                    let inner = primitive_writer::<$ty>();
                    column_writer(move |rows: &[Option<&Value>], vector: &mut Vector, arena: &mut Arena| {
                        let values = rows
                            .iter()
                            .map(|row| match *row {
                                None | Some(Value::Null) => Ok(None),
                                Some(Value::$variant(v)) => Ok(Some(v)),
                                Some(other) => Err(mismatch(kind, other)),
                            })
                            .collect::<Result<Vec<Option<&$ty>>>>()?;
                        inner(&values, vector, arena)
                    })
                })*
            }
        }

        fn scalar_reader(kind: PrimitiveKind) -> ColumnReader<Value> {
            match kind {
                $(PrimitiveKind::$kind => {
                    let inner = primitive_reader::<$ty>();
                    column_reader(move |vector: &Vector, rows: usize, filter: RowFilter<'_>| {
                        Ok(inner(vector, rows, filter)?
                            .into_iter()
                            .map(|value| value.map(Value::$variant))
                            .collect())
                    })
                })*
            }
        }
    };
}

scalar_codecs! {
    Boolean => Boolean(bool),
    TinyInt => TinyInt(i8),
    SmallInt => SmallInt(i16),
    Integer => Integer(i32),
    BigInt => BigInt(i64),
    HugeInt => HugeInt(i128),
    UTinyInt => UTinyInt(u8),
    USmallInt => USmallInt(u16),
    UInteger => UInteger(u32),
    UBigInt => UBigInt(u64),
    Float => Float(f32),
    Double => Double(f64),
    Date => Date(NaiveDate),
    Time => Time(NaiveTime),
    Timestamp => Timestamp(NaiveDateTime),
    TimestampTz => TimestampTz(DateTime<Utc>),
    Interval => Interval(Interval),
    Uuid => Uuid(Uuid),
    Varchar => Varchar(String),
    Blob => Blob(Blob),
}

fn enum_writer(ty: &StructuralType, labels: &[String]) -> ColumnWriter<Value> {
    let index: HashMap<String, usize> = labels
        .iter()
        .enumerate()
        .map(|(i, label)| (label.clone(), i))
        .collect();
    let type_name = ty.to_string();
    match enum_physical_kind(labels.len()) {
        PrimitiveKind::UTinyInt => dictionary_writer::<u8>(index, type_name),
        PrimitiveKind::USmallInt => dictionary_writer::<u16>(index, type_name),
        _ => dictionary_writer::<u32>(index, type_name),
    }
}

/// Stores labels as dictionary indices. `Varchar` values are accepted as
/// labels too.
fn dictionary_writer<N>(index: HashMap<String, usize>, type_name: String) -> ColumnWriter<Value>
where
    N: NativeValue + TryFrom<usize>,
{
    column_writer(move |rows: &[Option<&Value>], vector: &mut Vector, _arena: &mut Arena| {
        let (data, mut validity) = vector.data_and_validity_mut::<N>()?;
        ensure!(
            rows.len() <= data.len(),
            "{} rows do not fit in a vector of {} slots",
            rows.len(),
            data.len()
        );
        for (row, (slot, value)) in data.iter_mut().zip(rows).enumerate() {
            match *value {
                None | Some(Value::Null) => validity.set_invalid(row),
                Some(Value::Enum(label)) | Some(Value::Varchar(label)) => {
                    let position = index.get(label.as_str()).copied().ok_or_else(|| {
                        eyre!(MappingError::UnknownEnumLabel {
                            type_name: type_name.clone(),
                            label: label.clone(),
                        })
                    })?;
                    *slot = N::try_from(position)
                        .map_err(|_| eyre!("enum index {} does not fit its width", position))?;
                    validity.set_valid(row);
                }
                Some(other) => return Err(mismatch("ENUM", other)),
            }
        }
        Ok(())
    })
}

fn enum_reader(labels: &Arc<[String]>) -> ColumnReader<Value> {
    let labels = Arc::clone(labels);
    match enum_physical_kind(labels.len()) {
        PrimitiveKind::UTinyInt => dictionary_reader::<u8>(labels),
        PrimitiveKind::USmallInt => dictionary_reader::<u16>(labels),
        _ => dictionary_reader::<u32>(labels),
    }
}

fn dictionary_reader<N>(labels: Arc<[String]>) -> ColumnReader<Value>
where
    N: NativeValue + Into<u64>,
{
    column_reader(move |vector: &Vector, rows: usize, filter: RowFilter<'_>| {
        let data = vector.data::<N>()?;
        ensure!(
            rows <= data.len(),
            "cannot read {} rows from a vector of {} slots",
            rows,
            data.len()
        );
        let present = validity::combine(filter, vector.validity(), rows);
        data[..rows]
            .iter()
            .enumerate()
            .map(|(row, native)| {
                if !validity::is_valid(&present, row) {
                    return Ok(None);
                }
                let index = Into::<u64>::into(*native) as usize;
                let label = labels.get(index).ok_or_else(|| {
                    eyre!(
                        "enum dictionary index {} is out of range for {} labels",
                        index,
                        labels.len()
                    )
                })?;
                Ok(Some(Value::Enum(label.clone())))
            })
            .collect()
    })
}

fn list_writer(element: ColumnWriter<Value>) -> ColumnWriter<Value> {
    column_writer(move |rows: &[Option<&Value>], vector: &mut Vector, arena: &mut Arena| {
        let mut elements: Vec<Option<&Value>> = Vec::new();
        {
            let (entries, mut validity) = vector.data_and_validity_mut::<ListEntry>()?;
            ensure!(
                rows.len() <= entries.len(),
                "{} rows do not fit in a vector of {} slots",
                rows.len(),
                entries.len()
            );
            for (row, (entry, value)) in entries.iter_mut().zip(rows).enumerate() {
                match *value {
                    None | Some(Value::Null) => {
                        *entry = ListEntry::default();
                        validity.set_invalid(row);
                    }
                    Some(Value::List(items)) => {
                        *entry = ListEntry::new(elements.len(), items.len());
                        elements.extend(items.iter().map(Some));
                        validity.set_valid(row);
                    }
                    Some(other) => return Err(mismatch("LIST", other)),
                }
            }
        }

        vector.list_reserve(elements.len())?;
        element(&elements, vector.list_child_mut()?, arena)?;
        vector.set_list_size(elements.len())
    })
}

fn list_reader(element: ColumnReader<Value>) -> ColumnReader<Value> {
    column_reader(move |vector: &Vector, rows: usize, filter: RowFilter<'_>| {
        let entries = vector.data::<ListEntry>()?;
        ensure!(
            rows <= entries.len(),
            "cannot read {} rows from a vector of {} slots",
            rows,
            entries.len()
        );
        let present = validity::combine(filter, vector.validity(), rows);
        let present_rows: Vec<usize> = (0..rows)
            .filter(|&row| validity::is_valid(&present, row))
            .collect();

        let mut total = 0;
        for &row in &present_rows {
            total = total.max(entries[row].end()?);
        }
        ensure!(
            total <= vector.list_size(),
            "list entries reach element {} but the list holds {}",
            total,
            vector.list_size()
        );

        let mut used = vec![0u64; validity::entry_count(total)];
        for &row in &present_rows {
            for index in entries[row].range()? {
                validity::set_valid(&mut used, index);
            }
        }
        let values = element(vector.list_child()?, total, Some(&used))?;

        (0..rows)
            .map(|row| {
                if !validity::is_valid(&present, row) {
                    return Ok(None);
                }
                Ok(Some(Value::List(
                    entries[row]
                        .range()?
                        .map(|index| values[index].clone().unwrap_or(Value::Null))
                        .collect(),
                )))
            })
            .collect()
    })
}

/// Fixed arrays accept `Array` and `List` values of exactly `length` items.
fn array_writer(element: ColumnWriter<Value>, length: usize) -> ColumnWriter<Value> {
    column_writer(move |rows: &[Option<&Value>], vector: &mut Vector, arena: &mut Arena| {
        ensure!(
            rows.len() <= vector.capacity(),
            "{} rows do not fit in a vector of {} slots",
            rows.len(),
            vector.capacity()
        );
        let mut elements: Vec<Option<&Value>> = Vec::with_capacity(rows.len() * length);
        let mut validity = vector.validity_mut();
        for (row, value) in rows.iter().enumerate() {
            match *value {
                None | Some(Value::Null) => {
                    elements.extend((0..length).map(|_| None));
                    validity.set_invalid(row);
                }
                Some(Value::Array(items)) | Some(Value::List(items)) => {
                    ensure!(
                        items.len() == length,
                        "array row {} holds {} elements, expected {}",
                        row,
                        items.len(),
                        length
                    );
                    elements.extend(items.iter().map(Some));
                    validity.set_valid(row);
                }
                Some(other) => return Err(mismatch("ARRAY", other)),
            }
        }
        element(&elements, vector.array_child_mut()?, arena)
    })
}

fn array_reader(element: ColumnReader<Value>, length: usize) -> ColumnReader<Value> {
    column_reader(move |vector: &Vector, rows: usize, filter: RowFilter<'_>| {
        ensure!(
            rows <= vector.capacity(),
            "cannot read {} rows from a vector of {} slots",
            rows,
            vector.capacity()
        );
        let present = validity::combine(filter, vector.validity(), rows);
        let child_filter = validity::expand(&present, rows, length);
        let mut values = element(vector.array_child()?, rows * length, Some(&child_filter))?
            .into_iter();

        Ok((0..rows)
            .map(|row| {
                let items: Vec<Value> = values
                    .by_ref()
                    .take(length)
                    .map(|value| value.unwrap_or(Value::Null))
                    .collect();
                validity::is_valid(&present, row).then_some(Value::Array(items))
            })
            .collect())
    })
}

pub(super) fn field_writers(
    compiler: &CodecCompiler,
    ty: &StructuralType,
) -> Result<Vec<ColumnWriter<Value>>> {
    ty.fields()
        .unwrap_or_default()
        .iter()
        .map(|field| {
            compiler
                .value_writer(&field.ty)
                .wrap_err_with(|| format!("building writer for field '{}'", field.name))
        })
        .collect()
}

pub(super) fn field_readers(
    compiler: &CodecCompiler,
    ty: &StructuralType,
) -> Result<Vec<ColumnReader<Value>>> {
    ty.fields()
        .unwrap_or_default()
        .iter()
        .map(|field| {
            compiler
                .value_reader(&field.ty)
                .wrap_err_with(|| format!("building reader for field '{}'", field.name))
        })
        .collect()
}

/// Checks that every present row is a record of `ty`.
pub(super) fn records_of<'v>(
    ty: &StructuralType,
    rows: impl Iterator<Item = Option<&'v Value>>,
) -> Result<Vec<Option<&'v Record>>> {
    rows.map(|value| match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Struct(record)) => {
            ensure!(
                record.structural_type() == ty,
                "a record of {} cannot be stored as {}",
                record.structural_type(),
                ty
            );
            Ok(Some(record))
        }
        Some(other) => Err(mismatch("STRUCT", other)),
    })
    .collect()
}

/// Runs `write` once per field with that field's column of `records`.
pub(super) fn write_fields<F>(
    records: &[Option<&Record>],
    writers: &[ColumnWriter<Value>],
    mut write: F,
) -> Result<()>
where
    F: FnMut(usize, &ColumnWriter<Value>, &[Option<&Value>]) -> Result<()>,
{
    let mut column: Vec<Option<&Value>> = Vec::with_capacity(records.len());
    for (index, writer) in writers.iter().enumerate() {
        column.clear();
        column.extend(records.iter().map(|record| record.map(|r| &r.values()[index])));
        write(index, writer, &column)?;
    }
    Ok(())
}

fn struct_writer(compiler: &CodecCompiler, ty: &StructuralType) -> Result<ColumnWriter<Value>> {
    let writers = field_writers(compiler, ty)?;
    let ty = ty.clone();
    Ok(column_writer(move |rows: &[Option<&Value>], vector: &mut Vector, arena: &mut Arena| {
        ensure!(
            rows.len() <= vector.capacity(),
            "{} rows do not fit in a vector of {} slots",
            rows.len(),
            vector.capacity()
        );
        let records = records_of(&ty, rows.iter().copied())?;
        let mut validity = vector.validity_mut();
        for (row, record) in records.iter().enumerate() {
            validity.set(row, record.is_some());
        }
        write_fields(&records, &writers, |index, writer, column| {
            writer(column, vector.child_mut(index)?, arena)
        })
    }))
}

/// Zips per-field columns into records; rows absent from `present` are
/// `None`.
pub(super) fn assemble(
    shape: &Arc<RecordShape>,
    columns: Vec<Vec<Option<Value>>>,
    rows: usize,
    present: &[u64],
) -> Vec<Option<Record>> {
    let mut columns: Vec<_> = columns.into_iter().map(Vec::into_iter).collect();
    (0..rows)
        .map(|row| {
            let values: Vec<Value> = columns
                .iter_mut()
                .map(|column| column.next().flatten().unwrap_or(Value::Null))
                .collect();
            validity::is_valid(present, row)
                .then(|| Record::from_parts(Arc::clone(shape), values))
        })
        .collect()
}

fn struct_reader(compiler: &CodecCompiler, ty: &StructuralType) -> Result<ColumnReader<Value>> {
    let shape = RecordShape::of(ty)?;
    let readers = field_readers(compiler, ty)?;
    Ok(column_reader(move |vector: &Vector, rows: usize, filter: RowFilter<'_>| {
        ensure!(
            rows <= vector.capacity(),
            "cannot read {} rows from a vector of {} slots",
            rows,
            vector.capacity()
        );
        let present = validity::combine(filter, vector.validity(), rows);
        let columns = readers
            .iter()
            .enumerate()
            .map(|(index, reader)| reader(vector.child(index)?, rows, Some(&present)))
            .collect::<Result<Vec<_>>>()?;
        Ok(assemble(&shape, columns, rows, &present)
            .into_iter()
            .map(|record| record.map(Value::Struct))
            .collect())
    }))
}

