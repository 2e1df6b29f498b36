//! Enum codecs.
//!
//! Writers store either the member's ordinal in the enum's unsigned width or
//! its label as `VARCHAR`. Readers additionally accept a native `ENUM`
//! column, translating dictionary indices through a table built here once.

use eyre::{bail, ensure, eyre, Result};

use super::{column_reader, column_writer, ColumnReader, ColumnWriter};
use crate::error::MappingError;
use crate::mapping::{anonymous_label, label_of, resolve_label, EnumInfo, Mapped, MappedEnum};
use crate::memory::{validity, Arena, RowFilter, StringRef};
use crate::types::{enum_physical_kind, PrimitiveKind, StructuralType};
use crate::vector::{NativeValue, Vector};

pub fn enum_writer<E: MappedEnum + Mapped>() -> Result<ColumnWriter<E>> {
    let info = EnumInfo::of::<E>()?;
    Ok(match info.kind {
        PrimitiveKind::Varchar => label_writer::<E>(),
        PrimitiveKind::UTinyInt => ordinal_writer::<E, u8>(info),
        PrimitiveKind::USmallInt => ordinal_writer::<E, u16>(info),
        _ => ordinal_writer::<E, u32>(info),
    })
}

fn ordinal_writer<E, N>(info: EnumInfo) -> ColumnWriter<E>
where
    E: MappedEnum + Mapped,
    N: NativeValue + TryFrom<i64>,
{
    column_writer(move |rows: &[Option<&E>], vector: &mut Vector, _arena: &mut Arena| {
        let (data, mut validity) = vector.data_and_validity_mut::<N>()?;
        ensure!(
            rows.len() <= data.len(),
            "{} rows do not fit in a vector of {} slots",
            rows.len(),
            data.len()
        );
        for (row, (slot, value)) in data.iter_mut().zip(rows).enumerate() {
            let Some(value) = value else {
                validity.set_invalid(row);
                continue;
            };
            let ordinal = value.ordinal();
            let native = (0..=info.max_ordinal)
                .contains(&ordinal)
                .then(|| N::try_from(ordinal).ok())
                .flatten();
            let Some(native) = native else {
                bail!(MappingError::EnumOutOfRange {
                    type_name: E::type_name(),
                    value: ordinal,
                    max_ordinal: info.max_ordinal,
                });
            };
            *slot = native;
            validity.set_valid(row);
        }
        Ok(())
    })
}

fn label_writer<E: MappedEnum + Mapped>() -> ColumnWriter<E> {
    column_writer(|rows: &[Option<&E>], vector: &mut Vector, arena: &mut Arena| {
        let (data, mut validity) = vector.data_and_validity_mut::<StringRef>()?;
        ensure!(
            rows.len() <= data.len(),
            "{} rows do not fit in a vector of {} slots",
            rows.len(),
            data.len()
        );
        for (row, (slot, value)) in data.iter_mut().zip(rows).enumerate() {
            match value {
                Some(value) => {
                    *slot = StringRef::encode(label_of(*value).as_bytes(), arena)?;
                    validity.set_valid(row);
                }
                None => validity.set_invalid(row),
            }
        }
        Ok(())
    })
}

/// Reader for `ty`, which `check_enum` has already accepted.
pub fn enum_reader<E: MappedEnum + Mapped>(ty: &StructuralType) -> Result<ColumnReader<E>> {
    if let Some(labels) = ty.enum_labels() {
        let members = labels
            .iter()
            .map(|label| {
                resolve_label::<E>(label).ok_or_else(|| {
                    eyre!(MappingError::incompatible(
                        E::type_name(),
                        ty,
                        format!("label '{}' has no matching member", label)
                    ))
                })
            })
            .collect::<Result<Vec<E>>>()?;
        return Ok(match enum_physical_kind(labels.len()) {
            PrimitiveKind::UTinyInt => dictionary_reader::<E, u8>(members),
            PrimitiveKind::USmallInt => dictionary_reader::<E, u16>(members),
            _ => dictionary_reader::<E, u32>(members),
        });
    }

    Ok(match ty.as_primitive() {
        Some(PrimitiveKind::Varchar) => label_reader::<E>(),
        Some(PrimitiveKind::UTinyInt) => ordinal_reader::<E, u8>(),
        Some(PrimitiveKind::USmallInt) => ordinal_reader::<E, u16>(),
        Some(PrimitiveKind::UInteger) => ordinal_reader::<E, u32>(),
        _ => bail!(MappingError::incompatible(
            E::type_name(),
            ty,
            "expected an unsigned integer, ENUM or VARCHAR column"
        )),
    })
}

/// Shared row loop: decodes every row present under both `filter` and the
/// vector's own validity.
fn read_rows<N, E, F>(
    vector: &Vector,
    rows: usize,
    filter: RowFilter<'_>,
    decode: F,
) -> Result<Vec<Option<E>>>
where
    N: NativeValue,
    F: Fn(&N) -> Result<E>,
{
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
            if validity::is_valid(&present, row) {
                decode(native).map(Some)
            } else {
                Ok(None)
            }
        })
        .collect()
}

fn ordinal_reader<E, N>() -> ColumnReader<E>
where
    E: MappedEnum + Mapped,
    N: NativeValue + Into<u64>,
{
    column_reader(|vector: &Vector, rows: usize, filter: RowFilter<'_>| {
        read_rows::<N, E, _>(vector, rows, filter, |native| {
            let ordinal = Into::<u64>::into(*native) as i64;
            E::from_ordinal(ordinal).ok_or_else(|| {
                eyre!(MappingError::UnknownEnumLabel {
                    type_name: E::type_name(),
                    label: anonymous_label(ordinal),
                })
            })
        })
    })
}

fn dictionary_reader<E, N>(members: Vec<E>) -> ColumnReader<E>
where
    E: MappedEnum + Mapped,
    N: NativeValue + Into<u64>,
{
    column_reader(move |vector: &Vector, rows: usize, filter: RowFilter<'_>| {
        read_rows::<N, E, _>(vector, rows, filter, |native| {
            let index = Into::<u64>::into(*native) as usize;
            members.get(index).copied().ok_or_else(|| {
                eyre!(
                    "enum dictionary index {} is out of range for {} labels",
                    index,
                    members.len()
                )
            })
        })
    })
}

fn label_reader<E: MappedEnum + Mapped>() -> ColumnReader<E> {
    column_reader(|vector: &Vector, rows: usize, filter: RowFilter<'_>| {
        read_rows::<StringRef, E, _>(vector, rows, filter, |native| {
            // SAFETY: only present rows are decoded; their bytes are owned by
            // the memory backing the vector being read.
            let bytes = unsafe { native.as_bytes() };
            let label = String::from_utf8_lossy(bytes);
            resolve_label::<E>(&label).ok_or_else(|| {
                eyre!(MappingError::UnknownEnumLabel {
                    type_name: E::type_name(),
                    label: label.into_owned(),
                })
            })
        })
    })
}
