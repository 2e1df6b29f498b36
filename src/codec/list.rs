//! List and fixed-size array codecs.
//!
//! Both flatten the batch first: every present row's elements go into one
//! buffer in row order, and the element codec runs once over that buffer on
//! the child vector. A list row records `(offset, length)` into the child; an
//! array row owns `N` consecutive child slots.
//!
//! List readers tolerate entries that overlap or skip child elements. Every
//! element referenced by at least one present row is read once; the last row
//! that uses it takes it and earlier ones clone it.

use eyre::{bail, ensure, eyre, Result};

use super::{column_reader, column_writer, CodecCompiler, ColumnReader, ColumnWriter};
use crate::error::MappingError;
use crate::mapping::Mapped;
use crate::memory::{validity, Arena, RowFilter};
use crate::types::{StructuralType, TypeKind};
use crate::vector::{ListEntry, Vector};

pub fn list_writer<L, E>(compiler: &CodecCompiler) -> Result<ColumnWriter<L>>
where
    L: Mapped + AsRef<[E]> + FromIterator<E>,
    E: Mapped,
{
    let element = compiler.writer::<E>()?;
    Ok(column_writer(move |rows: &[Option<&L>], vector: &mut Vector, arena: &mut Arena| {
        let mut elements: Vec<Option<&E>> = Vec::new();
        {
            let (entries, mut validity) = vector.data_and_validity_mut::<ListEntry>()?;
            ensure!(
                rows.len() <= entries.len(),
                "{} rows do not fit in a vector of {} slots",
                rows.len(),
                entries.len()
            );
            for (row, (entry, value)) in entries.iter_mut().zip(rows).enumerate() {
                match value {
                    Some(list) => {
                        let items = AsRef::<[E]>::as_ref(*list);
                        *entry = ListEntry::new(elements.len(), items.len());
                        elements.extend(items.iter().map(Some));
                        validity.set_valid(row);
                    }
                    None => {
                        *entry = ListEntry::default();
                        validity.set_invalid(row);
                    }
                }
            }
        }

        vector.list_reserve(elements.len())?;
        element(&elements, vector.list_child_mut()?, arena)?;
        vector.set_list_size(elements.len())
    }))
}

pub fn list_reader<L, E>(compiler: &CodecCompiler, ty: &StructuralType) -> Result<ColumnReader<L>>
where
    L: Mapped + AsRef<[E]> + FromIterator<E>,
    E: Mapped,
{
    let TypeKind::List(element_ty) = ty.kind() else {
        bail!(MappingError::incompatible(L::type_name(), ty, "expected a list"));
    };
    let element = compiler.reader::<E>(element_ty)?;
    let element_name = E::type_name();

    Ok(column_reader(move |vector: &Vector, rows: usize, filter: RowFilter<'_>| {
        let entries = vector.data::<ListEntry>()?;
        ensure!(
            rows <= entries.len(),
            "cannot read {} rows from a vector of {} slots",
            rows,
            entries.len()
        );
        let present = validity::combine(filter, vector.validity(), rows);
        let is_present = |row: usize| validity::is_valid(&present, row);

        let mut total = 0;
        for row in (0..rows).filter(|&row| is_present(row)) {
            total = total.max(entries[row].end()?);
        }
        ensure!(
            total <= vector.list_size(),
            "list entries reach element {} but the list holds {}",
            total,
            vector.list_size()
        );

        let mut uses = vec![0u32; total];
        for row in (0..rows).filter(|&row| is_present(row)) {
            for index in entries[row].range()? {
                uses[index] += 1;
            }
        }
        let mut child_filter = validity::all_valid(total);
        for (index, count) in uses.iter().enumerate() {
            if *count == 0 {
                validity::set_invalid(&mut child_filter, index);
            }
        }

        let mut values = element(vector.list_child()?, total, Some(&child_filter)).map_err(|err| {
            MappingError::rebase_row(err, |index| {
                (0..rows)
                    .filter(|&row| is_present(row))
                    .find(|&row| entries[row].range().is_ok_and(|range| range.contains(&index)))
                    .unwrap_or(index)
            })
        })?;

        (0..rows)
            .map(|row| {
                if !is_present(row) {
                    return Ok(None);
                }
                entries[row]
                    .range()?
                    .map(|index| {
                        uses[index] -= 1;
                        let value = if uses[index] == 0 {
                            values[index].take()
                        } else {
                            values[index].clone()
                        };
                        value.or_else(E::null).ok_or_else(|| {
                            eyre!(MappingError::UnexpectedNull {
                                type_name: element_name.clone(),
                                row,
                            })
                        })
                    })
                    .collect::<Result<L>>()
                    .map(Some)
            })
            .collect()
    }))
}

pub fn array_writer<E: Mapped, const N: usize>(
    compiler: &CodecCompiler,
) -> Result<ColumnWriter<[E; N]>> {
    let element = compiler.writer::<E>()?;
    Ok(column_writer(move |rows: &[Option<&[E; N]>], vector: &mut Vector, arena: &mut Arena| {
        ensure!(
            rows.len() <= vector.capacity(),
            "{} rows do not fit in a vector of {} slots",
            rows.len(),
            vector.capacity()
        );
        let mut elements: Vec<Option<&E>> = Vec::with_capacity(rows.len() * N);
        let mut validity = vector.validity_mut();
        for (row, value) in rows.iter().enumerate() {
            match value {
                Some(items) => {
                    elements.extend(items.iter().map(Some));
                    validity.set_valid(row);
                }
                None => {
                    elements.extend((0..N).map(|_| None));
                    validity.set_invalid(row);
                }
            }
        }
        element(&elements, vector.array_child_mut()?, arena)
    }))
}

pub fn array_reader<E: Mapped, const N: usize>(
    compiler: &CodecCompiler,
    ty: &StructuralType,
) -> Result<ColumnReader<[E; N]>> {
    let element_ty = match ty.kind() {
        TypeKind::FixedArray { element, length } if *length == N => element.clone(),
        _ => bail!(MappingError::incompatible(
            <[E; N]>::type_name(),
            ty,
            format!("expected a fixed-size array of {} elements", N)
        )),
    };
    let element = compiler.reader::<E>(&element_ty)?;
    let element_name = E::type_name();

    Ok(column_reader(move |vector: &Vector, rows: usize, filter: RowFilter<'_>| {
        ensure!(
            rows <= vector.capacity(),
            "cannot read {} rows from a vector of {} slots",
            rows,
            vector.capacity()
        );
        let present = validity::combine(filter, vector.validity(), rows);
        let child_filter = validity::expand(&present, rows, N);
        let mut values = element(vector.array_child()?, rows * N, Some(&child_filter))
            .map_err(|err| MappingError::rebase_row(err, |index| index / N))?
            .into_iter();

        (0..rows)
            .map(|row| {
                let slots: Vec<Option<E>> = values.by_ref().take(N).collect();
                if !validity::is_valid(&present, row) {
                    return Ok(None);
                }
                let items = slots
                    .into_iter()
                    .map(|value| {
                        value.ok_or_else(|| {
                            eyre!(MappingError::UnexpectedNull {
                                type_name: element_name.clone(),
                                row,
                            })
                        })
                    })
                    .collect::<Result<Vec<E>>>()?;
                let array: [E; N] = items
                    .try_into()
                    .map_err(|_| eyre!("array row {} does not hold {} elements", row, N))?;
                Ok(Some(array))
            })
            .collect()
    }))
}
