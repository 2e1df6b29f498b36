//! Codecs for values stored directly in vector slots.

use eyre::ensure;

use super::{column_reader, column_writer, ColumnReader, ColumnWriter};
use crate::mapping::{Mapped, Primitive};
use crate::memory::{validity, Arena, RowFilter};
use crate::vector::Vector;

pub fn primitive_writer<P: Primitive + Mapped>() -> ColumnWriter<P> {
    column_writer(|rows: &[Option<&P>], vector: &mut Vector, arena: &mut Arena| {
        let (data, mut validity) = vector.data_and_validity_mut::<P::Native>()?;
        ensure!(
            rows.len() <= data.len(),
            "{} rows do not fit in a vector of {} slots",
            rows.len(),
            data.len()
        );
        for (row, (slot, value)) in data.iter_mut().zip(rows).enumerate() {
            match value {
                Some(value) if !value.is_nullish() => {
                    *slot = value.to_native(arena)?;
                    validity.set_valid(row);
                }
                _ => validity.set_invalid(row),
            }
        }
        Ok(())
    })
}

pub fn primitive_reader<P: Primitive + Mapped>() -> ColumnReader<P> {
    column_reader(|vector: &Vector, rows: usize, filter: RowFilter<'_>| {
        let data = vector.data::<P::Native>()?;
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
                    P::from_native(native).map(Some)
                } else {
                    Ok(None)
                }
            })
            .collect()
    })
}
