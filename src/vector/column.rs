//! `Vector`: one column of one batch.

use std::mem::size_of;

use eyre::{bail, ensure, eyre, Result};
use zerocopy::{FromBytes, IntoBytes};

use super::{LogicalType, NativeValue};
use crate::config::{STRING_INLINE_LENGTH, VECTOR_DATA_ALIGNMENT};
use crate::memory::validity::{self, RowFilter};
use crate::memory::StringRef;

const _: () = assert!(size_of::<u128>() == VECTOR_DATA_ALIGNMENT);

pub struct Vector {
    logical_type: LogicalType,
    capacity: usize,
    data: Vec<u128>,
    validity: Option<Vec<u64>>,
    children: Vec<Vector>,
    list_size: usize,
    heap: Vec<Box<[u8]>>,
}

/// Lazily materialized validity of a vector, borrowed alongside its data.
pub struct ValidityMut<'a> {
    words: &'a mut Option<Vec<u64>>,
    rows: usize,
}

impl ValidityMut<'_> {
    pub fn set_invalid(&mut self, row: usize) {
        let rows = self.rows;
        let words = self.words.get_or_insert_with(|| validity::all_valid(rows));
        validity::set_invalid(words, row);
    }

    pub fn set_valid(&mut self, row: usize) {
        if let Some(words) = self.words.as_mut() {
            validity::set_valid(words, row);
        }
    }

    #[inline]
    pub fn set(&mut self, row: usize, valid: bool) {
        if valid {
            self.set_valid(row)
        } else {
            self.set_invalid(row)
        }
    }

    /// Materializes the words (all present) and returns them.
    pub fn words(&mut self) -> &mut [u64] {
        let rows = self.rows;
        self.words.get_or_insert_with(|| validity::all_valid(rows))
    }
}

impl Vector {
    pub fn new(logical_type: LogicalType, capacity: usize) -> Self {
        let children = match &logical_type {
            LogicalType::Struct(fields) => fields
                .iter()
                .map(|(_, ty)| Vector::new(ty.clone(), capacity))
                .collect(),
            LogicalType::List(element) => vec![Vector::new((**element).clone(), capacity)],
            LogicalType::Array(element, length) => {
                vec![Vector::new((**element).clone(), capacity * length)]
            }
            _ => Vec::new(),
        };
        let words = data_words(logical_type.physical_width(), capacity);

        Self {
            logical_type,
            capacity,
            data: vec![0u128; words],
            validity: None,
            children,
            list_size: 0,
            heap: Vec::new(),
        }
    }

    pub fn logical_type(&self) -> &LogicalType {
        &self.logical_type
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn check_width<N: NativeValue>(&self) -> Result<()> {
        let width = self.logical_type.physical_width();
        ensure!(
            width != 0 && width == size_of::<N>(),
            "cannot view {:?} vector as {}-byte values (slot width {})",
            self.logical_type,
            size_of::<N>(),
            width
        );
        Ok(())
    }

    /// Typed view over the whole data buffer (`capacity` slots).
    pub fn data<N: NativeValue>(&self) -> Result<&[N]> {
        self.check_width::<N>()?;
        let len = self.capacity * size_of::<N>();
        <[N]>::ref_from_bytes(&self.data.as_bytes()[..len])
            .map_err(|_| eyre!("vector data is not aligned for {}", std::any::type_name::<N>()))
    }

    pub fn data_mut<N: NativeValue>(&mut self) -> Result<&mut [N]> {
        self.check_width::<N>()?;
        let len = self.capacity * size_of::<N>();
        <[N]>::mut_from_bytes(&mut self.data.as_mut_bytes()[..len])
            .map_err(|_| eyre!("vector data is not aligned for {}", std::any::type_name::<N>()))
    }

    /// Data and validity borrowed together, the way a column writer fills them.
    pub fn data_and_validity_mut<N: NativeValue>(
        &mut self,
    ) -> Result<(&mut [N], ValidityMut<'_>)> {
        self.check_width::<N>()?;
        let len = self.capacity * size_of::<N>();
        let data = <[N]>::mut_from_bytes(&mut self.data.as_mut_bytes()[..len])
            .map_err(|_| eyre!("vector data is not aligned for {}", std::any::type_name::<N>()))?;
        let validity = ValidityMut {
            words: &mut self.validity,
            rows: self.capacity,
        };
        Ok((data, validity))
    }

    /// Validity words, or `None` when every row is present.
    pub fn validity(&self) -> Option<&[u64]> {
        self.validity.as_deref()
    }

    pub fn validity_mut(&mut self) -> ValidityMut<'_> {
        ValidityMut {
            words: &mut self.validity,
            rows: self.capacity,
        }
    }

    pub fn is_valid(&self, row: usize) -> bool {
        validity::row_is_valid(self.validity(), row)
    }

    pub fn set_null(&mut self, row: usize) {
        self.validity_mut().set_invalid(row)
    }

    pub fn child(&self, index: usize) -> Result<&Vector> {
        match &self.logical_type {
            LogicalType::Struct(_) => self
                .children
                .get(index)
                .ok_or_else(|| eyre!("struct vector has no child {}", index)),
            other => bail!("{:?} vector has no struct children", other),
        }
    }

    pub fn child_mut(&mut self, index: usize) -> Result<&mut Vector> {
        match &self.logical_type {
            LogicalType::Struct(_) => self
                .children
                .get_mut(index)
                .ok_or_else(|| eyre!("struct vector has no child {}", index)),
            other => bail!("{:?} vector has no struct children", other),
        }
    }

    pub fn child_count(&self) -> usize {
        match self.logical_type {
            LogicalType::Struct(_) => self.children.len(),
            _ => 0,
        }
    }

    pub fn list_child(&self) -> Result<&Vector> {
        ensure!(
            matches!(self.logical_type, LogicalType::List(_)),
            "{:?} vector is not a list",
            self.logical_type
        );
        self.children
            .first()
            .ok_or_else(|| eyre!("list vector has no child"))
    }

    pub fn list_child_mut(&mut self) -> Result<&mut Vector> {
        ensure!(
            matches!(self.logical_type, LogicalType::List(_)),
            "{:?} vector is not a list",
            self.logical_type
        );
        self.children
            .first_mut()
            .ok_or_else(|| eyre!("list vector has no child"))
    }

    pub fn array_child(&self) -> Result<&Vector> {
        ensure!(
            matches!(self.logical_type, LogicalType::Array(..)),
            "{:?} vector is not a fixed array",
            self.logical_type
        );
        self.children
            .first()
            .ok_or_else(|| eyre!("array vector has no child"))
    }

    pub fn array_child_mut(&mut self) -> Result<&mut Vector> {
        ensure!(
            matches!(self.logical_type, LogicalType::Array(..)),
            "{:?} vector is not a fixed array",
            self.logical_type
        );
        self.children
            .first_mut()
            .ok_or_else(|| eyre!("array vector has no child"))
    }

    /// Number of elements in use in the list child.
    pub fn list_size(&self) -> usize {
        self.list_size
    }

    /// Makes room for `required` elements in the list child.
    pub fn list_reserve(&mut self, required: usize) -> Result<()> {
        let child = self.list_child_mut()?;
        if child.capacity < required {
            child.grow(required.next_power_of_two());
        }
        Ok(())
    }

    pub fn set_list_size(&mut self, size: usize) -> Result<()> {
        let capacity = self.list_child()?.capacity;
        ensure!(
            size <= capacity,
            "list size {} exceeds reserved child capacity {}",
            size,
            capacity
        );
        self.list_size = size;
        Ok(())
    }

    fn grow(&mut self, capacity: usize) {
        let words = data_words(self.logical_type.physical_width(), capacity);
        self.data.resize(words, 0);
        if let Some(validity) = self.validity.as_mut() {
            validity.resize(validity::entry_count(capacity), u64::MAX);
        }
        match &self.logical_type {
            LogicalType::Struct(_) => self.children.iter_mut().for_each(|c| c.grow(capacity)),
            LogicalType::Array(_, length) => {
                let length = *length;
                self.children
                    .iter_mut()
                    .for_each(|c| c.grow(capacity * length))
            }
            _ => {}
        }
        self.capacity = capacity;
    }

    /// Stores a string the way the engine does when it copies a value: short
    /// strings inline, long ones in the vector's own heap.
    pub fn set_string(&mut self, row: usize, bytes: &[u8]) -> Result<()> {
        ensure!(
            self.logical_type.is_variable(),
            "{:?} vector does not hold strings",
            self.logical_type
        );
        let value = if bytes.len() <= STRING_INLINE_LENGTH {
            StringRef::inlined(bytes)?
        } else {
            let owned: Box<[u8]> = bytes.into();
            // SAFETY: the boxed bytes are kept in `heap` until reset or drop,
            // and moving the box does not move its contents.
            let value = unsafe { StringRef::from_raw_parts(owned.as_ptr(), owned.len())? };
            self.heap.push(owned);
            value
        };
        let slot = self
            .data_mut::<StringRef>()?
            .get_mut(row)
            .ok_or_else(|| eyre!("row {} is out of range", row))?;
        *slot = value;
        Ok(())
    }

    /// Clears validity, list sizes and owned strings for reuse. Data slots
    /// keep stale values that are overwritten by the next batch.
    pub fn reset(&mut self) {
        self.validity = None;
        self.list_size = 0;
        self.heap.clear();
        self.children.iter_mut().for_each(Vector::reset);
    }

    /// Copies the first `rows` rows into a vector that owns all of its data,
    /// including out-of-line strings.
    pub fn deep_copy(&self, rows: usize) -> Result<Vector> {
        self.copy_rows(rows, None)
    }

    fn copy_rows(&self, rows: usize, filter: RowFilter<'_>) -> Result<Vector> {
        ensure!(
            rows <= self.capacity,
            "cannot copy {} rows from a vector of capacity {}",
            rows,
            self.capacity
        );
        let width = self.logical_type.physical_width();
        let mut copy = Vector {
            logical_type: self.logical_type.clone(),
            capacity: rows,
            data: vec![0u128; data_words(width, rows)],
            validity: self
                .validity
                .as_ref()
                .map(|words| words[..validity::entry_count(rows)].to_vec()),
            children: Vec::new(),
            list_size: 0,
            heap: Vec::new(),
        };
        let len = rows * width;
        copy.data.as_mut_bytes()[..len].copy_from_slice(&self.data.as_bytes()[..len]);

        let present = validity::combine(filter, self.validity(), rows);
        match &self.logical_type {
            LogicalType::Struct(_) => {
                copy.children = self
                    .children
                    .iter()
                    .map(|c| c.copy_rows(rows, Some(&present)))
                    .collect::<Result<_>>()?;
            }
            LogicalType::Array(_, length) => {
                let expanded = validity::expand(&present, rows, *length);
                copy.children = vec![self.array_child()?.copy_rows(rows * length, Some(&expanded))?];
            }
            LogicalType::List(_) => {
                copy.list_size = self.list_size;
                copy.children = vec![self.list_child()?.copy_rows(self.list_size, None)?];
            }
            ty if ty.is_variable() => {
                let strings = self.data::<StringRef>()?;
                for (row, value) in strings.iter().enumerate().take(rows) {
                    if value.is_inlined() || !validity::is_valid(&present, row) {
                        continue;
                    }
                    // SAFETY: present rows reference arena or engine memory
                    // that the producer keeps alive while the chunk is consumed.
                    let bytes = unsafe { value.as_bytes() };
                    copy.set_string(row, bytes)?;
                }
            }
            _ => {}
        }
        Ok(copy)
    }
}

fn data_words(width: usize, capacity: usize) -> usize {
    (width * capacity).div_ceil(VECTOR_DATA_ALIGNMENT)
}

impl std::fmt::Debug for Vector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vector")
            .field("type", &self.logical_type)
            .field("capacity", &self.capacity)
            .field("has_validity", &self.validity.is_some())
            .field("list_size", &self.list_size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::Arena;
    use crate::types::PrimitiveKind;
    use crate::vector::ListEntry;

    fn ints(capacity: usize) -> Vector {
        Vector::new(PrimitiveKind::Integer.into(), capacity)
    }

    #[test]
    fn typed_views_check_width() {
        let mut v = ints(8);
        v.data_mut::<i32>().unwrap()[3] = 42;
        assert_eq!(v.data::<i32>().unwrap()[3], 42);
        assert_eq!(v.data::<i32>().unwrap().len(), 8);
        assert!(v.data::<i64>().is_err());
    }

    #[test]
    fn validity_is_lazy() {
        let mut v = ints(100);
        assert!(v.validity().is_none());
        v.validity_mut().set_valid(3);
        assert!(v.validity().is_none());

        v.set_null(70);
        assert!(!v.is_valid(70));
        assert!(v.is_valid(69));
        assert_eq!(v.validity().unwrap().len(), 2);
    }

    #[test]
    fn list_reserve_grows_child() {
        let mut v = Vector::new(LogicalType::list(PrimitiveKind::BigInt.into()), 4);
        assert_eq!(v.list_child().unwrap().capacity(), 4);

        v.list_reserve(5000).unwrap();
        assert!(v.list_child().unwrap().capacity() >= 5000);
        v.set_list_size(5000).unwrap();
        v.list_child_mut().unwrap().data_mut::<i64>().unwrap()[4999] = 7;
        assert_eq!(v.list_size(), 5000);
        assert!(v.set_list_size(1 << 20).is_err());
    }

    #[test]
    fn children_are_typed() {
        let v = Vector::new(
            LogicalType::structure([("a", PrimitiveKind::Integer.into())]),
            4,
        );
        assert!(v.child(0).is_ok());
        assert!(v.child(1).is_err());
        assert!(v.list_child().is_err());
        assert!(v.data::<u8>().is_err());

        let a = Vector::new(LogicalType::array(PrimitiveKind::Double.into(), 3), 4);
        assert_eq!(a.array_child().unwrap().capacity(), 12);
    }

    #[test]
    fn deep_copy_rehomes_long_strings() {
        let mut arena = Arena::new();
        let mut v = Vector::new(PrimitiveKind::Varchar.into(), 4);
        {
            let slots = v.data_mut::<StringRef>().unwrap();
            slots[0] = StringRef::encode(b"short", &mut arena).unwrap();
            slots[1] = StringRef::encode(b"definitely longer than twelve", &mut arena).unwrap();
        }
        v.set_null(2);

        let copy = v.deep_copy(3).unwrap();
        drop(arena);

        let slots = copy.data::<StringRef>().unwrap();
        assert_eq!(unsafe { slots[0].as_bytes() }, b"short");
        assert_eq!(unsafe { slots[1].as_bytes() }, b"definitely longer than twelve");
        assert!(!copy.is_valid(2));
    }

    #[test]
    fn deep_copy_keeps_list_child() {
        let mut v = Vector::new(LogicalType::list(PrimitiveKind::Integer.into()), 2);
        v.data_mut::<ListEntry>().unwrap()[0] = ListEntry::new(0, 2);
        v.data_mut::<ListEntry>().unwrap()[1] = ListEntry::new(2, 1);
        v.list_reserve(3).unwrap();
        v.list_child_mut()
            .unwrap()
            .data_mut::<i32>()
            .unwrap()[..3]
            .copy_from_slice(&[1, 2, 3]);
        v.set_list_size(3).unwrap();

        let copy = v.deep_copy(2).unwrap();
        assert_eq!(copy.list_size(), 3);
        assert_eq!(&copy.list_child().unwrap().data::<i32>().unwrap()[..3], &[1, 2, 3]);
        assert_eq!(copy.data::<ListEntry>().unwrap()[1], ListEntry::new(2, 1));
    }

    #[test]
    fn reset_clears_validity_and_list_size() {
        let mut v = Vector::new(LogicalType::list(PrimitiveKind::Integer.into()), 2);
        v.set_null(1);
        v.set_list_size(1).unwrap();
        v.reset();
        assert!(v.validity().is_none());
        assert_eq!(v.list_size(), 0);
    }
}
