//! Mapped implementations for standard containers.
//!
//! `Option<T>` and `Box<T>` share the shape of `T`. Growable sequences map
//! to `List(T)` and arrays to `FixedArray(T, N)`.

use eyre::{bail, Result};
use smallvec::{Array, SmallVec};

use super::{Direction, Mapped, Shape, TypeMapper};
use crate::codec::{
    array_reader, array_writer, column_reader, column_writer, list_reader, list_writer,
    CodecCompiler, ColumnReader, ColumnWriter,
};
use crate::error::MappingError;
use crate::types::{StructuralType, TypeKind};

impl<T: Mapped> Mapped for Option<T> {
    const NULLABLE: bool = true;
    const TRANSPARENT: bool = true;

    fn type_name() -> String {
        format!("Option<{}>", T::type_name())
    }

    fn shape(mapper: &mut TypeMapper) -> Result<Shape> {
        Ok((*mapper.shape::<T>()?).clone())
    }

    fn check_compatible(
        mapper: &mut TypeMapper,
        ty: &StructuralType,
        direction: Direction,
    ) -> Result<()> {
        T::check_compatible(mapper, ty, direction)
    }

    fn build_writer(compiler: &CodecCompiler) -> Result<ColumnWriter<Self>> {
        let inner = compiler.writer::<T>()?;
        Ok(column_writer(move |rows: &[Option<&Option<T>>], vector, arena| {
            let values: Vec<Option<&T>> = rows.iter().map(|row| row.and_then(Option::as_ref)).collect();
            inner(&values, vector, arena)
        }))
    }

    fn build_reader(compiler: &CodecCompiler, ty: &StructuralType) -> Result<ColumnReader<Self>> {
        let inner = compiler.reader::<T>(ty)?;
        Ok(column_reader(move |vector, rows, filter| {
            Ok(inner(vector, rows, filter)?
                .into_iter()
                .map(|value| value.map(Some))
                .collect())
        }))
    }

    fn is_null(&self) -> bool {
        self.as_ref().map_or(true, T::is_null)
    }

    fn null() -> Option<Self> {
        Some(None)
    }
}

impl<T: Mapped> Mapped for Box<T> {
    const NULLABLE: bool = T::NULLABLE;
    const TRANSPARENT: bool = true;

    fn type_name() -> String {
        format!("Box<{}>", T::type_name())
    }

    fn shape(mapper: &mut TypeMapper) -> Result<Shape> {
        Ok((*mapper.shape::<T>()?).clone())
    }

    fn check_compatible(
        mapper: &mut TypeMapper,
        ty: &StructuralType,
        direction: Direction,
    ) -> Result<()> {
        T::check_compatible(mapper, ty, direction)
    }

    fn build_writer(compiler: &CodecCompiler) -> Result<ColumnWriter<Self>> {
        let inner = compiler.writer::<T>()?;
        Ok(column_writer(move |rows: &[Option<&Box<T>>], vector, arena| {
            let values: Vec<Option<&T>> = rows.iter().map(|row| row.map(|b| &**b)).collect();
            inner(&values, vector, arena)
        }))
    }

    fn build_reader(compiler: &CodecCompiler, ty: &StructuralType) -> Result<ColumnReader<Self>> {
        let inner = compiler.reader::<T>(ty)?;
        Ok(column_reader(move |vector, rows, filter| {
            Ok(inner(vector, rows, filter)?
                .into_iter()
                .map(|value| value.map(Box::new))
                .collect())
        }))
    }

    fn is_null(&self) -> bool {
        (**self).is_null()
    }

    fn null() -> Option<Self> {
        T::null().map(Box::new)
    }
}

/// List compatibility: `ty` must be a list whose element `E` accepts.
fn check_list<E: Mapped>(
    type_name: &str,
    mapper: &mut TypeMapper,
    ty: &StructuralType,
    direction: Direction,
) -> Result<()> {
    match ty.kind() {
        TypeKind::List(element) => E::check_compatible(mapper, element, direction),
        _ => bail!(MappingError::incompatible(
            type_name,
            ty,
            "expected a list"
        )),
    }
}

macro_rules! list_codecs {
    ($element:ty) => {
        fn shape(mapper: &mut TypeMapper) -> Result<Shape> {
            Ok(Shape::List(mapper.structural_type::<$element>()?))
        }

        fn check_compatible(
            mapper: &mut TypeMapper,
            ty: &StructuralType,
            direction: Direction,
        ) -> Result<()> {
            check_list::<$element>(&Self::type_name(), mapper, ty, direction)
        }

        fn build_writer(compiler: &CodecCompiler) -> Result<ColumnWriter<Self>> {
            list_writer::<Self, $element>(compiler)
        }

        fn build_reader(compiler: &CodecCompiler, ty: &StructuralType) -> Result<ColumnReader<Self>> {
            list_reader::<Self, $element>(compiler, ty)
        }
    };
}

impl<E: Mapped> Mapped for Vec<E> {
    list_codecs!(E);
}

impl<E: Mapped> Mapped for Box<[E]> {
    list_codecs!(E);
}

impl<A> Mapped for SmallVec<A>
where
    A: Array + Send + Sync + 'static,
    A::Item: Mapped,
{
    list_codecs!(A::Item);
}

impl<E: Mapped, const N: usize> Mapped for [E; N] {
    fn shape(mapper: &mut TypeMapper) -> Result<Shape> {
        reject_nullable_elements::<E, N>()?;
        Ok(Shape::FixedArray(mapper.structural_type::<E>()?, N))
    }

    fn check_compatible(
        mapper: &mut TypeMapper,
        ty: &StructuralType,
        direction: Direction,
    ) -> Result<()> {
        reject_nullable_elements::<E, N>()?;
        match ty.kind() {
            TypeKind::FixedArray { element, length } if *length == N => {
                E::check_compatible(mapper, element, direction)
            }
            TypeKind::FixedArray { length, .. } => bail!(MappingError::incompatible(
                Self::type_name(),
                ty,
                format!("expected {} elements, found {}", N, length)
            )),
            _ => bail!(MappingError::incompatible(
                Self::type_name(),
                ty,
                "expected a fixed-size array"
            )),
        }
    }

    fn build_writer(compiler: &CodecCompiler) -> Result<ColumnWriter<Self>> {
        array_writer::<E, N>(compiler)
    }

    fn build_reader(compiler: &CodecCompiler, ty: &StructuralType) -> Result<ColumnReader<Self>> {
        array_reader::<E, N>(compiler, ty)
    }
}

fn reject_nullable_elements<E: Mapped, const N: usize>() -> Result<()> {
    if E::NULLABLE {
        bail!(MappingError::unsupported(
            <[E; N]>::type_name(),
            "fixed-size arrays of nullable elements are not supported"
        ));
    }
    Ok(())
}
