//! # Type Mapping
//!
//! This module connects application types to structural types. Rust has no
//! runtime reflection, so an application type opts in by implementing
//! [`Mapped`], usually through one of the declarative macros:
//!
//! | Application type | Shape | Implemented by |
//! |------------------|-------|----------------|
//! | `bool`, integers, floats, `String`, `Blob`, chrono, `Uuid` | `Primitive` | [`mapped_primitive!`](crate::mapped_primitive) |
//! | plain enum | `Primitive(UTINYINT / USMALLINT / UINTEGER)` or `VARCHAR` | [`mapped_enum!`](crate::mapped_enum) |
//! | bitmask enum | `Struct` of one `BOOLEAN` per bit | [`mapped_flags!`](crate::mapped_flags) |
//! | `Vec<T>`, `Box<[T]>`, `SmallVec<[T; N]>` | `List(T)` | built in |
//! | `[T; N]` | `FixedArray(T, N)` | built in |
//! | `Option<T>`, `Box<T>` | shape of `T` | built in |
//! | anything else | `Struct(fields)` | [`mapped_struct!`](crate::mapped_struct) |
//!
//! ## Mapping Flow
//!
//! ```text
//! TypeMapper::structural_type::<T>()
//!   └── shape::<T>()            cached per TypeId, cycle-checked
//!         └── T::shape(mapper)
//!               └── declared_fields::<T>()   FieldAccessor per member
//!                     └── structural_type::<F>()   recursion per member type
//! ```
//!
//! While descending, the mapper keeps the stack of types in progress. A type
//! that shows up again on its own stack is reported as
//! [`MappingError::RecursiveType`](crate::error::MappingError) listing the
//! cycle; `Option` and `Box` are transparent and never appear in it.
//!
//! ## Compatibility
//!
//! [`TypeMapper::check_compatible`] compares an application type with a
//! structural type before any codec is built. Primitive kinds must match
//! exactly, list and array elements recurse (array lengths must match) and
//! struct fields are matched by name. Reading tolerates extra columns and
//! missing nullable members; writing requires the same fields in the same
//! order.

mod containers;
mod ddl;
mod enums;
mod field;
mod mapper;
mod primitives;

#[cfg(test)]
mod tests;

pub use ddl::{create_table_sql, table_columns, ColumnDef};
pub use enums::{
    anonymous_label, check_enum, check_flags, enum_shape, flag_bits, flag_fields, EnumInfo,
    EnumRepr, MappedEnum, MappedFlags,
};
pub(crate) use enums::{label_of, resolve_label};
pub use field::{FieldAccessor, FieldId, Member};
pub use mapper::TypeMapper;
pub use primitives::Primitive;

use eyre::{bail, Result};

use crate::codec::{CodecCompiler, ColumnReader, ColumnWriter, RootReader};
use crate::error::MappingError;
use crate::types::{StructField, StructuralType};

/// Which way data flows through a codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Application values into vectors.
    Write,
    /// Vectors into application values.
    Read,
}

/// The database-side shape an application type maps to.
#[derive(Debug, Clone)]
pub enum Shape {
    Primitive(StructuralType),
    List(StructuralType),
    FixedArray(StructuralType, usize),
    Struct(Vec<FieldShape>),
}

#[derive(Debug, Clone)]
pub struct FieldShape {
    pub name: String,
    pub ty: StructuralType,
    pub nullable: bool,
}

impl Shape {
    pub fn structural_type(&self) -> StructuralType {
        match self {
            Shape::Primitive(ty) => ty.clone(),
            Shape::List(element) => StructuralType::list(element.clone()),
            Shape::FixedArray(element, length) => {
                StructuralType::fixed_array(element.clone(), *length)
            }
            Shape::Struct(fields) => StructuralType::structure(
                fields
                    .iter()
                    .map(|f| StructField::new(f.name.clone(), f.ty.clone())),
            ),
        }
    }

    pub fn is_struct(&self) -> bool {
        matches!(self, Shape::Struct(_))
    }
}

/// An application type that can be exchanged with vectors.
///
/// Implementations are generated by the `mapped_*` macros or provided for
/// standard containers; hand-written implementations are possible but must
/// keep `shape`, `check_compatible` and the codec builders consistent.
pub trait Mapped: Clone + Send + Sync + 'static {
    /// Whether a NULL can be represented without error (`Option`, sentinel
    /// primitives). Non-nullable members must be present when reading.
    const NULLABLE: bool = false;

    /// Wrappers that share the shape of their inner type (`Option`, `Box`)
    /// are skipped by cycle detection and the shape cache.
    const TRANSPARENT: bool = false;

    /// Name used in error messages and recursion cycles.
    fn type_name() -> String {
        short_type_name::<Self>()
    }

    fn shape(mapper: &mut TypeMapper) -> Result<Shape>;

    /// Members of a struct-shaped type in declaration order. Empty for every
    /// other shape.
    fn fields(_mapper: &mut TypeMapper) -> Result<Vec<FieldAccessor<Self>>> {
        Ok(Vec::new())
    }

    fn check_compatible(
        mapper: &mut TypeMapper,
        ty: &StructuralType,
        direction: Direction,
    ) -> Result<()>;

    fn build_writer(compiler: &CodecCompiler) -> Result<ColumnWriter<Self>>;

    fn build_reader(compiler: &CodecCompiler, ty: &StructuralType) -> Result<ColumnReader<Self>>;

    /// Root reader for a whole chunk. The default reads a single column;
    /// struct types read one column per member.
    fn build_root_reader(
        compiler: &CodecCompiler,
        ty: &StructuralType,
    ) -> Result<RootReader<Self>> {
        crate::codec::scalar_root_reader::<Self>(compiler, ty)
    }

    /// Whether this value stands for NULL.
    fn is_null(&self) -> bool {
        false
    }

    /// The value a NULL reads as, or `None` when NULL is an error.
    fn null() -> Option<Self> {
        None
    }
}

/// `std::any::type_name` with module paths stripped:
/// `alloc::vec::Vec<app::Node>` becomes `Vec<Node>`.
pub fn short_type_name<T: ?Sized>() -> String {
    let full = std::any::type_name::<T>();
    let mut out = String::with_capacity(full.len());
    let mut path = String::new();
    for ch in full.chars() {
        match ch {
            '<' | '>' | ',' | ' ' | '[' | ']' | ';' | '(' | ')' | '&' => {
                out.push_str(last_segment(&path));
                path.clear();
                out.push(ch);
            }
            _ => path.push(ch),
        }
    }
    out.push_str(last_segment(&path));
    out
}

fn last_segment(path: &str) -> &str {
    path.rsplit("::").next().unwrap_or(path)
}

/// Struct shape built from the declared members of `T`. Two members mapped
/// to the same column name are rejected.
pub fn struct_shape<T: Mapped>(mapper: &mut TypeMapper) -> Result<Shape> {
    let declared = mapper.declared_fields::<T>()?;
    let mut fields: Vec<FieldShape> = Vec::with_capacity(declared.len());
    for field in declared.iter() {
        if fields.iter().any(|f| f.name == field.name()) {
            bail!(MappingError::unsupported(
                T::type_name(),
                format!("column '{}' is mapped twice", field.name())
            ));
        }
        fields.push(FieldShape {
            name: field.name().to_string(),
            ty: field.structural_type().clone(),
            nullable: field.nullable(),
        });
    }
    Ok(Shape::Struct(fields))
}

/// Structural type of `T`, using a fresh mapper.
pub fn structural_type_of<T: Mapped>() -> Result<StructuralType> {
    TypeMapper::new().structural_type::<T>()
}
