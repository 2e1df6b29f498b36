//! # Mapping Macros
//!
//! Rust has no runtime reflection, so the member lists and codec wiring that
//! the mapper needs are generated here at compile time.
//!
//! ## mapped_struct!
//!
//! Defines a struct and implements `Mapped` for it. Members map to columns of
//! the same name unless renamed with `as "column"`.
//!
//! ```ignore
//! duckrow::mapped_struct! {
//!     #[derive(Debug, Clone, Default, PartialEq)]
//!     pub struct Order {
//!         pub id: i64,
//!         pub customer: String as "customer_name",
//!         pub tags: Vec<String>,
//!         pub shipped: Option<chrono::NaiveDate>,
//!     }
//! }
//! ```
//!
//! The struct must implement `Clone` and `Default`; reading starts from
//! `Default` and sets every member that has a column.
//!
//! ## impl_mapped_struct!
//!
//! Implements `Mapped` for an existing struct. Members listed as
//! `readonly` are written but never read back:
//!
//! ```ignore
//! duckrow::impl_mapped_struct!(Order { id, customer as "customer_name", readonly total });
//! ```
//!
//! ## mapped_enum!
//!
//! ```ignore
//! duckrow::mapped_enum! {
//!     #[derive(Debug)]
//!     pub enum Status: u8 { Pending, Shipped = 5, Returned }
//! }
//!
//! duckrow::mapped_enum! {
//!     pub enum Color: u8 as text { Red, Green, Blue }
//! }
//! ```
//!
//! Generates `Clone`, `Copy`, `PartialEq`, `Eq`, `Hash` and a `Default` of the
//! first variant.
//!
//! ## mapped_flags!
//!
//! ```ignore
//! duckrow::mapped_flags! {
//!     pub struct Access: u8 {
//!         const READ = 1;
//!         const WRITE = 2;
//!         const ALL = 3;
//!     }
//! }
//! ```
//!
//! Maps to `STRUCT(READ BOOLEAN, WRITE BOOLEAN)`.

/// Implements `Mapped` for types that also implement `Primitive`.
#[macro_export]
macro_rules! mapped_primitive {
    ($($ty:ty),* $(,)?) => {
        $(
            impl $crate::mapping::Mapped for $ty {
                const NULLABLE: bool = <$ty as $crate::mapping::Primitive>::SENTINEL;

                fn shape(
                    _mapper: &mut $crate::mapping::TypeMapper,
                ) -> $crate::eyre::Result<$crate::mapping::Shape> {
                    Ok($crate::mapping::Shape::Primitive(
                        $crate::types::StructuralType::primitive(
                            <$ty as $crate::mapping::Primitive>::KIND,
                        ),
                    ))
                }

                fn check_compatible(
                    mapper: &mut $crate::mapping::TypeMapper,
                    ty: &$crate::types::StructuralType,
                    _direction: $crate::mapping::Direction,
                ) -> $crate::eyre::Result<()> {
                    mapper.check_exact::<Self>(ty)
                }

                fn build_writer(
                    _compiler: &$crate::codec::CodecCompiler,
                ) -> $crate::eyre::Result<$crate::codec::ColumnWriter<Self>> {
                    Ok($crate::codec::primitive_writer::<Self>())
                }

                fn build_reader(
                    _compiler: &$crate::codec::CodecCompiler,
                    _ty: &$crate::types::StructuralType,
                ) -> $crate::eyre::Result<$crate::codec::ColumnReader<Self>> {
                    Ok($crate::codec::primitive_reader::<Self>())
                }

                fn is_null(&self) -> bool {
                    <Self as $crate::mapping::Primitive>::is_nullish(self)
                }

                fn null() -> Option<Self> {
                    <Self as $crate::mapping::Primitive>::nullish()
                }
            }
        )*
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __column_name {
    ($field:ident) => {
        stringify!($field)
    };
    ($field:ident, $column:literal) => {
        $column
    };
}

/// Implements `Mapped` for an existing struct from its member list.
#[macro_export]
macro_rules! impl_mapped_struct {
    (@fields $mapper:ident, $fields:ident, $name:ty;) => {};
    (@fields $mapper:ident, $fields:ident, $name:ty;
        readonly $field:ident $(as $column:literal)? $(, $($rest:tt)*)?
    ) => {
        $fields.push($crate::mapping::FieldAccessor::readonly(
            $mapper,
            stringify!($field),
            $crate::__column_name!($field $(, $column)?),
            |row: &$name| &row.$field,
        )?);
        $crate::impl_mapped_struct!(@fields $mapper, $fields, $name; $($($rest)*)?);
    };
    (@fields $mapper:ident, $fields:ident, $name:ty;
        $field:ident $(as $column:literal)? $(, $($rest:tt)*)?
    ) => {
        $fields.push($crate::mapping::FieldAccessor::member(
            $mapper,
            stringify!($field),
            $crate::__column_name!($field $(, $column)?),
            |row: &$name| &row.$field,
            |row: &mut $name, value| row.$field = value,
        )?);
        $crate::impl_mapped_struct!(@fields $mapper, $fields, $name; $($($rest)*)?);
    };
    ($name:ident { $($body:tt)* }) => {
        impl $crate::mapping::Mapped for $name {
            fn type_name() -> ::std::string::String {
                ::std::string::String::from(stringify!($name))
            }

            fn shape(
                mapper: &mut $crate::mapping::TypeMapper,
            ) -> $crate::eyre::Result<$crate::mapping::Shape> {
                $crate::mapping::struct_shape::<Self>(mapper)
            }

            fn fields(
                mapper: &mut $crate::mapping::TypeMapper,
            ) -> $crate::eyre::Result<::std::vec::Vec<$crate::mapping::FieldAccessor<Self>>> {
                #[allow(unused_mut)]
                let mut fields = ::std::vec::Vec::new();
                $crate::impl_mapped_struct!(@fields mapper, fields, $name; $($body)*);
                Ok(fields)
            }

            fn check_compatible(
                mapper: &mut $crate::mapping::TypeMapper,
                ty: &$crate::types::StructuralType,
                direction: $crate::mapping::Direction,
            ) -> $crate::eyre::Result<()> {
                mapper.check_struct::<Self>(ty, direction)
            }

            fn build_writer(
                compiler: &$crate::codec::CodecCompiler,
            ) -> $crate::eyre::Result<$crate::codec::ColumnWriter<Self>> {
                $crate::codec::struct_writer::<Self>(compiler)
            }

            fn build_reader(
                compiler: &$crate::codec::CodecCompiler,
                ty: &$crate::types::StructuralType,
            ) -> $crate::eyre::Result<$crate::codec::ColumnReader<Self>> {
                $crate::codec::struct_reader::<Self>(compiler, ty)
            }

            fn build_root_reader(
                compiler: &$crate::codec::CodecCompiler,
                ty: &$crate::types::StructuralType,
            ) -> $crate::eyre::Result<$crate::codec::RootReader<Self>> {
                $crate::codec::struct_root_reader::<Self>(compiler, ty)
            }
        }
    };
}

/// Defines a struct and implements `Mapped` for it.
#[macro_export]
macro_rules! mapped_struct {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$field_meta:meta])*
                $field_vis:vis $field:ident : $ty:ty $(as $column:literal)?
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis struct $name {
            $(
                $(#[$field_meta])*
                $field_vis $field: $ty,
            )*
        }

        $crate::impl_mapped_struct!($name { $($field $(as $column)?),* });
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __enum_as_text {
    () => {
        false
    };
    (text) => {
        true
    };
}

/// Implements `Mapped` for a type that implements `MappedEnum`.
#[macro_export]
macro_rules! impl_mapped_enum {
    ($name:ty) => {
        impl $crate::mapping::Mapped for $name {
            fn shape(
                _mapper: &mut $crate::mapping::TypeMapper,
            ) -> $crate::eyre::Result<$crate::mapping::Shape> {
                $crate::mapping::enum_shape::<Self>()
            }

            fn check_compatible(
                _mapper: &mut $crate::mapping::TypeMapper,
                ty: &$crate::types::StructuralType,
                direction: $crate::mapping::Direction,
            ) -> $crate::eyre::Result<()> {
                $crate::mapping::check_enum::<Self>(ty, direction)
            }

            fn build_writer(
                _compiler: &$crate::codec::CodecCompiler,
            ) -> $crate::eyre::Result<$crate::codec::ColumnWriter<Self>> {
                $crate::codec::enum_writer::<Self>()
            }

            fn build_reader(
                _compiler: &$crate::codec::CodecCompiler,
                ty: &$crate::types::StructuralType,
            ) -> $crate::eyre::Result<$crate::codec::ColumnReader<Self>> {
                $crate::codec::enum_reader::<Self>(ty)
            }
        }
    };
}

/// Defines a fieldless enum and implements `MappedEnum` and `Mapped` for it.
#[macro_export]
macro_rules! mapped_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident : $repr:ident $(as $mode:ident)? {
            $first:ident $(= $first_value:expr)?
            $(, $variant:ident $(= $value:expr)?)* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[repr($repr)]
        #[derive(Clone, Copy, PartialEq, Eq, Hash)]
        $vis enum $name {
            $first $(= $first_value)?,
            $($variant $(= $value)?,)*
        }

        impl ::std::default::Default for $name {
            fn default() -> Self {
                $name::$first
            }
        }

        impl $crate::mapping::MappedEnum for $name {
            type Repr = $repr;
            const AS_TEXT: bool = $crate::__enum_as_text!($($mode)?);

            fn members() -> &'static [(&'static str, i64)] {
                const MEMBERS: &[(&str, i64)] = &[
                    (stringify!($first), $name::$first as i64),
                    $((stringify!($variant), $name::$variant as i64),)*
                ];
                MEMBERS
            }

            fn ordinal(&self) -> i64 {
                *self as i64
            }

            fn from_ordinal(ordinal: i64) -> Option<Self> {
                if ordinal == $name::$first as i64 {
                    return Some($name::$first);
                }
                $(
                    if ordinal == $name::$variant as i64 {
                        return Some($name::$variant);
                    }
                )*
                None
            }
        }

        $crate::impl_mapped_enum!($name);
    };
}

/// Implements `Mapped` for a type that implements `MappedFlags`.
#[macro_export]
macro_rules! impl_mapped_flags {
    ($name:ty) => {
        impl $crate::mapping::Mapped for $name {
            fn shape(
                mapper: &mut $crate::mapping::TypeMapper,
            ) -> $crate::eyre::Result<$crate::mapping::Shape> {
                $crate::mapping::struct_shape::<Self>(mapper)
            }

            fn fields(
                _mapper: &mut $crate::mapping::TypeMapper,
            ) -> $crate::eyre::Result<::std::vec::Vec<$crate::mapping::FieldAccessor<Self>>> {
                Ok($crate::mapping::flag_fields::<Self>())
            }

            fn check_compatible(
                _mapper: &mut $crate::mapping::TypeMapper,
                ty: &$crate::types::StructuralType,
                _direction: $crate::mapping::Direction,
            ) -> $crate::eyre::Result<()> {
                $crate::mapping::check_flags::<Self>(ty)
            }

            fn build_writer(
                compiler: &$crate::codec::CodecCompiler,
            ) -> $crate::eyre::Result<$crate::codec::ColumnWriter<Self>> {
                $crate::codec::struct_writer::<Self>(compiler)
            }

            fn build_reader(
                compiler: &$crate::codec::CodecCompiler,
                ty: &$crate::types::StructuralType,
            ) -> $crate::eyre::Result<$crate::codec::ColumnReader<Self>> {
                $crate::codec::struct_reader::<Self>(compiler, ty)
            }

            fn build_root_reader(
                compiler: &$crate::codec::CodecCompiler,
                ty: &$crate::types::StructuralType,
            ) -> $crate::eyre::Result<$crate::codec::RootReader<Self>> {
                $crate::codec::struct_root_reader::<Self>(compiler, ty)
            }
        }
    };
}

/// Defines a bitmask type and implements `MappedFlags` and `Mapped` for it.
#[macro_export]
macro_rules! mapped_flags {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident : $repr:ty {
            $(
                $(#[$flag_meta:meta])*
                const $flag:ident = $value:expr;
            )*
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
        $vis struct $name($repr);

        #[allow(dead_code)]
        impl $name {
            $(
                $(#[$flag_meta])*
                pub const $flag: Self = Self($value);
            )*

            pub const fn empty() -> Self {
                Self(0)
            }

            pub const fn bits(&self) -> $repr {
                self.0
            }

            pub const fn from_bits_retain(bits: $repr) -> Self {
                Self(bits)
            }

            pub const fn contains(&self, other: Self) -> bool {
                self.0 & other.0 == other.0
            }

            pub fn insert(&mut self, other: Self) {
                self.0 |= other.0;
            }

            pub fn remove(&mut self, other: Self) {
                self.0 &= !other.0;
            }
        }

        impl ::std::ops::BitOr for $name {
            type Output = Self;

            fn bitor(self, rhs: Self) -> Self {
                Self(self.0 | rhs.0)
            }
        }

        impl $crate::mapping::MappedFlags for $name {
            fn members() -> &'static [(&'static str, u64)] {
                const MEMBERS: &[(&str, u64)] = &[$((stringify!($flag), $name::$flag.0 as u64)),*];
                MEMBERS
            }

            fn bits(&self) -> u64 {
                self.0 as u64
            }

            fn from_bits(bits: u64) -> Self {
                Self(bits as $repr)
            }
        }

        $crate::impl_mapped_flags!($name);
    };
}
