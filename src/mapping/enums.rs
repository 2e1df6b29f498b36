//! # Enums and Flags
//!
//! Plain enums map to the narrowest unsigned primitive that holds their
//! largest member value:
//!
//! | Largest member | Column type |
//! |----------------|-------------|
//! | `<= i8::MAX` | UTINYINT |
//! | `<= i16::MAX` | USMALLINT |
//! | `<= u32::MAX` | UINTEGER |
//!
//! Enums backed by a 64-bit integer and enums with negative members are
//! rejected. An enum may opt into text mode, where each value is written as
//! its member label (`__anonymous_<n>` for a value with no declared member).
//!
//! Flags types are bitmasks. They map to a struct with one `BOOLEAN` field
//! per distinct single-bit member; combined members such as `ALL = 7` do not
//! get a field of their own.

use eyre::{bail, Result};

use super::{Direction, FieldAccessor, Mapped, Shape};
use crate::config::{
    ANONYMOUS_ENUM_MEMBER_PREFIX, ENUM_MAX_ORDINAL_16, ENUM_MAX_ORDINAL_32, ENUM_MAX_ORDINAL_8,
};
use crate::error::MappingError;
use crate::types::{PrimitiveKind, StructuralType};

/// Integer type backing an enum.
pub trait EnumRepr: Copy + Send + Sync + 'static {
    const BITS: u32;
}

macro_rules! enum_repr {
    ($($ty:ty),*) => {
        $(
            impl EnumRepr for $ty {
                const BITS: u32 = <$ty>::BITS;
            }
        )*
    };
}

enum_repr!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

pub trait MappedEnum: Copy + Send + Sync + 'static {
    type Repr: EnumRepr;

    /// Write and read the member label instead of the ordinal.
    const AS_TEXT: bool = false;

    /// Declared members as `(label, value)`.
    fn members() -> &'static [(&'static str, i64)];

    fn ordinal(&self) -> i64;

    fn from_ordinal(ordinal: i64) -> Option<Self>;

    fn label(&self) -> Option<&'static str> {
        let ordinal = self.ordinal();
        Self::members()
            .iter()
            .find(|(_, value)| *value == ordinal)
            .map(|(label, _)| *label)
    }
}

/// Column representation chosen for an enum type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnumInfo {
    pub kind: PrimitiveKind,
    /// Largest declared member value; writes above it are rejected.
    pub max_ordinal: i64,
}

impl EnumInfo {
    pub fn of<E: MappedEnum + Mapped>() -> Result<Self> {
        if E::Repr::BITS >= 64 {
            bail!(MappingError::unsupported(
                E::type_name(),
                "enums backed by a 64-bit integer cannot be mapped; use a 32-bit representation"
            ));
        }

        let mut max_ordinal = 0;
        for (label, value) in E::members() {
            if *value < 0 {
                bail!(MappingError::unsupported(
                    E::type_name(),
                    format!("member {} has negative value {}", label, value)
                ));
            }
            if *value > ENUM_MAX_ORDINAL_32 {
                bail!(MappingError::unsupported(
                    E::type_name(),
                    format!("member {} value {} does not fit in 32 bits", label, value)
                ));
            }
            max_ordinal = max_ordinal.max(*value);
        }

        let kind = if E::AS_TEXT {
            PrimitiveKind::Varchar
        } else if max_ordinal <= ENUM_MAX_ORDINAL_8 {
            PrimitiveKind::UTinyInt
        } else if max_ordinal <= ENUM_MAX_ORDINAL_16 {
            PrimitiveKind::USmallInt
        } else {
            PrimitiveKind::UInteger
        };
        Ok(Self { kind, max_ordinal })
    }

    pub fn structural_type(&self) -> StructuralType {
        StructuralType::primitive(self.kind)
    }
}

/// Label written for an enum value with no declared member.
pub fn anonymous_label(ordinal: i64) -> String {
    format!("{}{}", ANONYMOUS_ENUM_MEMBER_PREFIX, ordinal)
}

/// Label of `value`, falling back to its anonymous label.
pub(crate) fn label_of<E: MappedEnum>(value: &E) -> String {
    match value.label() {
        Some(label) => label.to_string(),
        None => anonymous_label(value.ordinal()),
    }
}

/// Member for `label`: a declared label or an anonymous placeholder.
pub(crate) fn resolve_label<E: MappedEnum>(label: &str) -> Option<E> {
    if let Some((_, value)) = E::members().iter().find(|(name, _)| *name == label) {
        return E::from_ordinal(*value);
    }
    label
        .strip_prefix(ANONYMOUS_ENUM_MEMBER_PREFIX)
        .and_then(|ordinal| ordinal.parse::<i64>().ok())
        .and_then(E::from_ordinal)
}

pub fn enum_shape<E: MappedEnum + Mapped>() -> Result<Shape> {
    Ok(Shape::Primitive(EnumInfo::of::<E>()?.structural_type()))
}

/// Writes need the enum's own column type. Reads also accept a native
/// `ENUM` whose labels all resolve, or `VARCHAR` labels.
pub fn check_enum<E: MappedEnum + Mapped>(ty: &StructuralType, direction: Direction) -> Result<()> {
    let own = EnumInfo::of::<E>()?.structural_type();
    if *ty == own {
        return Ok(());
    }
    if direction == Direction::Read {
        if let Some(labels) = ty.enum_labels() {
            if let Some(unknown) = labels.iter().find(|l| resolve_label::<E>(l).is_none()) {
                bail!(MappingError::incompatible(
                    E::type_name(),
                    ty,
                    format!("label '{}' has no matching member", unknown)
                ));
            }
            return Ok(());
        }
        if ty.is_primitive(PrimitiveKind::Varchar) {
            return Ok(());
        }
    }
    bail!(MappingError::incompatible(
        E::type_name(),
        ty,
        format!("expected {}", own)
    ))
}

pub trait MappedFlags: Copy + Default + Send + Sync + 'static {
    /// Declared members as `(name, bits)`, including combined members.
    fn members() -> &'static [(&'static str, u64)];

    fn bits(&self) -> u64;

    fn from_bits(bits: u64) -> Self;
}

/// Distinct single-bit members in declaration order, first name wins.
pub fn flag_bits<F: MappedFlags>() -> Vec<(&'static str, u64)> {
    let mut bits: Vec<(&'static str, u64)> = Vec::new();
    for (name, value) in F::members() {
        if value.is_power_of_two() && bits.iter().all(|(_, seen)| seen != value) {
            bits.push((name, *value));
        }
    }
    bits
}

pub fn flag_fields<F: MappedFlags + Mapped>() -> Vec<FieldAccessor<F>> {
    flag_bits::<F>()
        .into_iter()
        .map(|(name, bit)| FieldAccessor::flag_bit(name, bit))
        .collect()
}

/// A flags type matches a struct with exactly one `BOOLEAN` field per bit.
pub fn check_flags<F: MappedFlags + Mapped>(ty: &StructuralType) -> Result<()> {
    let bits = flag_bits::<F>();
    let matches = ty.fields().is_some_and(|columns| {
        columns.len() == bits.len()
            && bits.iter().all(|(name, _)| {
                ty.field(name)
                    .is_some_and(|f| f.ty.is_primitive(PrimitiveKind::Boolean))
            })
    });
    if !matches {
        let names: Vec<&str> = bits.iter().map(|(name, _)| *name).collect();
        bail!(MappingError::incompatible(
            F::type_name(),
            ty,
            format!("expected one BOOLEAN field per flag ({})", names.join(", "))
        ));
    }
    Ok(())
}
