//! # Logical Type Handles
//!
//! `LogicalType` stands in for the engine's logical type handle: what a
//! vector is declared as. It is structurally the same tree as
//! [`StructuralType`] but owned, un-interned and cheap to build by hand, the
//! way a result set or table definition exposes it.
//!
//! ```text
//! StructuralType::from_logical   LogicalType  ──> StructuralType (interned)
//! StructuralType::to_logical     StructuralType ──> LogicalType (handle)
//! ```

use std::sync::Arc;

use crate::types::{enum_physical_kind, PrimitiveKind, StructField, StructuralType, TypeKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogicalType {
    Primitive(PrimitiveKind),
    Enum(Arc<[String]>),
    List(Box<LogicalType>),
    Array(Box<LogicalType>, usize),
    Struct(Vec<(String, LogicalType)>),
}

impl LogicalType {
    pub fn list(element: LogicalType) -> Self {
        LogicalType::List(Box::new(element))
    }

    pub fn array(element: LogicalType, length: usize) -> Self {
        LogicalType::Array(Box::new(element), length)
    }

    pub fn enumeration<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        LogicalType::Enum(labels.into_iter().map(Into::into).collect())
    }

    pub fn structure<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = (S, LogicalType)>,
        S: Into<String>,
    {
        LogicalType::Struct(fields.into_iter().map(|(n, t)| (n.into(), t)).collect())
    }

    /// Bytes per row in the vector's own data buffer.
    pub fn physical_width(&self) -> usize {
        match self {
            LogicalType::Primitive(kind) => kind.width(),
            LogicalType::Enum(labels) => enum_physical_kind(labels.len()).width(),
            LogicalType::List(_) => std::mem::size_of::<super::ListEntry>(),
            LogicalType::Array(..) | LogicalType::Struct(_) => 0,
        }
    }

    /// Scalar kind stored in the data buffer, if this type is a scalar.
    pub fn physical_kind(&self) -> Option<PrimitiveKind> {
        match self {
            LogicalType::Primitive(kind) => Some(*kind),
            LogicalType::Enum(labels) => Some(enum_physical_kind(labels.len())),
            _ => None,
        }
    }

    pub fn is_variable(&self) -> bool {
        matches!(self, LogicalType::Primitive(kind) if kind.is_variable())
    }
}

impl From<PrimitiveKind> for LogicalType {
    fn from(kind: PrimitiveKind) -> Self {
        LogicalType::Primitive(kind)
    }
}

impl StructuralType {
    /// Derives (and interns) the structural type described by a native handle.
    pub fn from_logical(ty: &LogicalType) -> Self {
        match ty {
            LogicalType::Primitive(kind) => StructuralType::primitive(*kind),
            LogicalType::Enum(labels) => StructuralType::enumeration(labels.iter().cloned()),
            LogicalType::List(element) => StructuralType::list(Self::from_logical(element)),
            LogicalType::Array(element, length) => {
                StructuralType::fixed_array(Self::from_logical(element), *length)
            }
            LogicalType::Struct(fields) => StructuralType::structure(
                fields
                    .iter()
                    .map(|(name, ty)| StructField::new(name.clone(), Self::from_logical(ty))),
            ),
        }
    }

    /// Treats a result set's columns as one struct, the shape a root codec reads.
    pub fn from_columns(names: &[String], types: &[LogicalType]) -> Self {
        StructuralType::structure(
            names
                .iter()
                .zip(types)
                .map(|(name, ty)| StructField::new(name.clone(), Self::from_logical(ty))),
        )
    }

    /// Creates the native handle for this type.
    pub fn to_logical(&self) -> LogicalType {
        match self.kind() {
            TypeKind::Primitive(kind) => LogicalType::Primitive(*kind),
            TypeKind::Enum(labels) => LogicalType::Enum(Arc::clone(labels)),
            TypeKind::List(element) => LogicalType::list(element.to_logical()),
            TypeKind::FixedArray { element, length } => {
                LogicalType::array(element.to_logical(), *length)
            }
            TypeKind::Struct(fields) => LogicalType::Struct(
                fields
                    .iter()
                    .map(|f| (f.name.clone(), f.ty.to_logical()))
                    .collect(),
            ),
        }
    }
}
