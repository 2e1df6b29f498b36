//! # Structural Types
//!
//! A `StructuralType` describes a column's shape on the database side,
//! independent of any application type:
//!
//! ```text
//! StructuralType := Primitive(kind)
//!                 | Enum([label, ...])
//!                 | List(StructuralType)
//!                 | FixedArray(StructuralType, length)
//!                 | Struct([(name, StructuralType), ...])
//! ```
//!
//! ## Identity
//!
//! Every type is identified by a SHA-256 digest of its content:
//!
//! | Kind | Digest input |
//! |------|--------------|
//! | Primitive | tag, kind discriminant |
//! | Enum | tag, label count, each label (length prefixed) |
//! | List | tag, element digest |
//! | FixedArray | tag, element digest, length |
//! | Struct | tag, field count, each (name, field digest) |
//!
//! Struct field names and order and enum labels and order are part of the
//! identity, so a reordered or renamed column set is a different type.
//!
//! Types are interned in a process-wide table keyed by digest, so two equal
//! types are the same allocation. Equality is a pointer comparison and the
//! digest doubles as a cheap cache key. The table is never pruned; it grows
//! with the number of distinct shapes observed.

use std::fmt;
use std::sync::Arc;

use sha2::{Digest, Sha256};

use super::intern::intern;
use super::primitive::PrimitiveKind;

const TAG_PRIMITIVE: u8 = 0x01;
const TAG_ENUM: u8 = 0x02;
const TAG_LIST: u8 = 0x03;
const TAG_FIXED_ARRAY: u8 = 0x04;
const TAG_STRUCT: u8 = 0x05;

/// 256-bit content digest of a structural type.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeHash([u8; 32]);

impl TypeHash {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub(crate) fn shard(&self, shard_count: usize) -> usize {
        self.0[0] as usize % shard_count
    }
}

impl fmt::Debug for TypeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0[..8] {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct StructField {
    pub name: String,
    pub ty: StructuralType,
}

impl StructField {
    pub fn new(name: impl Into<String>, ty: StructuralType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

#[derive(Clone)]
pub enum TypeKind {
    Primitive(PrimitiveKind),
    Enum(Arc<[String]>),
    List(StructuralType),
    FixedArray {
        element: StructuralType,
        length: usize,
    },
    Struct(Arc<[StructField]>),
}

pub(crate) struct TypeNode {
    pub(crate) hash: TypeHash,
    pub(crate) kind: TypeKind,
}

#[derive(Clone)]
pub struct StructuralType(pub(crate) Arc<TypeNode>);

impl StructuralType {
    pub fn primitive(kind: PrimitiveKind) -> Self {
        let hash = digest(|h| {
            h.update([TAG_PRIMITIVE, kind as u8]);
        });
        intern(hash, || TypeKind::Primitive(kind))
    }

    pub fn enumeration<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels: Arc<[String]> = labels.into_iter().map(Into::into).collect();
        let hash = digest(|h| {
            h.update([TAG_ENUM]);
            h.update((labels.len() as u64).to_le_bytes());
            for label in labels.iter() {
                update_str(h, label);
            }
        });
        intern(hash, || TypeKind::Enum(labels))
    }

    pub fn list(element: StructuralType) -> Self {
        let hash = digest(|h| {
            h.update([TAG_LIST]);
            h.update(element.content_hash().as_bytes());
        });
        intern(hash, || TypeKind::List(element))
    }

    pub fn fixed_array(element: StructuralType, length: usize) -> Self {
        let hash = digest(|h| {
            h.update([TAG_FIXED_ARRAY]);
            h.update(element.content_hash().as_bytes());
            h.update((length as u64).to_le_bytes());
        });
        intern(hash, || TypeKind::FixedArray { element, length })
    }

    pub fn structure<I>(fields: I) -> Self
    where
        I: IntoIterator<Item = StructField>,
    {
        let fields: Arc<[StructField]> = fields.into_iter().collect();
        let hash = digest(|h| {
            h.update([TAG_STRUCT]);
            h.update((fields.len() as u64).to_le_bytes());
            for field in fields.iter() {
                update_str(h, &field.name);
                h.update(field.ty.content_hash().as_bytes());
            }
        });
        intern(hash, || TypeKind::Struct(fields))
    }

    pub fn content_hash(&self) -> TypeHash {
        self.0.hash
    }

    pub fn kind(&self) -> &TypeKind {
        &self.0.kind
    }

    pub fn as_primitive(&self) -> Option<PrimitiveKind> {
        match self.kind() {
            TypeKind::Primitive(kind) => Some(*kind),
            _ => None,
        }
    }

    pub fn is_primitive(&self, kind: PrimitiveKind) -> bool {
        self.as_primitive() == Some(kind)
    }

    pub fn enum_labels(&self) -> Option<&[String]> {
        match self.kind() {
            TypeKind::Enum(labels) => Some(labels),
            _ => None,
        }
    }

    pub fn fields(&self) -> Option<&[StructField]> {
        match self.kind() {
            TypeKind::Struct(fields) => Some(fields),
            _ => None,
        }
    }

    pub fn field(&self, name: &str) -> Option<&StructField> {
        self.fields()?.iter().find(|f| f.name == name)
    }

    /// Element type of a list or fixed array.
    pub fn element(&self) -> Option<&StructuralType> {
        match self.kind() {
            TypeKind::List(element) | TypeKind::FixedArray { element, .. } => Some(element),
            _ => None,
        }
    }

    /// Bytes per row in the vector's own data buffer (0 for struct and array
    /// vectors, whose data lives in their children).
    pub fn physical_width(&self) -> usize {
        match self.kind() {
            TypeKind::Primitive(kind) => kind.width(),
            TypeKind::Enum(labels) => enum_physical_kind(labels.len()).width(),
            TypeKind::List(_) => 16,
            TypeKind::FixedArray { .. } | TypeKind::Struct(_) => 0,
        }
    }
}

/// Storage kind the engine picks for an enum dictionary of `count` labels.
pub fn enum_physical_kind(count: usize) -> PrimitiveKind {
    if count <= u8::MAX as usize {
        PrimitiveKind::UTinyInt
    } else if count <= u16::MAX as usize {
        PrimitiveKind::USmallInt
    } else {
        PrimitiveKind::UInteger
    }
}

fn digest(fill: impl FnOnce(&mut Sha256)) -> TypeHash {
    let mut hasher = Sha256::new();
    fill(&mut hasher);
    TypeHash(hasher.finalize().into())
}

fn update_str(hasher: &mut Sha256, value: &str) {
    hasher.update((value.len() as u64).to_le_bytes());
    hasher.update(value.as_bytes());
}

impl PartialEq for StructuralType {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for StructuralType {}

impl std::hash::Hash for StructuralType {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.hash.hash(state);
    }
}

pub(crate) fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

impl fmt::Display for StructuralType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            TypeKind::Primitive(kind) => f.write_str(kind.sql_name()),
            TypeKind::Enum(labels) => {
                f.write_str("ENUM(")?;
                for (i, label) in labels.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    f.write_str(&quote_literal(label))?;
                }
                f.write_str(")")
            }
            TypeKind::List(element) => write!(f, "{}[]", element),
            TypeKind::FixedArray { element, length } => write!(f, "{}[{}]", element, length),
            TypeKind::Struct(fields) => {
                f.write_str("STRUCT(")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{} {}", quote_identifier(&field.name), field.ty)?;
                }
                f.write_str(")")
            }
        }
    }
}

impl fmt::Debug for StructuralType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} #{:?}", self, self.content_hash())
    }
}
