//! # Structural Type Model
//!
//! This module provides the database-side description of a column's shape,
//! shared by the type mapper, the codec compiler and the type generator.
//!
//! ## Module Structure
//!
//! - `primitive`: `PrimitiveKind` scalar kinds and their physical widths
//! - `structural`: `StructuralType`, `TypeKind`, content hashing, SQL rendering
//! - `intern`: process-wide intern table (one instance per content digest)
//! - `scalar`: `Interval` and `Blob` application scalars
//!
//! ## Key Types
//!
//! | Type | Purpose |
//! |------|---------|
//! | `StructuralType` | Interned, immutable, recursively defined column shape |
//! | `TypeHash` | 256-bit content digest, the type's identity |
//! | `PrimitiveKind` | Scalar kind with fixed physical width |
//!
//! ## Usage
//!
//! ```ignore
//! use duckrow::types::{PrimitiveKind, StructField, StructuralType};
//!
//! let tags = StructuralType::list(StructuralType::primitive(PrimitiveKind::Varchar));
//! let row = StructuralType::structure([
//!     StructField::new("id", StructuralType::primitive(PrimitiveKind::Integer)),
//!     StructField::new("tags", tags),
//! ]);
//! assert_eq!(row.to_string(), r#"STRUCT("id" INTEGER, "tags" VARCHAR[])"#);
//! ```

mod intern;
mod primitive;
mod scalar;
mod structural;


pub use intern::{interned_count, lookup};
pub use primitive::PrimitiveKind;
pub use scalar::{Blob, Interval};
pub(crate) use structural::quote_identifier;
pub use structural::{enum_physical_kind, StructField, StructuralType, TypeHash, TypeKind};
