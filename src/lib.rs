//! # duckrow - Typed Row Batches for a Columnar Engine
//!
//! duckrow moves strongly-typed application rows in and out of the columnar
//! memory layout of an embedded analytical engine: vectors of fixed-width
//! slots with validity bitmaps, 16-byte strings, list and array children,
//! grouped into data chunks of 2048 rows. It prioritizes:
//!
//! - **Build once, run per batch**: codecs are composed once per type and
//!   cached; converting a batch never walks type metadata per row
//! - **Exact null semantics**: parent validity, `Option`, and sentinel values
//!   all end up in the same validity bits
//! - **Engine-compatible memory**: string headers, list entries and enum
//!   widths match the engine bit for bit
//!
//! ## Quick Start
//!
//! ```ignore
//! use duckrow::{mapped_struct, read_all, ChunkCollection, RowWriter, TypeMapper};
//!
//! mapped_struct! {
//!     #[derive(Debug, Clone, Default, PartialEq)]
//!     pub struct Row {
//!         pub id: i32,
//!         pub tags: Option<Vec<String>>,
//!     }
//! }
//!
//! let ty = TypeMapper::new().structural_type::<Row>()?;
//! assert_eq!(ty.to_string(), r#"STRUCT("id" INTEGER, "tags" VARCHAR[])"#);
//!
//! let mut table = ChunkCollection::for_type(&ty);
//! RowWriter::<Row>::new()?.write_all(&rows, &mut table)?;
//! let back: Vec<Row> = read_all(&mut table)?;
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │   RowWriter / read_all (batches)     │
//! ├─────────────────────────────────────┤
//! │  Codec Compiler (cached closures)    │
//! ├───────────────────┬─────────────────┤
//! │   Type Mapper     │ Generated values │
//! ├───────────────────┴─────────────────┤
//! │  Structural Types (interned, hashed) │
//! ├─────────────────────────────────────┤
//! │ Vectors / Chunks │ Arena │ Validity  │
//! └─────────────────────────────────────┘
//! ```
//!
//! ## Module Overview
//!
//! - [`types`]: interned structural types and primitive kinds
//! - [`mapping`]: the `Mapped` trait, type mapper, member accessors, DDL
//! - [`codec`]: codec compiler, cache, batch loops
//! - [`generated`]: dynamic records for results with no application type
//! - [`vector`]: vectors, chunks, logical type handles, sources and sinks
//! - [`memory`]: arena, string representation, validity bitmaps
//! - [`config`]: layout constants and their invariants
//! - [`error`]: the mapping error taxonomy

#[macro_use]
mod macros;

pub mod codec;
pub mod config;
pub mod error;
pub mod generated;
pub mod mapping;
pub mod memory;
pub mod types;
pub mod vector;

#[doc(hidden)]
pub use eyre;

pub use codec::{read_all, read_all_with, CodecCompiler, ReadContext, RowWriter};
pub use error::MappingError;
pub use generated::{read_records, read_records_with, write_records, Record, RecordShape, RecordWriter, Value};
pub use mapping::{
    create_table_sql, table_columns, ColumnDef, Direction, FieldAccessor, Mapped, MappedEnum,
    MappedFlags, Primitive, TypeMapper,
};
pub use memory::{Arena, StringRef};
pub use types::{Blob, Interval, PrimitiveKind, StructField, StructuralType, TypeKind};
pub use vector::{ChunkCollection, ChunkSink, DataChunk, LogicalType, ResultSource, Vector};
