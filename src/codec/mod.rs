//! # Codec Compiler
//!
//! A codec is a closure that moves a batch of application values into a
//! vector (writer) or out of one (reader). Codecs are built once per key by
//! composing smaller codecs and then cached for the life of the compiler:
//!
//! ```text
//! root_writer::<Row>()
//!   ├── field_writer(Row.id)     ──> writer::<i32>()          primitive
//!   └── field_writer(Row.tags)   ──> writer::<Vec<String>>()  list
//!                                      └── writer::<String>()  primitive
//! ```
//!
//! Each level runs over the whole batch, never per row: a list writer
//! flattens every row's elements into one buffer and calls the element
//! writer once on the list child, a struct writer calls each member's writer
//! once on its child vector.
//!
//! ## Keys and Caching
//!
//! | Codec | Key |
//! |-------|-----|
//! | column writer for `T` | `(TypeId(T), Write)` |
//! | column reader for `T` | `(TypeId(T), Read, hash(ty))` |
//! | member writer / reader | `(FieldId, ..)` |
//! | root writer / reader | as above with `root = true` |
//!
//! Lookups take a shard read lock only. Builds are serialized by a reentrant
//! lock: the building thread may request other keys while building (nested
//! types do), but requesting a key that is already being built fails with
//! `RecursiveType` instead of deadlocking. A failed build caches nothing.
//!
//! ## Validation Before Rows
//!
//! Every build validates first: writers map `T` (cycle and enum checks),
//! readers check compatibility with the structural type. Errors therefore
//! surface before the first row is converted.

mod batch;
mod cache;
mod enums;
mod list;
mod primitive;
mod structs;


pub use batch::{read_all, read_all_with, ReadContext, RowWriter};
pub use cache::{CodecKey, CodecTarget};
pub use enums::{enum_reader, enum_writer};
pub use list::{array_reader, array_writer, list_reader, list_writer};
pub use primitive::{primitive_reader, primitive_writer};
pub use structs::{scalar_root_reader, struct_reader, struct_root_reader, struct_writer};

use std::cell::RefCell;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use eyre::{bail, Result};
use parking_lot::ReentrantMutex;

use crate::error::MappingError;
use crate::mapping::{Direction, FieldAccessor, Mapped, TypeMapper};
use crate::memory::{Arena, RowFilter};
use crate::types::StructuralType;
use crate::vector::{DataChunk, Vector};

use cache::CodecCache;

/// Writes `rows` into the first `rows.len()` slots of a vector. `None` rows
/// are NULL.
pub type ColumnWriter<T> =
    Arc<dyn Fn(&[Option<&T>], &mut Vector, &mut Arena) -> Result<()> + Send + Sync>;

/// Reads the first `rows` slots of a vector. Rows outside the filter are
/// not inspected and read as `None`, as do NULL rows.
pub type ColumnReader<T> =
    Arc<dyn Fn(&Vector, usize, RowFilter<'_>) -> Result<Vec<Option<T>>> + Send + Sync>;

/// Reads one member's column into partially built values. `None` entries
/// are NULL parents and are left alone.
pub type FieldReader<T> =
    Arc<dyn Fn(&Vector, &mut [Option<T>], RowFilter<'_>) -> Result<()> + Send + Sync>;

/// Fills a chunk from a row source and returns the number of rows written.
pub type RootWriter<T> = Arc<
    dyn for<'r> Fn(&mut dyn Iterator<Item = &'r T>, &mut DataChunk, &mut Arena) -> Result<usize>
        + Send
        + Sync,
>;

/// Converts every row of a chunk.
pub type RootReader<T> = Arc<dyn Fn(&DataChunk, &mut ReadContext) -> Result<Vec<T>> + Send + Sync>;

pub fn column_writer<T, F>(f: F) -> ColumnWriter<T>
where
    F: Fn(&[Option<&T>], &mut Vector, &mut Arena) -> Result<()> + Send + Sync + 'static,
{
    Arc::new(f)
}

pub fn column_reader<T, F>(f: F) -> ColumnReader<T>
where
    F: Fn(&Vector, usize, RowFilter<'_>) -> Result<Vec<Option<T>>> + Send + Sync + 'static,
{
    Arc::new(f)
}

pub fn field_reader<T, F>(f: F) -> FieldReader<T>
where
    F: Fn(&Vector, &mut [Option<T>], RowFilter<'_>) -> Result<()> + Send + Sync + 'static,
{
    Arc::new(f)
}

pub(crate) fn root_writer_fn<T, F>(f: F) -> RootWriter<T>
where
    F: for<'r> Fn(&mut dyn Iterator<Item = &'r T>, &mut DataChunk, &mut Arena) -> Result<usize>
        + Send
        + Sync
        + 'static,
{
    Arc::new(f)
}

pub(crate) fn root_reader_fn<T, F>(f: F) -> RootReader<T>
where
    F: Fn(&DataChunk, &mut ReadContext) -> Result<Vec<T>> + Send + Sync + 'static,
{
    Arc::new(f)
}

pub struct CodecCompiler {
    cache: CodecCache,
    building: ReentrantMutex<RefCell<Vec<(CodecKey, String)>>>,
    compiled: AtomicUsize,
}

static GLOBAL: OnceLock<CodecCompiler> = OnceLock::new();

impl Default for CodecCompiler {
    fn default() -> Self {
        Self::new()
    }
}

impl CodecCompiler {
    /// An isolated compiler with its own cache.
    pub fn new() -> Self {
        Self {
            cache: CodecCache::new(),
            building: ReentrantMutex::new(RefCell::new(Vec::new())),
            compiled: AtomicUsize::new(0),
        }
    }

    /// The process-wide compiler.
    pub fn global() -> &'static CodecCompiler {
        GLOBAL.get_or_init(CodecCompiler::new)
    }

    /// Number of codecs built so far. Cache hits do not count.
    pub fn compiled_count(&self) -> usize {
        self.compiled.load(Ordering::Relaxed)
    }

    pub fn cached_count(&self) -> usize {
        self.cache.len()
    }

    /// `GetOrCreateFieldSerializer` for a whole value of type `T`.
    pub fn writer<T: Mapped>(&self) -> Result<ColumnWriter<T>> {
        let key = CodecKey::of_type::<T>(Direction::Write, false, None);
        self.get_or_build(key, T::type_name, || {
            TypeMapper::new().structural_type::<T>()?;
            T::build_writer(self)
        })
    }

    /// `GetOrCreateFieldDeserializer` for a whole value of type `T` stored
    /// as `ty`.
    pub fn reader<T: Mapped>(&self, ty: &StructuralType) -> Result<ColumnReader<T>> {
        let key = CodecKey::of_type::<T>(Direction::Read, false, Some(ty.content_hash()));
        self.get_or_build(key, T::type_name, || {
            TypeMapper::new().check_compatible::<T>(ty, Direction::Read)?;
            T::build_reader(self, ty)
        })
    }

    /// Writer for one member of `T`, keyed by the member's identity.
    pub fn field_writer<T: Mapped>(&self, field: &FieldAccessor<T>) -> Result<ColumnWriter<T>> {
        let key = CodecKey::of_field(field.id(), Direction::Write, None);
        self.get_or_build(
            key,
            || format!("{}.{}", T::type_name(), field.name()),
            || field.build_writer(self),
        )
    }

    pub fn field_reader<T: Mapped>(
        &self,
        field: &FieldAccessor<T>,
        ty: &StructuralType,
    ) -> Result<FieldReader<T>> {
        let key = CodecKey::of_field(field.id(), Direction::Read, Some(ty.content_hash()));
        self.get_or_build(
            key,
            || format!("{}.{}", T::type_name(), field.name()),
            || field.build_reader(self, ty),
        )
    }

    /// `GetOrCreateRootSerializer`: fills every column of a chunk.
    pub fn root_writer<T: Mapped>(&self) -> Result<RootWriter<T>> {
        let key = CodecKey::of_type::<T>(Direction::Write, true, None);
        self.get_or_build(key, T::type_name, || structs::root_writer::<T>(self))
    }

    /// `GetOrCreateRootDeserializer` for chunks whose columns form `ty`.
    pub fn root_reader<T: Mapped>(&self, ty: &StructuralType) -> Result<RootReader<T>> {
        let key = CodecKey::of_type::<T>(Direction::Read, true, Some(ty.content_hash()));
        self.get_or_build(key, T::type_name, || T::build_root_reader(self, ty))
    }

    pub(crate) fn get_or_build<C, N, B>(&self, key: CodecKey, name: N, build: B) -> Result<C>
    where
        C: Clone + Send + Sync + 'static,
        N: FnOnce() -> String,
        B: FnOnce() -> Result<C>,
    {
        if let Some(codec) = self.cache.get::<C>(&key) {
            return Ok(codec);
        }

        let building = self.building.lock();
        if let Some(codec) = self.cache.get::<C>(&key) {
            return Ok(codec);
        }

        let name = name();
        {
            let mut stack = building.borrow_mut();
            if let Some(start) = stack.iter().position(|(seen, _)| *seen == key) {
                let mut cycle: Vec<String> =
                    stack[start..].iter().map(|(_, name)| name.clone()).collect();
                cycle.push(name);
                bail!(MappingError::RecursiveType { cycle });
            }
            stack.push((key, name.clone()));
        }

        let result = build();
        building.borrow_mut().pop();
        let codec = result?;

        let compiled = self.compiled.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::debug!(
            codec = %name,
            direction = ?key.direction,
            root = key.root,
            compiled,
            "compiled codec"
        );
        Ok(self.cache.insert(key, codec))
    }
}
