//! # TypeMapper
//!
//! Derives shapes and structural types from application types, enumerates
//! members and checks compatibility against a structural type.
//!
//! Shapes and member lists depend only on the Rust type, so they are cached
//! process-wide per `TypeId` (sharded like the intern table). The mapper
//! value itself only carries the stack of types currently being mapped,
//! which is what cycle detection needs; create one per top-level request.

use std::any::{Any, TypeId};
use std::collections::hash_map::RandomState;
use std::hash::BuildHasher;
use std::sync::{Arc, OnceLock};

use eyre::{bail, Result};
use hashbrown::HashMap;
use parking_lot::RwLock;
use smallvec::SmallVec;

use super::{Direction, FieldAccessor, Mapped, Shape};
use crate::config::SHAPE_CACHE_SHARD_COUNT;
use crate::error::MappingError;
use crate::types::StructuralType;
use crate::vector::LogicalType;

#[derive(Clone)]
struct ShapeEntry {
    shape: Arc<Shape>,
    ty: StructuralType,
}

type Shard<V> = RwLock<HashMap<TypeId, V>>;

struct MapperCache {
    shapes: [Shard<ShapeEntry>; SHAPE_CACHE_SHARD_COUNT],
    fields: [Shard<Arc<dyn Any + Send + Sync>>; SHAPE_CACHE_SHARD_COUNT],
    hasher: RandomState,
}

static CACHE: OnceLock<MapperCache> = OnceLock::new();

fn cache() -> &'static MapperCache {
    CACHE.get_or_init(|| MapperCache {
        shapes: std::array::from_fn(|_| RwLock::new(HashMap::new())),
        fields: std::array::from_fn(|_| RwLock::new(HashMap::new())),
        hasher: RandomState::new(),
    })
}

impl MapperCache {
    fn shard(&self, id: TypeId) -> usize {
        self.hasher.hash_one(id) as usize % SHAPE_CACHE_SHARD_COUNT
    }

    fn shape(&self, id: TypeId) -> Option<ShapeEntry> {
        self.shapes[self.shard(id)].read().get(&id).cloned()
    }

    fn insert_shape(&self, id: TypeId, entry: ShapeEntry) -> ShapeEntry {
        self.shapes[self.shard(id)]
            .write()
            .entry(id)
            .or_insert(entry)
            .clone()
    }

    fn fields<T: Mapped>(&self, id: TypeId) -> Option<Arc<[FieldAccessor<T>]>> {
        self.fields[self.shard(id)]
            .read()
            .get(&id)
            .and_then(|any| any.downcast_ref::<Arc<[FieldAccessor<T>]>>())
            .cloned()
    }

    fn insert_fields<T: Mapped>(
        &self,
        id: TypeId,
        fields: Arc<[FieldAccessor<T>]>,
    ) -> Arc<[FieldAccessor<T>]> {
        let mut shard = self.fields[self.shard(id)].write();
        let stored = shard
            .entry(id)
            .or_insert_with(|| Arc::new(Arc::clone(&fields)) as Arc<dyn Any + Send + Sync>);
        stored
            .downcast_ref::<Arc<[FieldAccessor<T>]>>()
            .cloned()
            .unwrap_or(fields)
    }
}

#[derive(Default)]
pub struct TypeMapper {
    in_progress: SmallVec<[(TypeId, String); 8]>,
}

impl TypeMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shape of `T`, computed once per process.
    pub fn shape<T: Mapped>(&mut self) -> Result<Arc<Shape>> {
        self.entry::<T>().map(|entry| entry.shape)
    }

    /// Structural type of `T` (`FromApplicationType`).
    pub fn structural_type<T: Mapped>(&mut self) -> Result<StructuralType> {
        self.entry::<T>().map(|entry| entry.ty)
    }

    /// Native logical type handle for `T` (`CreateLogicalType`).
    pub fn logical_type<T: Mapped>(&mut self) -> Result<LogicalType> {
        Ok(self.structural_type::<T>()?.to_logical())
    }

    fn entry<T: Mapped>(&mut self) -> Result<ShapeEntry> {
        if T::TRANSPARENT {
            let shape = T::shape(self)?;
            let ty = shape.structural_type();
            return Ok(ShapeEntry {
                shape: Arc::new(shape),
                ty,
            });
        }

        let id = TypeId::of::<T>();
        if let Some(entry) = cache().shape(id) {
            return Ok(entry);
        }

        self.enter::<T>()?;
        let result = T::shape(self);
        self.in_progress.pop();
        let shape = result?;

        let ty = shape.structural_type();
        tracing::debug!(type_name = %T::type_name(), ty = %ty, "mapped application type");
        Ok(cache().insert_shape(
            id,
            ShapeEntry {
                shape: Arc::new(shape),
                ty,
            },
        ))
    }

    fn enter<T: Mapped>(&mut self) -> Result<()> {
        let id = TypeId::of::<T>();
        if let Some(start) = self.in_progress.iter().position(|(seen, _)| *seen == id) {
            let mut cycle: Vec<String> = self.in_progress[start..]
                .iter()
                .map(|(_, name)| name.clone())
                .collect();
            cycle.push(T::type_name());
            bail!(MappingError::RecursiveType { cycle });
        }
        self.in_progress.push((id, T::type_name()));
        Ok(())
    }

    fn is_in_progress(&self, id: TypeId) -> bool {
        self.in_progress.iter().any(|(seen, _)| *seen == id)
    }

    /// Members of `T` in declaration order, computed once per process.
    pub fn declared_fields<T: Mapped>(&mut self) -> Result<Arc<[FieldAccessor<T>]>> {
        let id = TypeId::of::<T>();
        if let Some(fields) = cache().fields::<T>(id) {
            return Ok(fields);
        }
        if self.is_in_progress(id) {
            // the shape is not validated yet; nothing is cached until it is
            return Ok(T::fields(self)?.into());
        }
        self.shape::<T>()?;
        if let Some(fields) = cache().fields::<T>(id) {
            return Ok(fields);
        }
        let fields: Arc<[FieldAccessor<T>]> = T::fields(self)?.into();
        Ok(cache().insert_fields(id, fields))
    }

    /// `GetFields`: members of `T`, either in declaration order (`ty` is
    /// `None`) or in the order of `ty`'s fields matched by name. A `None`
    /// entry is a column of `ty` that `T` does not have.
    pub fn fields<T: Mapped>(
        &mut self,
        ty: Option<&StructuralType>,
    ) -> Result<Vec<Option<FieldAccessor<T>>>> {
        let declared = self.declared_fields::<T>()?;
        let Some(ty) = ty else {
            return Ok(declared.iter().cloned().map(Some).collect());
        };
        let Some(columns) = ty.fields() else {
            bail!(MappingError::incompatible(
                T::type_name(),
                ty,
                "expected a struct"
            ));
        };
        Ok(columns
            .iter()
            .map(|column| {
                declared
                    .iter()
                    .find(|field| field.name() == column.name)
                    .map(|field| field.bound_to(column.ty.clone()))
            })
            .collect())
    }

    /// Members of `T` with no column in `ty`.
    pub fn missing_fields<T: Mapped>(
        &mut self,
        ty: &StructuralType,
    ) -> Result<Vec<FieldAccessor<T>>> {
        let declared = self.declared_fields::<T>()?;
        Ok(declared
            .iter()
            .filter(|field| ty.field(field.name()).is_none())
            .cloned()
            .collect())
    }

    /// `CheckCompatible`: fails with `IncompatibleType` (or
    /// `UnsupportedConstruct`) when `T` cannot be read from or written to `ty`.
    pub fn check_compatible<T: Mapped>(
        &mut self,
        ty: &StructuralType,
        direction: Direction,
    ) -> Result<()> {
        T::check_compatible(self, ty, direction)
    }

    /// Compatibility for types whose structural type must match exactly.
    pub fn check_exact<T: Mapped>(&mut self, ty: &StructuralType) -> Result<()> {
        let own = self.structural_type::<T>()?;
        if own != *ty {
            bail!(MappingError::incompatible(
                T::type_name(),
                ty,
                format!("expected {}", own)
            ));
        }
        Ok(())
    }

    /// Compatibility for struct-shaped types, field by field.
    pub fn check_struct<T: Mapped>(
        &mut self,
        ty: &StructuralType,
        direction: Direction,
    ) -> Result<()> {
        let declared = self.declared_fields::<T>()?;
        let Some(columns) = ty.fields() else {
            bail!(MappingError::incompatible(
                T::type_name(),
                ty,
                "expected a struct"
            ));
        };

        match direction {
            Direction::Write => {
                if columns.len() != declared.len() {
                    bail!(MappingError::incompatible(
                        T::type_name(),
                        ty,
                        format!(
                            "{} members cannot fill {} columns",
                            declared.len(),
                            columns.len()
                        )
                    ));
                }
                for (field, column) in declared.iter().zip(columns) {
                    if field.name() != column.name {
                        bail!(MappingError::incompatible(
                            T::type_name(),
                            ty,
                            format!(
                                "member '{}' would be written to column '{}'",
                                field.name(),
                                column.name
                            )
                        ));
                    }
                    field.check(self, &column.ty, direction)?;
                }
            }
            Direction::Read => {
                for column in columns {
                    let Some(field) = declared.iter().find(|f| f.name() == column.name) else {
                        continue;
                    };
                    if field.is_readonly() {
                        bail!(MappingError::unsupported(
                            T::type_name(),
                            format!(
                                "member '{}' is read-only and cannot be set from a column",
                                field.name()
                            )
                        ));
                    }
                    field.check(self, &column.ty, direction)?;
                }
                if let Some(field) = declared
                    .iter()
                    .find(|f| !f.nullable() && ty.field(f.name()).is_none())
                {
                    bail!(MappingError::incompatible(
                        T::type_name(),
                        ty,
                        format!("non-nullable member '{}' has no column", field.name())
                    ));
                }
            }
        }
        Ok(())
    }
}
