//! # Generated Record Shapes
//!
//! A `RecordShape` stands in for an application struct when a result is
//! read without one: it is generated once per struct `StructuralType` and
//! kept in a registry keyed by the type's content hash, so every record of a
//! given shape shares one instance.
//!
//! ```text
//! Registry
//! ├── Shard 0:  RwLock<HashMap<TypeHash, Arc<RecordShape>>>
//! ├── ...
//! └── Shard 15
//! ```

use std::fmt;
use std::sync::{Arc, OnceLock};

use eyre::{bail, ensure, eyre, Result};
use hashbrown::HashMap;
use parking_lot::RwLock;

use super::Value;
use crate::config::SHAPE_CACHE_SHARD_COUNT;
use crate::error::MappingError;
use crate::types::{StructuralType, TypeHash};

pub struct RecordShape {
    ty: StructuralType,
    names: Vec<String>,
    index: HashMap<String, usize>,
}

struct Registry {
    shards: [RwLock<HashMap<TypeHash, Arc<RecordShape>>>; SHAPE_CACHE_SHARD_COUNT],
}

static REGISTRY: OnceLock<Registry> = OnceLock::new();

fn registry() -> &'static Registry {
    REGISTRY.get_or_init(|| Registry {
        shards: std::array::from_fn(|_| RwLock::new(HashMap::new())),
    })
}

impl RecordShape {
    /// The generated shape for a struct type, created on first use.
    pub fn of(ty: &StructuralType) -> Result<Arc<RecordShape>> {
        let Some(fields) = ty.fields() else {
            bail!(MappingError::unsupported(
                ty.to_string(),
                "records can only be generated for struct types"
            ));
        };
        let hash = ty.content_hash();
        let shard = &registry().shards[hash.shard(SHAPE_CACHE_SHARD_COUNT)];

        if let Some(shape) = shard.read().get(&hash) {
            return Ok(Arc::clone(shape));
        }

        let mut guard = shard.write();
        let shape = guard.entry(hash).or_insert_with(|| {
            let names: Vec<String> = fields.iter().map(|f| f.name.clone()).collect();
            let index = names
                .iter()
                .enumerate()
                .map(|(i, name)| (name.clone(), i))
                .collect();
            tracing::debug!(ty = %ty, fields = names.len(), "generated record shape");
            Arc::new(RecordShape {
                ty: ty.clone(),
                names,
                index,
            })
        });
        Ok(Arc::clone(shape))
    }

    pub fn structural_type(&self) -> &StructuralType {
        &self.ty
    }

    pub fn field_names(&self) -> &[String] {
        &self.names
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl PartialEq for RecordShape {
    fn eq(&self, other: &Self) -> bool {
        self.ty == other.ty
    }
}

impl fmt::Debug for RecordShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecordShape({})", self.ty)
    }
}

/// Number of record shapes generated by this process.
pub fn generated_shape_count() -> usize {
    registry().shards.iter().map(|s| s.read().len()).sum()
}

/// One row of a struct type with no application counterpart.
#[derive(Clone, PartialEq)]
pub struct Record {
    shape: Arc<RecordShape>,
    values: Vec<Value>,
}

impl Record {
    pub fn new(shape: Arc<RecordShape>, values: Vec<Value>) -> Result<Self> {
        ensure!(
            values.len() == shape.len(),
            "{} has {} fields, got {} values",
            shape.ty,
            shape.len(),
            values.len()
        );
        Ok(Self { shape, values })
    }

    /// `values` must hold one entry per field of `shape`.
    pub(super) fn from_parts(shape: Arc<RecordShape>, values: Vec<Value>) -> Self {
        debug_assert_eq!(values.len(), shape.len());
        Self { shape, values }
    }

    /// A record of `ty` with every field NULL.
    pub fn nulls(ty: &StructuralType) -> Result<Self> {
        let shape = RecordShape::of(ty)?;
        let values = vec![Value::Null; shape.len()];
        Ok(Self { shape, values })
    }

    /// Builds a record from `(name, value)` pairs; unnamed fields are NULL.
    pub fn from_pairs<I, S, V>(ty: &StructuralType, pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, V)>,
        S: AsRef<str>,
        V: Into<Value>,
    {
        let mut record = Self::nulls(ty)?;
        for (name, value) in pairs {
            record.set(name.as_ref(), value)?;
        }
        Ok(record)
    }

    pub fn shape(&self) -> &Arc<RecordShape> {
        &self.shape
    }

    pub fn structural_type(&self) -> &StructuralType {
        &self.shape.ty
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.shape.index_of(name).map(|i| &self.values[i])
    }

    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        let index = self
            .shape
            .index_of(name)
            .ok_or_else(|| eyre!("{} has no field '{}'", self.shape.ty, name))?;
        self.values[index] = value.into();
        Ok(())
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.shape.names.iter().zip(&self.values))
            .finish()
    }
}
