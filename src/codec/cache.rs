//! Process-wide codec cache.
//!
//! Codecs are type-erased behind `Arc<dyn Any>` and recovered with a
//! downcast; the key's `TypeId` guarantees the stored type matches. Shards
//! are read without blocking other readers; inserts take one shard's write
//! lock and keep the first codec stored for a key.

use std::any::{Any, TypeId};
use std::collections::hash_map::RandomState;
use std::hash::BuildHasher;
use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::RwLock;

use crate::config::CODEC_CACHE_SHARD_COUNT;
use crate::mapping::{Direction, FieldId};
use crate::types::TypeHash;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodecTarget {
    Type(TypeId),
    Field(FieldId),
}

/// Identity of a compiled codec: what it converts, which way, whether it
/// handles a whole chunk, and the structural type it was built against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CodecKey {
    pub target: CodecTarget,
    pub direction: Direction,
    pub root: bool,
    pub structural: Option<TypeHash>,
}

impl CodecKey {
    pub fn of_type<T: 'static>(
        direction: Direction,
        root: bool,
        structural: Option<TypeHash>,
    ) -> Self {
        Self {
            target: CodecTarget::Type(TypeId::of::<T>()),
            direction,
            root,
            structural,
        }
    }

    pub fn of_field(id: FieldId, direction: Direction, structural: Option<TypeHash>) -> Self {
        Self {
            target: CodecTarget::Field(id),
            direction,
            root: false,
            structural,
        }
    }
}

type Shard = RwLock<HashMap<CodecKey, Arc<dyn Any + Send + Sync>>>;

pub(crate) struct CodecCache {
    shards: [Shard; CODEC_CACHE_SHARD_COUNT],
    hasher: RandomState,
}

impl CodecCache {
    pub(crate) fn new() -> Self {
        Self {
            shards: std::array::from_fn(|_| RwLock::new(HashMap::new())),
            hasher: RandomState::new(),
        }
    }

    fn shard(&self, key: &CodecKey) -> &Shard {
        &self.shards[self.hasher.hash_one(key) as usize % CODEC_CACHE_SHARD_COUNT]
    }

    pub(crate) fn get<C: Clone + 'static>(&self, key: &CodecKey) -> Option<C> {
        self.shard(key)
            .read()
            .get(key)
            .and_then(|codec| codec.downcast_ref::<C>())
            .cloned()
    }

    pub(crate) fn insert<C: Clone + Send + Sync + 'static>(&self, key: CodecKey, codec: C) -> C {
        let mut shard = self.shard(&key).write();
        let stored = shard
            .entry(key)
            .or_insert_with(|| Arc::new(codec.clone()) as Arc<dyn Any + Send + Sync>);
        stored.downcast_ref::<C>().cloned().unwrap_or(codec)
    }

    pub(crate) fn len(&self) -> usize {
        self.shards.iter().map(|shard| shard.read().len()).sum()
    }
}
