//! # Structural Type Intern Table
//!
//! Process-wide table mapping a [`TypeHash`] to the single `StructuralType`
//! instance with that content. Lock striping keeps first-use insertions from
//! different shapes off each other's shard:
//!
//! ```text
//! Interner
//! ├── Shard 0:  RwLock<HashMap<TypeHash, StructuralType>>
//! ├── ...
//! └── Shard 15: RwLock<HashMap<TypeHash, StructuralType>>
//! ```
//!
//! Lookups take a shard read lock only. A miss upgrades to the shard write
//! lock and re-checks before inserting, so at most one instance per digest
//! ever becomes visible even when several threads observe a shape at once.

use std::sync::{Arc, OnceLock};

use hashbrown::HashMap;
use parking_lot::RwLock;

use super::structural::{StructuralType, TypeHash, TypeKind, TypeNode};
use crate::config::INTERN_SHARD_COUNT;

struct Interner {
    shards: [RwLock<HashMap<TypeHash, StructuralType>>; INTERN_SHARD_COUNT],
}

static INTERNER: OnceLock<Interner> = OnceLock::new();

fn interner() -> &'static Interner {
    INTERNER.get_or_init(|| Interner {
        shards: std::array::from_fn(|_| RwLock::new(HashMap::new())),
    })
}

/// Returns the interned type for `hash`, building it with `factory` on first use.
pub(crate) fn intern(hash: TypeHash, factory: impl FnOnce() -> TypeKind) -> StructuralType {
    let shard = &interner().shards[hash.shard(INTERN_SHARD_COUNT)];

    if let Some(existing) = shard.read().get(&hash) {
        return existing.clone();
    }

    let mut guard = shard.write();
    guard
        .entry(hash)
        .or_insert_with(|| {
            let ty = StructuralType(Arc::new(TypeNode {
                hash,
                kind: factory(),
            }));
            tracing::trace!(hash = ?hash, ty = %ty, "interned structural type");
            ty
        })
        .clone()
}

/// Number of distinct structural types seen by this process.
pub fn interned_count() -> usize {
    interner().shards.iter().map(|s| s.read().len()).sum()
}

/// Looks up an already interned type by digest.
pub fn lookup(hash: &TypeHash) -> Option<StructuralType> {
    interner().shards[hash.shard(INTERN_SHARD_COUNT)]
        .read()
        .get(hash)
        .cloned()
}
