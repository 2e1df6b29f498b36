//! # duckrow Configuration Constants
//!
//! This module centralizes all configuration constants, grouping interdependent
//! values together and documenting their relationships. Several of these values
//! mirror the native engine's own memory layout and must not be changed
//! independently of it.
//!
//! ## Dependency Graph
//!
//! ```text
//! VECTOR_SIZE (2048 rows)
//!       │
//!       ├─> VALIDITY_ENTRY_BITS (64 rows per validity word)
//!       │     VECTOR_SIZE must be a multiple so a full batch has no
//!       │     partially used trailing word.
//!       │
//!       └─> root writers fill at most VECTOR_SIZE rows per chunk
//!
//! STRING_INLINE_LENGTH (12 bytes)
//!       │
//!       ├─> STRING_PREFIX_LENGTH (4 bytes, stored for out-of-line strings)
//!       │
//!       └─> STRING_REF_SIZE (16 bytes = 4 length + 12 payload)
//!
//! ARENA_INITIAL_CHUNK_SIZE (4 KB)
//!       │
//!       └─> ARENA_MAX_CHUNK_SIZE (1 MB, doubling stops here)
//! ```
//!
//! ## Critical Invariants
//!
//! 1. `VECTOR_SIZE % VALIDITY_ENTRY_BITS == 0`
//! 2. `STRING_REF_SIZE == 4 + STRING_INLINE_LENGTH`
//! 3. `ARENA_INITIAL_CHUNK_SIZE <= ARENA_MAX_CHUNK_SIZE`
//! 4. Enum width tiers are strictly increasing

// ============================================================================
// BATCH LAYOUT
// These match the native engine's vector layout
// ============================================================================

/// Number of rows in one native vector (the engine's `STANDARD_VECTOR_SIZE`).
pub const VECTOR_SIZE: usize = 2048;

/// Rows covered by one validity word.
pub const VALIDITY_ENTRY_BITS: usize = 64;

const _: () = assert!(
    VECTOR_SIZE % VALIDITY_ENTRY_BITS == 0,
    "VECTOR_SIZE must be a multiple of VALIDITY_ENTRY_BITS"
);

/// Alignment of every vector data buffer. Large enough for 128-bit integers.
pub const VECTOR_DATA_ALIGNMENT: usize = 16;

// ============================================================================
// STRING REPRESENTATION
// Bit-for-bit compatible with the engine's `string_t`
// ============================================================================

/// Strings up to this many bytes are stored entirely inside the 16-byte header.
pub const STRING_INLINE_LENGTH: usize = 12;

/// Number of leading bytes kept in the header of an out-of-line string.
pub const STRING_PREFIX_LENGTH: usize = 4;

/// Size of the fixed string header written into a vector slot.
pub const STRING_REF_SIZE: usize = 16;

const _: () = assert!(
    STRING_REF_SIZE == 4 + STRING_INLINE_LENGTH,
    "STRING_REF_SIZE must be the length word plus the inline payload"
);

// ============================================================================
// ARENA
// Out-of-line storage for strings and blobs written during serialization
// ============================================================================

/// Size of the first chunk an arena allocates.
pub const ARENA_INITIAL_CHUNK_SIZE: usize = 4 * 1024;

/// Chunk sizes double on underflow until they reach this bound. Requests
/// larger than the bound still get a dedicated chunk of exactly their size.
pub const ARENA_MAX_CHUNK_SIZE: usize = 1024 * 1024;

const _: () = assert!(
    ARENA_INITIAL_CHUNK_SIZE <= ARENA_MAX_CHUNK_SIZE,
    "ARENA_INITIAL_CHUNK_SIZE must not exceed ARENA_MAX_CHUNK_SIZE"
);

// ============================================================================
// ENUM MAPPING
// Width tiers for enums stored as unsigned integers
// ============================================================================

/// Largest ordinal stored in a `UTINYINT` column.
pub const ENUM_MAX_ORDINAL_8: i64 = i8::MAX as i64;

/// Largest ordinal stored in a `USMALLINT` column.
pub const ENUM_MAX_ORDINAL_16: i64 = i16::MAX as i64;

/// Largest ordinal stored in a `UINTEGER` column. Anything above is rejected.
pub const ENUM_MAX_ORDINAL_32: i64 = u32::MAX as i64;

const _: () = assert!(
    ENUM_MAX_ORDINAL_8 < ENUM_MAX_ORDINAL_16 && ENUM_MAX_ORDINAL_16 < ENUM_MAX_ORDINAL_32,
    "enum width tiers must be strictly increasing"
);

/// Label used when an enum value with no declared member is written as text.
/// The ordinal is appended, e.g. `__anonymous_7`.
pub const ANONYMOUS_ENUM_MEMBER_PREFIX: &str = "__anonymous_";

/// Column name used when a non-struct type is written as a single column.
pub const SCALAR_COLUMN_NAME: &str = "value";

// ============================================================================
// SHARDING
// Lock striping for the process-wide caches
// ============================================================================

/// Number of shards in the structural type intern table.
pub const INTERN_SHARD_COUNT: usize = 16;

/// Number of shards in the codec cache.
pub const CODEC_CACHE_SHARD_COUNT: usize = 16;

/// Number of shards in the type mapper's shape cache.
pub const SHAPE_CACHE_SHARD_COUNT: usize = 16;
