//! # Low-Level Memory Primitives
//!
//! The building blocks the codecs use to address native vector memory:
//!
//! | Type | Purpose |
//! |------|---------|
//! | [`Arena`] | Bump allocator for out-of-line string and blob bytes |
//! | [`StringRef`] | 16-byte string header, inline up to 12 bytes |
//! | [`validity`] | Bit-level helpers over `u64` validity words |
//!
//! ## Ownership
//!
//! An `Arena` and the vectors it backs belong to one batch at a time. The
//! arena must outlive every `StringRef` written into a vector until the engine
//! has consumed that vector; resetting it between batches is the only way to
//! reclaim space.

mod arena;
mod string;
pub mod validity;

pub use arena::Arena;
pub use string::StringRef;
pub use validity::RowFilter;
