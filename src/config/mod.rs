//! # duckrow Configuration Module
//!
//! This module centralizes all configuration constants for duckrow. Constants are
//! grouped by their functional area and interdependencies are documented and
//! enforced through compile-time assertions.
//!
//! Several values (`VECTOR_SIZE`, `STRING_INLINE_LENGTH`) are dictated by the
//! native engine's memory layout. Changing them breaks compatibility with any
//! engine that reads the vectors this crate writes.
//!
//! ## Module Organization
//!
//! - [`constants`]: All numeric configuration values with dependency documentation

pub mod constants;
pub use constants::*;
