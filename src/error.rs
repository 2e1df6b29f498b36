//! # Mapping and Codec Errors
//!
//! Every fallible operation in duckrow returns `eyre::Result`. Failures that a
//! caller may want to act on are raised as [`MappingError`] values through
//! `eyre::bail!`, so the taxonomy survives any context added on the way up:
//!
//! ```ignore
//! let err = mapper.structural_type::<Node>().unwrap_err();
//! match err.downcast_ref::<MappingError>() {
//!     Some(MappingError::RecursiveType { cycle }) => println!("cycle: {cycle:?}"),
//!     _ => {}
//! }
//! ```
//!
//! | Variant | Raised | Phase |
//! |---------|--------|-------|
//! | `RecursiveType` | type reachable from itself | mapping / codec build |
//! | `IncompatibleType` | application shape disagrees with a structural type | codec build |
//! | `UnsupportedConstruct` | 64-bit or negative enums, nullable fixed-array elements, read-only members | mapping / codec build |
//! | `EnumOutOfRange` | enum value above the width chosen for its type, or flag bits no member declares | serialization |
//! | `UnexpectedNull` | NULL read into a type with no null representation | deserialization |
//! | `UnknownEnumLabel` | text enum label with no matching member | deserialization |

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MappingError {
    /// A type contains itself. `cycle` lists the type names from the first
    /// occurrence back to the repeated type.
    RecursiveType { cycle: Vec<String> },
    IncompatibleType {
        application: String,
        structural: String,
        reason: String,
    },
    UnsupportedConstruct { type_name: String, reason: String },
    EnumOutOfRange {
        type_name: String,
        value: i64,
        max_ordinal: i64,
    },
    UnexpectedNull { type_name: String, row: usize },
    UnknownEnumLabel { type_name: String, label: String },
}

impl MappingError {
    pub fn incompatible(
        application: impl Into<String>,
        structural: impl fmt::Display,
        reason: impl Into<String>,
    ) -> Self {
        MappingError::IncompatibleType {
            application: application.into(),
            structural: structural.to_string(),
            reason: reason.into(),
        }
    }

    pub fn unsupported(type_name: impl Into<String>, reason: impl Into<String>) -> Self {
        MappingError::UnsupportedConstruct {
            type_name: type_name.into(),
            reason: reason.into(),
        }
    }

    /// Readers report `UnexpectedNull` against the vector they read; the
    /// reader one level up moves the row into its own numbering. Any other
    /// error passes through untouched.
    pub(crate) fn rebase_row(
        report: eyre::Report,
        rebase: impl FnOnce(usize) -> usize,
    ) -> eyre::Report {
        match report.downcast_ref::<MappingError>() {
            Some(MappingError::UnexpectedNull { type_name, row }) => {
                eyre::Report::new(MappingError::UnexpectedNull {
                    type_name: type_name.clone(),
                    row: rebase(*row),
                })
            }
            _ => report,
        }
    }
}

impl fmt::Display for MappingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MappingError::RecursiveType { cycle } => {
                write!(f, "recursive type: {}", cycle.join(" -> "))
            }
            MappingError::IncompatibleType {
                application,
                structural,
                reason,
            } => write!(
                f,
                "type {} is not compatible with {}: {}",
                application, structural, reason
            ),
            MappingError::UnsupportedConstruct { type_name, reason } => {
                write!(f, "unsupported construct in {}: {}", type_name, reason)
            }
            MappingError::EnumOutOfRange {
                type_name,
                value,
                max_ordinal,
            } => write!(
                f,
                "value {} of enum {} is outside the range 0..={} fixed when its native type was \
                 created; declare the member or use a wider backing representation",
                value, type_name, max_ordinal
            ),
            MappingError::UnexpectedNull { type_name, row } => write!(
                f,
                "NULL at row {} cannot be read into non-nullable type {}; wrap it in Option",
                row, type_name
            ),
            MappingError::UnknownEnumLabel { type_name, label } => {
                write!(f, "enum {} has no member labelled '{}'", type_name, label)
            }
        }
    }
}

impl std::error::Error for MappingError {}
