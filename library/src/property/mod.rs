//! Generic property sets: the only medium of data exchange with plugins.

mod hook;
pub mod keys;
mod set;
mod value;

use thiserror::Error;

pub use hook::{HookId, PropertyHook, PropertyObserver};
pub use set::{Access, PropertySet};
pub use value::{Dimension, PropertyKind, PropertySpec, PropertyValue};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PropertyError {
    #[error("unknown property '{0}'")]
    UnknownKey(String),
    #[error("property '{key}' holds {expected} values, got {found}")]
    TypeMismatch {
        key: String,
        expected: PropertyKind,
        found: PropertyKind,
    },
    #[error("index {index} out of range for property '{key}' of dimension {dimension}")]
    BadIndex {
        key: String,
        index: usize,
        dimension: usize,
    },
    #[error("property '{key}' expects {expected} values, got {found}")]
    DimensionMismatch {
        key: String,
        expected: usize,
        found: usize,
    },
    #[error("property '{0}' is read-only")]
    ReadOnly(String),
    #[error("value for '{key}' rejected: {reason}")]
    Rejected { key: String, reason: String },
}
