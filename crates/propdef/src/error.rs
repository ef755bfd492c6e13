//! Crate error type.
//!
//! The taxonomy is deliberately small. `InvalidDescriptor` is the one error
//! the storage layer raises on its own behalf: a descriptor that passed the
//! six-key allow-list but is semantically contradictory, or an incompatible
//! redefinition of a non-configurable slot. Nothing is caught internally;
//! every failure propagates to the caller as a value.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::value::{FnRef, ObjectRef};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum Error {
    /// A descriptor that cannot be applied: accessor slots combined with
    /// `value`/`writable`, a non-callable getter or setter, or a change the
    /// current non-configurable slot does not permit.
    #[error("invalid descriptor for `{name}`: {reason}")]
    InvalidDescriptor { name: String, reason: String },

    /// A handle that does not resolve to a live composite.
    #[error("{0} does not resolve")]
    ObjectNotFound(ObjectRef),

    /// A handle that does not resolve to a native function.
    #[error("{0} does not resolve")]
    FunctionNotFound(FnRef),

    /// The operation requires a property map but the handle resolves to a
    /// sequence.
    #[error("{0} is not a property map")]
    NotAMap(ObjectRef),

    /// A prototype chain that loops back on itself.
    #[error("prototype chain cycle detected")]
    PrototypeCycle,

    /// A prototype chain deeper than the fixed walking limit.
    #[error("prototype chain depth {depth} exceeds max {max}")]
    PrototypeChainTooDeep { depth: u32, max: u32 },

    /// A self-referential composite handed to the JSON encoder.
    #[error("cannot encode a self-referential composite")]
    CircularReference,
}

impl Error {
    pub(crate) fn invalid_descriptor(name: &str, reason: impl Into<String>) -> Self {
        Self::InvalidDescriptor {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}
