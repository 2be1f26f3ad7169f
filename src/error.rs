//! Error taxonomy shared by the protocols and both containers.

use thiserror::Error;

/// Failures raised synchronously at the offending call.
///
/// Containers compute every fallible step before they mutate, so a returned
/// error always leaves the container as it was before the call.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum Error {
    /// Malformed call shape: odd bulk argument list, non-positive capacity,
    /// out-of-range configuration.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A type-scoped protocol entry point saw a value of another type.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// Lookup or delete missed and no default was available.
    #[error("key not found")]
    KeyNotFound,

    /// The protocol method is not provided by this type.
    #[error("unsupported: {0}")]
    Unsupported(&'static str),
}

pub type Result<T, E = Error> = core::result::Result<T, E>;

impl Error {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }
}
