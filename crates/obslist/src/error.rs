#![forbid(unsafe_code)]

//! Error type shared by every collection operation.
//!
//! All variants describe caller-input problems. None of them is transient,
//! and a failed operation leaves the store and the pending buffer exactly
//! as they were before the call.

use thiserror::Error;

/// Errors returned by [`ObservableCollection`](crate::ObservableCollection)
/// mutations and by [`UpdateInPlace`](crate::UpdateInPlace) implementations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CollectionError {
    /// The index is outside `0..=count` (insertion) or `0..count` (removal, update).
    #[error("index {index} out of bounds for collection of {count} elements")]
    IndexOutOfBounds { index: usize, count: usize },

    /// Value-based removal of an element that is not present.
    #[error("element is not present in the collection")]
    NoSuchElement,

    /// The element is already present, or appears twice in the same batch.
    #[error("element is already present in the collection")]
    DuplicateElement,

    /// The update template does not share the target element's identity.
    #[error("update template does not match the identity of the target element")]
    UpdateNotApplicable,

    /// Misuse of a state machine (grouping, change markers).
    #[error("precondition violated: {0}")]
    PreconditionViolation(&'static str),
}

impl CollectionError {
    /// Whether the error signals programmer misuse rather than bad input.
    #[must_use]
    pub fn is_precondition(&self) -> bool {
        matches!(self, Self::PreconditionViolation(_))
    }
}

/// Result alias used throughout the crate.
pub type Result<T, E = CollectionError> = std::result::Result<T, E>;
