//! Error types for admission control.

use crate::store::StoreError;
use thiserror::Error;

/// Errors reported to callers of the [`crate::AdmissionRegistry`].
///
/// These are structured failures for the external API layer; they never
/// cross the connection boundary and never corrupt registry state.
#[derive(Debug, Error)]
pub enum AdmissionError {
    /// No suspended query exists for the given id.
    #[error("query not found in pending registry")]
    NotFound,

    /// The persisted query is not in a state that permits the operation.
    #[error("query is not in a pending state")]
    InvalidState,

    /// The caller supplied an unusable value.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The persistence backend failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}
