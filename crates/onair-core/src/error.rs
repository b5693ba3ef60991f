//! Engine error type.

use onair_store::StoreError;

use crate::validation::ValidationError;

/// Errors surfaced by engine operations.
///
/// Event log failures never appear here; they are logged and swallowed.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Malformed input.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Timer, queue, or settings persistence failed. Partial multi-step
    /// sequences are not rolled back.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}
