use thiserror::Error;

/// Unified error type for store operations that application code can handle.
///
/// The store is an abstract keyed repository; these variants are the only
/// failure modes handlers are allowed to depend on. `Unavailable` models a
/// transport failure of the backing store and is what triggers the
/// degraded-mode fallback - it is never returned for a plain miss.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Entity not found by the given identifier
    #[error("Entity not found")]
    NotFound,

    /// Uniqueness violation on a keyed field
    #[error("Unique constraint violation on {field}")]
    Conflict {
        /// Which keyed field collided ("email" or "username")
        field: &'static str,
        /// The normalized value that collided
        value: String,
        /// Whether the existing holder of the value is a verified account
        verified_holder: bool,
    },

    /// The backing store cannot be reached
    #[error("Store unavailable: {reason}")]
    Unavailable { reason: String },

    /// Catch-all for non-recoverable errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Type alias for store operation results
pub type Result<T> = std::result::Result<T, StoreError>;
