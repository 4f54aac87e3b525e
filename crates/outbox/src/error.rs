//! Storage error types.

use thiserror::Error;

/// Errors surfaced by outbox stores and aggregate repositories.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An insert lost the uniqueness race on an idempotency key.
    ///
    /// Not a failure of the workflow: the handler must fetch the row
    /// that won and return it instead of propagating this.
    #[error("duplicate idempotency key: {key}")]
    DuplicateIdempotencyKey { key: String },

    /// An update found a different version than the one it loaded.
    /// Another writer committed in between; retry against fresh state.
    #[error("concurrency conflict on {entity} {id}: stored version differs from {expected}")]
    ConcurrencyConflict {
        entity: &'static str,
        id: String,
        expected: i64,
    },

    /// The target row does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A stored value could not be interpreted.
    #[error("invalid stored record: {0}")]
    InvalidRecord(String),

    /// A database error occurred.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A serialization/deserialization error occurred.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;
