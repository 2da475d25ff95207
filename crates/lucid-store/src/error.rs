//! Store error types.

use thiserror::Error;

/// Errors surfaced by document-store adapters.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique index rejected the write.
    #[error("Duplicate key in {collection}: {key}")]
    DuplicateKey { collection: String, key: String },

    /// Documents must carry a string `_id` field.
    #[error("Document in {collection} is missing a string _id")]
    MissingId { collection: String },

    /// Lookup by id found nothing.
    #[error("Not found in {collection}: {id}")]
    NotFound { collection: String, id: String },

    /// The backend is unreachable or its connection was lost.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Document (de)serialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem failure in the file adapter.
    #[error("Store I/O error: {0}")]
    Io(#[from] std::io::Error),
}
