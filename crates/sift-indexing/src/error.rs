//! Error types for the indexing path.

use sift_storage::StorageError;
use sift_types::EnvelopeError;
use thiserror::Error;

/// Errors that can occur while buffering or replaying requests.
#[derive(Debug, Error)]
pub enum IndexingError {
    /// Request-log store operation failed. The replication caller treats
    /// this as fatal: losing a buffered chunk silently would break the
    /// durability contract.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Invalid indexer configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Envelope or snapshot JSON encode/decode failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A legacy serialized request (id 0) was enqueued while another one
    /// is still buffered. Pre-chunking log entries carry no request
    /// identity, so concurrent legacy requests cannot be told apart.
    #[error("A legacy serialized request is already buffered")]
    LegacyRequestInFlight,

    /// Worker thread spawn failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for IndexingError {
    fn from(err: serde_json::Error) -> Self {
        IndexingError::Serialization(err.to_string())
    }
}

impl From<EnvelopeError> for IndexingError {
    fn from(err: EnvelopeError) -> Self {
        IndexingError::Serialization(err.to_string())
    }
}
