//! Error types for envelope encoding.

use thiserror::Error;

/// Errors raised while encoding or decoding request envelopes.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    /// Envelope JSON encode/decode failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
