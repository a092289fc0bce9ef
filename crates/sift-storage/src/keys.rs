//! Key encoding for buffered request chunks.
//!
//! Key format: `$RL_{request_id:be64}_{chunk_seq:be32}`
//! - `$RL_`: marks request-log entries within the store
//! - request_id: fixed-width big-endian u64
//! - chunk_seq: fixed-width big-endian u32, separated by `_`
//!
//! The fixed-width big-endian components make the lexicographic key order
//! equal to `(request_id, chunk_seq)` order, so a forward scan from a
//! request's prefix yields its chunks in ascending sequence.

use crate::error::StorageError;

/// Prefix shared by every request-log key.
pub const REQ_LOG_PREFIX: &[u8] = b"$RL_";

/// Separator byte between the request id and the chunk sequence.
const SEQ_SEPARATOR: u8 = b'_';

/// Total encoded length: prefix + u64 + separator + u32.
const ENCODED_LEN: usize = REQ_LOG_PREFIX.len() + 8 + 1 + 4;

/// Key for one persisted chunk of a buffered request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ChunkKey {
    /// Request id (the envelope's `start_ts`)
    pub request_id: u64,
    /// Zero-based chunk sequence within the request
    pub chunk_seq: u32,
}

impl ChunkKey {
    /// Create a key for the given request and chunk sequence.
    pub fn new(request_id: u64, chunk_seq: u32) -> Self {
        Self {
            request_id,
            chunk_seq,
        }
    }

    /// Encode to the on-disk byte layout.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(ENCODED_LEN);
        out.extend_from_slice(REQ_LOG_PREFIX);
        out.extend_from_slice(&self.request_id.to_be_bytes());
        out.push(SEQ_SEPARATOR);
        out.extend_from_slice(&self.chunk_seq.to_be_bytes());
        out
    }

    /// Decode a key produced by [`ChunkKey::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StorageError> {
        if bytes.len() != ENCODED_LEN || !bytes.starts_with(REQ_LOG_PREFIX) {
            return Err(StorageError::Key(format!(
                "invalid chunk key length/prefix: {} bytes",
                bytes.len()
            )));
        }
        let id_start = REQ_LOG_PREFIX.len();
        let sep = id_start + 8;
        if bytes[sep] != SEQ_SEPARATOR {
            return Err(StorageError::Key("missing chunk key separator".to_string()));
        }

        let mut id_buf = [0u8; 8];
        id_buf.copy_from_slice(&bytes[id_start..sep]);
        let mut seq_buf = [0u8; 4];
        seq_buf.copy_from_slice(&bytes[sep + 1..]);

        Ok(Self {
            request_id: u64::from_be_bytes(id_buf),
            chunk_seq: u32::from_be_bytes(seq_buf),
        })
    }

    /// Prefix shared by every chunk of `request_id`, separator included.
    ///
    /// A forward scan stops at the first key that does not start with this.
    pub fn request_prefix(request_id: u64) -> Vec<u8> {
        let mut out = Vec::with_capacity(REQ_LOG_PREFIX.len() + 8 + 1);
        out.extend_from_slice(REQ_LOG_PREFIX);
        out.extend_from_slice(&request_id.to_be_bytes());
        out.push(SEQ_SEPARATOR);
        out
    }

    /// Half-open range `[key(id, 0), key(id, u32::MAX))` covering every
    /// chunk a request can hold, for range deletion.
    pub fn request_range(request_id: u64) -> (Vec<u8>, Vec<u8>) {
        (
            ChunkKey::new(request_id, 0).to_bytes(),
            ChunkKey::new(request_id, u32::MAX).to_bytes(),
        )
    }
}
