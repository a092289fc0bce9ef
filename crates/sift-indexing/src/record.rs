//! The in-memory assembly record for one in-flight request.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

use sift_types::{SharedRequest, SharedResponse};

/// Assembly record tracking one buffered request.
///
/// Records live in the chunk buffer as `Arc<RequestRecord>` so a worker
/// can keep a handle outside the buffer mutex. The replication thread
/// bumps `num_chunks` under the buffer mutex; once `is_complete` is set,
/// `next_chunk_index` and `prev_req_body` are touched by exactly one
/// worker, and the atomics let the snapshot writer read a consistent view
/// at chunk boundaries.
pub struct RequestRecord {
    /// Epoch seconds when the first chunk arrived; GC input
    pub batch_begin_ts: u64,

    /// Chunks accepted so far
    pub num_chunks: AtomicU32,

    /// Next chunk a worker must replay; survives restart via the snapshot
    pub next_chunk_index: AtomicU32,

    /// True once the final chunk of the request has been received
    pub is_complete: AtomicBool,

    /// Carry-over bytes from the previous chunk: the tail that did not
    /// form a complete application-level record
    pub prev_req_body: Mutex<String>,

    /// The request envelope, co-owned with the replication thread
    pub req: SharedRequest,

    /// Response handle; detached when no client is attached
    pub res: SharedResponse,
}

impl RequestRecord {
    /// Record for a freshly arrived first chunk.
    pub fn new(req: SharedRequest, res: SharedResponse, batch_begin_ts: u64) -> Self {
        Self {
            batch_begin_ts,
            num_chunks: AtomicU32::new(1),
            next_chunk_index: AtomicU32::new(0),
            is_complete: AtomicBool::new(false),
            prev_req_body: Mutex::new(String::new()),
            req,
            res,
        }
    }

    /// Record rebuilt from snapshot fields.
    pub fn restore(
        req: SharedRequest,
        res: SharedResponse,
        batch_begin_ts: u64,
        num_chunks: u32,
        next_chunk_index: u32,
        is_complete: bool,
        prev_req_body: String,
    ) -> Self {
        Self {
            batch_begin_ts,
            num_chunks: AtomicU32::new(num_chunks),
            next_chunk_index: AtomicU32::new(next_chunk_index),
            is_complete: AtomicBool::new(is_complete),
            prev_req_body: Mutex::new(prev_req_body),
            req,
            res,
        }
    }

    /// Whether replay has consumed every accepted chunk.
    pub fn is_drained(&self) -> bool {
        self.next_chunk_index.load(Ordering::SeqCst) >= self.num_chunks.load(Ordering::SeqCst)
    }
}
