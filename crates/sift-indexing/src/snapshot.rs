//! Snapshot participation: serializing and restoring the chunk buffer.
//!
//! The snapshot orchestrator holds the pause latch exclusive, flushes the
//! request-log store, and emits the serialized buffer alongside it. On
//! restart the buffer is rebuilt from the snapshot and completed requests
//! are queued back onto their collection shards. Response handles are not
//! serialized: clients reconnect or time out, so restored records get
//! detached responses.

use std::collections::BTreeMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use sift_types::{HttpRequest, HttpResponse};

use crate::error::IndexingError;
use crate::indexer::BatchedIndexer;
use crate::record::RequestRecord;
use crate::router;

/// Serialized form of one buffered request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecordSnapshot {
    /// Epoch seconds when the first chunk arrived
    pub batch_begin_ts: u64,

    /// Chunks accepted so far
    pub num_chunks: u32,

    /// Next chunk to replay after restore
    pub next_chunk_index: u32,

    /// Whether the final chunk had been received
    pub is_complete: bool,

    /// Envelope JSON, carried opaque
    pub req: String,

    /// Carry-over tail from the previous chunk
    pub prev_req_body: String,
}

/// Serialized form of the whole chunk buffer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexerSnapshot {
    /// Pending-chunk counter at the time of the cut
    pub queued_writes: i64,

    /// Buffered requests keyed by decimal request id
    pub req_res_map: BTreeMap<String, RecordSnapshot>,
}

impl IndexerSnapshot {
    /// Serialize to JSON bytes for the snapshot writer.
    pub fn to_bytes(&self) -> Result<Vec<u8>, IndexingError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Deserialize from JSON bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, IndexingError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

impl BatchedIndexer {
    /// Serialize the chunk buffer for a snapshot.
    ///
    /// The caller must already hold the pause latch exclusive; with it
    /// held, every worker is parked at a chunk boundary and the buffer is
    /// a consistent cut against the flushed store.
    pub fn serialize_state(&self) -> Result<IndexerSnapshot, IndexingError> {
        let buffer = self.buffer.lock().unwrap();

        let mut req_res_map = BTreeMap::new();
        for (request_id, record) in buffer.iter() {
            let req = record.req.lock().unwrap().to_json()?;
            req_res_map.insert(
                request_id.to_string(),
                RecordSnapshot {
                    batch_begin_ts: record.batch_begin_ts,
                    num_chunks: record.num_chunks.load(Ordering::SeqCst),
                    next_chunk_index: record.next_chunk_index.load(Ordering::SeqCst),
                    is_complete: record.is_complete.load(Ordering::SeqCst),
                    req,
                    prev_req_body: record.prev_req_body.lock().unwrap().clone(),
                },
            );
        }

        info!(
            "Serialized {} in-flight requests for snapshot",
            req_res_map.len()
        );
        Ok(IndexerSnapshot {
            queued_writes: self.get_queued_writes(),
            req_res_map,
        })
    }

    /// Rebuild the chunk buffer from a snapshot.
    ///
    /// Completed records are queued back onto the shard their collection
    /// hashes to; incomplete ones wait for `enqueue` to finish them as the
    /// log is re-read. Each touched queue is sorted by request id
    /// afterwards because the snapshot map is not in arrival order.
    pub fn load_state(&self, snapshot: IndexerSnapshot) -> Result<(), IndexingError> {
        self.set_queued_writes(snapshot.queued_writes);

        let mut touched_shards = Vec::new();
        let mut restored = 0usize;

        for (id_str, entry) in &snapshot.req_res_map {
            let request_id: u64 = id_str.parse().map_err(|_| {
                IndexingError::Serialization(format!("invalid request id in snapshot: {id_str}"))
            })?;

            let req = HttpRequest::from_json(&entry.req)?;
            let collection = if entry.is_complete {
                router::collection_name(self.server.as_ref(), &req)
            } else {
                String::new()
            };

            let record = Arc::new(RequestRecord::restore(
                req.into_shared(),
                HttpResponse::detached().into_shared(),
                entry.batch_begin_ts,
                entry.num_chunks,
                entry.next_chunk_index,
                entry.is_complete,
                entry.prev_req_body.clone(),
            ));
            self.buffer.lock().unwrap().insert(request_id, record);

            if entry.is_complete {
                let shard = router::shard_for_collection(&collection, self.config.num_shards);
                self.queues[shard].lock().unwrap().push_back(request_id);
                touched_shards.push(shard);
            }
            restored += 1;
        }

        // Restore log arrival order per shard.
        touched_shards.sort_unstable();
        touched_shards.dedup();
        for shard in touched_shards {
            let mut queue = self.queues[shard].lock().unwrap();
            queue.make_contiguous().sort_unstable();
        }

        info!("Restored {restored} in-flight requests from snapshot");
        Ok(())
    }
}
