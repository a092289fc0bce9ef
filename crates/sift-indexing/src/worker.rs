//! Per-shard drain loop: replaying buffered chunks through handlers.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{debug, error, warn};

use sift_storage::ChunkKey;
use sift_types::{RoutePath, ServerMessage};

use crate::error::IndexingError;
use crate::indexer::BatchedIndexer;
use crate::record::RequestRecord;

/// What replaying one chunk did to the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ChunkOutcome {
    /// Handler consumed the chunk; replay continues.
    Applied,
    /// No route matched; the response is a 404 and replay stops here.
    UnknownRoute,
}

impl BatchedIndexer {
    /// Drain loop for one shard. Pops completed request ids and replays
    /// them one at a time; polls with a short sleep when idle.
    pub(crate) fn worker_loop(&self, shard: usize) {
        debug!("Indexer worker {shard} started");
        while !self.should_quit() {
            let next = { self.queues[shard].lock().unwrap().pop_front() };

            if let Some(request_id) = next {
                if let Err(err) = self.drain_request(request_id) {
                    // Replay state is unknowable after a storage fault;
                    // stop the pool instead of silently dropping writes.
                    error!("Worker {shard} failed draining request {request_id}: {err}");
                    self.stop();
                }
            }

            thread::sleep(Duration::from_millis(self.config.poll_interval_ms));
        }
        debug!("Indexer worker {shard} stopped");
    }

    /// Replay every remaining chunk of one completed request, then drop
    /// its chunks from the store and its record from the buffer.
    pub(crate) fn drain_request(&self, request_id: u64) -> Result<(), IndexingError> {
        let record = { self.buffer.lock().unwrap().get(&request_id).cloned() };
        let Some(record) = record else {
            // GC can reclaim a lagging completed request before its worker
            // reaches it.
            warn!("Request {request_id} no longer buffered, skipping replay");
            return Ok(());
        };

        // A record restored after its final chunk was already applied has
        // nothing left to replay; skip straight to teardown.
        if !record.is_drained() {
            let route_hash = { record.req.lock().unwrap().route_hash };
            let is_live = { record.res.lock().unwrap().is_alive };
            let route = self.server.get_route(route_hash);

            // Resume where the snapshot (or a previous pass) left off; the
            // request prefix bounds the scan.
            let prefix = ChunkKey::request_prefix(request_id);
            let start = ChunkKey::new(request_id, record.next_chunk_index.load(Ordering::SeqCst))
                .to_bytes();

            for item in self.store.scan_from(&start) {
                let (key, value) = item?;
                if !key.starts_with(&prefix) {
                    break;
                }

                let outcome = self.replay_chunk(&record, route.as_ref(), is_live, &value)?;
                if outcome == ChunkOutcome::UnknownRoute {
                    break;
                }
                if self.should_quit() {
                    break;
                }
            }
        }

        debug!("Erasing request {request_id} from log and buffer");
        let (begin, end) = ChunkKey::request_range(request_id);
        self.store.delete_range(&begin, &end)?;
        self.buffer.lock().unwrap().remove(&request_id);
        Ok(())
    }

    /// Replay a single persisted chunk through the route handler.
    ///
    /// Runs entirely under a shared hold of the pause latch so a snapshot
    /// observes the request at a chunk boundary, never mid-handler.
    pub(crate) fn replay_chunk(
        &self,
        record: &Arc<RequestRecord>,
        route: Option<&RoutePath>,
        is_live: bool,
        chunk_payload: &[u8],
    ) -> Result<ChunkOutcome, IndexingError> {
        let _pause = self.pause_latch().read().unwrap();

        {
            let mut req = record.req.lock().unwrap();
            // Seed the body with the carry-over tail so records straddling
            // a chunk boundary parse whole.
            req.body = record.prev_req_body.lock().unwrap().clone();
            let payload = std::str::from_utf8(chunk_payload)
                .map_err(|err| IndexingError::Serialization(err.to_string()))?;
            req.absorb_chunk(payload)?;

            if let Some(hook) = &self.log_index_hook {
                hook(req.log_index);
            }
        }

        let Some(route) = route else {
            record.res.lock().unwrap().set_404();
            if is_live {
                self.server.send_message(ServerMessage::StreamResponse {
                    req: record.req.clone(),
                    res: record.res.clone(),
                });
            }
            return Ok(ChunkOutcome::UnknownRoute);
        };

        (route.handler.as_ref())(record.req.clone(), record.res.clone());

        // Whatever the handler left unparsed carries into the next chunk.
        let residual = { record.req.lock().unwrap().body.clone() };
        *record.prev_req_body.lock().unwrap() = residual;

        if is_live && !route.async_res {
            // Synchronous handlers rely on the front-end's I/O thread to
            // write the response; async ones stream it themselves.
            self.server.send_message(ServerMessage::StreamResponse {
                req: record.req.clone(),
                res: record.res.clone(),
            });
        }

        self.add_queued_writes(-1);
        record.next_chunk_index.fetch_add(1, Ordering::SeqCst);

        Ok(ChunkOutcome::Applied)
    }
}
