//! The batched indexer: chunk buffering, sharded queues, worker pool and
//! garbage collection.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::thread;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{error, info, warn};

use sift_storage::{ChunkKey, Store};
use sift_types::{HttpFrontend, ServerMessage, SharedRequest, SharedResponse};

use crate::config::IndexerConfig;
use crate::error::IndexingError;
use crate::record::RequestRecord;
use crate::router;

/// Sleep between coordinator ticks; GC runs when enough ticks have passed.
const COORDINATOR_TICK_MS: u64 = 1000;

/// Injected setter reporting the log index of the chunk a worker is about
/// to apply. The value is a forensic marker: after a crash mid-apply, the
/// external recovery routine reads the last reported index.
pub type LogIndexHook = Arc<dyn Fn(u64) + Send + Sync>;

/// Buffers replicated write requests and replays them through the
/// registered collection handlers.
///
/// One instance serves the whole process. The replication thread calls
/// [`enqueue`](BatchedIndexer::enqueue) with one chunk at a time in log
/// order; [`run`](BatchedIndexer::run) drives the worker pool and the GC
/// coordinator until [`stop`](BatchedIndexer::stop).
pub struct BatchedIndexer {
    pub(crate) server: Arc<dyn HttpFrontend>,
    pub(crate) store: Arc<Store>,
    pub(crate) config: IndexerConfig,

    /// Chunk buffer: request id -> assembly record
    pub(crate) buffer: Mutex<HashMap<u64, Arc<RequestRecord>>>,

    /// Per-shard FIFO of completed request ids
    pub(crate) queues: Vec<Mutex<VecDeque<u64>>>,

    /// Chunks accepted for completed requests and not yet applied.
    /// Decremented only after a handler returns, so it briefly over-reports.
    queued_writes: AtomicI64,

    quit: AtomicBool,

    /// Shared by workers per chunk, exclusive for the snapshot writer.
    pause_latch: RwLock<()>,

    pub(crate) log_index_hook: Option<LogIndexHook>,
}

impl BatchedIndexer {
    /// Create an indexer over the given front-end seam and request-log store.
    pub fn new(
        server: Arc<dyn HttpFrontend>,
        store: Arc<Store>,
        config: IndexerConfig,
    ) -> Result<Self, IndexingError> {
        config.validate()?;
        let queues = (0..config.num_shards)
            .map(|_| Mutex::new(VecDeque::new()))
            .collect();
        Ok(Self {
            server,
            store,
            config,
            buffer: Mutex::new(HashMap::new()),
            queues,
            queued_writes: AtomicI64::new(0),
            quit: AtomicBool::new(false),
            pause_latch: RwLock::new(()),
            log_index_hook: None,
        })
    }

    /// Attach the forensic log-index setter.
    pub fn with_log_index_hook(mut self, hook: LogIndexHook) -> Self {
        self.log_index_hook = Some(hook);
        self
    }

    /// Accept one request chunk from the replication thread.
    ///
    /// The chunk is durably persisted before this returns; on the final
    /// chunk the request is routed to its collection's shard queue. Must
    /// only be called from the single replication thread.
    ///
    /// Legacy serialized requests (`start_ts == 0`, a format predating
    /// chunking) carry no request identity, so they are applied serially:
    /// the call blocks on the final chunk until the whole buffer drains,
    /// and a legacy request enqueued while a completed one still awaits
    /// draining is rejected with
    /// [`IndexingError::LegacyRequestInFlight`]. Further chunks of one
    /// still-accumulating legacy request flow through the normal
    /// accumulation path. Workers must be running or the drain wait never
    /// finishes.
    pub fn enqueue(&self, req: SharedRequest, res: SharedResponse) -> Result<(), IndexingError> {
        let now = Utc::now().timestamp().max(0) as u64;

        let (request_id, last_chunk, read_more_input, chunk_payload, collection) = {
            let mut req_guard = req.lock().unwrap();
            let request_id = req_guard.start_ts;
            let last_chunk = req_guard.last_chunk_aggregate;
            let read_more_input = req_guard.more_body_pending;
            let chunk_payload = req_guard.to_json()?;
            // Resolve the target collection while the body is still here;
            // creation requests carry their collection name in the body.
            let collection = if last_chunk {
                router::collection_name(self.server.as_ref(), &req_guard)
            } else {
                String::new()
            };
            // The chunk JSON now owns the bytes; release the envelope's copy.
            req_guard.body.clear();
            (request_id, last_chunk, read_more_input, chunk_payload, collection)
        };

        let is_legacy = request_id == 0;

        let chunk_seq = {
            let mut buffer = self.buffer.lock().unwrap();
            match buffer.entry(request_id) {
                Entry::Vacant(slot) => {
                    slot.insert(Arc::new(RequestRecord::new(req.clone(), res.clone(), now)));
                    0
                }
                Entry::Occupied(slot) => {
                    if is_legacy && slot.get().is_complete.load(Ordering::SeqCst) {
                        // The buffered legacy record is done accumulating,
                        // so this chunk starts a new legacy request; two
                        // would collide on id 0.
                        return Err(IndexingError::LegacyRequestInFlight);
                    }
                    slot.get().num_chunks.fetch_add(1, Ordering::SeqCst)
                }
            }
        };

        // The durable write happens outside the buffer mutex.
        let chunk_key = ChunkKey::new(request_id, chunk_seq).to_bytes();
        self.store.insert(&chunk_key, chunk_payload.as_bytes())?;

        if last_chunk {
            self.queued_writes
                .fetch_add(i64::from(chunk_seq) + 1, Ordering::SeqCst);

            let shard = router::shard_for_collection(&collection, self.config.num_shards);
            {
                // Lock order: shard mutex before buffer mutex, always.
                let mut queue = self.queues[shard].lock().unwrap();
                queue.push_back(request_id);

                let buffer = self.buffer.lock().unwrap();
                if let Some(record) = buffer.get(&request_id) {
                    record.is_complete.store(true, Ordering::SeqCst);
                }
            }

            if is_legacy {
                info!("Legacy serialized request queued; draining buffer before the next write");
                loop {
                    {
                        if self.buffer.lock().unwrap().is_empty() {
                            break;
                        }
                    }
                    thread::sleep(Duration::from_millis(self.config.poll_interval_ms));
                }
            }
        }

        if read_more_input {
            // Tell the front-end to read the next body chunk.
            self.server
                .send_message(ServerMessage::RequestProceed { req, res });
        }

        Ok(())
    }

    /// Spawn the worker pool and run the GC coordinator until
    /// [`stop`](BatchedIndexer::stop).
    ///
    /// Blocks the calling thread; workers are joined before this returns.
    pub fn run(self: Arc<Self>) -> Result<(), IndexingError> {
        info!(
            "Starting batched indexer with {} worker threads",
            self.config.num_shards
        );

        let mut workers = Vec::with_capacity(self.config.num_shards);
        for shard in 0..self.config.num_shards {
            let indexer = Arc::clone(&self);
            let handle = thread::Builder::new()
                .name(format!("sift-indexer-{shard}"))
                .spawn(move || indexer.worker_loop(shard))?;
            workers.push(handle);
        }

        let mut last_gc_run = Instant::now();
        while !self.quit.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(COORDINATOR_TICK_MS));

            if last_gc_run.elapsed().as_secs() > self.config.gc_interval_secs {
                let now = Utc::now().timestamp().max(0) as u64;
                if let Err(err) = self.prune_stale(now) {
                    // Failing to reclaim the store is a storage fault like
                    // any other: stop rather than run on unknown state.
                    error!("Request-log GC failed: {err}");
                    self.stop();
                }
                last_gc_run = Instant::now();
            }
        }

        info!("Batched indexer shutting down, joining worker threads");
        for handle in workers {
            if handle.join().is_err() {
                error!("Indexer worker thread panicked during shutdown");
            }
        }
        Ok(())
    }

    /// Signal every loop to wind down.
    pub fn stop(&self) {
        self.quit.store(true, Ordering::SeqCst);
    }

    pub(crate) fn should_quit(&self) -> bool {
        self.quit.load(Ordering::SeqCst)
    }

    /// Chunks accepted for completed requests and not yet applied.
    pub fn get_queued_writes(&self) -> i64 {
        self.queued_writes.load(Ordering::SeqCst)
    }

    pub(crate) fn add_queued_writes(&self, delta: i64) {
        self.queued_writes.fetch_add(delta, Ordering::SeqCst);
    }

    pub(crate) fn set_queued_writes(&self, value: i64) {
        self.queued_writes.store(value, Ordering::SeqCst);
    }

    /// Number of requests currently buffered (complete or partial).
    pub fn in_flight_requests(&self) -> usize {
        self.buffer.lock().unwrap().len()
    }

    /// The pause latch: workers hold it shared around each handler call;
    /// the snapshot writer holds it exclusive while cutting a snapshot.
    pub fn pause_latch(&self) -> &RwLock<()> {
        &self.pause_latch
    }

    /// Reclaim requests whose first chunk is older than the prune
    /// threshold. Takes the current epoch seconds so tests can drive the
    /// clock; returns how many records were dropped.
    ///
    /// A complete-but-undrained request can be pruned too if its worker is
    /// catastrophically lagging; that case is logged loudly.
    pub fn prune_stale(&self, now_epoch_secs: u64) -> Result<usize, IndexingError> {
        let mut buffer = self.buffer.lock().unwrap();
        info!(
            "Running GC for abandoned requests, buffer size: {}",
            buffer.len()
        );

        let expired: Vec<u64> = buffer
            .iter()
            .filter(|(_, record)| {
                now_epoch_secs.saturating_sub(record.batch_begin_ts) > self.config.gc_prune_max_secs
            })
            .map(|(id, _)| *id)
            .collect();

        for request_id in &expired {
            if let Some(record) = buffer.get(request_id) {
                if record.is_complete.load(Ordering::SeqCst) {
                    warn!("Pruning completed request {request_id} that no worker drained in time");
                } else {
                    info!("Deleting partial upload for request {request_id}");
                }
            }
            let (begin, end) = ChunkKey::request_range(*request_id);
            self.store.delete_range(&begin, &end)?;
            buffer.remove(request_id);
        }

        Ok(expired.len())
    }
}
