//! Shared helpers for integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use sift_indexing::{BatchedIndexer, IndexerConfig};
use sift_storage::Store;
use sift_types::{
    HttpFrontend, HttpRequest, HttpResponse, RouteHandler, RoutePath, ServerMessage,
    SharedRequest, SharedResponse,
};
use tempfile::TempDir;

/// Path of the standard document-write route used across tests.
pub const DOCUMENTS_ROUTE: &str = "collections/:collection/documents";

/// Front-end double: a route table plus a log of dispatched message kinds.
pub struct MockFrontend {
    routes: Mutex<HashMap<u64, RoutePath>>,
    messages: Mutex<Vec<&'static str>>,
}

impl MockFrontend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            routes: Mutex::new(HashMap::new()),
            messages: Mutex::new(Vec::new()),
        })
    }

    /// Register a route and return its hash.
    pub fn register(&self, route: RoutePath) -> u64 {
        let hash = route.route_hash();
        self.routes.lock().unwrap().insert(hash, route);
        hash
    }

    /// Kinds of every message dispatched so far, in order.
    pub fn message_kinds(&self) -> Vec<&'static str> {
        self.messages.lock().unwrap().clone()
    }
}

impl HttpFrontend for MockFrontend {
    fn get_route(&self, route_hash: u64) -> Option<RoutePath> {
        self.routes.lock().unwrap().get(&route_hash).cloned()
    }

    fn send_message(&self, message: ServerMessage) {
        self.messages.lock().unwrap().push(message.kind());
    }
}

/// One observed handler invocation.
#[derive(Debug, Clone)]
pub struct Call {
    pub collection: String,
    pub body: String,
    pub started: Instant,
    pub finished: Instant,
}

/// Shared log of handler invocations.
#[derive(Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<Call>>>,
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Bodies recorded for one collection, in invocation order.
    pub fn bodies_for(&self, collection: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|call| call.collection == collection)
            .map(|call| call.body)
            .collect()
    }
}

/// Handler that records the body it saw, optionally sleeping to simulate
/// indexing latency, and consumes the body entirely.
pub fn recording_handler(log: CallLog, latency: Duration) -> RouteHandler {
    Arc::new(move |req: SharedRequest, _res: SharedResponse| {
        let started = Instant::now();
        let (collection, body) = {
            let mut req = req.lock().unwrap();
            let collection = req.param("collection").unwrap_or_default().to_string();
            (collection, std::mem::take(&mut req.body))
        };
        if !latency.is_zero() {
            thread::sleep(latency);
        }
        log.calls.lock().unwrap().push(Call {
            collection,
            body,
            started,
            finished: Instant::now(),
        });
    })
}

/// Handler that consumes complete newline-terminated records and leaves
/// the unterminated tail in the body for the next chunk.
pub fn line_handler(log: CallLog) -> RouteHandler {
    Arc::new(move |req: SharedRequest, _res: SharedResponse| {
        let mut req = req.lock().unwrap();
        let collection = req.param("collection").unwrap_or_default().to_string();
        let body = std::mem::take(&mut req.body);
        let mut rest = body.as_str();
        while let Some(pos) = rest.find('\n') {
            log.calls.lock().unwrap().push(Call {
                collection: collection.clone(),
                body: rest[..pos].to_string(),
                started: Instant::now(),
                finished: Instant::now(),
            });
            rest = &rest[pos + 1..];
        }
        req.body = rest.to_string();
    })
}

/// Open a scratch request-log store.
pub fn open_store() -> (TempDir, Arc<Store>) {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(Store::open(dir.path()).unwrap());
    (dir, store)
}

/// Build an indexer over the given front-end and store.
pub fn new_indexer(
    server: Arc<MockFrontend>,
    store: Arc<Store>,
    num_shards: usize,
) -> Arc<BatchedIndexer> {
    let config = IndexerConfig {
        num_shards,
        ..IndexerConfig::default()
    };
    Arc::new(BatchedIndexer::new(server, store, config).unwrap())
}

/// Run the indexer's worker pool on a background thread.
pub fn start(indexer: &Arc<BatchedIndexer>) -> thread::JoinHandle<()> {
    let indexer = indexer.clone();
    thread::spawn(move || indexer.run().unwrap())
}

/// Stop the indexer and join its coordinator thread.
pub fn stop(indexer: &Arc<BatchedIndexer>, handle: thread::JoinHandle<()>) {
    indexer.stop();
    handle.join().unwrap();
}

/// Poll `cond` until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, cond: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    cond()
}

/// A write-request envelope targeting `collection`, paired with a live
/// response handle.
pub fn write_request(
    id: u64,
    route_hash: u64,
    collection: &str,
    body: &str,
    last: bool,
) -> (SharedRequest, SharedResponse) {
    let mut req = HttpRequest::new(
        id,
        "POST",
        &format!("/collections/{collection}/documents"),
        route_hash,
    );
    req.params
        .insert("collection".to_string(), collection.to_string());
    req.body = body.to_string();
    req.last_chunk_aggregate = last;
    (req.into_shared(), HttpResponse::live().into_shared())
}

/// Current wall clock in epoch seconds.
pub fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
}
