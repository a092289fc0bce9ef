//! Route registration types.
//!
//! The indexer never parses paths itself: the front-end resolves each
//! request to a route hash, and the indexer looks the route back up when a
//! worker replays the request. Handlers are plain function values so the
//! collection-mutation layer stays behind a narrow seam.

use std::fmt;
use std::sync::Arc;

use xxhash_rust::xxh3::xxh3_64;

use crate::request::{SharedRequest, SharedResponse};

/// Collection-mutation handler invoked once per replayed chunk.
pub type RouteHandler = Arc<dyn Fn(SharedRequest, SharedResponse) + Send + Sync>;

/// Compute the stable hash for a route, e.g. `route_hash("POST", "collections")`.
pub fn route_hash(method: &str, path: &str) -> u64 {
    let canonical = format!("{} /{}", method, path.trim_matches('/'));
    xxh3_64(canonical.as_bytes())
}

/// A registered route: verb, path and the handler that mutates collections.
#[derive(Clone)]
pub struct RoutePath {
    /// HTTP verb
    pub method: String,

    /// Path split on `/`, with `:name` segments marking parameters
    pub path_parts: Vec<String>,

    /// Handler invoked per chunk
    pub handler: RouteHandler,

    /// Whether the handler streams its own response. Synchronous handlers
    /// rely on the worker to dispatch the response write.
    pub async_res: bool,
}

impl RoutePath {
    /// Register a route for a slash-separated path like
    /// `collections/:collection/documents`.
    pub fn new(method: &str, path: &str, handler: RouteHandler, async_res: bool) -> Self {
        let path_parts = path
            .trim_matches('/')
            .split('/')
            .filter(|part| !part.is_empty())
            .map(str::to_string)
            .collect();
        Self {
            method: method.to_string(),
            path_parts,
            handler,
            async_res,
        }
    }

    /// The stable hash the front-end attaches to matching requests.
    pub fn route_hash(&self) -> u64 {
        route_hash(&self.method, &self.path_parts.join("/"))
    }

    /// Whether this is the collection-creation route (`POST /collections`).
    ///
    /// Creation requests carry the collection name in their body rather
    /// than in a path parameter, and the shard router treats them
    /// specially so creation and subsequent writes serialize on one worker.
    pub fn is_collection_create(&self) -> bool {
        self.method == "POST" && self.path_parts.len() == 1 && self.path_parts[0] == "collections"
    }
}

impl fmt::Debug for RoutePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoutePath")
            .field("method", &self.method)
            .field("path_parts", &self.path_parts)
            .field("async_res", &self.async_res)
            .finish()
    }
}
