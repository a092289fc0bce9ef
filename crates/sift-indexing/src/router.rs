//! Collection-to-shard routing.
//!
//! All writes targeting one collection must serialize on one worker, so
//! the router maps a collection name to a shard with a stable hash. The
//! mapping only has to stay stable for the life of a deployment: snapshot
//! restore recomputes shards with the same function.

use serde_json::Value;
use sift_types::{HttpFrontend, HttpRequest};
use xxhash_rust::xxh3::xxh3_64;

/// Map a collection name to one of `num_shards` worker shards.
pub fn shard_for_collection(collection: &str, num_shards: usize) -> usize {
    (xxh3_64(collection.as_bytes()) % num_shards as u64) as usize
}

/// Resolve the collection a request targets.
///
/// Normally this is the parsed `collection` path parameter. The
/// collection-creation route has no such parameter; its name lives in the
/// JSON body, and pulling it out sends the creation to the same queue as
/// every later write to that collection. A body that is not a JSON object
/// or lacks a string `name` yields the empty name, which is fine: the
/// creation handler validates for real, and its ordering is already fixed
/// by the log.
pub fn collection_name(server: &dyn HttpFrontend, req: &HttpRequest) -> String {
    if let Some(name) = req.param("collection") {
        if !name.is_empty() {
            return name.to_string();
        }
    }

    if let Some(route) = server.get_route(req.route_hash) {
        if route.is_collection_create() {
            if let Ok(Value::Object(body)) = serde_json::from_str(&req.body) {
                if let Some(Value::String(name)) = body.get("name") {
                    return name.clone();
                }
            }
        }
    }

    String::new()
}
