//! Request envelope and response handle.
//!
//! A write request replicated through the log arrives as one or more
//! chunks, each carrying a copy of the envelope fields plus that chunk's
//! slice of the body. The envelope serializes to JSON: the per-chunk value
//! persisted in the request log is exactly this JSON, body included, while
//! the in-memory copy drops its body once the chunk is durable.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::error::EnvelopeError;

/// Request envelope co-owned by the replication thread and a worker.
pub type SharedRequest = Arc<Mutex<HttpRequest>>;

/// Response handle co-owned by the replication thread and a worker.
pub type SharedResponse = Arc<Mutex<HttpResponse>>;

/// HTTP-shaped descriptor for one replicated write request.
///
/// `start_ts` doubles as the request id: a timestamp-derived, caller-assigned
/// 64-bit value that is unique across restarts and preserves log arrival
/// order when compared.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpRequest {
    /// Request id (timestamp-derived, assigned by the replication caller)
    pub start_ts: u64,

    /// HTTP verb
    pub method: String,

    /// Request path as received by the front-end
    pub path: String,

    /// Hash of the matched route, resolvable via the front-end
    pub route_hash: u64,

    /// Parsed path/query parameters
    #[serde(default)]
    pub params: HashMap<String, String>,

    /// Request headers
    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// Body slice carried by this chunk; transient in memory
    #[serde(default)]
    pub body: String,

    /// Replicated-log index of the entry this chunk came from
    #[serde(default)]
    pub log_index: u64,

    /// True on the final chunk of the request
    #[serde(default)]
    pub last_chunk_aggregate: bool,

    /// True while the live connection still has body bytes to stream.
    /// Never persisted: a replayed or restored request has no connection.
    #[serde(skip)]
    pub more_body_pending: bool,
}

impl HttpRequest {
    /// Create an envelope for the given route with an empty body.
    pub fn new(start_ts: u64, method: &str, path: &str, route_hash: u64) -> Self {
        Self {
            start_ts,
            method: method.to_string(),
            path: path.to_string(),
            route_hash,
            params: HashMap::new(),
            headers: HashMap::new(),
            body: String::new(),
            log_index: 0,
            last_chunk_aggregate: false,
            more_body_pending: false,
        }
    }

    /// Look up a parsed parameter by name.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Serialize the envelope (body included) to JSON.
    pub fn to_json(&self) -> Result<String, EnvelopeError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserialize an envelope from JSON.
    pub fn from_json(json: &str) -> Result<Self, EnvelopeError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Rehydrate the envelope from a persisted chunk.
    ///
    /// All fields are taken from the chunk except the body, which is
    /// appended to whatever the caller seeded `body` with. Workers seed it
    /// with the carry-over tail of the previous chunk so application
    /// records that straddle a chunk boundary parse whole.
    pub fn absorb_chunk(&mut self, chunk_json: &str) -> Result<(), EnvelopeError> {
        let chunk = Self::from_json(chunk_json)?;
        self.start_ts = chunk.start_ts;
        self.method = chunk.method;
        self.path = chunk.path;
        self.route_hash = chunk.route_hash;
        self.params = chunk.params;
        self.headers = chunk.headers;
        self.log_index = chunk.log_index;
        self.last_chunk_aggregate = chunk.last_chunk_aggregate;
        self.body.push_str(&chunk.body);
        Ok(())
    }

    /// Wrap the envelope for shared ownership.
    pub fn into_shared(self) -> SharedRequest {
        Arc::new(Mutex::new(self))
    }
}

/// Handle used to stream response bytes back to the client.
///
/// A response with `is_alive == false` has no attached client socket:
/// requests replayed from the log or restored from a snapshot get a
/// detached handle and their output is dropped.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// HTTP status code
    pub status_code: u16,

    /// Value for the Content-Type header
    pub content_type: String,

    /// Accumulated response body
    pub body: String,

    /// Whether a client socket is still attached
    pub is_alive: bool,

    /// Whether this is the final write for the response
    pub is_final: bool,
}

impl HttpResponse {
    /// Response handle with an attached client.
    pub fn live() -> Self {
        Self {
            status_code: 200,
            content_type: "application/json".to_string(),
            body: String::new(),
            is_alive: true,
            is_final: true,
        }
    }

    /// Response handle for log replay or snapshot restore.
    pub fn detached() -> Self {
        Self {
            is_alive: false,
            ..Self::live()
        }
    }

    /// Mark the response as 404 Not Found.
    pub fn set_404(&mut self) {
        self.status_code = 404;
        self.body = "{\"message\": \"Not Found\"}".to_string();
    }

    /// Wrap the handle for shared ownership.
    pub fn into_shared(self) -> SharedResponse {
        Arc::new(Mutex::new(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_request() -> HttpRequest {
        let mut req = HttpRequest::new(1700000000123, "POST", "/collections/products/documents", 42);
        req.params
            .insert("collection".to_string(), "products".to_string());
        req.body = "{\"id\": \"1\"}\n".to_string();
        req.log_index = 7;
        req
    }

    #[test]
    fn test_envelope_json_roundtrip() {
        let req = sample_request();
        let json = req.to_json().unwrap();
        let decoded = HttpRequest::from_json(&json).unwrap();

        assert_eq!(decoded.start_ts, req.start_ts);
        assert_eq!(decoded.method, req.method);
        assert_eq!(decoded.path, req.path);
        assert_eq!(decoded.route_hash, req.route_hash);
        assert_eq!(decoded.params, req.params);
        assert_eq!(decoded.body, req.body);
        assert_eq!(decoded.log_index, req.log_index);
    }

    #[test]
    fn test_more_body_pending_is_not_persisted() {
        let mut req = sample_request();
        req.more_body_pending = true;
        let json = req.to_json().unwrap();
        let decoded = HttpRequest::from_json(&json).unwrap();
        assert!(!decoded.more_body_pending);
    }

    #[test]
    fn test_absorb_chunk_appends_body_to_carry_over() {
        let mut chunk = sample_request();
        chunk.body = "tail-of-record\"}".to_string();
        chunk.log_index = 9;
        let json = chunk.to_json().unwrap();

        let mut req = sample_request();
        req.body = "{\"partial\": \"".to_string();
        req.absorb_chunk(&json).unwrap();

        assert_eq!(req.body, "{\"partial\": \"tail-of-record\"}");
        assert_eq!(req.log_index, 9);
    }

    #[test]
    fn test_detached_response_is_not_alive() {
        let res = HttpResponse::detached();
        assert!(!res.is_alive);
        assert_eq!(res.status_code, 200);
    }

    #[test]
    fn test_set_404() {
        let mut res = HttpResponse::live();
        res.set_404();
        assert_eq!(res.status_code, 404);
        assert!(res.body.contains("Not Found"));
    }
}
