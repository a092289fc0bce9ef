//! The indexer's view of the HTTP front-end.
//!
//! Workers and the enqueue path never touch sockets. They hand envelopes
//! back to the front-end's I/O threads through [`ServerMessage`]s, and
//! resolve route hashes through [`HttpFrontend::get_route`].

use crate::request::{SharedRequest, SharedResponse};
use crate::route::RoutePath;

/// Out-of-band message dispatched to the front-end's I/O threads.
#[derive(Debug, Clone)]
pub enum ServerMessage {
    /// Ask the front-end to read the next body chunk of a streaming
    /// request and feed it back through replication.
    RequestProceed {
        req: SharedRequest,
        res: SharedResponse,
    },

    /// Ask the front-end to write the response out on its I/O thread.
    StreamResponse {
        req: SharedRequest,
        res: SharedResponse,
    },
}

impl ServerMessage {
    /// Short name for logging and test assertions.
    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::RequestProceed { .. } => "request_proceed",
            ServerMessage::StreamResponse { .. } => "stream_response",
        }
    }
}

/// Seam to the external HTTP server.
///
/// Implementations must be callable from the replication thread and from
/// every indexing worker concurrently.
pub trait HttpFrontend: Send + Sync {
    /// Resolve a route hash to its registered route, if any.
    fn get_route(&self, route_hash: u64) -> Option<RoutePath>;

    /// Dispatch an out-of-band message to the front-end's I/O threads.
    fn send_message(&self, message: ServerMessage);
}
