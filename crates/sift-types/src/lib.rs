//! Shared types for the sift write path.
//!
//! This crate holds the plain data types that cross the seams between the
//! replication layer, the batched indexer, and the HTTP front-end:
//!
//! - [`HttpRequest`] / [`HttpResponse`]: the request envelope and response
//!   handle, co-owned by the replication thread and an indexing worker
//! - [`RoutePath`] / [`RouteHandler`]: a registered route and its
//!   collection-mutation handler
//! - [`HttpFrontend`]: the indexer's view of the HTTP server (route lookup
//!   and out-of-band message dispatch)
//! - [`ServerMessage`]: messages sent back to the front-end's I/O threads

pub mod error;
pub mod message;
pub mod request;
pub mod route;

pub use error::EnvelopeError;
pub use message::{HttpFrontend, ServerMessage};
pub use request::{HttpRequest, HttpResponse, SharedRequest, SharedResponse};
pub use route::{route_hash, RouteHandler, RoutePath};
