//! Batched request indexer for the sift write path.
//!
//! This crate sits between the consensus-replicated write log and the
//! collection-mutation handlers. The replication thread feeds it one
//! request chunk at a time in log order; the indexer durably buffers each
//! chunk in the request-log store, shards completed requests to
//! per-collection worker queues, replays the chunks through the registered
//! handlers, streams responses back to live clients, and serializes its
//! in-flight state into snapshots so buffered writes survive a restart.
//!
//! ## Key Components
//!
//! - [`BatchedIndexer`]: the indexer itself: `enqueue`, worker pool,
//!   garbage collection and snapshot participation
//! - [`IndexerConfig`]: shard count, GC cadence and polling knobs
//! - [`IndexerSnapshot`]: the serialized chunk buffer
//! - [`IndexingError`]: error types for the indexing path
//! - [`router`]: the stable collection-to-shard mapping
//!
//! ## Ordering model
//!
//! Every write targeting one collection hashes to the same shard, and each
//! shard is drained by a single worker in arrival order, so one
//! collection's writes apply in log order while distinct collections
//! proceed in parallel.

pub mod config;
pub mod error;
pub mod indexer;
pub mod record;
pub mod router;
pub mod snapshot;
mod worker;

pub use config::IndexerConfig;
pub use error::IndexingError;
pub use indexer::{BatchedIndexer, LogIndexHook};
pub use record::RequestRecord;
pub use snapshot::{IndexerSnapshot, RecordSnapshot};
