//! Durable request-log storage for sift.
//!
//! Provides:
//! - [`Store`]: a thin RocksDB wrapper with point put, seek-ordered scans
//!   and range deletes over lex-ordered byte keys
//! - [`ChunkKey`]: the fixed-layout key under which each buffered request
//!   chunk is persisted
//! - [`StorageError`]: storage-layer error type

pub mod db;
pub mod error;
pub mod keys;

pub use db::Store;
pub use error::StorageError;
pub use keys::{ChunkKey, REQ_LOG_PREFIX};
