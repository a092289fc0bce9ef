//! RocksDB wrapper for the buffered request log.
//!
//! Provides:
//! - Database open with request-log friendly options
//! - Point put/get for chunk payloads
//! - Seek-ordered forward scans for chunk replay
//! - Range deletes for dropping a whole request in one write

use std::path::Path;

use rocksdb::{Direction, IteratorMode, Options, WriteBatch, DB};
use tracing::info;

use crate::error::StorageError;

/// Durable ordered key/value store holding buffered request chunks.
///
/// Keys are lex-ordered byte strings; every operation is safe to call from
/// the replication thread and the indexing workers concurrently.
pub struct Store {
    db: DB,
}

impl Store {
    /// Open the store at the given path, creating it if necessary.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        info!("Opening request-log store at {:?}", path);

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        // Universal compaction: the request log is insert-then-range-delete,
        // never updated in place.
        db_opts.set_compaction_style(rocksdb::DBCompactionStyle::Universal);
        db_opts.set_max_background_jobs(4);

        let db = DB::open(&db_opts, path)?;
        Ok(Self { db })
    }

    /// Persist one key/value pair.
    pub fn insert(&self, key: &[u8], value: &[u8]) -> Result<(), StorageError> {
        self.db.put(key, value)?;
        Ok(())
    }

    /// Point lookup.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.db.get(key)?)
    }

    /// Forward scan starting at `start` (inclusive), in key order.
    ///
    /// The scan runs to the end of the keyspace; callers bound it by
    /// checking their prefix, which lets replay seek to an arbitrary chunk
    /// while still using the request prefix as the stop condition.
    pub fn scan_from<'a>(
        &'a self,
        start: &[u8],
    ) -> impl Iterator<Item = Result<(Box<[u8]>, Box<[u8]>), StorageError>> + 'a {
        self.db
            .iterator(IteratorMode::From(start, Direction::Forward))
            .map(|item| item.map_err(StorageError::from))
    }

    /// Forward scan over exactly the keys starting with `prefix`.
    pub fn scan_prefix<'a>(
        &'a self,
        prefix: &'a [u8],
    ) -> impl Iterator<Item = Result<(Box<[u8]>, Box<[u8]>), StorageError>> + 'a {
        self.scan_from(prefix).take_while(move |item| match item {
            Ok((key, _)) => key.starts_with(prefix),
            Err(_) => true,
        })
    }

    /// Delete every key in `[begin, end)` atomically.
    pub fn delete_range(&self, begin: &[u8], end: &[u8]) -> Result<(), StorageError> {
        let mut batch = WriteBatch::default();
        batch.delete_range(begin, end);
        self.db.write(batch)?;
        Ok(())
    }

    /// Flush memtables to disk; used before a snapshot is cut.
    pub fn flush(&self) -> Result<(), StorageError> {
        self.db.flush()?;
        Ok(())
    }
}
