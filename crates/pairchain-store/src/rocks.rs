//! RocksDB-backed persistent storage.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use rocksdb::{Options, WriteBatch, DB};

use crate::backend::{Batch, BatchOp, KeyValueBackend};
use crate::error::StorageError;

/// RocksDB [`KeyValueBackend`]. Batches map onto RocksDB's native
/// [`WriteBatch`], which commits atomically.
pub struct RocksBackend {
    db: DB,
    path: PathBuf,
}

impl RocksBackend {
    /// Open or create a database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);

        let db = DB::open(&opts, path.as_ref()).map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(Self {
            db,
            path: path.as_ref().to_path_buf(),
        })
    }
}

impl KeyValueBackend for RocksBackend {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        self.db
            .get(key)
            .map_err(|e| StorageError::Backend(e.to_string()))
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StorageError> {
        self.db
            .put(key, value)
            .map_err(|e| StorageError::Backend(e.to_string()))
    }

    fn delete(&self, key: &[u8]) -> Result<(), StorageError> {
        self.db
            .delete(key)
            .map_err(|e| StorageError::Backend(e.to_string()))
    }

    fn write_batch(&self, batch: Batch) -> Result<(), StorageError> {
        let mut wb = WriteBatch::default();
        for op in batch.into_ops() {
            match op {
                BatchOp::Put(key, value) => wb.put(key, value),
                BatchOp::Delete(key) => wb.delete(key),
            }
        }
        self.db
            .write(wb)
            .map_err(|e| StorageError::Backend(e.to_string()))
    }

    fn file_size_mb(&self) -> f64 {
        match dir_size(&self.path) {
            Ok(bytes) => (bytes as f64 / (1024.0 * 1024.0) * 100.0).round() / 100.0,
            Err(_) => -1.0,
        }
    }
}

/// Total size of all files under `path`, recursively.
fn dir_size(path: &Path) -> io::Result<u64> {
    let mut total = 0;
    for entry in fs::read_dir(path)? {
        let entry = entry?;
        let meta = entry.metadata()?;
        if meta.is_dir() {
            total += dir_size(&entry.path())?;
        } else {
            total += meta.len();
        }
    }
    Ok(total)
}
