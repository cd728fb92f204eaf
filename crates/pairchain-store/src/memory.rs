//! In-memory backend for tests and ephemeral nodes.

use std::collections::{BTreeMap, HashMap};

use parking_lot::Mutex;

use crate::backend::{Batch, BatchOp, KeyValueBackend};
use crate::error::StorageError;

/// HashMap-backed [`KeyValueBackend`]. Batches are atomic because every
/// operation runs under one mutex.
#[derive(Default)]
pub struct MemoryBackend {
    map: Mutex<HashMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ordered snapshot of the full key space, lossily decoded as UTF-8.
    /// Index-convergence tests compare these.
    pub fn dump(&self) -> BTreeMap<String, String> {
        self.map
            .lock()
            .iter()
            .map(|(k, v)| {
                (
                    String::from_utf8_lossy(k).into_owned(),
                    String::from_utf8_lossy(v).into_owned(),
                )
            })
            .collect()
    }
}

impl KeyValueBackend for MemoryBackend {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.map.lock().get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StorageError> {
        self.map.lock().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<(), StorageError> {
        self.map.lock().remove(key);
        Ok(())
    }

    fn write_batch(&self, batch: Batch) -> Result<(), StorageError> {
        let mut map = self.map.lock();
        for op in batch.into_ops() {
            match op {
                BatchOp::Put(key, value) => {
                    map.insert(key, value);
                }
                BatchOp::Delete(key) => {
                    map.remove(&key);
                }
            }
        }
        Ok(())
    }
}
