//! Key-value backend abstraction.
//!
//! The chain store and status registry are written against this trait so
//! tests run on [`crate::memory::MemoryBackend`] while production uses
//! [`crate::rocks::RocksBackend`]. Multi-key mutations go through
//! [`Batch`], which implementations must apply all-or-nothing: a reader
//! must never observe a block without its indices.

use crate::error::StorageError;

/// Probe key exercised by the read half of [`KeyValueBackend::health`].
pub const HEALTH_READ_PROBE: &[u8] = b"health_test_key";

/// Probe key written and read back by the write half of the health check.
pub const HEALTH_WRITE_PROBE: &[u8] = b"health_write_test";

/// One operation inside an atomic batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    Put(Vec<u8>, Vec<u8>),
    Delete(Vec<u8>),
}

/// An ordered group of writes applied as one atomic unit.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Batch {
    ops: Vec<BatchOp>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) {
        self.ops.push(BatchOp::Put(key.into(), value.into()));
    }

    pub fn delete(&mut self, key: impl Into<Vec<u8>>) {
        self.ops.push(BatchOp::Delete(key.into()));
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn into_ops(self) -> Vec<BatchOp> {
        self.ops
    }
}

/// Point-in-time backend health report.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendHealth {
    pub alive: bool,
    pub can_read: bool,
    pub can_write: bool,
    /// On-disk footprint in MB, `-1.0` when unknown.
    pub file_size_mb: f64,
    pub message: String,
}

/// Durable string-keyed storage.
///
/// `put`/`delete` must be durable by the time they return. `write_batch`
/// applies every operation in order as a single atomic unit.
#[cfg_attr(test, mockall::automock)]
pub trait KeyValueBackend: Send + Sync + 'static {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError>;
    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StorageError>;
    fn delete(&self, key: &[u8]) -> Result<(), StorageError>;
    fn write_batch(&self, batch: Batch) -> Result<(), StorageError>;

    /// On-disk footprint in MB, `-1.0` when the backend cannot tell.
    fn file_size_mb(&self) -> f64 {
        -1.0
    }

    /// Probe the backend: read a probe key, then put-and-read-back a
    /// second one. `message` is `"OK"` only when both probes pass.
    fn health(&self) -> BackendHealth {
        let can_read = self.get(HEALTH_READ_PROBE).is_ok();
        let can_write = self
            .put(HEALTH_WRITE_PROBE, b"probe")
            .and_then(|_| self.get(HEALTH_WRITE_PROBE))
            .map(|v| v.as_deref() == Some(b"probe".as_slice()))
            .unwrap_or(false);
        let message = if can_read && can_write {
            "OK".to_string()
        } else {
            "storage backend may have an issue".to_string()
        };
        BackendHealth {
            alive: true,
            can_read,
            can_write,
            file_size_mb: self.file_size_mb(),
            message,
        }
    }
}
