//! # pairchain-store
//!
//! Persistence layer: the [`backend::KeyValueBackend`] abstraction with
//! RocksDB and in-memory implementations, the hash-linked
//! [`chain::ChainStore`], and the single-record [`registry::NodeRegistry`]
//! holding node identity.

pub mod backend;
pub mod chain;
pub mod error;
pub mod memory;
pub mod registry;
pub mod rocks;

pub use backend::{BackendHealth, Batch, BatchOp, KeyValueBackend};
pub use chain::ChainStore;
pub use error::StorageError;
pub use memory::MemoryBackend;
pub use registry::NodeRegistry;
pub use rocks::RocksBackend;
