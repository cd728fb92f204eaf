//! Error type for the storage layer.
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("backend: {0}")] Backend(String),
    #[error("corrupt record at {key}: {reason}")] Corrupt { key: String, reason: String },
    #[error("encode: {0}")] Encode(String),
}
