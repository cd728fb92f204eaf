//! Top-level error type for node composition and boot.
use pairchain_core::error::CryptoError;
use pairchain_protocol::ProtocolError;
use pairchain_store::StorageError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NodeError {
    #[error(transparent)] Storage(#[from] StorageError),
    #[error(transparent)] Crypto(#[from] CryptoError),
    #[error(transparent)] Protocol(#[from] ProtocolError),
    #[error("configuration: {0}")] Config(#[from] config::ConfigError),
    #[error("io: {0}")] Io(#[from] std::io::Error),
    #[error("coordinator unreachable after {0} connect attempts")] Unreachable(u32),
}
