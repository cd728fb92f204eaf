//! Error types for the Pairchain validator.
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("missing field: {0}")] MissingField(&'static str),
    #[error("empty field: {0}")] EmptyField(&'static str),
    #[error("unsupported block type: {0}")] UnsupportedBlockType(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid key material: {0}")] InvalidKey(String),
    #[error("key generation failed: {0}")] KeyGeneration(String),
    #[error("key encoding failed: {0}")] KeyEncoding(String),
    #[error("invalid signature encoding")] InvalidSignature,
    #[error("signing failed: {0}")] Signing(String),
}

/// Violations of the hash-linked chain found while auditing or ingesting
/// blocks. Each variant maps to a wire reason code understood by the
/// coordinator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IntegrityError {
    #[error("height gap: expected {expected}, got {got}")] HeightGap { expected: u64, got: u64 },
    #[error("previous hash mismatch at height {height}")] PrevHashMismatch { height: u64 },
    #[error("hash mismatch at height {height}")] HashMismatch { height: u64 },
}

impl IntegrityError {
    /// Reason code carried in fork-maintenance reports.
    pub fn reason(&self) -> &'static str {
        match self {
            IntegrityError::HeightGap { .. } => "HEIGHT_GAP",
            IntegrityError::PrevHashMismatch { .. } => "PREV_HASH_MISMATCH",
            IntegrityError::HashMismatch { .. } => "HASH_MISMATCH",
        }
    }

    /// Height reported to the coordinator. For a gap this is the height the
    /// walk expected, not the one it found.
    pub fn at_height(&self) -> u64 {
        match self {
            IntegrityError::HeightGap { expected, .. } => *expected,
            IntegrityError::PrevHashMismatch { height } => *height,
            IntegrityError::HashMismatch { height } => *height,
        }
    }

    /// The out-of-place height, present only for gaps.
    pub fn got_height(&self) -> Option<u64> {
        match self {
            IntegrityError::HeightGap { got, .. } => Some(*got),
            _ => None,
        }
    }
}
