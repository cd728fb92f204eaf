//! Canonical block headers.
//!
//! A block's hash commits to a pipe-delimited header line, not to the
//! serialized block. The exact bytes are kept on the block as `headerRaw`
//! so any peer can re-verify the hash without rebuilding the line, and a
//! repair can re-hash the superseded block's line verbatim. Field order
//! differs per event kind and is frozen: existing signatures break if it
//! shifts.

use sha2::{Digest, Sha256};

/// Header line for a product event.
///
/// Layout: `height|previousHash|productId|ownerId|version|type|contentHash`.
pub fn product_header(
    height: u64,
    previous_hash: &str,
    product_id: &str,
    owner_id: &str,
    version: &str,
    block_type: &str,
    content_hash: &str,
) -> String {
    format!("{height}|{previous_hash}|{product_id}|{owner_id}|{version}|{block_type}|{content_hash}")
}

/// Header line for a user-pairing event.
///
/// Same layout as [`product_header`] with the entity slot left empty:
/// user events carry no `currentId`.
pub fn user_header(
    height: u64,
    previous_hash: &str,
    user_id: &str,
    version: &str,
    user_type: &str,
    content_hash: &str,
) -> String {
    format!("{height}|{previous_hash}||{user_id}|{version}|{user_type}|{content_hash}")
}

/// SHA-256 over the raw header bytes, lower-hex.
pub fn compute_block_hash(header_raw: &[u8]) -> String {
    hex::encode(Sha256::digest(header_raw))
}
