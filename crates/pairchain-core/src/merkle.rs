//! Merkle root over hex-encoded leaf digests.
//!
//! The pairing ledger commits to payload digests that already travel as
//! lower-hex strings, so the tree hashes the UTF-8 bytes of the
//! concatenated hex pair rather than raw digest bytes. Odd layers are
//! padded by duplicating the last element. The coordinator computes roots
//! the same way; changing this scheme breaks cross-verification.

use sha2::{Digest, Sha256};

use crate::constants::EMPTY_MERKLE_ROOT;

/// Compute the Merkle root from a slice of hex-encoded leaf digests.
///
/// Returns [`EMPTY_MERKLE_ROOT`] (`"0"`) for an empty slice. A single
/// leaf is the root itself, returned verbatim without rehashing.
pub fn merkle_root(leaves: &[String]) -> String {
    if leaves.is_empty() {
        return EMPTY_MERKLE_ROOT.to_string();
    }

    let mut current: Vec<String> = leaves.to_vec();
    while current.len() > 1 {
        current = next_layer(&current);
    }
    current.swap_remove(0)
}

/// Hash one layer into the next, duplicating the last element of an odd
/// layer so every node has a right sibling.
fn next_layer(layer: &[String]) -> Vec<String> {
    let mut next = Vec::with_capacity(layer.len().div_ceil(2));
    let mut i = 0;
    while i < layer.len() {
        let left = &layer[i];
        let right = if i + 1 < layer.len() { &layer[i + 1] } else { left };
        next.push(pair_hash(left, right));
        i += 2;
    }
    next
}

/// SHA-256 over the UTF-8 bytes of `left || right`, lower-hex output.
fn pair_hash(left: &str, right: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(left.as_bytes());
    hasher.update(right.as_bytes());
    hex::encode(hasher.finalize())
}
