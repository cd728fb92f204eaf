//! Ledger types shared across the node.
//!
//! Field names and their JSON casing mirror the coordinator's wire format
//! exactly (including `Owner_id` and friends); serde renames keep the Rust
//! side idiomatic. Blocks serialize in declaration order, which is also
//! the byte layout the validator signature covers.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use crate::header::compute_block_hash;

/// Raw canonical header bytes of a block.
///
/// Serializes as a base64 string. Deserialization also accepts the
/// byte-array object form (`{"type":"Buffer","data":[...]}`) that
/// coordinator tooling emits for binary columns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderRaw(pub Vec<u8>);

impl HeaderRaw {
    /// Wrap an already-built header line.
    pub fn from_header(line: String) -> Self {
        Self(line.into_bytes())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for HeaderRaw {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64.encode(&self.0))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum HeaderRawWire {
    Text(String),
    // The Buffer form carries a "type":"Buffer" key which we ignore.
    Buffer { data: Vec<u8> },
}

impl<'de> Deserialize<'de> for HeaderRaw {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match HeaderRawWire::deserialize(deserializer)? {
            HeaderRawWire::Text(s) => BASE64
                .decode(s.as_bytes())
                .map(HeaderRaw)
                .map_err(|e| D::Error::custom(format!("invalid base64 headerRaw: {e}"))),
            HeaderRawWire::Buffer { data } => Ok(HeaderRaw(data)),
        }
    }
}

/// One signed, hash-linked ledger entry.
///
/// `hash` commits to `header_raw` (see [`crate::header`]), never to the
/// serialized struct. `validator_signature` is `None` until the creating
/// node signs the serialized block, so the signature always covers the
/// `null` placeholder rather than itself.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Block {
    #[serde(rename = "headerRaw")]
    pub header_raw: HeaderRaw,
    #[serde(rename = "Height")]
    pub height: u64,
    #[serde(rename = "Hash")]
    pub hash: String,
    #[serde(rename = "type")]
    pub block_type: String,
    pub status: String,
    #[serde(rename = "PreviousHash")]
    pub previous_hash: String,
    pub current_id: String,
    #[serde(rename = "Timestamp")]
    pub timestamp: Option<String>,
    #[serde(rename = "MerkleRoot")]
    pub merkle_root: String,
    #[serde(rename = "Creator", default)]
    pub creator: Option<String>,
    #[serde(rename = "Owner_id")]
    pub owner_id: String,
    #[serde(rename = "ValidatorSignature")]
    pub validator_signature: Option<String>,
    #[serde(rename = "Version")]
    pub version: String,
}

impl Block {
    /// Re-derive the hash from the stored header bytes.
    pub fn recomputed_hash(&self) -> String {
        compute_block_hash(self.header_raw.as_bytes())
    }
}

/// A `(height, hash)` pair summarizing one committed block, exchanged
/// during fork negotiation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BlockAnchor {
    #[serde(rename = "Height")]
    pub height: u64,
    #[serde(rename = "Hash")]
    pub hash: String,
}

/// Reconciliation state of the node, persisted in the status registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Active,
    Syncing,
    Fork,
    Maintenance,
    /// Fallback when the registry holds no record or an unrecognized
    /// value. Never chosen by the state machine itself.
    #[default]
    Unknown,
}

impl NodeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeStatus::Active => "active",
            NodeStatus::Syncing => "syncing",
            NodeStatus::Fork => "fork",
            NodeStatus::Maintenance => "maintenance",
            NodeStatus::Unknown => "unknown",
        }
    }

    /// Lenient parse for status strings arriving over the wire.
    pub fn from_wire(s: &str) -> Self {
        match s {
            "active" => NodeStatus::Active,
            "syncing" => NodeStatus::Syncing,
            "fork" => NodeStatus::Fork,
            "maintenance" => NodeStatus::Maintenance,
            _ => NodeStatus::Unknown,
        }
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The single registry record describing this node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeRecord {
    #[serde(rename = "nodeId")]
    pub node_id: String,
    pub status: NodeStatus,
    /// Unix seconds of the last inbound message or status change.
    #[serde(rename = "lastActive")]
    pub last_active: i64,
}
