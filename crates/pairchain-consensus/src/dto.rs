//! Request payloads and receipts for the consensus commands.
//!
//! Field names mirror the coordinator's JSON exactly, PascalCase and
//! snake_case mixed as they arrive on the wire. Vote payloads default
//! every field so a sparse request still gets a refusal answer instead
//! of a decode error; the pairing payloads are strict, a malformed
//! mutation request is refused wholesale before anything touches the
//! chain.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Payload of a `get_vote` command.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct VotePayload {
    pub client_hash: String,
    #[serde(rename = "Signature")]
    pub signature: String,
    #[serde(rename = "Public_key")]
    pub public_key: String,
    #[serde(rename = "voteRoundId")]
    pub vote_round_id: String,
    pub current_id: String,
    #[serde(rename = "type")]
    pub block_type: String,
    pub status: String,
    pub command_type: String,
}

/// Countersign result, embedded in a `vote_response` frame.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VoteOutcome {
    pub payload: String,
    pub signature: String,
    pub error: String,
    pub ok: bool,
}

impl VoteOutcome {
    pub fn rejected(client_hash: &str, error: impl Into<String>) -> Self {
        Self {
            payload: client_hash.to_string(),
            signature: String::new(),
            error: error.into(),
            ok: false,
        }
    }
}

/// Payload of a `drop_precheck_vote` command.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DropVoteRequest {
    pub products: Vec<DropVoteItem>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DropVoteItem {
    pub product_id: String,
}

/// Per-product verdict inside a `drop_precheck_vote_ack`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DropVoteResult {
    pub product_id: String,
    pub approve: bool,
    pub reason: Option<String>,
}

/// Payload of a `pair_user` command.
#[derive(Debug, Clone, Deserialize)]
pub struct PairUserPayload {
    pub timestamp: String,
    pub user: PairUserRecord,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PairUserRecord {
    pub id: String,
    pub hash: String,
    #[serde(rename = "type")]
    pub user_type: String,
    pub version: String,
}

/// Payload of a `pair_product` command.
#[derive(Debug, Clone, Deserialize)]
pub struct PairProductPayload {
    pub timestamp: String,
    pub payload: PairProductRecord,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PairProductRecord {
    pub hash: String,
    #[serde(rename = "type")]
    pub product_type: String,
    pub version: String,
    pub product_id: String,
    #[serde(rename = "Owner_id")]
    pub owner_id: String,
}

/// Payload of an `override_block` command.
#[derive(Debug, Clone, Deserialize)]
pub struct RepairPayload {
    pub timestamp: String,
    pub payload: RepairRecord,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RepairRecord {
    pub item_id: String,
    pub hash: String,
    pub version: String,
    #[serde(rename = "Owner_id")]
    pub owner_id: String,
    #[serde(rename = "type")]
    pub block_type: String,
}

/// Envelope wrapping every pairing receipt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiResponse {
    #[serde(rename = "RC")]
    pub rc: u16,
    #[serde(rename = "RM")]
    pub rm: String,
    #[serde(rename = "RD")]
    pub rd: Option<Value>,
}

impl ApiResponse {
    pub fn ok(message: impl Into<String>, data: Value) -> Self {
        Self {
            rc: 200,
            rm: message.into(),
            rd: Some(data),
        }
    }

    pub fn error(code: u16, message: impl Into<String>) -> Self {
        Self {
            rc: code,
            rm: message.into(),
            rd: None,
        }
    }

    pub fn internal_error(detail: impl Into<String>) -> Self {
        Self {
            rc: 500,
            rm: "Internal error".into(),
            rd: Some(Value::String(detail.into())),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.rc == 200
    }
}
