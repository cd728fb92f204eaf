//! Wire message types for the coordinator channel.
//!
//! Every frame is one JSON object tagged by a `type` field. Inbound
//! frames decode into a closed union: a frame whose tag or required
//! fields do not match is a [`ProtocolError`], logged and dropped by
//! the caller, never partially interpreted. Outbound frames are
//! validated before encoding.
//!
//! Field names, including `archor_block_fork`, `override_block_respone`
//! and `Maintenance_responese`, are the coordinator's contract and must
//! not be corrected.

use pairchain_core::constants::MAX_FORK_ANCHORS;
use pairchain_core::types::{Block, BlockAnchor};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProtocolError;

/// Frames the node consumes.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum InboundMessage {
    /// Consensus command envelope; `payload` stays undecoded here, the
    /// handler parses it per `command`.
    #[serde(rename = "command")]
    Command {
        command: String,
        #[serde(default, rename = "requestId")]
        request_id: Option<String>,
        #[serde(default, rename = "sessionId")]
        session_id: Option<String>,
        #[serde(default, rename = "voteRoundId")]
        vote_round_id: Option<String>,
        #[serde(default)]
        payload: Option<Value>,
    },
    #[serde(rename = "Maintenance")]
    Maintenance {
        #[serde(default, rename = "requestId")]
        request_id: Option<String>,
        #[serde(default, rename = "sessionId")]
        session_id: Option<String>,
    },
    #[serde(rename = "connected")]
    Connected {
        #[serde(rename = "sessionId")]
        session_id: String,
        status: String,
    },
    /// Block page from the coordinator. `blocks` stays raw: a malformed
    /// block must fail the sync handler, not the frame decode.
    #[serde(rename = "sync_response")]
    SyncResponse {
        ok: bool,
        #[serde(default, rename = "sessionId")]
        session_id: Option<String>,
        #[serde(default)]
        status: Option<String>,
        #[serde(default)]
        sync_status: Option<String>,
        #[serde(default)]
        blocks: Vec<Value>,
    },
    /// Verdict on a fork report. `fork_point`/`truth_point` are only
    /// meaningful when `ok` is true; a refusal may omit them.
    #[serde(rename = "fork_response")]
    ForkResponse {
        ok: bool,
        #[serde(default)]
        fork_point: i64,
        #[serde(default)]
        truth_point: bool,
        #[serde(default, rename = "sessionId")]
        session_id: Option<String>,
    },
}

impl InboundMessage {
    pub fn decode(line: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(line).map_err(|e| ProtocolError::Malformed(e.to_string()))
    }

    /// Session id carried by the frame, if any.
    pub fn session_id(&self) -> Option<&str> {
        match self {
            Self::Command { session_id, .. }
            | Self::Maintenance { session_id, .. }
            | Self::SyncResponse { session_id, .. }
            | Self::ForkResponse { session_id, .. } => session_id.as_deref(),
            Self::Connected { session_id, .. } => Some(session_id),
        }
    }
}

/// Decode a page of sync blocks strictly; one malformed block rejects
/// the whole page.
pub fn decode_blocks(values: &[Value]) -> Result<Vec<Block>, ProtocolError> {
    values
        .iter()
        .map(|v| {
            serde_json::from_value(v.clone()).map_err(|e| ProtocolError::Malformed(e.to_string()))
        })
        .collect()
}

/// Frames the node produces.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum OutboundMessage {
    #[serde(rename = "init")]
    Init {
        #[serde(rename = "nodeId")]
        node_id: String,
        height: u64,
        hash: String,
        node_status: String,
        node_type: String,
        role: String,
        signature: String,
        timestamp: i64,
        os: String,
    },
    #[serde(rename = "heartbeat")]
    Heartbeat {
        #[serde(rename = "nodeId")]
        node_id: String,
        address: String,
        status: String,
        #[serde(rename = "sessionId")]
        session_id: Option<String>,
        height: u64,
        hash: String,
        port: String,
        time: String,
    },
    #[serde(rename = "sync_request")]
    SyncRequest {
        #[serde(rename = "sessionId")]
        session_id: Option<String>,
        #[serde(rename = "nodeId")]
        node_id: String,
        from_height: u64,
        limit: u64,
    },
    #[serde(rename = "archor_block_fork")]
    AnchorBlockFork {
        #[serde(rename = "nodeId")]
        node_id: String,
        #[serde(rename = "sessionId")]
        session_id: Option<String>,
        archor_block: Vec<BlockAnchor>,
        height: u64,
        status: String,
        timestamp: String,
    },
    #[serde(rename = "fork_maintenance_response")]
    ForkMaintenanceResponse {
        ok: bool,
        #[serde(rename = "sessionId")]
        session_id: Option<String>,
        reason: String,
        #[serde(rename = "atHeight")]
        at_height: u64,
        #[serde(rename = "gotHeight")]
        got_height: Option<u64>,
    },
    #[serde(rename = "vote_response")]
    VoteResponse {
        command: String,
        #[serde(rename = "requestId")]
        request_id: Option<String>,
        #[serde(rename = "sessionId")]
        session_id: Option<String>,
        #[serde(rename = "nodeId")]
        node_id: String,
        #[serde(rename = "voteRoundId")]
        vote_round_id: Option<String>,
        payload: String,
        signature: Option<String>,
        ok: bool,
        node_type: String,
        error: String,
        time: String,
    },
    #[serde(rename = "drop_precheck_vote_ack")]
    DropPrecheckVoteAck {
        #[serde(rename = "voteRoundId")]
        vote_round_id: Option<String>,
        #[serde(rename = "sessionId")]
        session_id: Option<String>,
        #[serde(rename = "nodeId")]
        node_id: String,
        #[serde(rename = "payloadJson")]
        payload_json: String,
        #[serde(rename = "votePayload")]
        vote_payload: Value,
        signature: String,
        #[serde(rename = "serverTime")]
        server_time: i64,
    },
    #[serde(rename = "pair_user_response")]
    PairUserResponse {
        #[serde(rename = "requestId")]
        request_id: Option<String>,
        ok: bool,
        block: Value,
        time: String,
    },
    #[serde(rename = "pair_product_response")]
    PairProductResponse {
        #[serde(rename = "requestId")]
        request_id: Option<String>,
        ok: bool,
        block: Value,
        time: String,
    },
    #[serde(rename = "override_block_respone")]
    OverrideBlockResponse {
        #[serde(rename = "requestId")]
        request_id: Option<String>,
        ok: bool,
        block: Value,
        time: String,
    },
    #[serde(rename = "Maintenance_responese")]
    MaintenanceResponse {
        #[serde(rename = "requestId")]
        request_id: Option<String>,
        #[serde(rename = "sessionId")]
        session_id: Option<String>,
        ok: bool,
        #[serde(rename = "nodeId")]
        node_id: String,
        message: String,
    },
    #[serde(rename = "command_response")]
    CommandResponse {
        command: String,
        #[serde(rename = "sessionId")]
        session_id: Option<String>,
        #[serde(rename = "requestId")]
        request_id: Option<String>,
        #[serde(rename = "nodeId")]
        node_id: String,
        status: Value,
        time: String,
    },
    #[serde(rename = "log")]
    Log { level: String, message: String },
    /// Free-form diagnostic; the field set varies by call site.
    #[serde(rename = "client_log")]
    ClientLog {
        #[serde(flatten)]
        fields: Value,
    },
}

impl OutboundMessage {
    /// Handshake frame; `node_type` is fixed.
    #[allow(clippy::too_many_arguments)]
    pub fn init(
        node_id: impl Into<String>,
        height: u64,
        hash: impl Into<String>,
        node_status: impl Into<String>,
        role: impl Into<String>,
        signature: impl Into<String>,
        timestamp: i64,
        os: impl Into<String>,
    ) -> Self {
        Self::Init {
            node_id: node_id.into(),
            height,
            hash: hash.into(),
            node_status: node_status.into(),
            node_type: "client_node".into(),
            role: role.into(),
            signature: signature.into(),
            timestamp,
            os: os.into(),
        }
    }

    /// Fork report over the tip anchors; `status` is fixed.
    pub fn anchor_block_fork(
        node_id: impl Into<String>,
        session_id: Option<String>,
        anchors: Vec<BlockAnchor>,
        height: u64,
        timestamp: impl Into<String>,
    ) -> Self {
        Self::AnchorBlockFork {
            node_id: node_id.into(),
            session_id,
            archor_block: anchors,
            height,
            status: "fork".into(),
            timestamp: timestamp.into(),
        }
    }

    /// Vote answer; `command` and `node_type` are fixed.
    #[allow(clippy::too_many_arguments)]
    pub fn vote_response(
        request_id: Option<String>,
        session_id: Option<String>,
        node_id: impl Into<String>,
        vote_round_id: Option<String>,
        payload: impl Into<String>,
        signature: Option<String>,
        ok: bool,
        error: impl Into<String>,
        time: impl Into<String>,
    ) -> Self {
        Self::VoteResponse {
            command: "vote_result".into(),
            request_id,
            session_id,
            node_id: node_id.into(),
            vote_round_id,
            payload: payload.into(),
            signature,
            ok,
            node_type: "client".into(),
            error: error.into(),
            time: time.into(),
        }
    }

    /// Maintenance acknowledgement; `ok` and `message` are fixed.
    pub fn maintenance_response(
        request_id: Option<String>,
        session_id: Option<String>,
        node_id: impl Into<String>,
    ) -> Self {
        Self::MaintenanceResponse {
            request_id,
            session_id,
            ok: true,
            node_id: node_id.into(),
            message: "Node entering maintenance mode".into(),
        }
    }

    /// Status answer; `command` is fixed.
    pub fn get_status_response(
        session_id: Option<String>,
        request_id: Option<String>,
        node_id: impl Into<String>,
        status: Value,
        time: impl Into<String>,
    ) -> Self {
        Self::CommandResponse {
            command: "get_status".into(),
            session_id,
            request_id,
            node_id: node_id.into(),
            status,
            time: time.into(),
        }
    }

    pub fn log(level: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Log {
            level: level.into(),
            message: message.into(),
        }
    }

    /// `fields` must be a JSON object.
    pub fn client_log(fields: Value) -> Self {
        Self::ClientLog { fields }
    }

    fn validate(&self) -> Result<(), ProtocolError> {
        if let Self::AnchorBlockFork { archor_block, .. } = self {
            if archor_block.len() > MAX_FORK_ANCHORS {
                return Err(ProtocolError::TooManyAnchors {
                    count: archor_block.len(),
                    max: MAX_FORK_ANCHORS,
                });
            }
        }
        Ok(())
    }

    /// One JSON line, without the trailing newline.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        self.validate()?;
        serde_json::to_string(self).map_err(|e| ProtocolError::Encode(e.to_string()))
    }
}
