//! Node composition and inbound frame handling.
//!
//! [`Node`] wires the chain store, status registry, consensus service
//! and outbound channel together and interprets every frame the
//! coordinator sends. Command handlers re-read the persisted status at
//! handling time, so a node that left `active` between ticks refuses
//! instead of serving stale authority.

use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

use pairchain_consensus::{
    ApiResponse, ConsensusService, DropVoteRequest, PairProductPayload, PairUserPayload,
    RepairPayload, VotePayload,
};
use pairchain_core::constants::{BLOCK_TYPE_PRODUCT_CREATE, FIRST_BLOCK_HEIGHT, GENESIS_PREV_HASH};
use pairchain_core::crypto::NodeSigner;
use pairchain_core::types::NodeStatus;
use pairchain_protocol::{
    ChannelEvent, ChannelHandle, InboundMessage, OutboundMessage, SessionState, decode_blocks,
};
use pairchain_store::{ChainStore, KeyValueBackend, NodeRegistry};

use crate::config::NodeConfig;
use crate::error::NodeError;
use crate::health::{self, HostTelemetry, NullTelemetry};

/// Reconciliation flags shared between the frame handlers and the
/// controller ticks.
#[derive(Debug, Clone, Default)]
pub struct RuntimeFlags {
    pub sync_in_flight: bool,
    pub sync_retry_count: u32,
    /// Unix seconds when the last `sync_request` was actually sent.
    pub last_sync_request_at: i64,
    /// Unix seconds of the last tick that attempted a sync.
    pub last_sync_attempt_at: i64,
    /// No sync requests until this instant passes.
    pub sync_cooldown_until: Option<i64>,
}

/// One validator node bound to a coordinator channel.
pub struct Node<B> {
    config: NodeConfig,
    chain: ChainStore<B>,
    registry: NodeRegistry<B>,
    consensus: ConsensusService<B>,
    signer: NodeSigner,
    channel: ChannelHandle,
    session: Mutex<SessionState>,
    flags: Mutex<RuntimeFlags>,
    telemetry: Box<dyn HostTelemetry>,
    started: watch::Sender<bool>,
}

impl<B: KeyValueBackend> Node<B> {
    pub fn new(
        config: NodeConfig,
        backend: Arc<B>,
        signer: NodeSigner,
        channel: ChannelHandle,
    ) -> Result<Arc<Self>, NodeError> {
        Self::with_telemetry(config, backend, signer, channel, Box::new(NullTelemetry))
    }

    pub fn with_telemetry(
        config: NodeConfig,
        backend: Arc<B>,
        signer: NodeSigner,
        channel: ChannelHandle,
        telemetry: Box<dyn HostTelemetry>,
    ) -> Result<Arc<Self>, NodeError> {
        let chain = ChainStore::new(Arc::clone(&backend));
        let registry = NodeRegistry::open(backend, &config.node_id)?;
        let consensus =
            ConsensusService::new(chain.clone(), signer.clone(), config.node_id.clone());
        let (started, _) = watch::channel(false);

        Ok(Arc::new(Self {
            config,
            chain,
            registry,
            consensus,
            signer,
            channel,
            session: Mutex::new(SessionState::new()),
            flags: Mutex::new(RuntimeFlags::default()),
            telemetry,
            started,
        }))
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn chain(&self) -> &ChainStore<B> {
        &self.chain
    }

    pub fn registry(&self) -> &NodeRegistry<B> {
        &self.registry
    }

    pub fn flags(&self) -> &Mutex<RuntimeFlags> {
        &self.flags
    }

    /// Resolves to `true` once the coordinator has authenticated the
    /// node for the first time; the controller waits on this before
    /// ticking.
    pub fn started(&self) -> watch::Receiver<bool> {
        self.started.subscribe()
    }

    /// Current persisted status; read failures degrade to `Unknown`.
    pub fn status(&self) -> NodeStatus {
        self.registry.status().unwrap_or_else(|e| {
            error!(error = %e, "status read failed");
            NodeStatus::Unknown
        })
    }

    pub(crate) fn session_id(&self) -> Option<String> {
        self.session.lock().session_id().map(str::to_owned)
    }

    pub(crate) fn change_status(&self, status: NodeStatus) {
        if let Err(e) = self.registry.change_status(status) {
            error!(error = %e, status = status.as_str(), "status change failed");
        }
    }

    pub(crate) fn send(&self, message: OutboundMessage) {
        if let Err(e) = self.channel.send(&message) {
            error!(error = %e, "outbound send failed");
        }
    }

    /// Drain channel events until the transport goes away.
    pub async fn run(self: &Arc<Self>, mut events: mpsc::UnboundedReceiver<ChannelEvent>) {
        while let Some(event) = events.recv().await {
            self.handle_event(event);
        }
        info!("channel event stream ended");
    }

    pub fn handle_event(&self, event: ChannelEvent) {
        match event {
            ChannelEvent::Opened => self.on_opened(),
            ChannelEvent::Frame(line) => self.handle_frame(&line),
            ChannelEvent::Closed => self.on_closed(),
        }
    }

    fn on_opened(&self) {
        match self.init_message() {
            Ok(message) => self.send(message),
            Err(e) => error!(error = %e, "failed to build init frame"),
        }
    }

    fn on_closed(&self) {
        self.session.lock().clear();
        self.flags.lock().sync_in_flight = false;
        info!("channel closed, session reset");
    }

    /// Handshake announcing identity, tip, and persisted status. The
    /// signature covers `"{node_id}|{timestamp}"`.
    fn init_message(&self) -> Result<OutboundMessage, NodeError> {
        let (height, hash) = match self.chain.get_latest()? {
            Some(block) => (block.height, block.hash),
            None => (0, GENESIS_PREV_HASH.to_string()),
        };
        let timestamp = Utc::now().timestamp_millis();
        let signature = self
            .signer
            .sign(format!("{}|{}", self.config.node_id, timestamp).as_bytes())?;

        Ok(OutboundMessage::init(
            &self.config.node_id,
            height,
            hash,
            self.status().as_str(),
            &self.config.role,
            signature,
            timestamp,
            std::env::consts::OS,
        ))
    }

    /// Decode and dispatch one inbound line. Undecodable frames are
    /// logged and dropped; they never reach a handler half-parsed.
    pub fn handle_frame(&self, raw: &str) {
        let message = match InboundMessage::decode(raw) {
            Ok(m) => m,
            Err(e) => {
                warn!(error = %e, "dropping undecodable frame");
                return;
            }
        };

        self.echo_receiver(raw);
        self.session.lock().adopt(message.session_id());
        if let Err(e) = self.registry.touch() {
            error!(error = %e, "activity stamp update failed");
        }

        match message {
            InboundMessage::Command {
                command,
                request_id,
                vote_round_id,
                payload,
                ..
            } => self.handle_command(&command, request_id, vote_round_id, payload),
            InboundMessage::Maintenance { request_id, .. } => self.handle_maintenance(request_id),
            InboundMessage::Connected { session_id, status } => {
                self.handle_connected(session_id, &status)
            }
            InboundMessage::SyncResponse {
                ok,
                status,
                sync_status,
                blocks,
                ..
            } => self.handle_sync_response(ok, status.as_deref(), sync_status.as_deref(), &blocks),
            InboundMessage::ForkResponse {
                ok,
                fork_point,
                truth_point,
                ..
            } => self.handle_fork_response(ok, fork_point, truth_point),
        }
    }

    /// Mirror every inbound frame back as a `client_log` once the
    /// session is authenticated.
    fn echo_receiver(&self, raw: &str) {
        let session = self.session.lock();
        if !session.is_authenticated() {
            return;
        }
        let frame = OutboundMessage::client_log(json!({
            "command": format!("[CLIENT] - [{}] RECEIVER", self.config.node_id),
            "sessionId": session.session_id(),
            "nodeId": self.config.node_id,
            "content": raw,
        }));
        drop(session);
        self.send(frame);
    }

    fn handle_command(
        &self,
        command: &str,
        request_id: Option<String>,
        vote_round_id: Option<String>,
        payload: Option<Value>,
    ) {
        let status = self.status();
        match command {
            "get_status" => self.cmd_get_status(status, request_id),
            "get_vote" => self.cmd_get_vote(status, request_id, vote_round_id, payload),
            "drop_precheck_vote" => self.cmd_drop_precheck_vote(status, vote_round_id, payload),
            "pair_user" => self.cmd_pair_user(status, request_id, payload),
            "pair_product" => self.cmd_pair_product(status, request_id, payload),
            "override_block" => self.cmd_override_block(status, request_id, payload),
            other => warn!(command = other, "unhandled command"),
        }
    }

    fn cmd_get_status(&self, status: NodeStatus, request_id: Option<String>) {
        let session_id = self.session_id();
        if status != NodeStatus::Active {
            self.send(OutboundMessage::get_status_response(
                session_id,
                request_id,
                &self.config.node_id,
                json!(format!("node {status}")),
                now_iso(),
            ));
            return;
        }

        let snapshot = match health::snapshot(&self.chain, self.telemetry.as_ref()) {
            Ok(s) => s,
            Err(e) => {
                error!(error = %e, "health snapshot failed");
                return;
            }
        };
        match serde_json::to_value(&snapshot) {
            Ok(payload) => self.send(OutboundMessage::get_status_response(
                session_id,
                request_id,
                &self.config.node_id,
                payload,
                now_iso(),
            )),
            Err(e) => error!(error = %e, "health snapshot encode failed"),
        }
    }

    fn cmd_get_vote(
        &self,
        status: NodeStatus,
        request_id: Option<String>,
        vote_round_id: Option<String>,
        payload: Option<Value>,
    ) {
        // Vote payloads decode leniently: a sparse or mangled payload
        // still gets a not-ok answer instead of silence.
        let dto: VotePayload = payload
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default();
        let session_id = self.session_id();

        if status != NodeStatus::Active {
            self.send(OutboundMessage::vote_response(
                request_id,
                session_id,
                &self.config.node_id,
                vote_round_id,
                &dto.client_hash,
                None,
                false,
                format!("node {status}"),
                now_iso(),
            ));
            return;
        }

        let outcome = if dto.command_type == "new" {
            self.consensus.first_vote(&dto)
        } else {
            self.consensus.vote(&dto)
        };
        let signature = (!outcome.signature.is_empty()).then(|| outcome.signature.clone());
        self.send(OutboundMessage::vote_response(
            request_id,
            session_id,
            &self.config.node_id,
            vote_round_id,
            &dto.client_hash,
            signature,
            outcome.ok,
            outcome.error,
            now_iso(),
        ));
    }

    fn cmd_drop_precheck_vote(
        &self,
        status: NodeStatus,
        vote_round_id: Option<String>,
        payload: Option<Value>,
    ) {
        let request: DropVoteRequest = payload
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default();
        if request.products.is_empty() {
            return;
        }
        if status != NodeStatus::Active {
            warn!(status = status.as_str(), "refusing drop precheck vote");
            return;
        }

        let votes = self.consensus.batch_drop_vote(&request);
        let vote_payload = json!({ "votes": votes });
        let payload_json = match serde_json::to_string(&vote_payload) {
            Ok(s) => s,
            Err(e) => {
                error!(error = %e, "drop vote payload encode failed");
                return;
            }
        };
        let signature = match self.signer.sign(payload_json.as_bytes()) {
            Ok(s) => s,
            Err(e) => {
                error!(error = %e, "drop vote signing failed");
                return;
            }
        };

        self.send(OutboundMessage::DropPrecheckVoteAck {
            vote_round_id,
            session_id: self.session_id(),
            node_id: self.config.node_id.clone(),
            payload_json,
            vote_payload,
            signature,
            server_time: Utc::now().timestamp_millis(),
        });
    }

    fn cmd_pair_user(&self, status: NodeStatus, request_id: Option<String>, payload: Option<Value>) {
        if status != NodeStatus::Active {
            self.send(OutboundMessage::PairUserResponse {
                request_id,
                ok: false,
                block: json!(format!("node {status}")),
                time: now_iso(),
            });
            return;
        }

        let dto: Option<PairUserPayload> = payload.and_then(|v| serde_json::from_value(v).ok());
        let result = self.consensus.pair_user(dto);
        self.send(OutboundMessage::PairUserResponse {
            request_id,
            ok: result.is_ok(),
            block: result.rd.unwrap_or(Value::Null),
            time: now_iso(),
        });
    }

    fn cmd_pair_product(
        &self,
        status: NodeStatus,
        request_id: Option<String>,
        payload: Option<Value>,
    ) {
        if status != NodeStatus::Active {
            self.send(OutboundMessage::PairProductResponse {
                request_id,
                ok: false,
                block: json!(format!("node {status}")),
                time: now_iso(),
            });
            return;
        }

        let dto: Option<PairProductPayload> = payload.and_then(|v| serde_json::from_value(v).ok());
        let result = self.consensus.pair_product(dto);
        self.send(OutboundMessage::PairProductResponse {
            request_id,
            ok: result.is_ok(),
            block: result.rd.unwrap_or(Value::Null),
            time: now_iso(),
        });
    }

    /// Repair is the only override the node honors; any other block
    /// type is answered with `Truncate options`.
    fn cmd_override_block(
        &self,
        status: NodeStatus,
        request_id: Option<String>,
        payload: Option<Value>,
    ) {
        if status != NodeStatus::Active {
            self.send(OutboundMessage::OverrideBlockResponse {
                request_id,
                ok: false,
                block: json!(format!("node {status}")),
                time: now_iso(),
            });
            return;
        }

        let dto: Option<RepairPayload> = payload.and_then(|v| serde_json::from_value(v).ok());
        let result = match dto {
            Some(d) if d.payload.block_type == BLOCK_TYPE_PRODUCT_CREATE => {
                self.consensus.repair_product(Some(d))
            }
            Some(_) => ApiResponse::error(500, "Truncate options"),
            None => self.consensus.repair_product(None),
        };
        self.send(OutboundMessage::OverrideBlockResponse {
            request_id,
            ok: result.is_ok(),
            block: result.rd.unwrap_or(Value::Null),
            time: now_iso(),
        });
    }

    /// Entered unconditionally; maintenance is a coordinator order, not
    /// a request.
    fn handle_maintenance(&self, request_id: Option<String>) {
        self.change_status(NodeStatus::Maintenance);
        self.send(OutboundMessage::maintenance_response(
            request_id,
            self.session_id(),
            &self.config.node_id,
        ));
    }

    fn handle_connected(&self, session_id: String, status: &str) {
        self.session
            .lock()
            .establish(session_id.clone(), self.config.node_id.clone());
        self.change_status(NodeStatus::from_wire(status));
        info!(session = %session_id, "authenticated with coordinator");
        self.started.send_replace(true);

        self.send(OutboundMessage::client_log(json!({
            "command": format!("[CLIENT] - [{}] CONNECTED", self.config.node_id),
            "sessionId": session_id,
            "nodeId": self.config.node_id,
            "content": "Node connected and authenticated",
        })));
    }

    fn handle_sync_response(
        &self,
        ok: bool,
        status: Option<&str>,
        sync_status: Option<&str>,
        blocks: &[Value],
    ) {
        let session_id = self.session_id();

        if !ok {
            self.send(OutboundMessage::client_log(json!({
                "level": "WARN",
                "sessionId": session_id,
                "message": "sync_response not ok",
                "syncStatus": sync_status,
            })));
            // An outlawed node stops retrying; anything else queues
            // another attempt.
            if sync_status != Some("node_outlaw") {
                let mut flags = self.flags.lock();
                flags.sync_retry_count += 1;
                flags.sync_in_flight = true;
            }
            return;
        }

        if status == Some("fork") {
            self.send(OutboundMessage::client_log(json!({
                "sessionId": session_id,
                "level": "ERROR",
                "message": "fork detected from server",
            })));
            self.change_status(NodeStatus::Fork);
            return;
        }

        let mut page = match decode_blocks(blocks) {
            Ok(p) => p,
            Err(e) => {
                self.sync_fatal(session_id, e.to_string());
                return;
            }
        };

        if page.is_empty() {
            self.send(OutboundMessage::client_log(json!({
                "sessionId": session_id,
                "level": "WARN",
                "message": "no blocks received",
            })));
            self.flags.lock().sync_retry_count += 1;
            return;
        }

        page.sort_by_key(|b| b.height);

        let latest = match self.chain.get_latest() {
            Ok(l) => l,
            Err(e) => {
                self.sync_fatal(session_id, e.to_string());
                return;
            }
        };
        let (mut expected_height, mut expected_prev) = match latest {
            Some(block) => (block.height + 1, block.hash),
            None => (FIRST_BLOCK_HEIGHT, GENESIS_PREV_HASH.to_string()),
        };

        for block in &page {
            if block.height != expected_height || block.previous_hash != expected_prev {
                self.send(OutboundMessage::client_log(json!({
                    "sessionId": session_id,
                    "level": "ERROR",
                    "message": "block validation failed",
                    "expectedHeight": expected_height,
                    "actualHeight": block.height,
                    "expectedPrevHash": expected_prev,
                    "actualPrevHash": block.previous_hash,
                })));
                self.change_status(NodeStatus::Fork);
                return;
            }

            match self.chain.save(block) {
                Ok(true) => {}
                Ok(false) => {
                    self.send(OutboundMessage::client_log(json!({
                        "level": "ERROR",
                        "sessionId": session_id,
                        "message": "block save failed",
                        "expectedHeight": expected_height,
                        "actualHeight": block.height,
                        "expectedPrevHash": expected_prev,
                        "actualPrevHash": block.previous_hash,
                    })));
                    return;
                }
                Err(e) => {
                    self.sync_fatal(session_id, e.to_string());
                    return;
                }
            }

            expected_prev = block.hash.clone();
            expected_height += 1;
        }

        let next = if sync_status == Some("complate") {
            NodeStatus::Active
        } else {
            NodeStatus::Syncing
        };
        self.change_status(next);
        self.flags.lock().sync_in_flight = false;

        self.send(OutboundMessage::client_log(json!({
            "sessionId": session_id,
            "level": "INFO",
            "message": "sync_response handled successfully",
            "finalHeight": expected_height - 1,
        })));
    }

    fn sync_fatal(&self, session_id: Option<String>, error: String) {
        self.send(OutboundMessage::client_log(json!({
            "sessionId": session_id,
            "level": "FATAL",
            "message": "exception while handling sync_response",
            "error": error,
        })));
        let mut flags = self.flags.lock();
        flags.sync_retry_count += 1;
        flags.sync_in_flight = false;
    }

    fn handle_fork_response(&self, ok: bool, fork_point: i64, truth_point: bool) {
        if !ok {
            self.send(OutboundMessage::log("ERROR", "server critical"));
            return;
        }
        if self.status() != NodeStatus::Fork {
            self.send(OutboundMessage::log("WARN", "node status not fork"));
            return;
        }

        if fork_point > 0 {
            let latest = match self.chain.get_latest() {
                Ok(Some(block)) => block,
                Ok(None) => return,
                Err(e) => {
                    error!(error = %e, "fork rollback aborted");
                    return;
                }
            };

            let fork_point = fork_point as u64;
            for height in ((fork_point + 1)..=latest.height).rev() {
                if let Err(e) = self.chain.delete_by_height(height) {
                    error!(error = %e, height, "fork rollback delete failed");
                    self.send(OutboundMessage::log(
                        "ERROR",
                        format!("delete block {height} failed"),
                    ));
                    return;
                }
            }

            let next = if truth_point {
                NodeStatus::Syncing
            } else {
                NodeStatus::Fork
            };
            self.change_status(next);
            self.send(OutboundMessage::log("SUCCESS", "one step complate"));
        } else {
            self.send(OutboundMessage::log("ERROR", "invalid fork point"));
        }
    }
}

/// Wall-clock timestamp in the coordinator's expected layout.
pub(crate) fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
