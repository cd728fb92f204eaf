//! Periodic reconciliation against the coordinator.
//!
//! Once the node is authenticated, [`ReconciliationController`] ticks
//! on a fixed interval and acts on the persisted status: `active`
//! nodes heartbeat, `syncing` nodes request pages, `fork` nodes
//! announce their anchors, and `maintenance` nodes re-validate the
//! whole chain. An `unknown` status only emits the tick trace.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use tracing::{error, info, warn};

use pairchain_core::constants::{
    GENESIS_PREV_HASH, MAINTENANCE_BATCH, MAX_FORK_ANCHORS, SYNC_COOLDOWN_SECS,
    SYNC_INFLIGHT_TIMEOUT_SECS, SYNC_MAX_RETRIES, SYNC_MIN_GAP_SECS, SYNC_PAGE_SIZE,
    TICK_INTERVAL_SECS,
};
use pairchain_core::types::NodeStatus;
use pairchain_protocol::OutboundMessage;
use pairchain_store::KeyValueBackend;

use crate::node::{Node, now_iso};

pub struct ReconciliationController<B> {
    node: Arc<Node<B>>,
}

impl<B: KeyValueBackend> ReconciliationController<B> {
    pub fn new(node: Arc<Node<B>>) -> Self {
        Self { node }
    }

    /// Tick until shutdown. The first tick waits for the coordinator
    /// handshake so a freshly booted node never heartbeats into an
    /// unauthenticated channel.
    pub async fn run(&self) {
        let mut started = self.node.started();
        if started.wait_for(|ready| *ready).await.is_err() {
            return;
        }
        info!("reconciliation ticks started");

        let mut ticker = tokio::time::interval(Duration::from_secs(TICK_INTERVAL_SECS));
        loop {
            ticker.tick().await;
            self.tick();
        }
    }

    /// One reconciliation pass; the trace frame goes out before any
    /// branch runs.
    pub fn tick(&self) {
        let status = self.node.status();
        self.node.send(OutboundMessage::client_log(json!({
            "nodeId": self.node.config().node_id,
            "status": status.as_str(),
            "sessionId": self.node.session_id(),
            "time": now_iso(),
        })));

        match status {
            NodeStatus::Maintenance => self.maintenance_walk(),
            NodeStatus::Fork => self.announce_fork(),
            NodeStatus::Syncing => self.try_sync(),
            NodeStatus::Active => self.heartbeat(),
            NodeStatus::Unknown => {}
        }
    }

    fn heartbeat(&self) {
        let (height, hash) = match self.node.chain().get_latest() {
            Ok(Some(block)) => (block.height, block.hash),
            Ok(None) => (0, GENESIS_PREV_HASH.to_string()),
            Err(e) => {
                error!(error = %e, "heartbeat tip read failed");
                return;
            }
        };

        let config = self.node.config();
        self.node.send(OutboundMessage::Heartbeat {
            node_id: config.node_id.clone(),
            address: config.address.clone(),
            status: NodeStatus::Active.as_str().into(),
            session_id: self.node.session_id(),
            height,
            hash,
            port: config.port.clone(),
            time: now_iso(),
        });
    }

    fn try_sync(&self) {
        let now = Utc::now().timestamp();
        {
            let mut flags = self.node.flags().lock();

            if let Some(until) = flags.sync_cooldown_until {
                if now < until {
                    warn!(until, "sync cooldown active");
                    return;
                }
            }
            if now - flags.last_sync_attempt_at < SYNC_MIN_GAP_SECS {
                return;
            }
            if flags.sync_in_flight {
                if now - flags.last_sync_request_at < SYNC_INFLIGHT_TIMEOUT_SECS {
                    return;
                }
                warn!("sync request timed out, resetting in-flight flag");
                flags.sync_in_flight = false;
            }
            if flags.sync_retry_count >= SYNC_MAX_RETRIES {
                flags.sync_cooldown_until = Some(now + SYNC_COOLDOWN_SECS);
                flags.sync_retry_count = 0;
                error!("sync retries exhausted, entering cooldown");
                return;
            }
        }

        let from_height = match self.node.chain().latest_height() {
            Ok(height) => height.unwrap_or(0),
            Err(e) => {
                error!(error = %e, "sync tip read failed");
                return;
            }
        };

        {
            let mut flags = self.node.flags().lock();
            flags.sync_in_flight = true;
            flags.last_sync_request_at = now;
            flags.last_sync_attempt_at = now;
        }

        info!(from_height, "requesting sync page");
        self.node.send(OutboundMessage::SyncRequest {
            session_id: self.node.session_id(),
            node_id: self.node.config().node_id.clone(),
            from_height,
            limit: SYNC_PAGE_SIZE,
        });
    }

    fn announce_fork(&self) {
        let anchors = match self.node.chain().anchors(MAX_FORK_ANCHORS) {
            Ok(a) => a,
            Err(e) => {
                self.fork_failed(e.to_string());
                return;
            }
        };
        let height = match self.node.chain().latest_height() {
            Ok(h) => h.unwrap_or(0),
            Err(e) => {
                self.fork_failed(e.to_string());
                return;
            }
        };

        self.node.send(OutboundMessage::anchor_block_fork(
            &self.node.config().node_id,
            self.node.session_id(),
            anchors,
            height,
            now_iso(),
        ));
    }

    fn fork_failed(&self, message: String) {
        self.node.send(OutboundMessage::client_log(json!({
            "sessionId": self.node.session_id(),
            "level": "ERROR",
            "nodeId": self.node.config().node_id,
            "message": message,
        })));
    }

    /// Re-validate the whole chain from height 1 in fixed batches. Any
    /// inconsistency is reported to the coordinator and flips the node
    /// to `fork`; a clean walk re-activates it.
    fn maintenance_walk(&self) {
        // A coordinator order can land between the branch and the walk.
        if self.node.status() != NodeStatus::Maintenance {
            self.node.change_status(NodeStatus::Syncing);
            return;
        }
        match self.node.chain().get_latest() {
            Ok(Some(_)) => {}
            Ok(None) => {
                self.node.change_status(NodeStatus::Syncing);
                return;
            }
            Err(e) => {
                self.walk_failed(e.to_string());
                return;
            }
        }

        let mut expected_height: u64 = 1;
        let mut previous_hash = GENESIS_PREV_HASH.to_string();

        loop {
            let from = expected_height;
            let to = expected_height + MAINTENANCE_BATCH - 1;
            let mut page = match self.node.chain().get_range(from, to) {
                Ok(page) => page,
                Err(e) => {
                    self.walk_failed(e.to_string());
                    return;
                }
            };
            if page.is_empty() {
                break;
            }
            page.sort_by_key(|b| b.height);

            for block in &page {
                if block.height != expected_height {
                    self.flag_fork("HEIGHT_GAP", expected_height, Some(block.height));
                    return;
                }
                if block.previous_hash != previous_hash {
                    self.flag_fork("PREV_HASH_MISMATCH", block.height, None);
                    return;
                }
                if block.recomputed_hash() != block.hash {
                    self.flag_fork("HASH_MISMATCH", block.height, None);
                    return;
                }
                previous_hash = block.hash.clone();
                expected_height += 1;
            }
        }

        self.node.change_status(NodeStatus::Active);
        self.node.send(OutboundMessage::client_log(json!({
            "sessionId": self.node.session_id(),
            "nodeId": self.node.config().node_id,
            "message": "Maintenance complete with no fork",
        })));
    }

    fn flag_fork(&self, reason: &str, at_height: u64, got_height: Option<u64>) {
        self.node.send(OutboundMessage::ForkMaintenanceResponse {
            ok: false,
            session_id: self.node.session_id(),
            reason: reason.into(),
            at_height,
            got_height,
        });
        self.node.change_status(NodeStatus::Fork);
    }

    fn walk_failed(&self, message: String) {
        self.node.send(OutboundMessage::client_log(json!({
            "sessionId": self.node.session_id(),
            "nodeId": self.node.config().node_id,
            "status": NodeStatus::Maintenance.as_str(),
            "message": message,
        })));
    }
}
