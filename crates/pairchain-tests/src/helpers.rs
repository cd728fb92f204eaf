//! Shared builders for the integration suites.

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::{Value, json};
use tokio::sync::mpsc;

use pairchain_core::constants::GENESIS_PREV_HASH;
use pairchain_core::crypto::NodeSigner;
use pairchain_core::header::{compute_block_hash, product_header};
use pairchain_core::types::{Block, HeaderRaw};
use pairchain_node_lib::Node;
use pairchain_node_lib::config::{DatabaseConfig, NodeConfig};
use pairchain_protocol::outbound_channel;
use pairchain_store::{ChainStore, KeyValueBackend, MemoryBackend};

/// Outbound frames exactly as the transport would see them.
pub type FrameRx = mpsc::UnboundedReceiver<String>;

/// 512-bit RSA signer. Far too small for production, quick enough
/// for tests.
pub fn small_signer() -> NodeSigner {
    let key = rsa::RsaPrivateKey::new(&mut rand::thread_rng(), 512).unwrap();
    NodeSigner::from_private(key)
}

/// Config for a node that never opens real sockets.
pub fn test_config(node_id: &str) -> NodeConfig {
    NodeConfig {
        node_id: node_id.into(),
        address: "127.0.0.1".into(),
        port: "5100".into(),
        private_key: None,
        role: "validator".into(),
        owner_actor: None,
        database: DatabaseConfig::default(),
        coordinator_addr: "127.0.0.1:5099".into(),
        debug_bind: None,
        data_dir: PathBuf::from("unused"),
        max_reconnect_attempts: 3,
        log_level: "info".into(),
    }
}

/// Memory-backed node wired to a connected outbound channel.
pub fn memory_node(node_id: &str) -> (Arc<Node<MemoryBackend>>, FrameRx, NodeSigner) {
    let backend = Arc::new(MemoryBackend::new());
    let (handle, rx) = outbound_channel();
    handle.mark_connected(true);
    let signer = small_signer();
    let node = Node::new(test_config(node_id), backend, signer.clone(), handle).unwrap();
    (node, rx, signer)
}

/// Well-formed product block linked to `previous_hash`.
pub fn linked_block(height: u64, previous_hash: &str, current_id: &str) -> Block {
    let header = product_header(
        height,
        previous_hash,
        current_id,
        "O1",
        "1",
        "product_create",
        "m",
    );
    let hash = compute_block_hash(header.as_bytes());
    Block {
        header_raw: HeaderRaw::from_header(header),
        height,
        hash,
        block_type: "product_create".into(),
        status: "active".into(),
        previous_hash: previous_hash.into(),
        current_id: current_id.into(),
        timestamp: Some("1700000000000".into()),
        merkle_root: "m".into(),
        creator: Some("validator_1".into()),
        owner_id: "O1".into(),
        validator_signature: None,
        version: "1".into(),
    }
}

/// `len` consecutive linked product blocks starting at `from_height`
/// on top of `previous_hash`.
pub fn linked_page(from_height: u64, previous_hash: &str, len: u64) -> Vec<Block> {
    let mut prev = previous_hash.to_string();
    let mut page = Vec::with_capacity(len as usize);
    for height in from_height..from_height + len {
        let block = linked_block(height, &prev, &format!("P{height}"));
        prev = block.hash.clone();
        page.push(block);
    }
    page
}

/// Save a linked chain of `len` blocks from genesis, returning the
/// tip hash.
pub fn seed_chain<B: KeyValueBackend>(chain: &ChainStore<B>, len: u64) -> String {
    let page = linked_page(1, GENESIS_PREV_HASH, len);
    for block in &page {
        assert!(chain.save(block).unwrap());
    }
    page.last().map(|b| b.hash.clone()).unwrap_or_default()
}

/// A `sync_response` frame carrying `blocks` as the coordinator would
/// send them.
pub fn sync_response_frame(session: &str, sync_status: &str, blocks: &[Block]) -> String {
    let page: Vec<Value> = blocks
        .iter()
        .map(|b| serde_json::to_value(b).unwrap())
        .collect();
    json!({
        "type": "sync_response",
        "ok": true,
        "sessionId": session,
        "sync_status": sync_status,
        "blocks": page,
    })
    .to_string()
}

/// Authenticate the node with a coordinator `connected` frame and
/// swallow the CONNECTED log it answers with.
pub fn authenticate<B: KeyValueBackend>(node: &Node<B>, rx: &mut FrameRx, session: &str) {
    node.handle_frame(&json!({ "type": "connected", "sessionId": session, "status": "active" }).to_string());
    let frame = next_frame(rx);
    assert_eq!(frame["type"], "client_log");
}

/// Pop the next outbound frame as JSON.
pub fn next_frame(rx: &mut FrameRx) -> Value {
    serde_json::from_str(&rx.try_recv().expect("expected a frame")).unwrap()
}

/// Drain every pending outbound frame.
pub fn drain_frames(rx: &mut FrameRx) -> Vec<Value> {
    let mut frames = Vec::new();
    while let Ok(raw) = rx.try_recv() {
        frames.push(serde_json::from_str(&raw).unwrap());
    }
    frames
}

/// First drained frame of the given wire type.
pub fn find_frame<'a>(frames: &'a [Value], frame_type: &str) -> &'a Value {
    frames
        .iter()
        .find(|f| f["type"] == frame_type)
        .unwrap_or_else(|| panic!("no {frame_type} frame in {frames:?}"))
}
