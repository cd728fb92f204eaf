//! Reconciliation lifecycle tests.
//!
//! These suites walk a memory-backed node through the coordinator
//! state machine frame by frame: paged sync to active, fork flagging
//! and the rollback verdict, maintenance walks, and the retry budget
//! that parks a failing sync in a cooldown.

use serde_json::json;

use pairchain_core::constants::{
    GENESIS_PREV_HASH, SYNC_COOLDOWN_SECS, SYNC_MAX_RETRIES, SYNC_MIN_GAP_SECS,
};
use pairchain_core::types::NodeStatus;
use pairchain_node_lib::{Node, ReconciliationController};
use pairchain_store::MemoryBackend;
use pairchain_tests::helpers::*;

/// Rewind the sync gate clocks so back-to-back ticks in one test are
/// not throttled by the minimum request gap.
fn age_sync_gates(node: &Node<MemoryBackend>) {
    let mut flags = node.flags().lock();
    flags.last_sync_attempt_at -= SYNC_MIN_GAP_SECS + 1;
    flags.last_sync_request_at -= SYNC_MIN_GAP_SECS + 1;
}

// ======================================================================
// Lifecycle 1: Fresh node reaches active through paged sync
// ======================================================================

#[test]
fn fresh_node_reaches_active_through_paged_sync() {
    let (node, mut rx, _signer) = memory_node("validator_1");
    node.handle_frame(
        &json!({ "type": "connected", "sessionId": "s-sync", "status": "syncing" }).to_string(),
    );
    assert_eq!(node.status(), NodeStatus::Syncing);
    drain_frames(&mut rx);

    // first tick requests a page from height zero
    let controller = ReconciliationController::new(node.clone());
    controller.tick();
    let frames = drain_frames(&mut rx);
    let request = find_frame(&frames, "sync_request");
    assert_eq!(request["from_height"], 0);
    assert_eq!(request["limit"], 20);
    assert_eq!(request["nodeId"], "validator_1");
    assert!(node.flags().lock().sync_in_flight);

    // a full page applies and leaves the node syncing
    let first = linked_page(1, GENESIS_PREV_HASH, 20);
    node.handle_frame(&sync_response_frame("s-sync", "continue", &first));
    assert_eq!(node.status(), NodeStatus::Syncing);
    assert!(!node.flags().lock().sync_in_flight);
    assert_eq!(node.chain().latest_height().unwrap(), Some(20));
    drain_frames(&mut rx);

    // the next tick continues from the new tip
    age_sync_gates(&node);
    controller.tick();
    let frames = drain_frames(&mut rx);
    let request = find_frame(&frames, "sync_request");
    assert_eq!(request["from_height"], 20);

    // the closing page flips the node active
    let second = linked_page(21, &first.last().unwrap().hash, 3);
    node.handle_frame(&sync_response_frame("s-sync", "complate", &second));
    assert_eq!(node.status(), NodeStatus::Active);
    assert_eq!(node.chain().latest_height().unwrap(), Some(23));
    drain_frames(&mut rx);

    // after which ticks are plain heartbeats
    controller.tick();
    let frames = drain_frames(&mut rx);
    let heartbeat = find_frame(&frames, "heartbeat");
    assert_eq!(heartbeat["height"], 23);
    assert_eq!(heartbeat["hash"], second.last().unwrap().hash);
    assert_eq!(heartbeat["sessionId"], "s-sync");
}

// ======================================================================
// Lifecycle 2: Mismatched page flags a fork and announces anchors
// ======================================================================

#[test]
fn mismatched_page_flags_fork_and_announces_anchors() {
    let (node, mut rx, _signer) = memory_node("validator_1");
    seed_chain(node.chain(), 3);
    authenticate(&node, &mut rx, "s-fork");

    // a page that skips ahead of the local tip is refused wholesale
    let stray = linked_page(6, "nowhere", 2);
    node.handle_frame(&sync_response_frame("s-fork", "continue", &stray));
    assert_eq!(node.status(), NodeStatus::Fork);
    assert_eq!(node.chain().latest_height().unwrap(), Some(3));

    let frames = drain_frames(&mut rx);
    let alarm = frames
        .iter()
        .find(|f| f["message"] == "block validation failed")
        .unwrap();
    assert_eq!(alarm["expectedHeight"], 4);
    assert_eq!(alarm["actualHeight"], 6);

    // the next tick announces the local anchors, tip first
    let controller = ReconciliationController::new(node.clone());
    controller.tick();
    let frames = drain_frames(&mut rx);
    let announce = find_frame(&frames, "archor_block_fork");
    assert_eq!(announce["status"], "fork");
    assert_eq!(announce["height"], 3);
    let anchors = announce["archor_block"].as_array().unwrap();
    assert_eq!(anchors.len(), 3);
    assert_eq!(anchors[0]["Height"], 3);
    assert_eq!(anchors[2]["Height"], 1);
}

// ======================================================================
// Lifecycle 3: Fork verdicts
// Rollback without a truth point stays in fork; bad or refused
// verdicts change nothing.
// ======================================================================

#[test]
fn fork_verdicts_roll_back_exactly_as_ordered() {
    let (node, mut rx, _signer) = memory_node("validator_1");
    seed_chain(node.chain(), 8);
    authenticate(&node, &mut rx, "s-verdict");
    node.registry().change_status(NodeStatus::Fork).unwrap();

    // no truth point yet: roll back to 5 but hold the fork state
    node.handle_frame(
        &json!({
            "type": "fork_response",
            "ok": true,
            "fork_point": 5,
            "truth_point": false,
            "sessionId": "s-verdict",
        })
        .to_string(),
    );
    assert_eq!(node.chain().latest_height().unwrap(), Some(5));
    assert_eq!(node.status(), NodeStatus::Fork);
    let frames = drain_frames(&mut rx);
    let verdict = find_frame(&frames, "log");
    assert_eq!(verdict["level"], "SUCCESS");

    // a zero fork point is refused outright
    node.handle_frame(
        &json!({
            "type": "fork_response",
            "ok": true,
            "fork_point": 0,
            "truth_point": true,
            "sessionId": "s-verdict",
        })
        .to_string(),
    );
    assert_eq!(node.chain().latest_height().unwrap(), Some(5));
    assert_eq!(node.status(), NodeStatus::Fork);
    let frames = drain_frames(&mut rx);
    let refusal = find_frame(&frames, "log");
    assert_eq!(refusal["level"], "ERROR");
    assert_eq!(refusal["message"], "invalid fork point");

    // a coordinator refusal is only logged
    node.handle_frame(&json!({ "type": "fork_response", "ok": false, "sessionId": "s-verdict" }).to_string());
    assert_eq!(node.chain().latest_height().unwrap(), Some(5));
    let frames = drain_frames(&mut rx);
    assert_eq!(find_frame(&frames, "log")["message"], "server critical");

    // and a verdict while not in fork is ignored
    node.registry().change_status(NodeStatus::Active).unwrap();
    node.handle_frame(
        &json!({
            "type": "fork_response",
            "ok": true,
            "fork_point": 2,
            "truth_point": true,
            "sessionId": "s-verdict",
        })
        .to_string(),
    );
    assert_eq!(node.chain().latest_height().unwrap(), Some(5));
    let frames = drain_frames(&mut rx);
    assert_eq!(find_frame(&frames, "log")["message"], "node status not fork");
}

// ======================================================================
// Lifecycle 4: An outlawed node stops retrying
// ======================================================================

#[test]
fn outlaw_verdict_stops_the_retry_loop() {
    let (node, mut rx, _signer) = memory_node("validator_1");
    authenticate(&node, &mut rx, "s-outlaw");

    // an ordinary failure queues another attempt
    node.handle_frame(
        &json!({ "type": "sync_response", "ok": false, "sessionId": "s-outlaw", "sync_status": "busy" }).to_string(),
    );
    {
        let flags = node.flags().lock();
        assert_eq!(flags.sync_retry_count, 1);
        assert!(flags.sync_in_flight);
    }

    // an outlaw verdict does not
    node.handle_frame(
        &json!({ "type": "sync_response", "ok": false, "sessionId": "s-outlaw", "sync_status": "node_outlaw" }).to_string(),
    );
    assert_eq!(node.flags().lock().sync_retry_count, 1);

    let frames = drain_frames(&mut rx);
    assert!(frames.iter().any(|f| f["message"] == "sync_response not ok"));
}

// ======================================================================
// Lifecycle 5: Maintenance order walks the chain back to active
// ======================================================================

#[test]
fn maintenance_order_walks_a_clean_chain_back_to_active() {
    let (node, mut rx, _signer) = memory_node("validator_1");
    seed_chain(node.chain(), 5);
    authenticate(&node, &mut rx, "s-maint");

    node.handle_frame(&json!({ "type": "Maintenance", "requestId": "m7", "sessionId": "s-maint" }).to_string());
    assert_eq!(node.status(), NodeStatus::Maintenance);
    let frames = drain_frames(&mut rx);
    let ack = find_frame(&frames, "Maintenance_responese");
    assert_eq!(ack["requestId"], "m7");

    // while in maintenance, get_status answers with the state name
    node.handle_frame(
        &json!({ "type": "command", "command": "get_status", "requestId": "r9", "sessionId": "s-maint" }).to_string(),
    );
    let frames = drain_frames(&mut rx);
    let refusal = find_frame(&frames, "command_response");
    assert_eq!(refusal["command"], "get_status");
    assert_eq!(refusal["status"], "node maintenance");

    // the walk finds nothing wrong and reactivates the node
    let controller = ReconciliationController::new(node.clone());
    controller.tick();
    assert_eq!(node.status(), NodeStatus::Active);
    let frames = drain_frames(&mut rx);
    assert!(
        frames
            .iter()
            .any(|f| f["message"] == "Maintenance complete with no fork")
    );
}

// ======================================================================
// Lifecycle 6: The retry budget parks sync in a cooldown
// Failures counted by the response handler trip the tick-side gate.
// ======================================================================

#[test]
fn exhausted_retry_budget_parks_sync_in_a_cooldown() {
    let (node, mut rx, _signer) = memory_node("validator_1");
    authenticate(&node, &mut rx, "s-budget");
    node.registry().change_status(NodeStatus::Syncing).unwrap();

    for _ in 0..SYNC_MAX_RETRIES {
        node.handle_frame(
            &json!({ "type": "sync_response", "ok": false, "sessionId": "s-budget", "sync_status": "busy" }).to_string(),
        );
    }
    drain_frames(&mut rx);
    assert_eq!(node.flags().lock().sync_retry_count, SYNC_MAX_RETRIES);

    // the tick resets the counter and sets the cooldown instead of sending
    let controller = ReconciliationController::new(node.clone());
    controller.tick();
    let frames = drain_frames(&mut rx);
    assert!(frames.iter().all(|f| f["type"] != "sync_request"));

    let now = chrono::Utc::now().timestamp();
    {
        let flags = node.flags().lock();
        assert_eq!(flags.sync_retry_count, 0);
        let until = flags.sync_cooldown_until.unwrap();
        assert!(until > now + SYNC_COOLDOWN_SECS - 5);
        assert!(until <= now + SYNC_COOLDOWN_SECS + 5);
    }

    // still parked on the next tick
    age_sync_gates(&node);
    controller.tick();
    let frames = drain_frames(&mut rx);
    assert!(frames.iter().all(|f| f["type"] != "sync_request"));
}
