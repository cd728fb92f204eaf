//! Local debug HTTP surface.
//!
//! Serves operator inspection endpoints next to the coordinator
//! channel: the registry record, the full block dump, and a fork-test
//! injector that appends a deliberately corrupt block so fork handling
//! can be exercised end to end. Every answer uses the `RC`/`RM`/`RD`
//! envelope. Bind this to loopback; there is no auth.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use serde_json::json;
use tracing::info;

use pairchain_consensus::ApiResponse;
use pairchain_store::KeyValueBackend;

use crate::error::NodeError;
use crate::node::Node;

pub fn router<B: KeyValueBackend>(node: Arc<Node<B>>) -> Router {
    Router::new()
        .route("/api/debug/node_info", get(node_info))
        .route("/api/debug/block", get(block_dump))
        .route("/api/debug/forkblock", post(fork_block))
        .with_state(node)
}

/// Bind and serve until shutdown.
pub async fn serve<B: KeyValueBackend>(bind: &str, node: Arc<Node<B>>) -> Result<(), NodeError> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(addr = %bind, "debug api listening");
    axum::serve(listener, router(node)).await?;
    Ok(())
}

async fn node_info<B: KeyValueBackend>(State(node): State<Arc<Node<B>>>) -> Json<ApiResponse> {
    let records = match node.registry().record() {
        Ok(Some(record)) => vec![record],
        Ok(None) => Vec::new(),
        Err(e) => return Json(ApiResponse::internal_error(e.to_string())),
    };
    Json(ApiResponse::ok("Dump database", json!(records)))
}

async fn block_dump<B: KeyValueBackend>(State(node): State<Arc<Node<B>>>) -> Json<ApiResponse> {
    match node.chain().all_blocks() {
        Ok(blocks) => Json(ApiResponse::ok("Dump all block chains", json!(blocks))),
        Err(e) => Json(ApiResponse::internal_error(e.to_string())),
    }
}

async fn fork_block<B: KeyValueBackend>(State(node): State<Arc<Node<B>>>) -> Json<ApiResponse> {
    match node.chain().inject_fork_block(&node.config().node_id) {
        Ok(Some(block)) => Json(ApiResponse::ok("Fork block injected", json!(block))),
        Ok(None) => Json(ApiResponse::internal_error("No latest block")),
        Err(e) => Json(ApiResponse::internal_error(e.to_string())),
    }
}
