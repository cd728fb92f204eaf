//! Integration test suites for the pairchain validator node.
//!
//! These tests drive a full node through the coordinator protocol
//! without a live coordinator: inbound frames are injected directly
//! and the outbound channel is drained and asserted on. Storage runs
//! on the in-memory backend except where persistence itself is under
//! test, which uses RocksDB in a temp directory.

pub mod helpers;
