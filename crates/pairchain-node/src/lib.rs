//! # pairchain-node — Validator node: config, channel handling, reconciliation.
//!
//! Composes the pairchain subsystems into a running validator:
//! - [`config::NodeConfig`] — issued configuration plus key provisioning
//! - [`node::Node`] — inbound frame handling over the coordinator channel
//! - [`controller::ReconciliationController`] — periodic status-driven ticks
//! - [`transport::CoordinatorTransport`] — NDJSON over TCP with reconnects
//! - [`debug`] — loopback HTTP inspection endpoints

pub mod config;
pub mod controller;
pub mod debug;
pub mod error;
pub mod health;
pub mod node;
pub mod transport;

pub use config::{DEFAULT_CONFIG_PATH, NodeConfig, provision_signer};
pub use controller::ReconciliationController;
pub use error::NodeError;
pub use health::{HostTelemetry, NullTelemetry};
pub use node::Node;
pub use transport::CoordinatorTransport;
