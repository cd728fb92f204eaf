//! Pairchain validator node binary.
//!
//! Loads the issued configuration, provisions the RSA identity, opens
//! the RocksDB-backed chain store, and keeps a reconciliation session
//! with the coordinator until shutdown.

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::Parser;
use pairchain_node_lib::{
    CoordinatorTransport, NodeConfig, ReconciliationController, debug, provision_signer,
};
use pairchain_protocol::outbound_channel;
use pairchain_store::RocksBackend;
use tokio::sync::mpsc;
use tracing::{error, info};

/// Pairchain validator node.
#[derive(Parser, Debug)]
#[command(
    name = "pairchain-node",
    version,
    about = "Pairchain validator node with RocksDB storage and a coordinator channel"
)]
struct Args {
    /// Path to the issued JSON configuration
    #[arg(long, default_value = pairchain_node_lib::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Data directory for chain storage and the node key
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Coordinator address (host:port)
    #[arg(long)]
    coordinator_addr: Option<String>,

    /// Debug API bind address (host:port)
    #[arg(long)]
    debug_bind: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Log output format ("text" or "json")
    #[arg(long, default_value = "text")]
    log_format: String,
}

impl Args {
    /// Load the config file and apply CLI overrides on top.
    fn into_config(self) -> Result<(NodeConfig, String), pairchain_node_lib::NodeError> {
        let mut config = NodeConfig::load(&self.config)?;
        if let Some(data_dir) = self.data_dir {
            config.data_dir = data_dir;
        }
        if let Some(addr) = self.coordinator_addr {
            config.coordinator_addr = addr;
        }
        if let Some(bind) = self.debug_bind {
            config.debug_bind = Some(bind);
        }
        if let Some(level) = self.log_level {
            config.log_level = level;
        }
        Ok((config, self.log_format))
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let config_path = args.config.clone();
    let (config, log_format) = match args.into_config() {
        Ok(pair) => pair,
        Err(e) => {
            eprintln!("failed to load config {}: {e}", config_path.display());
            process::exit(1);
        }
    };

    init_logging(&config.log_level, &log_format);

    info!("Pairchain Validator Node v{}", env!("CARGO_PKG_VERSION"));
    info!("node_id: {}", config.node_id);
    info!("data_dir: {:?}", config.data_dir);
    info!("coordinator: {}", config.coordinator_addr);

    if let Err(e) = std::fs::create_dir_all(&config.data_dir) {
        error!("failed to create data_dir: {}", e);
        process::exit(1);
    }

    let signer = match provision_signer(&config) {
        Ok(signer) => signer,
        Err(e) => {
            error!("failed to provision node key: {}", e);
            process::exit(1);
        }
    };

    let backend = match RocksBackend::open(config.db_path()) {
        Ok(backend) => Arc::new(backend),
        Err(e) => {
            error!("failed to open chain database: {}", e);
            process::exit(1);
        }
    };

    let (handle, outbound_rx) = outbound_channel();
    let (event_tx, event_rx) = mpsc::unbounded_channel();

    let node = match pairchain_node_lib::Node::new(
        config.clone(),
        backend,
        signer,
        handle.clone(),
    ) {
        Ok(node) => node,
        Err(e) => {
            error!("failed to start node: {}", e);
            process::exit(1);
        }
    };
    info!("node initialized");

    if let Ok(Some(height)) = node.chain().latest_height() {
        info!("chain_tip: height={}", height);
    }

    if let Some(bind) = config.debug_bind.clone() {
        let debug_node = Arc::clone(&node);
        tokio::spawn(async move {
            if let Err(e) = debug::serve(&bind, debug_node).await {
                error!("debug api stopped: {}", e);
            }
        });
    }

    let transport = CoordinatorTransport::new(
        config.coordinator_addr.clone(),
        config.max_reconnect_attempts,
        handle,
        outbound_rx,
        event_tx,
    );
    let controller = ReconciliationController::new(Arc::clone(&node));

    info!("pairchain node running (Ctrl+C to stop)");

    let shutdown_signal = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
        info!("received Ctrl+C, shutting down...");
    };

    tokio::select! {
        result = transport.run() => match result {
            Ok(()) => info!("coordinator channel closed"),
            Err(e) => {
                error!("{}", e);
                process::exit(1);
            }
        },
        _ = node.run(event_rx) => {
            info!("node event loop exited");
        }
        _ = controller.run() => {
            info!("reconciliation loop exited");
        }
        _ = shutdown_signal => {}
    }

    info!("pairchain node shutdown complete");
}

/// Initialize tracing subscriber with the given log level and output format.
///
/// Pass `format = "json"` for structured JSON output (suitable for log
/// aggregation pipelines). Any other value defaults to human-readable text.
fn init_logging(level_str: &str, format: &str) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level_str));

    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_level(true))
            .init();
    }
}
