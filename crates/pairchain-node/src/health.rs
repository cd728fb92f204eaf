//! Health snapshot answered to `get_status`.

use serde::Serialize;

use pairchain_store::{ChainStore, KeyValueBackend, StorageError};

/// Host metrics feeding the snapshot. Metric collection is outside this
/// node's scope, so the default implementation reports zeros; a
/// deployment with a real probe overrides the methods it can fill.
pub trait HostTelemetry: Send + Sync {
    fn cpu(&self) -> f64 {
        0.0
    }
    fn ram_used(&self) -> f64 {
        0.0
    }
    fn ram_total(&self) -> f64 {
        0.0
    }
    fn disk_free(&self) -> f64 {
        0.0
    }
    fn disk_total(&self) -> f64 {
        0.0
    }
    fn ping_ms(&self) -> i64 {
        0
    }
}

/// All-zero telemetry source.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullTelemetry;

impl HostTelemetry for NullTelemetry {}

/// Wire shape of the `get_status` payload. Key casing is the contract.
#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    pub running: bool,
    pub cpu: f64,
    pub height: u64,
    pub ram_used: f64,
    pub db_alive: bool,
    #[serde(rename = "db_canRead")]
    pub db_can_read: bool,
    #[serde(rename = "db_CanWrite")]
    pub db_can_write: bool,
    #[serde(rename = "db_FileSizeMB")]
    pub db_file_size_mb: f64,
    #[serde(rename = "db_Message")]
    pub db_message: String,
    pub ram_total: f64,
    pub disk_free: f64,
    pub disk_total: f64,
    pub ping: i64,
}

/// Assemble a snapshot. Chain height and the backend probe are
/// authoritative; everything host-level comes from `telemetry`.
pub fn snapshot<B: KeyValueBackend>(
    chain: &ChainStore<B>,
    telemetry: &dyn HostTelemetry,
) -> Result<HealthSnapshot, StorageError> {
    let height = chain.latest_height()?.unwrap_or(0);
    let db = chain.health();

    Ok(HealthSnapshot {
        running: true,
        cpu: telemetry.cpu(),
        height,
        ram_used: telemetry.ram_used(),
        db_alive: db.alive,
        db_can_read: db.can_read,
        db_can_write: db.can_write,
        db_file_size_mb: db.file_size_mb,
        db_message: db.message,
        ram_total: telemetry.ram_total(),
        disk_free: telemetry.disk_free(),
        disk_total: telemetry.disk_total(),
        ping: telemetry.ping_ms(),
    })
}
