//! Node identity record, kept in its own backend instance.
//!
//! A single record under `node_info` carries the node id, its last
//! reported status, and a unix-seconds activity stamp. The record is
//! seeded on first boot and survives restarts, so a node that went into
//! maintenance stays there across a crash.

use std::sync::Arc;

use chrono::Utc;
use pairchain_core::types::{NodeRecord, NodeStatus};

use crate::backend::KeyValueBackend;
use crate::error::StorageError;

pub const NODE_INFO_KEY: &str = "node_info";

pub struct NodeRegistry<B> {
    backend: Arc<B>,
    node_id: String,
}

impl<B> Clone for NodeRegistry<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            node_id: self.node_id.clone(),
        }
    }
}

impl<B: KeyValueBackend> NodeRegistry<B> {
    /// Open the registry, seeding a first-boot record when none exists.
    pub fn open(backend: Arc<B>, node_id: &str) -> Result<Self, StorageError> {
        let registry = Self {
            backend,
            node_id: node_id.to_string(),
        };
        if registry.record()?.is_none() {
            registry.write(NodeRecord {
                node_id: node_id.to_string(),
                status: NodeStatus::Active,
                last_active: Utc::now().timestamp(),
            })?;
        }
        Ok(registry)
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn record(&self) -> Result<Option<NodeRecord>, StorageError> {
        match self.backend.get(NODE_INFO_KEY.as_bytes())? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| StorageError::Corrupt {
                    key: NODE_INFO_KEY.into(),
                    reason: e.to_string(),
                }),
            None => Ok(None),
        }
    }

    /// Last persisted status, `Unknown` when no record exists.
    pub fn status(&self) -> Result<NodeStatus, StorageError> {
        Ok(self.record()?.map(|r| r.status).unwrap_or_default())
    }

    /// Persist a status change and refresh the activity stamp.
    pub fn change_status(&self, status: NodeStatus) -> Result<(), StorageError> {
        let mut record = self.record()?.unwrap_or(NodeRecord {
            node_id: self.node_id.clone(),
            status,
            last_active: 0,
        });
        record.status = status;
        record.last_active = Utc::now().timestamp();
        self.write(record)
    }

    /// Refresh the activity stamp without touching the status.
    pub fn touch(&self) -> Result<(), StorageError> {
        if let Some(mut record) = self.record()? {
            record.last_active = Utc::now().timestamp();
            self.write(record)?;
        }
        Ok(())
    }

    fn write(&self, record: NodeRecord) -> Result<(), StorageError> {
        let json = serde_json::to_vec(&record).map_err(|e| StorageError::Encode(e.to_string()))?;
        self.backend.put(NODE_INFO_KEY.as_bytes(), &json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryBackend;

    fn registry() -> NodeRegistry<MemoryBackend> {
        NodeRegistry::open(Arc::new(MemoryBackend::new()), "validator_1").unwrap()
    }

    #[test]
    fn first_boot_seeds_an_active_record() {
        let registry = registry();
        let record = registry.record().unwrap().unwrap();

        assert_eq!(record.node_id, "validator_1");
        assert_eq!(record.status, NodeStatus::Active);
        assert!(record.last_active > 0);
    }

    #[test]
    fn reopen_keeps_the_existing_record() {
        let backend = Arc::new(MemoryBackend::new());
        let registry = NodeRegistry::open(Arc::clone(&backend), "validator_1").unwrap();
        registry.change_status(NodeStatus::Maintenance).unwrap();

        let reopened = NodeRegistry::open(backend, "validator_1").unwrap();
        assert_eq!(reopened.status().unwrap(), NodeStatus::Maintenance);
    }

    #[test]
    fn status_defaults_to_unknown_without_a_record() {
        let registry = registry();
        registry.backend.delete(NODE_INFO_KEY.as_bytes()).unwrap();

        assert_eq!(registry.status().unwrap(), NodeStatus::Unknown);
    }

    #[test]
    fn change_status_updates_record_and_stamp() {
        let registry = registry();
        let before = registry.record().unwrap().unwrap();

        registry.change_status(NodeStatus::Syncing).unwrap();

        let after = registry.record().unwrap().unwrap();
        assert_eq!(after.status, NodeStatus::Syncing);
        assert!(after.last_active >= before.last_active);
    }

    #[test]
    fn touch_refreshes_only_the_stamp() {
        let registry = registry();
        registry.change_status(NodeStatus::Fork).unwrap();
        registry.touch().unwrap();

        let record = registry.record().unwrap().unwrap();
        assert_eq!(record.status, NodeStatus::Fork);
        assert!(record.last_active > 0);
    }

    #[test]
    fn record_survives_as_plain_json() {
        let registry = registry();
        let bytes = registry.backend.get(NODE_INFO_KEY.as_bytes()).unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(value["nodeId"], "validator_1");
        assert_eq!(value["status"], "active");
        assert!(value["lastActive"].is_i64());
    }
}
