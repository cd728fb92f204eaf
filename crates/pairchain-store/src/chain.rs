//! Append-only hash-linked chain store with secondary indices.
//!
//! Blocks live under `block_height_{h}` as JSON; every mutation also
//! maintains the derived indices so lookups by hash, entity, or
//! type/entity/status stay one key-read away:
//!
//! - `block_hash_{hash}` → height
//! - `index_current_{currentId}` → height of the entity's active block
//! - `index_type_{type}_{currentId}_{status}` → height
//! - `index_history_{currentId}_{height}` → `"1"` (every height the
//!   entity ever touched, consulted to repoint `index_current` on delete)
//! - `block_latest_height` → tip height
//!
//! Indices are a pure function of the block log: replaying `save` over
//! the blocks in height order reproduces them exactly. Multi-key
//! mutations go through one [`Batch`] so readers never observe a block
//! without its indices.

use std::sync::Arc;

use pairchain_core::types::{Block, BlockAnchor, HeaderRaw};

use crate::backend::{BackendHealth, Batch, KeyValueBackend};
use crate::error::StorageError;

/// Key of the tip-height pointer.
pub const LATEST_HEIGHT_KEY: &str = "block_latest_height";

pub fn height_key(height: u64) -> String {
    format!("block_height_{height}")
}

pub fn hash_key(hash: &str) -> String {
    format!("block_hash_{hash}")
}

pub fn current_key(current_id: &str) -> String {
    format!("index_current_{current_id}")
}

pub fn type_key(block_type: &str, current_id: &str, status: &str) -> String {
    format!("index_type_{block_type}_{current_id}_{status}")
}

pub fn history_key(current_id: &str, height: u64) -> String {
    format!("index_history_{current_id}_{height}")
}

/// Chain storage over any [`KeyValueBackend`].
pub struct ChainStore<B> {
    backend: Arc<B>,
}

impl<B> Clone for ChainStore<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
        }
    }
}

impl<B: KeyValueBackend> ChainStore<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    /// Probe the underlying backend.
    pub fn health(&self) -> BackendHealth {
        self.backend.health()
    }

    /// Read a key as UTF-8 text.
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        match self.backend.get(key.as_bytes())? {
            Some(bytes) => String::from_utf8(bytes).map(Some).map_err(|_| StorageError::Corrupt {
                key: key.to_string(),
                reason: "not utf-8".into(),
            }),
            None => Ok(None),
        }
    }

    fn read_block(&self, key: &str) -> Result<Option<Block>, StorageError> {
        match self.read(key)? {
            Some(json) => serde_json::from_str(&json)
                .map(Some)
                .map_err(|e| StorageError::Corrupt {
                    key: key.to_string(),
                    reason: e.to_string(),
                }),
            None => Ok(None),
        }
    }

    fn read_height_pointer(&self, key: &str) -> Result<Option<u64>, StorageError> {
        match self.read(key)? {
            Some(s) => s.trim().parse().map(Some).map_err(|_| StorageError::Corrupt {
                key: key.to_string(),
                reason: format!("not a height: {s:?}"),
            }),
            None => Ok(None),
        }
    }

    /// Tip height, or `None` when the chain is empty or the pointer is
    /// unreadable.
    pub fn latest_height(&self) -> Result<Option<u64>, StorageError> {
        match self.read(LATEST_HEIGHT_KEY)? {
            Some(s) => Ok(s.trim().parse().ok()),
            None => Ok(None),
        }
    }

    pub fn get(&self, height: u64) -> Result<Option<Block>, StorageError> {
        self.read_block(&height_key(height))
    }

    pub fn get_latest(&self) -> Result<Option<Block>, StorageError> {
        match self.latest_height()? {
            Some(height) => self.get(height),
            None => Ok(None),
        }
    }

    pub fn get_by_hash(&self, hash: &str) -> Result<Option<Block>, StorageError> {
        match self.read_height_pointer(&hash_key(hash))? {
            Some(height) => self.get(height),
            None => Ok(None),
        }
    }

    /// The entity's currently-active block, if any.
    pub fn get_by_current_id(&self, current_id: &str) -> Result<Option<Block>, StorageError> {
        match self.read_height_pointer(&current_key(current_id))? {
            Some(height) => self.get(height),
            None => Ok(None),
        }
    }

    pub fn get_by_type_and_id(
        &self,
        block_type: &str,
        current_id: &str,
        status: &str,
    ) -> Result<Option<Block>, StorageError> {
        match self.read_height_pointer(&type_key(block_type, current_id, status))? {
            Some(height) => self.get(height),
            None => Ok(None),
        }
    }

    /// Blocks from `from` to `to` inclusive, stopping at the first
    /// missing height. The result may end before `to`.
    pub fn get_range(&self, from: u64, to: u64) -> Result<Vec<Block>, StorageError> {
        let mut blocks = Vec::new();
        for height in from..=to {
            match self.get(height)? {
                Some(block) => blocks.push(block),
                None => break,
            }
        }
        Ok(blocks)
    }

    /// Append a block. Returns `false` without mutating anything when the
    /// height is already occupied; the block, its indices, and the tip
    /// pointer commit as one batch otherwise.
    pub fn save(&self, block: &Block) -> Result<bool, StorageError> {
        if self.read(&height_key(block.height))?.is_some() {
            return Ok(false);
        }

        let json = serde_json::to_string(block).map_err(|e| StorageError::Encode(e.to_string()))?;
        let height_str = block.height.to_string();

        let mut batch = Batch::new();
        batch.put(height_key(block.height), json);
        batch.put(hash_key(&block.hash), height_str.clone());
        if !block.current_id.is_empty() {
            batch.put(current_key(&block.current_id), height_str.clone());
            batch.put(history_key(&block.current_id, block.height), "1");
        }
        if !block.block_type.is_empty() && !block.current_id.is_empty() {
            batch.put(
                type_key(&block.block_type, &block.current_id, &block.status),
                height_str.clone(),
            );
        }
        batch.put(LATEST_HEIGHT_KEY, height_str);

        self.backend.write_batch(batch)?;
        Ok(true)
    }

    /// Rewrite the stored block with a new status and move its
    /// type-index entry under the new status. Transitioning away from
    /// `active` also drops the entity's `index_current` entry; nothing
    /// repoints it to an older version, the drop/repair flow is expected
    /// to save a replacement right after.
    pub fn update_status(&self, block: &Block, new_status: &str) -> Result<(), StorageError> {
        let mut updated = block.clone();
        updated.status = new_status.to_string();
        let json = serde_json::to_string(&updated).map_err(|e| StorageError::Encode(e.to_string()))?;

        let mut batch = Batch::new();
        batch.put(height_key(block.height), json);
        if !block.block_type.is_empty() && !block.current_id.is_empty() {
            batch.delete(type_key(&block.block_type, &block.current_id, &block.status));
            batch.put(
                type_key(&block.block_type, &block.current_id, new_status),
                block.height.to_string(),
            );
        }
        if block.status == "active" && new_status != "active" && !block.current_id.is_empty() {
            batch.delete(current_key(&block.current_id));
        }

        self.backend.write_batch(batch)
    }

    /// Remove the block at `height` together with its index entries and
    /// step the tip pointer back to `height - 1`.
    ///
    /// Callers delete from the tip downward; deleting an interior height
    /// leaves the chain non-contiguous. Deleting an absent height is a
    /// no-op success.
    pub fn delete_by_height(&self, height: u64) -> Result<(), StorageError> {
        let block = match self.get(height)? {
            Some(block) => block,
            None => return Ok(()),
        };

        let mut batch = Batch::new();
        batch.delete(height_key(height));
        if !block.hash.is_empty() {
            batch.delete(hash_key(&block.hash));
        }
        if !block.current_id.is_empty() {
            // The entity's previous version, if it sat exactly one height
            // below, becomes current again.
            let prior = history_key(&block.current_id, height.saturating_sub(1));
            if height > 0 && self.read(&prior)?.is_some() {
                batch.put(current_key(&block.current_id), (height - 1).to_string());
            } else {
                batch.delete(current_key(&block.current_id));
            }
            batch.delete(history_key(&block.current_id, height));
        }
        if !block.block_type.is_empty() && !block.current_id.is_empty() {
            batch.delete(type_key(&block.block_type, &block.current_id, &block.status));
        }
        batch.put(LATEST_HEIGHT_KEY, height.saturating_sub(1).to_string());

        self.backend.write_batch(batch)
    }

    /// Delete every block above `target`, tip first. The first failed
    /// delete aborts the rollback; a partial rollback is left as-is for
    /// the caller to report.
    pub fn rollback_to_height(&self, target: u64) -> Result<(), StorageError> {
        let latest = match self.latest_height()? {
            Some(height) => height,
            None => return Ok(()),
        };
        if latest <= target {
            return Ok(());
        }
        for height in ((target + 1)..=latest).rev() {
            self.delete_by_height(height)?;
        }
        tracing::info!(from = latest, to = target, "rolled back chain");
        Ok(())
    }

    /// Up to `limit` `(height, hash)` anchors walking from the tip down
    /// to height 0, skipping holes and blocks without a hash.
    pub fn anchors(&self, limit: usize) -> Result<Vec<BlockAnchor>, StorageError> {
        let mut anchors = Vec::new();
        let latest = match self.latest_height()? {
            Some(height) => height,
            None => return Ok(anchors),
        };

        for height in (0..=latest).rev() {
            if anchors.len() >= limit {
                break;
            }
            match self.get(height)? {
                Some(block) if !block.hash.is_empty() => anchors.push(BlockAnchor {
                    height: block.height,
                    hash: block.hash,
                }),
                _ => continue,
            }
        }
        Ok(anchors)
    }

    /// Full contiguous chain from height 1, for the debug dump.
    pub fn all_blocks(&self) -> Result<Vec<Block>, StorageError> {
        match self.latest_height()? {
            Some(latest) => self.get_range(1, latest),
            None => Ok(Vec::new()),
        }
    }

    /// Append a deliberately corrupt block at tip+1: wrong previous
    /// hash, duplicated hash, empty header. Exercises fork detection in
    /// integration setups. Returns `None` when there is no tip to fork.
    pub fn inject_fork_block(&self, creator: &str) -> Result<Option<Block>, StorageError> {
        let latest = match self.get_latest()? {
            Some(block) => block,
            None => return Ok(None),
        };

        let block = Block {
            header_raw: HeaderRaw::default(),
            height: latest.height + 1,
            hash: latest.hash.clone(),
            block_type: "fork_test".into(),
            status: "active".into(),
            previous_hash: latest.previous_hash.clone(),
            current_id: format!("fork_test_{:016x}", rand::random::<u64>()),
            timestamp: latest.timestamp.clone(),
            merkle_root: format!("{:032x}", rand::random::<u128>()),
            creator: Some(creator.to_string()),
            owner_id: latest.owner_id.clone(),
            validator_signature: None,
            version: latest.version.clone(),
        };

        tracing::debug!(height = block.height, "injecting fork-test block");
        if self.save(&block)? {
            Ok(Some(block))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockKeyValueBackend;
    use crate::memory::MemoryBackend;
    use pairchain_core::header::{compute_block_hash, product_header};
    use proptest::prelude::*;

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn store() -> ChainStore<MemoryBackend> {
        ChainStore::new(Arc::new(MemoryBackend::new()))
    }

    fn product_block(height: u64, prev: &str, product_id: &str) -> Block {
        let header = product_header(height, prev, product_id, "owner-1", "1", "product_create", "c0ffee");
        let hash = compute_block_hash(header.as_bytes());
        Block {
            header_raw: HeaderRaw::from_header(header),
            height,
            hash,
            block_type: "product_create".into(),
            status: "active".into(),
            previous_hash: prev.into(),
            current_id: product_id.into(),
            timestamp: Some("1700000000000".into()),
            merkle_root: "c0ffee".into(),
            creator: Some("validator_1".into()),
            owner_id: "owner-1".into(),
            validator_signature: None,
            version: "1".into(),
        }
    }

    /// Save a linked chain of `n` blocks, one product each.
    fn seed_chain(store: &ChainStore<MemoryBackend>, n: u64) -> Vec<Block> {
        let mut prev = "GENESIS".to_string();
        let mut blocks = Vec::new();
        for height in 1..=n {
            let block = product_block(height, &prev, &format!("P{height}"));
            assert!(store.save(&block).unwrap());
            prev = block.hash.clone();
            blocks.push(block);
        }
        blocks
    }

    fn raw(store: &ChainStore<MemoryBackend>, key: &str) -> Option<String> {
        store.read(key).unwrap()
    }

    // ------------------------------------------------------------------
    // Save and lookups
    // ------------------------------------------------------------------

    #[test]
    fn save_then_get_round_trips() {
        let store = store();
        let block = product_block(1, "GENESIS", "P1");
        assert!(store.save(&block).unwrap());

        assert_eq!(store.get(1).unwrap().unwrap(), block);
        assert_eq!(store.latest_height().unwrap(), Some(1));
        assert_eq!(store.get_latest().unwrap().unwrap(), block);
    }

    #[test]
    fn save_rejects_occupied_height() {
        let store = store();
        let first = product_block(1, "GENESIS", "P1");
        let second = product_block(1, "GENESIS", "P2");

        assert!(store.save(&first).unwrap());
        assert!(!store.save(&second).unwrap());

        // No mutation: the original block and its indices survive.
        assert_eq!(store.get(1).unwrap().unwrap(), first);
        assert!(store.get_by_current_id("P2").unwrap().is_none());
    }

    #[test]
    fn save_writes_all_index_families() {
        let store = store();
        let block = product_block(1, "GENESIS", "P1");
        store.save(&block).unwrap();

        assert_eq!(raw(&store, &hash_key(&block.hash)), Some("1".into()));
        assert_eq!(raw(&store, &current_key("P1")), Some("1".into()));
        assert_eq!(
            raw(&store, &type_key("product_create", "P1", "active")),
            Some("1".into())
        );
        assert_eq!(raw(&store, &history_key("P1", 1)), Some("1".into()));
        assert_eq!(raw(&store, LATEST_HEIGHT_KEY), Some("1".into()));
    }

    #[test]
    fn save_skips_entity_indices_without_current_id() {
        let store = store();
        let mut block = product_block(1, "GENESIS", "");
        block.block_type = "user_create".into();
        store.save(&block).unwrap();

        assert_eq!(raw(&store, &current_key("")), None);
        assert_eq!(raw(&store, &type_key("user_create", "", "active")), None);
        assert_eq!(raw(&store, &hash_key(&block.hash)), Some("1".into()));
    }

    #[test]
    fn lookup_by_hash_and_type() {
        let store = store();
        let blocks = seed_chain(&store, 3);

        assert_eq!(store.get_by_hash(&blocks[1].hash).unwrap().unwrap(), blocks[1]);
        assert!(store.get_by_hash("nope").unwrap().is_none());

        let found = store
            .get_by_type_and_id("product_create", "P2", "active")
            .unwrap()
            .unwrap();
        assert_eq!(found, blocks[1]);
        assert!(store
            .get_by_type_and_id("product_create", "P2", "drop")
            .unwrap()
            .is_none());
    }

    #[test]
    fn current_id_points_at_newest_version() {
        let store = store();
        let v1 = product_block(1, "GENESIS", "P1");
        let v2 = product_block(2, &v1.hash, "P1");
        store.save(&v1).unwrap();
        store.save(&v2).unwrap();

        assert_eq!(store.get_by_current_id("P1").unwrap().unwrap().height, 2);
    }

    #[test]
    fn get_range_stops_at_first_gap() {
        let store = store();
        let blocks = seed_chain(&store, 3);
        store.backend.delete(height_key(2).as_bytes()).unwrap();

        let range = store.get_range(1, 3).unwrap();
        assert_eq!(range, vec![blocks[0].clone()]);
    }

    #[test]
    fn latest_height_tolerates_garbage_pointer() {
        let store = store();
        assert_eq!(store.latest_height().unwrap(), None);

        store.backend.put(LATEST_HEIGHT_KEY.as_bytes(), b"abc").unwrap();
        assert_eq!(store.latest_height().unwrap(), None);
    }

    // ------------------------------------------------------------------
    // Status updates
    // ------------------------------------------------------------------

    #[test]
    fn update_status_rewrites_block_and_moves_type_index() {
        let store = store();
        let block = product_block(1, "GENESIS", "P1");
        store.save(&block).unwrap();

        store.update_status(&block, "drop").unwrap();

        assert_eq!(store.get(1).unwrap().unwrap().status, "drop");
        assert_eq!(raw(&store, &type_key("product_create", "P1", "active")), None);
        assert_eq!(
            raw(&store, &type_key("product_create", "P1", "drop")),
            Some("1".into())
        );
    }

    #[test]
    fn leaving_active_drops_current_index_without_fallback() {
        let store = store();
        let v1 = product_block(1, "GENESIS", "P1");
        let v2 = product_block(2, &v1.hash, "P1");
        store.save(&v1).unwrap();
        store.save(&v2).unwrap();

        store.update_status(&v2, "drop").unwrap();

        // The older version is not restored; the entity has no active block.
        assert!(store.get_by_current_id("P1").unwrap().is_none());
    }

    #[test]
    fn non_active_transitions_keep_current_index() {
        let store = store();
        let block = product_block(1, "GENESIS", "P1");
        store.save(&block).unwrap();
        store.update_status(&block, "drop").unwrap();

        let dropped = store.get(1).unwrap().unwrap();
        store.update_status(&dropped, "archived").unwrap();

        assert_eq!(raw(&store, &type_key("product_create", "P1", "archived")), Some("1".into()));
    }

    // ------------------------------------------------------------------
    // Delete and rollback
    // ------------------------------------------------------------------

    #[test]
    fn delete_removes_block_and_indices() {
        let store = store();
        let blocks = seed_chain(&store, 2);

        store.delete_by_height(2).unwrap();

        assert!(store.get(2).unwrap().is_none());
        assert_eq!(raw(&store, &hash_key(&blocks[1].hash)), None);
        assert_eq!(raw(&store, &current_key("P2")), None);
        assert_eq!(raw(&store, &type_key("product_create", "P2", "active")), None);
        assert_eq!(raw(&store, &history_key("P2", 2)), None);
        assert_eq!(store.latest_height().unwrap(), Some(1));
    }

    #[test]
    fn delete_repoints_current_index_to_adjacent_prior_version() {
        let store = store();
        let v1 = product_block(1, "GENESIS", "P1");
        let v2 = product_block(2, &v1.hash, "P1");
        store.save(&v1).unwrap();
        store.save(&v2).unwrap();

        store.delete_by_height(2).unwrap();

        assert_eq!(store.get_by_current_id("P1").unwrap().unwrap().height, 1);
        assert_eq!(raw(&store, &history_key("P1", 1)), Some("1".into()));
    }

    #[test]
    fn delete_drops_current_index_when_prior_version_is_not_adjacent() {
        let store = store();
        let v1 = product_block(1, "GENESIS", "P1");
        let other = product_block(2, &v1.hash, "P9");
        let v2 = product_block(3, &other.hash, "P1");
        store.save(&v1).unwrap();
        store.save(&other).unwrap();
        store.save(&v2).unwrap();

        // History for P1 holds heights 1 and 3; the probe only looks at
        // height 2, so the entity loses its current pointer.
        store.delete_by_height(3).unwrap();
        assert_eq!(raw(&store, &current_key("P1")), None);
    }

    #[test]
    fn delete_of_absent_height_is_a_noop() {
        let store = store();
        seed_chain(&store, 2);
        let before = store.backend.dump();

        store.delete_by_height(9).unwrap();

        assert_eq!(store.backend.dump(), before);
    }

    #[test]
    fn delete_then_resave_converges_to_identical_state() {
        let store = store();
        let blocks = seed_chain(&store, 3);
        let before = store.backend.dump();

        store.delete_by_height(3).unwrap();
        assert!(store.save(&blocks[2]).unwrap());

        assert_eq!(store.backend.dump(), before);
    }

    #[test]
    fn rollback_deletes_descending_to_target() {
        let store = store();
        seed_chain(&store, 8);

        store.rollback_to_height(5).unwrap();

        assert_eq!(store.latest_height().unwrap(), Some(5));
        for height in 6..=8 {
            assert!(store.get(height).unwrap().is_none());
        }
        assert!(store.get(5).unwrap().is_some());
    }

    #[test]
    fn rollback_below_target_is_a_noop() {
        let store = store();
        seed_chain(&store, 3);
        let before = store.backend.dump();

        store.rollback_to_height(3).unwrap();
        store.rollback_to_height(7).unwrap();

        assert_eq!(store.backend.dump(), before);
    }

    #[test]
    fn rollback_propagates_the_first_delete_failure() {
        let block8 = product_block(8, "prev", "P8");
        let json = serde_json::to_vec(&block8).unwrap();

        let mut backend = MockKeyValueBackend::new();
        backend.expect_get().returning(move |key| {
            if key == LATEST_HEIGHT_KEY.as_bytes() {
                Ok(Some(b"8".to_vec()))
            } else if key == height_key(8).as_bytes() {
                Ok(Some(json.clone()))
            } else {
                Ok(None)
            }
        });
        backend
            .expect_write_batch()
            .returning(|_| Err(StorageError::Backend("disk full".into())));

        let store = ChainStore::new(Arc::new(backend));
        let err = store.rollback_to_height(5).unwrap_err();
        assert_eq!(err, StorageError::Backend("disk full".into()));
    }

    #[test]
    fn save_propagates_backend_write_failure() {
        let mut backend = MockKeyValueBackend::new();
        backend.expect_get().returning(|_| Ok(None));
        backend
            .expect_write_batch()
            .returning(|_| Err(StorageError::Backend("io".into())));

        let store = ChainStore::new(Arc::new(backend));
        let err = store.save(&product_block(1, "GENESIS", "P1")).unwrap_err();
        assert_eq!(err, StorageError::Backend("io".into()));
    }

    // ------------------------------------------------------------------
    // Anchors and dumps
    // ------------------------------------------------------------------

    #[test]
    fn anchors_walk_tip_down_with_limit() {
        let store = store();
        let blocks = seed_chain(&store, 6);

        let anchors = store.anchors(4).unwrap();
        assert_eq!(anchors.len(), 4);
        assert_eq!(anchors[0].height, 6);
        assert_eq!(anchors[3].height, 3);
        assert_eq!(anchors[0].hash, blocks[5].hash);
    }

    #[test]
    fn anchors_skip_holes() {
        let store = store();
        seed_chain(&store, 4);
        store.backend.delete(height_key(3).as_bytes()).unwrap();

        let heights: Vec<u64> = store.anchors(10).unwrap().iter().map(|a| a.height).collect();
        assert_eq!(heights, vec![4, 2, 1]);
    }

    #[test]
    fn anchors_of_empty_chain_are_empty() {
        assert!(store().anchors(50).unwrap().is_empty());
    }

    #[test]
    fn all_blocks_dumps_in_height_order() {
        let store = store();
        let blocks = seed_chain(&store, 3);
        assert_eq!(store.all_blocks().unwrap(), blocks);
        assert!(store().all_blocks().unwrap().is_empty());
    }

    // ------------------------------------------------------------------
    // Fork-test injection
    // ------------------------------------------------------------------

    #[test]
    fn inject_fork_block_corrupts_the_tip() {
        let store = store();
        let blocks = seed_chain(&store, 2);
        let tip = &blocks[1];

        let forged = store.inject_fork_block("debug").unwrap().unwrap();

        assert_eq!(forged.height, 3);
        assert_eq!(forged.hash, tip.hash);
        assert_eq!(forged.previous_hash, tip.previous_hash);
        assert_ne!(forged.previous_hash, tip.hash);
        assert!(forged.current_id.starts_with("fork_test_"));
        assert_ne!(forged.recomputed_hash(), forged.hash);

        // It is committed like any other block.
        assert_eq!(store.get(3).unwrap().unwrap(), forged);
        assert_eq!(store.latest_height().unwrap(), Some(3));
    }

    #[test]
    fn inject_fork_block_needs_a_tip() {
        assert!(store().inject_fork_block("debug").unwrap().is_none());
    }

    // ------------------------------------------------------------------
    // Properties
    // ------------------------------------------------------------------

    proptest! {
        /// Deleting the tip and re-saving an equivalent block always
        /// reproduces the exact index state.
        #[test]
        fn index_state_converges_after_delete_and_resave(
            entities in prop::collection::vec(0u8..3, 1..6),
        ) {
            let store = store();
            let mut prev = "GENESIS".to_string();
            let mut blocks = Vec::new();
            for (i, entity) in entities.iter().enumerate() {
                let block = product_block((i + 1) as u64, &prev, &format!("E{entity}"));
                prop_assert!(store.save(&block).unwrap());
                prev = block.hash.clone();
                blocks.push(block);
            }

            let before = store.backend.dump();
            let tip = blocks.last().unwrap();
            store.delete_by_height(tip.height).unwrap();
            prop_assert!(store.save(tip).unwrap());

            prop_assert_eq!(store.backend.dump(), before);
        }
    }
}
