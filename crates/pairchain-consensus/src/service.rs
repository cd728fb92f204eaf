//! Vote verification and block construction.
//!
//! The coordinator drives all mutations; this service answers them. A
//! vote request carries a client hash signed by the requesting user:
//! the node checks that signature, optionally checks the hash against
//! the chain, and countersigns with its own key. Pairing requests
//! append a new block at the tip, signed by the node over the full
//! serialized block with the signature slot still null.
//!
//! Refusal strings (`"Invalid user signature"`, `"Block not found"`,
//! `"Block hash mismatch"`, `"Invalid product_id"`) are read by the
//! coordinator and must stay stable.

use pairchain_core::constants::{
    BLOCK_TYPE_PRODUCT_CREATE, FIRST_BLOCK_HEIGHT, GENESIS_PREV_HASH, STATUS_ACTIVE, STATUS_DROP,
};
use pairchain_core::crypto::{verify_signature, NodeSigner};
use pairchain_core::header::{compute_block_hash, product_header, user_header};
use pairchain_core::types::{Block, HeaderRaw};
use pairchain_store::backend::KeyValueBackend;
use pairchain_store::chain::ChainStore;
use serde_json::json;
use tracing::info;

use crate::dto::{
    ApiResponse, DropVoteItem, DropVoteRequest, DropVoteResult, PairProductPayload,
    PairUserPayload, RepairPayload, VoteOutcome, VotePayload,
};

pub struct ConsensusService<B> {
    chain: ChainStore<B>,
    signer: NodeSigner,
    node_id: String,
}

impl<B: KeyValueBackend> ConsensusService<B> {
    pub fn new(chain: ChainStore<B>, signer: NodeSigner, node_id: impl Into<String>) -> Self {
        Self {
            chain,
            signer,
            node_id: node_id.into(),
        }
    }

    /// First-round vote: only the user signature is checked, the block
    /// does not exist yet.
    pub fn first_vote(&self, payload: &VotePayload) -> VoteOutcome {
        match self.verify_user(payload) {
            Ok(()) => self.countersign(&payload.client_hash),
            Err(outcome) => outcome,
        }
    }

    /// Repeat vote: the signature must check out and the referenced
    /// block must exist with exactly the claimed hash.
    pub fn vote(&self, payload: &VotePayload) -> VoteOutcome {
        if let Err(outcome) = self.verify_user(payload) {
            return outcome;
        }

        let block = match self.chain.get_by_type_and_id(
            &payload.block_type,
            &payload.current_id,
            &payload.status,
        ) {
            Ok(Some(block)) => block,
            Ok(None) => return VoteOutcome::rejected(&payload.client_hash, "Block not found"),
            Err(e) => return VoteOutcome::rejected(&payload.client_hash, e.to_string()),
        };

        if block.hash != payload.client_hash {
            return VoteOutcome::rejected(&payload.client_hash, "Block hash mismatch");
        }

        self.countersign(&payload.client_hash)
    }

    fn verify_user(&self, payload: &VotePayload) -> Result<(), VoteOutcome> {
        match verify_signature(
            &payload.public_key,
            payload.client_hash.as_bytes(),
            &payload.signature,
        ) {
            Ok(true) => Ok(()),
            Ok(false) => Err(VoteOutcome::rejected(
                &payload.client_hash,
                "Invalid user signature",
            )),
            Err(e) => Err(VoteOutcome::rejected(&payload.client_hash, e.to_string())),
        }
    }

    fn countersign(&self, client_hash: &str) -> VoteOutcome {
        match self.signer.sign(client_hash.as_bytes()) {
            Ok(signature) => VoteOutcome {
                payload: client_hash.to_string(),
                signature,
                error: String::new(),
                ok: true,
            },
            Err(e) => VoteOutcome::rejected(client_hash, e.to_string()),
        }
    }

    /// One verdict per requested product, in request order. A product
    /// is approved for dropping only when its active creation block
    /// exists and its stored hash matches a fresh recompute of the
    /// header; a mismatch reports the recomputed hash as the reason.
    pub fn batch_drop_vote(&self, request: &DropVoteRequest) -> Vec<DropVoteResult> {
        request
            .products
            .iter()
            .map(|item| self.drop_vote(item))
            .collect()
    }

    fn drop_vote(&self, item: &DropVoteItem) -> DropVoteResult {
        let refuse = |reason: String| DropVoteResult {
            product_id: item.product_id.clone(),
            approve: false,
            reason: Some(reason),
        };

        if item.product_id.is_empty() {
            return refuse("Invalid product_id".into());
        }

        let block = match self.chain.get_by_type_and_id(
            BLOCK_TYPE_PRODUCT_CREATE,
            &item.product_id,
            STATUS_ACTIVE,
        ) {
            Ok(Some(block)) => block,
            Ok(None) => return refuse("Block not found".into()),
            Err(e) => return refuse(e.to_string()),
        };

        let recomputed = block.recomputed_hash();
        if recomputed != block.hash {
            return refuse(recomputed);
        }

        DropVoteResult {
            product_id: item.product_id.clone(),
            approve: true,
            reason: None,
        }
    }

    /// Append a user-pairing block at the tip.
    pub fn pair_user(&self, dto: Option<PairUserPayload>) -> ApiResponse {
        let Some(dto) = dto else {
            return ApiResponse::error(203, "Missing dto!");
        };
        self.try_pair_user(&dto)
            .unwrap_or_else(ApiResponse::internal_error)
    }

    fn try_pair_user(&self, dto: &PairUserPayload) -> Result<ApiResponse, String> {
        let (height, previous) = self.next_slot()?;
        let mut block = build_user_block(dto, height, &previous, &self.node_id);
        block.validator_signature = Some(self.sign_block(&block)?);
        self.commit(&block)?;

        info!(height, hash = %block.hash, "user block created");
        Ok(ApiResponse::ok(
            "Pair user block created",
            json!({
                "block_hash": block.hash,
                "ok": true,
                "type": "user",
                "height": block.height,
                "previous": block.previous_hash,
                "validator": self.node_id,
            }),
        ))
    }

    /// Append a product-pairing block at the tip.
    pub fn pair_product(&self, dto: Option<PairProductPayload>) -> ApiResponse {
        let Some(dto) = dto else {
            return ApiResponse::error(203, "Missing dto!");
        };
        self.try_pair_product(&dto)
            .unwrap_or_else(ApiResponse::internal_error)
    }

    fn try_pair_product(&self, dto: &PairProductPayload) -> Result<ApiResponse, String> {
        let (height, previous) = self.next_slot()?;
        let mut block = build_product_block(dto, height, &previous, &self.node_id);
        block.validator_signature = Some(self.sign_block(&block)?);
        self.commit(&block)?;

        info!(height, hash = %block.hash, "product block created");
        Ok(ApiResponse::ok(
            "Pair product block created",
            json!({
                "block_hash": block.hash,
                "height": block.height,
                "previous": block.previous_hash,
                "type": "client",
                "validator": self.node_id,
            }),
        ))
    }

    /// Replace a product's active block: the old block is re-marked
    /// `drop` and a successor carrying the old header line verbatim is
    /// appended at the tip.
    pub fn repair_product(&self, dto: Option<RepairPayload>) -> ApiResponse {
        let Some(dto) = dto else {
            return ApiResponse::error(203, "Missing dto!");
        };
        self.try_repair_product(&dto)
            .unwrap_or_else(ApiResponse::internal_error)
    }

    fn try_repair_product(&self, dto: &RepairPayload) -> Result<ApiResponse, String> {
        let current = self
            .chain
            .get_by_type_and_id(BLOCK_TYPE_PRODUCT_CREATE, &dto.payload.item_id, STATUS_ACTIVE)
            .map_err(|e| e.to_string())?;
        let Some(current) = current else {
            return Ok(ApiResponse::error(
                203,
                format!("Missing block in! {}", self.node_id),
            ));
        };

        let (height, previous) = self.next_slot()?;
        let mut block = build_repair_block(&current, dto, height, &previous, &self.node_id);
        block.validator_signature = Some(self.sign_block(&block)?);

        self.chain
            .update_status(&current, STATUS_DROP)
            .map_err(|e| e.to_string())?;
        self.commit(&block)?;

        info!(height, item = %dto.payload.item_id, "product block repaired");
        Ok(ApiResponse::ok(
            "Product block repaired",
            json!({
                "block_hash": block.hash,
                "height": block.height,
                "block_status": block.status,
                "previous": block.previous_hash,
                "validator": self.node_id,
            }),
        ))
    }

    /// Height and previous hash for the next block; an empty chain
    /// starts at height 1 on the genesis sentinel.
    fn next_slot(&self) -> Result<(u64, String), String> {
        match self.chain.get_latest().map_err(|e| e.to_string())? {
            Some(latest) => Ok((latest.height + 1, latest.hash)),
            None => Ok((FIRST_BLOCK_HEIGHT, GENESIS_PREV_HASH.to_string())),
        }
    }

    /// Node signature over the serialized block, signature slot null.
    fn sign_block(&self, block: &Block) -> Result<String, String> {
        let json = serde_json::to_string(block).map_err(|e| e.to_string())?;
        self.signer.sign(json.as_bytes()).map_err(|e| e.to_string())
    }

    fn commit(&self, block: &Block) -> Result<(), String> {
        match self.chain.save(block) {
            Ok(true) => Ok(()),
            Ok(false) => Err("block save failed".into()),
            Err(e) => Err(e.to_string()),
        }
    }
}

fn build_user_block(dto: &PairUserPayload, height: u64, previous: &str, node_id: &str) -> Block {
    let user = &dto.user;
    let header = user_header(height, previous, &user.id, &user.version, &user.user_type, &user.hash);
    let hash = compute_block_hash(header.as_bytes());

    Block {
        header_raw: HeaderRaw::from_header(header),
        height,
        hash,
        block_type: user.user_type.clone(),
        status: STATUS_ACTIVE.into(),
        previous_hash: previous.to_string(),
        current_id: String::new(),
        timestamp: Some(dto.timestamp.clone()),
        merkle_root: user.hash.clone(),
        creator: Some(node_id.to_string()),
        owner_id: user.id.clone(),
        validator_signature: None,
        version: user.version.clone(),
    }
}

fn build_product_block(
    dto: &PairProductPayload,
    height: u64,
    previous: &str,
    node_id: &str,
) -> Block {
    let product = &dto.payload;
    let header = product_header(
        height,
        previous,
        &product.product_id,
        &product.owner_id,
        &product.version,
        &product.product_type,
        &product.hash,
    );
    let hash = compute_block_hash(header.as_bytes());

    Block {
        header_raw: HeaderRaw::from_header(header),
        height,
        hash,
        block_type: product.product_type.clone(),
        status: STATUS_ACTIVE.into(),
        previous_hash: previous.to_string(),
        current_id: product.product_id.clone(),
        timestamp: Some(dto.timestamp.clone()),
        merkle_root: product.hash.clone(),
        creator: Some(node_id.to_string()),
        owner_id: product.owner_id.clone(),
        validator_signature: None,
        version: product.version.clone(),
    }
}

/// The replacement reuses the superseded block's header line untouched,
/// so its hash is the recompute of that line, not a hash of the new
/// content. Chains repaired this way carry the duplicate hash on
/// purpose; the coordinator reconciles on header lines.
fn build_repair_block(
    current: &Block,
    dto: &RepairPayload,
    height: u64,
    previous: &str,
    node_id: &str,
) -> Block {
    let payload = &dto.payload;

    Block {
        header_raw: current.header_raw.clone(),
        height,
        hash: current.recomputed_hash(),
        block_type: BLOCK_TYPE_PRODUCT_CREATE.into(),
        status: STATUS_ACTIVE.into(),
        previous_hash: previous.to_string(),
        current_id: payload.item_id.clone(),
        timestamp: Some(dto.timestamp.clone()),
        merkle_root: payload.hash.clone(),
        creator: Some(node_id.to_string()),
        owner_id: payload.owner_id.clone(),
        validator_signature: None,
        version: payload.version.clone(),
    }
}
