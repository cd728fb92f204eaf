//! Protocol constants for the pairing ledger.
//!
//! Timing values govern the reconciliation loop; string sentinels are part
//! of the wire and storage contract shared with the coordinator and must
//! not change.

/// Previous-hash sentinel for the first block in the chain.
pub const GENESIS_PREV_HASH: &str = "GENESIS";

/// Merkle root recorded when a block commits to no leaves.
pub const EMPTY_MERKLE_ROOT: &str = "0";

/// Heights are 1-based; 0 means "no blocks yet" in sync requests.
pub const FIRST_BLOCK_HEIGHT: u64 = 1;

/// Block version stamped by this implementation.
pub const BLOCK_VERSION: &str = "1.0";

/// Block type recorded when a product is first paired.
pub const BLOCK_TYPE_PRODUCT_CREATE: &str = "product_create";

/// Status of the live head of an entity's history.
pub const STATUS_ACTIVE: &str = "active";

/// Status of a superseded block.
pub const STATUS_DROP: &str = "drop";

/// Node class announced to the coordinator during the handshake.
pub const NODE_TYPE_CLIENT: &str = "client_node";

/// RSA modulus size for validator identity keys.
pub const RSA_KEY_BITS: usize = 2048;

/// Reconciliation tick period.
pub const TICK_INTERVAL_SECS: u64 = 15;

/// Blocks requested per sync page.
pub const SYNC_PAGE_SIZE: u64 = 20;

/// Blocks read per range scan during a maintenance audit.
pub const MAINTENANCE_BATCH: u64 = 1000;

/// Maximum `(height, hash)` anchors included in a fork report.
pub const MAX_FORK_ANCHORS: usize = 50;

/// Minimum gap between consecutive sync attempts.
pub const SYNC_MIN_GAP_SECS: i64 = 10;

/// An unanswered sync request is abandoned after this long.
pub const SYNC_INFLIGHT_TIMEOUT_SECS: i64 = 10;

/// Consecutive failed sync attempts tolerated before cooling down.
pub const SYNC_MAX_RETRIES: u32 = 500;

/// Cooldown entered once the retry budget is exhausted.
pub const SYNC_COOLDOWN_SECS: i64 = 30 * 60;

/// Base delay between coordinator reconnect attempts.
pub const RECONNECT_DELAY_SECS: u64 = 3;
