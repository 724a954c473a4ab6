//! Consensus constants shared by every crate in the workspace.
//!
//! These mirror the fixed constants a real deployment would never want to
//! make runtime-configurable: protocol version, timeouts, and the
//! difficulty-adjustment schedule. Per-node tunables (bootstrap peers,
//! checkpoints, network name, ...) live in [`crate::config::Config`]
//! instead.

/// Relates an [`crate::Amount`] to a human-readable decimal. No floating
/// point appears anywhere on a consensus path; this is for display only.
pub const DECIMAL_SCALE_FACTOR: u64 = 10_000;

pub const TIMEOUT_MS: u64 = 5_000;
pub const TIMEOUT_BLOCK_MS: u64 = 30_000;
pub const TIMEOUT_BLOCKHEADERS_MS: u64 = 60_000;
pub const TIMEOUT_SUBMIT_MS: u64 = 30_000;

pub const BLOCKS_PER_FETCH: u64 = 200;
pub const BLOCK_HEADERS_PER_FETCH: u64 = 2_000;

pub const BUILD_VERSION: &str = "0.6.6-beta";

pub const MAX_TRANSACTIONS_PER_BLOCK: usize = 25_000;
pub const PUFFERFISH_START_BLOCK: u64 = 124_500;

pub const DIFFICULTY_LOOKBACK: u64 = 100;
pub const DESIRED_BLOCK_TIME_SEC: u64 = 90;
pub const MIN_DIFFICULTY: u8 = 6;
pub const MAX_DIFFICULTY: u8 = 255;

pub const MIN_FEE_TO_ENTER_MEMPOOL: u64 = 1;
pub const TX_BRANCH_FACTOR: usize = 10;

/// Maximum allowed drift, in milliseconds, between a transaction's declared
/// `timestamp` and the mempool's network-time estimate before admission
/// rejects it as expired or too far in the future (§4.D, §4.B). The
/// specification names this check without fixing a number; two hours
/// mirrors the convention used throughout the retrieved corpus for
/// future-timestamp rejection. This is an admission-time check only — it
/// never applies to a transaction already being applied as part of a
/// synced block, since a block's history is expected to be old.
pub const MAX_TX_TIMESTAMP_DRIFT_MS: i64 = 2 * 60 * 60 * 1000;

