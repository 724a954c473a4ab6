//! Obscura Core Library
//!
//! Provides the account-balance chain state, transaction/block data model,
//! and proof-of-work/difficulty rules the rest of the node depends on
//! (§3, §4.C). Everything outside this crate treats it as the single
//! source of truth for "what is in the chain and what is admissible into
//! it".

use std::time::{SystemTime, UNIX_EPOCH};

pub mod address;
pub mod amount;
pub mod block;
pub mod chain_state;
pub mod config;
pub mod constants;
pub mod difficulty;
pub mod error;
pub mod pow;
pub mod status;
pub mod transaction;

pub use address::PublicAddress;
pub use amount::Amount;
pub use block::{Block, BlockHeader};
pub use chain_state::{BalanceDelta, ChainState, ChainStateView, SharedChainState};
pub use config::Config;
pub use error::{Error, Result};
pub use status::Status;
pub use transaction::Transaction;

pub type Hash = [u8; 32];

/// The distinguished "none" hash (§3): genesis's `previous_hash`, the
/// coinbase sender, and the main-chain `program_id`.
pub const NULL_HASH: Hash = [0u8; 32];

/// Returns the current wall-clock time in milliseconds since the Unix
/// epoch. Every timestamp in this system (transaction, block header,
/// network-time estimate) is milliseconds-based.
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time went backwards")
        .as_millis() as i64
}
