//! The difficulty-recomputation rule (§4.C), factored out as a pure function
//! so that both [`crate::chain_state::ChainState`] (recomputing the next
//! difficulty for the node's own tip) and `obscura-network`'s header-chain
//! verification (checking that a peer's claimed chain declares the
//! difficulty this same rule would have derived) apply identical logic.

use std::collections::VecDeque;

use crate::constants::{DESIRED_BLOCK_TIME_SEC, DIFFICULTY_LOOKBACK, MAX_DIFFICULTY, MIN_DIFFICULTY};

/// Computes the difficulty the block at `height` (1-based, about to be
/// appended) must declare.
///
/// `recent_headers` holds `(timestamp_ms, difficulty_target)` for every
/// already-accepted header back to the start of the current lookback
/// window, oldest first, capped at `DIFFICULTY_LOOKBACK + 1` entries.
/// `genesis_difficulty` is returned verbatim before any header exists.
pub fn next_difficulty(
    recent_headers: &VecDeque<(i64, u8)>,
    height: u64,
    genesis_difficulty: u8,
) -> u8 {
    let Some(&(_, current)) = recent_headers.back() else {
        return genesis_difficulty;
    };

    if height % DIFFICULTY_LOOKBACK != 0 || recent_headers.len() < 2 {
        return current;
    }

    let first_ts = recent_headers.front().unwrap().0;
    let last_ts = recent_headers.back().unwrap().0;
    let span_blocks = (recent_headers.len() - 1) as i64;
    let actual_avg_ms = (last_ts - first_ts).max(1) / span_blocks.max(1);
    let desired_ms = (DESIRED_BLOCK_TIME_SEC * 1000) as i64;

    let adjusted = if actual_avg_ms < desired_ms / 2 {
        current.saturating_add(1)
    } else if actual_avg_ms > desired_ms * 2 {
        current.saturating_sub(1)
    } else {
        current
    };
    adjusted.clamp(MIN_DIFFICULTY, MAX_DIFFICULTY)
}
