//! Header Chain Tracker (§4.A).
//!
//! One instance per peer: a locally verified copy of that peer's claimed
//! header chain plus its cumulative work. Pure with respect to chain state —
//! it never touches a [`obscura_core::ChainState`] and is only ever driven
//! by the single background thread `HostManager` assigns to that peer (§5),
//! so it carries no internal locking.

use std::collections::VecDeque;
use std::time::Duration;

use obscura_core::constants::{BLOCK_HEADERS_PER_FETCH, TIMEOUT_BLOCKHEADERS_MS, TIMEOUT_MS};
use obscura_core::difficulty;
use obscura_core::pow::{self, PowVariant};
use obscura_core::{now_ms, BlockHeader, Hash, NULL_HASH};

use crate::client::PeerClient;
use crate::error::NetworkError;

/// Allowed drift, in milliseconds, between a header's declared timestamp
/// and local wall-clock time before it is rejected as out of window. Mirrors
/// `obscura_core::constants::MAX_TX_TIMESTAMP_DRIFT_MS`'s convention for the
/// same class of check applied to headers instead of transactions.
const MAX_HEADER_TIMESTAMP_DRIFT_MS: i64 = 2 * 60 * 60 * 1000;

fn header_hash(header: &BlockHeader) -> Hash {
    let variant = PowVariant::for_height(header.id);
    let encoded = bincode::serialize(header).expect("header serialize");
    pow::pow_hash(&encoded, variant)
}

pub struct HeaderChainTracker {
    peer_url: String,
    headers: Vec<BlockHeader>,
    /// `(timestamp_ms, difficulty_target)` for the current lookback window,
    /// mirroring `ChainState::recent_headers` so the same derivation rule
    /// (`obscura_core::difficulty::next_difficulty`) applies to both.
    recent_for_difficulty: VecDeque<(i64, u8)>,
    cumulative_work: u128,
    last_refresh_ms: i64,
    genesis_difficulty: u8,
    max_reorg_depth: u64,
}

impl HeaderChainTracker {
    pub fn new(peer_url: impl Into<String>, genesis_difficulty: u8, max_reorg_depth: u64) -> Self {
        HeaderChainTracker {
            peer_url: peer_url.into(),
            headers: Vec::new(),
            recent_for_difficulty: VecDeque::new(),
            cumulative_work: 0,
            last_refresh_ms: 0,
            genesis_difficulty,
            max_reorg_depth,
        }
    }

    /// `(height, cumulative_work, tip_hash, last_refresh_ms)` (§4.A).
    pub fn tip(&self) -> (u64, u128, Hash, i64) {
        let tip_hash = self.headers.last().map(header_hash).unwrap_or(NULL_HASH);
        (self.headers.len() as u64, self.cumulative_work, tip_hash, self.last_refresh_ms)
    }

    pub fn peer_url(&self) -> &str {
        &self.peer_url
    }

    /// Fetches the peer's claimed block count; if unchanged, no-ops. If
    /// greater, pulls headers in batches of at most `BLOCK_HEADERS_PER_FETCH`
    /// and validates/appends each batch, handling a fork via bisection.
    pub fn refresh(&mut self, client: &dyn PeerClient) -> Result<(), NetworkError> {
        let claimed_count = client.block_count(&self.peer_url, Duration::from_millis(TIMEOUT_MS))?;
        let local_count = self.headers.len() as u64;
        if claimed_count <= local_count {
            self.last_refresh_ms = now_ms();
            return Ok(());
        }

        let mut start = local_count + 1;
        while start <= claimed_count {
            let end = (start + BLOCK_HEADERS_PER_FETCH - 1).min(claimed_count);
            let batch = client.block_headers(
                &self.peer_url,
                start,
                end,
                Duration::from_millis(TIMEOUT_BLOCKHEADERS_MS),
            )?;
            self.ingest_batch(batch, client)?;
            start = self.headers.len() as u64 + 1;
        }
        self.last_refresh_ms = now_ms();
        Ok(())
    }

    fn ingest_batch(
        &mut self,
        batch: Vec<BlockHeader>,
        client: &dyn PeerClient,
    ) -> Result<(), NetworkError> {
        if batch.is_empty() {
            return Ok(());
        }

        let expected_previous = self.headers.last().map(header_hash).unwrap_or(NULL_HASH);
        if batch[0].previous_hash != expected_previous && !self.headers.is_empty() {
            self.resolve_fork(&batch[0], client)?;
            // `batch` was fetched against the pre-fork tip and no longer
            // starts at the right height; the outer `refresh` loop
            // re-requests from the newly truncated tip on its next pass.
            return Ok(());
        }

        for header in &batch {
            self.validate_and_append(header)?;
        }
        Ok(())
    }

    /// Walks backward by bisection over the locally stored headers,
    /// re-requesting single headers from the peer until a common ancestor
    /// is found, then truncates local state to that height (§4.A).
    fn resolve_fork(&mut self, new_head: &BlockHeader, client: &dyn PeerClient) -> Result<(), NetworkError> {
        let mut lo: u64 = 0; // known-divergent lower bound (0 = genesis's predecessor)
        let mut hi: u64 = self.headers.len() as u64; // known-common upper bound? refined below

        // `hi` starts as "definitely not yet confirmed common"; narrow by
        // bisection until lo/hi converge on the highest common height.
        while hi - lo > 1 {
            let mid = lo + (hi - lo) / 2;
            if mid == 0 {
                break;
            }
            let local = &self.headers[(mid - 1) as usize];
            let remote = client.block_headers(&self.peer_url, mid, mid, Duration::from_millis(TIMEOUT_BLOCKHEADERS_MS))?;
            match remote.first() {
                Some(remote_header) if header_hash(remote_header) == header_hash(local) => lo = mid,
                _ => hi = mid,
            }
        }

        let common_height = lo;
        let reorg_depth = self.headers.len() as u64 - common_height;
        if reorg_depth > self.max_reorg_depth {
            return Err(NetworkError::PeerInvalid(
                self.peer_url.clone(),
                format!("reorg depth {reorg_depth} exceeds limit {}", self.max_reorg_depth),
            ));
        }

        self.headers.truncate(common_height as usize);
        self.recompute_work_and_window();
        let _ = new_head;
        Ok(())
    }

    fn validate_and_append(&mut self, header: &BlockHeader) -> Result<(), NetworkError> {
        let expected_previous = self.headers.last().map(header_hash).unwrap_or(NULL_HASH);
        if header.previous_hash != expected_previous {
            return Err(NetworkError::PeerInvalid(
                self.peer_url.clone(),
                "broken header linkage".into(),
            ));
        }

        let hash = header_hash(header);
        if !pow::hash_meets_difficulty(&hash, header.difficulty_target) {
            return Err(NetworkError::PeerInvalid(self.peer_url.clone(), "invalid pow".into()));
        }

        let expected_difficulty =
            difficulty::next_difficulty(&self.recent_for_difficulty, header.id, self.genesis_difficulty);
        if header.id != 1 && header.difficulty_target != expected_difficulty {
            return Err(NetworkError::PeerInvalid(
                self.peer_url.clone(),
                format!(
                    "declared difficulty {} does not match derived {}",
                    header.difficulty_target, expected_difficulty
                ),
            ));
        }

        let now = now_ms();
        if (header.timestamp - now).abs() > MAX_HEADER_TIMESTAMP_DRIFT_MS {
            return Err(NetworkError::PeerInvalid(
                self.peer_url.clone(),
                "header timestamp outside allowed window".into(),
            ));
        }

        self.cumulative_work += 1u128 << header.difficulty_target;
        self.recent_for_difficulty.push_back((header.timestamp, header.difficulty_target));
        const LOOKBACK_WINDOW: usize = obscura_core::constants::DIFFICULTY_LOOKBACK as usize + 1;
        while self.recent_for_difficulty.len() > LOOKBACK_WINDOW {
            self.recent_for_difficulty.pop_front();
        }
        self.headers.push(header.clone());
        Ok(())
    }

    fn recompute_work_and_window(&mut self) {
        self.cumulative_work = self.headers.iter().map(|h| 1u128 << h.difficulty_target).sum();
        self.recent_for_difficulty.clear();
        let lookback = obscura_core::constants::DIFFICULTY_LOOKBACK as usize + 1;
        let start = self.headers.len().saturating_sub(lookback);
        for h in &self.headers[start..] {
            self.recent_for_difficulty.push_back((h.timestamp, h.difficulty_target));
        }
    }
}
