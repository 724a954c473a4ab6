//! Host Manager (§4.B): peer discovery, liveness, sampling, blacklist, and
//! the network-time estimate.
//!
//! The manager guards its mutable collections with a single [`Mutex`] held
//! only for the insert/lookup (§5): every worker copies out what it needs
//! under the lock, then performs network I/O against the copy with the lock
//! released.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use log::{debug, info, warn};
use rand::seq::SliceRandom;

use obscura_core::constants::TIMEOUT_MS;
use obscura_core::{now_ms, Hash};

use crate::client::PeerClient;
use crate::error::NetworkError;
use crate::header_chain::HeaderChainTracker;

/// Cadence for the slow host-list (bootstrap) refresh worker.
pub const HOST_LIST_REFRESH_INTERVAL: Duration = Duration::from_secs(60);
/// Cadence for the per-peer ping + header-chain refresh worker.
pub const PING_INTERVAL: Duration = Duration::from_secs(5);
/// Consecutive handshake failures before a peer is dropped (not blacklisted).
const MAX_CONSECUTIVE_FAILURES: u32 = 5;

#[derive(Debug, Clone)]
pub struct HostEntry {
    pub url: String,
    pub last_seen_ms: i64,
    pub clock_delta_ms: i64,
    pub claimed_version: String,
    pub claimed_network: String,
    pub failures: u32,
}

/// A configured checkpoint: a peer whose claimed chain disagrees with the
/// hash at this height is blacklisted (§4.B).
#[derive(Debug, Clone)]
pub struct Checkpoint {
    pub height: u64,
    pub hash: Hash,
}

#[derive(Debug, Clone, Default)]
pub struct HostManagerConfig {
    pub bootstrap_urls: Vec<String>,
    pub min_host_version: String,
    pub checkpoints: Vec<Checkpoint>,
    /// height -> hashes a block is never allowed to have at that height.
    pub banned_hashes: HashMap<u64, HashSet<Hash>>,
    /// If non-empty, only these peer URLs are ever contacted (§4.B).
    pub whitelist: HashSet<String>,
    pub genesis_difficulty: u8,
    pub max_reorg_depth: u64,
}

struct Inner {
    hosts: HashMap<String, HostEntry>,
    header_chains: HashMap<String, HeaderChainTracker>,
    blacklist: HashSet<String>,
    round_robin_cursor: usize,
}

/// The narrow network-time surface other crates (the mempool's admission
/// path, §4.D/§4.B) depend on, so they can be driven in tests without the
/// rest of `HostManager`'s peer bookkeeping.
pub trait NetworkTimeSource: Send + Sync {
    fn network_timestamp(&self) -> i64;
}

pub struct HostManager {
    client: Arc<dyn PeerClient>,
    config: HostManagerConfig,
    inner: Mutex<Inner>,
}

impl HostManager {
    pub fn new(client: Arc<dyn PeerClient>, config: HostManagerConfig) -> Self {
        HostManager {
            client,
            config,
            inner: Mutex::new(Inner {
                hosts: HashMap::new(),
                header_chains: HashMap::new(),
                blacklist: HashSet::new(),
                round_robin_cursor: 0,
            }),
        }
    }

    /// The underlying peer wire client, exposed so other crates (e.g. the
    /// mempool's gossip worker) can drive peers directly using the same
    /// peers `HostManager` already knows about.
    pub fn client(&self) -> Arc<dyn PeerClient> {
        Arc::clone(&self.client)
    }

    fn is_allowed(&self, url: &str) -> bool {
        if self.config.whitelist.is_empty() {
            true
        } else {
            self.config.whitelist.contains(url)
        }
    }

    fn is_blacklisted(&self, url: &str) -> bool {
        self.inner.lock().unwrap().blacklist.contains(url)
    }

    /// Permanently (for this process) blacklists `url` (§4.B, §7: consensus
    /// violations by a peer). Removes any tracked state for it.
    pub fn blacklist(&self, url: &str, reason: &str) {
        warn!("blacklisting peer {url}: {reason}");
        let mut inner = self.inner.lock().unwrap();
        inner.blacklist.insert(url.to_string());
        inner.hosts.remove(url);
        inner.header_chains.remove(url);
    }

    /// Fetches peer lists from the configured bootstrap URLs and merges new
    /// candidates (minus the blacklist) into the pinged set.
    pub fn discover_peers(&self) {
        let bootstrap: Vec<String> = self.config.bootstrap_urls.clone();
        let mut candidates = HashSet::new();
        for url in &bootstrap {
            if !self.is_allowed(url) || self.is_blacklisted(url) {
                continue;
            }
            match self.client.peers(url, Duration::from_millis(TIMEOUT_MS)) {
                Ok(peers) => candidates.extend(peers),
                Err(e) => debug!("peer-list fetch from {url} failed: {e}"),
            }
            candidates.insert(url.clone());
        }
        candidates.retain(|u| self.is_allowed(u) && !self.is_blacklisted(u));
        for url in candidates {
            self.ping(&url);
        }
    }

    /// Sends a handshake to `url`; on success inserts/refreshes the entry,
    /// on failure increments its failure counter and drops it past the
    /// threshold (§4.B — a drop, not a blacklist).
    pub fn ping(&self, url: &str) {
        if !self.is_allowed(url) || self.is_blacklisted(url) {
            return;
        }
        let local_time = now_ms();
        match self.client.handshake(url, Duration::from_millis(TIMEOUT_MS)) {
            Ok(resp) => {
                if !self.config.min_host_version.is_empty()
                    && resp.version.as_str() < self.config.min_host_version.as_str()
                {
                    debug!("peer {url} below min host version, ignoring");
                    return;
                }
                let mut inner = self.inner.lock().unwrap();
                let entry = inner.hosts.entry(url.to_string()).or_insert_with(|| HostEntry {
                    url: url.to_string(),
                    last_seen_ms: 0,
                    clock_delta_ms: 0,
                    claimed_version: resp.version.clone(),
                    claimed_network: resp.network_name.clone(),
                    failures: 0,
                });
                entry.last_seen_ms = local_time;
                entry.clock_delta_ms = resp.time_ms - local_time;
                entry.claimed_version = resp.version;
                entry.claimed_network = resp.network_name;
                entry.failures = 0;
                inner
                    .header_chains
                    .entry(url.to_string())
                    .or_insert_with(|| {
                        HeaderChainTracker::new(url, self.config.genesis_difficulty, self.config.max_reorg_depth)
                    });
            }
            Err(e) => {
                debug!("handshake with {url} failed: {e}");
                let mut inner = self.inner.lock().unwrap();
                if let Some(entry) = inner.hosts.get_mut(url) {
                    entry.failures += 1;
                    if entry.failures >= MAX_CONSECUTIVE_FAILURES {
                        inner.hosts.remove(url);
                        inner.header_chains.remove(url);
                        info!("dropped peer {url} after {MAX_CONSECUTIVE_FAILURES} consecutive failures");
                    }
                }
            }
        }
    }

    /// Refreshes every peer's header chain, blacklisting on any consensus
    /// violation (bad pow, broken linkage, checkpoint disagreement, banned
    /// hash) and enforcing policy against the result (§4.B).
    pub fn refresh_header_chains(&self) {
        let urls: Vec<String> = self.inner.lock().unwrap().hosts.keys().cloned().collect();
        for url in urls {
            let mut tracker = {
                let mut inner = self.inner.lock().unwrap();
                match inner.header_chains.remove(&url) {
                    Some(t) => t,
                    None => continue,
                }
            };

            let result = tracker.refresh(self.client.as_ref());
            match result {
                Ok(()) => {
                    if let Err(reason) = self.enforce_policy(&tracker) {
                        self.blacklist(&url, &reason);
                        continue;
                    }
                    self.inner.lock().unwrap().header_chains.insert(url, tracker);
                }
                Err(e) if e.is_transient() => {
                    debug!("header refresh for {url} failed transiently: {e}");
                    self.inner.lock().unwrap().header_chains.insert(url, tracker);
                }
                Err(e) => {
                    self.blacklist(&url, &e.to_string());
                }
            }
        }
    }

    /// Checks a peer's freshly refreshed chain against checkpoints and
    /// banned hashes (§4.B). The tracker only exposes the tip, so this is a
    /// best-effort check against the tip height/hash; full per-height
    /// enforcement happens when the block pipeline actually downloads and
    /// verifies blocks (§4.E).
    fn enforce_policy(&self, tracker: &HeaderChainTracker) -> Result<(), String> {
        let (height, _, tip_hash, _) = tracker.tip();
        for checkpoint in &self.config.checkpoints {
            if checkpoint.height == height && checkpoint.hash != tip_hash {
                return Err(format!("disagrees with checkpoint at height {}", checkpoint.height));
            }
        }
        if let Some(banned) = self.config.banned_hashes.get(&height) {
            if banned.contains(&tip_hash) {
                return Err(format!("tip at height {height} matches a banned hash"));
            }
        }
        Ok(())
    }

    /// A peer whose last ping succeeded, chosen round-robin with randomized
    /// tiebreak (§4.B).
    pub fn get_good_host(&self) -> Option<String> {
        let mut inner = self.inner.lock().unwrap();
        let mut good: Vec<String> = inner.hosts.values().filter(|h| h.failures == 0).map(|h| h.url.clone()).collect();
        if good.is_empty() {
            return None;
        }
        good.sort();
        inner.round_robin_cursor %= good.len();
        let idx = inner.round_robin_cursor;
        inner.round_robin_cursor = (inner.round_robin_cursor + 1) % good.len();

        // randomized tiebreak among hosts sharing the same position class:
        // when several are "equally due", pick uniformly among a small
        // window around idx rather than a single fixed slot.
        let window = good.len().min(3);
        let start = idx.min(good.len() - window);
        let choice = &mut good[start..start + window];
        let picked = choice.choose(&mut rand::thread_rng()).cloned();
        picked.or_else(|| good.get(idx).cloned())
    }

    /// Up to `k` peers pinged within `TIMEOUT_MS`, uniformly without
    /// replacement (§4.B — "fresh").
    pub fn sample_fresh_hosts(&self, k: usize) -> Vec<String> {
        let now = now_ms();
        let inner = self.inner.lock().unwrap();
        let mut fresh: Vec<String> = inner
            .hosts
            .values()
            .filter(|h| now - h.last_seen_ms <= TIMEOUT_MS as i64)
            .map(|h| h.url.clone())
            .collect();
        fresh.shuffle(&mut rand::thread_rng());
        fresh.truncate(k);
        fresh
    }

    /// Ignores freshness; used only when `sample_fresh_hosts` yields nothing.
    pub fn sample_all_hosts(&self, k: usize) -> Vec<String> {
        let inner = self.inner.lock().unwrap();
        let mut all: Vec<String> = inner.hosts.keys().cloned().collect();
        all.shuffle(&mut rand::thread_rng());
        all.truncate(k);
        all
    }

    /// `(url, its_reported_height)` for a uniformly random peer.
    pub fn get_random_host(&self) -> Option<(String, u64)> {
        let inner = self.inner.lock().unwrap();
        let urls: Vec<&String> = inner.hosts.keys().collect();
        let url = urls.choose(&mut rand::thread_rng())?.to_string();
        let height = inner.header_chains.get(&url).map(|t| t.tip().0).unwrap_or(0);
        Some((url, height))
    }

    /// Majority height across current good peers, ties broken by highest
    /// cumulative work (§4.B). Stateless across calls.
    pub fn get_block_count(&self) -> u64 {
        self.select_best_tip().map(|(height, _, _)| height).unwrap_or(0)
    }

    /// Cumulative work of the tip selected by the same rule as
    /// `get_block_count` (§4.B).
    pub fn get_total_work(&self) -> u128 {
        self.select_best_tip().map(|(_, work, _)| work).unwrap_or(0)
    }

    /// The peer URL whose claimed tip was selected by `get_block_count`'s
    /// majority rule, useful to pick a sync target (§4.E).
    pub fn best_peer(&self) -> Option<String> {
        self.select_best_tip().map(|(_, _, url)| url)
    }

    fn select_best_tip(&self) -> Option<(u64, u128, String)> {
        let inner = self.inner.lock().unwrap();
        let mut tips: Vec<(u64, u128, String)> = inner
            .hosts
            .values()
            .filter(|h| h.failures == 0)
            .filter_map(|h| inner.header_chains.get(&h.url).map(|t| {
                let (height, work, _, _) = t.tip();
                (height, work, h.url.clone())
            }))
            .collect();
        if tips.is_empty() {
            return None;
        }

        let mut counts: HashMap<u64, usize> = HashMap::new();
        for (height, _, _) in &tips {
            *counts.entry(*height).or_insert(0) += 1;
        }
        let majority_height = *counts.iter().max_by_key(|(_, count)| **count).map(|(h, _)| h).unwrap();

        tips.retain(|(height, _, _)| *height == majority_height);
        tips.sort_by(|a, b| b.1.cmp(&a.1));
        tips.into_iter().next()
    }

    /// Pass-through query to a specific peer (§4.B).
    pub fn get_block_hash(&self, url: &str, id: u64) -> Result<Hash, NetworkError> {
        self.client.block_hash(url, id, Duration::from_millis(TIMEOUT_MS))
    }

    /// `local_time_ms + median(clock_delta_ms over fresh peers)`; local time
    /// if there are no fresh peers (§4.B, scenario S6).
    pub fn get_network_timestamp(&self) -> i64 {
        let now = now_ms();
        let inner = self.inner.lock().unwrap();
        let mut deltas: Vec<i64> = inner
            .hosts
            .values()
            .filter(|h| now - h.last_seen_ms <= TIMEOUT_MS as i64)
            .map(|h| h.clock_delta_ms)
            .collect();
        drop(inner);
        if deltas.is_empty() {
            return now;
        }
        deltas.sort();
        let median = deltas[deltas.len() / 2];
        now + median
    }

    /// Spawns the two background workers (§5): slow host-list refresh and
    /// medium-cadence ping + header-chain refresh. Both exit at their next
    /// loop boundary once `shutdown` is set.
    pub fn spawn_workers(self: &Arc<Self>, shutdown: Arc<AtomicBool>) -> Vec<thread::JoinHandle<()>> {
        let mut handles = Vec::new();

        let hm = Arc::clone(self);
        let shutdown_a = Arc::clone(&shutdown);
        handles.push(thread::spawn(move || {
            while !shutdown_a.load(Ordering::Relaxed) {
                hm.discover_peers();
                thread::sleep(HOST_LIST_REFRESH_INTERVAL);
            }
        }));

        let hm = Arc::clone(self);
        let shutdown_b = Arc::clone(&shutdown);
        handles.push(thread::spawn(move || {
            while !shutdown_b.load(Ordering::Relaxed) {
                let urls: Vec<String> = hm.inner.lock().unwrap().hosts.keys().cloned().collect();
                for url in urls {
                    hm.ping(&url);
                }
                hm.refresh_header_chains();
                thread::sleep(PING_INTERVAL);
            }
        }));

        handles
    }
}

impl NetworkTimeSource for HostManager {
    fn network_timestamp(&self) -> i64 {
        self.get_network_timestamp()
    }
}
