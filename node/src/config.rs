//! Process configuration (§6: "a JSON config object drives HostManager
//! construction"). Loading JSON, CLI parsing, and logging setup are
//! ambient plumbing carried by `obscura-cli`; this struct is the shape that
//! plumbing deserializes into and hands to [`crate::run`].

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use obscura_core::config::Config as ConsensusConfig;
use obscura_core::Hash;
use obscura_network::{Checkpoint, HostManagerConfig};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointConfig {
    pub height: u64,
    /// Hex-encoded 32-byte hash.
    pub hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub ip: String,
    pub port: u16,
    pub name: String,
    pub network: String,
    #[serde(default)]
    pub bootstrap_peers: Vec<String>,
    #[serde(rename = "minHostVersion", default)]
    pub min_host_version: String,
    #[serde(default)]
    pub checkpoints: Vec<CheckpointConfig>,
    /// height -> hex-encoded hashes a block is never allowed to have there.
    #[serde(rename = "bannedHashes", default)]
    pub banned_hashes: HashMap<u64, Vec<String>>,
    #[serde(default)]
    pub whitelist: Vec<String>,
    #[serde(default)]
    pub firewall: bool,
    #[serde(default = "default_genesis_difficulty")]
    pub genesis_difficulty: u8,
    #[serde(default = "default_block_reward")]
    pub block_reward: u64,
    #[serde(default = "default_max_reorg_depth")]
    pub max_reorg_depth: u64,
    /// Hex-encoded address credited by the single genesis coinbase, for
    /// bring-up of a fresh chain. Ignored once a persisted chain already
    /// exists (out of this crate's scope — that is a storage-driver
    /// concern), so it only matters the first time a network is started.
    #[serde(rename = "genesisAddress", default)]
    pub genesis_address: Option<String>,
}

fn default_genesis_difficulty() -> u8 {
    8
}
fn default_block_reward() -> u64 {
    50
}
fn default_max_reorg_depth() -> u64 {
    500
}

impl NodeConfig {
    pub fn from_json_str(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }

    pub fn consensus_config(&self) -> ConsensusConfig {
        ConsensusConfig {
            genesis_difficulty: self.genesis_difficulty,
            block_reward: self.block_reward,
            network: self.network.clone(),
        }
    }

    pub fn host_manager_config(&self) -> HostManagerConfig {
        let checkpoints = self
            .checkpoints
            .iter()
            .filter_map(|c| parse_hash(&c.hash).map(|hash| Checkpoint { height: c.height, hash }))
            .collect();

        let mut banned_hashes = HashMap::new();
        for (height, hex_hashes) in &self.banned_hashes {
            let set: HashSet<Hash> = hex_hashes.iter().filter_map(|h| parse_hash(h)).collect();
            banned_hashes.insert(*height, set);
        }

        HostManagerConfig {
            bootstrap_urls: self.bootstrap_peers.clone(),
            min_host_version: self.min_host_version.clone(),
            checkpoints,
            banned_hashes,
            whitelist: self.whitelist.iter().cloned().collect(),
            genesis_difficulty: self.genesis_difficulty,
            max_reorg_depth: self.max_reorg_depth,
        }
    }

    /// Builds the single-coinbase genesis block for a brand-new chain,
    /// crediting `genesisAddress` (the all-zero address if unset) with one
    /// block's reward. Only meaningful the first time a network is
    /// bootstrapped; a node restarting against an already-persisted chain
    /// loads its genesis from the (out-of-scope) block store instead.
    pub fn genesis_block(&self, timestamp_ms: i64) -> obscura_core::Block {
        let address = self
            .genesis_address
            .as_deref()
            .and_then(parse_hash)
            .map(obscura_core::PublicAddress::from_bytes)
            .unwrap_or(obscura_core::PublicAddress::NULL);
        let coinbase = obscura_core::Transaction::new_coinbase(
            address,
            obscura_core::Amount(self.block_reward),
            timestamp_ms,
            0,
        );
        obscura_core::Block::new(1, obscura_core::NULL_HASH, vec![coinbase], timestamp_ms, self.genesis_difficulty)
            .mine()
    }
}

fn parse_hash(hex_str: &str) -> Option<Hash> {
    let bytes = hex::decode(hex_str).ok()?;
    if bytes.len() != 32 {
        return None;
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(&bytes);
    Some(out)
}
