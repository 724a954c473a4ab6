//! Consensus configuration for **Obscura** core.
//!
//! The [`Config`] struct centralises tunable parameters such as the genesis
//! difficulty and coinbase reward schedule. It is constructed via the
//! [`ConfigBuilder`] using the fluent builder pattern, enabling callers to
//! customise only the fields they care about while keeping sensible
//! defaults.
//!
//! All fields are `pub` so read-only access is ergonomic, however mutation
//! should occur through the builder to preserve validation invariants.
//!
//! ```
//! use obscura_core::config::Config;
//!
//! // default main-net configuration
//! let cfg = Config::default();
//! assert_eq!(cfg.genesis_difficulty, 8);
//! ```

use serde::{Deserialize, Serialize};

use crate::constants::{MAX_DIFFICULTY, MIN_DIFFICULTY};

/// Consensus configuration shared across the crate.
///
/// Everything beyond genesis bootstrap is recomputed per §4.C's difficulty
/// rule; `genesis_difficulty` only applies until the first
/// `DIFFICULTY_LOOKBACK` window has elapsed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    /// PoW leading-zero difficulty in bits used before the first lookback
    /// recomputation.
    pub genesis_difficulty: u8,

    /// Block subsidy in the smallest currency unit paid to the miner.
    pub block_reward: u64,

    /// Human-readable name identifying the network (e.g. "main", "test").
    pub network: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            genesis_difficulty: 8,
            block_reward: 50,
            network: "main".into(),
        }
    }
}

/// Fluent builder for [`Config`].
pub struct ConfigBuilder {
    inner: Config,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigBuilder {
    /// Starts a new builder pre-populated with [`Config::default`].
    pub fn new() -> Self {
        Self { inner: Config::default() }
    }

    /// Clamps to `[MIN_DIFFICULTY, MAX_DIFFICULTY]` per §4.C.
    pub fn genesis_difficulty(mut self, diff: u8) -> Self {
        self.inner.genesis_difficulty = diff.clamp(MIN_DIFFICULTY, MAX_DIFFICULTY);
        self
    }

    pub fn block_reward(mut self, reward: u64) -> Self {
        self.inner.block_reward = reward;
        self
    }

    pub fn network<S: Into<String>>(mut self, name: S) -> Self {
        self.inner.network = name.into();
        self
    }

    /// Consumes the builder returning an immutable configuration value.
    pub fn finish(self) -> Config {
        self.inner
    }
}
