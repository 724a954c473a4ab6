//! Chain state (§3, §4.C): the account-balance ledger and the operations
//! the mempool and block-acceptance pipeline depend on.
//!
//! This generalizes the teacher's UTXO-based `Ledger` into the account
//! model the specification describes: a flat `PublicAddress -> Amount`
//! mapping rather than a set of spendable outputs. Block application,
//! transaction verification, and the difficulty-recomputation rule all
//! live here, the way the teacher kept ledger mutation and validation
//! together in one small module.
//!
//! `ChainState` is **not** thread-safe by itself; the block-acceptance
//! pipeline (`obscura-node`) is the sole writer and wraps it in a lock,
//! exposing read snapshots to the mempool and diagnostics (§3 Ownership).

use std::collections::{HashMap, VecDeque};

use log::{debug, warn};

use crate::address::PublicAddress;
use crate::amount::Amount;
use crate::block::Block;
use crate::config::Config;
use crate::constants::DIFFICULTY_LOOKBACK;
use crate::pow::{self, PowVariant};
use crate::status::Status;
use crate::transaction::Transaction;
use crate::{Hash, NULL_HASH};

/// Per-block balance/seen-tx deltas, sufficient to undo a block's effect on
/// [`ChainState`] during a reorg (§4.E).
#[derive(Debug, Clone)]
pub struct BalanceDelta {
    pub block_id: u64,
    /// Balance a sender/receiver held *before* this block applied.
    pub previous_balances: Vec<(PublicAddress, Amount)>,
    pub tx_hashes: Vec<Hash>,
    pub previous_tip: Hash,
    pub previous_height: u64,
    pub previous_total_work: u128,
}

#[derive(Debug, Clone)]
pub struct ChainState {
    pub balances: HashMap<PublicAddress, Amount>,
    /// Transaction hash -> including block id, per §3.
    pub seen_tx: HashMap<Hash, u64>,
    pub height: u64,
    pub best_hash: Hash,
    pub total_work: u128,
    config: Config,
    /// Recent `(timestamp_ms, difficulty_target)` pairs, capped at
    /// `DIFFICULTY_LOOKBACK + 1` entries, used to recompute difficulty
    /// every lookback window (§4.C).
    recent_headers: VecDeque<(i64, u8)>,
}

impl ChainState {
    /// Constructs chain state initialised with the genesis block.
    pub fn new(genesis: &Block, config: Config) -> Result<Self, Status> {
        let mut state = ChainState {
            balances: HashMap::new(),
            seen_tx: HashMap::new(),
            height: 0,
            best_hash: NULL_HASH,
            total_work: 0,
            config,
            recent_headers: VecDeque::new(),
        };
        state.accept_block(genesis)?;
        Ok(state)
    }

    pub fn tip(&self) -> (u64, Hash, u128) {
        (self.height, self.best_hash, self.total_work)
    }

    pub fn balance(&self, addr: &PublicAddress) -> Amount {
        self.balances.get(addr).copied().unwrap_or(Amount::ZERO)
    }

    /// §4.C: checks signature (if non-fee), nonce freshness, non-negative
    /// amount (implicit in `Amount`'s unsigned representation), and for
    /// non-fee transactions that `amount + fee <= balance(from)`. The
    /// "too far in the future" timestamp check is an admission-time concern
    /// (§4.D, against the mempool's network-time estimate), not a chain-state
    /// check — a synced block's transactions are old news by the time they
    /// are applied and must not be rejected on that basis.
    pub fn verify_transaction(&self, tx: &Transaction) -> Status {
        if self.seen_tx.contains_key(&tx.hash()) {
            return Status::InvalidNonce;
        }

        if !tx.is_fee() {
            if let Err(e) = tx.verify_signature() {
                return e.to_status();
            }

            let total = match tx.amount.checked_add(tx.fee) {
                Some(v) => v,
                None => return Status::BalanceTooLow,
            };
            if total > self.balance(&tx.from) {
                return Status::BalanceTooLow;
            }
        }

        Status::Success
    }

    /// §4.C: the difficulty target the *next* block must satisfy.
    pub fn difficulty_for_next(&self) -> u8 {
        crate::difficulty::next_difficulty(
            &self.recent_headers,
            self.height,
            self.config.genesis_difficulty,
        )
    }

    /// Applies `block` on top of the current tip. Validates every
    /// transaction (treating the declared coinbase specially), mutates
    /// balances and the seen-tx set, advances the tip, and returns the
    /// inverse journal needed to undo this application during a reorg.
    pub fn accept_block(&mut self, block: &Block) -> Result<BalanceDelta, Status> {
        let expected_previous = if self.height == 0 { NULL_HASH } else { self.best_hash };
        block
            .check_structure(&expected_previous)
            .map_err(|_| Status::InvalidPreviousHash)?;

        let variant = PowVariant::for_height(block.header.id);
        let expected_pow_hash = pow::pow_hash(
            &bincode::serialize(&block.header).map_err(|_| Status::Unknown)?,
            variant,
        );
        if expected_pow_hash != block.hash() {
            return Err(Status::InvalidPow);
        }

        let expected_difficulty = if self.height == 0 {
            self.config.genesis_difficulty
        } else {
            self.difficulty_for_next()
        };
        if block.header.id != 1 && block.header.difficulty_target != expected_difficulty {
            warn!(
                "block {} declared difficulty {} but derivation expects {}",
                block.header.id, block.header.difficulty_target, expected_difficulty
            );
            return Err(Status::InvalidDifficulty);
        }

        let coinbase = block.coinbase();
        if block.header.id != 1 {
            let coinbase = coinbase.ok_or(Status::InvalidTransactionCount)?;
            let fee_sum: Amount = block
                .transactions
                .iter()
                .filter(|t| !t.is_fee())
                .map(|t| t.fee)
                .sum();
            let expected_reward = Amount(self.config.block_reward)
                .checked_add(fee_sum)
                .ok_or(Status::InvalidTransactionCount)?;
            if coinbase.amount != expected_reward {
                return Err(Status::InvalidTransactionCount);
            }
        }

        let mut previous_balances = Vec::new();
        let mut tx_hashes = Vec::new();
        let mut touched = HashMap::new();

        for tx in &block.transactions {
            if !tx.is_fee() {
                match self.verify_transaction(tx) {
                    Status::Success => {}
                    other => return Err(other),
                }
            }
            let hash = tx.hash();
            tx_hashes.push(hash);

            if !touched.contains_key(&tx.from) {
                touched.insert(tx.from, self.balance(&tx.from));
            }
            if !touched.contains_key(&tx.to) {
                touched.insert(tx.to, self.balance(&tx.to));
            }

            if !tx.is_fee() {
                let debit = tx.amount.checked_add(tx.fee).ok_or(Status::BalanceTooLow)?;
                let new_from_balance = self
                    .balance(&tx.from)
                    .checked_sub(debit)
                    .ok_or(Status::BalanceTooLow)?;
                self.balances.insert(tx.from, new_from_balance);
            }
            let new_to_balance = self
                .balance(&tx.to)
                .checked_add(tx.amount)
                .ok_or(Status::BalanceTooLow)?;
            self.balances.insert(tx.to, new_to_balance);

            self.seen_tx.insert(hash, block.header.id);
        }

        previous_balances.extend(touched);

        let delta = BalanceDelta {
            block_id: block.header.id,
            previous_balances,
            tx_hashes,
            previous_tip: self.best_hash,
            previous_height: self.height,
            previous_total_work: self.total_work,
        };

        self.height = block.header.id;
        self.best_hash = block.hash();
        self.total_work += 1u128 << block.header.difficulty_target;

        self.recent_headers
            .push_back((block.header.timestamp, block.header.difficulty_target));
        while self.recent_headers.len() > (DIFFICULTY_LOOKBACK as usize + 1) {
            self.recent_headers.pop_front();
        }

        debug!(
            "accepted block {} (tip {:x?}, total_work {})",
            self.height,
            &self.best_hash[..4],
            self.total_work
        );
        Ok(delta)
    }

    /// Undoes a previously applied block using its inverse journal, for use
    /// during a reorg (§4.E).
    pub fn undo_block(&mut self, delta: &BalanceDelta) {
        for (addr, balance) in &delta.previous_balances {
            self.balances.insert(*addr, *balance);
        }
        for hash in &delta.tx_hashes {
            self.seen_tx.remove(hash);
        }
        self.height = delta.previous_height;
        self.best_hash = delta.previous_tip;
        self.total_work = delta.previous_total_work;
        if let Some((ts, target)) = self.recent_headers.pop_back() {
            let _ = (ts, target);
        }
    }
}

/// The read-only surface of [`ChainState`] the mempool and diagnostic
/// queries are allowed to see (§3 Ownership, §9 Design Note on breaking the
/// mempool/chain-state cycle): `ChainState` stays exclusively owned and
/// mutated by the block-acceptance pipeline, which is the only crate that
/// ever needs to write to it.
pub trait ChainStateView: Send + Sync {
    fn verify_transaction(&self, tx: &Transaction) -> Status;
    fn balance(&self, addr: &PublicAddress) -> Amount;
    fn tip(&self) -> (u64, Hash, u128);
}

impl ChainStateView for ChainState {
    fn verify_transaction(&self, tx: &Transaction) -> Status {
        ChainState::verify_transaction(self, tx)
    }
    fn balance(&self, addr: &PublicAddress) -> Amount {
        ChainState::balance(self, addr)
    }
    fn tip(&self) -> (u64, Hash, u128) {
        ChainState::tip(self)
    }
}

/// A shared handle to a mutably-owned [`ChainState`], exposing only
/// [`ChainStateView`] to holders. The block-acceptance pipeline keeps the
/// `Arc<RwLock<ChainState>>` itself (for writing); the mempool and RPC
/// diagnostics only ever see this narrower wrapper.
#[derive(Clone)]
pub struct SharedChainState(pub std::sync::Arc<std::sync::RwLock<ChainState>>);

impl SharedChainState {
    pub fn new(state: ChainState) -> Self {
        SharedChainState(std::sync::Arc::new(std::sync::RwLock::new(state)))
    }
}

impl ChainStateView for SharedChainState {
    fn verify_transaction(&self, tx: &Transaction) -> Status {
        self.0.read().expect("chain state lock poisoned").verify_transaction(tx)
    }
    fn balance(&self, addr: &PublicAddress) -> Amount {
        self.0.read().expect("chain state lock poisoned").balance(addr)
    }
    fn tip(&self) -> (u64, Hash, u128) {
        self.0.read().expect("chain state lock poisoned").tip()
    }
}
