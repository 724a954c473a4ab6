//! Blocks (§3).
//!
//! A block is a header plus an ordered transaction list. Structural
//! validity (linkage, merkle root, pow) is checked here; whether the
//! transactions themselves apply cleanly against chain state is the
//! chain-state crate's job (§4.C/§4.E), since that requires balance
//! lookups this module has no business knowing about.

use blake2::{Blake2b512, Digest};
use serde::{Deserialize, Serialize};

use crate::constants::MAX_TRANSACTIONS_PER_BLOCK;
use crate::pow::{self, PowVariant};
use crate::transaction::Transaction;
use crate::{Hash, NULL_HASH};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockHeader {
    /// Height of the block; genesis is `1`.
    pub id: u64,
    pub previous_hash: Hash,
    pub merkle_root: Hash,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    /// Leading-zero-bit target this block's pow hash must satisfy.
    pub difficulty_target: u8,
    pub nonce: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
}

impl Block {
    pub fn new(
        id: u64,
        previous_hash: Hash,
        transactions: Vec<Transaction>,
        timestamp: i64,
        difficulty_target: u8,
    ) -> Self {
        let merkle_root = Self::calc_merkle_root(&transactions);
        Block {
            header: BlockHeader {
                id,
                previous_hash,
                merkle_root,
                timestamp,
                difficulty_target,
                nonce: 0,
            },
            transactions,
        }
    }

    /// Computes the Merkle root of `txs`.
    ///
    /// This is a placeholder concatenation hash (as the teacher's was) —
    /// acceptable since merkle-proof production/consumption is not part of
    /// this system's scope; only equality against the declared root matters.
    pub fn calc_merkle_root(txs: &[Transaction]) -> Hash {
        let mut hasher = Blake2b512::new();
        for tx in txs {
            hasher.update(tx.hash());
        }
        let result = hasher.finalize();
        let mut root = [0u8; 32];
        root.copy_from_slice(&result[..32]);
        root
    }

    pub fn hash(&self) -> Hash {
        let encoded = bincode::serialize(&self.header).expect("header serialize");
        let variant = PowVariant::for_height(self.header.id);
        pow::pow_hash(&encoded, variant)
    }

    /// The single coinbase/fee transaction a non-genesis block must carry,
    /// if present.
    pub fn coinbase(&self) -> Option<&Transaction> {
        self.transactions.iter().find(|t| t.is_fee())
    }

    /// Structural checks independent of chain state: linkage, merkle root,
    /// pow, genesis convention, and transaction-count / coinbase-count
    /// invariants (§3).
    pub fn check_structure(&self, expected_previous: &Hash) -> Result<(), &'static str> {
        if self.header.id == 1 && self.header.previous_hash != NULL_HASH {
            return Err("genesis block must have NULL_HASH previous_hash");
        }
        if self.header.previous_hash != *expected_previous {
            return Err("previous_hash does not match expected tip");
        }
        if Self::calc_merkle_root(&self.transactions) != self.header.merkle_root {
            return Err("merkle root mismatch");
        }
        if !pow::hash_meets_difficulty(&self.hash(), self.header.difficulty_target) {
            return Err("pow does not meet difficulty target");
        }
        if self.transactions.len() > MAX_TRANSACTIONS_PER_BLOCK {
            return Err("too many transactions in block");
        }
        if self.header.id != 1 {
            let coinbase_count = self.transactions.iter().filter(|t| t.is_fee()).count();
            if coinbase_count != 1 {
                return Err("non-genesis block must contain exactly one coinbase transaction");
            }
        }
        Ok(())
    }

    /// Brute-force mining loop. Only used by tests and local single-node
    /// bring-up; the real miner is out of this system's core scope.
    pub fn mine(mut self) -> Self {
        while !pow::hash_meets_difficulty(&self.hash(), self.header.difficulty_target) {
            self.header.nonce = self.header.nonce.wrapping_add(1);
        }
        self
    }
}
