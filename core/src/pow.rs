//! Proof-of-Work helpers.
//!
//! Difficulty is expressed as a **count of leading zero bits** a block
//! header's pow hash must satisfy (§3), clamped to `[MIN_DIFFICULTY,
//! MAX_DIFFICULTY]` (§4.C). The actual pow hash function itself — the
//! cryptographic primitive — is out of scope (§1); [`pow_hash`] is the
//! named seam an external implementation plugs into. From
//! `PUFFERFISH_START_BLOCK` onward the network switches to the Pufferfish
//! variant of that primitive; this module only needs to know *which*
//! variant applies to a given height, not how either hashes.
//!
//! All functions here are pure and stateless so they can be called from any
//! thread without synchronization.

use blake2::{Blake2b512, Digest};

use crate::constants::PUFFERFISH_START_BLOCK;
use crate::Hash;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowVariant {
    Classic,
    Pufferfish,
}

impl PowVariant {
    /// Selects the variant that applies at a given block height.
    pub fn for_height(height: u64) -> Self {
        if height >= PUFFERFISH_START_BLOCK {
            PowVariant::Pufferfish
        } else {
            PowVariant::Classic
        }
    }
}

/// Computes the proof-of-work hash of `header_bytes` under `variant`.
///
/// This is the external cryptographic primitive named (but not designed) by
/// the specification; both variants are implemented here with the same
/// underlying digest since the actual Pufferfish hash function is out of
/// scope and only its *effect on validation* (which variant gates which
/// heights) is part of this crate's contract.
pub fn pow_hash(header_bytes: &[u8], variant: PowVariant) -> Hash {
    let mut hasher = Blake2b512::new();
    match variant {
        PowVariant::Classic => hasher.update(header_bytes),
        PowVariant::Pufferfish => {
            hasher.update(b"pufferfish");
            hasher.update(header_bytes);
        }
    }
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest[..32]);
    out
}

/// Returns `true` if `hash` meets the difficulty target.
///
/// * `difficulty == 0` → always valid.
/// * `difficulty == 8` → hash must start with one `0x00` byte.
/// * `difficulty == 12` → first byte `0x00`, second byte's high 4 bits zero.
pub fn hash_meets_difficulty(hash: &Hash, difficulty: u8) -> bool {
    if difficulty == 0 {
        return true;
    }
    let zero_bytes = (difficulty / 8) as usize;
    let zero_bits = difficulty % 8;

    if hash.iter().take(zero_bytes).any(|&b| b != 0) {
        return false;
    }
    if zero_bits == 0 {
        return true;
    }
    if zero_bytes >= hash.len() {
        return false;
    }
    let next_byte = hash[zero_bytes];
    next_byte.leading_zeros() as u8 >= zero_bits
}
