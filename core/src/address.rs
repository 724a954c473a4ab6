//! Wallet-facing identifiers.
//!
//! [`PublicAddress`] is kept as a thin newtype rather than a bare `[u8; 32]`
//! so the "from is NULL" coinbase convention (§3) is a named constant
//! instead of a magic array literal scattered through the chain-state and
//! mempool crates.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::Hash;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PublicAddress(pub [u8; 32]);

impl PublicAddress {
    /// The sentinel "no sender" address used by coinbase and fee transactions.
    pub const NULL: PublicAddress = PublicAddress([0u8; 32]);

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        PublicAddress(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_null(&self) -> bool {
        *self == Self::NULL
    }

    /// Derives the address for an Ed25519 public key the way a wallet would:
    /// the address *is* the raw public key. Kept as a free function rather
    /// than folded into `ed25519_dalek::PublicKey` since that type is an
    /// external collaborator (§1) we only consume.
    pub fn from_signing_key_hash(signing_key_hash: Hash) -> Self {
        PublicAddress(signing_key_hash)
    }
}

impl fmt::Debug for PublicAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicAddress({})", hex::encode(self.0))
    }
}

impl fmt::Display for PublicAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_address_is_zero() {
        assert_eq!(PublicAddress::NULL.as_bytes(), &[0u8; 32]);
        assert!(PublicAddress::NULL.is_null());
    }
}
