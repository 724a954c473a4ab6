//! Transactions (§3).
//!
//! A `Transaction` is immutable once constructed: every field is consumed by
//! value in [`Transaction::new`]/[`Transaction::new_coinbase`] and `hash()`
//! is derived, never stored, so there is no way to mutate a transaction
//! without also changing its identity.

use blake2::{Blake2b512, Digest};
use ed25519_dalek::{PublicKey, Signature};
use serde::{Deserialize, Serialize};

use crate::address::PublicAddress;
use crate::amount::Amount;
use crate::error::{Error, Result};
use crate::Hash;

/// The portion of a transaction that is serialized and hashed to produce
/// both the content hash and the signed message. Kept separate from
/// [`Transaction`] so that adding `signature` to the struct can never
/// accidentally feed back into its own signing message (mirrors the
/// teacher's `Ledger::tx_message`, which clones and clears the signature
/// before hashing).
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TxBody {
    from: PublicAddress,
    to: PublicAddress,
    amount: Amount,
    fee: Amount,
    timestamp: i64,
    program_id: Hash,
    nonce: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub from: PublicAddress,
    pub to: PublicAddress,
    pub amount: Amount,
    pub fee: Amount,
    /// Milliseconds since the Unix epoch, per §4.D admission rules.
    pub timestamp: i64,
    pub signature: Option<Vec<u8>>,
    pub signing_key: Option<Vec<u8>>,
    /// `NULL_HASH` for the main chain; otherwise identifies a sub-ledger.
    pub program_id: Hash,
    pub nonce: u64,
}

impl PartialEq for Transaction {
    fn eq(&self, other: &Self) -> bool {
        self.hash() == other.hash()
    }
}
impl Eq for Transaction {}

impl std::hash::Hash for Transaction {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.hash().hash(state)
    }
}

impl Transaction {
    #[allow(clippy::too_many_arguments)]
    pub fn new_signed(
        from: PublicAddress,
        to: PublicAddress,
        amount: Amount,
        fee: Amount,
        timestamp: i64,
        program_id: Hash,
        nonce: u64,
        signing_key: PublicKey,
        sign: impl FnOnce(&[u8]) -> Signature,
    ) -> Self {
        let body = TxBody {
            from,
            to,
            amount,
            fee,
            timestamp,
            program_id,
            nonce,
        };
        let msg = Self::body_message(&body);
        let signature = sign(&msg);
        Transaction {
            from,
            to,
            amount,
            fee,
            timestamp,
            signature: Some(signature.to_bytes().to_vec()),
            signing_key: Some(signing_key.as_bytes().to_vec()),
            program_id,
            nonce,
        }
    }

    pub fn new_coinbase(to: PublicAddress, amount: Amount, timestamp: i64, nonce: u64) -> Self {
        Transaction {
            from: PublicAddress::NULL,
            to,
            amount,
            fee: Amount::ZERO,
            timestamp,
            signature: None,
            signing_key: None,
            program_id: crate::NULL_HASH,
            nonce,
        }
    }

    /// A fee/coinbase transaction: `from == NULL` and no signature, per §3's
    /// invariant `is_fee() ⇒ from == NULL ∧ signature absent`.
    pub fn is_fee(&self) -> bool {
        self.from.is_null() && self.signature.is_none()
    }

    fn body(&self) -> TxBody {
        TxBody {
            from: self.from,
            to: self.to,
            amount: self.amount,
            fee: self.fee,
            timestamp: self.timestamp,
            program_id: self.program_id,
            nonce: self.nonce,
        }
    }

    fn body_message(body: &TxBody) -> Hash {
        let encoded = bincode::serialize(body).expect("tx body serialize");
        let digest = Blake2b512::digest(&encoded);
        let mut msg = [0u8; 32];
        msg.copy_from_slice(&digest[..32]);
        msg
    }

    /// Content hash: identity of the transaction and the value compared on
    /// mempool/chain-state lookups.
    pub fn hash(&self) -> Hash {
        Self::body_message(&self.body())
    }

    /// Verifies §3's non-coinbase invariant: `signature` validates `hash`
    /// under `signing_key`, and `signing_key` hashes to `from`.
    pub fn verify_signature(&self) -> Result<()> {
        if self.is_fee() {
            return Ok(());
        }
        let signing_key = self.signing_key.as_ref().ok_or(Error::BadSignature)?;
        let signature_bytes = self.signature.as_ref().ok_or(Error::BadSignature)?;

        let derived_from = address_from_signing_key(signing_key);
        if derived_from != self.from {
            return Err(Error::SigningKeyMismatch);
        }

        let public_key =
            PublicKey::from_bytes(signing_key).map_err(|_| Error::BadSignature)?;
        let signature =
            Signature::from_bytes(signature_bytes).map_err(|_| Error::BadSignature)?;
        let msg = Self::body_message(&self.body());
        public_key
            .verify_strict(&msg, &signature)
            .map_err(|_| Error::BadSignature)
    }
}

/// Derives the address a signing key authenticates as: the blake2b-256
/// hash of the raw public key bytes (§3: "signing_key hashes to from").
pub fn address_from_signing_key(signing_key: &[u8]) -> PublicAddress {
    let digest = Blake2b512::digest(signing_key);
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest[..32]);
    PublicAddress::from_bytes(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Keypair, Signer};
    use rand::rngs::OsRng;

    fn keypair() -> Keypair {
        let mut csprng = OsRng {};
        Keypair::generate(&mut csprng)
    }

    #[test]
    fn coinbase_is_fee_and_unsigned() {
        let tx = Transaction::new_coinbase(PublicAddress::from_bytes([7u8; 32]), Amount(50), 1, 0);
        assert!(tx.is_fee());
        assert!(tx.verify_signature().is_ok());
    }

    #[test]
    fn signed_transaction_round_trips_signature_and_address() {
        let kp = keypair();
        let from = address_from_signing_key(kp.public.as_bytes());
        let to = PublicAddress::from_bytes([9u8; 32]);
        let tx = Transaction::new_signed(
            from,
            to,
            Amount(10),
            Amount(1),
            1_000,
            crate::NULL_HASH,
            0,
            kp.public,
            |msg| kp.sign(msg),
        );
        assert!(!tx.is_fee());
        assert!(tx.verify_signature().is_ok());
    }

    #[test]
    fn tampered_amount_breaks_signature() {
        let kp = keypair();
        let from = address_from_signing_key(kp.public.as_bytes());
        let to = PublicAddress::from_bytes([9u8; 32]);
        let mut tx = Transaction::new_signed(
            from,
            to,
            Amount(10),
            Amount(1),
            1_000,
            crate::NULL_HASH,
            0,
            kp.public,
            |msg| kp.sign(msg),
        );
        tx.amount = Amount(1_000_000);
        assert!(tx.verify_signature().is_err());
    }

    #[test]
    fn equality_is_defined_by_hash() {
        let a = Transaction::new_coinbase(PublicAddress::from_bytes([1u8; 32]), Amount(1), 0, 0);
        let b = Transaction::new_coinbase(PublicAddress::from_bytes([1u8; 32]), Amount(1), 0, 0);
        assert_eq!(a, b);
    }
}
