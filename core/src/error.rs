//! Error types for the **Obscura** core crate.
//!
//! All high-level operations return [`crate::Result`] which is a convenient
//! alias for `core::result::Result<T, Error>`.
//!
//! The enum is intentionally minimal and high-level.  Lower-level errors are
//! mapped into one of these variants before bubbling up to callers.
//!
//! # Examples
//!
//! ```
//! use obscura_core::{Error, Result};
//!
//! fn demo_fn(fail: bool) -> Result<()> {
//!     if fail {
//!         Err(Error::DifficultyFail)
//!     } else {
//!         Ok(())
//!     }
//! }
//! ```

use thiserror::Error;

use crate::status::Status;

/// Core crate error type.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum Error {
    /// Signature could not be verified against the provided public key.
    #[error("signature verification failed")]
    BadSignature,

    /// A transaction's `signing_key` does not hash to its declared `from`.
    #[error("signing key does not match sender address")]
    SigningKeyMismatch,

    /// Referenced account/transaction is absent from the current ledger state.
    #[error("referenced account or transaction not found")]
    MissingAccount,

    /// This transaction's hash has already been included in the chain.
    #[error("transaction nonce/hash already seen on chain")]
    InvalidNonce,

    /// Transaction's `timestamp` is outside the accepted admission window.
    #[error("transaction timestamp expired or too far in the future")]
    ExpiredTransaction,

    /// Sum of transaction outputs exceeds sum of inputs / sender balance.
    #[error("value outputs exceed inputs")]
    ValueOverflow,

    /// `prev_hash` field does not match tip hash.
    #[error("block previous hash mismatch")]
    PrevHashMismatch,

    /// Block height is not exactly one greater than current height.
    #[error("block height non-sequential")]
    NonSequentialHeight,

    /// Declared merkle root does not match the recomputed one.
    #[error("merkle root mismatch")]
    MerkleRootMismatch,

    /// Block does not contain exactly one coinbase transaction, or contains
    /// more transactions than `MAX_TRANSACTIONS_PER_BLOCK`.
    #[error("invalid transaction count")]
    InvalidTransactionCount,

    /// Block header hash does not satisfy the difficulty target.
    #[error("difficulty target not met")]
    DifficultyFail,

    /// Declared `difficulty_target` does not match the §4.C derivation rule.
    #[error("declared difficulty does not match derivation rule")]
    InvalidDifficulty,

    /// `program_id` does not match any registered sub-ledger.
    #[error("unsupported program/sub-ledger chain")]
    UnsupportedChain,

    /// Local persistent state is inconsistent; the node must not keep serving.
    #[error("local state corruption: {0}")]
    Corruption(&'static str),

    /// Placeholder for errors originating from external crates.
    #[error("{0}")]
    Other(&'static str),
}

impl Error {
    /// Maps a validation failure onto the wire-level [`Status`] enum (§6).
    pub fn to_status(&self) -> Status {
        match self {
            Error::BadSignature | Error::SigningKeyMismatch => Status::InvalidSignature,
            Error::MissingAccount => Status::Unknown,
            Error::InvalidNonce => Status::InvalidNonce,
            Error::ExpiredTransaction => Status::ExpiredTransaction,
            Error::ValueOverflow => Status::BalanceTooLow,
            Error::PrevHashMismatch => Status::InvalidPreviousHash,
            Error::NonSequentialHeight => Status::InvalidBlockId,
            Error::MerkleRootMismatch => Status::InvalidMerkleRoot,
            Error::InvalidTransactionCount => Status::InvalidTransactionCount,
            Error::DifficultyFail => Status::InvalidPow,
            Error::InvalidDifficulty => Status::InvalidDifficulty,
            Error::UnsupportedChain => Status::UnsupportedChain,
            Error::Corruption(_) | Error::Other(_) => Status::Unknown,
        }
    }
}

/// Convenient result alias used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;
