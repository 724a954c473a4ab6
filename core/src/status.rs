//! The admission/submission status enum exposed on the wire (§6).
//!
//! Distinct from [`crate::error::Error`]: `Status` is a value returned to a
//! submitter (mempool admission, block submission) and is never itself an
//! `Err` — admission failures are ordinary, expected outcomes, not system
//! errors (§7).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Success,
    AlreadyInQueue,
    UnsupportedChain,
    TransactionFeeTooLow,
    BalanceTooLow,
    QueueFull,
    InvalidSignature,
    InvalidNonce,
    ExpiredTransaction,
    InvalidBlockId,
    InvalidDifficulty,
    InvalidPreviousHash,
    InvalidMerkleRoot,
    InvalidTransactionCount,
    InvalidPow,
    Unknown,
}

impl Status {
    pub fn is_success(self) -> bool {
        matches!(self, Status::Success)
    }
}
