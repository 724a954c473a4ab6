//! Error categories for the peer wire client and header-chain tracker.
//!
//! These map directly onto §7's error taxonomy: [`NetworkError::Timeout`],
//! [`NetworkError::Transport`], and [`NetworkError::Protocol`] (a malformed
//! or undecodable partial response) are all *transient peer errors*
//! (increment a failure counter, retry with a different peer);
//! [`NetworkError::PeerInvalid`] is a *consensus violation* (blacklist the
//! peer, abort the sync batch).

use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum NetworkError {
    #[error("request to {0} timed out")]
    Timeout(String),

    #[error("transport error contacting {0}: {1}")]
    Transport(String, String),

    #[error("malformed response from {0}: {1}")]
    Protocol(String, String),

    /// A peer violated the consensus rules a header chain or block must
    /// satisfy (bad pow, broken linkage, difficulty mismatch, excessive
    /// reorg depth). Callers blacklist the peer on receipt of this variant.
    #[error("peer {0} violated consensus rules: {1}")]
    PeerInvalid(String, String),
}

impl NetworkError {
    /// Transient errors (§7) are the ones a caller should retry against a
    /// different peer without blacklisting the one that produced them. A
    /// malformed/undecodable partial response (`Protocol`) is transient too
    /// — it is evidence of a bad connection or a stale peer, not proof the
    /// peer is violating consensus.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            NetworkError::Timeout(_) | NetworkError::Transport(_, _) | NetworkError::Protocol(_, _)
        )
    }
}
