//! Obscura Mempool
//!
//! Admission, deduplication, billing, gossip, and block-acceptance pruning
//! of pending transactions (§4.D), plus the registered-program routing
//! table (§9 Design Note).

pub mod mempool;
pub mod program;

pub use mempool::{Mempool, TransactionRecord};
pub use program::{ProgramLedger, ProgramRegistry};
