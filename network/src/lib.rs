//! Obscura Network
//!
//! The peer/host-manager subsystem (§4.A, §4.B): discovers peers, tracks
//! per-peer header chains, and derives a network-time estimate. Transport is
//! abstracted behind [`client::PeerClient`] so the rest of the workspace can
//! be tested without opening sockets; `client::HttpPeerClient` is the
//! concrete JSON/HTTP implementation (§6) a running node uses.

pub mod client;
pub mod error;
pub mod header_chain;
pub mod host_manager;
pub mod wire;

pub use client::{HttpPeerClient, PeerClient};
pub use error::NetworkError;
pub use header_chain::HeaderChainTracker;
pub use host_manager::{Checkpoint, HostEntry, HostManager, HostManagerConfig, NetworkTimeSource};
