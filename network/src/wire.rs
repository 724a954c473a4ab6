//! Request/response shapes for the peer wire protocol (§6).
//!
//! The protocol itself is JSON over HTTP; the HTTP transport and JSON
//! encoding are out of scope (§1) and are the concern of whatever serves
//! `obscura-rpc`-shaped routes in front of a node. These types only need to
//! round-trip through `serde_json` for that external layer to use; blocks,
//! headers and transactions reuse `obscura-core`'s own `Serialize`/
//! `Deserialize` impls rather than duplicating DTOs for them.

use serde::{Deserialize, Serialize};

/// `GET /name` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandshakeResponse {
    pub version: String,
    #[serde(rename = "networkName")]
    pub network_name: String,
    pub address: String,
    pub time_ms: i64,
}

/// `GET /peers` response: a flat list of peer URLs.
pub type PeerListResponse = Vec<String>;

/// `GET /block_headers?start=&end=` response, inclusive of both endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeaderRangeResponse {
    pub headers: Vec<obscura_core::BlockHeader>,
}

/// `POST /add_transaction` and `POST /submit` both answer with the shared
/// status enum (§6), wrapped so the wire shape can grow fields later
/// without breaking `obscura_core::Status`'s own derive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: obscura_core::Status,
}
