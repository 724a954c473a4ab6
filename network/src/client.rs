//! The peer wire client (§6): an abstraction over the HTTP/JSON transport
//! (itself out of scope, §1) so [`crate::host_manager::HostManager`] and
//! [`crate::header_chain::HeaderChainTracker`] can be exercised in tests
//! without opening real sockets. `obscura-node`'s block acceptance pipeline
//! also drives peers exclusively through this trait.

use std::time::Duration;

use obscura_core::{Block, BlockHeader, Hash, Status, Transaction};

use crate::error::NetworkError;
use crate::wire::{HandshakeResponse, HeaderRangeResponse, StatusResponse};

/// Every network call named in §6's endpoint table, parameterised by an
/// explicit per-call timeout (§4.E). A call that does not return within
/// `timeout` is a [`NetworkError::Timeout`], never a success.
pub trait PeerClient: Send + Sync {
    fn handshake(&self, url: &str, timeout: Duration) -> Result<HandshakeResponse, NetworkError>;
    fn peers(&self, url: &str, timeout: Duration) -> Result<Vec<String>, NetworkError>;
    fn block_count(&self, url: &str, timeout: Duration) -> Result<u64, NetworkError>;
    fn total_work(&self, url: &str, timeout: Duration) -> Result<u128, NetworkError>;
    fn block_headers(
        &self,
        url: &str,
        start: u64,
        end: u64,
        timeout: Duration,
    ) -> Result<Vec<BlockHeader>, NetworkError>;
    fn block(&self, url: &str, id: u64, timeout: Duration) -> Result<Block, NetworkError>;
    /// Not its own endpoint in §6's table; derived by fetching the block and
    /// hashing its header, the way a thin wire client would when the table
    /// only lists `GET /block/{id}`.
    fn block_hash(&self, url: &str, id: u64, timeout: Duration) -> Result<Hash, NetworkError> {
        Ok(self.block(url, id, timeout)?.hash())
    }
    fn add_transaction(
        &self,
        url: &str,
        tx: &Transaction,
        timeout: Duration,
    ) -> Result<Status, NetworkError>;
    fn submit_block(&self, url: &str, block: &Block, timeout: Duration) -> Result<Status, NetworkError>;
}

/// `reqwest::blocking`-backed implementation. One connection is opened per
/// request (§5: "peer URL sockets are not pooled").
pub struct HttpPeerClient {
    http: reqwest::blocking::Client,
}

impl Default for HttpPeerClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpPeerClient {
    pub fn new() -> Self {
        HttpPeerClient {
            http: reqwest::blocking::Client::new(),
        }
    }

    fn transport_err(url: &str, err: reqwest::Error) -> NetworkError {
        if err.is_timeout() {
            NetworkError::Timeout(url.to_string())
        } else {
            NetworkError::Transport(url.to_string(), err.to_string())
        }
    }
}

impl PeerClient for HttpPeerClient {
    fn handshake(&self, url: &str, timeout: Duration) -> Result<HandshakeResponse, NetworkError> {
        let endpoint = format!("{url}/name");
        let resp = self
            .http
            .get(&endpoint)
            .timeout(timeout)
            .send()
            .map_err(|e| Self::transport_err(url, e))?;
        resp.json::<HandshakeResponse>()
            .map_err(|e| NetworkError::Protocol(url.to_string(), e.to_string()))
    }

    fn peers(&self, url: &str, timeout: Duration) -> Result<Vec<String>, NetworkError> {
        let endpoint = format!("{url}/peers");
        let resp = self
            .http
            .get(&endpoint)
            .timeout(timeout)
            .send()
            .map_err(|e| Self::transport_err(url, e))?;
        resp.json::<Vec<String>>()
            .map_err(|e| NetworkError::Protocol(url.to_string(), e.to_string()))
    }

    fn block_count(&self, url: &str, timeout: Duration) -> Result<u64, NetworkError> {
        let endpoint = format!("{url}/block_count");
        let resp = self
            .http
            .get(&endpoint)
            .timeout(timeout)
            .send()
            .map_err(|e| Self::transport_err(url, e))?;
        resp.json::<u64>()
            .map_err(|e| NetworkError::Protocol(url.to_string(), e.to_string()))
    }

    fn total_work(&self, url: &str, timeout: Duration) -> Result<u128, NetworkError> {
        let endpoint = format!("{url}/total_work");
        let resp = self
            .http
            .get(&endpoint)
            .timeout(timeout)
            .send()
            .map_err(|e| Self::transport_err(url, e))?;
        let text = resp
            .text()
            .map_err(|e| NetworkError::Protocol(url.to_string(), e.to_string()))?;
        text.trim()
            .trim_matches('"')
            .parse::<u128>()
            .map_err(|e| NetworkError::Protocol(url.to_string(), e.to_string()))
    }

    fn block_headers(
        &self,
        url: &str,
        start: u64,
        end: u64,
        timeout: Duration,
    ) -> Result<Vec<BlockHeader>, NetworkError> {
        let endpoint = format!("{url}/block_headers?start={start}&end={end}");
        let resp = self
            .http
            .get(&endpoint)
            .timeout(timeout)
            .send()
            .map_err(|e| Self::transport_err(url, e))?;
        resp.json::<HeaderRangeResponse>()
            .map(|r| r.headers)
            .map_err(|e| NetworkError::Protocol(url.to_string(), e.to_string()))
    }

    fn block(&self, url: &str, id: u64, timeout: Duration) -> Result<Block, NetworkError> {
        let endpoint = format!("{url}/block/{id}");
        let resp = self
            .http
            .get(&endpoint)
            .timeout(timeout)
            .send()
            .map_err(|e| Self::transport_err(url, e))?;
        resp.json::<Block>()
            .map_err(|e| NetworkError::Protocol(url.to_string(), e.to_string()))
    }

    fn add_transaction(
        &self,
        url: &str,
        tx: &Transaction,
        timeout: Duration,
    ) -> Result<Status, NetworkError> {
        let endpoint = format!("{url}/add_transaction");
        let resp = self
            .http
            .post(&endpoint)
            .timeout(timeout)
            .json(tx)
            .send()
            .map_err(|e| Self::transport_err(url, e))?;
        resp.json::<StatusResponse>()
            .map(|r| r.status)
            .map_err(|e| NetworkError::Protocol(url.to_string(), e.to_string()))
    }

    fn submit_block(&self, url: &str, block: &Block, timeout: Duration) -> Result<Status, NetworkError> {
        let endpoint = format!("{url}/submit");
        let resp = self
            .http
            .post(&endpoint)
            .timeout(timeout)
            .json(block)
            .send()
            .map_err(|e| Self::transport_err(url, e))?;
        resp.json::<StatusResponse>()
            .map(|r| r.status)
            .map_err(|e| NetworkError::Protocol(url.to_string(), e.to_string()))
    }
}

#[cfg(test)]
pub mod mock {
    //! An in-memory [`PeerClient`] used by the rest of the workspace's
    //! tests so header-chain and host-manager logic can be exercised
    //! without a network.

    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    pub struct MockPeerClient {
        pub handshakes: Mutex<HashMap<String, HandshakeResponse>>,
        pub peer_lists: Mutex<HashMap<String, Vec<String>>>,
        pub chains: Mutex<HashMap<String, Vec<Block>>>,
        pub submit_results: Mutex<HashMap<String, Status>>,
        pub add_tx_results: Mutex<HashMap<String, Status>>,
        pub unreachable: Mutex<std::collections::HashSet<String>>,
    }

    impl MockPeerClient {
        pub fn set_chain(&self, url: &str, blocks: Vec<Block>) {
            self.chains.lock().unwrap().insert(url.to_string(), blocks);
        }

        pub fn set_handshake(&self, url: &str, resp: HandshakeResponse) {
            self.handshakes.lock().unwrap().insert(url.to_string(), resp);
        }

        pub fn mark_unreachable(&self, url: &str) {
            self.unreachable.lock().unwrap().insert(url.to_string());
        }

        fn check_reachable(&self, url: &str) -> Result<(), NetworkError> {
            if self.unreachable.lock().unwrap().contains(url) {
                Err(NetworkError::Transport(url.to_string(), "unreachable".into()))
            } else {
                Ok(())
            }
        }
    }

    impl PeerClient for MockPeerClient {
        fn handshake(&self, url: &str, _timeout: Duration) -> Result<HandshakeResponse, NetworkError> {
            self.check_reachable(url)?;
            self.handshakes
                .lock()
                .unwrap()
                .get(url)
                .cloned()
                .ok_or_else(|| NetworkError::Transport(url.to_string(), "no handshake fixture".into()))
        }

        fn peers(&self, url: &str, _timeout: Duration) -> Result<Vec<String>, NetworkError> {
            self.check_reachable(url)?;
            Ok(self.peer_lists.lock().unwrap().get(url).cloned().unwrap_or_default())
        }

        fn block_count(&self, url: &str, _timeout: Duration) -> Result<u64, NetworkError> {
            self.check_reachable(url)?;
            Ok(self.chains.lock().unwrap().get(url).map(|c| c.len() as u64).unwrap_or(0))
        }

        fn total_work(&self, url: &str, _timeout: Duration) -> Result<u128, NetworkError> {
            self.check_reachable(url)?;
            let work = self
                .chains
                .lock()
                .unwrap()
                .get(url)
                .map(|c| c.iter().map(|b| 1u128 << b.header.difficulty_target).sum())
                .unwrap_or(0);
            Ok(work)
        }

        fn block_headers(
            &self,
            url: &str,
            start: u64,
            end: u64,
            _timeout: Duration,
        ) -> Result<Vec<BlockHeader>, NetworkError> {
            self.check_reachable(url)?;
            let chains = self.chains.lock().unwrap();
            let chain = chains
                .get(url)
                .ok_or_else(|| NetworkError::Transport(url.to_string(), "unknown peer".into()))?;
            Ok(chain
                .iter()
                .filter(|b| b.header.id >= start && b.header.id <= end)
                .map(|b| b.header.clone())
                .collect())
        }

        fn block(&self, url: &str, id: u64, _timeout: Duration) -> Result<Block, NetworkError> {
            self.check_reachable(url)?;
            let chains = self.chains.lock().unwrap();
            let chain = chains
                .get(url)
                .ok_or_else(|| NetworkError::Transport(url.to_string(), "unknown peer".into()))?;
            chain
                .iter()
                .find(|b| b.header.id == id)
                .cloned()
                .ok_or_else(|| NetworkError::Transport(url.to_string(), "no such block".into()))
        }

        fn add_transaction(
            &self,
            url: &str,
            _tx: &Transaction,
            _timeout: Duration,
        ) -> Result<Status, NetworkError> {
            self.check_reachable(url)?;
            Ok(self
                .add_tx_results
                .lock()
                .unwrap()
                .get(url)
                .copied()
                .unwrap_or(Status::Success))
        }

        fn submit_block(&self, url: &str, _block: &Block, _timeout: Duration) -> Result<Status, NetworkError> {
            self.check_reachable(url)?;
            Ok(self
                .submit_results
                .lock()
                .unwrap()
                .get(url)
                .copied()
                .unwrap_or(Status::Success))
        }
    }
}
