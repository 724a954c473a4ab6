//! Obscura Node
//!
//! Composition root: wires a [`obscura_core::ChainState`], a
//! [`obscura_network::HostManager`], and a [`obscura_mempool::Mempool`]
//! together and spawns every background worker (§5). `obscura-cli` is the
//! only caller; it owns process lifetime and logging setup, this crate owns
//! the running node.

pub mod config;
pub mod pipeline;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use log::info;

use obscura_core::block::Block;
use obscura_core::chain_state::{ChainState, SharedChainState};
use obscura_core::ChainStateView;
use obscura_mempool::Mempool;
use obscura_network::{HostManager, HttpPeerClient, PeerClient};

pub use config::NodeConfig;
pub use pipeline::{AcceptancePipeline, BlockStore, InMemoryBlockStore};

/// Every background thread the node keeps running, plus the shutdown flag
/// that stops them (§5: "no process-wide statics" — everything a running
/// node owns lives here, not behind a lazily-initialized global).
pub struct Node {
    pub chain: Arc<std::sync::RwLock<ChainState>>,
    pub host_manager: Arc<HostManager>,
    pub mempool: Arc<Mempool>,
    pub pipeline: Arc<AcceptancePipeline>,
    shutdown: Arc<AtomicBool>,
    workers: Vec<JoinHandle<()>>,
}

impl Node {
    /// Builds every component and spawns their background workers, but does
    /// not block; call [`Node::join`] (or let the caller keep `self` around
    /// and call [`Node::shutdown`] later) to run until stopped.
    pub fn start(config: &NodeConfig, genesis: Block) -> Result<Self, obscura_core::Status> {
        let chain_state = ChainState::new(&genesis, config.consensus_config())?;
        let chain = Arc::new(std::sync::RwLock::new(chain_state));

        let client: Arc<dyn PeerClient> = Arc::new(HttpPeerClient::new());
        let host_manager = Arc::new(HostManager::new(client.clone(), config.host_manager_config()));

        let chain_view: Arc<dyn ChainStateView> = Arc::new(SharedChainState(chain.clone()));
        let mempool = Arc::new(Mempool::new(chain_view, host_manager.clone()));

        let block_store: Arc<dyn BlockStore> = Arc::new(InMemoryBlockStore::default());
        block_store.append(genesis);

        let pipeline = Arc::new(AcceptancePipeline::new(
            chain.clone(),
            host_manager.clone(),
            mempool.clone(),
            client,
            block_store,
        ));

        let shutdown = Arc::new(AtomicBool::new(false));
        let mut workers = host_manager.spawn_workers(shutdown.clone());
        workers.push(mempool.spawn_gossip_worker(host_manager.clone(), shutdown.clone()));
        workers.push(pipeline.spawn(shutdown.clone()));

        info!(
            "node started: height={}, peers={}",
            chain.read().unwrap().height,
            config.bootstrap_peers.len()
        );

        Ok(Node { chain, host_manager, mempool, pipeline, shutdown, workers })
    }

    /// Signals every background worker to stop at its next loop boundary and
    /// waits for them to exit.
    pub fn shutdown(mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }

    pub fn height(&self) -> u64 {
        self.chain.read().unwrap().height
    }
}
