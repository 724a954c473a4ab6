//! Block Acceptance Pipeline (§4.E): fetches, verifies, and applies blocks
//! from the best peer, triggers mempool pruning, and handles reorgs.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::thread;
use std::time::Duration;

use log::{info, warn};

use obscura_core::block::Block;
use obscura_core::chain_state::{BalanceDelta, ChainState};
use obscura_core::constants::{BLOCKS_PER_FETCH, TIMEOUT_BLOCK_MS};
use obscura_core::status::Status;
use obscura_core::NULL_HASH;
use obscura_mempool::Mempool;
use obscura_network::{HostManager, PeerClient};

/// A minimal persisted block-log interface (§6: `./data/blocks`). The real
/// durable store is out of scope (§1); [`InMemoryBlockStore`] stands in for
/// tests and local single-node bring-up.
pub trait BlockStore: Send + Sync {
    fn get(&self, height: u64) -> Option<Block>;
    fn append(&self, block: Block);
    fn truncate(&self, height: u64);
    fn height(&self) -> u64;
}

#[derive(Default)]
pub struct InMemoryBlockStore {
    blocks: Mutex<Vec<Block>>,
}

impl BlockStore for InMemoryBlockStore {
    fn get(&self, height: u64) -> Option<Block> {
        if height == 0 {
            return None;
        }
        self.blocks.lock().unwrap().get((height - 1) as usize).cloned()
    }

    fn append(&self, block: Block) {
        self.blocks.lock().unwrap().push(block);
    }

    fn truncate(&self, height: u64) {
        self.blocks.lock().unwrap().truncate(height as usize);
    }

    fn height(&self) -> u64 {
        self.blocks.lock().unwrap().len() as u64
    }
}

/// Cadence of the sync loop (§5: "few seconds").
pub const SYNC_INTERVAL: Duration = Duration::from_secs(5);

pub struct AcceptancePipeline {
    chain: Arc<RwLock<ChainState>>,
    host_manager: Arc<HostManager>,
    mempool: Arc<Mempool>,
    client: Arc<dyn PeerClient>,
    block_store: Arc<dyn BlockStore>,
    /// Inverse journals for every block currently applied on top of
    /// genesis, in lockstep with `block_store` (§4.E reorg undo).
    journals: Mutex<Vec<BalanceDelta>>,
}

impl AcceptancePipeline {
    pub fn new(
        chain: Arc<RwLock<ChainState>>,
        host_manager: Arc<HostManager>,
        mempool: Arc<Mempool>,
        client: Arc<dyn PeerClient>,
        block_store: Arc<dyn BlockStore>,
    ) -> Self {
        AcceptancePipeline {
            chain,
            host_manager,
            mempool,
            client,
            block_store,
            journals: Mutex::new(Vec::new()),
        }
    }

    /// Runs one sync pass (§4.E steps 1-3). Returns the number of blocks
    /// applied.
    pub fn sync_once(&self) -> usize {
        let (local_height, _local_hash, local_work) = self.chain.read().unwrap().tip();
        let best_height = self.host_manager.get_block_count();
        let best_work = self.host_manager.get_total_work();

        if best_height <= local_height || best_work <= local_work {
            return 0;
        }

        let Some(peer) = self.host_manager.best_peer() else {
            return 0;
        };
        self.sync_from_peer(&peer, local_height, best_height)
    }

    fn sync_from_peer(&self, peer: &str, local_height: u64, best_height: u64) -> usize {
        let mut applied = 0;
        let mut start = local_height + 1;
        while start <= best_height {
            let end = (start + BLOCKS_PER_FETCH - 1).min(best_height);
            let mut batch = Vec::new();
            for id in start..=end {
                match self.client.block(peer, id, Duration::from_millis(TIMEOUT_BLOCK_MS)) {
                    Ok(block) => batch.push(block),
                    Err(e) if e.is_transient() => {
                        warn!("block fetch from {peer} failed transiently: {e}");
                        return applied;
                    }
                    Err(e) => {
                        self.host_manager.blacklist(peer, &e.to_string());
                        return applied;
                    }
                }
            }

            match self.apply_batch(peer, batch) {
                Ok(n) => {
                    applied += n;
                    start = end + 1;
                }
                Err(()) => return applied,
            }
        }
        applied
    }

    /// Applies every block of `batch` in order (§4.E step 2). On any
    /// verification failure the whole batch is aborted, the serving peer is
    /// blacklisted, and any partially-applied state for the failing block is
    /// rolled back (no partial block is ever kept, since `ChainState::accept_block`
    /// only mutates after every check has already passed).
    fn apply_batch(&self, peer: &str, batch: Vec<Block>) -> Result<usize, ()> {
        let mut applied = 0;
        for block in batch {
            let previous_hash = block.header.previous_hash;
            let (local_height, local_hash, _local_work) = self.chain.read().unwrap().tip();

            if local_height > 0 && previous_hash != local_hash {
                if self.reorg_to(peer, &block).is_err() {
                    self.host_manager.blacklist(peer, "reorg target could not be validated");
                    return Err(());
                }
                applied += 1;
                continue;
            }

            match self.apply_single(&block) {
                Ok(()) => applied += 1,
                Err(status) => {
                    warn!("block {} from {peer} rejected: {status:?}", block.header.id);
                    self.host_manager.blacklist(peer, &format!("{status:?}"));
                    return Err(());
                }
            }
        }
        Ok(applied)
    }

    fn apply_single(&self, block: &Block) -> Result<(), Status> {
        let delta = {
            let mut chain = self.chain.write().unwrap();
            chain.accept_block(block)?
        };
        self.block_store.append(block.clone());
        self.journals.lock().unwrap().push(delta);
        self.mempool.finish_block(block, NULL_HASH);
        Ok(())
    }

    /// Walks back to the common ancestor, undoes blocks via their inverse
    /// journal, applies the peer's chain from there through `new_tip_block`,
    /// and re-offers to the mempool any transaction that was in an undone
    /// block but is absent from the replacement chain (§4.E).
    fn reorg_to(&self, peer: &str, new_tip_block: &Block) -> Result<(), ()> {
        let (local_height, _, _) = self.chain.read().unwrap().tip();

        let mut common_height = local_height;
        while common_height > 0 {
            let local_block = match self.block_store.get(common_height) {
                Some(b) => b,
                None => break,
            };
            let peer_hash = self
                .client
                .block_hash(peer, common_height, Duration::from_millis(TIMEOUT_BLOCK_MS))
                .map_err(|_| ())?;
            if peer_hash == local_block.hash() {
                break;
            }
            common_height -= 1;
        }

        let mut undone_transactions = Vec::new();
        {
            let mut chain = self.chain.write().unwrap();
            let mut journals = self.journals.lock().unwrap();
            while chain.height > common_height {
                let Some(delta) = journals.pop() else { break };
                if let Some(block) = self.block_store.get(chain.height) {
                    undone_transactions.extend(block.transactions.into_iter().filter(|t| !t.is_fee()));
                }
                chain.undo_block(&delta);
            }
        }
        self.block_store.truncate(common_height);

        let mut new_tx_hashes = HashSet::new();
        let mut height = common_height + 1;
        loop {
            let block = if height == new_tip_block.header.id {
                new_tip_block.clone()
            } else {
                self.client
                    .block(peer, height, Duration::from_millis(TIMEOUT_BLOCK_MS))
                    .map_err(|_| ())?
            };
            for tx in &block.transactions {
                new_tx_hashes.insert(tx.hash());
            }
            self.apply_single(&block).map_err(|_| ())?;
            if height == new_tip_block.header.id {
                break;
            }
            height += 1;
        }

        for tx in undone_transactions {
            if !new_tx_hashes.contains(&tx.hash()) {
                let status = self.mempool.add_transaction(tx);
                info!("re-offered reorg-undone transaction: {status:?}");
            }
        }
        Ok(())
    }

    /// Spawns the sync loop thread (§5), exiting at its next loop boundary
    /// once `shutdown` is set.
    pub fn spawn(self: &Arc<Self>, shutdown: Arc<AtomicBool>) -> thread::JoinHandle<()> {
        let pipeline = Arc::clone(self);
        thread::spawn(move || {
            while !shutdown.load(Ordering::Relaxed) {
                let applied = pipeline.sync_once();
                if applied == 0 {
                    thread::sleep(SYNC_INTERVAL);
                }
            }
        })
    }
}
