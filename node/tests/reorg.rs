//! S4 (§8): a peer presenting a heavier chain that diverges below the
//! current tip triggers a reorg — the shorter fork is undone, the new chain
//! applied, and any transaction orphaned by the undone blocks that does not
//! reappear in the new chain is re-offered to the mempool.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use ed25519_dalek::{Keypair, Signer};
use rand::rngs::OsRng;

use obscura_core::transaction::address_from_signing_key;
use obscura_core::{
    Amount, Block, BlockHeader, ChainState, ChainStateView, Config, PublicAddress,
    SharedChainState, Status, Transaction, NULL_HASH,
};
use obscura_mempool::Mempool;
use obscura_network::{HostManager, HostManagerConfig, NetworkError, PeerClient};
use obscura_node::pipeline::{AcceptancePipeline, BlockStore, InMemoryBlockStore};

#[derive(Default)]
struct FakePeerClient {
    chains: Mutex<HashMap<String, Vec<Block>>>,
}

impl FakePeerClient {
    fn set_chain(&self, url: &str, blocks: Vec<Block>) {
        self.chains.lock().unwrap().insert(url.to_string(), blocks);
    }
}

impl PeerClient for FakePeerClient {
    fn handshake(&self, url: &str, _timeout: Duration) -> Result<obscura_network::wire::HandshakeResponse, NetworkError> {
        Ok(obscura_network::wire::HandshakeResponse {
            version: "0.6.6-beta".into(),
            network_name: "main".into(),
            address: url.to_string(),
            time_ms: obscura_core::now_ms(),
        })
    }
    fn peers(&self, _url: &str, _timeout: Duration) -> Result<Vec<String>, NetworkError> {
        Ok(Vec::new())
    }
    fn block_count(&self, url: &str, _timeout: Duration) -> Result<u64, NetworkError> {
        Ok(self.chains.lock().unwrap().get(url).map(|c| c.len() as u64).unwrap_or(0))
    }
    fn total_work(&self, url: &str, _timeout: Duration) -> Result<u128, NetworkError> {
        Ok(self
            .chains
            .lock()
            .unwrap()
            .get(url)
            .map(|c| c.iter().map(|b| 1u128 << b.header.difficulty_target).sum())
            .unwrap_or(0))
    }
    fn block_headers(&self, url: &str, start: u64, end: u64, _timeout: Duration) -> Result<Vec<BlockHeader>, NetworkError> {
        let chains = self.chains.lock().unwrap();
        let chain = chains.get(url).ok_or_else(|| NetworkError::Transport(url.to_string(), "unknown peer".into()))?;
        Ok(chain.iter().filter(|b| b.header.id >= start && b.header.id <= end).map(|b| b.header.clone()).collect())
    }
    fn block(&self, url: &str, id: u64, _timeout: Duration) -> Result<Block, NetworkError> {
        let chains = self.chains.lock().unwrap();
        let chain = chains.get(url).ok_or_else(|| NetworkError::Transport(url.to_string(), "unknown peer".into()))?;
        chain
            .iter()
            .find(|b| b.header.id == id)
            .cloned()
            .ok_or_else(|| NetworkError::Transport(url.to_string(), "no such block".into()))
    }
    fn add_transaction(&self, _url: &str, _tx: &Transaction, _timeout: Duration) -> Result<Status, NetworkError> {
        Ok(Status::Success)
    }
    fn submit_block(&self, _url: &str, _block: &Block, _timeout: Duration) -> Result<Status, NetworkError> {
        Ok(Status::Success)
    }
}

fn keypair() -> Keypair {
    Keypair::generate(&mut OsRng {})
}

fn config() -> HostManagerConfig {
    HostManagerConfig { genesis_difficulty: 0, max_reorg_depth: 100, ..Default::default() }
}

#[test]
fn diverging_heavier_peer_triggers_reorg_and_reoffers_orphaned_transaction() {
    let kp = keypair();
    let miner = address_from_signing_key(kp.public.as_bytes());

    let genesis_coinbase = Transaction::new_coinbase(miner, Amount(50), 1, 0);
    let genesis = Block::new(1, NULL_HASH, vec![genesis_coinbase], 1, 0).mine();

    let spend = Transaction::new_signed(
        miner,
        PublicAddress::from_bytes([9u8; 32]),
        Amount(30),
        Amount(1),
        obscura_core::now_ms(),
        NULL_HASH,
        0,
        kp.public,
        |m| kp.sign(m),
    );
    let local_b2_coinbase = Transaction::new_coinbase(miner, Amount(51), 2, 1);
    let local_b2 = Block::new(2, genesis.hash(), vec![local_b2_coinbase, spend.clone()], 2, 0).mine();
    let local_b3_coinbase = Transaction::new_coinbase(miner, Amount(50), 3, 2);
    let local_b3 = Block::new(3, local_b2.hash(), vec![local_b3_coinbase], 3, 0).mine();

    let chain = Arc::new(RwLock::new(ChainState::new(&genesis, Config::default()).unwrap()));
    let block_store = Arc::new(InMemoryBlockStore::default());
    block_store.append(genesis.clone());

    let client = Arc::new(FakePeerClient::default());
    let host_manager = Arc::new(HostManager::new(client.clone() as Arc<dyn PeerClient>, config()));
    let chain_view: Arc<dyn ChainStateView> = Arc::new(SharedChainState(chain.clone()));
    let mempool = Arc::new(Mempool::new(chain_view, host_manager.clone()));

    let pipeline = AcceptancePipeline::new(
        chain.clone(),
        host_manager.clone(),
        mempool.clone(),
        client.clone() as Arc<dyn PeerClient>,
        block_store,
    );

    // Build the local 3-block chain through the pipeline itself so its
    // inverse journals and block store stay consistent.
    client.set_chain("http://local", vec![genesis.clone(), local_b2.clone(), local_b3.clone()]);
    host_manager.ping("http://local");
    host_manager.refresh_header_chains();
    pipeline.sync_once();
    assert_eq!(chain.read().unwrap().height, 3);
    assert_eq!(mempool.queue_len(), 0); // the spend hasn't been gossiped to this node, only applied

    // A second peer claims a heavier/longer chain diverging right after
    // genesis: same genesis, then three blocks carrying no transactions but
    // the miner's own coinbase, reaching height 4.
    let mut prev = genesis.hash();
    let mut fork_coinbase_nonce = 10u64;
    let mut fork_chain = vec![genesis.clone()];
    for id in 2..=4u64 {
        let coinbase = Transaction::new_coinbase(miner, Amount(50), id as i64, fork_coinbase_nonce);
        fork_coinbase_nonce += 1;
        let block = Block::new(id, prev, vec![coinbase], id as i64, 0).mine();
        prev = block.hash();
        fork_chain.push(block);
    }
    client.set_chain("http://fork", fork_chain);
    host_manager.ping("http://fork");
    host_manager.refresh_header_chains();

    let applied = pipeline.sync_once();
    assert!(applied > 0);
    assert_eq!(chain.read().unwrap().height, 4, "reorg should land on the heavier peer's tip");

    // The spend transaction that was only in the undone local_b2 is absent
    // from the replacement chain, so it should have been re-offered to the
    // mempool (and be admissible: its balance/seen-tx effects were undone).
    assert_eq!(mempool.queue_len(), 1);
}
