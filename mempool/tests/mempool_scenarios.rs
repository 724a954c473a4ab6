//! End-to-end admission scenarios (§8 S1-S3), exercised against the public
//! `Mempool` API the way `obscura-node`'s and `obscura-network`'s own
//! `tests/` directories exercise their crates.

use std::sync::Arc;

use ed25519_dalek::{Keypair, Signer};
use rand::rngs::OsRng;

use obscura_core::transaction::address_from_signing_key;
use obscura_core::{Amount, Block, ChainState, Config, PublicAddress, Status, Transaction, NULL_HASH};
use obscura_mempool::Mempool;
use obscura_network::NetworkTimeSource;

fn keypair() -> Keypair {
    Keypair::generate(&mut OsRng {})
}

/// A `NetworkTimeSource` fixture that just reports local time, standing in
/// for a running `HostManager` in these admission scenarios.
struct LocalTimeSource;
impl NetworkTimeSource for LocalTimeSource {
    fn network_timestamp(&self) -> i64 {
        obscura_core::now_ms()
    }
}

fn genesis_state(to: PublicAddress, reward: u64) -> ChainState {
    let coinbase = Transaction::new_coinbase(to, Amount(reward), 1, 0);
    let genesis = Block::new(1, NULL_HASH, vec![coinbase], 1, 0);
    ChainState::new(&genesis, Config::default()).unwrap()
}

fn signed_tx(kp: &Keypair, from: PublicAddress, to: PublicAddress, amount: u64, fee: u64, nonce: u64) -> Transaction {
    Transaction::new_signed(
        from,
        to,
        Amount(amount),
        Amount(fee),
        obscura_core::now_ms(),
        NULL_HASH,
        nonce,
        kp.public,
        |m| kp.sign(m),
    )
}

/// S1: a transaction whose fee is below `MIN_FEE_TO_ENTER_MEMPOOL` never
/// enters the queue.
#[test]
fn s1_low_fee_transaction_is_rejected() {
    let kp = keypair();
    let from = address_from_signing_key(kp.public.as_bytes());
    let to = PublicAddress::from_bytes([9u8; 32]);
    let state = Arc::new(genesis_state(from, 100));
    let mempool = Mempool::new(state, Arc::new(LocalTimeSource));

    let tx = signed_tx(&kp, from, to, 50, 0, 0);
    assert_eq!(mempool.add_transaction(tx), Status::TransactionFeeTooLow);
    assert_eq!(mempool.queue_len(), 0);
}

/// S2: a second transaction that would overspend the sender's balance given
/// their already-admitted outgoing bill is rejected, without disturbing the
/// first transaction's admission.
#[test]
fn s2_transaction_overspending_outgoing_bill_is_rejected() {
    let kp = keypair();
    let from = address_from_signing_key(kp.public.as_bytes());
    let to_b = PublicAddress::from_bytes([2u8; 32]);
    let to_c = PublicAddress::from_bytes([3u8; 32]);
    let state = Arc::new(genesis_state(from, 100));
    let mempool = Mempool::new(state, Arc::new(LocalTimeSource));

    let first = signed_tx(&kp, from, to_b, 60, 1, 0);
    assert_eq!(mempool.add_transaction(first), Status::Success);

    let second = signed_tx(&kp, from, to_c, 50, 1, 1);
    assert_eq!(mempool.add_transaction(second), Status::BalanceTooLow);
    assert_eq!(mempool.queue_len(), 1);
}

/// S3: once a block carrying a pending transaction is applied, that
/// transaction is pruned from the queue and its sender's outgoing bill is
/// cleared.
#[test]
fn s3_finish_block_prunes_applied_transactions() {
    let kp = keypair();
    let from = address_from_signing_key(kp.public.as_bytes());
    let to = PublicAddress::from_bytes([2u8; 32]);
    let state = Arc::new(genesis_state(from, 100));
    let mempool = Mempool::new(state, Arc::new(LocalTimeSource));

    let tx = signed_tx(&kp, from, to, 60, 1, 0);
    assert_eq!(mempool.add_transaction(tx.clone()), Status::Success);

    let coinbase = Transaction::new_coinbase(from, Amount(51), obscura_core::now_ms(), 1);
    let block = Block::new(2, NULL_HASH, vec![coinbase, tx], obscura_core::now_ms(), 0);
    mempool.finish_block(&block, NULL_HASH);

    assert_eq!(mempool.queue_len(), 0);
    assert_eq!(mempool.outgoing_for(&from), Amount::ZERO);
}
