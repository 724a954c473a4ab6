use ed25519_dalek::{Keypair, Signer};
use rand::rngs::OsRng;

use obscura_core::address::PublicAddress;
use obscura_core::amount::Amount;
use obscura_core::block::Block;
use obscura_core::config::Config;
use obscura_core::chain_state::ChainState;
use obscura_core::pow;
use obscura_core::status::Status;
use obscura_core::transaction::{address_from_signing_key, Transaction};
use obscura_core::NULL_HASH;

fn keypair() -> Keypair {
    Keypair::generate(&mut OsRng {})
}

#[test]
fn pow_zero_difficulty_passes() {
    let random_hash = [0xAAu8; 32];
    assert!(pow::hash_meets_difficulty(&random_hash, 0));
}

#[test]
fn mining_produces_a_block_meeting_declared_difficulty() {
    let coinbase = Transaction::new_coinbase(PublicAddress::from_bytes([1u8; 32]), Amount(50), 1, 0);
    let block = Block::new(1, NULL_HASH, vec![coinbase], 1, 8).mine();
    assert!(pow::hash_meets_difficulty(&block.hash(), 8));
}

/// §8 property 7: serialize-then-deserialize of a Transaction is the identity.
#[test]
fn transaction_round_trips_through_bincode() {
    let kp = keypair();
    let from = address_from_signing_key(kp.public.as_bytes());
    let to = PublicAddress::from_bytes([9u8; 32]);
    let tx = Transaction::new_signed(
        from,
        to,
        Amount(10),
        Amount(1),
        1_000,
        NULL_HASH,
        7,
        kp.public,
        |msg| kp.sign(msg),
    );

    let encoded = bincode::serialize(&tx).expect("serialize");
    let decoded: Transaction = bincode::deserialize(&encoded).expect("deserialize");
    assert_eq!(tx.hash(), decoded.hash());
    assert_eq!(decoded.amount, Amount(10));
    assert!(decoded.verify_signature().is_ok());
}

/// §8 property 7: serialize-then-deserialize of a Block is the identity.
#[test]
fn block_round_trips_through_bincode() {
    let coinbase = Transaction::new_coinbase(PublicAddress::from_bytes([2u8; 32]), Amount(50), 1, 0);
    let block = Block::new(1, NULL_HASH, vec![coinbase], 1, 8).mine();

    let encoded = bincode::serialize(&block).expect("serialize");
    let decoded: Block = bincode::deserialize(&encoded).expect("deserialize");
    assert_eq!(block.hash(), decoded.hash());
    assert_eq!(block.header.merkle_root, decoded.header.merkle_root);
}

/// An end-to-end walk across two blocks: genesis funds a sender, the sender
/// spends part of it, the chain tip and balances move accordingly, and the
/// applied block can be undone back to genesis state (§4.E inverse journal).
#[test]
fn genesis_then_spend_then_undo() {
    let kp = keypair();
    let from = address_from_signing_key(kp.public.as_bytes());
    let to = PublicAddress::from_bytes([5u8; 32]);

    let genesis_coinbase = Transaction::new_coinbase(from, Amount(100), 1, 0);
    let genesis = Block::new(1, NULL_HASH, vec![genesis_coinbase], 1, 0);
    let mut state = ChainState::new(&genesis, Config::default()).unwrap();
    assert_eq!(state.balance(&from), Amount(100));

    let spend = Transaction::new_signed(
        from,
        to,
        Amount(40),
        Amount(1),
        obscura_core::now_ms(),
        NULL_HASH,
        0,
        kp.public,
        |m| kp.sign(m),
    );
    assert_eq!(state.verify_transaction(&spend), Status::Success);

    let reward = Transaction::new_coinbase(from, Amount(51), obscura_core::now_ms(), 1);
    let block2 = Block::new(2, state.best_hash, vec![reward, spend], obscura_core::now_ms(), 0);
    let delta = state.accept_block(&block2).unwrap();

    assert_eq!(state.height, 2);
    assert_eq!(state.balance(&to), Amount(40));
    assert_eq!(state.balance(&from), Amount(110));

    state.undo_block(&delta);
    assert_eq!(state.height, 1);
    assert_eq!(state.balance(&to), Amount::ZERO);
    assert_eq!(state.balance(&from), Amount(100));
}
