mod common;

use std::sync::Arc;

use alloy_primitives::B256;
use ream_chain::{
    AttestationError, AttestationReceiver, BlockIngestor, ChainConfig, ChainService, HeadReader,
};
use ream_chain_harness::ChainHarness;
use ream_consensus::{attestation::Attestation, bls::BlsSignature};
use ream_storage::InMemoryStore;
use rstest::rstest;
use ssz_types::BitList;

use crate::common::{service, service_with};

/// A chain with one block and a valid attestation for it.
fn attested_chain(genesis_time: u64) -> (ChainService, ChainHarness, Attestation) {
    let mut harness = ChainHarness::build(genesis_time, 16, true).unwrap();
    let chain = service_with(
        &harness,
        ChainConfig::default(),
        Arc::new(InMemoryStore::new()),
    );
    chain.receive_block(harness.extend(1).unwrap()).unwrap();

    let attestation = harness
        .attestations_for(harness.head_state(), harness.head_root())
        .unwrap()
        .remove(0);
    (chain, harness, attestation)
}

#[test]
fn test_valid_attestation_is_accepted() {
    let (chain, harness, attestation) = attested_chain(0);

    assert!(chain.is_valid_attestation(&attestation));
    chain.receive_attestation(attestation).unwrap();
    assert_eq!(chain.fork_choice_head().unwrap(), harness.head_root());
}

#[test]
fn test_attestation_before_the_first_block_has_no_state() {
    let mut harness = ChainHarness::attesting(16).unwrap();
    let chain = service(&harness);
    let block = harness.extend(1).unwrap();
    let attestation = block.message.body.attestations[0].clone();

    assert!(!chain.is_valid_attestation(&attestation));
    assert!(matches!(
        chain.receive_attestation(attestation),
        Err(AttestationError::NoState(_))
    ));
}

#[test]
fn test_attestation_from_the_future_is_rejected() {
    let (chain, _, mut attestation) = attested_chain(4_000_000_000);
    attestation.data.slot = 3;

    assert!(matches!(
        chain.receive_attestation(attestation),
        Err(AttestationError::FutureSlot { slot: 3, current: 1 })
    ));
}

#[rstest]
#[case::bad_signature(|attestation: &mut Attestation| {
    attestation.signature = BlsSignature::default();
})]
#[case::unknown_block(|attestation: &mut Attestation| {
    attestation.data.beacon_block_root = B256::repeat_byte(7);
})]
#[case::no_participants(|attestation: &mut Attestation| {
    attestation.aggregation_bits = BitList::with_capacity(attestation.aggregation_bits.len()).unwrap();
})]
#[case::committee_size(|attestation: &mut Attestation| {
    attestation.aggregation_bits = BitList::with_capacity(attestation.aggregation_bits.len() + 1).unwrap();
})]
#[case::committee_index(|attestation: &mut Attestation| {
    attestation.data.index = 9;
})]
#[case::target_epoch(|attestation: &mut Attestation| {
    attestation.data.target.epoch = 5;
})]
#[case::target_slot_mismatch(|attestation: &mut Attestation| {
    attestation.data.slot = 9;
})]
fn test_malformed_attestation_is_rejected(#[case] tamper: fn(&mut Attestation)) {
    let (chain, harness, mut attestation) = attested_chain(0);
    tamper(&mut attestation);

    assert!(!chain.is_valid_attestation(&attestation));
    let error = chain.receive_attestation(attestation.clone()).unwrap_err();
    match error {
        AttestationError::InvalidSignature => {
            assert_eq!(attestation.signature, BlsSignature::default())
        }
        AttestationError::UnknownBlock(root) => assert_eq!(root, B256::repeat_byte(7)),
        AttestationError::NoParticipants => {
            assert_eq!(attestation.aggregation_bits.num_set_bits(), 0)
        }
        AttestationError::CommitteeSizeMismatch { bits, committee } => {
            assert_eq!(bits, committee + 1)
        }
        AttestationError::CommitteeIndexOutOfRange { index: 9, count: 1 } => {}
        AttestationError::TargetEpochOutOfRange { target: 5, current: 0 } => {}
        AttestationError::TargetEpochMismatch { target: 0, slot: 9 } => {}
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(chain.head_root(), harness.head_root());
}
