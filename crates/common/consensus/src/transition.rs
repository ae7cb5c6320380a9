//! Block and epoch processing.
//!
//! Rewards, penalties and registry churn belong to the reward logic consuming
//! participation and are not applied at epoch boundaries here.

use alloy_primitives::B256;
use anyhow::{anyhow, ensure};
use ethereum_hashing::hash_fixed;
use ssz_types::VariableList;
use tree_hash::TreeHash;

use crate::{
    attestation::Attestation,
    block::{BeaconBlock, BeaconBlockBody, BeaconBlockHeader, SignedBeaconBlock},
    checkpoint::Checkpoint,
    constants::{
        DOMAIN_BEACON_PROPOSER, DOMAIN_RANDAO, EFFECTIVE_BALANCE_INCREMENT,
        EPOCHS_PER_HISTORICAL_VECTOR, GENESIS_EPOCH, JUSTIFICATION_BITS_LENGTH,
        MIN_ATTESTATION_INCLUSION_DELAY, PARTICIPATION_FLAG_WEIGHTS, PROPOSER_WEIGHT,
        SLOTS_PER_EPOCH, SLOTS_PER_HISTORICAL_ROOT, TIMELY_TARGET_FLAG_INDEX, WEIGHT_DENOMINATOR,
    },
    misc::{compute_epoch_at_slot, compute_signing_root},
    primitives::Slot,
    state::{add_flag, has_flag, BeaconState},
};

/// Apply ``signed_block`` to ``state``. On error the state is left partially modified and must
/// be discarded by the caller.
pub fn state_transition(
    state: &mut BeaconState,
    signed_block: &SignedBeaconBlock,
    verify_signatures: bool,
) -> anyhow::Result<()> {
    let block = &signed_block.message;

    process_slots(state, block.slot)?;

    if verify_signatures {
        verify_block_signature(state, signed_block)?;
    }

    process_block(state, block, verify_signatures)?;

    let state_root = state.tree_hash_root();
    ensure!(
        block.state_root == state_root,
        "block state root {} does not match post-state root {state_root}",
        block.state_root
    );

    Ok(())
}

pub fn verify_block_signature(
    state: &BeaconState,
    signed_block: &SignedBeaconBlock,
) -> anyhow::Result<()> {
    let block = &signed_block.message;
    let proposer = state
        .validators
        .get(block.proposer_index as usize)
        .ok_or_else(|| anyhow!("unknown proposer index {}", block.proposer_index))?;
    let domain = state.get_domain(
        DOMAIN_BEACON_PROPOSER,
        Some(compute_epoch_at_slot(block.slot)),
    );
    let signing_root = compute_signing_root(block, domain);
    ensure!(
        signed_block.signature.verify(&proposer.pubkey, signing_root),
        "block signature is invalid"
    );
    Ok(())
}

pub fn process_slots(state: &mut BeaconState, slot: Slot) -> anyhow::Result<()> {
    ensure!(
        state.slot < slot,
        "target slot {slot} must be later than state slot {}",
        state.slot
    );

    while state.slot < slot {
        process_slot(state);
        // Process epoch on the start slot of the next epoch
        if (state.slot + 1) % SLOTS_PER_EPOCH == 0 {
            process_epoch(state)?;
        }
        state.set_slot(state.slot + 1);
    }

    Ok(())
}

pub fn process_slot(state: &mut BeaconState) {
    // Cache state root
    let previous_state_root = state.tree_hash_root();
    let index = (state.slot % SLOTS_PER_HISTORICAL_ROOT) as usize;
    state.state_roots[index] = previous_state_root;

    // Cache latest block header state root
    if state.latest_block_header.state_root == B256::ZERO {
        state.latest_block_header.state_root = previous_state_root;
    }

    // Cache block root
    state.block_roots[index] = state.latest_block_header.tree_hash_root();
}

pub fn process_epoch(state: &mut BeaconState) -> anyhow::Result<()> {
    process_justification_and_finalization(state)?;
    process_randao_mixes_reset(state);
    process_participation_flag_updates(state)
}

pub fn process_justification_and_finalization(state: &mut BeaconState) -> anyhow::Result<()> {
    // Initial FFG checkpoint values have a `0x00` stub for `root`.
    // Skip FFG updates in the first two epochs to avoid corner cases that might result in
    // modifying this stub.
    if state.get_current_epoch() <= GENESIS_EPOCH + 1 {
        return Ok(());
    }

    let previous_indices = state
        .get_unslashed_participating_indices(TIMELY_TARGET_FLAG_INDEX, state.get_previous_epoch())?;
    let current_indices = state
        .get_unslashed_participating_indices(TIMELY_TARGET_FLAG_INDEX, state.get_current_epoch())?;
    let total_active_balance = state.get_total_active_balance();
    let previous_target_balance = state.get_total_balance(previous_indices);
    let current_target_balance = state.get_total_balance(current_indices);

    weigh_justification_and_finalization(
        state,
        total_active_balance,
        previous_target_balance,
        current_target_balance,
    )
}

fn justification_bits(state: &BeaconState) -> anyhow::Result<[bool; JUSTIFICATION_BITS_LENGTH]> {
    let mut bits = [false; JUSTIFICATION_BITS_LENGTH];
    for (index, bit) in bits.iter_mut().enumerate() {
        *bit = state
            .justification_bits
            .get(index)
            .map_err(|err| anyhow!("justification bit {index}: {err:?}"))?;
    }
    Ok(bits)
}

pub fn weigh_justification_and_finalization(
    state: &mut BeaconState,
    total_active_balance: u64,
    previous_epoch_target_balance: u64,
    current_epoch_target_balance: u64,
) -> anyhow::Result<()> {
    let previous_epoch = state.get_previous_epoch();
    let current_epoch = state.get_current_epoch();
    let old_previous_justified_checkpoint = state.previous_justified_checkpoint;
    let old_current_justified_checkpoint = state.current_justified_checkpoint;

    // Process justifications
    state.previous_justified_checkpoint = state.current_justified_checkpoint;
    let old_bits = justification_bits(state)?;
    let mut bits = [false; JUSTIFICATION_BITS_LENGTH];
    bits[1..].copy_from_slice(&old_bits[..JUSTIFICATION_BITS_LENGTH - 1]);

    if previous_epoch_target_balance * 3 >= total_active_balance * 2 {
        state.current_justified_checkpoint =
            Checkpoint::new(previous_epoch, state.get_block_root(previous_epoch)?);
        bits[1] = true;
    }
    if current_epoch_target_balance * 3 >= total_active_balance * 2 {
        state.current_justified_checkpoint =
            Checkpoint::new(current_epoch, state.get_block_root(current_epoch)?);
        bits[0] = true;
    }

    for (index, bit) in bits.iter().enumerate() {
        state
            .justification_bits
            .set(index, *bit)
            .map_err(|err| anyhow!("justification bit {index}: {err:?}"))?;
    }

    // Process finalizations
    // The 2nd/3rd/4th most recent epochs are justified, the 2nd using the 4th as source
    if bits[1..4].iter().all(|&bit| bit)
        && old_previous_justified_checkpoint.epoch + 3 == current_epoch
    {
        state.finalized_checkpoint = old_previous_justified_checkpoint;
    }
    // The 2nd/3rd most recent epochs are justified, the 2nd using the 3rd as source
    if bits[1..3].iter().all(|&bit| bit)
        && old_previous_justified_checkpoint.epoch + 2 == current_epoch
    {
        state.finalized_checkpoint = old_previous_justified_checkpoint;
    }
    // The 1st/2nd/3rd most recent epochs are justified, the 1st using the 3rd as source
    if bits[0..3].iter().all(|&bit| bit)
        && old_current_justified_checkpoint.epoch + 2 == current_epoch
    {
        state.finalized_checkpoint = old_current_justified_checkpoint;
    }
    // The 1st/2nd most recent epochs are justified, the 1st using the 2nd as source
    if bits[0..2].iter().all(|&bit| bit)
        && old_current_justified_checkpoint.epoch + 1 == current_epoch
    {
        state.finalized_checkpoint = old_current_justified_checkpoint;
    }

    Ok(())
}

pub fn process_randao_mixes_reset(state: &mut BeaconState) {
    let current_epoch = state.get_current_epoch();
    let next_epoch = current_epoch + 1;
    state.randao_mixes[(next_epoch % EPOCHS_PER_HISTORICAL_VECTOR) as usize] =
        state.get_randao_mix(current_epoch);
}

pub fn process_participation_flag_updates(state: &mut BeaconState) -> anyhow::Result<()> {
    state.previous_epoch_participation = state.current_epoch_participation.clone();
    state.current_epoch_participation = VariableList::new(vec![0; state.validators.len()])
        .map_err(|err| anyhow!("participation list overflow: {err:?}"))?;
    Ok(())
}

pub fn process_block(
    state: &mut BeaconState,
    block: &BeaconBlock,
    verify_signatures: bool,
) -> anyhow::Result<()> {
    process_block_header(state, block)?;
    process_randao(state, &block.body, verify_signatures)?;
    for attestation in block.body.attestations.iter() {
        process_attestation(state, attestation, verify_signatures)?;
    }
    Ok(())
}

pub fn process_block_header(state: &mut BeaconState, block: &BeaconBlock) -> anyhow::Result<()> {
    // Verify that the slots match
    ensure!(
        block.slot == state.slot,
        "block slot {} does not match state slot {}",
        block.slot,
        state.slot
    );
    // Verify that the block is newer than latest block header
    ensure!(
        block.slot > state.latest_block_header.slot,
        "block is not newer than the latest block header"
    );
    // Verify that proposer index is the correct index
    let proposer_index = state.get_beacon_proposer_index()?;
    ensure!(
        block.proposer_index == proposer_index,
        "block proposer {} is not the expected proposer {proposer_index}",
        block.proposer_index
    );
    // Verify that the parent matches
    let parent_root = state.latest_block_header.tree_hash_root();
    ensure!(
        block.parent_root == parent_root,
        "block parent {} does not match latest block header {parent_root}",
        block.parent_root
    );
    // Verify proposer is not slashed
    ensure!(
        !state.validators[proposer_index as usize].slashed,
        "proposer {proposer_index} is slashed"
    );

    // Cache current block as the new latest block
    state.latest_block_header = BeaconBlockHeader {
        slot: block.slot,
        proposer_index: block.proposer_index,
        parent_root: block.parent_root,
        // Overwritten in the next process_slot call
        state_root: B256::ZERO,
        body_root: block.body.tree_hash_root(),
    };

    Ok(())
}

pub fn process_randao(
    state: &mut BeaconState,
    body: &BeaconBlockBody,
    verify_signatures: bool,
) -> anyhow::Result<()> {
    let epoch = state.get_current_epoch();

    if verify_signatures {
        let proposer = &state.validators[state.get_beacon_proposer_index()? as usize];
        let signing_root = compute_signing_root(&epoch, state.get_domain(DOMAIN_RANDAO, None));
        ensure!(
            body.randao_reveal.verify(&proposer.pubkey, signing_root),
            "randao reveal is invalid"
        );
    }

    // Mix in RANDAO reveal
    let mix = state.get_randao_mix(epoch)
        ^ B256::from(hash_fixed(&body.randao_reveal.signature[..]));
    state.randao_mixes[(epoch % EPOCHS_PER_HISTORICAL_VECTOR) as usize] = mix;

    Ok(())
}

pub fn process_attestation(
    state: &mut BeaconState,
    attestation: &Attestation,
    verify_signatures: bool,
) -> anyhow::Result<()> {
    let data = &attestation.data;
    let current_epoch = state.get_current_epoch();

    ensure!(
        data.target.epoch == state.get_previous_epoch() || data.target.epoch == current_epoch,
        "attestation target epoch {} is neither the previous nor the current epoch",
        data.target.epoch
    );
    ensure!(
        data.target.epoch == compute_epoch_at_slot(data.slot),
        "attestation target epoch does not match its slot"
    );
    ensure!(
        data.slot + MIN_ATTESTATION_INCLUSION_DELAY <= state.slot
            && state.slot <= data.slot + SLOTS_PER_EPOCH,
        "attestation from slot {} cannot be included at slot {}",
        data.slot,
        state.slot
    );
    ensure!(
        data.index < state.get_committee_count_per_slot(data.target.epoch),
        "attestation committee index {} out of range",
        data.index
    );

    // Participation flag indices
    let participation_flag_indices =
        state.get_attestation_participation_flag_indices(data, state.slot - data.slot)?;

    // Verify signature
    let indexed_attestation = state.get_indexed_attestation(attestation)?;
    state.is_valid_indexed_attestation(&indexed_attestation, verify_signatures)?;

    // Update epoch participation flags
    let base_reward_per_increment = state.get_base_reward_per_increment();
    let is_current = data.target.epoch == current_epoch;
    let mut proposer_reward_numerator = 0;
    for &index in indexed_attestation.attesting_indices.iter() {
        let base_reward = state.validators[index as usize].effective_balance
            / EFFECTIVE_BALANCE_INCREMENT
            * base_reward_per_increment;
        let epoch_participation = if is_current {
            &mut state.current_epoch_participation
        } else {
            &mut state.previous_epoch_participation
        };
        let flags = epoch_participation
            .get_mut(index as usize)
            .ok_or_else(|| anyhow!("no participation entry for validator {index}"))?;

        for (flag_index, weight) in PARTICIPATION_FLAG_WEIGHTS.iter().enumerate() {
            let flag_index = flag_index as u8;
            if participation_flag_indices.contains(&flag_index) && !has_flag(*flags, flag_index) {
                *flags = add_flag(*flags, flag_index);
                proposer_reward_numerator += base_reward * weight;
            }
        }
    }

    // Reward proposer
    let proposer_reward_denominator =
        (WEIGHT_DENOMINATOR - PROPOSER_WEIGHT) * WEIGHT_DENOMINATOR / PROPOSER_WEIGHT;
    let proposer_reward = proposer_reward_numerator / proposer_reward_denominator;
    let proposer_index = state.get_beacon_proposer_index()?;
    state.increase_balance(proposer_index, proposer_reward);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        bls::BlsSignature,
        interop::{genesis_block, interop_genesis_state},
    };

    fn empty_block_at(state: &BeaconState, slot: Slot) -> SignedBeaconBlock {
        let mut post_state = state.clone();
        process_slots(&mut post_state, slot).unwrap();
        let mut block = BeaconBlock {
            slot,
            proposer_index: post_state.get_beacon_proposer_index().unwrap(),
            parent_root: post_state.latest_block_header.tree_hash_root(),
            state_root: B256::ZERO,
            body: BeaconBlockBody::default(),
        };
        process_block(&mut post_state, &block, false).unwrap();
        block.state_root = post_state.tree_hash_root();
        SignedBeaconBlock {
            message: block,
            signature: BlsSignature::default(),
        }
    }

    #[test]
    fn test_process_slots_caches_genesis_block_root() {
        let (mut state, _) = interop_genesis_state(0, 16).unwrap();
        let genesis_root = genesis_block(&state).message.block_root();

        process_slots(&mut state, 3).unwrap();

        assert_eq!(state.slot, 3);
        assert_eq!(state.block_roots[0], genesis_root);
        assert_eq!(state.get_block_root_at_slot(2).unwrap(), genesis_root);
        assert_eq!(state.latest_block_header.tree_hash_root(), genesis_root);
    }

    #[test]
    fn test_process_slots_rejects_past_slot() {
        let (mut state, _) = interop_genesis_state(0, 16).unwrap();
        process_slots(&mut state, 2).unwrap();

        assert!(process_slots(&mut state, 2).is_err());
        assert!(process_slots(&mut state, 1).is_err());
    }

    #[test]
    fn test_epoch_processing_rotates_participation() {
        let (mut state, _) = interop_genesis_state(0, 16).unwrap();
        state.current_epoch_participation[3] = 0b111;

        process_slots(&mut state, SLOTS_PER_EPOCH).unwrap();

        assert_eq!(state.previous_epoch_participation[3], 0b111);
        assert!(state.current_epoch_participation.iter().all(|&flags| flags == 0));
        assert_eq!(state.get_randao_mix(1), state.get_randao_mix(0));
    }

    #[test]
    fn test_empty_block_applies_without_signature_checks() {
        let (state, _) = interop_genesis_state(0, 16).unwrap();
        let block = empty_block_at(&state, 1);

        let mut post_state = state.clone();
        state_transition(&mut post_state, &block, false).unwrap();

        assert_eq!(post_state.slot, 1);
        assert_eq!(post_state.tree_hash_root(), block.message.state_root);
    }

    #[test]
    fn test_unsigned_block_fails_signature_checks() {
        let (state, _) = interop_genesis_state(0, 16).unwrap();
        let block = empty_block_at(&state, 1);

        let mut post_state = state.clone();
        assert!(state_transition(&mut post_state, &block, true).is_err());
    }

    #[test]
    fn test_block_with_wrong_state_root_is_rejected() {
        let (state, _) = interop_genesis_state(0, 16).unwrap();
        let mut block = empty_block_at(&state, 2);
        block.message.state_root = B256::repeat_byte(9);

        let mut post_state = state.clone();
        assert!(state_transition(&mut post_state, &block, false).is_err());
    }

    #[test]
    fn test_justification_with_full_target_participation() {
        let (mut state, _) = interop_genesis_state(0, 16).unwrap();
        process_slots(&mut state, 3 * SLOTS_PER_EPOCH - 1).unwrap();
        let total = state.get_total_active_balance();

        weigh_justification_and_finalization(&mut state, total, total, total).unwrap();

        assert_eq!(state.current_justified_checkpoint.epoch, 2);
        assert_eq!(state.previous_justified_checkpoint.epoch, GENESIS_EPOCH);
        assert_eq!(state.finalized_checkpoint.epoch, GENESIS_EPOCH);
        assert_eq!(justification_bits(&state).unwrap(), [true, true, false, false]);
    }

    #[test]
    fn test_justification_without_participation_keeps_checkpoints() {
        let (mut state, _) = interop_genesis_state(0, 16).unwrap();
        process_slots(&mut state, 3 * SLOTS_PER_EPOCH - 1).unwrap();
        let total = state.get_total_active_balance();
        let before = state.current_justified_checkpoint;

        weigh_justification_and_finalization(&mut state, total, 0, 0).unwrap();

        assert_eq!(state.current_justified_checkpoint, before);
        assert_eq!(justification_bits(&state).unwrap(), [false; 4]);
    }
}
