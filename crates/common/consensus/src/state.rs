use std::{cmp::max, collections::HashSet};

use alloy_primitives::B256;
use anyhow::{anyhow, bail, ensure};
use ethereum_hashing::{hash, hash_fixed};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use ssz_types::{BitVector, FixedVector, VariableList};
use tree_hash_derive::TreeHash;

use crate::{
    attestation::{Attestation, AttestationData, IndexedAttestation},
    block::BeaconBlockHeader,
    checkpoint::Checkpoint,
    constants::{
        EpochsPerHistoricalVector, JustificationBitsLength, SlotsPerHistoricalRoot,
        ValidatorRegistryLimit, BASE_REWARD_FACTOR, DOMAIN_BEACON_ATTESTER,
        DOMAIN_BEACON_PROPOSER, EFFECTIVE_BALANCE_INCREMENT, EPOCHS_PER_HISTORICAL_VECTOR,
        GENESIS_EPOCH, MAX_COMMITTEES_PER_SLOT, MAX_EFFECTIVE_BALANCE, MAX_RANDOM_BYTE,
        MIN_ATTESTATION_INCLUSION_DELAY, MIN_SEED_LOOKAHEAD, SLOTS_PER_EPOCH,
        SLOTS_PER_HISTORICAL_ROOT, TARGET_COMMITTEE_SIZE, TIMELY_HEAD_FLAG_INDEX,
        TIMELY_SOURCE_FLAG_INDEX, TIMELY_TARGET_FLAG_INDEX,
    },
    fork::Fork,
    misc::{
        compute_committee, compute_domain, compute_epoch_at_slot, compute_shuffled_index,
        compute_signing_root, compute_start_slot_at_epoch, integer_squareroot,
    },
    primitives::{CommitteeIndex, DomainType, Epoch, Gwei, Slot, ValidatorIndex},
    validator::Validator,
};

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize, Encode, Decode, TreeHash)]
pub struct BeaconState {
    // Versioning
    pub genesis_time: u64,
    pub genesis_validators_root: B256,
    pub slot: Slot,
    pub fork: Fork,

    // History
    pub latest_block_header: BeaconBlockHeader,
    pub block_roots: FixedVector<B256, SlotsPerHistoricalRoot>,
    pub state_roots: FixedVector<B256, SlotsPerHistoricalRoot>,

    // Registry
    pub validators: VariableList<Validator, ValidatorRegistryLimit>,
    pub balances: VariableList<Gwei, ValidatorRegistryLimit>,

    // Randomness
    pub randao_mixes: FixedVector<B256, EpochsPerHistoricalVector>,

    // Participation
    pub previous_epoch_participation: VariableList<u8, ValidatorRegistryLimit>,
    pub current_epoch_participation: VariableList<u8, ValidatorRegistryLimit>,

    // Finality
    pub justification_bits: BitVector<JustificationBitsLength>,
    pub previous_justified_checkpoint: Checkpoint,
    pub current_justified_checkpoint: Checkpoint,
    pub finalized_checkpoint: Checkpoint,
}

pub fn add_flag(flags: u8, flag_index: u8) -> u8 {
    flags | (1 << flag_index)
}

pub fn has_flag(flags: u8, flag_index: u8) -> bool {
    let flag = 1 << flag_index;
    flags & flag == flag
}

impl BeaconState {
    pub fn set_slot(&mut self, slot: Slot) {
        self.slot = slot;
    }

    /// Return the current epoch.
    pub fn get_current_epoch(&self) -> Epoch {
        compute_epoch_at_slot(self.slot)
    }

    /// Return the previous epoch (unless the current epoch is ``GENESIS_EPOCH``).
    pub fn get_previous_epoch(&self) -> Epoch {
        let current_epoch = self.get_current_epoch();
        if current_epoch == GENESIS_EPOCH {
            GENESIS_EPOCH
        } else {
            current_epoch - 1
        }
    }

    /// Return the block root at the start of a recent ``epoch``.
    pub fn get_block_root(&self, epoch: Epoch) -> anyhow::Result<B256> {
        self.get_block_root_at_slot(compute_start_slot_at_epoch(epoch))
    }

    /// Return the block root at a recent ``slot``.
    pub fn get_block_root_at_slot(&self, slot: Slot) -> anyhow::Result<B256> {
        ensure!(
            slot < self.slot && self.slot <= slot + SLOTS_PER_HISTORICAL_ROOT,
            "slot {slot} was outside of block_roots range at state slot {}",
            self.slot
        );
        Ok(self.block_roots[(slot % SLOTS_PER_HISTORICAL_ROOT) as usize])
    }

    /// Return the randao mix at a recent ``epoch``.
    pub fn get_randao_mix(&self, epoch: Epoch) -> B256 {
        self.randao_mixes[(epoch % EPOCHS_PER_HISTORICAL_VECTOR) as usize]
    }

    /// Return the sequence of active validator indices at ``epoch``.
    pub fn get_active_validator_indices(&self, epoch: Epoch) -> Vec<ValidatorIndex> {
        self.validators
            .iter()
            .enumerate()
            .filter_map(|(i, v)| v.is_active(epoch).then_some(i as u64))
            .collect()
    }

    /// Return the seed at ``epoch``.
    pub fn get_seed(&self, epoch: Epoch, domain_type: DomainType) -> B256 {
        let mix = self.get_randao_mix(
            epoch % EPOCHS_PER_HISTORICAL_VECTOR + EPOCHS_PER_HISTORICAL_VECTOR
                - MIN_SEED_LOOKAHEAD
                - 1,
        );
        let epoch_with_index =
            [domain_type.as_slice(), &epoch.to_le_bytes(), mix.as_slice()].concat();
        B256::from(hash_fixed(&epoch_with_index))
    }

    /// Return the number of committees in each slot for the given ``epoch``.
    pub fn get_committee_count_per_slot(&self, epoch: Epoch) -> u64 {
        (self.get_active_validator_indices(epoch).len() as u64
            / SLOTS_PER_EPOCH
            / TARGET_COMMITTEE_SIZE)
            .clamp(1, MAX_COMMITTEES_PER_SLOT)
    }

    /// Return the beacon committee at ``slot`` for ``index``.
    pub fn get_beacon_committee(
        &self,
        slot: Slot,
        index: CommitteeIndex,
    ) -> anyhow::Result<Vec<ValidatorIndex>> {
        let epoch = compute_epoch_at_slot(slot);
        let committees_per_slot = self.get_committee_count_per_slot(epoch);
        compute_committee(
            &self.get_active_validator_indices(epoch),
            self.get_seed(epoch, DOMAIN_BEACON_ATTESTER),
            (slot % SLOTS_PER_EPOCH) * committees_per_slot + index,
            committees_per_slot * SLOTS_PER_EPOCH,
        )
    }

    /// Return from ``indices`` a random index sampled by effective balance
    pub fn compute_proposer_index(
        &self,
        indices: &[ValidatorIndex],
        seed: B256,
    ) -> anyhow::Result<ValidatorIndex> {
        ensure!(!indices.is_empty(), "no active validators to propose");

        let mut i: usize = 0;
        let total = indices.len();

        loop {
            let candidate_index = indices[compute_shuffled_index(i % total, total, seed)?];

            let seed_with_index = [seed.as_slice(), &((i / 32) as u64).to_le_bytes()].concat();
            let random_byte = hash(&seed_with_index)[i % 32];

            let effective_balance = self.validators[candidate_index as usize].effective_balance;

            if (effective_balance * MAX_RANDOM_BYTE) >= (MAX_EFFECTIVE_BALANCE * random_byte as u64)
            {
                return Ok(candidate_index);
            }

            i += 1;
        }
    }

    /// Return the beacon proposer index at the current slot.
    pub fn get_beacon_proposer_index(&self) -> anyhow::Result<ValidatorIndex> {
        let epoch = self.get_current_epoch();
        let seed = B256::from(hash_fixed(
            &[
                self.get_seed(epoch, DOMAIN_BEACON_PROPOSER).as_slice(),
                &self.slot.to_le_bytes(),
            ]
            .concat(),
        ));
        let indices = self.get_active_validator_indices(epoch);
        self.compute_proposer_index(&indices, seed)
    }

    /// Return the combined effective balance of the ``indices``.
    /// ``EFFECTIVE_BALANCE_INCREMENT`` Gwei minimum to avoid divisions by zero.
    pub fn get_total_balance(&self, indices: impl IntoIterator<Item = ValidatorIndex>) -> Gwei {
        max(
            EFFECTIVE_BALANCE_INCREMENT,
            indices
                .into_iter()
                .filter_map(|index| self.validators.get(index as usize))
                .map(|validator| validator.effective_balance)
                .sum(),
        )
    }

    /// Return the combined effective balance of the active validators.
    pub fn get_total_active_balance(&self) -> Gwei {
        self.get_total_balance(self.get_active_validator_indices(self.get_current_epoch()))
    }

    /// Return the signature domain (fork version concatenated with domain type) of a message.
    pub fn get_domain(&self, domain_type: DomainType, epoch: Option<Epoch>) -> B256 {
        let epoch = epoch.unwrap_or_else(|| self.get_current_epoch());
        compute_domain(
            domain_type,
            self.fork.version_at(epoch),
            self.genesis_validators_root,
        )
    }

    /// Return the set of attesting indices corresponding to ``data`` and ``bits``.
    pub fn get_attesting_indices(
        &self,
        attestation: &Attestation,
    ) -> anyhow::Result<Vec<ValidatorIndex>> {
        let committee = self.get_beacon_committee(attestation.data.slot, attestation.data.index)?;
        ensure!(
            attestation.aggregation_bits.len() == committee.len(),
            "aggregation bits length {} does not match committee size {}",
            attestation.aggregation_bits.len(),
            committee.len()
        );
        Ok(committee
            .into_iter()
            .enumerate()
            .filter_map(|(i, index)| {
                attestation
                    .aggregation_bits
                    .get(i)
                    .ok()
                    .filter(|&bit| bit)
                    .map(|_| index)
            })
            .sorted()
            .dedup()
            .collect())
    }

    /// Return the indexed attestation corresponding to ``attestation``.
    pub fn get_indexed_attestation(
        &self,
        attestation: &Attestation,
    ) -> anyhow::Result<IndexedAttestation> {
        Ok(IndexedAttestation {
            attesting_indices: VariableList::new(self.get_attesting_indices(attestation)?)
                .map_err(|err| anyhow!("too many attesting indices: {err:?}"))?,
            data: attestation.data.clone(),
            signature: attestation.signature.clone(),
        })
    }

    /// Check if ``indexed_attestation`` is not empty, has sorted and unique indices and, when
    /// ``verify_signature`` is set, has a valid aggregate signature.
    pub fn is_valid_indexed_attestation(
        &self,
        indexed_attestation: &IndexedAttestation,
        verify_signature: bool,
    ) -> anyhow::Result<()> {
        let indices = &indexed_attestation.attesting_indices;
        ensure!(!indices.is_empty(), "attestation has no attesting indices");
        ensure!(
            indices.iter().tuple_windows().all(|(a, b)| a < b),
            "attesting indices are not sorted and unique"
        );

        if !verify_signature {
            return Ok(());
        }

        let pubkeys = indices
            .iter()
            .map(|&index| {
                self.validators
                    .get(index as usize)
                    .map(|validator| &validator.pubkey)
                    .ok_or_else(|| anyhow!("unknown validator index {index}"))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        let domain = self.get_domain(
            DOMAIN_BEACON_ATTESTER,
            Some(indexed_attestation.data.target.epoch),
        );
        let signing_root = compute_signing_root(&indexed_attestation.data, domain);
        ensure!(
            indexed_attestation
                .signature
                .fast_aggregate_verify(&pubkeys, signing_root),
            "attestation signature is invalid"
        );
        Ok(())
    }

    /// Increase the validator balance at index ``index`` by ``delta``.
    pub fn increase_balance(&mut self, index: ValidatorIndex, delta: Gwei) {
        if let Some(balance) = self.balances.get_mut(index as usize) {
            *balance += delta;
        }
    }

    /// Return the set of validator indices that are both active and unslashed for the given
    /// ``flag_index`` and ``epoch``.
    pub fn get_unslashed_participating_indices(
        &self,
        flag_index: u8,
        epoch: Epoch,
    ) -> anyhow::Result<HashSet<ValidatorIndex>> {
        let epoch_participation = if epoch == self.get_current_epoch() {
            &self.current_epoch_participation
        } else if epoch == self.get_previous_epoch() {
            &self.previous_epoch_participation
        } else {
            bail!("epoch {epoch} must be either the previous or current epoch");
        };

        Ok(self
            .get_active_validator_indices(epoch)
            .into_iter()
            .filter(|&index| {
                epoch_participation
                    .get(index as usize)
                    .is_some_and(|&flags| has_flag(flags, flag_index))
                    && !self.validators[index as usize].slashed
            })
            .collect())
    }

    pub fn get_base_reward_per_increment(&self) -> Gwei {
        EFFECTIVE_BALANCE_INCREMENT * BASE_REWARD_FACTOR
            / integer_squareroot(self.get_total_active_balance())
    }

    /// Return the base reward for the validator defined by ``index`` with respect to the current
    /// ``state``.
    pub fn get_base_reward(&self, index: ValidatorIndex) -> Gwei {
        let increments =
            self.validators[index as usize].effective_balance / EFFECTIVE_BALANCE_INCREMENT;
        increments * self.get_base_reward_per_increment()
    }

    /// Return the flag indices that are satisfied by an attestation.
    pub fn get_attestation_participation_flag_indices(
        &self,
        data: &AttestationData,
        inclusion_delay: u64,
    ) -> anyhow::Result<Vec<u8>> {
        let justified_checkpoint = if data.target.epoch == self.get_current_epoch() {
            self.current_justified_checkpoint
        } else {
            self.previous_justified_checkpoint
        };

        let is_matching_source = data.source == justified_checkpoint;
        ensure!(
            is_matching_source,
            "attestation source {:?} does not match justified checkpoint {justified_checkpoint:?}",
            data.source
        );
        let is_matching_target = data.target.root == self.get_block_root(data.target.epoch)?;
        let is_matching_head =
            is_matching_target && data.beacon_block_root == self.get_block_root_at_slot(data.slot)?;

        let mut participation_flag_indices = vec![];
        if inclusion_delay <= integer_squareroot(SLOTS_PER_EPOCH) {
            participation_flag_indices.push(TIMELY_SOURCE_FLAG_INDEX);
        }
        if is_matching_target {
            participation_flag_indices.push(TIMELY_TARGET_FLAG_INDEX);
        }
        if is_matching_head && inclusion_delay == MIN_ATTESTATION_INCLUSION_DELAY {
            participation_flag_indices.push(TIMELY_HEAD_FLAG_INDEX);
        }

        Ok(participation_flag_indices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interop::interop_genesis_state;

    #[rstest::rstest]
    #[case(0b000, 0, 0b001)]
    #[case(0b001, 1, 0b011)]
    #[case(0b011, 2, 0b111)]
    #[case(0b100, 2, 0b100)]
    fn test_add_flag(#[case] flags: u8, #[case] flag_index: u8, #[case] expected: u8) {
        assert_eq!(add_flag(flags, flag_index), expected);
        assert!(has_flag(expected, flag_index));
    }

    #[test]
    fn test_has_flag_checks_single_bit() {
        assert!(!has_flag(0b101, TIMELY_TARGET_FLAG_INDEX));
        assert!(has_flag(0b101, TIMELY_SOURCE_FLAG_INDEX));
        assert!(has_flag(0b101, TIMELY_HEAD_FLAG_INDEX));
    }

    #[test]
    fn test_committees_cover_all_active_validators_in_an_epoch() {
        let (state, _) = interop_genesis_state(0, 64).unwrap();
        let committees_per_slot = state.get_committee_count_per_slot(0);

        let members = (0..SLOTS_PER_EPOCH)
            .flat_map(|slot| {
                (0..committees_per_slot)
                    .flat_map(|index| state.get_beacon_committee(slot, index).unwrap())
                    .collect::<Vec<_>>()
            })
            .collect::<HashSet<_>>();

        assert_eq!(committees_per_slot, 2);
        assert_eq!(members.len(), 64);
    }

    #[test]
    fn test_block_root_lookup_rejects_current_slot() {
        let (state, _) = interop_genesis_state(0, 16).unwrap();
        assert!(state.get_block_root_at_slot(0).is_err());
    }

    #[test]
    fn test_seed_depends_on_domain_and_epoch() {
        let (state, _) = interop_genesis_state(0, 16).unwrap();

        assert_ne!(
            state.get_seed(0, DOMAIN_BEACON_ATTESTER),
            state.get_seed(0, DOMAIN_BEACON_PROPOSER)
        );
        assert_ne!(
            state.get_seed(0, DOMAIN_BEACON_ATTESTER),
            state.get_seed(1, DOMAIN_BEACON_ATTESTER)
        );
    }

    #[rstest::rstest]
    #[case(0)]
    #[case(EPOCHS_PER_HISTORICAL_VECTOR - 1)]
    #[case(u64::MAX - 1)]
    #[case(u64::MAX)]
    fn test_seed_reads_the_lookahead_mix(#[case] epoch: Epoch) {
        let (mut state, _) = interop_genesis_state(0, 16).unwrap();
        for (index, mix) in state.randao_mixes.iter_mut().enumerate() {
            *mix = B256::repeat_byte(index as u8);
        }
        let expected_index = (epoch % EPOCHS_PER_HISTORICAL_VECTOR + EPOCHS_PER_HISTORICAL_VECTOR
            - MIN_SEED_LOOKAHEAD
            - 1)
            % EPOCHS_PER_HISTORICAL_VECTOR;
        let mix = B256::repeat_byte(expected_index as u8);
        let preimage = [
            DOMAIN_BEACON_ATTESTER.as_slice(),
            &epoch.to_le_bytes(),
            mix.as_slice(),
        ]
        .concat();

        assert_eq!(
            state.get_seed(epoch, DOMAIN_BEACON_ATTESTER),
            B256::from(hash_fixed(&preimage))
        );
    }

    #[test]
    fn test_total_balance_has_a_floor() {
        let (state, _) = interop_genesis_state(0, 4).unwrap();

        assert_eq!(state.get_total_balance(std::iter::empty()), EFFECTIVE_BALANCE_INCREMENT);
        assert_eq!(state.get_total_active_balance(), 4 * MAX_EFFECTIVE_BALANCE);
    }
}
