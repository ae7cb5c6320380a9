//! Builds valid, fully signed chains on top of an interop genesis.

use std::sync::Arc;

use alloy_primitives::B256;
use anyhow::{anyhow, ensure};
use blst::min_pk::SecretKey;
use ream_consensus::{
    attestation::{Attestation, AttestationData},
    block::{BeaconBlock, BeaconBlockBody, SignedBeaconBlock},
    bls::BlsSignature,
    checkpoint::Checkpoint,
    constants::{DOMAIN_BEACON_ATTESTER, DOMAIN_BEACON_PROPOSER, DOMAIN_RANDAO, SLOTS_PER_EPOCH},
    interop::{genesis_block, interop_genesis_state},
    misc::{compute_epoch_at_slot, compute_signing_root, compute_start_slot_at_epoch},
    primitives::{Slot, UnixSeconds, ValidatorIndex},
    state::BeaconState,
    transition::{process_block, process_slots},
};
use ssz_types::{BitList, VariableList};
use tree_hash::TreeHash;

pub const DEFAULT_VALIDATOR_COUNT: u64 = 64;

/// Proposes on top of its own head. When attesting, every validator votes for each new head
/// and the next blocks include those votes while they are still includable.
pub struct ChainHarness {
    secret_keys: Vec<SecretKey>,
    genesis_state: BeaconState,
    genesis_root: B256,
    head_state: BeaconState,
    head_root: B256,
    pending_attestations: Vec<Attestation>,
    attest: bool,
}

impl ChainHarness {
    /// Empty blocks only.
    pub fn new(validator_count: u64) -> anyhow::Result<Self> {
        Self::build(0, validator_count, false)
    }

    pub fn attesting(validator_count: u64) -> anyhow::Result<Self> {
        Self::build(0, validator_count, true)
    }

    pub fn build(
        genesis_time: UnixSeconds,
        validator_count: u64,
        attest: bool,
    ) -> anyhow::Result<Self> {
        let (genesis_state, secret_keys) = interop_genesis_state(genesis_time, validator_count)?;
        let genesis_root = genesis_block(&genesis_state).message.block_root();

        let mut harness = Self {
            secret_keys,
            head_state: genesis_state.clone(),
            genesis_state,
            genesis_root,
            head_root: genesis_root,
            pending_attestations: vec![],
            attest,
        };
        if attest {
            harness.pending_attestations =
                harness.attestations_for(&harness.head_state, genesis_root)?;
        }

        Ok(harness)
    }

    pub fn genesis_state(&self) -> &BeaconState {
        &self.genesis_state
    }

    pub fn genesis_root(&self) -> B256 {
        self.genesis_root
    }

    pub fn head_state(&self) -> &BeaconState {
        &self.head_state
    }

    pub fn head_root(&self) -> B256 {
        self.head_root
    }

    pub fn head_slot(&self) -> Slot {
        self.head_state.slot
    }

    pub fn secret_key(&self, index: ValidatorIndex) -> anyhow::Result<&SecretKey> {
        self.secret_keys
            .get(index as usize)
            .ok_or_else(|| anyhow!("no secret key for validator {index}"))
    }

    /// Build and sign the block at ``slot`` on top of ``pre_state``, returning it with its
    /// post-state. The harness head does not move.
    pub fn build_block_on(
        &self,
        pre_state: &BeaconState,
        slot: Slot,
        attestations: Vec<Attestation>,
    ) -> anyhow::Result<(SignedBeaconBlock, BeaconState)> {
        let mut state = pre_state.clone();
        process_slots(&mut state, slot)?;

        let proposer_index = state.get_beacon_proposer_index()?;
        let proposer_key = self.secret_key(proposer_index)?;
        let epoch = state.get_current_epoch();
        let randao_reveal = BlsSignature::sign(
            proposer_key,
            compute_signing_root(&epoch, state.get_domain(DOMAIN_RANDAO, None)),
        );

        let mut block = BeaconBlock {
            slot,
            proposer_index,
            parent_root: state.latest_block_header.tree_hash_root(),
            state_root: B256::ZERO,
            body: BeaconBlockBody {
                randao_reveal,
                graffiti: B256::ZERO,
                attestations: VariableList::new(attestations)
                    .map_err(|err| anyhow!("too many attestations: {err:?}"))?,
            },
        };
        process_block(&mut state, &block, false)?;
        block.state_root = state.tree_hash_root();

        let signature = BlsSignature::sign(
            proposer_key,
            compute_signing_root(&block, state.get_domain(DOMAIN_BEACON_PROPOSER, None)),
        );

        Ok((
            SignedBeaconBlock {
                message: block,
                signature,
            },
            state,
        ))
    }

    /// One fully aggregated attestation per committee at ``state.slot``, voting for
    /// ``head_root``.
    pub fn attestations_for(
        &self,
        state: &BeaconState,
        head_root: B256,
    ) -> anyhow::Result<Vec<Attestation>> {
        let slot = state.slot;
        let epoch = compute_epoch_at_slot(slot);
        let target_root = if compute_start_slot_at_epoch(epoch) == slot {
            head_root
        } else {
            state.get_block_root(epoch)?
        };
        let domain = state.get_domain(DOMAIN_BEACON_ATTESTER, Some(epoch));

        let mut attestations = vec![];
        for index in 0..state.get_committee_count_per_slot(epoch) {
            let data = AttestationData {
                slot,
                index,
                beacon_block_root: head_root,
                source: state.current_justified_checkpoint,
                target: Checkpoint::new(epoch, target_root),
            };
            let signing_root = compute_signing_root(&data, domain);

            let committee = state.get_beacon_committee(slot, index)?;
            let mut aggregation_bits = BitList::with_capacity(committee.len())
                .map_err(|err| anyhow!("committee too large: {err:?}"))?;
            let mut signatures = Vec::with_capacity(committee.len());
            for (position, &validator_index) in committee.iter().enumerate() {
                aggregation_bits
                    .set(position, true)
                    .map_err(|err| anyhow!("invalid committee position: {err:?}"))?;
                signatures.push(BlsSignature::sign(
                    self.secret_key(validator_index)?,
                    signing_root,
                ));
            }

            attestations.push(Attestation {
                aggregation_bits,
                data,
                signature: BlsSignature::aggregate(&signatures)?,
            });
        }

        Ok(attestations)
    }

    /// Propose the next block at ``slot`` and move the head onto it.
    pub fn extend(&mut self, slot: Slot) -> anyhow::Result<Arc<SignedBeaconBlock>> {
        ensure!(
            slot > self.head_state.slot,
            "slot {slot} is not after head slot {}",
            self.head_state.slot
        );

        let mut attestations = std::mem::take(&mut self.pending_attestations);
        attestations.retain(|attestation| attestation.data.slot + SLOTS_PER_EPOCH >= slot);
        let (block, state) = self.build_block_on(&self.head_state, slot, attestations)?;

        let root = block.message.block_root();
        self.head_state = state;
        self.head_root = root;
        if self.attest {
            let attestations = self.attestations_for(&self.head_state, root)?;
            self.pending_attestations = attestations;
        }

        Ok(Arc::new(block))
    }

    /// Propose a block at every slot up to and including ``slot``.
    pub fn extend_to(&mut self, slot: Slot) -> anyhow::Result<Vec<Arc<SignedBeaconBlock>>> {
        (self.head_state.slot + 1..=slot)
            .map(|slot| self.extend(slot))
            .collect()
    }
}
