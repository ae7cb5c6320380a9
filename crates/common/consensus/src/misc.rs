use std::cmp::max;

use alloy_primitives::B256;
use anyhow::ensure;
use ethereum_hashing::hash_fixed;
use tree_hash::TreeHash;
use tree_hash_derive::TreeHash;

use crate::{
    constants::{SHUFFLE_ROUND_COUNT, SLOTS_PER_EPOCH},
    fork::compute_fork_data_root,
    primitives::{DomainType, Epoch, Slot, ValidatorIndex, Version},
};

#[derive(Debug, PartialEq, Clone, Copy, TreeHash)]
pub struct SigningData {
    pub object_root: B256,
    pub domain: B256,
}

/// Return the epoch number at ``slot``.
pub fn compute_epoch_at_slot(slot: Slot) -> Epoch {
    slot / SLOTS_PER_EPOCH
}

/// Return the start slot of ``epoch``.
pub fn compute_start_slot_at_epoch(epoch: Epoch) -> Slot {
    epoch * SLOTS_PER_EPOCH
}

pub fn is_epoch_start(slot: Slot) -> bool {
    slot % SLOTS_PER_EPOCH == 0
}

/// Return the largest integer ``x`` such that ``x**2 <= n``.
pub fn integer_squareroot(n: u64) -> u64 {
    if n == u64::MAX {
        return 4_294_967_295;
    }
    let mut x = n;
    let mut y = (x + 1) / 2;
    while y < x {
        x = y;
        y = (x + n / x) / 2;
    }
    x
}

/// Return the shuffled index corresponding to ``seed`` (and ``index_count``).
pub fn compute_shuffled_index(
    mut index: usize,
    index_count: usize,
    seed: B256,
) -> anyhow::Result<usize> {
    ensure!(index < index_count, "index must be less than index_count");

    for current_round in 0..SHUFFLE_ROUND_COUNT {
        let pivot_hash = hash_fixed(&[seed.as_slice(), &[current_round]].concat());
        let pivot = u64::from_le_bytes(pivot_hash[..8].try_into()?) % index_count as u64;
        let flip = (pivot as usize + index_count - index) % index_count;
        let position = max(index, flip);
        let source = hash_fixed(
            &[
                seed.as_slice(),
                &[current_round],
                &((position / 256) as u32).to_le_bytes(),
            ]
            .concat(),
        );
        let byte = source[(position % 256) / 8];
        let bit = (byte >> (position % 8)) % 2;
        if bit == 1 {
            index = flip;
        }
    }

    Ok(index)
}

/// Return the committee corresponding to ``indices``, ``seed``, ``index``, and committee
/// ``count``.
pub fn compute_committee(
    indices: &[ValidatorIndex],
    seed: B256,
    index: u64,
    count: u64,
) -> anyhow::Result<Vec<ValidatorIndex>> {
    ensure!(index < count, "committee index {index} out of range {count}");
    let len = indices.len() as u64;
    let start = (len * index / count) as usize;
    let end = (len * (index + 1) / count) as usize;
    (start..end)
        .map(|i| {
            compute_shuffled_index(i, indices.len(), seed).map(|shuffled| indices[shuffled])
        })
        .collect()
}

/// Return the domain for the ``domain_type`` and ``fork_version``.
pub fn compute_domain(
    domain_type: DomainType,
    fork_version: Version,
    genesis_validators_root: B256,
) -> B256 {
    let fork_data_root = compute_fork_data_root(fork_version, genesis_validators_root);
    let mut domain = [0; 32];
    domain[..4].copy_from_slice(domain_type.as_slice());
    domain[4..].copy_from_slice(&fork_data_root[..28]);
    B256::from(domain)
}

/// Return the signing root for the corresponding signing data.
pub fn compute_signing_root<SSZObject: TreeHash>(ssz_object: &SSZObject, domain: B256) -> B256 {
    SigningData {
        object_root: ssz_object.tree_hash_root(),
        domain,
    }
    .tree_hash_root()
}
