//! Deterministic genesis for local networks and tests.

use alloy_primitives::B256;
use anyhow::anyhow;
use blst::min_pk::SecretKey;
use ethereum_hashing::hash_fixed;
use ssz_types::{BitVector, FixedVector, VariableList};
use tree_hash::TreeHash;

use crate::{
    block::{BeaconBlock, BeaconBlockBody, BeaconBlockHeader, SignedBeaconBlock},
    bls::{BlsSignature, PubKey},
    checkpoint::Checkpoint,
    constants::{
        EPOCHS_PER_HISTORICAL_VECTOR, FAR_FUTURE_EPOCH, GENESIS_EPOCH, GENESIS_FORK_VERSION,
        GENESIS_SLOT, MAX_EFFECTIVE_BALANCE, SLOTS_PER_HISTORICAL_ROOT,
    },
    fork::Fork,
    primitives::{UnixSeconds, ValidatorIndex},
    state::BeaconState,
    validator::Validator,
};

/// Stand-in for the eth1 block hash that seeds the genesis RANDAO mixes.
pub const INTEROP_ETH1_BLOCK_HASH: B256 = B256::repeat_byte(0x42);

/// Derive the secret key of interop validator ``index``.
pub fn interop_secret_key(index: ValidatorIndex) -> anyhow::Result<SecretKey> {
    let ikm = hash_fixed(&index.to_le_bytes());
    SecretKey::key_gen(&ikm, &[])
        .map_err(|err| anyhow!("failed to derive interop key {index}: {err:?}"))
}

/// Build a genesis state with ``validator_count`` active validators, each at the maximum
/// effective balance, together with their secret keys.
pub fn interop_genesis_state(
    genesis_time: UnixSeconds,
    validator_count: u64,
) -> anyhow::Result<(BeaconState, Vec<SecretKey>)> {
    let secret_keys = (0..validator_count)
        .map(interop_secret_key)
        .collect::<anyhow::Result<Vec<_>>>()?;

    let validators = secret_keys
        .iter()
        .map(|secret_key| {
            let pubkey = PubKey::from(&secret_key.sk_to_pk());
            let mut withdrawal_credentials = hash_fixed(&pubkey.inner[..]);
            withdrawal_credentials[0] = 0;
            Validator {
                pubkey,
                withdrawal_credentials: B256::from(withdrawal_credentials),
                effective_balance: MAX_EFFECTIVE_BALANCE,
                slashed: false,
                activation_eligibility_epoch: GENESIS_EPOCH,
                activation_epoch: GENESIS_EPOCH,
                exit_epoch: FAR_FUTURE_EPOCH,
                withdrawable_epoch: FAR_FUTURE_EPOCH,
            }
        })
        .collect::<Vec<_>>();
    let count = validators.len();
    let list_error = |err: ssz_types::Error| anyhow!("validator registry overflow: {err:?}");
    let validators = VariableList::new(validators).map_err(list_error)?;

    let state = BeaconState {
        genesis_time,
        genesis_validators_root: validators.tree_hash_root(),
        slot: GENESIS_SLOT,
        fork: Fork {
            previous_version: GENESIS_FORK_VERSION,
            current_version: GENESIS_FORK_VERSION,
            epoch: GENESIS_EPOCH,
        },
        latest_block_header: BeaconBlockHeader {
            body_root: BeaconBlockBody::default().tree_hash_root(),
            ..Default::default()
        },
        block_roots: FixedVector::from(vec![B256::ZERO; SLOTS_PER_HISTORICAL_ROOT as usize]),
        state_roots: FixedVector::from(vec![B256::ZERO; SLOTS_PER_HISTORICAL_ROOT as usize]),
        validators,
        balances: VariableList::new(vec![MAX_EFFECTIVE_BALANCE; count]).map_err(list_error)?,
        randao_mixes: FixedVector::from(vec![
            INTEROP_ETH1_BLOCK_HASH;
            EPOCHS_PER_HISTORICAL_VECTOR as usize
        ]),
        previous_epoch_participation: VariableList::new(vec![0; count]).map_err(list_error)?,
        current_epoch_participation: VariableList::new(vec![0; count]).map_err(list_error)?,
        justification_bits: BitVector::new(),
        previous_justified_checkpoint: Checkpoint::default(),
        current_justified_checkpoint: Checkpoint::default(),
        finalized_checkpoint: Checkpoint::default(),
    };

    Ok((state, secret_keys))
}

/// The unsigned block committing to ``genesis_state``. Its root anchors the chain.
pub fn genesis_block(genesis_state: &BeaconState) -> SignedBeaconBlock {
    SignedBeaconBlock {
        message: BeaconBlock {
            slot: genesis_state.slot,
            proposer_index: 0,
            parent_root: B256::ZERO,
            state_root: genesis_state.tree_hash_root(),
            body: BeaconBlockBody::default(),
        },
        signature: BlsSignature::default(),
    }
}
