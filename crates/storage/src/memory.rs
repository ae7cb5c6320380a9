use std::collections::HashMap;

use alloy_primitives::B256;
use parking_lot::RwLock;
use ream_consensus::{block::SignedBeaconBlock, state::BeaconState};
use ssz::{Decode, Encode};

use crate::{error::StoreError, store::BeaconStore};

/// Keeps SSZ encoded blocks and states in memory.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    blocks: RwLock<HashMap<B256, Vec<u8>>>,
    states: RwLock<HashMap<B256, Vec<u8>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn block_count(&self) -> usize {
        self.blocks.read().len()
    }

    pub fn state_count(&self) -> usize {
        self.states.read().len()
    }
}

fn decode<T: Decode>(kind: &'static str, root: B256, bytes: &[u8]) -> Result<T, StoreError> {
    T::from_ssz_bytes(bytes).map_err(|err| StoreError::Decode {
        kind,
        root,
        reason: format!("{err:?}"),
    })
}

impl BeaconStore for InMemoryStore {
    fn save_block(&self, root: B256, block: &SignedBeaconBlock) -> Result<(), StoreError> {
        self.blocks
            .write()
            .entry(root)
            .or_insert_with(|| block.as_ssz_bytes());
        Ok(())
    }

    fn save_state(&self, root: B256, state: &BeaconState) -> Result<(), StoreError> {
        self.states
            .write()
            .entry(root)
            .or_insert_with(|| state.as_ssz_bytes());
        Ok(())
    }

    fn block(&self, root: B256) -> Result<Option<SignedBeaconBlock>, StoreError> {
        self.blocks
            .read()
            .get(&root)
            .map(|bytes| decode("block", root, bytes))
            .transpose()
    }

    fn state(&self, root: B256) -> Result<Option<BeaconState>, StoreError> {
        self.states
            .read()
            .get(&root)
            .map(|bytes| decode("state", root, bytes))
            .transpose()
    }

    fn contains_block(&self, root: B256) -> Result<bool, StoreError> {
        Ok(self.blocks.read().contains_key(&root))
    }
}

#[cfg(test)]
mod tests {
    use ream_consensus::interop::{genesis_block, interop_genesis_state};

    use super::*;

    #[test]
    fn test_block_and_state_round_trip_by_root() {
        let store = InMemoryStore::new();
        let (state, _) = interop_genesis_state(0, 4).unwrap();
        let block = genesis_block(&state);
        let root = block.message.block_root();

        store.save_block(root, &block).unwrap();
        store.save_state(root, &state).unwrap();

        assert!(store.contains_block(root).unwrap());
        assert_eq!(store.block(root).unwrap(), Some(block));
        assert_eq!(store.state(root).unwrap(), Some(state));
    }

    #[test]
    fn test_unknown_root_is_none() {
        let store = InMemoryStore::new();

        assert!(!store.contains_block(B256::ZERO).unwrap());
        assert_eq!(store.block(B256::ZERO).unwrap(), None);
        assert_eq!(store.state(B256::ZERO).unwrap(), None);
    }

    #[test]
    fn test_saving_twice_is_idempotent() {
        let store = InMemoryStore::new();
        let (state, _) = interop_genesis_state(0, 4).unwrap();
        let block = genesis_block(&state);
        let root = block.message.block_root();

        store.save_block(root, &block).unwrap();
        store.save_block(root, &block).unwrap();

        assert_eq!(store.block_count(), 1);
        assert_eq!(store.state_count(), 0);
    }

    #[test]
    fn test_corrupt_bytes_surface_decode_error() {
        let store = InMemoryStore::new();
        store.blocks.write().insert(B256::ZERO, vec![1, 2, 3]);

        assert!(matches!(
            store.block(B256::ZERO),
            Err(StoreError::Decode { kind: "block", .. })
        ));
    }
}
