use std::sync::Arc;

use alloy_primitives::B256;
use ream_consensus::{block::SignedBeaconBlock, state::BeaconState};

use crate::error::StoreError;

/// Key-addressed block and state storage. Blocks are keyed by their block root, states by the
/// root of the block they are the post-state of.
///
/// A successful write is durable. Writing an already stored root again succeeds.
pub trait BeaconStore: Send + Sync {
    fn save_block(&self, root: B256, block: &SignedBeaconBlock) -> Result<(), StoreError>;

    fn save_state(&self, root: B256, state: &BeaconState) -> Result<(), StoreError>;

    fn block(&self, root: B256) -> Result<Option<SignedBeaconBlock>, StoreError>;

    fn state(&self, root: B256) -> Result<Option<BeaconState>, StoreError>;

    fn contains_block(&self, root: B256) -> Result<bool, StoreError> {
        Ok(self.block(root)?.is_some())
    }
}

impl<S: BeaconStore + ?Sized> BeaconStore for Arc<S> {
    fn save_block(&self, root: B256, block: &SignedBeaconBlock) -> Result<(), StoreError> {
        (**self).save_block(root, block)
    }

    fn save_state(&self, root: B256, state: &BeaconState) -> Result<(), StoreError> {
        (**self).save_state(root, state)
    }

    fn block(&self, root: B256) -> Result<Option<SignedBeaconBlock>, StoreError> {
        (**self).block(root)
    }

    fn state(&self, root: B256) -> Result<Option<BeaconState>, StoreError> {
        (**self).state(root)
    }

    fn contains_block(&self, root: B256) -> Result<bool, StoreError> {
        (**self).contains_block(root)
    }
}
