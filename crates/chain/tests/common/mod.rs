#![allow(dead_code)]

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use alloy_primitives::B256;
use ream_chain::{ChainConfig, ChainService};
use ream_chain_harness::ChainHarness;
use ream_consensus::{block::SignedBeaconBlock, state::BeaconState};
use ream_storage::{BeaconStore, InMemoryStore, StoreError};

pub fn service(harness: &ChainHarness) -> ChainService {
    service_with(harness, ChainConfig::default(), Arc::new(InMemoryStore::new()))
}

pub fn service_with(
    harness: &ChainHarness,
    config: ChainConfig,
    storage: Arc<dyn BeaconStore>,
) -> ChainService {
    ChainService::from_genesis(config, storage, harness.genesis_state().clone()).unwrap()
}

/// Rejects every write while ``failing`` is set.
#[derive(Debug, Default)]
pub struct FlakyStore {
    inner: InMemoryStore,
    failing: AtomicBool,
}

impl FlakyStore {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("disk detached".to_owned()));
        }
        Ok(())
    }
}

impl BeaconStore for FlakyStore {
    fn save_block(&self, root: B256, block: &SignedBeaconBlock) -> Result<(), StoreError> {
        self.check()?;
        self.inner.save_block(root, block)
    }

    fn save_state(&self, root: B256, state: &BeaconState) -> Result<(), StoreError> {
        self.check()?;
        self.inner.save_state(root, state)
    }

    fn block(&self, root: B256) -> Result<Option<SignedBeaconBlock>, StoreError> {
        self.inner.block(root)
    }

    fn state(&self, root: B256) -> Result<Option<BeaconState>, StoreError> {
        self.inner.state(root)
    }
}
