use std::sync::Arc;

use alloy_primitives::B256;
use ream_consensus::{attestation::Attestation, block::SignedBeaconBlock, primitives::Slot};
use tokio::sync::broadcast::{self, Receiver, Sender};

use crate::checkpoints::FinalityCheckpoints;

#[derive(Debug, Clone)]
pub enum StateEvent {
    CheckpointsUpdated {
        previous: FinalityCheckpoints,
        current: FinalityCheckpoints,
    },
}

#[derive(Debug, Clone)]
pub struct BlockEvent {
    pub root: B256,
    pub slot: Slot,
    pub block: Arc<SignedBeaconBlock>,
    pub signatures_verified: bool,
}

#[derive(Debug, Clone)]
pub enum OperationEvent {
    AttestationReceived(Arc<Attestation>),
}

/// The state, block and operation channels. All three are created up front; any number of
/// subscribers may join at any time. Publishing never waits on subscribers, a receiver that
/// falls more than the channel capacity behind skips the oldest events.
#[derive(Debug)]
pub struct Notifier {
    state: Sender<StateEvent>,
    block: Sender<BlockEvent>,
    operation: Sender<OperationEvent>,
}

impl Notifier {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            state: broadcast::channel(capacity).0,
            block: broadcast::channel(capacity).0,
            operation: broadcast::channel(capacity).0,
        }
    }

    pub fn subscribe_state(&self) -> Receiver<StateEvent> {
        self.state.subscribe()
    }

    pub fn subscribe_block(&self) -> Receiver<BlockEvent> {
        self.block.subscribe()
    }

    pub fn subscribe_operation(&self) -> Receiver<OperationEvent> {
        self.operation.subscribe()
    }

    /// Returns the number of subscribers the event reached.
    pub fn publish_state(&self, event: StateEvent) -> usize {
        self.state.send(event).unwrap_or_default()
    }

    pub fn publish_block(&self, event: BlockEvent) -> usize {
        self.block.send(event).unwrap_or_default()
    }

    pub fn publish_operation(&self, event: OperationEvent) -> usize {
        self.operation.send(event).unwrap_or_default()
    }
}
