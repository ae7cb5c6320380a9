//! Narrow views of the chain service, one per kind of collaborator.

use std::sync::Arc;

use alloy_primitives::B256;
use ream_consensus::{
    attestation::Attestation,
    block::SignedBeaconBlock,
    checkpoint::Checkpoint,
    fork::Fork,
    primitives::{DomainType, Epoch, Slot, UnixSeconds, ValidatorIndex},
    state::BeaconState,
};

use crate::{
    error::{AttestationError, IngestError, NoStateError},
    head::Head,
    participation::ParticipationBalance,
};

/// Which side effects an ingestion performs beyond the state transition and head update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestOptions {
    pub verify_signatures: bool,
    pub run_fork_choice: bool,
    pub publish: bool,
}

impl IngestOptions {
    /// Gossip: verify, update fork choice, notify.
    pub const FULL: Self = Self {
        verify_signatures: true,
        run_fork_choice: true,
        publish: true,
    };
    pub const NO_VERIFY: Self = Self {
        verify_signatures: false,
        run_fork_choice: true,
        publish: true,
    };
    pub const NO_PUBSUB: Self = Self {
        verify_signatures: true,
        run_fork_choice: true,
        publish: false,
    };
    /// Trusted sync and replay.
    pub const NO_PUBSUB_FORKCHOICE: Self = Self {
        verify_signatures: true,
        run_fork_choice: false,
        publish: false,
    };
}

pub trait HeadReader {
    fn head_root(&self) -> B256;

    /// Slot of the head block, the anchor slot before the first block.
    fn head_slot(&self) -> Slot;

    fn head_block(&self) -> Result<Arc<SignedBeaconBlock>, NoStateError>;

    fn head_state(&self) -> Result<Arc<BeaconState>, NoStateError>;

    /// Root, block and state read together.
    fn head(&self) -> Option<Arc<Head>>;
}

pub trait BlockIngestor {
    fn ingest(
        &self,
        block: Arc<SignedBeaconBlock>,
        options: IngestOptions,
    ) -> Result<(), IngestError>;

    fn receive_block(&self, block: Arc<SignedBeaconBlock>) -> Result<(), IngestError> {
        self.ingest(block, IngestOptions::FULL)
    }

    fn receive_block_no_verify(&self, block: Arc<SignedBeaconBlock>) -> Result<(), IngestError> {
        self.ingest(block, IngestOptions::NO_VERIFY)
    }

    fn receive_block_no_pubsub(&self, block: Arc<SignedBeaconBlock>) -> Result<(), IngestError> {
        self.ingest(block, IngestOptions::NO_PUBSUB)
    }

    fn receive_block_no_pubsub_forkchoice(
        &self,
        block: Arc<SignedBeaconBlock>,
    ) -> Result<(), IngestError> {
        self.ingest(block, IngestOptions::NO_PUBSUB_FORKCHOICE)
    }
}

pub trait CheckpointReader {
    fn finalized_checkpoint(&self) -> Checkpoint;

    fn current_justified_checkpoint(&self) -> Checkpoint;

    fn previous_justified_checkpoint(&self) -> Checkpoint;
}

pub trait ValidatorSetResolver {
    fn head_validators_indices(&self, epoch: Epoch) -> Result<Vec<ValidatorIndex>, NoStateError>;

    fn head_seed(&self, epoch: Epoch, domain_type: DomainType) -> Result<B256, NoStateError>;
}

pub trait AttestationReceiver {
    fn is_valid_attestation(&self, attestation: &Attestation) -> bool;

    fn receive_attestation(&self, attestation: Attestation) -> Result<(), AttestationError>;

    fn receive_attestation_no_pubsub(
        &self,
        attestation: Attestation,
    ) -> Result<(), AttestationError>;
}

pub trait ParticipationFetcher {
    /// The most recently computed balance, whatever ``epoch`` is asked for.
    fn participation(&self, epoch: Epoch) -> Option<ParticipationBalance>;

    /// The balance computed at the start of ``epoch``, while it is still kept.
    fn participation_at(&self, epoch: Epoch) -> Option<ParticipationBalance>;
}

pub trait ForkFetcher {
    fn current_fork(&self) -> Result<Fork, NoStateError>;
}

pub trait TimeFetcher {
    fn genesis_time(&self) -> UnixSeconds;

    fn current_slot(&self) -> Slot;
}
