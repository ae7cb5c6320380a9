use alloy_primitives::B256;
use ream_consensus::{
    checkpoint::Checkpoint,
    primitives::{CommitteeIndex, Epoch, Slot},
};
use thiserror::Error;

/// Returned by state queries before any block has been ingested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("no chain state has been established yet")]
pub struct NoStateError;

/// A proposed checkpoint would move finality backwards. Indicates a bug upstream of the
/// checkpoint tracker, never a peer fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{kind} checkpoint would regress from epoch {} to epoch {}", current.epoch, proposed.epoch)]
pub struct FinalityRegression {
    pub kind: &'static str,
    pub current: Checkpoint,
    pub proposed: Checkpoint,
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("block at slot {slot} with parent {parent_root} does not extend head {head_root}")]
    OrphanOrFork {
        slot: Slot,
        parent_root: B256,
        head_root: B256,
    },
    #[error("block slot {slot} is ahead of the current slot {current}")]
    FutureSlot { slot: Slot, current: Slot },
    #[error("invalid block at slot {slot}")]
    InvalidBlock {
        slot: Slot,
        #[source]
        source: anyhow::Error,
    },
    #[error("failed to persist block {root}")]
    Persistence {
        root: B256,
        #[source]
        source: anyhow::Error,
    },
    #[error(transparent)]
    NoState(#[from] NoStateError),
    #[error(transparent)]
    FinalityRegression(#[from] FinalityRegression),
}

impl IngestError {
    /// Internal invariant violations. The node must not keep following the chain.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::FinalityRegression(_))
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::OrphanOrFork { .. } | Self::FutureSlot { .. } | Self::Persistence { .. }
        )
    }
}

#[derive(Debug, Error)]
pub enum AttestationError {
    #[error(transparent)]
    NoState(#[from] NoStateError),
    #[error("target epoch {target} is neither the current nor the previous epoch of {current}")]
    TargetEpochOutOfRange { target: Epoch, current: Epoch },
    #[error("target epoch {target} does not match attestation slot {slot}")]
    TargetEpochMismatch { target: Epoch, slot: Slot },
    #[error("attestation slot {slot} is ahead of the current slot {current}")]
    FutureSlot { slot: Slot, current: Slot },
    #[error("committee index {index} is out of range, {count} committees per slot")]
    CommitteeIndexOutOfRange { index: CommitteeIndex, count: u64 },
    #[error("aggregation bits length {bits} does not match committee size {committee}")]
    CommitteeSizeMismatch { bits: usize, committee: usize },
    #[error("attestation has no participants")]
    NoParticipants,
    #[error("attestation votes for unknown block {0}")]
    UnknownBlock(B256),
    #[error("attestation signature is invalid")]
    InvalidSignature,
    #[error("failed to resolve attestation committee")]
    Committee(#[source] anyhow::Error),
}
