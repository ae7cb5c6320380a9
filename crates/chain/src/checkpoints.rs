use std::{cmp::Ordering, sync::Arc};

use alloy_primitives::B256;
use arc_swap::ArcSwap;
use ream_consensus::{checkpoint::Checkpoint, constants::GENESIS_EPOCH, state::BeaconState};

use crate::error::FinalityRegression;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FinalityCheckpoints {
    pub previous_justified: Checkpoint,
    pub current_justified: Checkpoint,
    pub finalized: Checkpoint,
}

impl FinalityCheckpoints {
    /// All three checkpoints at the genesis epoch, pointing at ``anchor_root``.
    pub fn anchored(anchor_root: B256) -> Self {
        let checkpoint = Checkpoint::new(GENESIS_EPOCH, anchor_root);
        Self {
            previous_justified: checkpoint,
            current_justified: checkpoint,
            finalized: checkpoint,
        }
    }

    pub fn from_state(state: &BeaconState) -> Self {
        Self {
            previous_justified: state.previous_justified_checkpoint,
            current_justified: state.current_justified_checkpoint,
            finalized: state.finalized_checkpoint,
        }
    }

    /// Merge ``proposed`` into these checkpoints. A checkpoint is taken only from a strictly later
    /// epoch, so the anchor roots survive the zero roots states carry for the genesis epoch.
    pub fn merge(&self, proposed: &Self) -> Result<Self, FinalityRegression> {
        let merged = Self {
            previous_justified: advance_checkpoint(
                "previous justified",
                self.previous_justified,
                proposed.previous_justified,
            )?,
            current_justified: advance_checkpoint(
                "current justified",
                self.current_justified,
                proposed.current_justified,
            )?,
            finalized: advance_checkpoint("finalized", self.finalized, proposed.finalized)?,
        };

        if merged.finalized.epoch > merged.current_justified.epoch {
            return Err(FinalityRegression {
                kind: "current justified",
                current: merged.current_justified,
                proposed: merged.finalized,
            });
        }

        Ok(merged)
    }
}

fn advance_checkpoint(
    kind: &'static str,
    current: Checkpoint,
    proposed: Checkpoint,
) -> Result<Checkpoint, FinalityRegression> {
    match proposed.epoch.cmp(&current.epoch) {
        Ordering::Less => Err(FinalityRegression {
            kind,
            current,
            proposed,
        }),
        Ordering::Equal => Ok(current),
        Ordering::Greater => Ok(proposed),
    }
}

/// Current, previous justified and finalized checkpoints. Written only by the ingestion
/// pipeline while it holds the writer lock; read lock-free.
#[derive(Debug)]
pub struct CheckpointTracker {
    checkpoints: ArcSwap<FinalityCheckpoints>,
}

impl CheckpointTracker {
    pub fn new(initial: FinalityCheckpoints) -> Self {
        Self {
            checkpoints: ArcSwap::from_pointee(initial),
        }
    }

    pub fn snapshot(&self) -> FinalityCheckpoints {
        **self.checkpoints.load()
    }

    pub fn current_justified(&self) -> Checkpoint {
        self.checkpoints.load().current_justified
    }

    pub fn previous_justified(&self) -> Checkpoint {
        self.checkpoints.load().previous_justified
    }

    pub fn finalized(&self) -> Checkpoint {
        self.checkpoints.load().finalized
    }

    /// Merge ``proposed`` into the stored checkpoints. Returns whether anything changed; on a
    /// regression nothing is stored.
    pub(crate) fn advance(
        &self,
        proposed: &FinalityCheckpoints,
    ) -> Result<bool, FinalityRegression> {
        let current = self.snapshot();
        let merged = current.merge(proposed)?;
        if merged == current {
            return Ok(false);
        }
        self.checkpoints.store(Arc::new(merged));
        Ok(true)
    }
}
