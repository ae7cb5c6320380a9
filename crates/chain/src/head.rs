use std::sync::Arc;

use alloy_primitives::B256;
use arc_swap::ArcSwapOption;
use ream_consensus::{block::SignedBeaconBlock, primitives::Slot, state::BeaconState};

use crate::error::NoStateError;

/// The block and post-state the node treats as the tip of the canonical chain.
#[derive(Debug, Clone)]
pub struct Head {
    pub root: B256,
    pub block: Arc<SignedBeaconBlock>,
    pub state: Arc<BeaconState>,
}

impl Head {
    pub fn slot(&self) -> Slot {
        self.block.message.slot
    }
}

/// Holds the current [`Head`] as one immutable snapshot. Replacing the snapshot is a single
/// pointer swap, so readers see either the previous or the next head, never a mix.
#[derive(Debug)]
pub struct HeadTracker {
    anchor_root: B256,
    anchor_slot: Slot,
    head: ArcSwapOption<Head>,
}

impl HeadTracker {
    pub fn new(anchor_root: B256, anchor_slot: Slot) -> Self {
        Self {
            anchor_root,
            anchor_slot,
            head: ArcSwapOption::empty(),
        }
    }

    pub fn anchor_root(&self) -> B256 {
        self.anchor_root
    }

    pub fn snapshot(&self) -> Option<Arc<Head>> {
        self.head.load_full()
    }

    /// Root new blocks must build on. The anchor root until the first block lands.
    pub fn root(&self) -> B256 {
        self.head
            .load()
            .as_ref()
            .map_or(self.anchor_root, |head| head.root)
    }

    pub fn slot(&self) -> Slot {
        self.head
            .load()
            .as_ref()
            .map_or(self.anchor_slot, |head| head.slot())
    }

    pub fn block(&self) -> Result<Arc<SignedBeaconBlock>, NoStateError> {
        self.snapshot()
            .map(|head| head.block.clone())
            .ok_or(NoStateError)
    }

    pub fn state(&self) -> Result<Arc<BeaconState>, NoStateError> {
        self.snapshot()
            .map(|head| head.state.clone())
            .ok_or(NoStateError)
    }

    pub(crate) fn replace(&self, head: Head) {
        self.head.store(Some(Arc::new(head)));
    }
}

#[cfg(test)]
mod tests {
    use ream_consensus::interop::{genesis_block, interop_genesis_state};

    use super::*;

    #[test]
    fn test_empty_tracker_reports_anchor() {
        let tracker = HeadTracker::new(B256::repeat_byte(7), 0);

        assert_eq!(tracker.root(), B256::repeat_byte(7));
        assert_eq!(tracker.slot(), 0);
        assert!(tracker.snapshot().is_none());
        assert_eq!(tracker.state().unwrap_err(), NoStateError);
        assert_eq!(tracker.block().unwrap_err(), NoStateError);
    }

    #[test]
    fn test_replace_swaps_the_whole_tuple() {
        let (state, _) = interop_genesis_state(0, 4).unwrap();
        let block = genesis_block(&state);
        let root = block.message.block_root();
        let tracker = HeadTracker::new(B256::ZERO, 0);
        let before = tracker.snapshot();

        tracker.replace(Head {
            root,
            block: Arc::new(block),
            state: Arc::new(state),
        });

        assert!(before.is_none());
        let head = tracker.snapshot().unwrap();
        assert_eq!(tracker.root(), root);
        assert_eq!(head.block.message.block_root(), head.root);
        assert_eq!(head.state.slot, head.slot());
    }
}
