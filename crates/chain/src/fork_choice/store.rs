use alloy_primitives::{map::HashMap, B256};
use ream_consensus::{
    attestation::AttestationData,
    block::BeaconBlock,
    checkpoint::Checkpoint,
    constants::GENESIS_EPOCH,
    misc::compute_start_slot_at_epoch,
    primitives::{Epoch, Gwei, Slot, ValidatorIndex},
    state::BeaconState,
};

use super::latest_message::LatestMessage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockNode {
    pub slot: Slot,
    pub parent_root: B256,
    pub justified_epoch: Epoch,
    pub finalized_epoch: Epoch,
}

/// Block tree and votes backing LMD-GHOST head selection.
#[derive(Debug, Clone, PartialEq)]
pub struct Store {
    pub anchor_root: B256,
    pub justified_checkpoint: Checkpoint,
    pub finalized_checkpoint: Checkpoint,
    pub blocks: HashMap<B256, BlockNode>,
    pub latest_messages: HashMap<ValidatorIndex, LatestMessage>,
}

impl Store {
    pub fn new(anchor_root: B256, anchor_slot: Slot) -> Self {
        let checkpoint = Checkpoint::new(GENESIS_EPOCH, anchor_root);
        let mut blocks = HashMap::default();
        blocks.insert(
            anchor_root,
            BlockNode {
                slot: anchor_slot,
                parent_root: B256::ZERO,
                justified_epoch: GENESIS_EPOCH,
                finalized_epoch: GENESIS_EPOCH,
            },
        );

        Self {
            anchor_root,
            justified_checkpoint: checkpoint,
            finalized_checkpoint: checkpoint,
            blocks,
            latest_messages: HashMap::default(),
        }
    }

    pub fn contains_block(&self, root: B256) -> bool {
        self.blocks.contains_key(&root)
    }

    /// The ancestor of ``root`` at or before ``slot``. `None` if the walk leaves the tree.
    pub fn get_ancestor(&self, mut root: B256, slot: Slot) -> Option<B256> {
        loop {
            let block = self.blocks.get(&root)?;
            if block.slot <= slot {
                return Some(root);
            }
            root = block.parent_root;
        }
    }

    pub fn get_checkpoint_block(&self, root: B256, epoch: Epoch) -> Option<B256> {
        self.get_ancestor(root, compute_start_slot_at_epoch(epoch))
    }

    pub fn descends_from_finalized(&self, root: B256) -> bool {
        (self.finalized_checkpoint.epoch == GENESIS_EPOCH && self.contains_block(root))
            || self.get_checkpoint_block(root, self.finalized_checkpoint.epoch)
                == Some(self.finalized_checkpoint.root)
    }

    pub fn insert_block(&mut self, root: B256, node: BlockNode) {
        self.blocks.insert(root, node);
    }

    pub fn on_block(&mut self, root: B256, block: &BeaconBlock, post_state: &BeaconState) {
        self.insert_block(
            root,
            BlockNode {
                slot: block.slot,
                parent_root: block.parent_root,
                justified_epoch: post_state.current_justified_checkpoint.epoch,
                finalized_epoch: post_state.finalized_checkpoint.epoch,
            },
        );
    }

    pub fn update_checkpoints(
        &mut self,
        justified_checkpoint: Checkpoint,
        finalized_checkpoint: Checkpoint,
    ) {
        if justified_checkpoint.epoch > self.justified_checkpoint.epoch {
            self.justified_checkpoint = justified_checkpoint;
        }

        if finalized_checkpoint.epoch > self.finalized_checkpoint.epoch {
            self.finalized_checkpoint = finalized_checkpoint;
        }
    }

    /// Record the votes of ``attesting_indices``. Only a vote from a later target epoch replaces
    /// an earlier one.
    pub fn on_attestation(&mut self, attesting_indices: &[ValidatorIndex], data: &AttestationData) {
        let message = LatestMessage {
            epoch: data.target.epoch,
            root: data.beacon_block_root,
        };
        for &index in attesting_indices {
            let is_newer = self
                .latest_messages
                .get(&index)
                .map_or(true, |existing| message.epoch > existing.epoch);
            if is_newer {
                self.latest_messages.insert(index, message);
            }
        }
    }

    /// Remove every block that does not descend from the finalized checkpoint block, which
    /// becomes the new anchor. Returns the number of removed blocks.
    pub fn prune(&mut self) -> usize {
        let finalized_root = self.finalized_checkpoint.root;
        let Some(finalized) = self.blocks.get(&finalized_root).copied() else {
            return 0;
        };

        let stale = self
            .blocks
            .keys()
            .filter(|&&root| self.get_ancestor(root, finalized.slot) != Some(finalized_root))
            .copied()
            .collect::<Vec<_>>();
        for root in &stale {
            self.blocks.remove(root);
        }
        self.anchor_root = finalized_root;

        stale.len()
    }

    /// Effective balance of the active, unslashed validators whose latest vote supports ``root``.
    pub fn get_weight(&self, root: B256, state: &BeaconState) -> Gwei {
        let Some(block) = self.blocks.get(&root) else {
            return 0;
        };

        state
            .get_active_validator_indices(state.get_current_epoch())
            .into_iter()
            .filter_map(|index| {
                let validator = state.validators.get(index as usize)?;
                let message = self.latest_messages.get(&index)?;
                (!validator.slashed && self.get_ancestor(message.root, block.slot) == Some(root))
                    .then_some(validator.effective_balance)
            })
            .sum()
    }

    /// Walk from the justified checkpoint block towards the leaves, always following the heaviest
    /// child. Ties go to the higher root.
    pub fn get_head(&self, state: &BeaconState) -> B256 {
        let mut head = if self.contains_block(self.justified_checkpoint.root) {
            self.justified_checkpoint.root
        } else {
            self.anchor_root
        };

        loop {
            let best_child = self
                .blocks
                .iter()
                .filter(|(_, node)| node.parent_root == head)
                .map(|(root, _)| *root)
                .max_by_key(|&root| (self.get_weight(root, state), root));
            match best_child {
                Some(child) => head = child,
                None => return head,
            }
        }
    }
}
