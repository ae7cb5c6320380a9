use std::collections::BTreeMap;

use anyhow::ensure;
use parking_lot::RwLock;
use ream_consensus::{
    constants::{TIMELY_HEAD_FLAG_INDEX, TIMELY_SOURCE_FLAG_INDEX, TIMELY_TARGET_FLAG_INDEX},
    primitives::{Epoch, Gwei},
    state::BeaconState,
};
use serde::Serialize;

/// Attesting stake of the current and previous epoch as seen by a state at the start of
/// ``epoch``. Every total is floored at one effective balance increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ParticipationBalance {
    pub epoch: Epoch,
    pub active_current_epoch: Gwei,
    pub active_previous_epoch: Gwei,
    pub current_epoch_attested: Gwei,
    pub current_epoch_target_attested: Gwei,
    pub previous_epoch_attested: Gwei,
    pub previous_epoch_target_attested: Gwei,
    pub previous_epoch_head_attested: Gwei,
}

impl ParticipationBalance {
    pub fn compute(state: &BeaconState, epoch: Epoch) -> anyhow::Result<Self> {
        ensure!(
            epoch == state.get_current_epoch(),
            "participation for epoch {epoch} requested from a state at epoch {}",
            state.get_current_epoch()
        );
        let previous_epoch = state.get_previous_epoch();
        let attested = |flag_index: u8, epoch: Epoch| {
            state
                .get_unslashed_participating_indices(flag_index, epoch)
                .map(|indices| state.get_total_balance(indices))
        };

        Ok(Self {
            epoch,
            active_current_epoch: state
                .get_total_balance(state.get_active_validator_indices(epoch)),
            active_previous_epoch: state
                .get_total_balance(state.get_active_validator_indices(previous_epoch)),
            current_epoch_attested: attested(TIMELY_SOURCE_FLAG_INDEX, epoch)?,
            current_epoch_target_attested: attested(TIMELY_TARGET_FLAG_INDEX, epoch)?,
            previous_epoch_attested: attested(TIMELY_SOURCE_FLAG_INDEX, previous_epoch)?,
            previous_epoch_target_attested: attested(TIMELY_TARGET_FLAG_INDEX, previous_epoch)?,
            previous_epoch_head_attested: attested(TIMELY_HEAD_FLAG_INDEX, previous_epoch)?,
        })
    }
}

/// Participation balances of the most recent epochs, bounded to ``capacity`` entries.
#[derive(Debug)]
pub struct ParticipationTracker {
    capacity: usize,
    history: RwLock<BTreeMap<Epoch, ParticipationBalance>>,
}

impl ParticipationTracker {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            history: RwLock::new(BTreeMap::new()),
        }
    }

    /// The most recently computed balance.
    pub fn latest(&self) -> Option<ParticipationBalance> {
        self.history
            .read()
            .last_key_value()
            .map(|(_, balance)| *balance)
    }

    /// Exact lookup. `None` once ``epoch`` has fallen out of the history.
    pub fn at(&self, epoch: Epoch) -> Option<ParticipationBalance> {
        self.history.read().get(&epoch).copied()
    }

    pub fn epochs(&self) -> Vec<Epoch> {
        self.history.read().keys().copied().collect()
    }

    pub(crate) fn record(&self, balance: ParticipationBalance) {
        let mut history = self.history.write();
        history.insert(balance.epoch, balance);
        while history.len() > self.capacity {
            history.pop_first();
        }
    }
}
