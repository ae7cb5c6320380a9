use std::sync::Arc;

use alloy_primitives::B256;
use anyhow::anyhow;
use parking_lot::Mutex;
use ream_consensus::{
    attestation::{Attestation, AttestationData},
    block::SignedBeaconBlock,
    checkpoint::Checkpoint,
    fork::Fork,
    interop::genesis_block,
    misc::{compute_epoch_at_slot, compute_signing_root},
    primitives::{DomainType, Epoch, Slot, UnixSeconds, ValidatorIndex},
    state::BeaconState,
    transition::state_transition,
};
use ream_storage::BeaconStore;
use tracing::{debug, error, info, warn};

use crate::{
    checkpoints::{CheckpointTracker, FinalityCheckpoints},
    clock::SlotClock,
    config::ChainConfig,
    error::{AttestationError, IngestError, NoStateError},
    fork_choice::Store,
    head::{Head, HeadTracker},
    notifier::{BlockEvent, Notifier, OperationEvent, StateEvent},
    participation::{ParticipationBalance, ParticipationTracker},
    traits::{
        AttestationReceiver, BlockIngestor, CheckpointReader, ForkFetcher, HeadReader,
        IngestOptions, ParticipationFetcher, TimeFetcher, ValidatorSetResolver,
    },
};

/// Slots a block may run ahead of the local clock before it is refused.
const MAX_FUTURE_SLOTS: Slot = 1;

/// Outcome of a commit, published once the writer lock is released.
struct Committed {
    root: B256,
    slot: Slot,
    checkpoints: Option<(FinalityCheckpoints, FinalityCheckpoints)>,
}

/// Accepts blocks and attestations and maintains the canonical head, finality checkpoints and
/// participation of the chain.
///
/// Ingestion is serialized by the lock around the fork choice store, held from the parent
/// linkage check until the new head is visible. Head, checkpoint and participation reads never
/// take that lock. Block tree queries and attestation handling do.
pub struct ChainService {
    config: ChainConfig,
    storage: Arc<dyn BeaconStore>,
    head: HeadTracker,
    checkpoints: CheckpointTracker,
    participation: ParticipationTracker,
    clock: SlotClock,
    notifier: Notifier,
    fork_choice: Mutex<Store>,
}

impl ChainService {
    /// Store the genesis block and state, then anchor the chain at the genesis block.
    pub fn from_genesis(
        mut config: ChainConfig,
        storage: Arc<dyn BeaconStore>,
        genesis_state: BeaconState,
    ) -> anyhow::Result<Self> {
        if config.genesis_time != genesis_state.genesis_time {
            warn!(
                configured = config.genesis_time,
                genesis_state = genesis_state.genesis_time,
                "Configured genesis time differs from genesis state, using the state's"
            );
            config.genesis_time = genesis_state.genesis_time;
        }

        let genesis_block = genesis_block(&genesis_state);
        let genesis_root = genesis_block.message.block_root();
        storage.save_block(genesis_root, &genesis_block)?;
        storage.save_state(genesis_root, &genesis_state)?;
        info!(
            root = %genesis_root,
            validators = genesis_state.validators.len(),
            "Stored genesis block and state"
        );

        Self::new(config, storage, genesis_root)
    }

    /// Anchor the chain at ``anchor_root``, a block already in storage. There is no head until
    /// the first block on top of the anchor is ingested.
    pub fn new(
        config: ChainConfig,
        storage: Arc<dyn BeaconStore>,
        anchor_root: B256,
    ) -> anyhow::Result<Self> {
        config.validate()?;
        let anchor_slot = storage
            .block(anchor_root)?
            .ok_or_else(|| anyhow!("anchor block {anchor_root} is not in storage"))?
            .message
            .slot;

        Ok(Self {
            head: HeadTracker::new(anchor_root, anchor_slot),
            checkpoints: CheckpointTracker::new(FinalityCheckpoints::anchored(anchor_root)),
            participation: ParticipationTracker::new(config.participation_history),
            clock: SlotClock::new(config.genesis_time, config.seconds_per_slot),
            notifier: Notifier::new(config.notification_capacity),
            fork_choice: Mutex::new(Store::new(anchor_root, anchor_slot)),
            storage,
            config,
        })
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub fn clock(&self) -> &SlotClock {
        &self.clock
    }

    pub fn anchor_root(&self) -> B256 {
        self.head.anchor_root()
    }

    pub fn finality_checkpoints(&self) -> FinalityCheckpoints {
        self.checkpoints.snapshot()
    }

    /// Epochs whose participation is still kept, oldest first.
    pub fn participation_epochs(&self) -> Vec<Epoch> {
        self.participation.epochs()
    }

    /// LMD-GHOST head of the block tree, weighted by the head state's balances.
    pub fn fork_choice_head(&self) -> Result<B256, NoStateError> {
        let state = self.head.state()?;
        Ok(self.fork_choice.lock().get_head(&state))
    }

    pub fn ancestor(&self, root: B256, slot: Slot) -> Option<B256> {
        self.fork_choice.lock().get_ancestor(root, slot)
    }

    pub fn is_known_block(&self, root: B256) -> bool {
        self.fork_choice.lock().contains_block(root)
    }

    /// Attester seed of the head state at ``epoch``, under the configured attester domain.
    pub fn head_attester_seed(&self, epoch: Epoch) -> Result<B256, NoStateError> {
        self.head_seed(epoch, self.config.domain_beacon_attester)
    }

    fn commit(
        &self,
        fork_choice: &mut Store,
        block: &Arc<SignedBeaconBlock>,
        options: IngestOptions,
    ) -> Result<Committed, IngestError> {
        let message = &block.message;
        let head_root = self.head.root();
        let orphan = || IngestError::OrphanOrFork {
            slot: message.slot,
            parent_root: message.parent_root,
            head_root,
        };

        if message.parent_root != head_root {
            return Err(orphan());
        }
        if options.run_fork_choice && !fork_choice.descends_from_finalized(message.parent_root) {
            return Err(orphan());
        }
        let current = self.clock.current_slot().max(self.head.slot());
        if message.slot > current.saturating_add(MAX_FUTURE_SLOTS) {
            return Err(IngestError::FutureSlot {
                slot: message.slot,
                current,
            });
        }

        let mut state = match self.head.snapshot() {
            Some(head) => BeaconState::clone(&head.state),
            None => self
                .storage
                .state(head_root)
                .map_err(|err| IngestError::Persistence {
                    root: head_root,
                    source: err.into(),
                })?
                .ok_or(NoStateError)?,
        };
        let pre_epoch = state.get_current_epoch();

        let invalid = |source| IngestError::InvalidBlock {
            slot: message.slot,
            source,
        };
        state_transition(&mut state, block, options.verify_signatures).map_err(invalid)?;
        let root = message.block_root();

        let votes = if options.run_fork_choice {
            message
                .body
                .attestations
                .iter()
                .map(|attestation| {
                    state
                        .get_attesting_indices(attestation)
                        .map(|indices| (indices, attestation.data.clone()))
                })
                .collect::<anyhow::Result<Vec<(Vec<ValidatorIndex>, AttestationData)>>>()
                .map_err(invalid)?
        } else {
            vec![]
        };

        let persistence = |err: ream_storage::StoreError| IngestError::Persistence {
            root,
            source: err.into(),
        };
        self.storage.save_block(root, block).map_err(persistence)?;
        self.storage.save_state(root, &state).map_err(persistence)?;
        info!(%root, slot = message.slot, "Saved block");

        let post_epoch = state.get_current_epoch();
        let mut checkpoints = None;
        if post_epoch > pre_epoch {
            let balance = ParticipationBalance::compute(&state, post_epoch).map_err(invalid)?;
            let previous = self.checkpoints.snapshot();
            let changed = self
                .checkpoints
                .advance(&FinalityCheckpoints::from_state(&state))?;

            self.participation.record(balance);
            debug!(epoch = post_epoch, ?balance, "Recomputed participation");

            if changed {
                let current = self.checkpoints.snapshot();
                info!(
                    justified_epoch = current.current_justified.epoch,
                    justified_root = %current.current_justified.root,
                    finalized_epoch = current.finalized.epoch,
                    finalized_root = %current.finalized.root,
                    "Updated checkpoints"
                );
                checkpoints = Some((previous, current));
            }
        }

        fork_choice.on_block(root, message, &state);
        let finality = self.checkpoints.snapshot();
        let finalized = fork_choice.finalized_checkpoint;
        fork_choice.update_checkpoints(finality.current_justified, finality.finalized);
        if options.run_fork_choice {
            for (indices, data) in &votes {
                fork_choice.on_attestation(indices, data);
            }
        }
        if fork_choice.finalized_checkpoint != finalized {
            let pruned = fork_choice.prune();
            debug!(pruned, anchor = %fork_choice.anchor_root, "Pruned block tree");
        }

        self.head.replace(Head {
            root,
            block: block.clone(),
            state: Arc::new(state),
        });

        Ok(Committed {
            root,
            slot: message.slot,
            checkpoints,
        })
    }

    fn publish(&self, committed: Committed, block: Arc<SignedBeaconBlock>, options: IngestOptions) {
        self.notifier.publish_block(BlockEvent {
            root: committed.root,
            slot: committed.slot,
            block,
            signatures_verified: options.verify_signatures,
        });
        if let Some((previous, current)) = committed.checkpoints {
            self.notifier
                .publish_state(StateEvent::CheckpointsUpdated { previous, current });
        }
    }

    fn validate_attestation(
        &self,
        attestation: &Attestation,
    ) -> Result<Vec<ValidatorIndex>, AttestationError> {
        let state = self.head.state()?;
        let data = &attestation.data;

        let current_epoch = state.get_current_epoch();
        if data.target.epoch != current_epoch && data.target.epoch != state.get_previous_epoch() {
            return Err(AttestationError::TargetEpochOutOfRange {
                target: data.target.epoch,
                current: current_epoch,
            });
        }
        if data.target.epoch != compute_epoch_at_slot(data.slot) {
            return Err(AttestationError::TargetEpochMismatch {
                target: data.target.epoch,
                slot: data.slot,
            });
        }

        let current_slot = self.clock.current_slot().max(state.slot);
        if data.slot > current_slot {
            return Err(AttestationError::FutureSlot {
                slot: data.slot,
                current: current_slot,
            });
        }

        let count = state.get_committee_count_per_slot(data.target.epoch);
        if data.index >= count {
            return Err(AttestationError::CommitteeIndexOutOfRange {
                index: data.index,
                count,
            });
        }
        let committee = state
            .get_beacon_committee(data.slot, data.index)
            .map_err(AttestationError::Committee)?;
        if attestation.aggregation_bits.len() != committee.len() {
            return Err(AttestationError::CommitteeSizeMismatch {
                bits: attestation.aggregation_bits.len(),
                committee: committee.len(),
            });
        }
        if attestation.aggregation_bits.num_set_bits() == 0 {
            return Err(AttestationError::NoParticipants);
        }

        if !self.is_known_block(data.beacon_block_root) {
            return Err(AttestationError::UnknownBlock(data.beacon_block_root));
        }

        let attesting_indices = state
            .get_attesting_indices(attestation)
            .map_err(AttestationError::Committee)?;
        let pubkeys = attesting_indices
            .iter()
            .filter_map(|&index| state.validators.get(index as usize))
            .map(|validator| &validator.pubkey)
            .collect::<Vec<_>>();
        let domain = state.get_domain(self.config.domain_beacon_attester, Some(data.target.epoch));
        let signing_root = compute_signing_root(data, domain);
        if pubkeys.len() != attesting_indices.len()
            || !attestation
                .signature
                .fast_aggregate_verify(&pubkeys, signing_root)
        {
            return Err(AttestationError::InvalidSignature);
        }

        Ok(attesting_indices)
    }

    fn accept_attestation(
        &self,
        attestation: Attestation,
        publish: bool,
    ) -> Result<(), AttestationError> {
        let attesting_indices = self.validate_attestation(&attestation)?;
        self.fork_choice
            .lock()
            .on_attestation(&attesting_indices, &attestation.data);
        debug!(
            slot = attestation.data.slot,
            index = attestation.data.index,
            attesters = attesting_indices.len(),
            "Accepted attestation"
        );

        if publish {
            self.notifier
                .publish_operation(OperationEvent::AttestationReceived(Arc::new(attestation)));
        }
        Ok(())
    }
}

impl BlockIngestor for ChainService {
    fn ingest(
        &self,
        block: Arc<SignedBeaconBlock>,
        options: IngestOptions,
    ) -> Result<(), IngestError> {
        let result = {
            let mut fork_choice = self.fork_choice.lock();
            self.commit(&mut fork_choice, &block, options)
        };

        let committed = match result {
            Ok(committed) => committed,
            Err(err) if err.is_fatal() => {
                error!(slot = block.message.slot, "Finality invariant violated: {err}");
                return Err(err);
            }
            Err(err) => {
                warn!(slot = block.message.slot, "Rejected block: {err}");
                return Err(err);
            }
        };

        if options.publish {
            self.publish(committed, block, options);
        }
        Ok(())
    }
}

impl HeadReader for ChainService {
    fn head_root(&self) -> B256 {
        self.head.root()
    }

    fn head_slot(&self) -> Slot {
        self.head.slot()
    }

    fn head_block(&self) -> Result<Arc<SignedBeaconBlock>, NoStateError> {
        self.head.block()
    }

    fn head_state(&self) -> Result<Arc<BeaconState>, NoStateError> {
        self.head.state()
    }

    fn head(&self) -> Option<Arc<Head>> {
        self.head.snapshot()
    }
}

impl CheckpointReader for ChainService {
    fn finalized_checkpoint(&self) -> Checkpoint {
        self.checkpoints.finalized()
    }

    fn current_justified_checkpoint(&self) -> Checkpoint {
        self.checkpoints.current_justified()
    }

    fn previous_justified_checkpoint(&self) -> Checkpoint {
        self.checkpoints.previous_justified()
    }
}

impl ValidatorSetResolver for ChainService {
    fn head_validators_indices(&self, epoch: Epoch) -> Result<Vec<ValidatorIndex>, NoStateError> {
        Ok(self.head.state()?.get_active_validator_indices(epoch))
    }

    fn head_seed(&self, epoch: Epoch, domain_type: DomainType) -> Result<B256, NoStateError> {
        Ok(self.head.state()?.get_seed(epoch, domain_type))
    }
}

impl AttestationReceiver for ChainService {
    fn is_valid_attestation(&self, attestation: &Attestation) -> bool {
        self.validate_attestation(attestation)
            .inspect_err(|err| debug!("Invalid attestation: {err}"))
            .is_ok()
    }

    fn receive_attestation(&self, attestation: Attestation) -> Result<(), AttestationError> {
        self.accept_attestation(attestation, true)
    }

    fn receive_attestation_no_pubsub(
        &self,
        attestation: Attestation,
    ) -> Result<(), AttestationError> {
        self.accept_attestation(attestation, false)
    }
}

impl ParticipationFetcher for ChainService {
    fn participation(&self, _epoch: Epoch) -> Option<ParticipationBalance> {
        self.participation.latest()
    }

    fn participation_at(&self, epoch: Epoch) -> Option<ParticipationBalance> {
        self.participation.at(epoch)
    }
}

impl ForkFetcher for ChainService {
    fn current_fork(&self) -> Result<Fork, NoStateError> {
        Ok(self.head.state()?.fork)
    }
}

impl TimeFetcher for ChainService {
    fn genesis_time(&self) -> UnixSeconds {
        self.clock.genesis_time()
    }

    fn current_slot(&self) -> Slot {
        self.clock.current_slot()
    }
}
