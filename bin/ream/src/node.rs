use std::{
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use ream_chain::{
    BlockEvent, ChainConfig, ChainService, HeadReader, OperationEvent, StateEvent, TimeFetcher,
};
use ream_consensus::interop::interop_genesis_state;
use ream_storage::InMemoryStore;
use tokio::{
    runtime::Runtime,
    sync::broadcast::{self, error::RecvError, Receiver},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::cli::NodeCommand;

pub fn run(command: NodeCommand) -> anyhow::Result<()> {
    let mut config = command.chain_config()?;
    if config.genesis_time == 0 {
        config.genesis_time = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();
    }

    let runtime = Runtime::new()?;
    runtime.block_on(run_chain(config, command.interop_validators))
}

async fn run_chain(config: ChainConfig, validator_count: u64) -> anyhow::Result<()> {
    info!(
        genesis_time = config.genesis_time,
        validator_count, "Building interop genesis"
    );
    let (genesis_state, _) = interop_genesis_state(config.genesis_time, validator_count)?;
    let chain = Arc::new(ChainService::from_genesis(
        config,
        Arc::new(InMemoryStore::new()),
        genesis_state,
    )?);
    info!(anchor = %chain.anchor_root(), "Starting node");

    let (shutdown, _) = broadcast::channel(1);
    let notifier = chain.notifier();
    let tasks = vec![
        spawn_subscriber(
            "block",
            notifier.subscribe_block(),
            shutdown.subscribe(),
            |event: BlockEvent| {
                info!(
                    root = %event.root,
                    slot = event.slot,
                    signatures_verified = event.signatures_verified,
                    "New head"
                )
            },
        ),
        spawn_subscriber(
            "state",
            notifier.subscribe_state(),
            shutdown.subscribe(),
            |StateEvent::CheckpointsUpdated { previous, current }| {
                info!(
                    previous_finalized = previous.finalized.epoch,
                    justified_epoch = current.current_justified.epoch,
                    finalized_epoch = current.finalized.epoch,
                    "Checkpoints updated"
                )
            },
        ),
        spawn_subscriber(
            "operation",
            notifier.subscribe_operation(),
            shutdown.subscribe(),
            |OperationEvent::AttestationReceived(attestation)| {
                debug!(
                    slot = attestation.data.slot,
                    index = attestation.data.index,
                    "Attestation received"
                )
            },
        ),
        tokio::spawn(report_slots(chain.clone(), shutdown.subscribe())),
    ];

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    let _ = shutdown.send(());
    for task in tasks {
        task.await?;
    }

    Ok(())
}

fn spawn_subscriber<T, F>(
    channel: &'static str,
    mut events: Receiver<T>,
    mut shutdown: Receiver<()>,
    on_event: F,
) -> JoinHandle<()>
where
    T: Clone + Send + 'static,
    F: Fn(T) + Send + 'static,
{
    tokio::spawn(async move {
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Ok(event) => on_event(event),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(channel, skipped, "Subscriber fell behind")
                    }
                    Err(RecvError::Closed) => return,
                },
                _ = shutdown.recv() => return,
            }
        }
    })
}

async fn report_slots(chain: Arc<ChainService>, mut shutdown: Receiver<()>) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(chain.clock().duration_to_next_slot()) => {
                let finality = chain.finality_checkpoints();
                info!(
                    slot = chain.current_slot(),
                    head_slot = chain.head_slot(),
                    head_root = %chain.head_root(),
                    justified_epoch = finality.current_justified.epoch,
                    finalized_epoch = finality.finalized.epoch,
                    "Slot started"
                );
            }
            _ = shutdown.recv() => return,
        }
    }
}
