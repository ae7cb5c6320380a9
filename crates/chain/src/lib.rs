pub mod checkpoints;
pub mod clock;
pub mod config;
pub mod error;
pub mod fork_choice;
pub mod head;
pub mod notifier;
pub mod participation;
pub mod service;
pub mod traits;

pub use checkpoints::FinalityCheckpoints;
pub use config::ChainConfig;
pub use error::{AttestationError, FinalityRegression, IngestError, NoStateError};
pub use head::Head;
pub use notifier::{BlockEvent, Notifier, OperationEvent, StateEvent};
pub use participation::ParticipationBalance;
pub use service::ChainService;
pub use traits::{
    AttestationReceiver, BlockIngestor, CheckpointReader, ForkFetcher, HeadReader, IngestOptions,
    ParticipationFetcher, TimeFetcher, ValidatorSetResolver,
};
