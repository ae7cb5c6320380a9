use alloy_primitives::B256;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to decode {kind} {root}: {reason}")]
    Decode {
        kind: &'static str,
        root: B256,
        reason: String,
    },

    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
}
