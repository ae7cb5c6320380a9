use alloy_primitives::B256;
use ream_consensus::primitives::Epoch;
use serde::{Deserialize, Serialize};

/// The newest LMD vote of a validator: the target epoch it was cast in and the block it supports.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub struct LatestMessage {
    pub epoch: Epoch,
    pub root: B256,
}
