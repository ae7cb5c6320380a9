use alloy_primitives::B256;
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use tree_hash_derive::TreeHash;

use crate::primitives::Epoch;

#[derive(
    Debug,
    Default,
    Eq,
    Hash,
    PartialEq,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    Encode,
    Decode,
    TreeHash,
)]
pub struct Checkpoint {
    pub epoch: Epoch,
    pub root: B256,
}

impl Checkpoint {
    pub fn new(epoch: Epoch, root: B256) -> Self {
        Self { epoch, root }
    }
}
