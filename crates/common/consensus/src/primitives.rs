use alloy_primitives::aliases::B32;

pub type CommitteeIndex = u64; // committee index at a slot
pub type DomainType = B32; // signature domain type
pub type Epoch = u64; // epoch number
pub type Gwei = u64; // amount in gwei
pub type Slot = u64; // slot number
pub type UnixSeconds = u64; // seconds since the unix epoch
pub type ValidatorIndex = u64; // validator registry index
pub type Version = B32; // fork version number
