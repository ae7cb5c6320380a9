//! Protocol constants. Sizes follow the minimal preset.

use alloy_primitives::aliases::B32;
use ssz_types::typenum;

use crate::primitives::{DomainType, Epoch, Gwei, Slot, Version};

// Misc
pub const GENESIS_SLOT: Slot = 0;
pub const GENESIS_EPOCH: Epoch = 0;
pub const FAR_FUTURE_EPOCH: Epoch = u64::MAX;
pub const GENESIS_FORK_VERSION: Version = B32::new([0x00, 0x00, 0x00, 0x01]);

// Time
pub const SLOTS_PER_EPOCH: u64 = 8;
pub const MIN_SEED_LOOKAHEAD: u64 = 1;
pub const MIN_ATTESTATION_INCLUSION_DELAY: u64 = 1;
pub const DEFAULT_SECONDS_PER_SLOT: u64 = 6;

// State list lengths
pub const SLOTS_PER_HISTORICAL_ROOT: u64 = 64;
pub const EPOCHS_PER_HISTORICAL_VECTOR: u64 = 64;
pub const JUSTIFICATION_BITS_LENGTH: usize = 4;

pub type SlotsPerHistoricalRoot = typenum::U64;
pub type EpochsPerHistoricalVector = typenum::U64;
pub type JustificationBitsLength = typenum::U4;
pub type ValidatorRegistryLimit = typenum::U1099511627776;
pub type MaxValidatorsPerCommittee = typenum::U2048;
pub type MaxAttestations = typenum::U128;

// Committees
pub const MAX_COMMITTEES_PER_SLOT: u64 = 4;
pub const TARGET_COMMITTEE_SIZE: u64 = 4;
pub const SHUFFLE_ROUND_COUNT: u8 = 10;
pub const MAX_RANDOM_BYTE: u64 = 255;

// Gwei values
pub const MAX_EFFECTIVE_BALANCE: Gwei = 32_000_000_000;
pub const EFFECTIVE_BALANCE_INCREMENT: Gwei = 1_000_000_000;

// Rewards
pub const BASE_REWARD_FACTOR: u64 = 64;

// Participation flags
pub const TIMELY_SOURCE_FLAG_INDEX: u8 = 0;
pub const TIMELY_TARGET_FLAG_INDEX: u8 = 1;
pub const TIMELY_HEAD_FLAG_INDEX: u8 = 2;

pub const TIMELY_SOURCE_WEIGHT: u64 = 14;
pub const TIMELY_TARGET_WEIGHT: u64 = 26;
pub const TIMELY_HEAD_WEIGHT: u64 = 14;
pub const PROPOSER_WEIGHT: u64 = 8;
pub const WEIGHT_DENOMINATOR: u64 = 64;

pub const PARTICIPATION_FLAG_WEIGHTS: [u64; 3] =
    [TIMELY_SOURCE_WEIGHT, TIMELY_TARGET_WEIGHT, TIMELY_HEAD_WEIGHT];

// Domains
pub const DOMAIN_BEACON_PROPOSER: DomainType = B32::new([0x00, 0x00, 0x00, 0x00]);
pub const DOMAIN_BEACON_ATTESTER: DomainType = B32::new([0x01, 0x00, 0x00, 0x00]);
pub const DOMAIN_RANDAO: DomainType = B32::new([0x02, 0x00, 0x00, 0x00]);

// BLS
pub const DST: &[u8] = b"BLS_SIG_BLS12381G2_XMD:SHA-256_SSWU_RO_POP_";
