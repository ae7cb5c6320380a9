use alloy_primitives::B256;
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use tree_hash::TreeHash;
use tree_hash_derive::TreeHash;

use crate::primitives::{Epoch, Version};

#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize, Encode, Decode, TreeHash)]
pub struct Fork {
    pub previous_version: Version,
    pub current_version: Version,
    pub epoch: Epoch,
}

impl Fork {
    /// Fork version in effect at ``epoch``.
    pub fn version_at(&self, epoch: Epoch) -> Version {
        if epoch < self.epoch {
            self.previous_version
        } else {
            self.current_version
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize, Encode, Decode, TreeHash)]
pub struct ForkData {
    pub current_version: Version,
    pub genesis_validators_root: B256,
}

/// Return the 32-byte fork data root for the ``current_version`` and ``genesis_validators_root``.
/// This is used primarily in signature domains to avoid collisions across forks/chains.
pub fn compute_fork_data_root(current_version: Version, genesis_validators_root: B256) -> B256 {
    ForkData {
        current_version,
        genesis_validators_root,
    }
    .tree_hash_root()
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use alloy_primitives::{
        aliases::B32,
        hex::{self, FromHex},
    };
    use snap::raw::Decoder;
    use ssz::{Decode, Encode};

    use super::*;

    #[rstest::rstest]
    #[case(
        "0xda79dfe4112bcf0da8a8b622b9b0f7a6864ec7e4e041a2dd96e28b74fcefc4fb",
        "0x103CF03A40CD1FAB4E41A4D82B3AE5AECF4A",
        "0xf03a40cd",
        "0x1fab4e41",
        5390719578532468900
    )]
    #[case(
        "0x9a90b7beb0f2b6492ca438d9b1d9a7cd802358083c50c94be49cf765b7dd0fe4",
        "0x103CBB01D5CC919E8125A332A21697FF489C",
        "0xbb01d5cc",
        "0x919e8125",
        11261531892624798371
    )]
    fn test_fork(
        #[case] hash_root: &str,
        #[case] snappy_ssz: &str,
        #[case] previous_version: &str,
        #[case] current_version: &str,
        #[case] epoch: u64,
    ) {
        let hash_root = B256::from_str(hash_root).unwrap();
        let previous_version = B32::from_str(previous_version).unwrap();
        let current_version = B32::from_str(current_version).unwrap();

        let fork = Fork {
            previous_version,
            current_version,
            epoch,
        };

        let mut decoder = Decoder::new();
        let snappy_ssz = hex::decode(snappy_ssz).unwrap();
        let ssz = decoder.decompress_vec(&snappy_ssz).unwrap();

        assert_eq!(ssz, fork.as_ssz_bytes());
        assert_eq!(fork, Fork::from_ssz_bytes(&ssz).unwrap());
        assert_eq!(hash_root, fork.tree_hash_root());
    }

    #[rstest::rstest]
    #[case(
        "0xfd3120762d23f23e0b663e6ddb24b89ae01b7f2d925e05c9c11ebee4ec23285d",
        "0x248C6C6EEE828430632DD18C6B608EA98806380FE7711B75ED235551BC95DACFC04C158258EB",
        "0x6c6eee82",
        "0x8430632dd18c6b608ea98806380fe7711b75ed235551bc95dacfc04c158258eb"
    )]
    #[case(
        "0x526ad2a5d5c9706cf7f752f92152d9852fca03d41492bc160ce3c6355815c07d",
        "0x248CDB1C95FF566D6E458FC220D2F345BFC063FE717DD26E0C161F70D7CE0D2B2D838077D7B0",
        "0xdb1c95ff",
        "0x566d6e458fc220d2f345bfc063fe717dd26e0c161f70d7ce0d2b2d838077d7b0"
    )]
    fn test_fork_data_root(
        #[case] hash_root: &str,
        #[case] snappy_ssz: &str,
        #[case] current_version: &str,
        #[case] genesis_validators_root: &str,
    ) {
        let hash_root = B256::from_str(hash_root).unwrap();
        let current_version = B32::from_hex(current_version).unwrap();
        let genesis_validators_root = B256::from_str(genesis_validators_root).unwrap();

        let fork_data = ForkData {
            current_version,
            genesis_validators_root,
        };

        let mut decoder = Decoder::new();
        let snappy_ssz = hex::decode(snappy_ssz).unwrap();
        let ssz = decoder.decompress_vec(&snappy_ssz).unwrap();

        assert_eq!(ssz, fork_data.as_ssz_bytes());
        assert_eq!(
            hash_root,
            compute_fork_data_root(current_version, genesis_validators_root)
        );
    }

    #[test]
    fn test_version_at_switches_on_fork_epoch() {
        let fork = Fork {
            previous_version: B32::new([0, 0, 0, 1]),
            current_version: B32::new([1, 0, 0, 1]),
            epoch: 10,
        };

        assert_eq!(fork.version_at(9), fork.previous_version);
        assert_eq!(fork.version_at(10), fork.current_version);
        assert_eq!(fork.version_at(11), fork.current_version);
    }
}
