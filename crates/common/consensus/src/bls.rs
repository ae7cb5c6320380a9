//! BLS keys and signatures. Verification is delegated to `blst` and only
//! reports pass/fail.

use alloy_primitives::B256;
use anyhow::anyhow;
use blst::{
    min_pk::{AggregateSignature, PublicKey, SecretKey, Signature},
    BLST_ERROR,
};
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use ssz_types::{typenum, FixedVector};
use tree_hash_derive::TreeHash;

use crate::constants::DST;

#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize, Encode, Decode, TreeHash)]
pub struct PubKey {
    pub inner: FixedVector<u8, typenum::U48>,
}

impl Default for PubKey {
    fn default() -> Self {
        Self {
            inner: FixedVector::from(vec![0; 48]),
        }
    }
}

impl From<&PublicKey> for PubKey {
    fn from(public_key: &PublicKey) -> Self {
        Self {
            inner: FixedVector::from(public_key.to_bytes().to_vec()),
        }
    }
}

impl PubKey {
    fn to_blst(&self) -> Option<PublicKey> {
        PublicKey::key_validate(&self.inner[..]).ok()
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize, Encode, Decode, TreeHash)]
pub struct BlsSignature {
    pub signature: FixedVector<u8, typenum::U96>,
}

impl Default for BlsSignature {
    fn default() -> Self {
        Self {
            signature: FixedVector::from(vec![0; 96]),
        }
    }
}

impl From<&Signature> for BlsSignature {
    fn from(signature: &Signature) -> Self {
        Self {
            signature: FixedVector::from(signature.to_bytes().to_vec()),
        }
    }
}

impl BlsSignature {
    /// Sign ``message`` with ``secret_key`` under the Ethereum proof-of-possession DST.
    pub fn sign(secret_key: &SecretKey, message: B256) -> Self {
        Self::from(&secret_key.sign(message.as_slice(), DST, &[]))
    }

    /// Aggregate ``signatures`` into a single signature.
    pub fn aggregate(signatures: &[BlsSignature]) -> anyhow::Result<Self> {
        let signatures = signatures
            .iter()
            .map(|signature| {
                Signature::from_bytes(&signature.signature[..])
                    .map_err(|err| anyhow!("malformed signature: {err:?}"))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        let refs = signatures.iter().collect::<Vec<_>>();
        let aggregate = AggregateSignature::aggregate(&refs, true)
            .map_err(|err| anyhow!("failed to aggregate signatures: {err:?}"))?;
        Ok(Self::from(&aggregate.to_signature()))
    }

    pub fn verify(&self, pubkey: &PubKey, message: B256) -> bool {
        let (Some(pubkey), Ok(signature)) = (
            pubkey.to_blst(),
            Signature::from_bytes(&self.signature[..]),
        ) else {
            return false;
        };
        signature.verify(true, message.as_slice(), DST, &[], &pubkey, false)
            == BLST_ERROR::BLST_SUCCESS
    }

    /// Verify an aggregate signature of ``pubkeys`` over the same ``message``.
    pub fn fast_aggregate_verify(&self, pubkeys: &[&PubKey], message: B256) -> bool {
        if pubkeys.is_empty() {
            return false;
        }
        let Ok(signature) = Signature::from_bytes(&self.signature[..]) else {
            return false;
        };
        let Some(pubkeys) = pubkeys
            .iter()
            .map(|pubkey| pubkey.to_blst())
            .collect::<Option<Vec<_>>>()
        else {
            return false;
        };
        let refs = pubkeys.iter().collect::<Vec<_>>();
        signature.fast_aggregate_verify(true, message.as_slice(), DST, &refs)
            == BLST_ERROR::BLST_SUCCESS
    }
}
