use bls::{PublicKeyBytes, SignatureBytes};
use hashing::{chunk_from_bytes, chunk_from_u64, hash_256_256, merkleize_chunks};
use serde::{Deserialize, Serialize};

use crate::{
    primitives::{Domain, Epoch, Gwei, Slot, ValidatorIndex, Version, H256},
    traits::SszHash,
};

#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BeaconBlockHeader {
    pub slot: Slot,
    pub proposer_index: ValidatorIndex,
    pub parent_root: H256,
    pub state_root: H256,
    pub body_root: H256,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SignedBeaconBlockHeader {
    pub message: BeaconBlockHeader,
    pub signature: SignatureBytes,
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Checkpoint {
    pub epoch: Epoch,
    pub root: H256,
}

#[derive(Clone, Copy, PartialEq, Eq, Default, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DepositData {
    pub pubkey: PublicKeyBytes,
    pub withdrawal_credentials: H256,
    pub amount: Gwei,
    pub signature: SignatureBytes,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DepositMessage {
    pub pubkey: PublicKeyBytes,
    pub withdrawal_credentials: H256,
    pub amount: Gwei,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ForkData {
    pub current_version: Version,
    pub genesis_validators_root: H256,
}

#[derive(Clone, Copy, PartialEq, Eq, Default, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SigningData {
    pub object_root: H256,
    pub domain: Domain,
}

impl From<DepositData> for DepositMessage {
    fn from(deposit_data: DepositData) -> Self {
        let DepositData {
            pubkey,
            withdrawal_credentials,
            amount,
            ..
        } = deposit_data;

        Self {
            pubkey,
            withdrawal_credentials,
            amount,
        }
    }
}

impl SszHash for BeaconBlockHeader {
    fn hash_tree_root(&self) -> H256 {
        merkleize_chunks(&[
            chunk_from_u64(self.slot),
            chunk_from_u64(self.proposer_index),
            self.parent_root,
            self.state_root,
            self.body_root,
        ])
    }
}

impl SszHash for DepositMessage {
    fn hash_tree_root(&self) -> H256 {
        merkleize_chunks(&[
            public_key_root(self.pubkey),
            self.withdrawal_credentials,
            chunk_from_u64(self.amount),
        ])
    }
}

impl SszHash for ForkData {
    fn hash_tree_root(&self) -> H256 {
        hash_256_256(
            chunk_from_bytes(self.current_version.as_bytes()),
            self.genesis_validators_root,
        )
    }
}

impl SszHash for SigningData {
    fn hash_tree_root(&self) -> H256 {
        hash_256_256(self.object_root, self.domain)
    }
}

// A compressed public key spans 2 chunks, the second one padded with zeros.
fn public_key_root(pubkey: PublicKeyBytes) -> H256 {
    let (head, tail) = pubkey.as_bytes().split_at(H256::len_bytes());
    hash_256_256(H256::from_slice(head), chunk_from_bytes(tail))
}
