use bls::{PublicKeyBytes, SignatureBytes};
use derive_more::{Display, From};
use serde::{Deserialize, Serialize};

use crate::primitives::{
    DepositIndex, ExecutionAddress, ExecutionBlockHash, ExecutionBlockNumber,
    ExecutionTransactionHash, Gwei, Slot, UnixSeconds, H256,
};

/// Identifier of a fork tracked by the beacon indexer.
#[derive(
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Default,
    Debug,
    Display,
    From,
    Deserialize,
    Serialize,
)]
#[serde(transparent)]
pub struct ForkKey(u64);

impl ForkKey {
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

/// Execution payload coordinates of a beacon block.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Deserialize, Serialize)]
pub struct BlockIndex {
    pub execution_hash: ExecutionBlockHash,
    pub execution_number: ExecutionBlockNumber,
}

/// The part of an execution payload the explorer indexes.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Deserialize, Serialize)]
pub struct ExecutionPayloadSummary {
    pub block_hash: ExecutionBlockHash,
    pub block_number: ExecutionBlockNumber,
    pub timestamp: UnixSeconds,
}

/// Decoded beacon block body.
///
/// Blocks from before the merge have no execution payload.
#[derive(Clone, PartialEq, Eq, Default, Debug, Deserialize, Serialize)]
pub struct BlockBody {
    pub graffiti: H256,
    pub execution_payload: Option<ExecutionPayloadSummary>,
}

impl BlockBody {
    #[must_use]
    pub fn block_index(&self) -> Option<BlockIndex> {
        self.execution_payload.map(|payload| BlockIndex {
            execution_hash: payload.block_hash,
            execution_number: payload.block_number,
        })
    }
}

/// Minimal block record stored in the database once a block leaves the cache.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Deserialize, Serialize)]
pub struct BlockHead {
    pub root: H256,
    pub slot: Slot,
    pub parent_root: H256,
    pub fork_id: ForkKey,
}

/// A single observation of a deposit event.
///
/// The same deposit may be observed once per execution block that includes it.
/// Observations are identified by `(index, block_root)`.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Deserialize, Serialize)]
pub struct DepositTx {
    pub index: DepositIndex,
    pub block_number: ExecutionBlockNumber,
    pub block_time: UnixSeconds,
    /// Hash of the execution block the deposit was observed in.
    pub block_root: ExecutionBlockHash,
    pub public_key: PublicKeyBytes,
    pub withdrawal_credentials: H256,
    pub amount: Gwei,
    pub signature: SignatureBytes,
    pub valid_signature: bool,
    pub orphaned: bool,
    pub fork_id: Option<ForkKey>,
    pub tx_hash: ExecutionTransactionHash,
    pub tx_sender: ExecutionAddress,
    pub tx_target: Option<ExecutionAddress>,
}

/// Checkpoint of the deposit indexer, persisted as explorer state.
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug, Deserialize, Serialize)]
pub struct DepositIndexerState {
    /// Highest execution block number whose deposits are fully committed as finalized.
    pub final_block: ExecutionBlockNumber,
    /// Highest execution block number ever committed. Advisory only.
    pub head_block: ExecutionBlockNumber,
}
