use core::ops::RangeInclusive;

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use types::primitives::{
    ExecutionAddress, ExecutionBlockHash, ExecutionBlockNumber, ExecutionTransactionHash,
    UnixSeconds,
};
use web3::types::{Log, U64};

/// The parts of an execution transaction needed to attribute a deposit.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Deserialize)]
pub struct ExecutionTransaction {
    pub hash: ExecutionTransactionHash,
    pub from: ExecutionAddress,
    /// `None` for contract creations.
    pub to: Option<ExecutionAddress>,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ExecutionHeader {
    pub hash: ExecutionBlockHash,
    pub number: ExecutionBlockNumber,
    pub timestamp: UnixSeconds,
}

// Quantities in JSON-RPC responses are hexadecimal strings.
#[derive(Deserialize)]
pub(crate) struct RawExecutionHeader {
    hash: ExecutionBlockHash,
    number: U64,
    timestamp: U64,
}

impl From<RawExecutionHeader> for ExecutionHeader {
    fn from(raw: RawExecutionHeader) -> Self {
        let RawExecutionHeader {
            hash,
            number,
            timestamp,
        } = raw;

        Self {
            hash,
            number: number.as_u64(),
            timestamp: timestamp.as_u64(),
        }
    }
}

/// A connection to a single execution node.
#[async_trait]
pub trait ExecutionClient: Send + Sync {
    fn name(&self) -> &str;

    /// Returns `DepositEvent` logs emitted by `address` in `blocks`.
    async fn deposit_logs(
        &self,
        address: ExecutionAddress,
        blocks: RangeInclusive<ExecutionBlockNumber>,
    ) -> Result<Vec<Log>>;

    async fn transaction_by_hash(
        &self,
        hash: ExecutionTransactionHash,
    ) -> Result<Option<ExecutionTransaction>>;

    async fn header_by_number(
        &self,
        number: ExecutionBlockNumber,
    ) -> Result<Option<ExecutionHeader>>;
}
