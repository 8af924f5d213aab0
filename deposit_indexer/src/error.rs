use core::time::Duration;

use thiserror::Error;
use types::{
    nonstandard::ForkKey,
    primitives::{ExecutionBlockNumber, ExecutionTransactionHash, H256},
};

#[derive(Debug, Error)]
pub enum Error {
    #[error("deposit contract address is not configured")]
    MissingDepositContract,
    #[error("could not get finalized block from cache ({root:?})")]
    FinalizedBlockNotFound { root: H256 },
    #[error("could not get finalized block index values ({root:?})")]
    FinalizedBlockIndexMissing { root: H256 },
    #[error(
        "finalized block number ({finalized_block}) smaller than index state ({final_block})"
    )]
    FinalizedBlockBehindCheckpoint {
        finalized_block: ExecutionBlockNumber,
        final_block: ExecutionBlockNumber,
    },
    #[error("no ready execution client found")]
    NoReadyClient,
    #[error("no execution clients to try")]
    NoClients,
    #[error("head block not found for fork {fork_id}")]
    HeadBlockNotFound { fork_id: ForkKey },
    #[error("head block index not found for fork {fork_id}")]
    HeadBlockIndexMissing { fork_id: ForkKey },
    #[error("deposit log is missing {field}")]
    IncompleteLog { field: &'static str },
    #[error("transaction {hash:?} not found")]
    TransactionNotFound { hash: ExecutionTransactionHash },
    #[error("block header {number} not found")]
    HeaderNotFound { number: ExecutionBlockNumber },
    #[error("{request} request to {client} timed out after {timeout:?}")]
    Timeout {
        request: &'static str,
        client: String,
        timeout: Duration,
    },
    #[error("{request} request to {client} was cancelled")]
    Cancelled {
        request: &'static str,
        client: String,
    },
}
