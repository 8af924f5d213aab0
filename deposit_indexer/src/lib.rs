pub use crate::{
    deposit_indexer::{DepositIndexer, DEPOSIT_STATE_KEY},
    deposit_validation::has_valid_signature,
    error::Error,
    failover::ClientFailover,
    indexer_config::DepositIndexerConfig,
    tasks::spawn_deposit_indexer_task,
    unfinalized_deposits::UnfinalizedDeposits,
};

mod deposit_indexer;
mod deposit_validation;
mod error;
mod failover;
#[cfg(test)]
mod fixtures;
mod indexer_config;
mod log_resolver;
mod tasks;
mod unfinalized_deposits;
