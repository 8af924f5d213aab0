use core::ops::RangeInclusive;
use std::{collections::HashSet, sync::Arc};

use anyhow::{ensure, Context as _, Result};
use block_cache::BlockCache;
use database::{PersistenceGateway, WriteBatch};
use eth1_api::{ExecutionClient, ExecutionClientPool, ForkWithClients};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use types::{
    chain_state::ChainState,
    consts::GENESIS_EPOCH,
    nonstandard::{DepositIndexerState, DepositTx, ForkKey},
    primitives::{ExecutionAddress, ExecutionBlockHash, ExecutionBlockNumber},
};

use crate::{
    error::Error,
    failover::ClientFailover,
    indexer_config::DepositIndexerConfig,
    log_resolver::{self, LogResolver},
    unfinalized_deposits::UnfinalizedDeposits,
};

/// Explorer state key of the persisted [`DepositIndexerState`].
pub const DEPOSIT_STATE_KEY: &str = "indexer.depositstate";

/// Indexes deposit contract logs into [`DepositTx`] rows.
///
/// Finalized deposits are written once per batch together with the checkpoint.
/// Deposits above the checkpoint are written for every fork that has clients following it
/// and are marked as orphaned until the finalized pass reaches them.
pub struct DepositIndexer {
    config: DepositIndexerConfig,
    chain_state: Arc<dyn ChainState>,
    block_cache: Arc<BlockCache>,
    client_pool: Arc<dyn ExecutionClientPool>,
    database: Arc<dyn PersistenceGateway>,
    deposit_contract: ExecutionAddress,
    state: DepositIndexerState,
    unfinalized_deposits: UnfinalizedDeposits,
}

impl DepositIndexer {
    pub fn new(
        config: DepositIndexerConfig,
        chain_state: Arc<dyn ChainState>,
        block_cache: Arc<BlockCache>,
        client_pool: Arc<dyn ExecutionClientPool>,
        database: Arc<dyn PersistenceGateway>,
    ) -> Result<Self> {
        let deposit_contract = chain_state.config().deposit_contract_address;

        ensure!(!deposit_contract.is_zero(), Error::MissingDepositContract);

        let state = match database.explorer_state(DEPOSIT_STATE_KEY)? {
            Some(json) => serde_json::from_str(&json)
                .with_context(|| format!("invalid {DEPOSIT_STATE_KEY} value: {json}"))?,
            None => DepositIndexerState::default(),
        };

        info!(
            "loaded deposit indexer state (final block: {}, head block: {})",
            state.final_block, state.head_block,
        );

        Ok(Self {
            config,
            chain_state,
            block_cache,
            client_pool,
            database,
            deposit_contract,
            state,
            unfinalized_deposits: UnfinalizedDeposits::default(),
        })
    }

    #[must_use]
    pub const fn config(&self) -> &DepositIndexerConfig {
        &self.config
    }

    #[must_use]
    pub const fn state(&self) -> DepositIndexerState {
        self.state
    }

    #[must_use]
    pub const fn unfinalized_deposits(&self) -> &UnfinalizedDeposits {
        &self.unfinalized_deposits
    }

    /// Runs one tick: the finalized pass if the justified checkpoint moved, then the recent pass.
    pub async fn run(&mut self) -> Result<()> {
        let justified_checkpoint = self.chain_state.justified_checkpoint();

        if justified_checkpoint.epoch > GENESIS_EPOCH {
            let root = justified_checkpoint.root;

            let finalized_block = self
                .block_cache
                .block_by_root(root)
                .ok_or(Error::FinalizedBlockNotFound { root })?;

            let finalized_block_number = finalized_block
                .execution_block_number()
                .ok_or(Error::FinalizedBlockIndexMissing { root })?;

            ensure!(
                finalized_block_number >= self.state.final_block,
                Error::FinalizedBlockBehindCheckpoint {
                    finalized_block: finalized_block_number,
                    final_block: self.state.final_block,
                },
            );

            if finalized_block_number > self.state.final_block {
                self.process_finalized_blocks(finalized_block_number)
                    .await?;
            }
        }

        self.process_recent_blocks().await;

        Ok(())
    }

    /// Advances the checkpoint to `finalized_block_number` one batch at a time.
    ///
    /// Every batch commits its deposits and the new checkpoint atomically.
    /// The in-memory checkpoint only moves after the commit succeeds.
    pub async fn process_finalized_blocks(
        &mut self,
        finalized_block_number: ExecutionBlockNumber,
    ) -> Result<()> {
        let client = self
            .client_pool
            .finalized_clients()
            .into_iter()
            .next()
            .ok_or(Error::NoReadyClient)?;

        let cancellation_token = CancellationToken::new();
        let _cancel_on_return = cancellation_token.clone().drop_guard();

        while self.state.final_block < finalized_block_number {
            let from_block = self.state.final_block + 1;

            let to_block = finalized_block_number.min(
                self.state
                    .final_block
                    .saturating_add(self.config.effective_batch_size()),
            );

            let chain_config = self.chain_state.config();

            let mut resolver = LogResolver::new(
                chain_config,
                &self.config,
                client.as_ref(),
                &cancellation_token,
            );

            let logs = resolver
                .deposit_logs(self.deposit_contract, from_block..=to_block)
                .await
                .context("error fetching deposit contract logs")?;

            info!(
                "received deposit logs for blocks {from_block}..={to_block}: {} events",
                logs.len(),
            );

            let mut deposit_txs = vec![];

            for log in &logs {
                let Some(deposit_event) = log_resolver::decode_deposit_log(log)? else {
                    continue;
                };

                deposit_txs.push(resolver.deposit_tx(log, deposit_event).await?);
            }

            let next_state = DepositIndexerState {
                final_block: to_block,
                head_block: self.state.head_block.max(to_block),
            };

            let finalized_indices = deposit_txs
                .iter()
                .map(|deposit_tx| deposit_tx.index)
                .collect::<Vec<_>>();

            let mut batch = WriteBatch::with_deposit_txs(deposit_txs);
            batch.set_explorer_state(DEPOSIT_STATE_KEY, serde_json::to_string(&next_state)?);

            self.database
                .commit(batch)
                .context("could not persist deposit txs")?;

            self.state = next_state;

            for index in &finalized_indices {
                self.unfinalized_deposits.remove_index(*index);
            }

            if !finalized_indices.is_empty() {
                info!(
                    "crawled deposits for blocks {from_block}..={to_block}: {} deposits",
                    finalized_indices.len(),
                );

                tokio::time::sleep(self.config.batch_pause).await;
            }
        }

        Ok(())
    }

    /// Indexes deposits above the checkpoint for every fork with clients.
    ///
    /// Failures are logged per fork and never stop other forks from being processed.
    pub async fn process_recent_blocks(&mut self) {
        for fork in self.client_pool.forks_with_clients() {
            if let Err(error) = self.process_recent_blocks_for_fork(&fork).await {
                if fork.canonical {
                    error!(
                        "could not process recent events from canonical fork {}: {error:?}",
                        fork.fork_id,
                    );
                } else {
                    warn!(
                        "could not process recent events from fork {}: {error:?}",
                        fork.fork_id,
                    );
                }
            }
        }
    }

    async fn process_recent_blocks_for_fork(&mut self, fork: &ForkWithClients) -> Result<()> {
        let fork_id = fork.fork_id;

        let head_block = self
            .block_cache
            .latest_blocks(1, Some(fork_id))
            .into_iter()
            .next()
            .ok_or(Error::HeadBlockNotFound { fork_id })?;

        let head_block_number = head_block
            .execution_block_number()
            .ok_or(Error::HeadBlockIndexMissing { fork_id })?;

        let from_block = self.state.final_block + 1;
        let to_block = head_block_number.saturating_sub(1);

        if from_block > to_block {
            debug!("no unfinalized blocks to scan on fork {fork_id}");
            return Ok(());
        }

        let deposit_txs = {
            let this = &*self;

            ClientFailover::new(&fork.clients, self.config.recent_pass_attempts)
                .run(move |client, cancellation_token| {
                    this.collect_recent_deposits(
                        client,
                        cancellation_token,
                        fork_id,
                        from_block..=to_block,
                    )
                })
                .await?
        };

        // The checkpoint stays put. Only the advisory head moves.
        let next_state = DepositIndexerState {
            head_block: self.state.head_block.max(to_block),
            ..self.state
        };

        if deposit_txs.is_empty() && next_state == self.state {
            return Ok(());
        }

        let observations = deposit_txs
            .iter()
            .map(|deposit_tx| (deposit_tx.index, deposit_tx.block_root))
            .collect::<Vec<_>>();

        let mut batch = WriteBatch::with_deposit_txs(deposit_txs);
        batch.set_explorer_state(DEPOSIT_STATE_KEY, serde_json::to_string(&next_state)?);

        self.database
            .commit(batch)
            .context("could not persist deposit txs")?;

        self.state = next_state;

        if observations.is_empty() {
            return Ok(());
        }

        info!(
            "crawled recent deposits for fork {fork_id} since block {}: {} deposits",
            self.state.final_block,
            observations.len(),
        );

        for (index, block_hash) in observations {
            self.unfinalized_deposits.insert(index, block_hash);
        }

        tokio::time::sleep(self.config.batch_pause).await;

        Ok(())
    }

    async fn collect_recent_deposits(
        &self,
        client: Arc<dyn ExecutionClient>,
        cancellation_token: CancellationToken,
        head_fork_id: ForkKey,
        blocks: RangeInclusive<ExecutionBlockNumber>,
    ) -> Result<Vec<DepositTx>> {
        let chain_config = self.chain_state.config();

        let mut resolver = LogResolver::new(
            chain_config,
            &self.config,
            client.as_ref(),
            &cancellation_token,
        );

        let logs = resolver
            .deposit_logs(self.deposit_contract, blocks)
            .await
            .context("error fetching deposit contract logs")?;

        let mut seen = HashSet::new();
        let mut deposit_txs = vec![];

        for log in &logs {
            let Some(deposit_event) = log_resolver::decode_deposit_log(log)? else {
                continue;
            };

            let block_hash = log_resolver::log_block_hash(log)?;

            if self.unfinalized_deposits.contains(deposit_event.index, block_hash)
                || !seen.insert((deposit_event.index, block_hash))
            {
                continue;
            }

            let deposit_tx = resolver.deposit_tx(log, deposit_event).await?;

            deposit_txs.push(DepositTx {
                orphaned: true,
                fork_id: Some(self.deposit_fork_id(block_hash, head_fork_id)),
                ..deposit_tx
            });
        }

        Ok(deposit_txs)
    }

    // Competing beacon blocks can carry the same execution payload.
    // The block with the lowest root wins so that repeated runs agree.
    fn deposit_fork_id(&self, block_hash: ExecutionBlockHash, head_fork_id: ForkKey) -> ForkKey {
        let blocks = self.block_cache.blocks_by_execution_block_hash(block_hash);

        if blocks.len() > 1 {
            warn!(
                "found {} beacon blocks for deposit block hash {block_hash:?}",
                blocks.len(),
            );
        }

        blocks
            .first()
            .map_or(head_fork_id, |block| block.fork_id())
    }
}
