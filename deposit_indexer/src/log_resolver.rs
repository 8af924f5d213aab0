use core::{future::Future, ops::RangeInclusive, time::Duration};
use std::collections::HashMap;

use anyhow::Result;
use eth1_api::{DepositEvent, ExecutionClient, ExecutionHeader, ExecutionTransaction};
use tokio_util::sync::CancellationToken;
use types::{
    config::Config,
    nonstandard::DepositTx,
    primitives::{ExecutionAddress, ExecutionBlockNumber, ExecutionTransactionHash, H256},
};
use web3::types::Log;

use crate::{deposit_validation, error::Error, indexer_config::DepositIndexerConfig};

/// Decodes `log` if it is a live `DepositEvent`.
///
/// Removed logs and logs with other topics are skipped.
/// A deposit event that fails to decode is an error.
pub fn decode_deposit_log(log: &Log) -> Result<Option<DepositEvent>> {
    if log.is_removed() || log.topics.first() != Some(&DepositEvent::TOPIC) {
        return Ok(None);
    }

    DepositEvent::try_from(log).map(Some)
}

pub fn log_block_hash(log: &Log) -> Result<H256> {
    log.block_hash
        .ok_or_else(|| Error::IncompleteLog { field: "block hash" }.into())
}

/// Turns deposit logs from one client into [`DepositTx`]s.
///
/// Transactions and headers are fetched once per resolver.
/// Every request is bounded by a timeout and aborted when `cancellation_token` is cancelled.
pub struct LogResolver<'a> {
    chain_config: &'a Config,
    indexer_config: &'a DepositIndexerConfig,
    client: &'a dyn ExecutionClient,
    cancellation_token: &'a CancellationToken,
    transactions: HashMap<ExecutionTransactionHash, ExecutionTransaction>,
    headers: HashMap<ExecutionBlockNumber, ExecutionHeader>,
}

impl<'a> LogResolver<'a> {
    pub fn new(
        chain_config: &'a Config,
        indexer_config: &'a DepositIndexerConfig,
        client: &'a dyn ExecutionClient,
        cancellation_token: &'a CancellationToken,
    ) -> Self {
        Self {
            chain_config,
            indexer_config,
            client,
            cancellation_token,
            transactions: HashMap::new(),
            headers: HashMap::new(),
        }
    }

    pub async fn deposit_logs(
        &self,
        address: ExecutionAddress,
        blocks: RangeInclusive<ExecutionBlockNumber>,
    ) -> Result<Vec<Log>> {
        self.bounded(
            "eth_getLogs",
            self.indexer_config.log_query_timeout,
            self.client.deposit_logs(address, blocks),
        )
        .await
    }

    /// Builds a finalized observation of `deposit_event`.
    /// The recent pass marks the result as orphaned itself.
    pub async fn deposit_tx(&mut self, log: &Log, deposit_event: DepositEvent) -> Result<DepositTx> {
        let block_hash = log_block_hash(log)?;

        let block_number = log
            .block_number
            .ok_or(Error::IncompleteLog {
                field: "block number",
            })?
            .as_u64();

        let tx_hash = log.transaction_hash.ok_or(Error::IncompleteLog {
            field: "transaction hash",
        })?;

        let transaction = self.transaction(tx_hash).await?;
        let header = self.header(block_number).await?;

        let DepositEvent { data, index } = deposit_event;

        Ok(DepositTx {
            index,
            block_number,
            block_time: header.timestamp,
            block_root: block_hash,
            public_key: data.pubkey,
            withdrawal_credentials: data.withdrawal_credentials,
            amount: data.amount,
            signature: data.signature,
            valid_signature: deposit_validation::has_valid_signature(self.chain_config, data),
            orphaned: false,
            fork_id: None,
            tx_hash,
            // Recovered from the transaction signature by the execution node.
            tx_sender: transaction.from,
            tx_target: transaction.to,
        })
    }

    async fn transaction(&mut self, hash: ExecutionTransactionHash) -> Result<ExecutionTransaction> {
        if let Some(transaction) = self.transactions.get(&hash) {
            return Ok(*transaction);
        }

        let transaction = self
            .bounded(
                "eth_getTransactionByHash",
                self.indexer_config.request_timeout,
                self.client.transaction_by_hash(hash),
            )
            .await?
            .ok_or(Error::TransactionNotFound { hash })?;

        self.transactions.insert(hash, transaction);

        Ok(transaction)
    }

    async fn header(&mut self, number: ExecutionBlockNumber) -> Result<ExecutionHeader> {
        if let Some(header) = self.headers.get(&number) {
            return Ok(*header);
        }

        let header = self
            .bounded(
                "eth_getBlockByNumber",
                self.indexer_config.request_timeout,
                self.client.header_by_number(number),
            )
            .await?
            .ok_or(Error::HeaderNotFound { number })?;

        self.headers.insert(number, header);

        Ok(header)
    }

    async fn bounded<T>(
        &self,
        request: &'static str,
        timeout: Duration,
        future: impl Future<Output = Result<T>> + Send,
    ) -> Result<T> {
        tokio::select! {
            () = self.cancellation_token.cancelled() => Err(Error::Cancelled {
                request,
                client: self.client.name().to_owned(),
            }
            .into()),
            result = tokio::time::timeout(timeout, future) => match result {
                Ok(result) => result,
                Err(_) => Err(Error::Timeout {
                    request,
                    client: self.client.name().to_owned(),
                    timeout,
                }
                .into()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use bls::{PublicKeyBytes, SignatureBytes};
    use types::containers::DepositData;
    use web3::types::U64;

    use super::*;

    #[derive(Default)]
    struct CountingClient {
        transaction_requests: AtomicUsize,
        header_requests: AtomicUsize,
        stall: bool,
    }

    #[async_trait]
    impl ExecutionClient for CountingClient {
        fn name(&self) -> &str {
            "counting"
        }

        async fn deposit_logs(
            &self,
            _address: ExecutionAddress,
            _blocks: RangeInclusive<ExecutionBlockNumber>,
        ) -> Result<Vec<Log>> {
            if self.stall {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }

            Ok(vec![])
        }

        async fn transaction_by_hash(
            &self,
            hash: ExecutionTransactionHash,
        ) -> Result<Option<ExecutionTransaction>> {
            self.transaction_requests.fetch_add(1, Ordering::Relaxed);

            Ok(Some(ExecutionTransaction {
                hash,
                from: ExecutionAddress::repeat_byte(0xaa),
                to: Some(ExecutionAddress::repeat_byte(0xdd)),
            }))
        }

        async fn header_by_number(
            &self,
            number: ExecutionBlockNumber,
        ) -> Result<Option<ExecutionHeader>> {
            self.header_requests.fetch_add(1, Ordering::Relaxed);

            Ok(Some(ExecutionHeader {
                hash: H256::from_low_u64_be(number),
                number,
                timestamp: 1_000 + number,
            }))
        }
    }

    fn log(index: u64, tx_hash: H256, block_number: u64) -> Log {
        let deposit_event = DepositEvent {
            data: DepositData {
                pubkey: PublicKeyBytes::repeat_byte(1),
                withdrawal_credentials: H256::repeat_byte(2),
                amount: 1_000_000_000,
                signature: SignatureBytes::repeat_byte(3),
            },
            index,
        };

        Log {
            address: ExecutionAddress::repeat_byte(0xdd),
            topics: vec![DepositEvent::TOPIC],
            data: deposit_event.log_data().into(),
            block_hash: Some(H256::from_low_u64_be(block_number)),
            block_number: Some(U64::from(block_number)),
            transaction_hash: Some(tx_hash),
            transaction_index: None,
            log_index: None,
            transaction_log_index: None,
            log_type: None,
            removed: None,
        }
    }

    #[tokio::test]
    async fn deposit_tx_fetches_each_transaction_and_header_once() -> Result<()> {
        let chain_config = Config::minimal();
        let indexer_config = DepositIndexerConfig::default();
        let client = CountingClient::default();
        let cancellation_token = CancellationToken::new();

        let mut resolver =
            LogResolver::new(&chain_config, &indexer_config, &client, &cancellation_token);

        let logs = [
            log(0, H256::repeat_byte(0x10), 5),
            log(1, H256::repeat_byte(0x10), 5),
            log(2, H256::repeat_byte(0x20), 5),
        ];

        let mut deposit_txs = vec![];

        for log in &logs {
            let deposit_event = decode_deposit_log(log)?.expect("log is a deposit event");
            deposit_txs.push(resolver.deposit_tx(log, deposit_event).await?);
        }

        assert_eq!(client.transaction_requests.load(Ordering::Relaxed), 2);
        assert_eq!(client.header_requests.load(Ordering::Relaxed), 1);

        let deposit_tx = deposit_txs[1];

        assert_eq!(deposit_tx.index, 1);
        assert_eq!(deposit_tx.block_number, 5);
        assert_eq!(deposit_tx.block_time, 1_005);
        assert_eq!(deposit_tx.block_root, H256::from_low_u64_be(5));
        assert_eq!(deposit_tx.amount, 1_000_000_000);
        assert_eq!(deposit_tx.tx_sender, ExecutionAddress::repeat_byte(0xaa));
        assert_eq!(deposit_tx.tx_target, Some(ExecutionAddress::repeat_byte(0xdd)));
        assert!(!deposit_tx.valid_signature);
        assert!(!deposit_tx.orphaned);

        Ok(())
    }

    #[test]
    fn decode_deposit_log_skips_removed_and_foreign_logs() -> Result<()> {
        let removed = Log {
            removed: Some(true),
            ..log(0, H256::zero(), 1)
        };

        let foreign = Log {
            topics: vec![H256::repeat_byte(0xee)],
            ..log(0, H256::zero(), 1)
        };

        assert_eq!(decode_deposit_log(&removed)?, None);
        assert_eq!(decode_deposit_log(&foreign)?, None);

        Ok(())
    }

    #[test]
    fn decode_deposit_log_rejects_truncated_event() {
        let truncated = Log {
            data: vec![0; 64].into(),
            ..log(0, H256::zero(), 1)
        };

        decode_deposit_log(&truncated).expect_err("truncated event should fail to decode");
    }

    #[tokio::test]
    async fn requests_are_aborted_on_cancellation() {
        let chain_config = Config::minimal();
        let indexer_config = DepositIndexerConfig::default();

        let client = CountingClient {
            stall: true,
            ..CountingClient::default()
        };

        let cancellation_token = CancellationToken::new();
        let resolver =
            LogResolver::new(&chain_config, &indexer_config, &client, &cancellation_token);

        cancellation_token.cancel();

        let error = resolver
            .deposit_logs(ExecutionAddress::zero(), 0..=1)
            .await
            .expect_err("cancelled request should fail");

        assert!(matches!(
            error.downcast_ref(),
            Some(Error::Cancelled { request: "eth_getLogs", .. }),
        ));
    }

    #[tokio::test]
    async fn requests_time_out() {
        let chain_config = Config::minimal();

        let indexer_config = DepositIndexerConfig {
            log_query_timeout: Duration::from_millis(10),
            ..DepositIndexerConfig::default()
        };

        let client = CountingClient {
            stall: true,
            ..CountingClient::default()
        };

        let cancellation_token = CancellationToken::new();
        let resolver =
            LogResolver::new(&chain_config, &indexer_config, &client, &cancellation_token);

        let error = resolver
            .deposit_logs(ExecutionAddress::zero(), 0..=1)
            .await
            .expect_err("stalled request should time out");

        assert!(matches!(error.downcast_ref(), Some(Error::Timeout { .. })));
    }
}
