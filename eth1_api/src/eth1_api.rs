use core::ops::RangeInclusive;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;
use types::primitives::{ExecutionAddress, ExecutionBlockNumber, ExecutionTransactionHash};
use web3::{
    api::{Eth, Namespace as _},
    helpers::CallFuture,
    transports::Http,
    types::{FilterBuilder, Log, U64},
    Transport as _, Web3,
};

use crate::{
    deposit_event::DepositEvent,
    execution_client::{
        ExecutionClient, ExecutionHeader, ExecutionTransaction, RawExecutionHeader,
    },
};

/// [`ExecutionClient`] backed by the JSON-RPC API of a single execution node.
pub struct Eth1Api {
    name: String,
    client: Client,
    url: Url,
}

impl Eth1Api {
    #[must_use]
    pub fn new(name: impl Into<String>, client: Client, url: Url) -> Self {
        Self {
            name: name.into(),
            client,
            url,
        }
    }

    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }

    fn api(&self) -> Eth<Http> {
        let http = Http::with_client(self.client.clone(), self.url.clone());
        Web3::new(http).eth()
    }

    async fn execute<T: DeserializeOwned + Send>(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> Result<T> {
        let api = self.api();

        CallFuture::new(api.transport().execute_with_headers(method, params, None, None))
            .await
            .map_err(|error| {
                warn!(
                    "execution node {} ({}) returned an error for {method}: {error}",
                    self.name, self.url,
                );

                error.into()
            })
    }
}

#[async_trait]
impl ExecutionClient for Eth1Api {
    fn name(&self) -> &str {
        &self.name
    }

    async fn deposit_logs(
        &self,
        address: ExecutionAddress,
        blocks: RangeInclusive<ExecutionBlockNumber>,
    ) -> Result<Vec<Log>> {
        // Some networks use contracts that emit events other than `DepositEvent`.
        // Filtering by topic keeps them out of the response.
        let filter = FilterBuilder::default()
            .from_block((*blocks.start()).into())
            .to_block((*blocks.end()).into())
            .address(vec![address])
            .topics(Some(vec![DepositEvent::TOPIC]), None, None, None)
            .build();

        self.api().logs(filter, None).await.map_err(|error| {
            warn!(
                "execution node {} ({}) failed to return deposit logs for blocks {}..={}: {error}",
                self.name,
                self.url,
                blocks.start(),
                blocks.end(),
            );

            error.into()
        })
    }

    async fn transaction_by_hash(
        &self,
        hash: ExecutionTransactionHash,
    ) -> Result<Option<ExecutionTransaction>> {
        let params = vec![serde_json::to_value(hash)?];
        self.execute("eth_getTransactionByHash", params).await
    }

    async fn header_by_number(
        &self,
        number: ExecutionBlockNumber,
    ) -> Result<Option<ExecutionHeader>> {
        let params = vec![serde_json::to_value(U64::from(number))?, Value::Bool(false)];

        let header = self
            .execute::<Option<RawExecutionHeader>>("eth_getBlockByNumber", params)
            .await?;

        Ok(header.map(Into::into))
    }
}
