use std::sync::Arc;

use derive_more::Debug;
use parking_lot::RwLock;
use types::nonstandard::ForkKey;

use crate::execution_client::ExecutionClient;

/// Execution clients that agree on the same fork head.
#[derive(Clone, Debug)]
pub struct ForkWithClients {
    pub fork_id: ForkKey,
    pub canonical: bool,
    #[debug(skip)]
    pub clients: Vec<Arc<dyn ExecutionClient>>,
}

/// Source of execution clients, grouped by the fork each of them follows.
pub trait ExecutionClientPool: Send + Sync {
    /// Clients on the canonical fork, in order of preference.
    fn finalized_clients(&self) -> Vec<Arc<dyn ExecutionClient>>;

    /// Every fork that currently has at least one client following it.
    fn forks_with_clients(&self) -> Vec<ForkWithClients>;
}

/// [`ExecutionClientPool`] with groupings supplied from outside.
///
/// Whatever tracks client heads is expected to call [`StaticClientPool::set_forks`]
/// when the grouping changes.
#[derive(Default)]
pub struct StaticClientPool {
    forks: RwLock<Vec<ForkWithClients>>,
}

impl StaticClientPool {
    #[must_use]
    pub fn new(forks: Vec<ForkWithClients>) -> Self {
        Self {
            forks: RwLock::new(forks),
        }
    }

    pub fn set_forks(&self, forks: Vec<ForkWithClients>) {
        *self.forks.write() = forks;
    }
}

impl ExecutionClientPool for StaticClientPool {
    fn finalized_clients(&self) -> Vec<Arc<dyn ExecutionClient>> {
        self.forks
            .read()
            .iter()
            .filter(|fork| fork.canonical)
            .flat_map(|fork| fork.clients.iter().map(Arc::clone))
            .collect()
    }

    fn forks_with_clients(&self) -> Vec<ForkWithClients> {
        self.forks
            .read()
            .iter()
            .filter(|fork| !fork.clients.is_empty())
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use core::ops::RangeInclusive;

    use anyhow::Result;
    use async_trait::async_trait;
    use types::primitives::{ExecutionAddress, ExecutionBlockNumber, ExecutionTransactionHash};
    use web3::types::Log;

    use crate::execution_client::{ExecutionHeader, ExecutionTransaction};

    use super::*;

    struct NamedClient(&'static str);

    #[async_trait]
    impl ExecutionClient for NamedClient {
        fn name(&self) -> &str {
            self.0
        }

        async fn deposit_logs(
            &self,
            _address: ExecutionAddress,
            _blocks: RangeInclusive<ExecutionBlockNumber>,
        ) -> Result<Vec<Log>> {
            Ok(vec![])
        }

        async fn transaction_by_hash(
            &self,
            _hash: ExecutionTransactionHash,
        ) -> Result<Option<ExecutionTransaction>> {
            Ok(None)
        }

        async fn header_by_number(
            &self,
            _number: ExecutionBlockNumber,
        ) -> Result<Option<ExecutionHeader>> {
            Ok(None)
        }
    }

    fn fork(fork_id: u64, canonical: bool, names: &[&'static str]) -> ForkWithClients {
        ForkWithClients {
            fork_id: ForkKey::new(fork_id),
            canonical,
            clients: names
                .iter()
                .map(|name| Arc::new(NamedClient(name)) as Arc<dyn ExecutionClient>)
                .collect(),
        }
    }

    fn names(clients: &[Arc<dyn ExecutionClient>]) -> Vec<&str> {
        clients.iter().map(|client| client.name()).collect()
    }

    #[test]
    fn finalized_clients_come_from_canonical_forks() {
        let pool = StaticClientPool::new(vec![
            fork(1, false, &["geth"]),
            fork(2, true, &["nethermind", "besu"]),
        ]);

        assert_eq!(names(&pool.finalized_clients()), ["nethermind", "besu"]);
    }

    #[test]
    fn forks_without_clients_are_skipped() {
        let pool = StaticClientPool::default();

        pool.set_forks(vec![fork(1, true, &["geth"]), fork(2, false, &[])]);

        let forks = pool.forks_with_clients();

        assert_eq!(forks.len(), 1);
        assert_eq!(forks[0].fork_id, ForkKey::new(1));
    }
}
