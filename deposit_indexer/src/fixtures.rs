use core::{
    ops::RangeInclusive,
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
};
use std::sync::{Arc, Mutex};

use anyhow::{bail, ensure, Result};
use async_trait::async_trait;
use block_cache::{Block, BlockCache, BlockCacheConfig};
use bls::{consts::SECRET_KEY_SIZE, PublicKeyBytes, SecretKey, SignatureBytes};
use database::{Database, PersistenceGateway, WriteBatch};
use eth1_api::{
    DepositEvent, ExecutionClient, ExecutionHeader, ExecutionTransaction, ForkWithClients,
    StaticClientPool,
};
use helper_functions::signing::SignForAllForks as _;
use types::{
    chain_state::StaticChainState,
    config::Config,
    containers::{Checkpoint, DepositData, DepositMessage},
    nonstandard::{BlockBody, BlockHead, DepositTx, ExecutionPayloadSummary, ForkKey},
    primitives::{
        DepositIndex, ExecutionAddress, ExecutionBlockHash, ExecutionBlockNumber,
        ExecutionTransactionHash, H160, H256,
    },
};
use web3::types::{Log, U64};

use crate::{deposit_indexer::DepositIndexer, indexer_config::DepositIndexerConfig};

pub const SENDER: ExecutionAddress = H160([0xaa; 20]);

pub fn block_root(id: u8) -> H256 {
    H256::repeat_byte(id)
}

pub fn execution_hash(id: u8) -> ExecutionBlockHash {
    let mut hash = H256::repeat_byte(id);
    hash.0[0] = 0xee;
    hash
}

pub fn signed_deposit_data(config: &Config) -> Result<DepositData> {
    let secret_key = SecretKey::try_from([b'?'; SECRET_KEY_SIZE])?;

    let message = DepositMessage {
        pubkey: secret_key.to_public_key().into(),
        withdrawal_credentials: H256::repeat_byte(1),
        amount: 32_000_000_000,
    };

    Ok(DepositData {
        pubkey: message.pubkey,
        withdrawal_credentials: message.withdrawal_credentials,
        amount: message.amount,
        signature: message.sign(config, &secret_key).into(),
    })
}

pub fn garbage_deposit_data() -> DepositData {
    DepositData {
        pubkey: PublicKeyBytes::repeat_byte(1),
        withdrawal_credentials: H256::repeat_byte(2),
        amount: 1_000_000_000,
        signature: SignatureBytes::repeat_byte(3),
    }
}

pub fn deposit_log(
    index: DepositIndex,
    block_number: ExecutionBlockNumber,
    block_hash: ExecutionBlockHash,
    data: DepositData,
) -> Log {
    Log {
        address: Config::minimal().deposit_contract_address,
        topics: vec![DepositEvent::TOPIC],
        data: DepositEvent { data, index }.log_data().into(),
        block_hash: Some(block_hash),
        block_number: Some(U64::from(block_number)),
        transaction_hash: Some(H256::from_low_u64_be(index + 1)),
        transaction_index: Some(U64::zero()),
        log_index: Some(index.into()),
        transaction_log_index: None,
        log_type: None,
        removed: Some(false),
    }
}

/// Execution client that serves logs from memory.
pub struct MockClient {
    name: &'static str,
    logs: Mutex<Vec<Log>>,
    failing: AtomicBool,
    log_requests: AtomicUsize,
    transaction_requests: AtomicUsize,
}

impl MockClient {
    pub fn new(name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            logs: Mutex::default(),
            failing: AtomicBool::new(false),
            log_requests: AtomicUsize::new(0),
            transaction_requests: AtomicUsize::new(0),
        })
    }

    pub fn failing(name: &'static str) -> Arc<Self> {
        let client = Self::new(name);
        client.failing.store(true, Ordering::SeqCst);
        client
    }

    pub fn push_log(&self, log: Log) {
        self.logs.lock().expect("logs mutex is poisoned").push(log);
    }

    pub fn log_requests(&self) -> usize {
        self.log_requests.load(Ordering::SeqCst)
    }

    pub fn transaction_requests(&self) -> usize {
        self.transaction_requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExecutionClient for MockClient {
    fn name(&self) -> &str {
        self.name
    }

    async fn deposit_logs(
        &self,
        _address: ExecutionAddress,
        blocks: RangeInclusive<ExecutionBlockNumber>,
    ) -> Result<Vec<Log>> {
        self.log_requests.fetch_add(1, Ordering::SeqCst);

        if self.failing.load(Ordering::SeqCst) {
            bail!("{} is unavailable", self.name);
        }

        let logs = self
            .logs
            .lock()
            .expect("logs mutex is poisoned")
            .iter()
            .filter(|log| {
                log.block_number
                    .is_some_and(|number| blocks.contains(&number.as_u64()))
            })
            .cloned()
            .collect();

        Ok(logs)
    }

    async fn transaction_by_hash(
        &self,
        hash: ExecutionTransactionHash,
    ) -> Result<Option<ExecutionTransaction>> {
        self.transaction_requests.fetch_add(1, Ordering::SeqCst);

        Ok(Some(ExecutionTransaction {
            hash,
            from: SENDER,
            to: Some(Config::minimal().deposit_contract_address),
        }))
    }

    async fn header_by_number(
        &self,
        number: ExecutionBlockNumber,
    ) -> Result<Option<ExecutionHeader>> {
        Ok(Some(ExecutionHeader {
            hash: H256::from_low_u64_be(number),
            number,
            timestamp: 1_600_000_000 + number * 12,
        }))
    }
}

/// In-memory database whose commits can be made to fail.
pub struct TestDatabase {
    database: Database,
    commits: AtomicUsize,
    first_failing_commit: AtomicUsize,
}

impl TestDatabase {
    fn new() -> Self {
        Self {
            database: Database::in_memory(),
            commits: AtomicUsize::new(0),
            first_failing_commit: AtomicUsize::new(usize::MAX),
        }
    }

    /// Makes the commit with the 0-based number `commit` and every later one fail.
    pub fn fail_commits_from(&self, commit: usize) {
        self.first_failing_commit.store(commit, Ordering::SeqCst);
    }
}

impl PersistenceGateway for TestDatabase {
    fn explorer_state(&self, key: &str) -> Result<Option<String>> {
        self.database.explorer_state(key)
    }

    fn block_head_by_root(&self, root: H256) -> Result<Option<BlockHead>> {
        self.database.block_head_by_root(root)
    }

    fn deposit_txs_by_index(&self, index: DepositIndex) -> Result<Vec<DepositTx>> {
        self.database.deposit_txs_by_index(index)
    }

    fn commit(&self, batch: WriteBatch) -> Result<()> {
        let commit = self.commits.fetch_add(1, Ordering::SeqCst);

        ensure!(
            commit < self.first_failing_commit.load(Ordering::SeqCst),
            "simulated commit failure",
        );

        self.database.commit(batch)
    }
}

pub struct Fixture {
    pub chain_state: Arc<StaticChainState>,
    pub block_cache: Arc<BlockCache>,
    pub database: Arc<TestDatabase>,
    pub client_pool: Arc<StaticClientPool>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_config(Config::minimal())
    }

    pub fn with_config(config: Config) -> Self {
        let chain_state = Arc::new(StaticChainState::new(Arc::new(config), 1_600_000_000));
        let database = Arc::new(TestDatabase::new());

        let block_cache = Arc::new(BlockCache::new(
            BlockCacheConfig::default(),
            Arc::clone(&chain_state) as _,
            Arc::clone(&database) as _,
        ));

        Self {
            chain_state,
            block_cache,
            database,
            client_pool: Arc::new(StaticClientPool::default()),
        }
    }

    pub fn deposit_indexer(&self, config: DepositIndexerConfig) -> Result<DepositIndexer> {
        DepositIndexer::new(
            config,
            Arc::clone(&self.chain_state) as _,
            Arc::clone(&self.block_cache),
            Arc::clone(&self.client_pool) as _,
            Arc::clone(&self.database) as _,
        )
    }

    /// Adds a beacon block whose payload has `execution_number` and [`execution_hash`]`(id)`.
    pub fn add_block(
        &self,
        id: u8,
        slot: u64,
        execution_number: ExecutionBlockNumber,
        fork_id: u64,
    ) -> Arc<Block> {
        let (block, _) = self.block_cache.create_or_get_block(block_root(id), slot);

        block.set_body(BlockBody {
            execution_payload: Some(ExecutionPayloadSummary {
                block_hash: execution_hash(id),
                block_number: execution_number,
                timestamp: 0,
            }),
            ..BlockBody::default()
        });

        block.set_fork_id(ForkKey::new(fork_id));

        block
    }

    pub fn justify(&self, id: u8) {
        self.chain_state.update_checkpoints(
            Checkpoint {
                epoch: 1,
                root: block_root(id),
            },
            Checkpoint::default(),
        );
    }

    pub fn justify_unknown_block(&self) {
        self.justify(0xff);
    }

    pub fn set_forks(&self, forks: impl IntoIterator<Item = (u64, bool, Vec<Arc<MockClient>>)>) {
        let forks = forks
            .into_iter()
            .map(|(fork_id, canonical, clients)| ForkWithClients {
                fork_id: ForkKey::new(fork_id),
                canonical,
                clients: clients
                    .into_iter()
                    .map(|client| client as Arc<dyn ExecutionClient>)
                    .collect(),
            })
            .collect();

        self.client_pool.set_forks(forks);
    }
}
