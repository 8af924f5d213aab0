use std::{path::Path, sync::Mutex};

use anyhow::Result;
use bls::{PublicKeyBytes, SignatureBytes};
use im::OrdMap;
use itertools::Itertools as _;
use rusqlite::{
    params_from_iter, types::Value, Connection, OptionalExtension as _, Row, Transaction,
    TransactionBehavior,
};
use thiserror::Error;
use tracing::{debug, info};
use types::{
    nonstandard::{BlockHead, DepositTx, ForkKey},
    primitives::{DepositIndex, H160, H256},
};

#[allow(clippy::str_to_string)]
mod schema {
    use refinery::embed_migrations;
    embed_migrations!();
}

/// Maximum number of deposit rows written by a single `INSERT` statement.
pub const DEPOSIT_TX_INSERT_CHUNK_SIZE: usize = 500;

const DB_PATH: &str = "explorer.sqlite";

const DEPOSIT_TX_COLUMNS: &str = "
    deposit_index, block_number, block_time, block_root, public_key, withdrawal_credentials,
    amount, signature, valid_signature, orphaned, fork_id, tx_hash, tx_sender, tx_target
";

const DEPOSIT_TX_COLUMN_COUNT: usize = 14;

/// Storage used by the indexers.
///
/// Implemented by [`Database`]. Other implementations exist to make storage failures testable.
pub trait PersistenceGateway: Send + Sync {
    fn explorer_state(&self, key: &str) -> Result<Option<String>>;

    fn block_head_by_root(&self, root: H256) -> Result<Option<BlockHead>>;

    fn deposit_txs_by_index(&self, index: DepositIndex) -> Result<Vec<DepositTx>>;

    /// Writes everything in `batch` atomically.
    fn commit(&self, batch: WriteBatch) -> Result<()>;
}

/// Writes committed together by [`PersistenceGateway::commit`].
#[derive(Default, Debug)]
pub struct WriteBatch {
    pub deposit_txs: Vec<DepositTx>,
    pub block_heads: Vec<BlockHead>,
    pub explorer_state: Vec<(String, String)>,
}

impl WriteBatch {
    #[must_use]
    pub fn with_deposit_txs(deposit_txs: Vec<DepositTx>) -> Self {
        Self {
            deposit_txs,
            ..Self::default()
        }
    }

    pub fn set_explorer_state(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.explorer_state.push((key.into(), value.into()));
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.deposit_txs.is_empty() && self.block_heads.is_empty() && self.explorer_state.is_empty()
    }
}

pub struct Database(DatabaseKind);

impl Database {
    pub fn persistent(directory: impl AsRef<Path>) -> Result<Self> {
        let path = directory.as_ref().join(DB_PATH);

        info!("opening explorer database at {}", path.display());

        let mut connection = Connection::open(path)?;
        schema::migrations::runner().run(&mut connection)?;
        Self::set_shared_pragma(&connection)?;

        connection.pragma_update(None, "journal_mode", "WAL")?;

        Ok(Self(DatabaseKind::Persistent {
            connection: Mutex::new(connection),
        }))
    }

    #[must_use]
    pub fn in_memory() -> Self {
        Self(DatabaseKind::InMemory {
            tables: Mutex::default(),
        })
    }

    fn set_shared_pragma(connection: &Connection) -> Result<()> {
        // Foreign key constraints are not enforced by default.
        // See <https://sqlite.org/pragma.html#pragma_foreign_keys>.
        connection.pragma_update(None, "foreign_keys", true)?;
        Ok(())
    }

    const fn kind(&self) -> &DatabaseKind {
        &self.0
    }
}

impl PersistenceGateway for Database {
    fn explorer_state(&self, key: &str) -> Result<Option<String>> {
        match self.kind() {
            DatabaseKind::Persistent { connection } => connection
                .lock()
                .expect("database connection mutex is poisoned")
                .query_row(
                    "SELECT value FROM explorer_state WHERE key = ?1",
                    [key],
                    |row| row.get(0),
                )
                .optional()
                .map_err(Into::into),
            DatabaseKind::InMemory { tables } => Ok(tables
                .lock()
                .expect("in-memory database mutex is poisoned")
                .explorer_state
                .get(key)
                .cloned()),
        }
    }

    fn block_head_by_root(&self, root: H256) -> Result<Option<BlockHead>> {
        match self.kind() {
            DatabaseKind::Persistent { connection } => connection
                .lock()
                .expect("database connection mutex is poisoned")
                .query_row(
                    "SELECT root, slot, parent_root, fork_id FROM block_heads WHERE root = ?1",
                    [root.as_bytes()],
                    |row| {
                        Ok(BlockHead {
                            root: H256(row.get(0)?),
                            slot: row.get(1)?,
                            parent_root: H256(row.get(2)?),
                            fork_id: ForkKey::new(row.get(3)?),
                        })
                    },
                )
                .optional()
                .map_err(Into::into),
            DatabaseKind::InMemory { tables } => Ok(tables
                .lock()
                .expect("in-memory database mutex is poisoned")
                .block_heads
                .get(&root)
                .copied()),
        }
    }

    fn deposit_txs_by_index(&self, index: DepositIndex) -> Result<Vec<DepositTx>> {
        match self.kind() {
            DatabaseKind::Persistent { connection } => {
                let connection = connection
                    .lock()
                    .expect("database connection mutex is poisoned");

                let mut statement = connection.prepare_cached(&format!(
                    "SELECT {DEPOSIT_TX_COLUMNS}
                    FROM deposit_txs
                    WHERE deposit_index = ?1
                    ORDER BY block_number, block_root",
                ))?;

                let deposit_txs = statement
                    .query_map([integer(index)?], read_deposit_tx)?
                    .collect::<Result<_, _>>()?;

                Ok(deposit_txs)
            }
            DatabaseKind::InMemory { tables } => {
                let tables = tables.lock().expect("in-memory database mutex is poisoned");

                let deposit_txs = tables
                    .deposit_txs
                    .range((index, H256::zero())..=(index, H256::repeat_byte(u8::MAX)))
                    .map(|(_, deposit_tx)| *deposit_tx)
                    .sorted_by_key(|deposit_tx| (deposit_tx.block_number, deposit_tx.block_root))
                    .collect();

                Ok(deposit_txs)
            }
        }
    }

    fn commit(&self, batch: WriteBatch) -> Result<()> {
        let WriteBatch {
            deposit_txs,
            block_heads,
            explorer_state,
        } = batch;

        debug!(
            "committing {} deposit transactions, {} block heads and {} state entries",
            deposit_txs.len(),
            block_heads.len(),
            explorer_state.len(),
        );

        match self.kind() {
            DatabaseKind::Persistent { connection } => {
                let mut connection = connection
                    .lock()
                    .expect("database connection mutex is poisoned");

                // Dropping the transaction without committing it rolls it back.
                let transaction =
                    connection.transaction_with_behavior(TransactionBehavior::Immediate)?;

                for chunk in deposit_txs.chunks(DEPOSIT_TX_INSERT_CHUNK_SIZE) {
                    insert_deposit_txs(&transaction, chunk)?;
                }

                for block_head in block_heads {
                    transaction.execute(
                        "INSERT OR REPLACE INTO block_heads (root, slot, parent_root, fork_id)
                        VALUES (?1, ?2, ?3, ?4)",
                        (
                            block_head.root.as_bytes(),
                            integer(block_head.slot)?,
                            block_head.parent_root.as_bytes(),
                            integer(block_head.fork_id.get())?,
                        ),
                    )?;
                }

                for (key, value) in explorer_state {
                    transaction.execute(
                        "INSERT INTO explorer_state (key, value) VALUES (?1, ?2)
                        ON CONFLICT (key) DO UPDATE SET value = excluded.value",
                        (key, value),
                    )?;
                }

                transaction.commit()?;
            }
            DatabaseKind::InMemory { tables } => {
                let mut tables = tables.lock().expect("in-memory database mutex is poisoned");
                let mut new_tables = tables.clone();

                for deposit_tx in deposit_txs {
                    new_tables.upsert_deposit_tx(deposit_tx);
                }

                for block_head in block_heads {
                    new_tables.block_heads.insert(block_head.root, block_head);
                }

                for (key, value) in explorer_state {
                    new_tables.explorer_state.insert(key, value);
                }

                *tables = new_tables;
            }
        }

        Ok(())
    }
}

enum DatabaseKind {
    Persistent {
        // `rusqlite::Connection` is `Send` but not `Sync`.
        connection: Mutex<Connection>,
    },
    InMemory {
        // Replaced wholesale on commit, so readers never observe half of a batch.
        tables: Mutex<InMemoryTables>,
    },
}

#[derive(Clone, Default)]
struct InMemoryTables {
    deposit_txs: OrdMap<(DepositIndex, H256), DepositTx>,
    block_heads: OrdMap<H256, BlockHead>,
    explorer_state: OrdMap<String, String>,
}

impl InMemoryTables {
    // Mirrors the `ON CONFLICT` clause in `insert_deposit_txs`.
    fn upsert_deposit_tx(&mut self, deposit_tx: DepositTx) {
        let key = (deposit_tx.index, deposit_tx.block_root);

        match self.deposit_txs.get_mut(&key) {
            Some(existing) => {
                existing.orphaned = deposit_tx.orphaned;
                existing.fork_id = deposit_tx.fork_id;
                existing.valid_signature = deposit_tx.valid_signature;
            }
            None => {
                self.deposit_txs.insert(key, deposit_tx);
            }
        }
    }
}

#[derive(Debug, Error)]
#[error("value {value} does not fit in an SQLite integer")]
struct IntegerOutOfRange {
    value: u64,
}

fn integer(value: u64) -> Result<Value> {
    let integer = i64::try_from(value).map_err(|_| IntegerOutOfRange { value })?;
    Ok(Value::Integer(integer))
}

fn blob(bytes: impl AsRef<[u8]>) -> Value {
    Value::Blob(bytes.as_ref().to_vec())
}

fn insert_deposit_txs(transaction: &Transaction, deposit_txs: &[DepositTx]) -> Result<()> {
    let placeholders = format!("({})", ["?"; DEPOSIT_TX_COLUMN_COUNT].join(", "));
    let rows = core::iter::repeat_n(placeholders, deposit_txs.len()).join(", ");

    let mut values = Vec::with_capacity(deposit_txs.len() * DEPOSIT_TX_COLUMN_COUNT);

    for deposit_tx in deposit_txs {
        values.extend([
            integer(deposit_tx.index)?,
            integer(deposit_tx.block_number)?,
            integer(deposit_tx.block_time)?,
            blob(deposit_tx.block_root),
            blob(deposit_tx.public_key),
            blob(deposit_tx.withdrawal_credentials),
            integer(deposit_tx.amount)?,
            blob(deposit_tx.signature),
            Value::Integer(deposit_tx.valid_signature.into()),
            Value::Integer(deposit_tx.orphaned.into()),
            deposit_tx
                .fork_id
                .map(|fork_id| integer(fork_id.get()))
                .transpose()?
                .unwrap_or(Value::Null),
            blob(deposit_tx.tx_hash),
            blob(deposit_tx.tx_sender),
            deposit_tx.tx_target.map(blob).unwrap_or(Value::Null),
        ]);
    }

    transaction.execute(
        &format!(
            "INSERT INTO deposit_txs ({DEPOSIT_TX_COLUMNS}) VALUES {rows}
            ON CONFLICT (deposit_index, block_root) DO UPDATE SET
                orphaned = excluded.orphaned,
                fork_id = excluded.fork_id,
                valid_signature = excluded.valid_signature",
        ),
        params_from_iter(values),
    )?;

    Ok(())
}

fn read_deposit_tx(row: &Row) -> rusqlite::Result<DepositTx> {
    Ok(DepositTx {
        index: row.get(0)?,
        block_number: row.get(1)?,
        block_time: row.get(2)?,
        block_root: H256(row.get(3)?),
        public_key: PublicKeyBytes(row.get(4)?),
        withdrawal_credentials: H256(row.get(5)?),
        amount: row.get(6)?,
        signature: SignatureBytes(row.get(7)?),
        valid_signature: row.get(8)?,
        orphaned: row.get(9)?,
        fork_id: row.get::<_, Option<u64>>(10)?.map(ForkKey::new),
        tx_hash: H256(row.get(11)?),
        tx_sender: H160(row.get(12)?),
        tx_target: row.get::<_, Option<[u8; 20]>>(13)?.map(H160),
    })
}
