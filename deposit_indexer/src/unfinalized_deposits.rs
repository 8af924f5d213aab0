use std::collections::{HashMap, HashSet};

use types::primitives::{DepositIndex, ExecutionBlockHash};

/// Deposits already persisted by the recent pass, keyed by index and execution block hash.
///
/// Kept in memory only. After a restart the recent pass writes the same rows again,
/// which the database turns into updates.
#[derive(Default, Debug)]
pub struct UnfinalizedDeposits {
    deposits: HashMap<DepositIndex, HashSet<ExecutionBlockHash>>,
}

impl UnfinalizedDeposits {
    #[must_use]
    pub fn contains(&self, index: DepositIndex, block_hash: ExecutionBlockHash) -> bool {
        self.deposits
            .get(&index)
            .is_some_and(|block_hashes| block_hashes.contains(&block_hash))
    }

    #[must_use]
    pub fn contains_index(&self, index: DepositIndex) -> bool {
        self.deposits.contains_key(&index)
    }

    /// Returns `false` if the pair was already present.
    pub fn insert(&mut self, index: DepositIndex, block_hash: ExecutionBlockHash) -> bool {
        self.deposits.entry(index).or_default().insert(block_hash)
    }

    /// Forgets every observation of `index`. Called once the deposit is finalized.
    pub fn remove_index(&mut self, index: DepositIndex) {
        self.deposits.remove(&index);
    }

    /// Number of distinct deposit indices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.deposits.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.deposits.is_empty()
    }
}
