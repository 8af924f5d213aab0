use core::time::Duration;
use std::{collections::HashMap, sync::Arc};

use anyhow::Result;
use async_trait::async_trait;
use database::PersistenceGateway;
use itertools::Itertools as _;
use parking_lot::RwLock;
use tracing::{debug, warn};
use types::{
    chain_state::ChainState,
    containers::SignedBeaconBlockHeader,
    nonstandard::ForkKey,
    primitives::{Epoch, ExecutionBlockHash, ExecutionBlockNumber, Slot, H256},
};

use crate::block::Block;

const HEADER_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Beacon node access used to resolve blocks missing from both the cache and the database.
#[async_trait]
pub trait HeaderSource: Send + Sync {
    async fn header_by_root(&self, root: H256) -> Result<Option<SignedBeaconBlockHeader>>;
}

#[derive(Clone, Copy, Debug)]
pub struct BlockCacheConfig {
    /// Number of slots below the highest cached slot that blocks are kept in memory for.
    pub window_slots: u64,
}

impl Default for BlockCacheConfig {
    fn default() -> Self {
        Self {
            // 4 epochs on mainnet.
            window_slots: 128,
        }
    }
}

#[derive(Default)]
struct BlockMaps {
    highest_slot: Option<Slot>,
    lowest_slot: Option<Slot>,
    slot_map: HashMap<Slot, Vec<Arc<Block>>>,
    root_map: HashMap<H256, Arc<Block>>,
}

impl BlockMaps {
    fn blocks(&self) -> impl Iterator<Item = &Arc<Block>> {
        self.root_map.values()
    }
}

/// In-memory graph of recent beacon blocks across all known forks.
///
/// Every block reachable through `slot_map` is reachable through `root_map` and vice versa.
/// All maps are guarded by a single lock so that readers never see them disagree.
pub struct BlockCache {
    config: BlockCacheConfig,
    chain_state: Arc<dyn ChainState>,
    database: Arc<dyn PersistenceGateway>,
    maps: RwLock<BlockMaps>,
}

impl BlockCache {
    #[must_use]
    pub fn new(
        config: BlockCacheConfig,
        chain_state: Arc<dyn ChainState>,
        database: Arc<dyn PersistenceGateway>,
    ) -> Self {
        Self {
            config,
            chain_state,
            database,
            maps: RwLock::default(),
        }
    }

    /// Returns the block with `root`, creating it if it is not cached.
    /// The second element is `true` if the block was created by this call.
    pub fn create_or_get_block(&self, root: H256, slot: Slot) -> (Arc<Block>, bool) {
        let mut maps = self.maps.write();

        if let Some(block) = maps.root_map.get(&root) {
            if block.slot() != slot {
                warn!(
                    "block {root:?} requested at slot {slot} is cached at slot {}",
                    block.slot(),
                );
            }

            return (Arc::clone(block), false);
        }

        let window_floor = maps
            .highest_slot
            .map_or(0, |highest| highest.saturating_sub(self.config.window_slots));

        if slot < window_floor {
            debug!("caching block {root:?} at slot {slot} below window floor {window_floor}");
        }

        let block = Arc::new(Block::new(root, slot));

        maps.root_map.insert(root, Arc::clone(&block));
        maps.slot_map.entry(slot).or_default().push(Arc::clone(&block));

        maps.highest_slot = Some(maps.highest_slot.map_or(slot, |highest| highest.max(slot)));
        maps.lowest_slot = Some(maps.lowest_slot.map_or(slot, |lowest| lowest.min(slot)));

        (block, true)
    }

    #[must_use]
    pub fn block_by_root(&self, root: H256) -> Option<Arc<Block>> {
        self.maps.read().root_map.get(&root).cloned()
    }

    #[must_use]
    pub fn blocks_by_slot(&self, slot: Slot) -> Vec<Arc<Block>> {
        self.maps
            .read()
            .slot_map
            .get(&slot)
            .cloned()
            .unwrap_or_default()
    }

    /// Children of `parent_root` ordered by slot.
    #[must_use]
    pub fn blocks_by_parent_root(&self, parent_root: H256) -> Vec<Arc<Block>> {
        let maps = self.maps.read();

        // Children are always at higher slots than their parent.
        let parent_slot = maps.root_map.get(&parent_root).map(|parent| parent.slot());

        maps.slot_map
            .iter()
            .filter(|(slot, _)| parent_slot.is_none_or(|parent_slot| **slot > parent_slot))
            .flat_map(|(_, blocks)| blocks)
            .filter(|block| block.parent_root() == Some(parent_root))
            .sorted_by_key(|block| block.slot())
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn block_by_state_root(&self, state_root: H256) -> Option<Arc<Block>> {
        self.maps
            .read()
            .blocks()
            .find(|block| block.state_root() == Some(state_root))
            .cloned()
    }

    /// Blocks whose execution payload has `block_hash`, ordered by root.
    ///
    /// More than one block can match if the same payload was proposed in competing beacon blocks.
    #[must_use]
    pub fn blocks_by_execution_block_hash(&self, block_hash: ExecutionBlockHash) -> Vec<Arc<Block>> {
        self.maps
            .read()
            .blocks()
            .filter(|block| block.execution_block_hash() == Some(block_hash))
            .sorted_by_key(|block| block.root())
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn blocks_by_execution_block_number(
        &self,
        block_number: ExecutionBlockNumber,
    ) -> Vec<Arc<Block>> {
        self.maps
            .read()
            .blocks()
            .filter(|block| block.execution_block_number() == Some(block_number))
            .sorted_by_key(|block| (block.slot(), block.root()))
            .cloned()
            .collect()
    }

    /// Blocks below `min_slot` that still hold a body in memory.
    #[must_use]
    pub fn pruning_blocks(&self, min_slot: Slot) -> Vec<Arc<Block>> {
        self.maps
            .read()
            .slot_map
            .iter()
            .filter(|(slot, _)| **slot < min_slot)
            .flat_map(|(_, blocks)| blocks)
            .filter(|block| block.body_field().is_loaded())
            .sorted_by_key(|block| block.slot())
            .cloned()
            .collect()
    }

    /// Blocks that have fallen below [`Self::window_floor`] and still hold a body.
    ///
    /// Callers remove them with [`Self::remove_block`] once their canonical status is persisted.
    #[must_use]
    pub fn prunable_blocks(&self) -> Vec<Arc<Block>> {
        self.pruning_blocks(self.window_floor())
    }

    #[must_use]
    pub fn fork_blocks(&self, fork_id: ForkKey) -> Vec<Arc<Block>> {
        self.maps
            .read()
            .blocks()
            .filter(|block| block.fork_id() == fork_id)
            .sorted_by_key(|block| block.slot())
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn epoch_blocks(&self, epoch: Epoch) -> Vec<Arc<Block>> {
        let start_slot = self.chain_state.start_slot_of_epoch(epoch);
        let end_slot = self.chain_state.start_slot_of_epoch(epoch.saturating_add(1));
        let maps = self.maps.read();

        (start_slot..end_slot)
            .filter_map(|slot| maps.slot_map.get(&slot))
            .flatten()
            .cloned()
            .collect()
    }

    /// Newest blocks first, optionally restricted to a single fork. A `limit` of 0 means no limit.
    ///
    /// Blocks that have neither a body nor a database record are skipped.
    #[must_use]
    pub fn latest_blocks(&self, limit: usize, fork_id: Option<ForkKey>) -> Vec<Arc<Block>> {
        let maps = self.maps.read();

        let blocks = maps
            .slot_map
            .iter()
            .sorted_by_key(|(slot, _)| core::cmp::Reverse(**slot))
            .flat_map(|(_, blocks)| blocks)
            .filter(|block| block.body_field().is_loaded() || block.is_in_db())
            .filter(|block| fork_id.is_none_or(|fork_id| block.fork_id() == fork_id))
            .cloned();

        if limit == 0 {
            blocks.collect()
        } else {
            blocks.take(limit).collect()
        }
    }

    pub fn remove_block(&self, block: &Block) {
        let mut maps = self.maps.write();

        maps.root_map.remove(&block.root());

        if let Some(slot_blocks) = maps.slot_map.get_mut(&block.slot()) {
            slot_blocks.retain(|slot_block| slot_block.root() != block.root());

            if slot_blocks.is_empty() {
                maps.slot_map.remove(&block.slot());
            }
        }
    }

    #[must_use]
    pub fn is_canonical_block(&self, block_root: H256, head_root: H256) -> bool {
        self.canonical_distance(block_root, head_root, 0).0
    }

    /// Returns whether `block_root` is an ancestor of (or equal to) `head_root`
    /// and how many parent links separate them.
    ///
    /// The walk stops after `max_distance` links unless `max_distance` is 0.
    /// Walks that leave the cache end with `(false, 0)`.
    #[must_use]
    pub fn canonical_distance(
        &self,
        block_root: H256,
        head_root: H256,
        max_distance: u64,
    ) -> (bool, u64) {
        let maps = self.maps.read();

        let Some(block) = maps.root_map.get(&block_root) else {
            return (false, 0);
        };

        let Some(mut current) = maps.root_map.get(&head_root) else {
            return (false, 0);
        };

        if head_root == block_root {
            return (true, 0);
        }

        let mut distance = 0;

        loop {
            if current.slot() < block.slot() {
                return (false, 0);
            }

            let Some(parent_root) = current.parent_root() else {
                return (false, 0);
            };

            distance += 1;

            if max_distance > 0 && distance > max_distance {
                return (false, 0);
            }

            if parent_root == block_root {
                return (true, distance);
            }

            match maps.root_map.get(&parent_root) {
                Some(parent) if parent.slot() < current.slot() => current = parent,
                _ => return (false, 0),
            }
        }
    }

    /// Returns the last block of an earlier epoch that `block` descends from,
    /// or the genesis block if the walk reaches slot 0.
    ///
    /// Ancestors are looked up in the cache, then in the database, then with at most one request
    /// to `client`. The result is memoized on `block`.
    pub async fn dependent_block(
        &self,
        block: &Arc<Block>,
        client: Option<&dyn HeaderSource>,
    ) -> Option<Arc<Block>> {
        if let Some(dependent_root) = block.dependent_root() {
            return self.resolve_block(dependent_root, client).await;
        }

        if block.slot() == 0 {
            return Some(Arc::clone(block));
        }

        let block_epoch = self.chain_state.epoch_of_slot(block.slot());
        let mut client = client;
        let mut parent_root = block.parent_root();

        while let Some(root) = parent_root {
            let parent = match self.cached_or_stored_block(root) {
                Some(parent) => parent,
                // Only one header is requested. The first missing ancestor is most likely the
                // last block of the previous epoch.
                None => match client.take() {
                    Some(client) => fetch_detached_block(client, root).await?,
                    None => return None,
                },
            };

            if self.chain_state.epoch_of_slot(parent.slot()) < block_epoch || parent.slot() == 0 {
                block.set_dependent_root(parent.root());
                return Some(parent);
            }

            parent_root = parent.parent_root();
        }

        None
    }

    /// The slot below which blocks fall out of the sliding window.
    #[must_use]
    pub fn window_floor(&self) -> Slot {
        self.maps
            .read()
            .highest_slot
            .map_or(0, |highest| highest.saturating_sub(self.config.window_slots))
    }

    #[must_use]
    pub fn highest_slot(&self) -> Option<Slot> {
        self.maps.read().highest_slot
    }

    #[must_use]
    pub fn lowest_slot(&self) -> Option<Slot> {
        self.maps.read().lowest_slot
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.maps.read().root_map.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.maps.read().root_map.is_empty()
    }

    async fn resolve_block(
        &self,
        root: H256,
        client: Option<&dyn HeaderSource>,
    ) -> Option<Arc<Block>> {
        if let Some(block) = self.cached_or_stored_block(root) {
            return Some(block);
        }

        fetch_detached_block(client?, root).await
    }

    fn cached_or_stored_block(&self, root: H256) -> Option<Arc<Block>> {
        if let Some(block) = self.block_by_root(root) {
            return Some(block);
        }

        match self.database.block_head_by_root(root) {
            Ok(head) => head.map(Block::from_finalized_head).map(Arc::new),
            Err(error) => {
                warn!("failed to load block head {root:?} from database: {error:?}");
                None
            }
        }
    }
}

// The returned block is not inserted into the cache.
async fn fetch_detached_block(client: &dyn HeaderSource, root: H256) -> Option<Arc<Block>> {
    let header = match tokio::time::timeout(HEADER_REQUEST_TIMEOUT, client.header_by_root(root)).await
    {
        Ok(Ok(header)) => header?,
        Ok(Err(error)) => {
            debug!("failed to load block header {root:?}: {error:?}");
            return None;
        }
        Err(_) => {
            debug!("timed out loading block header {root:?}");
            return None;
        }
    };

    let block = Block::new(root, header.message.slot);
    block.set_parent_root(header.message.parent_root);

    Some(Arc::new(block))
}
