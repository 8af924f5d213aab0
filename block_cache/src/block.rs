use core::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use types::{
    containers::SignedBeaconBlockHeader,
    nonstandard::{BlockBody, BlockHead, BlockIndex, ForkKey},
    primitives::{ExecutionBlockHash, ExecutionBlockNumber, Slot, H256},
};

enum LoadState<T> {
    Absent,
    Loading,
    Loaded(Arc<T>),
}

/// A value that is loaded from the network or the database some time after the block is created.
///
/// At most one loader wins [`LazyField::begin_load`] until the value is set or the load aborted.
pub struct LazyField<T> {
    state: RwLock<LoadState<T>>,
}

impl<T> Default for LazyField<T> {
    fn default() -> Self {
        Self {
            state: RwLock::new(LoadState::Absent),
        }
    }
}

impl<T> LazyField<T> {
    #[must_use]
    pub fn get(&self) -> Option<Arc<T>> {
        match &*self.state.read() {
            LoadState::Loaded(value) => Some(Arc::clone(value)),
            LoadState::Absent | LoadState::Loading => None,
        }
    }

    #[must_use]
    pub fn is_loaded(&self) -> bool {
        matches!(*self.state.read(), LoadState::Loaded(_))
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        matches!(*self.state.read(), LoadState::Loading)
    }

    /// Returns `true` if the caller is now responsible for loading the value.
    #[must_use]
    pub fn begin_load(&self) -> bool {
        let mut state = self.state.write();

        if matches!(*state, LoadState::Absent) {
            *state = LoadState::Loading;
            return true;
        }

        false
    }

    pub fn set(&self, value: Arc<T>) {
        *self.state.write() = LoadState::Loaded(value);
    }

    pub fn abort_load(&self) {
        let mut state = self.state.write();

        if matches!(*state, LoadState::Loading) {
            *state = LoadState::Absent;
        }
    }

    /// Drops a loaded value to free memory. It can be loaded again later.
    pub fn unload(&self) -> Option<Arc<T>> {
        let mut state = self.state.write();

        match core::mem::replace(&mut *state, LoadState::Absent) {
            LoadState::Loaded(value) => Some(value),
            LoadState::Loading => {
                *state = LoadState::Loading;
                None
            }
            LoadState::Absent => None,
        }
    }
}

/// A beacon block known to the explorer.
///
/// Only `root` and `slot` are known when a block is first seen.
/// Everything else is filled in as the header and body arrive.
pub struct Block {
    root: H256,
    slot: Slot,
    header: LazyField<SignedBeaconBlockHeader>,
    body: LazyField<BlockBody>,
    parent_root: OnceCell<H256>,
    dependent_root: OnceCell<H256>,
    block_index: OnceCell<BlockIndex>,
    fork_id: AtomicU64,
    in_finalized_db: AtomicBool,
    in_unfinalized_db: AtomicBool,
}

impl Block {
    #[must_use]
    pub fn new(root: H256, slot: Slot) -> Self {
        Self {
            root,
            slot,
            header: LazyField::default(),
            body: LazyField::default(),
            parent_root: OnceCell::new(),
            dependent_root: OnceCell::new(),
            block_index: OnceCell::new(),
            fork_id: AtomicU64::default(),
            in_finalized_db: AtomicBool::default(),
            in_unfinalized_db: AtomicBool::default(),
        }
    }

    /// Builds a block that lives outside the cache from a finalized database record.
    #[must_use]
    pub fn from_finalized_head(head: BlockHead) -> Self {
        let block = Self::new(head.root, head.slot);
        block.set_parent_root(head.parent_root);
        block.set_fork_id(head.fork_id);
        block.set_in_finalized_db(true);
        block
    }

    #[must_use]
    pub const fn root(&self) -> H256 {
        self.root
    }

    #[must_use]
    pub const fn slot(&self) -> Slot {
        self.slot
    }

    #[must_use]
    pub fn header(&self) -> Option<Arc<SignedBeaconBlockHeader>> {
        self.header.get()
    }

    #[must_use]
    pub const fn header_field(&self) -> &LazyField<SignedBeaconBlockHeader> {
        &self.header
    }

    pub fn set_header(&self, header: SignedBeaconBlockHeader) {
        self.set_parent_root(header.message.parent_root);
        self.header.set(Arc::new(header));
    }

    #[must_use]
    pub fn body(&self) -> Option<Arc<BlockBody>> {
        self.body.get()
    }

    #[must_use]
    pub const fn body_field(&self) -> &LazyField<BlockBody> {
        &self.body
    }

    pub fn set_body(&self, body: BlockBody) {
        if let Some(block_index) = body.block_index() {
            self.set_block_index(block_index);
        }

        self.body.set(Arc::new(body));
    }

    #[must_use]
    pub fn state_root(&self) -> Option<H256> {
        self.header().map(|header| header.message.state_root)
    }

    #[must_use]
    pub fn parent_root(&self) -> Option<H256> {
        self.parent_root.get().copied()
    }

    /// Has no effect if the parent root is already known. A block's parent never changes.
    pub fn set_parent_root(&self, parent_root: H256) {
        self.parent_root.get_or_init(|| parent_root);
    }

    #[must_use]
    pub fn dependent_root(&self) -> Option<H256> {
        self.dependent_root.get().copied()
    }

    pub(crate) fn set_dependent_root(&self, dependent_root: H256) {
        self.dependent_root.get_or_init(|| dependent_root);
    }

    /// Execution payload coordinates, taken from the cached index or the loaded body.
    #[must_use]
    pub fn block_index(&self) -> Option<BlockIndex> {
        if let Some(block_index) = self.block_index.get() {
            return Some(*block_index);
        }

        let block_index = self.body()?.block_index()?;
        Some(*self.block_index.get_or_init(|| block_index))
    }

    /// Used when the index comes from storage and the body is not loaded.
    pub fn set_block_index(&self, block_index: BlockIndex) {
        self.block_index.get_or_init(|| block_index);
    }

    #[must_use]
    pub fn execution_block_hash(&self) -> Option<ExecutionBlockHash> {
        self.block_index()
            .map(|block_index| block_index.execution_hash)
    }

    #[must_use]
    pub fn execution_block_number(&self) -> Option<ExecutionBlockNumber> {
        self.block_index()
            .map(|block_index| block_index.execution_number)
    }

    #[must_use]
    pub fn fork_id(&self) -> ForkKey {
        ForkKey::new(self.fork_id.load(Ordering::Acquire))
    }

    pub fn set_fork_id(&self, fork_id: ForkKey) {
        self.fork_id.store(fork_id.get(), Ordering::Release);
    }

    #[must_use]
    pub fn is_in_finalized_db(&self) -> bool {
        self.in_finalized_db.load(Ordering::Acquire)
    }

    pub fn set_in_finalized_db(&self, value: bool) {
        self.in_finalized_db.store(value, Ordering::Release);
    }

    #[must_use]
    pub fn is_in_unfinalized_db(&self) -> bool {
        self.in_unfinalized_db.load(Ordering::Acquire)
    }

    pub fn set_in_unfinalized_db(&self, value: bool) {
        self.in_unfinalized_db.store(value, Ordering::Release);
    }

    pub(crate) fn is_in_db(&self) -> bool {
        self.is_in_finalized_db() || self.is_in_unfinalized_db()
    }
}
