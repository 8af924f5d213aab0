//! Read access to chain parameters and the latest checkpoints.
//!
//! The explorer keeps track of the chain through a beacon node. Components that only need the
//! checkpoints and slot arithmetic depend on [`ChainState`] rather than on the whole indexer.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::{
    config::Config,
    consts::GENESIS_SLOT,
    containers::Checkpoint,
    primitives::{Epoch, Slot, UnixSeconds},
};

pub trait ChainState: Send + Sync {
    fn config(&self) -> &Config;

    fn genesis_time(&self) -> UnixSeconds;

    fn justified_checkpoint(&self) -> Checkpoint;

    fn finalized_checkpoint(&self) -> Checkpoint;

    fn epoch_of_slot(&self, slot: Slot) -> Epoch {
        slot / self.config().slots_per_epoch()
    }

    fn start_slot_of_epoch(&self, epoch: Epoch) -> Slot {
        epoch.saturating_mul(self.config().slots_per_epoch())
    }

    fn slot_to_time(&self, slot: Slot) -> UnixSeconds {
        let slots_since_genesis = slot.saturating_sub(GENESIS_SLOT);

        slots_since_genesis
            .saturating_mul(self.config().seconds_per_slot.get())
            .saturating_add(self.genesis_time())
    }

    fn epoch_to_time(&self, epoch: Epoch) -> UnixSeconds {
        self.slot_to_time(self.start_slot_of_epoch(epoch))
    }
}

#[derive(Clone, Copy, Default)]
struct Checkpoints {
    justified: Checkpoint,
    finalized: Checkpoint,
}

/// [`ChainState`] with checkpoints updated by whoever follows the beacon node.
pub struct StaticChainState {
    config: Arc<Config>,
    genesis_time: UnixSeconds,
    checkpoints: RwLock<Checkpoints>,
}

impl StaticChainState {
    #[must_use]
    pub fn new(config: Arc<Config>, genesis_time: UnixSeconds) -> Self {
        Self {
            config,
            genesis_time,
            checkpoints: RwLock::default(),
        }
    }

    pub fn update_checkpoints(&self, justified: Checkpoint, finalized: Checkpoint) {
        *self.checkpoints.write() = Checkpoints {
            justified,
            finalized,
        };
    }
}

impl ChainState for StaticChainState {
    fn config(&self) -> &Config {
        &self.config
    }

    fn genesis_time(&self) -> UnixSeconds {
        self.genesis_time
    }

    fn justified_checkpoint(&self) -> Checkpoint {
        self.checkpoints.read().justified
    }

    fn finalized_checkpoint(&self) -> Checkpoint {
        self.checkpoints.read().finalized
    }
}
