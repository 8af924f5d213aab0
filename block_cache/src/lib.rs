pub use crate::{
    block::{Block, LazyField},
    block_cache::{BlockCache, BlockCacheConfig, HeaderSource},
};

mod block;
mod block_cache;
