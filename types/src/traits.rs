use crate::primitives::H256;

pub trait SszHash {
    fn hash_tree_root(&self) -> H256;
}
