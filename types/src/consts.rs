use hex_literal::hex;

use crate::primitives::{DomainType, Epoch, Slot, H32};

pub const DOMAIN_DEPOSIT: DomainType = H32(hex!("03000000"));
pub const GENESIS_EPOCH: Epoch = 0;
pub const GENESIS_SLOT: Slot = 0;
