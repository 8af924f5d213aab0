use core::num::NonZeroU64;
use std::borrow::Cow;

use hex_literal::hex;
use nonzero_ext::nonzero;
use serde::{Deserialize, Serialize};

use crate::primitives::{ExecutionAddress, Version, H160, H32};

/// Chain configuration used by the explorer.
///
/// Keys follow [configurations in `consensus-specs`](https://github.com/ethereum/consensus-specs/tree/dev/configs).
/// `SLOTS_PER_EPOCH` is a preset value in `consensus-specs` but is kept here because the explorer
/// does not need anything else from presets.
#[expect(
    clippy::unsafe_derive_deserialize,
    reason = "A false positive triggered by `nonzero!`. \
              `Config` has no invariants. It is intended to be deserialized from user input."
)]
#[expect(
    clippy::struct_field_names,
    reason = "config_name starts with the same name as the struct"
)]
#[derive(Clone, PartialEq, Eq, Debug, Deserialize, Serialize)]
#[serde(default, rename_all = "SCREAMING_SNAKE_CASE")]
pub struct Config {
    pub config_name: Cow<'static, str>,
    pub genesis_fork_version: Version,
    pub seconds_per_slot: NonZeroU64,
    pub slots_per_epoch: NonZeroU64,
    pub deposit_contract_address: ExecutionAddress,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            // Use `default` as the default `config_name` and override it in `Config::mainnet`.
            config_name: Cow::Borrowed("default"),
            genesis_fork_version: H32(hex!("00000000")),
            seconds_per_slot: nonzero!(12_u64),
            slots_per_epoch: nonzero!(32_u64),
            deposit_contract_address: ExecutionAddress::zero(),
        }
    }
}

impl Config {
    #[must_use]
    pub fn mainnet() -> Self {
        Self {
            config_name: Cow::Borrowed("mainnet"),
            deposit_contract_address: H160(hex!("00000000219ab540356cBB839Cbe05303d7705Fa")),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn minimal() -> Self {
        Self {
            config_name: Cow::Borrowed("minimal"),
            genesis_fork_version: H32(hex!("00000001")),
            seconds_per_slot: nonzero!(6_u64),
            slots_per_epoch: nonzero!(8_u64),
            deposit_contract_address: H160(hex!("1234567890123456789012345678901234567890")),
        }
    }

    #[must_use]
    pub fn slots_per_epoch(&self) -> u64 {
        self.slots_per_epoch.get()
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;

    use super::*;

    #[test]
    fn config_deserializes_from_partial_yaml() -> Result<()> {
        let yaml = "
            CONFIG_NAME: holesky
            GENESIS_FORK_VERSION: '0x01017000'
            DEPOSIT_CONTRACT_ADDRESS: '0x4242424242424242424242424242424242424242'
        ";

        let config = serde_yaml::from_str::<Config>(yaml)?;

        assert_eq!(config.config_name, "holesky");
        assert_eq!(config.genesis_fork_version, H32(hex!("01017000")));
        assert_eq!(config.deposit_contract_address, H160::repeat_byte(0x42));
        assert_eq!(config.seconds_per_slot, Config::default().seconds_per_slot);
        assert_eq!(config.slots_per_epoch(), 32);

        Ok(())
    }

    #[test]
    fn mainnet_config_has_deposit_contract() {
        assert!(!Config::mainnet().deposit_contract_address.is_zero());
        assert_eq!(Config::mainnet().genesis_fork_version, H32::zero());
    }
}
