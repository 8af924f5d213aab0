// This is how `DepositEvent` logs are laid out (each line is an EVM word in hexadecimal):
// ```text
// 00000000000000000000000000000000000000000000000000000000000000a0 pubkey                 offset
// 0000000000000000000000000000000000000000000000000000000000000100 withdrawal_credentials offset
// 0000000000000000000000000000000000000000000000000000000000000140 amount                 offset
// 0000000000000000000000000000000000000000000000000000000000000180 signature              offset
// 0000000000000000000000000000000000000000000000000000000000000200 index                  offset
// 0000000000000000000000000000000000000000000000000000000000000030 pubkey                 length
// ................................................................ pubkey
// ................................00000000000000000000000000000000 pubkey
// 0000000000000000000000000000000000000000000000000000000000000020 withdrawal_credentials length
// ................................................................ withdrawal_credentials
// 0000000000000000000000000000000000000000000000000000000000000008 amount                 length
// ................000000000000000000000000000000000000000000000000 amount
// 0000000000000000000000000000000000000000000000000000000000000060 signature              length
// ................................................................ signature
// ................................................................ signature
// ................................................................ signature
// 0000000000000000000000000000000000000000000000000000000000000008 index                  length
// ................000000000000000000000000000000000000000000000000 index
// ```
//
// The deposit contract encodes all values as dynamic arrays (`bytes`) even though they are fixed
// in size. `amount` and `index` are little-endian integers inside those arrays.
//
// See:
// - <https://github.com/ethereum/consensus-specs/blob/fab27d17f0dd289a6abbb99acae39387ac2320cf/solidity_deposit_contract/deposit_contract.sol>
// - <https://docs.soliditylang.org/en/v0.8.2/abi-spec.html>

use core::ops::Range;

use anyhow::{ensure, Error as AnyhowError};
use bls::{PublicKeyBytes, SignatureBytes};
use hex_literal::hex;
use memoffset::span_of;
use serde::{Deserialize, Serialize};
use static_assertions::assert_eq_size;
use thiserror::Error;
use types::{
    containers::DepositData,
    primitives::{DepositIndex, Gwei, H256},
};
use web3::types::Log;

#[derive(Debug, Error)]
enum Error {
    #[error("log has unexpected topics: {log:?}")]
    UnexpectedTopics { log: Box<Log> },
    #[error("log has been removed: {log:?}")]
    Removed { log: Box<Log> },
    #[error("log data has the wrong length: {log:?}")]
    WrongLength { log: Box<Log> },
}

type EvmWord = [u8; 32];

#[repr(C)]
struct RawDepositEvent {
    _pubkey_offset: EvmWord,
    _withdrawal_credentials_offset: EvmWord,
    _amount_offset: EvmWord,
    _signature_offset: EvmWord,
    _index_offset: EvmWord,
    _pubkey_length: EvmWord,
    pubkey: PublicKeyBytes,
    _pubkey_padding: [u8; 16],
    _withdrawal_credentials_length: EvmWord,
    withdrawal_credentials: H256,
    _amount_length: EvmWord,
    amount: Gwei,
    _amount_padding: [u8; 24],
    _signature_length: EvmWord,
    signature: SignatureBytes,
    _index_length: EvmWord,
    index: DepositIndex,
    _index_padding: [u8; 24],
}

assert_eq_size!(RawDepositEvent, [EvmWord; 18]);

#[derive(Clone, Copy, PartialEq, Eq, Default, Debug, Deserialize, Serialize)]
pub struct DepositEvent {
    pub data: DepositData,
    pub index: DepositIndex,
}

impl TryFrom<&Log> for DepositEvent {
    type Error = AnyhowError;

    fn try_from(log: &Log) -> Result<Self, Self::Error> {
        ensure!(
            log.topics == [Self::TOPIC],
            Error::UnexpectedTopics {
                log: Box::new(log.clone()),
            },
        );

        ensure!(
            !log.is_removed(),
            Error::Removed {
                log: Box::new(log.clone()),
            },
        );

        let log_data = log.data.0.as_slice();

        ensure!(
            log_data.len() == Self::LENGTH,
            Error::WrongLength {
                log: Box::new(log.clone()),
            },
        );

        let pubkey = PublicKeyBytes::from_slice(&log_data[span_of!(RawDepositEvent, pubkey)]);

        let withdrawal_credentials =
            H256::from_slice(&log_data[span_of!(RawDepositEvent, withdrawal_credentials)]);

        let amount = Gwei::from_le_bytes(
            log_data[span_of!(RawDepositEvent, amount)]
                .try_into()
                .expect("length is checked above"),
        );

        let signature =
            SignatureBytes::from_slice(&log_data[span_of!(RawDepositEvent, signature)]);

        let index = DepositIndex::from_le_bytes(
            log_data[span_of!(RawDepositEvent, index)]
                .try_into()
                .expect("length is checked above"),
        );

        Ok(Self {
            data: DepositData {
                pubkey,
                withdrawal_credentials,
                amount,
                signature,
            },
            index,
        })
    }
}

impl DepositEvent {
    /// Keccak-256 hash of `DepositEvent(bytes,bytes,bytes,bytes,bytes)`.
    pub const TOPIC: H256 = H256(hex!(
        "649bbc62d0e31342afea4e5cd82d4049e7e1ee912fc0889aa790803be39038c5"
    ));

    pub const LENGTH: usize = size_of::<RawDepositEvent>();

    /// Encodes the event the same way the deposit contract does.
    #[must_use]
    pub fn log_data(&self) -> Vec<u8> {
        let mut log_data = vec![0; Self::LENGTH];

        let headers = [
            (
                span_of!(RawDepositEvent, _pubkey_offset),
                span_of!(RawDepositEvent, _pubkey_length),
                size_of::<PublicKeyBytes>(),
            ),
            (
                span_of!(RawDepositEvent, _withdrawal_credentials_offset),
                span_of!(RawDepositEvent, _withdrawal_credentials_length),
                size_of::<H256>(),
            ),
            (
                span_of!(RawDepositEvent, _amount_offset),
                span_of!(RawDepositEvent, _amount_length),
                size_of::<Gwei>(),
            ),
            (
                span_of!(RawDepositEvent, _signature_offset),
                span_of!(RawDepositEvent, _signature_length),
                size_of::<SignatureBytes>(),
            ),
            (
                span_of!(RawDepositEvent, _index_offset),
                span_of!(RawDepositEvent, _index_length),
                size_of::<DepositIndex>(),
            ),
        ];

        for (offset_range, length_range, length) in headers {
            let offset = length_range.start;
            write_word(&mut log_data, offset_range, offset);
            write_word(&mut log_data, length_range, length);
        }

        log_data[span_of!(RawDepositEvent, pubkey)].copy_from_slice(self.data.pubkey.as_bytes());

        log_data[span_of!(RawDepositEvent, withdrawal_credentials)]
            .copy_from_slice(self.data.withdrawal_credentials.as_bytes());

        log_data[span_of!(RawDepositEvent, amount)]
            .copy_from_slice(&self.data.amount.to_le_bytes());

        log_data[span_of!(RawDepositEvent, signature)]
            .copy_from_slice(self.data.signature.as_bytes());

        log_data[span_of!(RawDepositEvent, index)].copy_from_slice(&self.index.to_le_bytes());

        log_data
    }
}

// ABI words are big-endian.
fn write_word(log_data: &mut [u8], word: Range<usize>, value: usize) {
    let bytes = (value as u64).to_be_bytes();
    log_data[word.end - bytes.len()..word.end].copy_from_slice(&bytes);
}

#[allow(clippy::default_trait_access)]
#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test]
    fn try_from_decodes_default() {
        assert_eq!(
            DepositEvent::try_from(&deposit_event_log(vec![0; DepositEvent::LENGTH]))
                .expect("decoding should succeed"),
            DepositEvent::default(),
        );
    }

    #[test]
    fn try_from_decodes_little_endian_amount_and_index() {
        let deposit_event = DepositEvent {
            data: DepositData {
                pubkey: PublicKeyBytes::repeat_byte(0xaa),
                withdrawal_credentials: H256::repeat_byte(0xbb),
                amount: 32_000_000_000,
                signature: SignatureBytes::repeat_byte(0xcc),
            },
            index: 7,
        };

        let log_data = deposit_event.log_data();

        assert_eq!(&log_data[352..360], &32_000_000_000_u64.to_le_bytes());
        assert_eq!(&log_data[544..552], &7_u64.to_le_bytes());

        assert_eq!(
            DepositEvent::try_from(&deposit_event_log(log_data)).expect("decoding should succeed"),
            deposit_event,
        );
    }

    #[test_case(0, 0xa0; "pubkey offset")]
    #[test_case(1, 0x100; "withdrawal credentials offset")]
    #[test_case(2, 0x140; "amount offset")]
    #[test_case(3, 0x180; "signature offset")]
    #[test_case(4, 0x200; "index offset")]
    #[test_case(5, 0x30; "pubkey length")]
    #[test_case(8, 0x20; "withdrawal credentials length")]
    #[test_case(10, 0x08; "amount length")]
    #[test_case(12, 0x60; "signature length")]
    #[test_case(16, 0x08; "index length")]
    fn log_data_writes_abi_header_word(word_index: usize, expected: u16) {
        let log_data = DepositEvent::default().log_data();

        let mut expected_word = [0; 32];
        expected_word[30..].copy_from_slice(&expected.to_be_bytes());

        assert_eq!(
            &log_data[word_index * 32..(word_index + 1) * 32],
            expected_word.as_slice(),
        );
    }

    #[test_case(
        Log { topics: vec![], ..deposit_event_log(vec![0; DepositEvent::LENGTH]) };
        "log with no topics"
    )]
    #[test_case(
        Log { data: vec![0; DepositEvent::LENGTH - 1].into(), ..deposit_event_log(vec![]) };
        "log with too little data"
    )]
    #[test_case(
        Log { data: vec![0; DepositEvent::LENGTH + 1].into(), ..deposit_event_log(vec![]) };
        "log with too much data"
    )]
    #[test_case(
        Log { removed: Some(true), ..deposit_event_log(vec![0; DepositEvent::LENGTH]) };
        "removed log"
    )]
    fn try_from_fails_on(log: Log) {
        DepositEvent::try_from(&log).expect_err("decoding should fail");
    }

    fn deposit_event_log(log_data: Vec<u8>) -> Log {
        Log {
            topics: vec![DepositEvent::TOPIC],
            data: log_data.into(),
            ..mined_log()
        }
    }

    fn mined_log() -> Log {
        Log {
            block_hash: Some(Default::default()),
            block_number: Some(Default::default()),
            transaction_hash: Some(Default::default()),
            transaction_index: Some(Default::default()),
            log_index: Some(Default::default()),
            transaction_log_index: Some(Default::default()),
            ..default_log()
        }
    }

    // Some of the types in the `web3` crate don't have `Default` implementations even though they
    // could be derived.
    fn default_log() -> Log {
        Log {
            address: Default::default(),
            topics: Default::default(),
            data: Default::default(),
            block_hash: Default::default(),
            block_number: Default::default(),
            transaction_hash: Default::default(),
            transaction_index: Default::default(),
            log_index: Default::default(),
            transaction_log_index: Default::default(),
            log_type: Default::default(),
            removed: Default::default(),
        }
    }
}
