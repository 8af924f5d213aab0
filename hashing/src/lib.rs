//! SHA-256 helpers for the small hash tree roots computed by the explorer.
//!
//! Every container hashed here has at most 8 fields, so the helpers work on fixed-size inputs and
//! call `sha2::compress256` directly with precomputed padding.

use ethereum_types::H256;
use generic_array::GenericArray;
use hex_literal::hex;
use sha2::{
    digest::{core_api::BlockSizeUser, generic_array::typenum::Unsigned as _},
    Sha256,
};

/// Roots of empty subtrees of depth 0 to 3.
#[rustfmt::skip]
pub const ZERO_HASHES: [H256; 4] = [
    H256(hex!("0000000000000000000000000000000000000000000000000000000000000000")),
    H256(hex!("f5a5fd42d16a20302798ef6ed309979b43003d2320d9f0e8ea9831a92759fb4b")),
    H256(hex!("db56114e00fdd4c1f85c892bf35ac9a89289aaecb1ebd0a96cde606a748b5d71")),
    H256(hex!("c78009fdf07fc56a11f122370658a353aaa542ed63e44c4bc15ff4cd105ab33c")),
];

// This one has nothing but padding.
#[rustfmt::skip]
const PADDING_BLOCK_FOR_512_BITS: Sha256Block = hex!("
    80000000 00000000 00000000 00000000
    00000000 00000000 00000000 00000000
    00000000 00000000 00000000 00000000
    00000000 00000000 00000000 00000200
");

type Sha256BlockSize = <Sha256 as BlockSizeUser>::BlockSize;
type Sha256Block = [u8; Sha256BlockSize::USIZE];

struct Sha256State([u32; 8]);

impl Default for Sha256State {
    #[rustfmt::skip]
    fn default() -> Self {
        Self([
            0x6a09_e667, 0xbb67_ae85, 0x3c6e_f372, 0xa54f_f53a,
            0x510e_527f, 0x9b05_688c, 0x1f83_d9ab, 0x5be0_cd19,
        ])
    }
}

impl Sha256State {
    fn compress(mut self, blocks: &[GenericArray<u8, Sha256BlockSize>]) -> Self {
        sha2::compress256(&mut self.0, blocks);
        self
    }

    fn output(self) -> H256 {
        let mut output = H256::default();

        for (o, s) in output.as_bytes_mut().chunks_exact_mut(4).zip(self.0) {
            o.copy_from_slice(&s.to_be_bytes());
        }

        output
    }
}

#[inline]
#[must_use]
pub fn hash_256_256(left: H256, right: H256) -> H256 {
    let mut block = GenericArray::default();
    block[..32].copy_from_slice(left.as_bytes());
    block[32..].copy_from_slice(right.as_bytes());

    let padding_block = *GenericArray::from_slice(&PADDING_BLOCK_FOR_512_BITS);

    Sha256State::default()
        .compress(&[block, padding_block])
        .output()
}

/// Packs a little-endian integer into the first bytes of a chunk.
#[inline]
#[must_use]
pub fn chunk_from_u64(value: u64) -> H256 {
    let mut chunk = H256::zero();
    chunk[..size_of::<u64>()].copy_from_slice(&value.to_le_bytes());
    chunk
}

/// Packs up to 32 bytes into a chunk, padding the rest with zeros.
#[must_use]
pub fn chunk_from_bytes(bytes: &[u8]) -> H256 {
    assert!(bytes.len() <= H256::len_bytes());

    let mut chunk = H256::zero();
    chunk[..bytes.len()].copy_from_slice(bytes);
    chunk
}

/// Merkleizes up to 8 chunks, padding the tree with zero hashes.
#[must_use]
pub fn merkleize_chunks(chunks: &[H256]) -> H256 {
    assert!(chunks.len() <= 1 << (ZERO_HASHES.len() - 1));

    let mut layer = chunks.to_vec();
    let mut depth = 0;

    while layer.len() > 1 {
        if layer.len() % 2 == 1 {
            layer.push(ZERO_HASHES[depth]);
        }

        layer = layer
            .chunks_exact(2)
            .map(|pair| hash_256_256(pair[0], pair[1]))
            .collect();

        depth += 1;
    }

    layer.first().copied().unwrap_or(ZERO_HASHES[0])
}
