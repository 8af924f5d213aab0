use derive_more::AsRef;
use fixed_hash::construct_fixed_hash;
use impl_serde::impl_fixed_hash_serde;

use crate::{consts::COMPRESSED_PUBLIC_KEY_SIZE, public_key::PublicKey};

construct_fixed_hash! {
    #[derive(AsRef)]
    pub struct PublicKeyBytes(COMPRESSED_PUBLIC_KEY_SIZE);
}

impl_fixed_hash_serde!(PublicKeyBytes, COMPRESSED_PUBLIC_KEY_SIZE);

impl From<PublicKey> for PublicKeyBytes {
    #[inline]
    fn from(public_key: PublicKey) -> Self {
        Self(public_key.as_raw().compress())
    }
}
