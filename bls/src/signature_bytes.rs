use derive_more::AsRef;
use fixed_hash::construct_fixed_hash;
use impl_serde::impl_fixed_hash_serde;

use crate::{consts::COMPRESSED_SIGNATURE_SIZE, signature::Signature};

construct_fixed_hash! {
    #[derive(AsRef)]
    pub struct SignatureBytes(COMPRESSED_SIGNATURE_SIZE);
}

impl_fixed_hash_serde!(SignatureBytes, COMPRESSED_SIGNATURE_SIZE);

impl From<Signature> for SignatureBytes {
    #[inline]
    fn from(signature: Signature) -> Self {
        Self(signature.as_raw().compress())
    }
}
