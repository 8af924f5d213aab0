use blst::{min_pk::Signature as RawSignature, BLST_ERROR};
use derive_more::From;

use crate::{
    consts::DOMAIN_SEPARATION_TAG, error::Error, public_key::PublicKey,
    signature_bytes::SignatureBytes,
};

#[derive(Clone, Copy, PartialEq, Eq, Debug, From)]
pub struct Signature(RawSignature);

impl TryFrom<SignatureBytes> for Signature {
    type Error = Error;

    #[inline]
    fn try_from(bytes: SignatureBytes) -> Result<Self, Self::Error> {
        RawSignature::uncompress(bytes.as_bytes())
            .map(Self)
            .map_err(|_| Error::InvalidSignature)
    }
}

impl Signature {
    #[must_use]
    pub fn verify(&self, message: impl AsRef<[u8]>, public_key: PublicKey) -> bool {
        let result = self.as_raw().verify(
            true,
            message.as_ref(),
            DOMAIN_SEPARATION_TAG,
            &[],
            public_key.as_raw(),
            false,
        );

        result == BLST_ERROR::BLST_SUCCESS
    }

    pub(crate) const fn as_raw(&self) -> &RawSignature {
        &self.0
    }
}
