use blst::min_pk::PublicKey as RawPublicKey;
use derive_more::From;

use crate::{error::Error, public_key_bytes::PublicKeyBytes};

#[derive(Clone, Copy, PartialEq, Eq, Debug, From)]
pub struct PublicKey(RawPublicKey);

impl TryFrom<PublicKeyBytes> for PublicKey {
    type Error = Error;

    #[inline]
    fn try_from(bytes: PublicKeyBytes) -> Result<Self, Self::Error> {
        let raw =
            RawPublicKey::uncompress(bytes.as_bytes()).map_err(|_| Error::InvalidPublicKey)?;

        // `uncompress` only checks that the point is on the curve.
        // Points outside the prime order subgroup and the point at infinity must be rejected too.
        raw.validate().map_err(|_| Error::InvalidPublicKey)?;

        Ok(Self(raw))
    }
}

impl PublicKey {
    pub(crate) const fn as_raw(&self) -> &RawPublicKey {
        &self.0
    }
}
