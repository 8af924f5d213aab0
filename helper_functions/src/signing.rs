use anyhow::{ensure, Result};
use bls::{PublicKey, SecretKey, Signature, SignatureBytes};
use types::{
    config::Config,
    consts::DOMAIN_DEPOSIT,
    containers::DepositMessage,
    primitives::{DomainType, H256},
    traits::SszHash,
};

use crate::{error::Error, misc};

/// Objects signed with a domain computed from the genesis fork version.
pub trait SignForAllForks: SszHash {
    const DOMAIN_TYPE: DomainType;
    const SIGNATURE_KIND: &'static str;

    fn signing_root(&self, config: &Config) -> H256 {
        let domain = misc::compute_domain(config, Self::DOMAIN_TYPE, None, None);
        misc::compute_signing_root(self, domain)
    }

    fn sign(&self, config: &Config, secret_key: &SecretKey) -> Signature {
        secret_key.sign(self.signing_root(config))
    }

    fn verify(
        &self,
        config: &Config,
        signature_bytes: SignatureBytes,
        public_key: PublicKey,
    ) -> Result<()> {
        let signature = Signature::try_from(signature_bytes)?;

        ensure!(
            signature.verify(self.signing_root(config), public_key),
            Error::SignatureInvalid {
                kind: Self::SIGNATURE_KIND,
            },
        );

        Ok(())
    }
}

/// <https://github.com/ethereum/consensus-specs/blob/dev/specs/phase0/validator.md#submit-deposit>
impl SignForAllForks for DepositMessage {
    const DOMAIN_TYPE: DomainType = DOMAIN_DEPOSIT;
    const SIGNATURE_KIND: &'static str = "deposit";
}
