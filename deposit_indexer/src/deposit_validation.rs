use bls::PublicKey;
use helper_functions::signing::SignForAllForks as _;
use types::{
    config::Config,
    containers::{DepositData, DepositMessage},
};

/// Checks the deposit signature over the deposit domain of the genesis fork.
///
/// Keys and signatures that fail to decompress make the deposit invalid.
#[must_use]
pub fn has_valid_signature(config: &Config, deposit_data: DepositData) -> bool {
    let Ok(public_key) = PublicKey::try_from(deposit_data.pubkey) else {
        return false;
    };

    DepositMessage::from(deposit_data)
        .verify(config, deposit_data.signature, public_key)
        .is_ok()
}
