use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{kind} signature is invalid")]
    SignatureInvalid { kind: &'static str },
}
