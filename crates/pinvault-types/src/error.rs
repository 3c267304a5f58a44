use thiserror::Error;

/// Error taxonomy for every layer of the stack.
///
/// `Validation` and `BusinessRule` are recoverable and carry the
/// user-facing reason. `Crypto` details are for the audit log only;
/// callers surface a generic "invalid proof" instead.
#[derive(Error, Debug)]
pub enum PinVaultError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Cryptographic error: {0}")]
    Crypto(String),

    #[error("Nullifier already used")]
    Replay,

    #[error("Business rule violation: {0}")]
    BusinessRule(String),

    #[error("Customer not registered")]
    NotRegistered,

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type PinVaultResult<T> = Result<T, PinVaultError>;
