//! Shared types for the PinVault payment-authorization stack.

mod error;

pub use error::{PinVaultError, PinVaultResult};
