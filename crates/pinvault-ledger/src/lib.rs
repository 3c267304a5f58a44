//! Authoritative payment state: the PIN registry, the consumed-nullifier
//! set and the replay-safe payment ledger, plus the on-ledger contract
//! that mirrors the same rules under serialized execution.
//!
//! Each store owns its map outright and is mutated only through its
//! public operations. The orchestrator coordinates them but holds no
//! state of its own.

pub mod contract;
pub mod ledger;
pub mod nullifier;
pub mod registry;

pub use contract::PinVaultContract;
pub use ledger::{LedgerConfig, PaymentLedger, PaymentRecord, Settlement};
pub use nullifier::NullifierSet;
pub use registry::{PinRegistry, RegistrationOutcome};
