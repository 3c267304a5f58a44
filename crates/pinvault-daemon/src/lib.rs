//! Off-ledger payment authorization daemon.
//!
//! The orchestrator sequences registry lookup, proof verification and
//! ledger settlement; the worker keeps CPU-bound proof generation off
//! the request path; the api module is the HTTP surface callers talk
//! to. The daemon holds no authoritative state beyond the registry and
//! ledger it owns.

pub mod api;
pub mod config;
pub mod orchestrator;
pub mod worker;

pub use config::DaemonConfig;
pub use orchestrator::Orchestrator;
pub use worker::ProofWorker;
