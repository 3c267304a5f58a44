//! Replay-safe payment settlement.
//!
//! `settle_payment` runs the ordered pipeline: decompose signals,
//! verify the proof, check the nullifier, enforce business rules, then
//! mark-and-append. The nullifier check and the mark are one critical
//! section behind the state mutex, so two proofs sharing a nullifier
//! can never both settle. A payment is final once appended; nothing
//! here removes records.

use ark_bn254::{Bn254, Fr};
use ark_groth16::{PreparedVerifyingKey, Proof};
use chrono::{DateTime, Utc};
use pinvault_circuit::poseidon::{field_to_amount, fr_to_bytes};
use pinvault_circuit::verifier;
use pinvault_types::PinVaultError;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::nullifier::NullifierSet;

#[derive(Clone, Copy, Debug)]
pub struct LedgerConfig {
    /// Inclusive upper bound for a single payment.
    pub max_amount: u64,
    pub nullifier_capacity: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self { max_amount: 1_000_000, nullifier_capacity: crate::nullifier::DEFAULT_CAPACITY }
    }
}

/// Immutable record of a settled payment.
#[derive(Clone, Debug, Serialize)]
pub struct PaymentRecord {
    pub tx_id: String,
    pub merchant: String,
    pub customer: String,
    pub amount: u64,
    pub nullifier: String,
    pub timestamp: DateTime<Utc>,
    pub verified: bool,
}

/// Outcome of a settlement attempt. `reason` is always populated and
/// user-facing; cryptographic detail stays in the logs.
#[derive(Clone, Debug, Serialize)]
pub struct Settlement {
    pub settled: bool,
    pub reason: String,
    pub tx_id: Option<String>,
}

impl Settlement {
    fn rejected(reason: &str) -> Self {
        Self { settled: false, reason: reason.to_string(), tx_id: None }
    }
}

fn transaction_id(
    merchant: &str,
    customer: &str,
    amount: u64,
    nullifier: &[u8; 32],
    timestamp: &DateTime<Utc>,
) -> String {
    let mut hasher = blake3::Hasher::new_derive_key("pinvault transaction id v1");
    hasher.update(merchant.as_bytes());
    hasher.update(&[0]);
    hasher.update(customer.as_bytes());
    hasher.update(&[0]);
    hasher.update(&amount.to_le_bytes());
    hasher.update(nullifier);
    hasher.update(timestamp.to_rfc3339().as_bytes());
    hex::encode(hasher.finalize().as_bytes())
}

struct LedgerState {
    nullifiers: NullifierSet,
    records: Vec<PaymentRecord>,
}

pub struct PaymentLedger {
    pvk: PreparedVerifyingKey<Bn254>,
    config: LedgerConfig,
    state: Mutex<LedgerState>,
}

impl PaymentLedger {
    pub fn new(pvk: PreparedVerifyingKey<Bn254>, config: LedgerConfig) -> Self {
        Self {
            pvk,
            config,
            state: Mutex::new(LedgerState {
                nullifiers: NullifierSet::with_capacity(config.nullifier_capacity),
                records: Vec::new(),
            }),
        }
    }

    /// Settle one payment. Signals are `[pin_hash, amount, nullifier]`
    /// in verifying-key order; the commitment cross-check against the
    /// registry is the orchestrator's job.
    pub async fn settle_payment(
        &self,
        proof: &Proof<Bn254>,
        public_signals: &[Fr],
        merchant: &str,
        customer: &str,
    ) -> Settlement {
        // 1. Decompose, rejecting malformed shapes before any pairing work
        if public_signals.len() != 3 {
            return Settlement::rejected("invalid public signals");
        }
        let Some(amount) = field_to_amount(&public_signals[1]) else {
            return Settlement::rejected("invalid amount encoding");
        };
        let nullifier = fr_to_bytes(&public_signals[2]);

        // 2. Pairing check; the caller learns only accept/reject
        if !verifier::verify(&self.pvk, public_signals, proof) {
            warn!(%merchant, %customer, amount, "proof verification failed");
            return Settlement::rejected("invalid proof");
        }

        // 3..5 are one atomic transaction on the ledger state
        let mut state = self.state.lock().await;

        if state.nullifiers.is_used(&nullifier) {
            warn!(
                %merchant,
                %customer,
                nullifier = %hex::encode(nullifier),
                "replay detected, nullifier already consumed"
            );
            return Settlement::rejected("replay detected");
        }

        if amount == 0 {
            return Settlement::rejected("amount must be positive");
        }
        if amount > self.config.max_amount {
            return Settlement::rejected("amount exceeds maximum");
        }
        if merchant.trim().is_empty() || customer.trim().is_empty() {
            return Settlement::rejected("invalid identity");
        }
        if merchant == customer {
            return Settlement::rejected("merchant and customer must be distinct");
        }

        if let Err(err) = state.nullifiers.mark_used(nullifier) {
            match err {
                PinVaultError::Replay => return Settlement::rejected("replay detected"),
                other => {
                    error!(error = %other, "nullifier mark failed");
                    return Settlement::rejected("internal error");
                }
            }
        }

        let timestamp = Utc::now();
        let tx_id = transaction_id(merchant, customer, amount, &nullifier, &timestamp);
        state.records.push(PaymentRecord {
            tx_id: tx_id.clone(),
            merchant: merchant.to_string(),
            customer: customer.to_string(),
            amount,
            nullifier: hex::encode(nullifier),
            timestamp,
            verified: true,
        });
        drop(state);

        info!(%merchant, %customer, amount, %tx_id, "payment settled");
        Settlement { settled: true, reason: "settled".to_string(), tx_id: Some(tx_id) }
    }

    pub async fn is_nullifier_used(&self, nullifier: &[u8; 32]) -> bool {
        self.state.lock().await.nullifiers.is_used(nullifier)
    }

    pub async fn payment_count(&self) -> usize {
        self.state.lock().await.records.len()
    }

    pub async fn records(&self) -> Vec<PaymentRecord> {
        self.state.lock().await.records.clone()
    }
}
