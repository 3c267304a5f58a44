//! On-ledger contract environment.
//!
//! The same rules as the off-ledger service, expressed as a state
//! machine with `&mut self` transitions: the ledger execution
//! environment serializes calls, so no interior locking is needed and
//! the nullifier check-and-mark is atomic by construction. The pairing
//! check is the shared `verifier::verify`; the two environments cannot
//! drift because neither owns its own copy of the equation.
//!
//! This environment is authoritative. When the off-ledger service and
//! the contract disagree (a key-version mismatch, say), the contract's
//! answer stands and the service must be redeployed against it.

use ark_bn254::{Bn254, Fr, G1Affine, G2Affine};
use ark_groth16::{PreparedVerifyingKey, Proof, VerifyingKey};
use ark_serialize::CanonicalSerialize;
use chrono::{DateTime, Utc};
use pinvault_circuit::keys;
use pinvault_circuit::poseidon::{field_to_amount, fr_to_bytes};
use pinvault_circuit::verifier;
use pinvault_types::{PinVaultError, PinVaultResult};
use std::collections::{HashMap, HashSet};
use subtle::ConstantTimeEq;
use tracing::warn;

use crate::registry::customer_key;

#[derive(Clone, Debug)]
struct StoredCommitment {
    pin_hash: [u8; 32],
    salt: [u8; 32],
    registered_at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct ContractPayment {
    pub merchant: String,
    pub customer: String,
    pub amount: u64,
    pub nullifier: [u8; 32],
    pub timestamp: DateTime<Utc>,
}

pub struct PinVaultContract {
    pvk: PreparedVerifyingKey<Bn254>,
    vk_hash: String,
    max_amount: u64,
    commitments: HashMap<String, StoredCommitment>,
    used_nullifiers: HashSet<[u8; 32]>,
    payments: Vec<ContractPayment>,
}

impl PinVaultContract {
    /// Deploy with an embedded verifying key. The key hash is fixed at
    /// deployment and exposed for the off-ledger startup check.
    pub fn new(vk: VerifyingKey<Bn254>, max_amount: u64) -> PinVaultResult<Self> {
        let mut vk_bytes = Vec::new();
        vk.serialize_compressed(&mut vk_bytes)
            .map_err(|e| PinVaultError::Serialization(format!("vk: {e}")))?;

        Ok(Self {
            pvk: verifier::prepare(&vk),
            vk_hash: keys::vk_hash(&vk_bytes),
            max_amount,
            commitments: HashMap::new(),
            used_nullifiers: HashSet::new(),
            payments: Vec::new(),
        })
    }

    pub fn vk_hash(&self) -> &str {
        &self.vk_hash
    }

    pub fn register_pin(
        &mut self,
        customer_id: &str,
        pin_hash: [u8; 32],
        salt: [u8; 32],
    ) -> PinVaultResult<()> {
        if customer_id.trim().is_empty() {
            return Err(PinVaultError::Validation("customer id must not be empty".into()));
        }
        self.commitments.insert(
            customer_key(customer_id),
            StoredCommitment { pin_hash, salt, registered_at: Utc::now() },
        );
        Ok(())
    }

    pub fn verify_pin(
        &self,
        customer_id: &str,
        claimed_pin_hash: &[u8; 32],
    ) -> PinVaultResult<(bool, [u8; 32])> {
        let commitment = self
            .commitments
            .get(&customer_key(customer_id))
            .ok_or(PinVaultError::NotRegistered)?;
        let valid = commitment.pin_hash.ct_eq(claimed_pin_hash).into();
        Ok((valid, commitment.salt))
    }

    pub fn is_pin_registered(&self, customer_id: &str) -> bool {
        self.commitments.contains_key(&customer_key(customer_id))
    }

    pub fn registration_time(&self, customer_id: &str) -> PinVaultResult<DateTime<Utc>> {
        self.commitments
            .get(&customer_key(customer_id))
            .map(|c| c.registered_at)
            .ok_or(PinVaultError::NotRegistered)
    }

    pub fn is_nullifier_used(&self, nullifier: &[u8; 32]) -> bool {
        self.used_nullifiers.contains(nullifier)
    }

    pub fn payment_count(&self) -> usize {
        self.payments.len()
    }

    /// Verify and settle one payment in a single state transition.
    ///
    /// Signals are `[pin_hash, amount, nullifier]`. Unlike the
    /// off-ledger ledger, the contract holds the registry itself, so it
    /// also enforces that the proof's commitment matches the customer's
    /// registered one.
    pub fn verify_payment(
        &mut self,
        proof_a: G1Affine,
        proof_b: G2Affine,
        proof_c: G1Affine,
        public_signals: &[Fr],
        merchant: &str,
        customer: &str,
    ) -> (bool, String) {
        if public_signals.len() != 3 {
            return (false, "invalid public signals".into());
        }
        let pin_hash = fr_to_bytes(&public_signals[0]);
        let Some(amount) = field_to_amount(&public_signals[1]) else {
            return (false, "invalid amount encoding".into());
        };
        let nullifier = fr_to_bytes(&public_signals[2]);

        let Some(commitment) = self.commitments.get(&customer_key(customer)) else {
            return (false, "customer not registered".into());
        };
        if commitment.pin_hash != pin_hash {
            return (false, "pin commitment mismatch".into());
        }

        let proof = Proof { a: proof_a, b: proof_b, c: proof_c };
        if !verifier::verify(&self.pvk, public_signals, &proof) {
            return (false, "invalid proof".into());
        }

        if self.used_nullifiers.contains(&nullifier) {
            warn!(
                %merchant,
                %customer,
                nullifier = %hex::encode(nullifier),
                "replay detected on contract"
            );
            return (false, "replay detected".into());
        }

        if amount == 0 {
            return (false, "amount must be positive".into());
        }
        if amount > self.max_amount {
            return (false, "amount exceeds maximum".into());
        }
        if merchant.trim().is_empty() || customer.trim().is_empty() {
            return (false, "invalid identity".into());
        }
        if merchant == customer {
            return (false, "merchant and customer must be distinct".into());
        }

        self.used_nullifiers.insert(nullifier);
        self.payments.push(ContractPayment {
            merchant: merchant.to_string(),
            customer: customer.to_string(),
            amount,
            nullifier,
            timestamp: Utc::now(),
        });
        (true, "settled".into())
    }
}
