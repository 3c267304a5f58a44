//! PIN commitment registry.
//!
//! Maps a derived customer key to the current commitment. Customer ids
//! never enter the map directly; they are hashed into an irreversible
//! `customer_key` first so the registry holds no directly identifying
//! data. Commitments are upserted whole, never field-by-field, and
//! never deleted. Concurrent writes to the same customer serialize on
//! the map lock; last writer wins.

use chrono::{DateTime, Utc};
use pinvault_types::{PinVaultError, PinVaultResult};
use std::collections::HashMap;
use subtle::ConstantTimeEq;
use tokio::sync::RwLock;
use tracing::info;

/// Stored commitment for one customer.
#[derive(Clone, Debug)]
pub struct PinCommitment {
    pub pin_hash: [u8; 32],
    pub salt: [u8; 32],
    pub registered_at: DateTime<Utc>,
}

/// Whether a `register` call created a new entry or replaced one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegistrationOutcome {
    Registered,
    Updated,
}

/// Derive the irreversible registry key for a customer id.
pub fn customer_key(customer_id: &str) -> String {
    let mut hasher = blake3::Hasher::new_derive_key("pinvault customer key v1");
    hasher.update(customer_id.as_bytes());
    hex::encode(hasher.finalize().as_bytes())
}

#[derive(Default)]
pub struct PinRegistry {
    commitments: RwLock<HashMap<String, PinCommitment>>,
}

impl PinRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_customer_id(customer_id: &str) -> PinVaultResult<()> {
        if customer_id.trim().is_empty() {
            return Err(PinVaultError::Validation("customer id must not be empty".into()));
        }
        Ok(())
    }

    /// Upsert the commitment for a customer. The registered-set grows
    /// only on first registration; updates replace the fields in place.
    pub async fn register(
        &self,
        customer_id: &str,
        pin_hash: [u8; 32],
        salt: [u8; 32],
    ) -> PinVaultResult<RegistrationOutcome> {
        Self::check_customer_id(customer_id)?;
        let key = customer_key(customer_id);

        let commitment = PinCommitment { pin_hash, salt, registered_at: Utc::now() };

        let mut commitments = self.commitments.write().await;
        let outcome = match commitments.insert(key.clone(), commitment) {
            None => RegistrationOutcome::Registered,
            Some(_) => RegistrationOutcome::Updated,
        };
        drop(commitments);

        match outcome {
            RegistrationOutcome::Registered => {
                info!(customer_key = %key, "pin commitment registered")
            }
            RegistrationOutcome::Updated => {
                info!(customer_key = %key, "pin commitment updated")
            }
        }
        Ok(outcome)
    }

    /// Compare a claimed commitment against the stored one.
    ///
    /// Returns the stored salt either way; the salt is a public
    /// randomizer the legitimate prover needs, not a secret. The hash
    /// comparison is constant-time.
    pub async fn verify(
        &self,
        customer_id: &str,
        claimed_pin_hash: &[u8; 32],
    ) -> PinVaultResult<(bool, [u8; 32])> {
        Self::check_customer_id(customer_id)?;
        let key = customer_key(customer_id);

        let commitments = self.commitments.read().await;
        let commitment = commitments.get(&key).ok_or(PinVaultError::NotRegistered)?;

        let valid = commitment.pin_hash.ct_eq(claimed_pin_hash).into();
        Ok((valid, commitment.salt))
    }

    /// Look up the registered commitment hash for a customer.
    pub async fn commitment(&self, customer_id: &str) -> PinVaultResult<[u8; 32]> {
        Self::check_customer_id(customer_id)?;
        let key = customer_key(customer_id);

        let commitments = self.commitments.read().await;
        commitments
            .get(&key)
            .map(|c| c.pin_hash)
            .ok_or(PinVaultError::NotRegistered)
    }

    pub async fn is_registered(&self, customer_id: &str) -> bool {
        let key = customer_key(customer_id);
        self.commitments.read().await.contains_key(&key)
    }

    pub async fn registration_time(&self, customer_id: &str) -> PinVaultResult<DateTime<Utc>> {
        Self::check_customer_id(customer_id)?;
        let key = customer_key(customer_id);

        let commitments = self.commitments.read().await;
        commitments
            .get(&key)
            .map(|c| c.registered_at)
            .ok_or(PinVaultError::NotRegistered)
    }

    pub async fn registered_count(&self) -> usize {
        self.commitments.read().await.len()
    }
}
