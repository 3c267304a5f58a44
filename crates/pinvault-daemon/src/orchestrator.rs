//! Request orchestration.
//!
//! The orchestrator is a pure coordinator: it parses wire-format
//! inputs, cross-checks the proof's commitment and amount against the
//! registry and the request, and delegates to the ledger for the
//! atomic verify-and-settle. It owns the registry and ledger but adds
//! no state of its own.

use ark_bn254::Bn254;
use ark_groth16::PreparedVerifyingKey;
use pinvault_circuit::poseidon::{amount_to_field, fr_to_bytes};
use pinvault_circuit::prover::{proof_from_hex, signals_from_hex};
use pinvault_ledger::{LedgerConfig, PaymentLedger, PinRegistry, RegistrationOutcome, Settlement};
use pinvault_types::{PinVaultError, PinVaultResult};
use tracing::warn;

use crate::config::DaemonConfig;

/// Decode a 32-byte hex field, tolerating a `0x` prefix.
pub fn parse_hex_32(value: &str, field: &str) -> PinVaultResult<[u8; 32]> {
    let bytes = hex::decode(value.strip_prefix("0x").unwrap_or(value))
        .map_err(|_| PinVaultError::Validation(format!("{field} is not valid hex")))?;
    bytes
        .try_into()
        .map_err(|_| PinVaultError::Validation(format!("{field} must be 32 bytes")))
}

pub struct Orchestrator {
    registry: PinRegistry,
    ledger: PaymentLedger,
    vk_hash: String,
}

impl Orchestrator {
    pub fn new(
        pvk: PreparedVerifyingKey<Bn254>,
        vk_hash: String,
        config: &DaemonConfig,
    ) -> Self {
        Self {
            registry: PinRegistry::new(),
            ledger: PaymentLedger::new(
                pvk,
                LedgerConfig {
                    max_amount: config.max_amount,
                    nullifier_capacity: config.nullifier_capacity,
                },
            ),
            vk_hash,
        }
    }

    /// Hash of the verifying key this service verifies with. Compared
    /// against the deployed contract key at startup.
    pub fn vk_hash(&self) -> &str {
        &self.vk_hash
    }

    pub async fn register_pin(
        &self,
        customer_id: &str,
        pin_hash_hex: &str,
        salt_hex: &str,
    ) -> PinVaultResult<RegistrationOutcome> {
        let pin_hash = parse_hex_32(pin_hash_hex, "pinHash")?;
        let salt = parse_hex_32(salt_hex, "salt")?;
        self.registry.register(customer_id, pin_hash, salt).await
    }

    pub async fn verify_pin(
        &self,
        customer_id: &str,
        claimed_pin_hash_hex: &str,
    ) -> PinVaultResult<(bool, String)> {
        let claimed = parse_hex_32(claimed_pin_hash_hex, "pinHash")?;
        let (valid, salt) = self.registry.verify(customer_id, &claimed).await?;
        Ok((valid, hex::encode(salt)))
    }

    /// Full payment path: decode the wire proof, bind it to the
    /// registered commitment and the requested amount, then hand off to
    /// the ledger's atomic settlement.
    pub async fn verify_payment(
        &self,
        proof_hex: &str,
        public_signals_hex: &[String],
        amount: u64,
        merchant_id: &str,
        customer_id: &str,
    ) -> Settlement {
        let proof = match proof_from_hex(proof_hex) {
            Ok(proof) => proof,
            Err(_) => return rejected("malformed proof"),
        };
        let signals = match signals_from_hex(public_signals_hex) {
            Ok(signals) => signals,
            Err(_) => return rejected("malformed public signals"),
        };
        if signals.len() != 3 {
            return rejected("invalid public signals");
        }

        // The proof must commit to the amount the request claims
        if signals[1] != amount_to_field(amount) {
            return rejected("amount mismatch");
        }

        // And open the commitment registered for this customer
        let registered = match self.registry.commitment(customer_id).await {
            Ok(commitment) => commitment,
            Err(PinVaultError::NotRegistered) => return rejected("customer not registered"),
            Err(_) => return rejected("invalid identity"),
        };
        if fr_to_bytes(&signals[0]) != registered {
            warn!(%customer_id, "proof commitment does not match registry");
            return rejected("pin commitment mismatch");
        }

        self.ledger
            .settle_payment(&proof, &signals, merchant_id, customer_id)
            .await
    }

    pub async fn registered_commitment(&self, customer_id: &str) -> PinVaultResult<[u8; 32]> {
        self.registry.commitment(customer_id).await
    }

    pub async fn is_registered(&self, customer_id: &str) -> bool {
        self.registry.is_registered(customer_id).await
    }

    pub async fn registered_count(&self) -> usize {
        self.registry.registered_count().await
    }

    pub async fn settled_count(&self) -> usize {
        self.ledger.payment_count().await
    }

    pub async fn is_nullifier_used(&self, nullifier_hex: &str) -> PinVaultResult<bool> {
        let nullifier = parse_hex_32(nullifier_hex, "nullifier")?;
        Ok(self.ledger.is_nullifier_used(&nullifier).await)
    }
}

fn rejected(reason: &str) -> Settlement {
    Settlement { settled: false, reason: reason.to_string(), tx_id: None }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pinvault_circuit::fixtures;
    use pinvault_circuit::poseidon::pin_commitment;
    use pinvault_circuit::prover::{
        generate_payment_proof, proof_to_hex, signals_to_hex, PaymentWitness,
    };

    const PIN: [u8; 32] = [0x11; 32];
    const SALT: [u8; 32] = [0x22; 32];

    async fn orchestrator() -> Orchestrator {
        let orch = Orchestrator::new(
            fixtures::prepared_vk(),
            "test-vk-hash".into(),
            &DaemonConfig::default(),
        );
        orch.register_pin(
            "cust_1",
            &hex::encode(pin_commitment(&PIN, &SALT)),
            &hex::encode(SALT),
        )
        .await
        .unwrap();
        orch
    }

    fn wire_proof(nonce: u8, amount: u64) -> (String, Vec<String>) {
        let witness = PaymentWitness::new(PIN, SALT, [nonce; 32], amount);
        let (proof, signals) =
            generate_payment_proof(fixtures::proving_key(), &witness).unwrap();
        (proof_to_hex(&proof).unwrap(), signals_to_hex(&signals))
    }

    #[tokio::test]
    async fn test_payment_flow_and_replay() {
        let orch = orchestrator().await;
        let (proof, signals) = wire_proof(1, 300);

        let outcome = orch.verify_payment(&proof, &signals, 300, "merchant_1", "cust_1").await;
        assert!(outcome.settled, "{}", outcome.reason);
        assert_eq!(orch.settled_count().await, 1);
        assert!(orch.is_nullifier_used(&signals[2]).await.unwrap());

        let outcome = orch.verify_payment(&proof, &signals, 300, "merchant_1", "cust_1").await;
        assert!(!outcome.settled);
        assert_eq!(outcome.reason, "replay detected");
    }

    #[tokio::test]
    async fn test_amount_mismatch_rejected() {
        let orch = orchestrator().await;
        let (proof, signals) = wire_proof(2, 300);

        let outcome = orch.verify_payment(&proof, &signals, 999, "merchant_1", "cust_1").await;
        assert!(!outcome.settled);
        assert_eq!(outcome.reason, "amount mismatch");
    }

    #[tokio::test]
    async fn test_unknown_customer_rejected() {
        let orch = orchestrator().await;
        let (proof, signals) = wire_proof(3, 300);

        let outcome = orch.verify_payment(&proof, &signals, 300, "merchant_1", "cust_9").await;
        assert!(!outcome.settled);
        assert_eq!(outcome.reason, "customer not registered");
    }

    #[tokio::test]
    async fn test_foreign_commitment_rejected() {
        let orch = orchestrator().await;

        // Valid proof, but for a different customer's PIN
        let witness = PaymentWitness::new([0x77; 32], [0x88; 32], [4u8; 32], 300);
        let (proof, signals) =
            generate_payment_proof(fixtures::proving_key(), &witness).unwrap();
        let outcome = orch
            .verify_payment(
                &proof_to_hex(&proof).unwrap(),
                &signals_to_hex(&signals),
                300,
                "merchant_1",
                "cust_1",
            )
            .await;
        assert!(!outcome.settled);
        assert_eq!(outcome.reason, "pin commitment mismatch");
    }

    #[tokio::test]
    async fn test_malformed_wire_data_rejected() {
        let orch = orchestrator().await;
        let (proof, signals) = wire_proof(5, 300);

        let outcome = orch.verify_payment("zz", &signals, 300, "merchant_1", "cust_1").await;
        assert_eq!(outcome.reason, "malformed proof");

        let bad_signals = vec!["nothex".to_string()];
        let outcome = orch.verify_payment(&proof, &bad_signals, 300, "merchant_1", "cust_1").await;
        assert_eq!(outcome.reason, "malformed public signals");
    }

    #[tokio::test]
    async fn test_register_validates_hex() {
        let orch = orchestrator().await;
        assert!(matches!(
            orch.register_pin("cust_2", "short", &hex::encode([0u8; 32])).await,
            Err(PinVaultError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_verify_pin_returns_salt() {
        let orch = orchestrator().await;
        let commitment = hex::encode(pin_commitment(&PIN, &SALT));

        let (valid, salt) = orch.verify_pin("cust_1", &commitment).await.unwrap();
        assert!(valid);
        assert_eq!(salt, hex::encode(SALT));
    }
}
