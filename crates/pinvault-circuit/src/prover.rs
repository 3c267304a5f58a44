//! Groth16 proof generation for PIN commitments and payments.
//!
//! The prover refuses to emit a proof for an unsatisfiable witness:
//! the constraint system is synthesized and checked before proving, so
//! a wrong PIN against a registered commitment fails here instead of
//! producing bytes that merely fail verification later. Private inputs
//! live in zeroized witness structs and are not persisted.

use crate::circuit::{PinAuthCircuit, PinPaymentCircuit};
use crate::poseidon::{amount_to_field, bytes_to_fr, fr_to_bytes};
use ark_bn254::{Bn254, Fr};
use ark_groth16::{Groth16, Proof, ProvingKey};
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystem};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use ark_snark::SNARK;
use rand::thread_rng;
use pinvault_types::{PinVaultError, PinVaultResult};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Private inputs for an authentication proof. Zeroized on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct AuthWitness {
    pub pin: [u8; 32],
    pub salt: [u8; 32],
}

/// Private inputs for a payment proof. Zeroized on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct PaymentWitness {
    pub pin: [u8; 32],
    pub salt: [u8; 32],
    pub nonce: [u8; 32],
    pub amount: u64,
    /// Claimed commitment; `None` means "derive from pin/salt".
    pub claimed_pin_hash: Option<[u8; 32]>,
}

impl PaymentWitness {
    pub fn new(pin: [u8; 32], salt: [u8; 32], nonce: [u8; 32], amount: u64) -> Self {
        Self { pin, salt, nonce, amount, claimed_pin_hash: None }
    }

    /// Prove against a registered commitment rather than a derived one.
    /// Fails at proving time unless the PIN actually opens it.
    pub fn against(
        pin: [u8; 32],
        salt: [u8; 32],
        nonce: [u8; 32],
        amount: u64,
        pin_hash: [u8; 32],
    ) -> Self {
        Self { pin, salt, nonce, amount, claimed_pin_hash: Some(pin_hash) }
    }
}

fn ensure_satisfied<C>(circuit: C) -> PinVaultResult<()>
where
    C: ConstraintSynthesizer<Fr>,
{
    let cs = ConstraintSystem::<Fr>::new_ref();
    circuit
        .generate_constraints(cs.clone())
        .map_err(|e| PinVaultError::Crypto(format!("constraint synthesis failed: {e}")))?;
    let satisfied = cs
        .is_satisfied()
        .map_err(|e| PinVaultError::Crypto(format!("satisfiability check failed: {e}")))?;
    if !satisfied {
        return Err(PinVaultError::Crypto(
            "witness does not satisfy the circuit".into(),
        ));
    }
    Ok(())
}

/// Generate an authentication proof: knowledge of `(pin, salt)` for a
/// public `pin_hash`. Returns the proof and `[pin_hash]`.
pub fn generate_auth_proof(
    pk: &ProvingKey<Bn254>,
    witness: &AuthWitness,
) -> PinVaultResult<(Proof<Bn254>, Vec<Fr>)> {
    let circuit = PinAuthCircuit::new(bytes_to_fr(&witness.pin), bytes_to_fr(&witness.salt));
    let public_signals = circuit.public_inputs();

    ensure_satisfied(circuit.clone())?;

    let mut rng = thread_rng();
    let proof = Groth16::<Bn254>::prove(pk, circuit, &mut rng)
        .map_err(|e| PinVaultError::Crypto(format!("proof generation failed: {e}")))?;

    Ok((proof, public_signals))
}

/// Generate a payment proof. Returns the proof and the public signals
/// `[pin_hash, amount, nullifier]` in verifying-key order.
pub fn generate_payment_proof(
    pk: &ProvingKey<Bn254>,
    witness: &PaymentWitness,
) -> PinVaultResult<(Proof<Bn254>, Vec<Fr>)> {
    let pin = bytes_to_fr(&witness.pin);
    let salt = bytes_to_fr(&witness.salt);
    let nonce = bytes_to_fr(&witness.nonce);
    let amount = amount_to_field(witness.amount);

    let circuit = match witness.claimed_pin_hash {
        Some(ref claimed) => {
            PinPaymentCircuit::against_commitment(pin, salt, nonce, amount, bytes_to_fr(claimed))
        }
        None => PinPaymentCircuit::new(pin, salt, nonce, amount),
    };
    let public_signals = circuit.public_inputs();

    ensure_satisfied(circuit.clone())?;

    let mut rng = thread_rng();
    let proof = Groth16::<Bn254>::prove(pk, circuit, &mut rng)
        .map_err(|e| PinVaultError::Crypto(format!("proof generation failed: {e}")))?;

    Ok((proof, public_signals))
}

// ============================================================================
// Wire format
// ============================================================================

/// Serialize a proof to compressed bytes (2 G1 + 1 G2 on BN254).
pub fn proof_to_bytes(proof: &Proof<Bn254>) -> PinVaultResult<Vec<u8>> {
    let mut bytes = Vec::new();
    proof
        .serialize_compressed(&mut bytes)
        .map_err(|e| PinVaultError::Serialization(format!("proof: {e}")))?;
    Ok(bytes)
}

/// Deserialize a proof, validating that all points are on-curve and in
/// the correct subgroup. Malformed bytes are a validation failure, not
/// a crash.
pub fn proof_from_bytes(bytes: &[u8]) -> PinVaultResult<Proof<Bn254>> {
    Proof::<Bn254>::deserialize_compressed(bytes)
        .map_err(|_| PinVaultError::Validation("malformed proof bytes".into()))
}

/// Hex encoding for the HTTP surface.
pub fn proof_to_hex(proof: &Proof<Bn254>) -> PinVaultResult<String> {
    Ok(hex::encode(proof_to_bytes(proof)?))
}

pub fn proof_from_hex(s: &str) -> PinVaultResult<Proof<Bn254>> {
    let bytes = hex::decode(s.strip_prefix("0x").unwrap_or(s))
        .map_err(|_| PinVaultError::Validation("proof is not valid hex".into()))?;
    proof_from_bytes(&bytes)
}

/// Encode public signals as 32-byte LE hex strings.
pub fn signals_to_hex(signals: &[Fr]) -> Vec<String> {
    signals.iter().map(|f| hex::encode(fr_to_bytes(f))).collect()
}

pub fn signals_from_hex(signals: &[String]) -> PinVaultResult<Vec<Fr>> {
    signals
        .iter()
        .map(|s| {
            let bytes = hex::decode(s.strip_prefix("0x").unwrap_or(s))
                .map_err(|_| PinVaultError::Validation("public signal is not valid hex".into()))?;
            let arr: [u8; 32] = bytes
                .try_into()
                .map_err(|_| PinVaultError::Validation("public signal must be 32 bytes".into()))?;
            Ok(bytes_to_fr(&arr))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::poseidon::{payment_nullifier, pin_commitment};
    use crate::verifier;

    #[test]
    fn test_payment_proof_roundtrip() {
        let pk = fixtures::proving_key();
        let pvk = fixtures::prepared_vk();

        let witness = PaymentWitness::new([1u8; 32], [2u8; 32], [3u8; 32], 500);
        let (proof, signals) = generate_payment_proof(pk, &witness).unwrap();

        assert_eq!(signals.len(), 3);
        assert!(verifier::verify(&pvk, &signals, &proof));
    }

    #[test]
    fn test_signals_match_native_hashes() {
        let pk = fixtures::proving_key();

        let pin = [0x12; 32];
        let salt = [0x34; 32];
        let nonce = [0x56; 32];

        let witness = PaymentWitness::new(pin, salt, nonce, 250);
        let (_proof, signals) = generate_payment_proof(pk, &witness).unwrap();

        assert_eq!(fr_to_bytes(&signals[0]), pin_commitment(&pin, &salt));
        assert_eq!(signals[1], amount_to_field(250));
        assert_eq!(fr_to_bytes(&signals[2]), payment_nullifier(&pin, &salt, &nonce));
    }

    #[test]
    fn test_wrong_pin_fails_generation() {
        let pk = fixtures::proving_key();

        let registered = pin_commitment(&[0x11; 32], &[0x22; 32]);
        let witness =
            PaymentWitness::against([0x99; 32], [0x22; 32], [0x33; 32], 100, registered);

        let err = generate_payment_proof(pk, &witness).unwrap_err();
        assert!(matches!(err, PinVaultError::Crypto(_)));
    }

    #[test]
    fn test_correct_pin_against_commitment_succeeds() {
        let pk = fixtures::proving_key();
        let pvk = fixtures::prepared_vk();

        let pin = [0x11; 32];
        let salt = [0x22; 32];
        let registered = pin_commitment(&pin, &salt);

        let witness = PaymentWitness::against(pin, salt, [0x33; 32], 100, registered);
        let (proof, signals) = generate_payment_proof(pk, &witness).unwrap();
        assert!(verifier::verify(&pvk, &signals, &proof));
    }

    #[test]
    fn test_auth_proof() {
        let setup = fixtures::auth_setup();
        let pvk = ark_groth16::prepare_verifying_key(&setup.verifying_key);

        let witness = AuthWitness { pin: [7u8; 32], salt: [8u8; 32] };
        let (proof, signals) = generate_auth_proof(&setup.proving_key, &witness).unwrap();

        assert_eq!(signals.len(), 1);
        assert!(verifier::verify(&pvk, &signals, &proof));
    }

    #[test]
    fn test_proof_wire_roundtrip() {
        let pk = fixtures::proving_key();
        let pvk = fixtures::prepared_vk();

        let witness = PaymentWitness::new([1u8; 32], [2u8; 32], [3u8; 32], 42);
        let (proof, signals) = generate_payment_proof(pk, &witness).unwrap();

        let hex_proof = proof_to_hex(&proof).unwrap();
        let restored = proof_from_hex(&hex_proof).unwrap();
        assert!(verifier::verify(&pvk, &signals, &restored));

        let hex_signals = signals_to_hex(&signals);
        let restored_signals = signals_from_hex(&hex_signals).unwrap();
        assert_eq!(signals, restored_signals);
    }

    #[test]
    fn test_malformed_proof_bytes_rejected() {
        assert!(matches!(
            proof_from_bytes(&[0u8; 16]),
            Err(PinVaultError::Validation(_))
        ));
        assert!(matches!(
            proof_from_hex("zzzz"),
            Err(PinVaultError::Validation(_))
        ));
    }
}
