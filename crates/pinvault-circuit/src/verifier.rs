//! The single Groth16 verification entry point.
//!
//! Both execution environments (the off-ledger service and the
//! on-ledger contract) call [`verify`] through thin adapters, so the
//! pairing equation
//!
//! `e(A, B) = e(alpha, beta) * e(L, gamma) * e(C, delta)`
//!
//! lives in exactly one place and the two can never drift. Every
//! failure mode collapses to `false`: wrong signal count, points off
//! curve or outside the subgroup, or an internal pairing error. A
//! caller learns only accept/reject, never which sub-check failed.

use ark_bn254::{Bn254, Fr};
use ark_groth16::{Groth16, PreparedVerifyingKey, Proof, VerifyingKey};
use ark_serialize::CanonicalDeserialize;
use ark_snark::SNARK;
use pinvault_types::{PinVaultError, PinVaultResult};

/// Verify a proof against public signals with a prepared key.
///
/// `gamma_abc_g1` carries one point per public signal plus the
/// implicit leading `1`, so the length check is `signals + 1`.
pub fn verify(
    pvk: &PreparedVerifyingKey<Bn254>,
    public_signals: &[Fr],
    proof: &Proof<Bn254>,
) -> bool {
    if public_signals.len() + 1 != pvk.vk.gamma_abc_g1.len() {
        return false;
    }
    Groth16::<Bn254>::verify_with_processed_vk(pvk, public_signals, proof).unwrap_or(false)
}

/// Prepare a verifying key for repeated verification.
pub fn prepare(vk: &VerifyingKey<Bn254>) -> PreparedVerifyingKey<Bn254> {
    ark_groth16::prepare_verifying_key(vk)
}

/// Deserialize a verifying key with full point validation.
pub fn vk_from_bytes(bytes: &[u8]) -> PinVaultResult<VerifyingKey<Bn254>> {
    VerifyingKey::<Bn254>::deserialize_compressed(bytes)
        .map_err(|_| PinVaultError::Validation("malformed verifying key bytes".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::prover::{generate_payment_proof, PaymentWitness};
    use crate::setup::ceremony_init_with_seed;
    use ark_ec::AffineRepr;

    fn proven() -> (Proof<Bn254>, Vec<Fr>) {
        let witness = PaymentWitness::new([1u8; 32], [2u8; 32], [3u8; 32], 1000);
        generate_payment_proof(fixtures::proving_key(), &witness).unwrap()
    }

    #[test]
    fn test_valid_proof_accepted() {
        let (proof, signals) = proven();
        assert!(verify(&fixtures::prepared_vk(), &signals, &proof));
    }

    #[test]
    fn test_wrong_signal_count_rejected() {
        let (proof, signals) = proven();
        let pvk = fixtures::prepared_vk();

        assert!(!verify(&pvk, &signals[..2], &proof));

        let mut extended = signals.clone();
        extended.push(Fr::from(1u64));
        assert!(!verify(&pvk, &extended, &proof));

        assert!(!verify(&pvk, &[], &proof));
    }

    #[test]
    fn test_wrong_signal_value_rejected() {
        let (proof, mut signals) = proven();
        signals[1] = Fr::from(999_999u64);
        assert!(!verify(&fixtures::prepared_vk(), &signals, &proof));
    }

    #[test]
    fn test_tampered_proof_points_rejected() {
        let (proof, signals) = proven();
        let pvk = fixtures::prepared_vk();

        // Mutate each coordinate group of the proof in turn.
        let mut tampered = proof.clone();
        tampered.a = (tampered.a + ark_bn254::G1Affine::generator()).into();
        assert!(!verify(&pvk, &signals, &tampered));

        let mut tampered = proof.clone();
        tampered.b = (tampered.b + ark_bn254::G2Affine::generator()).into();
        assert!(!verify(&pvk, &signals, &tampered));

        let mut tampered = proof;
        tampered.c = (tampered.c + ark_bn254::G1Affine::generator()).into();
        assert!(!verify(&pvk, &signals, &tampered));
    }

    #[test]
    fn test_mismatched_circuit_keys_rejected() {
        let (proof, signals) = proven();

        // Keys from a different ceremony do not verify this proof.
        let other_pk = ceremony_init_with_seed(0xBAD_5EED).unwrap();
        let other_pvk = prepare(&other_pk.vk);
        assert!(!verify(&other_pvk, &signals, &proof));
    }

    #[test]
    fn test_vk_from_bytes_rejects_garbage() {
        assert!(vk_from_bytes(&[0xff; 64]).is_err());
    }
}
