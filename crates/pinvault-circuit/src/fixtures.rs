//! Deterministic key fixtures for tests and local development.
//!
//! Real deployments run the multiparty ceremony in `setup` and load the
//! finalized artifacts from disk. Tests and dev-mode daemons instead
//! share these seeded keys, built once per process behind a `OnceLock`
//! so every test sees the same verifying key.

use crate::circuit::PinAuthCircuit;
use crate::setup::{
    ceremony_contribute_with_scalar, ceremony_init_with_seed, CeremonyTranscript, TrustedSetup,
};
use crate::verifier;
use ark_bn254::{Bn254, Fr};
use ark_groth16::{Groth16, PreparedVerifyingKey, ProvingKey};
use ark_snark::SNARK;
use ark_std::rand::{rngs::StdRng, SeedableRng};
use std::sync::OnceLock;

const PAYMENT_SEED: u64 = 0xF1A7_0001;
const AUTH_SEED: u64 = 0xF1A7_0002;

/// Seeded payment-circuit setup: a two-party ceremony with fixed
/// contribution scalars, finalized against its transcript.
pub fn trusted_setup() -> &'static TrustedSetup {
    static SETUP: OnceLock<TrustedSetup> = OnceLock::new();
    SETUP.get_or_init(|| {
        let pk = ceremony_init_with_seed(PAYMENT_SEED).expect("fixture ceremony init");

        let mut transcript = CeremonyTranscript::default();
        let (pk, r1) = ceremony_contribute_with_scalar(pk, Fr::from(3u64));
        transcript.push(r1);
        let (pk, r2) = ceremony_contribute_with_scalar(pk, Fr::from(5u64));
        transcript.push(r2);

        TrustedSetup::finalize(pk, &transcript).expect("fixture ceremony finalize")
    })
}

pub fn proving_key() -> &'static ProvingKey<Bn254> {
    &trusted_setup().proving_key
}

pub fn prepared_vk() -> PreparedVerifyingKey<Bn254> {
    verifier::prepare(&trusted_setup().verifying_key)
}

/// Seeded auth-circuit setup. The auth circuit has its own key pair;
/// payment keys do not verify auth proofs.
pub fn auth_setup() -> &'static TrustedSetup {
    static SETUP: OnceLock<TrustedSetup> = OnceLock::new();
    SETUP.get_or_init(|| {
        let mut rng = StdRng::seed_from_u64(AUTH_SEED);
        let circuit = PinAuthCircuit::new(Fr::from(1u64), Fr::from(1u64));
        let (proving_key, verifying_key) =
            Groth16::<Bn254>::circuit_specific_setup(circuit, &mut rng)
                .expect("auth fixture setup");
        TrustedSetup { proving_key, verifying_key }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_fixture_shapes() {
        let setup = trusted_setup();
        // 3 public signals plus the leading 1
        assert_eq!(setup.verifying_key.gamma_abc_g1.len(), 4);
        assert_eq!(setup.proving_key.vk, setup.verifying_key);
    }

    #[test]
    fn test_auth_fixture_shapes() {
        let setup = auth_setup();
        assert_eq!(setup.verifying_key.gamma_abc_g1.len(), 2);
    }

    #[test]
    fn test_fixture_is_shared() {
        let a = trusted_setup() as *const TrustedSetup;
        let b = trusted_setup() as *const TrustedSetup;
        assert_eq!(a, b);
    }
}
