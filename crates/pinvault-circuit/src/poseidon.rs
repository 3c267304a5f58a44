//! Canonical Poseidon hash for PinVault.
//!
//! A single, unified Poseidon instance is used for PIN commitments and
//! nullifiers. The same [`PoseidonConfig`] drives the native sponge and
//! the in-circuit gadget, so a hash computed off-circuit always matches
//! the one enforced by the constraint system.
//!
//! ## Parameters (BN254 Scalar Field)
//! - Field: BN254 Fr (scalar field)
//! - Width: 3 (rate=2, capacity=1)
//! - Full rounds: 8
//! - Partial rounds: 57
//! - S-box: x^5
//! - Round constants: Grain LFSR (arkworks standard)
//!
//! ## Output Convention
//! All hash functions output the first element squeezed from the
//! sponge, the standard arkworks `PoseidonSponge` convention.

use ark_bn254::Fr;
use ark_crypto_primitives::sponge::{
    poseidon::{find_poseidon_ark_and_mds, PoseidonConfig, PoseidonSponge},
    CryptographicSponge,
};
use ark_ff::PrimeField;
use ark_serialize::CanonicalSerialize;
use rand::RngCore;
use std::sync::OnceLock;

static CANONICAL_CONFIG: OnceLock<PoseidonConfig<Fr>> = OnceLock::new();

/// Get the canonical Poseidon configuration.
/// Thread-safe singleton initialization.
pub fn canonical_config() -> &'static PoseidonConfig<Fr> {
    CANONICAL_CONFIG.get_or_init(|| {
        let rate = 2;
        let alpha = 5u64;
        let full_rounds = 8;
        let partial_rounds = 57;
        let field_bits = 254;

        let (ark, mds) = find_poseidon_ark_and_mds::<Fr>(
            field_bits,
            rate,
            full_rounds,
            partial_rounds,
            0, // skip_matrices
        );

        PoseidonConfig {
            full_rounds: full_rounds as usize,
            partial_rounds: partial_rounds as usize,
            alpha,
            ark,
            mds,
            rate,
            capacity: 1,
        }
    })
}

/// Hash an arbitrary number of field elements.
pub fn poseidon_hash_fields(inputs: &[Fr]) -> Fr {
    let config = canonical_config();
    let mut sponge = PoseidonSponge::new(config);
    for input in inputs {
        sponge.absorb(input);
    }
    let output: Vec<Fr> = sponge.squeeze_field_elements(1);
    output[0]
}

/// Hash two field elements. Used for PIN commitments: `H(pin, salt)`.
pub fn poseidon_hash2_fields(left: Fr, right: Fr) -> Fr {
    poseidon_hash_fields(&[left, right])
}

/// Hash three field elements. Used for nullifiers: `H(pin, salt, nonce)`.
pub fn poseidon_hash3_fields(a: Fr, b: Fr, c: Fr) -> Fr {
    poseidon_hash_fields(&[a, b, c])
}

// ============================================================================
// Byte Interface (32-byte arrays)
// ============================================================================

/// Convert field element to 32 bytes (little-endian).
pub fn fr_to_bytes(f: &Fr) -> [u8; 32] {
    let mut bytes = [0u8; 32];
    f.serialize_compressed(&mut bytes[..])
        .expect("Fr serialization failed");
    bytes
}

/// Convert 32 bytes to field element (mod order).
pub fn bytes_to_fr(bytes: &[u8; 32]) -> Fr {
    Fr::from_le_bytes_mod_order(bytes)
}

/// Compute a PIN commitment: `H(pin, salt)`.
pub fn pin_commitment(pin: &[u8; 32], salt: &[u8; 32]) -> [u8; 32] {
    let result = poseidon_hash2_fields(bytes_to_fr(pin), bytes_to_fr(salt));
    fr_to_bytes(&result)
}

/// Compute a payment nullifier: `H(pin, salt, nonce)`.
pub fn payment_nullifier(pin: &[u8; 32], salt: &[u8; 32], nonce: &[u8; 32]) -> [u8; 32] {
    let result = poseidon_hash3_fields(bytes_to_fr(pin), bytes_to_fr(salt), bytes_to_fr(nonce));
    fr_to_bytes(&result)
}

/// Sample a fresh, unpredictable salt reduced into the field.
pub fn random_salt() -> [u8; 32] {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    fr_to_bytes(&Fr::from_le_bytes_mod_order(&bytes))
}

/// Map a payment amount into the field.
pub fn amount_to_field(amount: u64) -> Fr {
    Fr::from(amount)
}

/// Recover an amount from a field element, if it fits in `u64`.
pub fn field_to_amount(f: &Fr) -> Option<u64> {
    let bytes = fr_to_bytes(f);
    if bytes[8..].iter().any(|b| *b != 0) {
        return None;
    }
    Some(u64::from_le_bytes(bytes[..8].try_into().expect("8 bytes")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_deterministic() {
        let a = Fr::from(12345u64);
        let b = Fr::from(67890u64);

        let h1 = poseidon_hash2_fields(a, b);
        let h2 = poseidon_hash2_fields(a, b);
        assert_eq!(h1, h2);

        // Order matters
        let h3 = poseidon_hash2_fields(b, a);
        assert_ne!(h1, h3);
    }

    #[test]
    fn test_commitment_hides_and_binds() {
        let pin = [0x11; 32];
        let salt = [0x22; 32];

        let c1 = pin_commitment(&pin, &salt);
        let c2 = pin_commitment(&pin, &salt);
        assert_eq!(c1, c2);

        // Different salt -> different commitment
        let c3 = pin_commitment(&pin, &[0x33; 32]);
        assert_ne!(c1, c3);

        // Different pin -> different commitment
        let c4 = pin_commitment(&[0x44; 32], &salt);
        assert_ne!(c1, c4);
    }

    #[test]
    fn test_nullifier_context_separation() {
        let pin = [0x11; 32];
        let salt = [0x22; 32];
        let nonce1 = [0x33; 32];
        let nonce2 = [0x44; 32];

        let n1 = payment_nullifier(&pin, &salt, &nonce1);
        let n2 = payment_nullifier(&pin, &salt, &nonce2);
        assert_ne!(n1, n2);

        // Same inputs -> same nullifier
        let n3 = payment_nullifier(&pin, &salt, &nonce1);
        assert_eq!(n1, n3);
    }

    #[test]
    fn test_field_roundtrip() {
        let original = Fr::from(0xdeadbeefu64);
        let bytes = fr_to_bytes(&original);
        let restored = bytes_to_fr(&bytes);
        assert_eq!(original, restored);
    }

    #[test]
    fn test_amount_roundtrip() {
        let amount = 1_234_567_890u64;
        let f = amount_to_field(amount);
        assert_eq!(field_to_amount(&f), Some(amount));

        // An arbitrary field element does not decode as an amount
        let big = poseidon_hash2_fields(Fr::from(1u64), Fr::from(2u64));
        assert_eq!(field_to_amount(&big), None);
    }

    #[test]
    fn test_random_salt_unpredictable() {
        let s1 = random_salt();
        let s2 = random_salt();
        assert_ne!(s1, s2);
    }

    proptest::proptest! {
        #[test]
        fn prop_amount_roundtrip(amount: u64) {
            let f = amount_to_field(amount);
            proptest::prop_assert_eq!(field_to_amount(&f), Some(amount));
        }

        #[test]
        fn prop_commitment_binds_to_pin(pin: [u8; 32], salt: [u8; 32], other: [u8; 32]) {
            let reduced_eq = bytes_to_fr(&pin) == bytes_to_fr(&other);
            let c1 = pin_commitment(&pin, &salt);
            let c2 = pin_commitment(&other, &salt);
            proptest::prop_assert_eq!(c1 == c2, reduced_eq);
        }
    }
}
