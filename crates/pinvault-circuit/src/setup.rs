//! Multiparty trusted setup for the payment circuit (Groth16, BN254).
//!
//! Phase 2 delta-rerandomization: each participant samples a random
//! scalar `d`, rerandomizes the proving key's delta-dependent terms,
//! and appends a proof-of-knowledge receipt to the public transcript.
//! Forging proofs requires compromising *every* contributor: one honest
//! participant who discards their `d` keeps the combined toxic waste
//! unrecoverable.
//!
//! Protocol:
//! 1. **Init**: generate the initial CRS via `circuit_specific_setup`
//! 2. **Contribute**: sample `d`, multiply `delta_g2 *= d`, divide
//!    `h_query`/`l_query` by `d`, emit a [`ContributionReceipt`]
//! 3. **Verify**: pairing check per receipt plus transcript chaining
//! 4. **Finalize**: extract the proving and verifying keys

use crate::circuit::PinPaymentCircuit;
use ark_bn254::{Bn254, Fr, G1Affine, G1Projective, G2Affine, G2Projective};
use ark_ec::{pairing::Pairing, AffineRepr, CurveGroup, Group};
use ark_ff::{Field, Zero};
use ark_groth16::{Groth16, ProvingKey, VerifyingKey};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use ark_snark::SNARK;
use ark_std::{
    rand::{rngs::StdRng, SeedableRng},
    UniformRand,
};
use pinvault_types::{PinVaultError, PinVaultResult};

/// Proof-of-knowledge for a single ceremony contribution.
#[derive(Clone, Debug, PartialEq)]
pub struct ContributionReceipt {
    /// `d * G1::generator()`, proving knowledge of the scalar `d`
    pub d_g1: G1Affine,
    /// `delta_g2` *before* this contribution
    pub old_delta_g2: G2Affine,
    /// `delta_g2` *after* this contribution
    pub new_delta_g2: G2Affine,
}

impl ContributionReceipt {
    pub fn to_bytes(&self) -> PinVaultResult<Vec<u8>> {
        let mut buf = Vec::new();
        self.d_g1
            .serialize_compressed(&mut buf)
            .and_then(|_| self.old_delta_g2.serialize_compressed(&mut buf))
            .and_then(|_| self.new_delta_g2.serialize_compressed(&mut buf))
            .map_err(|e| PinVaultError::Serialization(format!("receipt: {e}")))?;
        Ok(buf)
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let mut cursor = bytes;
        let d_g1 = G1Affine::deserialize_compressed(&mut cursor).ok()?;
        let old_delta_g2 = G2Affine::deserialize_compressed(&mut cursor).ok()?;
        let new_delta_g2 = G2Affine::deserialize_compressed(&mut cursor).ok()?;
        Some(Self { d_g1, old_delta_g2, new_delta_g2 })
    }
}

/// The ever-growing public record of a ceremony.
#[derive(Clone, Debug, Default)]
pub struct CeremonyTranscript {
    pub receipts: Vec<ContributionReceipt>,
}

impl CeremonyTranscript {
    pub fn push(&mut self, receipt: ContributionReceipt) {
        self.receipts.push(receipt);
    }

    pub fn len(&self) -> usize {
        self.receipts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receipts.is_empty()
    }
}

/// Finalized output of the setup pipeline for one circuit.
pub struct TrustedSetup {
    pub proving_key: ProvingKey<Bn254>,
    pub verifying_key: VerifyingKey<Bn254>,
}

impl TrustedSetup {
    /// Bind a finalized ceremony proving key to its verifying key.
    ///
    /// The transcript must verify against the proving key's current
    /// delta; mismatched or tampered transcripts are rejected here so a
    /// bad ceremony never yields usable keys.
    pub fn finalize(pk: ProvingKey<Bn254>, transcript: &CeremonyTranscript) -> PinVaultResult<Self> {
        if !verify_transcript(transcript) {
            return Err(PinVaultError::Crypto("ceremony transcript rejected".into()));
        }
        if let Some(last) = transcript.receipts.last() {
            if last.new_delta_g2 != pk.vk.delta_g2 {
                return Err(PinVaultError::Crypto(
                    "transcript head does not match proving key delta".into(),
                ));
            }
        }
        let vk = pk.vk.clone();
        Ok(Self { proving_key: pk, verifying_key: vk })
    }

    pub fn verifying_key_bytes(&self) -> PinVaultResult<Vec<u8>> {
        let mut bytes = Vec::new();
        self.verifying_key
            .serialize_compressed(&mut bytes)
            .map_err(|e| PinVaultError::Serialization(format!("vk: {e}")))?;
        Ok(bytes)
    }

    pub fn proving_key_bytes(&self) -> PinVaultResult<Vec<u8>> {
        let mut bytes = Vec::new();
        self.proving_key
            .serialize_compressed(&mut bytes)
            .map_err(|e| PinVaultError::Serialization(format!("pk: {e}")))?;
        Ok(bytes)
    }
}

/// The dummy payment circuit used to shape the constraint system
/// during setup. Witness values are irrelevant; only the constraint
/// structure matters.
fn setup_circuit() -> PinPaymentCircuit {
    PinPaymentCircuit::new(Fr::from(1u64), Fr::from(1u64), Fr::from(1u64), Fr::from(1u64))
}

/// Initialize a ceremony with high-entropy randomness.
pub fn ceremony_init() -> PinVaultResult<ProvingKey<Bn254>> {
    ceremony_init_with_seed(entropy_seed())
}

/// Initialize a ceremony with a deterministic seed (testing and
/// reproducibility checks).
pub fn ceremony_init_with_seed(seed: u64) -> PinVaultResult<ProvingKey<Bn254>> {
    let mut rng = StdRng::seed_from_u64(seed);
    let (pk, _vk) = Groth16::<Bn254>::circuit_specific_setup(setup_circuit(), &mut rng)
        .map_err(|e| PinVaultError::Crypto(format!("setup failed: {e}")))?;
    Ok(pk)
}

fn entropy_seed() -> u64 {
    let mut rng = rand::thread_rng();
    use rand::RngCore;
    rng.next_u64()
}

/// Apply one contribution: rerandomize the delta-dependent terms.
pub fn ceremony_contribute(pk: ProvingKey<Bn254>) -> (ProvingKey<Bn254>, ContributionReceipt) {
    let mut rng = StdRng::seed_from_u64(entropy_seed());
    let mut d = Fr::rand(&mut rng);
    while d.is_zero() {
        d = Fr::rand(&mut rng);
    }
    ceremony_contribute_with_scalar(pk, d)
}

/// Deterministic contribution. `d` must be nonzero.
pub fn ceremony_contribute_with_scalar(
    mut pk: ProvingKey<Bn254>,
    d: Fr,
) -> (ProvingKey<Bn254>, ContributionReceipt) {
    let d_inv = d.inverse().expect("d must be nonzero");

    let old_delta_g2 = pk.vk.delta_g2;

    // delta_g2 *= d
    let new_delta_g2: G2Affine = (G2Projective::from(pk.vk.delta_g2) * d).into_affine();
    pk.vk.delta_g2 = new_delta_g2;

    // delta_g1 *= d  (proving key also stores delta_g1)
    pk.delta_g1 = (G1Projective::from(pk.delta_g1) * d).into_affine();

    // h_query[i] *= d_inv  (these contain .../delta terms)
    for h in pk.h_query.iter_mut() {
        *h = (G1Projective::from(*h) * d_inv).into_affine();
    }

    // l_query[i] *= d_inv
    for l in pk.l_query.iter_mut() {
        *l = (G1Projective::from(*l) * d_inv).into_affine();
    }

    let d_g1: G1Affine = (G1Projective::generator() * d).into_affine();

    let receipt = ContributionReceipt { d_g1, old_delta_g2, new_delta_g2 };
    (pk, receipt)
}

/// Verify one contribution receipt via pairing check:
///   `e(d_g1, old_delta_g2) == e(G1::gen, new_delta_g2)`
pub fn verify_contribution(receipt: &ContributionReceipt) -> bool {
    let lhs = Bn254::pairing(receipt.d_g1, receipt.old_delta_g2);
    let rhs = Bn254::pairing(G1Affine::generator(), receipt.new_delta_g2);
    lhs == rhs
}

/// Verify a full transcript: every receipt checks individually and
/// each receipt's `old_delta_g2` equals the previous `new_delta_g2`.
pub fn verify_transcript(transcript: &CeremonyTranscript) -> bool {
    for (i, receipt) in transcript.receipts.iter().enumerate() {
        if !verify_contribution(receipt) {
            return false;
        }
        if i > 0 && transcript.receipts[i - 1].new_delta_g2 != receipt.old_delta_g2 {
            return false;
        }
    }
    true
}
