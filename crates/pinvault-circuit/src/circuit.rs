//! Constraint systems for PIN-commitment proofs.
//!
//! Two circuits share the canonical Poseidon instance:
//!
//! - [`PinAuthCircuit`] proves knowledge of `(pin, salt)` opening a
//!   public commitment `pin_hash = Poseidon(pin, salt)`.
//! - [`PinPaymentCircuit`] additionally binds a payment `amount` and a
//!   nullifier `Poseidon(pin, salt, nonce)` so the same proof can
//!   never authorize two settlements.
//!
//! Public input order is part of the verifying-key contract:
//! auth `[pin_hash]`, payment `[pin_hash, amount, nullifier]`.
//! Circuits stay minimal to bound proving cost; everything else
//! (amount bounds, replay, identities) is enforced by the ledger.

use crate::poseidon::{canonical_config, poseidon_hash2_fields, poseidon_hash3_fields};
use ark_bn254::Fr;
use ark_crypto_primitives::sponge::{
    constraints::CryptographicSpongeVar, poseidon::constraints::PoseidonSpongeVar,
};
use ark_r1cs_std::{fields::fp::FpVar, prelude::*};
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystemRef, SynthesisError};

/// Proves `pin_hash = Poseidon(pin, salt)` for a public `pin_hash`.
#[derive(Clone)]
pub struct PinAuthCircuit {
    // Public input
    pub pin_hash: Fr,
    // Private witnesses
    pub pin: Fr,
    pub salt: Fr,
}

impl PinAuthCircuit {
    /// Build a circuit whose public commitment matches the witnesses.
    pub fn new(pin: Fr, salt: Fr) -> Self {
        let pin_hash = poseidon_hash2_fields(pin, salt);
        Self { pin_hash, pin, salt }
    }

    pub fn public_inputs(&self) -> Vec<Fr> {
        vec![self.pin_hash]
    }
}

impl ConstraintSynthesizer<Fr> for PinAuthCircuit {
    fn generate_constraints(self, cs: ConstraintSystemRef<Fr>) -> Result<(), SynthesisError> {
        let pin_hash_var = FpVar::new_input(cs.clone(), || Ok(self.pin_hash))?;

        let pin_var = FpVar::new_witness(cs.clone(), || Ok(self.pin))?;
        let salt_var = FpVar::new_witness(cs.clone(), || Ok(self.salt))?;

        let mut sponge = PoseidonSpongeVar::new(cs, canonical_config());
        sponge.absorb(&vec![pin_var, salt_var])?;
        let computed_hash = sponge.squeeze_field_elements(1)?[0].clone();
        computed_hash.enforce_equal(&pin_hash_var)?;

        Ok(())
    }
}

/// Proves the PIN commitment opening plus nullifier correctness for a
/// payment.
#[derive(Clone)]
pub struct PinPaymentCircuit {
    // Public inputs, in verifying-key order
    pub pin_hash: Fr,
    pub amount: Fr,
    pub nullifier: Fr,
    // Private witnesses
    pub pin: Fr,
    pub salt: Fr,
    pub nonce: Fr,
}

impl PinPaymentCircuit {
    /// Build a satisfiable circuit from honest witnesses.
    pub fn new(pin: Fr, salt: Fr, nonce: Fr, amount: Fr) -> Self {
        let pin_hash = poseidon_hash2_fields(pin, salt);
        let nullifier = poseidon_hash3_fields(pin, salt, nonce);
        Self { pin_hash, amount, nullifier, pin, salt, nonce }
    }

    /// Build a circuit against an externally claimed commitment.
    ///
    /// When `pin_hash` is not `Poseidon(pin, salt)` the constraint
    /// system is unsatisfiable and the prover refuses to emit a proof.
    pub fn against_commitment(pin: Fr, salt: Fr, nonce: Fr, amount: Fr, pin_hash: Fr) -> Self {
        let nullifier = poseidon_hash3_fields(pin, salt, nonce);
        Self { pin_hash, amount, nullifier, pin, salt, nonce }
    }

    pub fn public_inputs(&self) -> Vec<Fr> {
        vec![self.pin_hash, self.amount, self.nullifier]
    }
}

impl ConstraintSynthesizer<Fr> for PinPaymentCircuit {
    fn generate_constraints(self, cs: ConstraintSystemRef<Fr>) -> Result<(), SynthesisError> {
        let pin_hash_var = FpVar::new_input(cs.clone(), || Ok(self.pin_hash))?;
        let amount_var = FpVar::new_input(cs.clone(), || Ok(self.amount))?;
        let nullifier_var = FpVar::new_input(cs.clone(), || Ok(self.nullifier))?;

        let pin_var = FpVar::new_witness(cs.clone(), || Ok(self.pin))?;
        let salt_var = FpVar::new_witness(cs.clone(), || Ok(self.salt))?;
        let nonce_var = FpVar::new_witness(cs.clone(), || Ok(self.nonce))?;

        // pin_hash = Poseidon(pin, salt)
        let mut commitment_sponge = PoseidonSpongeVar::new(cs.clone(), canonical_config());
        commitment_sponge.absorb(&vec![pin_var.clone(), salt_var.clone()])?;
        let computed_hash = commitment_sponge.squeeze_field_elements(1)?[0].clone();
        computed_hash.enforce_equal(&pin_hash_var)?;

        // nullifier = Poseidon(pin, salt, nonce)
        let mut nullifier_sponge = PoseidonSpongeVar::new(cs, canonical_config());
        nullifier_sponge.absorb(&vec![pin_var, salt_var, nonce_var])?;
        let computed_nullifier = nullifier_sponge.squeeze_field_elements(1)?[0].clone();
        computed_nullifier.enforce_equal(&nullifier_var)?;

        // amount carries no constraint of its own; it is bound into the
        // proof as a public input and range-checked by the ledger.
        let _ = amount_var;

        Ok(())
    }
}
