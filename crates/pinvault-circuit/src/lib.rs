//! Groth16 circuits and key pipeline for PIN-commitment payment proofs.
//!
//! Layout mirrors the proof lifecycle: [`poseidon`] provides the one
//! algebraic hash every component shares, [`circuit`] the constraint
//! systems, [`setup`] the multi-party key ceremony, [`prover`] witness
//! construction and proof emission, [`verifier`] the single pairing
//! check both execution environments call, and [`keys`] the versioned
//! artifacts that tie a deployment together.

pub mod circuit;
pub mod fixtures;
pub mod keys;
pub mod poseidon;
pub mod prover;
pub mod setup;
pub mod verifier;
