//! Versioned key artifacts binding one circuit to one deployment.
//!
//! A deployment ships: the proving key (secret-handling artifact, held
//! only by provers), the verifying key in binary and structured form,
//! a BLAKE3 hash of the verifying key, and the generated on-ledger
//! verifier source rendered mechanically from the key. The hash is
//! compared at daemon startup against the contract's deployed key;
//! a mismatch is a deployment error, not something to discover through
//! failing verifications.

use ark_bn254::Bn254;
use ark_groth16::VerifyingKey;
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use pinvault_types::{PinVaultError, PinVaultResult};
use serde::{Deserialize, Serialize};

/// Name/version pair identifying which constraint system a key fits.
/// Keys are only compatible with the exact circuit version that
/// produced them.
pub const PAYMENT_CIRCUIT: &str = "pin-payment";
pub const CIRCUIT_VERSION: &str = "1.0.0";

/// BLAKE3 hash of the compressed verifying key, hex-encoded.
pub fn vk_hash(vk_bytes: &[u8]) -> String {
    hex::encode(blake3::hash(vk_bytes).as_bytes())
}

/// Structured verifying-key export: one hex field per curve point, so
/// the key can be embedded as data in either execution environment and
/// diffed by eye.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VerifyingKeyData {
    pub circuit: String,
    pub version: String,
    pub alpha_g1: String,
    pub beta_g2: String,
    pub gamma_g2: String,
    pub delta_g2: String,
    pub gamma_abc_g1: Vec<String>,
    pub vk_hash: String,
}

fn point_hex<P: CanonicalSerialize>(point: &P) -> PinVaultResult<String> {
    let mut buf = Vec::new();
    point
        .serialize_compressed(&mut buf)
        .map_err(|e| PinVaultError::Serialization(format!("curve point: {e}")))?;
    Ok(hex::encode(buf))
}

fn point_from_hex<P: CanonicalDeserialize>(s: &str) -> PinVaultResult<P> {
    let bytes = hex::decode(s)
        .map_err(|_| PinVaultError::Validation("curve point is not valid hex".into()))?;
    P::deserialize_compressed(&bytes[..])
        .map_err(|_| PinVaultError::Validation("malformed curve point".into()))
}

impl VerifyingKeyData {
    pub fn from_vk(vk: &VerifyingKey<Bn254>) -> PinVaultResult<Self> {
        let mut vk_bytes = Vec::new();
        vk.serialize_compressed(&mut vk_bytes)
            .map_err(|e| PinVaultError::Serialization(format!("vk: {e}")))?;

        Ok(Self {
            circuit: PAYMENT_CIRCUIT.to_string(),
            version: CIRCUIT_VERSION.to_string(),
            alpha_g1: point_hex(&vk.alpha_g1)?,
            beta_g2: point_hex(&vk.beta_g2)?,
            gamma_g2: point_hex(&vk.gamma_g2)?,
            delta_g2: point_hex(&vk.delta_g2)?,
            gamma_abc_g1: vk
                .gamma_abc_g1
                .iter()
                .map(point_hex)
                .collect::<PinVaultResult<Vec<_>>>()?,
            vk_hash: vk_hash(&vk_bytes),
        })
    }

    pub fn to_vk(&self) -> PinVaultResult<VerifyingKey<Bn254>> {
        Ok(VerifyingKey {
            alpha_g1: point_from_hex(&self.alpha_g1)?,
            beta_g2: point_from_hex(&self.beta_g2)?,
            gamma_g2: point_from_hex(&self.gamma_g2)?,
            delta_g2: point_from_hex(&self.delta_g2)?,
            gamma_abc_g1: self
                .gamma_abc_g1
                .iter()
                .map(|s| point_from_hex(s))
                .collect::<PinVaultResult<Vec<_>>>()?,
        })
    }

    /// Number of public signals this key expects.
    pub fn public_signal_count(&self) -> usize {
        self.gamma_abc_g1.len().saturating_sub(1)
    }
}

/// Everything a deployment needs, versioned together.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KeyArtifacts {
    pub circuit: String,
    pub version: String,
    pub vk: VerifyingKeyData,
    pub vk_hash: String,
    pub generated_at: String,
}

impl KeyArtifacts {
    pub fn new(vk: &VerifyingKey<Bn254>) -> PinVaultResult<Self> {
        let data = VerifyingKeyData::from_vk(vk)?;
        let hash = data.vk_hash.clone();
        Ok(Self {
            circuit: PAYMENT_CIRCUIT.to_string(),
            version: CIRCUIT_VERSION.to_string(),
            vk: data,
            vk_hash: hash,
            generated_at: chrono::Utc::now().to_rfc3339(),
        })
    }

    /// Reject artifacts generated for a different circuit version.
    /// This is the documented compatibility contract between a key
    /// bundle and the binaries that embed it.
    pub fn check_compatibility(&self) -> PinVaultResult<()> {
        if self.circuit != PAYMENT_CIRCUIT || self.version != CIRCUIT_VERSION {
            return Err(PinVaultError::Config(format!(
                "key artifacts are for circuit {}/{}, this build expects {}/{}",
                self.circuit, self.version, PAYMENT_CIRCUIT, CIRCUIT_VERSION
            )));
        }
        Ok(())
    }
}

/// Render on-ledger verifier source from a verifying key.
///
/// The contract side embeds its key as constants; this keeps that
/// embedding mechanical so the deployed key can never be hand-edited
/// out of sync with the artifacts.
pub fn render_contract_verifier(data: &VerifyingKeyData) -> String {
    let mut out = String::new();
    out.push_str("// Generated by pinvault-keygen. Do not edit.\n");
    out.push_str(&format!(
        "// Circuit: {} v{}  vk_hash: {}\n\n",
        data.circuit, data.version, data.vk_hash
    ));
    out.push_str(&format!("pub const VK_HASH: &str = \"{}\";\n", data.vk_hash));
    out.push_str(&format!("pub const ALPHA_G1: &str = \"{}\";\n", data.alpha_g1));
    out.push_str(&format!("pub const BETA_G2: &str = \"{}\";\n", data.beta_g2));
    out.push_str(&format!("pub const GAMMA_G2: &str = \"{}\";\n", data.gamma_g2));
    out.push_str(&format!("pub const DELTA_G2: &str = \"{}\";\n", data.delta_g2));
    out.push_str(&format!(
        "pub const GAMMA_ABC_G1: [&str; {}] = [\n",
        data.gamma_abc_g1.len()
    ));
    for point in &data.gamma_abc_g1 {
        out.push_str(&format!("    \"{point}\",\n"));
    }
    out.push_str("];\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    #[test]
    fn test_structured_vk_roundtrip() {
        let vk = &fixtures::trusted_setup().verifying_key;

        let data = VerifyingKeyData::from_vk(vk).unwrap();
        assert_eq!(data.public_signal_count(), 3);

        let restored = data.to_vk().unwrap();
        assert_eq!(*vk, restored);
    }

    #[test]
    fn test_vk_hash_stable() {
        let setup = fixtures::trusted_setup();
        let bytes = setup.verifying_key_bytes().unwrap();

        let h1 = vk_hash(&bytes);
        let h2 = vk_hash(&bytes);
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64);

        // Any byte flip changes the hash
        let mut flipped = bytes.clone();
        flipped[0] ^= 0x01;
        assert_ne!(vk_hash(&flipped), h1);
    }

    #[test]
    fn test_artifacts_compatibility() {
        let setup = fixtures::trusted_setup();
        let artifacts = KeyArtifacts::new(&setup.verifying_key).unwrap();
        artifacts.check_compatibility().unwrap();

        let mut wrong = artifacts.clone();
        wrong.version = "0.0.1".into();
        assert!(wrong.check_compatibility().is_err());
    }

    #[test]
    fn test_rendered_contract_source_carries_key() {
        let setup = fixtures::trusted_setup();
        let data = VerifyingKeyData::from_vk(&setup.verifying_key).unwrap();
        let source = render_contract_verifier(&data);

        assert!(source.contains(&data.vk_hash));
        assert!(source.contains(&data.alpha_g1));
        for point in &data.gamma_abc_g1 {
            assert!(source.contains(point));
        }
    }
}
