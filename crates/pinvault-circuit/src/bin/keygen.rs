//! Key generation and ceremony tooling for the payment circuit.
//!
//! Drives the multiparty setup from the command line: initialize the
//! CRS, apply contributions on air-gapped machines, verify transcripts,
//! and finalize the deployment artifacts (verifying key binary, the
//! structured JSON export, the rendered on-ledger verifier source, and
//! metadata with the BLAKE3 key hash).

use anyhow::{bail, Context, Result};
use ark_bn254::Bn254;
use ark_groth16::ProvingKey;
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};

use pinvault_circuit::keys::{
    render_contract_verifier, KeyArtifacts, VerifyingKeyData, CIRCUIT_VERSION, PAYMENT_CIRCUIT,
};
use pinvault_circuit::setup::{
    ceremony_contribute, ceremony_init, ceremony_init_with_seed, verify_transcript,
    CeremonyTranscript, ContributionReceipt, TrustedSetup,
};
use pinvault_circuit::verifier;

/// Compressed receipt size: one G1 point plus two G2 points.
const RECEIPT_LEN: usize = 160;

#[derive(Parser)]
#[command(name = "pinvault-keygen", about = "Trusted setup tooling for the PIN payment circuit")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Initialize a new ceremony and write the starting proving key
    Init {
        /// Output path for the proving key
        #[arg(long, default_value = "ceremony.pk")]
        out: PathBuf,
        /// Deterministic seed (omit for OS entropy)
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Apply one contribution to a ceremony proving key
    Contribute {
        /// Proving key to rerandomize (overwritten in place)
        #[arg(long, default_value = "ceremony.pk")]
        pk: PathBuf,
        /// Transcript file to append the receipt to
        #[arg(long, default_value = "ceremony.transcript")]
        transcript: PathBuf,
    },
    /// Verify a ceremony transcript against a proving key
    Verify {
        #[arg(long, default_value = "ceremony.pk")]
        pk: PathBuf,
        #[arg(long, default_value = "ceremony.transcript")]
        transcript: PathBuf,
    },
    /// Finalize the ceremony and write deployment artifacts
    Finalize {
        #[arg(long, default_value = "ceremony.pk")]
        pk: PathBuf,
        #[arg(long, default_value = "ceremony.transcript")]
        transcript: PathBuf,
        /// Directory for vk.bin, vk.json, verifier.rs and metadata.json
        #[arg(long, default_value = "keys")]
        out_dir: PathBuf,
    },
    /// Print circuit and key information for a verifying key file
    Info {
        #[arg(long, default_value = "keys/vk.bin")]
        vk: PathBuf,
    },
}

fn load_pk(path: &Path) -> Result<ProvingKey<Bn254>> {
    let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    ProvingKey::<Bn254>::deserialize_compressed(&bytes[..])
        .with_context(|| format!("{} is not a valid proving key", path.display()))
}

fn store_pk(path: &Path, pk: &ProvingKey<Bn254>) -> Result<()> {
    let mut bytes = Vec::new();
    pk.serialize_compressed(&mut bytes)
        .context("serializing proving key")?;
    fs::write(path, bytes).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

fn load_transcript(path: &Path) -> Result<CeremonyTranscript> {
    if !path.exists() {
        return Ok(CeremonyTranscript::default());
    }
    let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    if bytes.len() % RECEIPT_LEN != 0 {
        bail!("{} is truncated", path.display());
    }
    let mut transcript = CeremonyTranscript::default();
    for chunk in bytes.chunks(RECEIPT_LEN) {
        let receipt = ContributionReceipt::from_bytes(chunk)
            .with_context(|| format!("{} holds a malformed receipt", path.display()))?;
        transcript.push(receipt);
    }
    Ok(transcript)
}

fn append_receipt(path: &Path, receipt: &ContributionReceipt) -> Result<()> {
    let mut bytes = if path.exists() {
        fs::read(path).with_context(|| format!("reading {}", path.display()))?
    } else {
        Vec::new()
    };
    bytes.extend(receipt.to_bytes()?);
    fs::write(path, bytes).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Init { out, seed } => {
            let pk = match seed {
                Some(seed) => ceremony_init_with_seed(seed)?,
                None => ceremony_init()?,
            };
            store_pk(&out, &pk)?;
            println!("ceremony initialized: {}", out.display());
            println!("circuit: {PAYMENT_CIRCUIT} v{CIRCUIT_VERSION}");
        }

        Command::Contribute { pk: pk_path, transcript } => {
            let pk = load_pk(&pk_path)?;
            let (pk, receipt) = ceremony_contribute(pk);
            store_pk(&pk_path, &pk)?;
            append_receipt(&transcript, &receipt)?;
            println!("contribution applied to {}", pk_path.display());
            println!("receipt appended to {}", transcript.display());
        }

        Command::Verify { pk: pk_path, transcript } => {
            let pk = load_pk(&pk_path)?;
            let transcript = load_transcript(&transcript)?;
            if transcript.is_empty() {
                bail!("transcript is empty; at least one contribution is required");
            }
            if !verify_transcript(&transcript) {
                bail!("transcript verification FAILED");
            }
            match transcript.receipts.last() {
                Some(last) if last.new_delta_g2 == pk.vk.delta_g2 => {}
                _ => bail!("transcript head does not match the proving key delta"),
            }
            println!(
                "transcript OK: {} contribution(s), head matches proving key",
                transcript.len()
            );
        }

        Command::Finalize { pk: pk_path, transcript, out_dir } => {
            let pk = load_pk(&pk_path)?;
            let transcript = load_transcript(&transcript)?;
            if transcript.is_empty() {
                bail!("refusing to finalize without contributions");
            }
            let setup = TrustedSetup::finalize(pk, &transcript)?;

            fs::create_dir_all(&out_dir)
                .with_context(|| format!("creating {}", out_dir.display()))?;

            let vk_bytes = setup.verifying_key_bytes()?;
            fs::write(out_dir.join("vk.bin"), &vk_bytes).context("writing vk.bin")?;
            fs::write(out_dir.join("pk.bin"), setup.proving_key_bytes()?)
                .context("writing pk.bin")?;

            let data = VerifyingKeyData::from_vk(&setup.verifying_key)?;
            fs::write(out_dir.join("vk.json"), serde_json::to_string_pretty(&data)?)
                .context("writing vk.json")?;
            fs::write(out_dir.join("verifier.rs"), render_contract_verifier(&data))
                .context("writing verifier.rs")?;

            let artifacts = KeyArtifacts::new(&setup.verifying_key)?;
            fs::write(
                out_dir.join("metadata.json"),
                serde_json::to_string_pretty(&artifacts)?,
            )
            .context("writing metadata.json")?;

            println!("finalized {} contribution(s)", transcript.len());
            println!("vk_hash: {}", artifacts.vk_hash);
            println!("artifacts written to {}", out_dir.display());
        }

        Command::Info { vk } => {
            let bytes = fs::read(&vk).with_context(|| format!("reading {}", vk.display()))?;
            let key = verifier::vk_from_bytes(&bytes)?;
            let data = VerifyingKeyData::from_vk(&key)?;
            println!("circuit: {PAYMENT_CIRCUIT} v{CIRCUIT_VERSION}");
            println!("public signals: {}", data.public_signal_count());
            println!("vk_hash: {}", data.vk_hash);
        }
    }

    Ok(())
}
