//! pinvault-daemon entry point.
//!
//! Loads configuration and key artifacts, checks that the verifying
//! key this service would use matches the one recorded for the
//! deployed on-ledger verifier, and refuses to start on a mismatch.
//! Key drift must be a deployment failure, not a stream of rejected
//! payments discovered in production.

use anyhow::{bail, Context, Result};
use ark_bn254::Bn254;
use ark_groth16::ProvingKey;
use ark_serialize::CanonicalDeserialize;
use clap::Parser;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use pinvault_circuit::{fixtures, keys, verifier};
use pinvault_daemon::api::ApiServer;
use pinvault_daemon::{DaemonConfig, Orchestrator, ProofWorker};

#[derive(Parser)]
#[command(name = "pinvault-daemon", about = "Zero-knowledge PIN payment authorization daemon")]
struct Cli {
    /// Path to a TOML config file
    #[arg(long, env = "PINVAULT_CONFIG")]
    config: Option<PathBuf>,

    /// Override the API bind address
    #[arg(long)]
    api_addr: Option<SocketAddr>,

    /// Override the key artifacts directory
    #[arg(long)]
    keys_dir: Option<PathBuf>,
}

struct LoadedKeys {
    proving_key: Arc<ProvingKey<Bn254>>,
    pvk: ark_groth16::PreparedVerifyingKey<Bn254>,
    vk_hash: String,
}

fn load_keys(keys_dir: &Path) -> Result<LoadedKeys> {
    let vk_bytes = std::fs::read(keys_dir.join("vk.bin"))
        .with_context(|| format!("reading {}/vk.bin", keys_dir.display()))?;
    let vk = verifier::vk_from_bytes(&vk_bytes).context("parsing vk.bin")?;

    let pk_bytes = std::fs::read(keys_dir.join("pk.bin"))
        .with_context(|| format!("reading {}/pk.bin", keys_dir.display()))?;
    let proving_key = ProvingKey::<Bn254>::deserialize_compressed(&pk_bytes[..])
        .context("parsing pk.bin")?;

    let metadata_raw = std::fs::read_to_string(keys_dir.join("metadata.json"))
        .with_context(|| format!("reading {}/metadata.json", keys_dir.display()))?;
    let artifacts: keys::KeyArtifacts =
        serde_json::from_str(&metadata_raw).context("parsing metadata.json")?;
    artifacts.check_compatibility()?;

    // Startup deployment check: the key this service verifies with must
    // be the one the deployment record says is on the ledger.
    let vk_hash = keys::vk_hash(&vk_bytes);
    if vk_hash != artifacts.vk_hash {
        bail!(
            "verifying key mismatch: local vk hashes to {} but the deployed key is {}; \
             refusing to start",
            vk_hash,
            artifacts.vk_hash
        );
    }
    if proving_key.vk != vk {
        bail!("pk.bin and vk.bin are from different ceremonies; refusing to start");
    }

    Ok(LoadedKeys { pvk: verifier::prepare(&vk), proving_key: Arc::new(proving_key), vk_hash })
}

fn dev_keys() -> Result<LoadedKeys> {
    warn!("no keys_dir configured, using built-in development keys");
    let setup = fixtures::trusted_setup();
    let vk_bytes = setup
        .verifying_key_bytes()
        .context("serializing dev verifying key")?;
    Ok(LoadedKeys {
        pvk: verifier::prepare(&setup.verifying_key),
        proving_key: Arc::new(setup.proving_key.clone()),
        vk_hash: keys::vk_hash(&vk_bytes),
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let mut config = DaemonConfig::resolve(cli.config.as_deref())?;
    if let Some(addr) = cli.api_addr {
        config.api_addr = addr;
    }
    if let Some(keys_dir) = cli.keys_dir {
        config.keys_dir = Some(keys_dir);
    }
    config.validate()?;

    let loaded = match &config.keys_dir {
        Some(dir) => load_keys(dir)?,
        None => dev_keys()?,
    };
    info!(vk_hash = %loaded.vk_hash, "verifying key loaded and checked");

    let orchestrator = Arc::new(Orchestrator::new(
        loaded.pvk,
        loaded.vk_hash.clone(),
        &config,
    ));
    let worker = Arc::new(ProofWorker::new(loaded.proving_key));

    let server = ApiServer::new(config.api_addr, orchestrator, worker);
    server.start().await?;

    tokio::signal::ctrl_c().await.context("waiting for shutdown signal")?;
    info!("shutdown signal received");
    server.stop().await;
    Ok(())
}
