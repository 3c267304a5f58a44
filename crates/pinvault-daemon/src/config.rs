//! Daemon configuration.
//!
//! Defaults, optionally overridden by a TOML file. The file path comes
//! from the CLI or the `PINVAULT_CONFIG` environment variable.

use pinvault_types::{PinVaultError, PinVaultResult};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Address the HTTP API binds to.
    pub api_addr: SocketAddr,
    /// Inclusive per-payment amount ceiling.
    pub max_amount: u64,
    /// Hard capacity of the consumed-nullifier set.
    pub nullifier_capacity: usize,
    /// Directory holding vk.bin, pk.bin and metadata.json from the
    /// ceremony. Unset means dev mode with in-process fixture keys.
    pub keys_dir: Option<PathBuf>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            api_addr: SocketAddr::from(([127, 0, 0, 1], 8321)),
            max_amount: 1_000_000,
            nullifier_capacity: 1_000_000,
            keys_dir: None,
        }
    }
}

impl DaemonConfig {
    pub fn load(path: &Path) -> PinVaultResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            PinVaultError::Config(format!("reading {}: {e}", path.display()))
        })?;
        toml::from_str(&raw)
            .map_err(|e| PinVaultError::Config(format!("parsing {}: {e}", path.display())))
    }

    /// CLI path, then `PINVAULT_CONFIG`, then defaults.
    pub fn resolve(cli_path: Option<&Path>) -> PinVaultResult<Self> {
        if let Some(path) = cli_path {
            return Self::load(path);
        }
        if let Ok(path) = std::env::var("PINVAULT_CONFIG") {
            return Self::load(Path::new(&path));
        }
        Ok(Self::default())
    }

    pub fn validate(&self) -> PinVaultResult<()> {
        if self.max_amount == 0 {
            return Err(PinVaultError::Config("max_amount must be positive".into()));
        }
        if self.nullifier_capacity == 0 {
            return Err(PinVaultError::Config("nullifier_capacity must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = DaemonConfig::default();
        config.validate().unwrap();
        assert_eq!(config.api_addr.port(), 8321);
        assert!(config.keys_dir.is_none());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: DaemonConfig = toml::from_str("max_amount = 500").unwrap();
        assert_eq!(config.max_amount, 500);
        assert_eq!(config.api_addr.port(), 8321);
    }

    #[test]
    fn test_full_toml() {
        let config: DaemonConfig = toml::from_str(
            r#"
            api_addr = "0.0.0.0:9000"
            max_amount = 250
            nullifier_capacity = 10
            keys_dir = "/var/lib/pinvault/keys"
            "#,
        )
        .unwrap();
        assert_eq!(config.api_addr.port(), 9000);
        assert_eq!(config.nullifier_capacity, 10);
        assert_eq!(config.keys_dir.as_deref(), Some(Path::new("/var/lib/pinvault/keys")));
    }

    #[test]
    fn test_zero_bounds_rejected() {
        let config = DaemonConfig { max_amount: 0, ..DaemonConfig::default() };
        assert!(config.validate().is_err());
    }
}
