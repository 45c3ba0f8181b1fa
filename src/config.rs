use std::collections::HashMap;
use thiserror::Error;

use crate::ledger::emulator::DEFAULT_BLOCK_MS;
use crate::utils::Network;

#[derive(Debug, Clone)]
pub struct Config {
    /// Kupo endpoint used by `--kupo`; scenarios never need it.
    pub kupo_url: Option<String>,
    pub manifest_path: String,
    pub network: Network,
    pub emulator_block_ms: u64,
    /// Emulator genesis time; `None` means the wall clock.
    pub emulator_start_ms: Option<u64>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

fn parse_u64(
    env_map: &HashMap<String, String>,
    key: &str,
    default: &str,
) -> Result<u64, ConfigError> {
    env_map
        .get(key)
        .map(|s| s.as_str())
        .unwrap_or(default)
        .parse::<u64>()
        .map_err(|_| ConfigError::InvalidValue(key.to_string(), "must be a valid u64".to_string()))
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let kupo_url = env_map
            .get("KUPO_URL")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let manifest_path = env_map
            .get("PLUTUS_MANIFEST")
            .cloned()
            .unwrap_or_else(|| "plutus.json".to_string());

        let network = match env_map
            .get("NETWORK")
            .map(|s| s.as_str())
            .unwrap_or("testnet")
        {
            "mainnet" => Network::Mainnet,
            "testnet" => Network::Testnet,
            other => {
                return Err(ConfigError::InvalidValue(
                    "NETWORK".to_string(),
                    format!("must be mainnet or testnet, got {}", other),
                ))
            }
        };

        let emulator_block_ms = parse_u64(&env_map, "EMULATOR_BLOCK_MS", "20000")?;
        if emulator_block_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "EMULATOR_BLOCK_MS".to_string(),
                "must be positive".to_string(),
            ));
        }

        let emulator_start_ms = match parse_u64(&env_map, "EMULATOR_START_MS", "0")? {
            0 => None,
            ms => Some(ms),
        };

        Ok(Config {
            kupo_url,
            manifest_path,
            network,
            emulator_block_ms,
            emulator_start_ms,
        })
    }

    /// The Kupo URL, required once a command actually talks to Kupo.
    pub fn require_kupo_url(&self) -> Result<&str, ConfigError> {
        self.kupo_url
            .as_deref()
            .ok_or_else(|| ConfigError::MissingEnv("KUPO_URL".to_string()))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            kupo_url: None,
            manifest_path: "plutus.json".to_string(),
            network: Network::Testnet,
            emulator_block_ms: DEFAULT_BLOCK_MS,
            emulator_start_ms: None,
        }
    }
}
