use super::schemas::Config;
/// Configuration utilities - loading, validation, saving and key parsing
///
/// There is no global configuration instance. `main.rs` loads one `Config`
/// and hands sections to the components it builds.
use solana_sdk::signature::Keypair;
use std::path::Path;

use crate::errors::ConfigurationError;
use crate::logger::{self, LogTag};

/// Default configuration file path
pub const CONFIG_FILE_PATH: &str = "data/config.toml";

/// Load configuration from a TOML file, falling back to defaults when it does not exist
pub fn load_config_from_path(path: &str) -> Result<Config, ConfigurationError> {
    if !Path::new(path).exists() {
        logger::warning(
            LogTag::Config,
            &format!("Config file '{}' not found, using default values", path),
        );
        return Ok(Config::default());
    }

    let contents = std::fs::read_to_string(path).map_err(|e| ConfigurationError::LoadFailed {
        path: path.to_string(),
        error: e.to_string(),
    })?;

    toml::from_str::<Config>(&contents).map_err(|e| ConfigurationError::LoadFailed {
        path: path.to_string(),
        error: e.to_string(),
    })
}

/// Write the configuration to disk, creating the parent directory if needed
pub fn save_config(config: &Config, path: &str) -> Result<(), ConfigurationError> {
    let config_str =
        toml::to_string_pretty(config).map_err(|e| ConfigurationError::LoadFailed {
            path: path.to_string(),
            error: format!("Failed to serialize config: {}", e),
        })?;

    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigurationError::LoadFailed {
                path: path.to_string(),
                error: e.to_string(),
            })?;
        }
    }

    std::fs::write(path, config_str).map_err(|e| ConfigurationError::LoadFailed {
        path: path.to_string(),
        error: e.to_string(),
    })
}

impl Config {
    /// Startup validation. A failure here is fatal.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.rpc.url.trim().is_empty() {
            return Err(ConfigurationError::MissingConfig {
                field: "rpc.url".to_string(),
            });
        }

        if !self.swaps.dry_run && self.wallet.private_key.trim().is_empty() {
            return Err(ConfigurationError::MissingConfig {
                field: "wallet.private_key".to_string(),
            });
        }

        match self.swaps.router.as_str() {
            "trade_local" if self.swaps.trade_local_url.trim().is_empty() => {
                return Err(ConfigurationError::MissingConfig {
                    field: "swaps.trade_local_url".to_string(),
                });
            }
            "aggregator" if self.swaps.aggregator_swap_url.trim().is_empty() => {
                return Err(ConfigurationError::MissingConfig {
                    field: "swaps.aggregator_swap_url".to_string(),
                });
            }
            "trade_local" | "aggregator" => {}
            other => {
                return Err(ConfigurationError::InvalidConfig {
                    field: "swaps.router".to_string(),
                    reason: format!("unknown router '{}'", other),
                });
            }
        }

        if self.strategy.min_trade_sol <= 0.0
            || self.strategy.min_trade_sol > self.strategy.max_trade_sol
        {
            return Err(ConfigurationError::InvalidConfig {
                field: "strategy.min_trade_sol".to_string(),
                reason: "must be > 0 and <= strategy.max_trade_sol".to_string(),
            });
        }

        if self.pricing.failure_threshold == 0 {
            return Err(ConfigurationError::InvalidConfig {
                field: "pricing.failure_threshold".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(())
    }

    /// Parse the configured signing key
    pub fn wallet_keypair(&self) -> Result<Keypair, ConfigurationError> {
        parse_private_key(&self.wallet.private_key)
    }
}

/// Parse a private key in base58 or `[1,2,3,...]` array format
pub fn parse_private_key(private_key: &str) -> Result<Keypair, ConfigurationError> {
    let private_key = private_key.trim();
    if private_key.is_empty() {
        return Err(ConfigurationError::MissingConfig {
            field: "wallet.private_key".to_string(),
        });
    }

    let bytes = if private_key.starts_with('[') && private_key.ends_with(']') {
        private_key
            .trim_start_matches('[')
            .trim_end_matches(']')
            .split(',')
            .map(|s| s.trim().parse::<u8>())
            .collect::<Result<Vec<u8>, _>>()
            .map_err(|e| ConfigurationError::InvalidPrivateKey {
                error: format!("Failed to parse private key array: {}", e),
            })?
    } else {
        bs58::decode(private_key)
            .into_vec()
            .map_err(|e| ConfigurationError::InvalidPrivateKey {
                error: format!("Failed to decode base58 private key: {}", e),
            })?
    };

    if bytes.len() != 64 {
        return Err(ConfigurationError::InvalidPrivateKey {
            error: format!(
                "Invalid private key length: expected 64 bytes, got {}",
                bytes.len()
            ),
        });
    }

    Keypair::try_from(bytes.as_slice()).map_err(|e| ConfigurationError::InvalidPrivateKey {
        error: e.to_string(),
    })
}
