use crate::config::types::Config;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    validate(&config)?;
    Ok(config)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Used to detect configuration changes between service restarts.
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.storage.database_path.trim().is_empty() {
        return Err(ConfigError::Validation(
            "storage.database-path must not be empty".to_string(),
        ));
    }
    if config.crawler.rps_per_host == 0 {
        return Err(ConfigError::Validation(
            "crawler.rps-per-host must be at least 1".to_string(),
        ));
    }
    if config.crawler.rps_burst == 0 {
        return Err(ConfigError::Validation(
            "crawler.rps-burst must be at least 1".to_string(),
        ));
    }
    if config.crawler.max_html_bytes == 0 {
        return Err(ConfigError::Validation(
            "crawler.max-html-bytes must be at least 1".to_string(),
        ));
    }
    if config.crawler.fetch_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "crawler.fetch-timeout-secs must be at least 1".to_string(),
        ));
    }
    Ok(())
}
