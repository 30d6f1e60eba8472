use crate::config::env::{apply_env_overrides, apply_process_env};
use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// The file is parsed, then environment overrides are applied, then the
/// result is validated.
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use isr_prerender::config::load_config;
///
/// let config = load_config(Path::new("isr.toml")).unwrap();
/// println!("Budget: {}ms", config.render.effective_total_timeout_ms());
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut config: Config = toml::from_str(&content)?;
    apply_process_env(&mut config)?;
    validate(&config)?;
    Ok(config)
}

/// Builds a configuration from defaults and the process environment only
///
/// Used when no configuration file is given.
pub fn load_from_env() -> Result<Config, ConfigError> {
    let mut config = Config::default();
    apply_process_env(&mut config)?;
    validate(&config)?;
    Ok(config)
}

/// Parses configuration text with an explicit environment lookup
///
/// # Arguments
///
/// * `content` - TOML text
/// * `lookup` - Resolves environment variable names to values
pub fn parse_config<F>(content: &str, lookup: F) -> Result<Config, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config: Config = toml::from_str(content)?;
    apply_env_overrides(&mut config, lookup)?;
    validate(&config)?;
    Ok(config)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Logged at startup so that operators can tell which configuration a
/// running process was started with.
///
/// # Returns
///
/// * `Ok(String)` - Hex-encoded SHA-256 hash of the file content
/// * `Err(ConfigError)` - Failed to read the file
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
