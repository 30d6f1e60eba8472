//! Environment variable overrides
//!
//! Overrides are applied after the TOML file is parsed and before validation,
//! so the process environment always wins over the file.

use crate::config::types::Config;
use crate::ConfigError;
use std::str::FromStr;

pub const ENV_TOTAL_TIMEOUT_MS: &str = "ISR_TOTAL_TIMEOUT_MS";
pub const ENV_CONSTRAINED: &str = "ISR_CONSTRAINED";
pub const ENV_MAX_WORKERS: &str = "ISR_MAX_WORKERS";
pub const ENV_DISABLE_COMPRESS: &str = "ISR_DISABLE_COMPRESS";
pub const ENV_DISABLE_DEEP_OPTIMIZE: &str = "ISR_DISABLE_DEEP_OPTIMIZE";
pub const ENV_DISABLE_OPTIMIZE: &str = "ISR_DISABLE_OPTIMIZE";
pub const ENV_NOT_FOUND_ID: &str = "ISR_NOT_FOUND_ID";
pub const ENV_CRAWL_ENDPOINT: &str = "ISR_CRAWL_ENDPOINT";
pub const ENV_CRAWL_SECRET_KEY: &str = "ISR_CRAWL_SECRET_KEY";
pub const ENV_CACHE_PATH: &str = "ISR_CACHE_PATH";

/// Applies overrides from the process environment
pub fn apply_process_env(config: &mut Config) -> Result<(), ConfigError> {
    apply_env_overrides(config, |name| std::env::var(name).ok())
}

/// Applies overrides using `lookup` to resolve variable names
///
/// Taking the lookup as a closure keeps tests independent of the real
/// process environment.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(ms) = parse_var::<u64, _>(&lookup, ENV_TOTAL_TIMEOUT_MS)? {
        config.render.total_timeout_ms = Some(ms);
    }
    if let Some(flag) = parse_flag(&lookup, ENV_CONSTRAINED)? {
        config.render.constrained = flag;
    }
    if let Some(id) = lookup(ENV_NOT_FOUND_ID) {
        config.render.not_found_id = id;
    }

    if let Some(workers) = parse_var::<usize, _>(&lookup, ENV_MAX_WORKERS)? {
        config.optimize.max_workers = workers;
    }
    if let Some(flag) = parse_flag(&lookup, ENV_DISABLE_COMPRESS)? {
        config.optimize.disable_compress = flag;
    }
    if let Some(flag) = parse_flag(&lookup, ENV_DISABLE_DEEP_OPTIMIZE)? {
        config.optimize.disable_deep_optimize = flag;
    }
    if let Some(flag) = parse_flag(&lookup, ENV_DISABLE_OPTIMIZE)? {
        config.optimize.disable_optimize = flag;
    }

    if let Some(endpoint) = lookup(ENV_CRAWL_ENDPOINT) {
        config.crawl.endpoint = Some(endpoint).filter(|e| !e.trim().is_empty());
    }
    if let Some(key) = lookup(ENV_CRAWL_SECRET_KEY) {
        config.crawl.secret_key = Some(key).filter(|k| !k.is_empty());
    }

    if let Some(path) = lookup(ENV_CACHE_PATH) {
        config.cache.database_path = path;
    }

    Ok(())
}

fn parse_var<T, F>(lookup: &F, name: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv {
                name: name.to_string(),
                value: raw,
            }),
    }
}

fn parse_flag<F>(lookup: &F, name: &str) -> Result<Option<bool>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(name) else {
        return Ok(None);
    };

    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(Some(true)),
        "0" | "false" | "no" | "off" | "" => Ok(Some(false)),
        _ => Err(ConfigError::InvalidEnv {
            name: name.to_string(),
            value: raw,
        }),
    }
}
