use crate::config::types::{CacheConfig, Config, CrawlConfig, OptimizeConfig, RenderConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_render_config(&config.render)?;
    validate_crawl_config(&config.crawl)?;
    validate_optimize_config(&config.optimize)?;
    validate_cache_config(&config.cache)?;
    Ok(())
}

/// Validates budget, sentinel and settle settings
fn validate_render_config(config: &RenderConfig) -> Result<(), ConfigError> {
    let total = config.effective_total_timeout_ms();
    if total <= config.fixed_gap_ms {
        return Err(ConfigError::Validation(format!(
            "total timeout ({}ms) must be greater than fixed gap ({}ms)",
            total, config.fixed_gap_ms
        )));
    }

    validate_not_found_id(&config.not_found_id)?;

    if config.cacheable_statuses.is_empty() {
        return Err(ConfigError::Validation(
            "cacheable_statuses cannot be empty".to_string(),
        ));
    }

    if let Some(status) = config
        .cacheable_statuses
        .iter()
        .find(|s| !(100..=599).contains(*s))
    {
        return Err(ConfigError::Validation(format!(
            "cacheable status {} is not a valid HTTP status",
            status
        )));
    }

    if config.settle_ceiling_ms == 0 {
        return Err(ConfigError::Validation(
            "settle_ceiling_ms must be > 0".to_string(),
        ));
    }

    if config.protocol_timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "protocol_timeout_ms must be > 0".to_string(),
        ));
    }

    if config.max_pages == 0 {
        return Err(ConfigError::Validation("max_pages must be >= 1".to_string()));
    }

    Ok(())
}

/// Validates the external crawl endpoint, when configured
fn validate_crawl_config(config: &CrawlConfig) -> Result<(), ConfigError> {
    let Some(endpoint) = &config.endpoint else {
        return Ok(());
    };

    let url = Url::parse(endpoint)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid crawl endpoint: {}", e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "Crawl endpoint '{}' must use http or https",
            endpoint
        )));
    }

    Ok(())
}

fn validate_optimize_config(config: &OptimizeConfig) -> Result<(), ConfigError> {
    if config.max_workers < 1 {
        return Err(ConfigError::Validation(format!(
            "max_workers must be >= 1, got {}",
            config.max_workers
        )));
    }

    if config.job_timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "job_timeout_ms must be > 0".to_string(),
        ));
    }

    Ok(())
}

fn validate_cache_config(config: &CacheConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// The id is embedded in an attribute selector, so it must be a plain token
fn validate_not_found_id(id: &str) -> Result<(), ConfigError> {
    if id.is_empty() {
        return Err(ConfigError::Validation(
            "not_found_id cannot be empty".to_string(),
        ));
    }

    if id
        .chars()
        .any(|c| c.is_whitespace() || c == '"' || c == '\'' || c == '\\')
    {
        return Err(ConfigError::Validation(format!(
            "not_found_id '{}' must not contain whitespace, quotes or backslashes",
            id
        )));
    }

    Ok(())
}
