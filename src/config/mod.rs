//! Configuration module for isr-prerender
//!
//! This module handles loading, parsing, and validating TOML configuration
//! files, with environment variable overrides layered on top.
//!
//! # Example
//!
//! ```no_run
//! use isr_prerender::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("isr.toml")).unwrap();
//! println!("Optimizer workers: {}", config.optimize.max_workers);
//! ```

mod env;
mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    CacheConfig, Config, CrawlConfig, OptimizeConfig, RenderConfig, UserAgentConfig,
    CONSTRAINED_TOTAL_TIMEOUT_MS, DEFAULT_TOTAL_TIMEOUT_MS,
};

// Re-export parser functions
pub use env::apply_env_overrides;
pub use parser::{
    compute_config_hash, load_config, load_config_with_hash, load_from_env, parse_config,
};
pub use validation::validate;
