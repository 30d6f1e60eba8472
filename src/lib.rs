//! isr-prerender: on-demand server-side rendering with a regeneration cache
//!
//! This crate renders dynamic pages into static HTML for crawlers and bots and
//! caches the result, so later requests for the same URL are served instantly.
//! The [`render::Orchestrator`] decides, under a wall-clock budget, whether to
//! regenerate a page (through an external crawl endpoint or a render engine) or
//! to fall back to the last cached copy.

pub mod cache;
pub mod config;
pub mod engine;
pub mod optimize;
pub mod render;
pub mod state;

use thiserror::Error;

/// Main error type for isr-prerender operations
#[derive(Debug, Error)]
pub enum PrerenderError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Cache error: {0}")]
    Cache(#[from] cache::CacheError),

    #[error("Optimization error: {0}")]
    Optimize(#[from] optimize::OptimizeError),

    #[error("Render engine error: {0}")]
    Engine(#[from] engine::EngineError),

    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Malformed crawl payload: {0}")]
    CrawlPayload(String),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid value for environment variable {name}: {value}")]
    InvalidEnv { name: String, value: String },
}

/// Result type alias for isr-prerender operations
pub type Result<T> = std::result::Result<T, PrerenderError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use cache::{CacheEntry, CacheStore, ContentState};
pub use config::Config;
pub use render::{DeadlineTracker, Orchestrator, RenderRequest, RenderResult};
pub use state::RenderStage;
