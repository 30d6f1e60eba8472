use serde::Deserialize;

/// Default budget for one render call (milliseconds)
pub const DEFAULT_TOTAL_TIMEOUT_MS: u64 = 20_000;

/// Budget used when running in a constrained (ephemeral) environment
pub const CONSTRAINED_TOTAL_TIMEOUT_MS: u64 = 5_000;

/// Main configuration structure for isr-prerender
///
/// Every section is optional; an empty file yields a fully defaulted config.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub render: RenderConfig,
    pub crawl: CrawlConfig,
    pub optimize: OptimizeConfig,
    pub cache: CacheConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
}

/// Orchestration and render engine behaviour
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RenderConfig {
    /// Explicit total budget; falls back to the environment default when unset
    pub total_timeout_ms: Option<u64>,

    /// Ephemeral execution (short budget, optimizer pool torn down after use)
    pub constrained: bool,

    /// Time reserved for the classify/optimize/cache-write tail
    pub fixed_gap_ms: u64,

    /// Element id that marks an application-level "not found" page
    pub not_found_id: String,

    /// Statuses whose output is persisted to the cache
    pub cacheable_statuses: Vec<u16>,

    /// Selects the shorter debounce windows used during settle-detection
    pub high_bandwidth: bool,

    /// Hard ceiling on the quiet-period wait
    pub settle_ceiling_ms: u64,

    /// Render engine protocol timeout for a single navigation
    pub protocol_timeout_ms: u64,

    /// Page handles the built-in HTTP engine hands out concurrently
    pub max_pages: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            total_timeout_ms: None,
            constrained: false,
            fixed_gap_ms: 1_500,
            not_found_id: "404-page".to_string(),
            cacheable_statuses: vec![200, 302],
            high_bandwidth: true,
            settle_ceiling_ms: 10_000,
            protocol_timeout_ms: 240_000,
            max_pages: 8,
        }
    }
}

impl RenderConfig {
    /// Returns the budget in effect, honouring the constrained-environment default
    pub fn effective_total_timeout_ms(&self) -> u64 {
        match self.total_timeout_ms {
            Some(ms) => ms,
            None if self.constrained => CONSTRAINED_TOTAL_TIMEOUT_MS,
            None => DEFAULT_TOTAL_TIMEOUT_MS,
        }
    }
}

/// External crawl endpoint configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CrawlConfig {
    /// Endpoint URL; the external crawl path is disabled when absent
    pub endpoint: Option<String>,

    /// Shared secret forwarded as `crawlerSecretKey`
    pub secret_key: Option<String>,
}

/// Content optimization configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct OptimizeConfig {
    /// Upper bound on optimizer workers (the pool never runs fewer than two)
    pub max_workers: usize,

    /// Skip whitespace compression after the rule pass
    pub disable_compress: bool,

    /// Serve full-tier requests with the shallow tier
    pub disable_deep_optimize: bool,

    /// Skip optimization entirely and cache raw HTML
    pub disable_optimize: bool,

    /// Timeout applied to a single optimization job
    pub job_timeout_ms: u64,
}

impl Default for OptimizeConfig {
    fn default() -> Self {
        Self {
            max_workers: 7,
            disable_compress: false,
            disable_deep_optimize: false,
            disable_optimize: false,
            job_timeout_ms: 30_000,
        }
    }
}

/// Cache store configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CacheConfig {
    /// Path to the SQLite cache database
    pub database_path: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            database_path: "./isr-cache.db".to_string(),
        }
    }
}

/// User agent identification for outbound HTTP requests
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UserAgentConfig {
    pub name: String,
    pub version: String,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl UserAgentConfig {
    /// Formats the `User-Agent` header value
    pub fn header_value(&self) -> String {
        format!("{}/{}", self.name, self.version)
    }
}
