//! isr-prerender main entry point
//!
//! This is the command-line interface for the prerender cache. The binary
//! owns the process-wide resources (render engine, optimizer pool, cache
//! store) and hands them to the orchestrator.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use isr_prerender::cache::{print_cache_stats, CacheStore, SqliteCacheStore};
use isr_prerender::config::{load_config_with_hash, load_from_env, Config};
use isr_prerender::engine::HttpRenderEngine;
use isr_prerender::optimize::OptimizerPool;
use isr_prerender::Orchestrator;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing_subscriber::EnvFilter;

/// isr-prerender: on-demand rendering with a regeneration cache
///
/// Renders pages for crawlers, optimizes the HTML and caches it so later
/// requests are served without rendering again.
#[derive(Parser, Debug)]
#[command(name = "isr-prerender")]
#[command(version)]
#[command(about = "Render-and-cache engine for crawler traffic", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (defaults and environment only when omitted)
    #[arg(short, long, value_name = "CONFIG", env = "ISR_CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render URLs concurrently and cache the results
    Render {
        #[arg(required = true, value_name = "URL")]
        urls: Vec<String>,

        /// Treat the requests as first requests (no stale fallback)
        #[arg(long)]
        first_request: bool,
    },

    /// Print the cached copy of a URL without regenerating it
    Show {
        #[arg(value_name = "URL")]
        url: String,
    },

    /// Remove a URL from the cache
    Evict {
        #[arg(value_name = "URL")]
        url: String,
    },

    /// Show cache statistics and exit
    Stats,

    /// Run an HTML file through the optimizer and print the result
    Optimize {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Use the lighter shallow tier
        #[arg(long)]
        shallow: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let config = load(cli.config.as_deref())?;

    match cli.command {
        Command::Render {
            urls,
            first_request,
        } => handle_render(&config, urls, first_request).await,
        Command::Show { url } => handle_show(&config, &url).await,
        Command::Evict { url } => handle_evict(&config, &url).await,
        Command::Stats => handle_stats(&config).await,
        Command::Optimize { file, shallow } => handle_optimize(&config, &file, shallow).await,
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("isr_prerender=info,warn"),
            1 => EnvFilter::new("isr_prerender=debug,info"),
            2 => EnvFilter::new("isr_prerender=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Loads configuration from a file, or from defaults plus environment
fn load(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("failed to load {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            Ok(config)
        }
        None => {
            tracing::info!("No configuration file given, using defaults and environment");
            load_from_env().context("invalid environment configuration")
        }
    }
}

fn open_store(config: &Config) -> Result<SqliteCacheStore> {
    let path = Path::new(&config.cache.database_path);
    SqliteCacheStore::new(path).with_context(|| format!("failed to open cache {}", path.display()))
}

/// Tears the pool down when the host requires per-invocation cleanup
async fn finish_pool(config: &Config, pool: &OptimizerPool) {
    if config.render.constrained {
        pool.shutdown().await;
    }
}

/// Handles the render command
async fn handle_render(config: &Config, urls: Vec<String>, first_request: bool) -> Result<()> {
    let store = open_store(config)?;
    let pool = OptimizerPool::start(&config.optimize);
    let engine = HttpRenderEngine::new(
        &config.user_agent,
        config.render.max_pages,
        Duration::from_millis(config.render.protocol_timeout_ms),
    )
    .context("failed to build render engine")?;

    let orchestrator = Arc::new(Orchestrator::from_config(
        config,
        Arc::new(engine),
        Arc::new(store),
        Arc::new(pool.clone()),
    )?);

    tracing::info!(
        "Rendering {} URL(s) with {} optimizer workers",
        urls.len(),
        pool.workers()
    );

    let mut tasks = JoinSet::new();
    for url in urls {
        let orchestrator = Arc::clone(&orchestrator);
        tasks.spawn(async move {
            let result = orchestrator.render(&url, first_request).await;
            (url, result)
        });
    }

    while let Some(joined) = tasks.join_next().await {
        let (url, result) = joined.context("render task panicked")?;
        match result {
            Some(result) => println!(
                "{} {} bytes {}",
                result.status,
                result.html.as_ref().map_or(0, String::len),
                url
            ),
            None => println!("--- no result {}", url),
        }
    }

    finish_pool(config, &pool).await;
    Ok(())
}

/// Handles the show command
async fn handle_show(config: &Config, url: &str) -> Result<()> {
    let store = open_store(config)?;

    match store.achieve(url).await? {
        Some(result) => println!("{}", result.html.unwrap_or_default()),
        None => {
            eprintln!("No cached copy of {}", url);
            std::process::exit(1);
        }
    }

    Ok(())
}

/// Handles the evict command
async fn handle_evict(config: &Config, url: &str) -> Result<()> {
    let store = open_store(config)?;
    store.remove(url).await?;
    println!("Evicted {}", url);
    Ok(())
}

/// Handles the stats command
async fn handle_stats(config: &Config) -> Result<()> {
    println!("Database: {}\n", config.cache.database_path);

    let store = open_store(config)?;
    let stats = store.stats().await?;
    print_cache_stats(&stats);

    Ok(())
}

/// Handles the optimize command
async fn handle_optimize(config: &Config, file: &Path, shallow: bool) -> Result<()> {
    let html = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;

    let pool = OptimizerPool::start(&config.optimize);
    let optimized = if shallow {
        pool.optimize_shallow(html).await
    } else {
        pool.optimize_full(html).await
    };
    finish_pool(config, &pool).await;

    println!("{}", optimized?);
    Ok(())
}
