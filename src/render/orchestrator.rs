//! Render orchestrator - the request-level decision logic
//!
//! For each URL the orchestrator decides, under the total generation budget,
//! whether to regenerate the page or serve what is cached:
//! - Budget check against the reserved tail allowance
//! - Acquisition through the crawl endpoint or the render engine
//! - Classification against the cacheable status set
//! - Optimization on the worker pool
//! - Cache write
//!
//! Every collaborator error is handled here; callers receive either a
//! result or `None`, never an error.

use crate::cache::{CacheStore, ContentState};
use crate::config::Config;
use crate::engine::RenderEngine;
use crate::optimize::{ContentOptimizer, OptimizeMode};
use crate::render::{
    AcquisitionOutcome, Acquirer, CrawlEndpoint, DeadlineTracker, RenderRequest, RenderResult,
    NOT_FOUND_BODY,
};
use crate::state::{RenderStage, StageTracker};
use crate::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Main orchestrator structure
pub struct Orchestrator {
    deadline: DeadlineTracker,
    fixed_gap_ms: u64,
    cacheable_statuses: Vec<u16>,
    optimize_enabled: bool,
    acquirer: Acquirer,
    cache: Arc<dyn CacheStore>,
    optimizer: Arc<dyn ContentOptimizer>,
}

impl Orchestrator {
    /// Creates an orchestrator from its parts
    pub fn new(
        config: &Config,
        acquirer: Acquirer,
        cache: Arc<dyn CacheStore>,
        optimizer: Arc<dyn ContentOptimizer>,
    ) -> Self {
        Self {
            deadline: DeadlineTracker::from_config(&config.render),
            fixed_gap_ms: config.render.fixed_gap_ms,
            cacheable_statuses: config.render.cacheable_statuses.clone(),
            optimize_enabled: !config.optimize.disable_optimize,
            acquirer,
            cache,
            optimizer,
        }
    }

    /// Creates an orchestrator wired from configuration
    ///
    /// The crawl endpoint client, when configured, is built here and shares
    /// the total generation budget as its request timeout.
    ///
    /// # Returns
    ///
    /// * `Ok(Orchestrator)` - Ready to serve requests
    /// * `Err(PrerenderError)` - The crawl endpoint client could not be built
    pub fn from_config(
        config: &Config,
        engine: Arc<dyn RenderEngine>,
        cache: Arc<dyn CacheStore>,
        optimizer: Arc<dyn ContentOptimizer>,
    ) -> Result<Self> {
        let crawl = CrawlEndpoint::from_config(
            &config.crawl,
            &config.user_agent,
            Duration::from_millis(config.render.effective_total_timeout_ms()),
        )?;
        let acquirer = Acquirer::new(engine, crawl, &config.render);

        Ok(Self::new(config, acquirer, cache, optimizer))
    }

    pub fn deadline(&self) -> &DeadlineTracker {
        &self.deadline
    }

    /// Renders `url`, starting the budget now
    pub async fn render(&self, url: &str, is_first_request: bool) -> Option<RenderResult> {
        self.render_request(RenderRequest::new(url, is_first_request))
            .await
    }

    /// Runs one request through the stage machine
    ///
    /// # Returns
    ///
    /// * `Some(RenderResult)` - Fresh, stale, not-found, raw or error result
    /// * `None` - Nothing could be produced; the caller must fall back itself
    pub async fn render_request(&self, request: RenderRequest) -> Option<RenderResult> {
        let url = request.url.as_str();
        let mut stages = StageTracker::new(url);

        stages.advance(RenderStage::BudgetCheck);
        let remaining = self.deadline.remaining(request.started_at, self.fixed_gap_ms);
        if remaining <= 0 {
            info!("Budget exhausted for {} ({}ms left)", url, remaining);
            stages.advance(RenderStage::ServeStale);
            return self.serve_stale(&request).await;
        }

        stages.advance(RenderStage::Acquiring);
        let (status, html) = match self.acquirer.acquire(&request).await {
            AcquisitionOutcome::ExternalCrawlSuccess { status, html }
            | AcquisitionOutcome::BrowserRenderSuccess { status, html } => (status, html),
            AcquisitionOutcome::BrowserRenderFailed { fatal: true } => {
                stages.advance(RenderStage::Aborted);
                return Some(RenderResult::status(500));
            }
            AcquisitionOutcome::BrowserRenderFailed { fatal: false }
            | AcquisitionOutcome::NoRendererAvailable
            | AcquisitionOutcome::ExternalCrawlFailed => {
                stages.advance(RenderStage::ServeStale);
                return self.serve_stale(&request).await;
            }
        };

        stages.advance(RenderStage::BudgetReport);
        debug!(
            "Acquired {} with status {}, {}ms of budget left",
            url,
            status,
            self.deadline.remaining(request.started_at, 0)
        );

        stages.advance(RenderStage::Classifying);
        if !self.cacheable_statuses.contains(&status) {
            stages.advance(RenderStage::NotFoundOrRaw);
            if let Err(e) = self.cache.remove(url).await {
                warn!("Failed to evict {} after status {}: {}", url, status, e);
            }
            let body = if status == 404 {
                NOT_FOUND_BODY.to_string()
            } else {
                html
            };
            info!("{} resolved to uncacheable status {}", url, status);
            return Some(RenderResult::with_html(status, body));
        }

        let (html, state) = if self.optimize_enabled {
            stages.advance(RenderStage::Optimizing);
            match self.optimizer.optimize(html, OptimizeMode::Full).await {
                Ok(optimized) => (optimized, ContentState::Optimized),
                Err(e) => {
                    error!("Optimization failed for {}: {}", url, e);
                    stages.advance(RenderStage::Aborted);
                    return None;
                }
            }
        } else {
            (html, ContentState::Raw)
        };

        stages.advance(RenderStage::CacheWrite);
        let result = match self.cache.set(url, &html, state).await {
            Ok(result) => result,
            Err(e) => {
                warn!("Cache write failed for {}, serving uncached: {}", url, e);
                RenderResult::ok(html)
            }
        };

        stages.advance(RenderStage::Done);
        info!(
            "Rendered {} ({} bytes, {:?})",
            url,
            result.html.as_ref().map_or(0, String::len),
            state
        );
        Some(result)
    }

    /// Serves the last cached copy, never regenerating
    async fn serve_stale(&self, request: &RenderRequest) -> Option<RenderResult> {
        if request.is_first_request {
            debug!("First request for {}, nothing to fall back on", request.url);
            return None;
        }

        match self.cache.achieve(&request.url).await {
            Ok(Some(result)) => {
                info!("Serving cached copy of {}", request.url);
                Some(result)
            }
            Ok(None) => {
                debug!("No cached copy of {}", request.url);
                None
            }
            Err(e) => {
                warn!("Stale lookup failed for {}: {}", request.url, e);
                None
            }
        }
    }
}
