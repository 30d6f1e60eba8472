//! Content acquisition
//!
//! The external crawl endpoint is tried first when one is configured; the
//! render engine is used when there is no endpoint or the endpoint fails.
//! A page checked out from the engine is closed on every exit path.

use crate::config::RenderConfig;
use crate::engine::{PageHandle, RenderEngine};
use crate::render::{
    classify_rendered, intercept_policy, navigation_headers, settle_page, CrawlEndpoint,
    RenderRequest, SettleTiming, SpecialInfo,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

/// How acquisition ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquisitionOutcome {
    /// The crawl endpoint answered with a status other than 500
    ExternalCrawlSuccess { status: u16, html: String },
    /// The crawl endpoint failed or reported 500
    ExternalCrawlFailed,
    /// The render engine produced a settled document
    BrowserRenderSuccess { status: u16, html: String },
    /// The render engine failed; `fatal` errors skip the stale fallback
    BrowserRenderFailed { fatal: bool },
    /// The render engine had no page to hand out
    NoRendererAvailable,
}

/// Runs the two acquisition strategies in priority order
pub struct Acquirer {
    engine: Arc<dyn RenderEngine>,
    crawl: Option<CrawlEndpoint>,
    settle: SettleTiming,
    not_found_id: String,
    protocol_timeout: Duration,
}

impl Acquirer {
    pub fn new(
        engine: Arc<dyn RenderEngine>,
        crawl: Option<CrawlEndpoint>,
        config: &RenderConfig,
    ) -> Self {
        Self {
            engine,
            crawl,
            settle: SettleTiming::from_config(config),
            not_found_id: config.not_found_id.clone(),
            protocol_timeout: Duration::from_millis(config.protocol_timeout_ms),
        }
    }

    /// Replaces the settle timings (shorter windows in tests)
    pub fn with_settle_timing(mut self, settle: SettleTiming) -> Self {
        self.settle = settle;
        self
    }

    /// Acquires content for `request`
    ///
    /// Never returns [`AcquisitionOutcome::ExternalCrawlFailed`]: a failed
    /// crawl always falls through to the render engine.
    pub async fn acquire(&self, request: &RenderRequest) -> AcquisitionOutcome {
        if let Some(crawl) = &self.crawl {
            match crawl.fetch(&request.url, request.started_at).await {
                AcquisitionOutcome::ExternalCrawlFailed => {
                    debug!("Falling back to render engine for {}", request.url);
                }
                outcome => return outcome,
            }
        }

        self.render_with_engine(&request.url).await
    }

    async fn render_with_engine(&self, url: &str) -> AcquisitionOutcome {
        let Some(mut page) = self.engine.new_page().await else {
            warn!("No render page available for {}", url);
            return AcquisitionOutcome::NoRendererAvailable;
        };

        let outcome = self.drive_page(page.as_mut(), url).await;

        if let Err(e) = page.close().await {
            warn!("Failed to close page for {}: {}", url, e);
        }

        outcome
    }

    async fn drive_page(&self, page: &mut dyn PageHandle, url: &str) -> AcquisitionOutcome {
        if let Err(e) = page.set_request_interception(intercept_policy()).await {
            warn!("Could not enable request interception for {}: {}", url, e);
            return AcquisitionOutcome::BrowserRenderFailed { fatal: false };
        }

        let info = SpecialInfo::parse(url);
        if let Err(e) = page.set_extra_headers(navigation_headers(info.as_ref())).await {
            warn!("Could not set navigation headers for {}: {}", url, e);
            return AcquisitionOutcome::BrowserRenderFailed { fatal: false };
        }

        let target = if info.is_some() {
            SpecialInfo::strip_from(url)
        } else {
            url.to_string()
        };

        let settled = match settle_page(
            page,
            &target,
            &self.settle,
            &self.not_found_id,
            self.protocol_timeout,
        )
        .await
        {
            Ok(settled) => settled,
            Err(e) => {
                error!("Render of {} failed: {}", url, e);
                return AcquisitionOutcome::BrowserRenderFailed { fatal: true };
            }
        };

        let html = match page.content().await {
            Ok(html) => html,
            Err(e) => {
                error!("Could not read rendered content of {}: {}", url, e);
                return AcquisitionOutcome::BrowserRenderFailed { fatal: true };
            }
        };

        let status = classify_rendered(&html, &self.not_found_id);
        debug!(
            "Rendered {} (navigation status {:?}, settle {:?}) -> {}",
            url, settled.status, settled.outcome, status
        );

        AcquisitionOutcome::BrowserRenderSuccess { status, html }
    }
}
