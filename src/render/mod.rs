//! Render-and-cache orchestration
//!
//! This module contains the request path:
//! - Deadline tracking against the total generation budget
//! - The external crawl client and the browser render path
//! - Request interception and special-info headers
//! - Settle-detection and not-found classification
//! - The [`Orchestrator`] that ties acquisition, optimization and caching together

mod acquire;
mod classify;
mod crawl_client;
mod deadline;
mod intercept;
mod orchestrator;
mod settle;

pub use acquire::{AcquisitionOutcome, Acquirer};
pub use classify::{classify_rendered, has_not_found_marker};
pub use crawl_client::CrawlEndpoint;
pub use deadline::DeadlineTracker;
pub use intercept::{decide, intercept_policy, navigation_headers, SpecialInfo, SERVICE_HEADER};
pub use orchestrator::Orchestrator;
pub use settle::{settle_page, wait_for_quiet, SettleOutcome, SettleTiming, Settled};

use chrono::{DateTime, Utc};

/// Body returned for pages that resolve to not-found
pub const NOT_FOUND_BODY: &str = "Page not found!";

/// One inbound render request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderRequest {
    pub url: String,
    /// True when no cached copy is expected to exist yet
    pub is_first_request: bool,
    pub started_at: DateTime<Utc>,
}

impl RenderRequest {
    /// Creates a request that starts now
    pub fn new(url: impl Into<String>, is_first_request: bool) -> Self {
        Self::with_start(url, is_first_request, Utc::now())
    }

    /// Creates a request with an explicit start time
    pub fn with_start(
        url: impl Into<String>,
        is_first_request: bool,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            url: url.into(),
            is_first_request,
            started_at,
        }
    }
}

/// What a render call hands back
///
/// `html` is `None` when only a status is meaningful (fatal render errors).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderResult {
    pub status: u16,
    pub html: Option<String>,
}

impl RenderResult {
    /// A 200 result carrying `html`
    pub fn ok(html: impl Into<String>) -> Self {
        Self {
            status: 200,
            html: Some(html.into()),
        }
    }

    /// A status-only result
    pub fn status(status: u16) -> Self {
        Self { status, html: None }
    }

    pub fn with_html(status: u16, html: impl Into<String>) -> Self {
        Self {
            status,
            html: Some(html.into()),
        }
    }
}
