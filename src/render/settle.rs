//! Settle-detection
//!
//! Decides when a page has finished producing meaningful content without a
//! fixed sleep. After DOM-ready and a short debounce the document is checked
//! for the not-found sentinel; if it is absent, the wait continues until
//! network activity has been quiet for a short window, bounded by a hard
//! ceiling.
//!
//! The quiet window is tracked as a single deadline that every network
//! event pushes forward, rather than a timer that is cancelled and re-armed.

use crate::config::RenderConfig;
use crate::engine::{EngineError, NetworkEvent, PageHandle};
use crate::render::has_not_found_marker;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::{sleep, sleep_until, timeout, Instant};
use tracing::{debug, warn};

/// Timer settings for settle-detection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettleTiming {
    /// Pause after DOM-ready before the first content check
    pub initial_delay: Duration,
    /// Quiet window armed at the start and after each finished request
    pub quiet_window: Duration,
    /// Window after a request served from cache
    pub cached_window: Duration,
    /// Window after a failed request
    pub failed_window: Duration,
    /// Upper bound on the quiet wait
    pub ceiling: Duration,
}

impl SettleTiming {
    /// Timings for the bandwidth tier
    pub fn for_bandwidth(high_bandwidth: bool) -> Self {
        let (initial_delay, quiet_window) = if high_bandwidth {
            (Duration::from_millis(250), Duration::from_millis(200))
        } else {
            (Duration::from_millis(500), Duration::from_millis(500))
        };

        Self {
            initial_delay,
            quiet_window,
            cached_window: Duration::from_millis(100),
            failed_window: Duration::from_millis(100),
            ceiling: Duration::from_secs(10),
        }
    }

    pub fn from_config(config: &RenderConfig) -> Self {
        Self {
            ceiling: Duration::from_millis(config.settle_ceiling_ms),
            ..Self::for_bandwidth(config.high_bandwidth)
        }
    }

    fn window_for(&self, event: NetworkEvent) -> Duration {
        match event {
            NetworkEvent::RequestFinished { from_cache: false } => self.quiet_window,
            NetworkEvent::RequestFinished { from_cache: true } => self.cached_window,
            NetworkEvent::RequestFailed => self.failed_window,
        }
    }
}

/// What ended the settle wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleOutcome {
    /// The not-found sentinel was present after the first debounce
    NotFoundMarker,
    /// The network went quiet
    Quiet,
    /// The hard ceiling expired first
    CeilingReached,
}

/// Result of navigating and settling a page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settled {
    /// Status of the main document, when one was recorded
    pub status: Option<u16>,
    pub outcome: SettleOutcome,
}

/// Waits until no network event has arrived for the current window
///
/// A closed channel means no further activity; the wait then runs out the
/// current window.
pub async fn wait_for_quiet(
    events: &mut UnboundedReceiver<NetworkEvent>,
    timing: &SettleTiming,
) -> SettleOutcome {
    let ceiling = Instant::now() + timing.ceiling;
    let mut quiet_at = Instant::now() + timing.quiet_window;
    let mut open = true;

    loop {
        tokio::select! {
            biased;

            _ = sleep_until(ceiling) => return SettleOutcome::CeilingReached,
            _ = sleep_until(quiet_at) => return SettleOutcome::Quiet,
            event = events.recv(), if open => match event {
                Some(event) => quiet_at = Instant::now() + timing.window_for(event),
                None => open = false,
            },
        }
    }
}

/// Navigates `page` to `url` and waits for it to settle
///
/// Timeout-classified navigation errors, including expiry of
/// `protocol_timeout`, are logged and the page is used as it stands. Any
/// other error is returned and must be treated as fatal.
pub async fn settle_page(
    page: &mut dyn PageHandle,
    url: &str,
    timing: &SettleTiming,
    not_found_id: &str,
    protocol_timeout: Duration,
) -> Result<Settled, EngineError> {
    let mut events = page.network_events();

    let status = match timeout(protocol_timeout, page.goto(url)).await {
        Ok(Ok(navigation)) => navigation.status,
        Ok(Err(e)) if e.is_timeout() => {
            warn!("Navigation to {} timed out, continuing with partial page: {}", url, e);
            None
        }
        Ok(Err(e)) => return Err(e),
        Err(_) => {
            warn!(
                "Navigation to {} exceeded protocol timeout of {:?}, continuing with partial page",
                url, protocol_timeout
            );
            None
        }
    };

    sleep(timing.initial_delay).await;

    let html = page.content().await?;
    if has_not_found_marker(&html, not_found_id) {
        debug!("{} shows the not-found marker, settling early", url);
        return Ok(Settled {
            status,
            outcome: SettleOutcome::NotFoundMarker,
        });
    }

    // Activity before this point belongs to the initial load.
    while events.try_recv().is_ok() {}

    let outcome = wait_for_quiet(&mut events, timing).await;
    debug!("{} settled: {:?}", url, outcome);

    Ok(Settled { status, outcome })
}
