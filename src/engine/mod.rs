//! Render engine contract
//!
//! The orchestrator talks to a render engine only through the traits in this
//! module. A headless browser implements them in production; [`HttpRenderEngine`]
//! implements them over plain HTTP for environments without a browser.

mod http;

pub use http::HttpRenderEngine;

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc::UnboundedReceiver;

/// Errors reported by a render engine
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Navigation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Page is closed")]
    Closed,
}

impl EngineError {
    /// Returns true if this error should be treated as a tolerable timeout
    ///
    /// Settle-detection swallows these and continues with whatever content the
    /// page has; every other error is fatal for the request.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

/// Resource type of an intercepted sub-request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceType {
    Document,
    Stylesheet,
    Image,
    ImageSet,
    Media,
    Font,
    Script,
    Xhr,
    Fetch,
    Other,
}

impl ResourceType {
    /// Parses the lowercase resource type names browsers report
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "document" => Self::Document,
            "stylesheet" => Self::Stylesheet,
            "image" => Self::Image,
            "imageset" => Self::ImageSet,
            "media" => Self::Media,
            "font" => Self::Font,
            "script" => Self::Script,
            "xhr" => Self::Xhr,
            "fetch" => Self::Fetch,
            _ => Self::Other,
        }
    }
}

/// A sub-request the page is about to issue
#[derive(Debug, Clone)]
pub struct InterceptedRequest {
    pub url: String,
    pub resource_type: ResourceType,
}

impl InterceptedRequest {
    pub fn new(url: impl Into<String>, resource_type: ResourceType) -> Self {
        Self {
            url: url.into(),
            resource_type,
        }
    }
}

/// What the engine should do with an intercepted request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterceptDecision {
    /// Answer locally with a synthetic response; never touches the network
    Respond {
        status: u16,
        content_type: &'static str,
        body: String,
    },
    /// Drop the request
    Abort,
    /// Let the request through unmodified
    Continue,
}

/// Interception policy installed on a page
pub type InterceptPolicy = Arc<dyn Fn(&InterceptedRequest) -> InterceptDecision + Send + Sync>;

/// Network activity observed on a page, used by settle-detection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkEvent {
    /// A request completed; `from_cache` is set when it was served locally
    RequestFinished { from_cache: bool },
    /// A request failed or was aborted
    RequestFailed,
}

/// Result of a navigation that reached DOM-ready
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Navigation {
    /// Status of the main document response, when the engine saw one
    pub status: Option<u16>,
}

/// A single page checked out from a render engine
///
/// Callers must call [`PageHandle::close`] on every exit path.
#[async_trait]
pub trait PageHandle: Send {
    /// Installs the interception policy for all subsequent requests
    async fn set_request_interception(&mut self, policy: InterceptPolicy)
        -> Result<(), EngineError>;

    /// Sets headers sent with the navigation request
    async fn set_extra_headers(
        &mut self,
        headers: BTreeMap<String, String>,
    ) -> Result<(), EngineError>;

    /// Subscribes to network activity on this page
    fn network_events(&mut self) -> UnboundedReceiver<NetworkEvent>;

    /// Navigates to `url` and resolves once the DOM is ready
    async fn goto(&mut self, url: &str) -> Result<Navigation, EngineError>;

    /// Returns the fully serialized document
    async fn content(&mut self) -> Result<String, EngineError>;

    /// Releases the page back to the engine
    async fn close(&mut self) -> Result<(), EngineError>;
}

/// Source of page handles
///
/// The engine is constructed by the process entry point and shared between
/// concurrent requests; it must not assume exclusive use by any one caller.
#[async_trait]
pub trait RenderEngine: Send + Sync {
    /// Checks out a page, or `None` if the engine cannot provide one
    async fn new_page(&self) -> Option<Box<dyn PageHandle>>;
}
