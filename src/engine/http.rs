//! HTTP-backed render engine
//!
//! This engine fetches the document with a single GET and never executes
//! scripts. It honours the same contract as a browser engine (page checkout
//! limits, interception of the document request, extra headers, network
//! events), which makes it a drop-in for hosts without a browser and for
//! pages that are already server-rendered.

use crate::config::UserAgentConfig;
use crate::engine::{
    EngineError, InterceptDecision, InterceptPolicy, InterceptedRequest, Navigation,
    NetworkEvent, PageHandle, RenderEngine, ResourceType,
};
use async_trait::async_trait;
use reqwest::header::{HeaderName, HeaderValue, ACCEPT};
use reqwest::Client;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Render engine that serves pages over plain HTTP
pub struct HttpRenderEngine {
    client: Client,
    pages: Arc<Semaphore>,
    timeout: Duration,
}

impl HttpRenderEngine {
    /// Builds an engine with its own HTTP client
    ///
    /// # Arguments
    ///
    /// * `user_agent` - Identification sent with every request
    /// * `max_pages` - Number of pages that may be checked out at once
    /// * `timeout` - Per-navigation timeout
    pub fn new(
        user_agent: &UserAgentConfig,
        max_pages: usize,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(user_agent.header_value())
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(Self::from_client(client, max_pages, timeout))
    }

    /// Wraps an existing client
    pub fn from_client(client: Client, max_pages: usize, timeout: Duration) -> Self {
        Self {
            client,
            pages: Arc::new(Semaphore::new(max_pages)),
            timeout,
        }
    }

    /// Number of pages that can still be checked out
    pub fn available_pages(&self) -> usize {
        self.pages.available_permits()
    }
}

#[async_trait]
impl RenderEngine for HttpRenderEngine {
    async fn new_page(&self) -> Option<Box<dyn PageHandle>> {
        let permit = match self.pages.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                tracing::warn!("HTTP render engine has no free pages");
                return None;
            }
        };

        Some(Box::new(HttpPage {
            client: self.client.clone(),
            timeout: self.timeout,
            permit: Some(permit),
            headers: BTreeMap::new(),
            policy: None,
            events: None,
            body: None,
        }))
    }
}

struct HttpPage {
    client: Client,
    timeout: Duration,
    permit: Option<OwnedSemaphorePermit>,
    headers: BTreeMap<String, String>,
    policy: Option<InterceptPolicy>,
    events: Option<UnboundedSender<NetworkEvent>>,
    body: Option<String>,
}

impl HttpPage {
    fn ensure_open(&self) -> Result<(), EngineError> {
        if self.permit.is_none() {
            return Err(EngineError::Closed);
        }
        Ok(())
    }

    fn emit(&self, event: NetworkEvent) {
        if let Some(events) = &self.events {
            // A dropped receiver only means nobody is watching anymore
            let _ = events.send(event);
        }
    }
}

#[async_trait]
impl PageHandle for HttpPage {
    async fn set_request_interception(
        &mut self,
        policy: InterceptPolicy,
    ) -> Result<(), EngineError> {
        self.ensure_open()?;
        self.policy = Some(policy);
        Ok(())
    }

    async fn set_extra_headers(
        &mut self,
        headers: BTreeMap<String, String>,
    ) -> Result<(), EngineError> {
        self.ensure_open()?;

        for (name, value) in &headers {
            HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                EngineError::Protocol(format!("invalid header name {}: {}", name, e))
            })?;
            HeaderValue::from_str(value).map_err(|e| {
                EngineError::Protocol(format!("invalid value for header {}: {}", name, e))
            })?;
        }

        self.headers = headers;
        Ok(())
    }

    fn network_events(&mut self) -> UnboundedReceiver<NetworkEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.events = Some(tx);
        rx
    }

    async fn goto(&mut self, url: &str) -> Result<Navigation, EngineError> {
        self.ensure_open()?;

        let request = InterceptedRequest::new(url, ResourceType::Document);
        let decision = self
            .policy
            .as_ref()
            .map(|policy| (**policy)(&request))
            .unwrap_or(InterceptDecision::Continue);

        match decision {
            InterceptDecision::Abort => {
                self.emit(NetworkEvent::RequestFailed);
                return Err(EngineError::Navigation(format!(
                    "document request for {} was aborted",
                    url
                )));
            }
            InterceptDecision::Respond { status, body, .. } => {
                self.body = Some(body);
                self.emit(NetworkEvent::RequestFinished { from_cache: true });
                return Ok(Navigation {
                    status: Some(status),
                });
            }
            InterceptDecision::Continue => {}
        }

        let mut builder = self
            .client
            .get(url)
            .header(ACCEPT, "text/html; charset=utf-8");
        for (name, value) in &self.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                self.emit(NetworkEvent::RequestFailed);
                if e.is_timeout() {
                    // Best-effort: an empty document is still inspectable
                    self.body = Some(String::new());
                    return Err(EngineError::Timeout(self.timeout));
                }
                return Err(EngineError::Navigation(e.to_string()));
            }
        };

        let status = response.status().as_u16();
        match response.text().await {
            Ok(body) => {
                self.body = Some(body);
                self.emit(NetworkEvent::RequestFinished { from_cache: false });
                Ok(Navigation {
                    status: Some(status),
                })
            }
            Err(e) => {
                self.emit(NetworkEvent::RequestFailed);
                if e.is_timeout() {
                    self.body = Some(String::new());
                    return Err(EngineError::Timeout(self.timeout));
                }
                Err(EngineError::Navigation(e.to_string()))
            }
        }
    }

    async fn content(&mut self) -> Result<String, EngineError> {
        self.ensure_open()?;
        self.body
            .clone()
            .ok_or_else(|| EngineError::Protocol("no document has been loaded".to_string()))
    }

    async fn close(&mut self) -> Result<(), EngineError> {
        self.permit.take();
        self.events.take();
        self.body.take();
        Ok(())
    }
}
