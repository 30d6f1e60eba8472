//! External crawl endpoint client
//!
//! When a crawl service is configured, pages are first requested from it:
//! `GET <endpoint>?startGenerating=<ms>&isFirstRequest=true&url=<url>[&crawlerSecretKey=<key>]`.
//! The body is decoded as `{ "status": .., "data": .. }` when it is a single
//! JSON object, and used as literal HTML otherwise.

use crate::config::{CrawlConfig, UserAgentConfig};
use crate::render::AcquisitionOutcome;
use crate::{PrerenderError, Result};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::ACCEPT;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Status used for every failed crawl call
pub const CRAWL_FAILURE_STATUS: u16 = 500;

static JSON_DOCUMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\{[\s\S]*\}$").expect("valid JSON document regex"));

#[derive(Debug, Deserialize)]
struct CrawlPayload {
    status: Option<u16>,
    data: Option<String>,
}

/// Client for the external crawl service
#[derive(Debug, Clone)]
pub struct CrawlEndpoint {
    client: Client,
    endpoint: Url,
    secret_key: Option<String>,
}

impl CrawlEndpoint {
    /// Builds a client for the configured endpoint, if there is one
    ///
    /// # Returns
    ///
    /// * `Ok(None)` - No endpoint configured
    /// * `Ok(Some(CrawlEndpoint))` - Client ready
    /// * `Err(PrerenderError)` - Endpoint is not a URL or the client failed to build
    pub fn from_config(
        config: &CrawlConfig,
        user_agent: &UserAgentConfig,
        timeout: Duration,
    ) -> Result<Option<Self>> {
        let Some(endpoint) = config.endpoint.as_deref() else {
            return Ok(None);
        };

        let client = Client::builder()
            .user_agent(user_agent.header_value())
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(Some(Self::new(
            client,
            Url::parse(endpoint)?,
            config.secret_key.clone(),
        )))
    }

    pub fn new(client: Client, endpoint: Url, secret_key: Option<String>) -> Self {
        Self {
            client,
            endpoint,
            secret_key,
        }
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Asks the crawl service for `url`
    ///
    /// Never fails: transport and decode errors become
    /// [`AcquisitionOutcome::ExternalCrawlFailed`], as does a 500 reported by
    /// the service itself.
    pub async fn fetch(&self, url: &str, started_at: DateTime<Utc>) -> AcquisitionOutcome {
        match self.request(url, started_at).await {
            Ok((status, _)) if status == CRAWL_FAILURE_STATUS => {
                debug!("Crawl endpoint reported {} for {}", status, url);
                AcquisitionOutcome::ExternalCrawlFailed
            }
            Ok((status, html)) => AcquisitionOutcome::ExternalCrawlSuccess { status, html },
            Err(e) => {
                warn!("Crawl endpoint failed for {}: {}", url, e);
                AcquisitionOutcome::ExternalCrawlFailed
            }
        }
    }

    fn request_url(&self, url: &str, started_at: DateTime<Utc>) -> Url {
        let mut request_url = self.endpoint.clone();
        {
            let mut query = request_url.query_pairs_mut();
            query
                .append_pair("startGenerating", &started_at.timestamp_millis().to_string())
                .append_pair("isFirstRequest", "true")
                .append_pair("url", url);
            if let Some(key) = &self.secret_key {
                query.append_pair("crawlerSecretKey", key);
            }
        }
        request_url
    }

    async fn request(&self, url: &str, started_at: DateTime<Utc>) -> Result<(u16, String)> {
        let request_url = self.request_url(url, started_at);

        let response = self
            .client
            .get(request_url)
            .header(ACCEPT, "text/html; charset=utf-8")
            .send()
            .await
            .map_err(|source| PrerenderError::Http {
                url: url.to_string(),
                source,
            })?;

        let http_status = response.status().as_u16();
        let body = response.text().await.map_err(|source| PrerenderError::Http {
            url: url.to_string(),
            source,
        })?;

        decode_body(http_status, body)
    }
}

/// Interprets a crawl response body
fn decode_body(http_status: u16, body: String) -> Result<(u16, String)> {
    if !JSON_DOCUMENT.is_match(body.trim()) {
        return Ok((http_status, body));
    }

    let payload: CrawlPayload = serde_json::from_str(body.trim())
        .map_err(|e| PrerenderError::CrawlPayload(e.to_string()))?;

    Ok((
        payload.status.unwrap_or(http_status),
        payload.data.unwrap_or_default(),
    ))
}
