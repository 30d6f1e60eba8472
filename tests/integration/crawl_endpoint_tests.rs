//! External crawl endpoint tests against a wiremock server

use chrono::{DateTime, Utc};
use isr_prerender::config::{CrawlConfig, UserAgentConfig};
use isr_prerender::render::{AcquisitionOutcome, CrawlEndpoint};
use std::time::Duration;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::support::refused_base_url;

fn endpoint(server: &MockServer, secret: Option<&str>) -> CrawlEndpoint {
    let config = CrawlConfig {
        endpoint: Some(format!("{}/render", server.uri())),
        secret_key: secret.map(str::to_string),
    };
    CrawlEndpoint::from_config(&config, &UserAgentConfig::default(), Duration::from_secs(5))
        .unwrap()
        .unwrap()
}

#[tokio::test]
async fn test_request_carries_parameters_and_accept_header() {
    let server = MockServer::start().await;
    let started: DateTime<Utc> = DateTime::from_timestamp_millis(1_700_000_000_000).unwrap();

    Mock::given(method("GET"))
        .and(path("/render"))
        .and(query_param("startGenerating", "1700000000000"))
        .and(query_param("isFirstRequest", "true"))
        .and(query_param("url", "https://example.com/a?b=c"))
        .and(query_param("crawlerSecretKey", "k3y"))
        .and(header("accept", "text/html; charset=utf-8"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = endpoint(&server, Some("k3y"))
        .fetch("https://example.com/a?b=c", started)
        .await;

    assert_eq!(
        outcome,
        AcquisitionOutcome::ExternalCrawlSuccess {
            status: 200,
            html: "<html>ok</html>".to_string(),
        }
    );
}

#[tokio::test]
async fn test_json_body_is_decoded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"{"status":302,"data":"<html>moved</html>"}"#),
        )
        .mount(&server)
        .await;

    let outcome = endpoint(&server, None)
        .fetch("https://example.com/", Utc::now())
        .await;

    assert_eq!(
        outcome,
        AcquisitionOutcome::ExternalCrawlSuccess {
            status: 302,
            html: "<html>moved</html>".to_string(),
        }
    );
}

#[tokio::test]
async fn test_reported_500_is_a_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"status":500}"#))
        .mount(&server)
        .await;

    let outcome = endpoint(&server, None)
        .fetch("https://example.com/", Utc::now())
        .await;
    assert_eq!(outcome, AcquisitionOutcome::ExternalCrawlFailed);
}

#[tokio::test]
async fn test_http_500_with_raw_body_is_a_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .mount(&server)
        .await;

    let outcome = endpoint(&server, None)
        .fetch("https://example.com/", Utc::now())
        .await;
    assert_eq!(outcome, AcquisitionOutcome::ExternalCrawlFailed);
}

#[tokio::test]
async fn test_malformed_json_is_a_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"status\": oops}"))
        .mount(&server)
        .await;

    let outcome = endpoint(&server, None)
        .fetch("https://example.com/", Utc::now())
        .await;
    assert_eq!(outcome, AcquisitionOutcome::ExternalCrawlFailed);
}

#[tokio::test]
async fn test_refused_connection_is_a_failure() {
    let config = CrawlConfig {
        endpoint: Some(format!("{}/render", refused_base_url())),
        secret_key: None,
    };
    let client =
        CrawlEndpoint::from_config(&config, &UserAgentConfig::default(), Duration::from_secs(5))
            .unwrap()
            .unwrap();

    let outcome = client.fetch("https://example.com/", Utc::now()).await;
    assert_eq!(outcome, AcquisitionOutcome::ExternalCrawlFailed);
}

#[tokio::test]
async fn test_unconfigured_endpoint_builds_nothing() {
    let client = CrawlEndpoint::from_config(
        &CrawlConfig::default(),
        &UserAgentConfig::default(),
        Duration::from_secs(1),
    )
    .unwrap();
    assert!(client.is_none());
}
