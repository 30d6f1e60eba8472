//! End-to-end orchestration scenarios
//!
//! These tests drive the orchestrator with scripted engines, recording
//! stores and stub optimizers; the crawl endpoint is a wiremock server.

use crate::support::{
    orchestrator, refused_base_url, CountingOptimizer, FailingOptimizer, GotoBehaviour,
    RecordingStore, ScriptedEngine,
};
use chrono::{Duration as ChronoDuration, Utc};
use isr_prerender::cache::{CacheStore, ContentState};
use isr_prerender::config::{Config, UserAgentConfig};
use isr_prerender::optimize::OptimizeMode;
use isr_prerender::render::CrawlEndpoint;
use isr_prerender::RenderRequest;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PAGE: &str = "<html><body><main>Product 42</main></body></html>";
const NOT_FOUND_PAGE: &str = r#"<html><body><div id="404-page">Gone</div></body></html>"#;

fn crawl_client(server: &MockServer) -> CrawlEndpoint {
    let mut config = Config::default();
    config.crawl.endpoint = Some(format!("{}/render", server.uri()));
    CrawlEndpoint::from_config(&config.crawl, &UserAgentConfig::default(), Duration::from_secs(5))
        .unwrap()
        .unwrap()
}

/// A request whose budget is already spent
fn exhausted_request(url: &str, first: bool) -> RenderRequest {
    RenderRequest::with_start(url, first, Utc::now() - ChronoDuration::seconds(19))
}

#[tokio::test]
async fn test_exhausted_budget_serves_stale_without_acquiring() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let config = Config::default();
    let engine = Arc::new(ScriptedEngine::serving(PAGE));
    let store = Arc::new(RecordingStore::new());
    store.seed("https://example.com/old", "<p>stale</p>").await;
    let optimizer = Arc::new(CountingOptimizer::default());

    let orch = orchestrator(
        &config,
        engine.clone(),
        Some(crawl_client(&server)),
        store.clone(),
        optimizer.clone(),
    );
    let result = orch
        .render_request(exhausted_request("https://example.com/old", false))
        .await
        .unwrap();

    assert_eq!(result.status, 200);
    assert_eq!(result.html.as_deref(), Some("<p>stale</p>"));
    assert_eq!(store.achieves.load(Ordering::SeqCst), 1);
    assert_eq!(engine.opened(), 0);
    assert!(optimizer.modes().is_empty());
    assert_eq!(store.set_count(), 0);
}

#[tokio::test]
async fn test_exhausted_budget_on_first_request_returns_nothing() {
    let config = Config::default();
    let engine = Arc::new(ScriptedEngine::serving(PAGE));
    let store = Arc::new(RecordingStore::new());

    let orch = orchestrator(
        &config,
        engine.clone(),
        None,
        store.clone(),
        Arc::new(CountingOptimizer::default()),
    );
    let result = orch
        .render_request(exhausted_request("https://example.com/new", true))
        .await;

    assert!(result.is_none());
    assert_eq!(engine.opened(), 0);
    assert_eq!(store.achieves.load(Ordering::SeqCst), 0);
    assert_eq!(store.set_count(), 0);
    assert!(store.removed().is_empty());
}

#[tokio::test]
async fn test_exhausted_budget_without_cached_copy_returns_nothing() {
    let config = Config::default();
    let store = Arc::new(RecordingStore::new());

    let orch = orchestrator(
        &config,
        Arc::new(ScriptedEngine::serving(PAGE)),
        None,
        store.clone(),
        Arc::new(CountingOptimizer::default()),
    );

    assert!(orch
        .render_request(exhausted_request("https://example.com/none", false))
        .await
        .is_none());
    assert_eq!(store.achieves.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_external_crawl_success_is_optimized_and_cached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/render"))
        .and(query_param("url", "https://example.com/product/42"))
        .and(query_param("isFirstRequest", "true"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"{"status":200,"data":"<html><body>42</body></html>"}"#),
        )
        .expect(1)
        .mount(&server)
        .await;

    let config = Config::default();
    let engine = Arc::new(ScriptedEngine::serving(PAGE));
    let store = Arc::new(RecordingStore::new());
    let optimizer = Arc::new(CountingOptimizer::default());

    let orch = orchestrator(
        &config,
        engine.clone(),
        Some(crawl_client(&server)),
        store.clone(),
        optimizer.clone(),
    );
    let result = orch
        .render("https://example.com/product/42", true)
        .await
        .unwrap();

    let expected = "optimized:<html><body>42</body></html>";
    assert_eq!(result.status, 200);
    assert_eq!(result.html.as_deref(), Some(expected));
    assert_eq!(optimizer.modes(), vec![OptimizeMode::Full]);
    assert_eq!(engine.opened(), 0);

    let sets = store.sets.lock().unwrap().clone();
    assert_eq!(
        sets,
        vec![(
            "https://example.com/product/42".to_string(),
            expected.to_string(),
            ContentState::Optimized
        )]
    );
}

#[tokio::test]
async fn test_external_crawl_500_falls_back_to_engine_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/render"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"status":500}"#))
        .expect(1)
        .mount(&server)
        .await;

    let config = Config::default();
    let engine = Arc::new(ScriptedEngine::serving(PAGE));
    let store = Arc::new(RecordingStore::new());

    let orch = orchestrator(
        &config,
        engine.clone(),
        Some(crawl_client(&server)),
        store.clone(),
        Arc::new(CountingOptimizer::default()),
    );
    let result = orch.render("https://example.com/p", true).await.unwrap();

    assert_eq!(result.status, 200);
    assert_eq!(engine.opened(), 1);
    assert_eq!(engine.closed(), 1);
    assert_eq!(store.set_count(), 1);
}

#[tokio::test]
async fn test_unreachable_crawl_endpoint_falls_back_to_engine() {
    let mut config = Config::default();
    config.crawl.endpoint = Some(format!("{}/render", refused_base_url()));
    let crawl = CrawlEndpoint::from_config(
        &config.crawl,
        &UserAgentConfig::default(),
        Duration::from_secs(5),
    )
    .unwrap()
    .unwrap();
    let engine = Arc::new(ScriptedEngine::serving(PAGE));
    let store = Arc::new(RecordingStore::new());

    let orch = orchestrator(
        &config,
        engine.clone(),
        Some(crawl),
        store.clone(),
        Arc::new(CountingOptimizer::default()),
    );

    let result = orch.render("https://example.com/p", true).await.unwrap();
    assert_eq!(result.status, 200);
    assert_eq!(engine.opened(), 1);
    assert_eq!(engine.closed(), 1);
    assert_eq!(store.set_count(), 1);
}

#[tokio::test]
async fn test_sentinel_page_is_404_and_evicted() {
    let config = Config::default();
    let engine = Arc::new(ScriptedEngine::serving(NOT_FOUND_PAGE));
    let store = Arc::new(RecordingStore::new());
    store.seed("https://example.com/gone", "<p>old</p>").await;
    let optimizer = Arc::new(CountingOptimizer::default());

    let orch = orchestrator(
        &config,
        engine.clone(),
        None,
        store.clone(),
        optimizer.clone(),
    );
    let result = orch.render("https://example.com/gone", false).await.unwrap();

    assert_eq!(result.status, 404);
    assert_eq!(result.html.as_deref(), Some("Page not found!"));
    assert_eq!(store.removed(), vec!["https://example.com/gone".to_string()]);
    assert!(store.get("https://example.com/gone").await.unwrap().is_none());
    assert_eq!(store.set_count(), 0);
    assert!(optimizer.modes().is_empty());
    assert_eq!(engine.closed(), 1);
}

#[tokio::test]
async fn test_uncacheable_status_returns_raw_html() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/render"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(r#"{"status":410,"data":"<p>removed</p>"}"#),
        )
        .mount(&server)
        .await;

    let config = Config::default();
    let store = Arc::new(RecordingStore::new());
    store.seed("https://example.com/removed", "<p>old</p>").await;

    let orch = orchestrator(
        &config,
        Arc::new(ScriptedEngine::serving(PAGE)),
        Some(crawl_client(&server)),
        store.clone(),
        Arc::new(CountingOptimizer::default()),
    );
    let result = orch
        .render("https://example.com/removed", false)
        .await
        .unwrap();

    assert_eq!(result.status, 410);
    assert_eq!(result.html.as_deref(), Some("<p>removed</p>"));
    assert!(store.get("https://example.com/removed").await.unwrap().is_none());
}

#[tokio::test]
async fn test_optimizer_failure_never_writes_cache() {
    let config = Config::default();
    let store = Arc::new(RecordingStore::new());

    let orch = orchestrator(
        &config,
        Arc::new(ScriptedEngine::serving(PAGE)),
        None,
        store.clone(),
        Arc::new(FailingOptimizer),
    );
    let result = orch.render("https://example.com/p", false).await;

    assert!(result.is_none());
    assert_eq!(store.set_count(), 0);
}

#[tokio::test]
async fn test_repeated_renders_write_same_key_with_fresh_entries() {
    let config = Config::default();
    let store = Arc::new(RecordingStore::new());
    let url = "https://example.com/repeat";

    let orch = orchestrator(
        &config,
        Arc::new(ScriptedEngine::serving(PAGE)),
        None,
        store.clone(),
        Arc::new(CountingOptimizer::default()),
    );

    orch.render(url, true).await.unwrap();
    let first = store.get(url).await.unwrap().unwrap();
    orch.render(url, false).await.unwrap();
    let second = store.get(url).await.unwrap().unwrap();

    let sets = store.sets.lock().unwrap().clone();
    assert_eq!(sets.len(), 2);
    assert!(sets.iter().all(|(key, _, _)| key == url));
    assert!(second.last_written_at >= first.last_written_at);
    assert!(second.is_intact());
}

#[tokio::test]
async fn test_fatal_navigation_error_returns_500_without_fallback() {
    let config = Config::default();
    let engine = Arc::new(ScriptedEngine::serving(PAGE).with_goto(GotoBehaviour::Fail));
    let store = Arc::new(RecordingStore::new());
    store.seed("https://example.com/p", "<p>stale</p>").await;

    let orch = orchestrator(
        &config,
        engine.clone(),
        None,
        store.clone(),
        Arc::new(CountingOptimizer::default()),
    );
    let result = orch.render("https://example.com/p", false).await.unwrap();

    assert_eq!(result.status, 500);
    assert!(result.html.is_none());
    assert_eq!(store.achieves.load(Ordering::SeqCst), 0);
    assert_eq!(store.set_count(), 0);
    assert!(store.removed().is_empty());
    assert_eq!(engine.closed(), 1);
}

#[tokio::test]
async fn test_navigation_timeout_uses_best_effort_content() {
    let config = Config::default();
    let engine = Arc::new(ScriptedEngine::serving(PAGE).with_goto(GotoBehaviour::TimeOut));
    let store = Arc::new(RecordingStore::new());

    let orch = orchestrator(
        &config,
        engine.clone(),
        None,
        store.clone(),
        Arc::new(CountingOptimizer::default()),
    );
    let result = orch.render("https://example.com/slow", true).await.unwrap();

    assert_eq!(result.status, 200);
    assert_eq!(store.set_count(), 1);
    assert_eq!(engine.closed(), 1);
}

#[tokio::test]
async fn test_no_renderer_serves_stale_on_repeat_request() {
    let config = Config::default();
    let store = Arc::new(RecordingStore::new());
    store.seed("https://example.com/p", "<p>stale</p>").await;

    let orch = orchestrator(
        &config,
        Arc::new(ScriptedEngine::unavailable()),
        None,
        store.clone(),
        Arc::new(CountingOptimizer::default()),
    );

    let result = orch.render("https://example.com/p", false).await.unwrap();
    assert_eq!(result.html.as_deref(), Some("<p>stale</p>"));

    assert!(orch.render("https://example.com/p", true).await.is_none());
}

#[tokio::test]
async fn test_page_setup_failure_falls_back_to_stale() {
    let config = Config::default();
    let engine = Arc::new(ScriptedEngine::serving(PAGE).failing_setup());
    let store = Arc::new(RecordingStore::new());
    store.seed("https://example.com/p", "<p>stale</p>").await;

    let orch = orchestrator(
        &config,
        engine.clone(),
        None,
        store.clone(),
        Arc::new(CountingOptimizer::default()),
    );
    let result = orch.render("https://example.com/p", false).await.unwrap();

    assert_eq!(result.html.as_deref(), Some("<p>stale</p>"));
    assert_eq!(engine.closed(), 1);
    assert!(engine.navigated_urls().is_empty());
}

#[tokio::test]
async fn test_disabled_optimization_caches_raw_html() {
    let mut config = Config::default();
    config.optimize.disable_optimize = true;
    let store = Arc::new(RecordingStore::new());
    let optimizer = Arc::new(CountingOptimizer::default());

    let orch = orchestrator(
        &config,
        Arc::new(ScriptedEngine::serving(PAGE)),
        None,
        store.clone(),
        optimizer.clone(),
    );
    let result = orch.render("https://example.com/raw", true).await.unwrap();

    assert_eq!(result.html.as_deref(), Some(PAGE));
    assert!(optimizer.modes().is_empty());
    let entry = store.get("https://example.com/raw").await.unwrap().unwrap();
    assert_eq!(entry.state, ContentState::Raw);
}

#[tokio::test]
async fn test_cache_write_failure_still_serves_optimized_html() {
    let config = Config::default();
    let store = Arc::new(RecordingStore::failing_writes());

    let orch = orchestrator(
        &config,
        Arc::new(ScriptedEngine::serving(PAGE)),
        None,
        store.clone(),
        Arc::new(CountingOptimizer::default()),
    );
    let result = orch.render("https://example.com/p", true).await.unwrap();

    assert_eq!(result.status, 200);
    assert_eq!(result.html, Some(format!("optimized:{}", PAGE)));
}

#[tokio::test]
async fn test_special_info_becomes_headers_and_is_stripped() {
    let config = Config::default();
    let engine = Arc::new(ScriptedEngine::serving(PAGE));

    let orch = orchestrator(
        &config,
        engine.clone(),
        None,
        Arc::new(RecordingStore::new()),
        Arc::new(CountingOptimizer::default()),
    );
    orch.render(
        "https://example.com/p?id=7&botInfo=googlebot&deviceInfo=mobile&localeInfo=vi&environmentInfo=prod",
        true,
    )
    .await
    .unwrap();

    let navigations = engine.navigations.lock().unwrap().clone();
    assert_eq!(navigations.len(), 1);
    let (url, headers) = &navigations[0];
    assert_eq!(url, "https://example.com/p?id=7");
    assert_eq!(headers.get("botinfo").map(String::as_str), Some("googlebot"));
    assert_eq!(headers.get("deviceinfo").map(String::as_str), Some("mobile"));
    assert_eq!(headers.get("localeinfo").map(String::as_str), Some("vi"));
    assert_eq!(headers.get("environmentinfo").map(String::as_str), Some("prod"));
    assert_eq!(headers.get("service").map(String::as_str), Some("isr-prerender"));
}

#[tokio::test]
async fn test_concurrent_renders_of_distinct_urls() {
    let config = Config::default();
    let engine = Arc::new(ScriptedEngine::serving(PAGE));
    let store = Arc::new(RecordingStore::new());

    let orch = Arc::new(orchestrator(
        &config,
        engine.clone(),
        None,
        store.clone(),
        Arc::new(CountingOptimizer::default()),
    ));

    let mut handles = Vec::new();
    for i in 0..8 {
        let orch = Arc::clone(&orch);
        handles.push(tokio::spawn(async move {
            orch.render(&format!("https://example.com/{}", i), true).await
        }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap().status, 200);
    }

    assert_eq!(store.set_count(), 8);
    assert_eq!(engine.opened(), 8);
    assert_eq!(engine.closed(), 8);
}
