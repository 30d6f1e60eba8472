//! HTTP render engine tests, including a full render through the real
//! optimizer pool and SQLite store

use isr_prerender::cache::{CacheStore, ContentState, SqliteCacheStore};
use isr_prerender::config::{Config, UserAgentConfig};
use isr_prerender::engine::{HttpRenderEngine, NetworkEvent, PageHandle, RenderEngine};
use isr_prerender::optimize::OptimizerPool;
use isr_prerender::render::{intercept_policy, navigation_headers, Acquirer, AcquisitionOutcome};
use isr_prerender::{Orchestrator, RenderRequest};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::support::{fast_settle, refused_base_url};

fn engine(max_pages: usize) -> HttpRenderEngine {
    HttpRenderEngine::new(&UserAgentConfig::default(), max_pages, Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn test_page_navigation_sends_headers_and_emits_event() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/page"))
        .and(header("service", "isr-prerender"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<main>hi</main>"))
        .expect(1)
        .mount(&server)
        .await;

    let engine = engine(1);
    let mut page = engine.new_page().await.unwrap();
    page.set_request_interception(intercept_policy()).await.unwrap();
    page.set_extra_headers(navigation_headers(None)).await.unwrap();
    let mut events = page.network_events();

    let navigation = page.goto(&format!("{}/page", server.uri())).await.unwrap();
    assert_eq!(navigation.status, Some(200));
    assert_eq!(page.content().await.unwrap(), "<main>hi</main>");
    assert_eq!(
        events.try_recv().unwrap(),
        NetworkEvent::RequestFinished { from_cache: false }
    );

    page.close().await.unwrap();
}

#[tokio::test]
async fn test_unreachable_host_is_fatal_navigation_error() {
    let url = format!("{}/page", refused_base_url());

    let engine = engine(1);
    let mut page = engine.new_page().await.unwrap();
    let err = page.goto(&url).await.unwrap_err();

    assert!(!err.is_timeout());
    page.close().await.unwrap();
}

#[tokio::test]
async fn test_slow_response_is_timeout_classified() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<main>late</main>")
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let engine = HttpRenderEngine::new(
        &UserAgentConfig::default(),
        1,
        Duration::from_millis(200),
    )
    .unwrap();
    let mut page = engine.new_page().await.unwrap();
    let err = page.goto(&server.uri()).await.unwrap_err();

    assert!(err.is_timeout());
    assert_eq!(page.content().await.unwrap(), "");
    page.close().await.unwrap();
}

#[tokio::test]
async fn test_acquirer_classifies_sentinel_and_releases_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(r#"<div id="404-page">Not found</div>"#),
        )
        .mount(&server)
        .await;

    let config = Config::default();
    let engine = Arc::new(engine(1));
    let acquirer = Acquirer::new(engine.clone(), None, &config.render)
        .with_settle_timing(fast_settle());

    let outcome = acquirer
        .acquire(&RenderRequest::new(format!("{}/missing", server.uri()), true))
        .await;

    assert!(matches!(
        outcome,
        AcquisitionOutcome::BrowserRenderSuccess { status: 404, .. }
    ));
    assert_eq!(engine.available_pages(), 1);
}

#[tokio::test]
async fn test_exhausted_page_pool_reports_no_renderer() {
    let config = Config::default();
    let engine = Arc::new(engine(1));
    let held = engine.new_page().await.unwrap();

    let acquirer = Acquirer::new(engine.clone(), None, &config.render);
    let outcome = acquirer
        .acquire(&RenderRequest::new("https://example.com/", true))
        .await;

    assert_eq!(outcome, AcquisitionOutcome::NoRendererAvailable);
    drop(held);
}

#[tokio::test]
async fn test_full_render_through_pool_and_sqlite() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/article"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "<html>\n<head><script src=\"/app.js\"></script></head>\n<body>\n  <div><h1 class=\"t\">Title</h1></div>\n</body>\n</html>",
        ))
        .mount(&server)
        .await;

    let config = Config::default();
    let store = Arc::new(SqliteCacheStore::new_in_memory().unwrap());
    let pool = OptimizerPool::start(&config.optimize);
    let acquirer = Acquirer::new(Arc::new(engine(2)), None, &config.render)
        .with_settle_timing(fast_settle());
    let orchestrator = Orchestrator::new(&config, acquirer, store.clone(), Arc::new(pool.clone()));

    let url = format!("{}/article", server.uri());
    let result = orchestrator.render(&url, true).await.unwrap();

    let expected = "<html> <head></head> <body> <h1>Title</h1> </body> </html>";
    assert_eq!(result.status, 200);
    assert_eq!(result.html.as_deref(), Some(expected));

    let entry = store.get(&url).await.unwrap().unwrap();
    assert_eq!(entry.html, expected);
    assert_eq!(entry.state, ContentState::Optimized);

    pool.shutdown().await;
}
