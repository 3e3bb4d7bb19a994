use super::{router, AppState};
use crate::core::retry::RetryConfig;
use crate::core::ServiceConfig;
use crate::fetcher::{FetchError, FetchOutcome, Fetcher, MockFetcher, MockResponse};
use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PAGE: &str = r#"<!DOCTYPE html>
<html>
  <head>
    <title>Example Domain</title>
    <meta name="description" content="Illustrative examples">
  </head>
  <body>
    <h1>Example Domain</h1>
    <p>This domain is for use in illustrative examples.</p>
    <a href="https://www.iana.org/domains/example">More information...</a>
    <a href="/docs">Docs</a>
  </body>
</html>"#;

fn config() -> ServiceConfig {
    ServiceConfig::default().with_retry(RetryConfig::disabled())
}

fn live_app() -> Router {
    router(AppState::initialize(config()).unwrap())
}

fn mock_app(fetcher: &MockFetcher) -> (AppState, Router) {
    let state = AppState::with_fetcher(config(), Arc::new(fetcher.clone()));
    (state.clone(), router(state))
}

fn post_json(uri: &str, body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(body.into())
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn html_server(body: &str, content_type: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, content_type))
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn test_scrape_default_fields() {
    let server = html_server(PAGE, "text/html; charset=utf-8").await;
    let url = format!("{}/", server.uri());

    let (status, body) = send(
        live_app(),
        post_json("/scrape", json!({ "url": url }).to_string()),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(body["http_status"], 200);
    assert_eq!(body["fields"]["title"], "Example Domain");
    assert_eq!(body["fields"]["description"], "Illustrative examples");
    assert_eq!(
        body["fields"]["links"],
        json!(["https://www.iana.org/domains/example", format!("{}/docs", server.uri())])
    );
    assert!(body["fields"]["text"]
        .as_str()
        .unwrap()
        .contains("illustrative examples"));
    assert_eq!(body["no_matches"], false);
}

#[tokio::test]
async fn test_scrape_with_rules() {
    let server = html_server(PAGE, "text/html").await;
    let request = json!({
        "url": format!("{}/", server.uri()),
        "rules": {
            "heading": "h1",
            "docs": {"xpath": "//a[2]/@href"},
            "paragraphs": {"css": "p", "all": true},
            "missing": ".price"
        }
    });

    let (status, body) = send(live_app(), post_json("/scrape", request.to_string())).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["fields"]["heading"], "Example Domain");
    assert_eq!(body["fields"]["docs"], format!("{}/docs", server.uri()));
    assert_eq!(
        body["fields"]["paragraphs"],
        json!(["This domain is for use in illustrative examples."])
    );
    assert_eq!(body["fields"]["missing"], Value::Null);
}

#[tokio::test]
async fn test_malformed_url_is_rejected_without_fetching() {
    let fetcher = MockFetcher::new(vec![MockResponse::html(PAGE)]);
    let (_, app) = mock_app(&fetcher);

    let (status, body) = send(app, post_json("/scrape", r#"{"url": "not-a-url"}"#)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "failure");
    assert_eq!(body["error"], "InvalidInput");
    assert_eq!(body["url"], "not-a-url");
    assert!(body.get("fields").is_none());
    assert_eq!(fetcher.calls(), 0);
}

#[tokio::test]
async fn test_malformed_bodies_are_invalid_input() {
    let fetcher = MockFetcher::new(vec![MockResponse::html(PAGE)]);

    for body in [
        "{not json",
        r#"{"rules": {}}"#,
        r#"{"url": "https://example.com", "mode": "selenium"}"#,
        r#"{"url": "https://example.com", "rules": {"a": {"jsonpath": "$"}}}"#,
    ] {
        let (_, app) = mock_app(&fetcher);
        let (status, value) = send(app, post_json("/scrape", body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body {body}");
        assert_eq!(value["status"], "failure");
        assert_eq!(value["error"], "InvalidInput");
    }
    assert_eq!(fetcher.calls(), 0);
}

#[tokio::test]
async fn test_connection_refused_is_upstream_unavailable() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let (status, body) = send(
        live_app(),
        post_json(
            "/scrape",
            json!({ "url": format!("http://127.0.0.1:{port}/") }).to_string(),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["status"], "failure");
    assert_eq!(body["error"], "UpstreamUnavailable");
}

#[tokio::test]
async fn test_upstream_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(PAGE, "text/html")
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let request = json!({"url": format!("{}/", server.uri()), "timeout_ms": 50});
    let (status, body) = send(live_app(), post_json("/scrape", request.to_string())).await;

    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(body["error"], "UpstreamUnavailable");
}

#[tokio::test]
async fn test_upstream_error_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
        .mount(&server)
        .await;

    let request = json!({"url": format!("{}/gone", server.uri())});
    let (status, body) = send(live_app(), post_json("/scrape", request.to_string())).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "UpstreamUnavailable");
    assert_eq!(body["http_status"], 404);
}

#[tokio::test]
async fn test_binary_content_is_unparseable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(vec![0x89, b'P', b'N', b'G'], "image/png"))
        .mount(&server)
        .await;

    let request = json!({"url": format!("{}/logo.png", server.uri())});
    let (status, body) = send(live_app(), post_json("/scrape", request.to_string())).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "UnparseableContent");
    assert!(body.get("fields").is_none());
}

#[tokio::test]
async fn test_repeated_requests_give_identical_fields() {
    let server = html_server(PAGE, "text/html").await;
    let request = json!({"url": format!("{}/", server.uri()), "rules": {"links": {"css": "a", "attr": "href", "all": true}}});
    let app = live_app();

    let (_, first) = send(app.clone(), post_json("/scrape", request.to_string())).await;
    let (_, second) = send(app, post_json("/scrape", request.to_string())).await;

    assert_eq!(first["fields"], second["fields"]);
    assert_ne!(first["id"], second["id"]);
}

#[tokio::test]
async fn test_scrape_csv() {
    let fetcher = MockFetcher::new(vec![MockResponse::html(
        r#"<ul><li>One, two</li><li>Three "four"</li></ul><h1>Heading</h1>"#,
    )]);
    let (_, app) = mock_app(&fetcher);
    let request = json!({
        "url": "https://example.com/",
        "rules": {"heading": "h1", "items": {"css": "li", "all": true}}
    });

    let response = app
        .oneshot(post_json("/scrape/csv", request.to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/csv; charset=utf-8"
    );
    let disposition = response.headers()[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.starts_with("attachment; filename=\"scraped_"));
    assert!(disposition.ends_with(".csv\""));

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(
        String::from_utf8(bytes.to_vec()).unwrap(),
        "field,value\r\nheading,Heading\r\nitems,\"One, two\"\r\nitems,\"Three \"\"four\"\"\"\r\n"
    );
}

#[tokio::test]
async fn test_scrape_csv_failure_is_json() {
    let fetcher = MockFetcher::new(vec![MockResponse::html(PAGE)]);
    let (_, app) = mock_app(&fetcher);

    let (status, body) = send(app, post_json("/scrape/csv", r#"{"url": "ftp://example.com"}"#)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "InvalidInput");
}

#[tokio::test]
async fn test_scrape_products() {
    let fetcher = MockFetcher::new(vec![MockResponse::html(
        r#"<div class="grid">
             <div class="product-tile"><a href="/p/1">Linen shirt, blue</a><span class="price">$39.00</span></div>
             <div class="product-tile"><a href="/p/2">Linen shirt, white</a><span class="price">$41.50</span></div>
           </div>"#,
    )]);
    let (_, app) = mock_app(&fetcher);
    let request = json!({"url": "https://shop.example.com/", "product_limit": 5});

    let (status, body) = send(app, post_json("/scrape", request.to_string())).await;

    assert_eq!(status, StatusCode::OK);
    let products = body["fields"]["products"].as_array().unwrap();
    assert_eq!(products.len(), 2);
    assert_eq!(products[0]["title"], "Linen shirt, blue");
    assert_eq!(products[0]["price"], "$39.00");
    assert_eq!(products[0]["link"], "https://shop.example.com/p/1");
    assert!(body["fields"]["title"].is_null());
}

#[tokio::test]
async fn test_analyze() {
    let fetcher = MockFetcher::new(vec![MockResponse::html(
        r#"<div class="add-to-cart"></div><script>Vue.createApp({})</script>"#,
    )]);
    let (_, app) = mock_app(&fetcher);

    let (status, body) = send(app.clone(), get("/analyze?url=https://example.com/")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_dynamic"], true);
    assert_eq!(body["recommended_method"], "browser");
    assert!(body["detected_patterns"]
        .as_array()
        .unwrap()
        .contains(&json!("'cart' pattern found")));

    let (status, body) = send(app.clone(), get("/analyze")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "InvalidInput");

    let (status, _) = send(app, get("/analyze?url=not-a-url")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(fetcher.calls(), 1);
}

#[tokio::test]
async fn test_service_endpoints() {
    let fetcher = MockFetcher::new(vec![MockResponse::html(PAGE)]);
    let (state, app) = mock_app(&fetcher);

    let (status, body) = send(app.clone(), get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert!(body["timestamp"].is_string());

    let (status, body) = send(app.clone(), get("/")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["service"], "webscraper-api");
    assert!(body["endpoints"]["POST /scrape"].is_string());

    send(app.clone(), post_json("/scrape", r#"{"url": "https://example.com/"}"#)).await;
    send(app.clone(), post_json("/scrape", r#"{"url": "nope"}"#)).await;

    let (status, body) = send(app, get("/stats")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_scrapes"], 2);
    assert_eq!(body["successful_scrapes"], 1);
    assert_eq!(body["failed_scrapes"], 1);
    assert_eq!(body["error_codes"]["InvalidInput"], 1);
    assert_eq!(state.stats().get_stats().upstream_requests, 1);
}

#[tokio::test]
async fn test_cors_headers() {
    let fetcher = MockFetcher::new(vec![]);
    let (_, app) = mock_app(&fetcher);

    let request = Request::builder()
        .uri("/health")
        .header(header::ORIGIN, "https://dashboard.example.org")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
}

struct PanickingFetcher;

#[async_trait]
impl Fetcher for PanickingFetcher {
    async fn fetch(&self, _url: &Url, _timeout: Duration) -> Result<FetchOutcome, FetchError> {
        panic!("fetcher exploded");
    }
}

#[tokio::test]
async fn test_handler_panic_is_internal_fault() {
    let state = AppState::with_fetcher(config(), Arc::new(PanickingFetcher));
    let app = router(state);

    let (status, body) = send(
        app.clone(),
        post_json("/scrape", r#"{"url": "https://example.com/"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["status"], "failure");
    assert_eq!(body["error"], "InternalFault");
    assert_eq!(body["message"], "internal error");

    let (status, _) = send(app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
}
