use axum::http::{self, Request, StatusCode};
use http_body_util::BodyExt;
use mock_server::{app, Echo, BYTES, MALFORMED, TEXT};
use serde_json::{json, Value};
use tower::ServiceExt;

async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn request(method: &str, uri: &str) -> Request<String> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(String::new())
        .unwrap()
}

fn location(response: &axum::response::Response) -> &str {
    response.headers()[http::header::LOCATION].to_str().unwrap()
}

// --- bodies ---

#[tokio::test]
async fn json_route_returns_json() {
    let resp = app().oneshot(request("GET", "/json")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[http::header::CONTENT_TYPE], "application/json");
    let body: Value = body_json(resp).await;
    assert_eq!(body, json!({"ok": true}));
}

#[tokio::test]
async fn text_route_is_plain_text() {
    let resp = app().oneshot(request("GET", "/text")).await.unwrap();

    let content_type = resp.headers()[http::header::CONTENT_TYPE].to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/plain"));
    assert_eq!(body_bytes(resp).await, TEXT.as_bytes());
}

#[tokio::test]
async fn bytes_route_is_octet_stream() {
    let resp = app().oneshot(request("GET", "/bytes")).await.unwrap();

    assert_eq!(resp.headers()[http::header::CONTENT_TYPE], "application/octet-stream");
    assert_eq!(body_bytes(resp).await, BYTES);
}

#[tokio::test]
async fn malformed_route_claims_json() {
    let resp = app().oneshot(request("GET", "/malformed")).await.unwrap();

    assert_eq!(resp.headers()[http::header::CONTENT_TYPE], "application/json");
    assert_eq!(body_bytes(resp).await, MALFORMED.as_bytes());
}

#[tokio::test]
async fn chunked_route_reassembles() {
    let resp = app().oneshot(request("GET", "/chunked")).await.unwrap();

    let body: Value = body_json(resp).await;
    assert_eq!(body, json!({"items": [1, 2, 3]}));
}

#[tokio::test]
async fn echo_reports_what_it_received() {
    let req = Request::builder()
        .method("PATCH")
        .uri("/echo")
        .header(http::header::CONTENT_TYPE, "text/plain")
        .header("x-custom", "yes")
        .body("hello".to_string())
        .unwrap();
    let resp = app().oneshot(req).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let echo: Echo = body_json(resp).await;
    assert_eq!(echo.method, "PATCH");
    assert_eq!(echo.content_type.as_deref(), Some("text/plain"));
    assert_eq!(echo.body, "hello");
    assert_eq!(echo.headers["x-custom"], "yes");
}

// --- redirects ---

#[tokio::test]
async fn moved_points_at_json() {
    let resp = app().oneshot(request("POST", "/moved")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), "/json");
}

#[tokio::test]
async fn permanent_uses_absolute_location() {
    let req = Request::builder()
        .uri("/permanent")
        .header(http::header::HOST, "fixture.test:8080")
        .body(String::new())
        .unwrap();
    let resp = app().oneshot(req).await.unwrap();

    assert_eq!(resp.status(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(location(&resp), "http://fixture.test:8080/json");
}

#[tokio::test]
async fn redirect_chain_counts_down_to_echo() {
    let resp = app().oneshot(request("GET", "/redirect/3")).await.unwrap();
    assert_eq!(location(&resp), "/redirect/2");

    let resp = app().oneshot(request("GET", "/redirect/1")).await.unwrap();
    assert_eq!(location(&resp), "/echo");
}

#[tokio::test]
async fn loop_points_at_itself() {
    let resp = app().oneshot(request("GET", "/loop")).await.unwrap();
    assert_eq!(location(&resp), "/loop");
}

#[tokio::test]
async fn no_location_has_no_header() {
    let resp = app().oneshot(request("GET", "/no-location")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::FOUND);
    assert!(resp.headers().get(http::header::LOCATION).is_none());
}

// --- statuses ---

#[tokio::test]
async fn no_content_is_empty() {
    let resp = app().oneshot(request("DELETE", "/no-content")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert!(body_bytes(resp).await.is_empty());
}

#[tokio::test]
async fn status_route_echoes_code() {
    let resp = app().oneshot(request("PUT", "/status/418")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::IM_A_TEAPOT);
}

#[tokio::test]
async fn slow_headers_still_answer() {
    let resp = app().oneshot(request("GET", "/slow-headers/5")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn slow_body_completes_after_the_stall() {
    let resp = app().oneshot(request("GET", "/slow-body/5")).await.unwrap();

    let body: Value = body_json(resp).await;
    assert_eq!(body, json!({"ok": true}));
}

#[tokio::test]
async fn abort_body_fails_midway() {
    let resp = app().oneshot(request("GET", "/abort")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.into_body().collect().await.is_err());
}

// --- hit counting ---

#[tokio::test]
async fn flaky_recovers_and_hits_are_counted() {
    use tower::Service;

    let mut app = app().into_service();

    for expected in [StatusCode::SERVICE_UNAVAILABLE, StatusCode::SERVICE_UNAVAILABLE, StatusCode::OK] {
        let resp = ServiceExt::ready(&mut app)
            .await
            .unwrap()
            .call(request("GET", "/flaky/3"))
            .await
            .unwrap();
        assert_eq!(resp.status(), expected);
    }

    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(request("GET", "/status/500"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(request("GET", "/hits"))
        .await
        .unwrap();
    let hits: Value = body_json(resp).await;
    assert_eq!(hits, json!({"hits": 4}));
}

#[tokio::test]
async fn fresh_app_has_no_hits() {
    let resp = app().oneshot(request("GET", "/hits")).await.unwrap();

    let hits: Value = body_json(resp).await;
    assert_eq!(hits, json!({"hits": 0}));
}
