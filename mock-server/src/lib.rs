//! Fixture HTTP server for exercising the request engine.
//!
//! Every route produces one response shape the client has to cope with:
//! plain bodies, malformed JSON, redirects, empty responses, error statuses,
//! stalls and aborted connections. Hit counters are per `app()` instance.

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use bytes::Bytes;
use futures_util::{stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::net::TcpListener;
use tracing::debug;

/// What `/echo` saw.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Echo {
    pub method: String,
    pub content_type: Option<String>,
    pub content_length: Option<String>,
    pub user_agent: Option<String>,
    pub body: String,
    pub headers: BTreeMap<String, String>,
}

#[derive(Clone, Default)]
pub struct Hits(Arc<AtomicUsize>);

impl Hits {
    fn record(&self) -> usize {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

pub const TEXT: &str = "plain text response";
pub const BYTES: &[u8] = &[0x00, 0xff, 0xfe, 0x80, 0x7f];
pub const MALFORMED: &str = "{\"ok\": tru";

pub fn app() -> Router {
    Router::new()
        .route("/json", get(json_ok))
        .route("/text", get(text))
        .route("/bytes", get(raw_bytes))
        .route("/malformed", get(malformed))
        .route("/chunked", get(chunked))
        .route("/echo", any(echo))
        .route("/moved", any(moved))
        .route("/permanent", any(permanent))
        .route("/redirect/{n}", any(redirect_chain))
        .route("/loop", any(redirect_loop))
        .route("/no-location", any(no_location))
        .route("/no-content", any(no_content))
        .route("/status/{code}", any(status))
        .route("/flaky/{n}", get(flaky))
        .route("/hits", get(hits))
        .route("/slow-headers/{ms}", get(slow_headers))
        .route("/slow-body/{ms}", get(slow_body))
        .route("/abort", get(abort))
        .with_state(Hits::default())
}

pub async fn run(listener: TcpListener) -> Result<(), io::Error> {
    axum::serve(listener, app()).await
}

async fn json_ok() -> Json<serde_json::Value> {
    Json(json!({"ok": true}))
}

async fn text() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], TEXT)
}

async fn raw_bytes() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "application/octet-stream")], BYTES)
}

async fn malformed() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "application/json")], MALFORMED)
}

async fn chunked() -> impl IntoResponse {
    let parts = ["{\"items\":", "[1,", "2,", "3]}"];
    let body = stream::iter(parts).then(|part| async move {
        tokio::time::sleep(Duration::from_millis(5)).await;
        Ok::<_, Infallible>(Bytes::from_static(part.as_bytes()))
    });
    (
        [(header::CONTENT_TYPE, "application/json")],
        Body::from_stream(body),
    )
}

async fn echo(method: Method, headers: HeaderMap, body: Bytes) -> Json<Echo> {
    let value = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    let all = headers
        .iter()
        .filter_map(|(name, v)| Some((name.as_str().to_string(), v.to_str().ok()?.to_string())))
        .collect();
    Json(Echo {
        method: method.to_string(),
        content_type: value(header::CONTENT_TYPE),
        content_length: value(header::CONTENT_LENGTH),
        user_agent: value(header::USER_AGENT),
        body: String::from_utf8_lossy(&body).into_owned(),
        headers: all,
    })
}

fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

async fn moved() -> Response {
    found("/json")
}

async fn permanent(headers: HeaderMap) -> Response {
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    (
        StatusCode::MOVED_PERMANENTLY,
        [(header::LOCATION, format!("http://{host}/json"))],
    )
        .into_response()
}

async fn redirect_chain(Path(n): Path<u32>) -> Response {
    if n <= 1 {
        found("/echo")
    } else {
        found(&format!("/redirect/{}", n - 1))
    }
}

async fn redirect_loop() -> Response {
    found("/loop")
}

async fn no_location() -> StatusCode {
    StatusCode::FOUND
}

async fn no_content() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn status(State(hits): State<Hits>, Path(code): Path<u16>) -> Response {
    let hit = hits.record();
    debug!(code, hit, "status");
    match StatusCode::from_u16(code) {
        Ok(code) => (code, Json(json!({"status": code.as_u16()}))).into_response(),
        Err(_) => StatusCode::BAD_REQUEST.into_response(),
    }
}

async fn flaky(State(hits): State<Hits>, Path(n): Path<usize>) -> Response {
    let hit = hits.record();
    debug!(n, hit, "flaky");
    if hit < n {
        StatusCode::SERVICE_UNAVAILABLE.into_response()
    } else {
        Json(json!({"ok": true, "hit": hit})).into_response()
    }
}

async fn hits(State(hits): State<Hits>) -> Json<serde_json::Value> {
    Json(json!({"hits": hits.get()}))
}

async fn slow_headers(Path(ms): Path<u64>) -> Json<serde_json::Value> {
    tokio::time::sleep(Duration::from_millis(ms)).await;
    Json(json!({"ok": true}))
}

async fn slow_body(Path(ms): Path<u64>) -> impl IntoResponse {
    let first = stream::once(async { Ok::<_, Infallible>(Bytes::from_static(b"{\"ok\":")) });
    let rest = stream::once(async move {
        tokio::time::sleep(Duration::from_millis(ms)).await;
        Ok(Bytes::from_static(b"true}"))
    });
    (
        [(header::CONTENT_TYPE, "application/json")],
        Body::from_stream(first.chain(rest)),
    )
}

async fn abort() -> impl IntoResponse {
    let first = stream::once(async { Ok(Bytes::from_static(b"{\"partial\":")) });
    let fail = stream::once(async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        Err(io::Error::new(io::ErrorKind::ConnectionReset, "connection dropped"))
    });
    (
        [(header::CONTENT_TYPE, "application/json")],
        Body::from_stream(first.chain(fail)),
    )
}
