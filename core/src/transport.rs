//! The outbound connection capability the engine consumes.
//!
//! # Design
//! `Transport` is the seam between the request lifecycle and the network: it
//! takes one `HttpRequest`, opens (or reuses) a plain or TLS connection,
//! exchanges the message, and returns the status and headers together with a
//! body stream that has not been read yet. Everything above this trait is
//! network-agnostic, which is what lets the state machine be tested with a
//! scripted transport.
//!
//! `Agent` is the caller-visible connection-reuse handle. The engine clones
//! the `Arc` and calls through it, never touching pool state. Calls without an
//! agent share one unpooled transport, so each opens its own connection.

use std::fmt;
use std::sync::{Arc, OnceLock};

use bytes::Bytes;
use futures_util::future::BoxFuture;
use futures_util::stream::BoxStream;
use futures_util::{FutureExt, StreamExt};
use http::HeaderMap;
use http_body_util::{BodyDataStream, Full};
use hyper_rustls::HttpsConnectorBuilder;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use tracing::debug;
use url::Url;

use crate::error::{RequestError, TransportError};
use crate::http::{HttpRequest, Scheme};

/// Response body as an incrementally readable byte stream.
pub type BodyStream = BoxStream<'static, Result<Bytes, TransportError>>;

/// Status line and headers of a response whose body is still on the wire.
pub struct TransportResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: BodyStream,
}

impl fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// Exchanges one request/response message pair.
pub trait Transport: Send + Sync + 'static {
    fn round_trip(
        &self,
        request: HttpRequest,
    ) -> BoxFuture<'_, Result<TransportResponse, TransportError>>;
}

impl Scheme {
    /// Pick the channel for `url`. Only `http` and `https` are supported.
    pub fn select(url: &Url) -> Result<Self, RequestError> {
        match url.scheme() {
            "http" => Ok(Self::Plain),
            "https" => Ok(Self::Tls),
            other => Err(RequestError::sending(format!(
                "unsupported protocol {other}:"
            ))),
        }
    }
}

type PlainClient = Client<HttpConnector, Full<Bytes>>;
type TlsClient = Client<hyper_rustls::HttpsConnector<HttpConnector>, Full<Bytes>>;

/// HTTP/1.1 transport over hyper, with rustls for `https`.
pub struct HyperTransport {
    plain: PlainClient,
    tls: TlsClient,
}

impl HyperTransport {
    /// `pooled = false` closes every connection after its exchange.
    pub fn new(pooled: bool) -> Result<Self, TransportError> {
        let mut http = HttpConnector::new();
        http.set_nodelay(true);
        http.enforce_http(false);

        let https = HttpsConnectorBuilder::new()
            .with_provider_and_webpki_roots(rustls::crypto::ring::default_provider())
            .map_err(TransportError::failed)?
            .https_only()
            .enable_http1()
            .wrap_connector(http.clone());

        let mut builder = Client::builder(TokioExecutor::new());
        if !pooled {
            builder.pool_max_idle_per_host(0);
        }
        Ok(Self {
            plain: builder.build(http),
            tls: builder.build(https),
        })
    }
}

impl HyperTransport {
    async fn exchange(&self, request: HttpRequest) -> Result<TransportResponse, TransportError> {
        let scheme = request.scheme;
        let request = to_hyper(request)?;
        let response = match scheme {
            Scheme::Plain => self.plain.request(request).await,
            Scheme::Tls => self.tls.request(request).await,
        }
        .map_err(TransportError::classify)?;

        let (parts, body) = response.into_parts();
        let body = BodyDataStream::new(body)
            .map(|chunk| chunk.map_err(TransportError::classify))
            .boxed();
        Ok(TransportResponse {
            status: parts.status.as_u16(),
            headers: parts.headers,
            body,
        })
    }
}

impl Transport for HyperTransport {
    fn round_trip(
        &self,
        request: HttpRequest,
    ) -> BoxFuture<'_, Result<TransportResponse, TransportError>> {
        self.exchange(request).boxed()
    }
}

fn to_hyper(request: HttpRequest) -> Result<http::Request<Full<Bytes>>, TransportError> {
    let mut builder = http::Request::builder()
        .method(request.method.as_http())
        .uri(request.url.as_str());
    for (name, value) in &request.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
        .body(Full::new(request.body.unwrap_or_default()))
        .map_err(TransportError::failed)
}

/// Connection-reuse handle.
///
/// Cloning shares the underlying pool. Pass one in `RequestConfig::agent` to
/// keep connections alive across calls.
#[derive(Clone)]
pub struct Agent {
    transport: Arc<dyn Transport>,
}

impl Agent {
    /// A keep-alive agent backed by `HyperTransport`.
    pub fn pooled() -> Result<Self, RequestError> {
        Self::hyper(true)
    }

    /// The agent used by calls that bring none. Built once and shared; it
    /// keeps no idle connections, so every call still dials its own.
    pub(crate) fn unpooled() -> Result<Self, RequestError> {
        static UNPOOLED: OnceLock<Agent> = OnceLock::new();
        if let Some(agent) = UNPOOLED.get() {
            return Ok(agent.clone());
        }
        let agent = Self::hyper(false)?;
        Ok(UNPOOLED.get_or_init(|| agent).clone())
    }

    fn hyper(pooled: bool) -> Result<Self, RequestError> {
        debug!(pooled, "creating transport");
        let transport = HyperTransport::new(pooled).map_err(RequestError::from_send)?;
        Ok(Self::with_transport(transport))
    }

    /// Wrap a custom transport.
    pub fn with_transport(transport: impl Transport) -> Self {
        Self {
            transport: Arc::new(transport),
        }
    }

    pub(crate) fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }
}

impl fmt::Debug for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Agent").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpMethod;

    #[test]
    fn scheme_follows_url() {
        let http = Url::parse("http://example.com/").unwrap();
        let https = Url::parse("https://example.com/").unwrap();
        assert_eq!(Scheme::select(&http).unwrap(), Scheme::Plain);
        assert_eq!(Scheme::select(&https).unwrap(), Scheme::Tls);
    }

    #[test]
    fn unsupported_scheme_is_a_sending_error() {
        let ftp = Url::parse("ftp://example.com/file").unwrap();
        let err = Scheme::select(&ftp).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::SendingRequest);
        assert!(err.message().contains("ftp"));
    }

    #[test]
    fn hyper_request_carries_descriptor() {
        let request = HttpRequest {
            method: HttpMethod::Post,
            url: Url::parse("http://localhost:3000/echo?x=1").unwrap(),
            scheme: Scheme::Plain,
            headers: vec![("content-type".to_string(), "text/plain".to_string())],
            body: Some(Bytes::from_static(b"hi")),
        };
        let hyper_request = to_hyper(request).unwrap();
        assert_eq!(*hyper_request.method(), http::Method::POST);
        assert_eq!(hyper_request.uri(), "http://localhost:3000/echo?x=1");
        assert_eq!(hyper_request.headers()["content-type"], "text/plain");
    }

    #[tokio::test]
    async fn agents_build_without_network() {
        assert!(Agent::pooled().is_ok());
        assert!(Agent::unpooled().is_ok());
    }

    #[tokio::test]
    async fn unpooled_agent_is_built_once() {
        let first = Agent::unpooled().unwrap();
        let second = Agent::unpooled().unwrap();
        assert!(Arc::ptr_eq(&first.transport, &second.transport));

        let pooled = Agent::pooled().unwrap();
        assert!(!Arc::ptr_eq(&first.transport, &pooled.transport));
    }
}
