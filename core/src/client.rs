//! Public calling surface: one builder per call, two ways to finish it.
//!
//! # Design
//! Each verb returns a `RequestBuilder` holding a `RequestSpec`; options are
//! set by name rather than by position. The pipeline lives in `execute` and
//! is only ever reached through `send_parsed`:
//!
//! - future mode: `send().await` resolves with the decoded body;
//! - callback mode: `send_with(callback)` spawns `send()` and hands its
//!   result to the callback, so the two modes cannot drift apart.

use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{info_span, Instrument};

use crate::attempt::{open, Opened};
use crate::body::RawResponse;
use crate::config::{RequestConfig, RequestSpec};
use crate::error::RequestError;
use crate::http::HttpMethod;
use crate::retry::with_retries;
use crate::transport::Agent;
use crate::types::{Body, Payload, ResponseResult};

/// Issues requests with a shared default configuration.
///
/// The default client carries no agent, so every call opens its own
/// connection. Use `Client::pooled` to reuse connections.
#[derive(Debug, Clone, Default)]
pub struct Client {
    defaults: RequestConfig,
}

impl Client {
    pub fn new() -> Self {
        Self::default()
    }

    /// A client whose calls share one keep-alive agent.
    pub fn pooled() -> Result<Self, RequestError> {
        let defaults = RequestConfig {
            agent: Some(Agent::pooled()?),
            ..RequestConfig::default()
        };
        Ok(Self::with_config(defaults))
    }

    pub fn with_config(defaults: RequestConfig) -> Self {
        Self { defaults }
    }

    pub fn defaults(&self) -> &RequestConfig {
        &self.defaults
    }

    pub fn request(&self, method: HttpMethod, url: impl Into<String>) -> RequestBuilder {
        let mut spec = RequestSpec::new(method, url);
        spec.config = self.defaults.clone();
        RequestBuilder { spec }
    }

    pub fn get(&self, url: impl Into<String>) -> RequestBuilder {
        self.request(HttpMethod::Get, url)
    }

    pub fn post(&self, url: impl Into<String>, payload: impl Into<Payload>) -> RequestBuilder {
        self.request(HttpMethod::Post, url).payload(payload)
    }

    pub fn put(&self, url: impl Into<String>, payload: impl Into<Payload>) -> RequestBuilder {
        self.request(HttpMethod::Put, url).payload(payload)
    }

    pub fn patch(&self, url: impl Into<String>, payload: impl Into<Payload>) -> RequestBuilder {
        self.request(HttpMethod::Patch, url).payload(payload)
    }

    /// The payload is optional for `DELETE`; add one with `.payload(..)`.
    pub fn delete(&self, url: impl Into<String>) -> RequestBuilder {
        self.request(HttpMethod::Delete, url)
    }
}

/// One call being configured.
#[derive(Debug, Clone)]
#[must_use = "a request does nothing until it is sent"]
pub struct RequestBuilder {
    spec: RequestSpec,
}

impl RequestBuilder {
    pub fn payload(mut self, payload: impl Into<Payload>) -> Self {
        self.spec.payload = Some(payload.into());
        self
    }

    /// Serialize `value` as the JSON payload.
    pub fn json<T: Serialize + ?Sized>(mut self, value: &T) -> Result<Self, serde_json::Error> {
        self.spec.payload = Some(Payload::json(value)?);
        Ok(self)
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.spec.config.headers.insert(name.into(), value.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.spec.config.timeout = Some(timeout);
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.spec.config.retries = retries;
        self
    }

    /// Return raw bytes instead of a decoded body.
    pub fn buffer(mut self, buffer: bool) -> Self {
        self.spec.config.buffer = buffer;
        self
    }

    pub fn max_redirects(mut self, max_redirects: usize) -> Self {
        self.spec.config.max_redirects = max_redirects;
        self
    }

    pub fn agent(mut self, agent: Agent) -> Self {
        self.spec.config.agent = Some(agent);
        self
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: RequestConfig) -> Self {
        self.spec.config = config;
        self
    }

    pub fn spec(&self) -> &RequestSpec {
        &self.spec
    }

    /// Resolve with the decoded body of the final response.
    pub async fn send(self) -> Result<Body, RequestError> {
        self.send_parsed().await.map(|result| result.body)
    }

    /// Resolve with status, headers and decoded body.
    pub async fn send_parsed(self) -> Result<ResponseResult, RequestError> {
        let span = info_span!("request", method = %self.spec.method, url = %self.spec.url);
        execute(self.spec).instrument(span).await
    }

    /// Callback mode: run the call on the current Tokio runtime and deliver
    /// the outcome to `callback` exactly once.
    ///
    /// # Panics
    /// Panics when called outside a Tokio runtime.
    pub fn send_with<F>(self, callback: F) -> JoinHandle<()>
    where
        F: FnOnce(Result<Body, RequestError>) + Send + 'static,
    {
        tokio::spawn(async move { callback(self.send().await) })
    }

    /// Callback mode for `send_parsed`.
    ///
    /// # Panics
    /// Panics when called outside a Tokio runtime.
    pub fn send_parsed_with<F>(self, callback: F) -> JoinHandle<()>
    where
        F: FnOnce(Result<ResponseResult, RequestError>) + Send + 'static,
    {
        tokio::spawn(async move { callback(self.send_parsed().await) })
    }

    /// Open the response without reading the body. `None` for 204.
    ///
    /// Redirects are followed but no retries are made, since the caller
    /// drives the body.
    pub async fn raw_response(self) -> Result<Option<RawResponse>, RequestError> {
        let span = info_span!("raw_request", method = %self.spec.method, url = %self.spec.url);
        async move {
            let agent = agent_for(&self.spec)?;
            match open(agent.transport(), &self.spec).await? {
                Opened::NoContent { .. } => Ok(None),
                Opened::Streaming(response) => Ok(Some(response)),
            }
        }
        .instrument(span)
        .await
    }
}

fn agent_for(spec: &RequestSpec) -> Result<Agent, RequestError> {
    match &spec.config.agent {
        Some(agent) => Ok(agent.clone()),
        None => Agent::unpooled(),
    }
}

async fn execute(spec: RequestSpec) -> Result<ResponseResult, RequestError> {
    let agent = agent_for(&spec)?;
    with_retries(spec.config.retries, |_| fetch(&agent, &spec)).await
}

/// One whole attempt chain: redirects, status check, body, decode.
async fn fetch(agent: &Agent, spec: &RequestSpec) -> Result<ResponseResult, RequestError> {
    match open(agent.transport(), spec).await? {
        Opened::NoContent { status, headers } => Ok(ResponseResult {
            status,
            headers,
            body: Body::Empty,
        }),
        Opened::Streaming(response) => {
            let status = response.status();
            let headers = response.headers().clone();
            let body = response.body(spec.config.buffer).await?;
            Ok(ResponseResult {
                status,
                headers,
                body,
            })
        }
    }
}

/// `GET url` with the default client.
pub fn get(url: impl Into<String>) -> RequestBuilder {
    Client::new().get(url)
}

pub fn post(url: impl Into<String>, payload: impl Into<Payload>) -> RequestBuilder {
    Client::new().post(url, payload)
}

pub fn put(url: impl Into<String>, payload: impl Into<Payload>) -> RequestBuilder {
    Client::new().put(url, payload)
}

pub fn patch(url: impl Into<String>, payload: impl Into<Payload>) -> RequestBuilder {
    Client::new().patch(url, payload)
}

pub fn delete(url: impl Into<String>) -> RequestBuilder {
    Client::new().delete(url)
}

pub fn request(method: HttpMethod, url: impl Into<String>) -> RequestBuilder {
    Client::new().request(method, url)
}
