//! Minimal asynchronous HTTP(S) client built around one request lifecycle.
//!
//! # Overview
//! A call is described by a `RequestSpec` (method, URL, optional payload,
//! `RequestConfig`) and produces either a decoded `Body` or a classified
//! `RequestError`. Between the two sit four stages:
//!
//! 1. `options::build_request` turns the spec into a wire descriptor;
//! 2. a `Transport` (hyper + rustls by default) exchanges it;
//! 3. an `Attempt` state machine follows redirects, checks the status and
//!    guards the body read with two timeouts;
//! 4. `body::decode` turns the accumulated bytes into JSON, text or bytes.
//!
//! `retry::with_retries` wraps stages 1 to 4 as a unit.
//!
//! # Design
//! - Every call resolves exactly once. After an attempt reaches a terminal
//!   state, late events (a timer, a trailing chunk) are ignored.
//! - The same call can be consumed as a future (`send().await`) or with a
//!   callback (`send_with`); the callback form is a thin wrapper over the
//!   future.
//! - Connection reuse is opt-in through `Agent`; without one each call uses
//!   its own connection.

mod attempt;
pub mod body;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod options;
mod retry;
pub mod transport;
pub mod types;

pub use body::{decode, RawResponse};
pub use client::{delete, get, patch, post, put, request, Client, RequestBuilder};
pub use config::{RequestConfig, RequestSpec, DEFAULT_MAX_REDIRECTS, DEFAULT_USER_AGENT};
pub use error::{BoxError, ErrorKind, RequestError, TransportError, TransportErrorKind};
pub use http::{HttpMethod, HttpRequest, Scheme, UnknownMethod};
pub use options::build_request;
pub use transport::{Agent, BodyStream, HyperTransport, Transport, TransportResponse};
pub use types::{Body, MalformedJson, Payload, ResponseResult};
