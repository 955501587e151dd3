//! Per-call configuration and the immutable request spec.
//!
//! # Design
//! `RequestConfig` is the option record callers pass next to a URL. It
//! deserializes from JSON (timeouts in milliseconds) so non-Rust hosts can
//! hand it over as text. The connection-reuse handle is carried alongside but
//! never serialized.
//!
//! `RequestSpec` bundles URL, verb, payload and config for one top-level
//! call. It is never mutated; redirects only change the URL the state machine
//! targets, and retries re-run the same spec.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Deserializer};

use crate::http::HttpMethod;
use crate::transport::Agent;
use crate::types::Payload;

/// User agent sent unless the caller overrides it.
pub const DEFAULT_USER_AGENT: &str = "rust basic-request bot";

/// Redirect hops followed before giving up.
pub const DEFAULT_MAX_REDIRECTS: usize = 10;

/// Behavioral options for one call.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RequestConfig {
    /// Extra whole-chain attempts after a failure.
    pub retries: u32,
    /// Request and response inactivity timeout, in milliseconds on the wire.
    #[serde(deserialize_with = "millis")]
    pub timeout: Option<Duration>,
    /// Merged over the default headers; the caller wins on collisions.
    pub headers: BTreeMap<String, String>,
    /// Return undecoded bytes instead of JSON or text.
    pub buffer: bool,
    pub max_redirects: usize,
    /// Connection-reuse handle, passed through untouched.
    #[serde(skip)]
    pub agent: Option<Agent>,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            retries: 0,
            timeout: None,
            headers: BTreeMap::new(),
            buffer: false,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            agent: None,
        }
    }
}

impl RequestConfig {
    /// Parse a JSON config document. Unknown keys are ignored.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

fn millis<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    let millis = Option::<u64>::deserialize(deserializer)?;
    // A zero timeout means "none", as with a socket timeout.
    Ok(millis.filter(|ms| *ms > 0).map(Duration::from_millis))
}

/// Everything needed to issue one top-level call.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    pub url: String,
    pub method: HttpMethod,
    pub payload: Option<Payload>,
    pub config: RequestConfig,
}

impl RequestSpec {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method,
            payload: None,
            config: RequestConfig::default(),
        }
    }
}
