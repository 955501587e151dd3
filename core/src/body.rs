//! Response body accumulation and content-type directed decoding.
//!
//! # Design
//! `RawResponse` owns the live body stream of a 200 response together with
//! the `Attempt` that produced it. Each `chunk()` call races one stream read
//! against the inactivity timer and pushes the outcome through the attempt,
//! so stream errors, aborts, end-of-stream and the timer resolve to exactly
//! one terminal result. `decode` is the pure second half: bytes in, `Body`
//! out, never an error.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use http::header::CONTENT_TYPE;
use http::HeaderMap;
use url::Url;

use crate::attempt::{race, Attempt, Event, Step};
use crate::error::RequestError;
use crate::transport::{BodyStream, TransportResponse};
use crate::types::{Body, MalformedJson};

/// A response whose headers have arrived and whose body is still streaming.
pub struct RawResponse {
    url: Url,
    status: u16,
    headers: HeaderMap,
    body: BodyStream,
    attempt: Attempt,
    idle_timeout: Option<Duration>,
}

impl RawResponse {
    pub(crate) fn new(
        url: Url,
        response: TransportResponse,
        attempt: Attempt,
        idle_timeout: Option<Duration>,
    ) -> Self {
        Self {
            url,
            status: response.status,
            headers: response.headers,
            body: response.body,
            attempt,
            idle_timeout,
        }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// URL of the final hop, after redirects.
    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
    }

    /// Next body chunk, or `None` once the body is complete.
    ///
    /// After the first error every later call returns `Ok(None)` without
    /// touching the stream.
    pub async fn chunk(&mut self) -> Result<Option<Bytes>, RequestError> {
        if self.attempt.is_done() {
            return Ok(None);
        }
        let event = match race(self.idle_timeout, self.body.next()).await {
            None => Event::Timeout,
            Some(Some(Ok(bytes))) => Event::Chunk(bytes),
            Some(Some(Err(error))) => Event::ReadFailed(error),
            Some(None) => Event::End,
        };
        match self.attempt.handle(event) {
            Some(Step::Chunk(bytes)) => Ok(Some(bytes)),
            Some(Step::Failed(error)) => Err(error),
            _ => Ok(None),
        }
    }

    /// Read the rest of the body into one buffer.
    pub async fn bytes(mut self) -> Result<Bytes, RequestError> {
        let mut buffer = BytesMut::new();
        while let Some(chunk) = self.chunk().await? {
            buffer.extend_from_slice(&chunk);
        }
        Ok(buffer.freeze())
    }

    /// Read the rest of the body and decode it. `raw` skips decoding.
    pub async fn body(self, raw: bool) -> Result<Body, RequestError> {
        let content_type = self.content_type().map(str::to_string);
        let bytes = self.bytes().await?;
        Ok(decode(bytes, content_type.as_deref(), raw))
    }
}

impl fmt::Debug for RawResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawResponse")
            .field("url", &self.url.as_str())
            .field("status", &self.status)
            .field("state", &self.attempt.state())
            .finish_non_exhaustive()
    }
}

/// Turn a complete body into a typed value.
///
/// `raw` wins over everything; otherwise a content type mentioning
/// `application/json` is parsed as JSON and anything else becomes text.
pub fn decode(bytes: Bytes, content_type: Option<&str>, raw: bool) -> Body {
    if raw {
        return Body::Bytes(bytes);
    }
    let is_json = content_type.is_some_and(|value| value.contains("application/json"));
    if is_json {
        return match serde_json::from_slice(&bytes) {
            Ok(value) => Body::Json(value),
            Err(error) => Body::Malformed(MalformedJson {
                error: Arc::new(error),
                text: String::from_utf8_lossy(&bytes).into_owned(),
            }),
        };
    }
    Body::Text(String::from_utf8_lossy(&bytes).into_owned())
}
