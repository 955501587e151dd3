//! Turns a target, verb, payload and config into an `HttpRequest`.
//!
//! Pure: no I/O and no failure modes. Scheme selection and URL parsing happen
//! before this point.

use bytes::Bytes;
use url::Url;

use crate::config::{RequestConfig, DEFAULT_USER_AGENT};
use crate::http::{HttpMethod, HttpRequest, Scheme};
use crate::types::Payload;

/// Build the wire descriptor for one attempt.
///
/// Body headers come first, then the user agent, then caller headers which
/// replace any default with the same (case-insensitive) name.
pub fn build_request(
    url: &Url,
    scheme: Scheme,
    method: HttpMethod,
    payload: Option<&Payload>,
    config: &RequestConfig,
) -> HttpRequest {
    let mut headers = Vec::new();
    let body = payload.map(|payload| {
        let (content_type, encoded) = encode(payload);
        set_header(&mut headers, "content-type", content_type.to_string());
        set_header(&mut headers, "content-length", encoded.len().to_string());
        encoded
    });
    set_header(&mut headers, "user-agent", DEFAULT_USER_AGENT.to_string());
    for (name, value) in &config.headers {
        set_header(&mut headers, name, value.clone());
    }

    let mut url = url.clone();
    url.set_fragment(None);

    HttpRequest {
        method,
        url,
        scheme,
        headers,
        body,
    }
}

fn encode(payload: &Payload) -> (&'static str, Bytes) {
    match payload {
        Payload::Json(value) => ("application/json", Bytes::from(value.to_string())),
        Payload::Text(text) => ("text/plain", Bytes::from(text.clone())),
    }
}

fn set_header(headers: &mut Vec<(String, String)>, name: &str, value: String) {
    match headers
        .iter_mut()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
    {
        Some(entry) => *entry = (name.to_string(), value),
        None => headers.push((name.to_string(), value)),
    }
}
