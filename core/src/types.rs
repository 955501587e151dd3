//! Values flowing in and out of a request.
//!
//! # Design
//! `Payload` is what the caller sends; `Body` is what the decoder hands
//! back. A JSON body that fails to parse is still a successful call: it comes
//! back as `Body::Malformed`, pairing the parse error with the raw text.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use http::HeaderMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Request payload.
///
/// Structured values are sent as `application/json`, text as `text/plain`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Payload {
    Json(serde_json::Value),
    Text(String),
}

impl Payload {
    /// Serialize any `Serialize` value into a JSON payload.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, serde_json::Error> {
        serde_json::to_value(value).map(Self::Json)
    }
}

impl From<serde_json::Value> for Payload {
    fn from(value: serde_json::Value) -> Self {
        Self::Json(value)
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

/// A JSON-typed body that did not parse.
#[derive(Debug, Clone)]
pub struct MalformedJson {
    pub error: Arc<serde_json::Error>,
    pub text: String,
}

impl PartialEq for MalformedJson {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text && self.error.to_string() == other.error.to_string()
    }
}

impl fmt::Display for MalformedJson {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid json body ({}): {}", self.error, self.text)
    }
}

/// Decoded response body.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    /// No body was read (204).
    Empty,
    Json(serde_json::Value),
    Text(String),
    /// Undecoded bytes, returned when the caller asked for a buffer.
    Bytes(Bytes),
    Malformed(MalformedJson),
}

impl Body {
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Self::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Deserialize a JSON body into `T`. Returns `None` for any other shape.
    pub fn into_json<T: DeserializeOwned>(self) -> Option<Result<T, serde_json::Error>> {
        match self {
            Self::Json(value) => Some(serde_json::from_value(value)),
            _ => None,
        }
    }
}

/// Status, headers and decoded body of the final hop.
#[derive(Debug, Clone)]
pub struct ResponseResult {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Body,
}
