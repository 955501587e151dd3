//! Error types for the request engine.
//!
//! # Design
//! Every failure a caller can observe is a `RequestError` tagged with exactly
//! one `ErrorKind`. The kind says *where* the attempt died (sending, waiting
//! for headers, reading the body, status check, redirect chase), and
//! `status_code` is filled in only for `InvalidStatus`. JSON decode failures
//! are absent: they surface as `Body::Malformed` on a successful
//! call.
//!
//! `TransportError` is the narrower error produced by a `Transport`. The
//! state machine turns it into a `RequestError` once it knows which phase the
//! failure happened in.

use std::error::Error as StdError;
use std::fmt;
use std::io;

use thiserror::Error;

pub type BoxError = Box<dyn StdError + Send + Sync>;

/// Discriminates the phase in which an attempt failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Transport-level failure while writing the request.
    SendingRequest,
    /// The connection was aborted before response headers arrived.
    RequestAborted,
    /// The timer expired before response headers arrived.
    RequestTimeout,
    /// The timer expired while the body was being read.
    ResponseTimeout,
    /// Transport-level failure while reading the body.
    ReadingResponse,
    /// The connection was aborted while reading the body.
    ResponseAborted,
    /// Terminal status outside 200, 204, 301 and 302.
    InvalidStatus,
    /// More redirects than the configured cap.
    TooManyRedirects,
}

impl ErrorKind {
    /// Stable camel-case name, used in logs and by non-Rust callers.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SendingRequest => "sendingRequest",
            Self::RequestAborted => "requestAborted",
            Self::RequestTimeout => "requestTimeout",
            Self::ResponseTimeout => "responseTimeout",
            Self::ReadingResponse => "readingResponse",
            Self::ResponseAborted => "responseAborted",
            Self::InvalidStatus => "invalidStatus",
            Self::TooManyRedirects => "tooManyRedirects",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified failure of one top-level call.
///
/// Only the error of the last attempt is surfaced once the retry budget is
/// spent.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct RequestError {
    kind: ErrorKind,
    message: String,
    status_code: Option<u16>,
    #[source]
    source: Option<BoxError>,
}

impl RequestError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status_code: None,
            source: None,
        }
    }

    pub(crate) fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Set only for `ErrorKind::InvalidStatus`.
    pub fn status_code(&self) -> Option<u16> {
        self.status_code
    }

    pub fn is_timeout(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::RequestTimeout | ErrorKind::ResponseTimeout
        )
    }

    pub(crate) fn invalid_status(status: u16) -> Self {
        Self {
            status_code: Some(status),
            ..Self::new(ErrorKind::InvalidStatus, format!("Invalid status code {status}"))
        }
    }

    pub(crate) fn missing_location(status: u16) -> Self {
        Self {
            status_code: Some(status),
            ..Self::new(
                ErrorKind::InvalidStatus,
                format!("Redirect status {status} without a location header"),
            )
        }
    }

    pub(crate) fn too_many_redirects(limit: usize) -> Self {
        Self::new(
            ErrorKind::TooManyRedirects,
            format!("Too many redirects (limit {limit})"),
        )
    }

    pub(crate) fn request_timeout() -> Self {
        Self::new(ErrorKind::RequestTimeout, "Timeout while sending request")
    }

    pub(crate) fn response_timeout() -> Self {
        Self::new(ErrorKind::ResponseTimeout, "Timeout while reading response")
    }

    /// Any failure detected before the request reaches the wire: bad URL,
    /// unsupported scheme, transport setup.
    pub(crate) fn sending(detail: impl fmt::Display) -> Self {
        Self::new(
            ErrorKind::SendingRequest,
            format!("Error sending request: {detail}"),
        )
    }

    pub(crate) fn from_send(error: TransportError) -> Self {
        match error.kind() {
            TransportErrorKind::Aborted => {
                Self::new(ErrorKind::RequestAborted, "Request aborted").with_source(error)
            }
            TransportErrorKind::Failed => Self::sending(&error).with_source(error),
        }
    }

    pub(crate) fn from_read(error: TransportError) -> Self {
        match error.kind() {
            TransportErrorKind::Aborted => {
                Self::new(ErrorKind::ResponseAborted, "Response aborted").with_source(error)
            }
            TransportErrorKind::Failed => Self::new(
                ErrorKind::ReadingResponse,
                format!("Error reading response: {error}"),
            )
            .with_source(error),
        }
    }
}

/// How a transport-level failure ended the exchange.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// The connection closed before the message completed.
    Aborted,
    /// Any other I/O, protocol or setup failure.
    Failed,
}

/// Error reported by a `Transport` or by a response body stream.
#[derive(Debug, Error)]
#[error("{source}")]
pub struct TransportError {
    kind: TransportErrorKind,
    #[source]
    source: BoxError,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, source: impl Into<BoxError>) -> Self {
        Self {
            kind,
            source: source.into(),
        }
    }

    pub fn failed(source: impl Into<BoxError>) -> Self {
        Self::new(TransportErrorKind::Failed, source)
    }

    pub fn aborted(source: impl Into<BoxError>) -> Self {
        Self::new(TransportErrorKind::Aborted, source)
    }

    pub fn kind(&self) -> TransportErrorKind {
        self.kind
    }

    /// Classify an error chain coming out of hyper. A message cut short, a
    /// cancelled exchange or a closed socket means the peer went away
    /// mid-flight.
    pub(crate) fn classify(source: impl Into<BoxError>) -> Self {
        let source = source.into();
        if is_abort(&*source) {
            Self::aborted(source)
        } else {
            Self::failed(source)
        }
    }
}

fn is_abort(error: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(error);
    while let Some(error) = current {
        if let Some(hyper_error) = error.downcast_ref::<hyper::Error>() {
            if hyper_error.is_incomplete_message() || hyper_error.is_canceled() {
                return true;
            }
        }
        if let Some(io_error) = error.downcast_ref::<io::Error>() {
            if matches!(
                io_error.kind(),
                io::ErrorKind::UnexpectedEof
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
            ) {
                return true;
            }
        }
        current = error.source();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_names_match_flag_names() {
        assert_eq!(ErrorKind::SendingRequest.as_str(), "sendingRequest");
        assert_eq!(ErrorKind::ResponseAborted.to_string(), "responseAborted");
        assert_eq!(ErrorKind::TooManyRedirects.as_str(), "tooManyRedirects");
    }

    #[test]
    fn invalid_status_carries_code() {
        let err = RequestError::invalid_status(404);
        assert_eq!(err.kind(), ErrorKind::InvalidStatus);
        assert_eq!(err.status_code(), Some(404));
        assert_eq!(err.to_string(), "Invalid status code 404");
    }

    #[test]
    fn only_status_errors_have_a_code() {
        assert_eq!(RequestError::request_timeout().status_code(), None);
        assert_eq!(RequestError::too_many_redirects(10).status_code(), None);
    }

    #[test]
    fn timeouts_are_flagged() {
        assert!(RequestError::request_timeout().is_timeout());
        assert!(RequestError::response_timeout().is_timeout());
        assert!(!RequestError::invalid_status(500).is_timeout());
    }

    #[test]
    fn transport_errors_map_by_phase() {
        let send = RequestError::from_send(TransportError::aborted("reset"));
        assert_eq!(send.kind(), ErrorKind::RequestAborted);

        let send = RequestError::from_send(TransportError::failed("refused"));
        assert_eq!(send.kind(), ErrorKind::SendingRequest);
        assert_eq!(send.to_string(), "Error sending request: refused");
        assert!(StdError::source(&send).is_some());

        let read = RequestError::from_read(TransportError::aborted("eof"));
        assert_eq!(read.kind(), ErrorKind::ResponseAborted);

        let read = RequestError::from_read(TransportError::failed("bad chunk"));
        assert_eq!(read.kind(), ErrorKind::ReadingResponse);
        assert_eq!(read.to_string(), "Error reading response: bad chunk");
    }

    #[test]
    fn classify_defaults_to_failed() {
        let io = io::Error::new(io::ErrorKind::ConnectionRefused, "refused");
        assert_eq!(TransportError::classify(io).kind(), TransportErrorKind::Failed);
    }

    #[derive(Debug, Error)]
    #[error("error reading a body from connection")]
    struct BodyRead(#[source] io::Error);

    #[test]
    fn closed_socket_in_chain_is_aborted() {
        for kind in [
            io::ErrorKind::UnexpectedEof,
            io::ErrorKind::ConnectionReset,
            io::ErrorKind::ConnectionAborted,
            io::ErrorKind::BrokenPipe,
        ] {
            let wrapped = BodyRead(io::Error::new(kind, "peer closed"));
            let err = TransportError::classify(wrapped);
            assert_eq!(err.kind(), TransportErrorKind::Aborted, "{kind:?}");
            assert_eq!(RequestError::from_read(err).kind(), ErrorKind::ResponseAborted);
        }
    }
}
