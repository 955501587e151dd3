//! `#[repr(C)]` types for the FFI boundary.
//!
//! # Design
//! Each type mirrors a core type but uses C-compatible representations:
//! `*mut c_char` for messages, a pointer plus length for bodies, and enums
//! with explicit discriminants. Conversion and freeing live here so `lib.rs`
//! stays focused on the `extern "C"` surface.

use std::ffi::CString;
use std::os::raw::c_char;

use basic_request::{Body, ErrorKind, HttpMethod, RequestError, ResponseResult};

/// Opaque handle owning a Tokio runtime and a pooled client. C callers
/// receive a pointer to this and pass it back into every call.
pub struct FfiClient {
    pub(crate) runtime: tokio::runtime::Runtime,
    pub(crate) client: basic_request::Client,
}

// ---------------------------------------------------------------------------
// Request inputs
// ---------------------------------------------------------------------------

/// HTTP method as a C enum.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FfiMethod {
    Get = 0,
    Post = 1,
    Put = 2,
    Patch = 3,
    Delete = 4,
}

impl From<FfiMethod> for HttpMethod {
    fn from(m: FfiMethod) -> Self {
        match m {
            FfiMethod::Get => HttpMethod::Get,
            FfiMethod::Post => HttpMethod::Post,
            FfiMethod::Put => HttpMethod::Put,
            FfiMethod::Patch => HttpMethod::Patch,
            FfiMethod::Delete => HttpMethod::Delete,
        }
    }
}

/// How to interpret the `payload` string passed to `breq_send*`.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FfiPayloadKind {
    None = 0,
    /// `payload` is JSON text, sent as `application/json`.
    Json = 1,
    /// `payload` is sent as `text/plain`.
    Text = 2,
}

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Error codes returned in `FfiResult`. Values 1 to 8 mirror `ErrorKind`.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FfiErrorKind {
    Ok = 0,
    SendingRequest = 1,
    RequestAborted = 2,
    RequestTimeout = 3,
    ResponseTimeout = 4,
    ReadingResponse = 5,
    ResponseAborted = 6,
    InvalidStatus = 7,
    TooManyRedirects = 8,
    NullArg = 9,
    InvalidArgument = 10,
    Panic = 11,
}

impl From<ErrorKind> for FfiErrorKind {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::SendingRequest => FfiErrorKind::SendingRequest,
            ErrorKind::RequestAborted => FfiErrorKind::RequestAborted,
            ErrorKind::RequestTimeout => FfiErrorKind::RequestTimeout,
            ErrorKind::ResponseTimeout => FfiErrorKind::ResponseTimeout,
            ErrorKind::ReadingResponse => FfiErrorKind::ReadingResponse,
            ErrorKind::ResponseAborted => FfiErrorKind::ResponseAborted,
            ErrorKind::InvalidStatus => FfiErrorKind::InvalidStatus,
            ErrorKind::TooManyRedirects => FfiErrorKind::TooManyRedirects,
        }
    }
}

/// Tag that tells the caller how to read `FfiResult::body`.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FfiBodyKind {
    /// No body (204 or an error).
    Empty = 0,
    /// Compact JSON text.
    Json = 1,
    /// UTF-8 text.
    Text = 2,
    /// Undecoded bytes.
    Bytes = 3,
    /// The original text of a body that claimed JSON but did not parse.
    MalformedJson = 4,
}

/// Result envelope for every call.
///
/// On success `error_kind` is `Ok`, `error_message` is null and
/// `body`/`body_len` hold the body bytes tagged by `body_kind`. On failure
/// `error_kind` describes the category, `error_message` is a C string and
/// `body` is null. `status_code` is the final status when one is known,
/// otherwise 0.
#[repr(C)]
pub struct FfiResult {
    pub error_kind: FfiErrorKind,
    pub error_message: *mut c_char,
    pub status_code: u16,
    pub body_kind: FfiBodyKind,
    pub body: *mut u8,
    pub body_len: usize,
}

impl FfiResult {
    pub(crate) fn from_outcome(outcome: Result<ResponseResult, RequestError>) -> *mut Self {
        match outcome {
            Ok(response) => Self::ok(response),
            Err(err) => Self::from_error(err),
        }
    }

    /// Build a success result carrying the body bytes.
    pub(crate) fn ok(response: ResponseResult) -> *mut Self {
        let (body_kind, bytes) = match response.body {
            Body::Empty => (FfiBodyKind::Empty, Vec::new()),
            Body::Json(value) => (FfiBodyKind::Json, value.to_string().into_bytes()),
            Body::Text(text) => (FfiBodyKind::Text, text.into_bytes()),
            Body::Bytes(bytes) => (FfiBodyKind::Bytes, bytes.to_vec()),
            Body::Malformed(malformed) => (FfiBodyKind::MalformedJson, malformed.text.into_bytes()),
        };
        let (body, body_len) = into_raw_bytes(bytes);
        Box::into_raw(Box::new(FfiResult {
            error_kind: FfiErrorKind::Ok,
            error_message: std::ptr::null_mut(),
            status_code: response.status,
            body_kind,
            body,
            body_len,
        }))
    }

    /// Build an error result from a `RequestError`.
    pub(crate) fn from_error(err: RequestError) -> *mut Self {
        Self::failure(
            err.kind().into(),
            err.status_code().unwrap_or(0),
            &err.to_string(),
        )
    }

    /// Build an error result for a null argument.
    pub(crate) fn null_arg(name: &str) -> *mut Self {
        Self::failure(FfiErrorKind::NullArg, 0, &format!("null argument: {name}"))
    }

    pub(crate) fn invalid_argument(message: &str) -> *mut Self {
        Self::failure(FfiErrorKind::InvalidArgument, 0, message)
    }

    /// Build an error result for a caught panic.
    pub(crate) fn panic(message: &str) -> *mut Self {
        Self::failure(FfiErrorKind::Panic, 0, message)
    }

    fn failure(error_kind: FfiErrorKind, status_code: u16, message: &str) -> *mut Self {
        Box::into_raw(Box::new(FfiResult {
            error_kind,
            error_message: c_string(message),
            status_code,
            body_kind: FfiBodyKind::Empty,
            body: std::ptr::null_mut(),
            body_len: 0,
        }))
    }

    /// Release a result and everything it owns.
    ///
    /// # Safety
    /// `result` must come from one of the constructors above and must not be
    /// used afterwards.
    pub(crate) unsafe fn free(result: *mut Self) {
        let result = unsafe { Box::from_raw(result) };
        if !result.error_message.is_null() {
            drop(unsafe { CString::from_raw(result.error_message) });
        }
        if !result.body.is_null() {
            let slice = std::ptr::slice_from_raw_parts_mut(result.body, result.body_len);
            drop(unsafe { Box::from_raw(slice) });
        }
    }
}

fn into_raw_bytes(bytes: Vec<u8>) -> (*mut u8, usize) {
    if bytes.is_empty() {
        return (std::ptr::null_mut(), 0);
    }
    let len = bytes.len();
    let ptr = Box::into_raw(bytes.into_boxed_slice()) as *mut u8;
    (ptr, len)
}

/// Messages never contain NUL in practice; strip any rather than fail.
fn c_string(message: &str) -> *mut c_char {
    CString::new(message.replace('\0', ""))
        .unwrap_or_default()
        .into_raw()
}
