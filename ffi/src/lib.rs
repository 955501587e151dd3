//! C-ABI wrapper around `basic-request`.
//!
//! # Overview
//! Exposes one-shot HTTP calls through `extern "C"` functions in two modes:
//! `breq_send` blocks until the call resolves, `breq_send_with_callback`
//! returns at once and invokes a C callback from a runtime worker thread.
//!
//! # Design
//! - A `FfiClient` owns a multi-thread Tokio runtime and a pooled client, so
//!   C callers never see async Rust and calls through one handle share
//!   connections.
//! - Every `extern "C"` function wraps its body in `catch_unwind` so panics
//!   never cross the FFI boundary.
//! - A single `FfiResult` envelope conveys success bodies and errors
//!   uniformly. The C caller owns every returned result and frees it with
//!   `breq_free_result`.
//! - Options travel as the JSON form of `RequestConfig`; a null config uses
//!   the defaults.

pub mod types;

use std::ffi::{c_void, CStr};
use std::os::raw::c_char;
use std::panic::{catch_unwind, AssertUnwindSafe};

use basic_request::{Payload, RequestBuilder, RequestConfig};

use types::*;

/// Invoked exactly once per `breq_send_with_callback` call. Ownership of
/// `result` passes to the callback, which must free it with
/// `breq_free_result`.
pub type BreqCallback = extern "C" fn(result: *mut FfiResult, user_data: *mut c_void);

// ---------------------------------------------------------------------------
// Client lifecycle
// ---------------------------------------------------------------------------

/// Create a client with its own runtime and connection pool.
///
/// Returns null if the runtime or transport cannot be created.
/// The caller must free the returned pointer with `breq_client_free`.
#[unsafe(no_mangle)]
pub extern "C" fn breq_client_new() -> *mut FfiClient {
    catch_unwind(|| {
        let Ok(runtime) = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
        else {
            return std::ptr::null_mut();
        };
        let Ok(client) = basic_request::Client::pooled() else {
            return std::ptr::null_mut();
        };
        Box::into_raw(Box::new(FfiClient { runtime, client }))
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Free a client created by `breq_client_new`. Safe to call with null.
///
/// Calls still in flight in callback mode are cancelled and their callbacks
/// never run.
#[unsafe(no_mangle)]
pub extern "C" fn breq_client_free(client: *mut FfiClient) {
    if !client.is_null() {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            let client = unsafe { Box::from_raw(client) };
            client.runtime.shutdown_background();
        }));
    }
}

// ---------------------------------------------------------------------------
// Calls
// ---------------------------------------------------------------------------

/// Read a C string argument, rejecting null and invalid UTF-8.
fn c_str<'a>(ptr: *const c_char, name: &str) -> Result<&'a str, *mut FfiResult> {
    if ptr.is_null() {
        return Err(FfiResult::null_arg(name));
    }
    unsafe { CStr::from_ptr(ptr) }
        .to_str()
        .map_err(|_| FfiResult::invalid_argument(&format!("{name} is not valid UTF-8")))
}

/// Turn C arguments into a ready-to-send builder.
fn prepare(
    client: &FfiClient,
    method: FfiMethod,
    url: *const c_char,
    payload: *const c_char,
    payload_kind: FfiPayloadKind,
    config_json: *const c_char,
) -> Result<RequestBuilder, *mut FfiResult> {
    let url = c_str(url, "url")?;
    let mut builder = client.client.request(method.into(), url);

    if !config_json.is_null() {
        let text = c_str(config_json, "config_json")?;
        let mut config = RequestConfig::from_json(text)
            .map_err(|err| FfiResult::invalid_argument(&format!("invalid config: {err}")))?;
        config.agent = client.client.defaults().agent.clone();
        builder = builder.config(config);
    }

    match payload_kind {
        FfiPayloadKind::None => {}
        FfiPayloadKind::Json => {
            let text = c_str(payload, "payload")?;
            let value: serde_json::Value = serde_json::from_str(text)
                .map_err(|err| FfiResult::invalid_argument(&format!("invalid json payload: {err}")))?;
            builder = builder.payload(Payload::Json(value));
        }
        FfiPayloadKind::Text => {
            builder = builder.payload(Payload::Text(c_str(payload, "payload")?.to_string()));
        }
    }
    Ok(builder)
}

/// Perform a call and block until it resolves.
///
/// `payload` is read according to `payload_kind` and may be null for
/// `FfiPayloadKind::None`. `config_json` may be null.
/// Never returns null. Must not be called from a thread that is already
/// driving a Tokio runtime.
#[unsafe(no_mangle)]
pub extern "C" fn breq_send(
    client: *const FfiClient,
    method: FfiMethod,
    url: *const c_char,
    payload: *const c_char,
    payload_kind: FfiPayloadKind,
    config_json: *const c_char,
) -> *mut FfiResult {
    catch_unwind(AssertUnwindSafe(|| {
        if client.is_null() {
            return FfiResult::null_arg("client");
        }
        let client = unsafe { &*client };
        match prepare(client, method, url, payload, payload_kind, config_json) {
            Ok(builder) => FfiResult::from_outcome(client.runtime.block_on(builder.send_parsed())),
            Err(result) => result,
        }
    }))
    .unwrap_or_else(|_| FfiResult::panic("panic in breq_send"))
}

/// Raw pointer the caller handed us; only ever passed back to the callback.
struct UserData(*mut c_void);

// SAFETY: the pointer is opaque to Rust and only handed back to C.
unsafe impl Send for UserData {}

impl UserData {
    fn get(&self) -> *mut c_void {
        self.0
    }
}

/// Start a call and return immediately. `callback` receives the result on a
/// runtime worker thread.
///
/// Returns `NullArg` without invoking `callback` when `client` or `callback`
/// is null. Argument errors are delivered through `callback` before this
/// function returns, and their kind is also returned. Otherwise returns
/// `Ok` and `callback` runs exactly once later.
#[unsafe(no_mangle)]
pub extern "C" fn breq_send_with_callback(
    client: *const FfiClient,
    method: FfiMethod,
    url: *const c_char,
    payload: *const c_char,
    payload_kind: FfiPayloadKind,
    config_json: *const c_char,
    callback: Option<BreqCallback>,
    user_data: *mut c_void,
) -> FfiErrorKind {
    let (Some(callback), false) = (callback, client.is_null()) else {
        return FfiErrorKind::NullArg;
    };
    catch_unwind(AssertUnwindSafe(|| {
        let client = unsafe { &*client };
        let builder = match prepare(client, method, url, payload, payload_kind, config_json) {
            Ok(builder) => builder,
            Err(result) => {
                let kind = unsafe { (*result).error_kind };
                callback(result, user_data);
                return kind;
            }
        };
        let user_data = UserData(user_data);
        let _guard = client.runtime.enter();
        builder.send_parsed_with(move |outcome| {
            callback(FfiResult::from_outcome(outcome), user_data.get());
        });
        FfiErrorKind::Ok
    }))
    .unwrap_or(FfiErrorKind::Panic)
}

// ---------------------------------------------------------------------------
// Free functions
// ---------------------------------------------------------------------------

/// Free a result returned by `breq_send` or passed to a callback.
/// Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn breq_free_result(result: *mut FfiResult) {
    if !result.is_null() {
        let _ = catch_unwind(|| unsafe { FfiResult::free(result) });
    }
}
