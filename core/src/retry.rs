//! Bounded retry around a whole attempt chain.
//!
//! Every classified error is retried the same way, 4xx included; success
//! returns at once. There is no backoff between attempts.

use std::future::Future;

use tracing::warn;

use crate::error::RequestError;

/// Run `attempt` until it succeeds or `retries` extra runs have failed.
///
/// `attempt` receives the 1-based attempt number. With `retries = n` and a
/// target that always fails it runs exactly `n + 1` times and the last error
/// is returned.
pub(crate) async fn with_retries<T, F, Fut>(retries: u32, mut attempt: F) -> Result<T, RequestError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, RequestError>>,
{
    let mut remaining = retries;
    let mut number = 1;
    loop {
        match attempt(number).await {
            Ok(value) => return Ok(value),
            Err(error) if remaining > 0 => {
                warn!(
                    attempt = number,
                    remaining,
                    kind = %error.kind(),
                    %error,
                    "request failed, retrying"
                );
                remaining -= 1;
                number += 1;
            }
            Err(error) => return Err(error),
        }
    }
}
