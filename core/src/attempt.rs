//! Per-attempt response state machine and the redirect driver.
//!
//! # Design
//! An `Attempt` is one network round-trip for one hop. It moves through
//! `Sending -> AwaitingHeaders -> StreamingBody -> Done`, and every async
//! event the driver observes (headers, send error, timer, chunk, read error,
//! end of stream) is fed through `Attempt::handle`. `Done` is absorbing:
//! once an attempt has produced a terminal step, later events are ignored, so
//! a timer that fires after completion (or a completion that lands after the
//! timer) can never produce a second outcome.
//!
//! `open` drives attempts hop by hop in a loop. Each 301/302 starts a new
//! `Attempt` against the resolved `Location`, keeping method and payload, and
//! the hop counter is capped by `RequestConfig::max_redirects`.

use std::future::Future;
use std::time::Duration;

use bytes::Bytes;
use http::header::LOCATION;
use http::HeaderMap;
use tracing::{debug, trace};
use url::Url;

use crate::body::RawResponse;
use crate::config::RequestSpec;
use crate::error::{RequestError, TransportError};
use crate::http::Scheme;
use crate::options::build_request;
use crate::transport::Transport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum State {
    Sending,
    AwaitingHeaders,
    StreamingBody,
    Done,
}

/// Something the transport or a timer reported.
#[derive(Debug)]
pub(crate) enum Event {
    Headers {
        status: u16,
        location: Option<String>,
    },
    SendFailed(TransportError),
    Chunk(Bytes),
    ReadFailed(TransportError),
    End,
    Timeout,
}

/// What the driver must do after an event.
#[derive(Debug)]
pub(crate) enum Step {
    /// Follow the redirect to this location. Terminal for this attempt.
    Redirect(String),
    /// 204: succeed with no body.
    NoContent,
    /// 200: hand the live stream to the body reader.
    Stream,
    Chunk(Bytes),
    /// Body fully received.
    Complete,
    Failed(RequestError),
}

#[derive(Debug)]
pub(crate) struct Attempt {
    state: State,
    hop: usize,
}

impl Attempt {
    pub(crate) fn new(hop: usize) -> Self {
        Self {
            state: State::Sending,
            hop,
        }
    }

    pub(crate) fn state(&self) -> State {
        self.state
    }

    pub(crate) fn is_done(&self) -> bool {
        self.state == State::Done
    }

    /// The request is on the wire; arm for headers.
    pub(crate) fn sent(&mut self) {
        if self.state == State::Sending {
            self.enter(State::AwaitingHeaders);
        }
    }

    /// Apply one event. Returns `None` when the event has no effect, which is
    /// always the case once the attempt is done.
    pub(crate) fn handle(&mut self, event: Event) -> Option<Step> {
        if self.is_done() {
            trace!(hop = self.hop, ?event, "ignoring event after attempt finished");
            return None;
        }
        let waiting = matches!(self.state, State::Sending | State::AwaitingHeaders);
        let step = match event {
            Event::Headers { status, location } if waiting => self.on_headers(status, location),
            Event::SendFailed(error) if waiting => self.fail(RequestError::from_send(error)),
            Event::Timeout if waiting => self.fail(RequestError::request_timeout()),
            Event::Chunk(bytes) if self.state == State::StreamingBody => Step::Chunk(bytes),
            Event::ReadFailed(error) if self.state == State::StreamingBody => {
                self.fail(RequestError::from_read(error))
            }
            Event::End if self.state == State::StreamingBody => {
                self.enter(State::Done);
                Step::Complete
            }
            Event::Timeout if self.state == State::StreamingBody => {
                self.fail(RequestError::response_timeout())
            }
            event => {
                trace!(hop = self.hop, state = ?self.state, ?event, "event does not apply");
                return None;
            }
        };
        Some(step)
    }

    fn on_headers(&mut self, status: u16, location: Option<String>) -> Step {
        debug!(hop = self.hop, status, "response headers received");
        match status {
            301 | 302 => match location {
                Some(location) => {
                    self.enter(State::Done);
                    Step::Redirect(location)
                }
                None => self.fail(RequestError::missing_location(status)),
            },
            204 => {
                self.enter(State::Done);
                Step::NoContent
            }
            200 => {
                self.enter(State::StreamingBody);
                Step::Stream
            }
            other => self.fail(RequestError::invalid_status(other)),
        }
    }

    fn fail(&mut self, error: RequestError) -> Step {
        self.enter(State::Done);
        Step::Failed(error)
    }

    fn enter(&mut self, next: State) {
        debug!(hop = self.hop, from = ?self.state, to = ?next, "attempt transition");
        self.state = next;
    }
}

/// Race `future` against an optional timer. `None` means the timer won.
pub(crate) async fn race<F: Future>(limit: Option<Duration>, future: F) -> Option<F::Output> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, future).await.ok(),
        None => Some(future.await),
    }
}

/// Outcome of opening a response: either no body at all or a live stream.
#[derive(Debug)]
pub(crate) enum Opened {
    NoContent { status: u16, headers: HeaderMap },
    Streaming(RawResponse),
}

/// Send `spec`, following redirects, until a terminal status arrives.
pub(crate) async fn open(transport: &dyn Transport, spec: &RequestSpec) -> Result<Opened, RequestError> {
    let mut url = Url::parse(&spec.url)
        .map_err(|error| RequestError::sending(format!("invalid url {}: {error}", spec.url)).with_source(error))?;
    let mut hops = 0;

    loop {
        let scheme = Scheme::select(&url)?;
        let request = build_request(&url, scheme, spec.method, spec.payload.as_ref(), &spec.config);
        let mut attempt = Attempt::new(hops);
        attempt.sent();

        let (event, response) = match race(spec.config.timeout, transport.round_trip(request)).await {
            None => (Event::Timeout, None),
            Some(Err(error)) => (Event::SendFailed(error), None),
            Some(Ok(response)) => {
                let location = response
                    .headers
                    .get(LOCATION)
                    .and_then(|value| value.to_str().ok())
                    .map(str::to_string);
                let event = Event::Headers {
                    status: response.status,
                    location,
                };
                (event, Some(response))
            }
        };

        match (attempt.handle(event), response) {
            (Some(Step::Redirect(location)), _) => {
                if hops >= spec.config.max_redirects {
                    return Err(RequestError::too_many_redirects(spec.config.max_redirects));
                }
                url = url.join(&location).map_err(|error| {
                    RequestError::sending(format!("invalid redirect location {location}: {error}"))
                        .with_source(error)
                })?;
                hops += 1;
                debug!(%url, hops, "following redirect");
            }
            (Some(Step::NoContent), Some(response)) => {
                return Ok(Opened::NoContent {
                    status: response.status,
                    headers: response.headers,
                });
            }
            (Some(Step::Stream), Some(response)) => {
                return Ok(Opened::Streaming(RawResponse::new(
                    url,
                    response,
                    attempt,
                    spec.config.timeout,
                )));
            }
            (Some(Step::Failed(error)), _) => return Err(error),
            (step, _) => {
                return Err(RequestError::sending(format!(
                    "attempt ended without a response ({step:?})"
                )));
            }
        }
    }
}
