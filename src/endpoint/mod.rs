//! Recording endpoint: handler wrapper and factory
//!
//! A recording endpoint pairs a [`CaptureSequence`] for the consumer with a
//! [`RecordingHandler`] suitable for installation into an HTTP server.

mod handler;

pub use handler::RecordingHandler;

use std::sync::Arc;
use std::time::Duration;

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Request, Response, StatusCode};

use crate::capture::{ArrivalCounter, CaptureSequence, SlotPool};
use crate::config::{CaptureConfig, DEFAULT_TIMEOUT_MS};

/// Inner handler invoked after a request has been recorded.
///
/// Receives a request equivalent to the original, with an independently
/// readable body rebuilt from the materialized bytes, and produces the
/// response returned to the HTTP client verbatim.
pub trait Responder: Send + Sync {
    /// Produce the response for a recorded request
    fn respond(&self, request: Request<Full<Bytes>>) -> Response<Full<Bytes>>;
}

impl<F> Responder for F
where
    F: Fn(Request<Full<Bytes>>) -> Response<Full<Bytes>> + Send + Sync,
{
    fn respond(&self, request: Request<Full<Bytes>>) -> Response<Full<Bytes>> {
        self(request)
    }
}

/// Default responder: HTTP 200, no headers, empty body
struct DefaultResponder;

impl Responder for DefaultResponder {
    fn respond(&self, _request: Request<Full<Bytes>>) -> Response<Full<Bytes>> {
        Response::builder()
            .status(StatusCode::OK)
            .body(Full::new(Bytes::new()))
            .expect("Failed to build response")
    }
}

/// Builder for a recording endpoint
pub struct EndpointBuilder {
    timeout: Duration,
    responder: Arc<dyn Responder>,
}

impl EndpointBuilder {
    /// Create a builder with the default timeout and responder
    #[must_use]
    pub fn new() -> Self {
        Self {
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            responder: Arc::new(DefaultResponder),
        }
    }

    /// Seed the builder from configuration
    #[must_use]
    pub fn from_config(config: &CaptureConfig) -> Self {
        Self::new().timeout(Duration::from_millis(config.timeout_ms))
    }

    /// Set the default per-element wait used by the capture sequence
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the inner responder invoked after recording
    #[must_use]
    pub fn respond_with<R: Responder + 'static>(mut self, responder: R) -> Self {
        self.responder = Arc::new(responder);
        self
    }

    /// Build the endpoint: a capture sequence for the consumer and a
    /// handler for the server.
    ///
    /// The sequence and its backing counter are created together and share
    /// the same slot pool for the lifetime of the endpoint.
    #[must_use]
    pub fn build(self) -> (CaptureSequence, RecordingHandler) {
        let pool = Arc::new(SlotPool::new());
        let counter = Arc::new(ArrivalCounter::new());

        let sequence = CaptureSequence::new(Arc::clone(&pool), self.timeout);
        let handler = RecordingHandler::new(counter, pool, self.responder);

        (sequence, handler)
    }
}

impl Default for EndpointBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Create a recording endpoint with the default configuration
#[must_use]
pub fn recording_endpoint() -> (CaptureSequence, RecordingHandler) {
    EndpointBuilder::new().build()
}
