//! Handler wrapper performing request capture

use std::collections::HashMap;
use std::sync::Arc;

use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::{Request, Response};
use tracing::debug;

use crate::capture::{ArrivalCounter, RequestRecord, SlotPool};
use crate::{HttptrapError, Result};

use super::Responder;

/// Wraps the configured [`Responder`]; on every invocation, materializes the
/// request, writes a record into the slot claimed from the arrival counter,
/// then re-presents an equivalent request to the responder.
///
/// Clones share the counter and slot pool, so one handler can be installed
/// across any number of server worker tasks.
#[derive(Clone)]
pub struct RecordingHandler {
    counter: Arc<ArrivalCounter>,
    pool: Arc<SlotPool>,
    responder: Arc<dyn Responder>,
}

impl RecordingHandler {
    pub(super) fn new(
        counter: Arc<ArrivalCounter>,
        pool: Arc<SlotPool>,
        responder: Arc<dyn Responder>,
    ) -> Self {
        Self {
            counter,
            pool,
            responder,
        }
    }

    /// Handle one inbound request: record it, then delegate to the responder.
    ///
    /// The original body stream is drained exactly once; the responder
    /// receives a fresh body rebuilt from the collected bytes.
    ///
    /// # Errors
    ///
    /// Returns error if the body cannot be read or decoded as UTF-8, or if
    /// the query string is malformed. No record is written in that case.
    pub async fn handle<B>(&self, request: Request<B>) -> Result<Response<Full<Bytes>>>
    where
        B: hyper::body::Body,
        B::Error: std::fmt::Display,
    {
        let (parts, body) = request.into_parts();

        let bytes = body
            .collect()
            .await
            .map_err(|e| HttptrapError::BodyRead(format!("{e}")))?
            .to_bytes();

        let text = std::str::from_utf8(&bytes)
            .map_err(|e| HttptrapError::BodyRead(format!("body is not valid UTF-8: {e}")))?
            .to_string();

        let query = decode_query(parts.uri.query())?;

        let headers: HashMap<String, String> = parts
            .headers
            .iter()
            .map(|(name, value)| {
                (
                    name.to_string(),
                    value.to_str().unwrap_or("<invalid>").to_string(),
                )
            })
            .collect();

        let record = RequestRecord {
            method: parts.method.to_string(),
            path: parts.uri.path().to_string(),
            headers,
            query,
            body: text,
        };

        let index = self.counter.next();
        debug!("captured {} {} into slot {}", record.method, record.path, index);
        self.pool.slot(index).write(record)?;

        let rebuilt = Request::from_parts(parts, Full::new(bytes));
        Ok(self.responder.respond(rebuilt))
    }

    /// Number of requests recorded so far
    #[must_use]
    pub fn recorded(&self) -> usize {
        self.counter.claimed()
    }
}

/// Decode a raw query string into a parameter map.
///
/// Empty map when the query string is absent. `+` decodes to a space and
/// `%XX` escapes are expanded, per standard form decoding; a key without
/// `=` (or with an empty value) maps to the empty string, and duplicate
/// keys last-wins.
fn decode_query(raw: Option<&str>) -> Result<HashMap<String, String>> {
    let mut params = HashMap::new();

    let Some(raw) = raw else {
        return Ok(params);
    };

    for pair in raw.split('&') {
        if pair.is_empty() {
            continue;
        }

        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        params.insert(decode_component(key)?, decode_component(value)?);
    }

    Ok(params)
}

fn decode_component(raw: &str) -> Result<String> {
    let spaced = raw.replace('+', " ");

    urlencoding::decode(&spaced)
        .map(std::borrow::Cow::into_owned)
        .map_err(|e| HttptrapError::InvalidRequest(format!("Malformed query component '{raw}': {e}")))
}
