//! Result records for fuzz runs.

use std::time::{Duration, Instant};

use http_fuzz_transport::{HttpRequest, HttpResponse, HttpTransport, SendError};
use serde::{Deserialize, Serialize};

use crate::plan::ParamLocation;
use crate::preview::{extract_preview, PreviewConfig};

/// One completed request. `status_code` is null when the request failed
/// before a response arrived, in which case `error` says why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FuzzResult {
    pub param: String,
    /// Which part of the request `param` names. Null outside fuzz and probe runs.
    pub location: Option<ParamLocation>,
    pub value: String,
    pub status_code: Option<u16>,
    pub response_time_ms: u64,
    pub content_length: usize,
    pub content_type: String,
    pub body_preview: String,
    pub error: Option<String>,
    /// Set only for encoding probes.
    pub probe_encoding: Option<String>,
}

impl FuzzResult {
    pub fn from_response(
        param: &str,
        value: &str,
        response: &HttpResponse,
        elapsed: Duration,
        preview: &PreviewConfig,
    ) -> Self {
        Self {
            param: param.to_string(),
            location: None,
            value: value.to_string(),
            status_code: Some(response.status),
            response_time_ms: millis(elapsed),
            content_length: response.content_length(),
            content_type: response.content_type.clone(),
            body_preview: extract_preview(&response.text(), preview),
            error: None,
            probe_encoding: None,
        }
    }

    pub fn from_error(param: &str, value: &str, error: &SendError, elapsed: Duration) -> Self {
        Self {
            param: param.to_string(),
            location: None,
            value: value.to_string(),
            status_code: None,
            response_time_ms: millis(elapsed),
            content_length: 0,
            content_type: String::new(),
            body_preview: String::new(),
            error: Some(error.to_string()),
            probe_encoding: None,
        }
    }

    pub fn with_location(mut self, location: ParamLocation) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_probe_encoding(mut self, label: &str) -> Self {
        self.probe_encoding = Some(label.to_string());
        self
    }

    pub fn is_error(&self) -> bool {
        self.status_code.is_none()
    }
}

pub(crate) fn millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

/// Send `request` once and record the outcome under `(param, value)`.
pub fn send_one(
    transport: &dyn HttpTransport,
    request: &HttpRequest,
    param: &str,
    value: &str,
    preview: &PreviewConfig,
) -> FuzzResult {
    let start = Instant::now();
    match transport.send(request) {
        Ok(response) => FuzzResult::from_response(param, value, &response, start.elapsed(), preview),
        Err(err) => FuzzResult::from_error(param, value, &err, start.elapsed()),
    }
}

/// Totals for a finished run, logged at the end.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Tasks planned.
    pub total: usize,
    /// Results handed to the output sink.
    pub emitted: usize,
    /// Results whose request failed in transport.
    pub transport_errors: usize,
    /// Tasks lost to a worker failure.
    pub worker_failures: usize,
    /// The collector gave up waiting before every task reported.
    pub stalled: bool,
    pub elapsed_ms: u64,
}

impl RunSummary {
    /// Tasks that reported, successfully or not.
    pub fn completed(&self) -> usize {
        self.emitted + self.worker_failures
    }
}
