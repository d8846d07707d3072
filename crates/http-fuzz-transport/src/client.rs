//! The `HttpTransport` seam and its ureq implementation.

use std::error::Error as _;
use std::io::{self, Read};
use std::time::Duration;

use anyhow::Result;
use tracing::debug;

use crate::request::{HttpRequest, HttpResponse, SendError};
use crate::tls::insecure_client_config;

/// Headers the transport computes itself. A value copied from a captured
/// request would no longer match the substituted body.
const HOP_HEADERS: &[&str] = &["content-length", "transfer-encoding"];

/// Sends one request and returns the full response or a send error.
///
/// Implementations are owned by a single worker, so they only need `Send`.
pub trait HttpTransport: Send {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, SendError>;
}

/// Settings shared by every agent a run creates.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Whole-request timeout (connect, send and read).
    pub timeout: Duration,
    /// Verify server certificates. When false any certificate is accepted.
    pub verify_tls: bool,
    pub user_agent: String,
}

impl TransportConfig {
    pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

    pub fn new(timeout: Duration, verify_tls: bool) -> Self {
        Self {
            timeout,
            verify_tls,
            ..Self::default()
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
            verify_tls: true,
            user_agent: concat!("http-fuzz/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Blocking transport backed by one `ureq::Agent`.
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new(config: &TransportConfig) -> Result<Self> {
        let mut builder = ureq::AgentBuilder::new()
            .timeout(config.timeout)
            .timeout_connect(config.timeout)
            .user_agent(&config.user_agent);
        if !config.verify_tls {
            builder = builder.tls_config(insecure_client_config()?);
        }
        Ok(Self {
            agent: builder.build(),
        })
    }

    fn prepare(&self, request: &HttpRequest) -> ureq::Request {
        let mut req = self.agent.request(&request.method, &request.url);
        for (name, value) in &request.headers {
            if HOP_HEADERS.iter().any(|h| h.eq_ignore_ascii_case(name)) {
                continue;
            }
            req = req.set(name, value);
        }
        if request.body.is_some() && request.header("content-type").is_none() {
            if let Some(ct) = request.effective_content_type() {
                req = req.set("Content-Type", &ct);
            }
        }
        req
    }
}

impl HttpTransport for UreqTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, SendError> {
        let req = self.prepare(request);
        let outcome = match &request.body {
            Some(body) => req.send_bytes(&body.encode()),
            None => req.call(),
        };
        let response = match outcome {
            Ok(resp) => resp,
            // Error statuses are observations, not failures.
            Err(ureq::Error::Status(_, resp)) => resp,
            Err(ureq::Error::Transport(t)) => {
                debug!(url = %request.url, error = %t, "transport error");
                return Err(classify_transport(&t));
            }
        };
        read_response(response)
    }
}

fn read_response(response: ureq::Response) -> Result<HttpResponse, SendError> {
    let status = response.status();
    let content_type = response.header("content-type").unwrap_or("").to_string();
    let mut body = Vec::new();
    response
        .into_reader()
        .read_to_end(&mut body)
        .map_err(|e| classify_io(&e))?;
    Ok(HttpResponse {
        status,
        content_type,
        body,
    })
}

fn is_timeout(err: &io::Error) -> bool {
    matches!(err.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock)
}

fn classify_io(err: &io::Error) -> SendError {
    if is_timeout(err) {
        SendError::Timeout
    } else {
        SendError::Transport(err.to_string())
    }
}

fn classify_transport(t: &ureq::Transport) -> SendError {
    let mut source = t.source();
    while let Some(err) = source {
        if let Some(io_err) = err.downcast_ref::<io::Error>() {
            if is_timeout(io_err) {
                return SendError::Timeout;
            }
        }
        source = err.source();
    }
    SendError::Transport(t.to_string())
}
