//! Request/response values exchanged with a transport.

use serde_json::{Map, Value};
use std::fmt;

/// Body of an outgoing request.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// JSON object, key order preserved.
    Json(Map<String, Value>),
    /// `application/x-www-form-urlencoded` pairs, order preserved.
    Form(Vec<(String, String)>),
    /// Pre-encoded bytes; the content type comes from the request headers.
    Bytes(Vec<u8>),
}

impl RequestBody {
    /// Content type implied by the body kind, if any.
    pub fn content_type(&self) -> Option<&'static str> {
        match self {
            RequestBody::Json(_) => Some("application/json"),
            RequestBody::Form(_) => Some("application/x-www-form-urlencoded"),
            RequestBody::Bytes(_) => None,
        }
    }

    /// Wire bytes of the body.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            RequestBody::Json(map) => serde_json::to_vec(map).unwrap_or_default(),
            RequestBody::Form(pairs) => encode_form(pairs).into_bytes(),
            RequestBody::Bytes(bytes) => bytes.clone(),
        }
    }
}

/// `application/x-www-form-urlencoded` serialization (spaces as `+`).
pub fn encode_form<K: AsRef<str>, V: AsRef<str>>(pairs: &[(K, V)]) -> String {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (name, value) in pairs {
        serializer.append_pair(name.as_ref(), value.as_ref());
    }
    serializer.finish()
}

/// A concrete, sendable request.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: String,
    pub url: String,
    /// Header pairs in send order.
    pub headers: Vec<(String, String)>,
    pub body: Option<RequestBody>,
}

impl HttpRequest {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// First header value with this name, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Replace every header with this name by a single `name: value` pair.
    pub fn set_header(&mut self, name: &str, value: &str) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value.to_string()));
    }

    /// Content type that will go on the wire: explicit header first, then body kind.
    pub fn effective_content_type(&self) -> Option<String> {
        self.header("content-type")
            .map(str::to_string)
            .or_else(|| {
                self.body
                    .as_ref()
                    .and_then(|b| b.content_type())
                    .map(str::to_string)
            })
    }
}

/// A received response. 4xx/5xx are responses, not errors.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: String,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Body decoded as UTF-8, invalid sequences replaced.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn content_length(&self) -> usize {
        self.body.len()
    }
}

/// Why a request produced no response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendError {
    Timeout,
    Transport(String),
}

impl fmt::Display for SendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SendError::Timeout => write!(f, "timeout"),
            SendError::Transport(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for SendError {}
