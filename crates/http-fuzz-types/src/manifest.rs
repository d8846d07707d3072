//! The request manifest: one HTTP request plus fuzzability annotations.
//!
//! A manifest is produced once by a decoder and treated as immutable input by
//! everything downstream. Field shapes match the JSON document decoders emit:
//!
//! ```json
//! {
//!   "method": "POST",
//!   "url": "https://api.example.com/users/42?verbose=1",
//!   "base_url": "https://api.example.com/users/42",
//!   "path_segments": [{"index": 0, "value": "users", "fuzzable": false},
//!                     {"index": 1, "value": "42", "fuzzable": true}],
//!   "query_params": [{"name": "verbose", "value": "1", "type": "string", "fuzzable": true}],
//!   "headers": [{"name": "Cookie", "value": "s=1", "fuzzable": false,
//!                "reason": "auth/session material - skip fuzzing to avoid lockout"}],
//!   "body_format": "json",
//!   "body_params": [{"name": "email", "value": "a@b.com", "type": "string", "fuzzable": true}],
//!   "notes": []
//! }
//! ```

use anyhow::{anyhow, bail, ensure, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

/// Headers carrying auth/session material. Never fuzzable.
pub const SENSITIVE_HEADERS: &[&str] = &[
    "authorization",
    "cookie",
    "x-csrf-token",
    "x-xsrf-token",
    "x-api-key",
    "x-auth-token",
    "api-key",
    "x-access-token",
];

/// Case-insensitive membership test against [`SENSITIVE_HEADERS`].
pub fn is_sensitive_header(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    SENSITIVE_HEADERS.contains(&lower.as_str())
}

/// Kind tag of a parameter value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Integer,
    Float,
    Boolean,
    Null,
    #[serde(alias = "dict")]
    Object,
    #[serde(alias = "list")]
    Array,
}

impl ParamType {
    /// The tag matching a JSON value's kind.
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => ParamType::Null,
            Value::Bool(_) => ParamType::Boolean,
            Value::Number(n) if n.is_i64() || n.is_u64() => ParamType::Integer,
            Value::Number(_) => ParamType::Float,
            Value::String(_) => ParamType::String,
            Value::Object(_) => ParamType::Object,
            Value::Array(_) => ParamType::Array,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
            ParamType::Float => "float",
            ParamType::Boolean => "boolean",
            ParamType::Null => "null",
            ParamType::Object => "object",
            ParamType::Array => "array",
        }
    }

    /// Object and array values are replaced wholesale, never recursed into.
    pub fn is_nested(&self) -> bool {
        matches!(self, ParamType::Object | ParamType::Array)
    }
}

/// How the request body is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyFormat {
    #[default]
    #[serde(alias = "")]
    None,
    Json,
    Form,
    Multipart,
    Raw,
}

impl BodyFormat {
    /// Formats whose fields are extracted into `body_params`.
    pub fn has_params(&self) -> bool {
        matches!(self, BodyFormat::Json | BodyFormat::Form)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BodyFormat::None => "none",
            BodyFormat::Json => "json",
            BodyFormat::Form => "form",
            BodyFormat::Multipart => "multipart",
            BodyFormat::Raw => "raw",
        }
    }
}

fn default_true() -> bool {
    true
}

/// One non-empty path segment, indexed after dropping empty, `.` and `..` parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathSegment {
    pub index: usize,
    pub value: String,
    #[serde(default = "default_true")]
    pub fuzzable: bool,
}

/// A query or body parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    #[serde(default)]
    pub value: Value,
    /// Declared kind. Filled from `value` by [`Manifest::normalize`] when absent.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub declared_type: Option<ParamType>,
    #[serde(default = "default_true")]
    pub fuzzable: bool,
    #[serde(default)]
    pub reason: String,
}

impl Param {
    /// A fuzzable parameter whose type tag is inferred from `value`.
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        let declared_type = Some(ParamType::of(&value));
        Self {
            name: name.into(),
            value,
            declared_type,
            fuzzable: true,
            reason: String::new(),
        }
    }

    pub fn param_type(&self) -> ParamType {
        self.declared_type
            .unwrap_or_else(|| ParamType::of(&self.value))
    }

    /// Wire form of the value for query strings and form bodies.
    pub fn value_string(&self) -> String {
        scalar_to_string(&self.value)
    }
}

/// Render a JSON value the way it appears in a query string or form body.
pub fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
    #[serde(default = "default_true")]
    pub fuzzable: bool,
    #[serde(default)]
    pub reason: String,
}

/// Normalized, format-independent description of one HTTP request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub path_segments: Vec<PathSegment>,
    #[serde(default)]
    pub query_params: Vec<Param>,
    #[serde(default)]
    pub headers: Vec<Header>,
    #[serde(default)]
    pub body_format: BodyFormat,
    #[serde(default)]
    pub body_params: Vec<Param>,
    #[serde(default)]
    pub notes: Vec<String>,
}

impl Manifest {
    /// Read, normalize and validate a manifest file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot load manifest '{}'", path.display()))?;
        Self::from_json_str(&text)
            .with_context(|| format!("Cannot load manifest '{}'", path.display()))
    }

    /// Parse, normalize and validate a manifest document.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let mut manifest: Manifest =
            serde_json::from_str(text).map_err(|e| anyhow!("invalid manifest JSON: {}", e))?;
        manifest.normalize();
        manifest.validate()?;
        Ok(manifest)
    }

    /// Uppercase the method, fill missing type tags and derive `base_url`.
    pub fn normalize(&mut self) {
        self.method = self.method.trim().to_ascii_uppercase();
        for param in self.query_params.iter_mut().chain(self.body_params.iter_mut()) {
            if param.declared_type.is_none() {
                param.declared_type = Some(ParamType::of(&param.value));
            }
        }
        if self.base_url.is_empty() {
            let end = self.url.find(|c| c == '?' || c == '#').unwrap_or(self.url.len());
            self.base_url = self.url[..end].to_string();
        }
    }

    /// Reject manifests whose fields contradict each other.
    pub fn validate(&self) -> Result<()> {
        ensure!(!self.method.is_empty(), "manifest has an empty method");
        ensure!(!self.url.is_empty(), "manifest has an empty url");

        for (expected, segment) in self.path_segments.iter().enumerate() {
            if segment.index != expected {
                bail!(
                    "path segment indices must be contiguous from 0 (found {} at position {})",
                    segment.index,
                    expected
                );
            }
        }

        if !self.body_params.is_empty() && !self.body_format.has_params() {
            bail!(
                "body_params present but body_format is '{}' (only json/form carry params)",
                self.body_format.as_str()
            );
        }

        if let Some(header) = self
            .headers
            .iter()
            .find(|h| h.fuzzable && is_sensitive_header(&h.name))
        {
            bail!(
                "header '{}' carries auth/session material and must not be fuzzable",
                header.name
            );
        }
        Ok(())
    }

    /// First header with this name, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&Header> {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
    }

    pub fn query_param(&self, name: &str) -> Option<&Param> {
        self.query_params.iter().find(|p| p.name == name)
    }

    pub fn body_param(&self, name: &str) -> Option<&Param> {
        self.body_params.iter().find(|p| p.name == name)
    }
}
