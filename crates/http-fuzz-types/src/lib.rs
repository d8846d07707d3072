//! Shared types for the http-fuzz workspace.
//!
//! The [`manifest`] module holds the format-independent description of one
//! HTTP request. Every input decoder (raw HTTP text, curl command lines, HAR
//! logs, API descriptions, packet captures) produces a [`Manifest`]; the fuzz
//! executor only ever consumes one.
//!
//! [`env_utils`] provides the environment-variable parsing used for
//! configuration defaults.

pub mod env_utils;
pub mod manifest;

// Re-export the manifest model at crate root
pub use manifest::{
    is_sensitive_header, scalar_to_string, BodyFormat, Header, Manifest, Param, ParamType, PathSegment,
    SENSITIVE_HEADERS,
};
