//! Fuzzability classification for manifest fields.
//!
//! Pure functions deciding, per field, whether substituting a candidate value
//! is safe and interesting. Decoders call these while building a
//! [`Manifest`]; [`build_manifest`] is the shared assembly step every decoder
//! converges on.

use anyhow::{Context, Result};
use http_fuzz_types::{is_sensitive_header, BodyFormat, Header, Manifest, Param, PathSegment};
use serde_json::Value;
use url::Url;

/// Reason attached to headers that carry credentials or session state.
pub const SENSITIVE_HEADER_REASON: &str = "auth/session material, skipped to avoid lockout";

/// True for identifier-like segments: all digits, a lowercase canonical UUID,
/// or a lowercase hex string of at least 24 characters.
pub fn classify_path_segment(value: &str) -> bool {
    is_all_digits(value) || is_uuid(value) || is_long_hex(value)
}

fn is_all_digits(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit())
}

fn is_lower_hex(b: u8) -> bool {
    b.is_ascii_digit() || (b'a'..=b'f').contains(&b)
}

fn is_uuid(value: &str) -> bool {
    let bytes = value.as_bytes();
    bytes.len() == 36
        && bytes.iter().enumerate().all(|(i, &b)| match i {
            8 | 13 | 18 | 23 => b == b'-',
            _ => is_lower_hex(b),
        })
}

fn is_long_hex(value: &str) -> bool {
    value.len() >= 24 && value.bytes().all(is_lower_hex)
}

/// `(fuzzable, reason)` for a header name. The reason is empty when fuzzable.
pub fn classify_header(name: &str) -> (bool, String) {
    if is_sensitive_header(name) {
        (false, SENSITIVE_HEADER_REASON.to_string())
    } else {
        (true, String::new())
    }
}

/// Build a classified [`Header`].
pub fn classified_header(name: &str, value: &str) -> Header {
    let (fuzzable, reason) = classify_header(name);
    Header {
        name: name.to_string(),
        value: value.to_string(),
        fuzzable,
        reason,
    }
}

/// Split a URL path into indexed segments, skipping empty, `.` and `..` parts.
pub fn parse_path_segments(path: &str) -> Vec<PathSegment> {
    path.split('/')
        .filter(|p| !p.is_empty() && *p != "." && *p != "..")
        .enumerate()
        .map(|(index, value)| PathSegment {
            index,
            value: value.to_string(),
            fuzzable: classify_path_segment(value),
        })
        .collect()
}

/// Decode `application/x-www-form-urlencoded` text into string params,
/// keeping blank values and duplicate names in order.
pub fn parse_urlencoded_params(text: &str) -> Vec<Param> {
    url::form_urlencoded::parse(text.as_bytes())
        .map(|(name, value)| Param::new(name.into_owned(), Value::String(value.into_owned())))
        .collect()
}

/// Body params of a JSON object plus notes about nested values.
///
/// Nested objects and arrays stay fuzzable; the reconstructor replaces them
/// wholesale with a scalar, which the note records. A top-level array yields
/// no params.
pub fn json_body_params(value: &Value) -> (Vec<Param>, Vec<String>) {
    match value {
        Value::Object(map) => {
            let params: Vec<Param> = map
                .iter()
                .map(|(name, value)| Param::new(name.clone(), value.clone()))
                .collect();
            let notes = params
                .iter()
                .filter(|p| p.param_type().is_nested())
                .map(|p| {
                    format!(
                        "Body param '{}' is a nested {}; fuzz values replace the whole value with a scalar.",
                        p.name,
                        p.param_type().as_str()
                    )
                })
                .collect();
            (params, notes)
        }
        Value::Array(_) => (
            Vec::new(),
            vec!["Body is a top-level JSON array; its elements are not fuzzed individually.".to_string()],
        ),
        _ => (Vec::new(), Vec::new()),
    }
}

/// Guess the body encoding from the declared content type, then from the text.
pub fn detect_body_format(content_type: &str, body: &str) -> BodyFormat {
    let ct = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    if ct == "application/json" || ct.ends_with("+json") {
        return BodyFormat::Json;
    }
    if ct == "application/x-www-form-urlencoded" {
        return BodyFormat::Form;
    }
    if ct.starts_with("multipart/") {
        return BodyFormat::Multipart;
    }
    let trimmed = body.trim_start();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        BodyFormat::Json
    } else if body.contains('=') && body.contains('&') {
        BodyFormat::Form
    } else {
        BodyFormat::Raw
    }
}

/// Assemble a classified manifest from decoded request parts.
pub fn build_manifest(
    method: &str,
    url: &str,
    headers: &[(String, String)],
    body: &str,
) -> Result<Manifest> {
    let parsed = Url::parse(url).with_context(|| format!("Invalid request URL '{}'", url))?;
    let mut base = parsed.clone();
    base.set_query(None);
    base.set_fragment(None);

    let content_type = headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("content-type"))
        .map(|(_, v)| v.as_str())
        .unwrap_or("");

    let mut body_format = BodyFormat::None;
    let mut body_params = Vec::new();
    let mut notes = Vec::new();
    if !body.is_empty() {
        body_format = detect_body_format(content_type, body);
        match body_format {
            BodyFormat::Json => match serde_json::from_str::<Value>(body) {
                Ok(value) => {
                    let (params, json_notes) = json_body_params(&value);
                    body_params = params;
                    notes = json_notes;
                }
                Err(e) => {
                    body_format = BodyFormat::Raw;
                    notes.push(format!("Body looks like JSON but does not parse: {}", e));
                }
            },
            BodyFormat::Form => body_params = parse_urlencoded_params(body),
            BodyFormat::Multipart => notes.push(
                "Multipart body: file parts are not fuzzed. Remove them and resubmit as form fields to fuzz text parts."
                    .to_string(),
            ),
            _ => notes.push("Raw body: no parameters extracted for fuzzing.".to_string()),
        }
    }

    let mut manifest = Manifest {
        method: method.to_string(),
        url: url.to_string(),
        base_url: base.to_string(),
        path_segments: parse_path_segments(parsed.path()),
        query_params: parsed
            .query()
            .map(parse_urlencoded_params)
            .unwrap_or_default(),
        headers: headers
            .iter()
            .map(|(name, value)| classified_header(name, value))
            .collect(),
        body_format,
        body_params,
        notes,
    };
    manifest.normalize();
    manifest.validate()?;
    Ok(manifest)
}
