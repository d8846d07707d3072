//! Encoding probes: the baseline body values resent under other content types.

use anyhow::{bail, Result};
use http_fuzz_transport::{encode_form, HttpRequest, HttpTransport, RequestBody};
use http_fuzz_types::{BodyFormat, Manifest, Param};
use serde_json::{Map, Value};
use tracing::info;

use crate::plan::ParamLocation;
use crate::preview::PreviewConfig;
use crate::report::{send_one, FuzzResult};
use crate::request::BaseRequest;

/// `param` value on every probe result.
pub const PROBE_PARAM: &str = "Content-Type";

pub const XML_XXE_LABEL: &str = "application/xml+xxe";
pub const FORM_LABEL: &str = "application/x-www-form-urlencoded";
pub const JSON_LABEL: &str = "application/json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodingProbe {
    /// Reported as `value` and `probe_encoding`.
    pub label: &'static str,
    /// Sent as the request's `Content-Type`.
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

impl EncodingProbe {
    /// First `max` bytes of the body for display, `...` appended when cut.
    pub fn body_excerpt(&self, max: usize) -> String {
        let mut out = String::from_utf8_lossy(&self.body[..self.body.len().min(max)]).into_owned();
        if self.body.len() > max {
            out.push_str("...");
        }
        out
    }
}

/// Escape text for XML character data.
fn xml_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

/// XML document whose first element references an external entity.
pub fn xml_xxe_body(params: &[&Param]) -> Option<String> {
    let (first, rest) = params.split_first()?;
    let mut inner = format!("<{0}>&xxe;</{0}>", first.name);
    for p in rest {
        inner.push_str(&format!("<{0}>{1}</{0}>", p.name, xml_escape(&p.value_string())));
    }
    Some(format!(
        "<?xml version=\"1.0\"?><!DOCTYPE x [<!ENTITY xxe SYSTEM \"file:///etc/passwd\">]><root>{}</root>",
        inner
    ))
}

/// Probes for every encoding other than the manifest's own.
///
/// Fails when the manifest has no fuzzable body params or nothing is left to
/// probe.
pub fn build_encoding_probes(manifest: &Manifest) -> Result<Vec<EncodingProbe>> {
    let fuzzable: Vec<&Param> = manifest.body_params.iter().filter(|p| p.fuzzable).collect();
    if fuzzable.is_empty() {
        bail!("No fuzzable body params, cannot construct encoding probes.");
    }

    let mut probes = Vec::new();
    if let Some(xml) = xml_xxe_body(&fuzzable) {
        probes.push(EncodingProbe {
            label: XML_XXE_LABEL,
            content_type: "application/xml",
            body: xml.into_bytes(),
        });
    }
    if manifest.body_format != BodyFormat::Form {
        let pairs: Vec<(String, String)> = fuzzable
            .iter()
            .map(|p| (p.name.clone(), p.value_string()))
            .collect();
        probes.push(EncodingProbe {
            label: FORM_LABEL,
            content_type: FORM_LABEL,
            body: encode_form(&pairs).into_bytes(),
        });
    }
    if !matches!(manifest.body_format, BodyFormat::Json | BodyFormat::None) {
        let map: Map<String, Value> = fuzzable
            .iter()
            .map(|p| (p.name.clone(), p.value.clone()))
            .collect();
        probes.push(EncodingProbe {
            label: JSON_LABEL,
            content_type: JSON_LABEL,
            body: serde_json::to_vec(&map)?,
        });
    }

    if probes.is_empty() {
        bail!("No alternative encodings to probe for this body_format.");
    }
    Ok(probes)
}

/// Baseline request carrying the probe body and content type.
pub fn probe_request(base: &BaseRequest, probe: &EncodingProbe) -> HttpRequest {
    let mut request = base.to_request();
    request.set_header("Content-Type", probe.content_type);
    request.body = Some(RequestBody::Bytes(probe.body.clone()));
    request
}

/// Send each probe once, in order, over one transport.
pub fn run_encoding_probes<F>(
    transport: &dyn HttpTransport,
    base: &BaseRequest,
    probes: &[EncodingProbe],
    preview: &PreviewConfig,
    mut sink: F,
) -> Result<usize>
where
    F: FnMut(&FuzzResult) -> Result<()>,
{
    info!(probes = probes.len(), url = %base.url, "sending encoding probes");
    for probe in probes {
        let request = probe_request(base, probe);
        let result = send_one(transport, &request, PROBE_PARAM, probe.label, preview)
            .with_location(ParamLocation::Header)
            .with_probe_encoding(probe.label);
        sink(&result)?;
    }
    Ok(probes.len())
}
