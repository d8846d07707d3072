//! Baseline prober: repeat the unmodified request and characterize the noise.

use std::collections::BTreeMap;

use http_fuzz_transport::HttpTransport;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::preview::PreviewConfig;
use crate::report::send_one;
use crate::request::BaseRequest;

/// One baseline request's outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaselineResponse {
    pub index: usize,
    pub status_code: Option<u16>,
    pub response_time_ms: u64,
    pub content_length: usize,
    pub content_type: String,
    pub body_preview: String,
    pub error: Option<String>,
}

/// Statistics over the requests that got a response. Every field is null
/// (and `status_codes` empty) when none did.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BaselineSummary {
    /// Status code (as a string) to count.
    pub status_codes: BTreeMap<String, usize>,
    pub median_response_ms: Option<u64>,
    pub p95_response_ms: Option<u64>,
    pub median_content_length: Option<u64>,
    /// `(max - min) / median * 100` over content lengths, one decimal.
    pub content_length_variance_pct: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineReport {
    pub requests_sent: usize,
    pub responses: Vec<BaselineResponse>,
    pub summary: BaselineSummary,
}

/// Sends the baseline request repeatedly over one transport.
pub struct BaselineProber<'a> {
    transport: &'a dyn HttpTransport,
    preview: PreviewConfig,
}

impl<'a> BaselineProber<'a> {
    pub fn new(transport: &'a dyn HttpTransport, preview: PreviewConfig) -> Self {
        Self { transport, preview }
    }

    /// Send `count` baseline requests sequentially and summarize them.
    pub fn run(&self, base: &BaseRequest, count: usize) -> BaselineReport {
        info!(count, url = %base.url, "sending baseline requests");
        let request = base.to_request();
        let responses: Vec<BaselineResponse> = (0..count)
            .map(|index| {
                let r = send_one(self.transport, &request, "", "", &self.preview);
                match (r.status_code, &r.error) {
                    (Some(status), _) => {
                        info!("  [{}/{}] {} ({}ms)", index + 1, count, status, r.response_time_ms)
                    }
                    (None, error) => info!(
                        "  [{}/{}] ERROR: {} ({}ms)",
                        index + 1,
                        count,
                        error.as_deref().unwrap_or("unknown"),
                        r.response_time_ms
                    ),
                }
                BaselineResponse {
                    index,
                    status_code: r.status_code,
                    response_time_ms: r.response_time_ms,
                    content_length: r.content_length,
                    content_type: r.content_type,
                    body_preview: r.body_preview,
                    error: r.error,
                }
            })
            .collect();
        let summary = summarize(&responses);
        BaselineReport {
            requests_sent: count,
            responses,
            summary,
        }
    }
}

/// Median of a sorted, non-empty slice; the mean of the middle pair for even lengths.
fn median(sorted: &[u64]) -> f64 {
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] as f64 + sorted[mid] as f64) / 2.0
    } else {
        sorted[mid] as f64
    }
}

pub fn summarize(responses: &[BaselineResponse]) -> BaselineSummary {
    let ok: Vec<&BaselineResponse> = responses.iter().filter(|r| r.status_code.is_some()).collect();
    if ok.is_empty() {
        return BaselineSummary::default();
    }

    let mut status_codes = BTreeMap::new();
    for status in ok.iter().filter_map(|r| r.status_code) {
        *status_codes.entry(status.to_string()).or_insert(0) += 1;
    }

    let mut times: Vec<u64> = ok.iter().map(|r| r.response_time_ms).collect();
    times.sort_unstable();
    let mut lengths: Vec<u64> = ok.iter().map(|r| r.content_length as u64).collect();
    lengths.sort_unstable();

    let p95_index = ((times.len() as f64 * 0.95) as usize).saturating_sub(1);
    let median_length = median(&lengths);
    let spread = (lengths[lengths.len() - 1] - lengths[0]) as f64;
    let variance_pct = if median_length > 0.0 {
        spread / median_length * 100.0
    } else {
        0.0
    };

    BaselineSummary {
        status_codes,
        median_response_ms: Some(median(&times) as u64),
        p95_response_ms: Some(times[p95_index]),
        median_content_length: Some(median_length as u64),
        content_length_variance_pct: Some((variance_pct * 10.0).round() / 10.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_fuzz_transport::{HttpRequest, HttpResponse, SendError};
    use http_fuzz_types::Manifest;
    use parking_lot::Mutex;

    fn response(index: usize, status: Option<u16>, ms: u64, len: usize) -> BaselineResponse {
        BaselineResponse {
            index,
            status_code: status,
            response_time_ms: ms,
            content_length: len,
            content_type: String::new(),
            body_preview: String::new(),
            error: status.is_none().then(|| "timeout".to_string()),
        }
    }

    #[test]
    fn test_summary_statistics() {
        let responses = vec![
            response(0, Some(200), 100, 1000),
            response(1, Some(200), 120, 1010),
            response(2, Some(500), 300, 990),
            response(3, None, 10000, 0),
            response(4, Some(200), 110, 1000),
        ];
        let s = summarize(&responses);
        assert_eq!(s.status_codes.get("200"), Some(&3));
        assert_eq!(s.status_codes.get("500"), Some(&1));
        // times 100,110,120,300: median 115
        assert_eq!(s.median_response_ms, Some(115));
        // floor(4 * 0.95) - 1 = 2
        assert_eq!(s.p95_response_ms, Some(120));
        assert_eq!(s.median_content_length, Some(1000));
        assert_eq!(s.content_length_variance_pct, Some(2.0));
    }

    #[test]
    fn test_summary_single_and_zero_median() {
        let s = summarize(&[response(0, Some(204), 50, 0)]);
        assert_eq!(s.p95_response_ms, Some(50));
        assert_eq!(s.content_length_variance_pct, Some(0.0));
    }

    #[test]
    fn test_summary_all_failed_is_null() {
        let s = summarize(&[response(0, None, 10, 0)]);
        assert_eq!(s, BaselineSummary::default());
        let v = serde_json::to_value(&s).unwrap();
        assert!(v["median_response_ms"].is_null());
        assert!(v["status_codes"].as_object().unwrap().is_empty());
    }

    struct Counter(Mutex<usize>);

    impl HttpTransport for Counter {
        fn send(&self, _request: &HttpRequest) -> Result<HttpResponse, SendError> {
            let mut n = self.0.lock();
            *n += 1;
            if *n == 2 {
                return Err(SendError::Timeout);
            }
            Ok(HttpResponse {
                status: 200,
                content_type: "text/html".into(),
                body: b"<html>\nok\n</html>".to_vec(),
            })
        }
    }

    #[test]
    fn test_prober_sends_count_requests() {
        let manifest = Manifest::from_json_str(r#"{"method":"GET","url":"http://h/"}"#).unwrap();
        let base = BaseRequest::from_manifest(&manifest).unwrap();
        let transport = Counter(Mutex::new(0));
        let report = BaselineProber::new(&transport, PreviewConfig::full_body()).run(&base, 3);
        assert_eq!(report.requests_sent, 3);
        assert_eq!(report.responses.len(), 3);
        assert_eq!(report.responses[0].body_preview, "<html> ok </html>");
        assert_eq!(report.responses[1].error.as_deref(), Some("timeout"));
        assert_eq!(report.responses[2].index, 2);
        assert_eq!(report.summary.status_codes.get("200"), Some(&2));
    }
}
