//! HTTP transport for http-fuzz.
//!
//! Requests are plain values ([`HttpRequest`]) built by the reconstructor and
//! handed to an [`HttpTransport`]. The production implementation,
//! [`UreqTransport`], owns one `ureq::Agent` and therefore one connection
//! pool; the executor builds one per worker.
//!
//! TLS verification is an explicit [`TransportConfig::verify_tls`] switch
//! applied to every agent built from that config. There is no process-wide
//! "insecure" state.
//!
//! ```ignore
//! let transport = UreqTransport::new(&TransportConfig::default())?;
//! let response = transport.send(&HttpRequest::new("GET", "http://localhost:8080/"))?;
//! println!("{} {}", response.status, response.text());
//! ```

pub mod client;
pub mod request;
mod tls;

pub use client::{HttpTransport, TransportConfig, UreqTransport};
pub use request::{encode_form, HttpRequest, HttpResponse, RequestBody, SendError};
