//! http-fuzz: parameter fuzzing for HTTP endpoints.
//!
//! A request is described once as a [`Manifest`](http_fuzz_types::Manifest).
//! The engine in [`http_fuzz_core`] varies one location at a time using
//! per-parameter corpus files and streams one JSON result per request.
//!
//! This crate holds the pieces that touch the filesystem and stdout:
//!
//! - [`corpus`]: loading `<corpus_dir>/<param>.txt` files
//! - [`output`]: the NDJSON result stream, the error object and dry-run plans

pub mod corpus;
pub mod output;
