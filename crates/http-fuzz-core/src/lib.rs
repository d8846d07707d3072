//! Fuzz engine for HTTP request manifests.
//!
//! # Architecture
//!
//! - [`classifier`]: decides which manifest fields are worth mutating and
//!   assembles manifests from decoded request parts
//! - [`plan`]: fuzz targets and the parameter-major task list
//! - [`request`]: the shared baseline snapshot and single-location
//!   request reconstruction
//! - [`preview`]: bounded, element-aware response previews
//! - [`executor`]: the worker pool that sends tasks and streams results
//! - [`probe`]: alternate body encodings sent once each
//! - [`baseline`]: repeated baseline requests and noise statistics
//! - [`report`]: result records and run totals
//!
//! Nothing here writes to stdout. Results reach the caller through sink
//! closures; diagnostics go through `tracing`.

pub mod baseline;
pub mod classifier;
pub mod executor;
pub mod plan;
pub mod preview;
pub mod probe;
pub mod report;
pub mod request;

pub use baseline::{BaselineProber, BaselineReport, BaselineResponse, BaselineSummary};
pub use classifier::{
    build_manifest, classified_header, classify_header, classify_path_segment,
    json_body_params, parse_path_segments,
};
pub use executor::{FuzzConfig, FuzzRunner, TransportFactory};
pub use plan::{
    fuzzable_targets, plan_tasks, target_ids, Corpus, FuzzTarget, FuzzTask, ParamLocation,
};
pub use preview::{extract_preview, PreviewConfig, DEFAULT_PREVIEW_LENGTH};
pub use probe::{build_encoding_probes, run_encoding_probes, EncodingProbe};
pub use report::{send_one, FuzzResult, RunSummary};
pub use request::{build_fuzz_request, coerce_value, BaseRequest};
