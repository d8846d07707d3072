//! Subcommand implementations for http-fuzz

pub mod baseline;
pub mod fuzz;
pub mod logging;

use std::time::Duration;

use clap::Args;
use http_fuzz_core::PreviewConfig;
use http_fuzz_transport::TransportConfig;
use http_fuzz_types::env_utils::{env_flag, env_var_or, NO_VERIFY_VAR, TIMEOUT_SECS_VAR};

/// Timeout and TLS flags shared by every command that sends requests.
#[derive(Args, Debug, Clone)]
pub struct TransportArgs {
    /// Per-request timeout in seconds [default: 10, env: HTTP_FUZZ_TIMEOUT_SECS]
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: Option<u64>,

    /// Accept any TLS certificate (also HTTP_FUZZ_NO_VERIFY=1)
    #[arg(long)]
    pub no_verify: bool,
}

impl TransportArgs {
    pub fn timeout(&self) -> Duration {
        let secs = self
            .timeout
            .unwrap_or_else(|| env_var_or(TIMEOUT_SECS_VAR, TransportConfig::DEFAULT_TIMEOUT_SECS));
        Duration::from_secs(secs.max(1))
    }

    pub fn config(&self) -> TransportConfig {
        let verify_tls = !(self.no_verify || env_flag(NO_VERIFY_VAR));
        TransportConfig::new(self.timeout(), verify_tls)
    }
}

/// Response preview window flags.
#[derive(Args, Debug, Clone, Default)]
pub struct PreviewArgs {
    /// Characters of response body to keep, 0 for the whole body
    #[arg(long)]
    pub preview_length: Option<usize>,

    /// Characters to skip before the preview window
    #[arg(long, default_value_t = 0)]
    pub preview_offset: usize,

    /// Center the preview on the first occurrence of this string
    #[arg(long)]
    pub preview_find: Option<String>,
}

impl PreviewArgs {
    /// Preview settings, with `default_length` used when no length was given.
    pub fn config(&self, default_length: usize) -> PreviewConfig {
        PreviewConfig {
            length: self.preview_length.unwrap_or(default_length),
            offset: self.preview_offset,
            find: self.preview_find.clone().filter(|needle| !needle.is_empty()),
        }
    }
}
