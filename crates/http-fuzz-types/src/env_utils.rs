//! Environment variable parsing for configuration defaults.
//!
//! CLI flags take precedence; these helpers only supply the value a flag
//! falls back to when it was not given on the command line.
//!
//! ```
//! use http_fuzz_types::env_utils::{env_var_or, THREADS_VAR};
//!
//! let threads: usize = env_var_or(THREADS_VAR, 5);
//! assert!(threads > 0);
//! ```

use std::str::FromStr;

/// Default worker count for `fuzz`.
pub const THREADS_VAR: &str = "HTTP_FUZZ_THREADS";

/// Default per-request timeout in seconds.
pub const TIMEOUT_SECS_VAR: &str = "HTTP_FUZZ_TIMEOUT_SECS";

/// Default per-worker delay between requests, in milliseconds.
pub const DELAY_MS_VAR: &str = "HTTP_FUZZ_DELAY_MS";

/// Disable TLS certificate verification when truthy.
pub const NO_VERIFY_VAR: &str = "HTTP_FUZZ_NO_VERIFY";

/// Parse an environment variable into any `FromStr` type.
///
/// Returns `None` when the variable is unset or does not parse.
pub fn env_var<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Parse an environment variable, falling back to `default`.
pub fn env_var_or<T: FromStr>(key: &str, default: T) -> T {
    env_var(key).unwrap_or(default)
}

/// True when the variable is set to "1", "true", "yes" or "on" (any case).
pub fn env_flag(key: &str) -> bool {
    std::env::var(key)
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}
