//! http-fuzz: parameter fuzzer for a single captured HTTP request
//!
//! Reads a normalized request manifest, substitutes corpus values into one
//! location at a time and streams one JSON result per request to stdout.
//! Progress and warnings go to stderr.
//!
//! ## Example Usage
//!
//! ```bash
//! # Plan only, no network I/O
//! http-fuzz fuzz --manifest req.json --corpus-dir ./corpus --dry-run
//!
//! # Fuzz two parameters with 10 workers and no pacing
//! http-fuzz fuzz --manifest req.json --param email --param q --threads 10 --delay-ms 0
//!
//! # Resend the body under other content types
//! http-fuzz fuzz --manifest req.json --probe-encodings
//!
//! # Measure how much the unmodified request varies
//! http-fuzz baseline --manifest req.json --count 10
//! ```

use std::io::Write;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use http_fuzz::output::error_object;
use tracing::debug;

mod fuzz_cli;

use fuzz_cli::{baseline::BaselineCmd, fuzz::FuzzCmd};

#[derive(Parser)]
#[command(
    name = "http-fuzz",
    author,
    version,
    about = "Parameter fuzzer for HTTP requests described by a manifest",
    long_about = "Fuzzes path segments, query parameters and body fields of one HTTP request.\n\n\
                  Results are written to stdout as NDJSON; diagnostics go to stderr."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Debug-level diagnostics on stderr (RUST_LOG takes precedence)
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Send corpus values into each fuzzable parameter
    Fuzz(FuzzCmd),

    /// Send the unmodified request several times and summarize the responses
    Baseline(BaselineCmd),
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Fuzz(_) => "fuzz",
            Commands::Baseline(_) => "baseline",
        }
    }
}

fn main() -> ExitCode {
    let Cli { command, verbose } = Cli::parse();
    fuzz_cli::logging::init(verbose);
    debug!(command = command.name(), "starting");

    let result = match command {
        Commands::Fuzz(cmd) => cmd.execute(),
        Commands::Baseline(cmd) => cmd.execute(),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            // stdout may already be gone; the exit status still reports failure.
            let mut out = std::io::stdout().lock();
            let _ = writeln!(out, "{}", error_object(&err));
            let _ = out.flush();
            ExitCode::FAILURE
        }
    }
}
