//! Fuzz command - corpus-driven fuzzing and encoding probes

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::Parser;
use http_fuzz::corpus::load_corpus;
use http_fuzz::output::{format_dry_run_table, format_probe_plan, write_dry_run_json, NdjsonWriter};
use http_fuzz_core::{
    build_encoding_probes, fuzzable_targets, plan_tasks, run_encoding_probes, target_ids,
    BaseRequest, FuzzConfig, FuzzRunner, DEFAULT_PREVIEW_LENGTH,
};
use http_fuzz_transport::UreqTransport;
use http_fuzz_types::env_utils::{env_var_or, DELAY_MS_VAR, THREADS_VAR};
use http_fuzz_types::Manifest;
use tracing::{info, warn};

use super::{PreviewArgs, TransportArgs};

const DEFAULT_THREADS: usize = 5;
const DEFAULT_DELAY_MS: u64 = 1000;

#[derive(Parser, Debug)]
pub struct FuzzCmd {
    /// Request manifest (JSON)
    #[arg(long)]
    pub manifest: PathBuf,

    /// Directory holding one <param>.txt corpus file per parameter
    #[arg(long, default_value = "./corpus")]
    pub corpus_dir: PathBuf,

    /// Concurrent workers [default: 5, env: HTTP_FUZZ_THREADS]
    #[arg(long)]
    pub threads: Option<usize>,

    /// Pause per worker between requests, in milliseconds [default: 1000, env: HTTP_FUZZ_DELAY_MS]
    #[arg(long)]
    pub delay_ms: Option<u64>,

    #[command(flatten)]
    pub transport: TransportArgs,

    /// Only fuzz these parameter ids (repeatable)
    #[arg(long = "param", value_name = "NAME")]
    pub params: Vec<String>,

    /// Print the planned requests without sending anything
    #[arg(long)]
    pub dry_run: bool,

    /// Print the dry-run plan as NDJSON
    #[arg(long)]
    pub json: bool,

    /// Resend the baseline body under alternate content types instead of fuzzing
    #[arg(long)]
    pub probe_encodings: bool,

    #[command(flatten)]
    pub preview: PreviewArgs,
}

impl FuzzCmd {
    pub fn execute(&self) -> Result<()> {
        let manifest = Manifest::load(&self.manifest)?;
        if self.probe_encodings {
            return self.probe(&manifest);
        }

        let targets = fuzzable_targets(&manifest, &self.params);
        if targets.is_empty() {
            bail!(
                "No fuzzable parameters found in manifest. Check that body_params or query_params are present and fuzzable=true."
            );
        }
        let ids = target_ids(&targets);
        let corpus = load_corpus(&self.corpus_dir, &ids)?;
        let tasks = plan_tasks(&targets, &corpus);
        let base = Arc::new(BaseRequest::from_manifest(&manifest)?);

        let stdout = std::io::stdout();
        if self.dry_run {
            if self.json {
                write_dry_run_json(&mut NdjsonWriter::new(stdout.lock()), &tasks)?;
            } else {
                let mut out = stdout.lock();
                write!(out, "{}", format_dry_run_table(&tasks))?;
                out.flush()?;
            }
            return Ok(());
        }

        let config = self.fuzz_config();
        let params_with_values = ids.iter().filter(|id| corpus.contains_key(*id)).count();
        info!(
            "Starting fuzz: {} requests across {} parameters ({} threads, {}ms delay)",
            tasks.len(),
            params_with_values,
            config.threads,
            config.delay.as_millis()
        );

        let mut writer = NdjsonWriter::new(stdout.lock());
        let summary = FuzzRunner::new(config).run(base, tasks, |result| writer.write(result))?;
        info!("Done. {} results emitted.", writer.written());
        if summary.stalled || summary.worker_failures > 0 {
            warn!(
                completed = summary.completed(),
                total = summary.total,
                worker_failures = summary.worker_failures,
                stalled = summary.stalled,
                "run ended short"
            );
        }
        Ok(())
    }

    fn fuzz_config(&self) -> FuzzConfig {
        let threads = self
            .threads
            .unwrap_or_else(|| env_var_or(THREADS_VAR, DEFAULT_THREADS))
            .max(1);
        let delay_ms = self
            .delay_ms
            .unwrap_or_else(|| env_var_or(DELAY_MS_VAR, DEFAULT_DELAY_MS));
        FuzzConfig {
            threads,
            delay: Duration::from_millis(delay_ms),
            transport: self.transport.config(),
            preview: self.preview.config(DEFAULT_PREVIEW_LENGTH),
        }
    }

    fn probe(&self, manifest: &Manifest) -> Result<()> {
        let probes = build_encoding_probes(manifest)?;
        let base = BaseRequest::from_manifest(manifest)?;

        let stdout = std::io::stdout();
        if self.dry_run {
            let mut out = stdout.lock();
            write!(out, "{}", format_probe_plan(&probes))?;
            out.flush()?;
            return Ok(());
        }

        let transport = UreqTransport::new(&self.transport.config())?;
        let preview = self.preview.config(DEFAULT_PREVIEW_LENGTH);
        let mut writer = NdjsonWriter::new(stdout.lock());
        run_encoding_probes(&transport, &base, &probes, &preview, |result| writer.write(result))?;
        info!("Done. {} results emitted.", writer.written());
        Ok(())
    }
}
