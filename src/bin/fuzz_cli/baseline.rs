//! Baseline command - how much does the unmodified request vary?

use std::io::Write;
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use http_fuzz_core::{BaseRequest, BaselineProber};
use http_fuzz_transport::UreqTransport;
use http_fuzz_types::Manifest;

use super::{PreviewArgs, TransportArgs};

#[derive(Parser, Debug)]
pub struct BaselineCmd {
    /// Request manifest (JSON)
    #[arg(long)]
    pub manifest: PathBuf,

    /// Number of requests to send
    #[arg(long, default_value_t = 5)]
    pub count: usize,

    #[command(flatten)]
    pub transport: TransportArgs,

    // preview length defaults to 0 here: whole bodies
    #[command(flatten)]
    pub preview: PreviewArgs,
}

impl BaselineCmd {
    pub fn execute(&self) -> Result<()> {
        let manifest = Manifest::load(&self.manifest)?;
        let base = BaseRequest::from_manifest(&manifest)?;
        let transport = UreqTransport::new(&self.transport.config())?;

        let report = BaselineProber::new(&transport, self.preview.config(0)).run(&base, self.count);

        let mut out = std::io::stdout().lock();
        writeln!(out, "{}", serde_json::to_string_pretty(&report)?)?;
        out.flush()?;
        Ok(())
    }
}
