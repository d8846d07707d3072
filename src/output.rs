//! Everything written to stdout: the result stream, dry-run plans and the
//! setup error object.

use std::io::Write;

use anyhow::Result;
use http_fuzz_core::{EncodingProbe, FuzzTask, ParamLocation};
use serde::Serialize;

/// Values longer than this are shortened in the dry-run table.
pub const TABLE_VALUE_WIDTH: usize = 50;

/// Probe bodies are cut to this many bytes in the dry-run listing.
pub const PROBE_EXCERPT_BYTES: usize = 100;

/// One JSON document per line, flushed after each record so consumers see
/// results as they arrive.
pub struct NdjsonWriter<W: Write> {
    out: W,
    written: usize,
}

impl<W: Write> NdjsonWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out, written: 0 }
    }

    pub fn write<T: Serialize>(&mut self, record: &T) -> Result<()> {
        let line = serde_json::to_string(record)?;
        writeln!(self.out, "{}", line)?;
        self.out.flush()?;
        self.written += 1;
        Ok(())
    }

    /// Records written so far.
    pub fn written(&self) -> usize {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

#[derive(Serialize)]
struct ErrorObject {
    error: String,
}

/// `{"error": "..."}` with the full context chain in the message.
pub fn error_object(err: &anyhow::Error) -> String {
    let object = ErrorObject {
        error: format!("{:#}", err),
    };
    serde_json::to_string(&object).unwrap_or_else(|_| r#"{"error":"unknown error"}"#.to_string())
}

fn truncate_value(value: &str) -> String {
    if value.chars().count() > TABLE_VALUE_WIDTH {
        let head: String = value.chars().take(TABLE_VALUE_WIDTH - 3).collect();
        format!("{}...", head)
    } else {
        value.to_string()
    }
}

/// Human-readable plan: a header line, then a `Parameter`/`Location`/`Value`
/// table.
pub fn format_dry_run_table(tasks: &[FuzzTask]) -> String {
    let rows: Vec<(String, &'static str, String)> = tasks
        .iter()
        .map(|t| (t.param_id(), t.location().as_str(), truncate_value(&t.value)))
        .collect();
    let width = rows
        .iter()
        .map(|(param, _, _)| param.chars().count())
        .chain(std::iter::once("Parameter".len()))
        .max()
        .unwrap_or(0);
    let loc_width = "Location".len();

    let mut out = format!("Dry run: {} requests planned\n\n", tasks.len());
    out.push_str(&format!(
        "{:<width$}  {:<loc_width$}  {}\n",
        "Parameter",
        "Location",
        "Value",
        width = width,
        loc_width = loc_width
    ));
    out.push_str(&format!(
        "{}  {}  {}\n",
        "-".repeat(width),
        "-".repeat(loc_width),
        "-".repeat(TABLE_VALUE_WIDTH)
    ));
    for (param, location, value) in rows {
        out.push_str(&format!(
            "{:<width$}  {:<loc_width$}  {}\n",
            param,
            location,
            value,
            width = width,
            loc_width = loc_width
        ));
    }
    out
}

#[derive(Serialize)]
struct PlannedRequest<'a> {
    param: String,
    location: ParamLocation,
    value: &'a str,
}

/// Machine-readable plan: one `{"param","location","value"}` line per task.
pub fn write_dry_run_json<W: Write>(writer: &mut NdjsonWriter<W>, tasks: &[FuzzTask]) -> Result<()> {
    for task in tasks {
        writer.write(&PlannedRequest {
            param: task.param_id(),
            location: task.location(),
            value: &task.value,
        })?;
    }
    Ok(())
}

pub fn format_probe_plan(probes: &[EncodingProbe]) -> String {
    let mut out = format!("Encoding probes planned: {}\n", probes.len());
    for probe in probes {
        out.push_str(&format!(
            "  {}: {}\n",
            probe.label,
            probe.body_excerpt(PROBE_EXCERPT_BYTES)
        ));
    }
    out
}
