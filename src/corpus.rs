//! Corpus directory loading.
//!
//! One file per parameter id at `<dir>/<id>.txt`, one candidate per line.
//! Blank lines are dropped; other lines are kept byte-for-byte, including
//! leading and trailing spaces.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use http_fuzz_core::Corpus;
use tracing::{debug, warn};

/// Path of the corpus file for `param_id`.
pub fn corpus_file(dir: &Path, param_id: &str) -> PathBuf {
    dir.join(format!("{}.txt", param_id))
}

/// Candidate values in file order, blank lines removed.
pub fn parse_corpus(text: &str) -> Vec<String> {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect()
}

/// Load corpus files for `param_ids`.
///
/// Missing and empty files are skipped with a warning. Fails when no
/// parameter ends up with any values, or when a file exists but cannot be
/// read.
pub fn load_corpus(dir: &Path, param_ids: &[String]) -> Result<Corpus> {
    let mut corpus = Corpus::new();
    for id in param_ids {
        if id.contains(['/', '\\']) || id == ".." {
            warn!("Parameter id '{}' is not a valid file name, skipping", id);
            continue;
        }
        let path = corpus_file(dir, id);
        if !path.is_file() {
            warn!("No corpus file for '{}' at {}", id, path.display());
            continue;
        }
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("Cannot read corpus file '{}'", path.display()))?;
        let values = parse_corpus(&text);
        if values.is_empty() {
            warn!("Corpus file for '{}' is empty, skipping", id);
            continue;
        }
        debug!(param = %id, values = values.len(), "loaded corpus");
        corpus.insert(id.clone(), values);
    }

    if corpus.is_empty() {
        bail!(
            "No corpus files found in '{}'. Generate corpus files first (e.g. corpus/email.txt with one value per line).",
            dir.display()
        );
    }
    Ok(corpus)
}
