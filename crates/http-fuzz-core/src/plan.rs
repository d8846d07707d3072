//! Fuzz targets and task planning.

use std::collections::HashMap;
use std::fmt;

use http_fuzz_types::Manifest;
use serde::{Deserialize, Serialize};

/// Candidate values per parameter id, in corpus file order.
pub type Corpus = HashMap<String, Vec<String>>;

/// Where in the request a fuzzed value went. Reported beside the parameter id
/// so a query param and a body field sharing a name stay distinguishable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamLocation {
    Path,
    Query,
    Body,
    /// Encoding probes vary the `Content-Type` header.
    Header,
}

impl ParamLocation {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamLocation::Path => "path",
            ParamLocation::Query => "query",
            ParamLocation::Body => "body",
            ParamLocation::Header => "header",
        }
    }
}

impl fmt::Display for ParamLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One fuzzable location of a request.
///
/// Query and body params live in separate namespaces even when they share a
/// literal name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FuzzTarget {
    Path(usize),
    Query(String),
    Body(String),
}

impl FuzzTarget {
    /// Parameter id: `path_<index>` for path segments, the name otherwise.
    /// Also the corpus file stem.
    pub fn id(&self) -> String {
        match self {
            FuzzTarget::Path(index) => format!("path_{}", index),
            FuzzTarget::Query(name) | FuzzTarget::Body(name) => name.clone(),
        }
    }

    pub fn location(&self) -> ParamLocation {
        match self {
            FuzzTarget::Path(_) => ParamLocation::Path,
            FuzzTarget::Query(_) => ParamLocation::Query,
            FuzzTarget::Body(_) => ParamLocation::Body,
        }
    }
}

impl fmt::Display for FuzzTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.id(), self.location())
    }
}

/// One `(target, replacement)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuzzTask {
    pub target: FuzzTarget,
    pub value: String,
}

impl FuzzTask {
    pub fn param_id(&self) -> String {
        self.target.id()
    }

    pub fn location(&self) -> ParamLocation {
        self.target.location()
    }
}

/// Fuzzable targets in path, query, body order.
///
/// When `only` is non-empty, targets whose id is not listed are dropped.
pub fn fuzzable_targets(manifest: &Manifest, only: &[String]) -> Vec<FuzzTarget> {
    let path = manifest
        .path_segments
        .iter()
        .filter(|s| s.fuzzable)
        .map(|s| FuzzTarget::Path(s.index));
    let query = manifest
        .query_params
        .iter()
        .filter(|p| p.fuzzable)
        .map(|p| FuzzTarget::Query(p.name.clone()));
    let body = manifest
        .body_params
        .iter()
        .filter(|p| p.fuzzable)
        .map(|p| FuzzTarget::Body(p.name.clone()));

    let mut targets: Vec<FuzzTarget> = Vec::new();
    for target in path.chain(query).chain(body) {
        if !only.is_empty() && !only.contains(&target.id()) {
            continue;
        }
        if !targets.contains(&target) {
            targets.push(target);
        }
    }
    targets
}

/// Distinct parameter ids of `targets`, in order.
pub fn target_ids(targets: &[FuzzTarget]) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    for id in targets.iter().map(FuzzTarget::id) {
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    ids
}

/// Enumerate tasks parameter-major in corpus order. Targets without corpus
/// entries contribute nothing.
pub fn plan_tasks(targets: &[FuzzTarget], corpus: &Corpus) -> Vec<FuzzTask> {
    targets
        .iter()
        .filter_map(|target| corpus.get(&target.id()).map(|values| (target, values)))
        .flat_map(|(target, values)| {
            values.iter().map(move |value| FuzzTask {
                target: target.clone(),
                value: value.clone(),
            })
        })
        .collect()
}
