//! Request reconstruction.
//!
//! A [`BaseRequest`] is built once per run from the manifest and shared
//! read-only by every worker. [`build_fuzz_request`] derives a fresh
//! [`HttpRequest`] from it with exactly one location replaced; the base is
//! never modified.

use std::collections::{BTreeMap, HashMap};

use anyhow::{Context, Result};
use http_fuzz_transport::{HttpRequest, RequestBody};
use http_fuzz_types::{BodyFormat, Manifest, ParamType};
use serde_json::{Map, Number, Value};
use url::Url;

use crate::plan::FuzzTarget;

/// Baseline body, keyed by parameter name.
#[derive(Debug, Clone, PartialEq)]
pub enum BaseBody {
    None,
    Json {
        fields: Map<String, Value>,
        types: HashMap<String, ParamType>,
    },
    Form(Vec<(String, String)>),
    /// The body exists but carries no extracted params; sent empty.
    Opaque,
}

/// Baseline snapshot of the request every task starts from.
#[derive(Debug, Clone, PartialEq)]
pub struct BaseRequest {
    pub method: String,
    /// Manifest URL with baseline path segments and query values applied.
    pub url: Url,
    pub headers: Vec<(String, String)>,
    /// Baseline path segment values by manifest index.
    pub path_segments: BTreeMap<usize, String>,
    /// Names present in the query string.
    pub query_names: Vec<String>,
    pub body: BaseBody,
}

impl BaseRequest {
    pub fn from_manifest(manifest: &Manifest) -> Result<Self> {
        let mut url = Url::parse(&manifest.url)
            .with_context(|| format!("Invalid manifest url '{}'", manifest.url))?;

        let path_segments: BTreeMap<usize, String> = manifest
            .path_segments
            .iter()
            .map(|s| (s.index, s.value.clone()))
            .collect();
        let path = rewrite_path(url.path(), |i| path_segments.get(&i).map(String::as_str));
        if path != url.path() {
            url.set_path(&path);
        }

        let query_names = bake_query(&mut url, manifest);

        let body = match manifest.body_format {
            BodyFormat::Json if !manifest.body_params.is_empty() => BaseBody::Json {
                fields: manifest
                    .body_params
                    .iter()
                    .map(|p| (p.name.clone(), p.value.clone()))
                    .collect(),
                types: manifest
                    .body_params
                    .iter()
                    .map(|p| (p.name.clone(), p.param_type()))
                    .collect(),
            },
            BodyFormat::Form if !manifest.body_params.is_empty() => BaseBody::Form(
                manifest
                    .body_params
                    .iter()
                    .map(|p| (p.name.clone(), p.value_string()))
                    .collect(),
            ),
            BodyFormat::Raw => BaseBody::Opaque,
            _ => BaseBody::None,
        };

        // JSON and form bodies get their content type from the body kind.
        let drop_content_type = matches!(body, BaseBody::Json { .. } | BaseBody::Form(_));
        let headers = manifest
            .headers
            .iter()
            .filter(|h| !(drop_content_type && h.name.eq_ignore_ascii_case("content-type")))
            .map(|h| (h.name.clone(), h.value.clone()))
            .collect();

        Ok(Self {
            method: manifest.method.clone(),
            url,
            headers,
            path_segments,
            query_names,
            body,
        })
    }

    /// The unmodified baseline request.
    pub fn to_request(&self) -> HttpRequest {
        HttpRequest {
            method: self.method.clone(),
            url: self.url.to_string(),
            headers: self.headers.clone(),
            body: match &self.body {
                BaseBody::None => None,
                BaseBody::Json { fields, .. } => Some(RequestBody::Json(fields.clone())),
                BaseBody::Form(pairs) => Some(RequestBody::Form(pairs.clone())),
                BaseBody::Opaque => Some(RequestBody::Bytes(Vec::new())),
            },
        }
    }
}

/// Write baseline query values into the URL and return the query names.
///
/// The k-th occurrence of a name takes the k-th manifest param of that name;
/// manifest params missing from the URL are appended. The query string is
/// only re-encoded when a value actually changes.
fn bake_query(url: &mut Url, manifest: &Manifest) -> Vec<String> {
    let original: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    let mut pending: Vec<_> = manifest.query_params.iter().collect();
    let mut pairs: Vec<(String, String)> = original
        .iter()
        .map(|(name, value)| match pending.iter().position(|p| &p.name == name) {
            Some(pos) => (name.clone(), pending.remove(pos).value_string()),
            None => (name.clone(), value.clone()),
        })
        .collect();
    pairs.extend(pending.into_iter().map(|p| (p.name.clone(), p.value_string())));

    if pairs != original {
        set_query_pairs(url, &pairs);
    }
    let mut names: Vec<String> = Vec::new();
    for (name, _) in pairs {
        if !names.contains(&name) {
            names.push(name);
        }
    }
    names
}

fn set_query_pairs(url: &mut Url, pairs: &[(String, String)]) {
    if pairs.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(pairs);
    }
}

/// Rewrite a `/`-separated path, replacing the i-th real segment (empty,
/// `.` and `..` parts are not counted) with `replace(i)` when it returns
/// `Some`. Separators and skipped parts are kept as-is.
fn rewrite_path<'a>(path: &str, replace: impl Fn(usize) -> Option<&'a str>) -> String {
    let mut index = 0;
    path.split('/')
        .map(|part| {
            if part.is_empty() || part == "." || part == ".." {
                return part.to_string();
            }
            let out = replace(index).unwrap_or(part).to_string();
            index += 1;
            out
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Baseline request with `target` set to `value`.
///
/// A target that does not resolve to any location in the base yields the
/// unmodified baseline.
pub fn build_fuzz_request(base: &BaseRequest, target: &FuzzTarget, value: &str) -> HttpRequest {
    let mut request = base.to_request();
    match target {
        FuzzTarget::Path(index) => {
            // Segments absent from the baseline snapshot are left alone.
            if base.path_segments.contains_key(index) {
                let mut url = base.url.clone();
                let path = rewrite_path(url.path(), |i| (i == *index).then_some(value));
                url.set_path(&path);
                request.url = url.to_string();
            }
        }
        FuzzTarget::Query(name) => {
            if base.query_names.contains(name) {
                let mut url = base.url.clone();
                let pairs: Vec<(String, String)> = url
                    .query_pairs()
                    .map(|(k, v)| {
                        let v = if k == name.as_str() { value.to_string() } else { v.into_owned() };
                        (k.into_owned(), v)
                    })
                    .collect();
                set_query_pairs(&mut url, &pairs);
                request.url = url.to_string();
            }
        }
        FuzzTarget::Body(name) => match &base.body {
            BaseBody::Json { fields, types } if fields.contains_key(name) => {
                let ty = types.get(name).copied().unwrap_or(ParamType::String);
                let mut fields = fields.clone();
                fields.insert(name.clone(), coerce_value(value, ty));
                request.body = Some(RequestBody::Json(fields));
            }
            BaseBody::Form(pairs) if pairs.iter().any(|(k, _)| k == name) => {
                let pairs = pairs
                    .iter()
                    .map(|(k, v)| {
                        let v = if k == name { value.to_string() } else { v.clone() };
                        (k.clone(), v)
                    })
                    .collect();
                request.body = Some(RequestBody::Form(pairs));
            }
            _ => {}
        },
    }
    request
}

/// Convert a fuzz string to the JSON value sent for a field of type `ty`.
///
/// `"null"`, `"true"` and `"false"` always convert. Numeric fields take an
/// integer, or a float when the text contains `.`; boolean fields also accept
/// `1/yes/on` and `0/no/off`. Anything else stays the literal string.
pub fn coerce_value(value: &str, ty: ParamType) -> Value {
    match value {
        "null" => return Value::Null,
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    match ty {
        ParamType::Integer | ParamType::Float => {
            if let Some(number) = parse_number(value) {
                return Value::Number(number);
            }
        }
        ParamType::Boolean => match value {
            "1" | "yes" | "on" => return Value::Bool(true),
            "0" | "no" | "off" => return Value::Bool(false),
            _ => {}
        },
        _ => {}
    }
    Value::String(value.to_string())
}

fn parse_number(value: &str) -> Option<Number> {
    if value.contains('.') {
        value.parse::<f64>().ok().and_then(Number::from_f64)
    } else if let Ok(n) = value.parse::<i64>() {
        Some(n.into())
    } else {
        value.parse::<u64>().ok().map(Number::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn manifest(value: Value) -> Manifest {
        Manifest::from_json_str(&value.to_string()).unwrap()
    }

    fn query_manifest() -> Manifest {
        manifest(json!({
            "method": "GET",
            "url": "http://example.com/search",
            "query_params": [
                {"name": "q", "value": "hello", "type": "string"},
                {"name": "page", "value": "1", "type": "integer"},
                {"name": "token", "value": "abc", "fuzzable": false}
            ],
            "headers": [{"name": "Cookie", "value": "SESS=x", "fuzzable": false}]
        }))
    }

    fn json_manifest() -> Manifest {
        manifest(json!({
            "method": "POST",
            "url": "http://example.com/api/users",
            "headers": [{"name": "Content-Type", "value": "application/json"},
                        {"name": "Accept", "value": "*/*"}],
            "body_format": "json",
            "body_params": [
                {"name": "email", "value": "a@b.com", "type": "string"},
                {"name": "role", "value": "user", "type": "string"},
                {"name": "age", "value": 30, "type": "integer"},
                {"name": "active", "value": true, "type": "boolean"}
            ]
        }))
    }

    fn path_manifest() -> Manifest {
        manifest(json!({
            "method": "GET",
            "url": "http://example.com/api/v1/users/42/posts/7?sort=asc&x=a%20b#frag",
            "path_segments": [
                {"index": 0, "value": "api", "fuzzable": false},
                {"index": 1, "value": "v1", "fuzzable": false},
                {"index": 2, "value": "users", "fuzzable": false},
                {"index": 3, "value": "42", "fuzzable": true},
                {"index": 4, "value": "posts", "fuzzable": false},
                {"index": 5, "value": "7", "fuzzable": true}
            ]
        }))
    }

    fn json_body(req: &HttpRequest) -> &Map<String, Value> {
        match &req.body {
            Some(RequestBody::Json(map)) => map,
            other => panic!("expected json body, got {:?}", other),
        }
    }

    #[test]
    fn test_base_bakes_query_values() {
        let base = BaseRequest::from_manifest(&query_manifest()).unwrap();
        assert_eq!(
            base.url.as_str(),
            "http://example.com/search?q=hello&page=1&token=abc"
        );
        assert_eq!(base.query_names, vec!["q", "page", "token"]);
        assert_eq!(base.headers, vec![("Cookie".to_string(), "SESS=x".to_string())]);
    }

    #[test]
    fn test_query_substitution_preserves_other_params() {
        let base = BaseRequest::from_manifest(&query_manifest()).unwrap();
        let req = build_fuzz_request(&base, &FuzzTarget::Query("q".into()), "' OR 1=1--");
        assert_eq!(
            req.url,
            "http://example.com/search?q=%27+OR+1%3D1--&page=1&token=abc"
        );
        assert_eq!(base.url.as_str(), "http://example.com/search?q=hello&page=1&token=abc");
    }

    #[test]
    fn test_duplicate_query_names_are_kept() {
        let m = manifest(json!({
            "method": "GET",
            "url": "http://h/p?id=1&id=2&x=y",
            "query_params": [{"name": "id", "value": "1"}, {"name": "id", "value": "2"},
                             {"name": "x", "value": "y"}]
        }));
        let base = BaseRequest::from_manifest(&m).unwrap();
        assert_eq!(base.url.as_str(), "http://h/p?id=1&id=2&x=y");
        let req = build_fuzz_request(&base, &FuzzTarget::Query("id".into()), "9");
        assert_eq!(req.url, "http://h/p?id=9&id=9&x=y");
    }

    #[test]
    fn test_path_substitution_targets_one_index() {
        let base = BaseRequest::from_manifest(&path_manifest()).unwrap();
        let req = build_fuzz_request(&base, &FuzzTarget::Path(3), "99");
        assert_eq!(
            req.url,
            "http://example.com/api/v1/users/99/posts/7?sort=asc&x=a%20b#frag"
        );
        let req = build_fuzz_request(&base, &FuzzTarget::Path(5), "8");
        assert!(req.url.starts_with("http://example.com/api/v1/users/42/posts/8?"));
    }

    #[test]
    fn test_path_substitution_keeps_query_and_fragment_verbatim() {
        let base = BaseRequest::from_manifest(&path_manifest()).unwrap();
        for value in ["../../etc/passwd", "", "a b", "%00"] {
            let req = build_fuzz_request(&base, &FuzzTarget::Path(3), value);
            assert!(
                req.url.ends_with("?sort=asc&x=a%20b#frag"),
                "{} -> {}",
                value,
                req.url
            );
        }
    }

    #[test]
    fn test_path_index_outside_snapshot_is_noop() {
        let base = BaseRequest::from_manifest(&path_manifest()).unwrap();
        let req = build_fuzz_request(&base, &FuzzTarget::Path(17), "x");
        assert_eq!(req, base.to_request());
    }

    #[test]
    fn test_json_substitution_coerces_and_isolates() {
        let base = BaseRequest::from_manifest(&json_manifest()).unwrap();
        assert!(base.headers.iter().all(|(k, _)| k != "Content-Type"));

        let req = build_fuzz_request(&base, &FuzzTarget::Body("age".into()), "42");
        let body = json_body(&req);
        assert_eq!(body["age"], json!(42));
        assert_eq!(body["email"], json!("a@b.com"));
        assert_eq!(body["active"], json!(true));

        let req = build_fuzz_request(&base, &FuzzTarget::Body("age".into()), "abc");
        assert_eq!(json_body(&req)["age"], json!("abc"));

        let req = build_fuzz_request(&base, &FuzzTarget::Body("email".into()), "null");
        assert_eq!(json_body(&req)["email"], Value::Null);

        // baseline untouched
        assert_eq!(json_body(&base.to_request())["age"], json!(30));
    }

    #[test]
    fn test_form_substitution() {
        let m = manifest(json!({
            "method": "POST",
            "url": "http://example.com/login",
            "body_format": "form",
            "body_params": [
                {"name": "username", "value": "alice"},
                {"name": "password", "value": "secret"},
                {"name": "_csrf", "value": "tok", "fuzzable": false}
            ]
        }));
        let base = BaseRequest::from_manifest(&m).unwrap();
        let req = build_fuzz_request(&base, &FuzzTarget::Body("username".into()), "admin'--");
        assert_eq!(
            req.body,
            Some(RequestBody::Form(vec![
                ("username".into(), "admin'--".into()),
                ("password".into(), "secret".into()),
                ("_csrf".into(), "tok".into()),
            ]))
        );
    }

    #[test]
    fn test_unknown_target_returns_baseline() {
        let base = BaseRequest::from_manifest(&query_manifest()).unwrap();
        let baseline = base.to_request();
        assert_eq!(build_fuzz_request(&base, &FuzzTarget::Body("q".into()), "x"), baseline);
        assert_eq!(build_fuzz_request(&base, &FuzzTarget::Query("nope".into()), "x"), baseline);
    }

    #[test]
    fn test_query_and_body_namespaces_are_disjoint() {
        let m = manifest(json!({
            "method": "POST",
            "url": "http://h/x?id=1",
            "query_params": [{"name": "id", "value": "1"}],
            "body_format": "json",
            "body_params": [{"name": "id", "value": 5, "type": "integer"}]
        }));
        let base = BaseRequest::from_manifest(&m).unwrap();
        let q = build_fuzz_request(&base, &FuzzTarget::Query("id".into()), "7");
        assert_eq!(q.url, "http://h/x?id=7");
        assert_eq!(json_body(&q)["id"], json!(5));
        let b = build_fuzz_request(&base, &FuzzTarget::Body("id".into()), "7");
        assert_eq!(b.url, "http://h/x?id=1");
        assert_eq!(json_body(&b)["id"], json!(7));
    }

    #[test]
    fn test_raw_body_is_sent_empty() {
        let m = manifest(json!({"method": "PUT", "url": "http://h/blob", "body_format": "raw",
                                "headers": [{"name": "Content-Type", "value": "text/plain"}]}));
        let req = BaseRequest::from_manifest(&m).unwrap().to_request();
        assert_eq!(req.body, Some(RequestBody::Bytes(Vec::new())));
        assert_eq!(req.header("content-type"), Some("text/plain"));
    }

    #[test]
    fn test_coerce_value() {
        assert_eq!(coerce_value("null", ParamType::String), Value::Null);
        assert_eq!(coerce_value("true", ParamType::Integer), json!(true));
        assert_eq!(coerce_value("false", ParamType::String), json!(false));
        assert_eq!(coerce_value("42", ParamType::Integer), json!(42));
        assert_eq!(coerce_value("-7", ParamType::Float), json!(-7));
        assert_eq!(coerce_value("1.5", ParamType::Integer), json!(1.5));
        assert_eq!(coerce_value("abc", ParamType::Integer), json!("abc"));
        assert_eq!(coerce_value("1e5", ParamType::Integer), json!("1e5"));
        assert_eq!(coerce_value("1", ParamType::Boolean), json!(true));
        assert_eq!(coerce_value("off", ParamType::Boolean), json!(false));
        assert_eq!(coerce_value("1", ParamType::String), json!("1"));
        assert_eq!(coerce_value("<script>", ParamType::String), json!("<script>"));
        assert_eq!(
            coerce_value("18446744073709551615", ParamType::Integer),
            json!(18446744073709551615u64)
        );
    }

    #[test]
    fn test_rejects_relative_url() {
        let m = manifest(json!({"method": "GET", "url": "/relative/only"}));
        let err = BaseRequest::from_manifest(&m).unwrap_err();
        assert!(err.to_string().contains("Invalid manifest url"));
    }
}
