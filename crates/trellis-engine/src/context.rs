//! Per-invocation mutable state.
//!
//! A [`Context`] is created for one inbound event, owned by the engine for
//! the duration of that workflow execution, and discarded afterward. Nodes
//! see it read-only; only the engine merges step outputs into `vars`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Facts about the inbound transport event.
///
/// All map fields use `BTreeMap` to guarantee deterministic serialization.
/// Header names are stored lowercase.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[serde(rename_all = "snake_case")]
pub struct RequestFacts {
    pub method: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub query: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub cookies: BTreeMap<String, String>,
    #[serde(default)]
    pub body: Value,
}

impl RequestFacts {
    /// Convenience constructor for the common method+path case.
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into().to_uppercase(),
            path: path.into(),
            ..Self::default()
        }
    }

    /// The `Accept` header, if the client sent one.
    pub fn accept(&self) -> Option<&str> {
        self.headers.get("accept").map(String::as_str)
    }
}

/// Per-execution state: request facts plus the accumulating variable bag.
///
/// `vars` grows monotonically across one workflow execution — each
/// succeeded step's payload is merged under the step's name, so later
/// steps and expressions can reference it. Never shared across
/// concurrent requests.
#[derive(Debug, Clone)]
pub struct Context {
    pub request: RequestFacts,
    pub vars: BTreeMap<String, Value>,
}

impl Context {
    pub fn new(request: RequestFacts) -> Self {
        Self {
            request,
            vars: BTreeMap::new(),
        }
    }

    /// The restricted read-only view expressions resolve against:
    /// `{"request": ..., "vars": ...}`.
    pub fn view(&self) -> Value {
        json!({
            "request": serde_json::to_value(&self.request).unwrap_or(Value::Null),
            "vars": self.vars,
        })
    }
}

// ---------------------------------------------------------------------------
// Transport parsing helpers
// ---------------------------------------------------------------------------

/// Parse a raw query string (`a=1&b=two`) into a map. Percent-encoded
/// keys and values are decoded; repeated keys keep the last value.
pub fn parse_query(raw: &str) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    for pair in raw.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = match pair.split_once('=') {
            Some((k, v)) => (k, v),
            None => (pair, ""),
        };
        let key = urlencoding::decode(key).map(|c| c.into_owned());
        let value = urlencoding::decode(&value.replace('+', " ")).map(|c| c.into_owned());
        if let (Ok(key), Ok(value)) = (key, value) {
            out.insert(key, value);
        }
    }
    out
}

/// Parse a `Cookie` header value (`k=v; k2=v2`) into a map.
pub fn parse_cookies(header: &str) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    for pair in header.split(';') {
        if let Some((key, value)) = pair.split_once('=') {
            out.insert(key.trim().to_string(), value.trim().to_string());
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn view_exposes_request_and_vars() {
        let mut request = RequestFacts::new("get", "/users");
        request.query.insert("page".into(), "2".into());
        let mut ctx = Context::new(request);
        ctx.vars.insert("lookup".into(), json!({"id": 7}));

        let view = ctx.view();
        assert_eq!(view["request"]["method"], json!("GET"));
        assert_eq!(view["request"]["path"], json!("/users"));
        assert_eq!(view["request"]["query"]["page"], json!("2"));
        assert_eq!(view["vars"]["lookup"]["id"], json!(7));
    }

    #[test]
    fn accept_reads_lowercase_header() {
        let mut request = RequestFacts::new("GET", "/");
        request
            .headers
            .insert("accept".into(), "application/json".into());
        assert_eq!(request.accept(), Some("application/json"));
    }

    #[test]
    fn parse_query_basic() {
        let q = parse_query("message=hi&count=3");
        assert_eq!(q.get("message").map(String::as_str), Some("hi"));
        assert_eq!(q.get("count").map(String::as_str), Some("3"));
    }

    #[test]
    fn parse_query_decodes_percent_and_plus() {
        let q = parse_query("name=hello%20world&title=a+b");
        assert_eq!(q.get("name").map(String::as_str), Some("hello world"));
        assert_eq!(q.get("title").map(String::as_str), Some("a b"));
    }

    #[test]
    fn parse_query_valueless_key() {
        let q = parse_query("flag&x=1");
        assert_eq!(q.get("flag").map(String::as_str), Some(""));
        assert_eq!(q.get("x").map(String::as_str), Some("1"));
    }

    #[test]
    fn parse_cookies_basic() {
        let c = parse_cookies("session=abc123; theme=dark");
        assert_eq!(c.get("session").map(String::as_str), Some("abc123"));
        assert_eq!(c.get("theme").map(String::as_str), Some("dark"));
    }

    #[test]
    fn parse_cookies_ignores_malformed_pairs() {
        let c = parse_cookies("good=1; nonsense; =empty");
        assert_eq!(c.get("good").map(String::as_str), Some("1"));
        assert_eq!(c.len(), 2); // "" => "empty" is kept, "nonsense" dropped
    }
}
