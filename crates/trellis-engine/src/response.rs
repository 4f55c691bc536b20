//! The response/error algebra every node produces.
//!
//! A node invocation ends in exactly one of two ways: a success payload or
//! a [`GlobalError`]. Failures are values that travel back through the
//! engine — they are returned, never thrown, across node boundaries.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Default failure code when a node constructs an error without one.
pub const DEFAULT_ERROR_CODE: u16 = 500;

/// What a [`Node`](crate::node::Node) returns from `handle`. `?` works on
/// anything convertible into [`GlobalError`].
pub type NodeResult = Result<Value, GlobalError>;

// ---------------------------------------------------------------------------
// GlobalError
// ---------------------------------------------------------------------------

/// Structured failure value carried inside a [`Response::Failure`].
///
/// `code` is HTTP-status-like and defaults to 500. `node` identifies the
/// originating node for tracing; the engine fills it in when the node
/// author left it empty. `trace` is diagnostic-only and is never rendered
/// to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[serde(rename_all = "snake_case")]
pub struct GlobalError {
    #[serde(default = "default_code")]
    pub code: u16,
    pub message: String,
    /// Originating node name. Empty until attributed.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub node: String,
    /// Optional diagnostic trace. Logged, never rendered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace: Option<String>,
    /// Optional structured detail (e.g. per-field validation errors).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<Value>,
}

fn default_code() -> u16 {
    DEFAULT_ERROR_CODE
}

impl GlobalError {
    /// Construct with only a message. `code` defaults to 500.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: DEFAULT_ERROR_CODE,
            message: message.into(),
            node: String::new(),
            trace: None,
            detail: None,
        }
    }

    pub fn with_code(mut self, code: u16) -> Self {
        self.code = code;
        self
    }

    pub fn with_node(mut self, node: impl Into<String>) -> Self {
        self.node = node.into();
        self
    }

    pub fn with_trace(mut self, trace: impl Into<String>) -> Self {
        self.trace = Some(trace.into());
        self
    }

    pub fn with_detail(mut self, detail: Value) -> Self {
        self.detail = Some(detail);
        self
    }

    /// Fill in the originating node if the author left it empty.
    pub(crate) fn attributed_to(mut self, node: &str) -> Self {
        if self.node.is_empty() {
            self.node = node.to_string();
        }
        self
    }
}

impl std::fmt::Display for GlobalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.node.is_empty() {
            write!(f, "[{}] {}", self.code, self.message)
        } else {
            write!(f, "[{}] {} ({})", self.code, self.message, self.node)
        }
    }
}

// ---------------------------------------------------------------------------
// Response
// ---------------------------------------------------------------------------

/// Terminal outcome of a node or workflow execution.
///
/// The "exactly one of payload/error, never both, never neither" invariant
/// is structural: the enum has no half-built state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum Response {
    Success { payload: Value },
    Failure { error: GlobalError },
}

impl Response {
    pub fn success(payload: Value) -> Self {
        Self::Success { payload }
    }

    pub fn failure(error: GlobalError) -> Self {
        Self::Failure { error }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn payload(&self) -> Option<&Value> {
        match self {
            Self::Success { payload } => Some(payload),
            Self::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&GlobalError> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { error } => Some(error),
        }
    }

    /// Project onto the transport boundary: status, content type, body.
    ///
    /// `content_type` is the declared content type of the node that produced
    /// the payload; failures always render as JSON. `trace` is excluded.
    pub fn render(&self, content_type: &str) -> Rendered {
        match self {
            Self::Success { payload } => Rendered {
                status: 200,
                content_type: content_type.to_string(),
                body: payload.clone(),
            },
            Self::Failure { error } => {
                let mut body = json!({
                    "error": {
                        "code": error.code,
                        "message": error.message,
                    }
                });
                if let Some(detail) = &error.detail {
                    body["error"]["detail"] = detail.clone();
                }
                Rendered {
                    status: error.code,
                    content_type: "application/json".to_string(),
                    body,
                }
            }
        }
    }
}

impl From<NodeResult> for Response {
    fn from(result: NodeResult) -> Self {
        match result {
            Ok(payload) => Self::Success { payload },
            Err(error) => Self::Failure { error },
        }
    }
}

/// A response projected onto the transport boundary.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
pub struct Rendered {
    pub status: u16,
    pub content_type: String,
    pub body: Value,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_only_defaults_to_500() {
        let err = GlobalError::new("boom");
        assert_eq!(err.code, 500);
        assert_eq!(err.message, "boom");
        assert!(err.node.is_empty());
        assert!(err.trace.is_none());
        assert!(err.detail.is_none());
    }

    #[test]
    fn explicit_code_preserved() {
        let err = GlobalError::new("nope").with_code(401);
        assert_eq!(err.code, 401);
    }

    #[test]
    fn attribution_does_not_overwrite() {
        let err = GlobalError::new("x").with_node("origin").attributed_to("engine");
        assert_eq!(err.node, "origin");

        let err = GlobalError::new("x").attributed_to("engine");
        assert_eq!(err.node, "engine");
    }

    #[test]
    fn response_has_exactly_one_side() {
        let ok = Response::success(json!({"a": 1}));
        assert!(ok.is_success());
        assert!(ok.payload().is_some());
        assert!(ok.error().is_none());

        let err = Response::failure(GlobalError::new("bad"));
        assert!(!err.is_success());
        assert!(err.payload().is_none());
        assert!(err.error().is_some());
    }

    #[test]
    fn from_node_result() {
        let r: Response = NodeResult::Ok(json!(1)).into();
        assert!(r.is_success());
        let r: Response = NodeResult::Err(GlobalError::new("e")).into();
        assert!(!r.is_success());
    }

    #[test]
    fn render_success_uses_declared_content_type() {
        let r = Response::success(json!({"message": "hi"})).render("text/plain");
        assert_eq!(r.status, 200);
        assert_eq!(r.content_type, "text/plain");
        assert_eq!(r.body, json!({"message": "hi"}));
    }

    #[test]
    fn render_failure_excludes_trace() {
        let err = GlobalError::new("denied")
            .with_code(401)
            .with_trace("at node handle()")
            .with_detail(json!({"field": "token"}));
        let r = Response::failure(err).render("text/html");
        assert_eq!(r.status, 401);
        assert_eq!(r.content_type, "application/json");
        assert_eq!(r.body["error"]["code"], json!(401));
        assert_eq!(r.body["error"]["message"], json!("denied"));
        assert_eq!(r.body["error"]["detail"], json!({"field": "token"}));
        assert!(r.body["error"].get("trace").is_none());
    }

    #[test]
    fn serde_round_trip() {
        let resp = Response::failure(GlobalError::new("bad input").with_code(400).with_node("echo"));
        let s = serde_json::to_string(&resp).unwrap();
        let rt: Response = serde_json::from_str(&s).unwrap();
        assert_eq!(resp, rt);
    }

    #[test]
    fn deserialize_applies_code_default() {
        let err: GlobalError = serde_json::from_str(r#"{"message": "m"}"#).unwrap();
        assert_eq!(err.code, 500);
    }
}
