//! Workflow composition model: steps, condition branches, triggers.
//!
//! Definitions are deserialized once at startup, validated against the
//! node registry, and treated as read-only for the life of the process.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::expression::EXPR_PREFIX;

// ---------------------------------------------------------------------------
// Input bindings
// ---------------------------------------------------------------------------

/// How one step input is computed: a literal value, or an expression
/// evaluated against the context at step time.
///
/// On the wire the distinction is the `expr/` prefix — any string starting
/// with it is an expression, everything else is a literal.
#[derive(Debug, Clone, PartialEq)]
pub enum InputBinding {
    Literal(Value),
    /// Expression source with the `expr/` prefix already stripped.
    Expr(String),
}

impl Serialize for InputBinding {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Literal(value) => value.serialize(serializer),
            Self::Expr(source) => serializer.serialize_str(&format!("{EXPR_PREFIX}{source}")),
        }
    }
}

impl<'de> Deserialize<'de> for InputBinding {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(match value {
            Value::String(s) => match s.strip_prefix(EXPR_PREFIX) {
                Some(source) => Self::Expr(source.to_string()),
                None => Self::Literal(Value::String(s)),
            },
            other => Self::Literal(other),
        })
    }
}

#[cfg(feature = "schemars")]
impl schemars::JsonSchema for InputBinding {
    fn schema_name() -> String {
        "InputBinding".to_string()
    }

    fn json_schema(_: &mut schemars::gen::SchemaGenerator) -> schemars::schema::Schema {
        // Any JSON value; strings with the expr/ prefix are expressions.
        schemars::schema::Schema::Bool(true)
    }
}

// ---------------------------------------------------------------------------
// Steps
// ---------------------------------------------------------------------------

/// Invocation kind of a step. Only in-process module nodes exist today.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum StepKind {
    #[default]
    Module,
}

/// A named binding of a node to computed inputs within a workflow.
///
/// The step's name is also the key its success payload is merged under in
/// `Context.vars`, so later steps can reference `ctx.vars.<name>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[serde(rename_all = "snake_case")]
pub struct StepDef {
    pub name: String,
    /// Node registry key. Must resolve at workflow-load time.
    pub node: String,
    #[serde(rename = "type", default)]
    pub kind: StepKind,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub inputs: BTreeMap<String, InputBinding>,
}

// ---------------------------------------------------------------------------
// Condition branches
// ---------------------------------------------------------------------------

/// One guarded alternative inside a [`ConditionBranch`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[serde(rename_all = "snake_case")]
pub struct GuardedSteps {
    /// Guard expression. The `expr/` prefix is accepted but not required.
    pub when: String,
    pub steps: Vec<StepDef>,
}

impl GuardedSteps {
    /// Guard source with any `expr/` prefix stripped.
    pub fn expression(&self) -> &str {
        self.when.strip_prefix(EXPR_PREFIX).unwrap_or(&self.when)
    }
}

/// An ordered if/else-if/else selection among alternative step lists.
///
/// Guards are evaluated in declared order; the first true guard's steps
/// run. With no true guard and no `otherwise`, the branch is a no-op.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[serde(rename_all = "snake_case")]
pub struct ConditionBranch {
    pub branches: Vec<GuardedSteps>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub otherwise: Option<Vec<StepDef>>,
}

/// One element of a workflow, executed in declaration order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[serde(untagged)]
pub enum Element {
    Branch(ConditionBranch),
    Step(StepDef),
}

// ---------------------------------------------------------------------------
// Triggers
// ---------------------------------------------------------------------------

/// HTTP method pattern: a specific verb or the `ANY` wildcard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[serde(from = "String", into = "String")]
pub enum MethodMatch {
    Any,
    Method(String),
}

impl MethodMatch {
    pub fn matches(&self, method: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Method(m) => m.eq_ignore_ascii_case(method),
        }
    }
}

impl From<String> for MethodMatch {
    fn from(s: String) -> Self {
        if s.eq_ignore_ascii_case("ANY") {
            Self::Any
        } else {
            Self::Method(s.to_uppercase())
        }
    }
}

impl From<MethodMatch> for String {
    fn from(m: MethodMatch) -> Self {
        match m {
            MethodMatch::Any => "ANY".to_string(),
            MethodMatch::Method(v) => v,
        }
    }
}

impl std::fmt::Display for MethodMatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Any => write!(f, "ANY"),
            Self::Method(m) => write!(f, "{m}"),
        }
    }
}

/// Binding from a transport event pattern to a workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[serde(rename_all = "snake_case")]
pub struct TriggerDef {
    pub method: MethodMatch,
    pub path: String,
    /// Accepted content type. `None` matches any `Accept` header.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accept: Option<String>,
}

// ---------------------------------------------------------------------------
// Workflow
// ---------------------------------------------------------------------------

/// A named pipeline of steps and condition branches, reachable through
/// one or more triggers. Immutable after load.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[serde(rename_all = "snake_case")]
pub struct WorkflowDef {
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub description: String,
    pub triggers: Vec<TriggerDef>,
    pub elements: Vec<Element>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn input_binding_expr_prefix() {
        let b: InputBinding = serde_json::from_value(json!("expr/ctx.vars.x || 5")).unwrap();
        assert_eq!(b, InputBinding::Expr("ctx.vars.x || 5".into()));

        let rt = serde_json::to_value(&b).unwrap();
        assert_eq!(rt, json!("expr/ctx.vars.x || 5"));
    }

    #[test]
    fn input_binding_plain_string_is_literal() {
        let b: InputBinding = serde_json::from_value(json!("hello")).unwrap();
        assert_eq!(b, InputBinding::Literal(json!("hello")));
    }

    #[test]
    fn input_binding_non_string_is_literal() {
        let b: InputBinding = serde_json::from_value(json!({"nested": [1, 2]})).unwrap();
        assert_eq!(b, InputBinding::Literal(json!({"nested": [1, 2]})));
    }

    #[test]
    fn method_match_any_wildcard() {
        let m: MethodMatch = serde_json::from_value(json!("ANY")).unwrap();
        assert_eq!(m, MethodMatch::Any);
        assert!(m.matches("GET"));
        assert!(m.matches("delete"));
    }

    #[test]
    fn method_match_uppercases() {
        let m: MethodMatch = serde_json::from_value(json!("post")).unwrap();
        assert_eq!(m, MethodMatch::Method("POST".into()));
        assert!(m.matches("POST"));
        assert!(!m.matches("GET"));
        assert_eq!(serde_json::to_value(&m).unwrap(), json!("POST"));
    }

    #[test]
    fn guard_expression_strips_prefix() {
        let g = GuardedSteps {
            when: "expr/ctx.vars.ok === true".into(),
            steps: vec![],
        };
        assert_eq!(g.expression(), "ctx.vars.ok === true");

        let bare = GuardedSteps {
            when: "ctx.vars.ok".into(),
            steps: vec![],
        };
        assert_eq!(bare.expression(), "ctx.vars.ok");
    }

    #[test]
    fn workflow_def_round_trip() {
        let def: WorkflowDef = serde_json::from_value(json!({
            "name": "hello",
            "version": "1",
            "description": "Echo the message query parameter",
            "triggers": [{"method": "GET", "path": "/"}],
            "elements": [
                {
                    "name": "greet",
                    "node": "echo",
                    "type": "module",
                    "inputs": {"message": "expr/ctx.request.query.message"}
                },
                {
                    "branches": [{
                        "when": "expr/ctx.vars.greet.message == 'hi'",
                        "steps": [{"name": "again", "node": "echo", "inputs": {}}]
                    }],
                    "otherwise": [
                        {"name": "deny", "node": "error",
                         "inputs": {"code": 401, "message": "nope"}}
                    ]
                }
            ]
        }))
        .unwrap();

        assert_eq!(def.name, "hello");
        assert_eq!(def.elements.len(), 2);
        assert!(matches!(def.elements[0], Element::Step(_)));
        assert!(matches!(def.elements[1], Element::Branch(_)));

        if let Element::Step(step) = &def.elements[0] {
            assert_eq!(step.kind, StepKind::Module);
            assert_eq!(
                step.inputs["message"],
                InputBinding::Expr("ctx.request.query.message".into())
            );
        }
        if let Element::Branch(branch) = &def.elements[1] {
            assert_eq!(branch.branches.len(), 1);
            let otherwise = branch.otherwise.as_ref().unwrap();
            assert_eq!(otherwise[0].inputs["code"], InputBinding::Literal(json!(401)));
        }

        // Round trip preserves shape.
        let v = serde_json::to_value(&def).unwrap();
        let rt: WorkflowDef = serde_json::from_value(v).unwrap();
        assert_eq!(rt.elements.len(), 2);
    }

    #[test]
    fn step_kind_defaults_to_module() {
        let step: StepDef =
            serde_json::from_value(json!({"name": "s", "node": "echo"})).unwrap();
        assert_eq!(step.kind, StepKind::Module);
        assert!(step.inputs.is_empty());
    }
}
