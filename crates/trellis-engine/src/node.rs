//! The node execution contract.
//!
//! A node declares an input schema, an output schema, and an async
//! `handle` operation. Everything else in the system composes nodes. A
//! node may read the [`Context`] but never writes it — accumulated outputs
//! are merged back into `Context.vars` by the engine alone.
//!
//! Node authors must translate every internal fault into a
//! [`GlobalError`](crate::response::GlobalError) before returning; the
//! engine additionally guards the invocation boundary, so an uncaught
//! panic becomes a 500 failure instead of crashing the process.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::context::Context;
use crate::response::{GlobalError, NodeResult};

// ---------------------------------------------------------------------------
// Field schema
// ---------------------------------------------------------------------------

/// Data types for node input/output fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum FieldType {
    String,
    Number,
    Bool,
    List,
    Map,
    Json,
    Any,
}

impl FieldType {
    fn accepts(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Bool => value.is_boolean(),
            Self::List => value.is_array(),
            Self::Map => value.is_object(),
            Self::Json | Self::Any => true,
        }
    }
}

/// A typed field on a node: name, type, requiredness, and default.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[serde(rename_all = "snake_case")]
pub struct FieldDef {
    pub name: String,
    pub field_type: FieldType,
    /// Whether the field must be present after defaults apply. Default: `true`.
    #[serde(default = "default_true")]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

fn default_true() -> bool {
    true
}

impl FieldDef {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: true,
            default: None,
            description: None,
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Node metadata and contract
// ---------------------------------------------------------------------------

/// Everything the engine needs about a node without executing it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[serde(rename_all = "snake_case")]
pub struct NodeMeta {
    /// Registry key. Steps reference nodes by this name.
    pub name: String,
    pub label: String,
    pub category: String,
    /// Content type of a rendered success payload.
    #[serde(default = "default_content_type")]
    pub content_type: String,
    pub inputs: Vec<FieldDef>,
    pub outputs: Vec<FieldDef>,
}

fn default_content_type() -> String {
    "application/json".to_string()
}

/// A reusable unit of work with a typed input/output contract.
///
/// `handle` receives inputs already validated against [`NodeMeta::inputs`]
/// (with defaults applied) and a read-only context. It returns a value or
/// a [`GlobalError`] — never a panic, never a thrown error.
#[async_trait]
pub trait Node: Send + Sync {
    fn meta(&self) -> NodeMeta;

    async fn handle(&self, ctx: &Context, inputs: Value) -> NodeResult;
}

// ---------------------------------------------------------------------------
// Schema validation
// ---------------------------------------------------------------------------

/// Validate resolved inputs against a node's input schema.
///
/// Applies field defaults, then checks required presence and type
/// conformance. Returns the completed input object, or a 400-class
/// [`GlobalError`] with per-field detail. The node's `handle` must never
/// run when this fails.
pub fn validate_inputs(node: &str, schema: &[FieldDef], inputs: Value) -> NodeResult {
    let mut map = match inputs {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            return Err(GlobalError::new("inputs must be an object")
                .with_code(400)
                .with_node(node)
                .with_detail(json!({"got": type_name(&other)})));
        }
    };

    let mut problems = Vec::new();
    for field in schema {
        if !map.contains_key(&field.name) {
            if let Some(default) = &field.default {
                map.insert(field.name.clone(), default.clone());
                continue;
            }
            if field.required {
                problems.push(json!({
                    "field": field.name,
                    "error": "required input is missing",
                }));
            }
            continue;
        }
        let value = &map[&field.name];
        if !field.field_type.accepts(value) {
            problems.push(json!({
                "field": field.name,
                "error": format!(
                    "expected {}, got {}",
                    serde_json::to_string(&field.field_type).unwrap_or_default(),
                    type_name(value)
                ),
            }));
        }
    }

    if problems.is_empty() {
        Ok(Value::Object(map))
    } else {
        Err(GlobalError::new("input validation failed")
            .with_code(400)
            .with_node(node)
            .with_detail(Value::Array(problems)))
    }
}

/// Advisory output-schema check. A mismatch is a node-authoring defect,
/// not a request error: it is logged and the payload flows on unchanged.
pub fn check_outputs(node: &str, schema: &[FieldDef], payload: &Value) {
    if schema.is_empty() {
        return;
    }
    let map = match payload {
        Value::Object(map) => map,
        other => {
            tracing::warn!(
                node = %node,
                got = type_name(other),
                "output schema declares fields but payload is not an object"
            );
            return;
        }
    };
    for field in schema {
        match map.get(&field.name) {
            None if field.required => {
                tracing::warn!(node = %node, field = %field.name, "declared output is missing");
            }
            Some(value) if !field.field_type.accepts(value) => {
                tracing::warn!(
                    node = %node,
                    field = %field.name,
                    got = type_name(value),
                    "output does not match its declared type"
                );
            }
            _ => {}
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Vec<FieldDef> {
        vec![
            FieldDef::new("message", FieldType::String)
                .optional()
                .with_default(json!("fallback")),
            FieldDef::new("count", FieldType::Number),
            FieldDef::new("tags", FieldType::List).optional(),
        ]
    }

    #[test]
    fn defaults_applied_for_missing_fields() {
        let out = validate_inputs("n", &schema(), json!({"count": 2})).unwrap();
        assert_eq!(out["message"], json!("fallback"));
        assert_eq!(out["count"], json!(2));
    }

    #[test]
    fn missing_required_is_400_with_detail() {
        let err = validate_inputs("n", &schema(), json!({})).unwrap_err();
        assert_eq!(err.code, 400);
        assert_eq!(err.node, "n");
        let detail = err.detail.unwrap();
        assert_eq!(detail[0]["field"], json!("count"));
    }

    #[test]
    fn type_mismatch_is_400() {
        let err = validate_inputs("n", &schema(), json!({"count": "two"})).unwrap_err();
        assert_eq!(err.code, 400);
        assert!(err.detail.unwrap()[0]["error"]
            .as_str()
            .unwrap()
            .contains("expected"));
    }

    #[test]
    fn null_inputs_treated_as_empty_object() {
        let err = validate_inputs("n", &schema(), Value::Null).unwrap_err();
        assert_eq!(err.code, 400); // count still required
    }

    #[test]
    fn non_object_inputs_rejected() {
        let err = validate_inputs("n", &schema(), json!([1, 2])).unwrap_err();
        assert_eq!(err.code, 400);
        assert_eq!(err.message, "inputs must be an object");
    }

    #[test]
    fn undeclared_fields_pass_through() {
        let out = validate_inputs("n", &schema(), json!({"count": 1, "extra": true})).unwrap();
        assert_eq!(out["extra"], json!(true));
    }

    #[test]
    fn empty_schema_accepts_anything_object_shaped() {
        let out = validate_inputs("n", &[], json!({"whatever": 1})).unwrap();
        assert_eq!(out["whatever"], json!(1));
    }

    #[test]
    fn field_type_accepts() {
        assert!(FieldType::String.accepts(&json!("s")));
        assert!(!FieldType::String.accepts(&json!(1)));
        assert!(FieldType::Number.accepts(&json!(1.5)));
        assert!(FieldType::Bool.accepts(&json!(true)));
        assert!(FieldType::List.accepts(&json!([])));
        assert!(FieldType::Map.accepts(&json!({})));
        assert!(FieldType::Any.accepts(&json!(null)));
        assert!(FieldType::Json.accepts(&json!([1])));
    }

    #[test]
    fn required_defaults_true_in_serde() {
        let fd: FieldDef =
            serde_json::from_str(r#"{"name": "x", "field_type": "string"}"#).unwrap();
        assert!(fd.required);
    }
}
