//! Error node — terminates a pipeline with a declared failure.
//!
//! Typically the last step of a guard's else branch: the workflow wires a
//! literal code and message, the node returns them as a failure, and the
//! engine short-circuits.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::context::Context;
use crate::node::{FieldDef, FieldType, Node, NodeMeta};
use crate::response::{GlobalError, NodeResult, DEFAULT_ERROR_CODE};

pub struct ErrorNode;

#[async_trait]
impl Node for ErrorNode {
    fn meta(&self) -> NodeMeta {
        NodeMeta {
            name: "error".into(),
            label: "Error".into(),
            category: "generic".into(),
            content_type: "application/json".into(),
            inputs: vec![
                FieldDef::new("code", FieldType::Number)
                    .optional()
                    .with_default(json!(DEFAULT_ERROR_CODE))
                    .with_description("HTTP-style status code"),
                FieldDef::new("message", FieldType::String),
            ],
            outputs: vec![],
        }
    }

    async fn handle(&self, _ctx: &Context, inputs: Value) -> NodeResult {
        let message = inputs["message"].as_str().unwrap_or("error").to_string();
        let code = inputs["code"]
            .as_u64()
            .and_then(|c| u16::try_from(c).ok())
            .unwrap_or(DEFAULT_ERROR_CODE);
        Err(GlobalError::new(message).with_code(code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RequestFacts;
    use crate::node::validate_inputs;

    #[tokio::test]
    async fn fails_with_declared_code_and_message() {
        let node = ErrorNode;
        let ctx = Context::new(RequestFacts::new("GET", "/"));
        let err = node
            .handle(&ctx, json!({"code": 401, "message": "Unauthorized. Admin access required."}))
            .await
            .unwrap_err();
        assert_eq!(err.code, 401);
        assert_eq!(err.message, "Unauthorized. Admin access required.");
    }

    #[tokio::test]
    async fn code_defaults_to_500() {
        let node = ErrorNode;
        let ctx = Context::new(RequestFacts::new("GET", "/"));
        let inputs =
            validate_inputs("error", &node.meta().inputs, json!({"message": "boom"})).unwrap();
        let err = node.handle(&ctx, inputs).await.unwrap_err();
        assert_eq!(err.code, 500);
    }

    #[tokio::test]
    async fn message_is_required() {
        let node = ErrorNode;
        let err = validate_inputs("error", &node.meta().inputs, json!({})).unwrap_err();
        assert_eq!(err.code, 400);
    }
}
