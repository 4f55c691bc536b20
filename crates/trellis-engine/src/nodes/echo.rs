//! Echo node — returns its `message` input, or a friendly default.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::context::Context;
use crate::node::{FieldDef, FieldType, Node, NodeMeta};
use crate::response::NodeResult;

/// Default greeting when no `message` input is wired.
pub const DEFAULT_MESSAGE: &str = "Hello World from Node!";

pub struct EchoNode;

#[async_trait]
impl Node for EchoNode {
    fn meta(&self) -> NodeMeta {
        NodeMeta {
            name: "echo".into(),
            label: "Echo".into(),
            category: "generic".into(),
            content_type: "application/json".into(),
            inputs: vec![FieldDef::new("message", FieldType::String)
                .optional()
                .with_default(json!(DEFAULT_MESSAGE))
                .with_description("Message to echo back")],
            outputs: vec![FieldDef::new("message", FieldType::String)],
        }
    }

    async fn handle(&self, _ctx: &Context, inputs: Value) -> NodeResult {
        let message = inputs.get("message").cloned().unwrap_or_default();
        Ok(json!({ "message": message }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RequestFacts;
    use crate::node::validate_inputs;

    #[tokio::test]
    async fn echoes_message() {
        let node = EchoNode;
        let ctx = Context::new(RequestFacts::new("GET", "/"));
        let out = node
            .handle(&ctx, json!({"message": "hi"}))
            .await
            .unwrap();
        assert_eq!(out, json!({"message": "hi"}));
    }

    #[tokio::test]
    async fn default_applies_through_input_validation() {
        let node = EchoNode;
        let ctx = Context::new(RequestFacts::new("GET", "/"));
        let inputs = validate_inputs("echo", &node.meta().inputs, json!({})).unwrap();
        let out = node.handle(&ctx, inputs).await.unwrap();
        assert_eq!(out, json!({"message": DEFAULT_MESSAGE}));
    }
}
