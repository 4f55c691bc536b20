//! Passthrough node — forwards its resolved inputs as its payload.
//!
//! Useful for shaping a terminal response out of wired expressions, or for
//! staging values into `Context.vars` under a step name.

use async_trait::async_trait;
use serde_json::Value;

use crate::context::Context;
use crate::node::{Node, NodeMeta};
use crate::response::NodeResult;

pub struct PassthroughNode;

#[async_trait]
impl Node for PassthroughNode {
    fn meta(&self) -> NodeMeta {
        NodeMeta {
            name: "passthrough".into(),
            label: "Passthrough".into(),
            category: "generic".into(),
            content_type: "application/json".into(),
            inputs: vec![],
            outputs: vec![],
        }
    }

    async fn handle(&self, _ctx: &Context, inputs: Value) -> NodeResult {
        Ok(inputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RequestFacts;
    use serde_json::json;

    #[tokio::test]
    async fn forwards_inputs_unchanged() {
        let node = PassthroughNode;
        let ctx = Context::new(RequestFacts::new("GET", "/"));
        let input = json!({"x": 42, "status": "ok"});
        let out = node.handle(&ctx, input.clone()).await.unwrap();
        assert_eq!(out, input);
    }
}
