//! Node registry — the single source of truth for available nodes.
//!
//! The registry is the seam where independently authored node sets are
//! injected: each set registers under its string keys at startup, the
//! engine wraps the result in an `Arc`, and nothing mutates it afterward.
//! Unknown keys are caught at workflow-load time, never at run time.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::node::{Node, NodeMeta};

/// Mapping from registry key to node instance. Populated once at startup,
/// read-only and safely shared across concurrent executions thereafter.
#[derive(Default)]
pub struct NodeRegistry {
    nodes: BTreeMap<String, Arc<dyn Node>>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node under `meta().name`, replacing any existing node
    /// with the same key. Replacement is logged — two node sets claiming
    /// one key is usually a composition mistake.
    pub fn register(&mut self, node: Arc<dyn Node>) {
        let key = node.meta().name;
        if self.nodes.insert(key.clone(), node).is_some() {
            tracing::warn!(node = %key, "node registration replaced an existing entry");
        }
    }

    /// Register every node of an independently authored set.
    pub fn register_set(&mut self, set: impl IntoIterator<Item = Arc<dyn Node>>) {
        for node in set {
            self.register(node);
        }
    }

    pub fn get(&self, key: &str) -> Option<Arc<dyn Node>> {
        self.nodes.get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.nodes.contains_key(key)
    }

    /// Metadata for every registered node, in key order.
    pub fn catalog(&self) -> Vec<NodeMeta> {
        self.nodes.values().map(|n| n.meta()).collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::{EchoNode, PassthroughNode};

    #[test]
    fn register_and_get() {
        let mut reg = NodeRegistry::new();
        reg.register(Arc::new(EchoNode));
        assert!(reg.contains("echo"));
        assert!(reg.get("echo").is_some());
        assert!(reg.get("missing").is_none());
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn register_set_composes() {
        let mut reg = NodeRegistry::new();
        reg.register_set(crate::nodes::builtin_nodes());
        assert!(reg.contains("echo"));
        assert!(reg.contains("error"));
        assert!(reg.contains("passthrough"));
    }

    #[test]
    fn catalog_in_key_order() {
        let mut reg = NodeRegistry::new();
        reg.register(Arc::new(PassthroughNode));
        reg.register(Arc::new(EchoNode));
        let names: Vec<String> = reg.catalog().into_iter().map(|m| m.name).collect();
        assert_eq!(names, vec!["echo", "passthrough"]);
    }

    #[test]
    fn replacement_keeps_latest() {
        let mut reg = NodeRegistry::new();
        reg.register(Arc::new(EchoNode));
        reg.register(Arc::new(EchoNode));
        assert_eq!(reg.len(), 1);
    }
}
