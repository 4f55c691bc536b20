//! Engine builder — composes node sets and workflow definitions into a
//! validated, immutable runtime.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use super::{Engine, EngineConfig};
use crate::errors::WorkflowLoadError;
use crate::node::Node;
use crate::registry::NodeRegistry;
use crate::router::TriggerRouter;
use crate::validate::validate_workflow;
use crate::workflow::WorkflowDef;

/// Builder for assembling the [`Engine`].
///
/// Node sets and workflows accumulate here; [`build()`](Self::build)
/// validates everything and fails fast — an engine that builds cannot hit
/// an unknown node key or a trigger conflict at run time.
pub struct EngineBuilder {
    registry: NodeRegistry,
    workflows: Vec<WorkflowDef>,
    config: EngineConfig,
}

impl EngineBuilder {
    pub(super) fn new() -> Self {
        Self {
            registry: NodeRegistry::new(),
            workflows: Vec::new(),
            config: EngineConfig::default(),
        }
    }

    /// Register a single node. Keyed by `meta().name`.
    pub fn node(mut self, node: impl Node + 'static) -> Self {
        self.registry.register(Arc::new(node));
        self
    }

    /// Register an independently authored node set.
    pub fn node_set(mut self, set: impl IntoIterator<Item = Arc<dyn Node>>) -> Self {
        self.registry.register_set(set);
        self
    }

    /// Add a workflow definition.
    pub fn workflow(mut self, def: WorkflowDef) -> Self {
        self.workflows.push(def);
        self
    }

    /// Add several workflow definitions.
    pub fn workflows(mut self, defs: impl IntoIterator<Item = WorkflowDef>) -> Self {
        self.workflows.extend(defs);
        self
    }

    /// Per-node invocation timeout. Default: 30 s.
    pub fn step_timeout(mut self, timeout: Duration) -> Self {
        self.config.step_timeout = timeout;
        self
    }

    /// Validate and assemble. Every workflow is checked against the
    /// registry and the combined trigger set is checked for conflicts.
    pub fn build(self) -> Result<Engine, WorkflowLoadError> {
        let mut names = HashSet::new();
        for def in &self.workflows {
            if !names.insert(def.name.clone()) {
                return Err(WorkflowLoadError::DuplicateWorkflow {
                    name: def.name.clone(),
                });
            }
        }

        for def in &self.workflows {
            validate_workflow(def, &self.registry).map_err(|errors| {
                WorkflowLoadError::Invalid {
                    workflow: def.name.clone(),
                    errors,
                }
            })?;
        }

        let router = TriggerRouter::build(&self.workflows)?;

        let workflows: BTreeMap<String, Arc<WorkflowDef>> = self
            .workflows
            .into_iter()
            .map(|def| (def.name.clone(), Arc::new(def)))
            .collect();

        tracing::debug!(
            workflows = workflows.len(),
            nodes = self.registry.len(),
            routes = router.len(),
            "engine assembled"
        );

        Ok(Engine {
            registry: Arc::new(self.registry),
            workflows,
            router,
            config: self.config,
        })
    }
}
