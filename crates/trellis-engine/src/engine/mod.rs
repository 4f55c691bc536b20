//! Workflow engine — the orchestrator.
//!
//! Given an inbound event, the engine matches a trigger, builds a fresh
//! [`Context`], and walks the workflow's elements in declaration order.
//! Steps within one execution are strictly sequential — later steps'
//! expressions may depend on earlier steps' outputs. Concurrency exists
//! across simultaneous events, never within one run.
//!
//! Failures are values: the first step failure becomes the terminal
//! response and downstream steps never run. The engine guards every node
//! invocation with a timeout and an unwind boundary, so a misbehaving
//! node yields a failure instead of taking the process down.

mod builder;

pub use builder::EngineBuilder;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::FutureExt;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::context::{Context, RequestFacts};
use crate::errors::DispatchError;
use crate::execution::{Execution, RunStatus, StepRecord, StepStatus};
use crate::expression;
use crate::node::{check_outputs, validate_inputs};
use crate::registry::NodeRegistry;
use crate::response::{GlobalError, Response};
use crate::router::TriggerRouter;
use crate::workflow::{ConditionBranch, Element, InputBinding, StepDef, WorkflowDef};

/// Engine tuning knobs.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Per-node invocation timeout. A node that exceeds it fails with a
    /// 504-class error; the engine keeps running.
    pub step_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            step_timeout: Duration::from_secs(30),
        }
    }
}

/// The assembled runtime: node registry, workflow table, trigger router.
///
/// All of it is read-only after [`build()`](EngineBuilder::build) and
/// safely shared across concurrent executions.
pub struct Engine {
    registry: Arc<NodeRegistry>,
    workflows: BTreeMap<String, Arc<WorkflowDef>>,
    router: TriggerRouter,
    config: EngineConfig,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("workflows", &self.workflows.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    pub fn workflow(&self, name: &str) -> Option<&Arc<WorkflowDef>> {
        self.workflows.get(name)
    }

    /// Match the event to a trigger and execute the selected workflow.
    pub async fn dispatch(&self, request: RequestFacts) -> Result<Execution, DispatchError> {
        self.dispatch_with_cancel(request, CancellationToken::new())
            .await
    }

    /// Like [`dispatch`](Self::dispatch), with cooperative cancellation.
    ///
    /// Cancellation is observed between elements: no further steps are
    /// dispatched, but an in-flight node invocation always completes.
    pub async fn dispatch_with_cancel(
        &self,
        request: RequestFacts,
        cancel: CancellationToken,
    ) -> Result<Execution, DispatchError> {
        let name = self
            .router
            .route(&request)
            .ok_or_else(|| DispatchError::NoRoute {
                method: request.method.clone(),
                path: request.path.clone(),
            })?
            .to_string();
        self.execute_with_context(&name, Context::new(request), cancel)
            .await
    }

    /// Execute a workflow by name, bypassing trigger matching.
    pub async fn execute(
        &self,
        workflow: &str,
        request: RequestFacts,
    ) -> Result<Execution, DispatchError> {
        self.execute_with_context(workflow, Context::new(request), CancellationToken::new())
            .await
    }

    /// Execute a workflow over a caller-prepared context. The seam for
    /// transports that seed `vars` before the pipeline runs.
    pub async fn execute_with_context(
        &self,
        workflow: &str,
        ctx: Context,
        cancel: CancellationToken,
    ) -> Result<Execution, DispatchError> {
        let def = self
            .workflows
            .get(workflow)
            .ok_or_else(|| DispatchError::UnknownWorkflow {
                name: workflow.to_string(),
            })?
            .clone();
        Ok(self.run(&def, ctx, &cancel).await)
    }

    /// Walk the workflow's elements, short-circuiting on the first failure.
    async fn run(&self, def: &WorkflowDef, mut ctx: Context, cancel: &CancellationToken) -> Execution {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        tracing::debug!(workflow = %def.name, run_id = %run_id, "workflow run started");

        let mut records: Vec<StepRecord> = Vec::new();
        // Last successful step's payload and its node's content type.
        let mut terminal: (Value, String) =
            (Value::Object(Default::default()), "application/json".into());
        let mut failure: Option<GlobalError> = None;

        'elements: for element in &def.elements {
            if cancel.is_cancelled() {
                failure = Some(cancelled());
                break;
            }
            let steps: &[StepDef] = match element {
                Element::Step(step) => std::slice::from_ref(step),
                Element::Branch(branch) => match self.select_branch(branch, &ctx) {
                    Some(steps) => steps,
                    None => continue, // no guard true, no else: no-op
                },
            };
            for step in steps {
                if cancel.is_cancelled() {
                    failure = Some(cancelled());
                    break 'elements;
                }
                let (record, outcome) = self.run_step(step, &ctx).await;
                records.push(record);
                match outcome {
                    Ok((payload, content_type)) => {
                        ctx.vars.insert(step.name.clone(), payload.clone());
                        terminal = (payload, content_type);
                    }
                    Err(error) => {
                        failure = Some(error);
                        break 'elements;
                    }
                }
            }
        }

        let (status, response, content_type) = match failure {
            Some(error) => {
                tracing::debug!(
                    workflow = %def.name,
                    run_id = %run_id,
                    code = error.code,
                    node = %error.node,
                    "workflow run failed"
                );
                (
                    RunStatus::Failed,
                    Response::failure(error),
                    "application/json".to_string(),
                )
            }
            None => (
                RunStatus::Succeeded,
                Response::success(terminal.0),
                terminal.1,
            ),
        };

        Execution {
            run_id,
            workflow: def.name.clone(),
            status,
            response,
            content_type,
            steps: records,
            started_at,
            finished_at: Utc::now(),
        }
    }

    /// First true guard wins; `otherwise` catches the rest; guards that
    /// fail to evaluate are false.
    fn select_branch<'a>(
        &self,
        branch: &'a ConditionBranch,
        ctx: &Context,
    ) -> Option<&'a [StepDef]> {
        let view = ctx.view();
        for guarded in &branch.branches {
            let selected = match expression::evaluate_truthy(guarded.expression(), &view) {
                Ok(truthy) => truthy,
                Err(e) => {
                    tracing::debug!(guard = %guarded.when, error = %e, "guard did not evaluate, treated as false");
                    false
                }
            };
            if selected {
                return Some(&guarded.steps);
            }
        }
        branch.otherwise.as_deref()
    }

    async fn run_step(
        &self,
        step: &StepDef,
        ctx: &Context,
    ) -> (StepRecord, Result<(Value, String), GlobalError>) {
        let start = std::time::Instant::now();
        let outcome = self.invoke(step, ctx).await;
        let record = StepRecord {
            step: step.name.clone(),
            node: step.node.clone(),
            status: if outcome.is_ok() {
                StepStatus::Succeeded
            } else {
                StepStatus::Failed
            },
            duration_ms: start.elapsed().as_millis() as u64,
            error: outcome.as_ref().err().map(|e| e.to_string()),
        };
        (record, outcome)
    }

    /// Resolve inputs, validate, invoke behind timeout + unwind boundary.
    async fn invoke(&self, step: &StepDef, ctx: &Context) -> Result<(Value, String), GlobalError> {
        // Load-time validation guarantees the key resolves; defend anyway.
        let node = self.registry.get(&step.node).ok_or_else(|| {
            GlobalError::new(format!("unknown node: {}", step.node)).with_node(&step.node)
        })?;
        let meta = node.meta();

        let inputs = self.resolve_inputs(step, ctx);
        let inputs = validate_inputs(&step.node, &meta.inputs, inputs)?;

        let invocation = std::panic::AssertUnwindSafe(node.handle(ctx, inputs)).catch_unwind();
        let payload = match tokio::time::timeout(self.config.step_timeout, invocation).await {
            Err(_elapsed) => {
                return Err(GlobalError::new(format!(
                    "node timed out after {}ms",
                    self.config.step_timeout.as_millis()
                ))
                .with_code(504)
                .with_node(&step.node));
            }
            Ok(Err(panic)) => {
                return Err(GlobalError::new("node panicked")
                    .with_code(500)
                    .with_node(&step.node)
                    .with_trace(panic_message(panic)));
            }
            Ok(Ok(Err(error))) => return Err(error.attributed_to(&step.node)),
            Ok(Ok(Ok(payload))) => payload,
        };

        check_outputs(&step.node, &meta.outputs, &payload);
        Ok((payload, meta.content_type))
    }

    /// Compute each declared input: literals as-is, expressions against
    /// the current context view. An expression that fails or resolves to
    /// undefined leaves its input absent — schema validation decides
    /// whether that is an error.
    fn resolve_inputs(&self, step: &StepDef, ctx: &Context) -> Value {
        let view = ctx.view();
        let mut out = serde_json::Map::new();
        for (name, binding) in &step.inputs {
            let value = match binding {
                InputBinding::Literal(value) => Some(value.clone()),
                InputBinding::Expr(source) => match expression::evaluate(source, &view) {
                    Ok(value) => value,
                    Err(e) => {
                        tracing::debug!(
                            step = %step.name,
                            input = %name,
                            error = %e,
                            "input expression did not evaluate, treated as absent"
                        );
                        None
                    }
                },
            };
            if let Some(value) = value {
                out.insert(name.clone(), value);
            }
        }
        Value::Object(out)
    }
}

fn cancelled() -> GlobalError {
    GlobalError::new("workflow execution cancelled").with_code(499)
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
