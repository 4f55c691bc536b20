//! Trellis — a declarative request-processing engine.
//!
//! Inbound HTTP triggers are mapped to **workflows**: directed sequences
//! (with conditional branching) of typed **nodes** that read a shared
//! per-request [`Context`] and return a success payload or a structured
//! error. The engine supplies the execution contract that glues
//! independently authored nodes into composable pipelines: input/output
//! validation, a restricted expression language for wiring step inputs,
//! ordered guard selection, and uniform short-circuiting error
//! propagation — failures are values, never unwinding control flow.
//!
//! The crate is designed to be embedded: it never opens sockets or parses
//! raw HTTP. A transport adapter (see `trellis-server`) converts its
//! events in and renders its responses out.

#[cfg(feature = "schemars")]
pub mod schema;

pub mod context;
pub mod engine;
pub mod errors;
pub mod execution;
pub mod expression;
pub mod node;
pub mod nodes;
pub mod registry;
pub mod response;
pub mod router;
pub mod validate;
pub mod workflow;

// Re-export public types at the crate level.

// context
pub use context::{parse_cookies, parse_query, Context, RequestFacts};

// engine
pub use engine::{Engine, EngineBuilder, EngineConfig};

// errors
pub use errors::{DispatchError, WorkflowLoadError};

// execution
pub use execution::{Execution, RunStatus, StepRecord, StepStatus};

// expression
pub use expression::{ExpressionError, EXPR_PREFIX};

// node
pub use node::{validate_inputs, FieldDef, FieldType, Node, NodeMeta};

// nodes
pub use nodes::{builtin_nodes, EchoNode, ErrorNode, PassthroughNode};

// registry
pub use registry::NodeRegistry;

// response
pub use response::{GlobalError, NodeResult, Rendered, Response, DEFAULT_ERROR_CODE};

// router
pub use router::TriggerRouter;

// validate
pub use validate::validate_workflow;

// workflow
pub use workflow::{
    ConditionBranch, Element, GuardedSteps, InputBinding, MethodMatch, StepDef, StepKind,
    TriggerDef, WorkflowDef,
};
