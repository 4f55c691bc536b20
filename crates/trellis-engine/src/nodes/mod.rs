//! Built-in generic nodes.
//!
//! Domain nodes (user queries, policy checks, audit logging, auth) live in
//! external crates and enter through the registry seam. The core ships
//! only the generic trio below.

mod echo;
mod error;
mod passthrough;

pub use echo::EchoNode;
pub use error::ErrorNode;
pub use passthrough::PassthroughNode;

use std::sync::Arc;

use crate::node::Node;

/// The built-in node set, ready for
/// [`NodeRegistry::register_set`](crate::registry::NodeRegistry::register_set).
pub fn builtin_nodes() -> Vec<Arc<dyn Node>> {
    vec![
        Arc::new(EchoNode),
        Arc::new(ErrorNode),
        Arc::new(PassthroughNode),
    ]
}
