//! Trigger routing — matching inbound events to workflows.
//!
//! The router is built once from all loaded workflows' trigger sets.
//! Dispatch matches method+path first (wildcard method allowed), then
//! consults the `Accept` header. A specific method outranks the `ANY`
//! wildcard and a declared accept outranks an unconstrained one, so at
//! most one workflow is selected per inbound event; exact duplicates are
//! a load-time conflict.

use crate::context::RequestFacts;
use crate::errors::WorkflowLoadError;
use crate::workflow::{MethodMatch, TriggerDef, WorkflowDef};

struct Route {
    trigger: TriggerDef,
    workflow: String,
}

/// Read-only routing table from transport events to workflow names.
pub struct TriggerRouter {
    routes: Vec<Route>,
}

impl std::fmt::Debug for TriggerRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TriggerRouter")
            .field("routes", &self.routes.len())
            .finish()
    }
}

impl TriggerRouter {
    /// Build the routing table, rejecting duplicate trigger claims.
    pub fn build<'a>(
        workflows: impl IntoIterator<Item = &'a WorkflowDef>,
    ) -> Result<Self, WorkflowLoadError> {
        let mut routes: Vec<Route> = Vec::new();
        for workflow in workflows {
            for trigger in &workflow.triggers {
                if let Some(existing) = routes.iter().find(|r| r.trigger == *trigger) {
                    return Err(WorkflowLoadError::TriggerConflict {
                        method: trigger.method.to_string(),
                        path: trigger.path.clone(),
                        first: existing.workflow.clone(),
                        second: workflow.name.clone(),
                    });
                }
                routes.push(Route {
                    trigger: trigger.clone(),
                    workflow: workflow.name.clone(),
                });
            }
        }
        Ok(Self { routes })
    }

    /// Match an inbound event to a workflow name.
    pub fn route(&self, request: &RequestFacts) -> Option<&str> {
        self.routes
            .iter()
            .filter(|r| {
                r.trigger.path == request.path
                    && r.trigger.method.matches(&request.method)
                    && accept_compatible(r.trigger.accept.as_deref(), request.accept())
            })
            .min_by_key(|r| {
                let method_rank = match r.trigger.method {
                    MethodMatch::Any => 1,
                    MethodMatch::Method(_) => 0,
                };
                let accept_rank = if r.trigger.accept.is_some() { 0 } else { 1 };
                (method_rank, accept_rank)
            })
            .map(|r| r.workflow.as_str())
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// An unconstrained trigger accepts anything; otherwise the client's
/// `Accept` header must name the declared type (or a wildcard, or be
/// absent entirely).
fn accept_compatible(declared: Option<&str>, requested: Option<&str>) -> bool {
    let declared = match declared {
        Some(d) => d,
        None => return true,
    };
    match requested {
        None => true,
        Some(req) => req.contains(declared) || req.contains("*/*"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn workflow(name: &str, triggers: serde_json::Value) -> WorkflowDef {
        serde_json::from_value(json!({
            "name": name,
            "triggers": triggers,
            "elements": [],
        }))
        .expect("workflow json")
    }

    fn request(method: &str, path: &str) -> RequestFacts {
        RequestFacts::new(method, path)
    }

    #[test]
    fn exact_method_and_path() {
        let flows = vec![
            workflow("home", json!([{"method": "GET", "path": "/"}])),
            workflow("create", json!([{"method": "POST", "path": "/users"}])),
        ];
        let router = TriggerRouter::build(&flows).unwrap();
        assert_eq!(router.route(&request("GET", "/")), Some("home"));
        assert_eq!(router.route(&request("POST", "/users")), Some("create"));
        assert_eq!(router.route(&request("DELETE", "/users")), None);
        assert_eq!(router.route(&request("GET", "/missing")), None);
    }

    #[test]
    fn any_wildcard_matches_all_methods() {
        let flows = vec![workflow("all", json!([{"method": "ANY", "path": "/hook"}]))];
        let router = TriggerRouter::build(&flows).unwrap();
        assert_eq!(router.route(&request("GET", "/hook")), Some("all"));
        assert_eq!(router.route(&request("PATCH", "/hook")), Some("all"));
    }

    #[test]
    fn specific_method_outranks_wildcard() {
        let flows = vec![
            workflow("fallback", json!([{"method": "ANY", "path": "/x"}])),
            workflow("get_only", json!([{"method": "GET", "path": "/x"}])),
        ];
        let router = TriggerRouter::build(&flows).unwrap();
        assert_eq!(router.route(&request("GET", "/x")), Some("get_only"));
        assert_eq!(router.route(&request("POST", "/x")), Some("fallback"));
    }

    #[test]
    fn accept_narrows_candidates() {
        let flows = vec![
            workflow(
                "json_api",
                json!([{"method": "GET", "path": "/data", "accept": "application/json"}]),
            ),
            workflow("plain", json!([{"method": "GET", "path": "/data"}])),
        ];
        let router = TriggerRouter::build(&flows).unwrap();

        let mut req = request("GET", "/data");
        req.headers
            .insert("accept".into(), "application/json".into());
        assert_eq!(router.route(&req), Some("json_api"));

        let mut req = request("GET", "/data");
        req.headers.insert("accept".into(), "text/html".into());
        assert_eq!(router.route(&req), Some("plain"));

        // No Accept header: the declared trigger still wins on rank.
        assert_eq!(router.route(&request("GET", "/data")), Some("json_api"));
    }

    #[test]
    fn wildcard_accept_header_matches_declared() {
        let flows = vec![workflow(
            "json_api",
            json!([{"method": "GET", "path": "/data", "accept": "application/json"}]),
        )];
        let router = TriggerRouter::build(&flows).unwrap();
        let mut req = request("GET", "/data");
        req.headers.insert("accept".into(), "*/*".into());
        assert_eq!(router.route(&req), Some("json_api"));
    }

    #[test]
    fn duplicate_trigger_is_a_load_conflict() {
        let flows = vec![
            workflow("a", json!([{"method": "GET", "path": "/"}])),
            workflow("b", json!([{"method": "GET", "path": "/"}])),
        ];
        let err = TriggerRouter::build(&flows).unwrap_err();
        assert!(matches!(err, WorkflowLoadError::TriggerConflict { .. }));
    }
}
