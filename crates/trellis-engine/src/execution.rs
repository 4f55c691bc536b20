//! Execution records — what happened during one workflow run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::response::{Rendered, Response};

/// Lifecycle of a single workflow execution. The transition to a terminal
/// state is irreversible — there are no retries within one execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum RunStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

/// Outcome of one step within an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum StepStatus {
    Succeeded,
    Failed,
}

/// Diagnostic record for a single executed step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[serde(rename_all = "snake_case")]
pub struct StepRecord {
    pub step: String,
    pub node: String,
    pub status: StepStatus,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The complete result of one workflow execution: terminal response plus
/// per-step diagnostics.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[serde(rename_all = "snake_case")]
pub struct Execution {
    pub run_id: Uuid,
    pub workflow: String,
    pub status: RunStatus,
    pub response: Response,
    /// Content type declared by the node that produced the terminal payload.
    pub content_type: String,
    pub steps: Vec<StepRecord>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl Execution {
    /// Project the terminal response onto the transport boundary.
    pub fn rendered(&self) -> Rendered {
        self.response.render(&self.content_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rendered_uses_terminal_content_type() {
        let exec = Execution {
            run_id: Uuid::new_v4(),
            workflow: "w".into(),
            status: RunStatus::Succeeded,
            response: Response::success(json!({"ok": true})),
            content_type: "application/json".into(),
            steps: vec![],
            started_at: Utc::now(),
            finished_at: Utc::now(),
        };
        let r = exec.rendered();
        assert_eq!(r.status, 200);
        assert_eq!(r.content_type, "application/json");
    }

    #[test]
    fn run_status_serde() {
        assert_eq!(
            serde_json::to_value(RunStatus::Succeeded).unwrap(),
            json!("succeeded")
        );
        let s: RunStatus = serde_json::from_value(json!("failed")).unwrap();
        assert_eq!(s, RunStatus::Failed);
    }
}
